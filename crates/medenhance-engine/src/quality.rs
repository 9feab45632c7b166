//! PSNR and SSIM between the original and the enhanced buffer.
//!
//! SSIM uses a 7x7 uniform window with `K1 = 0.01`, `K2 = 0.03`, a data
//! range of 255 and the sample covariance, averaged over every window that
//! fits entirely inside the image and then across channels.
//!
//! `Invert` is a lossless polarity flip. When a chain inverts an odd number
//! of times the enhanced buffer is flipped back before comparison, so the
//! metrics score fidelity rather than display polarity.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use medenhance_contracts::metrics::{Metrics, MetricsSource, PSNR_SENTINEL};
use medenhance_contracts::modality::{declared_improvements, ModalityProfile, TransformStep};

use crate::error::PipelineError;
use crate::transforms::{apply_step, is_grayscale_source, working_buffer};

pub const SSIM_WINDOW: usize = 7;
const SSIM_K1: f64 = 0.01;
const SSIM_K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;

struct ComparablePair {
    reference: Vec<u8>,
    candidate: Vec<u8>,
    width: usize,
    height: usize,
    channels: usize,
}

pub fn compute_metrics(
    original: &DynamicImage,
    enhanced: &DynamicImage,
    steps: &[TransformStep],
) -> Result<Metrics, PipelineError> {
    let pair = comparable_pair(original, enhanced, steps)?;
    if pair.width < SSIM_WINDOW || pair.height < SSIM_WINDOW {
        return Err(PipelineError::metric_computation(format!(
            "image {}x{} is smaller than the {SSIM_WINDOW}x{SSIM_WINDOW} SSIM window",
            pair.width, pair.height
        )));
    }
    if pair.reference.iter().all(|value| *value == 0) {
        return Err(PipelineError::metric_computation(
            "original image is entirely black",
        ));
    }

    let (contrast, sharpness) = declared_improvements(steps);
    let (psnr, ssim) = if pair.reference == pair.candidate {
        (PSNR_SENTINEL, 1.0)
    } else {
        (psnr(&pair.reference, &pair.candidate), ssim(&pair))
    };
    if !psnr.is_finite() || !ssim.is_finite() {
        return Err(PipelineError::metric_computation(format!(
            "non-finite metrics (psnr={psnr}, ssim={ssim})"
        )));
    }

    Ok(Metrics {
        psnr: psnr.clamp(0.0, PSNR_SENTINEL),
        ssim: ssim.clamp(0.0, 1.0),
        contrast_improvement_percent: contrast,
        sharpness_improvement_percent: sharpness,
        source: MetricsSource::Computed,
    })
}

/// `compute_metrics` for `profile`'s chain, or the profile's nominal values
/// together with the reason the buffers could not be measured.
pub fn compute_metrics_or_nominal(
    original: &DynamicImage,
    enhanced: &DynamicImage,
    profile: &ModalityProfile,
) -> (Metrics, Option<PipelineError>) {
    match compute_metrics(original, enhanced, &profile.steps) {
        Ok(metrics) => (metrics.sanitized(&profile.nominal), None),
        Err(err) => (Metrics::nominal(profile), Some(err)),
    }
}

fn flips_polarity(steps: &[TransformStep]) -> bool {
    steps
        .iter()
        .filter(|step| matches!(step, TransformStep::Invert))
        .count()
        % 2
        == 1
}

fn comparable_pair(
    original: &DynamicImage,
    enhanced: &DynamicImage,
    steps: &[TransformStep],
) -> Result<ComparablePair, PipelineError> {
    let (width, height) = original.dimensions();
    if width == 0 || height == 0 {
        return Err(PipelineError::metric_computation("original image has zero area"));
    }
    if enhanced.width() == 0 || enhanced.height() == 0 {
        return Err(PipelineError::metric_computation("enhanced image has zero area"));
    }

    let mut candidate = if enhanced.dimensions() == (width, height) {
        working_buffer(enhanced)
    } else {
        working_buffer(&enhanced.resize_exact(width, height, FilterType::Triangle))
    };
    if flips_polarity(steps) {
        apply_step(&mut candidate, &TransformStep::Invert);
    }

    let both_gray = is_grayscale_source(original.color()) && is_grayscale_source(candidate.color());
    let (reference, candidate, channels) = if both_gray {
        (original.to_luma8().into_raw(), candidate.to_luma8().into_raw(), 1)
    } else {
        (original.to_rgb8().into_raw(), candidate.to_rgb8().into_raw(), 3)
    };
    Ok(ComparablePair {
        reference,
        candidate,
        width: width as usize,
        height: height as usize,
        channels,
    })
}

fn psnr(reference: &[u8], candidate: &[u8]) -> f64 {
    if reference.is_empty() {
        return f64::NAN;
    }
    let squared: u64 = reference
        .iter()
        .zip(candidate)
        .map(|(a, b)| {
            let diff = i64::from(*a) - i64::from(*b);
            (diff * diff) as u64
        })
        .sum();
    let mse = squared as f64 / reference.len() as f64;
    if mse == 0.0 {
        return PSNR_SENTINEL;
    }
    10.0 * (DATA_RANGE * DATA_RANGE / mse).log10()
}

fn ssim(pair: &ComparablePair) -> f64 {
    let total: f64 = (0..pair.channels)
        .map(|channel| channel_ssim(pair, channel))
        .sum();
    total / pair.channels as f64
}

struct SummedArea {
    stride: usize,
    table: Vec<f64>,
}

impl SummedArea {
    fn build(width: usize, height: usize, value: impl Fn(usize) -> f64) -> Self {
        let stride = width + 1;
        let mut table = vec![0.0; stride * (height + 1)];
        for y in 0..height {
            let mut row = 0.0;
            for x in 0..width {
                row += value(y * width + x);
                table[(y + 1) * stride + x + 1] = table[y * stride + x + 1] + row;
            }
        }
        Self { stride, table }
    }

    fn window(&self, x: usize, y: usize, size: usize) -> f64 {
        let top = y * self.stride;
        let bottom = (y + size) * self.stride;
        self.table[bottom + x + size] - self.table[top + x + size] - self.table[bottom + x]
            + self.table[top + x]
    }
}

fn channel_ssim(pair: &ComparablePair, channel: usize) -> f64 {
    let plane = |samples: &[u8]| -> Vec<f64> {
        samples
            .iter()
            .skip(channel)
            .step_by(pair.channels)
            .map(|value| f64::from(*value))
            .collect()
    };
    let x = plane(&pair.reference);
    let y = plane(&pair.candidate);
    let (width, height) = (pair.width, pair.height);

    let sum_x = SummedArea::build(width, height, |idx| x[idx]);
    let sum_y = SummedArea::build(width, height, |idx| y[idx]);
    let sum_xx = SummedArea::build(width, height, |idx| x[idx] * x[idx]);
    let sum_yy = SummedArea::build(width, height, |idx| y[idx] * y[idx]);
    let sum_xy = SummedArea::build(width, height, |idx| x[idx] * y[idx]);

    let n = (SSIM_WINDOW * SSIM_WINDOW) as f64;
    let cov_norm = n / (n - 1.0);
    let c1 = (SSIM_K1 * DATA_RANGE).powi(2);
    let c2 = (SSIM_K2 * DATA_RANGE).powi(2);

    let mut total = 0.0;
    let mut windows = 0usize;
    for wy in 0..=height - SSIM_WINDOW {
        for wx in 0..=width - SSIM_WINDOW {
            let ux = sum_x.window(wx, wy, SSIM_WINDOW) / n;
            let uy = sum_y.window(wx, wy, SSIM_WINDOW) / n;
            let vx = cov_norm * (sum_xx.window(wx, wy, SSIM_WINDOW) / n - ux * ux);
            let vy = cov_norm * (sum_yy.window(wx, wy, SSIM_WINDOW) / n - uy * uy);
            let vxy = cov_norm * (sum_xy.window(wx, wy, SSIM_WINDOW) / n - ux * uy);

            let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
            let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
            total += numerator / denominator;
            windows += 1;
        }
    }
    total / windows as f64
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
    use medenhance_contracts::metrics::{MetricsSource, PSNR_SENTINEL};
    use medenhance_contracts::modality::{resolve_profile, ModalityTag, TransformStep};

    use super::{compute_metrics, compute_metrics_or_nominal};
    use crate::error::PipelineErrorKind;
    use crate::transforms::apply;

    fn noise(width: u32, height: u32, seed: u64) -> DynamicImage {
        let mut state = seed;
        DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |_, _| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            Luma([(state >> 33) as u8])
        }))
    }

    #[test]
    fn identical_buffers_hit_sentinels() -> anyhow::Result<()> {
        let image = noise(32, 24, 3);
        let metrics = compute_metrics(&image, &image, &[])?;
        assert_eq!(metrics.ssim, 1.0);
        assert_eq!(metrics.psnr, PSNR_SENTINEL);
        assert_eq!(metrics.source, MetricsSource::Computed);
        Ok(())
    }

    #[test]
    fn inversion_alone_scores_as_lossless() -> anyhow::Result<()> {
        let image = noise(16, 16, 11);
        let inverted = apply(&image, &[TransformStep::Invert]);
        let metrics = compute_metrics(&image, &inverted, &[TransformStep::Invert])?;
        assert_eq!(metrics.ssim, 1.0);
        assert_eq!(metrics.psnr, PSNR_SENTINEL);
        Ok(())
    }

    #[test]
    fn modified_buffer_scores_between_bounds() -> anyhow::Result<()> {
        let image = noise(40, 40, 5);
        let steps = [
            TransformStep::Contrast { factor: 1.3 },
            TransformStep::Sharpness { factor: 1.5 },
        ];
        let enhanced = apply(&image, &steps);
        let metrics = compute_metrics(&image, &enhanced, &steps)?;
        assert!(metrics.ssim > 0.0 && metrics.ssim < 1.0, "{metrics:?}");
        assert!(metrics.psnr > 0.0 && metrics.psnr < PSNR_SENTINEL, "{metrics:?}");
        assert_eq!(metrics.contrast_improvement_percent, 30.0);
        assert_eq!(metrics.sharpness_improvement_percent, 50.0);
        assert!(metrics.is_valid());
        Ok(())
    }

    #[test]
    fn mismatched_dimensions_and_channels_are_reconciled() -> anyhow::Result<()> {
        let original = DynamicImage::ImageRgb8(RgbImage::from_fn(20, 20, |x, y| {
            Rgb([(x * 12) as u8, (y * 12) as u8, 90])
        }));
        let larger = original.resize_exact(40, 40, image::imageops::FilterType::Nearest);
        let metrics = compute_metrics(&original, &larger, &[])?;
        assert!(metrics.is_valid());
        assert!(metrics.ssim > 0.5);

        let gray = DynamicImage::ImageLuma8(original.to_luma8());
        let metrics = compute_metrics(&gray, &original, &[])?;
        assert!(metrics.is_valid());
        Ok(())
    }

    #[test]
    fn degenerate_inputs_are_metric_errors() {
        let tiny = noise(5, 5, 1);
        let err = compute_metrics(&tiny, &tiny, &[]).err().map(|err| err.kind());
        assert_eq!(err, Some(PipelineErrorKind::MetricComputation));

        let black = DynamicImage::ImageLuma8(GrayImage::new(16, 16));
        let err = compute_metrics(&black, &noise(16, 16, 2), &[])
            .err()
            .map(|err| err.kind());
        assert_eq!(err, Some(PipelineErrorKind::MetricComputation));
    }

    #[test]
    fn or_nominal_falls_back_to_profile_values() {
        let profile = resolve_profile(ModalityTag::Ultrasound);
        let tiny = noise(4, 4, 9);
        let (metrics, err) = compute_metrics_or_nominal(&tiny, &tiny, profile);
        assert_eq!(metrics.source, MetricsSource::Nominal);
        assert_eq!(metrics.psnr, 33.5);
        assert_eq!(metrics.ssim, 0.88);
        assert_eq!(
            err.map(|err| err.kind()),
            Some(PipelineErrorKind::MetricComputation)
        );

        let image = noise(24, 24, 5);
        let (metrics, err) = compute_metrics_or_nominal(&image, &image, profile);
        assert_eq!(metrics.source, MetricsSource::Computed);
        assert!(err.is_none());
    }
}
