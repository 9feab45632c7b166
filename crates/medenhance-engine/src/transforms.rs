//! Deterministic pixel operations behind each `TransformStep`.
//!
//! Every chain runs on an 8-bit working buffer: single-channel for
//! grayscale sources, RGB for everything else (alpha is dropped). Steps
//! never change the dimensions and every output sample is rounded and
//! clamped to `[0, 255]`.

use std::io::Cursor;

use anyhow::{Context, Result};
use image::{ColorType, DynamicImage, ImageFormat};
use medenhance_contracts::modality::TransformStep;

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy)]
struct Kernel {
    weights: [i32; 9],
    scale: f64,
}

const SMOOTH: Kernel = Kernel {
    weights: [1, 1, 1, 1, 5, 1, 1, 1, 1],
    scale: 13.0,
};

const SHARPEN: Kernel = Kernel {
    weights: [-2, -2, -2, -2, 32, -2, -2, -2, -2],
    scale: 16.0,
};

const EDGE_ENHANCE: Kernel = Kernel {
    weights: [-1, -1, -1, -1, 10, -1, -1, -1, -1],
    scale: 2.0,
};

const EDGE_ENHANCE_MORE: Kernel = Kernel {
    weights: [-1, -1, -1, -1, 9, -1, -1, -1, -1],
    scale: 1.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    width: usize,
    height: usize,
    channels: usize,
}

impl Layout {
    fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    fn stride(&self) -> usize {
        self.width * self.channels
    }
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::image_decode("image payload is empty"));
    }
    let image = image::load_from_memory(bytes)
        .map_err(|err| PipelineError::image_decode(format!("unreadable image payload: {err}")))?;
    if image.width() == 0 || image.height() == 0 {
        return Err(PipelineError::image_decode("image has zero area"));
    }
    Ok(image)
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes: Vec<u8> = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("failed to encode enhanced image as PNG")?;
    Ok(bytes)
}

/// Runs `steps` in order on a working copy of `image`.
pub fn apply(image: &DynamicImage, steps: &[TransformStep]) -> DynamicImage {
    let mut working = working_buffer(image);
    for step in steps {
        apply_step(&mut working, step);
    }
    working
}

/// Applies one step in place. Buffers other than 8-bit gray/RGB are left
/// untouched; `apply` never produces them.
pub fn apply_step(image: &mut DynamicImage, step: &TransformStep) {
    let Some((samples, layout)) = samples_mut(image) else {
        return;
    };
    if step.requires_color() && layout.channels < 3 {
        return;
    }
    match *step {
        TransformStep::AutoContrast { cutoff_percent } => {
            auto_contrast(samples, layout, cutoff_percent)
        }
        TransformStep::Invert => invert(samples),
        TransformStep::Contrast { factor } => contrast(samples, layout, factor),
        TransformStep::Sharpness { factor } => sharpness(samples, layout, factor),
        TransformStep::SharpenFilter => filter(samples, layout, SHARPEN),
        TransformStep::Grayscale => grayscale(samples),
        TransformStep::EdgeEnhance { strong: true } => filter(samples, layout, EDGE_ENHANCE_MORE),
        TransformStep::EdgeEnhance { strong: false } => filter(samples, layout, EDGE_ENHANCE),
        TransformStep::Brightness { factor } => brightness(samples, factor),
        TransformStep::MedianFilter { size } => median_filter(samples, layout, size),
    }
}

pub(crate) fn working_buffer(image: &DynamicImage) -> DynamicImage {
    if is_grayscale_source(image.color()) {
        DynamicImage::ImageLuma8(image.to_luma8())
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    }
}

pub(crate) fn is_grayscale_source(color: ColorType) -> bool {
    matches!(
        color,
        ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16
    )
}

fn samples_mut(image: &mut DynamicImage) -> Option<(&mut [u8], Layout)> {
    let width = image.width() as usize;
    let height = image.height() as usize;
    match image {
        DynamicImage::ImageLuma8(buffer) => Some((
            &mut **buffer,
            Layout {
                width,
                height,
                channels: 1,
            },
        )),
        DynamicImage::ImageRgb8(buffer) => Some((
            &mut **buffer,
            Layout {
                width,
                height,
                channels: 3,
            },
        )),
        _ => None,
    }
}

fn to_u8(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn luma(red: u8, green: u8, blue: u8) -> u8 {
    let weighted = 299 * u32::from(red) + 587 * u32::from(green) + 114 * u32::from(blue);
    ((weighted + 500) / 1000) as u8
}

fn auto_contrast(samples: &mut [u8], layout: Layout, cutoff_percent: f64) {
    for channel in 0..layout.channels {
        let mut histogram = [0u64; 256];
        for value in samples.iter().skip(channel).step_by(layout.channels) {
            histogram[usize::from(*value)] += 1;
        }
        let Some(table) = stretch_table(&mut histogram, layout.pixel_count(), cutoff_percent)
        else {
            continue;
        };
        for value in samples.iter_mut().skip(channel).step_by(layout.channels) {
            *value = table[usize::from(*value)];
        }
    }
}

fn stretch_table(
    histogram: &mut [u64; 256],
    pixels: usize,
    cutoff_percent: f64,
) -> Option<[u8; 256]> {
    let cutoff = if cutoff_percent.is_finite() {
        cutoff_percent.clamp(0.0, 50.0)
    } else {
        0.0
    };
    let cut = (pixels as f64 * cutoff / 100.0).floor() as u64;
    trim_bins(histogram.iter_mut(), cut);
    trim_bins(histogram.iter_mut().rev(), cut);

    let lo = histogram.iter().position(|count| *count > 0)?;
    let hi = histogram.iter().rposition(|count| *count > 0)?;
    if hi <= lo {
        return None;
    }
    let scale = 255.0 / (hi - lo) as f64;
    let mut table = [0u8; 256];
    for (value, slot) in table.iter_mut().enumerate() {
        *slot = to_u8((value as f64 - lo as f64) * scale);
    }
    Some(table)
}

fn trim_bins<'a>(bins: impl Iterator<Item = &'a mut u64>, mut cut: u64) {
    for bin in bins {
        if cut == 0 {
            break;
        }
        let removed = (*bin).min(cut);
        *bin -= removed;
        cut -= removed;
    }
}

fn invert(samples: &mut [u8]) {
    for value in samples.iter_mut() {
        *value = 255 - *value;
    }
}

fn mean_luminance(samples: &[u8], layout: Layout) -> f64 {
    let pixels = layout.pixel_count();
    if pixels == 0 {
        return 0.0;
    }
    let total: u64 = if layout.channels == 1 {
        samples.iter().map(|value| u64::from(*value)).sum()
    } else {
        samples
            .chunks_exact(layout.channels)
            .map(|pixel| u64::from(luma(pixel[0], pixel[1], pixel[2])))
            .sum()
    };
    total as f64 / pixels as f64
}

fn contrast(samples: &mut [u8], layout: Layout, factor: f64) {
    let mean = mean_luminance(samples, layout).round();
    for value in samples.iter_mut() {
        *value = to_u8(mean + factor * (f64::from(*value) - mean));
    }
}

fn brightness(samples: &mut [u8], factor: f64) {
    for value in samples.iter_mut() {
        *value = to_u8(f64::from(*value) * factor);
    }
}

fn sharpness(samples: &mut [u8], layout: Layout, factor: f64) {
    let smooth = convolve(samples, layout, SMOOTH);
    for (value, blurred) in samples.iter_mut().zip(smooth) {
        let blurred = f64::from(blurred);
        *value = to_u8(blurred + factor * (f64::from(*value) - blurred));
    }
}

fn filter(samples: &mut [u8], layout: Layout, kernel: Kernel) {
    let filtered = convolve(samples, layout, kernel);
    samples.copy_from_slice(&filtered);
}

// Border pixels keep their source values.
fn convolve(samples: &[u8], layout: Layout, kernel: Kernel) -> Vec<u8> {
    let mut out = samples.to_vec();
    if layout.width < 3 || layout.height < 3 {
        return out;
    }
    let stride = layout.stride();
    let channels = layout.channels;
    for y in 1..layout.height - 1 {
        for x in 1..layout.width - 1 {
            for channel in 0..channels {
                let mut acc: i32 = 0;
                for (tap, weight) in kernel.weights.iter().enumerate() {
                    let sy = y + tap / 3 - 1;
                    let sx = x + tap % 3 - 1;
                    acc += weight * i32::from(samples[sy * stride + sx * channels + channel]);
                }
                out[y * stride + x * channels + channel] = to_u8(f64::from(acc) / kernel.scale);
            }
        }
    }
    out
}

fn grayscale(samples: &mut [u8]) {
    for pixel in samples.chunks_exact_mut(3) {
        let value = luma(pixel[0], pixel[1], pixel[2]);
        pixel.fill(value);
    }
}

fn median_filter(samples: &mut [u8], layout: Layout, size: u32) {
    let size = (size.max(1) as usize) | 1;
    if size == 1 || layout.pixel_count() == 0 {
        return;
    }
    let radius = size / 2;
    let source = samples.to_vec();
    let stride = layout.stride();
    let channels = layout.channels;
    let mut window: Vec<u8> = Vec::with_capacity(size * size);
    for y in 0..layout.height {
        for x in 0..layout.width {
            for channel in 0..channels {
                window.clear();
                for wy in 0..size {
                    let sy = (y + wy).saturating_sub(radius).min(layout.height - 1);
                    for wx in 0..size {
                        let sx = (x + wx).saturating_sub(radius).min(layout.width - 1);
                        window.push(source[sy * stride + sx * channels + channel]);
                    }
                }
                let mid = window.len() / 2;
                let (_, median, _) = window.select_nth_unstable(mid);
                samples[y * stride + x * channels + channel] = *median;
            }
        }
    }
}
