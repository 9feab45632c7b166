use serde::{Deserialize, Serialize};

use crate::modality::{ModalityProfile, NominalMetrics};

/// Stand-in for the infinite PSNR of identical buffers.
pub const PSNR_SENTINEL: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsSource {
    /// PSNR/SSIM measured from the original and enhanced buffers.
    Computed,
    /// Profile nominal values; nothing was measured.
    Nominal,
    /// The image could not be decoded and was passed through unchanged.
    DecodeFallback,
}

/// Quality metrics for one enhancement.
///
/// `contrast_improvement_percent` and `sharpness_improvement_percent` are
/// declared by the applied chain (see `declared_improvements`), never
/// measured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub psnr: f64,
    pub ssim: f64,
    pub contrast_improvement_percent: f64,
    pub sharpness_improvement_percent: f64,
    pub source: MetricsSource,
}

impl Metrics {
    pub fn nominal(profile: &ModalityProfile) -> Self {
        Self::from_nominal(&profile.nominal, MetricsSource::Nominal)
    }

    /// Original bytes passed through: nominal fidelity, zero improvement.
    pub fn decode_fallback(profile: &ModalityProfile) -> Self {
        Self {
            psnr: profile.nominal.psnr,
            ssim: profile.nominal.ssim,
            contrast_improvement_percent: 0.0,
            sharpness_improvement_percent: 0.0,
            source: MetricsSource::DecodeFallback,
        }
    }

    fn from_nominal(nominal: &NominalMetrics, source: MetricsSource) -> Self {
        Self {
            psnr: nominal.psnr,
            ssim: nominal.ssim,
            contrast_improvement_percent: nominal.contrast_improvement_percent,
            sharpness_improvement_percent: nominal.sharpness_improvement_percent,
            source,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.psnr.is_finite()
            && self.psnr >= 0.0
            && self.ssim.is_finite()
            && (0.0..=1.0).contains(&self.ssim)
            && self.contrast_improvement_percent.is_finite()
            && self.sharpness_improvement_percent.is_finite()
    }

    /// Enforces the metric invariants: non-finite values are replaced by the
    /// nominal ones, PSNR is clamped to `[0, PSNR_SENTINEL]` and SSIM to
    /// `[0, 1]`.
    pub fn sanitized(self, nominal: &NominalMetrics) -> Self {
        let pick = |value: f64, fallback: f64| if value.is_finite() { value } else { fallback };
        Self {
            psnr: pick(self.psnr, nominal.psnr).clamp(0.0, PSNR_SENTINEL),
            ssim: pick(self.ssim, nominal.ssim).clamp(0.0, 1.0),
            contrast_improvement_percent: pick(self.contrast_improvement_percent, 0.0),
            sharpness_improvement_percent: pick(self.sharpness_improvement_percent, 0.0),
            source: self.source,
        }
    }
}
