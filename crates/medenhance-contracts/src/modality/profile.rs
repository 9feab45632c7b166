use serde::{Deserialize, Serialize};

use super::tag::ModalityTag;

/// Sharpness gain declared for the strong edge-enhance kernel.
const EDGE_ENHANCE_STRONG_PERCENT: f64 = 60.0;
const EDGE_ENHANCE_PERCENT: f64 = 30.0;

/// One deterministic image operation. Factors follow the usual enhancer
/// convention: `1.0` leaves the image unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransformStep {
    AutoContrast { cutoff_percent: f64 },
    Invert,
    Contrast { factor: f64 },
    Sharpness { factor: f64 },
    SharpenFilter,
    Grayscale,
    EdgeEnhance { strong: bool },
    Brightness { factor: f64 },
    MedianFilter { size: u32 },
}

impl TransformStep {
    pub fn label(&self) -> String {
        match self {
            Self::AutoContrast { cutoff_percent } => {
                format!("auto_contrast(cutoff={}%)", trim_float(*cutoff_percent))
            }
            Self::Invert => "invert".to_string(),
            Self::Contrast { factor } => format!("contrast(x{})", trim_float(*factor)),
            Self::Sharpness { factor } => format!("sharpness(x{})", trim_float(*factor)),
            Self::SharpenFilter => "sharpen_filter".to_string(),
            Self::Grayscale => "grayscale".to_string(),
            Self::EdgeEnhance { strong: true } => "edge_enhance(strong)".to_string(),
            Self::EdgeEnhance { strong: false } => "edge_enhance".to_string(),
            Self::Brightness { factor } => format!("brightness(x{})", trim_float(*factor)),
            Self::MedianFilter { size } => format!("median_filter(size={size})"),
        }
    }

    /// Steps that only make sense on color buffers.
    pub fn requires_color(&self) -> bool {
        matches!(self, Self::Grayscale)
    }

    pub fn declared_contrast_percent(&self) -> f64 {
        match self {
            Self::Contrast { factor } => (factor - 1.0) * 100.0,
            _ => 0.0,
        }
    }

    pub fn declared_sharpness_percent(&self) -> f64 {
        match self {
            Self::Sharpness { factor } => (factor - 1.0) * 100.0,
            Self::EdgeEnhance { strong: true } => EDGE_ENHANCE_STRONG_PERCENT,
            Self::EdgeEnhance { strong: false } => EDGE_ENHANCE_PERCENT,
            _ => 0.0,
        }
    }
}

/// Contrast and sharpness improvement percentages for a chain.
///
/// These are the sums of each step's *declared* effect, not a measurement
/// of the before/after buffers.
pub fn declared_improvements(steps: &[TransformStep]) -> (f64, f64) {
    let contrast: f64 = steps.iter().map(TransformStep::declared_contrast_percent).sum();
    let sharpness: f64 = steps
        .iter()
        .map(TransformStep::declared_sharpness_percent)
        .sum();
    (round2(contrast), round2(sharpness))
}

/// Metric values historically reported for a chain. Only used when real
/// computation is impossible.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NominalMetrics {
    pub psnr: f64,
    pub ssim: f64,
    pub contrast_improvement_percent: f64,
    pub sharpness_improvement_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalityProfile {
    pub tag: ModalityTag,
    pub name: String,
    pub description: String,
    pub steps: Vec<TransformStep>,
    pub nominal: NominalMetrics,
}

impl ModalityProfile {
    pub fn step_labels(&self) -> Vec<String> {
        self.steps.iter().map(TransformStep::label).collect()
    }

    pub fn chain_text(&self) -> String {
        self.step_labels().join(" -> ")
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn trim_float(value: f64) -> String {
    let text = format!("{value:.3}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
