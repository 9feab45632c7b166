use chrono::{DateTime, Utc};

use crate::analysis::AiAnalysis;
use crate::metrics::Metrics;
use crate::modality::ModalityTag;

/// Fields of an `EnhancementResult`, assembled by the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultParts {
    pub enhanced_image_bytes: Option<Vec<u8>>,
    pub metrics: Metrics,
    pub analysis: Option<AiAnalysis>,
    pub modality: ModalityTag,
    pub applied_steps: Vec<String>,
    pub warnings: Vec<String>,
    pub generated_at: DateTime<Utc>,
    pub processing_ms: u64,
}

/// Outcome of one request. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancementResult {
    parts: ResultParts,
}

impl From<ResultParts> for EnhancementResult {
    fn from(parts: ResultParts) -> Self {
        Self { parts }
    }
}

impl EnhancementResult {
    /// PNG-encoded enhanced image; `None` in analysis-only mode.
    pub fn enhanced_image_bytes(&self) -> Option<&[u8]> {
        self.parts.enhanced_image_bytes.as_deref()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.parts.metrics
    }

    pub fn analysis(&self) -> Option<&AiAnalysis> {
        self.parts.analysis.as_ref()
    }

    pub fn modality(&self) -> ModalityTag {
        self.parts.modality
    }

    pub fn applied_steps(&self) -> &[String] {
        &self.parts.applied_steps
    }

    pub fn warnings(&self) -> &[String] {
        &self.parts.warnings
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.parts.generated_at
    }

    /// Wall-clock time spent on the request, in milliseconds.
    pub fn processing_ms(&self) -> u64 {
        self.parts.processing_ms
    }

    /// True when some stage substituted a fallback value.
    pub fn is_degraded(&self) -> bool {
        !self.parts.warnings.is_empty()
            || self
                .parts
                .analysis
                .as_ref()
                .map(|analysis| !analysis.succeeded)
                .unwrap_or(false)
    }
}
