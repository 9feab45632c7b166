use std::time::Instant;

use anyhow::Result;
use medenhance_contracts::analysis::AiAnalysis;
use medenhance_contracts::events::{EventPayload, EventWriter};
use medenhance_contracts::metrics::Metrics;
use medenhance_contracts::modality::{ModalityProfile, ProfileRegistry};
use medenhance_contracts::request::EnhancementRequest;
use medenhance_contracts::result::EnhancementResult;
use serde_json::Value;

use crate::aggregate::aggregate;
use crate::analysis::{AnalysisChain, AnalysisConfig, PromptContext};
use crate::error::{PipelineError, PipelineErrorKind};
use crate::quality::compute_metrics_or_nominal;
use crate::transforms::{apply, decode, encode_png};

/// Runs one request end to end: profile selection, transform chain,
/// metrics, AI analysis and aggregation.
///
/// Shared by reference across threads; requests never touch each other's
/// buffers. The only hard error is a request with nothing to do.
#[derive(Clone)]
pub struct EnhancementPipeline {
    profiles: &'static ProfileRegistry,
    analysis: AnalysisChain,
    events: EventWriter,
}

struct ImageOutcome {
    bytes: Vec<u8>,
    metrics: Metrics,
}

impl EnhancementPipeline {
    pub fn new(analysis: AnalysisChain) -> Self {
        Self {
            profiles: ProfileRegistry::global(),
            analysis,
            events: EventWriter::disabled(),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(AnalysisChain::from_config(config))
    }

    /// Routes pipeline and provider-chain events to `events`.
    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.analysis = self.analysis.with_events(events.clone());
        self.events = events;
        self
    }

    pub fn analysis(&self) -> &AnalysisChain {
        &self.analysis
    }

    pub fn enhance(&self, request: &EnhancementRequest) -> Result<EnhancementResult> {
        if !request.is_actionable() {
            return Err(PipelineError::malformed_request(
                "request has no modality, no image and AI analysis disabled",
            )
            .into());
        }
        let started = Instant::now();

        let mut payload = EventPayload::new();
        payload.insert(
            "patient_id".to_string(),
            Value::String(request.patient_id.clone()),
        );
        payload.insert(
            "modality".to_string(),
            request
                .modality
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        payload.insert("has_image".to_string(), Value::Bool(request.has_image()));
        payload.insert(
            "use_ai_analysis".to_string(),
            Value::Bool(request.options.use_ai_analysis),
        );
        self.events.note("enhancement_started", payload);

        let mut warnings: Vec<String> = Vec::new();
        let selection = self.profiles.select(request.modality.as_deref());
        let profile = selection.profile;
        let mut payload = EventPayload::new();
        payload.insert(
            "modality".to_string(),
            Value::String(profile.tag.label().to_string()),
        );
        payload.insert("profile".to_string(), Value::String(profile.name.clone()));
        if let Some(reason) = selection.fallback_reason.as_deref() {
            payload.insert(
                "error_kind".to_string(),
                Value::String(PipelineErrorKind::UnsupportedModality.as_str().to_string()),
            );
            payload.insert("fallback_reason".to_string(), Value::String(reason.to_string()));
            if selection.requested.is_some() {
                warnings.push(reason.to_string());
            }
        }
        self.events.note("profile_selected", payload);

        let image = request
            .image_bytes
            .as_deref()
            .map(|bytes| self.enhance_image(bytes, profile, &mut warnings));

        let analysis = if request.options.use_ai_analysis {
            let analysis = self
                .analysis
                .analyze(&PromptContext::for_request(request, profile));
            if !analysis.succeeded {
                warnings.push(degraded_warning(&analysis));
            }
            Some(analysis)
        } else {
            None
        };

        let (enhanced_image, metrics) = match image {
            Some(outcome) => (Some(outcome.bytes), Some(outcome.metrics)),
            None => (None, None),
        };
        let result = aggregate(
            profile,
            enhanced_image,
            metrics,
            analysis,
            warnings,
            started.elapsed().as_millis() as u64,
        );

        let mut payload = EventPayload::new();
        payload.insert(
            "modality".to_string(),
            Value::String(result.modality().label().to_string()),
        );
        payload.insert(
            "metrics".to_string(),
            serde_json::to_value(result.metrics()).unwrap_or(Value::Null),
        );
        payload.insert(
            "provider".to_string(),
            result
                .analysis()
                .map(|analysis| Value::String(analysis.provider_name.clone()))
                .unwrap_or(Value::Null),
        );
        payload.insert("degraded".to_string(), Value::Bool(result.is_degraded()));
        payload.insert(
            "warnings".to_string(),
            Value::from(result.warnings().len() as u64),
        );
        payload.insert(
            "elapsed_ms".to_string(),
            Value::from(result.processing_ms()),
        );
        self.events.note("enhancement_finished", payload);
        Ok(result)
    }

    fn enhance_image(
        &self,
        bytes: &[u8],
        profile: &ModalityProfile,
        warnings: &mut Vec<String>,
    ) -> ImageOutcome {
        let original = match decode(bytes) {
            Ok(image) => image,
            Err(err) => return self.passthrough(bytes, profile, &err, warnings),
        };

        let enhanced = apply(&original, &profile.steps);
        let mut payload = EventPayload::new();
        payload.insert(
            "modality".to_string(),
            Value::String(profile.tag.label().to_string()),
        );
        payload.insert("steps".to_string(), Value::from(profile.step_labels()));
        payload.insert("width".to_string(), Value::from(enhanced.width()));
        payload.insert("height".to_string(), Value::from(enhanced.height()));
        self.events.note("transform_chain_applied", payload);

        let (metrics, metrics_error) = compute_metrics_or_nominal(&original, &enhanced, profile);
        let mut payload = EventPayload::new();
        match metrics_error {
            None => {
                payload.insert(
                    "metrics".to_string(),
                    serde_json::to_value(metrics).unwrap_or(Value::Null),
                );
                self.events.note("metrics_computed", payload);
            }
            Some(err) => {
                payload.insert(
                    "error_kind".to_string(),
                    Value::String(err.kind().as_str().to_string()),
                );
                payload.insert("error".to_string(), Value::String(err.to_string()));
                self.events.note("metrics_fallback", payload);
                warnings.push(format!(
                    "Quality metrics could not be computed ({}); nominal {} values reported.",
                    err.message(),
                    profile.tag.label()
                ));
            }
        }

        match encode_png(&enhanced) {
            Ok(bytes) => ImageOutcome { bytes, metrics },
            Err(err) => {
                let err = PipelineError::image_decode(format!("{err:#}"));
                self.passthrough(bytes, profile, &err, warnings)
            }
        }
    }

    fn passthrough(
        &self,
        bytes: &[u8],
        profile: &ModalityProfile,
        err: &PipelineError,
        warnings: &mut Vec<String>,
    ) -> ImageOutcome {
        let mut payload = EventPayload::new();
        payload.insert(
            "error_kind".to_string(),
            Value::String(err.kind().as_str().to_string()),
        );
        payload.insert("error".to_string(), Value::String(err.to_string()));
        payload.insert("byte_len".to_string(), Value::from(bytes.len() as u64));
        self.events.note("image_decode_failed", payload);
        warnings.push(format!(
            "Image could not be processed ({}); original bytes returned unmodified.",
            err.message()
        ));
        ImageOutcome {
            bytes: bytes.to_vec(),
            metrics: Metrics::decode_fallback(profile),
        }
    }
}

fn degraded_warning(analysis: &AiAnalysis) -> String {
    if analysis.attempts.is_empty() {
        return "AI analysis degraded: no text providers configured.".to_string();
    }
    let tried = analysis
        .attempts
        .iter()
        .map(|attempt| attempt.provider.as_str())
        .collect::<Vec<&str>>()
        .join(", ");
    format!("AI analysis degraded: all providers failed ({tried}).")
}
