use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::modality::ModalityTag;

pub const FALLBACK_PROVIDER_NAME: &str = "fallback";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Ok,
    Timeout,
    Error,
    Empty,
    ParseFailure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderAttempt {
    pub provider: String,
    pub outcome: AttemptOutcome,
    pub detail: Option<String>,
    pub elapsed_ms: u64,
}

/// Text analysis attached to an enhancement result. `succeeded == false`
/// marks the synthesized degraded-mode analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysis {
    pub provider_name: String,
    pub raw_text: String,
    pub structured: Option<Value>,
    pub succeeded: bool,
    pub model: Option<String>,
    #[serde(default)]
    pub attempts: Vec<ProviderAttempt>,
}

impl AiAnalysis {
    pub fn degraded(
        modality: ModalityTag,
        chain_text: &str,
        attempts: Vec<ProviderAttempt>,
    ) -> Self {
        Self {
            provider_name: FALLBACK_PROVIDER_NAME.to_string(),
            raw_text: degraded_analysis_text(modality, chain_text),
            structured: None,
            succeeded: false,
            model: None,
            attempts,
        }
    }

    pub fn quality_score(&self) -> Option<f64> {
        let structured = self.structured.as_ref()?;
        let object = match structured {
            Value::Array(rows) => rows.iter().find_map(Value::as_object)?,
            Value::Object(object) => object,
            _ => return None,
        };
        object
            .get("quality_score")
            .and_then(|value| match value {
                Value::Number(number) => number.as_f64(),
                Value::String(text) => text.trim().parse::<f64>().ok(),
                _ => None,
            })
            .filter(|score| score.is_finite())
    }

    pub fn recommendations(&self) -> Vec<String> {
        let rows = match self.structured.as_ref() {
            Some(Value::Object(object)) => object
                .get("recommendations")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            Some(Value::Array(rows)) => rows.clone(),
            _ => Vec::new(),
        };
        rows.iter()
            .filter_map(|row| match row {
                Value::String(text) => Some(text.trim().to_string()),
                Value::Object(object) => object
                    .get("recommendation")
                    .or_else(|| object.get("text"))
                    .and_then(Value::as_str)
                    .map(|text| text.trim().to_string()),
                _ => None,
            })
            .filter(|text| !text.is_empty())
            .collect()
    }
}

/// Fixed degraded-mode text used when every provider failed.
pub fn degraded_analysis_text(modality: ModalityTag, chain_text: &str) -> String {
    let label = modality.label();
    format!(
        "AI analysis unavailable for {label} imaging (degraded mode).\n\n\
All configured text-generation providers failed or timed out.\n\
Applied enhancement chain: {chain_text}.\n\
Review the enhanced image manually before clinical use."
    )
}
