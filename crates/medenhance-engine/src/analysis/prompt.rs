use medenhance_contracts::modality::{ModalityProfile, ModalityTag};
use medenhance_contracts::request::EnhancementRequest;

pub const SYSTEM_PROMPT: &str = "You are an expert medical imaging assistant specializing in radiology \
and diagnostic image enhancement. Give technical, accurate and concise insights.";

/// Inputs rendered into the report request sent to every provider.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptContext {
    pub modality: ModalityTag,
    pub patient_id: String,
    pub patient_name: String,
    pub chain_labels: Vec<String>,
    /// False for analysis-only requests; the chain was never run.
    pub image_supplied: bool,
    pub expect_structured: bool,
}

impl PromptContext {
    pub fn for_request(request: &EnhancementRequest, profile: &ModalityProfile) -> Self {
        Self {
            modality: profile.tag,
            patient_id: request.patient_id.clone(),
            patient_name: request.patient_name.clone(),
            chain_labels: profile.step_labels(),
            image_supplied: request.has_image(),
            expect_structured: request.options.expect_structured,
        }
    }

    pub fn chain_text(&self) -> String {
        if self.chain_labels.is_empty() {
            return "none".to_string();
        }
        self.chain_labels.join(" -> ")
    }

    pub fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    pub fn user_prompt(&self) -> String {
        let label = self.modality.label();
        let patient_name = display_or(&self.patient_name, "unknown");
        let patient_id = display_or(&self.patient_id, "n/a");
        let processing = if self.image_supplied {
            format!("Enhancement chain applied: {}", self.chain_text())
        } else {
            "No image was supplied; base the report on the modality alone.".to_string()
        };
        let mut prompt = format!(
            "Review this {label} image as a radiologist and write an enhancement report.\n\n\
Patient: {patient_name} (ID: {patient_id})\n\
Modality: {label}\n\
{processing}\n\n\
Cover, in order:\n\
1. Image quality assessment (score 0-100)\n\
2. Key areas that still need enhancement for {label} reading\n\
3. Recommended technical adjustments: contrast (%), brightness/exposure (%), sharpening intensity, noise reduction level\n\
4. Expected diagnostic improvements\n\
5. Clinical value of the enhancement\n\n\
Format it as a clear, professional radiology report."
        );
        if self.expect_structured {
            prompt.push_str(
                "\n\nEnd the report with one JSON object on its own lines, shaped as \
{\"quality_score\": <0-100>, \"recommendations\": [\"...\"]}.",
            );
        }
        prompt
    }
}

fn display_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback
    } else {
        trimmed
    }
}
