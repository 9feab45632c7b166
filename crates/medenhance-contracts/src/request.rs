use serde::{Deserialize, Serialize};

use crate::modality::ModalityTag;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementOptions {
    #[serde(default = "default_use_ai_analysis")]
    pub use_ai_analysis: bool,
    /// Treat a reply without an embedded JSON structure as a provider failure.
    #[serde(default)]
    pub expect_structured: bool,
}

impl Default for EnhancementOptions {
    fn default() -> Self {
        Self {
            use_ai_analysis: default_use_ai_analysis(),
            expect_structured: false,
        }
    }
}

fn default_use_ai_analysis() -> bool {
    true
}

/// One enhancement request, after any transport encoding was removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementRequest {
    pub patient_id: String,
    pub patient_name: String,
    /// Free-form modality string as received; normalized on use.
    pub modality: Option<String>,
    #[serde(skip)]
    pub image_bytes: Option<Vec<u8>>,
    #[serde(default)]
    pub options: EnhancementOptions,
}

impl EnhancementRequest {
    pub fn new(patient_id: impl Into<String>, patient_name: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            patient_name: patient_name.into(),
            modality: None,
            image_bytes: None,
            options: EnhancementOptions::default(),
        }
    }

    pub fn with_modality(mut self, modality: impl Into<String>) -> Self {
        self.modality = Some(modality.into());
        self
    }

    pub fn with_image(mut self, bytes: Vec<u8>) -> Self {
        self.image_bytes = Some(bytes);
        self
    }

    pub fn with_options(mut self, options: EnhancementOptions) -> Self {
        self.options = options;
        self
    }

    pub fn modality_tag(&self) -> ModalityTag {
        ModalityTag::parse(self.modality.as_deref())
    }

    pub fn has_modality(&self) -> bool {
        self.modality
            .as_deref()
            .map(|value| !value.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn has_image(&self) -> bool {
        self.image_bytes
            .as_ref()
            .map(|bytes| !bytes.is_empty())
            .unwrap_or(false)
    }

    /// A request with no modality, no image and AI analysis disabled has
    /// nothing to do.
    pub fn is_actionable(&self) -> bool {
        self.has_modality() || self.has_image() || self.options.use_ai_analysis
    }
}

#[cfg(test)]
mod tests {
    use super::{EnhancementOptions, EnhancementRequest};
    use crate::modality::ModalityTag;

    #[test]
    fn options_default_to_ai_analysis_on() -> anyhow::Result<()> {
        assert!(EnhancementOptions::default().use_ai_analysis);
        let decoded: EnhancementOptions = serde_json::from_str("{}")?;
        assert_eq!(decoded, EnhancementOptions::default());
        Ok(())
    }

    #[test]
    fn modality_tag_normalizes_raw_string() {
        let request = EnhancementRequest::new("p-1", "Jane Roe").with_modality("X-Ray");
        assert_eq!(request.modality_tag(), ModalityTag::XRay);
        assert_eq!(
            EnhancementRequest::new("p-1", "Jane Roe").modality_tag(),
            ModalityTag::Other
        );
    }

    #[test]
    fn request_without_anything_to_do_is_not_actionable() {
        let request = EnhancementRequest::new("p-1", "Jane Roe")
            .with_modality("  ")
            .with_image(Vec::new())
            .with_options(EnhancementOptions {
                use_ai_analysis: false,
                expect_structured: false,
            });
        assert!(!request.is_actionable());
        assert!(request.clone().with_modality("ct").is_actionable());
        assert!(request.with_image(vec![1, 2, 3]).is_actionable());
    }
}
