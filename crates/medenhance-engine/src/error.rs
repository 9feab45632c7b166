use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    ImageDecode,
    /// Recorded when a modality falls back to the generic profile. Never
    /// returned to callers.
    UnsupportedModality,
    ProviderTimeout,
    Provider,
    MetricComputation,
    MalformedRequest,
}

impl PipelineErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ImageDecode => "image_decode",
            Self::UnsupportedModality => "unsupported_modality",
            Self::ProviderTimeout => "provider_timeout",
            Self::Provider => "provider",
            Self::MetricComputation => "metric_computation",
            Self::MalformedRequest => "malformed_request",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineError {
    kind: PipelineErrorKind,
    message: String,
}

impl PipelineError {
    pub fn new(kind: PipelineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn image_decode(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::ImageDecode, message)
    }

    pub fn provider_timeout(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::ProviderTimeout, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::Provider, message)
    }

    pub fn metric_computation(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::MetricComputation, message)
    }

    pub fn malformed_request(message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::MalformedRequest, message)
    }

    pub fn kind(&self) -> PipelineErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// First `PipelineError` kind found anywhere in an anyhow chain.
    pub fn kind_of(err: &anyhow::Error) -> Option<PipelineErrorKind> {
        if let Some(found) = err.downcast_ref::<PipelineError>() {
            return Some(found.kind);
        }
        err.chain()
            .find_map(|cause| cause.downcast_ref::<PipelineError>())
            .map(PipelineError::kind)
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for PipelineError {}

pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::{error_chain_text, truncate_text, PipelineError, PipelineErrorKind};

    #[test]
    fn kind_survives_anyhow_context() {
        let err = Err::<(), _>(PipelineError::image_decode("not a PNG"))
            .context("decoding upload")
            .unwrap_err();
        assert_eq!(
            PipelineError::kind_of(&err),
            Some(PipelineErrorKind::ImageDecode)
        );
        assert_eq!(
            error_chain_text(&err, 200),
            "decoding upload | caused by: image_decode error: not a PNG"
        );
        assert_eq!(PipelineError::kind_of(&anyhow::anyhow!("plain")), None);
    }

    #[test]
    fn truncate_text_marks_cut() {
        assert_eq!(truncate_text("abcdef", 3), "abc…");
        assert_eq!(truncate_text("abc", 3), "abc");
    }
}
