use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::error::PipelineError;

/// Decodes a base64 image payload as sent by upload forms. Accepts a
/// `data:<mime>;base64,` prefix and embedded whitespace or line breaks.
pub fn decode_base64_image(payload: &str) -> Result<Vec<u8>, PipelineError> {
    let trimmed = payload.trim();
    let body = match trimmed.split_once(',') {
        Some((header, body)) if header.starts_with("data:") => body,
        _ => trimmed,
    };
    let compact: String = body.chars().filter(|ch| !ch.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(PipelineError::image_decode("base64 image payload is empty"));
    }
    BASE64
        .decode(compact.as_bytes())
        .map_err(|err| PipelineError::image_decode(format!("invalid base64 image payload: {err}")))
}

pub fn encode_base64_image(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub fn png_data_url(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", encode_base64_image(bytes))
}
