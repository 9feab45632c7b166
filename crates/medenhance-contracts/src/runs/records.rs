use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::analysis::AiAnalysis;
use crate::metrics::Metrics;
use crate::modality::ModalityTag;
use crate::request::EnhancementRequest;
use crate::result::EnhancementResult;

pub const RECORD_SCHEMA_VERSION: u64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedImageRef {
    pub path: Option<String>,
    pub sha256: String,
    pub byte_len: u64,
}

/// Persisted form of an `EnhancementResult`, handed to the storage layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub schema_version: u64,
    pub patient_id: String,
    pub patient_name: String,
    pub modality: ModalityTag,
    pub generated_at: DateTime<Utc>,
    pub metrics: Metrics,
    pub analysis: Option<AiAnalysis>,
    #[serde(default)]
    pub applied_steps: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub processing_ms: u64,
    pub enhanced_image: Option<EnhancedImageRef>,
}

pub fn build_record(
    request: &EnhancementRequest,
    result: &EnhancementResult,
    image_path: Option<&Path>,
) -> ResultRecord {
    let enhanced_image = result.enhanced_image_bytes().map(|bytes| EnhancedImageRef {
        path: image_path.map(|path| path.to_string_lossy().to_string()),
        sha256: sha256_hex(bytes),
        byte_len: bytes.len() as u64,
    });
    ResultRecord {
        schema_version: RECORD_SCHEMA_VERSION,
        patient_id: request.patient_id.clone(),
        patient_name: request.patient_name.clone(),
        modality: result.modality(),
        generated_at: result.generated_at(),
        metrics: *result.metrics(),
        analysis: result.analysis().cloned(),
        applied_steps: result.applied_steps().to_vec(),
        warnings: result.warnings().to_vec(),
        quality_score: result.analysis().and_then(AiAnalysis::quality_score),
        recommendations: result
            .analysis()
            .map(AiAnalysis::recommendations)
            .unwrap_or_default(),
        processing_ms: result.processing_ms(),
        enhanced_image,
    }
}

pub fn write_record(path: &Path, record: &ResultRecord) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(record)?)
        .with_context(|| format!("failed writing {}", path.display()))?;
    Ok(())
}

pub fn load_record(path: &Path) -> anyhow::Result<ResultRecord> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    let record: ResultRecord = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a result record", path.display()))?;
    Ok(record)
}

/// Metrics as the compact JSON string stored next to an image row.
pub fn encode_metrics(metrics: &Metrics) -> anyhow::Result<String> {
    Ok(serde_json::to_string(metrics)?)
}

pub fn decode_metrics(raw: &str) -> anyhow::Result<Metrics> {
    serde_json::from_str(raw).context("invalid metrics payload")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
