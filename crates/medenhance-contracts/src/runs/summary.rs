use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchItemStatus {
    Enhanced,
    Degraded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub input: String,
    pub status: BatchItemStatus,
    pub record: Option<String>,
    pub detail: Option<String>,
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub processing_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub session_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub items: Vec<BatchItem>,
}

impl BatchSummary {
    pub fn count(&self, status: BatchItemStatus) -> u64 {
        self.items.iter().filter(|item| item.status == status).count() as u64
    }
}

pub fn write_summary(
    path: &Path,
    summary: &BatchSummary,
    extra: Option<&Map<String, Value>>,
) -> anyhow::Result<()> {
    let mut payload = Map::new();
    payload.insert(
        "session_id".to_string(),
        Value::String(summary.session_id.clone()),
    );
    payload.insert(
        "started_at".to_string(),
        Value::String(summary.started_at.clone()),
    );
    payload.insert(
        "finished_at".to_string(),
        Value::String(summary.finished_at.clone()),
    );
    payload.insert(
        "total_requests".to_string(),
        Value::Number((summary.items.len() as u64).into()),
    );
    for status in [
        BatchItemStatus::Enhanced,
        BatchItemStatus::Degraded,
        BatchItemStatus::Failed,
    ] {
        let key = match status {
            BatchItemStatus::Enhanced => "enhanced",
            BatchItemStatus::Degraded => "degraded",
            BatchItemStatus::Failed => "failed",
        };
        payload.insert(key.to_string(), Value::Number(summary.count(status).into()));
    }
    payload.insert("items".to_string(), serde_json::to_value(&summary.items)?);
    payload.insert("ts".to_string(), Value::String(now_utc_iso()));
    if let Some(extra) = extra {
        for (key, value) in extra {
            payload.insert(key.clone(), value.clone());
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&Value::Object(payload))?)?;
    Ok(())
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
