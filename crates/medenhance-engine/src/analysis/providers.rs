use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use medenhance_contracts::providers::{NamedProvider, ProviderRegistry};
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response as HttpResponse};
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};

use super::config::{AnalysisConfig, BedrockConfig, GroqConfig};
use super::prompt::PromptContext;
use crate::error::{truncate_text, PipelineError};

pub const GROQ_PROVIDER: &str = "groq";
pub const BEDROCK_PROVIDER: &str = "bedrock";
pub const DRYRUN_PROVIDER: &str = "dryrun";

const GROQ_TEMPERATURE: f64 = 0.3;
const GROQ_MAX_TOKENS: u64 = 1500;
const TITAN_TEMPERATURE: f64 = 0.4;
const TITAN_TOP_P: f64 = 0.9;
const TITAN_MAX_TOKENS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReply {
    pub text: String,
    pub model: Option<String>,
}

/// A text-generation backend that can write the enhancement report.
///
/// `try_analyze` blocks for at most about `timeout`; the chain enforces the
/// bound independently, so implementations only need a best effort.
pub trait TextAnalysisProvider: NamedProvider + Send + Sync {
    fn try_analyze(&self, context: &PromptContext, timeout: Duration) -> Result<ProviderReply>;
}

pub type SharedProvider = Arc<dyn TextAnalysisProvider>;

/// Groq (primary) then Bedrock Titan (backup).
pub fn default_providers(config: &AnalysisConfig) -> ProviderRegistry<SharedProvider> {
    ProviderRegistry::new(vec![
        Arc::new(GroqProvider::new(config.groq.clone())) as SharedProvider,
        Arc::new(BedrockTitanProvider::new(config.bedrock.clone())) as SharedProvider,
    ])
}

pub fn provider_by_name(name: &str, config: &AnalysisConfig) -> Option<SharedProvider> {
    match name.trim().to_ascii_lowercase().as_str() {
        GROQ_PROVIDER => Some(Arc::new(GroqProvider::new(config.groq.clone()))),
        BEDROCK_PROVIDER => Some(Arc::new(BedrockTitanProvider::new(config.bedrock.clone()))),
        DRYRUN_PROVIDER => Some(Arc::new(DryrunProvider)),
        _ => None,
    }
}

pub struct GroqProvider {
    config: GroqConfig,
}

impl GroqProvider {
    pub fn new(config: GroqConfig) -> Self {
        Self { config }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'))
    }

    fn build_payload(&self, context: &PromptContext) -> Value {
        json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": context.system_prompt()},
                {"role": "user", "content": context.user_prompt()},
            ],
            "temperature": GROQ_TEMPERATURE,
            "max_tokens": GROQ_MAX_TOKENS,
        })
    }

    fn extract_text(payload: &Value) -> Option<String> {
        payload
            .get("choices")?
            .as_array()?
            .first()?
            .get("message")?
            .get("content")?
            .as_str()
            .map(str::to_string)
    }
}

impl NamedProvider for GroqProvider {
    fn name(&self) -> &str {
        GROQ_PROVIDER
    }
}

impl TextAnalysisProvider for GroqProvider {
    fn try_analyze(&self, context: &PromptContext, timeout: Duration) -> Result<ProviderReply> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            bail!(PipelineError::provider("GROQ_API_KEY not set"));
        };
        let client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("failed to build Groq HTTP client")?;
        let request = client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .header(CONTENT_TYPE, "application/json")
            .json(&self.build_payload(context));
        let payload = send_json(GROQ_PROVIDER, request)?;
        let text = Self::extract_text(&payload).unwrap_or_default();
        let model = payload
            .get("model")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(self.config.model.clone()));
        Ok(ProviderReply { text, model })
    }
}

/// Amazon Titan text models on Bedrock, authenticated with a Bedrock API
/// key sent as a bearer token.
pub struct BedrockTitanProvider {
    config: BedrockConfig,
}

impl BedrockTitanProvider {
    pub fn new(config: BedrockConfig) -> Self {
        Self { config }
    }

    fn endpoint(&self) -> String {
        let base = self.config.endpoint.clone().unwrap_or_else(|| {
            format!(
                "https://bedrock-runtime.{}.amazonaws.com",
                self.config.region.trim()
            )
        });
        format!(
            "{}/model/{}/invoke",
            base.trim_end_matches('/'),
            self.config.model_id.trim()
        )
    }

    fn build_payload(context: &PromptContext) -> Value {
        json!({
            "inputText": format!("{}\n\n{}", context.system_prompt(), context.user_prompt()),
            "textGenerationConfig": {
                "maxTokenCount": TITAN_MAX_TOKENS,
                "temperature": TITAN_TEMPERATURE,
                "topP": TITAN_TOP_P,
            },
        })
    }

    fn extract_text(payload: &Value) -> Option<String> {
        payload
            .get("results")?
            .as_array()?
            .first()?
            .get("outputText")?
            .as_str()
            .map(str::to_string)
    }
}

impl NamedProvider for BedrockTitanProvider {
    fn name(&self) -> &str {
        BEDROCK_PROVIDER
    }
}

impl TextAnalysisProvider for BedrockTitanProvider {
    fn try_analyze(&self, context: &PromptContext, timeout: Duration) -> Result<ProviderReply> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            bail!(PipelineError::provider("AWS_BEARER_TOKEN_BEDROCK not set"));
        };
        let client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("failed to build Bedrock HTTP client")?;
        let request = client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .header(CONTENT_TYPE, "application/json")
            .header("Accept", "application/json")
            .json(&Self::build_payload(context));
        let payload = send_json(BEDROCK_PROVIDER, request)?;
        Ok(ProviderReply {
            text: Self::extract_text(&payload).unwrap_or_default(),
            model: Some(self.config.model_id.clone()),
        })
    }
}

/// Offline provider with a fixed report. Only used when selected by name.
pub struct DryrunProvider;

impl NamedProvider for DryrunProvider {
    fn name(&self) -> &str {
        DRYRUN_PROVIDER
    }
}

impl TextAnalysisProvider for DryrunProvider {
    fn try_analyze(&self, context: &PromptContext, _timeout: Duration) -> Result<ProviderReply> {
        let label = context.modality.label();
        let chain = if context.image_supplied {
            context.chain_text()
        } else {
            "none (no image supplied)".to_string()
        };
        let mut text = format!(
            "Dry-run enhancement report for {label} imaging.\n\n\
1. Image quality assessment: not evaluated (offline provider).\n\
2. Enhancement chain applied: {chain}.\n\
3. No technical adjustments proposed."
        );
        if context.expect_structured {
            text.push_str(
                "\n\n{\"quality_score\": null, \"recommendations\": [\"Review the enhanced image manually.\"]}",
            );
        }
        Ok(ProviderReply {
            text,
            model: Some(DRYRUN_PROVIDER.to_string()),
        })
    }
}

fn send_json(provider: &str, request: RequestBuilder) -> Result<Value> {
    let response = match request.send() {
        Ok(response) => response,
        Err(err) if err.is_timeout() => {
            bail!(PipelineError::provider_timeout(format!(
                "{provider} request timed out: {err}"
            )));
        }
        Err(err) => {
            bail!(PipelineError::provider(format!(
                "{provider} request failed: {err}"
            )));
        }
    };
    response_json_or_error(provider, response)
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(PipelineError::provider(format!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        )));
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}
