use std::env;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.1-70b-versatile";
pub const DEFAULT_BEDROCK_REGION: &str = "us-east-1";
pub const DEFAULT_BEDROCK_MODEL_ID: &str = "amazon.titan-text-express-v1";

#[derive(Clone, PartialEq, Eq)]
pub struct GroqConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_GROQ_API_BASE.to_string(),
            api_key: None,
            model: DEFAULT_GROQ_MODEL.to_string(),
        }
    }
}

impl fmt::Debug for GroqConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroqConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &redacted(&self.api_key))
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct BedrockConfig {
    pub region: String,
    pub model_id: String,
    pub api_key: Option<String>,
    /// Overrides the regional runtime endpoint, e.g. for a VPC endpoint.
    pub endpoint: Option<String>,
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_BEDROCK_REGION.to_string(),
            model_id: DEFAULT_BEDROCK_MODEL_ID.to_string(),
            api_key: None,
            endpoint: None,
        }
    }
}

impl fmt::Debug for BedrockConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BedrockConfig")
            .field("region", &self.region)
            .field("model_id", &self.model_id)
            .field("api_key", &redacted(&self.api_key))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Everything the analysis chain needs to reach its providers. Build it
/// explicitly in tests and embedders; `from_env` is for the binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    pub timeout: Duration,
    pub groq: GroqConfig,
    pub bedrock: BedrockConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PROVIDER_TIMEOUT,
            groq: GroqConfig::default(),
            bedrock: BedrockConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(non_empty_env)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let timeout = lookup("MEDENHANCE_PROVIDER_TIMEOUT_SECS")
            .and_then(|raw| raw.parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or(defaults.timeout);
        Self {
            timeout,
            groq: GroqConfig {
                api_base: lookup("GROQ_API_BASE")
                    .map(|base| base.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.groq.api_base),
                api_key: lookup("GROQ_API_KEY"),
                model: lookup("GROQ_MODEL").unwrap_or(defaults.groq.model),
            },
            bedrock: BedrockConfig {
                region: lookup("AWS_REGION")
                    .or_else(|| lookup("AWS_DEFAULT_REGION"))
                    .unwrap_or(defaults.bedrock.region),
                model_id: lookup("BEDROCK_MODEL_ID").unwrap_or(defaults.bedrock.model_id),
                api_key: lookup("AWS_BEARER_TOKEN_BEDROCK"),
                endpoint: lookup("BEDROCK_ENDPOINT")
                    .map(|endpoint| endpoint.trim_end_matches('/').to_string()),
            },
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn redacted(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "<set>"
    } else {
        "<unset>"
    }
}
