pub mod chain;
pub mod config;
pub mod parse;
pub mod prompt;
pub mod providers;

pub use chain::AnalysisChain;
pub use config::{AnalysisConfig, BedrockConfig, GroqConfig};
pub use prompt::PromptContext;
pub use providers::{
    default_providers, provider_by_name, BedrockTitanProvider, DryrunProvider, GroqProvider,
    ProviderReply, SharedProvider, TextAnalysisProvider,
};
