//! Enhancement engine: per-modality transform chains, quality metrics, the
//! AI analysis provider chain and the `EnhancementPipeline` that ties them
//! together.

pub mod aggregate;
pub mod analysis;
pub mod error;
pub mod pipeline;
pub mod quality;
pub mod transforms;
pub mod transport;

pub use aggregate::aggregate;
pub use analysis::{AnalysisChain, AnalysisConfig, PromptContext, TextAnalysisProvider};
pub use error::{PipelineError, PipelineErrorKind};
pub use pipeline::EnhancementPipeline;
pub use quality::{compute_metrics, compute_metrics_or_nominal};
pub use transport::decode_base64_image;
