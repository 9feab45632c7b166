//! Shared data model for the medical image enhancement pipeline: modality
//! profiles, metrics, AI analysis payloads, request/result types and the
//! on-disk formats (event log, result records, batch summaries).

pub mod analysis;
pub mod events;
pub mod metrics;
pub mod modality;
pub mod providers;
pub mod request;
pub mod result;
pub mod runs;
