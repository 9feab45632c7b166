use chrono::Utc;
use medenhance_contracts::analysis::AiAnalysis;
use medenhance_contracts::metrics::{Metrics, MetricsSource};
use medenhance_contracts::modality::ModalityProfile;
use medenhance_contracts::result::{EnhancementResult, ResultParts};

/// Assembles the final result. Without an enhanced image (or without
/// measured metrics) the profile's nominal metrics are reported; metrics
/// are always sanitized.
pub fn aggregate(
    profile: &ModalityProfile,
    enhanced_image: Option<Vec<u8>>,
    metrics: Option<Metrics>,
    analysis: Option<AiAnalysis>,
    warnings: Vec<String>,
    processing_ms: u64,
) -> EnhancementResult {
    let metrics = match (&enhanced_image, metrics) {
        (Some(_), Some(metrics)) => metrics,
        _ => Metrics::nominal(profile),
    }
    .sanitized(&profile.nominal);

    let transformed = enhanced_image.is_some() && metrics.source != MetricsSource::DecodeFallback;
    let applied_steps = if transformed {
        profile.step_labels()
    } else {
        Vec::new()
    };

    EnhancementResult::from(ResultParts {
        enhanced_image_bytes: enhanced_image,
        metrics,
        analysis,
        modality: profile.tag,
        applied_steps,
        warnings,
        generated_at: Utc::now(),
        processing_ms,
    })
}
