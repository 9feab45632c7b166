mod profile;
mod registry;
mod selectors;
mod tag;

pub use profile::{declared_improvements, ModalityProfile, NominalMetrics, TransformStep};
pub use registry::{resolve_profile, ProfileRegistry};
pub use selectors::ProfileSelection;
pub use tag::{ModalityTag, ALL_MODALITIES};
