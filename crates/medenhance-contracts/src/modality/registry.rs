use std::sync::OnceLock;

use indexmap::IndexMap;

use super::profile::{ModalityProfile, NominalMetrics, TransformStep};
use super::tag::ModalityTag;

static DEFAULT_REGISTRY: OnceLock<ProfileRegistry> = OnceLock::new();

/// Read-only table of modality profiles, keyed by tag in declaration order.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: IndexMap<ModalityTag, ModalityProfile>,
    fallback: ModalityProfile,
}

impl ProfileRegistry {
    /// Builds a registry from `profiles`, or the built-in table when `None`.
    /// An `OTHER` entry is always present so resolution stays total.
    pub fn new(profiles: Option<IndexMap<ModalityTag, ModalityProfile>>) -> Self {
        let mut profiles = profiles.unwrap_or_else(default_profiles);
        let fallback = match profiles.get(&ModalityTag::Other) {
            Some(profile) => profile.clone(),
            None => {
                let profile = default_other_profile();
                profiles.insert(ModalityTag::Other, profile.clone());
                profile
            }
        };
        Self { profiles, fallback }
    }

    /// Process-wide built-in registry, initialized on first use.
    pub fn global() -> &'static ProfileRegistry {
        DEFAULT_REGISTRY.get_or_init(|| ProfileRegistry::new(None))
    }

    pub fn get(&self, tag: ModalityTag) -> Option<&ModalityProfile> {
        self.profiles.get(&tag)
    }

    pub fn resolve(&self, tag: ModalityTag) -> &ModalityProfile {
        self.profiles.get(&tag).unwrap_or(&self.fallback)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModalityProfile> {
        self.profiles.values()
    }
}

pub fn resolve_profile(tag: ModalityTag) -> &'static ModalityProfile {
    ProfileRegistry::global().resolve(tag)
}

fn default_other_profile() -> ModalityProfile {
    ModalityProfile {
        tag: ModalityTag::Other,
        name: "General medical image".to_string(),
        description: "Generic contrast and sharpness boost".to_string(),
        steps: vec![
            TransformStep::AutoContrast {
                cutoff_percent: 2.0,
            },
            TransformStep::Contrast { factor: 1.3 },
            TransformStep::Sharpness { factor: 1.5 },
        ],
        nominal: NominalMetrics {
            psnr: 32.5,
            ssim: 0.88,
            contrast_improvement_percent: 30.0,
            sharpness_improvement_percent: 50.0,
        },
    }
}

fn default_profiles() -> IndexMap<ModalityTag, ModalityProfile> {
    let mut map = IndexMap::new();

    let mut insert = |tag: ModalityTag,
                      name: &str,
                      description: &str,
                      steps: Vec<TransformStep>,
                      nominal: (f64, f64, f64, f64)| {
        map.insert(
            tag,
            ModalityProfile {
                tag,
                name: name.to_string(),
                description: description.to_string(),
                steps,
                nominal: NominalMetrics {
                    psnr: nominal.0,
                    ssim: nominal.1,
                    contrast_improvement_percent: nominal.2,
                    sharpness_improvement_percent: nominal.3,
                },
            },
        );
    };

    insert(
        ModalityTag::XRay,
        "X-ray",
        "High contrast, inverted so bone reads bright, sharpened",
        vec![
            TransformStep::AutoContrast {
                cutoff_percent: 2.0,
            },
            TransformStep::Invert,
            TransformStep::Contrast { factor: 1.5 },
            TransformStep::Sharpness { factor: 2.0 },
            TransformStep::SharpenFilter,
        ],
        (35.2, 0.92, 50.0, 100.0),
    );
    insert(
        ModalityTag::Ct,
        "CT scan",
        "Grayscale-normalized, moderate contrast, strong edge enhancement",
        vec![
            TransformStep::Grayscale,
            TransformStep::AutoContrast {
                cutoff_percent: 1.0,
            },
            TransformStep::Contrast { factor: 1.4 },
            TransformStep::EdgeEnhance { strong: true },
            TransformStep::Brightness { factor: 1.1 },
        ],
        (36.8, 0.90, 40.0, 60.0),
    );
    insert(
        ModalityTag::Mri,
        "MRI",
        "Contrast boost, median denoise, brightness lift",
        vec![
            TransformStep::AutoContrast {
                cutoff_percent: 3.0,
            },
            TransformStep::Contrast { factor: 1.6 },
            TransformStep::MedianFilter { size: 3 },
            TransformStep::Brightness { factor: 1.15 },
            TransformStep::Sharpness { factor: 1.5 },
        ],
        (38.5, 0.94, 60.0, 50.0),
    );
    insert(
        ModalityTag::Ultrasound,
        "Ultrasound",
        "Speckle reduction before contrast enhancement",
        vec![
            TransformStep::MedianFilter { size: 5 },
            TransformStep::AutoContrast {
                cutoff_percent: 2.0,
            },
            TransformStep::Contrast { factor: 1.3 },
            TransformStep::Sharpness { factor: 1.4 },
        ],
        (33.5, 0.88, 30.0, 40.0),
    );
    insert(
        ModalityTag::Dxa,
        "DXA bone density",
        "Grayscale, high contrast, double sharpening",
        vec![
            TransformStep::Grayscale,
            TransformStep::AutoContrast {
                cutoff_percent: 1.0,
            },
            TransformStep::Contrast { factor: 1.7 },
            TransformStep::SharpenFilter,
            TransformStep::Sharpness { factor: 2.2 },
        ],
        (34.0, 0.91, 70.0, 120.0),
    );

    map.insert(ModalityTag::Other, default_other_profile());
    map
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::{resolve_profile, ProfileRegistry};
    use crate::modality::profile::{declared_improvements, TransformStep};
    use crate::modality::tag::{ModalityTag, ALL_MODALITIES};

    #[test]
    fn every_modality_resolves_to_its_own_profile() {
        for tag in ALL_MODALITIES {
            assert_eq!(resolve_profile(tag).tag, tag);
        }
        assert_eq!(ProfileRegistry::global().list().count(), ALL_MODALITIES.len());
    }

    #[test]
    fn xray_chain_order_is_fixed() {
        let profile = resolve_profile(ModalityTag::XRay);
        assert_eq!(
            profile.steps,
            vec![
                TransformStep::AutoContrast {
                    cutoff_percent: 2.0
                },
                TransformStep::Invert,
                TransformStep::Contrast { factor: 1.5 },
                TransformStep::Sharpness { factor: 2.0 },
                TransformStep::SharpenFilter,
            ]
        );
    }

    #[test]
    fn nominal_improvements_match_declared_chain_effects() {
        for profile in ProfileRegistry::global().list() {
            let (contrast, sharpness) = declared_improvements(&profile.steps);
            assert_eq!(
                contrast, profile.nominal.contrast_improvement_percent,
                "{}",
                profile.tag
            );
            assert_eq!(
                sharpness, profile.nominal.sharpness_improvement_percent,
                "{}",
                profile.tag
            );
        }
    }

    #[test]
    fn nominal_psnr_and_ssim_follow_table() {
        let mri = resolve_profile(ModalityTag::Mri);
        assert_eq!((mri.nominal.psnr, mri.nominal.ssim), (38.5, 0.94));
        let other = resolve_profile(ModalityTag::Other);
        assert_eq!((other.nominal.psnr, other.nominal.ssim), (32.5, 0.88));
    }

    #[test]
    fn custom_registry_without_other_still_resolves() {
        let registry = ProfileRegistry::new(Some(IndexMap::new()));
        assert_eq!(registry.resolve(ModalityTag::Ct).tag, ModalityTag::Other);
        assert!(registry.get(ModalityTag::Ct).is_none());
        assert_eq!(registry.list().count(), 1);
    }
}
