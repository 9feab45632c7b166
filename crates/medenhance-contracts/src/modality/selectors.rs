use super::profile::ModalityProfile;
use super::registry::ProfileRegistry;
use super::tag::ModalityTag;

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSelection<'a> {
    pub profile: &'a ModalityProfile,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

impl ProfileSelection<'_> {
    pub fn tag(&self) -> ModalityTag {
        self.profile.tag
    }
}

impl ProfileRegistry {
    /// Resolves a raw, free-form modality string. Never fails: unknown or
    /// missing tags pick the generic profile and say why.
    pub fn select(&self, requested: Option<&str>) -> ProfileSelection<'_> {
        let requested_text = requested
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        let Some(raw) = requested_text.as_deref() else {
            return ProfileSelection {
                profile: self.resolve(ModalityTag::Other),
                requested: None,
                fallback_reason: Some("No modality specified; using generic profile.".to_string()),
            };
        };
        match ModalityTag::recognize(Some(raw)) {
            Some(tag) if self.get(tag).is_some() => ProfileSelection {
                profile: self.resolve(tag),
                requested: requested_text.clone(),
                fallback_reason: None,
            },
            Some(tag) => ProfileSelection {
                profile: self.resolve(tag),
                requested: requested_text.clone(),
                fallback_reason: Some(format!(
                    "No profile registered for modality '{tag}'; using generic profile."
                )),
            },
            None => ProfileSelection {
                profile: self.resolve(ModalityTag::Other),
                requested: requested_text.clone(),
                fallback_reason: Some(format!(
                    "Unrecognized modality '{raw}'; using generic profile."
                )),
            },
        }
    }
}
