use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModalityTag {
    XRay,
    Ct,
    Mri,
    Ultrasound,
    Dxa,
    Other,
}

pub const ALL_MODALITIES: [ModalityTag; 6] = [
    ModalityTag::XRay,
    ModalityTag::Ct,
    ModalityTag::Mri,
    ModalityTag::Ultrasound,
    ModalityTag::Dxa,
    ModalityTag::Other,
];

impl ModalityTag {
    /// Total parse: missing or unrecognized tags map to `Other`.
    pub fn parse(raw: Option<&str>) -> Self {
        Self::recognize(raw).unwrap_or(Self::Other)
    }

    /// Case-insensitive match that ignores separators, so `X-Ray`, `xray`
    /// and `x_ray` are the same tag. Returns `None` for unknown input.
    pub fn recognize(raw: Option<&str>) -> Option<Self> {
        let normalized = raw?
            .chars()
            .filter(|ch| ch.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "xray" => Some(Self::XRay),
            "ct" | "ctscan" => Some(Self::Ct),
            "mri" => Some(Self::Mri),
            "ultrasound" | "us" => Some(Self::Ultrasound),
            "dxa" | "dexa" => Some(Self::Dxa),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::XRay => "X-RAY",
            Self::Ct => "CT",
            Self::Mri => "MRI",
            Self::Ultrasound => "ULTRASOUND",
            Self::Dxa => "DXA",
            Self::Other => "OTHER",
        }
    }

    /// Lowercase form used in file names.
    pub fn slug(self) -> &'static str {
        match self {
            Self::XRay => "xray",
            Self::Ct => "ct",
            Self::Mri => "mri",
            Self::Ultrasound => "ultrasound",
            Self::Dxa => "dxa",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ModalityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for ModalityTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for ModalityTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(Some(&raw)))
    }
}
