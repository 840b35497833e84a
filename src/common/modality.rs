use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ParseModalityError;
use crate::pipeline::services::features::{COLOR_FEATURE_LEN, EXTENDED_FEATURE_LEN};

/// The four independently imaged regions a prediction can draw on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Full eye photograph; the conjunctiva still has to be located.
    Eye,
    Forniceal,
    Palpebral,
    FornicealPalpebral,
}

impl Modality {
    pub const ALL: [Modality; 4] = [
        Modality::Eye,
        Modality::Forniceal,
        Modality::Palpebral,
        Modality::FornicealPalpebral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Eye => "eye",
            Modality::Forniceal => "forniceal",
            Modality::Palpebral => "palpebral",
            Modality::FornicealPalpebral => "forniceal_palpebral",
        }
    }

    /// Length of the feature vector extracted for this modality.
    pub fn feature_len(&self) -> usize {
        match self {
            Modality::Eye | Modality::FornicealPalpebral => EXTENDED_FEATURE_LEN,
            Modality::Forniceal | Modality::Palpebral => COLOR_FEATURE_LEN,
        }
    }

    /// Uploads for these modalities are already the region of interest.
    pub fn is_pre_cropped(&self) -> bool {
        !matches!(self, Modality::Eye)
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = ParseModalityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eye" => Ok(Modality::Eye),
            "forniceal" => Ok(Modality::Forniceal),
            "palpebral" => Ok(Modality::Palpebral),
            "forniceal_palpebral" | "forniceal-palpebral" => Ok(Modality::FornicealPalpebral),
            other => Err(ParseModalityError(other.to_string())),
        }
    }
}

/// Uploaded bytes tagged with the modality they were declared as.
#[derive(Debug, Clone)]
pub struct RawImage {
    modality: Modality,
    bytes: Arc<[u8]>,
}

impl RawImage {
    pub fn new(modality: Modality, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            modality,
            bytes: Arc::from(bytes.into()),
        }
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One optional upload slot per modality.
#[derive(Debug, Clone, Default)]
pub struct ModalityImages {
    pub eye: Option<Vec<u8>>,
    pub forniceal: Option<Vec<u8>>,
    pub palpebral: Option<Vec<u8>>,
    pub forniceal_palpebral: Option<Vec<u8>>,
}

impl ModalityImages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_eye(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.eye = Some(bytes.into());
        self
    }

    pub fn with_forniceal(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.forniceal = Some(bytes.into());
        self
    }

    pub fn with_palpebral(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.palpebral = Some(bytes.into());
        self
    }

    pub fn with_forniceal_palpebral(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.forniceal_palpebral = Some(bytes.into());
        self
    }

    pub fn with(self, modality: Modality, bytes: impl Into<Vec<u8>>) -> Self {
        match modality {
            Modality::Eye => self.with_eye(bytes),
            Modality::Forniceal => self.with_forniceal(bytes),
            Modality::Palpebral => self.with_palpebral(bytes),
            Modality::FornicealPalpebral => self.with_forniceal_palpebral(bytes),
        }
    }

    pub fn get(&self, modality: Modality) -> Option<&[u8]> {
        match modality {
            Modality::Eye => self.eye.as_deref(),
            Modality::Forniceal => self.forniceal.as_deref(),
            Modality::Palpebral => self.palpebral.as_deref(),
            Modality::FornicealPalpebral => self.forniceal_palpebral.as_deref(),
        }
    }

    pub fn contains(&self, modality: Modality) -> bool {
        self.get(modality).is_some()
    }

    pub fn count(&self) -> usize {
        Modality::ALL.iter().filter(|m| self.contains(**m)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Supplied slots in canonical modality order.
    pub fn into_raw_images(self) -> Vec<RawImage> {
        [
            (Modality::Eye, self.eye),
            (Modality::Forniceal, self.forniceal),
            (Modality::Palpebral, self.palpebral),
            (Modality::FornicealPalpebral, self.forniceal_palpebral),
        ]
        .into_iter()
        .filter_map(|(modality, bytes)| bytes.map(|b| RawImage::new(modality, b)))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modality_tags_parse_and_display() {
        for modality in Modality::ALL {
            assert_eq!(modality.as_str().parse::<Modality>(), Ok(modality));
        }
        assert_eq!(
            "Forniceal-Palpebral".parse::<Modality>(),
            Ok(Modality::FornicealPalpebral)
        );
        assert!("sclera".parse::<Modality>().is_err());
    }

    #[test]
    fn only_eye_needs_localization() {
        assert!(!Modality::Eye.is_pre_cropped());
        assert!(Modality::Palpebral.is_pre_cropped());
    }

    #[test]
    fn images_convert_in_canonical_order() {
        let images = ModalityImages::new()
            .with_palpebral(vec![2])
            .with_eye(vec![1])
            .with_forniceal_palpebral(vec![3]);
        assert_eq!(images.count(), 3);
        assert!(!images.contains(Modality::Forniceal));

        let raw = images.into_raw_images();
        let order: Vec<_> = raw.iter().map(|r| r.modality()).collect();
        assert_eq!(
            order,
            vec![
                Modality::Eye,
                Modality::Palpebral,
                Modality::FornicealPalpebral
            ]
        );
        assert_eq!(raw[1].bytes(), &[2]);
    }
}
