use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ConsultError, Result};

/// Raw size ceiling for an uploaded photo, checked before anything else.
pub const MAX_PHOTO_BYTES: usize = 4 * 1024 * 1024;

/// Image types the consultation accepts.
pub const ACCEPTED_PHOTO_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/webp"];

pub const PHOTO_TOO_LARGE: &str = "Dosya boyutu 4MB'den büyük olamaz.";
pub const GOALS_REQUIRED: &str = "Lütfen en az bir hedef seçin.";

/// The four fixed treatment goals offered on the form.
pub const GOAL_OPTIONS: [&str; 4] = [
    "Saç çizgimi restore etmek",
    "Tepe bölgemi sıklaştırmak",
    "Genel saç yoğunluğunu artırmak",
    "Daha genç bir görünüm elde etmek",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviousOperation {
    Yes,
    No,
}

impl PreviousOperation {
    /// Rendering used when the value is embedded in the analysis prompt.
    pub fn as_turkish(&self) -> &'static str {
        match self {
            PreviousOperation::Yes => "Evet",
            PreviousOperation::No => "Hayır",
        }
    }
}

/// The nine fixed Norwood/Ludwig clinical-scale options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HairLossLevel {
    #[serde(rename = "Norwood 2")]
    Norwood2,
    #[serde(rename = "Norwood 3")]
    Norwood3,
    #[serde(rename = "Norwood 4")]
    Norwood4,
    #[serde(rename = "Norwood 5")]
    Norwood5,
    #[serde(rename = "Norwood 6")]
    Norwood6,
    #[serde(rename = "Norwood 7")]
    Norwood7,
    #[serde(rename = "Ludwig I")]
    LudwigI,
    #[serde(rename = "Ludwig II")]
    LudwigII,
    #[serde(rename = "Ludwig III")]
    LudwigIII,
}

impl HairLossLevel {
    pub const ALL: [HairLossLevel; 9] = [
        HairLossLevel::Norwood2,
        HairLossLevel::Norwood3,
        HairLossLevel::Norwood4,
        HairLossLevel::Norwood5,
        HairLossLevel::Norwood6,
        HairLossLevel::Norwood7,
        HairLossLevel::LudwigI,
        HairLossLevel::LudwigII,
        HairLossLevel::LudwigIII,
    ];

    pub fn value(&self) -> &'static str {
        match self {
            HairLossLevel::Norwood2 => "Norwood 2",
            HairLossLevel::Norwood3 => "Norwood 3",
            HairLossLevel::Norwood4 => "Norwood 4",
            HairLossLevel::Norwood5 => "Norwood 5",
            HairLossLevel::Norwood6 => "Norwood 6",
            HairLossLevel::Norwood7 => "Norwood 7",
            HairLossLevel::LudwigI => "Ludwig I",
            HairLossLevel::LudwigII => "Ludwig II",
            HairLossLevel::LudwigIII => "Ludwig III",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HairLossLevel::Norwood2 => "Norwood 2 - Hafif Geri Çekilme",
            HairLossLevel::Norwood3 => "Norwood 3 - Belirgin Geri Çekilme",
            HairLossLevel::Norwood4 => "Norwood 4 - Tepe Bölgesinde Seyrelme",
            HairLossLevel::Norwood5 => "Norwood 5 - İlerlemiş Dökülme",
            HairLossLevel::Norwood6 => "Norwood 6 - Geniş Kellik Alanı",
            HairLossLevel::Norwood7 => "Norwood 7 - En İleri Seviye",
            HairLossLevel::LudwigI => "Ludwig I - Tepe Çizgisinde Hafif Seyrelme",
            HairLossLevel::LudwigII => "Ludwig II - Tepe Çizgisinde Belirgin Seyrelme",
            HairLossLevel::LudwigIII => "Ludwig III - Tepe Bölgesinde Tam Kellik",
        }
    }
}

/// An uploaded photo, already encoded for transfer to the model API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub base64: String,
    pub mime_type: String,
}

impl Photo {
    /// Encodes raw image bytes. The size ceiling is enforced first so an
    /// oversized file is rejected with the fixed size-limit message no
    /// matter what type it claims to be.
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Result<Self> {
        if bytes.len() > MAX_PHOTO_BYTES {
            return Err(ConsultError::Validation(PHOTO_TOO_LARGE.to_string()));
        }
        let mime_type = mime_type.into();
        if !ACCEPTED_PHOTO_TYPES.contains(&mime_type.as_str()) {
            return Err(ConsultError::Validation(format!(
                "unsupported image type: {mime_type}"
            )));
        }
        Ok(Self {
            base64: STANDARD.encode(bytes),
            mime_type,
        })
    }

    /// Reads and encodes an image file, inferring the MIME type from the
    /// file extension.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mime_type = match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            other => {
                return Err(ConsultError::Validation(format!(
                    "unsupported image type: {}",
                    other.unwrap_or("unknown")
                )));
            }
        };
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ConsultError::PhotoRead(e.to_string()))?;
        Self::from_bytes(&bytes, mime_type)
    }

    /// Upper bound on the decoded size, derived from the base64 length.
    fn approx_decoded_len(&self) -> usize {
        self.base64.len() / 4 * 3
    }
}

/// Everything the consultation form collects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormData {
    pub age: String,
    pub gender: Gender,
    pub hair_loss_level: HairLossLevel,
    pub previous_operation: PreviousOperation,
    pub goals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<Photo>,
}

impl FormData {
    /// Advisory validation mirroring what the form enforces before
    /// submission: at least one goal, and a photo (when present) within
    /// the size ceiling and of an accepted type.
    pub fn validate(&self) -> Result<()> {
        if self.goals.is_empty() {
            return Err(ConsultError::Validation(GOALS_REQUIRED.to_string()));
        }
        if let Some(photo) = &self.photo {
            if photo.approx_decoded_len() > MAX_PHOTO_BYTES {
                return Err(ConsultError::Validation(PHOTO_TOO_LARGE.to_string()));
            }
            if !ACCEPTED_PHOTO_TYPES.contains(&photo.mime_type.as_str()) {
                return Err(ConsultError::Validation(format!(
                    "unsupported image type: {}",
                    photo.mime_type
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> FormData {
        FormData {
            age: "34".to_string(),
            gender: Gender::Male,
            hair_loss_level: HairLossLevel::Norwood3,
            previous_operation: PreviousOperation::No,
            goals: vec![GOAL_OPTIONS[0].to_string()],
            photo: None,
        }
    }

    #[test]
    fn empty_goals_block_submission() {
        let mut form = valid_form();
        form.goals.clear();
        let err = form.validate().unwrap_err();
        assert_eq!(err.to_string(), GOALS_REQUIRED);
    }

    #[test]
    fn oversized_photo_is_rejected_regardless_of_type() {
        let bytes = vec![0u8; MAX_PHOTO_BYTES + 1];
        for mime in ["image/png", "application/pdf", "text/plain"] {
            let err = Photo::from_bytes(&bytes, mime).unwrap_err();
            assert_eq!(err.to_string(), PHOTO_TOO_LARGE);
        }
    }

    #[test]
    fn unaccepted_type_is_rejected_when_within_size() {
        let err = Photo::from_bytes(&[1, 2, 3], "image/gif").unwrap_err();
        assert!(err.to_string().contains("image/gif"));
    }

    #[test]
    fn photo_at_the_ceiling_is_accepted() {
        let bytes = vec![0u8; MAX_PHOTO_BYTES];
        let photo = Photo::from_bytes(&bytes, "image/jpeg").unwrap();
        assert_eq!(photo.mime_type, "image/jpeg");
        assert!(!photo.base64.is_empty());
    }

    #[test]
    fn form_revalidates_encoded_photo_size() {
        let mut form = valid_form();
        let oversized = STANDARD.encode(vec![0u8; MAX_PHOTO_BYTES + 1024]);
        form.photo = Some(Photo {
            base64: oversized,
            mime_type: "image/png".to_string(),
        });
        let err = form.validate().unwrap_err();
        assert_eq!(err.to_string(), PHOTO_TOO_LARGE);
    }

    #[test]
    fn wire_names_follow_the_form_payload() {
        let form = valid_form();
        let value = serde_json::to_value(&form).unwrap();
        assert_eq!(value["hairLossLevel"], "Norwood 3");
        assert_eq!(value["previousOperation"], "no");
        assert_eq!(value["gender"], "male");
        assert!(value.get("photo").is_none());
    }

    #[tokio::test]
    async fn photo_from_file_infers_the_mime_type() {
        let path = std::env::temp_dir().join(format!("consult-photo-{}.png", std::process::id()));
        tokio::fs::write(&path, b"not really a png").await.unwrap();
        let photo = Photo::from_file(&path).await.unwrap();
        assert_eq!(photo.mime_type, "image/png");
        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn photo_from_file_rejects_unknown_extensions() {
        let path = std::env::temp_dir().join(format!("consult-photo-{}.bmp", std::process::id()));
        let err = Photo::from_file(&path).await.unwrap_err();
        assert!(err.to_string().contains("unsupported image type"));
    }

    #[test]
    fn nine_scale_levels_are_exposed() {
        assert_eq!(HairLossLevel::ALL.len(), 9);
        for level in HairLossLevel::ALL {
            assert!(level.label().starts_with(level.value()));
        }
    }
}
