use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::ForgeError;

pub const SPRITE_SIZE: u32 = 256;
pub const SPRITE_MEDIA_TYPE: &str = "image/webp";

/// Canonical 256x256 game-art artifact, carried as a `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sprite {
    pub media_type: String,
    pub width: u32,
    pub height: u32,
    pub data_uri: String,
}

impl Sprite {
    pub fn from_encoded(media_type: &str, width: u32, height: u32, bytes: &[u8]) -> Self {
        Self {
            media_type: media_type.to_string(),
            width,
            height,
            data_uri: format!("data:{media_type};base64,{}", BASE64.encode(bytes)),
        }
    }

    /// Encoded image bytes behind the data URI.
    pub fn payload(&self) -> Result<Vec<u8>, ForgeError> {
        let prefix = format!("data:{};base64,", self.media_type);
        let encoded = self
            .data_uri
            .strip_prefix(&prefix)
            .ok_or_else(|| ForgeError::Decode("sprite data URI prefix mismatch".to_string()))?;
        BASE64
            .decode(encoded.as_bytes())
            .map_err(|err| ForgeError::Decode(format!("sprite base64 payload: {err}")))
    }
}
