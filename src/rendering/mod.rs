//! Rendering: preview surface, paint commands and rasterization

pub mod layout;
pub mod paint;
pub mod raster;
pub mod theme;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// An encoded capture of the preview container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// The image produced by a successful pipeline run.
///
/// Exactly one artifact is current at a time; a newer successful run
/// replaces it and a failed run clears it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderArtifact {
    /// Generation of the run that produced this artifact
    pub generation: u64,
    pub width: u32,
    pub height: u32,
    /// PNG bytes
    pub png: Vec<u8>,
    /// `data:image/png;base64,...`
    pub data_url: String,
    /// Hex sha256 of the PNG bytes
    pub digest: String,
}

impl RenderArtifact {
    pub fn from_bitmap(generation: u64, bitmap: Bitmap) -> Self {
        let data_url = format!("{}{}", PNG_DATA_URL_PREFIX, STANDARD.encode(&bitmap.png));
        let digest = hex::encode(Sha256::digest(&bitmap.png));
        Self {
            generation,
            width: bitmap.width,
            height: bitmap.height,
            png: bitmap.png,
            data_url,
            digest,
        }
    }
}

/// Decode a `data:image/png;base64,` URL back into PNG bytes.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let payload = url
        .strip_prefix(PNG_DATA_URL_PREFIX)
        .ok_or_else(|| Error::Other("not a PNG data URL".into()))?;
    STANDARD
        .decode(payload)
        .map_err(|e| Error::Other(format!("invalid data URL payload: {}", e)))
}
