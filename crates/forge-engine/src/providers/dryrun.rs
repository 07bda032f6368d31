use std::io::Cursor;

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use sha2::{Digest, Sha256};

use super::{GeneratedImage, ImageSynthesizer, SynthesisRequest};

const DRYRUN_SIDE: u32 = 512;

/// Offline synthesizer: one solid-colour PNG whose colour is derived from
/// the prompt hash, so local runs need no keys and stay reproducible.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryrunSynthesizer;

impl ImageSynthesizer for DryrunSynthesizer {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(&self, request: &SynthesisRequest) -> Result<Vec<GeneratedImage>> {
        let (r, g, b) = color_from_prompt(&request.prompt);
        let image = RgbImage::from_pixel(DRYRUN_SIDE, DRYRUN_SIDE, Rgb([r, g, b]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .context("dryrun image encode failed")?;
        Ok(vec![GeneratedImage {
            bytes,
            mime_type: Some("image/png".to_string()),
        }])
    }
}

fn color_from_prompt(prompt: &str) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}
