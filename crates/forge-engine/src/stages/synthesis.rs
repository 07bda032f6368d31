use forge_contracts::{FailureKind, Sprite};

use super::StageOutcome;
use crate::normalize::normalize;
use crate::providers::{ImageSynthesizer, SynthesisRequest};

const STAGE: &str = "synthesis";
pub const SYNTHESIS_ASPECT_RATIO: &str = "1:1";
pub const SYNTHESIS_OUTPUT_FORMAT: &str = "png";

pub fn sprite_prompt(description: &str) -> String {
    format!(
        "High quality pixel art style icon, fantasy RPG item, 256x256 size of {}. dark blue-grey background (hex #2a2e3d). centered, distinct outline. no text, no blur.",
        description.trim()
    )
}

/// Renders `description` as game art and normalizes the first image.
///
/// `None` when the provider fails, returns nothing, or returns bytes that
/// do not decode.
pub fn synthesize(
    synthesizer: &dyn ImageSynthesizer,
    model: &str,
    description: &str,
) -> StageOutcome<Option<Sprite>> {
    let request = SynthesisRequest {
        model: model.to_string(),
        prompt: sprite_prompt(description),
        aspect_ratio: SYNTHESIS_ASPECT_RATIO.to_string(),
        output_format: SYNTHESIS_OUTPUT_FORMAT.to_string(),
    };
    let images = match synthesizer.generate(&request) {
        Ok(images) => images,
        Err(err) => return StageOutcome::from_error(STAGE, None, &err),
    };
    let Some(first) = images.into_iter().next() else {
        return StageOutcome::fallback(
            STAGE,
            None,
            FailureKind::UpstreamMalformed,
            format!("{} returned no images", synthesizer.name()),
        );
    };
    match normalize(&first.bytes) {
        Ok(sprite) => StageOutcome::ok(Some(sprite)),
        Err(err) => StageOutcome::fallback(STAGE, None, FailureKind::from(&err), err.to_string()),
    }
}
