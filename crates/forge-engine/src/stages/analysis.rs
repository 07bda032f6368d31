use forge_contracts::{FailureKind, ItemAnalysis, ScanMode};
use tracing::debug;

use super::StageOutcome;
use crate::providers::{ImageInput, JsonModel, JsonPrompt};
use crate::recovery::parse_json_object;

const STAGE: &str = "analysis";
pub const ANALYSIS_TEMPERATURE: f64 = 0.7;

pub const ANALYSIS_SYSTEM_PROMPT: &str = r#"You are a Fantasy Blacksmith AI.
Analyze the image and return a JSON object with:
1. "name": Name of the object (e.g., "Red Scissors").
2. "description": One short sentence of game lore for the object.
3. "material": Physical material (e.g., "Metal", "Plastic").
4. "attribute": Element or vibe (e.g., "Fire", "Sharp", "Ice", "Modern").
5. "type": One of ["weapon", "armor", "skill"].
   - Sharp/Long -> weapon
   - Wide/Protective -> armor
   - Consumable/Energy -> skill
6. "rarityScore": Integer from 1 (mundane) to 10 (mythic).
7. "affectedStats": Exactly three distinct values from ["atk", "def", "maxHp", "spd", "critRate", "critDmg"], most affected first.
8. "stats": { "atk": number, "def": number, "hp": number } (Scale: 10-100)

Output strict JSON."#;

pub fn analysis_hint(mode: &ScanMode) -> String {
    format!("User selected action: {mode}. Analyze accordingly.")
}

/// Classifies the photographed object into a canonical [`ItemAnalysis`].
pub fn analyze(
    model: &dyn JsonModel,
    image: &ImageInput,
    mode: &ScanMode,
) -> StageOutcome<ItemAnalysis> {
    let text = analysis_hint(mode);
    let prompt = JsonPrompt {
        system: ANALYSIS_SYSTEM_PROMPT,
        image: Some(image),
        text: &text,
        temperature: ANALYSIS_TEMPERATURE,
    };
    let raw = match model.generate_json(&prompt) {
        Ok(raw) => raw,
        Err(err) => return StageOutcome::from_error(STAGE, ItemAnalysis::fallback(mode), &err),
    };
    match parse_json_object(&raw) {
        Some(payload) => {
            debug!(model = model.name(), mode = mode.as_str(), "analysis parsed");
            StageOutcome::ok(ItemAnalysis::from_payload(&payload, mode))
        }
        None => StageOutcome::fallback(
            STAGE,
            ItemAnalysis::fallback(mode),
            FailureKind::UpstreamMalformed,
            format!("{} returned no JSON object", model.name()),
        ),
    }
}
