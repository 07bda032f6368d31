use forge_contracts::payload::first_text;
use forge_contracts::{FailureKind, SkillCatalog, SkillMatch};

use super::StageOutcome;
use crate::providers::{ImageInput, JsonModel, JsonPrompt};
use crate::recovery::parse_json_object;

const STAGE: &str = "skill";
pub const SKILL_TEMPERATURE: f64 = 0.4;

pub const SKILL_SYSTEM_PROMPT: &str = r#"You are a Fantasy Blacksmith AI matching real objects to combat skills.
Pick the single skill from the catalog whose materials and attributes best match the object in the image.
Return a JSON object with:
1. "skillName": The exact name of one catalog entry, as written in the table.
2. "category": The category listed for that entry ("deal" or "buff").

Output strict JSON."#;

pub fn skill_prompt(catalog: &SkillCatalog) -> String {
    format!(
        "Skill catalog:\n{}\n\nChoose the best matching skill for the object in the image.",
        catalog.as_prompt_table()
    )
}

/// Picks the catalog skill that best fits the photographed object.
///
/// Names outside the catalog are not trusted: they fall back to the
/// catalog default.
pub fn match_skill(
    model: &dyn JsonModel,
    image: &ImageInput,
    catalog: &SkillCatalog,
) -> StageOutcome<SkillMatch> {
    let text = skill_prompt(catalog);
    let prompt = JsonPrompt {
        system: SKILL_SYSTEM_PROMPT,
        image: Some(image),
        text: &text,
        temperature: SKILL_TEMPERATURE,
    };
    let raw = match model.generate_json(&prompt) {
        Ok(raw) => raw,
        Err(err) => return StageOutcome::from_error(STAGE, catalog.fallback_match(), &err),
    };
    let Some(payload) = parse_json_object(&raw) else {
        return StageOutcome::fallback(
            STAGE,
            catalog.fallback_match(),
            FailureKind::UpstreamMalformed,
            format!("{} returned no JSON object", model.name()),
        );
    };
    match catalog.resolve_payload(&payload) {
        Some(matched) => StageOutcome::ok(matched),
        None => {
            let requested = first_text(&payload, &["skillName", "skill_name", "skill", "name"])
                .unwrap_or_else(|| "<missing>".to_string());
            StageOutcome::fallback(
                STAGE,
                catalog.fallback_match(),
                FailureKind::UpstreamMalformed,
                format!("skill '{requested}' is not in the catalog"),
            )
        }
    }
}
