use forge_contracts::{BaseItem, EvolutionConcept, FailureKind, Material};

use super::StageOutcome;
use crate::providers::{JsonModel, JsonPrompt};
use crate::recovery::parse_json_object;

const STAGE: &str = "evolution";
pub const EVOLUTION_TEMPERATURE: f64 = 0.9;

pub const EVOLUTION_SYSTEM_PROMPT: &str = r#"You are a Fantasy Blacksmith AI evolving game items.
Given a base item and the materials it absorbed, return a JSON object with:
1. "name": The evolved item's new name.
2. "description": One or two dramatic sentences describing the evolution.
3. "visualPrompt": A short visual description of the evolved item for an image generator.

Output strict JSON."#;

pub fn evolution_prompt(base: &BaseItem, materials: &[Material]) -> String {
    let mut lines = vec![format!("Base item: {}", base.name)];
    if let Some(description) = base
        .description
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        lines.push(format!("Base description: {description}"));
    }
    lines.push("Absorbed materials:".to_string());
    if materials.is_empty() {
        lines.push("- (none)".to_string());
    }
    for material in materials {
        lines.push(format!("- {} ({})", material.name, material.grade));
    }
    lines.push(String::new());
    lines.push("Describe the evolved form of the base item.".to_string());
    lines.join("\n")
}

/// Asks the model for an evolved concept of `base` fed with `materials`.
pub fn evolve(
    model: &dyn JsonModel,
    base: &BaseItem,
    materials: &[Material],
) -> StageOutcome<EvolutionConcept> {
    let text = evolution_prompt(base, materials);
    let prompt = JsonPrompt {
        system: EVOLUTION_SYSTEM_PROMPT,
        image: None,
        text: &text,
        temperature: EVOLUTION_TEMPERATURE,
    };
    let raw = match model.generate_json(&prompt) {
        Ok(raw) => raw,
        Err(err) => return StageOutcome::from_error(STAGE, EvolutionConcept::fallback(base), &err),
    };
    match parse_json_object(&raw) {
        Some(payload) => StageOutcome::ok(EvolutionConcept::from_payload(&payload, base)),
        None => StageOutcome::fallback(
            STAGE,
            EvolutionConcept::fallback(base),
            FailureKind::UpstreamMalformed,
            format!("{} returned no JSON object", model.name()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedJsonModel;

    fn iron_sword() -> BaseItem {
        BaseItem {
            name: "Iron Sword".to_string(),
            description: None,
        }
    }

    fn phoenix_feather() -> Vec<Material> {
        vec![Material {
            name: "Phoenix Feather".to_string(),
            grade: "rare".to_string(),
        }]
    }

    #[test]
    fn provider_failure_yields_evolved_placeholder() {
        let model = ScriptedJsonModel::transport_failure("503");
        let outcome = evolve(&model, &iron_sword(), &phoenix_feather());
        assert!(outcome.is_fallback());
        assert_eq!(outcome.value.name, "Evolved Iron Sword");
        assert_eq!(
            outcome.value.description,
            "The item has evolved, absorbing new power."
        );
        let visual = outcome.value.visual_prompt.unwrap_or_default();
        assert!(!visual.is_empty());
        assert!(visual.contains("Iron Sword"));
    }

    #[test]
    fn prompt_lists_materials_and_uses_higher_temperature() {
        let model = ScriptedJsonModel::replying(
            r#"{"name":"Phoenix Blade","description":"Reborn in flame.","visualPrompt":"a flaming sword"}"#,
        );
        let base = BaseItem {
            name: "Iron Sword".to_string(),
            description: Some("A plain blade.".to_string()),
        };
        let outcome = evolve(&model, &base, &phoenix_feather());
        assert!(!outcome.is_fallback());
        assert_eq!(outcome.value.name, "Phoenix Blade");
        assert_eq!(outcome.value.visual_prompt.as_deref(), Some("a flaming sword"));

        let prompts = model.prompts();
        assert_eq!(prompts[0].temperature, EVOLUTION_TEMPERATURE);
        assert!(!prompts[0].had_image);
        assert!(prompts[0].text.contains("Base item: Iron Sword"));
        assert!(prompts[0].text.contains("Base description: A plain blade."));
        assert!(prompts[0].text.contains("- Phoenix Feather (rare)"));
    }

    #[test]
    fn malformed_reply_uses_placeholder() {
        let model = ScriptedJsonModel::malformed_failure("candidate carried no text");
        let outcome = evolve(&model, &iron_sword(), &[]);
        assert_eq!(outcome.failure, Some(FailureKind::UpstreamMalformed));
        assert_eq!(outcome.value, EvolutionConcept::fallback(&iron_sword()));

        let garbage = ScriptedJsonModel::replying("no json here");
        let outcome = evolve(&garbage, &iron_sword(), &[]);
        assert_eq!(outcome.failure, Some(FailureKind::UpstreamMalformed));
    }
}
