use forge_contracts::{FailureKind, FlavorText, ItemAnalysis};
use serde_json::{Map, Value};
use tracing::debug;

use super::StageOutcome;
use crate::providers::FlavorModel;
use crate::recovery::recover;

const STAGE: &str = "flavor";
pub const FLAVOR_SYSTEM_PROMPT: &str = "You are a dramatic fantasy bard. Return JSON only.";

pub fn flavor_prompt(analysis: &ItemAnalysis) -> String {
    format!(
        "Item: {}\nAttribute: {}\nType: {}\n\nCreate a cool fantasy name and a dramatic description for this item.\nKeep the description short and punchy (max 2 sentences, under 100 characters).\nJSON Output: {{\"name\": \"...\", \"description\": \"...\"}}",
        analysis.name,
        analysis.attribute,
        analysis.item_type.as_str()
    )
}

/// Templated text used when no flavor model is configured.
pub fn placeholder_flavor(analysis: &ItemAnalysis) -> FlavorText {
    FlavorText {
        name: format!("Ancient {}", analysis.name),
        description: format!(
            "A mysterious {} found in the void. It resonates with {} energy.",
            analysis.name, analysis.attribute
        ),
    }
}

pub fn lost_flavor(analysis: &ItemAnalysis) -> FlavorText {
    FlavorText {
        name: format!("Legendary {}", analysis.name),
        description: "The description was lost in translation.".to_string(),
    }
}

/// Names and describes an analysed item.
///
/// Without a model this is the templated degraded mode, not a fallback.
/// A reply that is not JSON is kept as the description; a reply with no
/// description gets the lost-in-translation text.
pub fn flavor_text(
    model: Option<&dyn FlavorModel>,
    analysis: &ItemAnalysis,
) -> StageOutcome<FlavorText> {
    let Some(model) = model else {
        debug!(item = %analysis.name, "flavor model not configured; using template");
        return StageOutcome::ok(placeholder_flavor(analysis));
    };

    let reply = match model.complete_json(FLAVOR_SYSTEM_PROMPT, &flavor_prompt(analysis)) {
        Ok(reply) => reply,
        Err(err) => return StageOutcome::from_error(STAGE, lost_flavor(analysis), &err),
    };

    let mut wrapped_raw = false;
    let payload = recover(reply, |raw| {
        wrapped_raw = true;
        let mut out = Map::new();
        out.insert("name".to_string(), Value::String(analysis.name.clone()));
        out.insert("description".to_string(), Value::String(raw.to_string()));
        out
    });
    let mut flavor = FlavorText::from_payload(&payload, &analysis.name);
    if flavor.description.trim().is_empty() {
        flavor.description = lost_flavor(analysis).description;
        return StageOutcome::fallback(
            STAGE,
            flavor,
            FailureKind::UpstreamMalformed,
            format!("{} reply carried no description", model.name()),
        );
    }
    if wrapped_raw {
        return StageOutcome::fallback(
            STAGE,
            flavor,
            FailureKind::UpstreamMalformed,
            format!("{} reply was not a JSON object; kept raw text", model.name()),
        );
    }
    StageOutcome::ok(flavor)
}
