use std::sync::Arc;

use anyhow::Result;
use forge_contracts::events::{EventPayload, EventWriter, RequestEvents};
use forge_contracts::models::{Capability, ModelSelector};
use forge_contracts::{
    BaseItem, EvolutionConcept, FlavorText, ForgeError, ItemAnalysis, Material, ScanMode,
    SkillCatalog, SkillCategory, SkillMatch, Sprite,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::ForgeConfig;
use crate::providers::{
    FeatherlessClient, FlavorModel, GeminiClient, ImageInput, ImageSynthesizer, JsonModel,
    SynthesizerRegistry,
};
use crate::stages::{self, StageOutcome};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub analysis: ItemAnalysis,
    pub flavor: FlavorText,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill: Option<SkillMatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub sprite: Option<Sprite>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolveResponse {
    pub concept: EvolutionConcept,
    pub sprite: Option<Sprite>,
}

/// Composes the stages per request kind.
///
/// Holds no mutable state; one pipeline can serve many threads.
pub struct ForgePipeline {
    vision: Arc<dyn JsonModel>,
    flavor: Option<Arc<dyn FlavorModel>>,
    synthesizer: Arc<dyn ImageSynthesizer>,
    image_model: String,
    catalog: SkillCatalog,
    events: Option<EventWriter>,
}

impl ForgePipeline {
    pub fn new(
        vision: Arc<dyn JsonModel>,
        synthesizer: Arc<dyn ImageSynthesizer>,
        image_model: impl Into<String>,
    ) -> Self {
        Self {
            vision,
            flavor: None,
            synthesizer,
            image_model: image_model.into(),
            catalog: SkillCatalog::builtin(),
            events: None,
        }
    }

    /// Wires the configured providers; the image model's provider picks the
    /// synthesizer.
    pub fn from_config(config: &ForgeConfig) -> Result<Self> {
        let selector = ModelSelector::default();
        let transport = config.transport();

        let vision = selector.select(Some(&config.vision_model), Capability::Vision)?;
        if let Some(reason) = vision.fallback_reason.as_deref() {
            warn!(model = %vision.model.name, %reason, "vision model fell back");
        }
        if vision.model.provider != "gemini" {
            return Err(ForgeError::Config(format!(
                "vision provider '{}' is not supported",
                vision.model.provider
            ))
            .into());
        }

        let image = selector.select(Some(&config.image_model), Capability::Image)?;
        if let Some(reason) = image.fallback_reason.as_deref() {
            warn!(model = %image.model.name, %reason, "image model fell back");
        }
        let synthesizer = SynthesizerRegistry::from_config(config, &transport)
            .get(&image.model.provider)
            .ok_or_else(|| {
                ForgeError::Config(format!(
                    "no synthesizer registered for provider '{}'",
                    image.model.provider
                ))
            })?;

        let flavor = config.featherless_api_key.as_deref().map(|key| {
            Arc::new(FeatherlessClient::new(
                transport.clone(),
                &config.featherless_api_url,
                key,
                &config.featherless_model,
            )) as Arc<dyn FlavorModel>
        });

        info!(
            vision_model = %vision.model.name,
            image_model = %image.model.name,
            image_provider = %image.model.provider,
            flavor = flavor.is_some(),
            timeout_s = transport.timeout().as_secs(),
            retries = transport.max_retries(),
            "pipeline configured"
        );

        let vision_client = GeminiClient::new(
            transport,
            &config.gemini_api_base,
            config.gemini_api_key.clone(),
            &vision.model.name,
        );
        Ok(Self::new(Arc::new(vision_client), synthesizer, image.model.name).with_flavor(flavor))
    }

    pub fn with_flavor(mut self, flavor: Option<Arc<dyn FlavorModel>>) -> Self {
        self.flavor = flavor;
        self
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn image_model(&self) -> &str {
        &self.image_model
    }

    /// Analysis, then flavor text unless the mode is materials-only.
    pub fn scan(&self, image: &ImageInput, mode: &ScanMode) -> ScanResponse {
        let mut trace = self.trace("scan", json!({"mode": mode.as_str()}));

        let analysis = stages::analyze(self.vision.as_ref(), image, mode);
        trace.stage("analysis", &analysis);
        let analysis = analysis.into_value();

        let flavor = if mode.is_materials_only() {
            debug!("materials mode; flavor taken from analysis");
            FlavorText::from(&analysis)
        } else {
            let flavor = stages::flavor_text(self.flavor.as_deref(), &analysis);
            trace.stage("flavor", &flavor);
            flavor.into_value()
        };

        trace.finish();
        ScanResponse {
            analysis,
            flavor,
            skill: None,
        }
    }

    pub fn generate_image(&self, description: &str) -> ImageResponse {
        let mut trace = self.trace("generate_image", json!({}));
        let sprite = stages::synthesize(self.synthesizer.as_ref(), &self.image_model, description);
        trace.stage("synthesis", &sprite);
        trace.finish();
        ImageResponse {
            sprite: sprite.into_value(),
        }
    }

    /// Evolution concept, then art only when the concept has a visual prompt.
    pub fn evolve(&self, base: &BaseItem, materials: &[Material]) -> EvolveResponse {
        let mut trace = self.trace(
            "evolve",
            json!({"base": base.name, "materials": materials.len()}),
        );

        let concept = stages::evolve(self.vision.as_ref(), base, materials);
        trace.stage("evolution", &concept);
        let concept = concept.into_value();

        let sprite = match concept.visual_prompt.as_deref() {
            Some(visual) if !visual.trim().is_empty() => {
                let sprite =
                    stages::synthesize(self.synthesizer.as_ref(), &self.image_model, visual);
                trace.stage("synthesis", &sprite);
                sprite.into_value()
            }
            _ => {
                debug!(concept = %concept.name, "no visual prompt; skipping synthesis");
                None
            }
        };

        trace.finish();
        EvolveResponse { concept, sprite }
    }

    /// Skill match, reshaped into the scan envelope.
    pub fn scan_skill(&self, image: &ImageInput) -> ScanResponse {
        let mut trace = self.trace("scan_skill", json!({}));
        let matched = stages::match_skill(self.vision.as_ref(), image, &self.catalog);
        trace.stage("skill", &matched);
        let matched = matched.into_value();
        trace.finish();

        let analysis = skill_analysis(&self.catalog, &matched);
        ScanResponse {
            flavor: FlavorText::from(&analysis),
            analysis,
            skill: Some(matched),
        }
    }

    fn trace(&self, kind: &'static str, detail: Value) -> RequestTrace {
        let events = self.events.as_ref().map(EventWriter::request);
        let trace = RequestTrace {
            kind,
            events,
            fallbacks: 0,
        };
        let mut payload = EventPayload::new();
        payload.insert("kind".to_string(), json!(kind));
        if let Value::Object(detail) = detail {
            payload.extend(detail);
        }
        trace.emit("request_started", payload);
        trace
    }
}

/// Canonical analysis describing a matched skill.
fn skill_analysis(catalog: &SkillCatalog, matched: &SkillMatch) -> ItemAnalysis {
    let entry = catalog.get(&matched.skill_name);
    let material = entry
        .and_then(|entry| entry.materials.first())
        .map(|value| capitalize(value))
        .unwrap_or_else(|| "Unknown".to_string());
    let attribute = entry
        .and_then(|entry| entry.attributes.first())
        .map(|value| capitalize(value))
        .unwrap_or_else(|| "Void".to_string());
    let (kind, stats) = match matched.category {
        SkillCategory::Deal => ("damage-dealing", ["atk", "critDmg", "spd"]),
        SkillCategory::Buff => ("buff-granting", ["def", "maxHp", "spd"]),
    };
    let payload = json!({
        "name": matched.skill_name,
        "description": format!("A {kind} skill attuned to {attribute}."),
        "material": material,
        "attribute": attribute,
        "type": "skill",
        "affectedStats": stats,
    });
    let payload = payload.as_object().cloned().unwrap_or_default();
    ItemAnalysis::from_payload(&payload, &ScanMode::parse("skill"))
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Per-request event scope. Event-log failures are logged, never raised.
struct RequestTrace {
    kind: &'static str,
    events: Option<RequestEvents>,
    fallbacks: usize,
}

impl RequestTrace {
    fn stage<T>(&mut self, stage: &str, outcome: &StageOutcome<T>) {
        let mut payload = EventPayload::new();
        payload.insert("stage".to_string(), json!(stage));
        payload.insert("fallback".to_string(), json!(outcome.is_fallback()));
        if let Some(failure) = outcome.failure {
            self.fallbacks += 1;
            payload.insert("failure".to_string(), json!(failure.as_str()));
        }
        if let Some(reason) = outcome.fallback_reason.as_deref() {
            payload.insert("reason".to_string(), json!(reason));
        }
        self.emit("stage_finished", payload);
    }

    fn finish(&mut self) {
        info!(kind = self.kind, fallbacks = self.fallbacks, "request finished");
        let mut payload = EventPayload::new();
        payload.insert("kind".to_string(), json!(self.kind));
        payload.insert("fallbacks".to_string(), json!(self.fallbacks));
        self.emit("request_finished", payload);
    }

    fn emit(&self, event_type: &str, payload: EventPayload) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        if let Err(err) = events.emit(event_type, payload) {
            warn!(event_type, request_id = events.request_id(), error = %err, "event log write failed");
        }
    }
}
