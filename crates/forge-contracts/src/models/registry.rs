use std::fmt;

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Image + text in, JSON text out.
    Vision,
    /// Text in, JSON text out.
    Text,
    /// Prompt in, image bytes out.
    Image,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vision => "vision",
            Self::Text => "text",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<Capability>,
}

impl ModelSpec {
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Ordered model table; the first model with a capability is its default.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name.trim().trim_start_matches("models/"))
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn by_capability(&self, capability: Capability) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, name: &str, capability: Capability) -> Option<ModelSpec> {
        self.get(name)
            .filter(|model| model.supports(capability))
            .cloned()
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    use Capability::{Image, Text, Vision};

    let rows: [(&str, &str, &[Capability]); 8] = [
        ("gemini-2.5-flash-lite", "gemini", &[Vision, Text]),
        ("gemini-2.5-flash", "gemini", &[Vision, Text]),
        ("meta-llama/Meta-Llama-3-8B-Instruct", "featherless", &[Text]),
        ("mistralai/Mistral-Nemo-Instruct-2407", "featherless", &[Text]),
        ("imagen-4.0-generate-001", "imagen", &[Image]),
        ("imagen-3.0-generate-002", "imagen", &[Image]),
        ("gemini-2.5-flash-image", "gemini", &[Image]),
        ("dryrun-image-1", "dryrun", &[Image]),
    ];

    rows.into_iter()
        .map(|(name, provider, capabilities)| {
            (
                name.to_string(),
                ModelSpec {
                    name: name.to_string(),
                    provider: provider.to_string(),
                    capabilities: capabilities.to_vec(),
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_orders_defaults_per_capability() {
        let registry = ModelRegistry::default();
        let vision = registry.by_capability(Capability::Vision);
        let image = registry.by_capability(Capability::Image);
        assert_eq!(vision[0].name, "gemini-2.5-flash-lite");
        assert_eq!(image[0].provider, "imagen");
        assert!(image.iter().any(|model| model.provider == "gemini"));
        assert!(image.iter().any(|model| model.provider == "dryrun"));
    }

    #[test]
    fn ensure_checks_capability_and_strips_models_prefix() {
        let registry = ModelRegistry::default();
        assert!(registry
            .ensure("models/gemini-2.5-flash-image", Capability::Image)
            .is_some());
        assert!(registry
            .ensure("gemini-2.5-flash-image", Capability::Vision)
            .is_none());
    }
}
