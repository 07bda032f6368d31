use crate::transport::{HttpTransport, DEFAULT_REQUEST_TIMEOUT_S, DEFAULT_TRANSPORT_RETRIES};

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_FEATHERLESS_API_URL: &str = "https://api.featherless.ai/v1/chat/completions";
pub const DEFAULT_FEATHERLESS_MODEL: &str = "meta-llama/Meta-Llama-3-8B-Instruct";
pub const DEFAULT_VISION_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-4.0-generate-001";

/// Provider credentials, endpoints and model choices, read once at start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForgeConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_api_base: String,
    pub imagen_api_key: Option<String>,
    pub imagen_api_base: String,
    /// Unset means flavor text runs in its templated degraded mode.
    pub featherless_api_key: Option<String>,
    pub featherless_api_url: String,
    pub featherless_model: String,
    pub vision_model: String,
    pub image_model: String,
    pub request_timeout_s: u64,
    pub transport_retries: usize,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ForgeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let api_base = |key: &str| non_empty(key).map(|value| value.trim_end_matches('/').to_string());

        let gemini_api_key = non_empty("GEMINI_API_KEY").or_else(|| non_empty("GOOGLE_API_KEY"));
        let gemini_api_base =
            api_base("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string());

        Self {
            imagen_api_key: non_empty("IMAGEN_API_KEY").or_else(|| gemini_api_key.clone()),
            imagen_api_base: api_base("IMAGEN_API_BASE").unwrap_or_else(|| gemini_api_base.clone()),
            gemini_api_key,
            gemini_api_base,
            featherless_api_key: non_empty("FEATHERLESS_API_KEY"),
            featherless_api_url: non_empty("FEATHERLESS_API_URL")
                .unwrap_or_else(|| DEFAULT_FEATHERLESS_API_URL.to_string()),
            featherless_model: non_empty("FEATHERLESS_MODEL")
                .unwrap_or_else(|| DEFAULT_FEATHERLESS_MODEL.to_string()),
            vision_model: non_empty("FORGE_VISION_MODEL")
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
            image_model: non_empty("FORGE_IMAGE_MODEL")
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            request_timeout_s: clamped_number(
                non_empty("FORGE_REQUEST_TIMEOUT"),
                DEFAULT_REQUEST_TIMEOUT_S as f64,
                5.0,
                300.0,
            ) as u64,
            transport_retries: clamped_number(
                non_empty("FORGE_TRANSPORT_RETRIES"),
                DEFAULT_TRANSPORT_RETRIES as f64,
                0.0,
                4.0,
            ) as usize,
        }
    }

    pub fn transport(&self) -> HttpTransport {
        HttpTransport::new(self.request_timeout_s, self.transport_retries)
    }
}

fn clamped_number(raw: Option<String>, default: f64, min: f64, max: f64) -> f64 {
    raw.and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(default)
        .clamp(min, max)
        .round()
}
