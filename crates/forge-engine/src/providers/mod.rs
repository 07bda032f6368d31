use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use tracing::warn;

use crate::config::ForgeConfig;
use crate::transport::HttpTransport;

mod dryrun;
mod featherless;
mod gemini;
mod imagen;

pub use dryrun::DryrunSynthesizer;
pub use featherless::FeatherlessClient;
pub use gemini::{GeminiClient, GeminiImageSynthesizer};
pub use imagen::ImagenSynthesizer;

const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Caller-supplied photo plus its sniffed media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageInput {
    /// Sniffs the media type from magic bytes; unknown data is sent as JPEG.
    pub fn new(bytes: Vec<u8>) -> Self {
        let mime_type = image::guess_format(&bytes)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| DEFAULT_IMAGE_MIME.to_string());
        Self { bytes, mime_type }
    }

    pub fn inline_part(&self) -> Value {
        json!({
            "inlineData": {
                "mimeType": self.mime_type,
                "data": BASE64.encode(&self.bytes),
            }
        })
    }
}

/// One structured-output request to a vision/text model.
#[derive(Debug, Clone, Copy)]
pub struct JsonPrompt<'a> {
    pub system: &'a str,
    pub image: Option<&'a ImageInput>,
    pub text: &'a str,
    pub temperature: f64,
}

/// Image + text in, JSON text out.
pub trait JsonModel: Send + Sync {
    fn name(&self) -> &str;
    fn generate_json(&self, prompt: &JsonPrompt<'_>) -> Result<String>;
}

/// Chat-style text model asked for a JSON object.
///
/// Returns the reply content as-is: usually a string that still has to be
/// recovered, occasionally an already-structured object.
pub trait FlavorModel: Send + Sync {
    fn name(&self) -> &str;
    fn complete_json(&self, system: &str, user: &str) -> Result<Value>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub model: String,
    pub prompt: String,
    pub aspect_ratio: String,
    pub output_format: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

pub trait ImageSynthesizer: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, request: &SynthesisRequest) -> Result<Vec<GeneratedImage>>;
}

/// Image synthesizers keyed by the provider name in the model registry.
#[derive(Default)]
pub struct SynthesizerRegistry {
    synthesizers: BTreeMap<String, Arc<dyn ImageSynthesizer>>,
}

impl SynthesizerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ForgeConfig, transport: &HttpTransport) -> Self {
        let mut registry = Self::new();
        registry.register(GeminiImageSynthesizer::new(
            transport.clone(),
            &config.gemini_api_base,
            config.gemini_api_key.clone(),
        ));
        registry.register(ImagenSynthesizer::new(
            transport.clone(),
            &config.imagen_api_base,
            config.imagen_api_key.clone(),
        ));
        registry.register(DryrunSynthesizer);
        registry
    }

    pub fn register<S: ImageSynthesizer + 'static>(&mut self, synthesizer: S) {
        self.synthesizers
            .insert(synthesizer.name().to_string(), Arc::new(synthesizer));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ImageSynthesizer>> {
        self.synthesizers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.synthesizers.keys().cloned().collect()
    }
}

/// Base64 image parts decoded in response order.
///
/// A part that does not decode is skipped; its error only surfaces when no
/// other part decoded.
#[derive(Default)]
struct DecodedImages {
    images: Vec<GeneratedImage>,
    first_error: Option<anyhow::Error>,
}

impl DecodedImages {
    fn push(&mut self, provider: &str, encoded: &str, mime_type: Option<String>) {
        match BASE64.decode(encoded.as_bytes()) {
            Ok(bytes) => self.images.push(GeneratedImage { bytes, mime_type }),
            Err(err) => {
                warn!(provider, error = %err, "skipping undecodable image part");
                if self.first_error.is_none() {
                    self.first_error = Some(
                        anyhow::Error::new(err)
                            .context(format!("{provider} image base64 decode failed")),
                    );
                }
            }
        }
    }

    fn finish(self) -> Result<Vec<GeneratedImage>> {
        match self.first_error {
            Some(err) if self.images.is_empty() => Err(err),
            _ => Ok(self.images),
        }
    }
}

/// Google endpoints address models as `{base}/models/{model}:{method}`.
fn model_endpoint(api_base: &str, model: &str, method: &str) -> String {
    let trimmed = model.trim().trim_start_matches("models/");
    format!("{}/models/{trimmed}:{method}", api_base.trim_end_matches('/'))
}
