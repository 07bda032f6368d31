//! In-crate fakes for the provider capability traits.

use std::io::Cursor;
use std::sync::Mutex;

use anyhow::Result;
use forge_contracts::ForgeError;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde_json::Value;

use crate::providers::{
    FlavorModel, GeneratedImage, ImageSynthesizer, JsonModel, JsonPrompt, SynthesisRequest,
};

#[derive(Debug, Clone)]
enum Failure {
    Transport(String),
    Malformed(String),
}

impl Failure {
    fn to_error(&self, provider: &str) -> anyhow::Error {
        match self {
            Self::Transport(message) => ForgeError::transport(provider, message.clone()).into(),
            Self::Malformed(message) => ForgeError::malformed(provider, message.clone()).into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPrompt {
    pub system: String,
    pub text: String,
    pub had_image: bool,
    pub temperature: f64,
}

pub struct ScriptedJsonModel {
    reply: std::result::Result<String, Failure>,
    prompts: Mutex<Vec<RecordedPrompt>>,
}

impl ScriptedJsonModel {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn transport_failure(message: &str) -> Self {
        Self {
            reply: Err(Failure::Transport(message.to_string())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn malformed_failure(message: &str) -> Self {
        Self {
            reply: Err(Failure::Malformed(message.to_string())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<RecordedPrompt> {
        self.prompts
            .lock()
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }
}

impl JsonModel for ScriptedJsonModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate_json(&self, prompt: &JsonPrompt<'_>) -> Result<String> {
        if let Ok(mut rows) = self.prompts.lock() {
            rows.push(RecordedPrompt {
                system: prompt.system.to_string(),
                text: prompt.text.to_string(),
                had_image: prompt.image.is_some(),
                temperature: prompt.temperature,
            });
        }
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(failure) => Err(failure.to_error("scripted")),
        }
    }
}

pub struct ScriptedFlavorModel {
    reply: std::result::Result<Value, Failure>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedFlavorModel {
    pub fn replying(reply: Value) -> Self {
        Self {
            reply: Ok(reply),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn transport_failure(message: &str) -> Self {
        Self {
            reply: Err(Failure::Transport(message.to_string())),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().map(|rows| rows.clone()).unwrap_or_default()
    }
}

impl FlavorModel for ScriptedFlavorModel {
    fn name(&self) -> &str {
        "scripted-flavor"
    }

    fn complete_json(&self, system: &str, user: &str) -> Result<Value> {
        if let Ok(mut rows) = self.calls.lock() {
            rows.push((system.to_string(), user.to_string()));
        }
        match &self.reply {
            Ok(value) => Ok(value.clone()),
            Err(failure) => Err(failure.to_error("scripted-flavor")),
        }
    }
}

pub struct ScriptedSynthesizer {
    reply: std::result::Result<Vec<GeneratedImage>, Failure>,
    requests: Mutex<Vec<SynthesisRequest>>,
}

impl ScriptedSynthesizer {
    pub fn returning(images: Vec<GeneratedImage>) -> Self {
        Self {
            reply: Ok(images),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn transport_failure(message: &str) -> Self {
        Self {
            reply: Err(Failure::Transport(message.to_string())),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<SynthesisRequest> {
        self.requests
            .lock()
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }
}

impl ImageSynthesizer for ScriptedSynthesizer {
    fn name(&self) -> &str {
        "scripted-image"
    }

    fn generate(&self, request: &SynthesisRequest) -> Result<Vec<GeneratedImage>> {
        if let Ok(mut rows) = self.requests.lock() {
            rows.push(request.clone());
        }
        match &self.reply {
            Ok(images) => Ok(images.clone()),
            Err(failure) => Err(failure.to_error("scripted-image")),
        }
    }
}

pub fn png_image(width: u32, height: u32) -> GeneratedImage {
    let image = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
    let mut bytes = Vec::new();
    let _ = DynamicImage::ImageRgba8(image).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png);
    GeneratedImage {
        bytes,
        mime_type: Some("image/png".to_string()),
    }
}
