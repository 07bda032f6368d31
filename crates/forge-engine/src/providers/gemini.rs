use anyhow::Result;
use forge_contracts::ForgeError;
use serde_json::{json, Map, Value};

use super::{
    model_endpoint, DecodedImages, GeneratedImage, ImageSynthesizer, JsonModel, JsonPrompt, SynthesisRequest,
};
use crate::transport::{Auth, HttpTransport};

const PROVIDER: &str = "Gemini";

fn missing_key() -> anyhow::Error {
    ForgeError::Config("GEMINI_API_KEY or GOOGLE_API_KEY not set".to_string()).into()
}

/// `generateContent` client used for vision analysis, evolution and skill
/// matching.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    transport: HttpTransport,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl GeminiClient {
    pub fn new(
        transport: HttpTransport,
        api_base: &str,
        api_key: Option<String>,
        model: &str,
    ) -> Self {
        Self {
            transport,
            api_base: api_base.to_string(),
            api_key,
            model: model.to_string(),
        }
    }

    fn build_payload(prompt: &JsonPrompt<'_>) -> Value {
        let mut parts = Vec::new();
        if let Some(image) = prompt.image {
            parts.push(image.inline_part());
        }
        parts.push(json!({ "text": prompt.text }));
        json!({
            "systemInstruction": {
                "parts": [{ "text": prompt.system }],
            },
            "contents": [{
                "role": "user",
                "parts": parts,
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "temperature": prompt.temperature,
            },
        })
    }

    /// Concatenated text parts of the first candidate.
    fn extract_text(response: &Value) -> Result<String> {
        let parts = response
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first())
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .ok_or_else(|| ForgeError::malformed(PROVIDER, "response has no candidate parts"))?;
        let text = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<&str>>()
            .join("");
        if text.trim().is_empty() {
            return Err(ForgeError::malformed(PROVIDER, "candidate carried no text").into());
        }
        Ok(text)
    }
}

impl JsonModel for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate_json(&self, prompt: &JsonPrompt<'_>) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(missing_key)?;
        let endpoint = model_endpoint(&self.api_base, &self.model, "generateContent");
        let response = self.transport.post_json(
            PROVIDER,
            &endpoint,
            Auth::QueryKey(api_key),
            &Self::build_payload(prompt),
        )?;
        Self::extract_text(&response)
    }
}

/// Image synthesis through `generateContent` with an image-only response
/// modality; images come back as `inlineData` parts.
#[derive(Debug, Clone)]
pub struct GeminiImageSynthesizer {
    transport: HttpTransport,
    api_base: String,
    api_key: Option<String>,
}

impl GeminiImageSynthesizer {
    pub fn new(transport: HttpTransport, api_base: &str, api_key: Option<String>) -> Self {
        Self {
            transport,
            api_base: api_base.to_string(),
            api_key,
        }
    }

    fn build_payload(request: &SynthesisRequest) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt }],
            }],
            "generationConfig": {
                "candidateCount": 1,
                "responseModalities": ["IMAGE"],
                "imageConfig": {
                    "aspectRatio": request.aspect_ratio,
                },
            },
        })
    }

    fn extract_images(response: &Value) -> Result<Vec<GeneratedImage>> {
        let candidates = response
            .get("candidates")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut decoded = DecodedImages::default();

        for candidate in candidates {
            let parts = candidate
                .get("content")
                .and_then(|content| content.get("parts"))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for part in parts {
                let inline = part
                    .get("inlineData")
                    .or_else(|| part.get("inline_data"))
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_else(Map::new);
                let data = inline
                    .get("data")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if data.is_empty() {
                    continue;
                }
                let mime_type = inline
                    .get("mimeType")
                    .or_else(|| inline.get("mime_type"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                decoded.push(PROVIDER, data, mime_type);
            }
        }

        decoded.finish()
    }
}

impl ImageSynthesizer for GeminiImageSynthesizer {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, request: &SynthesisRequest) -> Result<Vec<GeneratedImage>> {
        let api_key = self.api_key.as_deref().ok_or_else(missing_key)?;
        let endpoint = model_endpoint(&self.api_base, &request.model, "generateContent");
        let response = self.transport.post_json(
            PROVIDER,
            &endpoint,
            Auth::QueryKey(api_key),
            &Self::build_payload(request),
        )?;
        Self::extract_images(&response)
    }
}
