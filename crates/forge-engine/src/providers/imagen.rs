use anyhow::Result;
use forge_contracts::ForgeError;
use serde_json::{json, Value};

use super::{model_endpoint, DecodedImages, GeneratedImage, ImageSynthesizer, SynthesisRequest};
use crate::transport::{Auth, HttpTransport};

const PROVIDER: &str = "Imagen";
const ASPECT_RATIOS: [&str; 5] = ["1:1", "3:4", "4:3", "9:16", "16:9"];

/// Dedicated text-to-image `:predict` endpoint.
#[derive(Debug, Clone)]
pub struct ImagenSynthesizer {
    transport: HttpTransport,
    api_base: String,
    api_key: Option<String>,
}

impl ImagenSynthesizer {
    pub fn new(transport: HttpTransport, api_base: &str, api_key: Option<String>) -> Self {
        Self {
            transport,
            api_base: api_base.to_string(),
            api_key,
        }
    }

    fn resolve_model_name(raw_model: &str) -> String {
        let trimmed = raw_model.trim().trim_start_matches("models/").to_string();
        match trimmed.to_ascii_lowercase().as_str() {
            "imagen-4.0-ultra" | "imagen-4-ultra" => "imagen-4.0-ultra-generate-001".to_string(),
            "imagen-4" | "imagen-4.0" => "imagen-4.0-generate-001".to_string(),
            "imagen-3" | "imagen-3.0" => "imagen-3.0-generate-002".to_string(),
            _ => trimmed,
        }
    }

    fn output_mime_type(output_format: &str) -> &'static str {
        match output_format.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            _ => "image/png",
        }
    }

    fn build_payload(request: &SynthesisRequest) -> Value {
        let aspect_ratio = ASPECT_RATIOS
            .iter()
            .find(|candidate| **candidate == request.aspect_ratio.trim())
            .copied()
            .unwrap_or("1:1");
        json!({
            "instances": [{
                "prompt": request.prompt,
            }],
            "parameters": {
                "sampleCount": 1,
                "aspectRatio": aspect_ratio,
                "outputOptions": {
                    "mimeType": Self::output_mime_type(&request.output_format),
                },
            },
        })
    }

    fn extract_predictions(response: &Value) -> Result<Vec<GeneratedImage>> {
        let mut decoded = DecodedImages::default();
        let predictions = response
            .get("predictions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for row in predictions {
            let Some(obj) = row.as_object() else {
                continue;
            };
            if let Some(encoded) = obj
                .get("bytesBase64Encoded")
                .or_else(|| obj.get("bytes_base64_encoded"))
                .and_then(Value::as_str)
            {
                let mime_type = obj
                    .get("mimeType")
                    .or_else(|| obj.get("mime_type"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                decoded.push(PROVIDER, encoded, mime_type);
                continue;
            }

            // SDK-style descriptor: {image: {imageBytes, mimeType}}
            let Some(generated) = obj
                .get("image")
                .or_else(|| obj.get("generatedImage"))
                .and_then(Value::as_object)
            else {
                continue;
            };
            if let Some(encoded) = generated
                .get("imageBytes")
                .or_else(|| generated.get("bytesBase64Encoded"))
                .and_then(Value::as_str)
            {
                let mime_type = generated
                    .get("mimeType")
                    .or_else(|| generated.get("mime_type"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                decoded.push(PROVIDER, encoded, mime_type);
            }
        }
        decoded.finish()
    }
}

impl ImageSynthesizer for ImagenSynthesizer {
    fn name(&self) -> &str {
        "imagen"
    }

    fn generate(&self, request: &SynthesisRequest) -> Result<Vec<GeneratedImage>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ForgeError::Config("IMAGEN_API_KEY, GEMINI_API_KEY or GOOGLE_API_KEY not set".to_string())
        })?;
        let model = Self::resolve_model_name(&request.model);
        let endpoint = model_endpoint(&self.api_base, &model, "predict");
        let response = self.transport.post_json(
            PROVIDER,
            &endpoint,
            Auth::QueryKey(api_key),
            &Self::build_payload(request),
        )?;
        Self::extract_predictions(&response)
    }
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use forge_contracts::FailureKind;

    use super::*;
    use crate::transport::classify_failure;

    fn request(aspect_ratio: &str, output_format: &str) -> SynthesisRequest {
        SynthesisRequest {
            model: "imagen-4.0-generate-001".to_string(),
            prompt: "a glowing lamp".to_string(),
            aspect_ratio: aspect_ratio.to_string(),
            output_format: output_format.to_string(),
        }
    }

    #[test]
    fn resolve_model_name_expands_aliases() {
        assert_eq!(
            ImagenSynthesizer::resolve_model_name("models/imagen-4"),
            "imagen-4.0-generate-001"
        );
        assert_eq!(
            ImagenSynthesizer::resolve_model_name("imagen-3.0-generate-002"),
            "imagen-3.0-generate-002"
        );
    }

    #[test]
    fn payload_uses_single_square_png_sample() {
        let payload = ImagenSynthesizer::build_payload(&request("1:1", "png"));
        assert_eq!(payload["instances"][0]["prompt"], json!("a glowing lamp"));
        assert_eq!(payload["parameters"]["sampleCount"], json!(1));
        assert_eq!(payload["parameters"]["aspectRatio"], json!("1:1"));
        assert_eq!(
            payload["parameters"]["outputOptions"]["mimeType"],
            json!("image/png")
        );

        let odd = ImagenSynthesizer::build_payload(&request("7:5", "jpg"));
        assert_eq!(odd["parameters"]["aspectRatio"], json!("1:1"));
        assert_eq!(odd["parameters"]["outputOptions"]["mimeType"], json!("image/jpeg"));
    }

    #[test]
    fn extract_predictions_reads_both_descriptor_shapes() -> anyhow::Result<()> {
        let response = json!({
            "predictions": [
                {"bytesBase64Encoded": BASE64.encode(b"first"), "mimeType": "image/png"},
                {"image": {"imageBytes": BASE64.encode(b"second")}},
                {"raiFilteredReason": "blocked"},
                "junk"
            ]
        });
        let images = ImagenSynthesizer::extract_predictions(&response)?;
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].mime_type.as_deref(), Some("image/png"));
        assert_eq!(images[1].bytes, b"second".to_vec());
        Ok(())
    }

    #[test]
    fn empty_predictions_yield_no_images() -> anyhow::Result<()> {
        assert!(ImagenSynthesizer::extract_predictions(&json!({"predictions": []}))?.is_empty());
        assert!(ImagenSynthesizer::extract_predictions(&json!({}))?.is_empty());
        Ok(())
    }

    #[test]
    fn corrupt_prediction_after_valid_one_keeps_the_valid_one() -> anyhow::Result<()> {
        let response = json!({
            "predictions": [
                {"bytesBase64Encoded": BASE64.encode(b"first"), "mimeType": "image/png"},
                {"bytesBase64Encoded": "%%%"}
            ]
        });
        let images = ImagenSynthesizer::extract_predictions(&response)?;
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].bytes, b"first".to_vec());
        Ok(())
    }

    #[test]
    fn only_corrupt_predictions_are_malformed() {
        let response = json!({"predictions": [{"image": {"imageBytes": "%%%"}}]});
        match ImagenSynthesizer::extract_predictions(&response) {
            Ok(images) => panic!("unexpected images {}", images.len()),
            Err(err) => assert_eq!(classify_failure(&err), FailureKind::UpstreamMalformed),
        }
    }
}
