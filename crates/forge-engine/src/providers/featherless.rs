use anyhow::Result;
use forge_contracts::ForgeError;
use serde_json::{json, Value};

use super::FlavorModel;
use crate::transport::{Auth, HttpTransport};

const PROVIDER: &str = "Featherless";

/// OpenAI chat-completions compatible client for flavor text.
#[derive(Debug, Clone)]
pub struct FeatherlessClient {
    transport: HttpTransport,
    api_url: String,
    api_key: String,
    model: String,
}

impl FeatherlessClient {
    pub fn new(transport: HttpTransport, api_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            transport,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    fn build_payload(&self, system: &str, user: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "response_format": {"type": "json_object"},
        })
    }

    /// `choices[0].message.content`, left unparsed.
    fn extract_content(response: &Value) -> Result<Value> {
        let content = response
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .filter(|content| !content.is_null())
            .cloned()
            .ok_or_else(|| ForgeError::malformed(PROVIDER, "response has no message content"))?;
        Ok(content)
    }
}

impl FlavorModel for FeatherlessClient {
    fn name(&self) -> &str {
        "featherless"
    }

    fn complete_json(&self, system: &str, user: &str) -> Result<Value> {
        let response = self.transport.post_json(
            PROVIDER,
            &self.api_url,
            Auth::Bearer(&self.api_key),
            &self.build_payload(system, user),
        )?;
        Self::extract_content(&response)
    }
}
