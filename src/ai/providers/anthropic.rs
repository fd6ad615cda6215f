// src/ai/providers/anthropic.rs
use super::{check_status, role_name, split_system};
use crate::correction::Message;
use anyhow::Result;
use reqwest::blocking::Client;
use serde_json::json;

pub struct AnthropicProvider {
    api_key: String,
    url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: &str, url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            url: url.to_string(),
        }
    }
}

impl super::AiProvider for AnthropicProvider {
    fn chat(&self, client: &Client, messages: &[Message], model_name: &str) -> Result<String> {
        let base = self.url.trim_end_matches('/');
        let url = if base.ends_with("/v1") {
            format!("{}/messages", base)
        } else {
            format!("{}/v1/messages", base)
        };

        let (system, turns) = split_system(messages);
        let turns: Vec<serde_json::Value> = turns
            .iter()
            .map(|(role, content)| json!({"role": role_name(*role), "content": content}))
            .collect();

        let mut payload = json!({
            "model": model_name,
            "max_tokens": 4096,
            "messages": turns
        });
        if !system.is_empty() {
            payload["system"] = json!(system);
        }

        let response = client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&payload)
            .send()?;

        let status = response.status();
        let body_text = response.text()?;
        check_status("Anthropic", status, &body_text)?;

        let body: serde_json::Value = serde_json::from_str(&body_text)?;
        body["content"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                anyhow::anyhow!("Estructura de Anthropic inesperada. Body: {}", body_text)
            })
    }
}
