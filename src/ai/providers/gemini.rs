// src/ai/providers/gemini.rs
use super::{check_status, split_system};
use crate::correction::{Message, Role};
use anyhow::Result;
use reqwest::blocking::Client;
use serde_json::json;

/// Google Gemini Content API (generateContent)
pub struct GeminiProvider {
    api_key: String,
    url: String,
}

impl GeminiProvider {
    pub fn new(api_key: &str, url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            url: url.to_string(),
        }
    }
}

impl super::AiProvider for GeminiProvider {
    fn chat(&self, client: &Client, messages: &[Message], model_name: &str) -> Result<String> {
        let url = if self.url.contains("generateContent") {
            self.url.clone()
        } else {
            format!(
                "{}/v1beta/models/{}:generateContent",
                self.url.trim_end_matches('/'),
                model_name
            )
        };

        // Gemini llama "model" al rol del asistente
        let (system, turns) = split_system(messages);
        let contents: Vec<serde_json::Value> = turns
            .iter()
            .map(|(role, text)| {
                let role = if *role == Role::Assistant { "model" } else { "user" };
                json!({"role": role, "parts": [{"text": text}]})
            })
            .collect();

        let mut payload = json!({ "contents": contents });
        if !system.is_empty() {
            payload["systemInstruction"] = json!({"parts": [{"text": system}]});
        }

        let response = client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&payload)
            .send()?;

        let status = response.status();
        let body_text = response.text()?;
        check_status("Gemini", status, &body_text)?;

        let body: serde_json::Value = serde_json::from_str(&body_text)?;
        body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("Estructura de Gemini inesperada. Body: {}", body_text))
    }
}
