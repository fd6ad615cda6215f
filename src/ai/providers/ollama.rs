// src/ai/providers/ollama.rs
use super::{chat_messages, check_status};
use crate::correction::Message;
use anyhow::Result;
use reqwest::blocking::Client;
use serde_json::json;

pub struct OllamaProvider {
    url: String,
}

impl OllamaProvider {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }
}

impl super::AiProvider for OllamaProvider {
    fn chat(&self, client: &Client, messages: &[Message], model_name: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.url.trim_end_matches('/'));

        let response = client
            .post(&url)
            .json(&json!({
                "model": model_name,
                "messages": chat_messages(messages),
                "stream": false
            }))
            .send()?;

        let status = response.status();
        let body_text = response.text()?;
        check_status("Ollama", status, &body_text)?;

        let body: serde_json::Value = serde_json::from_str(&body_text)?;
        body["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                anyhow::anyhow!("Estructura de Ollama inesperada. Body: {}", body_text)
            })
    }
}
