// src/ai/providers/openai_compat.rs
use super::{chat_messages, check_status};
use crate::correction::Message;
use anyhow::Result;
use reqwest::blocking::Client;
use serde_json::json;

/// OpenAI y compatibles (LM Studio, Groq, DeepSeek, Kimi)
pub struct OpenAiCompatProvider {
    api_key: String,
    url: String,
}

impl OpenAiCompatProvider {
    pub fn new(api_key: &str, url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            url: url.to_string(),
        }
    }
}

impl super::AiProvider for OpenAiCompatProvider {
    fn chat(&self, client: &Client, messages: &[Message], model_name: &str) -> Result<String> {
        let base = self.url.trim_end_matches('/');
        let url = if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        };

        let mut request = client.post(&url);
        if !self.api_key.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = request
            .json(&json!({
                "model": model_name,
                "messages": chat_messages(messages)
            }))
            .send()?;

        let status = response.status();
        let body_text = response.text()?;
        check_status("OpenAI-Compat", status, &body_text)?;

        let body: serde_json::Value = serde_json::from_str(&body_text)?;
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Estructura de OpenAI-Compat inesperada. Body: {}",
                    body_text
                )
            })
    }
}
