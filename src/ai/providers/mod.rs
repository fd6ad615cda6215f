//! Trait AiProvider y factory build_provider
//!
//! Providers soportados (campo `provider` en ModelConfig):
//! - `"anthropic"` — Claude (Anthropic API)
//! - `"gemini"` — Google Gemini Content API
//! - `"ollama"` — Ollama local
//! - `"openai"` / `"lm-studio"` / `"groq"` / `"kimi"` / `"deepseek"` — OpenAI-compatible
//!
//! Todos reciben la conversación completa. Los errores HTTP se devuelven
//! como `ApiError` dentro de `anyhow::Error` para poder inspeccionar el status.

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openai_compat;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai_compat::OpenAiCompatProvider;

use crate::config::ModelConfig;
use crate::correction::{Message, Role};
use reqwest::blocking::Client;
use serde_json::json;
use std::fmt;

pub trait AiProvider: Send + Sync {
    fn chat(&self, client: &Client, messages: &[Message], model_name: &str) -> anyhow::Result<String>;
}

/// Respuesta no exitosa de un proveedor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub provider: &'static str,
    pub status: u16,
    pub body: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error de API {} (Status {}): {}", self.provider, self.status, self.body)
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// 503 / "overloaded": el servicio está ocupado y conviene esperar
    pub fn is_busy(&self) -> bool {
        self.status == 503 || self.status == 529
    }
}

/// Convierte un status no exitoso en `ApiError`
pub(crate) fn check_status(
    provider: &'static str,
    status: reqwest::StatusCode,
    body_text: &str,
) -> anyhow::Result<()> {
    if status.is_success() {
        return Ok(());
    }
    Err(ApiError {
        provider,
        status: status.as_u16(),
        body: body_text.to_string(),
    }
    .into())
}

pub(crate) fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Formato `[{"role", "content"}]` de OpenAI y Ollama
pub(crate) fn chat_messages(messages: &[Message]) -> Vec<serde_json::Value> {
    messages
        .iter()
        .map(|m| json!({"role": role_name(m.role), "content": m.content}))
        .collect()
}

/// Separa los mensajes de sistema y une turnos consecutivos del mismo rol,
/// como exigen Anthropic y Gemini
pub(crate) fn split_system(messages: &[Message]) -> (String, Vec<(Role, String)>) {
    let system = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut turns: Vec<(Role, String)> = Vec::new();
    for m in messages.iter().filter(|m| m.role != Role::System) {
        match turns.last_mut() {
            Some((role, content)) if *role == m.role => {
                content.push_str("\n\n");
                content.push_str(&m.content);
            }
            _ => turns.push((m.role, m.content.clone())),
        }
    }

    (system, turns)
}

/// Único punto de despacho de providers.
/// El campo `provider` en ModelConfig determina cuál se usa.
/// Si está vacío, se intenta detectar por URL.
pub fn build_provider(config: &ModelConfig) -> Box<dyn AiProvider> {
    let provider = if config.provider.is_empty() {
        let url = config.url.to_lowercase();
        if url.contains("googleapis") {
            "gemini"
        } else if url.contains("11434") {
            "ollama"
        } else if url.contains("deepseek")
            || url.contains("groq")
            || url.contains("kimi")
            || url.contains("moonshot")
            || url.contains("openai")
        {
            "openai"
        } else {
            "anthropic"
        }
    } else {
        config.provider.as_str()
    };

    let api_key = config.resolved_api_key();
    match provider {
        "gemini" => Box::new(GeminiProvider::new(&api_key, &config.url)),
        "ollama" => Box::new(OllamaProvider::new(&config.url)),
        "openai" | "lm-studio" | "groq" | "kimi" | "deepseek" => {
            Box::new(OpenAiCompatProvider::new(&api_key, &config.url))
        }
        _ => Box::new(AnthropicProvider::new(&api_key, &config.url)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_system_merges_turns() {
        let messages = [
            Message::system("sé breve"),
            Message::user("instrucción"),
            Message::user("feedback"),
            Message::assistant("diagrama"),
        ];
        let (system, turns) = split_system(&messages);
        assert_eq!(system, "sé breve");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0], (Role::User, "instrucción\n\nfeedback".to_string()));
        assert_eq!(turns[1].0, Role::Assistant);
    }

    #[test]
    fn test_api_error_downcast() {
        let err = check_status("Anthropic", reqwest::StatusCode::SERVICE_UNAVAILABLE, "busy").unwrap_err();
        let api = err.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api.status, 503);
        assert!(api.is_busy());
        assert!(err.to_string().contains("Status 503"));
        assert!(check_status("Anthropic", reqwest::StatusCode::OK, "").is_ok());
    }

    #[test]
    fn test_chat_messages_roles() {
        let json = chat_messages(&[Message::system("s"), Message::assistant("a")]);
        assert_eq!(json[0]["role"], "system");
        assert_eq!(json[1]["role"], "assistant");
        assert_eq!(json[1]["content"], "a");
    }
}
