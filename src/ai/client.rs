//! Cliente para comunicación con APIs de IA
//!
//! Despacha al proveedor configurado, espera cuando el servicio responde
//! ocupado (503) e intenta con el modelo de fallback si el principal falla.

use crate::ai::providers::{build_provider, AiProvider, ApiError};
use crate::config::{BusyRetryConfig, DiagramConfig, ModelConfig};
use crate::correction::{Conversation, Generator, Message};
use crate::stats::RunStats;
use colored::*;
use reqwest::blocking::Client;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

fn is_busy(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ApiError>()
        .map(ApiError::is_busy)
        .unwrap_or(false)
}

/// Llama al proveedor; ante un 503 espera `wait_ms` y reintenta, hasta
/// `max_waits` veces. Cualquier otro error se devuelve de inmediato.
pub fn chat_con_espera(
    provider: &dyn AiProvider,
    client: &Client,
    messages: &[Message],
    model_name: &str,
    busy: &BusyRetryConfig,
) -> anyhow::Result<String> {
    let mut waits = 0;
    loop {
        match provider.chat(client, messages, model_name) {
            Err(e) if is_busy(&e) && waits < busy.max_waits => {
                waits += 1;
                println!(
                    "{}",
                    format!(
                        "   ⏳ Servicio ocupado, esperando {}ms ({}/{})...",
                        busy.wait_ms, waits, busy.max_waits
                    )
                    .dimmed()
                );
                thread::sleep(Duration::from_millis(busy.wait_ms));
            }
            other => return other,
        }
    }
}

fn ejecutar_con_fallback(
    messages: &[Message],
    principal: &ModelConfig,
    fallback: Option<&ModelConfig>,
    busy: &BusyRetryConfig,
) -> anyhow::Result<String> {
    let client = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|_| Client::new());

    let provider = build_provider(principal);
    match chat_con_espera(provider.as_ref(), &client, messages, &principal.name, busy) {
        Ok(res) => Ok(res),
        Err(e) => {
            if let Some(fb) = fallback {
                println!(
                    "{}",
                    format!(
                        "   ⚠️  Modelo principal falló: {}. Intentando fallback con {}...",
                        e, fb.name
                    )
                    .yellow()
                );
                let provider = build_provider(fb);
                chat_con_espera(provider.as_ref(), &client, messages, &fb.name, busy)
            } else {
                Err(e)
            }
        }
    }
}

/// Generador respaldado por los modelos configurados
pub struct AiGenerator {
    primary: ModelConfig,
    fallback: Option<ModelConfig>,
    busy: BusyRetryConfig,
    stats: Arc<Mutex<RunStats>>,
}

impl AiGenerator {
    pub fn new(config: &DiagramConfig, stats: Arc<Mutex<RunStats>>) -> Self {
        Self {
            primary: config.primary_model.clone(),
            fallback: config.fallback_model.clone(),
            busy: config.busy_retry.clone(),
            stats,
        }
    }
}

impl Generator for AiGenerator {
    fn generate(&self, conversation: &Conversation) -> anyhow::Result<String> {
        let messages = conversation.messages();
        let res = ejecutar_con_fallback(messages, &self.primary, self.fallback.as_ref(), &self.busy)?;

        // Estimación simple: 1 token ≈ 4 caracteres
        let prompt_len: usize = messages.iter().map(|m| m.content.len()).sum();
        let tokens = (res.len() as u64 / 4) + (prompt_len as u64 / 4);
        if let Ok(mut s) = self.stats.lock() {
            s.total_tokens_used += tokens;
        }

        Ok(res)
    }
}
