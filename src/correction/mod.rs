//! Loop de corrección de diagramas
//!
//! GENERATE → VALIDATE → (sin violaciones: fin) | (presupuesto disponible:
//! feedback → reenvío → VALIDATE) | (presupuesto agotado: se devuelve el
//! último candidato con sus violaciones).
//!
//! La conversación es un log inmutable que se pasa por valor entre rondas.
//! Ningún error del generador escapa del loop: una llamada fallida consume
//! la ronda y el candidato anterior se vuelve a validar.

pub mod prompts;

pub use prompts::PromptTemplates;

use crate::ai::utils::extraer_diagrama;
use crate::rules::engine::serialize_report;
use crate::rules::{DiagramFamily, RuleEngine, RuleViolation};
use colored::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Historial de mensajes. Solo crece: `with` consume y devuelve uno nuevo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn awaiting_feedback(&self) -> bool {
        matches!(self.last(), Some(m) if m.role == Role::Assistant)
    }
}

/// Servicio de generación: conversación completa en, texto o error fuera
pub trait Generator: Send + Sync {
    fn generate(&self, conversation: &Conversation) -> anyhow::Result<String>;
}

/// Señal de cancelación compartida, consultada antes de cada ronda
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoopStatus {
    Passed,
    Exhausted,
    Cancelled,
}

impl std::fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopStatus::Passed => write!(f, "passed"),
            LoopStatus::Exhausted => write!(f, "exhausted"),
            LoopStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CorrectionOutcome {
    /// Último candidato, válido o no
    pub artifact: String,
    pub status: LoopStatus,
    /// Pasadas de VALIDATE; `refine` valida una vez antes de la primera llamada
    pub validations: u32,
    pub generation_calls: u32,
    pub failed_rounds: u32,
    /// Violaciones del último candidato (vacío si `Passed`)
    pub violations: Vec<RuleViolation>,
    pub conversation: Conversation,
}

impl CorrectionOutcome {
    pub fn passed(&self) -> bool {
        self.status == LoopStatus::Passed
    }
}

/// Material original que se reenvía sin cambios en cada feedback
#[derive(Debug, Clone, Default)]
pub struct CorrectionRequest {
    pub source: String,
    pub title: String,
}

pub const MISSING_DIAGRAM_RULE: &str = "MissingDiagram";

fn missing_diagram(family: DiagramFamily) -> RuleViolation {
    RuleViolation::for_document(
        MISSING_DIAGRAM_RULE,
        format!(
            "No Mermaid diagram was found in the answer. Reply with a single ```mermaid block starting with `{}`.",
            family.keyword()
        ),
    )
}

pub struct CorrectionLoop<'a> {
    generator: &'a dyn Generator,
    engine: &'a RuleEngine,
    templates: &'a PromptTemplates,
    family: DiagramFamily,
    budget: u32,
    cancel: CancelFlag,
    verbose: bool,
}

impl<'a> CorrectionLoop<'a> {
    pub fn new(
        generator: &'a dyn Generator,
        engine: &'a RuleEngine,
        templates: &'a PromptTemplates,
        family: DiagramFamily,
        budget: u32,
    ) -> Self {
        Self {
            generator,
            engine,
            templates,
            family,
            budget: budget.max(1),
            cancel: CancelFlag::new(),
            verbose: true,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// Conversación inicial: system + instrucción de generación
    pub fn seed(&self, request: &CorrectionRequest) -> Conversation {
        Conversation::new()
            .with(Message::system(self.templates.system.clone()))
            .with(Message::user(self.templates.instruction(
                self.family,
                &request.source,
                &request.title,
            )))
    }

    /// Empieza en GENERATE con la conversación `seed`
    pub fn run(&self, request: &CorrectionRequest, seed: Conversation) -> CorrectionOutcome {
        self.drive(request, seed, String::new(), true)
    }

    /// Empieza en VALIDATE sobre un diagrama ya existente
    pub fn refine(
        &self,
        request: &CorrectionRequest,
        seed: Conversation,
        artifact: &str,
    ) -> CorrectionOutcome {
        let conversation =
            seed.with(Message::assistant(format!("```mermaid\n{}\n```", artifact)));
        self.drive(request, conversation, artifact.to_string(), false)
    }

    fn validate(&self, candidate: &str) -> Vec<RuleViolation> {
        if candidate.trim().is_empty() {
            vec![missing_diagram(self.family)]
        } else {
            self.engine.check_content(candidate)
        }
    }

    fn feedback(
        &self,
        request: &CorrectionRequest,
        candidate: &str,
        violations: &[RuleViolation],
    ) -> String {
        let json = serialize_report(violations).unwrap_or_else(|_| "[]".to_string());
        self.templates
            .feedback(&request.source, &request.title, &json, candidate)
    }

    fn log(&self, message: ColoredString) {
        if self.verbose {
            println!("{}", message);
        }
    }

    fn drive(
        &self,
        request: &CorrectionRequest,
        mut conversation: Conversation,
        mut candidate: String,
        mut generate: bool,
    ) -> CorrectionOutcome {
        let mut violations = Vec::new();
        let mut validations = 0;
        let mut calls = 0;
        let mut failed = 0;

        let status = loop {
            if generate {
                if calls >= self.budget {
                    break LoopStatus::Exhausted;
                }
                if self.cancel.is_cancelled() {
                    break LoopStatus::Cancelled;
                }
                calls += 1;

                // Con respuesta previa se agrega el feedback; si la última
                // llamada falló se reenvía la misma conversación
                let pending = if conversation.awaiting_feedback() {
                    conversation
                        .clone()
                        .with(Message::user(self.feedback(request, &candidate, &violations)))
                } else {
                    conversation.clone()
                };

                match self.generator.generate(&pending) {
                    Ok(raw) => {
                        candidate = extraer_diagrama(&raw, self.family).unwrap_or_default();
                        conversation = pending.with(Message::assistant(raw));
                    }
                    Err(e) => {
                        failed += 1;
                        self.log(
                            format!("   ⚠️  Ronda {}/{} sin respuesta: {}", calls, self.budget, e)
                                .yellow(),
                        );
                    }
                }
            }

            violations = self.validate(&candidate);
            validations += 1;
            if violations.is_empty() {
                break LoopStatus::Passed;
            }
            self.log(
                format!(
                    "   🔁 Ronda {}/{}: {} violaciones en {}",
                    calls,
                    self.budget,
                    violations.len(),
                    request.title
                )
                .dimmed(),
            );
            generate = true;
        };

        match status {
            LoopStatus::Passed => self.log(
                format!("   ✅ {} válido tras {} llamadas", request.title, calls).green(),
            ),
            LoopStatus::Exhausted => self.log(
                format!(
                    "   ❌ {}: presupuesto agotado con {} violaciones",
                    request.title,
                    violations.len()
                )
                .red(),
            ),
            LoopStatus::Cancelled => {
                self.log(format!("   ⏹️  {}: cancelado", request.title).yellow())
            }
        }

        CorrectionOutcome {
            artifact: candidate,
            status,
            validations,
            generation_calls: calls,
            failed_rounds: failed,
            violations,
            conversation,
        }
    }
}
