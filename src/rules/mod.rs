//! Reglas de validación de diagramas Mermaid
//!
//! Cada regla es un predicado sin estado sobre una línea del diagrama
//! (`LineRule`) o sobre el documento completo (`ContentRule`). El resultado
//! es siempre un `RuleOutcome`: `Pass` o una `Violation` estructurada que
//! luego se serializa y se reenvía al modelo como feedback.

pub mod classes;
pub mod document;
pub mod engine;
pub mod relationship;
pub mod sequence;

pub use engine::RuleEngine;
pub use relationship::{Relationship, RelationshipKind};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Familia de diagrama. Cada familia tiene su propio conjunto de reglas.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DiagramFamily {
    Class,
    Sequence,
}

impl DiagramFamily {
    /// Palabra clave con la que debe empezar el cuerpo del diagrama
    pub fn keyword(&self) -> &'static str {
        match self {
            DiagramFamily::Class => "classDiagram",
            DiagramFamily::Sequence => "sequenceDiagram",
        }
    }
}

impl fmt::Display for DiagramFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagramFamily::Class => write!(f, "class"),
            DiagramFamily::Sequence => write!(f, "sequence"),
        }
    }
}

impl FromStr for DiagramFamily {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "class" | "classes" | "classdiagram" => Ok(DiagramFamily::Class),
            "sequence" | "seq" | "sequencediagram" => Ok(DiagramFamily::Sequence),
            other => Err(anyhow::anyhow!(
                "Familia de diagrama desconocida '{}'. Usa 'class' o 'sequence'",
                other
            )),
        }
    }
}

/// Una violación concreta de una regla.
///
/// `line_number` es 1-based para reglas de línea y 0 para reglas de documento
/// (en ese caso `violated_line` queda vacío).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RuleViolation {
    pub line_number: usize,
    pub violated_line: String,
    pub rule_name: String,
    pub description: String,
}

impl RuleViolation {
    pub fn at_line(
        line_number: usize,
        line: &str,
        rule_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            line_number,
            violated_line: line.to_string(),
            rule_name: rule_name.into(),
            description: description.into(),
        }
    }

    pub fn for_document(rule_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            line_number: 0,
            violated_line: String::new(),
            rule_name: rule_name.into(),
            description: description.into(),
        }
    }
}

/// Resultado de aplicar una regla
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    Pass,
    Violation(RuleViolation),
}

impl RuleOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, RuleOutcome::Pass)
    }

    pub fn violation(self) -> Option<RuleViolation> {
        match self {
            RuleOutcome::Pass => None,
            RuleOutcome::Violation(v) => Some(v),
        }
    }

    /// Nombre de la regla violada, o "pass"
    pub fn rule_name(&self) -> &str {
        match self {
            RuleOutcome::Pass => "pass",
            RuleOutcome::Violation(v) => &v.rule_name,
        }
    }
}

impl From<RuleViolation> for RuleOutcome {
    fn from(v: RuleViolation) -> Self {
        RuleOutcome::Violation(v)
    }
}

/// Regla que se evalúa línea a línea
pub trait LineRule: Send + Sync {
    /// Identificador estable, usado en la selección de reglas por YAML
    fn id(&self) -> &'static str;

    fn description(&self) -> &str;

    fn check(&self, line: &str, line_number: usize) -> RuleOutcome;
}

/// Regla que se evalúa sobre el diagrama completo
pub trait ContentRule: Send + Sync {
    fn id(&self) -> &'static str;

    fn description(&self) -> &str;

    fn check(&self, content: &str) -> RuleOutcome;
}

/// Violación común a todas las reglas que dependen del parser de relaciones:
/// la línea contiene un operador pero no es una relación válida.
pub(crate) fn invalid_relationship(line: &str, line_number: usize) -> RuleOutcome {
    RuleOutcome::Violation(RuleViolation::at_line(
        line_number,
        line,
        "ValidRelationshipRule",
        "Not a valid relationship",
    ))
}
