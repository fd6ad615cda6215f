//! Reglas para diagramas de secuencia
//!
//! Patrones simples por línea. Ninguna regla guarda estado entre llamadas.

use crate::rules::{LineRule, RuleOutcome, RuleViolation};
use once_cell::sync::Lazy;
use regex::Regex;

static NOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*note\b").expect("patrón de notas inválido"));

static ACTIVATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(activate|deactivate)\b").expect("patrón de activate inválido")
});

static METHOD_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\w+\s*\(.*\)").expect("patrón de llamadas inválido"));

static PARTICIPANT_ALIAS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(participant|actor)\s+.+\s+as\s+.+$").expect("patrón de alias inválido")
});

static SYSTEM_OUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"System\.(out|err)").expect("patrón de System.out inválido"));

static DATA_VALUES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(String|StringBuffer|Map|Queue|byte|float|int|double|long|boolean|char|List|File|Byte|Bytes|bytes|log|LOG|LOGGER|logger)\b|[\[\]]|\w[<>]\w",
    )
    .expect("patrón de tipos de datos inválido")
});

/// Regla basada en un único patrón: si hay coincidencia, la línea viola la regla
fn pattern_check(
    pattern: &Regex,
    text: &str,
    line: &str,
    line_number: usize,
    rule_name: &str,
    description: &str,
) -> RuleOutcome {
    if pattern.is_match(text) {
        RuleOutcome::Violation(RuleViolation::at_line(line_number, line, rule_name, description))
    } else {
        RuleOutcome::Pass
    }
}

#[derive(Debug, Default)]
pub struct AvoidNotesRule;

impl AvoidNotesRule {
    pub fn new() -> Self {
        Self
    }
}

impl LineRule for AvoidNotesRule {
    fn id(&self) -> &'static str {
        "avoid_notes"
    }

    fn description(&self) -> &str {
        "Do not include notes in the diagram. Encapsulate all necessary information within interaction sequence."
    }

    fn check(&self, line: &str, line_number: usize) -> RuleOutcome {
        pattern_check(&NOTE, line, line, line_number, "Avoid Notes Rule", self.description())
    }
}

#[derive(Debug, Default)]
pub struct AvoidActivateDeactivateRule;

impl AvoidActivateDeactivateRule {
    pub fn new() -> Self {
        Self
    }
}

impl LineRule for AvoidActivateDeactivateRule {
    fn id(&self) -> &'static str {
        "avoid_activate_deactivate"
    }

    fn description(&self) -> &str {
        "Avoid 'activate'/'deactivate' commands in diagrams. Focus on participant interaction and action flow."
    }

    fn check(&self, line: &str, line_number: usize) -> RuleOutcome {
        pattern_check(
            &ACTIVATION,
            line,
            line,
            line_number,
            "Activate/Deactivate Rule",
            self.description(),
        )
    }
}

/// Sin llamadas a métodos (`getFoo()`) en la descripción de un mensaje
#[derive(Debug, Default)]
pub struct NoMethodCallsInDescriptionsRule;

impl NoMethodCallsInDescriptionsRule {
    pub fn new() -> Self {
        Self
    }
}

impl LineRule for NoMethodCallsInDescriptionsRule {
    fn id(&self) -> &'static str {
        "no_method_calls_in_descriptions"
    }

    fn description(&self) -> &str {
        "No method calls in descriptions. Instead of 'Foo -> Bar : getFooBar()', use 'Foo -> Bar : Getting some foo from bar'."
    }

    fn check(&self, line: &str, line_number: usize) -> RuleOutcome {
        if line.trim_start().starts_with("title") {
            return RuleOutcome::Pass;
        }
        let Some(idx) = line.find(':') else {
            return RuleOutcome::Pass;
        };
        pattern_check(
            &METHOD_CALL,
            &line[idx + 1..],
            line,
            line_number,
            "No Method Calls In Descriptions Rule",
            self.description(),
        )
    }
}

#[derive(Debug, Default)]
pub struct ParticipantAliasRule;

impl ParticipantAliasRule {
    pub fn new() -> Self {
        Self
    }
}

impl LineRule for ParticipantAliasRule {
    fn id(&self) -> &'static str {
        "participant_alias"
    }

    fn description(&self) -> &str {
        "Avoid participant aliases in diagrams. Use original class/object names from code."
    }

    fn check(&self, line: &str, line_number: usize) -> RuleOutcome {
        pattern_check(
            &PARTICIPANT_ALIAS,
            line,
            line,
            line_number,
            "Participant Alias Rule",
            self.description(),
        )
    }
}

#[derive(Debug, Default)]
pub struct SystemOutRule;

impl SystemOutRule {
    pub fn new() -> Self {
        Self
    }
}

impl LineRule for SystemOutRule {
    fn id(&self) -> &'static str {
        "system_out"
    }

    fn description(&self) -> &str {
        "Avoid using System.out in your code."
    }

    fn check(&self, line: &str, line_number: usize) -> RuleOutcome {
        pattern_check(&SYSTEM_OUT, line, line, line_number, "System Out Rule", self.description())
    }
}

/// Sin tipos primitivos, colecciones ni loggers como participantes.
///
/// Solo se inspecciona la parte de participantes (antes del primer `:`),
/// la descripción del mensaje puede mencionar tipos libremente.
#[derive(Debug, Default)]
pub struct DataClassesAndPrimitiveRule;

impl DataClassesAndPrimitiveRule {
    pub fn new() -> Self {
        Self
    }
}

impl LineRule for DataClassesAndPrimitiveRule {
    fn id(&self) -> &'static str {
        "data_classes_and_primitives"
    }

    fn description(&self) -> &str {
        "Do not include primitive or basic data types as participants in the sequence diagram. \
        Disallow Specific Words: The line cannot contain any of the specific words: \"byte\", \"float\", \"int\", \
        \"double\", \"long\", \"boolean\", \"char\", \"List\", \"File\", and \"bytes\".\n\n\
        Disallow Square Brackets: The line cannot contain a square bracket character, either opening \"[\" or closing \"]\". \
        Do not include angle brackets \"<\" \">\". Use ~ instead of angle brackets\n"
    }

    fn check(&self, line: &str, line_number: usize) -> RuleOutcome {
        if line.trim_start().starts_with("title") {
            return RuleOutcome::Pass;
        }
        let participants = line.split(':').next().unwrap_or(line);
        pattern_check(
            &DATA_VALUES,
            participants,
            line,
            line_number,
            "Primitive Rule",
            self.description(),
        )
    }
}

/// Reglas por defecto para diagramas de secuencia, en orden de registro
pub fn sequence_rules() -> Vec<Box<dyn LineRule>> {
    vec![
        Box::new(AvoidNotesRule::new()),
        Box::new(NoMethodCallsInDescriptionsRule::new()),
        Box::new(AvoidActivateDeactivateRule::new()),
        Box::new(ParticipantAliasRule::new()),
        Box::new(SystemOutRule::new()),
        Box::new(DataClassesAndPrimitiveRule::new()),
    ]
}
