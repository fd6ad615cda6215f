//! Motor de reglas
//!
//! Conjunto inmutable y ordenado de reglas de línea y de documento. Se
//! construye una vez por familia de diagrama y se reutiliza en cada ronda
//! de validación.

use crate::rules::classes::class_rules;
use crate::rules::document::DiagramKeywordRule;
use crate::rules::sequence::sequence_rules;
use crate::rules::{ContentRule, DiagramFamily, LineRule, RuleViolation};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Selección de reglas por familia, cargada desde YAML
///
/// ```yaml
/// class:
///   disabled: [no_map]
/// sequence:
///   only: [avoid_notes, participant_alias]
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSelection {
    #[serde(default)]
    pub class: FamilySelection,
    #[serde(default)]
    pub sequence: FamilySelection,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FamilySelection {
    /// Si no está vacío, solo estas reglas quedan activas
    #[serde(default)]
    pub only: Vec<String>,
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl FamilySelection {
    pub fn allows(&self, id: &str) -> bool {
        (self.only.is_empty() || self.only.iter().any(|r| r == id))
            && !self.disabled.iter().any(|r| r == id)
    }
}

impl RuleSelection {
    pub fn load_from_yaml(yaml_path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(yaml_path)?;
        let selection: RuleSelection = serde_yaml::from_str(&content)?;
        Ok(selection)
    }

    pub fn for_family(&self, family: DiagramFamily) -> &FamilySelection {
        match family {
            DiagramFamily::Class => &self.class,
            DiagramFamily::Sequence => &self.sequence,
        }
    }
}

pub struct RuleEngine {
    line_rules: Vec<Box<dyn LineRule>>,
    content_rules: Vec<Box<dyn ContentRule>>,
}

impl RuleEngine {
    pub fn new(line_rules: Vec<Box<dyn LineRule>>, content_rules: Vec<Box<dyn ContentRule>>) -> Self {
        Self {
            line_rules,
            content_rules,
        }
    }

    /// Reglas por defecto de la familia más la verificación de palabra clave
    pub fn for_family(family: DiagramFamily) -> Self {
        Self::for_family_with(family, &FamilySelection::default())
    }

    pub fn for_family_with(family: DiagramFamily, selection: &FamilySelection) -> Self {
        let line_rules = match family {
            DiagramFamily::Class => class_rules(),
            DiagramFamily::Sequence => sequence_rules(),
        };
        let content_rules: Vec<Box<dyn ContentRule>> = vec![Box::new(DiagramKeywordRule::new(family))];

        Self {
            line_rules: line_rules.into_iter().filter(|r| selection.allows(r.id())).collect(),
            content_rules: content_rules
                .into_iter()
                .filter(|r| selection.allows(r.id()))
                .collect(),
        }
    }

    /// Agrega una regla de documento al final del orden de registro
    pub fn with_content_rule(mut self, rule: Box<dyn ContentRule>) -> Self {
        self.content_rules.push(rule);
        self
    }

    pub fn line_rules(&self) -> &[Box<dyn LineRule>] {
        &self.line_rules
    }

    pub fn content_rules(&self) -> &[Box<dyn ContentRule>] {
        &self.content_rules
    }

    /// Aplica solo las reglas de línea. Numeración 1-based.
    pub fn check_lines<S: AsRef<str>>(&self, lines: &[S]) -> Vec<RuleViolation> {
        let mut violations = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            let line = line.as_ref();
            for rule in &self.line_rules {
                if let Some(v) = rule.check(line, idx + 1).violation() {
                    violations.push(v);
                }
            }
        }
        violations
    }

    /// Todas las violaciones de línea en orden de línea (empates por orden de
    /// registro) seguidas de las violaciones de documento.
    pub fn check_content(&self, content: &str) -> Vec<RuleViolation> {
        let lines: Vec<&str> = content
            .split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .collect();

        let mut violations = self.check_lines(&lines);
        for rule in &self.content_rules {
            if let Some(v) = rule.check(content).violation() {
                violations.push(v);
            }
        }
        violations
    }
}

/// Reporte JSON `[{lineNumber, violatedLine, ruleName, description}]`
pub fn serialize_report(violations: &[RuleViolation]) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(violations)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleOutcome;
    use std::io::Write;

    struct AlwaysPass;

    impl LineRule for AlwaysPass {
        fn id(&self) -> &'static str {
            "always_pass"
        }
        fn description(&self) -> &str {
            "siempre pasa"
        }
        fn check(&self, _line: &str, _line_number: usize) -> RuleOutcome {
            RuleOutcome::Pass
        }
    }

    impl ContentRule for AlwaysPass {
        fn id(&self) -> &'static str {
            "always_pass"
        }
        fn description(&self) -> &str {
            "siempre pasa"
        }
        fn check(&self, _content: &str) -> RuleOutcome {
            RuleOutcome::Pass
        }
    }

    struct FlagWord(&'static str, &'static str);

    impl LineRule for FlagWord {
        fn id(&self) -> &'static str {
            self.1
        }
        fn description(&self) -> &str {
            "palabra prohibida"
        }
        fn check(&self, line: &str, line_number: usize) -> RuleOutcome {
            if line.contains(self.0) {
                RuleViolation::at_line(line_number, line, self.1, "palabra prohibida").into()
            } else {
                RuleOutcome::Pass
            }
        }
    }

    struct DocFail;

    impl ContentRule for DocFail {
        fn id(&self) -> &'static str {
            "doc_fail"
        }
        fn description(&self) -> &str {
            "falla siempre"
        }
        fn check(&self, _content: &str) -> RuleOutcome {
            RuleViolation::for_document("DocFail", "falla siempre").into()
        }
    }

    #[test]
    fn test_always_pass_rules_report_nothing() {
        let engine = RuleEngine::new(vec![Box::new(AlwaysPass)], vec![Box::new(AlwaysPass)]);
        for input in ["", "classDiagram\nint -- List<Foo>", "note left\r\nSystem.out"] {
            assert!(engine.check_content(input).is_empty());
        }
    }

    #[test]
    fn test_ordering_line_then_rule_then_document() {
        let engine = RuleEngine::new(
            vec![Box::new(FlagWord("x", "first")), Box::new(FlagWord("y", "second"))],
            vec![Box::new(DocFail)],
        );
        let found = engine.check_content("xy\nok\r\ny");
        let summary: Vec<(usize, &str)> = found
            .iter()
            .map(|v| (v.line_number, v.rule_name.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![(1, "first"), (1, "second"), (3, "second"), (0, "DocFail")]
        );
        // \r se elimina antes de aplicar las reglas
        assert_eq!(found[2].violated_line, "y");
    }

    #[test]
    fn test_check_content_is_idempotent() {
        let engine = RuleEngine::for_family(DiagramFamily::Class);
        let diagram = "classDiagram\n  Order *-- List<Item>\n  Order -- int\n  Employee[] -- Employee";
        let first = engine.check_content(diagram);
        let second = engine.check_content(diagram);
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_clean_class_diagram_passes() {
        let engine = RuleEngine::for_family(DiagramFamily::Class);
        let diagram = "classDiagram\n  Customer \"1\" --> \"*\" Order : places\n  Order *-- \"many\" LineItem\n  class Order {\n    +List~LineItem~ items\n  }";
        assert!(engine.check_content(diagram).is_empty());
    }

    #[test]
    fn test_sequence_family_flags_each_rule() {
        let engine = RuleEngine::for_family(DiagramFamily::Sequence);
        let diagram = "sequenceDiagram\n  participant Service as S\n  Note over S: hola\n  S->>Repo: findAll()";
        let names: Vec<String> = engine
            .check_content(diagram)
            .into_iter()
            .map(|v| v.rule_name)
            .collect();
        assert_eq!(
            names,
            vec![
                "Participant Alias Rule",
                "Avoid Notes Rule",
                "No Method Calls In Descriptions Rule"
            ]
        );
    }

    #[test]
    fn test_missing_keyword_is_document_violation() {
        let engine = RuleEngine::for_family(DiagramFamily::Sequence);
        let found = engine.check_content("Alice->>Bob: hola");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].rule_name, "DiagramKeywordRule");
    }

    #[test]
    fn test_report_format() {
        let engine = RuleEngine::for_family(DiagramFamily::Class);
        let report = serialize_report(&engine.check_content("classDiagram\nFoo -- int")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&report).unwrap();
        let entry = &parsed[0];
        assert_eq!(entry["lineNumber"], 2);
        assert_eq!(entry["violatedLine"], "Foo -- int");
        assert_eq!(entry["ruleName"], "NoPrimitivesRight int");
        assert_eq!(entry["description"], "Not basic or primitive types");
    }

    #[test]
    fn test_yaml_selection() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "class:\n  disabled: [no_primitive_or_basic_types]\nsequence:\n  only: [avoid_notes]").unwrap();

        let selection = RuleSelection::load_from_yaml(file.path()).unwrap();
        let class = RuleEngine::for_family_with(DiagramFamily::Class, selection.for_family(DiagramFamily::Class));
        assert!(class.check_content("classDiagram\nFoo -- int").is_empty());
        assert_eq!(class.line_rules().len(), 3);
        assert_eq!(class.content_rules().len(), 1);

        let sequence =
            RuleEngine::for_family_with(DiagramFamily::Sequence, selection.for_family(DiagramFamily::Sequence));
        let ids: Vec<&str> = sequence.line_rules().iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["avoid_notes"]);
        assert!(sequence.content_rules().is_empty());
    }
}
