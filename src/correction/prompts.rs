//! Plantillas de prompts
//!
//! Las plantillas integradas se pueden reemplazar dejando archivos con el
//! mismo nombre en `templates_dir` (ver `DiagramConfig`).

use crate::rules::DiagramFamily;
use colored::*;
use std::fs;
use std::path::Path;

const SYSTEM: &str = "You are an expert software architect who documents source code with Mermaid diagrams. \
You answer with a single ```mermaid fenced block and no other text.";

const CLASS_DIAGRAM: &str = r#"Create a Mermaid class diagram for the following source code.

Title: {{TITLE}}

Guidelines:
- Start the diagram with `classDiagram`.
- Use only domain classes as entities. Never use primitive or basic types (int, String, Object...) as classes.
- Do not use collections, maps or arrays as entities. Express multiplicity with cardinalities instead,
  e.g. `Order "1" *-- "many" LineItem : items`.
- Use generics with ~ instead of angle brackets inside class bodies, e.g. `+List~Item~ items`.

Source:
{{SOURCE}}
"#;

const SEQUENCE_DIAGRAM: &str = r#"Create a Mermaid sequence diagram for the following source code.

Title: {{TITLE}}

Guidelines:
- Start the diagram with `sequenceDiagram`.
- Do not use notes, participant aliases or activate/deactivate.
- Describe each message in plain words, never as a method call like `getFoo()`.
- Do not use primitive types, collections, loggers or System.out as participants.

Source:
{{SOURCE}}
"#;

const FIX: &str = r#"The Mermaid diagram "{{TITLE}}" you produced has the following problems, reported as JSON:

{{JSON}}

This is the diagram:

```mermaid
{{MERMAID}}
```

It was generated from this source:

{{SOURCE}}

Return the corrected diagram fixing every reported problem, as a single ```mermaid block.
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    pub system: String,
    pub class_diagram: String,
    pub sequence_diagram: String,
    pub fix: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            system: SYSTEM.to_string(),
            class_diagram: CLASS_DIAGRAM.to_string(),
            sequence_diagram: SEQUENCE_DIAGRAM.to_string(),
            fix: FIX.to_string(),
        }
    }
}

fn fill(template: &str, pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .fold(template.to_string(), |acc, (key, value)| acc.replace(key, value))
}

impl PromptTemplates {
    /// Carga `system.md`, `class_diagram.md`, `sequence_diagram.md` y `fix.md`
    /// desde `dir` si existen; el resto usa las plantillas integradas.
    pub fn load(dir: Option<&Path>) -> Self {
        let mut templates = Self::default();
        let Some(dir) = dir else {
            return templates;
        };

        let slots: [(&str, &mut String); 4] = [
            ("system.md", &mut templates.system),
            ("class_diagram.md", &mut templates.class_diagram),
            ("sequence_diagram.md", &mut templates.sequence_diagram),
            ("fix.md", &mut templates.fix),
        ];
        for (name, slot) in slots {
            let path = dir.join(name);
            if !path.exists() {
                continue;
            }
            match fs::read_to_string(&path) {
                Ok(content) => *slot = content,
                Err(e) => println!(
                    "{}",
                    format!("   ⚠️  No se pudo leer la plantilla {}: {}", path.display(), e).yellow()
                ),
            }
        }

        templates
    }

    /// Instrucción inicial de generación
    pub fn instruction(&self, family: DiagramFamily, source: &str, title: &str) -> String {
        let template = match family {
            DiagramFamily::Class => &self.class_diagram,
            DiagramFamily::Sequence => &self.sequence_diagram,
        };
        fill(template, &[("{{SOURCE}}", source), ("{{TITLE}}", title)])
    }

    /// Prompt de corrección con el reporte de violaciones y el diagrama actual
    pub fn feedback(&self, source: &str, title: &str, json: &str, mermaid: &str) -> String {
        fill(
            &self.fix,
            &[
                ("{{SOURCE}}", source),
                ("{{TITLE}}", title),
                ("{{JSON}}", json),
                ("{{MERMAID}}", mermaid),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_embeds_everything() {
        let prompt = PromptTemplates::default().feedback(
            "class Order {}",
            "Order",
            "[{\"ruleName\":\"NoMapLeft\"}]",
            "classDiagram\nMap -- Order",
        );
        assert!(prompt.contains("class Order {}"));
        assert!(prompt.contains("\"Order\""));
        assert!(prompt.contains("NoMapLeft"));
        assert!(prompt.contains("classDiagram\nMap -- Order"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_instruction_per_family() {
        let t = PromptTemplates::default();
        assert!(t.instruction(DiagramFamily::Class, "src", "T").contains("classDiagram"));
        assert!(t.instruction(DiagramFamily::Sequence, "src", "T").contains("sequenceDiagram"));
    }

    #[test]
    fn test_load_overrides_only_present_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("fix.md"), "FIX {{JSON}}").unwrap();

        let t = PromptTemplates::load(Some(dir.path()));
        assert_eq!(t.feedback("s", "t", "[]", "m"), "FIX []");
        assert_eq!(t.system, SYSTEM);
        assert_eq!(PromptTemplates::load(None), PromptTemplates::default());
    }
}
