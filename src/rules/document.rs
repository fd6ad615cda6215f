//! Reglas de documento completo

use crate::render::Renderer;
use crate::rules::{ContentRule, DiagramFamily, RuleOutcome, RuleViolation};

/// El diagrama debe empezar por la palabra clave de su familia
/// (`classDiagram` / `sequenceDiagram`). Se ignoran líneas vacías y
/// comentarios `%%`.
#[derive(Debug, Clone)]
pub struct DiagramKeywordRule {
    family: DiagramFamily,
    description: String,
}

impl DiagramKeywordRule {
    pub fn new(family: DiagramFamily) -> Self {
        Self {
            family,
            description: format!(
                "The diagram must start with the `{}` keyword and contain only Mermaid syntax",
                family.keyword()
            ),
        }
    }
}

impl ContentRule for DiagramKeywordRule {
    fn id(&self) -> &'static str {
        "diagram_keyword"
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn check(&self, content: &str) -> RuleOutcome {
        let first = content
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.starts_with("%%"));

        match first {
            Some(line) if line.starts_with(self.family.keyword()) => RuleOutcome::Pass,
            _ => RuleViolation::for_document("DiagramKeywordRule", self.description.clone()).into(),
        }
    }
}

/// Usa el renderizador externo como verificación pasa/falla
#[derive(Debug, Clone)]
pub struct RenderRule {
    renderer: Renderer,
}

impl RenderRule {
    pub fn new(renderer: Renderer) -> Self {
        Self { renderer }
    }
}

impl ContentRule for RenderRule {
    fn id(&self) -> &'static str {
        "render"
    }

    fn description(&self) -> &str {
        "The diagram must render with the Mermaid CLI without errors"
    }

    fn check(&self, content: &str) -> RuleOutcome {
        self.renderer.check_content(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_rule() {
        let rule = DiagramKeywordRule::new(DiagramFamily::Class);
        assert!(rule.check("classDiagram\n  A <|-- B").is_pass());
        assert!(rule.check("\n%% generado\n  classDiagram\nA -- B").is_pass());

        let v = rule.check("Here is your diagram:\nclassDiagram").violation().unwrap();
        assert_eq!(v.rule_name, "DiagramKeywordRule");
        assert_eq!(v.line_number, 0);
        assert!(v.description.contains("classDiagram"));

        assert!(!rule.check("").is_pass());
        assert!(!DiagramKeywordRule::new(DiagramFamily::Sequence).check("classDiagram").is_pass());
    }

    #[cfg(unix)]
    #[test]
    fn test_render_rule_reports_renderer_output() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Renderer::new(
            "sh",
            vec!["-c".into(), "echo 'Parse error on line 2' >&2; exit 1".into()],
            std::time::Duration::from_secs(10),
        )
        .with_work_dir(dir.path());

        let v = RenderRule::new(renderer).check("classDiagram\nA -- ").violation().unwrap();
        assert_eq!(v.rule_name, "MermaidImageGen");
        assert!(v.description.contains("Parse error on line 2"));
        // Los archivos temporales se limpian
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
