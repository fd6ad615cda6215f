use crate::ai::AiGenerator;
use crate::commands::check::{escribir_diagrama, leer_diagrama};
use crate::commands::{imprimir_violaciones, resolver_familia, titulo_desde, Contexto};
use crate::correction::{CorrectionLoop, CorrectionOutcome, CorrectionRequest, Generator};
use crate::rules::DiagramFamily;
use colored::*;
use std::fs;
use std::path::Path;

/// Corrige un diagrama existente: empieza validando y solo llama al modelo
/// si hay violaciones
pub fn corregir(
    ctx: &Contexto,
    generator: &dyn Generator,
    family: DiagramFamily,
    diagrama: &str,
    request: &CorrectionRequest,
) -> CorrectionOutcome {
    let engine = ctx.engine(family, ctx.config.render_check);
    let lp = CorrectionLoop::new(
        generator,
        &engine,
        &ctx.templates,
        family,
        ctx.config.correction.method_budget,
    )
    .verbose(ctx.config.verbose);

    let seed = lp.seed(request);
    let outcome = lp.refine(request, seed, diagrama);
    if let Ok(mut stats) = ctx.stats.lock() {
        stats.registrar(&outcome);
    }
    outcome
}

pub fn handle_fix(
    ctx: &Contexto,
    file: &Path,
    family: Option<DiagramFamily>,
    source: Option<&Path>,
) -> anyhow::Result<bool> {
    let generator = AiGenerator::new(&ctx.config, ctx.stats.clone());
    corregir_archivo(ctx, &generator, file, family, source)
}

/// Corrige el diagrama del archivo y lo reescribe en su lugar
pub fn corregir_archivo(
    ctx: &Contexto,
    generator: &dyn Generator,
    file: &Path,
    family: Option<DiagramFamily>,
    source: Option<&Path>,
) -> anyhow::Result<bool> {
    let contenido = fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("No se pudo leer {}: {}", file.display(), e))?;
    let family = resolver_familia(family, &contenido)?;
    let diagrama = leer_diagrama(&contenido, family);

    let codigo = match source {
        Some(path) => fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("No se pudo leer {}: {}", path.display(), e))?,
        None => String::new(),
    };
    let request = CorrectionRequest {
        source: codigo,
        title: titulo_desde(file),
    };

    let outcome = corregir(ctx, generator, family, &diagrama, &request);
    ctx.guardar_stats();

    if outcome.generation_calls == 0 {
        println!("{} {} no necesita correcciones", "✅".green(), file.display());
        return Ok(true);
    }

    if !outcome.artifact.is_empty() && outcome.artifact != diagrama {
        escribir_diagrama(file, &contenido, family, &outcome.artifact)?;
    }

    if outcome.passed() {
        println!(
            "{} {} corregido en {} llamadas",
            "✅".green(),
            file.display(),
            outcome.generation_calls
        );
    } else {
        println!(
            "{} {} sigue con {} violaciones ({})",
            "⚠️".yellow(),
            file.display(),
            outcome.violations.len(),
            outcome.status
        );
        imprimir_violaciones(&outcome.violations);
    }

    Ok(outcome.passed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::Conversation;
    use std::sync::Mutex;

    struct Registro(Mutex<u32>);

    impl Generator for Registro {
        fn generate(&self, _conversation: &Conversation) -> anyhow::Result<String> {
            *self.0.lock().unwrap() += 1;
            Ok("```mermaid\nclassDiagram\n  Order -- int\n```".to_string())
        }
    }

    #[test]
    fn test_corregir_usa_presupuesto_de_metodo() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Contexto::cargar(dir.path()).unwrap();
        let generator = Registro(Mutex::new(0));

        let outcome = corregir(
            &ctx,
            &generator,
            DiagramFamily::Class,
            "classDiagram\n  Order -- String",
            &CorrectionRequest::default(),
        );
        assert!(!outcome.passed());
        assert_eq!(*generator.0.lock().unwrap(), ctx.config.correction.method_budget);
        assert_eq!(outcome.artifact, "classDiagram\n  Order -- int");
    }

    struct Corrector;

    impl Generator for Corrector {
        fn generate(&self, _conversation: &Conversation) -> anyhow::Result<String> {
            Ok("```mermaid\nclassDiagram\n  Order *-- \"many\" LineItem\n```".to_string())
        }
    }

    #[test]
    fn test_fix_en_markdown_conserva_el_texto() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = Contexto::cargar(dir.path()).unwrap();
        ctx.config.verbose = false;
        let file = dir.path().join("README.md");
        fs::write(
            &file,
            "# Orders\n\nTexto importante.\n\n```mermaid\nclassDiagram\n  Order *-- List<LineItem>\n```\n\nMás texto.\n",
        )
        .unwrap();

        assert!(corregir_archivo(&ctx, &Corrector, &file, None, None).unwrap());
        assert_eq!(
            fs::read_to_string(&file).unwrap(),
            "# Orders\n\nTexto importante.\n\n```mermaid\nclassDiagram\n  Order *-- \"many\" LineItem\n```\n\nMás texto.\n"
        );
    }

    #[test]
    fn test_fix_en_mmd_sobrescribe() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = Contexto::cargar(dir.path()).unwrap();
        ctx.config.verbose = false;
        let file = dir.path().join("order.mmd");
        fs::write(&file, "classDiagram\n  Order *-- List<LineItem>\n").unwrap();

        assert!(corregir_archivo(&ctx, &Corrector, &file, Some(DiagramFamily::Class), None).unwrap());
        assert_eq!(
            fs::read_to_string(&file).unwrap(),
            "classDiagram\n  Order *-- \"many\" LineItem\n"
        );
    }
}
