use crate::ai::AiGenerator;
use crate::commands::{imprimir_violaciones, titulo_desde, Contexto};
use crate::correction::{CancelFlag, CorrectionLoop, CorrectionOutcome, CorrectionRequest, Generator};
use crate::rules::DiagramFamily;
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Presupuesto de generación para cada familia
pub fn presupuesto(ctx: &Contexto, family: DiagramFamily) -> u32 {
    match family {
        DiagramFamily::Class => ctx.config.correction.class_budget,
        DiagramFamily::Sequence => ctx.config.correction.sequence_budget,
    }
}

/// Un loop completo de generación para un archivo fuente
pub fn generar_diagrama(
    ctx: &Contexto,
    generator: &dyn Generator,
    family: DiagramFamily,
    source: &str,
    title: &str,
    cancel: CancelFlag,
) -> CorrectionOutcome {
    let engine = ctx.engine(family, ctx.config.render_check);
    let request = CorrectionRequest {
        source: source.to_string(),
        title: title.to_string(),
    };
    let lp = CorrectionLoop::new(generator, &engine, &ctx.templates, family, presupuesto(ctx, family))
        .with_cancel(cancel)
        .verbose(ctx.config.verbose);

    let seed = lp.seed(&request);
    let outcome = lp.run(&request, seed);
    if let Ok(mut stats) = ctx.stats.lock() {
        stats.registrar(&outcome);
    }
    outcome
}

pub fn salida_por_defecto(source: &Path, family: DiagramFamily) -> PathBuf {
    source.with_extension(format!("{}.mmd", family))
}

/// Escribe el último candidato aunque tenga violaciones; un diagrama
/// imperfecto es preferible a ninguno
pub fn escribir_resultado(outcome: &CorrectionOutcome, output: &Path) -> anyhow::Result<()> {
    if outcome.artifact.is_empty() {
        anyhow::bail!("El modelo no produjo ningún diagrama tras {} llamadas", outcome.generation_calls);
    }
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, format!("{}\n", outcome.artifact))?;
    Ok(())
}

pub fn handle_generate(
    ctx: &Contexto,
    source: &Path,
    family: DiagramFamily,
    title: Option<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<bool> {
    let codigo = fs::read_to_string(source)
        .map_err(|e| anyhow::anyhow!("No se pudo leer {}: {}", source.display(), e))?;
    let title = title.unwrap_or_else(|| titulo_desde(source));
    let output = output.unwrap_or_else(|| salida_por_defecto(source, family));

    println!("{} Generando diagrama de {} para {}...", "🧩".cyan(), family, title.bold());

    let generator = AiGenerator::new(&ctx.config, ctx.stats.clone());
    let outcome = generar_diagrama(ctx, &generator, family, &codigo, &title, CancelFlag::new());
    ctx.guardar_stats();
    escribir_resultado(&outcome, &output)?;

    if outcome.passed() {
        println!("{} Diagrama guardado en {}", "✅".green(), output.display());
    } else {
        println!(
            "{} Diagrama guardado en {} con {} violaciones pendientes ({})",
            "⚠️".yellow(),
            output.display(),
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
    use crate::correction::{Conversation, LoopStatus};

    struct Fijo(&'static str);

    impl Generator for Fijo {
        fn generate(&self, _conversation: &Conversation) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_generar_y_escribir() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Contexto::cargar(dir.path()).unwrap();
        let generator = Fijo("```mermaid\nsequenceDiagram\n  Caller->>Service: place order\n```");

        let outcome = generar_diagrama(&ctx, &generator, DiagramFamily::Sequence, "void place() {}", "place", CancelFlag::new());
        assert_eq!(outcome.status, LoopStatus::Passed);
        assert_eq!(ctx.stats.lock().unwrap().diagramas_validos, 1);

        let output = dir.path().join("out/place.mmd");
        escribir_resultado(&outcome, &output).unwrap();
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "sequenceDiagram\n  Caller->>Service: place order\n"
        );
    }

    #[test]
    fn test_presupuesto_por_familia() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = Contexto::cargar(dir.path()).unwrap();
        ctx.config.correction.class_budget = 2;
        let generator = Fijo("```mermaid\nclassDiagram\n  Order -- int\n```");

        let outcome = generar_diagrama(&ctx, &generator, DiagramFamily::Class, "class Order {}", "Order", CancelFlag::new());
        assert_eq!(outcome.status, LoopStatus::Exhausted);
        assert_eq!(outcome.generation_calls, 2);
        assert_eq!(ctx.stats.lock().unwrap().diagramas_agotados, 1);
    }

    #[test]
    fn test_salida_por_defecto() {
        assert_eq!(
            salida_por_defecto(Path::new("src/Order.java"), DiagramFamily::Class),
            PathBuf::from("src/Order.class.mmd")
        );
    }
}
