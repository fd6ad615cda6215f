use crate::ai::AiGenerator;
use crate::commands::check::{escribir_diagrama, leer_diagrama};
use crate::commands::{imprimir_violaciones, resolver_familia, titulo_desde, Contexto};
use crate::correction::{CorrectionLoop, CorrectionOutcome, CorrectionRequest, Generator};
use crate::render::Renderer;
use crate::rules::DiagramFamily;
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};

/// La imagen existe y no es más vieja que el diagrama
pub fn imagen_al_dia(diagrama: &Path, imagen: &Path) -> bool {
    let modificado = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modificado(diagrama), modificado(imagen)) {
        (Some(fuente), Some(salida)) => salida >= fuente,
        _ => false,
    }
}

/// Loop de reparación guiado por el renderizador: las reglas de la familia
/// más el renderizador como regla de documento
pub fn reparar(
    ctx: &Contexto,
    generator: &dyn Generator,
    family: DiagramFamily,
    diagrama: &str,
    request: &CorrectionRequest,
) -> CorrectionOutcome {
    let engine = ctx.engine(family, true);
    let lp = CorrectionLoop::new(
        generator,
        &engine,
        &ctx.templates,
        family,
        ctx.config.correction.render_budget,
    )
    .verbose(ctx.config.verbose);

    let seed = lp.seed(request);
    let outcome = lp.refine(request, seed, diagrama);
    if let Ok(mut stats) = ctx.stats.lock() {
        stats.registrar(&outcome);
    }
    outcome
}

fn render_final(ctx: &Contexto, renderer: &Renderer, file: &Path, output: &Path) -> bool {
    let ok = renderer.render_file(file, output).is_pass();
    if let Ok(mut stats) = ctx.stats.lock() {
        stats.registrar_render(ok);
    }
    ok
}

pub fn handle_render(
    ctx: &Contexto,
    file: &Path,
    output: Option<PathBuf>,
    family: Option<DiagramFamily>,
    force: bool,
) -> anyhow::Result<bool> {
    let generator = AiGenerator::new(&ctx.config, ctx.stats.clone());
    renderizar_archivo(ctx, &generator, file, output, family, force)
}

pub fn renderizar_archivo(
    ctx: &Contexto,
    generator: &dyn Generator,
    file: &Path,
    output: Option<PathBuf>,
    family: Option<DiagramFamily>,
    force: bool,
) -> anyhow::Result<bool> {
    let output = output.unwrap_or_else(|| file.with_extension("png"));
    if !force && imagen_al_dia(file, &output) {
        println!("{} {} está al día", "♻️".dimmed(), output.display());
        return Ok(true);
    }

    let renderer = ctx.renderer();
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    if render_final(ctx, &renderer, file, &output) {
        println!("{} Imagen generada en {}", "✅".green(), output.display());
        ctx.guardar_stats();
        return Ok(true);
    }

    println!(
        "{} El renderizador falló con {}. Intentando reparar el diagrama...",
        "⚠️".yellow(),
        file.display()
    );

    let contenido = fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("No se pudo leer {}: {}", file.display(), e))?;
    let family = resolver_familia(family, &contenido)?;
    let diagrama = leer_diagrama(&contenido, family);
    let request = CorrectionRequest {
        source: String::new(),
        title: titulo_desde(file),
    };

    let outcome = reparar(ctx, generator, family, &diagrama, &request);

    if !outcome.artifact.is_empty() && outcome.artifact != diagrama {
        escribir_diagrama(file, &contenido, family, &outcome.artifact)?;
    }

    let ok = outcome.passed() && render_final(ctx, &renderer, file, &output);
    ctx.guardar_stats();

    if ok {
        println!(
            "{} Diagrama reparado en {} llamadas; imagen en {}",
            "✅".green(),
            outcome.generation_calls,
            output.display()
        );
    } else {
        println!("{} No se pudo renderizar {}", "❌".red(), file.display());
        imprimir_violaciones(&outcome.violations);
    }

    Ok(ok)
}
