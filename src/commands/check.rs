use crate::ai::utils::{extraer_diagrama, reemplazar_diagrama};
use crate::commands::{imprimir_violaciones, resolver_familia, Contexto};
use crate::rules::engine::serialize_report;
use crate::rules::{DiagramFamily, RuleViolation};
use colored::*;
use std::fs;
use std::path::Path;

/// Cuerpo del diagrama: si el archivo es markdown se toma el bloque mermaid
pub fn leer_diagrama(contenido: &str, family: DiagramFamily) -> String {
    if contenido.contains("```") {
        extraer_diagrama(contenido, family).unwrap_or_default()
    } else {
        contenido.trim_end().to_string()
    }
}

/// Guarda el diagrama corregido. En markdown solo se reemplaza el cuerpo
/// del bloque; un archivo .mmd se sobrescribe completo.
pub fn escribir_diagrama(
    file: &Path,
    contenido: &str,
    family: DiagramFamily,
    diagrama: &str,
) -> anyhow::Result<()> {
    let nuevo = if contenido.contains("```") {
        reemplazar_diagrama(contenido, family, diagrama)
    } else {
        None
    };
    let nuevo = nuevo.unwrap_or_else(|| format!("{}\n", diagrama));
    fs::write(file, nuevo)
        .map_err(|e| anyhow::anyhow!("No se pudo escribir {}: {}", file.display(), e))
}

pub fn validar(ctx: &Contexto, contenido: &str, family: Option<DiagramFamily>) -> anyhow::Result<(DiagramFamily, Vec<RuleViolation>)> {
    let family = resolver_familia(family, contenido)?;
    let diagrama = leer_diagrama(contenido, family);
    Ok((family, ctx.engine(family, false).check_content(&diagrama)))
}

/// Devuelve `true` si el diagrama no tiene violaciones
pub fn handle_check(
    ctx: &Contexto,
    file: &Path,
    family: Option<DiagramFamily>,
    json: bool,
) -> anyhow::Result<bool> {
    let contenido = fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("No se pudo leer {}: {}", file.display(), e))?;
    let (family, violations) = validar(ctx, &contenido, family)?;

    if json {
        println!("{}", serialize_report(&violations)?);
        return Ok(violations.is_empty());
    }

    if violations.is_empty() {
        println!(
            "{} {} ({}) cumple todas las reglas",
            "✅".green(),
            file.display(),
            family
        );
    } else {
        println!(
            "{} {} ({}): {} violaciones",
            "❌".red(),
            file.display(),
            family,
            violations.len()
        );
        imprimir_violaciones(&violations);
    }

    Ok(violations.is_empty())
}
