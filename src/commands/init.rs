use crate::config::{DiagramConfig, CONFIG_FILE};
use colored::*;
use std::path::Path;

/// Escribe `.diagramrc.toml` con los valores por defecto.
/// Devuelve Err si ya existe y `force == false`.
pub fn run_init(project_root: &Path, force: bool) -> anyhow::Result<()> {
    let config_path = project_root.join(CONFIG_FILE);

    if config_path.exists() && !force {
        anyhow::bail!(
            "Ya existe una configuración en {}. Usa --force para sobrescribir.",
            config_path.display()
        );
    }

    DiagramConfig::default().save(project_root)?;

    println!("{} Configuración creada en {}", "✅".green(), config_path.display());
    println!(
        "   La API key se toma de {} si `api_key` queda vacío.",
        "ANTHROPIC_API_KEY".bold()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_y_force() {
        let dir = tempfile::tempdir().unwrap();
        run_init(dir.path(), false).unwrap();
        assert!(dir.path().join(CONFIG_FILE).exists());
        assert!(DiagramConfig::load(dir.path()).is_some());

        assert!(run_init(dir.path(), false).is_err());
        assert!(run_init(dir.path(), true).is_ok());
    }
}
