use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Versión actual (leída desde Cargo.toml en tiempo de compilación)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const CONFIG_FILE: &str = ".diagramrc.toml";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ModelConfig {
    /// anthropic | openai | lm-studio | groq | deepseek | ollama | gemini.
    /// Vacío: se detecta por URL.
    pub provider: String,
    pub name: String,
    pub url: String,
    /// Vacío: se usa la variable de entorno del proveedor
    pub api_key: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            name: "claude-opus-4-5-20251101".to_string(),
            url: "https://api.anthropic.com".to_string(),
            api_key: "".to_string(),
        }
    }
}

impl ModelConfig {
    fn env_var(&self) -> Option<&'static str> {
        match self.provider.as_str() {
            "anthropic" | "" => Some("ANTHROPIC_API_KEY"),
            "openai" => Some("OPENAI_API_KEY"),
            "groq" => Some("GROQ_API_KEY"),
            "deepseek" => Some("DEEPSEEK_API_KEY"),
            "gemini" => Some("GEMINI_API_KEY"),
            _ => None,
        }
    }

    /// API key efectiva: la del archivo o, si está vacía, la del entorno
    pub fn resolved_api_key(&self) -> String {
        if !self.api_key.is_empty() {
            return self.api_key.clone();
        }
        self.env_var()
            .and_then(|var| std::env::var(var).ok())
            .unwrap_or_default()
    }
}

/// Presupuestos de rondas por punto de llamada
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CorrectionConfig {
    /// `generate --family sequence`
    pub sequence_budget: u32,
    /// `generate --family class` y `batch`
    pub class_budget: u32,
    /// `fix` sobre un diagrama existente
    pub method_budget: u32,
    /// `render`, reparación guiada por el renderizador
    pub render_budget: u32,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            sequence_budget: 5,
            class_budget: 5,
            method_budget: 3,
            render_budget: 3,
        }
    }
}

/// Espera ante respuestas 503 del servicio de generación
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct BusyRetryConfig {
    pub max_waits: u32,
    pub wait_ms: u64,
}

impl Default for BusyRetryConfig {
    fn default() -> Self {
        Self {
            max_waits: 10,
            wait_ms: 1000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RendererConfig {
    pub program: String,
    /// Admite `{input}` y `{output}`
    pub args: Vec<String>,
    pub timeout_secs: u64,
    /// Relativo a la raíz del proyecto
    pub work_dir: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            program: "mmdc".to_string(),
            args: ["-i", "{input}", "-o", "{output}", "-s", "2", "-b", "white"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timeout_secs: 30,
            work_dir: ".diagram-sentinel/tmp".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DiagramConfig {
    pub version: String,
    pub primary_model: ModelConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_model: Option<ModelConfig>,
    pub correction: CorrectionConfig,
    pub busy_retry: BusyRetryConfig,
    pub renderer: RendererConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub templates_dir: Option<String>,
    /// Archivo YAML con la selección de reglas por familia
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<String>,
    /// Agrega el renderizador como regla en los loops de generación
    pub render_check: bool,
    /// Extensiones de código fuente para `batch`
    pub source_extensions: Vec<String>,
    pub verbose: bool,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            version: VERSION.to_string(),
            primary_model: ModelConfig::default(),
            fallback_model: None,
            correction: CorrectionConfig::default(),
            busy_retry: BusyRetryConfig::default(),
            renderer: RendererConfig::default(),
            templates_dir: None,
            rules_file: None,
            render_check: false,
            source_extensions: vec!["java".to_string()],
            verbose: true,
        }
    }
}

impl DiagramConfig {
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let toml = toml::to_string_pretty(self)?;
        fs::write(path.join(CONFIG_FILE), toml)?;

        Self::actualizar_gitignore(path)?;

        Ok(())
    }

    /// Agrega los archivos locales (API keys, estadísticas, temporales) al .gitignore
    pub fn actualizar_gitignore(path: &Path) -> anyhow::Result<()> {
        let gitignore_path = path.join(".gitignore");

        let entries = [
            "# diagram-sentinel",
            CONFIG_FILE,
            crate::stats::STATS_FILE,
            ".diagram-sentinel/",
        ];

        let mut content = if gitignore_path.exists() {
            fs::read_to_string(&gitignore_path)?
        } else {
            String::new()
        };

        if !content.contains(CONFIG_FILE) {
            if !content.is_empty() && !content.ends_with('\n') {
                content.push('\n');
            }
            content.push('\n');
            for entry in entries {
                content.push_str(entry);
                content.push('\n');
            }

            fs::write(&gitignore_path, content)?;
            println!(
                "{}",
                "   ✅ Archivos sensibles agregados a .gitignore".green()
            );
        }

        Ok(())
    }

    /// Carga `.diagramrc.toml`. Los campos faltantes toman su valor por defecto.
    pub fn load(path: &Path) -> Option<Self> {
        let config_path = path.join(CONFIG_FILE);
        let content = fs::read_to_string(&config_path).ok()?;

        match toml::from_str::<DiagramConfig>(&content) {
            Ok(mut config) => {
                if config.version != VERSION {
                    println!(
                        "{}",
                        format!(
                            "   🔄 Configuración de versión {} cargada con valores por defecto para campos nuevos",
                            config.version
                        )
                        .yellow()
                    );
                    config.version = VERSION.to_string();
                }
                Some(config)
            }
            Err(e) => {
                println!(
                    "{}",
                    format!("   ⚠️  No se pudo leer {}: {}", config_path.display(), e).yellow()
                );
                None
            }
        }
    }

    /// Configuración del proyecto o, si no existe, la por defecto
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    pub fn templates_path(&self, root: &Path) -> Option<PathBuf> {
        self.templates_dir.as_ref().map(|d| root.join(d))
    }

    pub fn rules_path(&self, root: &Path) -> Option<PathBuf> {
        self.rules_file.as_ref().map(|f| root.join(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DiagramConfig::default();
        assert_eq!(config.correction.sequence_budget, 5);
        assert_eq!(config.correction.class_budget, 5);
        assert_eq!(config.correction.method_budget, 3);
        assert_eq!(config.correction.render_budget, 3);
        assert_eq!(config.busy_retry.max_waits, 10);
        assert_eq!(config.busy_retry.wait_ms, 1000);
        assert_eq!(config.renderer.program, "mmdc");
        assert_eq!(config.renderer.timeout_secs, 30);
        assert!(config.renderer.args.contains(&"white".to_string()));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DiagramConfig::default();
        config.correction.class_budget = 2;
        config.fallback_model = Some(ModelConfig {
            provider: "ollama".to_string(),
            name: "llama3".to_string(),
            url: "http://localhost:11434".to_string(),
            api_key: String::new(),
        });
        config.save(dir.path()).unwrap();

        let loaded = DiagramConfig::load(dir.path()).unwrap();
        assert_eq!(loaded, config);

        let gitignore = fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert!(gitignore.contains(CONFIG_FILE));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "render_check = true\n\n[correction]\nmethod_budget = 2\n",
        )
        .unwrap();

        let config = DiagramConfig::load(dir.path()).unwrap();
        assert!(config.render_check);
        assert_eq!(config.correction.method_budget, 2);
        assert_eq!(config.correction.sequence_budget, 5);
        assert_eq!(config.primary_model, ModelConfig::default());
        assert_eq!(config.version, VERSION);
    }

    #[test]
    fn test_missing_or_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DiagramConfig::load(dir.path()).is_none());
        fs::write(dir.path().join(CONFIG_FILE), "correction = 3").unwrap();
        assert!(DiagramConfig::load(dir.path()).is_none());
        assert_eq!(DiagramConfig::load_or_default(dir.path()), DiagramConfig::default());
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let model = ModelConfig {
            api_key: "sk-archivo".to_string(),
            ..ModelConfig::default()
        };
        assert_eq!(model.resolved_api_key(), "sk-archivo");
    }
}
