pub mod batch;
pub mod check;
pub mod fix;
pub mod generate;
pub mod init;
pub mod render;
pub mod rules;

use crate::config::DiagramConfig;
use crate::correction::PromptTemplates;
use crate::render::Renderer;
use crate::rules::document::RenderRule;
use crate::rules::engine::RuleSelection;
use crate::rules::{DiagramFamily, RuleEngine};
use crate::stats::RunStats;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Parser)]
#[command(name = "diagram-sentinel")]
#[command(about = "Validates and repairs AI-generated Mermaid diagrams", long_about = None)]
pub struct Cli {
    /// Raíz del proyecto (por defecto, el directorio actual)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Valida un diagrama contra las reglas de su familia
    Check {
        /// Archivo .mmd (o markdown con un bloque mermaid)
        file: PathBuf,
        /// class | sequence (por defecto se detecta por la palabra clave)
        #[arg(long)]
        family: Option<DiagramFamily>,
        /// Imprime el reporte JSON de violaciones
        #[arg(long)]
        json: bool,
    },
    /// Genera un diagrama a partir de un archivo fuente
    Generate {
        /// Archivo fuente
        source: PathBuf,
        #[arg(long, default_value = "class")]
        family: DiagramFamily,
        /// Título del diagrama (por defecto, el nombre del archivo)
        #[arg(long)]
        title: Option<String>,
        /// Archivo de salida (por defecto, <source>.<family>.mmd)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Corrige un diagrama existente con el modelo
    Fix {
        /// Archivo .mmd a corregir (se sobrescribe)
        file: PathBuf,
        #[arg(long)]
        family: Option<DiagramFamily>,
        /// Código fuente del que se generó el diagrama
        #[arg(long)]
        source: Option<PathBuf>,
    },
    /// Renderiza un diagrama a imagen, reparándolo si el renderizador falla
    Render {
        file: PathBuf,
        /// Imagen de salida (por defecto, mismo nombre con .png)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        family: Option<DiagramFamily>,
        /// Renderiza aunque la imagen esté al día
        #[arg(long)]
        force: bool,
    },
    /// Genera diagramas de clases para todos los fuentes de un directorio
    Batch {
        dir: PathBuf,
        /// Directorio de salida de los .mmd
        #[arg(short, long, default_value = "docs/diagrams")]
        output: PathBuf,
        #[arg(long, default_value = "class")]
        family: DiagramFamily,
        /// Archivos procesados en paralelo
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },
    /// Lista las reglas activas por familia
    Rules,
    /// Crea .diagramrc.toml con los valores por defecto
    Init {
        #[arg(long)]
        force: bool,
    },
}

/// Estado compartido por los comandos que llaman al modelo
pub struct Contexto {
    pub root: PathBuf,
    pub config: DiagramConfig,
    pub templates: PromptTemplates,
    pub selection: RuleSelection,
    pub stats: Arc<Mutex<RunStats>>,
}

impl Contexto {
    pub fn cargar(root: &Path) -> anyhow::Result<Self> {
        let config = DiagramConfig::load_or_default(root);
        let templates = PromptTemplates::load(config.templates_path(root).as_deref());
        let selection = match config.rules_path(root) {
            Some(path) => RuleSelection::load_from_yaml(&path).map_err(|e| {
                anyhow::anyhow!("No se pudo leer la selección de reglas {}: {}", path.display(), e)
            })?,
            None => RuleSelection::default(),
        };

        Ok(Self {
            root: root.to_path_buf(),
            stats: Arc::new(Mutex::new(RunStats::cargar(root))),
            config,
            templates,
            selection,
        })
    }

    pub fn renderer(&self) -> Renderer {
        Renderer::from_config(&self.config.renderer, &self.root).verbose(self.config.verbose)
    }

    /// Reglas de la familia; con `render` se agrega el renderizador al final
    pub fn engine(&self, family: DiagramFamily, render: bool) -> RuleEngine {
        let engine = RuleEngine::for_family_with(family, self.selection.for_family(family));
        if render {
            engine.with_content_rule(Box::new(RenderRule::new(self.renderer())))
        } else {
            engine
        }
    }

    pub fn guardar_stats(&self) {
        if let Ok(mut stats) = self.stats.lock() {
            stats.guardar(&self.root);
        }
    }
}

/// Familia explícita o detectada por la palabra clave del diagrama
pub fn resolver_familia(explicita: Option<DiagramFamily>, contenido: &str) -> anyhow::Result<DiagramFamily> {
    if let Some(family) = explicita {
        return Ok(family);
    }
    [DiagramFamily::Sequence, DiagramFamily::Class]
        .into_iter()
        .find(|f| contenido.contains(f.keyword()))
        .ok_or_else(|| {
            anyhow::anyhow!("No se pudo detectar el tipo de diagrama. Usa --family class|sequence")
        })
}

/// Título por defecto: nombre del archivo sin extensión
pub fn titulo_desde(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "diagram".to_string())
}

pub fn imprimir_violaciones(violations: &[crate::rules::RuleViolation]) {
    for v in violations {
        let ubicacion = if v.line_number == 0 {
            "documento".to_string()
        } else {
            format!("línea {}", v.line_number)
        };
        println!("  {} {} [{}]", "✗".red(), ubicacion.bold(), v.rule_name.yellow());
        if !v.violated_line.is_empty() {
            println!("      {}", v.violated_line.trim().dimmed());
        }
        println!("      {}", v.description);
    }
}
