//! # Diagram Sentinel - Validación y corrección de diagramas Mermaid
//!
//! Genera diagramas de clases y de secuencia con IA, los valida contra un
//! conjunto de reglas por familia y reenvía las violaciones al modelo hasta
//! que el diagrama cumple las reglas y renderiza, o se agota el presupuesto.

use clap::Parser;
use colored::*;
use commands::{Cli, Commands, Contexto};

// Módulos
pub mod ai;
pub mod commands;
pub mod config;
pub mod correction;
pub mod render;
pub mod rules;
pub mod stats;

fn ejecutar(cli: Cli) -> anyhow::Result<bool> {
    let project_root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };

    if let Commands::Init { force } = cli.command {
        commands::init::run_init(&project_root, force)?;
        return Ok(true);
    }

    let ctx = Contexto::cargar(&project_root)?;

    match cli.command {
        Commands::Check { file, family, json } => {
            commands::check::handle_check(&ctx, &file, family, json)
        }
        Commands::Generate {
            source,
            family,
            title,
            output,
        } => commands::generate::handle_generate(&ctx, &source, family, title, output),
        Commands::Fix {
            file,
            family,
            source,
        } => commands::fix::handle_fix(&ctx, &file, family, source.as_deref()),
        Commands::Render {
            file,
            output,
            family,
            force,
        } => commands::render::handle_render(&ctx, &file, output, family, force),
        Commands::Batch {
            dir,
            output,
            family,
            concurrency,
        } => commands::batch::handle_batch(ctx, &dir, &output, family, concurrency),
        Commands::Rules => {
            commands::rules::handle_rules_command(&ctx);
            Ok(true)
        }
        Commands::Init { .. } => Ok(true),
    }
}

fn main() {
    let cli = Cli::parse();

    match ejecutar(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {}", "❌ Error:".red().bold(), e);
            std::process::exit(2);
        }
    }
}
