use crate::commands::Contexto;
use crate::config::CONFIG_FILE;
use crate::rules::document::RenderRule;
use crate::rules::{ContentRule, DiagramFamily, RuleEngine};
use colored::Colorize;

pub fn handle_rules_command(ctx: &Contexto) {
    for family in [DiagramFamily::Class, DiagramFamily::Sequence] {
        let selection = ctx.selection.for_family(family);
        let todas = RuleEngine::for_family(family);

        println!("\n{} {}", "Reglas activas:".bold(), family.keyword().cyan());

        for r in todas.line_rules() {
            imprimir(selection.allows(r.id()), r.id(), "LINE", r.description());
        }
        for r in todas.content_rules() {
            imprimir(selection.allows(r.id()), r.id(), "DOC", r.description());
        }
        if ctx.config.render_check {
            let render = RenderRule::new(ctx.renderer());
            imprimir(true, render.id(), "DOC", render.description());
        }
    }

    println!();
    match &ctx.config.rules_file {
        Some(file) => println!("   Info: Selección de reglas leída de {}", file),
        None => println!(
            "   Info: Para desactivar reglas, apunta `rules_file` en {} a un YAML:",
            CONFIG_FILE
        ),
    }
    println!("   class:\n     disabled: [no_map]\n   sequence:\n     only: [avoid_notes, participant_alias]");
}

fn imprimir(enabled: bool, id: &str, scope: &str, desc: &str) {
    let status = if enabled { "[ON] ".green() } else { "[OFF]".red() };
    let resumen = desc.lines().next().unwrap_or("");
    println!(
        "  {} {:<34} {:<6} {}",
        status,
        id.yellow(),
        format!("[{}]", scope),
        resumen.dimmed()
    );
}
