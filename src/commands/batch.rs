use crate::ai::AiGenerator;
use crate::commands::generate::{escribir_resultado, generar_diagrama};
use crate::commands::{titulo_desde, Contexto};
use crate::correction::{CancelFlag, Generator, LoopStatus};
use crate::rules::DiagramFamily;
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ResultadoBatch {
    pub source: PathBuf,
    pub output: PathBuf,
    pub status: Option<LoopStatus>,
    pub error: Option<String>,
}

/// Fuentes con extensión configurada, respetando .gitignore
pub fn listar_fuentes(dir: &Path, extensiones: &[String]) -> Vec<PathBuf> {
    let mut fuentes = Vec::new();
    let walker = ignore::WalkBuilder::new(dir)
        .hidden(false)
        .git_ignore(true)
        .build();
    for entry in walker.flatten() {
        let p = entry.path();
        if p.is_file() {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            if extensiones.iter().any(|e| e == ext) {
                fuentes.push(p.to_path_buf());
            }
        }
    }
    fuentes.sort();
    fuentes
}

/// `out_dir/<ruta relativa>.<familia>.mmd`
pub fn salida_para(source: &Path, base: &Path, out_dir: &Path, family: DiagramFamily) -> PathBuf {
    let relativa = source.strip_prefix(base).unwrap_or(source);
    out_dir
        .join(relativa)
        .with_extension(format!("{}.mmd", family))
}

fn procesar(
    ctx: &Contexto,
    generator: &dyn Generator,
    family: DiagramFamily,
    source: PathBuf,
    output: PathBuf,
    cancel: CancelFlag,
) -> ResultadoBatch {
    let codigo = match fs::read_to_string(&source) {
        Ok(c) => c,
        Err(e) => {
            return ResultadoBatch {
                source,
                output,
                status: None,
                error: Some(e.to_string()),
            };
        }
    };

    let outcome = generar_diagrama(ctx, generator, family, &codigo, &titulo_desde(&source), cancel);
    let error = escribir_resultado(&outcome, &output).err().map(|e| e.to_string());
    ResultadoBatch {
        source,
        output,
        status: Some(outcome.status),
        error,
    }
}

/// Control de ejecución del lote
#[derive(Clone)]
pub struct OpcionesLote {
    pub concurrency: usize,
    pub cancel: CancelFlag,
    pub pb: indicatif::ProgressBar,
}

/// Un loop de corrección independiente por archivo, en tareas bloqueantes
/// limitadas por `concurrency`. Un archivo fallido no detiene al resto.
pub fn generar_lote(
    rt: &tokio::runtime::Runtime,
    ctx: Arc<Contexto>,
    generator: Arc<dyn Generator>,
    trabajos: Vec<(PathBuf, PathBuf)>,
    family: DiagramFamily,
    opciones: OpcionesLote,
) -> Vec<ResultadoBatch> {
    let OpcionesLote { concurrency, cancel, pb } = opciones;
    let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));

    rt.block_on(async {
        let mut set = tokio::task::JoinSet::new();

        for (source, output) in trabajos {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let ctx = Arc::clone(&ctx);
            let generator = Arc::clone(&generator);
            let cancel = cancel.clone();
            let pb = pb.clone();

            set.spawn(async move {
                let _permit = permit;
                let fallback = (source.clone(), output.clone());
                let res = tokio::task::spawn_blocking(move || {
                    procesar(&ctx, generator.as_ref(), family, source, output, cancel)
                })
                .await
                .unwrap_or_else(|e| ResultadoBatch {
                    source: fallback.0,
                    output: fallback.1,
                    status: None,
                    error: Some(e.to_string()),
                });
                pb.inc(1);
                pb.set_message(titulo_desde(&res.source));
                res
            });
        }

        let mut resultados = Vec::new();
        while let Some(join_result) = set.join_next().await {
            if let Ok(res) = join_result {
                resultados.push(res);
            }
        }
        resultados.sort_by(|a, b| a.source.cmp(&b.source));
        resultados
    })
}

pub fn handle_batch(
    ctx: Contexto,
    dir: &Path,
    out_dir: &Path,
    family: DiagramFamily,
    concurrency: usize,
) -> anyhow::Result<bool> {
    let dir = ctx.root.join(dir);
    let out_dir = ctx.root.join(out_dir);
    let fuentes = listar_fuentes(&dir, &ctx.config.source_extensions);

    if fuentes.is_empty() {
        println!(
            "{} No se encontraron archivos ({}) en '{}'.",
            "⚠️".yellow(),
            ctx.config.source_extensions.join(", "),
            dir.display()
        );
        return Ok(true);
    }

    println!(
        "   Procesando {} archivos ({} en paralelo)...",
        fuentes.len(),
        concurrency
    );

    let trabajos: Vec<(PathBuf, PathBuf)> = fuentes
        .into_iter()
        .map(|s| {
            let out = salida_para(&s, &dir, &out_dir, family);
            (s, out)
        })
        .collect();

    let pb = indicatif::ProgressBar::new(trabajos.len() as u64);
    pb.set_style(
        indicatif::ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar()),
    );

    let rt = tokio::runtime::Runtime::new()?;
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        rt.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let ctx = Arc::new(ctx);
    let generator: Arc<dyn Generator> = Arc::new(AiGenerator::new(&ctx.config, ctx.stats.clone()));
    let opciones = OpcionesLote {
        concurrency,
        cancel,
        pb: pb.clone(),
    };
    let resultados = generar_lote(&rt, Arc::clone(&ctx), generator, trabajos, family, opciones);
    pb.finish_and_clear();
    ctx.guardar_stats();

    let validos = resultados
        .iter()
        .filter(|r| r.status == Some(LoopStatus::Passed) && r.error.is_none())
        .count();
    for r in resultados.iter().filter(|r| r.status != Some(LoopStatus::Passed) || r.error.is_some()) {
        let estado = r.status.map(|s| s.to_string()).unwrap_or_else(|| "error".to_string());
        println!(
            "  {} {} [{}] {}",
            "✗".red(),
            r.source.display(),
            estado.yellow(),
            r.error.as_deref().unwrap_or("").dimmed()
        );
    }
    println!(
        "\n📑 Batch: {} de {} diagramas cumplen todas las reglas",
        validos,
        resultados.len()
    );

    Ok(validos == resultados.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::Conversation;

    struct PorTitulo;

    impl Generator for PorTitulo {
        fn generate(&self, conversation: &Conversation) -> anyhow::Result<String> {
            let instruccion = &conversation.messages()[1].content;
            if instruccion.contains("Title: Roto") {
                Err(anyhow::anyhow!("503 ocupado"))
            } else {
                Ok("```mermaid\nclassDiagram\n  Order *-- \"many\" LineItem\n```".to_string())
            }
        }
    }

    #[test]
    fn test_listar_y_salida() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/model")).unwrap();
        fs::write(dir.path().join("src/model/Order.java"), "class Order {}").unwrap();
        fs::write(dir.path().join("src/README.md"), "docs").unwrap();

        let fuentes = listar_fuentes(dir.path(), &["java".to_string()]);
        assert_eq!(fuentes.len(), 1);

        let out = salida_para(&fuentes[0], dir.path(), Path::new("/out"), DiagramFamily::Class);
        assert_eq!(out, PathBuf::from("/out/src/model/Order.class.mmd"));
    }

    #[test]
    fn test_lote_independiente_por_archivo() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = Contexto::cargar(dir.path()).unwrap();
        ctx.config.correction.class_budget = 2;
        ctx.config.verbose = false;

        let mut trabajos = Vec::new();
        for nombre in ["Order", "Roto", "Customer"] {
            let source = dir.path().join(format!("{}.java", nombre));
            fs::write(&source, format!("class {} {{}}", nombre)).unwrap();
            trabajos.push((source, dir.path().join(format!("out/{}.class.mmd", nombre))));
        }

        let rt = tokio::runtime::Runtime::new().unwrap();
        let resultados = generar_lote(
            &rt,
            Arc::new(ctx),
            Arc::new(PorTitulo),
            trabajos,
            DiagramFamily::Class,
            OpcionesLote {
                concurrency: 2,
                cancel: CancelFlag::new(),
                pb: indicatif::ProgressBar::hidden(),
            },
        );

        assert_eq!(resultados.len(), 3);
        let roto = resultados.iter().find(|r| r.source.ends_with("Roto.java")).unwrap();
        assert_eq!(roto.status, Some(LoopStatus::Exhausted));
        assert!(roto.error.is_some());

        let validos: Vec<_> = resultados
            .iter()
            .filter(|r| r.status == Some(LoopStatus::Passed))
            .collect();
        assert_eq!(validos.len(), 2);
        assert!(dir.path().join("out/Order.class.mmd").exists());
        assert!(dir.path().join("out/Customer.class.mmd").exists());
    }
}
