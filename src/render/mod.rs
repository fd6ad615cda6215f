//! Adaptador del renderizador externo (Mermaid CLI)
//!
//! Ejecuta el proceso con un hilo lector por cada stream y espera ambos con
//! un timeout explícito antes de leer el código de salida. Nunca devuelve
//! error: cualquier fallo se traduce a `RenderResult` con código -1, y de ahí
//! a una violación `MermaidImageGen` que alimenta el loop de corrección.

use crate::config::RendererConfig;
use crate::rules::{RuleOutcome, RuleViolation};
use colored::*;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

pub const RENDER_RULE_NAME: &str = "MermaidImageGen";

/// Resultado crudo de una ejecución del renderizador
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// true si ambos streams se drenaron y se observó la salida del proceso
    /// dentro del timeout
    pub complete: bool,
    pub error: Option<String>,
}

impl RenderResult {
    fn failed(error: String, stdout: String, stderr: String) -> Self {
        Self {
            exit_code: -1,
            stdout,
            stderr,
            complete: false,
            error: Some(error),
        }
    }

    /// Éxito solo si el código es 0 y la imagen existe
    pub fn to_outcome(&self, output: &Path) -> RuleOutcome {
        if self.exit_code == 0 && output.exists() {
            return RuleOutcome::Pass;
        }

        let mut description = if self.exit_code == 0 {
            format!(
                "The renderer exited with code 0 but produced no image at {}.",
                output.display()
            )
        } else {
            format!(
                "The Mermaid renderer failed to generate the image (exit code {}).",
                self.exit_code
            )
        };
        if let Some(error) = &self.error {
            description.push_str(&format!("\nError: {}", error));
        }
        description.push_str(&format!(
            "\nRenderer stdout:\n{}\nRenderer stderr:\n{}",
            self.stdout, self.stderr
        ));

        RuleViolation::for_document(RENDER_RULE_NAME, description).into()
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

fn spawn_reader<R: Read + Send + 'static>(
    stream: Stream,
    source: Option<R>,
    tx: mpsc::Sender<(Stream, String)>,
) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut source) = source {
            let _ = source.read_to_end(&mut buf);
        }
        let _ = tx.send((stream, String::from_utf8_lossy(&buf).into_owned()));
    });
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[derive(Debug, Clone)]
pub struct Renderer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    work_dir: PathBuf,
    verbose: bool,
}

impl Renderer {
    /// `args` admite los placeholders `{input}` y `{output}`
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
            work_dir: std::env::temp_dir(),
            verbose: true,
        }
    }

    pub fn from_config(config: &RendererConfig, project_root: &Path) -> Self {
        Self::new(
            config.program.clone(),
            config.args.clone(),
            Duration::from_secs(config.timeout_secs),
        )
        .with_work_dir(project_root.join(&config.work_dir))
    }

    /// Directorio para los archivos temporales de `check_content`
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    /// Sin verbose no se imprime nada (p. ej. bajo la barra de progreso de batch)
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|a| a.replace("{input}", &input).replace("{output}", &output))
            .collect()
    }

    pub fn render(&self, input: &Path, output: &Path) -> RenderResult {
        let mut child = match Command::new(&self.program)
            .args(self.command_args(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return RenderResult::failed(
                    format!("No se pudo iniciar '{}': {}", self.program, e),
                    String::new(),
                    String::new(),
                );
            }
        };

        let deadline = Instant::now() + self.timeout;
        let (tx, rx) = mpsc::channel();
        spawn_reader(Stream::Stdout, child.stdout.take(), tx.clone());
        spawn_reader(Stream::Stderr, child.stderr.take(), tx);

        // 1. Drenar ambos streams antes de mirar el código de salida
        let mut stdout = None;
        let mut stderr = None;
        while stdout.is_none() || stderr.is_none() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok((Stream::Stdout, text)) => stdout = Some(text),
                Ok((Stream::Stderr, text)) => stderr = Some(text),
                Err(_) => break,
            }
        }

        if stdout.is_none() || stderr.is_none() {
            kill(&mut child);
            return RenderResult::failed(
                format!(
                    "Timeout de {}s esperando la salida de '{}'",
                    self.timeout.as_secs_f32(),
                    self.program
                ),
                stdout.unwrap_or_default(),
                stderr.unwrap_or_default(),
            );
        }
        let stdout = stdout.unwrap_or_default();
        let stderr = stderr.unwrap_or_default();

        // 2. Esperar la salida del proceso con el tiempo restante
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    return RenderResult {
                        exit_code: status.code().unwrap_or(-1),
                        stdout,
                        stderr,
                        complete: true,
                        error: None,
                    };
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(20)),
                Ok(None) => {
                    kill(&mut child);
                    return RenderResult::failed(
                        format!("'{}' no terminó dentro del timeout", self.program),
                        stdout,
                        stderr,
                    );
                }
                Err(e) => {
                    kill(&mut child);
                    return RenderResult::failed(e.to_string(), stdout, stderr);
                }
            }
        }
    }

    /// Renderiza un archivo y traduce el resultado a una regla
    pub fn render_file(&self, input: &Path, output: &Path) -> RuleOutcome {
        self.render(input, output).to_outcome(output)
    }

    /// Renderiza el contenido usando archivos temporales únicos (uuid), de
    /// modo que varios loops concurrentes no colisionan en el mismo directorio.
    pub fn check_content(&self, content: &str) -> RuleOutcome {
        if let Err(e) = fs::create_dir_all(&self.work_dir) {
            return RuleViolation::for_document(
                RENDER_RULE_NAME,
                format!("Could not prepare the render directory: {}", e),
            )
            .into();
        }

        let id = uuid::Uuid::new_v4();
        let input = self.work_dir.join(format!("{}.mmd", id));
        let output = self.work_dir.join(format!("{}.png", id));

        if let Err(e) = fs::write(&input, content) {
            return RuleViolation::for_document(
                RENDER_RULE_NAME,
                format!("Could not write the diagram source: {}", e),
            )
            .into();
        }

        let outcome = self.render_file(&input, &output);
        if self.verbose && !outcome.is_pass() {
            println!(
                "{}",
                format!("   ⚠️  El renderizador rechazó el diagrama ({})", self.program).yellow()
            );
        }

        let _ = fs::remove_file(&input);
        let _ = fs::remove_file(&output);
        outcome
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> Renderer {
        Renderer::new("sh", vec!["-c".into(), script.into()], timeout)
    }

    #[test]
    fn test_failed_render_embeds_streams() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.png");
        let result = sh("echo progress; echo boom >&2; exit 2", Duration::from_secs(10))
            .render(&dir.path().join("in.mmd"), &output);

        assert_eq!(result.exit_code, 2);
        assert!(result.complete);
        assert_eq!(result.stdout.trim(), "progress");
        assert_eq!(result.stderr.trim(), "boom");

        let v = result.to_outcome(&output).violation().unwrap();
        assert_eq!(v.rule_name, RENDER_RULE_NAME);
        assert_eq!(v.line_number, 0);
        assert!(v.description.contains("exit code 2"));
        assert!(v.description.contains("boom"));
        assert!(v.description.contains("progress"));
    }

    #[test]
    fn test_successful_render_requires_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mmd");
        let output = dir.path().join("out.png");
        fs::write(&input, "classDiagram\n").unwrap();

        let renderer = Renderer::new(
            "sh",
            vec!["-c".into(), "cp \"$0\" \"$1\"".into(), "{input}".into(), "{output}".into()],
            Duration::from_secs(10),
        );
        assert!(renderer.render_file(&input, &output).is_pass());

        // Código 0 sin imagen no cuenta como éxito
        let missing = dir.path().join("nada.png");
        let v = sh("exit 0", Duration::from_secs(10))
            .render_file(&input, &missing)
            .violation()
            .unwrap();
        assert!(v.description.contains("produced no image"));
    }

    #[test]
    fn test_missing_program_never_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = Renderer::new("definitely-not-a-renderer-7f3a", vec![], Duration::from_secs(1))
            .render(&dir.path().join("a.mmd"), &dir.path().join("a.png"));
        assert_eq!(result.exit_code, -1);
        assert!(!result.complete);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_timeout_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let started = Instant::now();
        let result = Renderer::new("sleep", vec!["5".into()], Duration::from_millis(200))
            .render(&dir.path().join("a.mmd"), &dir.path().join("a.png"));
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(result.exit_code, -1);
        assert!(!result.complete);
    }

    #[test]
    fn test_placeholders_are_substituted() {
        let renderer = Renderer::new(
            "mmdc",
            vec!["-i".into(), "{input}".into(), "-o".into(), "{output}".into()],
            Duration::from_secs(1),
        );
        assert_eq!(
            renderer.command_args(Path::new("a.mmd"), Path::new("b.png")),
            vec!["-i", "a.mmd", "-o", "b.png"]
        );
    }

    #[test]
    fn test_check_content_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Renderer::new(
            "sh",
            vec!["-c".into(), "cp \"$0\" \"$1\"".into(), "{input}".into(), "{output}".into()],
            Duration::from_secs(10),
        )
        .with_work_dir(dir.path().join("tmp"));

        assert!(renderer.check_content("classDiagram\nA -- B").is_pass());
        assert_eq!(fs::read_dir(dir.path().join("tmp")).unwrap().count(), 0);
    }
}
