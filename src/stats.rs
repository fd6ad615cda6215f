use crate::correction::{CorrectionOutcome, LoopStatus};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const STATS_FILE: &str = ".diagram_stats.json";

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RunStats {
    pub diagramas_validos: u32,
    pub diagramas_agotados: u32,
    pub diagramas_cancelados: u32,
    pub llamadas_generacion: u32,
    pub llamadas_fallidas: u32,
    pub renders_ok: u32,
    pub renders_fallidos: u32,
    pub total_tokens_used: u64,
    pub ultima_ejecucion: Option<String>,
}

impl RunStats {
    pub fn cargar(path: &Path) -> Self {
        let stats_path = path.join(STATS_FILE);
        if let Ok(content) = fs::read_to_string(stats_path) {
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    pub fn guardar(&mut self, path: &Path) {
        self.ultima_ejecucion = Some(chrono::Local::now().to_rfc3339());
        let stats_path = path.join(STATS_FILE);
        if let Ok(content) = serde_json::to_string_pretty(self) {
            let _ = fs::write(stats_path, content);
        }
    }

    pub fn registrar(&mut self, outcome: &CorrectionOutcome) {
        match outcome.status {
            LoopStatus::Passed => self.diagramas_validos += 1,
            LoopStatus::Exhausted => self.diagramas_agotados += 1,
            LoopStatus::Cancelled => self.diagramas_cancelados += 1,
        }
        self.llamadas_generacion += outcome.generation_calls;
        self.llamadas_fallidas += outcome.failed_rounds;
    }

    pub fn registrar_render(&mut self, ok: bool) {
        if ok {
            self.renders_ok += 1;
        } else {
            self.renders_fallidos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::Conversation;

    fn outcome(status: LoopStatus, calls: u32, failed: u32) -> CorrectionOutcome {
        CorrectionOutcome {
            artifact: String::new(),
            status,
            validations: calls,
            generation_calls: calls,
            failed_rounds: failed,
            violations: Vec::new(),
            conversation: Conversation::new(),
        }
    }

    #[test]
    fn test_registrar_y_persistir() {
        let dir = tempfile::tempdir().unwrap();
        let mut stats = RunStats::cargar(dir.path());
        assert_eq!(stats, RunStats::default());

        stats.registrar(&outcome(LoopStatus::Passed, 2, 1));
        stats.registrar(&outcome(LoopStatus::Exhausted, 5, 0));
        stats.registrar_render(false);
        stats.guardar(dir.path());

        let loaded = RunStats::cargar(dir.path());
        assert_eq!(loaded.diagramas_validos, 1);
        assert_eq!(loaded.diagramas_agotados, 1);
        assert_eq!(loaded.llamadas_generacion, 7);
        assert_eq!(loaded.llamadas_fallidas, 1);
        assert_eq!(loaded.renders_fallidos, 1);
        assert!(loaded.ultima_ejecucion.is_some());
    }

    #[test]
    fn test_archivo_corrupto() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(STATS_FILE), "{no es json").unwrap();
        assert_eq!(RunStats::cargar(dir.path()), RunStats::default());
    }
}
