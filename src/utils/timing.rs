// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TIMING UTILITIES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Utilitários para medir tempo de execução das fases da análise.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Timer para medir duração de operações
pub struct ActionTimer {
    start: Instant,
    action_name: String,
}

impl ActionTimer {
    /// Inicia um novo timer para uma ação
    pub fn start(action_name: &str) -> Self {
        Self {
            start: Instant::now(),
            action_name: action_name.to_string(),
        }
    }

    /// Retorna o tempo decorrido em milissegundos
    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }

    /// Retorna o tempo decorrido como Duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Para o timer e loga o tempo decorrido (nível debug)
    pub fn stop_and_log(self) -> Duration {
        let elapsed = self.elapsed();
        log::debug!("⏱️  {} completado em {}ms", self.action_name, elapsed.as_millis());
        elapsed
    }

    /// Para o timer e retorna o tempo sem logar
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

/// Tempos por fase de uma análise (ms)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseTimings {
    /// Segmentação dos dois documentos
    pub segmentation_ms: f64,
    /// Embeddings (fonte e alvo em paralelo)
    pub embedding_ms: f64,
    /// Alinhamento parágrafo → sentença
    pub alignment_ms: f64,
    /// Saliência
    pub salience_ms: f64,
    /// Cascata Macro/Meso/Micro
    pub cascade_ms: f64,
    /// Pontuação e deduplicação
    pub scoring_ms: f64,
    /// Montagem das anotações
    pub assembly_ms: f64,
}

impl PhaseTimings {
    /// Cria tempos zerados
    pub fn new() -> Self {
        Self::default()
    }

    /// Converte Duration em ms fracionários
    pub fn ms(duration: Duration) -> f64 {
        duration.as_secs_f64() * 1000.0
    }

    /// Tempo total das fases
    pub fn total_ms(&self) -> f64 {
        self.segmentation_ms
            + self.embedding_ms
            + self.alignment_ms
            + self.salience_ms
            + self.cascade_ms
            + self.scoring_ms
            + self.assembly_ms
    }

    /// Formata um resumo
    pub fn summary(&self) -> String {
        format!(
            "Timings: segment {:.1}ms | embed {:.1}ms | align {:.1}ms | salience {:.1}ms | cascade {:.1}ms | score {:.1}ms | assemble {:.1}ms | total {:.1}ms",
            self.segmentation_ms,
            self.embedding_ms,
            self.alignment_ms,
            self.salience_ms,
            self.cascade_ms,
            self.scoring_ms,
            self.assembly_ms,
            self.total_ms()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_action_timer() {
        let timer = ActionTimer::start("test");
        sleep(Duration::from_millis(10));
        let elapsed = timer.stop();
        assert!(elapsed >= Duration::from_millis(10));
    }

    #[test]
    fn test_phase_timings_total() {
        let mut timings = PhaseTimings::new();
        timings.embedding_ms = PhaseTimings::ms(Duration::from_millis(100));
        timings.cascade_ms = 50.0;

        assert!((timings.total_ms() - 150.0).abs() < 1e-6);
        assert!(timings.summary().contains("total 150.0ms"));
    }
}
