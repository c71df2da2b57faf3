// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RELATÓRIO DE EXECUÇÃO
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Um relatório por chamada de `analyze`: id de execução, timestamp,
// tempos por fase, relatórios dos estágios da cascata, contadores do
// funil de evidências e estatísticas do cache de embeddings.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cascade::StageReport;
use crate::embeddings::CacheStats;
use crate::utils::{PhaseTimings, SegmentedDocument};

/// Contadores do funil de evidências
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisCounters {
    /// Parágrafos do original
    pub source_paragraphs: usize,
    /// Sentenças do original
    pub source_sentences: usize,
    /// Parágrafos do simplificado
    pub target_paragraphs: usize,
    /// Sentenças do simplificado
    pub target_sentences: usize,
    /// Evidências emitidas pela cascata
    pub evidence_emitted: usize,
    /// Eliminadas por peso 0 / inativas
    pub eliminated: usize,
    /// Abaixo da confiança mínima
    pub below_threshold: usize,
    /// Removidas na deduplicação
    pub deduplicated: usize,
    /// Barradas pela política de emissão
    pub dropped_by_policy: usize,
    /// Descartadas por offsets inconsistentes
    pub inconsistencies: usize,
    /// Anotações finais
    pub annotations: usize,
}

impl AnalysisCounters {
    /// Preenche as contagens de unidades
    pub fn with_documents(mut self, source: &SegmentedDocument, target: &SegmentedDocument) -> Self {
        self.source_paragraphs = source.paragraphs.len();
        self.source_sentences = source.sentence_count();
        self.target_paragraphs = target.paragraphs.len();
        self.target_sentences = target.sentence_count();
        self
    }
}

/// Estatísticas de latência dos estágios
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageLatency {
    /// Estágio mais lento
    pub slowest_stage: Option<String>,
    /// Soma dos estágios (ms)
    pub total_ms: f64,
    /// Maior duração (ms)
    pub max_ms: f64,
    /// Média (ms)
    pub mean_ms: f64,
}

impl StageLatency {
    /// Calcula a partir dos relatórios
    pub fn from_reports(reports: &[StageReport]) -> Self {
        if reports.is_empty() {
            return Self::default();
        }
        let total_ms: f64 = reports.iter().map(|r| r.elapsed_ms).sum();
        let slowest = reports
            .iter()
            .max_by(|a, b| a.elapsed_ms.total_cmp(&b.elapsed_ms));
        Self {
            slowest_stage: slowest.map(|r| r.stage.to_string()),
            total_ms,
            max_ms: slowest.map(|r| r.elapsed_ms).unwrap_or(0.0),
            mean_ms: total_ms / reports.len() as f64,
        }
    }
}

/// Relatório de uma análise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Id único da execução
    pub execution_id: Uuid,
    /// Início da execução
    pub started_at: DateTime<Utc>,
    /// Fim da execução
    pub finished_at: Option<DateTime<Utc>>,
    /// Tempos por fase
    pub timings: PhaseTimings,
    /// Relatórios dos estágios
    pub stages: Vec<StageReport>,
    /// Latência agregada dos estágios
    pub stage_latency: StageLatency,
    /// Funil de evidências
    pub counters: AnalysisCounters,
    /// Cache de embeddings ao fim da execução
    pub cache: CacheStats,
}

impl AnalysisReport {
    /// Inicia um relatório
    pub fn start() -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            timings: PhaseTimings::new(),
            stages: Vec::new(),
            stage_latency: StageLatency::default(),
            counters: AnalysisCounters::default(),
            cache: CacheStats::default(),
        }
    }

    /// Registra os relatórios dos estágios
    pub fn record_stages(&mut self, stages: Vec<StageReport>) {
        self.stage_latency = StageLatency::from_reports(&stages);
        self.stages = stages;
    }

    /// Fecha o relatório
    pub fn finish(&mut self, cache: CacheStats) {
        self.cache = cache;
        self.finished_at = Some(Utc::now());
    }

    /// Duração total (ms), se finalizado
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }

    /// Resumo de uma linha para logs
    pub fn summary(&self) -> String {
        format!(
            "📊 Execution {} | {} annotations from {} evidence (eliminated {}, below threshold {}, dedup {}, policy {}, inconsistent {}) | cache hit rate {:.1}% | {}",
            self.execution_id,
            self.counters.annotations,
            self.counters.evidence_emitted,
            self.counters.eliminated,
            self.counters.below_threshold,
            self.counters.deduplicated,
            self.counters.dropped_by_policy,
            self.counters.inconsistencies,
            self.cache.hit_rate * 100.0,
            self.timings.summary()
        )
    }
}
