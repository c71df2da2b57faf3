// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MOTOR DE ANÁLISE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Pipeline de uma requisição:
//
//   validação → segmentação → embeddings (origem ‖ destino, com timeout)
//     → [blocking pool] alinhamento → saliência → cascata → score → montagem
//
// Só erro de configuração vira `Err`. Falhas de modelo, prazo e
// inconsistências viram degradações anexadas ao resultado.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::alignment::{
    AlignmentResolver, AlignmentSummary, LexicalSimilarity, SemanticSimilarity, UnitSimilarity,
};
use crate::assembler::AnnotationAssembler;
use crate::cascade::{run_cascade, CascadeContext, Deadline, StageReport};
use crate::config::{AnalysisOptions, EngineConfig};
use crate::embeddings::{EmbeddingService, LocalEncoder, SubwordEmbedder};
use crate::error::{Degradation, DegradationKind, EngineError};
use crate::report::{AnalysisCounters, AnalysisReport};
use crate::salience::{compute_salience, resolve_provider, ResolvedSalience, SalienceMethod};
use crate::scoring::ConfidenceEngine;
use crate::strategies::EmissionPolicy;
use crate::types::{Side, StrategyAnnotation, TextUnit};
use crate::utils::{ActionTimer, PhaseTimings, SegmentedDocument, Segmenter};

/// Prazo padrão da fase de embeddings
pub const DEFAULT_EMBEDDING_TIMEOUT: Duration = Duration::from_secs(30);

/// Fração do `timeout` da requisição disponível para os embeddings; o
/// restante fica reservado à cascata
const EMBEDDING_BUDGET_DIVISOR: u32 = 2;

/// Capacidades efetivamente usadas na requisição
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityFlags {
    /// Embeddings vieram do fallback (ou não vieram)
    pub degraded_embeddings: bool,
    /// Cascata rodou só com sinais lexicais
    pub lexical_only: bool,
    /// Saliência pedida foi substituída pelo baseline
    pub salience_substituted: bool,
    /// Prazo expirou durante a cascata
    pub partial_result: bool,
    /// Método de similaridade usado no alinhamento
    pub embedding_method: String,
    /// Método de saliência efetivo
    pub salience_method: SalienceMethod,
}

/// Resultado de `analyze`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Anotações ordenadas por offset
    pub strategy_annotations: Vec<StrategyAnnotation>,
    /// Resumo do alinhamento
    pub alignment_summary: AlignmentSummary,
    /// Capacidades
    pub capability_flags: CapabilityFlags,
    /// Degradações (vazio quando tudo correu bem)
    pub degradations: Vec<Degradation>,
    /// Relatório de execução
    pub report: AnalysisReport,
}

/// Saída da parte CPU do pipeline (roda no blocking pool)
#[derive(Default)]
struct PipelineOutput {
    annotations: Vec<StrategyAnnotation>,
    summary: AlignmentSummary,
    stages: Vec<StageReport>,
    counters: AnalysisCounters,
    timings: PhaseTimings,
    inconsistencies: Vec<String>,
    partial: bool,
}

/// Insumos da parte CPU, movidos para o blocking pool
struct PipelineInput {
    source: SegmentedDocument,
    target: SegmentedDocument,
    similarity: Box<dyn UnitSimilarity>,
    salience: ResolvedSalience,
    options: AnalysisOptions,
    segmenter: Segmenter,
    degraded: bool,
    deadline: Deadline,
    counters: AnalysisCounters,
}

fn run_pipeline(input: PipelineInput) -> PipelineOutput {
    let PipelineInput {
        source,
        target,
        similarity,
        salience,
        options,
        segmenter,
        degraded,
        deadline,
        mut counters,
    } = input;
    let mut timings = PhaseTimings::new();
    let thresholds = &options.thresholds;

    let timer = ActionTimer::start("align");
    let alignment = AlignmentResolver::new(similarity.as_ref(), thresholds).align_documents(&source, &target);
    timings.alignment_ms = PhaseTimings::ms(timer.stop_and_log());

    let timer = ActionTimer::start("salience");
    let salience_map = compute_salience(&salience, &source);
    timings.salience_ms = PhaseTimings::ms(timer.stop_and_log());

    let policy = EmissionPolicy::from_options(&options);
    let timer = ActionTimer::start("cascade");
    let cascade = run_cascade(&CascadeContext {
        source: &source,
        target: &target,
        alignment: &alignment,
        salience: &salience_map,
        similarity: similarity.as_ref(),
        thresholds,
        segmenter: &segmenter,
        policy,
        degraded,
        deadline,
    });
    timings.cascade_ms = PhaseTimings::ms(timer.stop_and_log());
    counters.evidence_emitted = cascade.evidence.len();

    let timer = ActionTimer::start("scoring");
    let scorer = ConfidenceEngine::from_options(&options);
    let scored = scorer.score_all(cascade.evidence);
    counters.eliminated = scored.eliminated.len();
    counters.below_threshold = scored.below_threshold;
    let before_dedup = scored.candidates.len();
    let candidates = scorer.deduplicate(scored.candidates);
    counters.deduplicated = before_dedup - candidates.len();
    timings.scoring_ms = PhaseTimings::ms(timer.stop_and_log());

    let timer = ActionTimer::start("assembly");
    let assembled = AnnotationAssembler::new(&source, &target, policy).assemble(candidates);
    timings.assembly_ms = PhaseTimings::ms(timer.stop_and_log());
    counters.dropped_by_policy = assembled.dropped_by_policy;
    counters.inconsistencies = assembled.inconsistencies.len();
    counters.annotations = assembled.annotations.len();

    PipelineOutput {
        annotations: assembled.annotations,
        summary: AlignmentSummary::build(&alignment, &target, &similarity.method()),
        stages: cascade.reports,
        counters,
        timings,
        inconsistencies: assembled.inconsistencies,
        partial: cascade.partial,
    }
}

struct EngineInner {
    embeddings: EmbeddingService,
    encoder: Arc<dyn LocalEncoder>,
    segmenter: Segmenter,
    embedding_timeout: Duration,
}

/// Motor de análise de estratégias de simplificação.
///
/// Barato de clonar; requisições são independentes e só compartilham
/// o cache de embeddings.
///
/// # Exemplo
///
/// ```rust,ignore
/// let engine = SimplificationEngine::new();
/// let result = engine
///     .analyze("Texto original.", "Texto simples.", &AnalysisOptions::default())
///     .await?;
/// for annotation in &result.strategy_annotations {
///     println!("{} {:.2}", annotation.code, annotation.confidence);
/// }
/// ```
#[derive(Clone)]
pub struct SimplificationEngine {
    inner: Arc<EngineInner>,
}

impl Default for SimplificationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimplificationEngine {
    /// Motor com o modelo local padrão
    pub fn new() -> Self {
        Self::with_embeddings(EmbeddingService::local_default())
    }

    /// Motor com um serviço de embeddings específico
    pub fn with_embeddings(embeddings: EmbeddingService) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                embeddings,
                encoder: Arc::new(SubwordEmbedder::new()),
                segmenter: Segmenter::new(),
                embedding_timeout: DEFAULT_EMBEDDING_TIMEOUT,
            }),
        }
    }

    /// Motor a partir da configuração de ambiente
    pub fn from_config(config: &EngineConfig) -> Self {
        log::info!(
            "[engine] Backend {} | cache {} | embedding timeout {:?}",
            config.backend,
            config.cache_size,
            config.embedding_timeout
        );
        Self {
            inner: Arc::new(EngineInner {
                embeddings: EmbeddingService::from_config(config),
                encoder: Arc::new(SubwordEmbedder::new()),
                segmenter: Segmenter::new(),
                embedding_timeout: config.embedding_timeout,
            }),
        }
    }

    /// Serviço de embeddings (e cache) do motor
    pub fn embeddings(&self) -> &EmbeddingService {
        &self.inner.embeddings
    }

    /// Analisa um par original/simplificado.
    ///
    /// Devolve `Err` somente para opções inválidas; qualquer outra falha
    /// produz resultado degradado ou parcial com `degradations` preenchido.
    pub async fn analyze(
        &self,
        source_text: &str,
        target_text: &str,
        options: &AnalysisOptions,
    ) -> Result<AnalysisResult, EngineError> {
        options.validate()?;

        let mut report = AnalysisReport::start();
        let mut degradations = Vec::new();
        let started = Instant::now();
        log::info!("[engine] 🔍 Analysis {} started", report.execution_id);

        if options.enable_manual_only_override {
            degradations.push(Degradation::new(
                DegradationKind::OverrideIgnored,
                "policy",
                "enable_manual_only_override is accepted but PRO+ is never emitted automatically",
            ));
        }

        // Segmentação
        let timer = ActionTimer::start("segmentation");
        let source = self.inner.segmenter.segment(Side::Source, source_text);
        let target = self.inner.segmenter.segment(Side::Target, target_text);
        report.timings.segmentation_ms = PhaseTimings::ms(timer.stop_and_log());

        for (document, name) in [(&source, "source"), (&target, "target")] {
            if document.is_blank() {
                degradations.push(Degradation::new(
                    DegradationKind::InputError,
                    "segmenter",
                    format!("{} text is empty; analyzed as a single trivial unit", name),
                ));
            }
        }

        // Embeddings
        let timer = ActionTimer::start("embeddings");
        let (similarity, degraded, lexical_only) = self.embed(&source, &target, options, &mut degradations).await;
        report.timings.embedding_ms = PhaseTimings::ms(timer.stop_and_log());

        // Prazo da requisição; o orçamento dos embeddings deixa metade dele
        let deadline = options
            .timeout
            .and_then(|t| started.checked_add(t))
            .map(Deadline::at)
            .unwrap_or_default();

        // Saliência: semântica só com embeddings íntegros
        let encoder = (!degraded && !lexical_only).then(|| Arc::clone(&self.inner.encoder));
        let salience = resolve_provider(options.salience_method, encoder);
        if salience.substituted {
            degradations.push(Degradation::new(
                DegradationKind::SalienceSubstituted,
                "salience",
                format!("{} unavailable, using {}", salience.requested, salience.effective),
            ));
        }
        let salience_substituted = salience.substituted;
        let salience_method = salience.effective;
        let embedding_method = similarity.method();

        let input = PipelineInput {
            counters: AnalysisCounters::default().with_documents(&source, &target),
            source,
            target,
            similarity,
            salience,
            options: options.clone(),
            segmenter: self.inner.segmenter.clone(),
            degraded: degraded || lexical_only,
            deadline,
        };

        let output = match tokio::task::spawn_blocking(move || run_pipeline(input)).await {
            Ok(output) => output,
            Err(e) => {
                log::error!("[engine] ❌ Pipeline worker failed: {}", e);
                degradations.push(Degradation::new(
                    DegradationKind::InternalInconsistency,
                    "engine",
                    format!("pipeline worker failed: {}", e),
                ));
                PipelineOutput::default()
            }
        };

        for stage in &output.stages {
            for warning in &stage.warnings {
                degradations.push(Degradation::new(
                    DegradationKind::StageWarning,
                    format!("cascade:{}", stage.stage),
                    warning.clone(),
                ));
            }
            if stage.timed_out {
                degradations.push(Degradation::new(
                    DegradationKind::Timeout,
                    format!("cascade:{}", stage.stage),
                    "request deadline reached; evidence is partial",
                ));
            }
        }
        for inconsistency in &output.inconsistencies {
            degradations.push(Degradation::new(
                DegradationKind::InternalInconsistency,
                "assembler",
                inconsistency.clone(),
            ));
        }

        let segmentation_ms = report.timings.segmentation_ms;
        let embedding_ms = report.timings.embedding_ms;
        report.timings = PhaseTimings {
            segmentation_ms,
            embedding_ms,
            ..output.timings
        };
        report.counters = output.counters;
        report.record_stages(output.stages);
        report.finish(self.inner.embeddings.cache().stats());
        log::info!("[engine] {}", report.summary());

        Ok(AnalysisResult {
            strategy_annotations: output.annotations,
            alignment_summary: output.summary,
            capability_flags: CapabilityFlags {
                degraded_embeddings: degraded || lexical_only,
                lexical_only,
                salience_substituted,
                partial_result: output.partial,
                embedding_method,
                salience_method,
            },
            degradations,
            report,
        })
    }

    /// Embeddings de origem e destino em paralelo.
    ///
    /// Devolve a fonte de similaridade, se houve fallback e se a cascata
    /// deve rodar só com sinais lexicais.
    async fn embed(
        &self,
        source: &SegmentedDocument,
        target: &SegmentedDocument,
        options: &AnalysisOptions,
        degradations: &mut Vec<Degradation>,
    ) -> (Box<dyn UnitSimilarity>, bool, bool) {
        let source_units: Vec<TextUnit> = source.units().cloned().collect();
        let target_units: Vec<TextUnit> = target.units().cloned().collect();
        let service = &self.inner.embeddings;

        let budget = options
            .timeout
            .map(|t| (t / EMBEDDING_BUDGET_DIVISOR).min(self.inner.embedding_timeout))
            .unwrap_or(self.inner.embedding_timeout);

        let embedding = tokio::time::timeout(budget, async {
            futures::join!(service.embed_batch(&source_units), service.embed_batch(&target_units))
        })
        .await;

        let failure = match embedding {
            Ok((Ok(source_batch), Ok(target_batch))) => {
                let degraded = source_batch.degraded || target_batch.degraded;
                if degraded {
                    let mut notes = source_batch.notes.clone();
                    notes.extend(target_batch.notes.iter().cloned());
                    notes.dedup();
                    degradations.push(Degradation::new(
                        DegradationKind::ModelUnavailable,
                        "embeddings",
                        format!("fallback {} used: {}", source_batch.method, notes.join("; ")),
                    ));
                }
                let similarity = SemanticSimilarity::from_batches(&source_batch, &target_batch);
                return (Box::new(similarity), degraded, false);
            }
            Ok((Err(e), _)) | Ok((_, Err(e))) => {
                degradations.push(Degradation::new(DegradationKind::ModelUnavailable, "embeddings", e.to_string()));
                e.to_string()
            }
            Err(_) => {
                degradations.push(Degradation::new(
                    DegradationKind::Timeout,
                    "embeddings",
                    format!("embedding phase exceeded {:?}", budget),
                ));
                format!("timeout after {:?}", budget)
            }
        };

        log::warn!("[engine] ⚠️ No embeddings ({}), running lexical-only cascade", failure);
        degradations.push(Degradation::new(
            DegradationKind::LexicalOnly,
            "embeddings",
            "cascade ran with lexical signals only",
        ));
        (Box::new(LexicalSimilarity::new()), true, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{EmbeddingError, EmbeddingProvider};
    use crate::strategies::StrategyCode;
    use async_trait::async_trait;

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        fn method(&self) -> String {
            "failing".into()
        }

        fn dimension(&self) -> usize {
            8
        }

        async fn embed_texts(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Unavailable("offline".into()))
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl EmbeddingProvider for SlowProvider {
        fn method(&self) -> String {
            "slow".into()
        }

        fn dimension(&self) -> usize {
            8
        }

        async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![vec![1.0; 8]; texts.len()])
        }
    }

    const SOURCE: &str = "O especialista examinou o paciente cuidadosamente durante a consulta.";
    const TARGET: &str = "O médico examinou o paciente cuidadosamente durante a consulta.";

    #[tokio::test]
    async fn test_invalid_options_are_rejected() {
        let mut options = AnalysisOptions::default();
        options.thresholds.drift = -0.1;
        let result = SimplificationEngine::new().analyze(SOURCE, TARGET, &options).await;
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_unknown_code_is_rejected() {
        let mut options = AnalysisOptions::default();
        options
            .tag_weights
            .insert("XYZ+".into(), crate::config::TagSetting::default());
        let result = SimplificationEngine::new().analyze(SOURCE, TARGET, &options).await;
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_healthy_run_has_no_degradations() {
        let result = SimplificationEngine::new()
            .analyze(SOURCE, TARGET, &AnalysisOptions::default())
            .await
            .unwrap();

        assert!(!result.capability_flags.degraded_embeddings);
        assert!(!result.capability_flags.lexical_only);
        assert!(result.degradations.is_empty());
        assert_eq!(result.report.stages.len(), 3);
        assert!(result.capability_flags.embedding_method.starts_with("subword"));
    }

    #[tokio::test]
    async fn test_provider_failure_uses_lexical_only() {
        let service = EmbeddingService::without_fallback(Arc::new(FailingProvider));
        let result = SimplificationEngine::with_embeddings(service)
            .analyze(SOURCE, TARGET, &AnalysisOptions::default())
            .await
            .unwrap();

        assert!(result.capability_flags.lexical_only);
        assert!(result.capability_flags.degraded_embeddings);
        assert_eq!(result.capability_flags.embedding_method, "lexical");
        assert!(result
            .degradations
            .iter()
            .any(|d| d.kind == DegradationKind::LexicalOnly));
    }

    #[tokio::test]
    async fn test_embedding_timeout_uses_lexical_only() {
        let service = EmbeddingService::without_fallback(Arc::new(SlowProvider));
        let options = AnalysisOptions::default().with_timeout(Duration::from_millis(50));
        let result = SimplificationEngine::with_embeddings(service)
            .analyze(SOURCE, TARGET, &options)
            .await
            .unwrap();

        assert!(result.capability_flags.lexical_only);
        assert!(result.degradations.iter().any(|d| d.kind == DegradationKind::Timeout));
    }

    #[tokio::test]
    async fn test_slow_embeddings_leave_time_for_lexical_cascade() {
        let service = EmbeddingService::without_fallback(Arc::new(SlowProvider));
        let options = AnalysisOptions::default().with_timeout(Duration::from_secs(2));
        let result = SimplificationEngine::with_embeddings(service)
            .analyze(SOURCE, TARGET, &options)
            .await
            .unwrap();

        assert!(result.capability_flags.lexical_only);
        assert!(!result.capability_flags.partial_result);
        assert!(result
            .degradations
            .iter()
            .any(|d| d.kind == DegradationKind::Timeout && d.component == "embeddings"));
        assert!(result
            .degradations
            .iter()
            .all(|d| !(d.kind == DegradationKind::Timeout && d.component.starts_with("cascade:"))));
        assert!(result
            .strategy_annotations
            .iter()
            .any(|a| a.code == StrategyCode::VocabularySimplification));
    }

    #[tokio::test]
    async fn test_multibyte_space_input_is_analyzed() {
        let result = SimplificationEngine::new()
            .analyze("Custa R$\u{00A0}5. Depois sai.", "Custa pouco.", &AnalysisOptions::default())
            .await
            .unwrap();
        assert_eq!(result.alignment_summary.paragraph_pairs.len(), 1);
    }

    #[tokio::test]
    async fn test_override_is_reported_and_ignored() {
        let mut options = AnalysisOptions::default();
        options.enable_manual_only_override = true;
        let result = SimplificationEngine::new().analyze(SOURCE, TARGET, &options).await.unwrap();

        assert!(result
            .degradations
            .iter()
            .any(|d| d.kind == DegradationKind::OverrideIgnored));
        assert!(result
            .strategy_annotations
            .iter()
            .all(|a| a.code != StrategyCode::ManualProblem));
    }

    #[tokio::test]
    async fn test_semantic_salience_substituted_when_degraded() {
        let options = AnalysisOptions::default().with_salience(SalienceMethod::Semantic);
        let result = SimplificationEngine::with_embeddings(EmbeddingService::fallback_only())
            .analyze(SOURCE, TARGET, &options)
            .await
            .unwrap();

        assert!(result.capability_flags.salience_substituted);
        assert_eq!(result.capability_flags.salience_method, SalienceMethod::Frequency);
    }

    #[tokio::test]
    async fn test_empty_input_is_degraded_not_error() {
        let result = SimplificationEngine::new()
            .analyze("", TARGET, &AnalysisOptions::default())
            .await
            .unwrap();
        assert!(result
            .degradations
            .iter()
            .any(|d| d.kind == DegradationKind::InputError));
    }
}
