//! # Testes de Integração
//!
//! Valida o fluxo completo do motor, da segmentação às anotações:
//! - Cenários de referência (divisão, omissão, textos idênticos, fallback)
//! - Propriedades: determinismo, offsets, limites de score, pesos
//! - Rejeição de configuração inválida

use std::sync::Arc;

use async_trait::async_trait;
use simplification_engine::embeddings::{EmbeddingError, EmbeddingProvider, EmbeddingService};
use simplification_engine::prelude::*;
use simplification_engine::utils::Segmenter;

const SPLIT_SOURCE: &str =
    "Este é um texto muito complexo que precisa ser simplificado para melhor entendimento.";
const SPLIT_TARGET: &str = "Este texto é complexo. Precisa ser simplificado.";

const LEXICAL_SOURCE: &str = "O especialista examinou o paciente cuidadosamente durante a consulta.";
const LEXICAL_TARGET: &str = "O médico examinou o paciente cuidadosamente durante a consulta.";

const OMISSION_SOURCE: &str = "O governo aprovou o orçamento da saúde.\n\nOs vulcões submarinos liberam magma incandescente.";
const OMISSION_TARGET: &str = "O governo aprovou o orçamento da saúde.";

struct OfflineProvider;

#[async_trait]
impl EmbeddingProvider for OfflineProvider {
    fn method(&self) -> String {
        "offline".into()
    }

    fn dimension(&self) -> usize {
        16
    }

    async fn embed_texts(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::NetworkError("connection refused".into()))
    }
}

async fn analyze(source: &str, target: &str, options: &AnalysisOptions) -> AnalysisResult {
    SimplificationEngine::new()
        .analyze(source, target, options)
        .await
        .expect("valid options")
}

fn find(result: &AnalysisResult, code: StrategyCode) -> Option<&StrategyAnnotation> {
    result.strategy_annotations.iter().find(|a| a.code == code)
}

// ============================================================================
// CENÁRIO A: uma sentença dividida em duas
// ============================================================================

#[tokio::test]
async fn test_scenario_split_sentence_is_fragmentation() {
    let result = analyze(SPLIT_SOURCE, SPLIT_TARGET, &AnalysisOptions::default()).await;

    let summary = &result.alignment_summary;
    assert_eq!(summary.sentence_counts.split, 2);
    let split_pairs: Vec<_> = summary
        .sentence_pairs
        .iter()
        .filter(|p| p.status == AlignmentStatus::Split)
        .collect();
    assert_eq!(split_pairs.len(), 2, "one source sentence paired with two targets");

    let fragmentation = find(&result, StrategyCode::Fragmentation).expect("RP+ annotation");
    assert!(fragmentation.confidence > 0.6, "confidence = {}", fragmentation.confidence);
    assert_eq!(fragmentation.source_offsets.len(), 1);
    assert_eq!(fragmentation.target_offsets.len(), 2);
}

// ============================================================================
// CENÁRIO B: parágrafo sem correspondente, omissão desabilitada
// ============================================================================

#[tokio::test]
async fn test_scenario_unmatched_paragraph_without_omission() {
    let result = analyze(OMISSION_SOURCE, OMISSION_TARGET, &AnalysisOptions::default()).await;

    assert_eq!(result.alignment_summary.paragraph_counts.unaligned, 1);
    assert!(find(&result, StrategyCode::Omission).is_none());

    // Nada aponta para o segundo parágrafo
    let second_paragraph = OMISSION_SOURCE.find("Os vulcões").unwrap();
    assert!(result
        .strategy_annotations
        .iter()
        .flat_map(|a| a.source_offsets.iter())
        .all(|span| span.end <= second_paragraph));
}

#[tokio::test]
async fn test_unmatched_paragraph_with_omission_enabled() {
    let options = AnalysisOptions::default().with_omission(true);
    let result = analyze(OMISSION_SOURCE, OMISSION_TARGET, &options).await;

    let omission = find(&result, StrategyCode::Omission).expect("OM+ annotation");
    assert!(omission.target_offsets.is_empty());
    assert_eq!(
        &OMISSION_SOURCE[omission.source_offsets[0].start..omission.source_offsets[0].end],
        "Os vulcões submarinos liberam magma incandescente."
    );
}

// ============================================================================
// CENÁRIO C: textos idênticos
// ============================================================================

#[tokio::test]
async fn test_scenario_identical_texts() {
    let text = "O sol nasceu cedo.\n\nA cidade acordou devagar. Os ônibus encheram.";
    let result = analyze(text, text, &AnalysisOptions::default()).await;

    assert!(result.strategy_annotations.is_empty());
    assert!(result.degradations.is_empty());
    let summary = &result.alignment_summary;
    assert_eq!(summary.paragraph_pairs.len(), 2);
    for pair in summary.paragraph_pairs.iter().chain(summary.sentence_pairs.iter()) {
        assert_eq!(pair.status, AlignmentStatus::Aligned);
        assert_eq!(pair.score, 1.0);
    }
}

#[tokio::test]
async fn test_scenario_identical_texts_with_repetition() {
    for text in [
        "O sol nasceu. O sol nasceu.",
        "Sim, claro.\n\nSim, claro.",
    ] {
        let result = analyze(text, text, &AnalysisOptions::default()).await;
        let summary = &result.alignment_summary;

        assert!(result.strategy_annotations.is_empty(), "{:?}", text);
        assert!(summary.unaligned_target_paragraphs.is_empty(), "{:?}", text);
        assert!(summary.unaligned_target_sentences.is_empty(), "{:?}", text);
        for pair in summary.paragraph_pairs.iter().chain(summary.sentence_pairs.iter()) {
            assert_eq!(pair.status, AlignmentStatus::Aligned, "{:?}", text);
            assert_eq!(pair.score, 1.0);
            assert_eq!(Some(pair.source_index), pair.target_index);
        }
    }
}

#[tokio::test]
async fn test_multibyte_whitespace_does_not_break_analysis() {
    let source = "Custa R$\u{00A0}5. Depois sai.\n\nO preço\u{2009}é. Fim\u{3000}A. Novo.";
    let result = analyze(source, "Custa pouco. Depois sai.", &AnalysisOptions::default()).await;

    assert_eq!(result.alignment_summary.paragraph_pairs.len(), 2);
    for annotation in &result.strategy_annotations {
        for span in &annotation.source_offsets {
            assert!(source.is_char_boundary(span.start) && source.is_char_boundary(span.end));
        }
    }
}

// ============================================================================
// CENÁRIO D: modo degradado
// ============================================================================

#[tokio::test]
async fn test_scenario_forced_fallback() {
    let engine = SimplificationEngine::with_embeddings(EmbeddingService::fallback_only());
    let result = engine
        .analyze(LEXICAL_SOURCE, LEXICAL_TARGET, &AnalysisOptions::default())
        .await
        .unwrap();

    assert!(result.capability_flags.degraded_embeddings);
    assert!(!result.strategy_annotations.is_empty());
    assert!(find(&result, StrategyCode::VocabularySimplification).is_some());
    assert!(result
        .degradations
        .iter()
        .any(|d| d.kind == DegradationKind::ModelUnavailable));
}

#[tokio::test]
async fn test_provider_outage_runs_lexical_only() {
    let engine = SimplificationEngine::with_embeddings(EmbeddingService::without_fallback(Arc::new(OfflineProvider)));
    let result = engine
        .analyze(LEXICAL_SOURCE, LEXICAL_TARGET, &AnalysisOptions::default())
        .await
        .unwrap();

    assert!(result.capability_flags.lexical_only);
    assert_eq!(result.alignment_summary.method, "lexical");
    let lexical = find(&result, StrategyCode::VocabularySimplification).expect("SL+ annotation");
    assert_eq!(lexical.evidence.source_excerpts, vec!["especialista".to_string()]);
    assert_eq!(lexical.evidence.target_excerpts, vec!["médico".to_string()]);
}

// ============================================================================
// PROPRIEDADES
// ============================================================================

#[tokio::test]
async fn test_analysis_is_deterministic() {
    let engine = SimplificationEngine::new();
    let options = AnalysisOptions::default().with_omission(true);
    let source = format!("{}\n\n{}", SPLIT_SOURCE, LEXICAL_SOURCE);
    let target = format!("{}\n\n{}", SPLIT_TARGET, LEXICAL_TARGET);

    let first = engine.analyze(&source, &target, &options).await.unwrap();
    let second = engine.analyze(&source, &target, &options).await.unwrap();

    assert_eq!(first.strategy_annotations, second.strategy_annotations);
    assert_eq!(first.alignment_summary, second.alignment_summary);
    assert_ne!(first.report.execution_id, second.report.execution_id);
    // Segunda execução reaproveita o cache
    assert!(second.report.cache.hits > first.report.cache.hits);
}

#[tokio::test]
async fn test_offsets_round_trip_to_excerpts() {
    let source = format!("{}\n\n{}", SPLIT_SOURCE, LEXICAL_SOURCE);
    let target = format!("{}\n\n{}", SPLIT_TARGET, LEXICAL_TARGET);
    let result = analyze(&source, &target, &AnalysisOptions::default()).await;

    assert!(!result.strategy_annotations.is_empty());
    for annotation in &result.strategy_annotations {
        for (span, excerpt) in annotation
            .source_offsets
            .iter()
            .zip(&annotation.evidence.source_excerpts)
        {
            assert_eq!(&source[span.start..span.end], excerpt);
        }
        for (span, excerpt) in annotation
            .target_offsets
            .iter()
            .zip(&annotation.evidence.target_excerpts)
        {
            assert_eq!(&target[span.start..span.end], excerpt);
        }
    }
}

#[tokio::test]
async fn test_scores_are_bounded_and_above_minimum() {
    let source = format!("{}\n\n{}\n\n{}", SPLIT_SOURCE, LEXICAL_SOURCE, "A lei foi aprovada pelo congresso.");
    let target = format!("{}\n\n{}\n\n{}", SPLIT_TARGET, LEXICAL_TARGET, "O congresso aprovou a lei.");
    let options = AnalysisOptions::default();
    let result = analyze(&source, &target, &options).await;

    for annotation in &result.strategy_annotations {
        assert!((0.0..=1.0).contains(&annotation.confidence));
        assert!(annotation.confidence >= options.thresholds.min_confidence);
        let signals = &annotation.evidence.signals;
        for value in [signals.semantic, signals.lexical, signals.structural, signals.salience] {
            assert!((0.0..=1.0).contains(&value));
        }
    }
}

#[tokio::test]
async fn test_zero_weight_removes_and_half_weight_lowers() {
    let full = analyze(LEXICAL_SOURCE, LEXICAL_TARGET, &AnalysisOptions::default()).await;
    let baseline = find(&full, StrategyCode::VocabularySimplification)
        .expect("SL+ annotation")
        .confidence;

    let zero = AnalysisOptions::default().with_tag(StrategyCode::VocabularySimplification, TagSetting::weighted(0.0));
    let removed = analyze(LEXICAL_SOURCE, LEXICAL_TARGET, &zero).await;
    assert!(find(&removed, StrategyCode::VocabularySimplification).is_none());
    assert!(removed.report.counters.eliminated >= 1);

    let half = AnalysisOptions::default().with_tag(StrategyCode::VocabularySimplification, TagSetting::weighted(0.5));
    let lowered = analyze(LEXICAL_SOURCE, LEXICAL_TARGET, &half).await;
    let halved = find(&lowered, StrategyCode::VocabularySimplification)
        .expect("SL+ still reported")
        .confidence;
    assert!((halved - baseline * 0.5).abs() < 1e-5, "{} vs {}", halved, baseline);
}

#[test]
fn test_segmentation_is_idempotent() {
    let segmenter = Segmenter::new();
    let text = "O Dr. Silva chegou às 10h. Ele pagou R$ 3,50 pelo café!\n\nDepois saiu.";
    let first = segmenter.segment(Side::Source, text);
    let second = segmenter.segment(Side::Source, text);
    assert_eq!(first.units().collect::<Vec<_>>(), second.units().collect::<Vec<_>>());

    for sentence in first.all_sentences() {
        assert_eq!(&text[sentence.start_offset..sentence.end_offset], sentence.text);
        let again = segmenter.segment(Side::Source, &sentence.text);
        assert_eq!(again.sentence_count(), 1, "sentence '{}' re-split", sentence.text);
    }
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected() {
    let engine = SimplificationEngine::new();

    let bad_weight = AnalysisOptions::default().with_tag(StrategyCode::Omission, TagSetting::weighted(1.5));
    assert!(matches!(
        engine.analyze("a", "b", &bad_weight).await,
        Err(EngineError::Configuration(_))
    ));

    let mut bad_threshold = AnalysisOptions::default();
    bad_threshold.thresholds.min_confidence = 2.0;
    assert!(matches!(
        engine.analyze("a", "b", &bad_threshold).await,
        Err(EngineError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_result_serializes_to_json() {
    let result = analyze(LEXICAL_SOURCE, LEXICAL_TARGET, &AnalysisOptions::default()).await;
    let json = serde_json::to_value(&result).unwrap();
    assert!(json["strategy_annotations"].is_array());
    assert!(json["capability_flags"]["degraded_embeddings"].is_boolean());
    assert_eq!(json["strategy_annotations"][0]["code"], "SL+");
}
