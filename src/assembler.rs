// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MONTADOR DE ANOTAÇÕES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Converte candidatas pontuadas em anotações finais:
// 1. Aplica a política de emissão (PRO+ nunca, OM+ só com opt-in)
// 2. Resolve trechos relativos à unidade em offsets absolutos
// 3. Confere cada offset contra o excerpt gravado na evidência
// 4. Ordena por offset de origem, depois de destino
//
// Anotação com offset inconsistente é descartada e registrada.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::scoring::ScoredCandidate;
use crate::strategies::EmissionPolicy;
use crate::types::{
    AnnotationEvidence, EvidenceSpan, ImpactLevel, StrategyAnnotation, TextSpan, TextUnit,
};
use crate::utils::SegmentedDocument;

/// Resultado da montagem
#[derive(Debug, Clone, Default)]
pub struct AssemblyOutput {
    /// Anotações válidas, ordenadas
    pub annotations: Vec<StrategyAnnotation>,
    /// Candidatas barradas pela política de emissão
    pub dropped_by_policy: usize,
    /// Descrição das anotações descartadas por inconsistência
    pub inconsistencies: Vec<String>,
}

/// Índice de unidades de um documento (parágrafos e sentenças)
struct UnitIndex<'a> {
    text: &'a str,
    units: HashMap<&'a str, &'a TextUnit>,
}

impl<'a> UnitIndex<'a> {
    fn new(document: &'a SegmentedDocument) -> Self {
        Self {
            text: &document.text,
            units: document.units().map(|u| (u.id.as_str(), u)).collect(),
        }
    }

    /// Offset absoluto de um trecho, conferido contra o documento
    fn resolve(&self, span: &EvidenceSpan) -> Result<TextSpan, String> {
        let unit = self
            .units
            .get(span.unit_id.as_str())
            .ok_or_else(|| format!("unknown unit `{}`", span.unit_id))?;

        if span.start > span.end || span.end > unit.text.len() {
            return Err(format!(
                "span {}..{} outside unit `{}` ({} bytes)",
                span.start,
                span.end,
                unit.id,
                unit.text.len()
            ));
        }

        let start = unit.start_offset + span.start;
        let end = unit.start_offset + span.end;
        let slice = self
            .text
            .get(start..end)
            .ok_or_else(|| format!("offsets {}..{} are not valid in the document", start, end))?;

        if slice != span.excerpt {
            return Err(format!(
                "offsets {}..{} read {:?}, expected {:?}",
                start, end, slice, span.excerpt
            ));
        }

        Ok(TextSpan::new(start, end))
    }

    fn resolve_all(&self, spans: &[EvidenceSpan]) -> Result<Vec<TextSpan>, String> {
        spans.iter().map(|s| self.resolve(s)).collect()
    }
}

/// Id determinístico: UUIDv5 do código e dos offsets
fn annotation_id(code: &str, source: &[TextSpan], target: &[TextSpan]) -> Uuid {
    let render = |spans: &[TextSpan]| {
        spans
            .iter()
            .map(|s| format!("{}-{}", s.start, s.end))
            .collect::<Vec<_>>()
            .join(",")
    };
    let key = format!("{}|{}|{}", code, render(source), render(target));
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
}

/// Montador de anotações para um par de documentos
pub struct AnnotationAssembler<'a> {
    source: UnitIndex<'a>,
    target: UnitIndex<'a>,
    policy: EmissionPolicy,
}

impl<'a> AnnotationAssembler<'a> {
    /// Cria montador
    pub fn new(source: &'a SegmentedDocument, target: &'a SegmentedDocument, policy: EmissionPolicy) -> Self {
        Self {
            source: UnitIndex::new(source),
            target: UnitIndex::new(target),
            policy,
        }
    }

    /// Monta as anotações finais
    pub fn assemble(&self, candidates: Vec<ScoredCandidate>) -> AssemblyOutput {
        let mut output = AssemblyOutput::default();
        let mut seen: HashSet<Uuid> = HashSet::new();

        for candidate in candidates {
            let code = candidate.evidence.strategy_code;
            if !self.policy.permits(code) {
                log::debug!("[assembler] {} blocked by emission policy", code);
                output.dropped_by_policy += 1;
                continue;
            }

            let offsets = self
                .source
                .resolve_all(&candidate.evidence.source_spans)
                .and_then(|s| self.target.resolve_all(&candidate.evidence.target_spans).map(|t| (s, t)));
            let (source_offsets, target_offsets) = match offsets {
                Ok(offsets) => offsets,
                Err(reason) => {
                    log::warn!("[assembler] ⚠️ Dropped {} annotation: {}", code, reason);
                    output.inconsistencies.push(format!("{}: {}", code, reason));
                    continue;
                }
            };

            let strategy_id = annotation_id(code.as_code(), &source_offsets, &target_offsets);
            if !seen.insert(strategy_id) {
                log::debug!("[assembler] Duplicate {} annotation {} skipped", code, strategy_id);
                continue;
            }

            let confidence = candidate.confidence().clamp(0.0, 1.0);
            let evidence = candidate.evidence;
            output.annotations.push(StrategyAnnotation {
                strategy_id,
                code,
                confidence,
                impact_level: ImpactLevel::classify(confidence, evidence.level),
                evidence: AnnotationEvidence {
                    level: evidence.level,
                    scope: evidence.scope,
                    signals: evidence.signals,
                    features: evidence.features,
                    contributors: evidence.contributors,
                    breakdown: candidate.breakdown,
                    source_excerpts: evidence.source_spans.into_iter().map(|s| s.excerpt).collect(),
                    target_excerpts: evidence.target_spans.into_iter().map(|s| s.excerpt).collect(),
                },
                source_offsets,
                target_offsets,
            });
        }

        output.annotations.sort_by(|a, b| {
            let first = |spans: &[TextSpan]| spans.iter().map(|s| s.start).min().unwrap_or(usize::MAX);
            first(&a.source_offsets)
                .cmp(&first(&b.source_offsets))
                .then_with(|| first(&a.target_offsets).cmp(&first(&b.target_offsets)))
                .then_with(|| a.code.cmp(&b.code))
                .then_with(|| a.strategy_id.cmp(&b.strategy_id))
        });

        log::info!(
            "[assembler] {} annotations ({} blocked by policy, {} inconsistent)",
            output.annotations.len(),
            output.dropped_by_policy,
            output.inconsistencies.len()
        );
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ScoreBreakdown;
    use crate::strategies::StrategyCode;
    use crate::types::{Side, StrategyEvidence, UnitLevel};
    use crate::utils::Segmenter;

    fn documents() -> (SegmentedDocument, SegmentedDocument) {
        let segmenter = Segmenter::new();
        (
            segmenter.segment(Side::Source, "Primeira frase longa. Segunda frase.\n\nOutro parágrafo aqui."),
            segmenter.segment(Side::Target, "Frase curta.\n\nOutro parágrafo."),
        )
    }

    fn candidate(evidence: StrategyEvidence, confidence: f32) -> ScoredCandidate {
        ScoredCandidate {
            evidence,
            breakdown: ScoreBreakdown {
                confidence,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_offsets_round_trip() {
        let (source, target) = documents();
        let sentence = &source.sentences[0][1];
        let evidence = StrategyEvidence::new(StrategyCode::VocabularySimplification, UnitLevel::Phrase)
            .with_source_excerpt(EvidenceSpan::within(sentence, 0, 7))
            .with_target_excerpt(EvidenceSpan::whole(&target.sentences[0][0]));

        let output = AnnotationAssembler::new(&source, &target, EmissionPolicy::default())
            .assemble(vec![candidate(evidence, 0.7)]);

        assert_eq!(output.annotations.len(), 1);
        let annotation = &output.annotations[0];
        let span = annotation.source_offsets[0];
        assert_eq!(&source.text[span.start..span.end], "Segunda");
        assert_eq!(annotation.evidence.source_excerpts[0], "Segunda");
        let target_span = annotation.target_offsets[0];
        assert_eq!(&target.text[target_span.start..target_span.end], "Frase curta.");
        assert_eq!(annotation.impact_level, ImpactLevel::Medium);
    }

    #[test]
    fn test_policy_blocks_reserved_codes() {
        let (source, target) = documents();
        let paragraph = &source.paragraphs[1];
        let omission = StrategyEvidence::new(StrategyCode::Omission, UnitLevel::Paragraph)
            .with_source_span(EvidenceSpan::whole(paragraph));
        let manual = StrategyEvidence::new(StrategyCode::ManualProblem, UnitLevel::Paragraph)
            .with_source_span(EvidenceSpan::whole(paragraph));

        let blocked = AnnotationAssembler::new(&source, &target, EmissionPolicy::new(false))
            .assemble(vec![candidate(omission.clone(), 0.9), candidate(manual.clone(), 0.9)]);
        assert!(blocked.annotations.is_empty());
        assert_eq!(blocked.dropped_by_policy, 2);

        let enabled = AnnotationAssembler::new(&source, &target, EmissionPolicy::new(true))
            .assemble(vec![candidate(omission, 0.9), candidate(manual, 0.9)]);
        assert_eq!(enabled.annotations.len(), 1);
        assert_eq!(enabled.annotations[0].code, StrategyCode::Omission);
        assert_eq!(enabled.dropped_by_policy, 1);
    }

    #[test]
    fn test_inconsistent_excerpt_is_dropped() {
        let (source, target) = documents();
        let mut span = EvidenceSpan::whole(&source.sentences[0][0]);
        span.excerpt = "texto diferente".to_string();
        let evidence = StrategyEvidence::new(StrategyCode::MeaningDrift, UnitLevel::Sentence).with_source_span(span);

        let output = AnnotationAssembler::new(&source, &target, EmissionPolicy::default())
            .assemble(vec![candidate(evidence, 0.8)]);
        assert!(output.annotations.is_empty());
        assert_eq!(output.inconsistencies.len(), 1);
    }

    #[test]
    fn test_unknown_unit_is_dropped() {
        let (source, target) = documents();
        let mut span = EvidenceSpan::whole(&source.sentences[0][0]);
        span.unit_id = "src:p9:s9".to_string();
        let evidence = StrategyEvidence::new(StrategyCode::MeaningDrift, UnitLevel::Sentence).with_source_span(span);

        let output = AnnotationAssembler::new(&source, &target, EmissionPolicy::default())
            .assemble(vec![candidate(evidence, 0.8)]);
        assert!(output.annotations.is_empty());
        assert!(output.inconsistencies[0].contains("unknown unit"));
    }

    #[test]
    fn test_sorted_by_source_offset_and_ids_are_stable() {
        let (source, target) = documents();
        let later = StrategyEvidence::new(StrategyCode::MeaningDrift, UnitLevel::Sentence)
            .with_source_span(EvidenceSpan::whole(&source.sentences[1][0]));
        let earlier = StrategyEvidence::new(StrategyCode::MeaningDrift, UnitLevel::Sentence)
            .with_source_span(EvidenceSpan::whole(&source.sentences[0][0]));
        let assembler = AnnotationAssembler::new(&source, &target, EmissionPolicy::default());

        let first = assembler.assemble(vec![candidate(later.clone(), 0.6), candidate(earlier.clone(), 0.6)]);
        let second = assembler.assemble(vec![candidate(earlier, 0.6), candidate(later, 0.6)]);

        assert!(first.annotations[0].source_offsets[0].start < first.annotations[1].source_offsets[0].start);
        assert_eq!(first.annotations, second.annotations);
    }
}
