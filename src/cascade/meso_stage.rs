// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ESTÁGIO MESO (SENTENÇA)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Percorre os grupos de parágrafos não podados:
// - RP+: uma sentença virou várias e o conteúdo foi preservado
// - AS+: par 1:1 com similaridade abaixo do limiar de deriva
// - EXP+: destino cresce e traz vocabulário novo
// Pares 1:1 com texto diferente seguem para o estágio Micro.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use super::{CascadeContext, StageEvaluator, StageReport};
use crate::alignment::{AlignmentGroup, SentenceAlignment};
use crate::strategies::{Stage, StrategyCode};
use crate::types::{AlignmentStatus, EvidenceSignals, EvidenceSpan, StrategyEvidence, TextUnit, UnitLevel};
use crate::utils::{content_coverage, content_novelty, content_set, jaccard, word_count};

/// Par de sentenças 1:1 encaminhado ao estágio Micro
#[derive(Debug, Clone, PartialEq)]
pub struct SentencePair {
    /// Grupo de parágrafos de origem
    pub paragraph_group: usize,
    /// Sentença original
    pub source: TextUnit,
    /// Sentença simplificada
    pub target: TextUnit,
    /// Similaridade do par
    pub score: f32,
}

/// Saída do estágio Meso
#[derive(Debug, Clone, Default)]
pub struct MesoOutput {
    /// Evidências de sentença
    pub evidence: Vec<StrategyEvidence>,
    /// Pares para o estágio Micro
    pub micro_pairs: Vec<SentencePair>,
}

/// Estágio Meso
#[derive(Debug, Clone, Copy, Default)]
pub struct MesoStage;

fn growth(source: &TextUnit, target: &TextUnit) -> f32 {
    let source_words = word_count(&source.text);
    if source_words == 0 {
        return 0.0;
    }
    word_count(&target.text) as f32 / source_words as f32 - 1.0
}

impl MesoStage {
    fn fragmentation(
        &self,
        ctx: &CascadeContext<'_>,
        group: &AlignmentGroup,
        source: &TextUnit,
        targets: &[&TextUnit],
    ) -> Option<StrategyEvidence> {
        let texts: Vec<&str> = targets.iter().map(|t| t.text.as_str()).collect();
        let coverage = content_coverage(&source.text, &texts);
        if coverage < ctx.thresholds.fragmentation_coverage {
            log::debug!(
                "[cascade:meso] Split of {} rejected (coverage {:.2})",
                source.id,
                coverage
            );
            return None;
        }

        let mut evidence = StrategyEvidence::new(StrategyCode::Fragmentation, UnitLevel::Sentence)
            .with_signals(EvidenceSignals::new(
                group.score,
                coverage,
                1.0,
                ctx.salience.sentence_weight(source),
            ))
            .with_feature("target_sentences", targets.len() as f32)
            .with_feature("content_coverage", coverage)
            .with_feature("combined_similarity", group.score)
            .with_contributor(format!("sentence split into {}", targets.len()))
            .with_source_span(EvidenceSpan::whole(source));

        for target in targets {
            evidence = evidence.with_target_span(EvidenceSpan::whole(target));
        }
        Some(evidence)
    }

    fn one_to_one(
        &self,
        ctx: &CascadeContext<'_>,
        score: f32,
        source: &TextUnit,
        target: &TextUnit,
    ) -> Vec<StrategyEvidence> {
        let mut evidence = Vec::new();
        let salience = ctx.salience.sentence_weight(source);
        let overlap = jaccard(&content_set(&source.text), &content_set(&target.text));
        let size_change = growth(source, target);

        let drift = ctx.thresholds.drift;
        if score < drift && drift > 0.0 {
            evidence.push(
                StrategyEvidence::new(StrategyCode::MeaningDrift, UnitLevel::Sentence)
                    .with_signals(EvidenceSignals::new(
                        (drift - score) / drift,
                        1.0 - overlap,
                        size_change.abs(),
                        salience,
                    ))
                    .with_feature("similarity", score)
                    .with_feature("content_overlap", overlap)
                    .with_contributor(format!("similarity {:.2} below {:.2}", score, drift))
                    .with_source_span(EvidenceSpan::whole(source))
                    .with_target_span(EvidenceSpan::whole(target)),
            );
        }

        if size_change >= ctx.thresholds.explicitation_growth {
            let novelty = content_novelty(&source.text, &target.text);
            if novelty >= ctx.thresholds.explicitation_novelty {
                evidence.push(
                    StrategyEvidence::new(StrategyCode::Explicitation, UnitLevel::Sentence)
                        .with_signals(EvidenceSignals::new(score, novelty, size_change.min(1.0), salience))
                        .with_feature("growth", size_change)
                        .with_feature("novelty", novelty)
                        .with_contributor(format!("target {:.0}% longer", size_change * 100.0))
                        .with_source_span(EvidenceSpan::whole(source))
                        .with_target_span(EvidenceSpan::whole(target)),
                );
            }
        }

        evidence
    }

    fn evaluate_group(
        &self,
        ctx: &CascadeContext<'_>,
        sentences: &SentenceAlignment,
        output: &mut MesoOutput,
        report: &mut StageReport,
    ) {
        for (g, group) in sentences.result.groups.iter().enumerate() {
            report.evaluated_units += 1;

            let source = group.source_indices.iter().map(|&i| sentences.source_units.get(i));
            let target = group.target_indices.iter().map(|&j| sentences.target_units.get(j));
            let Some(sources) = source.collect::<Option<Vec<&TextUnit>>>() else {
                report.warn(format!("sentence group {} of paragraph group {} out of range", g, sentences.paragraph_group));
                continue;
            };
            let Some(targets) = target.collect::<Option<Vec<&TextUnit>>>() else {
                report.warn(format!("sentence group {} of paragraph group {} out of range", g, sentences.paragraph_group));
                continue;
            };

            match group.status {
                AlignmentStatus::Split => {
                    if let Some(&source) = sources.first() {
                        output.evidence.extend(self.fragmentation(ctx, group, source, &targets));
                    }
                }
                AlignmentStatus::Aligned => {
                    let (Some(&source), Some(&target)) = (sources.first(), targets.first()) else {
                        continue;
                    };
                    output.evidence.extend(self.one_to_one(ctx, group.score, source, target));
                    if source.text != target.text {
                        output.micro_pairs.push(SentencePair {
                            paragraph_group: sentences.paragraph_group,
                            source: source.clone(),
                            target: target.clone(),
                            score: group.score,
                        });
                    }
                }
                // Fusão de sentenças não tem estratégia própria
                AlignmentStatus::Merged | AlignmentStatus::Unaligned => {}
            }
        }
    }
}

impl StageEvaluator for MesoStage {
    type Input = Vec<usize>;
    type Output = MesoOutput;

    fn stage(&self) -> Stage {
        Stage::Meso
    }

    fn evaluate(&self, ctx: &CascadeContext<'_>, eligible: Vec<usize>, report: &mut StageReport) -> MesoOutput {
        let mut output = MesoOutput::default();

        for group_index in eligible {
            if report.check_deadline(&ctx.deadline) {
                break;
            }
            let Some(sentences) = ctx.alignment.sentences_for_group(group_index) else {
                report.warn(format!("paragraph group {} has no sentence alignment", group_index));
                continue;
            };
            self.evaluate_group(ctx, sentences, &mut output, report);
        }

        report.emitted = output.evidence.len();
        output
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Fixture;
    use super::*;
    use crate::strategies::EmissionPolicy;

    fn run(fixture: &Fixture) -> (MesoOutput, StageReport) {
        let ctx = fixture.context(EmissionPolicy::default());
        let eligible = (0..fixture.alignment.paragraphs.groups.len()).collect();
        let mut report = StageReport::new(Stage::Meso);
        let output = MesoStage.evaluate(&ctx, eligible, &mut report);
        (output, report)
    }

    #[test]
    fn test_fragmentation() {
        let fixture = Fixture::new(
            "O prefeito inaugurou a escola nova, que atende crianças carentes do bairro.",
            "O prefeito inaugurou a escola nova. A escola atende crianças carentes do bairro.",
        );
        let (output, _) = run(&fixture);

        let split = output
            .evidence
            .iter()
            .find(|e| e.strategy_code == StrategyCode::Fragmentation)
            .expect("fragmentation");
        assert_eq!(split.source_spans.len(), 1);
        assert_eq!(split.target_spans.len(), 2);
        assert!(split.features["content_coverage"] >= 0.5);
        assert!(output.micro_pairs.is_empty());
    }

    #[test]
    fn test_similar_pair_goes_to_micro() {
        let fixture = Fixture::new(
            "O especialista examinou o paciente cuidadosamente durante a consulta.",
            "O médico examinou o paciente cuidadosamente durante a consulta.",
        );
        let (output, report) = run(&fixture);
        assert!(output.evidence.is_empty());
        assert_eq!(output.micro_pairs.len(), 1);
        assert_eq!(report.evaluated_units, 1);
    }

    #[test]
    fn test_meaning_drift() {
        let mut thresholds = crate::config::Thresholds::default();
        thresholds.sentence_alignment = 0.15;
        thresholds.paragraph_alignment = 0.15;
        let fixture = Fixture::with_thresholds(
            "O governo aprovou a lei das florestas ontem.",
            "O governo rejeitou totalmente a proposta ambiental.",
            thresholds,
        );
        let (output, _) = run(&fixture);
        let drift = output
            .evidence
            .iter()
            .find(|e| e.strategy_code == StrategyCode::MeaningDrift)
            .expect("meaning drift");
        assert!(drift.signals.semantic > 0.0);
    }

    #[test]
    fn test_explicitation() {
        let fixture = Fixture::new(
            "O INSS negou o benefício.",
            "O INSS, que é o instituto que paga aposentadorias, negou o benefício ao trabalhador.",
        );
        let (output, _) = run(&fixture);
        assert!(output
            .evidence
            .iter()
            .any(|e| e.strategy_code == StrategyCode::Explicitation));
    }

    #[test]
    fn test_missing_group_warns() {
        let fixture = Fixture::new("Uma frase.", "Uma frase.");
        let ctx = fixture.context(EmissionPolicy::default());
        let mut report = StageReport::new(Stage::Meso);
        let output = MesoStage.evaluate(&ctx, vec![42], &mut report);
        assert!(output.evidence.is_empty());
        assert_eq!(report.warnings.len(), 1);
    }
}
