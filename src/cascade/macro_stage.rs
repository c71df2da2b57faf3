// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ESTÁGIO MACRO (PARÁGRAFO)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// - OM+: parágrafo de origem sem par (somente com opt-in)
// - RF+: par 1:1 semelhante, mas bem mais curto
// - RD+: inversões entre a ordem da origem e a ordem do destino
// - Poda: par quase idêntico não desce para Meso/Micro
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::collections::BTreeSet;

use super::{CascadeContext, StageEvaluator, StageReport};
use crate::alignment::{lexical_similarity, AlignmentGroup};
use crate::strategies::{Stage, StrategyCode};
use crate::types::{AlignmentStatus, EvidenceSignals, EvidenceSpan, StrategyEvidence, TextUnit, UnitLevel};
use crate::utils::word_count;

/// Saída do estágio Macro
#[derive(Debug, Clone, Default)]
pub struct MacroOutput {
    /// Evidências de parágrafo
    pub evidence: Vec<StrategyEvidence>,
    /// Índices dos grupos de parágrafos podados
    pub pruned_groups: BTreeSet<usize>,
}

/// Estágio Macro
#[derive(Debug, Clone, Copy, Default)]
pub struct MacroStage;

/// Divergência de um par: maior entre variação de tamanho e perda lexical
fn divergence(source: &TextUnit, target: &TextUnit) -> f32 {
    let source_words = word_count(&source.text);
    let target_words = word_count(&target.text);
    let length_change = if source_words == 0 {
        if target_words == 0 {
            0.0
        } else {
            1.0
        }
    } else {
        (1.0 - target_words as f32 / source_words as f32).abs()
    };
    length_change.max(1.0 - lexical_similarity(source, target))
}

fn length_reduction(source: &TextUnit, target: &TextUnit) -> f32 {
    let source_words = word_count(&source.text);
    if source_words == 0 {
        return 0.0;
    }
    (1.0 - word_count(&target.text) as f32 / source_words as f32).max(0.0)
}

impl MacroStage {
    fn omissions(&self, ctx: &CascadeContext<'_>, report: &mut StageReport) -> Vec<StrategyEvidence> {
        let paragraphs = &ctx.alignment.paragraphs;
        let mut evidence = Vec::new();

        for &i in &paragraphs.unaligned_a {
            if report.check_deadline(&ctx.deadline) {
                break;
            }
            let Some(paragraph) = ctx.source.paragraphs.get(i) else {
                report.warn(format!("unaligned paragraph index {} out of range", i));
                continue;
            };
            if paragraph.is_empty() {
                continue;
            }
            report.evaluated_units += 1;

            let best = paragraphs.best_scores.get(i).copied().unwrap_or(0.0);
            let max_overlap = ctx
                .target
                .paragraphs
                .iter()
                .map(|t| lexical_similarity(paragraph, t))
                .fold(0.0f32, f32::max);

            evidence.push(
                StrategyEvidence::new(StrategyCode::Omission, UnitLevel::Paragraph)
                    .with_signals(EvidenceSignals::new(
                        1.0 - best,
                        1.0 - max_overlap,
                        1.0,
                        ctx.salience.paragraph_weight(&paragraph.id),
                    ))
                    .with_feature("best_similarity", best)
                    .with_feature("max_lexical_overlap", max_overlap)
                    .with_contributor(format!("no target paragraph above {:.2}", ctx.thresholds.paragraph_alignment))
                    .with_source_span(EvidenceSpan::whole(paragraph)),
            );
        }

        evidence
    }

    fn rewrite(
        &self,
        ctx: &CascadeContext<'_>,
        group: &AlignmentGroup,
        source: &TextUnit,
        target: &TextUnit,
    ) -> Option<StrategyEvidence> {
        let similarity = group.score;
        let reduction = length_reduction(source, target);
        if similarity < ctx.thresholds.rewrite_similarity || reduction < ctx.thresholds.rewrite_length_reduction {
            return None;
        }

        let overlap = lexical_similarity(source, target);
        Some(
            StrategyEvidence::new(StrategyCode::BroadRewrite, UnitLevel::Paragraph)
                .with_signals(EvidenceSignals::new(
                    similarity,
                    1.0 - overlap,
                    reduction,
                    ctx.salience.paragraph_weight(&source.id),
                ))
                .with_feature("similarity", similarity)
                .with_feature("length_reduction", reduction)
                .with_feature("lexical_overlap", overlap)
                .with_contributor(format!("paragraph {:.0}% shorter", reduction * 100.0))
                .with_source_span(EvidenceSpan::whole(source))
                .with_target_span(EvidenceSpan::whole(target)),
        )
    }

    fn reordering(&self, ctx: &CascadeContext<'_>) -> Option<StrategyEvidence> {
        let groups = &ctx.alignment.paragraphs.groups;
        if groups.len() < 2 {
            return None;
        }

        // Grupos já vêm ordenados pela primeira origem
        let order: Vec<usize> = groups
            .iter()
            .map(|g| g.target_indices.first().copied().unwrap_or(0))
            .collect();

        let mut involved = BTreeSet::new();
        let mut inversions = 0usize;
        for a in 0..order.len() {
            for b in (a + 1)..order.len() {
                if order[a] > order[b] {
                    inversions += 1;
                    involved.insert(a);
                    involved.insert(b);
                }
            }
        }
        if inversions == 0 {
            return None;
        }

        let total_pairs = order.len() * (order.len() - 1) / 2;
        let ratio = inversions as f32 / total_pairs as f32;

        let mut evidence = StrategyEvidence::new(StrategyCode::DiscourseReordering, UnitLevel::Paragraph)
            .with_feature("inversions", inversions as f32)
            .with_feature("inversion_ratio", ratio)
            .with_contributor(format!("{} paragraph order inversions", inversions));

        let mut similarity_sum = 0.0;
        let mut overlap_sum = 0.0;
        let mut salience_max = 0.0f32;
        let mut counted = 0usize;

        for &g in &involved {
            let group = &groups[g];
            for &i in &group.source_indices {
                if let Some(source) = ctx.source.paragraphs.get(i) {
                    salience_max = salience_max.max(ctx.salience.paragraph_weight(&source.id));
                    evidence = evidence.with_source_span(EvidenceSpan::whole(source));
                }
            }
            for &j in &group.target_indices {
                if let Some(target) = ctx.target.paragraphs.get(j) {
                    evidence = evidence.with_target_span(EvidenceSpan::whole(target));
                }
            }
            if let (Some(&i), Some(&j)) = (group.source_indices.first(), group.target_indices.first()) {
                if let (Some(source), Some(target)) = (ctx.source.paragraphs.get(i), ctx.target.paragraphs.get(j)) {
                    overlap_sum += lexical_similarity(source, target);
                }
            }
            similarity_sum += group.score;
            counted += 1;
        }

        let counted = counted.max(1) as f32;
        Some(evidence.with_signals(EvidenceSignals::new(
            similarity_sum / counted,
            overlap_sum / counted,
            (0.5 + ratio).min(1.0),
            salience_max,
        )))
    }
}

impl StageEvaluator for MacroStage {
    type Input = ();
    type Output = MacroOutput;

    fn stage(&self) -> Stage {
        Stage::Macro
    }

    fn evaluate(&self, ctx: &CascadeContext<'_>, _input: (), report: &mut StageReport) -> MacroOutput {
        let mut output = MacroOutput::default();
        if report.check_deadline(&ctx.deadline) {
            return output;
        }

        if ctx.policy.permits(StrategyCode::Omission) {
            output.evidence.extend(self.omissions(ctx, report));
        }

        for (g, group) in ctx.alignment.paragraphs.groups.iter().enumerate() {
            if report.check_deadline(&ctx.deadline) {
                break;
            }
            report.evaluated_units += 1;

            if group.status != AlignmentStatus::Aligned {
                continue;
            }
            let (Some(&i), Some(&j)) = (group.source_indices.first(), group.target_indices.first()) else {
                report.warn(format!("paragraph group {} without members", g));
                continue;
            };
            let (Some(source), Some(target)) = (ctx.source.paragraphs.get(i), ctx.target.paragraphs.get(j)) else {
                report.warn(format!("paragraph group {} references missing units", g));
                continue;
            };

            let div = divergence(source, target);
            if group.score > ctx.thresholds.prune_similarity && div < ctx.thresholds.prune_divergence {
                log::debug!("[cascade:macro] Pruned {} ↔ {} ({:.3}, div {:.3})", source.id, target.id, group.score, div);
                output.pruned_groups.insert(g);
                report.pruned += 1;
                continue;
            }

            if let Some(evidence) = self.rewrite(ctx, group, source, target) {
                output.evidence.push(evidence);
            }
        }

        if !report.timed_out {
            if let Some(evidence) = self.reordering(ctx) {
                output.evidence.push(evidence);
            }
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

    fn run(fixture: &Fixture, policy: EmissionPolicy) -> (MacroOutput, StageReport) {
        let ctx = fixture.context(policy);
        let mut report = StageReport::new(Stage::Macro);
        let output = MacroStage.evaluate(&ctx, (), &mut report);
        (output, report)
    }

    #[test]
    fn test_near_identical_pair_is_pruned() {
        let text = "Os rios da região transbordaram depois das chuvas fortes.";
        let fixture = Fixture::new(text, text);
        let (output, report) = run(&fixture, EmissionPolicy::default());
        assert!(output.pruned_groups.contains(&0));
        assert_eq!(report.pruned, 1);
        assert!(output.evidence.is_empty());
    }

    #[test]
    fn test_unaligned_paragraph_without_opt_in_emits_nothing() {
        let fixture = Fixture::new(
            "Os vulcões submarinos liberam magma incandescente nas profundezas oceânicas.",
            "Gatos gostam de dormir.",
        );
        let (output, _) = run(&fixture, EmissionPolicy::new(false));
        assert!(output.evidence.is_empty());
        assert_eq!(fixture.alignment.paragraphs.unaligned_a, vec![0]);
    }

    #[test]
    fn test_omission_with_opt_in() {
        let fixture = Fixture::new(
            "Os vulcões submarinos liberam magma incandescente nas profundezas oceânicas.",
            "Gatos gostam de dormir.",
        );
        let (output, report) = run(&fixture, EmissionPolicy::new(true));
        assert_eq!(output.evidence.len(), 1);
        let omission = &output.evidence[0];
        assert_eq!(omission.strategy_code, StrategyCode::Omission);
        assert_eq!(omission.signals.structural, 1.0);
        assert!(omission.signals.semantic > 0.9);
        assert_eq!(report.emitted, 1);
    }

    #[test]
    fn test_broad_rewrite() {
        let mut thresholds = crate::config::Thresholds::default();
        thresholds.rewrite_similarity = 0.6;
        let fixture = Fixture::with_thresholds(
            "A prefeitura anunciou ontem novas regras rígidas para coleta seletiva de lixo reciclável em todos os bairros centrais da cidade.",
            "A prefeitura anunciou regras para coleta seletiva de lixo reciclável.",
            thresholds,
        );
        let (output, _) = run(&fixture, EmissionPolicy::default());
        let rewrite = output
            .evidence
            .iter()
            .find(|e| e.strategy_code == StrategyCode::BroadRewrite)
            .expect("broad rewrite");
        assert!(rewrite.features["length_reduction"] >= 0.3);
    }

    #[test]
    fn test_paragraph_reordering() {
        let source = "Primeiro assunto fala sobre gatos domésticos.\n\nSegundo assunto fala sobre cavalos selvagens.";
        let target = "Segundo assunto fala sobre cavalos selvagens.\n\nPrimeiro assunto fala sobre gatos domésticos.";
        let fixture = Fixture::new(source, target);
        let (output, _) = run(&fixture, EmissionPolicy::default());

        let reorder = output
            .evidence
            .iter()
            .find(|e| e.strategy_code == StrategyCode::DiscourseReordering)
            .expect("reordering");
        assert_eq!(reorder.features["inversions"], 1.0);
        assert_eq!(reorder.source_spans.len(), 2);
    }
}
