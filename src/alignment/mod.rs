// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ALINHAMENTO
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Casa unidades de origem com unidades de destino a partir da matriz de
// similaridade.
//
// 1. Melhor destino por origem (empate → menor índice); aceito se ≥ threshold
// 2. Split: a origem reivindica destinos extras que a têm como melhor origem
//    e que nenhuma outra origem reivindicou; aceito se a similaridade contra
//    o grupo somado for ≥ threshold e não pior que o melhor par
// 3. Merged: várias origens aceitas com o mesmo destino principal
//
// Em cascata: parágrafos primeiro; para cada grupo aceito, as sentenças
// concatenadas do grupo (com janela quando o grupo é grande).
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

mod similarity;

pub use similarity::{lexical_similarity, LexicalSimilarity, SemanticSimilarity, UnitSimilarity};

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::Thresholds;
use crate::performance::SimilarityMatrix;
use crate::types::{AlignmentPair, AlignmentStatus, TextUnit};
use crate::utils::SegmentedDocument;

/// Grupo de alinhamento (índices nas listas alinhadas)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentGroup {
    /// Origens do grupo
    pub source_indices: Vec<usize>,
    /// Destinos do grupo
    pub target_indices: Vec<usize>,
    /// Aligned, Split ou Merged
    pub status: AlignmentStatus,
    /// Similaridade do grupo (par, combinada ou média)
    pub score: f32,
}

/// Resultado do resolvedor, só com índices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Grupos aceitos, ordenados pela primeira origem
    pub groups: Vec<AlignmentGroup>,
    /// Origens sem par
    pub unaligned_a: Vec<usize>,
    /// Destinos sem par
    pub unaligned_b: Vec<usize>,
    /// Melhor similaridade de cada origem (aceita ou não)
    pub best_scores: Vec<f32>,
}

/// Resultado de `align`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    /// Pares (inclui os não alinhados), ordenados por origem e destino
    pub pairs: Vec<AlignmentPair>,
    /// Origens sem par
    pub unaligned_a: Vec<usize>,
    /// Destinos sem par
    pub unaligned_b: Vec<usize>,
    /// Grupos aceitos
    pub groups: Vec<AlignmentGroup>,
    /// Melhor similaridade de cada origem
    pub best_scores: Vec<f32>,
}

fn argmax(values: impl Iterator<Item = f32>) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (index, value) in values.enumerate() {
        match best {
            // Estritamente maior: empate mantém o menor índice
            Some((_, current)) if value <= current => {}
            _ => best = Some((index, value)),
        }
    }
    best
}

/// Diferença máxima para dois scores contarem como empate
const TIE_EPSILON: f32 = 1e-6;

/// Unidades repetidas ("Sim. Sim.") empatam em vários destinos; cada origem,
/// em ordem, fica com o primeiro destino empatado ainda livre. Sem destino
/// livre no empate, mantém o argmax (fusão legítima).
fn assign_repeated_ties(matrix: &SimilarityMatrix, targets: usize, threshold: f32, best: &mut [(usize, f32)]) {
    let mut taken: HashSet<usize> = HashSet::new();

    for (i, entry) in best.iter_mut().enumerate() {
        let (j, score) = *entry;
        if score < threshold || score <= 0.0 {
            continue;
        }
        if taken.contains(&j) {
            let free = (0..targets).find(|&k| !taken.contains(&k) && score - matrix.get(i, k) <= TIE_EPSILON);
            if let Some(k) = free {
                *entry = (k, matrix.get(i, k));
            }
        }
        taken.insert(entry.0);
    }
}

/// Resolve a matriz em grupos de alinhamento.
///
/// `combined(i, targets)` deve devolver a similaridade da origem `i` contra
/// os destinos tratados como um único texto.
pub fn resolve<F>(
    matrix: &SimilarityMatrix,
    sources: usize,
    targets: usize,
    threshold: f32,
    split_candidate: f32,
    combined: F,
) -> Resolution
where
    F: Fn(usize, &[usize]) -> f32,
{
    if sources == 0 || targets == 0 {
        return Resolution {
            groups: Vec::new(),
            unaligned_a: (0..sources).collect(),
            unaligned_b: (0..targets).collect(),
            best_scores: vec![0.0; sources],
        };
    }

    let mut best: Vec<(usize, f32)> = (0..sources)
        .map(|i| argmax((0..targets).map(|j| matrix.get(i, j))).unwrap_or((0, 0.0)))
        .collect();
    assign_repeated_ties(matrix, targets, threshold, &mut best);
    let back: Vec<usize> = (0..targets)
        .map(|j| argmax((0..sources).map(|i| matrix.get(i, j))).map(|(i, _)| i).unwrap_or(0))
        .collect();

    let primary: Vec<Option<usize>> = best
        .iter()
        .map(|&(j, score)| (score >= threshold && score > 0.0).then_some(j))
        .collect();

    // destino → origens que o têm como principal
    let mut claimed: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, p) in primary.iter().enumerate() {
        if let Some(j) = p {
            claimed.entry(*j).or_default().push(i);
        }
    }

    let mut splits: BTreeMap<usize, (Vec<usize>, f32)> = BTreeMap::new();
    let mut used_extras: HashSet<usize> = HashSet::new();

    for i in 0..sources {
        let (best_j, best_score) = best[i];
        let extras: Vec<usize> = (0..targets)
            .filter(|&j| {
                j != best_j
                    && back[j] == i
                    && matrix.get(i, j) >= split_candidate
                    && matrix.get(i, j) > 0.0
                    && !claimed.contains_key(&j)
                    && !used_extras.contains(&j)
            })
            .collect();
        if extras.is_empty() {
            continue;
        }

        // O destino principal precisa ser exclusivo desta origem
        let anchor_free = claimed
            .get(&best_j)
            .map(|owners| owners.as_slice() == [i])
            .unwrap_or(true);
        if !anchor_free {
            continue;
        }

        let mut group = extras.clone();
        group.push(best_j);
        group.sort_unstable();

        let score = combined(i, &group).clamp(0.0, 1.0);
        let accepted = score >= threshold && (primary[i].is_none() || score >= best_score);
        if accepted {
            used_extras.extend(extras);
            splits.insert(i, (group, score));
        }
    }

    let mut groups = Vec::new();
    let mut covered_targets: HashSet<usize> = HashSet::new();
    let mut merged_done: HashSet<usize> = HashSet::new();
    let mut unaligned_a = Vec::new();

    for i in 0..sources {
        if let Some((group, score)) = splits.get(&i) {
            covered_targets.extend(group.iter().copied());
            groups.push(AlignmentGroup {
                source_indices: vec![i],
                target_indices: group.clone(),
                status: AlignmentStatus::Split,
                score: *score,
            });
            continue;
        }

        let Some(j) = primary[i] else {
            unaligned_a.push(i);
            continue;
        };

        let owners = claimed.get(&j).cloned().unwrap_or_default();
        if owners.len() > 1 {
            if merged_done.insert(j) {
                let mean = owners.iter().map(|&o| matrix.get(o, j)).sum::<f32>() / owners.len() as f32;
                covered_targets.insert(j);
                groups.push(AlignmentGroup {
                    source_indices: owners,
                    target_indices: vec![j],
                    status: AlignmentStatus::Merged,
                    score: mean.clamp(0.0, 1.0),
                });
            }
            continue;
        }

        covered_targets.insert(j);
        groups.push(AlignmentGroup {
            source_indices: vec![i],
            target_indices: vec![j],
            status: AlignmentStatus::Aligned,
            score: matrix.get(i, j),
        });
    }

    let unaligned_b = (0..targets).filter(|j| !covered_targets.contains(j)).collect();

    Resolution {
        groups,
        unaligned_a,
        unaligned_b,
        best_scores: best.iter().map(|&(_, s)| s).collect(),
    }
}

/// Alinhamento de sentenças dentro de um grupo de parágrafos
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceAlignment {
    /// Índice do grupo em `DocumentAlignment::paragraphs.groups`
    pub paragraph_group: usize,
    /// Sentenças de origem do grupo (em ordem)
    pub source_units: Vec<TextUnit>,
    /// Sentenças de destino do grupo (em ordem)
    pub target_units: Vec<TextUnit>,
    /// Resultado do alinhamento das sentenças
    pub result: AlignmentResult,
    /// Comparação por janela
    pub windowed: bool,
}

/// Alinhamento completo de um par de documentos
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentAlignment {
    /// Parágrafos
    pub paragraphs: AlignmentResult,
    /// Sentenças, um item por grupo de parágrafos aceito
    pub sentences: Vec<SentenceAlignment>,
}

impl DocumentAlignment {
    /// Alinhamento de sentenças de um grupo de parágrafos
    pub fn sentences_for_group(&self, group_index: usize) -> Option<&SentenceAlignment> {
        self.sentences.iter().find(|s| s.paragraph_group == group_index)
    }
}

/// Contagem de pares por situação
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Pares 1:1
    pub aligned: usize,
    /// Pares em grupos split
    pub split: usize,
    /// Pares em grupos merged
    pub merged: usize,
    /// Origens sem par
    pub unaligned: usize,
}

impl StatusCounts {
    /// Conta os pares
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = &'a AlignmentPair>) -> Self {
        let mut counts = Self::default();
        for pair in pairs {
            match pair.status {
                AlignmentStatus::Aligned => counts.aligned += 1,
                AlignmentStatus::Split => counts.split += 1,
                AlignmentStatus::Merged => counts.merged += 1,
                AlignmentStatus::Unaligned => counts.unaligned += 1,
            }
        }
        counts
    }
}

/// Resumo do alinhamento devolvido ao chamador
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignmentSummary {
    /// Método de similaridade
    pub method: String,
    /// Pares de parágrafos
    pub paragraph_pairs: Vec<AlignmentPair>,
    /// Pares de sentenças
    pub sentence_pairs: Vec<AlignmentPair>,
    /// Contagens de parágrafos
    pub paragraph_counts: StatusCounts,
    /// Contagens de sentenças
    pub sentence_counts: StatusCounts,
    /// Parágrafos de destino sem origem
    pub unaligned_target_paragraphs: Vec<String>,
    /// Sentenças de destino sem origem (dentro de grupos alinhados)
    pub unaligned_target_sentences: Vec<String>,
    /// Grupos comparados por janela
    pub windowed_groups: usize,
}

impl AlignmentSummary {
    /// Monta o resumo
    pub fn build(alignment: &DocumentAlignment, target: &SegmentedDocument, method: &str) -> Self {
        let sentence_pairs: Vec<AlignmentPair> = alignment
            .sentences
            .iter()
            .flat_map(|s| s.result.pairs.iter().cloned())
            .collect();

        let unaligned_target_sentences = alignment
            .sentences
            .iter()
            .flat_map(|s| {
                s.result
                    .unaligned_b
                    .iter()
                    .filter_map(|&j| s.target_units.get(j).map(|u| u.id.clone()))
            })
            .collect();

        Self {
            method: method.to_string(),
            paragraph_counts: StatusCounts::from_pairs(&alignment.paragraphs.pairs),
            sentence_counts: StatusCounts::from_pairs(&sentence_pairs),
            paragraph_pairs: alignment.paragraphs.pairs.clone(),
            sentence_pairs,
            unaligned_target_paragraphs: alignment
                .paragraphs
                .unaligned_b
                .iter()
                .filter_map(|&j| target.paragraphs.get(j).map(|u| u.id.clone()))
                .collect(),
            unaligned_target_sentences,
            windowed_groups: alignment.sentences.iter().filter(|s| s.windowed).count(),
        }
    }
}

/// Resolvedor de alinhamento sobre uma fonte de similaridade
pub struct AlignmentResolver<'a> {
    similarity: &'a dyn UnitSimilarity,
    thresholds: &'a Thresholds,
}

impl<'a> AlignmentResolver<'a> {
    /// Cria resolvedor
    pub fn new(similarity: &'a dyn UnitSimilarity, thresholds: &'a Thresholds) -> Self {
        Self {
            similarity,
            thresholds,
        }
    }

    /// Alinha duas listas de unidades.
    ///
    /// Listas vazias geram resultado totalmente não alinhado, nunca erro.
    pub fn align(
        &self,
        units_a: &[&TextUnit],
        units_b: &[&TextUnit],
        threshold: f32,
        window: Option<usize>,
    ) -> AlignmentResult {
        let matrix = self.similarity.matrix(units_a, units_b, window);
        let resolution = resolve(
            &matrix,
            units_a.len(),
            units_b.len(),
            threshold,
            self.thresholds.split_candidate,
            |i, group| {
                let members: Vec<&TextUnit> = group.iter().filter_map(|&j| units_b.get(j).copied()).collect();
                units_a
                    .get(i)
                    .map(|source| self.similarity.combined(source, &members))
                    .unwrap_or(0.0)
            },
        );

        let mut pairs = Vec::new();
        for group in &resolution.groups {
            for &i in &group.source_indices {
                for &j in &group.target_indices {
                    if let (Some(a), Some(b)) = (units_a.get(i), units_b.get(j)) {
                        let score = match group.status {
                            AlignmentStatus::Aligned => group.score,
                            _ => matrix.get(i, j),
                        };
                        pairs.push(AlignmentPair::matched(a, i, b, j, score, group.status));
                    }
                }
            }
        }
        for &i in &resolution.unaligned_a {
            if let Some(a) = units_a.get(i) {
                pairs.push(AlignmentPair::unaligned(a, i));
            }
        }
        pairs.sort_by_key(|p| (p.source_index, p.target_index));

        AlignmentResult {
            pairs,
            unaligned_a: resolution.unaligned_a,
            unaligned_b: resolution.unaligned_b,
            groups: resolution.groups,
            best_scores: resolution.best_scores,
        }
    }

    /// Alinhamento em cascata: parágrafos, depois sentenças por grupo
    pub fn align_documents(&self, source: &SegmentedDocument, target: &SegmentedDocument) -> DocumentAlignment {
        let source_paragraphs: Vec<&TextUnit> = source.paragraphs.iter().collect();
        let target_paragraphs: Vec<&TextUnit> = target.paragraphs.iter().collect();

        let paragraphs = self.align(
            &source_paragraphs,
            &target_paragraphs,
            self.thresholds.paragraph_alignment,
            None,
        );

        let sentences = paragraphs
            .groups
            .iter()
            .enumerate()
            .map(|(group_index, group)| {
                let source_units: Vec<TextUnit> = group
                    .source_indices
                    .iter()
                    .flat_map(|&i| source.sentences_of(i).iter().cloned())
                    .collect();
                let target_units: Vec<TextUnit> = group
                    .target_indices
                    .iter()
                    .flat_map(|&j| target.sentences_of(j).iter().cloned())
                    .collect();

                let cap = self.thresholds.max_paragraph_sentences;
                let windowed = source_units.len() > cap || target_units.len() > cap;
                let window = windowed.then_some(self.thresholds.sentence_window);
                if windowed {
                    log::debug!(
                        "[align] Group {} uses windowed comparison ({}×{} sentences)",
                        group_index,
                        source_units.len(),
                        target_units.len()
                    );
                }

                let refs_a: Vec<&TextUnit> = source_units.iter().collect();
                let refs_b: Vec<&TextUnit> = target_units.iter().collect();
                let result = self.align(&refs_a, &refs_b, self.thresholds.sentence_alignment, window);

                SentenceAlignment {
                    paragraph_group: group_index,
                    source_units,
                    target_units,
                    result,
                    windowed,
                }
            })
            .collect();

        DocumentAlignment { paragraphs, sentences }
    }
}
