// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ESTÁGIO MICRO (FRASE / TOKEN)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Recebe os pares 1:1 de sentenças e compara os tokens:
// - SL+: palavra trocada por outra mais curta/comum
// - TA+: pronome trocado pelo referente
// - DL+: palavra de conteúdo removida num ponto e inserida em outro
// - MV+: voz passiva ↔ ativa
// - MOD+: negação ou modalidade alteradas
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use super::diff::{diff_tokens, DiffOp};
use super::meso_stage::SentencePair;
use super::{CascadeContext, StageEvaluator, StageReport};
use crate::strategies::{Stage, StrategyCode};
use crate::types::{EvidenceSignals, EvidenceSpan, StrategyEvidence, TextUnit, UnitLevel};
use crate::utils::{content_set, is_stopword, jaccard, normalized_words};

/// Maior trecho (em tokens) tratado como troca de palavra
const MAX_REPLACEMENT_TOKENS: usize = 3;

/// Ganho mínimo de tamanho médio para considerar a troca uma simplificação
const MIN_LEXICAL_GAIN: f32 = 0.1;

const PRONOUNS: &[&str] = &[
    "ele", "ela", "eles", "elas", "lhe", "lhes", "isso", "isto", "aquilo", "it", "they", "he", "she", "them",
    "him",
];

const NEGATIONS: &[&str] = &[
    "não", "nunca", "jamais", "nem", "nenhum", "nenhuma", "ninguém", "nada", "not", "never", "no", "nobody",
    "nothing", "none",
];

const POSSIBILITY: &[&str] = &[
    "pode", "podem", "poderia", "poderiam", "possível", "talvez", "possivelmente", "provavelmente", "can",
    "could", "may", "might", "maybe", "perhaps",
];

const OBLIGATION: &[&str] = &[
    "deve", "devem", "deveria", "deveriam", "precisa", "precisam", "obrigatório", "must", "should", "shall",
];

static PASSIVE_PT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:foi|foram|é|são|era|eram|será|serão|sendo|sido|está|estão|estava|estavam)\s+\w+(?:ado|ada|ados|adas|ido|ida|idos|idas)\b",
    )
    .expect("Valid passive regex")
});

static PASSIVE_EN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:is|are|was|were|been|being|be)\s+\w+(?:ed|en)\b").expect("Valid passive regex"));

/// Estágio Micro
#[derive(Debug, Clone, Copy, Default)]
pub struct MicroStage;

fn is_pronoun(word: &str) -> bool {
    PRONOUNS.contains(&word)
}

fn is_content(word: &str) -> bool {
    !is_stopword(word) && !is_pronoun(word)
}

fn is_passive(text: &str) -> bool {
    let lower = text.to_lowercase();
    PASSIVE_PT.is_match(&lower) || PASSIVE_EN.is_match(&lower)
}

fn negation_count(words: &[String]) -> usize {
    words.iter().filter(|w| NEGATIONS.contains(&w.as_str()) || w.ends_with("n't")).count()
}

fn modality(words: &[String]) -> BTreeSet<&'static str> {
    let mut kinds = BTreeSet::new();
    for word in words {
        if POSSIBILITY.contains(&word.as_str()) {
            kinds.insert("possibility");
        }
        if OBLIGATION.contains(&word.as_str()) {
            kinds.insert("obligation");
        }
    }
    kinds
}

fn average_length(words: &[String]) -> f32 {
    if words.is_empty() {
        return 0.0;
    }
    words.iter().map(|w| w.chars().count()).sum::<usize>() as f32 / words.len() as f32
}

/// Lado de um par já tokenizado
struct TokenizedSide<'a> {
    sentence: &'a TextUnit,
    phrases: Vec<TextUnit>,
    words: Vec<String>,
}

impl<'a> TokenizedSide<'a> {
    fn new(ctx: &CascadeContext<'_>, sentence: &'a TextUnit) -> Option<Self> {
        if normalized_words(&sentence.text).is_empty() {
            return None;
        }
        let phrases = ctx.segmenter.segment_phrases(sentence);
        let words = phrases.iter().map(|p| p.text.to_lowercase()).collect();
        Some(Self {
            sentence,
            phrases,
            words,
        })
    }

    /// Trecho relativo à sentença cobrindo os tokens `range`
    fn span(&self, range: &Range<usize>) -> Option<EvidenceSpan> {
        let first = self.phrases.get(range.start)?;
        let last = self.phrases.get(range.end.checked_sub(1)?)?;
        let base = self.sentence.start_offset;
        Some(EvidenceSpan::within(
            self.sentence,
            first.start_offset.checked_sub(base)?,
            last.end_offset.checked_sub(base)?,
        ))
    }

    fn phrase_ids(&self, range: &Range<usize>) -> impl Iterator<Item = &str> {
        self.phrases[range.clone()].iter().map(|p| p.id.as_str())
    }

    fn words(&self, range: &Range<usize>) -> &[String] {
        &self.words[range.clone()]
    }
}

impl MicroStage {
    fn token_evidence(
        &self,
        code: StrategyCode,
        source: &TokenizedSide<'_>,
        source_range: &Range<usize>,
        target: &TokenizedSide<'_>,
        target_range: &Range<usize>,
    ) -> StrategyEvidence {
        let mut evidence = StrategyEvidence::new(code, UnitLevel::Phrase);
        if let Some(span) = source.span(source_range) {
            evidence = evidence.with_source_excerpt(span);
        }
        if let Some(span) = target.span(target_range) {
            evidence = evidence.with_target_excerpt(span);
        }
        for id in source.phrase_ids(source_range).chain(target.phrase_ids(target_range)) {
            evidence = evidence.with_scope(id);
        }
        evidence
    }

    fn replacement(
        &self,
        ctx: &CascadeContext<'_>,
        pair: &SentencePair,
        source: &TokenizedSide<'_>,
        source_range: &Range<usize>,
        target: &TokenizedSide<'_>,
        target_range: &Range<usize>,
    ) -> Option<StrategyEvidence> {
        let source_words = source.words(source_range);
        let target_words = target.words(target_range);
        if source_words.len() > MAX_REPLACEMENT_TOKENS || target_words.len() > MAX_REPLACEMENT_TOKENS {
            return None;
        }

        let relative = source.span(source_range)?;
        let salience = ctx.salience.span_weight(&pair.source.id, relative.start, relative.end);

        let replaced_pronoun = source_words.iter().find(|w| is_pronoun(w));
        let referent = target_words.iter().find(|w| is_content(w));
        if let (Some(pronoun), Some(referent)) = (replaced_pronoun, referent) {
            let evidence = self
                .token_evidence(StrategyCode::ReferentialClarity, source, source_range, target, target_range)
                .with_signals(EvidenceSignals::new(pair.score, 1.0, 1.0, salience))
                .with_contributor(format!("'{}' → '{}'", pronoun, referent));
            return Some(evidence);
        }

        if !source_words.iter().all(|w| is_content(w)) || !target_words.iter().all(|w| is_content(w)) {
            return None;
        }
        let source_length = average_length(source_words);
        if source_length == 0.0 {
            return None;
        }
        let gain = (source_length - average_length(target_words)) / source_length;
        if gain <= MIN_LEXICAL_GAIN {
            return None;
        }

        let (ns, nt) = (source_words.len() as f32, target_words.len() as f32);
        Some(
            self.token_evidence(StrategyCode::VocabularySimplification, source, source_range, target, target_range)
                .with_signals(EvidenceSignals::new(
                    pair.score,
                    0.5 + 0.5 * (2.0 * gain).min(1.0),
                    1.0 - (ns - nt).abs() / ns.max(nt),
                    salience,
                ))
                .with_feature("length_gain", gain)
                .with_contributor(format!("'{}' → '{}'", source_words.join(" "), target_words.join(" "))),
        )
    }

    fn displacement(
        &self,
        ctx: &CascadeContext<'_>,
        pair: &SentencePair,
        ops: &[DiffOp],
        source: &TokenizedSide<'_>,
        target: &TokenizedSide<'_>,
    ) -> Option<StrategyEvidence> {
        let mut removed: BTreeMap<&str, usize> = BTreeMap::new();
        let mut inserted: BTreeMap<&str, usize> = BTreeMap::new();

        for op in ops {
            let (source_range, target_range) = match op {
                DiffOp::Delete { source } => (Some(source), None),
                DiffOp::Insert { target } => (None, Some(target)),
                DiffOp::Replace { source, target } => (Some(source), Some(target)),
                DiffOp::Equal { .. } => (None, None),
            };
            if let Some(range) = source_range {
                for i in range.clone() {
                    if is_content(&source.words[i]) {
                        removed.entry(source.words[i].as_str()).or_insert(i);
                    }
                }
            }
            if let Some(range) = target_range {
                for j in range.clone() {
                    if is_content(&target.words[j]) {
                        inserted.entry(target.words[j].as_str()).or_insert(j);
                    }
                }
            }
        }

        let moved: Vec<(&str, usize, usize)> = removed
            .iter()
            .filter_map(|(word, &i)| inserted.get(word).map(|&j| (*word, i, j)))
            .collect();
        if moved.is_empty() {
            return None;
        }

        let mut evidence = StrategyEvidence::new(StrategyCode::PositionalReorganization, UnitLevel::Phrase);
        let mut salience = 0.0f32;
        for &(word, i, j) in &moved {
            let source_range = i..i + 1;
            let target_range = j..j + 1;
            if let Some(span) = source.span(&source_range) {
                salience = salience.max(ctx.salience.span_weight(&pair.source.id, span.start, span.end));
                evidence = evidence.with_source_excerpt(span);
            }
            if let Some(span) = target.span(&target_range) {
                evidence = evidence.with_target_excerpt(span);
            }
            for id in source.phrase_ids(&source_range).chain(target.phrase_ids(&target_range)) {
                evidence = evidence.with_scope(id);
            }
            evidence = evidence.with_contributor(format!("'{}' moved", word));
        }

        let count = moved.len() as f32;
        Some(
            evidence
                .with_signals(EvidenceSignals::new(pair.score, 1.0, 0.5 + 0.5 * (count / 3.0).min(1.0), salience))
                .with_feature("moved_words", count),
        )
    }

    fn sentence_evidence(&self, code: StrategyCode, pair: &SentencePair) -> StrategyEvidence {
        StrategyEvidence::new(code, UnitLevel::Sentence)
            .with_source_span(EvidenceSpan::whole(&pair.source))
            .with_target_span(EvidenceSpan::whole(&pair.target))
    }

    fn evaluate_pair(
        &self,
        ctx: &CascadeContext<'_>,
        pair: &SentencePair,
        report: &mut StageReport,
    ) -> Vec<StrategyEvidence> {
        let mut evidence = Vec::new();
        let (Some(source), Some(target)) = (TokenizedSide::new(ctx, &pair.source), TokenizedSide::new(ctx, &pair.target))
        else {
            return evidence;
        };

        match diff_tokens(&source.words, &target.words) {
            Some(ops) => {
                for op in &ops {
                    if let DiffOp::Replace {
                        source: source_range,
                        target: target_range,
                    } = op
                    {
                        evidence.extend(self.replacement(ctx, pair, &source, source_range, &target, target_range));
                    }
                }
                evidence.extend(self.displacement(ctx, pair, &ops, &source, &target));
            }
            None => report.warn(format!(
                "{} ↔ {} too long for token diff ({} × {} tokens)",
                pair.source.id,
                pair.target.id,
                source.words.len(),
                target.words.len()
            )),
        }

        let overlap = jaccard(&content_set(&pair.source.text), &content_set(&pair.target.text));
        let salience = ctx.salience.sentence_weight(&pair.source);

        let source_passive = is_passive(&pair.source.text);
        if source_passive != is_passive(&pair.target.text) {
            evidence.push(
                self.sentence_evidence(StrategyCode::VoiceChange, pair)
                    .with_signals(EvidenceSignals::new(pair.score, overlap, 1.0, salience))
                    .with_feature("source_passive", if source_passive { 1.0 } else { 0.0 })
                    .with_contributor(if source_passive { "passive → active" } else { "active → passive" }),
            );
        }

        let negation_changed = negation_count(&source.words) % 2 != negation_count(&target.words) % 2;
        let modality_changed = modality(&source.words) != modality(&target.words);
        if negation_changed || modality_changed {
            let mut modulation = self
                .sentence_evidence(StrategyCode::PerspectiveReinterpretation, pair)
                .with_signals(EvidenceSignals::new(pair.score, overlap, 0.5, salience));
            if negation_changed {
                modulation = modulation.with_contributor("negation polarity changed");
            }
            if modality_changed {
                modulation = modulation.with_contributor("modality changed");
            }
            evidence.push(modulation);
        }

        evidence
    }
}

impl StageEvaluator for MicroStage {
    type Input = Vec<SentencePair>;
    type Output = Vec<StrategyEvidence>;

    fn stage(&self) -> Stage {
        Stage::Micro
    }

    fn evaluate(&self, ctx: &CascadeContext<'_>, pairs: Vec<SentencePair>, report: &mut StageReport) -> Vec<StrategyEvidence> {
        let mut evidence = Vec::new();
        for pair in &pairs {
            if report.check_deadline(&ctx.deadline) {
                break;
            }
            report.evaluated_units += 1;
            evidence.extend(self.evaluate_pair(ctx, pair, report));
        }
        report.emitted = evidence.len();
        evidence
    }
}
