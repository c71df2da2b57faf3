// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SEGMENT - Segmentação em Unidades de Texto
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Divide um documento em parágrafos, parágrafos em sentenças e sentenças em
// frases (tokens), preservando offsets no documento original.
//
// - Parágrafos: separados por linhas em branco; sem linhas em branco,
//   cada linha é um parágrafo
// - Sentenças: pontuação (. ! ? … 。 ！ ？) com proteção de abreviações
//   e números decimais
// - Frases: tokens de palavra
//
// Determinística e idempotente. Entrada vazia gera uma unidade cobrindo
// o intervalo inteiro em vez de falhar.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::text::tokenize;
use crate::types::{Side, TextUnit, UnitLevel};

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r?\n[ \t]*\r?\n\s*").expect("Valid paragraph break regex"));

/// Abreviações que nunca terminam uma sentença
pub const DEFAULT_ABBREVIATIONS: &[&str] = &[
    "sr.", "sra.", "srs.", "dr.", "dra.", "drs.", "prof.", "profa.", "etc.", "p.ex.", "ex.",
    "av.", "art.", "cap.", "fig.", "pág.", "págs.", "vol.", "ed.", "nº.", "obs.", "mr.", "mrs.",
    "ms.", "e.g.", "i.e.", "vs.", "approx.", "no.",
];

const TERMINATORS: [char; 7] = ['.', '!', '?', '…', '。', '！', '？'];
const CJK_TERMINATORS: [char; 3] = ['。', '！', '？'];
const CLOSERS: [char; 8] = ['"', '\'', '”', '’', ')', ']', '»', '}'];

/// Documento segmentado: parágrafos e sentenças por parágrafo
#[derive(Debug, Clone)]
pub struct SegmentedDocument {
    /// Lado
    pub side: Side,
    /// Texto original completo
    pub text: String,
    /// Parágrafos em ordem
    pub paragraphs: Vec<TextUnit>,
    /// Sentenças de cada parágrafo (mesmo índice de `paragraphs`)
    pub sentences: Vec<Vec<TextUnit>>,
}

impl SegmentedDocument {
    /// Sentenças de um parágrafo
    pub fn sentences_of(&self, paragraph_index: usize) -> &[TextUnit] {
        self.sentences
            .get(paragraph_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Todas as sentenças, em ordem de documento
    pub fn all_sentences(&self) -> impl Iterator<Item = &TextUnit> {
        self.sentences.iter().flatten()
    }

    /// Parágrafos seguidos de sentenças
    pub fn units(&self) -> impl Iterator<Item = &TextUnit> {
        self.paragraphs.iter().chain(self.all_sentences())
    }

    /// Número total de sentenças
    pub fn sentence_count(&self) -> usize {
        self.sentences.iter().map(Vec::len).sum()
    }

    /// Documento sem conteúdo
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Segmentador heurístico
#[derive(Debug, Clone)]
pub struct Segmenter {
    abbreviations: HashSet<String>,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self {
            abbreviations: DEFAULT_ABBREVIATIONS.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl Segmenter {
    /// Cria segmentador com abreviações padrão
    pub fn new() -> Self {
        Self::default()
    }

    /// Adiciona abreviações (com ponto final, ex: "Eng.")
    pub fn with_abbreviations<I, S>(mut self, abbreviations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for abbreviation in abbreviations {
            let mut normalized = abbreviation.as_ref().trim().to_lowercase();
            if !normalized.ends_with('.') {
                normalized.push('.');
            }
            self.abbreviations.insert(normalized);
        }
        self
    }

    /// Segmenta documento completo (parágrafos + sentenças)
    pub fn segment(&self, side: Side, text: &str) -> SegmentedDocument {
        let paragraphs = self.segment_document(side, text);
        let sentences = paragraphs
            .iter()
            .map(|paragraph| self.segment_paragraph(paragraph))
            .collect();

        SegmentedDocument {
            side,
            text: text.to_string(),
            paragraphs,
            sentences,
        }
    }

    /// Divide documento em parágrafos
    pub fn segment_document(&self, side: Side, text: &str) -> Vec<TextUnit> {
        let ranges = paragraph_ranges(text);

        if ranges.is_empty() {
            return vec![make_unit(
                format!("{}:p0", side.prefix()),
                side,
                UnitLevel::Paragraph,
                text,
                0,
                text.len(),
                None,
                0,
            )];
        }

        ranges
            .into_iter()
            .enumerate()
            .map(|(index, (start, end))| {
                make_unit(
                    format!("{}:p{}", side.prefix(), index),
                    side,
                    UnitLevel::Paragraph,
                    &text[start..end],
                    start,
                    end,
                    None,
                    index,
                )
            })
            .collect()
    }

    /// Divide parágrafo em sentenças
    pub fn segment_paragraph(&self, paragraph: &TextUnit) -> Vec<TextUnit> {
        let text = paragraph.text.as_str();
        let ranges = self.sentence_ranges(text);

        if ranges.is_empty() {
            return vec![make_unit(
                format!("{}:s0", paragraph.id),
                paragraph.side,
                UnitLevel::Sentence,
                text,
                paragraph.start_offset,
                paragraph.end_offset,
                Some(paragraph.id.clone()),
                0,
            )];
        }

        ranges
            .into_iter()
            .enumerate()
            .map(|(index, (start, end))| {
                make_unit(
                    format!("{}:s{}", paragraph.id, index),
                    paragraph.side,
                    UnitLevel::Sentence,
                    &text[start..end],
                    paragraph.start_offset + start,
                    paragraph.start_offset + end,
                    Some(paragraph.id.clone()),
                    index,
                )
            })
            .collect()
    }

    /// Divide sentença em frases (tokens de palavra)
    pub fn segment_phrases(&self, sentence: &TextUnit) -> Vec<TextUnit> {
        let tokens = tokenize(&sentence.text);

        if tokens.is_empty() {
            return vec![make_unit(
                format!("{}:t0", sentence.id),
                sentence.side,
                UnitLevel::Phrase,
                &sentence.text,
                sentence.start_offset,
                sentence.end_offset,
                Some(sentence.id.clone()),
                0,
            )];
        }

        tokens
            .iter()
            .enumerate()
            .map(|(index, token)| {
                make_unit(
                    format!("{}:t{}", sentence.id, index),
                    sentence.side,
                    UnitLevel::Phrase,
                    token.text,
                    sentence.start_offset + token.start,
                    sentence.start_offset + token.end,
                    Some(sentence.id.clone()),
                    index,
                )
            })
            .collect()
    }

    /// Intervalos (relativos, já aparados) das sentenças de um texto
    fn sentence_ranges(&self, text: &str) -> Vec<(usize, usize)> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut raw = Vec::new();
        let mut start = 0;
        let mut i = 0;

        while i < chars.len() {
            let ch = chars[i].1;
            if !TERMINATORS.contains(&ch) {
                i += 1;
                continue;
            }

            // Consome a sequência de terminadores e fechamentos ("?!", ".»")
            let mut j = i + 1;
            while j < chars.len() && (TERMINATORS.contains(&chars[j].1) || CLOSERS.contains(&chars[j].1)) {
                j += 1;
            }
            let end = chars.get(j).map(|(pos, _)| *pos).unwrap_or(text.len());

            if self.is_boundary(text, &chars, start, i, j) {
                raw.push((start, end));
                start = end;
            }
            i = j;
        }

        if start < text.len() {
            raw.push((start, text.len()));
        }

        raw.into_iter()
            .filter_map(|(s, e)| trim_range(text, s, e))
            .collect()
    }

    /// Decide se o terminador em `chars[term]` fecha uma sentença
    fn is_boundary(&self, text: &str, chars: &[(usize, char)], start: usize, term: usize, next: usize) -> bool {
        let (term_pos, term_char) = chars[term];

        if CJK_TERMINATORS.contains(&term_char) {
            return true;
        }

        // Fim do texto
        let Some(&(_, following)) = chars.get(next) else {
            return true;
        };

        // "3.5", "www.exemplo.com", "e.g" sem espaço
        if !following.is_whitespace() {
            return false;
        }

        // Continuação em minúscula: "etc. e mais"
        let next_visible = chars[next..].iter().map(|(_, c)| *c).find(|c| !c.is_whitespace());
        if matches!(next_visible, Some(c) if c.is_lowercase()) {
            return false;
        }

        if term_char == '.' && next == term + 1 {
            let before = &text[start..term_pos];
            // Espaços multibyte (NBSP, U+2009, U+3000)
            let word_start = before
                .char_indices()
                .rev()
                .find(|(_, c)| c.is_whitespace())
                .map(|(p, c)| p + c.len_utf8())
                .unwrap_or(0);
            let word = before[word_start..].trim_start_matches(|c: char| !c.is_alphanumeric());

            // Iniciais: "J. Silva"
            let mut word_chars = word.chars();
            if let (Some(first), None) = (word_chars.next(), word_chars.next()) {
                if first.is_uppercase() {
                    return false;
                }
            }

            let candidate = format!("{}.", word.to_lowercase());
            if self.abbreviations.contains(&candidate) {
                return false;
            }
        }

        true
    }
}

/// Intervalos (aparados) dos parágrafos de um documento
fn paragraph_ranges(text: &str) -> Vec<(usize, usize)> {
    let mut raw = Vec::new();

    if PARAGRAPH_BREAK.is_match(text) {
        let mut start = 0;
        for m in PARAGRAPH_BREAK.find_iter(text) {
            raw.push((start, m.start()));
            start = m.end();
        }
        raw.push((start, text.len()));
    } else if text.contains('\n') {
        let mut start = 0;
        for (pos, _) in text.match_indices('\n') {
            raw.push((start, pos));
            start = pos + 1;
        }
        raw.push((start, text.len()));
    } else {
        raw.push((0, text.len()));
    }

    raw.into_iter()
        .filter_map(|(s, e)| trim_range(text, s, e))
        .collect()
}

/// Remove espaços das bordas; None quando o intervalo fica vazio
fn trim_range(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let slice = text.get(start..end)?;
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return None;
    }
    let leading = slice.len() - slice.trim_start().len();
    Some((start + leading, start + leading + trimmed.len()))
}

#[allow(clippy::too_many_arguments)]
fn make_unit(
    id: String,
    side: Side,
    level: UnitLevel,
    text: &str,
    start_offset: usize,
    end_offset: usize,
    parent_id: Option<String>,
    index: usize,
) -> TextUnit {
    TextUnit {
        id,
        side,
        level,
        text: text.to_string(),
        start_offset,
        end_offset,
        parent_id,
        index,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TESTES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
