// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SALIÊNCIA
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Pesos de importância para trechos do texto original.
//
// - Frequency (baseline, sempre disponível): tf·idf sobre as sentenças
// - Semantic: cosseno de cada token contra o vetor da unidade
//
// Duas normalizações independentes:
// - local: dentro da sentença (máximo = 1.0)
// - global: entre parágrafos do documento (máximo = 1.0)
//
// Método indisponível → substituição silenciosa pelo baseline, reportada.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::embeddings::LocalEncoder;
use crate::performance::cosine_similarity;
use crate::types::{SalienceWeight, TextUnit};
use crate::utils::{is_stopword, tokenize, SegmentedDocument};

/// Método de saliência
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalienceMethod {
    /// tf·idf (baseline)
    #[default]
    Frequency,
    /// Cosseno token × unidade
    Semantic,
}

impl SalienceMethod {
    /// Nome estável
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frequency => "frequency",
            Self::Semantic => "semantic",
        }
    }

    /// Converte nome (case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "frequency" | "tfidf" | "tf-idf" => Some(Self::Frequency),
            "semantic" => Some(Self::Semantic),
            _ => None,
        }
    }
}

impl fmt::Display for SalienceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Erros de saliência
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SalienceError {
    #[error("Salience method unavailable: {0}")]
    Unavailable(String),
}

/// Trecho com peso (offsets relativos à unidade)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalientSpan {
    /// Texto do trecho
    pub text: String,
    /// Offset inicial
    pub start: usize,
    /// Offset final
    pub end: usize,
    /// Peso (0.0 - 1.0 após `extract`)
    pub weight: f32,
}

/// Frequências de documento para o idf
#[derive(Debug, Clone, Default)]
pub struct SalienceContext {
    document_frequency: HashMap<String, usize>,
    units: usize,
}

impl SalienceContext {
    /// Contexto a partir de unidades (cada uma conta como um documento)
    pub fn from_units<'a>(units: impl IntoIterator<Item = &'a TextUnit>) -> Self {
        let mut document_frequency: HashMap<String, usize> = HashMap::new();
        let mut count = 0;
        for unit in units {
            count += 1;
            let unique: HashSet<String> = tokenize(&unit.text).iter().map(|t| t.normalized()).collect();
            for word in unique {
                *document_frequency.entry(word).or_insert(0) += 1;
            }
        }
        Self {
            document_frequency,
            units: count,
        }
    }

    /// Contexto sobre as sentenças de um documento
    pub fn from_document(document: &SegmentedDocument) -> Self {
        Self::from_units(document.all_sentences())
    }

    /// idf suavizado: ln((1 + N) / (1 + df)) + 1
    pub fn idf(&self, word: &str) -> f32 {
        let df = self.document_frequency.get(word).copied().unwrap_or(0);
        ((1.0 + self.units as f32) / (1.0 + df as f32)).ln() + 1.0
    }
}

/// Provider de saliência
pub trait SalienceProvider: Send + Sync {
    /// Método implementado
    fn method(&self) -> SalienceMethod;

    /// Pode ser usado nesta requisição
    fn is_available(&self) -> bool {
        true
    }

    /// Pesos brutos por token
    fn raw_scores(&self, unit: &TextUnit, context: &SalienceContext) -> Result<Vec<SalientSpan>, SalienceError>;

    /// Pesos normalizados localmente (máximo da unidade = 1.0)
    fn extract(&self, unit: &TextUnit, context: &SalienceContext) -> Result<Vec<SalientSpan>, SalienceError> {
        let mut spans = self.raw_scores(unit, context)?;
        normalize_local(&mut spans);
        Ok(spans)
    }
}

fn normalize_local(spans: &mut [SalientSpan]) {
    let max = spans
        .iter()
        .map(|s| s.weight)
        .filter(|w| w.is_finite())
        .fold(0.0f32, f32::max);
    for span in spans.iter_mut() {
        span.weight = if max > 0.0 && span.weight.is_finite() {
            (span.weight / max).clamp(0.0, 1.0)
        } else {
            0.0
        };
    }
}

/// Baseline tf·idf
#[derive(Debug, Clone, Copy, Default)]
pub struct FrequencySalience;

impl SalienceProvider for FrequencySalience {
    fn method(&self) -> SalienceMethod {
        SalienceMethod::Frequency
    }

    fn raw_scores(&self, unit: &TextUnit, context: &SalienceContext) -> Result<Vec<SalientSpan>, SalienceError> {
        let tokens = tokenize(&unit.text);
        let mut term_frequency: HashMap<String, usize> = HashMap::new();
        for token in &tokens {
            *term_frequency.entry(token.normalized()).or_insert(0) += 1;
        }

        Ok(tokens
            .iter()
            .map(|token| {
                let word = token.normalized();
                let weight = if is_stopword(&word) {
                    0.0
                } else {
                    term_frequency.get(&word).copied().unwrap_or(1) as f32 * context.idf(&word)
                };
                SalientSpan {
                    text: token.text.to_string(),
                    start: token.start,
                    end: token.end,
                    weight,
                }
            })
            .collect())
    }
}

/// Saliência semântica com o encoder local
#[derive(Clone, Default)]
pub struct SemanticSalience {
    encoder: Option<Arc<dyn LocalEncoder>>,
}

impl SemanticSalience {
    /// Cria provider; sem encoder fica indisponível
    pub fn new(encoder: Option<Arc<dyn LocalEncoder>>) -> Self {
        Self { encoder }
    }
}

impl SalienceProvider for SemanticSalience {
    fn method(&self) -> SalienceMethod {
        SalienceMethod::Semantic
    }

    fn is_available(&self) -> bool {
        self.encoder.is_some()
    }

    fn raw_scores(&self, unit: &TextUnit, _context: &SalienceContext) -> Result<Vec<SalientSpan>, SalienceError> {
        let encoder = self
            .encoder
            .as_ref()
            .ok_or_else(|| SalienceError::Unavailable("no local encoder".into()))?;

        let unit_vector = encoder.encode(&unit.text);
        Ok(tokenize(&unit.text)
            .iter()
            .map(|token| {
                let word = token.normalized();
                let weight = if is_stopword(&word) {
                    0.0
                } else {
                    cosine_similarity(&encoder.encode(&word), &unit_vector).max(0.0)
                };
                SalientSpan {
                    text: token.text.to_string(),
                    start: token.start,
                    end: token.end,
                    weight,
                }
            })
            .collect())
    }
}

/// Pesos globais: um por parágrafo, normalizados entre parágrafos.
///
/// O peso bruto de um parágrafo é a soma dos pesos brutos dos seus tokens.
pub fn global_weights(
    provider: &dyn SalienceProvider,
    paragraphs: &[TextUnit],
    context: &SalienceContext,
) -> Vec<SalienceWeight> {
    let raw: Vec<f32> = paragraphs
        .iter()
        .map(|p| {
            provider
                .raw_scores(p, context)
                .map(|spans| spans.iter().map(|s| s.weight).filter(|w| w.is_finite()).sum())
                .unwrap_or(0.0)
        })
        .collect();

    let max = raw.iter().copied().fold(0.0f32, f32::max);
    paragraphs
        .iter()
        .zip(raw)
        .map(|(p, value)| SalienceWeight {
            unit_id: p.id.clone(),
            weight: if max > 0.0 { (value / max).clamp(0.0, 1.0) } else { 0.0 },
            method: provider.method().as_str().to_string(),
        })
        .collect()
}

/// Provider escolhido para a requisição
pub struct ResolvedSalience {
    /// Provider efetivo
    pub provider: Box<dyn SalienceProvider>,
    /// Método pedido
    pub requested: SalienceMethod,
    /// Método efetivo
    pub effective: SalienceMethod,
    /// Houve substituição pelo baseline
    pub substituted: bool,
}

/// Escolhe o provider; indisponível → baseline
pub fn resolve_provider(requested: SalienceMethod, encoder: Option<Arc<dyn LocalEncoder>>) -> ResolvedSalience {
    let provider: Box<dyn SalienceProvider> = match requested {
        SalienceMethod::Frequency => Box::new(FrequencySalience),
        SalienceMethod::Semantic => Box::new(SemanticSalience::new(encoder)),
    };

    if provider.is_available() {
        return ResolvedSalience {
            provider,
            requested,
            effective: requested,
            substituted: false,
        };
    }

    log::warn!("[salience] Method {} unavailable, using frequency baseline", requested);
    ResolvedSalience {
        provider: Box::new(FrequencySalience),
        requested,
        effective: SalienceMethod::Frequency,
        substituted: true,
    }
}

/// Saliência calculada para o documento de origem
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalienceMap {
    /// Trechos por sentença (normalização local)
    pub local: BTreeMap<String, Vec<SalientSpan>>,
    /// Pesos por parágrafo (normalização global)
    pub global: Vec<SalienceWeight>,
    /// Método efetivo
    pub method: SalienceMethod,
}

impl SalienceMap {
    /// Maior peso local entre os tokens que tocam `[start, end)` da sentença
    pub fn span_weight(&self, sentence_id: &str, start: usize, end: usize) -> f32 {
        self.local
            .get(sentence_id)
            .map(|spans| {
                spans
                    .iter()
                    .filter(|s| s.start < end && start < s.end)
                    .map(|s| s.weight)
                    .fold(0.0f32, f32::max)
            })
            .unwrap_or(0.0)
    }

    /// Peso global de um parágrafo
    pub fn paragraph_weight(&self, paragraph_id: &str) -> f32 {
        self.global
            .iter()
            .find(|w| w.unit_id == paragraph_id)
            .map(|w| w.weight)
            .unwrap_or(0.0)
    }

    /// Peso da sentença: global do parágrafo pai
    pub fn sentence_weight(&self, sentence: &TextUnit) -> f32 {
        sentence
            .parent_id
            .as_deref()
            .map(|p| self.paragraph_weight(p))
            .unwrap_or(0.0)
    }
}

/// Calcula saliência local e global de um documento
pub fn compute_salience(resolved: &ResolvedSalience, document: &SegmentedDocument) -> SalienceMap {
    let context = SalienceContext::from_document(document);
    let provider = resolved.provider.as_ref();

    let mut local = BTreeMap::new();
    for sentence in document.all_sentences() {
        let spans = match provider.extract(sentence, &context) {
            Ok(spans) => spans,
            Err(e) => {
                log::warn!("[salience] {} on {}; using baseline", e, sentence.id);
                FrequencySalience.extract(sentence, &context).unwrap_or_default()
            }
        };
        local.insert(sentence.id.clone(), spans);
    }

    SalienceMap {
        local,
        global: global_weights(provider, &document.paragraphs, &context),
        method: resolved.effective,
    }
}
