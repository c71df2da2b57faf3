// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TIPOS COMPARTILHADOS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Unidades de texto, pares de alinhamento, pesos de saliência, evidências
// e anotações finais. Offsets são sempre em bytes UTF-8 no documento
// original e caem em fronteiras de `char`.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scoring::ScoreBreakdown;
use crate::strategies::StrategyCode;

/// Lado do par analisado
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Texto original
    Source,
    /// Texto simplificado
    Target,
}

impl Side {
    /// Prefixo usado nos ids das unidades
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Source => "src",
            Self::Target => "tgt",
        }
    }
}

/// Granularidade de uma unidade de texto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitLevel {
    /// Parágrafo
    Paragraph,
    /// Sentença
    Sentence,
    /// Frase / token
    Phrase,
}

/// Intervalo absoluto `[start, end)` no documento
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextSpan {
    /// Offset inicial (inclusivo)
    pub start: usize,
    /// Offset final (exclusivo)
    pub end: usize,
}

impl TextSpan {
    /// Cria um intervalo
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Tamanho em bytes
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Intervalo vazio
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unidade estrutural de texto (parágrafo, sentença ou frase).
///
/// Criada uma única vez na segmentação e imutável durante a requisição.
/// Toda unidade abaixo de parágrafo tem exatamente um pai.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextUnit {
    /// Id determinístico (`src:p0`, `src:p0:s1`, `tgt:p0:s1:t3`)
    pub id: String,
    /// Documento de origem
    pub side: Side,
    /// Granularidade
    pub level: UnitLevel,
    /// Texto da unidade (já aparado)
    pub text: String,
    /// Offset inicial no documento
    pub start_offset: usize,
    /// Offset final no documento
    pub end_offset: usize,
    /// Id da unidade pai no nível imediatamente mais grosso
    pub parent_id: Option<String>,
    /// Posição entre as irmãs
    pub index: usize,
}

impl TextUnit {
    /// Intervalo absoluto da unidade
    pub fn span(&self) -> TextSpan {
        TextSpan::new(self.start_offset, self.end_offset)
    }

    /// Tamanho em bytes
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Unidade sem texto
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Situação de um par de alinhamento
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentStatus {
    /// 1:1
    Aligned,
    /// Uma unidade de origem para várias de destino
    Split,
    /// Várias unidades de origem para uma de destino
    Merged,
    /// Sem correspondente acima do threshold
    Unaligned,
}

impl AlignmentStatus {
    /// Nome para logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aligned => "aligned",
            Self::Split => "split",
            Self::Merged => "merged",
            Self::Unaligned => "unaligned",
        }
    }
}

/// Par de alinhamento entre unidades de origem e destino.
///
/// Invariante: `score ∈ [0, 1]`; pares não alinhados têm
/// `target_unit_id = None` e `score = 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentPair {
    /// Unidade de origem
    pub source_unit_id: String,
    /// Unidade de destino (None quando não alinhada)
    pub target_unit_id: Option<String>,
    /// Índice da origem na lista alinhada
    pub source_index: usize,
    /// Índice do destino na lista alinhada
    pub target_index: Option<usize>,
    /// Similaridade (0.0 - 1.0)
    pub score: f32,
    /// Situação do par
    pub status: AlignmentStatus,
}

impl AlignmentPair {
    /// Cria par não alinhado
    pub fn unaligned(source: &TextUnit, source_index: usize) -> Self {
        Self {
            source_unit_id: source.id.clone(),
            target_unit_id: None,
            source_index,
            target_index: None,
            score: 0.0,
            status: AlignmentStatus::Unaligned,
        }
    }

    /// Cria par com destino
    pub fn matched(
        source: &TextUnit,
        source_index: usize,
        target: &TextUnit,
        target_index: usize,
        score: f32,
        status: AlignmentStatus,
    ) -> Self {
        Self {
            source_unit_id: source.id.clone(),
            target_unit_id: Some(target.id.clone()),
            source_index,
            target_index: Some(target_index),
            score: score.clamp(0.0, 1.0),
            status,
        }
    }

    /// Tem destino
    pub fn is_aligned(&self) -> bool {
        self.status != AlignmentStatus::Unaligned
    }
}

/// Peso de saliência normalizado de uma unidade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalienceWeight {
    /// Unidade
    pub unit_id: String,
    /// Peso (0.0 - 1.0)
    pub weight: f32,
    /// Método que produziu o peso
    pub method: String,
}

/// Sinais normalizados (0.0 - 1.0) que alimentam a fórmula de confiança
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSignals {
    /// Sinal semântico (similaridade de embeddings)
    pub semantic: f32,
    /// Sinal lexical (vocabulário)
    pub lexical: f32,
    /// Sinal estrutural (tamanho, ordem, número de unidades)
    pub structural: f32,
    /// Saliência do trecho afetado
    pub salience: f32,
}

impl EvidenceSignals {
    /// Cria sinais já limitados a [0, 1]
    pub fn new(semantic: f32, lexical: f32, structural: f32, salience: f32) -> Self {
        Self {
            semantic: clamp_signal(semantic),
            lexical: clamp_signal(lexical),
            structural: clamp_signal(structural),
            salience: clamp_signal(salience),
        }
    }
}

fn clamp_signal(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Penalidade subtraída da confiança
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Penalty {
    /// Motivo
    pub reason: String,
    /// Valor (0.0 - 1.0)
    pub value: f32,
}

impl Penalty {
    /// Cria penalidade
    pub fn new(reason: impl Into<String>, value: f32) -> Self {
        Self {
            reason: reason.into(),
            value: clamp_signal(value),
        }
    }
}

/// Trecho de evidência relativo a uma unidade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceSpan {
    /// Unidade à qual os offsets se referem
    pub unit_id: String,
    /// Offset inicial relativo ao texto da unidade
    pub start: usize,
    /// Offset final relativo ao texto da unidade
    pub end: usize,
    /// Texto original do trecho
    pub excerpt: String,
}

impl EvidenceSpan {
    /// Trecho cobrindo a unidade inteira
    pub fn whole(unit: &TextUnit) -> Self {
        Self {
            unit_id: unit.id.clone(),
            start: 0,
            end: unit.text.len(),
            excerpt: unit.text.clone(),
        }
    }

    /// Trecho interno à unidade.
    ///
    /// Intervalos inválidos ficam com excerpt vazio e são descartados
    /// pelo montador como inconsistência interna.
    pub fn within(unit: &TextUnit, start: usize, end: usize) -> Self {
        let excerpt = unit.text.get(start..end).unwrap_or_default().to_string();
        Self {
            unit_id: unit.id.clone(),
            start,
            end,
            excerpt,
        }
    }
}

/// Evidência candidata produzida por um estágio da cascata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyEvidence {
    /// Granularidade onde foi detectada
    pub level: UnitLevel,
    /// Estratégia candidata
    pub strategy_code: StrategyCode,
    /// Confiança bruta (antes do peso da estratégia)
    pub base_confidence: f32,
    /// Sinais normalizados
    pub signals: EvidenceSignals,
    /// Penalidades
    pub penalties: Vec<Penalty>,
    /// Medidas brutas que justificam a detecção
    pub features: BTreeMap<String, f32>,
    /// Observações que contribuíram para a detecção
    pub contributors: Vec<String>,
    /// Ids das unidades afetadas
    pub scope: Vec<String>,
    /// Trechos no texto original
    pub source_spans: Vec<EvidenceSpan>,
    /// Trechos no texto simplificado
    pub target_spans: Vec<EvidenceSpan>,
}

impl StrategyEvidence {
    /// Cria evidência vazia para uma estratégia
    pub fn new(strategy_code: StrategyCode, level: UnitLevel) -> Self {
        Self {
            level,
            strategy_code,
            base_confidence: 0.0,
            signals: EvidenceSignals::default(),
            penalties: Vec::new(),
            features: BTreeMap::new(),
            contributors: Vec::new(),
            scope: Vec::new(),
            source_spans: Vec::new(),
            target_spans: Vec::new(),
        }
    }

    /// Define os sinais
    pub fn with_signals(mut self, signals: EvidenceSignals) -> Self {
        self.signals = signals;
        self
    }

    /// Adiciona uma medida
    pub fn with_feature(mut self, name: &str, value: f32) -> Self {
        self.features.insert(name.to_string(), value);
        self
    }

    /// Adiciona um contribuinte
    pub fn with_contributor(mut self, contributor: impl Into<String>) -> Self {
        self.contributors.push(contributor.into());
        self
    }

    /// Adiciona trecho de origem (e o id ao escopo)
    pub fn with_source_span(mut self, span: EvidenceSpan) -> Self {
        self.push_scope(&span.unit_id);
        self.source_spans.push(span);
        self
    }

    /// Adiciona trecho de destino (e o id ao escopo)
    pub fn with_target_span(mut self, span: EvidenceSpan) -> Self {
        self.push_scope(&span.unit_id);
        self.target_spans.push(span);
        self
    }

    /// Adiciona trecho de origem sem alterar o escopo.
    ///
    /// Usado no estágio Micro, onde o escopo são as frases e o trecho é
    /// relativo à sentença.
    pub fn with_source_excerpt(mut self, span: EvidenceSpan) -> Self {
        self.source_spans.push(span);
        self
    }

    /// Adiciona trecho de destino sem alterar o escopo
    pub fn with_target_excerpt(mut self, span: EvidenceSpan) -> Self {
        self.target_spans.push(span);
        self
    }

    /// Adiciona id ao escopo sem trecho associado
    pub fn with_scope(mut self, unit_id: &str) -> Self {
        self.push_scope(unit_id);
        self
    }

    fn push_scope(&mut self, unit_id: &str) {
        if !self.scope.iter().any(|id| id == unit_id) {
            self.scope.push(unit_id.to_string());
        }
    }

    /// Verifica sobreposição de escopo com outra evidência
    pub fn overlaps(&self, other: &StrategyEvidence) -> bool {
        self.scope.iter().any(|id| other.scope.contains(id))
    }

    /// Soma das penalidades
    pub fn total_penalty(&self) -> f32 {
        self.penalties.iter().map(|p| p.value).sum()
    }
}

/// Nível de impacto de uma anotação
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    /// Impacto baixo
    Low,
    /// Impacto médio
    Medium,
    /// Impacto alto
    High,
}

impl ImpactLevel {
    /// Classifica pelo nível da evidência e pela confiança
    pub fn classify(confidence: f32, level: UnitLevel) -> Self {
        if confidence >= 0.8 || (level == UnitLevel::Paragraph && confidence >= 0.6) {
            Self::High
        } else if confidence >= 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Evidência resolvida anexada a uma anotação final
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationEvidence {
    /// Granularidade
    pub level: UnitLevel,
    /// Unidades afetadas
    pub scope: Vec<String>,
    /// Sinais normalizados
    pub signals: EvidenceSignals,
    /// Medidas brutas
    pub features: BTreeMap<String, f32>,
    /// Contribuintes
    pub contributors: Vec<String>,
    /// Decomposição da confiança
    pub breakdown: ScoreBreakdown,
    /// Trechos originais (mesma ordem de `source_offsets`)
    pub source_excerpts: Vec<String>,
    /// Trechos simplificados (mesma ordem de `target_offsets`)
    pub target_excerpts: Vec<String>,
}

/// Anotação final de estratégia.
///
/// Snapshot imutável; o ciclo de vida (aceitar/rejeitar/modificar)
/// pertence a um colaborador externo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAnnotation {
    /// Id determinístico (UUIDv5 de código + offsets)
    pub strategy_id: Uuid,
    /// Estratégia
    pub code: StrategyCode,
    /// Confiança final (0.0 - 1.0)
    pub confidence: f32,
    /// Impacto
    pub impact_level: ImpactLevel,
    /// Evidência resolvida
    pub evidence: AnnotationEvidence,
    /// Intervalos no texto original
    pub source_offsets: Vec<TextSpan>,
    /// Intervalos no texto simplificado
    pub target_offsets: Vec<TextSpan>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(text: &str) -> TextUnit {
        TextUnit {
            id: "src:p0:s0".into(),
            side: Side::Source,
            level: UnitLevel::Sentence,
            text: text.into(),
            start_offset: 10,
            end_offset: 10 + text.len(),
            parent_id: Some("src:p0".into()),
            index: 0,
        }
    }

    #[test]
    fn test_unaligned_pair_has_zero_score() {
        let pair = AlignmentPair::unaligned(&unit("Texto."), 0);
        assert_eq!(pair.score, 0.0);
        assert!(pair.target_unit_id.is_none());
        assert!(!pair.is_aligned());
    }

    #[test]
    fn test_matched_pair_clamps_score() {
        let u = unit("Texto.");
        let pair = AlignmentPair::matched(&u, 0, &u, 0, 1.2, AlignmentStatus::Aligned);
        assert_eq!(pair.score, 1.0);
    }

    #[test]
    fn test_signals_are_clamped() {
        let signals = EvidenceSignals::new(1.5, -0.2, f32::NAN, 0.5);
        assert_eq!(signals.semantic, 1.0);
        assert_eq!(signals.lexical, 0.0);
        assert_eq!(signals.structural, 0.0);
        assert_eq!(signals.salience, 0.5);
    }

    #[test]
    fn test_evidence_span_within() {
        let u = unit("Este texto é complexo.");
        let span = EvidenceSpan::within(&u, 5, 10);
        assert_eq!(span.excerpt, "texto");

        // Fora de fronteira de char: excerpt vazio
        let broken = EvidenceSpan::within(&u, 12, 13);
        assert!(broken.excerpt.is_empty());
    }

    #[test]
    fn test_scope_is_deduplicated() {
        let u = unit("Texto.");
        let evidence = StrategyEvidence::new(StrategyCode::MeaningDrift, UnitLevel::Sentence)
            .with_source_span(EvidenceSpan::whole(&u))
            .with_scope(&u.id);
        assert_eq!(evidence.scope.len(), 1);
    }

    #[test]
    fn test_impact_classification() {
        assert_eq!(ImpactLevel::classify(0.85, UnitLevel::Phrase), ImpactLevel::High);
        assert_eq!(ImpactLevel::classify(0.65, UnitLevel::Paragraph), ImpactLevel::High);
        assert_eq!(ImpactLevel::classify(0.65, UnitLevel::Sentence), ImpactLevel::Medium);
        assert_eq!(ImpactLevel::classify(0.3, UnitLevel::Sentence), ImpactLevel::Low);
    }
}
