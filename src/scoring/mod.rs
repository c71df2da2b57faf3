// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CONFIANÇA E PESOS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// confidence = clamp01(α·semântico + β·lexical + γ·estrutural
//                      + boost_saliência − penalidades) × peso_da_estratégia
//
// boost_saliência = cap · saliência (no máximo `cap`)
//
// Peso 0 ou estratégia inativa ELIMINA a detecção (não é o mesmo que uma
// confiança baixa). Depois do score, sobreposições da mesma família são
// deduplicadas.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{check_unit_interval, AnalysisOptions, TagSetting};
use crate::error::ConfigError;
use crate::strategies::StrategyCode;
use crate::types::StrategyEvidence;

/// Coeficientes da fórmula de confiança
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceCoefficients {
    /// Peso do sinal semântico
    pub alpha: f32,
    /// Peso do sinal lexical
    pub beta: f32,
    /// Peso do sinal estrutural
    pub gamma: f32,
    /// Teto do boost de saliência
    pub salience_cap: f32,
}

impl Default for ConfidenceCoefficients {
    fn default() -> Self {
        Self {
            alpha: 0.35,
            beta: 0.25,
            gamma: 0.25,
            salience_cap: 0.15,
        }
    }
}

impl ConfidenceCoefficients {
    /// Cada coeficiente em [0, 1]
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit_interval("alpha", self.alpha)?;
        check_unit_interval("beta", self.beta)?;
        check_unit_interval("gamma", self.gamma)?;
        check_unit_interval("salience_cap", self.salience_cap)?;
        Ok(())
    }
}

/// Decomposição da confiança de uma detecção
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// α · semântico
    pub semantic: f32,
    /// β · lexical
    pub lexical: f32,
    /// γ · estrutural
    pub structural: f32,
    /// Boost de saliência
    pub salience_boost: f32,
    /// Soma das penalidades
    pub penalties: f32,
    /// Score antes do peso da estratégia (0.0 - 1.0)
    pub raw: f32,
    /// Peso da estratégia
    pub tag_weight: f32,
    /// Confiança final (0.0 - 1.0)
    pub confidence: f32,
}

/// Resultado do score de uma evidência
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    /// Removida pela configuração (peso 0, inativa ou família reservada)
    Eliminated {
        /// Estratégia
        code: StrategyCode,
        /// Motivo
        reason: String,
    },
    /// Pontuada
    Scored(ScoreBreakdown),
}

/// Evidência com score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    /// Evidência (com `base_confidence` preenchida)
    pub evidence: StrategyEvidence,
    /// Decomposição
    pub breakdown: ScoreBreakdown,
}

impl ScoredCandidate {
    /// Confiança final
    pub fn confidence(&self) -> f32 {
        self.breakdown.confidence
    }
}

/// Detecção eliminada pela configuração
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EliminatedCandidate {
    /// Estratégia
    pub code: StrategyCode,
    /// Motivo
    pub reason: String,
}

/// Saída de `score_all`
#[derive(Debug, Clone, Default)]
pub struct ScoringOutput {
    /// Candidatas acima da confiança mínima
    pub candidates: Vec<ScoredCandidate>,
    /// Eliminadas por peso/atividade
    pub eliminated: Vec<EliminatedCandidate>,
    /// Pontuadas mas abaixo da confiança mínima
    pub below_threshold: usize,
}

/// Motor de confiança configurado para uma requisição
#[derive(Debug, Clone)]
pub struct ConfidenceEngine {
    coefficients: ConfidenceCoefficients,
    settings: BTreeMap<StrategyCode, TagSetting>,
    min_confidence: f32,
    co_occurrence: f32,
}

impl ConfidenceEngine {
    /// Configura a partir das opções (já validadas)
    pub fn from_options(options: &AnalysisOptions) -> Self {
        let settings = StrategyCode::ALL
            .iter()
            .map(|code| (*code, options.tag_setting(*code)))
            .collect();

        Self {
            coefficients: options.coefficients.clone(),
            settings,
            min_confidence: options.thresholds.min_confidence,
            co_occurrence: options.thresholds.co_occurrence,
        }
    }

    /// Pontua uma evidência
    pub fn score(&self, evidence: &StrategyEvidence) -> ScoreOutcome {
        let code = evidence.strategy_code;
        let setting = self.settings.get(&code).copied().unwrap_or_default();

        if setting.eliminates() {
            let reason = if code.is_manual_only() {
                "manual-only strategy".to_string()
            } else if !setting.active {
                "strategy inactive".to_string()
            } else {
                "tag weight is zero".to_string()
            };
            return ScoreOutcome::Eliminated { code, reason };
        }

        let c = &self.coefficients;
        let s = evidence.signals;

        let semantic = c.alpha * s.semantic;
        let lexical = c.beta * s.lexical;
        let structural = c.gamma * s.structural;
        let salience_boost = (c.salience_cap * s.salience).min(c.salience_cap);
        let penalties = evidence.total_penalty();

        let raw = clamp01(semantic + lexical + structural + salience_boost - penalties);
        let confidence = clamp01(raw * setting.weight);

        ScoreOutcome::Scored(ScoreBreakdown {
            semantic,
            lexical,
            structural,
            salience_boost,
            penalties,
            raw,
            tag_weight: setting.weight,
            confidence,
        })
    }

    /// Pontua todas as evidências e filtra pela confiança mínima
    pub fn score_all(&self, evidence: Vec<StrategyEvidence>) -> ScoringOutput {
        let mut output = ScoringOutput::default();

        for mut item in evidence {
            match self.score(&item) {
                ScoreOutcome::Eliminated { code, reason } => {
                    log::debug!("[scoring] {} eliminated: {}", code, reason);
                    output.eliminated.push(EliminatedCandidate { code, reason });
                }
                ScoreOutcome::Scored(breakdown) => {
                    if breakdown.confidence < self.min_confidence {
                        output.below_threshold += 1;
                        continue;
                    }
                    item.base_confidence = breakdown.raw;
                    output.candidates.push(ScoredCandidate {
                        evidence: item,
                        breakdown,
                    });
                }
            }
        }

        output
    }

    /// Remove sobreposições da mesma família.
    ///
    /// Guloso por confiança decrescente: uma candidata que sobrepõe outra
    /// já mantida da mesma família é descartada, a menos que as duas estejam
    /// acima do limiar de coocorrência; nesse caso ambas ficam e a mais fraca
    /// perde os contribuintes compartilhados.
    ///
    /// Evidência disjunta aqui significa contribuintes disjuntos: escopo e
    /// spans continuam os da detecção, pois as duas estratégias coocorrem no
    /// mesmo trecho.
    pub fn deduplicate(&self, mut candidates: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
        candidates.sort_by(|a, b| {
            b.confidence()
                .total_cmp(&a.confidence())
                .then_with(|| a.evidence.strategy_code.cmp(&b.evidence.strategy_code))
                .then_with(|| a.evidence.scope.cmp(&b.evidence.scope))
        });

        let mut kept: Vec<ScoredCandidate> = Vec::with_capacity(candidates.len());
        for mut candidate in candidates {
            let family = candidate.evidence.strategy_code.family();
            let mut drop = false;

            for existing in &kept {
                if existing.evidence.strategy_code.family() != family
                    || !existing.evidence.overlaps(&candidate.evidence)
                {
                    continue;
                }

                let both_strong =
                    existing.confidence() >= self.co_occurrence && candidate.confidence() >= self.co_occurrence;
                if both_strong {
                    candidate
                        .evidence
                        .contributors
                        .retain(|c| !existing.evidence.contributors.contains(c));
                } else {
                    drop = true;
                    break;
                }
            }

            if drop {
                log::debug!(
                    "[scoring] {} dropped by overlap ({:.2})",
                    candidate.evidence.strategy_code,
                    candidate.confidence()
                );
            } else {
                kept.push(candidate);
            }
        }

        kept
    }
}

fn clamp01(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
