// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ERROS E DEGRADAÇÕES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Somente erros de configuração interrompem uma análise. Todo o resto vira
// uma `Degradation` anexada ao resultado (parcial ou completo).
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::embeddings::EmbeddingError;
pub use crate::salience::SalienceError;

/// Erro de configuração: rejeitado na entrada, nunca corrigido silenciosamente
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Threshold fora do intervalo permitido
    #[error("threshold `{name}` = {value} fora do intervalo [{min}, {max}]")]
    ThresholdOutOfRange {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    /// Peso de estratégia fora de [0, 1]
    #[error("peso de `{code}` = {value} fora do intervalo [0, 1]")]
    WeightOutOfRange { code: String, value: f32 },

    /// Código de estratégia desconhecido em `tag_weights`
    #[error("código de estratégia desconhecido: `{0}`")]
    UnknownStrategyCode(String),

    /// Qualquer outro valor inválido
    #[error("valor inválido para `{name}`: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// Erro de alto nível do motor
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuração inválida (única falha que `analyze` devolve)
    #[error("configuração inválida: {0}")]
    Configuration(#[from] ConfigError),

    /// Texto malformado ou vazio
    #[error("entrada inválida: {0}")]
    Input(String),

    /// Modelo de embeddings indisponível
    #[error("modelo indisponível: {0}")]
    ModelUnavailable(#[from] EmbeddingError),

    /// Inconsistência interna (offsets, ids)
    #[error("inconsistência interna: {0}")]
    InternalInconsistency(String),
}

/// Tipo de degradação reportada ao chamador
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationKind {
    /// Texto vazio ou malformado
    InputError,
    /// Backend primário de embeddings indisponível (fallback usado)
    ModelUnavailable,
    /// Nenhum embedding disponível: cascata só com sinais lexicais
    LexicalOnly,
    /// Método de saliência substituído pelo baseline
    SalienceSubstituted,
    /// Prazo da requisição expirou
    Timeout,
    /// Anotação descartada por offsets inconsistentes
    InternalInconsistency,
    /// Aviso de estágio (entrada malformada)
    StageWarning,
    /// Override solicitado e ignorado
    OverrideIgnored,
}

/// Descrição legível por máquina de uma degradação
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degradation {
    /// Tipo
    pub kind: DegradationKind,
    /// Componente que degradou (`embeddings`, `salience`, `cascade:meso` ...)
    pub component: String,
    /// Mensagem
    pub message: String,
}

impl Degradation {
    /// Cria degradação
    pub fn new(kind: DegradationKind, component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            component: component.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Degradation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}: {}", self.kind, self.component, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts_into_engine_error() {
        let err: EngineError = ConfigError::UnknownStrategyCode("XX+".into()).into();
        assert!(matches!(err, EngineError::Configuration(_)));
        assert!(err.to_string().contains("XX+"));
    }

    #[test]
    fn test_degradation_kind_serializes_snake_case() {
        let degradation = Degradation::new(DegradationKind::LexicalOnly, "embeddings", "timeout");
        let json = serde_json::to_string(&degradation).unwrap();
        assert!(json.contains("\"lexical_only\""));
    }
}
