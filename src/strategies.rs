// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CATÁLOGO DE ESTRATÉGIAS DE SIMPLIFICAÇÃO
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Conjunto fechado de estratégias que o motor sabe detectar, suas famílias
// (usadas na deduplicação) e a política de emissão automática:
// - PRO+ nunca é emitida automaticamente (somente anotação manual)
// - OM+ só é emitida quando o chamador habilita explicitamente
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};

use crate::config::AnalysisOptions;

/// Estágio da cascata responsável por uma estratégia
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Escopo de parágrafo
    Macro,
    /// Escopo de sentença
    Meso,
    /// Escopo de frase/token
    Micro,
    /// Não detectada automaticamente
    Manual,
}

impl Stage {
    /// Nome do estágio para logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Macro => "macro",
            Self::Meso => "meso",
            Self::Micro => "micro",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Família de estratégias.
///
/// Duas evidências só competem na deduplicação quando pertencem
/// à mesma família e têm escopos sobrepostos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyFamily {
    /// Reorganização do discurso e reescrita ampla
    Discursive,
    /// Remoção de conteúdo
    Omission,
    /// Mudanças de estrutura sintática
    Structural,
    /// Mudanças de sentido ou perspectiva
    Semantic,
    /// Mudanças de vocabulário
    Lexical,
    /// Reservada para anotação humana
    Manual,
}

/// Estratégias de simplificação textual.
///
/// O enum garante que não existem códigos "inventados": a configuração
/// por código (`tag_weights`) é validada contra esta lista.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StrategyCode {
    /// RF+ - Reescrita frástica (reescrita ampla do parágrafo)
    #[serde(rename = "RF+")]
    BroadRewrite,
    /// RD+ - Reorganização discursiva (ordem dos parágrafos alterada)
    #[serde(rename = "RD+")]
    DiscourseReordering,
    /// OM+ - Omissão de conteúdo (opt-in)
    #[serde(rename = "OM+")]
    Omission,
    /// RP+ - Ruptura de período (uma sentença vira várias)
    #[serde(rename = "RP+")]
    Fragmentation,
    /// EXP+ - Explicitação de informação implícita
    #[serde(rename = "EXP+")]
    Explicitation,
    /// AS+ - Alteração de sentido
    #[serde(rename = "AS+")]
    MeaningDrift,
    /// SL+ - Simplificação lexical
    #[serde(rename = "SL+")]
    VocabularySimplification,
    /// TA+ - Troca de anáfora por referente explícito
    #[serde(rename = "TA+")]
    ReferentialClarity,
    /// MV+ - Mudança de voz (passiva ↔ ativa)
    #[serde(rename = "MV+")]
    VoiceChange,
    /// DL+ - Deslocamento de constituintes
    #[serde(rename = "DL+")]
    PositionalReorganization,
    /// MOD+ - Modulação (mudança de perspectiva)
    #[serde(rename = "MOD+")]
    PerspectiveReinterpretation,
    /// PRO+ - Problema / observação do anotador (somente manual)
    #[serde(rename = "PRO+")]
    ManualProblem,
}

impl StrategyCode {
    /// Todas as estratégias conhecidas, em ordem de catálogo
    pub const ALL: [StrategyCode; 12] = [
        Self::BroadRewrite,
        Self::DiscourseReordering,
        Self::Omission,
        Self::Fragmentation,
        Self::Explicitation,
        Self::MeaningDrift,
        Self::VocabularySimplification,
        Self::ReferentialClarity,
        Self::VoiceChange,
        Self::PositionalReorganization,
        Self::PerspectiveReinterpretation,
        Self::ManualProblem,
    ];

    /// Código curto usado na configuração e na saída
    pub fn as_code(&self) -> &'static str {
        match self {
            Self::BroadRewrite => "RF+",
            Self::DiscourseReordering => "RD+",
            Self::Omission => "OM+",
            Self::Fragmentation => "RP+",
            Self::Explicitation => "EXP+",
            Self::MeaningDrift => "AS+",
            Self::VocabularySimplification => "SL+",
            Self::ReferentialClarity => "TA+",
            Self::VoiceChange => "MV+",
            Self::PositionalReorganization => "DL+",
            Self::PerspectiveReinterpretation => "MOD+",
            Self::ManualProblem => "PRO+",
        }
    }

    /// Converte um código curto (case-insensitive) em estratégia
    pub fn from_code(code: &str) -> Option<Self> {
        let normalized = code.trim().to_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|strategy| strategy.as_code() == normalized)
    }

    /// Nome legível
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::BroadRewrite => "Reescrita frástica",
            Self::DiscourseReordering => "Reorganização discursiva",
            Self::Omission => "Omissão",
            Self::Fragmentation => "Ruptura de período",
            Self::Explicitation => "Explicitação",
            Self::MeaningDrift => "Alteração de sentido",
            Self::VocabularySimplification => "Simplificação lexical",
            Self::ReferentialClarity => "Troca de anáfora",
            Self::VoiceChange => "Mudança de voz",
            Self::PositionalReorganization => "Deslocamento",
            Self::PerspectiveReinterpretation => "Modulação",
            Self::ManualProblem => "Problema",
        }
    }

    /// Família usada na deduplicação
    pub fn family(&self) -> StrategyFamily {
        match self {
            Self::BroadRewrite | Self::DiscourseReordering | Self::Explicitation => {
                StrategyFamily::Discursive
            }
            Self::Omission => StrategyFamily::Omission,
            Self::Fragmentation | Self::VoiceChange | Self::PositionalReorganization => {
                StrategyFamily::Structural
            }
            Self::MeaningDrift | Self::PerspectiveReinterpretation => StrategyFamily::Semantic,
            Self::VocabularySimplification | Self::ReferentialClarity => StrategyFamily::Lexical,
            Self::ManualProblem => StrategyFamily::Manual,
        }
    }

    /// Estágio da cascata que detecta a estratégia
    pub fn stage(&self) -> Stage {
        match self {
            Self::BroadRewrite | Self::DiscourseReordering | Self::Omission => Stage::Macro,
            Self::Fragmentation | Self::Explicitation | Self::MeaningDrift => Stage::Meso,
            Self::VocabularySimplification
            | Self::ReferentialClarity
            | Self::VoiceChange
            | Self::PositionalReorganization
            | Self::PerspectiveReinterpretation => Stage::Micro,
            Self::ManualProblem => Stage::Manual,
        }
    }

    /// Estratégia reservada à anotação humana
    pub fn is_manual_only(&self) -> bool {
        matches!(self, Self::ManualProblem)
    }

    /// Estratégia desabilitada até o chamador optar por ela
    pub fn is_opt_in(&self) -> bool {
        matches!(self, Self::Omission)
    }
}

impl std::fmt::Display for StrategyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

/// Política de emissão automática.
///
/// Ponto único de decisão sobre as famílias reservadas. O montador de
/// anotações aplica esta política a toda evidência; o estágio Macro a
/// consulta apenas para não gastar trabalho com omissões que seriam descartadas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmissionPolicy {
    omission_enabled: bool,
}

impl EmissionPolicy {
    /// Política padrão: omissão desabilitada
    pub fn new(omission_enabled: bool) -> Self {
        Self { omission_enabled }
    }

    /// Deriva a política das opções da requisição
    pub fn from_options(options: &AnalysisOptions) -> Self {
        Self::new(options.omission_enabled())
    }

    /// Verifica se a estratégia pode ser emitida automaticamente
    pub fn permits(&self, code: StrategyCode) -> bool {
        if code.is_manual_only() {
            return false;
        }
        if code.is_opt_in() {
            return self.omission_enabled;
        }
        true
    }
}

impl Default for EmissionPolicy {
    fn default() -> Self {
        Self::new(false)
    }
}
