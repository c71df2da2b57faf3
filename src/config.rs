// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CONFIGURAÇÃO DA ANÁLISE, DO MOTOR E DO RUNTIME
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// - `AnalysisOptions`: parâmetros por requisição (validados na entrada)
// - `EngineConfig`: backend de embeddings e cache, lidos do .env
// - `RuntimeConfig`: runtime Tokio
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::salience::SalienceMethod;
use crate::scoring::ConfidenceCoefficients;
use crate::strategies::StrategyCode;

/// Thresholds da cascata.
///
/// Todos são alvos de calibração; os padrões são indicativos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Similaridade mínima para alinhar parágrafos
    pub paragraph_alignment: f32,
    /// Similaridade mínima para alinhar sentenças
    pub sentence_alignment: f32,
    /// Similaridade mínima para um destino extra entrar num grupo split
    pub split_candidate: f32,
    /// Abaixo disso um par 1:1 de sentenças indica alteração de sentido
    pub drift: f32,
    /// Acima disso (com divergência baixa) o par de parágrafos é podado
    pub prune_similarity: f32,
    /// Divergência máxima para poda
    pub prune_divergence: f32,
    /// Similaridade mínima para reescrita ampla
    pub rewrite_similarity: f32,
    /// Redução de tamanho mínima para reescrita ampla
    pub rewrite_length_reduction: f32,
    /// Cobertura mínima de palavras de conteúdo na ruptura de período
    pub fragmentation_coverage: f32,
    /// Crescimento mínimo do destino na explicitação
    pub explicitation_growth: f32,
    /// Fração mínima de vocabulário novo na explicitação
    pub explicitation_novelty: f32,
    /// Confiança mínima para manter uma detecção
    pub min_confidence: f32,
    /// Acima disso duas detecções sobrepostas da mesma família coexistem
    pub co_occurrence: f32,
    /// Parágrafos com mais sentenças que isso usam janela
    pub max_paragraph_sentences: usize,
    /// Meia-largura da janela de comparação de sentenças
    pub sentence_window: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            paragraph_alignment: 0.5,
            sentence_alignment: 0.45,
            split_candidate: 0.25,
            drift: 0.6,
            prune_similarity: 0.95,
            prune_divergence: 0.05,
            rewrite_similarity: 0.7,
            rewrite_length_reduction: 0.3,
            fragmentation_coverage: 0.5,
            explicitation_growth: 0.3,
            explicitation_novelty: 0.25,
            min_confidence: 0.3,
            co_occurrence: 0.8,
            max_paragraph_sentences: 40,
            sentence_window: 8,
        }
    }
}

impl Thresholds {
    /// Valida intervalos. Valores fora do intervalo são rejeitados, nunca ajustados.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit_interval = [
            ("paragraph_alignment", self.paragraph_alignment),
            ("sentence_alignment", self.sentence_alignment),
            ("split_candidate", self.split_candidate),
            ("drift", self.drift),
            ("prune_similarity", self.prune_similarity),
            ("prune_divergence", self.prune_divergence),
            ("rewrite_similarity", self.rewrite_similarity),
            ("rewrite_length_reduction", self.rewrite_length_reduction),
            ("fragmentation_coverage", self.fragmentation_coverage),
            ("explicitation_growth", self.explicitation_growth),
            ("explicitation_novelty", self.explicitation_novelty),
            ("min_confidence", self.min_confidence),
            ("co_occurrence", self.co_occurrence),
        ];

        for (name, value) in unit_interval {
            check_unit_interval(name, value)?;
        }

        if self.max_paragraph_sentences == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max_paragraph_sentences",
                reason: "deve ser maior que zero".into(),
            });
        }
        if self.sentence_window == 0 {
            return Err(ConfigError::InvalidValue {
                name: "sentence_window",
                reason: "deve ser maior que zero".into(),
            });
        }

        Ok(())
    }
}

pub(crate) fn check_unit_interval(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::ThresholdOutOfRange {
            name,
            value,
            min: 0.0,
            max: 1.0,
        });
    }
    Ok(())
}

/// Configuração de uma estratégia
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TagSetting {
    /// Estratégia ativa
    pub active: bool,
    /// Peso multiplicativo (0.0 - 1.0); 0 elimina a detecção
    pub weight: f32,
}

impl Default for TagSetting {
    fn default() -> Self {
        Self {
            active: true,
            weight: 1.0,
        }
    }
}

impl TagSetting {
    /// Estratégia desligada
    pub fn disabled() -> Self {
        Self {
            active: false,
            weight: 0.0,
        }
    }

    /// Estratégia ativa com peso
    pub fn weighted(weight: f32) -> Self {
        Self {
            active: true,
            weight,
        }
    }

    /// A detecção é eliminada (não apenas rebaixada)
    pub fn eliminates(&self) -> bool {
        !self.active || self.weight <= 0.0
    }
}

/// Opções de uma requisição de análise.
///
/// Passadas explicitamente por todo o pipeline; não há estado global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Habilita a detecção de omissões (OM+)
    pub enable_omission: bool,
    /// Aceito mas ignorado: PRO+ nunca é emitida automaticamente
    pub enable_manual_only_override: bool,
    /// Configuração por código de estratégia
    pub tag_weights: BTreeMap<String, TagSetting>,
    /// Método de saliência solicitado
    pub salience_method: SalienceMethod,
    /// Thresholds da cascata
    pub thresholds: Thresholds,
    /// Coeficientes da fórmula de confiança
    pub coefficients: ConfidenceCoefficients,
    /// Prazo total da requisição
    #[serde(with = "optional_secs")]
    pub timeout: Option<Duration>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            enable_omission: false,
            enable_manual_only_override: false,
            tag_weights: BTreeMap::new(),
            salience_method: SalienceMethod::default(),
            thresholds: Thresholds::default(),
            coefficients: ConfidenceCoefficients::default(),
            timeout: None,
        }
    }
}

impl AnalysisOptions {
    /// Cria opções padrão
    pub fn new() -> Self {
        Self::default()
    }

    /// Habilita omissões
    pub fn with_omission(mut self, enabled: bool) -> Self {
        self.enable_omission = enabled;
        self
    }

    /// Define o peso de uma estratégia
    pub fn with_tag(mut self, code: StrategyCode, setting: TagSetting) -> Self {
        self.tag_weights.insert(code.as_code().to_string(), setting);
        self
    }

    /// Define o método de saliência
    pub fn with_salience(mut self, method: SalienceMethod) -> Self {
        self.salience_method = method;
        self
    }

    /// Define o prazo total
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Valida as opções na entrada da requisição
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;
        self.coefficients.validate()?;

        for (code, setting) in &self.tag_weights {
            if StrategyCode::from_code(code).is_none() {
                return Err(ConfigError::UnknownStrategyCode(code.clone()));
            }
            if !setting.weight.is_finite() || !(0.0..=1.0).contains(&setting.weight) {
                return Err(ConfigError::WeightOutOfRange {
                    code: code.clone(),
                    value: setting.weight,
                });
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout.is_zero() {
                return Err(ConfigError::InvalidValue {
                    name: "timeout",
                    reason: "deve ser maior que zero".into(),
                });
            }
        }

        Ok(())
    }

    /// Configuração efetiva de uma estratégia.
    ///
    /// Códigos não especificados: ativos com peso 1.0. PRO+ é sempre
    /// desligada; OM+ depende de opt-in.
    pub fn tag_setting(&self, code: StrategyCode) -> TagSetting {
        let explicit = self
            .tag_weights
            .iter()
            .find(|(key, _)| StrategyCode::from_code(key) == Some(code))
            .map(|(_, setting)| *setting);

        if code.is_manual_only() {
            return TagSetting::disabled();
        }
        if code.is_opt_in() && !self.omission_enabled() {
            return TagSetting::disabled();
        }

        explicit.unwrap_or_default()
    }

    /// Omissão habilitada pela flag ou por entrada ativa explícita
    pub fn omission_enabled(&self) -> bool {
        if self.enable_omission {
            return true;
        }
        self.tag_weights.iter().any(|(key, setting)| {
            StrategyCode::from_code(key) == Some(StrategyCode::Omission) && setting.active
        })
    }
}

mod optional_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        let secs: Option<f64> = Option::deserialize(deserializer)?;
        Ok(secs
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MOTOR
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Backend de embeddings.
///
/// - `Subword`: modelo local (palavras + trigramas de caracteres), padrão
/// - `Hash`: apenas o fallback determinístico (modo degradado forçado)
/// - `OpenAi`: API remota compatível com OpenAI, com fallback local
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingBackend {
    /// Modelo local padrão
    #[default]
    Subword,
    /// Somente fallback
    Hash,
    /// API remota
    OpenAi,
}

impl EmbeddingBackend {
    /// Converte valor do .env (case-insensitive); desconhecido → Subword
    pub fn from_env(value: &str) -> Self {
        match value.to_lowercase().trim() {
            "hash" | "fallback" => Self::Hash,
            "openai" | "remote" => Self::OpenAi,
            _ => Self::Subword,
        }
    }

    /// Nome legível para logs
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Subword => "Subword (local)",
            Self::Hash => "Hash (fallback)",
            Self::OpenAi => "OpenAI (remoto → local)",
        }
    }
}

impl fmt::Display for EmbeddingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Configuração do motor (processo inteiro)
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Backend de embeddings
    pub backend: EmbeddingBackend,
    /// Modelo remoto
    pub model: String,
    /// URL base da API remota
    pub api_base_url: String,
    /// Chave da API remota
    pub api_key: Option<String>,
    /// Capacidade do cache de embeddings
    pub cache_size: usize,
    /// Prazo da fase de embeddings
    pub embedding_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            model: "text-embedding-3-small".to_string(),
            api_base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            cache_size: 4096,
            embedding_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    /// Carrega a partir das variáveis de ambiente.
    ///
    /// Variáveis suportadas:
    /// - `EMBEDDING_BACKEND`: "subword", "hash" ou "openai"
    /// - `EMBEDDING_MODEL`: modelo remoto
    /// - `EMBEDDING_API_BASE_URL`: URL base da API
    /// - `OPENAI_API_KEY`: chave da API
    /// - `EMBEDDING_CACHE_SIZE`: entradas do cache (padrão: 4096)
    /// - `EMBEDDING_TIMEOUT_SECS`: prazo da fase de embeddings (padrão: 30)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(backend) = std::env::var("EMBEDDING_BACKEND") {
            config.backend = EmbeddingBackend::from_env(&backend);
            log::info!("📦 EMBEDDING_BACKEND={}", config.backend);
        }

        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            if !model.trim().is_empty() {
                config.model = model.trim().to_string();
            }
        }

        if let Ok(url) = std::env::var("EMBEDDING_API_BASE_URL") {
            if !url.trim().is_empty() {
                config.api_base_url = url.trim().trim_end_matches('/').to_string();
            }
        }

        config.api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        if let Ok(size_str) = std::env::var("EMBEDDING_CACHE_SIZE") {
            if let Ok(size) = size_str.parse::<usize>() {
                if size > 0 {
                    config.cache_size = size;
                    log::info!("📦 EMBEDDING_CACHE_SIZE={}", size);
                }
            }
        }

        if let Ok(secs_str) = std::env::var("EMBEDDING_TIMEOUT_SECS") {
            if let Ok(secs) = secs_str.parse::<u64>() {
                if secs > 0 {
                    config.embedding_timeout = Duration::from_secs(secs);
                    log::info!("📦 EMBEDDING_TIMEOUT_SECS={}", secs);
                }
            }
        }

        if config.backend == EmbeddingBackend::OpenAi && config.api_key.is_none() {
            log::warn!("⚠️ EMBEDDING_BACKEND=openai sem OPENAI_API_KEY; usando modelo local");
            config.backend = EmbeddingBackend::Subword;
        }

        config
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RUNTIME
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuração do runtime Tokio.
///
/// Controla número de threads e comportamento do async runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Número de worker threads do Tokio.
    /// Se None, usa cálculo dinâmico: min(cpu_cores, max_threads).
    pub worker_threads: Option<usize>,

    /// Limite superior para o cálculo dinâmico (padrão: 16)
    pub max_threads: usize,

    /// Número máximo de blocking threads (padrão: 512).
    /// Embeddings locais e a cascata rodam no blocking pool.
    pub max_blocking_threads: usize,

    /// Nome das threads do runtime
    pub thread_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            max_threads: 16,
            max_blocking_threads: 512,
            thread_name: "simplification".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Calcula número efetivo de worker threads
    pub fn effective_worker_threads(&self) -> usize {
        if let Some(threads) = self.worker_threads {
            threads
        } else {
            std::cmp::min(num_cpus::get(), self.max_threads)
        }
    }
}

/// Carrega configuração do runtime a partir das variáveis de ambiente.
///
/// Variáveis suportadas:
/// - `TOKIO_THREADS`: Número fixo de threads (opcional)
/// - `TOKIO_MAX_THREADS`: Máximo de threads para cálculo dinâmico (padrão: 16)
/// - `TOKIO_MAX_BLOCKING`: Máximo de blocking threads (padrão: 512)
pub fn load_runtime_config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();

    if let Some(threads) = positive_env("TOKIO_THREADS") {
        config.worker_threads = Some(threads);
        log::info!("📦 TOKIO_THREADS={} (fixo)", threads);
    }

    if let Some(max) = positive_env("TOKIO_MAX_THREADS") {
        config.max_threads = max;
        log::info!("📦 TOKIO_MAX_THREADS={}", max);
    }

    if let Some(blocking) = positive_env("TOKIO_MAX_BLOCKING") {
        config.max_blocking_threads = blocking;
        log::info!("📦 TOKIO_MAX_BLOCKING={}", blocking);
    }

    if config.worker_threads.is_none() {
        log::info!(
            "🔧 Tokio: {} threads (dinâmico: min({} cores, {} max))",
            config.effective_worker_threads(),
            num_cpus::get(),
            config.max_threads
        );
    }

    config
}

fn positive_env(name: &str) -> Option<usize> {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
}

/// Instala panic hook que apenas loga o panic.
///
/// Panics dentro de `spawn_blocking` chegam ao motor como `JoinError`
/// e viram degradação em vez de derrubar o processo.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(move |panic_info| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");

        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_else(|| "unknown location".to_string());

        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic payload".to_string()
        };

        log::error!(
            "[PANIC] Thread {:?} ({}) at {}: {}",
            thread.id(),
            thread_name,
            location,
            message
        );
    }));
}

/// Cria o runtime Tokio com configuração customizada.
///
/// Deve ser chamada no início do programa, antes de qualquer código async.
pub fn create_tokio_runtime(config: &RuntimeConfig) -> std::io::Result<tokio::runtime::Runtime> {
    let worker_threads = config.effective_worker_threads();

    log::info!(
        "🚀 Criando runtime Tokio: {} workers, {} blocking max",
        worker_threads,
        config.max_blocking_threads
    );

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .max_blocking_threads(config.max_blocking_threads)
        .thread_name(&config.thread_name)
        .enable_all()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds_are_valid() {
        assert!(Thresholds::default().validate().is_ok());
        assert!(AnalysisOptions::default().validate().is_ok());
    }

    #[test]
    fn test_threshold_out_of_range_is_rejected() {
        let mut options = AnalysisOptions::default();
        options.thresholds.sentence_alignment = 1.5;
        let err = options.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ThresholdOutOfRange {
                name: "sentence_alignment",
                ..
            }
        ));
    }

    #[test]
    fn test_nan_threshold_is_rejected() {
        let mut thresholds = Thresholds::default();
        thresholds.drift = f32::NAN;
        assert!(thresholds.validate().is_err());
    }

    #[test]
    fn test_weight_out_of_range_is_rejected_not_clamped() {
        let options = AnalysisOptions::default()
            .with_tag(StrategyCode::VocabularySimplification, TagSetting::weighted(1.2));
        assert!(matches!(
            options.validate(),
            Err(ConfigError::WeightOutOfRange { .. })
        ));
    }

    #[test]
    fn test_unknown_code_is_rejected() {
        let mut options = AnalysisOptions::default();
        options.tag_weights.insert("ZZ+".into(), TagSetting::default());
        assert_eq!(
            options.validate(),
            Err(ConfigError::UnknownStrategyCode("ZZ+".into()))
        );
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let options = AnalysisOptions::default().with_timeout(Duration::ZERO);
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_tag_setting_defaults() {
        let options = AnalysisOptions::default();
        let setting = options.tag_setting(StrategyCode::Fragmentation);
        assert!(setting.active);
        assert_eq!(setting.weight, 1.0);

        assert!(options.tag_setting(StrategyCode::ManualProblem).eliminates());
        assert!(options.tag_setting(StrategyCode::Omission).eliminates());
    }

    #[test]
    fn test_manual_only_cannot_be_enabled() {
        let mut options = AnalysisOptions::default()
            .with_tag(StrategyCode::ManualProblem, TagSetting::weighted(1.0));
        options.enable_manual_only_override = true;
        assert!(options.validate().is_ok());
        assert!(options.tag_setting(StrategyCode::ManualProblem).eliminates());
    }

    #[test]
    fn test_omission_opt_in() {
        let by_flag = AnalysisOptions::default().with_omission(true);
        assert!(by_flag.omission_enabled());
        assert!(!by_flag.tag_setting(StrategyCode::Omission).eliminates());

        let by_tag = AnalysisOptions::default().with_tag(StrategyCode::Omission, TagSetting::weighted(0.5));
        assert!(by_tag.omission_enabled());
        assert_eq!(by_tag.tag_setting(StrategyCode::Omission).weight, 0.5);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let json = r#"{"enable_omission": true, "tag_weights": {"SL+": {"active": true, "weight": 0.4}}, "timeout": 2.5}"#;
        let options: AnalysisOptions = serde_json::from_str(json).unwrap();
        assert!(options.enable_omission);
        assert_eq!(options.thresholds, Thresholds::default());
        assert_eq!(options.timeout, Some(Duration::from_millis(2500)));
        assert_eq!(options.tag_setting(StrategyCode::VocabularySimplification).weight, 0.4);
    }

    #[test]
    fn test_embedding_backend_from_env() {
        assert_eq!(EmbeddingBackend::from_env("hash"), EmbeddingBackend::Hash);
        assert_eq!(EmbeddingBackend::from_env("OPENAI"), EmbeddingBackend::OpenAi);
        assert_eq!(EmbeddingBackend::from_env("anything"), EmbeddingBackend::Subword);
    }

    #[test]
    fn test_runtime_config_default() {
        let config = RuntimeConfig::default();
        assert!(config.worker_threads.is_none());
        assert_eq!(config.max_threads, 16);
        assert_eq!(config.max_blocking_threads, 512);
    }

    #[test]
    fn test_effective_worker_threads() {
        let mut config = RuntimeConfig::default();
        assert_eq!(
            config.effective_worker_threads(),
            std::cmp::min(num_cpus::get(), 16)
        );
        config.worker_threads = Some(4);
        assert_eq!(config.effective_worker_threads(), 4);
    }
}
