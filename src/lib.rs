//! # Simplification Engine - Análise de Estratégias de Simplificação
//!
//! Este crate compara um texto original com sua versão simplificada e
//! identifica **quais estratégias de simplificação** foram aplicadas, com
//! evidência rastreável até os offsets dos dois textos.
//!
//! ## Como funciona?
//!
//! Para cada par original/simplificado:
//! 1. Segmenta os dois textos em parágrafos, sentenças e frases
//! 2. Gera embeddings (com cache por conteúdo) e alinha as unidades
//! 3. Estima a saliência do conteúdo do original
//! 4. Roda a cascata Macro → Meso → Micro, que produz evidências
//! 5. Calcula confiança, aplica pesos e monta as anotações finais
//!
//! ## Arquitetura Principal
//!
//! ### 1. Alinhamento (`alignment`)
//! Pareamento parágrafo a parágrafo e, dentro de cada grupo, sentença a
//! sentença. Situações: alinhado, dividido, fundido, sem par.
//!
//! ### 2. Cascata (`cascade`)
//! Três estágios com granularidade crescente:
//! - **Macro**: omissão, reescrita ampla, reordenação
//! - **Meso**: fragmentação, explicitação, deriva de sentido
//! - **Micro**: vocabulário, referência, voz, deslocamento, modalidade
//!
//! ### 3. Confiança (`scoring`)
//! Combinação ponderada de sinais semântico, lexical, estrutural e de
//! saliência, menos penalidades, multiplicada pelo peso da estratégia.
//!
//! ### 4. Degradação explícita (`error`)
//! Modelo indisponível, prazo expirado ou entrada vazia não viram erro:
//! o resultado vem marcado e com a lista de degradações.
//!
//! ## Exemplo de Uso
//!
//! ```rust,ignore
//! use simplification_engine::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = SimplificationEngine::new();
//!     let options = AnalysisOptions::default().with_omission(true);
//!     let result = engine.analyze(original, simplified, &options).await?;
//!     for annotation in &result.strategy_annotations {
//!         println!("{} {:.2}", annotation.code, annotation.confidence);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Tipos fundamentais compartilhados por todo o motor.
///
/// - [`TextUnit`]: parágrafo, sentença ou frase com offsets absolutos
/// - [`AlignmentPair`]: par alinhado origem/destino
/// - [`StrategyEvidence`]: evidência produzida pela cascata
/// - [`StrategyAnnotation`]: anotação final devolvida ao chamador
pub mod types;

/// Catálogo de estratégias, estágios e política de emissão.
pub mod strategies;

/// Configuração da análise e do processo.
///
/// **Por requisição** ([`AnalysisOptions`]): omissão, pesos por código,
/// método de saliência, limiares, coeficientes e prazo.
///
/// **Ambiente** ([`EngineConfig`]):
/// - `EMBEDDING_BACKEND`: "subword", "hash" ou "openai" (padrão: "subword")
/// - `EMBEDDING_MODEL`: modelo remoto
/// - `EMBEDDING_API_BASE_URL` / `OPENAI_API_KEY`
/// - `EMBEDDING_CACHE_SIZE`: capacidade do cache
/// - `EMBEDDING_TIMEOUT_SECS`: prazo da fase de embeddings
///
/// **Runtime Tokio:** `TOKIO_THREADS`, `TOKIO_MAX_THREADS`, `TOKIO_MAX_BLOCKING`.
pub mod config;

/// Erros de configuração e degradações reportadas.
pub mod error;

/// Utilitários: segmentação, medidas lexicais e timing.
pub mod utils;

/// Similaridade cosseno com SIMD e matrizes paralelas (Rayon).
pub mod performance;

/// Embeddings locais e remotos com cache LRU por conteúdo.
pub mod embeddings;

/// Alinhamento hierárquico entre os textos.
pub mod alignment;

/// Saliência de conteúdo do texto original.
pub mod salience;

/// Cascata Macro → Meso → Micro.
pub mod cascade;

/// Cálculo de confiança e deduplicação.
pub mod scoring;

/// Montagem das anotações finais.
pub mod assembler;

/// Relatório de execução.
pub mod report;

/// Fachada do motor.
pub mod engine;

// Re-exports principais
pub use config::{
    create_tokio_runtime, install_panic_hook, load_runtime_config, AnalysisOptions, EngineConfig,
    RuntimeConfig, TagSetting, Thresholds,
};
pub use engine::{AnalysisResult, CapabilityFlags, SimplificationEngine};
pub use error::{ConfigError, Degradation, DegradationKind, EngineError};
pub use performance::simd::cosine_similarity;
pub use strategies::{Stage, StrategyCode};
pub use types::*;

/// Versão da biblioteca.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude com imports comuns para uso rápido.
///
/// ```rust,ignore
/// use simplification_engine::prelude::*;
/// ```
pub mod prelude {
    pub use crate::alignment::AlignmentSummary;
    pub use crate::config::{AnalysisOptions, EngineConfig, TagSetting, Thresholds};
    pub use crate::engine::{AnalysisResult, CapabilityFlags, SimplificationEngine};
    pub use crate::error::{Degradation, DegradationKind, EngineError};
    pub use crate::report::AnalysisReport;
    pub use crate::salience::SalienceMethod;
    pub use crate::strategies::{Stage, StrategyCode};
    pub use crate::types::*;
}
