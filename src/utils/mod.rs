// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UTILITÁRIOS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Utilitários compartilhados por todo o motor:
// - Segmentação (parágrafo → sentença → frase)
// - Tokenização e medidas lexicais
// - Timing por fase
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Segmentação hierárquica com offsets absolutos.
pub mod segment;
mod text;
mod timing;

pub use segment::{SegmentedDocument, Segmenter, DEFAULT_ABBREVIATIONS};
pub use text::*;
pub use timing::{ActionTimer, PhaseTimings};
