// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CASCATA DE DETECÇÃO
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Três estágios, do mais grosso ao mais fino:
//
// ┌───────────┐  grupos não podados  ┌───────────┐  pares 1:1  ┌───────────┐
// │   MACRO   │ ───────────────────▶ │   MESO    │ ──────────▶ │   MICRO   │
// │ parágrafo │                      │ sentença  │             │   frase   │
// └───────────┘                      └───────────┘             └───────────┘
//  OM+ RF+ RD+                        RP+ EXP+ AS+              SL+ TA+ MV+ DL+ MOD+
//
// Estágios nunca alteram as entradas; cada um devolve zero ou mais
// evidências e um relatório. O prazo da requisição é verificado entre
// unidades: ao expirar, o estágio para e o resultado fica parcial.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

mod diff;
mod macro_stage;
mod meso_stage;
mod micro_stage;

pub use diff::{diff_tokens, DiffOp, MAX_DIFF_TOKENS};
pub use macro_stage::{MacroOutput, MacroStage};
pub use meso_stage::{MesoOutput, MesoStage, SentencePair};
pub use micro_stage::MicroStage;

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::alignment::{DocumentAlignment, UnitSimilarity};
use crate::config::Thresholds;
use crate::salience::SalienceMap;
use crate::strategies::{EmissionPolicy, Stage};
use crate::types::{Penalty, StrategyEvidence};
use crate::utils::{ActionTimer, SegmentedDocument, Segmenter};

/// Penalidade aplicada a toda evidência quando os embeddings degradaram
pub const DEGRADED_SIGNAL_PENALTY: f32 = 0.05;

/// Prazo da requisição
#[derive(Debug, Clone, Copy, Default)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// Sem prazo
    pub fn none() -> Self {
        Self(None)
    }

    /// Prazo a partir de agora
    pub fn after(duration: Duration) -> Self {
        Self(Instant::now().checked_add(duration))
    }

    /// Prazo em um instante
    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    /// Prazo expirado
    pub fn expired(&self) -> bool {
        self.0.map(|at| Instant::now() >= at).unwrap_or(false)
    }
}

/// Entradas imutáveis compartilhadas pelos estágios
pub struct CascadeContext<'a> {
    /// Documento original segmentado
    pub source: &'a SegmentedDocument,
    /// Documento simplificado segmentado
    pub target: &'a SegmentedDocument,
    /// Alinhamento em cascata
    pub alignment: &'a DocumentAlignment,
    /// Saliência do documento original
    pub salience: &'a SalienceMap,
    /// Fonte de similaridade usada no alinhamento
    pub similarity: &'a dyn UnitSimilarity,
    /// Thresholds da requisição
    pub thresholds: &'a Thresholds,
    /// Segmentador (frases do estágio Micro)
    pub segmenter: &'a Segmenter,
    /// Política de emissão
    pub policy: EmissionPolicy,
    /// Embeddings degradados (fallback ou lexical-only)
    pub degraded: bool,
    /// Prazo da requisição
    pub deadline: Deadline,
}

/// Relatório de um estágio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    /// Estágio
    pub stage: Stage,
    /// Unidades (pares/grupos) avaliadas
    pub evaluated_units: usize,
    /// Evidências emitidas
    pub emitted: usize,
    /// Pares podados (somente Macro)
    pub pruned: usize,
    /// Avisos de entrada malformada
    pub warnings: Vec<String>,
    /// Prazo expirou durante o estágio
    pub timed_out: bool,
    /// Duração (ms)
    pub elapsed_ms: f64,
}

impl StageReport {
    /// Relatório vazio
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            evaluated_units: 0,
            emitted: 0,
            pruned: 0,
            warnings: Vec::new(),
            timed_out: false,
            elapsed_ms: 0.0,
        }
    }

    /// Registra aviso
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("[cascade:{}] {}", self.stage, message);
        self.warnings.push(message);
    }

    /// Verifica o prazo e marca o relatório se expirou
    pub fn check_deadline(&mut self, deadline: &Deadline) -> bool {
        if deadline.expired() {
            if !self.timed_out {
                log::warn!("[cascade:{}] ⏱️ Deadline reached, stopping stage", self.stage);
            }
            self.timed_out = true;
        }
        self.timed_out
    }
}

/// Estágio da cascata
pub trait StageEvaluator {
    /// Entrada vinda do estágio anterior
    type Input;
    /// Saída para o próximo estágio
    type Output;

    /// Estágio implementado
    fn stage(&self) -> Stage;

    /// Avalia o estágio
    fn evaluate(&self, ctx: &CascadeContext<'_>, input: Self::Input, report: &mut StageReport) -> Self::Output;
}

/// Resultado da cascata
#[derive(Debug, Clone, Default)]
pub struct CascadeOutcome {
    /// Evidências de todos os estágios, em ordem de estágio
    pub evidence: Vec<StrategyEvidence>,
    /// Relatórios dos estágios executados
    pub reports: Vec<StageReport>,
    /// Algum estágio parou pelo prazo
    pub partial: bool,
}

fn run_stage<S: StageEvaluator>(stage: &S, ctx: &CascadeContext<'_>, input: S::Input) -> (S::Output, StageReport) {
    let timer = ActionTimer::start(&format!("cascade:{}", stage.stage()));
    let mut report = StageReport::new(stage.stage());
    let output = stage.evaluate(ctx, input, &mut report);
    report.elapsed_ms = timer.stop_and_log().as_secs_f64() * 1000.0;
    (output, report)
}

/// Executa Macro → Meso → Micro
pub fn run_cascade(ctx: &CascadeContext<'_>) -> CascadeOutcome {
    let (macro_output, macro_report) = run_stage(&MacroStage, ctx, ());

    let eligible: Vec<usize> = (0..ctx.alignment.paragraphs.groups.len())
        .filter(|g| !macro_output.pruned_groups.contains(g))
        .collect();
    let (meso_output, meso_report) = run_stage(&MesoStage, ctx, eligible);

    let (micro_evidence, micro_report) = run_stage(&MicroStage, ctx, meso_output.micro_pairs);

    let mut evidence = macro_output.evidence;
    evidence.extend(meso_output.evidence);
    evidence.extend(micro_evidence);

    if ctx.degraded {
        for item in &mut evidence {
            item.penalties
                .push(Penalty::new("degraded embeddings", DEGRADED_SIGNAL_PENALTY));
        }
    }

    let reports = vec![macro_report, meso_report, micro_report];
    let partial = reports.iter().any(|r| r.timed_out);

    log::info!(
        "[cascade] {} evidence (macro {}, meso {}, micro {}){}",
        evidence.len(),
        reports[0].emitted,
        reports[1].emitted,
        reports[2].emitted,
        if partial { " ⚠️ partial" } else { "" }
    );

    CascadeOutcome {
        evidence,
        reports,
        partial,
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::Fixture;
    use super::*;
    use crate::strategies::StrategyCode;

    #[test]
    fn test_deadline() {
        assert!(!Deadline::none().expired());
        assert!(Deadline::at(Instant::now()).expired());
        assert!(!Deadline::after(Duration::from_secs(60)).expired());
    }

    #[test]
    fn test_identical_texts_emit_nothing() {
        let text = "O relatório foi publicado ontem. Ele descreve a situação.\n\nOutro parágrafo explica os detalhes.";
        let fixture = Fixture::new(text, text);
        let outcome = run_cascade(&fixture.context(EmissionPolicy::default()));

        assert!(outcome.evidence.is_empty());
        assert_eq!(outcome.reports.len(), 3);
        assert_eq!(outcome.reports[0].pruned, 2);
        assert!(!outcome.partial);
    }

    #[test]
    fn test_degraded_adds_penalty() {
        let fixture = Fixture::new(
            "O especialista examinou o paciente cuidadosamente durante a consulta.",
            "O médico examinou o paciente cuidadosamente durante a consulta.",
        );
        let mut ctx = fixture.context(EmissionPolicy::default());
        ctx.degraded = true;
        let outcome = run_cascade(&ctx);

        assert!(!outcome.evidence.is_empty());
        assert!(outcome
            .evidence
            .iter()
            .all(|e| e.penalties.iter().any(|p| p.reason == "degraded embeddings")));
    }

    #[test]
    fn test_expired_deadline_gives_partial() {
        let fixture = Fixture::new("Uma frase qualquer.", "Outra frase qualquer.");
        let mut ctx = fixture.context(EmissionPolicy::default());
        ctx.deadline = Deadline::at(Instant::now());
        let outcome = run_cascade(&ctx);

        assert!(outcome.partial);
        assert!(outcome.evidence.is_empty());
    }

    #[test]
    fn test_omission_requires_policy() {
        let source = "Os gatos dormem muito durante o dia.\n\nOs vulcões submarinos liberam magma incandescente.";
        let target = "Os gatos dormem muito durante o dia.";
        let fixture = Fixture::new(source, target);

        let disabled = run_cascade(&fixture.context(EmissionPolicy::new(false)));
        assert!(disabled
            .evidence
            .iter()
            .all(|e| e.strategy_code != StrategyCode::Omission));

        let enabled = run_cascade(&fixture.context(EmissionPolicy::new(true)));
        assert!(enabled
            .evidence
            .iter()
            .any(|e| e.strategy_code == StrategyCode::Omission));
    }
}
