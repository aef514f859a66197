use crate::applications::ApplicationRegistrar;
use crate::ledger::CreditLedger;
use crate::matching::MatchScorer;
use crate::pipeline::Triggers;
use crate::resume::ResumeCustomizer;

/// Shared application state injected into all route handlers via Axum extractors.
/// Every component is a cheap clone over `Arc`ed stores and the LLM client.
#[derive(Clone)]
pub struct AppState {
    pub ledger: CreditLedger,
    pub scorer: MatchScorer,
    pub customizer: ResumeCustomizer,
    pub registrar: ApplicationRegistrar,
    pub triggers: Triggers,
}
