//! Structured observability hooks for report runs.
//!
//! - a run-scoped span from [`run_span`], attached with `Instrument`
//! - phase lifecycle events: started, finished, failed

use tracing::{error, info, Span};

/// Span covering one report run.
///
/// ```ignore
/// pipeline.run().instrument(run_span("https://saas.example.com")).await
/// ```
pub fn run_span(ws_url: &str) -> Span {
    tracing::info_span!("policy_report.run", ws_url = %ws_url)
}

/// Emit event: a pipeline phase started.
pub fn emit_phase_started(phase: &str) {
    info!(event = "phase.started", phase = %phase);
}

/// Emit event: a pipeline phase finished with the number of items it produced.
pub fn emit_phase_finished(phase: &str, items: usize, duration_ms: u64) {
    info!(
        event = "phase.finished",
        phase = %phase,
        items = items,
        duration_ms = duration_ms,
    );
}

/// Emit event: the run failed; `category` names the error family.
pub fn emit_run_failed(category: &str, error: &dyn std::fmt::Display) {
    error!(event = "run.failed", category = %category, error = %error);
}
