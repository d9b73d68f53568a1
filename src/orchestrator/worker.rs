use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Command;
use crate::backend::{AnalysisError, AnalysisRequest, AnalysisResult, Analyzer};
use crate::state::CycleId;

/// Runs one backend call off the orchestrator thread and reports back by cycle.
pub(super) fn spawn_analysis<A>(
    cycle: CycleId,
    request: AnalysisRequest,
    analyzer: Arc<A>,
    tx: Sender<Command>,
) -> io::Result<()>
where
    A: Analyzer + ?Sized + 'static,
{
    std::thread::Builder::new()
        .name(format!("clue-analysis-{cycle}"))
        .spawn(move || {
            let started = Instant::now();
            let result = analyze_guarded(cycle, analyzer.as_ref(), &request);
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &result {
                Ok(text) => tracing::info!(
                    cycle,
                    backend = request.variant().as_str(),
                    elapsed_ms,
                    chars = text.chars().count(),
                    "analysis completed"
                ),
                Err(err) => tracing::debug!(cycle, elapsed_ms, %err, "analysis returned an error"),
            }
            if tx.send(Command::AnalysisFinished { cycle, result }).is_err() {
                tracing::debug!(cycle, "orchestrator stopped before analysis finished");
            }
        })?;
    Ok(())
}

/// A panicking backend still has to end its cycle, or the orchestrator would sit
/// in `Analyzing` and drop every later hotkey press.
fn analyze_guarded<A>(cycle: CycleId, analyzer: &A, request: &AnalysisRequest) -> AnalysisResult
where
    A: Analyzer + ?Sized,
{
    match panic::catch_unwind(AssertUnwindSafe(|| analyzer.analyze(request))) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_payload_to_string(payload.as_ref());
            tracing::error!(cycle, %message, "analysis worker panicked");
            Err(AnalysisError::Remote {
                backend: request.variant().as_str(),
                message: format!("analysis aborted unexpectedly: {message}"),
            })
        }
    }
}

fn panic_payload_to_string(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    "unknown panic payload".to_string()
}

pub(super) fn spawn_delayed_dismiss(
    cycle: CycleId,
    delay: Duration,
    tx: Sender<Command>,
) -> io::Result<()> {
    std::thread::Builder::new()
        .name(format!("clue-dismiss-{cycle}"))
        .spawn(move || {
            std::thread::sleep(delay);
            let _ = tx.send(Command::Dismiss { cycle });
        })?;
    Ok(())
}
