use super::model::UiState;

/// Monotonic id of one hotkey-triggered analysis cycle.
pub type CycleId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    HotkeyPressed,
    CaptureSucceeded,
    CaptureFailed { message: String },
    AnalysisSucceeded { text: String },
    AnalysisFailed { message: String },
    Dismissed,
}

impl AppEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::HotkeyPressed => "HotkeyPressed",
            Self::CaptureSucceeded => "CaptureSucceeded",
            Self::CaptureFailed { .. } => "CaptureFailed",
            Self::AnalysisSucceeded { .. } => "AnalysisSucceeded",
            Self::AnalysisFailed { .. } => "AnalysisFailed",
            Self::Dismissed => "Dismissed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub cycle: CycleId,
    pub from: &'static str,
    pub event: &'static str,
    pub to: &'static str,
}

impl StateTransition {
    pub fn new(cycle: CycleId, from: &UiState, event: &AppEvent, to: &UiState) -> Self {
        Self {
            cycle,
            from: from.name(),
            event: event.name(),
            to: to.name(),
        }
    }
}
