use std::collections::VecDeque;

use super::error::{StateError, StateResult};
use super::{event::StateTransition, AppEvent, CycleId, UiState};

const MAX_HISTORY: usize = 64;

#[derive(Debug)]
pub struct StateMachine {
    state: UiState,
    cycle: CycleId,
    transition_history: VecDeque<StateTransition>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: UiState::default(),
            cycle: 0,
            transition_history: VecDeque::new(),
        }
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    /// Id of the cycle started by the most recent accepted hotkey press.
    pub fn cycle(&self) -> CycleId {
        self.cycle
    }

    #[cfg(test)]
    pub fn can_transition(&self, event: &AppEvent) -> bool {
        self.next_state(event).is_some()
    }

    pub fn next_state(&self, event: &AppEvent) -> Option<UiState> {
        use AppEvent::*;
        match (&self.state, event) {
            (UiState::Idle, HotkeyPressed) => Some(UiState::Capturing),
            (UiState::Capturing, CaptureSucceeded) => Some(UiState::Analyzing),
            (UiState::Capturing, CaptureFailed { message }) => {
                Some(UiState::ShowingError(message.clone()))
            }
            (UiState::Analyzing, AnalysisSucceeded { text }) => {
                Some(UiState::ShowingResult(text.clone()))
            }
            (UiState::Analyzing, AnalysisFailed { message }) => {
                Some(UiState::ShowingError(message.clone()))
            }
            (UiState::ShowingResult(_), Dismissed) | (UiState::ShowingError(_), Dismissed) => {
                Some(UiState::Idle)
            }
            _ => None,
        }
    }

    pub fn transition(&mut self, event: AppEvent) -> StateResult<&UiState> {
        tracing::debug!(
            from = self.state.name(),
            event = event.name(),
            cycle = self.cycle,
            "request state transition"
        );
        let next = self.next_state(&event).ok_or_else(|| {
            let from = self.state.name();
            tracing::debug!(from, event = event.name(), "invalid state transition requested");
            StateError::InvalidStateTransition {
                from,
                event: event.name(),
            }
        })?;

        if matches!(event, AppEvent::HotkeyPressed) {
            self.cycle = self.cycle.wrapping_add(1);
        }

        let record = StateTransition::new(self.cycle, &self.state, &event, &next);
        if self.transition_history.len() == MAX_HISTORY {
            self.transition_history.pop_front();
        }
        self.transition_history.push_back(record);
        self.state = next;

        Ok(&self.state)
    }

    /// Applies an event that was produced on behalf of `cycle`. Events from any
    /// other cycle are rejected without touching the state.
    pub fn transition_in_cycle(
        &mut self,
        cycle: CycleId,
        event: AppEvent,
    ) -> StateResult<&UiState> {
        if cycle != self.cycle {
            tracing::warn!(
                current = self.cycle,
                received = cycle,
                event = event.name(),
                "discarding event from a stale cycle"
            );
            return Err(StateError::StaleCycle {
                current: self.cycle,
                received: cycle,
            });
        }
        self.transition(event)
    }

    #[cfg(test)]
    pub fn history(&self) -> impl Iterator<Item = &StateTransition> {
        self.transition_history.iter()
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UiState::{} (cycle {})", self.state.name(), self.cycle)
    }
}
