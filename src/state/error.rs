use thiserror::Error;

use super::event::CycleId;

pub type StateResult<T> = std::result::Result<T, StateError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("invalid state transition: from {from} using event {event}")]
    InvalidStateTransition {
        from: &'static str,
        event: &'static str,
    },
    #[error("stale event for cycle {received}; current cycle is {current}")]
    StaleCycle { current: CycleId, received: CycleId },
}
