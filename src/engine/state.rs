//! Tri-state pull protocol signal

use std::fmt;

use serde::Serialize;

/// Control signal threaded through every pull operation.
///
/// - `Waiting`: no progress was possible and no result is attached; the
///   caller re-issues the identical call later
/// - `HasMore`: a result is attached and more may follow
/// - `Done`: a result (possibly empty) is attached and nothing follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    Waiting,
    HasMore,
    Done,
}

impl ExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::Waiting => "WAITING",
            ExecutionState::HasMore => "HASMORE",
            ExecutionState::Done => "DONE",
        }
    }

    pub fn is_waiting(&self) -> bool {
        *self == ExecutionState::Waiting
    }

    pub fn is_done(&self) -> bool {
        *self == ExecutionState::Done
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
