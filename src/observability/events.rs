//! Observable engine events

use std::fmt;

/// Observable events emitted by the execution engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Pull protocol tracing
    /// getSome entered
    GetSomeBegin,
    /// getSome returned
    GetSomeEnd,
    /// Produced block contents (profile trace2)
    GetSomeResult,
    /// skipSome entered
    SkipSomeBegin,
    /// skipSome returned
    SkipSomeEnd,

    // Lifecycle
    /// Cursor reset finished for a node
    CursorInitialized,
    /// Shutdown cascade finished cleanly
    ShutdownComplete,
    /// Shutdown cascade finished with an error
    ShutdownFailed,
    /// A pull call observed the kill flag
    QueryKilled,

    // Driver
    /// Driver started draining a tree
    QueryBegin,
    /// Driver drained a tree to DONE
    QueryComplete,

    // Pool
    /// Pool refused an allocation
    PoolExhausted,

    // Configuration
    /// Configuration loaded
    ConfigLoaded,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::GetSomeBegin => "GET_SOME_BEGIN",
            Event::GetSomeEnd => "GET_SOME_END",
            Event::GetSomeResult => "GET_SOME_RESULT",
            Event::SkipSomeBegin => "SKIP_SOME_BEGIN",
            Event::SkipSomeEnd => "SKIP_SOME_END",
            Event::CursorInitialized => "CURSOR_INITIALIZED",
            Event::ShutdownComplete => "SHUTDOWN_COMPLETE",
            Event::ShutdownFailed => "SHUTDOWN_FAILED",
            Event::QueryKilled => "QUERY_KILLED",
            Event::QueryBegin => "QUERY_BEGIN",
            Event::QueryComplete => "QUERY_COMPLETE",
            Event::PoolExhausted => "POOL_EXHAUSTED",
            Event::ConfigLoaded => "CONFIG_LOADED",
        }
    }

    /// Returns true if this event reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::ShutdownFailed | Event::QueryKilled | Event::PoolExhausted
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
