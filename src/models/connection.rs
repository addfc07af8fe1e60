//! Connection lifecycle model.

use serde::Serialize;
use std::fmt;

/// State of the single shared connection.
///
/// `Uninitialized -> Connecting -> {Ready | Degraded} -> Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Uninitialized,
    Connecting,
    /// Connection held and usable
    Ready,
    /// Startup connect failed; tools that need the connection short-circuit
    Degraded,
    Closed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Degraded => "degraded",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}
