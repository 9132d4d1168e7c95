// =============================================================================
// Shared types used across the kline monitor
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// A request arriving from the UI boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "symbol", rename_all = "snake_case")]
pub enum Command {
    SwitchSymbol(String),
    Refresh,
    Shutdown,
}

/// What happened to one requested refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// New data committed to the session.
    Committed,
    /// The cycle failed; the session now carries this error.
    Failed { error: ErrorKind },
    /// Another cycle was in flight; this tick was dropped.
    Skipped,
    /// Shutdown was signalled while the cycle ran; its result was thrown away.
    Discarded,
    /// The loop is already stopped; nothing ran.
    Stopped,
}

impl std::fmt::Display for TickOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Committed => write!(f, "Committed"),
            Self::Failed { error } => write!(f, "Failed({error})"),
            Self::Skipped => write!(f, "Skipped"),
            Self::Discarded => write!(f, "Discarded"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_wire_format() {
        let cmd: Command =
            serde_json::from_str(r#"{ "command": "switch_symbol", "symbol": "ETHUSDT" }"#).unwrap();
        assert_eq!(cmd, Command::SwitchSymbol("ETHUSDT".into()));

        let cmd: Command = serde_json::from_str(r#"{ "command": "shutdown" }"#).unwrap();
        assert_eq!(cmd, Command::Shutdown);
    }

    #[test]
    fn outcome_display() {
        let failed = TickOutcome::Failed { error: ErrorKind::Http { status: 502 } };
        assert_eq!(failed.to_string(), "Failed(HttpError(502))");
        assert_eq!(TickOutcome::Skipped.to_string(), "Skipped");
    }
}
