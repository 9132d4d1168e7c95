// =============================================================================
// Error taxonomy — fetch, indicator, and session failures
// =============================================================================
//
// Every failure a refresh cycle can hit is recoverable. Fetch and indicator
// failures collapse into an `ErrorKind` stored on the session; an unknown
// symbol is handed back to the caller and never stored.
// =============================================================================

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A raw kline payload (or one of its rows) could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ParseError(pub String);

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        Self(format!("malformed kline payload: {err}"))
    }
}

/// Failure of a single klines request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connection refused, DNS failure, timeout, or a broken body stream.
    #[error("network error: {0}")]
    Network(String),

    /// The endpoint answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Transport succeeded but the body is not a usable candle series.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IndicatorError {
    #[error("insufficient data: {len} closes, need at least 2")]
    InsufficientData { len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("symbol {0} is not in the configured symbol list")]
    InvalidSymbol(String),
}

/// Anything that can abort one fetch → compute cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Indicator(#[from] IndicatorError),
}

impl RefreshError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch(FetchError::Network(_)) => ErrorKind::Network,
            Self::Fetch(FetchError::Http { status, .. }) => ErrorKind::Http { status: *status },
            Self::Fetch(FetchError::Parse(_)) => ErrorKind::Parse,
            Self::Indicator(IndicatorError::InsufficientData { .. }) => ErrorKind::InsufficientData,
        }
    }
}

/// The failure label a session carries while its data is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Http { status: u16 },
    Parse,
    InsufficientData,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "NetworkError"),
            Self::Http { status } => write!(f, "HttpError({status})"),
            Self::Parse => write!(f, "ParseError"),
            Self::InsufficientData => write!(f, "InsufficientData"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_error_maps_to_kind() {
        let cases = [
            (RefreshError::from(FetchError::Network("timed out".into())), ErrorKind::Network),
            (
                RefreshError::from(FetchError::Http { status: 429, body: String::new() }),
                ErrorKind::Http { status: 429 },
            ),
            (RefreshError::from(FetchError::Parse(ParseError::new("bad"))), ErrorKind::Parse),
            (
                RefreshError::from(IndicatorError::InsufficientData { len: 1 }),
                ErrorKind::InsufficientData,
            ),
        ];
        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{err}");
        }
    }

    #[test]
    fn error_kind_serialises_with_tag() {
        let json = serde_json::to_value(ErrorKind::Http { status: 503 }).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "http", "status": 503 }));
        assert_eq!(ErrorKind::Network.to_string(), "NetworkError");
    }
}
