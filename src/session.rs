// =============================================================================
// Session State — the single source of truth handed to the renderer
// =============================================================================
//
// A `Session` is an immutable value. Every mutation builds a new `Session`
// and swaps it into the `SessionStore` in one step, so a reader holding a
// snapshot never sees a half-applied refresh.
//
// Thread safety:
//   - parking_lot::RwLock<Arc<Session>> for the current value; readers clone
//     the Arc and release the lock immediately.
//   - Atomic version counter, bumped on every commit. The WebSocket feed uses
//     it to detect changes.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::{ErrorKind, RefreshError, SessionError};
use crate::indicators::{IndicatorSet, LatestIndicators};
use crate::market_data::{Candle, CandleSeries};

/// Output of one successful fetch → compute cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshData {
    pub series: CandleSeries,
    pub indicators: IndicatorSet,
}

// =============================================================================
// Session
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    /// Configured symbols, in display order, without duplicates.
    pub symbols: Vec<String>,
    /// Always a member of `symbols`.
    pub active_symbol: String,
    pub interval: String,
    pub series: Option<CandleSeries>,
    pub indicators: Option<IndicatorSet>,
    pub last_error: Option<ErrorKind>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Session {
    /// Create the startup session: no data yet, no error.
    pub fn new(
        symbols: Vec<String>,
        active_symbol: impl Into<String>,
        interval: impl Into<String>,
    ) -> Result<Self, SessionError> {
        let active_symbol = active_symbol.into();
        if !symbols.contains(&active_symbol) {
            return Err(SessionError::InvalidSymbol(active_symbol));
        }
        Ok(Self {
            symbols,
            active_symbol,
            interval: interval.into(),
            series: None,
            indicators: None,
            last_error: None,
            last_updated: None,
        })
    }

    pub fn validate_symbol(&self, symbol: &str) -> Result<(), SessionError> {
        if self.symbols.iter().any(|s| s == symbol) {
            Ok(())
        } else {
            Err(SessionError::InvalidSymbol(symbol.to_string()))
        }
    }

    /// Apply a periodic refresh result.
    ///
    /// Success replaces series and indicators, stamps `last_updated` and
    /// clears the error. Failure keeps the previous data and records the
    /// failure kind, leaving a stale but labelled chart.
    pub fn apply_refresh_result(
        &self,
        result: Result<RefreshData, RefreshError>,
        now: DateTime<Utc>,
    ) -> Session {
        let mut next = self.clone();
        match result {
            Ok(data) => {
                next.series = Some(data.series);
                next.indicators = Some(data.indicators);
                next.last_updated = Some(now);
                next.last_error = None;
            }
            Err(err) => {
                next.last_error = Some(err.kind());
            }
        }
        next
    }

    /// Move to `symbol` together with the result of the cycle that was run
    /// for it.
    ///
    /// A failed cycle leaves the new symbol with no data and the error set;
    /// the previous symbol's candles are never shown under the new name.
    pub fn switched_to(
        &self,
        symbol: &str,
        result: Result<RefreshData, RefreshError>,
        now: DateTime<Utc>,
    ) -> Result<Session, SessionError> {
        self.validate_symbol(symbol)?;

        if symbol == self.active_symbol {
            return Ok(self.apply_refresh_result(result, now));
        }

        let mut next = self.clone();
        next.active_symbol = symbol.to_string();
        next.series = None;
        next.indicators = None;
        next.last_updated = None;
        next = next.apply_refresh_result(result, now);
        Ok(next)
    }

    /// Data is on screen but the most recent cycle failed.
    pub fn is_stale(&self) -> bool {
        self.last_error.is_some() && self.series.is_some()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.series.as_ref().map(CandleSeries::closes).unwrap_or_default()
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Serialisable view for the renderer / dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub version: u64,
    pub server_time: i64,
    pub stale: bool,
    pub session: Arc<Session>,
    pub latest: Option<LatestValues>,
}

/// The newest candle and indicator readings, for chart titles and labels.
#[derive(Debug, Clone, Serialize)]
pub struct LatestValues {
    pub candle: Candle,
    pub indicators: Option<LatestIndicators>,
}

// =============================================================================
// SessionStore
// =============================================================================

/// Shared holder of the current [`Session`], swapped whole on every commit.
pub struct SessionStore {
    current: RwLock<Arc<Session>>,
    version: AtomicU64,
}

impl SessionStore {
    pub fn new(session: Session) -> Self {
        Self {
            current: RwLock::new(Arc::new(session)),
            version: AtomicU64::new(1),
        }
    }

    /// The current session. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<Session> {
        self.current.read().clone()
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Swap in `next` unless `cancelled()` reports true under the write lock.
    ///
    /// Returns the new version on commit, `None` when the commit was refused.
    pub(crate) fn commit_unless(&self, next: Session, cancelled: impl FnOnce() -> bool) -> Option<u64> {
        let mut guard = self.current.write();
        if cancelled() {
            return None;
        }
        *guard = Arc::new(next);
        Some(self.version.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Wait for any commit currently holding the write lock to finish.
    pub(crate) fn fence(&self) {
        drop(self.current.write());
    }

    /// Build the renderer-facing snapshot of the current session.
    pub fn build_snapshot(&self) -> SessionSnapshot {
        // Read the version first: a commit racing with us can only make the
        // session newer than the version we report, never older.
        let version = self.version();
        let session = self.snapshot();

        let latest = session.series.as_ref().and_then(|series| {
            series.last().map(|candle| LatestValues {
                candle: *candle,
                indicators: session.indicators.as_ref().map(IndicatorSet::latest),
            })
        });

        SessionSnapshot {
            version,
            server_time: Utc::now().timestamp_millis(),
            stale: session.is_stale(),
            session,
            latest,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, IndicatorError};
    use crate::indicators::IndicatorParams;

    fn symbols() -> Vec<String> {
        vec!["BTCUSDT".into(), "ETHUSDT".into()]
    }

    fn data(closes: &[f64]) -> RefreshData {
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle {
                open_time: i as i64 * 60_000,
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 1.0,
            })
            .collect();
        let series = CandleSeries::from_response(candles, 1000).unwrap();
        let indicators = IndicatorSet::compute(&series.closes(), &IndicatorParams::default()).unwrap();
        RefreshData { series, indicators }
    }

    fn network() -> RefreshError {
        FetchError::Network("connection refused".into()).into()
    }

    #[test]
    fn new_requires_active_symbol_in_list() {
        assert!(Session::new(symbols(), "BTCUSDT", "1m").is_ok());
        assert_eq!(
            Session::new(symbols(), "DOGEUSDT", "1m"),
            Err(SessionError::InvalidSymbol("DOGEUSDT".into()))
        );
    }

    #[test]
    fn success_replaces_data_and_clears_error() {
        let now = Utc::now();
        let s0 = Session::new(symbols(), "BTCUSDT", "1m").unwrap();
        let s1 = s0.apply_refresh_result(Err(network()), now);
        assert_eq!(s1.last_error, Some(ErrorKind::Network));
        assert!(!s1.is_stale(), "no data yet, so nothing is stale");

        let s2 = s1.apply_refresh_result(Ok(data(&[1.0, 2.0, 3.0])), now);
        assert_eq!(s2.closes(), vec![1.0, 2.0, 3.0]);
        assert_eq!(s2.last_error, None);
        assert_eq!(s2.last_updated, Some(now));
    }

    #[test]
    fn failure_retains_previous_data() {
        let t0 = Utc::now();
        let good = Session::new(symbols(), "BTCUSDT", "1m")
            .unwrap()
            .apply_refresh_result(Ok(data(&[1.0, 2.0, 3.0])), t0);

        let mut s = good.clone();
        for _ in 0..5 {
            s = s.apply_refresh_result(Err(network()), Utc::now());
        }
        assert_eq!(s.series, good.series);
        assert_eq!(s.indicators, good.indicators);
        assert_eq!(s.last_updated, Some(t0));
        assert_eq!(s.last_error, Some(ErrorKind::Network));
        assert!(s.is_stale());

        let s = s.apply_refresh_result(Err(IndicatorError::InsufficientData { len: 1 }.into()), Utc::now());
        assert_eq!(s.last_error, Some(ErrorKind::InsufficientData));
        assert_eq!(s.series, good.series);
    }

    #[test]
    fn switch_to_unknown_symbol_is_rejected() {
        let s = Session::new(symbols(), "BTCUSDT", "1m").unwrap();
        let err = s.switched_to("DOGEUSDT", Ok(data(&[1.0, 2.0])), Utc::now()).unwrap_err();
        assert_eq!(err, SessionError::InvalidSymbol("DOGEUSDT".into()));
    }

    #[test]
    fn failed_switch_shows_no_data_for_new_symbol() {
        let s = Session::new(symbols(), "BTCUSDT", "1m")
            .unwrap()
            .apply_refresh_result(Ok(data(&[1.0, 2.0, 3.0])), Utc::now());

        let next = s.switched_to("ETHUSDT", Err(network()), Utc::now()).unwrap();
        assert_eq!(next.active_symbol, "ETHUSDT");
        assert!(next.series.is_none());
        assert!(next.indicators.is_none());
        assert!(next.last_updated.is_none());
        assert_eq!(next.last_error, Some(ErrorKind::Network));
    }

    #[test]
    fn successful_switch_commits_symbol_and_data_together() {
        let s = Session::new(symbols(), "BTCUSDT", "1m").unwrap();
        let next = s.switched_to("ETHUSDT", Ok(data(&[5.0, 6.0])), Utc::now()).unwrap();
        assert_eq!(next.active_symbol, "ETHUSDT");
        assert_eq!(next.closes(), vec![5.0, 6.0]);
        assert_eq!(next.last_error, None);
    }

    #[test]
    fn store_commit_bumps_version_and_swaps_whole_value() {
        let store = SessionStore::new(Session::new(symbols(), "BTCUSDT", "1m").unwrap());
        let before = store.snapshot();
        assert_eq!(store.version(), 1);

        let next = before.apply_refresh_result(Ok(data(&[1.0, 2.0])), Utc::now());
        assert_eq!(store.commit_unless(next, || false), Some(2));
        assert_eq!(store.version(), 2);

        // The old snapshot is untouched.
        assert!(before.series.is_none());
        assert_eq!(store.snapshot().closes(), vec![1.0, 2.0]);
    }

    #[test]
    fn store_refuses_cancelled_commit() {
        let store = SessionStore::new(Session::new(symbols(), "BTCUSDT", "1m").unwrap());
        let before = store.snapshot();
        let next = before.apply_refresh_result(Ok(data(&[1.0, 2.0])), Utc::now());
        assert_eq!(store.commit_unless(next, || true), None);
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn snapshot_reports_latest_and_staleness() {
        let store = SessionStore::new(Session::new(symbols(), "BTCUSDT", "1m").unwrap());
        assert!(store.build_snapshot().latest.is_none());

        let s = store.snapshot().apply_refresh_result(Ok(data(&[1.0, 2.0, 3.0])), Utc::now());
        let s = s.apply_refresh_result(Err(network()), Utc::now());
        store.commit_unless(s, || false);

        let snap = store.build_snapshot();
        assert!(snap.stale);
        let latest = snap.latest.as_ref().expect("series present");
        assert!((latest.candle.close - 3.0).abs() < f64::EPSILON);
        assert!(latest.indicators.is_some());

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["session"]["active_symbol"], "BTCUSDT");
        assert_eq!(json["session"]["last_error"]["kind"], "network");
    }
}
