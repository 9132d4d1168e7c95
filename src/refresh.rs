// =============================================================================
// Refresh Loop — fixed-interval fetch → compute → commit
// =============================================================================
//
// Runs as a background Tokio task, waking every `tick_interval` to:
//   1. Fetch the active symbol's klines.
//   2. Compute the indicator set over the closes.
//   3. Commit the result (or the failure label) to the session store.
//
// Exactly one cycle may be in flight. A tick that finds one running is
// dropped; a symbol switch waits for it instead. Shutdown is cooperative: an
// in-flight fetch runs to completion but its result is never committed.
//
//   let refresher = Arc::new(Refresher::new(store, client, &config));
//   tokio::spawn(Arc::clone(&refresher).run());
//   ...
//   refresher.stop();
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{RefreshError, SessionError};
use crate::indicators::{IndicatorParams, IndicatorSet};
use crate::market_data::KlineSource;
use crate::runtime_config::RuntimeConfig;
use crate::session::{RefreshData, Session, SessionStore};
use crate::types::{Command, TickOutcome};

pub struct Refresher<S> {
    store: Arc<SessionStore>,
    source: S,
    limit: u32,
    params: IndicatorParams,
    tick_interval: Duration,
    /// Held for the whole of a cycle; serialises every session mutation.
    cycle: Mutex<()>,
    shutdown: watch::Sender<bool>,
}

impl<S: KlineSource> Refresher<S> {
    pub fn new(store: Arc<SessionStore>, source: S, config: &RuntimeConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            store,
            source,
            limit: config.limit,
            params: config.indicator_params(),
            tick_interval: config.tick_interval(),
            cycle: Mutex::new(()),
            shutdown,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    #[cfg(test)]
    pub fn source(&self) -> &S {
        &self.source
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Signal shutdown. Idempotent.
    ///
    /// Once this returns no further commit can land: a commit already holding
    /// the store's write lock finishes first, every later one sees the flag.
    pub fn stop(&self) {
        let was_stopped = self.shutdown.send_replace(true);
        self.store.fence();
        if !was_stopped {
            info!("refresh loop stop requested");
        }
    }

    /// Resolve once [`stop`](Self::stop) has been called.
    pub async fn stopped(&self) {
        let mut rx = self.shutdown.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Drive ticks until stopped. The first tick fires immediately.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            tick_interval_ms = self.tick_interval.as_millis() as u64,
            limit = self.limit,
            "refresh loop starting"
        );

        loop {
            tokio::select! {
                _ = self.stopped() => break,
                _ = ticker.tick() => {
                    if self.tick().await == TickOutcome::Stopped {
                        break;
                    }
                }
            }
        }

        info!("refresh loop stopped");
    }

    // ── Entry points ────────────────────────────────────────────────────

    /// Single entry point for commands arriving from the UI boundary.
    pub async fn dispatch(&self, command: Command) -> Result<TickOutcome, SessionError> {
        debug!(?command, "dispatching command");
        match command {
            Command::SwitchSymbol(symbol) => self.switch_symbol(&symbol).await,
            Command::Refresh => Ok(self.tick().await),
            Command::Shutdown => {
                self.stop();
                Ok(TickOutcome::Stopped)
            }
        }
    }

    /// Run one periodic cycle for the active symbol, unless one is already
    /// in flight.
    pub async fn tick(&self) -> TickOutcome {
        if self.is_stopped() {
            return TickOutcome::Stopped;
        }
        let Ok(_guard) = self.cycle.try_lock() else {
            debug!("refresh cycle still in flight, dropping tick");
            return TickOutcome::Skipped;
        };

        let session = self.store.snapshot();
        let result = self.run_cycle(&session.active_symbol, &session.interval).await;
        let outcome = outcome_of(&result);
        let next = session.apply_refresh_result(result, Utc::now());
        self.commit(next, outcome)
    }

    /// Make `symbol` the active symbol and refresh it.
    ///
    /// An unknown symbol fails immediately and leaves the session untouched.
    /// Otherwise this waits for any in-flight cycle, then fetches and commits
    /// the new symbol together with its data.
    pub async fn switch_symbol(&self, symbol: &str) -> Result<TickOutcome, SessionError> {
        self.store.snapshot().validate_symbol(symbol)?;

        let _guard = self.cycle.lock().await;
        if self.is_stopped() {
            return Ok(TickOutcome::Stopped);
        }

        // Re-read: the cycle we waited for may have committed.
        let session = self.store.snapshot();
        info!(from = %session.active_symbol, to = %symbol, "switching symbol");

        let result = self.run_cycle(symbol, &session.interval).await;
        let outcome = outcome_of(&result);
        let next = session.switched_to(symbol, result, Utc::now())?;
        Ok(self.commit(next, outcome))
    }

    // ── Internals ───────────────────────────────────────────────────────

    async fn run_cycle(&self, symbol: &str, interval: &str) -> Result<RefreshData, RefreshError> {
        let cycle_id = Uuid::new_v4();
        debug!(%cycle_id, symbol, interval, "refresh cycle started");

        let series = self
            .source
            .fetch_candles(symbol, interval, self.limit, None)
            .await
            .inspect_err(|e| warn!(%cycle_id, symbol, error = %e, "kline fetch failed"))?;

        let indicators = IndicatorSet::compute(&series.closes(), &self.params)
            .inspect_err(|e| warn!(%cycle_id, symbol, error = %e, "indicators unavailable this cycle"))?;

        debug!(%cycle_id, symbol, candles = series.len(), "refresh cycle computed");
        Ok(RefreshData { series, indicators })
    }

    fn commit(&self, next: Session, outcome: TickOutcome) -> TickOutcome {
        match self.store.commit_unless(next, || self.is_stopped()) {
            Some(version) => {
                debug!(version, %outcome, "session committed");
                outcome
            }
            None => {
                info!("shutdown signalled during refresh cycle, result discarded");
                TickOutcome::Discarded
            }
        }
    }
}

fn outcome_of(result: &Result<RefreshData, RefreshError>) -> TickOutcome {
    match result {
        Ok(_) => TickOutcome::Committed,
        Err(e) => TickOutcome::Failed { error: e.kind() },
    }
}
