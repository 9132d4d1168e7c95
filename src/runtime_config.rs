// =============================================================================
// Runtime Configuration — symbols, polling cadence, indicator periods
// =============================================================================
//
// Loaded once at startup from JSON, then overridden from the environment.
// All fields carry `#[serde(default)]` so a partial (or empty) file loads.
// The file is never written back.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::binance::client::DEFAULT_BASE_URL;
use crate::indicators::{IndicatorParams, MacdParams};

/// The klines endpoint refuses larger windows.
pub const MAX_LIMIT: u32 = 1000;

// =============================================================================
// Serde defaults
// =============================================================================

fn default_symbols() -> Vec<String> {
    vec![
        "BTCUSDT".to_string(),
        "ETHUSDT".to_string(),
        "BNBUSDT".to_string(),
        "XRPUSDT".to_string(),
        "SOLUSDT".to_string(),
    ]
}

fn default_interval() -> String {
    "1m".to_string()
}

fn default_limit() -> u32 {
    100
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_macd_fast() -> usize {
    12
}

fn default_macd_slow() -> usize {
    26
}

fn default_macd_signal() -> usize {
    9
}

fn default_rsi_period() -> usize {
    14
}

fn default_bb_period() -> usize {
    20
}

fn default_bb_k() -> f64 {
    2.0
}

// =============================================================================
// RuntimeConfig
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    // --- Market ---------------------------------------------------------------

    /// Symbols offered for switching, in display order.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Symbol shown at startup; the first of `symbols` when unset.
    #[serde(default)]
    pub initial_symbol: Option<String>,

    /// Kline interval, e.g. "1m".
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Candles requested per fetch.
    #[serde(default = "default_limit")]
    pub limit: u32,

    // --- Polling --------------------------------------------------------------

    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    // --- API ------------------------------------------------------------------

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    // --- Indicators -----------------------------------------------------------

    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,

    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,

    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,

    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    #[serde(default = "default_bb_period")]
    pub bb_period: usize,

    #[serde(default = "default_bb_k")]
    pub bb_k: f64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            initial_symbol: None,
            interval: default_interval(),
            limit: default_limit(),
            tick_interval_ms: default_tick_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            base_url: default_base_url(),
            bind_addr: default_bind_addr(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
            rsi_period: default_rsi_period(),
            bb_period: default_bb_period(),
            bb_k: default_bb_k(),
        }
    }
}

impl RuntimeConfig {
    /// Read `path` as JSON. Missing fields take their defaults; a missing
    /// file is an error for the caller to downgrade to a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a valid monitor config", path.display()))?;

        info!(
            path = %path.display(),
            symbols = config.symbols.len(),
            initial = ?config.initial_symbol,
            "monitor config loaded"
        );
        Ok(config)
    }

    /// Apply `KLINE_*` overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(syms) = var("KLINE_SYMBOLS") {
            self.symbols = syms
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(interval) = var("KLINE_INTERVAL") {
            self.interval = interval.trim().to_string();
        }
        if let Some(limit) = var("KLINE_LIMIT") {
            self.limit = limit
                .trim()
                .parse()
                .with_context(|| format!("KLINE_LIMIT is not a positive integer: {limit:?}"))?;
        }
        if let Some(tick) = var("KLINE_TICK_MS") {
            self.tick_interval_ms = tick
                .trim()
                .parse()
                .with_context(|| format!("KLINE_TICK_MS is not a positive integer: {tick:?}"))?;
        }
        if let Some(addr) = var("KLINE_BIND_ADDR") {
            self.bind_addr = addr;
        }
        Ok(())
    }

    /// Reject configurations the refresh loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            bail!("symbol list must not be empty");
        }
        for (i, sym) in self.symbols.iter().enumerate() {
            if self.symbols[..i].contains(sym) {
                bail!("symbol {sym} is listed more than once");
            }
        }
        if let Some(initial) = &self.initial_symbol {
            if !self.symbols.contains(initial) {
                bail!("initial_symbol {initial} is not in the symbol list");
            }
        }
        if self.interval.is_empty() {
            bail!("interval must not be empty");
        }
        if self.limit == 0 || self.limit > MAX_LIMIT {
            bail!("limit must be between 1 and {MAX_LIMIT}, got {}", self.limit);
        }
        if self.tick_interval_ms == 0 {
            bail!("tick_interval_ms must be positive");
        }
        if self.request_timeout_ms == 0 {
            bail!("request_timeout_ms must be positive");
        }
        if self.macd_fast == 0 || self.macd_fast >= self.macd_slow {
            bail!(
                "MACD periods must satisfy 0 < fast < slow, got fast={} slow={}",
                self.macd_fast,
                self.macd_slow
            );
        }
        if self.macd_signal == 0 || self.rsi_period == 0 || self.bb_period == 0 {
            bail!("indicator periods must be positive");
        }
        if !(self.bb_k > 0.0 && self.bb_k.is_finite()) {
            bail!("bb_k must be a positive number, got {}", self.bb_k);
        }
        Ok(())
    }

    /// Drop an `initial_symbol` that the (possibly overridden) symbol list no
    /// longer contains, so the session falls back to the first symbol.
    pub fn forget_unknown_initial_symbol(&mut self) {
        if let Some(initial) = self.initial_symbol.take() {
            if self.symbols.contains(&initial) {
                self.initial_symbol = Some(initial);
            } else {
                warn!(symbol = %initial, "initial_symbol is not in the symbol list, ignoring");
            }
        }
    }

    /// The symbol the session starts on.
    pub fn start_symbol(&self) -> &str {
        self.initial_symbol
            .as_deref()
            .or_else(|| self.symbols.first().map(String::as_str))
            .unwrap_or_default()
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn indicator_params(&self) -> IndicatorParams {
        IndicatorParams {
            macd: MacdParams {
                fast: self.macd_fast,
                slow: self.macd_slow,
                signal: self.macd_signal,
            },
            rsi_period: self.rsi_period,
            bb_period: self.bb_period,
            bb_k: self.bb_k,
        }
    }
}
