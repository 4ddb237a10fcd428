//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section has defaults so a missing key falls back to the stock
//! value. Secrets (Telegram token) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use secrecy::Secret;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::engine::scorer::{DAYS_PER_YEAR, DEFAULT_SETTLEMENTS_PER_DAY};

const DEFAULT_FETCH_INTERVAL_SECS: f64 = 5.0;
const DEFAULT_TIMEOUT_SECS: f64 = 10.0;

/// Seconds to `Duration`. `None` for negative, non-finite or out-of-range
/// values, which `Duration::from_secs_f64` would panic on.
fn secs_to_duration(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MonitorConfig {
    /// Target cycle cadence in seconds. Fractions are allowed.
    pub fetch_interval_secs: f64,
    /// Minimum spread threshold. Loaded and reported, not applied by the scorer.
    pub min_spread: f64,
    /// Funding settlements per day assumed when annualising (8h venues = 3).
    pub settlements_per_day: f64,
    /// How many opportunities the per-cycle console summary lists.
    pub console_top_n: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            fetch_interval_secs: DEFAULT_FETCH_INTERVAL_SECS,
            min_spread: 0.025,
            settlements_per_day: DEFAULT_SETTLEMENTS_PER_DAY,
            console_top_n: 20,
        }
    }
}

impl MonitorConfig {
    /// The cycle interval as a `Duration`. Negative or NaN values collapse
    /// to zero (back-to-back cycles); values too large to represent fall
    /// back to the default interval.
    pub fn fetch_interval(&self) -> Duration {
        let secs = self.fetch_interval_secs;
        if secs.is_nan() || secs <= 0.0 {
            return Duration::ZERO;
        }
        secs_to_duration(secs)
            .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_FETCH_INTERVAL_SECS))
    }

    /// Settlement periods per year used for `annualized_rate`.
    pub fn periods_per_year(&self) -> f64 {
        self.settlements_per_day * DAYS_PER_YEAR
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourcesConfig {
    /// Per-adapter time bound in seconds.
    pub timeout_secs: f64,
    pub user_agent: String,
    pub binance: bool,
    pub bybit: bool,
    pub gate: bool,
    pub hyperliquid: bool,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: "funding-monitor/0.1.0".to_string(),
            binance: true,
            bybit: true,
            gate: true,
            hyperliquid: true,
        }
    }
}

impl SourcesConfig {
    /// Per-adapter bound. Zero, negative, non-finite or out-of-range values
    /// fall back to the default.
    pub fn timeout(&self) -> Duration {
        secs_to_duration(self.timeout_secs)
            .filter(|d| !d.is_zero())
            .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotifierConfig {
    pub enabled: bool,
    pub bot_token_env: String,
    pub chat_id_env: String,
    /// Minimum funding rate (fraction) worth an alert.
    pub alert_rate: f64,
    /// Quiet period per instrument/source after an alert, in seconds.
    pub cooldown_secs: u64,
    pub max_per_message: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bot_token_env: "TELEGRAM_BOT_TOKEN".to_string(),
            chat_id_env: "TELEGRAM_CHAT_ID".to_string(),
            alert_rate: 0.001,
            cooldown_secs: 3600,
            max_per_message: 10,
        }
    }
}

/// Resolved Telegram credentials.
#[derive(Debug)]
pub struct TelegramCredentials {
    pub bot_token: Secret<String>,
    pub chat_id: String,
}

impl NotifierConfig {
    /// Resolve the bot token and chat id from the environment.
    /// Returns `None` if the notifier is disabled or either value is missing.
    pub fn credentials(&self) -> Option<TelegramCredentials> {
        if !self.enabled {
            return None;
        }
        let bot_token = AppConfig::resolve_env(&self.bot_token_env).ok()?;
        let chat_id = AppConfig::resolve_env(&self.chat_id_env).ok()?;
        if bot_token.is_empty() || chat_id.is_empty() {
            return None;
        }
        Some(TelegramCredentials {
            bot_token: Secret::new(bot_token),
            chat_id,
        })
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Apply `FETCH_INTERVAL` and `MIN_SPREAD` overrides from the environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(raw) = std::env::var("FETCH_INTERVAL") {
            self.monitor.fetch_interval_secs = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid FETCH_INTERVAL: {raw}"))?;
        }
        if let Ok(raw) = std::env::var("MIN_SPREAD") {
            self.monitor.min_spread = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid MIN_SPREAD: {raw}"))?;
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
