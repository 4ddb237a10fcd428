//! Telegram alerts for high funding rates.
//!
//! An opportunity is alerted when its rate is at least `alert_rate` and the
//! same instrument/source pair has not been alerted within the cooldown.
//! All new alerts of a cycle go out as one HTML message, sent from a
//! spawned task so a slow or failing Telegram API never delays the loop.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use super::Notifier;
use crate::config::{NotifierConfig, TelegramCredentials};
use crate::types::Opportunity;

const API_BASE: &str = "https://api.telegram.org";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

type AlertKey = (String, String);

pub struct TelegramNotifier {
    http: Client,
    credentials: TelegramCredentials,
    alert_rate: f64,
    cooldown: Duration,
    max_per_message: usize,
    last_alerted: Mutex<HashMap<AlertKey, Instant>>,
}

impl TelegramNotifier {
    pub fn new(credentials: TelegramCredentials, cfg: &NotifierConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .context("Failed to build HTTP client for Telegram")?;

        Ok(Self {
            http,
            credentials,
            alert_rate: cfg.alert_rate,
            cooldown: cfg.cooldown(),
            max_per_message: cfg.max_per_message.max(1),
            last_alerted: Mutex::new(HashMap::new()),
        })
    }

    /// Pick the opportunities worth alerting at `now` and mark them sent.
    ///
    /// Input order is kept, so the highest rates go first.
    fn select_alerts(&self, opportunities: &[Opportunity], now: Instant) -> Vec<Opportunity> {
        let mut last = self
            .last_alerted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        last.retain(|_, at| now.saturating_duration_since(*at) < self.cooldown);

        let mut alerts = Vec::new();
        for opp in opportunities {
            if alerts.len() >= self.max_per_message {
                break;
            }
            if opp.rate < self.alert_rate {
                continue;
            }
            let key = (opp.instrument.clone(), opp.source.clone());
            if last.contains_key(&key) {
                continue;
            }
            last.insert(key, now);
            alerts.push(opp.clone());
        }

        alerts
    }

    /// Render alerts as a Telegram HTML message.
    fn format_message(alerts: &[Opportunity]) -> String {
        let mut text = String::from("📈 <b>High Funding Rates</b>\n");
        for (i, o) in alerts.iter().enumerate() {
            text.push_str(&format!(
                "\n{}. <b>{}</b> on {}\nRate: <code>{:.4}%</code> | APR: <code>{:.1}%</code> | Price: <code>{}</code>",
                i + 1,
                escape_html(&o.instrument),
                escape_html(&o.source),
                o.rate * 100.0,
                o.annualized_rate * 100.0,
                escape_html(&o.price_display),
            ));
        }
        text
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, opportunities: &[Opportunity]) {
        let alerts = self.select_alerts(opportunities, Instant::now());
        if alerts.is_empty() {
            debug!("No new funding alerts this cycle");
            return;
        }

        let text = Self::format_message(&alerts);
        let url = format!(
            "{API_BASE}/bot{}/sendMessage",
            self.credentials.bot_token.expose_secret()
        );
        let chat_id = self.credentials.chat_id.clone();
        let http = self.http.clone();
        let count = alerts.len();

        tokio::spawn(async move {
            let msg = SendMessage {
                chat_id: &chat_id,
                text: &text,
                parse_mode: "HTML",
                disable_web_page_preview: true,
            };
            match http.post(&url).json(&msg).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!(alerts = count, "Telegram alert sent");
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    error!(%status, body = %body, "Telegram send failed");
                }
                Err(e) => {
                    // reqwest errors can embed the URL, which carries the token.
                    error!(error = %e.without_url(), "Telegram request failed");
                }
            }
        });
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
