// =============================================================================
// Alerts — Telegram + webhook notifier sink
// =============================================================================
//
// The notifier consumes fully-formed signal and snapshot messages. Deliveries
// are best-effort: every failure is logged and swallowed, nothing propagates
// back into the pipeline, and no pipeline state is ever touched from here.

use std::time::Duration;

use chrono::DateTime;
use serde::Serialize;
use tracing::{debug, warn};

use crate::runtime_config::AlertConfig;
use crate::types::{Snapshot, TfSignal};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Notifier {
    client: reqwest::Client,
    telegram_token: Option<String>,
    telegram_chat_id: Option<String>,
    webhook_url: Option<String>,
    enable_telegram: bool,
    enable_webhook: bool,
}

impl Notifier {
    pub fn from_config(cfg: &AlertConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            telegram_token: cfg.telegram_token.clone(),
            telegram_chat_id: cfg.telegram_chat_id.clone(),
            webhook_url: cfg.webhook_url.clone(),
            enable_telegram: cfg.enable_telegram,
            enable_webhook: cfg.enable_webhook,
        }
    }

    /// A notifier with every channel off (used when alerts are unconfigured).
    pub fn disabled() -> Self {
        Self::from_config(&AlertConfig {
            enable_telegram: false,
            ..AlertConfig::default()
        })
    }

    /// Whether any delivery channel is actually usable.
    pub fn is_active(&self) -> bool {
        (self.enable_webhook && self.webhook_url.is_some())
            || (self.enable_telegram
                && self.telegram_token.is_some()
                && self.telegram_chat_id.is_some())
    }

    pub async fn send_signal(&self, signal: &TfSignal) {
        self.post_webhook(signal).await;
        self.send_telegram(&fmt_signal_msg(signal)).await;
    }

    pub async fn send_snapshot(&self, snapshot: &Snapshot) {
        self.post_webhook(snapshot).await;
        self.send_telegram(&fmt_snapshot_msg(snapshot)).await;
    }

    async fn post_webhook<T: Serialize>(&self, payload: &T) {
        if !self.enable_webhook {
            return;
        }
        let Some(url) = &self.webhook_url else {
            return;
        };
        let result = self
            .client
            .post(url)
            .timeout(REQUEST_TIMEOUT)
            .json(payload)
            .send()
            .await;
        match result {
            Ok(resp) if !resp.status().is_success() => {
                warn!(status = %resp.status(), "webhook rejected payload");
            }
            Ok(_) => debug!("webhook delivered"),
            Err(e) => warn!(error = %e, "webhook delivery failed"),
        }
    }

    async fn send_telegram(&self, text: &str) {
        if !self.enable_telegram {
            return;
        }
        let (Some(token), Some(chat_id)) = (&self.telegram_token, &self.telegram_chat_id) else {
            return;
        };
        let url = format!("https://api.telegram.org/bot{token}/sendMessage");
        let result = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .form(&[("chat_id", chat_id.as_str()), ("text", text)])
            .send()
            .await;
        match result {
            Ok(resp) if !resp.status().is_success() => {
                warn!(status = %resp.status(), "telegram rejected message");
            }
            Ok(_) => debug!("telegram delivered"),
            Err(e) => warn!(error = %e, "telegram delivery failed"),
        }
    }
}

/// Human-readable rendering of a per-timeframe signal.
pub fn fmt_signal_msg(s: &TfSignal) -> String {
    let sup = s
        .sr
        .nearest_support
        .map(|(lo, hi)| format!("{lo:.2}-{hi:.2}"))
        .unwrap_or_else(|| "None".to_string());
    let res = s
        .sr
        .nearest_resistance
        .map(|(lo, hi)| format!("{lo:.2}-{hi:.2}"))
        .unwrap_or_else(|| "None".to_string());
    let ind = &s.indicators;
    format!(
        "[{}] {} • {} • Score {}\n\
         Regime: {} | Close: {:.2} | {}\n\
         S/R: S {} | R {}\n\
         RSI {:.1} • ADX {:.1} • ATR {:.2}\n\
         Entry {:.2} | SL {:.2} | TP {:.2}\n\
         Why: {}",
        s.symbol,
        s.timeframe,
        s.signal,
        s.score,
        s.regime,
        s.price,
        fmt_utc(s.closed_at),
        sup,
        res,
        ind.rsi.unwrap_or(0.0),
        ind.adx.unwrap_or(0.0),
        ind.atr.unwrap_or(0.0),
        s.entry_hint,
        s.sl_hint,
        s.tp_hint,
        s.rationale
            .iter()
            .take(4)
            .cloned()
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// One-line-per-timeframe rendering of a consensus snapshot.
pub fn fmt_snapshot_msg(snap: &Snapshot) -> String {
    let mut lines = vec![format!("[{}] Snapshot {}", snap.symbol, fmt_utc(snap.closed_at))];
    for (tf, sig) in &snap.per_tf {
        lines.push(format!("{}: {} ({}) {}", tf, sig.signal, sig.score, sig.regime));
    }
    lines.push(format!("Consensus: {}", snap.consensus));
    lines.join("\n")
}

fn fmt_utc(epoch_ms: i64) -> String {
    DateTime::from_timestamp_millis(epoch_ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| format!("{epoch_ms}ms"))
}
