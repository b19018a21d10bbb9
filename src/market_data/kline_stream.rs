// =============================================================================
// Binance kline WebSocket feed — decoded 1-minute bar source
// =============================================================================
//
// Subscribes to the combined kline_1m stream for every configured symbol and
// forwards decoded bars into the pipeline channel. Reconnects forever with
// exponential backoff (1s doubling, capped at 30s); the backoff resets after
// a successful connect. Returns only once the pipeline side has gone away.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::market_data::Bar;
use crate::types::Timeframe;

const BACKOFF_START_SECS: u64 = 1;
const BACKOFF_CAP_SECS: u64 = 30;

/// Build the combined-stream URL for all symbols at the 1m interval.
///
/// Perpetual markets live on a different host than spot.
pub fn stream_url(market_type: &str, symbols: &[String]) -> String {
    let base = match market_type.to_lowercase().as_str() {
        "usdt_perp" | "coin_perp" => "wss://fstream.binance.com/stream",
        _ => "wss://stream.binance.com:9443/stream",
    };
    let streams: Vec<String> = symbols
        .iter()
        .map(|s| format!("{}@kline_1m", s.to_lowercase()))
        .collect();
    format!("{base}?streams={}", streams.join("/"))
}

/// Parse one kline frame into a 1-minute [`Bar`].
///
/// Accepts both the combined-stream envelope (`{"stream":..,"data":{..}}`)
/// and a direct single-stream payload. Non-kline events return an error and
/// are skipped by the caller.
pub fn parse_kline_event(text: &str) -> Result<Bar> {
    let root: serde_json::Value =
        serde_json::from_str(text).context("failed to parse kline JSON")?;

    let data = if root.get("data").is_some() {
        &root["data"]
    } else {
        &root
    };

    if data.get("e").and_then(|v| v.as_str()) != Some("kline") {
        anyhow::bail!("not a kline event");
    }

    let symbol = data["s"]
        .as_str()
        .context("missing field s")?
        .to_uppercase();

    let k = &data["k"];
    let t_open = k["t"].as_i64().context("missing field k.t")?;
    let t_close = k["T"].as_i64().context("missing field k.T")?;
    let closed = k["x"].as_bool().context("missing field k.x")?;

    Ok(Bar {
        symbol,
        timeframe: Timeframe::M1,
        t_open,
        // Binance closes klines at window_end - 1ms; normalize to the
        // exclusive window end so t_close - t_open = 60_000.
        t_close: if t_close == t_open + 59_999 {
            t_open + 60_000
        } else {
            t_close
        },
        open: parse_string_f64(&k["o"], "k.o")?,
        high: parse_string_f64(&k["h"], "k.h")?,
        low: parse_string_f64(&k["l"], "k.l")?,
        close: parse_string_f64(&k["c"], "k.c")?,
        volume: parse_string_f64(&k["v"], "k.v")?,
        closed,
    })
}

/// Binance sends numeric values as JSON strings inside kline objects.
fn parse_string_f64(val: &serde_json::Value, name: &str) -> Result<f64> {
    match val {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("failed to parse {name} as f64: {s}")),
        serde_json::Value::Number(n) => n
            .as_f64()
            .with_context(|| format!("field {name} is not a valid f64")),
        _ => anyhow::bail!("field {name} has unexpected JSON type"),
    }
}

/// Run the feed until the receiving side of `tx` is dropped.
pub async fn run_kline_stream(symbols: Vec<String>, market_type: String, tx: mpsc::Sender<Bar>) {
    let url = stream_url(&market_type, &symbols);
    let mut backoff = BACKOFF_START_SECS;

    loop {
        info!(url = %url, "connecting to kline WebSocket");
        match connect_async(&url).await {
            Ok((ws_stream, _response)) => {
                info!(symbols = symbols.len(), "kline WebSocket connected");
                backoff = BACKOFF_START_SECS;
                let (_write, mut read) = ws_stream.split();

                while let Some(msg) = read.next().await {
                    match msg {
                        Ok(Message::Text(text)) => match parse_kline_event(&text) {
                            Ok(bar) => {
                                debug!(
                                    symbol = %bar.symbol,
                                    close = bar.close,
                                    closed = bar.closed,
                                    "kline update"
                                );
                                if tx.send(bar).await.is_err() {
                                    info!("pipeline gone — stopping kline stream");
                                    return;
                                }
                            }
                            Err(e) => {
                                debug!(error = %e, "skipping non-bar frame");
                            }
                        },
                        // tungstenite answers pings automatically.
                        Ok(_) => {}
                        Err(e) => {
                            error!(error = %e, "kline WebSocket read error");
                            break;
                        }
                    }
                }
                warn!("kline WebSocket stream ended — reconnecting");
            }
            Err(e) => {
                error!(error = %e, backoff_secs = backoff, "kline WebSocket connect failed");
            }
        }

        if tx.is_closed() {
            return;
        }
        tokio::time::sleep(tokio::time::Duration::from_secs(backoff)).await;
        backoff = (backoff * 2).min(BACKOFF_CAP_SECS);
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_spot_vs_perp() {
        let syms = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];
        let spot = stream_url("spot", &syms);
        assert!(spot.starts_with("wss://stream.binance.com:9443/stream?streams="));
        assert!(spot.contains("btcusdt@kline_1m/ethusdt@kline_1m"));

        let perp = stream_url("usdt_perp", &syms);
        assert!(perp.starts_with("wss://fstream.binance.com/stream?streams="));
    }

    #[test]
    fn parse_combined_stream_envelope() {
        let json = r#"{
            "stream": "btcusdt@kline_1m",
            "data": {
                "e": "kline",
                "s": "BTCUSDT",
                "k": {
                    "t": 1700000000000,
                    "T": 1700000059999,
                    "i": "1m",
                    "o": "37000.00",
                    "h": "37050.00",
                    "l": "36990.00",
                    "c": "37020.00",
                    "v": "123.456",
                    "x": true
                }
            }
        }"#;
        let bar = parse_kline_event(json).expect("should parse");
        assert_eq!(bar.symbol, "BTCUSDT");
        assert_eq!(bar.timeframe, Timeframe::M1);
        assert_eq!(bar.t_open, 1_700_000_000_000);
        assert_eq!(bar.t_close - bar.t_open, 60_000);
        assert!((bar.close - 37_020.0).abs() < f64::EPSILON);
        assert!(bar.closed);
    }

    #[test]
    fn parse_direct_payload() {
        let json = r#"{
            "e": "kline",
            "s": "ethusdt",
            "k": {
                "t": 0, "T": 59999, "i": "1m",
                "o": "1.0", "h": "2.0", "l": "0.5", "c": "1.5",
                "v": "9.0", "x": false
            }
        }"#;
        let bar = parse_kline_event(json).expect("should parse");
        assert_eq!(bar.symbol, "ETHUSDT");
        assert!(!bar.closed);
        assert_eq!(bar.t_close, 60_000);
    }

    #[test]
    fn rejects_non_kline_events() {
        assert!(parse_kline_event(r#"{"e":"aggTrade","s":"BTCUSDT"}"#).is_err());
        assert!(parse_kline_event("not json").is_err());
    }
}
