//! Completed-bar feed
//!
//! Polls a public kline REST endpoint (Binance array format, no API key
//! required) and yields only bars whose period has closed. No aggregation
//! happens here; the endpoint returns completed OHLC rows and the feed
//! merely deduplicates them.

use anyhow::{Context, Result};
use chrono::DateTime;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::types::Bar;

/// Base URL for the kline API
const API_BASE: &str = "https://api.binance.com/api/v3";

/// Polling feed for one symbol and timeframe.
#[derive(Debug, Clone)]
pub struct KlineFeed {
    client: Client,
    symbol: String,
    interval: String,
    tick_size: f64,
    last_open_time: Option<i64>,
}

impl KlineFeed {
    pub fn new(symbol: impl Into<String>, interval: impl Into<String>, tick_size: f64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        KlineFeed {
            client,
            symbol: symbol.into(),
            interval: interval.into(),
            tick_size,
            last_open_time: None,
        }
    }

    /// Fetch the most recent completed bar, or `None` when it was already
    /// delivered. The final kline row is the still-forming period and is
    /// never returned.
    pub async fn poll_completed(&mut self) -> Result<Option<Bar>> {
        let url = format!("{}/klines", API_BASE);
        let params = [
            ("symbol", self.symbol.as_str()),
            ("interval", self.interval.as_str()),
            ("limit", "2"),
        ];

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .context("Failed to send kline request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Kline API error {}: {}", status, body);
        }

        let raw: Vec<Vec<serde_json::Value>> = response
            .json()
            .await
            .context("Failed to parse kline response")?;

        if raw.len() < 2 {
            return Ok(None);
        }

        let row = &raw[raw.len() - 2];
        let Some((open_time, bar)) = bar_from_raw(row, self.tick_size) else {
            anyhow::bail!("Malformed kline row: {:?}", row);
        };

        if self.last_open_time == Some(open_time) {
            return Ok(None);
        }
        self.last_open_time = Some(open_time);

        debug!(
            symbol = %self.symbol,
            time = %bar.timestamp,
            close = bar.close,
            "completed bar"
        );
        Ok(Some(bar))
    }
}

/// Parse one kline array row:
/// `[open_time, open, high, low, close, volume, close_time, ...]`.
/// The bar timestamp is the period end.
fn bar_from_raw(row: &[serde_json::Value], tick_size: f64) -> Option<(i64, Bar)> {
    fn price(value: &serde_json::Value) -> Option<f64> {
        value.as_str()?.parse().ok()
    }

    let open_time = row.first()?.as_i64()?;
    let close_time = row.get(6)?.as_i64()?;
    let bar = Bar {
        // close_time is the last millisecond of the period
        timestamp: DateTime::from_timestamp_millis(close_time + 1)?,
        open: price(row.get(1)?)?,
        high: price(row.get(2)?)?,
        low: price(row.get(3)?)?,
        close: price(row.get(4)?)?,
        tick_size,
    };
    Some((open_time, bar))
}
