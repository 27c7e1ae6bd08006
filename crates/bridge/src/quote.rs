use serde::Serialize;

/// A normalized quote observed by the bridge.
///
/// `observed_at` is stamped by the bridge when the tick is assembled into a
/// quote (epoch milliseconds), not taken from the terminal clock.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
    pub observed_at: i64,
}

/// Pub/sub payload: `{"symbol", "bid", "ask", "timestamp"}`.
#[derive(Serialize)]
struct NotificationPayload<'a> {
    symbol: &'a str,
    bid: f64,
    ask: f64,
    timestamp: i64,
}

/// Latest-value hash payload. Carries bid and ask only; the field name in the
/// hash already supplies the symbol, and readers that need freshness subscribe
/// to the notification channel instead.
#[derive(Serialize)]
struct LatestPayload {
    bid: f64,
    ask: f64,
}

impl Quote {
    pub fn new(symbol: impl Into<String>, bid: f64, ask: f64, observed_at: i64) -> Self {
        Self {
            symbol: symbol.into(),
            bid,
            ask,
            observed_at,
        }
    }

    /// Build a quote stamped with the current wall clock.
    pub fn observed_now(symbol: impl Into<String>, bid: f64, ask: f64) -> Self {
        Self::new(symbol, bid, ask, chrono::Utc::now().timestamp_millis())
    }

    /// JSON body published on the notification channel.
    pub fn notification_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&NotificationPayload {
            symbol: &self.symbol,
            bid: self.bid,
            ask: self.ask,
            timestamp: self.observed_at,
        })
    }

    /// JSON body written as the latest-value hash field.
    pub fn latest_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&LatestPayload {
            bid: self.bid,
            ask: self.ask,
        })
    }
}
