use async_trait::async_trait;

use crate::error::{ConnectError, FetchError, PublishError};
use crate::quote::Quote;

/// Raw bid/ask pair fetched from the terminal for one instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub bid: f64,
    pub ask: f64,
}

/// The price-quoting terminal the bridge polls.
///
/// `connect` establishes a session and decides which configured instruments
/// the source can actually serve; `watched_instruments` returns that subset.
/// Implementations track their own liveness: a transport-level failure inside
/// `latest_tick` must flip `is_alive` to false so the polling loop can stop
/// iterating and reconnect.
#[async_trait]
pub trait Terminal: Send + Sync {
    async fn connect(&mut self) -> Result<(), ConnectError>;

    /// Tear the session down. Best effort, used on shutdown.
    async fn disconnect(&mut self);

    fn is_alive(&self) -> bool;

    /// Instruments that survived the availability probe at connect time.
    fn watched_instruments(&self) -> Vec<String>;

    /// Latest tick for one instrument. `Ok(None)` means the source has no
    /// tick to offer right now, which is not an error.
    async fn latest_tick(&mut self, instrument: &str) -> Result<Option<Tick>, FetchError>;
}

/// The dual-channel destination quotes are republished to: a fan-out
/// notification channel and a keyed latest-value store.
///
/// The two writes are independent; implementations classify failures so the
/// loop can tell a dead connection (`is_connection_loss`) from a per-quote
/// rejection it should log and move past.
#[async_trait]
pub trait QuoteSink: Send + Sync {
    async fn connect(&mut self) -> Result<(), ConnectError>;

    /// Tear the session down. Best effort, used on shutdown.
    async fn disconnect(&mut self);

    fn is_alive(&self) -> bool;

    /// Fan the quote out to live subscribers.
    async fn publish_notification(&mut self, quote: &Quote) -> Result<(), PublishError>;

    /// Overwrite the keyed latest value for the quote's symbol.
    async fn write_latest(&mut self, quote: &Quote) -> Result<(), PublishError>;
}
