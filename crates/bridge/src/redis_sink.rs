//! Redis sink: pub/sub notifications plus a latest-value hash.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ConnectError, PublishError};
use crate::quote::Quote;
use crate::traits::QuoteSink;

/// Channel live subscribers listen on.
pub const NOTIFICATION_CHANNEL: &str = "fx_price_updates";
/// Hash late joiners read the most recent quote per symbol from.
pub const LATEST_HASH_KEY: &str = "fx_latest_prices";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// `QuoteSink` backed by a Redis multiplexed connection.
///
/// The connection handle doubles as the liveness flag: any error that looks
/// like a dead transport drops the handle, so `is_alive` reports false and
/// the polling loop reconnects with backoff.
pub struct RedisSink {
    url: String,
    conn: Option<redis::aio::MultiplexedConnection>,
}

impl RedisSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            conn: None,
        }
    }

    fn classify(&mut self, err: redis::RedisError) -> PublishError {
        if is_connection_loss(&err) {
            self.conn = None;
            PublishError::ConnectionLost(err.to_string())
        } else {
            PublishError::Rejected(err.to_string())
        }
    }
}

fn is_connection_loss(err: &redis::RedisError) -> bool {
    err.is_io_error()
        || err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_timeout()
}

#[async_trait]
impl QuoteSink for RedisSink {
    async fn connect(&mut self) -> Result<(), ConnectError> {
        let client = redis::Client::open(self.url.as_str())
            .map_err(|e| ConnectError::Unreachable(e.to_string()))?;

        let mut conn = tokio::time::timeout(
            CONNECT_TIMEOUT,
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| {
            ConnectError::Unreachable(format!(
                "connect timed out after {}s",
                CONNECT_TIMEOUT.as_secs()
            ))
        })?
        .map_err(|e| ConnectError::Unreachable(e.to_string()))?;

        // Round-trip before declaring the session usable.
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| ConnectError::Unhealthy(e.to_string()))?;

        info!("connected to Redis");
        self.conn = Some(conn);
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.conn = None;
    }

    fn is_alive(&self) -> bool {
        self.conn.is_some()
    }

    async fn publish_notification(&mut self, quote: &Quote) -> Result<(), PublishError> {
        let payload = quote.notification_json()?;
        let mut conn = self.conn.clone().ok_or(PublishError::NotConnected)?;

        conn.publish::<_, _, ()>(NOTIFICATION_CHANNEL, &payload)
            .await
            .map_err(|e| self.classify(e))?;

        debug!(symbol = %quote.symbol, channel = NOTIFICATION_CHANNEL, "PUBLISH");
        Ok(())
    }

    async fn write_latest(&mut self, quote: &Quote) -> Result<(), PublishError> {
        let payload = quote.latest_json()?;
        let mut conn = self.conn.clone().ok_or(PublishError::NotConnected)?;

        conn.hset::<_, _, _, ()>(LATEST_HASH_KEY, &quote.symbol, &payload)
            .await
            .map_err(|e| self.classify(e))?;

        debug!(symbol = %quote.symbol, key = LATEST_HASH_KEY, "HSET");
        Ok(())
    }
}
