use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{ConnectError, PublishError};
use crate::quote::Quote;
use crate::traits::QuoteSink;

#[derive(Default)]
struct Inner {
    notifications: Vec<Quote>,
    latest: HashMap<String, Quote>,
    ops: Vec<String>,
    fail_connects: usize,
    lost: bool,
    reject_notify: HashSet<String>,
    reject_latest: HashSet<String>,
}

/// Recording in-memory `QuoteSink` for tests.
///
/// Clones share state. `ops` keeps the interleaving of both write kinds so
/// tests can assert the notification lands before the latest-value write.
#[derive(Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<Inner>>,
    alive: Arc<AtomicBool>,
    connect_calls: Arc<AtomicUsize>,
    disconnect_calls: Arc<AtomicUsize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Fail the next `n` connect attempts.
    pub fn fail_next_connects(&self, n: usize) {
        self.lock().fail_connects = n;
    }

    /// Simulate a transport drop, reported on the next write.
    pub fn drop_connection(&self) {
        self.lock().lost = true;
    }

    /// Reject the next notification publish for this symbol, once.
    pub fn reject_next_notification(&self, symbol: &str) {
        self.lock().reject_notify.insert(symbol.to_string());
    }

    /// Reject the next latest-value write for this symbol, once.
    pub fn reject_next_latest(&self, symbol: &str) {
        self.lock().reject_latest.insert(symbol.to_string());
    }

    pub fn notifications(&self) -> Vec<Quote> {
        self.lock().notifications.clone()
    }

    pub fn latest(&self, symbol: &str) -> Option<Quote> {
        self.lock().latest.get(symbol).cloned()
    }

    pub fn latest_len(&self) -> usize {
        self.lock().latest.len()
    }

    /// Write operations in order, e.g. `"notify EURUSD"`, `"latest EURUSD"`.
    pub fn ops(&self) -> Vec<String> {
        self.lock().ops.clone()
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    fn check_transport(&self, inner: &mut Inner) -> Result<(), PublishError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(PublishError::NotConnected);
        }
        if inner.lost {
            self.alive.store(false, Ordering::SeqCst);
            return Err(PublishError::ConnectionLost("scripted connection drop".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl QuoteSink for MemorySink {
    async fn connect(&mut self) -> Result<(), ConnectError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.lock();

        if inner.fail_connects > 0 {
            inner.fail_connects -= 1;
            return Err(ConnectError::Unreachable("scripted connect failure".into()));
        }

        inner.lost = false;
        drop(inner);
        self.alive.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.alive.store(false, Ordering::SeqCst);
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn publish_notification(&mut self, quote: &Quote) -> Result<(), PublishError> {
        let mut inner = self.lock();
        self.check_transport(&mut inner)?;

        if inner.reject_notify.remove(&quote.symbol) {
            return Err(PublishError::Rejected("scripted rejection".into()));
        }

        inner.ops.push(format!("notify {}", quote.symbol));
        inner.notifications.push(quote.clone());
        Ok(())
    }

    async fn write_latest(&mut self, quote: &Quote) -> Result<(), PublishError> {
        let mut inner = self.lock();
        self.check_transport(&mut inner)?;

        if inner.reject_latest.remove(&quote.symbol) {
            return Err(PublishError::Rejected("scripted rejection".into()));
        }

        inner.ops.push(format!("latest {}", quote.symbol));
        inner.latest.insert(quote.symbol.clone(), quote.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_latest_is_idempotent() {
        let mut sink = MemorySink::new();
        sink.connect().await.unwrap();

        let quote = Quote::new("EURUSD", 1.0850, 1.0852, 1_700_000_000_000);
        sink.write_latest(&quote).await.unwrap();
        sink.write_latest(&quote).await.unwrap();

        assert_eq!(sink.latest_len(), 1);
        assert_eq!(sink.latest("EURUSD"), Some(quote));
        assert!(sink.notifications().is_empty());
    }

    #[tokio::test]
    async fn newer_quote_overwrites_latest() {
        let mut sink = MemorySink::new();
        sink.connect().await.unwrap();

        sink.write_latest(&Quote::new("EURUSD", 1.0850, 1.0852, 1)).await.unwrap();
        sink.write_latest(&Quote::new("EURUSD", 1.0851, 1.0853, 2)).await.unwrap();

        assert_eq!(sink.latest_len(), 1);
        assert_eq!(sink.latest("EURUSD").unwrap().bid, 1.0851);
    }

    #[tokio::test]
    async fn scripted_rejection_fires_once() {
        let mut sink = MemorySink::new();
        sink.connect().await.unwrap();
        sink.reject_next_notification("EURUSD");

        let quote = Quote::new("EURUSD", 1.0850, 1.0852, 1);
        assert!(sink.publish_notification(&quote).await.is_err());
        assert!(sink.publish_notification(&quote).await.is_ok());
        assert_eq!(sink.notifications().len(), 1);
    }
}
