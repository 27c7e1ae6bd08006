use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{ConnectError, FetchError};
use crate::traits::{Terminal, Tick};

#[derive(Default)]
struct Inner {
    known: HashSet<String>,
    watched: Vec<String>,
    ticks: HashMap<String, VecDeque<Tick>>,
    fetched: Vec<String>,
    fail_connects: usize,
    lost: bool,
}

/// Scriptable in-memory `Terminal` for tests.
///
/// Clones share state, so a test can keep one handle for scripting while the
/// publisher owns another.
#[derive(Clone)]
pub struct MemoryTerminal {
    configured: Vec<String>,
    inner: Arc<Mutex<Inner>>,
    alive: Arc<AtomicBool>,
    connect_calls: Arc<AtomicUsize>,
    disconnect_calls: Arc<AtomicUsize>,
}

impl MemoryTerminal {
    /// All configured instruments start out known to the fake source.
    pub fn new(instruments: Vec<String>) -> Self {
        let inner = Inner {
            known: instruments.iter().cloned().collect(),
            ..Inner::default()
        };
        Self {
            configured: instruments,
            inner: Arc::new(Mutex::new(inner)),
            alive: Arc::new(AtomicBool::new(false)),
            connect_calls: Arc::new(AtomicUsize::new(0)),
            disconnect_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Make the source forget an instrument, as if the broker never listed it.
    pub fn forget(&self, instrument: &str) {
        self.lock().known.remove(instrument);
    }

    /// Queue a tick to be served by `latest_tick` for this instrument.
    pub fn push_tick(&self, instrument: &str, bid: f64, ask: f64) {
        self.lock()
            .ticks
            .entry(instrument.to_string())
            .or_default()
            .push_back(Tick { bid, ask });
    }

    /// Fail the next `n` connect attempts.
    pub fn fail_next_connects(&self, n: usize) {
        self.lock().fail_connects = n;
    }

    /// Simulate a transport drop, reported on the next fetch.
    pub fn drop_connection(&self) {
        self.lock().lost = true;
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    /// Instruments fetched so far, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.lock().fetched.clone()
    }
}

#[async_trait]
impl Terminal for MemoryTerminal {
    async fn connect(&mut self) -> Result<(), ConnectError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.lock();

        if inner.fail_connects > 0 {
            inner.fail_connects -= 1;
            return Err(ConnectError::Unreachable("scripted connect failure".into()));
        }

        let watched: Vec<String> = self
            .configured
            .iter()
            .filter(|i| inner.known.contains(*i))
            .cloned()
            .collect();
        if watched.is_empty() {
            return Err(ConnectError::NoInstruments);
        }

        inner.watched = watched;
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

    fn watched_instruments(&self) -> Vec<String> {
        self.lock().watched.clone()
    }

    async fn latest_tick(&mut self, instrument: &str) -> Result<Option<Tick>, FetchError> {
        let mut inner = self.lock();
        if inner.lost {
            drop(inner);
            self.alive.store(false, Ordering::SeqCst);
            return Err(FetchError::ConnectionLost("scripted connection drop".into()));
        }

        inner.fetched.push(instrument.to_string());
        Ok(inner
            .ticks
            .get_mut(instrument)
            .and_then(VecDeque::pop_front))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ticks_are_served_in_push_order() {
        let mut terminal = MemoryTerminal::new(vec!["EURUSD".into()]);
        terminal.connect().await.unwrap();
        terminal.push_tick("EURUSD", 1.0850, 1.0852);
        terminal.push_tick("EURUSD", 1.0851, 1.0853);

        assert_eq!(
            terminal.latest_tick("EURUSD").await.unwrap().unwrap().bid,
            1.0850
        );
        assert_eq!(
            terminal.latest_tick("EURUSD").await.unwrap().unwrap().bid,
            1.0851
        );
        assert_eq!(terminal.latest_tick("EURUSD").await.unwrap(), None);
    }

    #[tokio::test]
    async fn forgotten_instrument_drops_out_of_watch_list() {
        let mut terminal = MemoryTerminal::new(vec!["EURUSD".into(), "GBPUSD".into()]);
        terminal.forget("GBPUSD");
        terminal.connect().await.unwrap();

        assert_eq!(terminal.watched_instruments(), vec!["EURUSD"]);
    }

    #[tokio::test]
    async fn connect_fails_when_nothing_is_known() {
        let mut terminal = MemoryTerminal::new(vec!["EURUSD".into()]);
        terminal.forget("EURUSD");

        assert!(matches!(
            terminal.connect().await,
            Err(ConnectError::NoInstruments)
        ));
        assert!(!terminal.is_alive());
    }
}
