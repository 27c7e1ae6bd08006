//! The polling loop: fetch ticks from the terminal, republish to the sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::backoff::{ReconnectPolicy, INITIAL_RECONNECT_DELAY, MAX_RECONNECT_DELAY};
use crate::metrics::Metrics;
use crate::quote::Quote;
use crate::symbols::SymbolTable;
use crate::traits::{QuoteSink, Terminal};

/// Default pause between polling cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lifecycle of the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
    Stopping,
}

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub poll_interval: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            initial_backoff: INITIAL_RECONNECT_DELAY,
            max_backoff: MAX_RECONNECT_DELAY,
        }
    }
}

/// Drives the fetch/normalize/republish cycle over a `Terminal` and a
/// `QuoteSink` until told to stop.
///
/// Each connector carries its own backoff; one endpoint being down never
/// resets the other's delay ladder. A connection loss discovered mid-cycle
/// aborts the remaining instruments for that cycle, the next cycle's
/// liveness check handles the reconnect.
pub struct Publisher<T: Terminal, S: QuoteSink> {
    terminal: T,
    sink: S,
    symbols: SymbolTable,
    config: PublisherConfig,
    metrics: Arc<Metrics>,
    state: LoopState,
    terminal_backoff: ReconnectPolicy,
    sink_backoff: ReconnectPolicy,
    terminal_up: Arc<AtomicBool>,
    sink_up: Arc<AtomicBool>,
}

impl<T: Terminal, S: QuoteSink> Publisher<T, S> {
    pub fn new(
        terminal: T,
        sink: S,
        symbols: SymbolTable,
        config: PublisherConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        let terminal_up = Arc::new(AtomicBool::new(terminal.is_alive()));
        let sink_up = Arc::new(AtomicBool::new(sink.is_alive()));
        let terminal_backoff = ReconnectPolicy::new(config.initial_backoff, config.max_backoff);
        let sink_backoff = ReconnectPolicy::new(config.initial_backoff, config.max_backoff);

        Self {
            terminal,
            sink,
            symbols,
            config,
            metrics,
            state: LoopState::Stopped,
            terminal_backoff,
            sink_backoff,
            terminal_up,
            sink_up,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Handle to the terminal connectivity flag, for the health server.
    pub fn terminal_connected_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.terminal_up)
    }

    /// Handle to the sink connectivity flag, for the health server.
    pub fn sink_connected_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.sink_up)
    }

    /// Run until the shutdown channel flips to true. Connectors are usually
    /// connected before entry; if not, the first cycles bring them up like
    /// any other reconnect.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        self.state = LoopState::Running;
        info!(instruments = self.symbols.len(), "publisher running");

        'cycle: loop {
            if *shutdown.borrow() {
                break 'cycle;
            }

            if !self.terminal.is_alive() {
                if self.reconnect_terminal(&mut shutdown).await {
                    break 'cycle;
                }
                continue 'cycle;
            }

            if !self.sink.is_alive() {
                if self.reconnect_sink(&mut shutdown).await {
                    break 'cycle;
                }
                continue 'cycle;
            }

            let instruments = self.terminal.watched_instruments();
            for source in &instruments {
                if *shutdown.borrow() {
                    break 'cycle;
                }
                if !self.poll_instrument(source).await {
                    break;
                }
            }

            if pause(&mut shutdown, self.config.poll_interval).await {
                break 'cycle;
            }
        }

        self.state = LoopState::Stopping;
        info!("shutdown requested, draining connectors");
        self.terminal.disconnect().await;
        self.sink.disconnect().await;
        self.terminal_up.store(false, Ordering::SeqCst);
        self.sink_up.store(false, Ordering::SeqCst);
        self.state = LoopState::Stopped;
        info!("publisher stopped");
    }

    /// Try to bring the terminal back; on failure wait out the backoff
    /// delay. Returns true if shutdown was requested while waiting.
    async fn reconnect_terminal(&mut self, shutdown: &mut watch::Receiver<bool>) -> bool {
        self.terminal_up.store(false, Ordering::SeqCst);
        warn!("terminal down, reconnecting");

        match self.terminal.connect().await {
            Ok(()) => {
                self.terminal_backoff.reset();
                self.terminal_up.store(true, Ordering::SeqCst);
                self.metrics.reconnects.with_label_values(&["terminal"]).inc();
                info!(
                    watched = self.terminal.watched_instruments().len(),
                    "terminal reconnected"
                );
                false
            }
            Err(e) => {
                let delay = self.terminal_backoff.next_delay();
                error!(
                    error = %e,
                    retry_ms = delay.as_millis() as u64,
                    "terminal reconnect failed"
                );
                pause(shutdown, delay).await
            }
        }
    }

    /// Try to bring the sink back; on failure wait out the backoff delay.
    /// Returns true if shutdown was requested while waiting.
    async fn reconnect_sink(&mut self, shutdown: &mut watch::Receiver<bool>) -> bool {
        self.sink_up.store(false, Ordering::SeqCst);
        warn!("sink down, reconnecting");

        match self.sink.connect().await {
            Ok(()) => {
                self.sink_backoff.reset();
                self.sink_up.store(true, Ordering::SeqCst);
                self.metrics.reconnects.with_label_values(&["sink"]).inc();
                info!("sink reconnected");
                false
            }
            Err(e) => {
                let delay = self.sink_backoff.next_delay();
                error!(
                    error = %e,
                    retry_ms = delay.as_millis() as u64,
                    "sink reconnect failed"
                );
                pause(shutdown, delay).await
            }
        }
    }

    /// Fetch and forward one instrument. Returns false when a connection
    /// died and the rest of the cycle should be abandoned.
    async fn poll_instrument(&mut self, source: &str) -> bool {
        match self.terminal.latest_tick(source).await {
            Ok(Some(tick)) => {
                // Instruments outside the table are skipped without noise.
                let normalized = match self.symbols.normalize(source) {
                    Some(normalized) => normalized,
                    None => return true,
                };
                let quote = Quote::observed_now(normalized, tick.bid, tick.ask);
                self.forward(&quote).await
            }
            Ok(None) => {
                self.metrics.fetch_misses.inc();
                true
            }
            Err(e) if e.is_connection_loss() => {
                error!(instrument = %source, error = %e, "terminal connection lost");
                self.terminal_up.store(false, Ordering::SeqCst);
                false
            }
            Err(e) => {
                warn!(instrument = %source, error = %e, "tick fetch failed");
                self.metrics.fetch_errors.inc();
                true
            }
        }
    }

    /// Write the quote to both sink channels. Per-quote rejections are logged
    /// and do not stop the cycle; a dead sink connection does.
    async fn forward(&mut self, quote: &Quote) -> bool {
        let mut complete = true;

        match self.sink.publish_notification(quote).await {
            Ok(()) => {}
            Err(e) if e.is_connection_loss() => {
                error!(symbol = %quote.symbol, error = %e, "sink connection lost");
                self.sink_up.store(false, Ordering::SeqCst);
                return false;
            }
            Err(e) => {
                warn!(symbol = %quote.symbol, error = %e, "notification publish failed");
                self.metrics.publish_errors.with_label_values(&["notify"]).inc();
                complete = false;
            }
        }

        match self.sink.write_latest(quote).await {
            Ok(()) => {}
            Err(e) if e.is_connection_loss() => {
                error!(symbol = %quote.symbol, error = %e, "sink connection lost");
                self.sink_up.store(false, Ordering::SeqCst);
                return false;
            }
            Err(e) => {
                warn!(symbol = %quote.symbol, error = %e, "latest-value write failed");
                self.metrics.publish_errors.with_label_values(&["latest"]).inc();
                complete = false;
            }
        }

        if complete {
            self.metrics
                .quotes_published
                .with_label_values(&[quote.symbol.as_str()])
                .inc();
            debug!(symbol = %quote.symbol, bid = quote.bid, ask = quote.ask, "quote published");
        }
        true
    }
}

/// Sleep for `delay`, waking early on shutdown. Returns true when shutdown
/// was requested (a closed channel counts, nobody can signal us anymore).
async fn pause(shutdown: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    select! {
        _ = sleep(delay) => false,
        changed = shutdown.changed() => match changed {
            Ok(()) => *shutdown.borrow(),
            Err(_) => true,
        },
    }
}
