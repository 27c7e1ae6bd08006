//! HTTP client for the MT5 terminal gateway.
//!
//! The terminal itself is a desktop application; a small gateway in front of
//! it exposes health, symbol and tick endpoints over HTTP. This client drives
//! that API and is the bridge's `Terminal` implementation.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ConnectError, FetchError};
use crate::mt5::messages::{HealthResponse, SymbolInfo, TickResponse};
use crate::traits::{Terminal, Tick};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Terminal connector backed by the MT5 HTTP gateway.
pub struct Mt5Gateway {
    http: Client,
    base_url: String,
    configured: Vec<String>,
    watched: Vec<String>,
    alive: bool,
}

impl Mt5Gateway {
    /// `instruments` are source-side identifiers; the subset the gateway
    /// can serve is decided at `connect`.
    pub fn new(base_url: &str, instruments: Vec<String>) -> Self {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            configured: instruments,
            watched: Vec::new(),
            alive: false,
        }
    }

    async fn check_health(&self) -> Result<(), ConnectError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ConnectError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ConnectError::Unhealthy(format!(
                "health endpoint returned {}",
                response.status()
            )));
        }

        let health: HealthResponse = response
            .json()
            .await
            .map_err(|e| ConnectError::Unhealthy(e.to_string()))?;

        if !health.mt5_connected {
            return Err(ConnectError::Unhealthy(format!(
                "gateway is up but the terminal is not connected (status: {})",
                health.status
            )));
        }

        debug!(
            status = %health.status,
            version = health.mt5_version.as_deref().unwrap_or("unknown"),
            "terminal gateway healthy"
        );
        Ok(())
    }

    /// Probe one configured instrument. `Ok(true)` means the gateway serves
    /// it (selecting it into the terminal's watch list if needed); `Ok(false)`
    /// means it is unknown or could not be enabled and gets excluded.
    async fn probe_instrument(&self, instrument: &str) -> Result<bool, ConnectError> {
        let url = format!(
            "{}/api/v1/symbols/{}",
            self.base_url,
            urlencoding::encode(instrument)
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ConnectError::Unreachable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            warn!(instrument = %instrument, "instrument unknown at the terminal, excluding");
            return Ok(false);
        }
        if !response.status().is_success() {
            warn!(
                instrument = %instrument,
                status = response.status().as_u16(),
                "instrument probe failed, excluding"
            );
            return Ok(false);
        }

        let info: SymbolInfo = match response.json().await {
            Ok(info) => info,
            Err(e) => {
                warn!(instrument = %instrument, error = %e, "unparseable symbol info, excluding");
                return Ok(false);
            }
        };

        if info.visible {
            return Ok(true);
        }

        // Not in the terminal's Market Watch yet; ask the gateway to select it.
        let url = format!(
            "{}/api/v1/symbols/{}/select",
            self.base_url,
            urlencoding::encode(instrument)
        );
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|e| ConnectError::Unreachable(e.to_string()))?;

        if response.status().is_success() {
            debug!(instrument = %info.name, "instrument selected into Market Watch");
            Ok(true)
        } else {
            warn!(
                instrument = %instrument,
                status = response.status().as_u16(),
                "instrument could not be selected, excluding"
            );
            Ok(false)
        }
    }
}

#[async_trait]
impl Terminal for Mt5Gateway {
    /// Health-check the gateway, then probe every configured instrument. The
    /// watch list is rebuilt from scratch on every connect, so instruments
    /// that appeared or vanished at the broker are picked up on reconnect.
    async fn connect(&mut self) -> Result<(), ConnectError> {
        self.alive = false;
        self.check_health().await?;

        let mut watched = Vec::new();
        for instrument in &self.configured {
            if self.probe_instrument(instrument).await? {
                watched.push(instrument.clone());
            }
        }

        if watched.is_empty() {
            return Err(ConnectError::NoInstruments);
        }

        info!(
            watched = watched.len(),
            configured = self.configured.len(),
            "terminal connected"
        );
        self.watched = watched;
        self.alive = true;
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.alive = false;
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn watched_instruments(&self) -> Vec<String> {
        self.watched.clone()
    }

    /// Fetch the latest tick. Transport failures mark the session dead;
    /// gateway-level errors are per-instrument and leave the session alive.
    async fn latest_tick(&mut self, instrument: &str) -> Result<Option<Tick>, FetchError> {
        let url = format!(
            "{}/api/v1/ticks/{}",
            self.base_url,
            urlencoding::encode(instrument)
        );
        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                self.alive = false;
                return Err(FetchError::ConnectionLost(e.to_string()));
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::NO_CONTENT || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FetchError::Gateway {
                status: status.as_u16(),
                message,
            });
        }

        let tick: TickResponse = response.json().await.map_err(|e| FetchError::Gateway {
            status: status.as_u16(),
            message: e.to_string(),
        })?;

        Ok(Some(Tick {
            bid: tick.bid,
            ask: tick.ask,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn healthy_body() -> serde_json::Value {
        serde_json::json!({"status": "healthy", "mt5_connected": true, "mt5_version": "5.0.4560"})
    }

    async fn mount_health(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(healthy_body()))
            .mount(server)
            .await;
    }

    async fn mount_symbol(server: &MockServer, name: &str, visible: bool) {
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/symbols/{name}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"name": name, "visible": visible})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn connect_probes_and_watches_instruments() {
        let server = MockServer::start().await;
        mount_health(&server).await;
        mount_symbol(&server, "EURUSD", true).await;
        mount_symbol(&server, "GBPUSD", true).await;

        let mut gateway = Mt5Gateway::new(
            &server.uri(),
            vec!["EURUSD".to_string(), "GBPUSD".to_string()],
        );
        gateway.connect().await.unwrap();

        assert!(gateway.is_alive());
        assert_eq!(gateway.watched_instruments(), vec!["EURUSD", "GBPUSD"]);
    }

    #[tokio::test]
    async fn connect_fails_when_terminal_not_connected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"status": "degraded", "mt5_connected": false}),
            ))
            .mount(&server)
            .await;

        let mut gateway = Mt5Gateway::new(&server.uri(), vec!["EURUSD".to_string()]);
        let err = gateway.connect().await.unwrap_err();

        assert!(matches!(err, ConnectError::Unhealthy(_)), "{err}");
        assert!(!gateway.is_alive());
    }

    #[tokio::test]
    async fn connect_fails_when_gateway_unreachable() {
        // A pooled `MockServer::start()` keeps its listener alive after drop;
        // an exclusive builder-built server actually shuts down, which this
        // test depends on.
        let server = MockServer::builder().start().await;
        let url = server.uri();
        drop(server);

        let mut gateway = Mt5Gateway::new(&url, vec!["EURUSD".to_string()]);
        let err = gateway.connect().await.unwrap_err();

        assert!(matches!(err, ConnectError::Unreachable(_)), "{err}");
    }

    #[tokio::test]
    async fn unknown_instrument_is_excluded() {
        let server = MockServer::start().await;
        mount_health(&server).await;
        mount_symbol(&server, "EURUSD", true).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/symbols/BOGUS"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut gateway = Mt5Gateway::new(
            &server.uri(),
            vec!["EURUSD".to_string(), "BOGUS".to_string()],
        );
        gateway.connect().await.unwrap();

        assert_eq!(gateway.watched_instruments(), vec!["EURUSD"]);
    }

    #[tokio::test]
    async fn invisible_instrument_is_selected() {
        let server = MockServer::start().await;
        mount_health(&server).await;
        mount_symbol(&server, "CADJPY", false).await;
        Mock::given(method("POST"))
            .and(path("/api/v1/symbols/CADJPY/select"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let mut gateway = Mt5Gateway::new(&server.uri(), vec!["CADJPY".to_string()]);
        gateway.connect().await.unwrap();

        assert_eq!(gateway.watched_instruments(), vec!["CADJPY"]);
    }

    #[tokio::test]
    async fn failed_selection_excludes_instrument() {
        let server = MockServer::start().await;
        mount_health(&server).await;
        mount_symbol(&server, "CADJPY", false).await;
        Mock::given(method("POST"))
            .and(path("/api/v1/symbols/CADJPY/select"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut gateway = Mt5Gateway::new(&server.uri(), vec!["CADJPY".to_string()]);
        let err = gateway.connect().await.unwrap_err();

        assert!(matches!(err, ConnectError::NoInstruments), "{err}");
    }

    #[tokio::test]
    async fn latest_tick_returns_prices() {
        let server = MockServer::start().await;
        mount_health(&server).await;
        mount_symbol(&server, "EURUSD", true).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/ticks/EURUSD"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"bid": 1.0850, "ask": 1.0852, "time": 1700000000}),
            ))
            .mount(&server)
            .await;

        let mut gateway = Mt5Gateway::new(&server.uri(), vec!["EURUSD".to_string()]);
        gateway.connect().await.unwrap();

        let tick = gateway.latest_tick("EURUSD").await.unwrap().unwrap();
        assert_eq!(tick.bid, 1.0850);
        assert_eq!(tick.ask, 1.0852);
    }

    #[tokio::test]
    async fn latest_tick_no_content_is_a_miss() {
        let server = MockServer::start().await;
        mount_health(&server).await;
        mount_symbol(&server, "EURUSD", true).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/ticks/EURUSD"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let mut gateway = Mt5Gateway::new(&server.uri(), vec!["EURUSD".to_string()]);
        gateway.connect().await.unwrap();

        assert_eq!(gateway.latest_tick("EURUSD").await.unwrap(), None);
        assert!(gateway.is_alive());
    }

    #[tokio::test]
    async fn latest_tick_gateway_error_keeps_session_alive() {
        let server = MockServer::start().await;
        mount_health(&server).await;
        mount_symbol(&server, "EURUSD", true).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/ticks/EURUSD"))
            .respond_with(ResponseTemplate::new(500).set_body_string("terminal busy"))
            .mount(&server)
            .await;

        let mut gateway = Mt5Gateway::new(&server.uri(), vec!["EURUSD".to_string()]);
        gateway.connect().await.unwrap();

        let err = gateway.latest_tick("EURUSD").await.unwrap_err();
        assert!(
            matches!(err, FetchError::Gateway { status: 500, .. }),
            "{err}"
        );
        assert!(!err.is_connection_loss());
        assert!(gateway.is_alive());
    }

    #[tokio::test]
    async fn latest_tick_transport_failure_kills_session() {
        // Exclusive server: dropping it must actually close the port (pooled
        // servers keep listening after drop).
        let server = MockServer::builder().start().await;
        mount_health(&server).await;
        mount_symbol(&server, "EURUSD", true).await;

        let mut gateway = Mt5Gateway::new(&server.uri(), vec!["EURUSD".to_string()]);
        gateway.connect().await.unwrap();
        assert!(gateway.is_alive());

        drop(server);

        let err = gateway.latest_tick("EURUSD").await.unwrap_err();
        assert!(err.is_connection_loss(), "{err}");
        assert!(!gateway.is_alive());
    }
}
