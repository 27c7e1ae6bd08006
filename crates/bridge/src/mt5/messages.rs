use serde::Deserialize;

/// `GET /health` response from the terminal gateway.
#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub mt5_connected: bool,
    #[serde(default)]
    pub mt5_version: Option<String>,
}

/// `GET /api/v1/symbols/{id}` response. Only the fields the bridge acts on.
#[derive(Debug, Deserialize)]
pub struct SymbolInfo {
    pub name: String,
    #[serde(default)]
    pub visible: bool,
}

/// `GET /api/v1/ticks/{id}` response.
#[derive(Debug, Deserialize)]
pub struct TickResponse {
    pub bid: f64,
    pub ask: f64,
}
