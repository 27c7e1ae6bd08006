use thiserror::Error;

/// Errors raised while establishing a connector session.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("endpoint reachable but not serving: {0}")]
    Unhealthy(String),

    #[error("no configured instrument is available at the source")]
    NoInstruments,
}

/// Errors raised while fetching a tick from the terminal.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("terminal connection lost: {0}")]
    ConnectionLost(String),

    #[error("gateway error {status}: {message}")]
    Gateway { status: u16, message: String },
}

impl FetchError {
    /// True when the failure means the terminal session is gone and the
    /// polling loop should stop iterating and reconnect.
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, FetchError::ConnectionLost(_))
    }
}

/// Errors raised while writing a quote to the sink.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("sink connection lost: {0}")]
    ConnectionLost(String),

    #[error("sink is not connected")]
    NotConnected,

    #[error("sink rejected the write: {0}")]
    Rejected(String),

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl PublishError {
    /// True when the failure means the sink session is gone. `Rejected` and
    /// `Encode` are per-quote failures the loop logs and moves past.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            PublishError::ConnectionLost(_) | PublishError::NotConnected
        )
    }
}

/// Errors raised while building the symbol table.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SymbolTableError {
    #[error("symbol table is empty")]
    Empty,

    #[error("malformed symbol entry: {0:?}")]
    Malformed(String),

    #[error("duplicate source instrument: {0}")]
    DuplicateSource(String),

    #[error("duplicate normalized symbol: {0}")]
    DuplicateNormalized(String),
}
