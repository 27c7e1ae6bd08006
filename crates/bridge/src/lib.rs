//! fxbridge-lib: resilient bridge from an MT5 terminal to Redis
//!
//! This crate provides the components for polling a price-quoting terminal,
//! normalizing instrument names and republishing every quote to a pub/sub
//! channel plus a latest-value hash, surviving outages on either side.

pub mod backoff;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod mt5;
pub mod publisher;
pub mod quote;
pub mod redis_sink;
pub mod server;
pub mod symbols;
pub mod traits;

pub use backoff::ReconnectPolicy;
pub use error::{ConnectError, FetchError, PublishError, SymbolTableError};
pub use metrics::Metrics;
pub use mt5::Mt5Gateway;
pub use publisher::{LoopState, Publisher, PublisherConfig};
pub use quote::Quote;
pub use redis_sink::RedisSink;
pub use server::{create_router, run_server, ServerState};
pub use symbols::SymbolTable;
pub use traits::{QuoteSink, Terminal, Tick};
