//! MT5 terminal gateway connector.

mod client;
mod messages;

pub use client::Mt5Gateway;
