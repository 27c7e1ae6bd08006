//! In-memory connector implementations for tests and local runs.

mod sink;
mod terminal;

pub use sink::MemorySink;
pub use terminal::MemoryTerminal;
