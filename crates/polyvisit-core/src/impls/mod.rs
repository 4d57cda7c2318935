//! Impls - `DispatchSink` の実装

pub mod tracing_sink;
pub mod memory_sink;

pub use self::tracing_sink::TracingSink;
pub use self::memory_sink::{MemorySink, Recorded};
