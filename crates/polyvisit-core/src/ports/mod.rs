//! Ports - 外部の協調者への抽象化レイヤー

pub mod sink;

pub use self::sink::{DispatchSink, NoopSink};
