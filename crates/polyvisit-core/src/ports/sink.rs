//! DispatchSink port - 診断レコードの受け口
//!
//! dispatcher の義務は well-formed な `DispatchEvent` を渡すことだけです。
//! 整形・送信は実装側に任せます。
//!
//! # 実装
//! - `TracingSink`: `tracing` のイベントとして出す（既定）
//! - `MemorySink`: メモリに溜める（テスト・診断用）
//! - `NoopSink`: 何もしない

use crate::domain::events::DispatchEvent;

pub trait DispatchSink: Send + Sync {
    fn record(&self, event: DispatchEvent);
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DispatchSink for NoopSink {
    fn record(&self, _event: DispatchEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn noop_sink_is_usable_as_port() {
        let sink: Arc<dyn DispatchSink> = Arc::new(NoopSink);
        sink.record(DispatchEvent::ResolutionFatal {
            handler: "Printer".to_string(),
            value: "Dog".to_string(),
        });
    }
}
