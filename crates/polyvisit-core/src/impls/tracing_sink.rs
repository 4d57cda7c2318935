//! TracingSink - `DispatchEvent` を `tracing` のイベントとして出力

use crate::domain::events::DispatchEvent;
use crate::ports::DispatchSink;

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

impl DispatchSink for TracingSink {
    fn record(&self, event: DispatchEvent) {
        match event {
            DispatchEvent::Resolved {
                handler,
                value,
                target,
                origin,
                path,
            } => {
                tracing::trace!(%handler, %value, %target, ?origin, ?path, "resolved handling operation");
            }
            DispatchEvent::InvocationFailed {
                handler,
                value,
                target,
                causes,
            } => {
                tracing::error!(%handler, %value, %target, ?causes, "failed to visit value");
            }
            DispatchEvent::AccessFailed {
                handler,
                value,
                target,
                reason,
            } => {
                tracing::error!(%handler, %value, %target, %reason, "resolved operation is not invocable");
            }
            DispatchEvent::ResolutionFatal { handler, value } => {
                tracing::error!(%handler, %value, fatal = true, "no fallback handling operation; handler implementation is incomplete");
            }
        }
    }
}
