//! Events - dispatch の診断レコード
//!
//! `DispatchSink` に渡されるレコードの形だけを定義します。
//! 整形や送信先は sink 側の責務です。

use serde::Serialize;

use crate::app::resolver::MatchOrigin;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchEvent {
    /// Cache miss resolved. `path` lists every probed key in search order.
    Resolved {
        handler: String,
        value: String,
        target: String,
        origin: MatchOrigin,
        path: Vec<String>,
    },

    /// The operation returned an error or panicked.
    InvocationFailed {
        handler: String,
        value: String,
        target: String,
        causes: Vec<String>,
    },

    /// The operation could not receive the value.
    AccessFailed {
        handler: String,
        value: String,
        target: String,
        reason: String,
    },

    /// No fallback operation in the handler ancestry.
    ResolutionFatal { handler: String, value: String },
}

impl DispatchEvent {
    pub fn handler(&self) -> &str {
        match self {
            DispatchEvent::Resolved { handler, .. }
            | DispatchEvent::InvocationFailed { handler, .. }
            | DispatchEvent::AccessFailed { handler, .. }
            | DispatchEvent::ResolutionFatal { handler, .. } => handler,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            DispatchEvent::Resolved { value, .. }
            | DispatchEvent::InvocationFailed { value, .. }
            | DispatchEvent::AccessFailed { value, .. }
            | DispatchEvent::ResolutionFatal { value, .. } => value,
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, DispatchEvent::Resolved { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_is_tagged_by_kind() {
        let event = DispatchEvent::ResolutionFatal {
            handler: "Printer".to_string(),
            value: "Dog".to_string(),
        };
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["kind"], "resolution_fatal");
        assert_eq!(v["value"], "Dog");
        assert!(event.is_failure());
    }
}
