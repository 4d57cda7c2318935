//! MemorySink - 記録をメモリに保持する sink（テスト・診断用）

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::domain::events::DispatchEvent;
use crate::ports::DispatchSink;

#[derive(Debug, Clone, Serialize)]
pub struct Recorded {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: DispatchEvent,
}

#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Recorded>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DispatchEvent> {
        self.records.lock().iter().map(|r| r.event.clone()).collect()
    }

    pub fn records(&self) -> Vec<Recorded> {
        self.records.lock().clone()
    }

    /// Failure records only (`Resolved` traces excluded).
    pub fn failures(&self) -> Vec<DispatchEvent> {
        self.events().into_iter().filter(DispatchEvent::is_failure).collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl DispatchSink for MemorySink {
    fn record(&self, event: DispatchEvent) {
        self.records.lock().push(Recorded {
            at: Utc::now(),
            event,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_records_in_order() {
        let sink = MemorySink::new();
        sink.record(DispatchEvent::ResolutionFatal {
            handler: "A".to_string(),
            value: "x".to_string(),
        });
        sink.record(DispatchEvent::Resolved {
            handler: "A".to_string(),
            value: "y".to_string(),
            target: "y".to_string(),
            origin: crate::app::resolver::MatchOrigin::Class,
            path: vec!["y".to_string()],
        });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].value(), "x");
        assert_eq!(sink.failures().len(), 1);

        let json = serde_json::to_value(&sink.records()[0]).unwrap();
        assert_eq!(json["kind"], "resolution_fatal");
        assert!(json["at"].is_string());

        sink.clear();
        assert!(sink.is_empty());
    }
}
