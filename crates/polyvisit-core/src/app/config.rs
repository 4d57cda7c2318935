//! DispatcherConfig - dispatcher の挙動設定
//!
//! 全フィールドに既定値があるので、JSON では変えたいキーだけ書けば足ります。
//!
//! ```ignore
//! let config = DispatcherConfig::from_json(r#"{ "catch_panics": false }"#)?;
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Emit a `Resolved` record (with the probed path) on every cache miss.
    pub trace_resolution: bool,

    /// Report a panicking operation as an invocation failure instead of unwinding through `dispatch`.
    pub catch_panics: bool,

    /// Sweep entries of dropped handler tables whenever a new handler type is cached.
    pub purge_on_insert: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            trace_resolution: true,
            catch_panics: true,
            purge_on_insert: true,
        }
    }
}

impl DispatcherConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
