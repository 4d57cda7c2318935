//! Observability - ログ初期化とキャッシュの統計

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Snapshot of the resolution cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Handler types with an entry, dead ones included.
    pub handler_types: usize,
    pub bindings: usize,
    /// Entries whose handler table was dropped and not yet purged.
    pub dead: usize,
}

/// Installs a stderr `fmt` subscriber filtered by `RUST_LOG`.
///
/// Returns `false` if a global subscriber was already set.
pub fn init_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
