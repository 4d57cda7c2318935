//! DispatcherBuilder - dispatcher の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - `expect_fallback()` で fallback を持つべき handler テーブルを登録
//! - `build()` 時に fallback の有無をチェックし、不足があれば `BuildError` を返す
//! - 実行時の `ResolutionFatal` を起動時に前倒しで検出できる

use std::sync::Arc;

use crate::domain::graph::TypeGraph;
use crate::impls::TracingSink;
use crate::ports::DispatchSink;
use crate::typed::table::HandlerTable;

use super::config::DispatcherConfig;
use super::dispatcher::Dispatcher;

/// # 使用例
/// ```ignore
/// let dispatcher = DispatcherBuilder::new()
///     .graph(graph)
///     .sink(MemorySink::new())
///     .expect_fallback(&printer_table)
///     .build()?;
/// ```
pub struct DispatcherBuilder {
    graph: TypeGraph,
    sink: Option<Arc<dyn DispatchSink>>,
    config: DispatcherConfig,
    without_fallback: Vec<String>,
}

/// BuildError は dispatcher 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Handler tables without a fallback operation: {0:?}. Unmatched values would be fatal.")]
    MissingFallback(Vec<String>),
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            graph: TypeGraph::new(),
            sink: None,
            config: DispatcherConfig::default(),
            without_fallback: Vec::new(),
        }
    }

    pub fn graph(mut self, graph: TypeGraph) -> Self {
        self.graph = graph;
        self
    }

    pub fn sink(self, sink: impl DispatchSink + 'static) -> Self {
        self.sink_arc(Arc::new(sink))
    }

    /// Shares a sink the caller keeps a handle to.
    pub fn sink_arc(mut self, sink: Arc<dyn DispatchSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Requires `table` (or one of its parents) to declare a fallback operation.
    pub fn expect_fallback<H: 'static>(mut self, table: &HandlerTable<H>) -> Self {
        if !table.has_fallback() {
            self.without_fallback.push(table.name().to_string());
        }
        self
    }

    pub fn build(self) -> Result<Dispatcher, BuildError> {
        if !self.without_fallback.is_empty() {
            return Err(BuildError::MissingFallback(self.without_fallback));
        }
        let sink: Arc<dyn DispatchSink> = match self.sink {
            Some(sink) => sink,
            None => Arc::new(TracingSink),
        };
        Ok(Dispatcher::with_parts(Arc::new(self.graph), sink, self.config))
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
