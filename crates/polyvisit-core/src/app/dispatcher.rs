//! Dispatcher - 1 回の dispatch の調停
//!
//! 1. handler テーブルと値の `TypeKey` を決める
//! 2. `ResolutionCache` から Binding を取得（無ければ resolve して保存）
//! 3. handler を receiver、値を引数として操作を呼ぶ
//!
//! 操作のエラー・panic・引数を渡せない失敗は sink に記録して握りつぶします。
//! 呼び出し元に返るのは `DispatchError::ResolutionFatal` だけです。

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::domain::errors::{DispatchError, InvokeError};
use crate::domain::events::DispatchEvent;
use crate::domain::graph::TypeGraph;
use crate::domain::type_key::TypeKey;
use crate::impls::TracingSink;
use crate::observability::CacheStats;
use crate::ports::DispatchSink;
use crate::typed::handler::Handler;
use crate::typed::table::{HandlerTable, HandlerTypeId};
use crate::typed::visitable::Visitable;

use super::cache::ResolutionCache;
use super::config::DispatcherConfig;
use super::resolver::Binding;

struct Inner {
    graph: Arc<TypeGraph>,
    cache: ResolutionCache,
    sink: Arc<dyn DispatchSink>,
    config: DispatcherConfig,
}

/// Owns the type graph and the resolution cache. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Dispatcher with default config that logs through `tracing`.
    pub fn new(graph: TypeGraph) -> Self {
        Self::with_parts(Arc::new(graph), Arc::new(TracingSink), DispatcherConfig::default())
    }

    pub(crate) fn with_parts(
        graph: Arc<TypeGraph>,
        sink: Arc<dyn DispatchSink>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                graph,
                cache: ResolutionCache::new(config.purge_on_insert),
                sink,
                config,
            }),
        }
    }

    pub fn graph(&self) -> &TypeGraph {
        &self.inner.graph
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    /// Dispatches `value` to the most specific operation of `handler`.
    pub fn dispatch<H: Handler>(&self, handler: &H, value: &dyn Visitable) -> Result<(), DispatchError> {
        self.dispatch_with(handler.table(), handler, value)
    }

    /// Same as `dispatch`, for receivers that do not implement `Handler`.
    pub fn dispatch_with<H: Send + Sync + 'static>(
        &self,
        table: &Arc<HandlerTable<H>>,
        handler: &H,
        value: &dyn Visitable,
    ) -> Result<(), DispatchError> {
        let binding = self.resolve(table, value.type_key())?;
        if let Err(err) = self.invoke(&binding, handler, value) {
            self.report(&binding, err);
        }
        Ok(())
    }

    /// Binding for the pair without invoking it. Resolves and caches on first use.
    pub fn resolve<H: Send + Sync + 'static>(
        &self,
        table: &Arc<HandlerTable<H>>,
        value: TypeKey,
    ) -> Result<Arc<Binding<H>>, DispatchError> {
        match self.inner.cache.get_or_resolve(&self.inner.graph, table, value) {
            Ok(cached) => {
                if cached.fresh && self.inner.config.trace_resolution {
                    self.inner.sink.record(resolved_event(&cached.binding));
                }
                Ok(cached.binding)
            }
            Err(err) => {
                let DispatchError::ResolutionFatal { handler, value } = &err;
                self.inner.sink.record(DispatchEvent::ResolutionFatal {
                    handler: handler.to_string(),
                    value: value.to_string(),
                });
                Err(err)
            }
        }
    }

    fn invoke<H>(&self, binding: &Binding<H>, handler: &H, value: &dyn Visitable) -> Result<(), InvokeError> {
        if !self.inner.config.catch_panics {
            return binding.invoke(handler, value);
        }
        panic::catch_unwind(AssertUnwindSafe(|| binding.invoke(handler, value)))
            .unwrap_or_else(|payload| Err(InvokeError::Panicked(panic_message(payload.as_ref()))))
    }

    fn report<H>(&self, binding: &Binding<H>, err: InvokeError) {
        let handler = binding.handler_name().to_string();
        let value = binding.value().name().to_string();
        let target = binding.target().name().to_string();
        let event = match err {
            InvokeError::Access { .. } => DispatchEvent::AccessFailed {
                handler,
                value,
                target,
                reason: err.to_string(),
            },
            InvokeError::Failed(_) | InvokeError::Panicked(_) => DispatchEvent::InvocationFailed {
                handler,
                value,
                target,
                causes: err.causes(),
            },
        };
        self.inner.sink.record(event);
    }

    /// Drops cache entries of handler tables that no longer exist.
    pub fn purge(&self) -> usize {
        self.inner.cache.purge()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    pub fn cached_bindings(&self, handler_type: HandlerTypeId) -> usize {
        self.inner.cache.bindings_len(handler_type)
    }
}

fn resolved_event<H>(binding: &Binding<H>) -> DispatchEvent {
    DispatchEvent::Resolved {
        handler: binding.handler_name().to_string(),
        value: binding.value().name().to_string(),
        target: binding.target().name().to_string(),
        origin: binding.origin(),
        path: binding
            .trace()
            .iter()
            .map(|step| step.probed.short_name().to_string())
            .collect(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
