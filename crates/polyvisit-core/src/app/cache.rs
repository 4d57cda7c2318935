//! ResolutionCache - (handler 型, 値の型) → Binding のメモ化
//!
//! # 構造
//! - 外側: `HandlerTypeId` → `CacheEntry`（handler テーブルへの `Weak` + 内側のマップ）
//! - 内側: `TypeKey` → `Arc<Binding<H>>`
//!
//! どちらも dashmap のシャード単位ロックのみ。resolve はロックの外で実行し、
//! 挿入は first-writer-wins なので、同時に初回解決しても全員が同じ `Arc` を受け取ります。
//! handler テーブルが drop されたエントリは `purge()` で回収されます。

use std::any::Any;
use std::sync::{Arc, Weak};

use dashmap::DashMap;

use crate::domain::errors::DispatchError;
use crate::domain::graph::TypeGraph;
use crate::domain::type_key::TypeKey;
use crate::observability::CacheStats;
use crate::typed::table::{HandlerTable, HandlerTypeId};

use super::resolver::{Binding, HandlerResolver};

/// Result of a cache lookup.
pub struct Cached<H> {
    pub binding: Arc<Binding<H>>,
    /// `true` when this call resolved and stored the binding.
    pub fresh: bool,
}

trait ErasedBindings: Send + Sync {
    fn len(&self) -> usize;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

struct Bindings<H> {
    map: DashMap<TypeKey, Arc<Binding<H>>>,
}

impl<H: 'static> ErasedBindings for Bindings<H> {
    fn len(&self) -> usize {
        self.map.len()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

struct CacheEntry {
    table: Weak<dyn Any + Send + Sync>,
    bindings: Arc<dyn ErasedBindings>,
}

impl CacheEntry {
    fn new<H: Send + Sync + 'static>(table: &Arc<HandlerTable<H>>, bindings: Arc<Bindings<H>>) -> Self {
        let weak = Arc::downgrade(table);
        let table: Weak<dyn Any + Send + Sync> = weak;
        Self { table, bindings }
    }

    fn is_alive(&self) -> bool {
        self.table.strong_count() > 0
    }

    fn typed<H: Send + Sync + 'static>(&self) -> Option<Arc<Bindings<H>>> {
        Arc::clone(&self.bindings).into_any().downcast::<Bindings<H>>().ok()
    }
}

pub struct ResolutionCache {
    entries: DashMap<HandlerTypeId, CacheEntry>,
    purge_on_insert: bool,
}

impl ResolutionCache {
    pub fn new(purge_on_insert: bool) -> Self {
        Self {
            entries: DashMap::new(),
            purge_on_insert,
        }
    }

    pub fn get_or_resolve<H: Send + Sync + 'static>(
        &self,
        graph: &TypeGraph,
        table: &Arc<HandlerTable<H>>,
        value: TypeKey,
    ) -> Result<Cached<H>, DispatchError> {
        let bindings = self.bindings_for(table);

        if let Some(binding) = bindings.map.get(&value).map(|b| Arc::clone(b.value())) {
            #[cfg(debug_assertions)]
            {
                if let Ok(again) = HandlerResolver::new(graph).resolve(table.as_ref(), value) {
                    debug_assert!(binding.matches(&again), "cached binding diverged from a fresh resolution");
                }
            }
            return Ok(Cached { binding, fresh: false });
        }

        let resolved = Arc::new(HandlerResolver::new(graph).resolve(table.as_ref(), value)?);
        let stored = Arc::clone(bindings.map.entry(value).or_insert_with(|| Arc::clone(&resolved)).value());
        let fresh = Arc::ptr_eq(&stored, &resolved);
        Ok(Cached { binding: stored, fresh })
    }

    fn bindings_for<H: Send + Sync + 'static>(&self, table: &Arc<HandlerTable<H>>) -> Arc<Bindings<H>> {
        let id = table.id();
        if let Some(bindings) = self.entries.get(&id).and_then(|entry| entry.typed::<H>()) {
            return bindings;
        }

        if self.purge_on_insert {
            self.purge();
        }

        let fresh = Arc::new(Bindings { map: DashMap::new() });
        let mut slot = self
            .entries
            .entry(id)
            .or_insert_with(|| CacheEntry::new(table, Arc::clone(&fresh)));
        match slot.typed::<H>() {
            Some(bindings) => bindings,
            None => {
                *slot = CacheEntry::new(table, Arc::clone(&fresh));
                fresh
            }
        }
    }

    /// Drops entries whose handler table is gone. Returns how many were removed.
    pub fn purge(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_alive());
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, "purged resolution cache entries of unloaded handlers");
        }
        removed
    }

    /// Number of cached bindings for one handler table.
    pub fn bindings_len(&self, id: HandlerTypeId) -> usize {
        self.entries.get(&id).map_or(0, |entry| entry.bindings.len())
    }

    pub fn contains(&self, id: HandlerTypeId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for entry in self.entries.iter() {
            stats.handler_types += 1;
            stats.bindings += entry.bindings.len();
            if !entry.is_alive() {
                stats.dead += 1;
            }
        }
        stats
    }
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Animal, Cat, Dog, animal_graph};

    struct Probe;

    fn table() -> Arc<HandlerTable<Probe>> {
        HandlerTable::<Probe>::builder("Probe")
            .on::<Animal, _>(|_, _| Ok(()))
            .unwrap()
            .otherwise(|_, _| Ok(()))
            .unwrap()
            .build()
    }

    #[test]
    fn repeated_lookup_returns_same_binding() {
        let cache = ResolutionCache::default();
        let graph = animal_graph();
        let table = table();

        let first = cache.get_or_resolve(&graph, &table, TypeKey::of::<Dog>()).unwrap();
        let second = cache.get_or_resolve(&graph, &table, TypeKey::of::<Dog>()).unwrap();

        assert!(first.fresh);
        assert!(!second.fresh);
        assert!(Arc::ptr_eq(&first.binding, &second.binding));
        assert_eq!(cache.bindings_len(table.id()), 1);
    }

    #[test]
    fn one_entry_per_value_type() {
        let cache = ResolutionCache::default();
        let graph = animal_graph();
        let table = table();

        for value in [TypeKey::of::<Dog>(), TypeKey::of::<Cat>(), TypeKey::of::<Dog>()] {
            cache.get_or_resolve(&graph, &table, value).unwrap();
        }
        assert_eq!(cache.bindings_len(table.id()), 2);
        assert_eq!(cache.stats().handler_types, 1);
    }

    #[test]
    fn fatal_resolution_is_not_cached() {
        let cache = ResolutionCache::default();
        let graph = animal_graph();
        let table = HandlerTable::<Probe>::builder("Probe").build();

        assert!(cache.get_or_resolve(&graph, &table, TypeKey::of::<Dog>()).is_err());
        assert_eq!(cache.bindings_len(table.id()), 0);
    }

    #[test]
    fn dropped_table_is_purged() {
        let cache = ResolutionCache::new(false);
        let graph = animal_graph();

        let old = table();
        let old_id = old.id();
        cache.get_or_resolve(&graph, &old, TypeKey::of::<Dog>()).unwrap();
        drop(old);

        assert_eq!(cache.stats().dead, 1);
        assert_eq!(cache.purge(), 1);
        assert!(!cache.contains(old_id));
    }

    #[test]
    fn new_handler_type_sweeps_dead_entries() {
        let cache = ResolutionCache::new(true);
        let graph = animal_graph();

        for _ in 0..20 {
            let reloaded = table();
            cache.get_or_resolve(&graph, &reloaded, TypeKey::of::<Cat>()).unwrap();
        }
        assert_eq!(cache.stats().handler_types, 1);
    }
}
