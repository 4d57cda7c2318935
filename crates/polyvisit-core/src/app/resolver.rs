//! HandlerResolver - (handler 型, 値の型) から処理操作を 1 つ選ぶ純粋なアルゴリズム
//!
//! # 探索順（最初に見つかったものを採用）
//! 1. クラス階層: 値の型 → 親 → ... （`Root` は除く）
//! 2. capability: 値の型 → 親 ... の順に、直接実装した capability を宣言順に、
//!    見つからなければその super-capability へ深さ優先で潜ってから次の兄弟へ
//! 3. fallback: `Root` を受け取る操作。無ければ `DispatchError::ResolutionFatal`
//!
//! クラス階層の探索は capability より常に優先されます。
//! 遠い親クラスの一致が、近い capability の一致に勝つことがあります。

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::errors::{DispatchError, InvokeError};
use crate::domain::graph::{TypeGraph, Upcast};
use crate::domain::type_key::TypeKey;
use crate::typed::handler::DynOperation;
use crate::typed::table::{Declared, HandlerTable, HandlerTypeId};
use crate::typed::visitable::Visitable;

/// Which search phase produced the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOrigin {
    Class,
    Capability,
    Fallback,
}

/// One probed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchStep {
    pub phase: MatchOrigin,
    pub probed: TypeKey,
    pub matched: bool,
}

/// Resolved pairing of a handler type and a value type to one operation.
pub struct Binding<H> {
    handler_type: HandlerTypeId,
    handler_name: &'static str,
    value: TypeKey,
    target: TypeKey,
    origin: MatchOrigin,
    declared_in: &'static str,
    upcasts: Option<Vec<Upcast>>,
    operation: Arc<dyn DynOperation<H>>,
    trace: Vec<SearchStep>,
}

impl<H> Binding<H> {
    pub fn handler_type(&self) -> HandlerTypeId {
        self.handler_type
    }

    pub fn handler_name(&self) -> &'static str {
        self.handler_name
    }

    pub fn value(&self) -> TypeKey {
        self.value
    }

    /// Parameter type of the selected operation.
    pub fn target(&self) -> TypeKey {
        self.target
    }

    pub fn origin(&self) -> MatchOrigin {
        self.origin
    }

    /// Name of the table (own or inherited) that declared the operation.
    pub fn declared_in(&self) -> &'static str {
        self.declared_in
    }

    pub fn trace(&self) -> &[SearchStep] {
        &self.trace
    }

    /// Same operation selected the same way. Used to check a cached binding against a fresh resolution.
    pub fn matches(&self, other: &Binding<H>) -> bool {
        self.value == other.value
            && self.target == other.target
            && self.origin == other.origin
            && self.declared_in == other.declared_in
    }

    /// Calls the operation with `handler` as receiver and `value` as argument.
    pub fn invoke(&self, handler: &H, value: &dyn Visitable) -> Result<(), InvokeError> {
        let view = match &self.upcasts {
            Some(upcasts) => upcasts
                .iter()
                .try_fold(value.as_any(), |view, upcast| upcast.apply(view)),
            None => None,
        };
        self.operation.call(handler, value, view)
    }
}

impl<H> fmt::Debug for Binding<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("handler", &self.handler_name)
            .field("value", &self.value)
            .field("target", &self.target)
            .field("origin", &self.origin)
            .field("declared_in", &self.declared_in)
            .field("upcasts", &self.upcasts)
            .finish()
    }
}

pub struct HandlerResolver<'g> {
    graph: &'g TypeGraph,
}

impl<'g> HandlerResolver<'g> {
    pub fn new(graph: &'g TypeGraph) -> Self {
        Self { graph }
    }

    pub fn resolve<H: 'static>(
        &self,
        table: &HandlerTable<H>,
        value: TypeKey,
    ) -> Result<Binding<H>, DispatchError> {
        let mut search = Search {
            table,
            trace: Vec::new(),
        };
        let chain = self.graph.class_chain(value);

        // 1) class hierarchy
        let mut upcasts = Some(Vec::new());
        for (depth, class) in chain.iter().enumerate() {
            if depth > 0 {
                let edge = self.graph.upcast(chain[depth - 1]).cloned();
                upcasts = upcasts.zip(edge).map(|(mut path, edge)| {
                    path.push(edge);
                    path
                });
            }
            if let Some(declared) = search.probe(MatchOrigin::Class, *class) {
                return Ok(search.bind(value, *class, MatchOrigin::Class, declared, upcasts));
            }
        }

        // 2) capabilities, depth first in declaration order
        let mut visited = HashSet::new();
        for class in &chain {
            let found = self.search_capabilities(&mut search, self.graph.capabilities(*class), &mut visited);
            if let Some((capability, declared)) = found {
                let view = Some(Vec::new());
                return Ok(search.bind(value, capability, MatchOrigin::Capability, declared, view));
            }
        }

        // 3) fallback
        let root = TypeKey::root();
        match search.probe(MatchOrigin::Fallback, root) {
            Some(declared) => Ok(search.bind(value, root, MatchOrigin::Fallback, declared, Some(Vec::new()))),
            None => Err(DispatchError::ResolutionFatal {
                handler: table.name(),
                value: value.name(),
            }),
        }
    }

    fn search_capabilities<H: 'static>(
        &self,
        search: &mut Search<'_, H>,
        capabilities: &[TypeKey],
        visited: &mut HashSet<TypeKey>,
    ) -> Option<(TypeKey, Declared<H>)> {
        for &capability in capabilities {
            // a capability that already missed cannot match later either
            if !visited.insert(capability) {
                continue;
            }
            if let Some(declared) = search.probe(MatchOrigin::Capability, capability) {
                return Some((capability, declared));
            }
            let supers = self.graph.capabilities(capability);
            if let Some(found) = self.search_capabilities(search, supers, visited) {
                return Some(found);
            }
        }
        None
    }
}

struct Search<'t, H> {
    table: &'t HandlerTable<H>,
    trace: Vec<SearchStep>,
}

impl<H: 'static> Search<'_, H> {
    fn probe(&mut self, phase: MatchOrigin, probed: TypeKey) -> Option<Declared<H>> {
        let declared = self.table.lookup(probed);
        tracing::trace!(
            handler = self.table.name(),
            ?phase,
            probed = probed.name(),
            matched = declared.is_some(),
            "probing handling operation"
        );
        self.trace.push(SearchStep {
            phase,
            probed,
            matched: declared.is_some(),
        });
        declared
    }

    fn bind(
        self,
        value: TypeKey,
        target: TypeKey,
        origin: MatchOrigin,
        declared: Declared<H>,
        upcasts: Option<Vec<Upcast>>,
    ) -> Binding<H> {
        Binding {
            handler_type: self.table.id(),
            handler_name: self.table.name(),
            value,
            target,
            origin,
            declared_in: declared.declared_in,
            upcasts,
            operation: declared.operation,
            trace: self.trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Animal, Cat, Dog, Labelled, Named, Pet, Robot, animal_graph};
    use crate::typed::table::HandlerTable;
    use rstest::rstest;

    struct Probe;

    fn ok_kind<K: ?Sized + 'static>(
        builder: crate::typed::HandlerTableBuilder<Probe>,
    ) -> crate::typed::HandlerTableBuilder<Probe> {
        builder.on_kind::<K, _>(|_, _| Ok(())).unwrap()
    }

    fn resolve(table: &HandlerTable<Probe>, value: TypeKey) -> Result<Binding<Probe>, DispatchError> {
        HandlerResolver::new(&animal_graph()).resolve(table, value)
    }

    #[test]
    fn direct_match_wins() {
        let table = ok_kind::<Dog>(ok_kind::<Animal>(HandlerTable::builder("Probe"))).build();
        let binding = resolve(&table, TypeKey::of::<Dog>()).unwrap();
        assert_eq!(binding.target(), TypeKey::of::<Dog>());
        assert_eq!(binding.origin(), MatchOrigin::Class);
        assert_eq!(binding.trace().len(), 1);
    }

    #[test]
    fn superclass_beats_closer_capability() {
        // Dog extends Animal, Animal implements Named; handler knows Root, Animal and Named
        let table = ok_kind::<Named>(ok_kind::<Animal>(ok_kind::<crate::domain::Root>(
            HandlerTable::builder("Probe"),
        )))
        .build();
        let binding = resolve(&table, TypeKey::of::<Dog>()).unwrap();

        assert_eq!(binding.target(), TypeKey::of::<Animal>());
        assert_eq!(binding.origin(), MatchOrigin::Class);
        assert!(binding.trace().iter().all(|step| step.phase == MatchOrigin::Class));
    }

    #[test]
    fn capability_found_on_superclass() {
        let table = ok_kind::<Named>(HandlerTable::builder("Probe")).build();
        let binding = resolve(&table, TypeKey::of::<Dog>()).unwrap();

        assert_eq!(binding.target(), TypeKey::of::<Named>());
        assert_eq!(binding.origin(), MatchOrigin::Capability);
        let probed: Vec<TypeKey> = binding.trace().iter().map(|s| s.probed).collect();
        assert_eq!(
            probed,
            vec![
                TypeKey::of::<Dog>(),
                TypeKey::of::<Animal>(),
                TypeKey::of::<Pet>(),
                TypeKey::of::<Named>(),
            ]
        );
    }

    #[test]
    fn super_capability_is_searched_depth_first() {
        let table = ok_kind::<Labelled>(HandlerTable::builder("Probe")).build();
        let binding = resolve(&table, TypeKey::of::<Robot>()).unwrap();
        assert_eq!(binding.target(), TypeKey::of::<Labelled>());
        assert_eq!(binding.origin(), MatchOrigin::Capability);
    }

    #[rstest]
    #[case::dog(TypeKey::of::<Dog>())]
    #[case::cat(TypeKey::of::<Cat>())]
    #[case::animal(TypeKey::of::<Animal>())]
    #[case::robot(TypeKey::of::<Robot>())]
    fn unmatched_values_use_fallback(#[case] value: TypeKey) {
        let table = ok_kind::<crate::domain::Root>(HandlerTable::builder("Probe")).build();
        let binding = resolve(&table, value).unwrap();
        assert_eq!(binding.origin(), MatchOrigin::Fallback);
        assert!(binding.target().is_root());
    }

    #[test]
    fn missing_fallback_is_fatal_and_names_value() {
        let table = ok_kind::<Animal>(HandlerTable::builder("Probe")).build();
        let err = resolve(&table, TypeKey::of::<Robot>()).unwrap_err();
        assert_eq!(
            err,
            DispatchError::ResolutionFatal {
                handler: "Probe",
                value: TypeKey::of::<Robot>().name(),
            }
        );
    }

    #[test]
    fn class_match_records_upcast_path() {
        let table = HandlerTable::<Probe>::builder("Probe")
            .on::<Animal, _>(|_, animal| {
                anyhow::ensure!(animal.name == "rex");
                Ok(())
            })
            .unwrap()
            .build();
        let binding = resolve(&table, TypeKey::of::<Dog>()).unwrap();
        binding.invoke(&Probe, &Dog::new("rex", "collie")).unwrap();
    }

    #[test]
    fn inherited_operation_reports_declaring_table() {
        let base = ok_kind::<crate::domain::Root>(ok_kind::<Named>(HandlerTable::builder("Base"))).build();
        let child = ok_kind::<Dog>(HandlerTable::builder("Child")).inherit(base).build();

        let own = resolve(&child, TypeKey::of::<Dog>()).unwrap();
        assert_eq!(own.declared_in(), "Child");
        assert_eq!(own.handler_type(), child.id());

        let inherited = resolve(&child, TypeKey::of::<Cat>()).unwrap();
        assert_eq!(inherited.declared_in(), "Base");
        assert_eq!(inherited.origin(), MatchOrigin::Capability);
        assert_eq!(inherited.target(), TypeKey::of::<Named>());
        // bindings belong to the table that was dispatched on, not the parent
        assert_eq!(inherited.handler_type(), child.id());
        assert_eq!(inherited.handler_name(), "Child");
    }

    #[test]
    fn resolution_is_deterministic() {
        let table = ok_kind::<Pet>(ok_kind::<Named>(HandlerTable::builder("Probe"))).build();
        let first = resolve(&table, TypeKey::of::<Dog>()).unwrap();
        for _ in 0..10 {
            let again = resolve(&table, TypeKey::of::<Dog>()).unwrap();
            assert!(first.matches(&again));
        }
        // Dog's own capability Pet is enumerated before Animal's Named
        assert_eq!(first.target(), TypeKey::of::<Pet>());
    }
}
