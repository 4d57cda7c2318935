//! HandlerTable - handler 型ごとの処理操作の登録表
//!
//! # 設計
//! - handler 実装は構築時に `HandlerTable::builder()` で操作を明示的に登録する
//! - 1 つの `Arc<HandlerTable<H>>` が「handler 型の定義」に相当する
//!   （作り直し = リロード。新しい `HandlerTypeId` が振られる）
//! - 親テーブルを `inherit` でき、検索は自分 → 親（宣言順・深さ優先）
//!
//! # 使用例
//! ```ignore
//! let table = HandlerTable::<Printer>::builder("Printer")
//!     .on::<Dog, _>(|printer, dog| printer.line(&dog.breed))?
//!     .on_kind::<Named, _>(|printer, value| printer.line(value.type_key().short_name()))?
//!     .otherwise(|_, _| Ok(()))?
//!     .build();
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ulid::Ulid;

use crate::domain::type_key::{Root, TypeKey};

use super::handler::{DynOperation, ErasedOperation, TypedOperation};
use super::visitable::Visitable;

/// Identity of one built handler table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerTypeId(Ulid);

impl HandlerTypeId {
    fn generate() -> Self {
        Self(Ulid::new())
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for HandlerTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler-{}", self.0)
    }
}

/// RegistryError は HandlerTable 構築時のエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("handler `{handler}` already declares an operation for `{param}`")]
    AlreadyRegistered {
        handler: &'static str,
        param: &'static str,
    },
}

/// An operation found by `HandlerTable::lookup`, with the table that declared it.
pub struct Declared<H> {
    pub declared_in: &'static str,
    pub operation: Arc<dyn DynOperation<H>>,
}

pub struct HandlerTable<H> {
    id: HandlerTypeId,
    name: &'static str,
    operations: HashMap<TypeKey, Arc<dyn DynOperation<H>>>,
    parents: Vec<Arc<HandlerTable<H>>>,
}

impl<H: 'static> HandlerTable<H> {
    pub fn builder(name: &'static str) -> HandlerTableBuilder<H> {
        HandlerTableBuilder {
            name,
            operations: HashMap::new(),
            parents: Vec::new(),
        }
    }

    pub fn id(&self) -> HandlerTypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Operation whose parameter is exactly `param`: own declarations first, then parents depth first.
    pub fn lookup(&self, param: TypeKey) -> Option<Declared<H>> {
        if let Some(operation) = self.operations.get(&param) {
            return Some(Declared {
                declared_in: self.name,
                operation: Arc::clone(operation),
            });
        }
        self.parents.iter().find_map(|parent| parent.lookup(param))
    }

    pub fn declares(&self, param: TypeKey) -> bool {
        self.lookup(param).is_some()
    }

    pub fn has_fallback(&self) -> bool {
        self.declares(TypeKey::root())
    }

    /// Parameter types declared by this table only, parents excluded.
    pub fn own_params(&self) -> Vec<TypeKey> {
        self.operations.keys().copied().collect()
    }
}

impl<H> fmt::Debug for HandlerTable<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .field("parents", &self.parents.iter().map(|p| p.name).collect::<Vec<_>>())
            .finish()
    }
}

pub struct HandlerTableBuilder<H> {
    name: &'static str,
    operations: HashMap<TypeKey, Arc<dyn DynOperation<H>>>,
    parents: Vec<Arc<HandlerTable<H>>>,
}

impl<H: 'static> HandlerTableBuilder<H> {
    /// Typed operation. Reachable for `T` itself and, through upcasts, for its subclasses.
    pub fn on<T, F>(self, op: F) -> Result<Self, RegistryError>
    where
        T: Any,
        F: Fn(&H, &T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.insert(Arc::new(TypedOperation::<H, T, F>::new(op)))
    }

    /// Erased operation keyed by any type: a capability, an abstract class or `Root`.
    pub fn on_kind<K, F>(self, op: F) -> Result<Self, RegistryError>
    where
        K: ?Sized + 'static,
        F: Fn(&H, &dyn Visitable) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.insert(Arc::new(ErasedOperation::<H, F>::new(TypeKey::of::<K>(), op)))
    }

    /// Fallback operation, used when nothing more specific matches.
    pub fn otherwise<F>(self, op: F) -> Result<Self, RegistryError>
    where
        F: Fn(&H, &dyn Visitable) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_kind::<Root, F>(op)
    }

    /// Inherits the operations of `parent`. Earlier parents win over later ones.
    pub fn inherit(mut self, parent: Arc<HandlerTable<H>>) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn build(self) -> Arc<HandlerTable<H>> {
        Arc::new(HandlerTable {
            id: HandlerTypeId::generate(),
            name: self.name,
            operations: self.operations,
            parents: self.parents,
        })
    }

    fn insert(mut self, operation: Arc<dyn DynOperation<H>>) -> Result<Self, RegistryError> {
        let param = operation.param();
        if self.operations.contains_key(&param) {
            return Err(RegistryError::AlreadyRegistered {
                handler: self.name,
                param: param.name(),
            });
        }
        self.operations.insert(param, operation);
        Ok(self)
    }
}
