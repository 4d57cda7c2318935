//! TypeKey - dispatch に参加する型の識別子
//!
//! `TypeId` だけではログに名前を出せないので、`type_name` と組にして持ちます。
//! 等価性と hash は `TypeId` のみで決まります。

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Universal root type (the `Object` of a class hierarchy).
///
/// 全ての値はこの型の子孫として扱われます。fallback 操作はこのキーで登録します。
pub enum Root {}

/// Kind of a node in the type graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Class,
    Capability,
    Root,
}

/// Identity of a type participating in dispatch.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn root() -> Self {
        Self::of::<Root>()
    }

    pub fn is_root(&self) -> bool {
        self.id == TypeId::of::<Root>()
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified name, e.g. `my_app::model::Dog`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the name, generics included (`Wrapper<a::B>` stays intact).
    pub fn short_name(&self) -> &'static str {
        let head_end = self.name.find('<').unwrap_or(self.name.len());
        let start = self.name[..head_end].rfind("::").map_or(0, |i| i + 2);
        &self.name[start..]
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
