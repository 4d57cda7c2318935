//! TypeGraph - 値の型階層と capability グラフの明示的な宣言
//!
//! Rust にはクラス継承もリフレクションもないので、値の型が
//! - どのクラスを継承するか（親は高々 1 つ、最後は暗黙に `Root`）
//! - どの capability を直接実装するか（宣言順が探索順）
//! を起動時に登録します。capability 同士も宣言順つきで継承できます。
//!
//! # 使用例
//! ```ignore
//! let graph = TypeGraph::new()
//!     .with_class(ClassDecl::<Animal>::new().implements::<Named>())?
//!     .with_class(ClassDecl::<Dog>::new().extends::<Animal>(|dog| &dog.animal))?
//!     .with_capability(CapabilityDecl::<Named>::new().extends::<Labelled>())?;
//! ```

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::errors::GraphError;
use super::type_key::{TypeKey, TypeKind};

type Projection = dyn for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync;

fn projection<F>(f: F) -> F
where
    F: for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync + 'static,
{
    f
}

/// Projection from a class to the embedded value of its parent class.
#[derive(Clone)]
pub struct Upcast {
    from: TypeKey,
    to: TypeKey,
    project: Arc<Projection>,
}

impl Upcast {
    pub fn new<C: Any, P: Any>(upcast: fn(&C) -> &P) -> Self {
        Self {
            from: TypeKey::of::<C>(),
            to: TypeKey::of::<P>(),
            project: Arc::new(projection(move |value| {
                value.downcast_ref::<C>().map(|child| upcast(child) as &dyn Any)
            })),
        }
    }

    pub fn source(&self) -> TypeKey {
        self.from
    }

    pub fn target(&self) -> TypeKey {
        self.to
    }

    /// Returns `None` when `value` is not an instance of the source class.
    pub fn apply<'a>(&self, value: &'a dyn Any) -> Option<&'a dyn Any> {
        (self.project)(value)
    }
}

impl fmt::Debug for Upcast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Upcast({} -> {})", self.from.short_name(), self.to.short_name())
    }
}

/// Declaration of a class node.
pub struct ClassDecl<C> {
    parent: Option<(TypeKey, Option<Upcast>)>,
    capabilities: Vec<TypeKey>,
    _marker: PhantomData<fn() -> C>,
}

impl<C: Any> ClassDecl<C> {
    pub fn new() -> Self {
        Self {
            parent: None,
            capabilities: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Parent class whose data is embedded in `C`. Typed operations on `P` receive `upcast(value)`.
    pub fn extends<P: Any>(mut self, upcast: fn(&C) -> &P) -> Self {
        self.parent = Some((TypeKey::of::<P>(), Some(Upcast::new(upcast))));
        self
    }

    /// Parent class without a data view (abstract base).
    ///
    /// Only erased operations (`on_kind`) can handle `C` through `P`.
    pub fn extends_abstract<P: ?Sized + 'static>(mut self) -> Self {
        self.parent = Some((TypeKey::of::<P>(), None));
        self
    }

    /// Adds a directly-implemented capability. Call order is search order.
    pub fn implements<K: ?Sized + 'static>(mut self) -> Self {
        self.capabilities.push(TypeKey::of::<K>());
        self
    }
}

impl<C: Any> Default for ClassDecl<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Declaration of a capability node.
pub struct CapabilityDecl<K: ?Sized> {
    supers: Vec<TypeKey>,
    _marker: PhantomData<fn() -> Box<K>>,
}

impl<K: ?Sized + 'static> CapabilityDecl<K> {
    pub fn new() -> Self {
        Self {
            supers: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn extends<S: ?Sized + 'static>(mut self) -> Self {
        self.supers.push(TypeKey::of::<S>());
        self
    }
}

impl<K: ?Sized + 'static> Default for CapabilityDecl<K> {
    fn default() -> Self {
        Self::new()
    }
}

struct ClassNode {
    parent: Option<TypeKey>,
    upcast: Option<Upcast>,
    capabilities: Vec<TypeKey>,
}

/// Declared hierarchy of value types and capabilities.
#[derive(Default)]
pub struct TypeGraph {
    classes: HashMap<TypeKey, ClassNode>,
    capabilities: HashMap<TypeKey, Vec<TypeKey>>,
}

impl TypeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class<C: Any>(mut self, decl: ClassDecl<C>) -> Result<Self, GraphError> {
        self.declare_class(decl)?;
        Ok(self)
    }

    pub fn with_capability<K: ?Sized + 'static>(
        mut self,
        decl: CapabilityDecl<K>,
    ) -> Result<Self, GraphError> {
        self.declare_capability(decl)?;
        Ok(self)
    }

    pub fn declare_class<C: Any>(&mut self, decl: ClassDecl<C>) -> Result<(), GraphError> {
        let key = TypeKey::of::<C>();
        self.check_free(key)?;
        let (parent, upcast) = match decl.parent {
            Some((parent, _)) if parent == key => return Err(GraphError::SelfReference(key.name())),
            Some((parent, _)) if parent.is_root() => (None, None),
            Some((parent, upcast)) => (Some(parent), upcast),
            None => (None, None),
        };
        self.classes.insert(
            key,
            ClassNode {
                parent,
                upcast,
                capabilities: decl.capabilities,
            },
        );
        Ok(())
    }

    pub fn declare_capability<K: ?Sized + 'static>(
        &mut self,
        decl: CapabilityDecl<K>,
    ) -> Result<(), GraphError> {
        let key = TypeKey::of::<K>();
        self.check_free(key)?;
        if decl.supers.contains(&key) {
            return Err(GraphError::SelfReference(key.name()));
        }
        self.capabilities.insert(key, decl.supers);
        Ok(())
    }

    fn check_free(&self, key: TypeKey) -> Result<(), GraphError> {
        if key.is_root() {
            return Err(GraphError::RootRedeclared);
        }
        if self.classes.contains_key(&key) || self.capabilities.contains_key(&key) {
            return Err(GraphError::AlreadyDeclared(key.name()));
        }
        Ok(())
    }

    /// Undeclared keys are treated as parentless classes.
    pub fn kind(&self, key: TypeKey) -> TypeKind {
        if key.is_root() {
            TypeKind::Root
        } else if self.capabilities.contains_key(&key) {
            TypeKind::Capability
        } else {
            TypeKind::Class
        }
    }

    pub fn parent(&self, class: TypeKey) -> Option<TypeKey> {
        self.classes.get(&class).and_then(|node| node.parent)
    }

    /// Projection from `class` to its parent, if one was declared.
    pub fn upcast(&self, class: TypeKey) -> Option<&Upcast> {
        self.classes.get(&class).and_then(|node| node.upcast.as_ref())
    }

    /// `class` itself followed by its superclasses, most specific first, `Root` excluded.
    ///
    /// A cyclic declaration is cut at the first repeated class.
    pub fn class_chain(&self, class: TypeKey) -> Vec<TypeKey> {
        let mut chain = vec![class];
        let mut seen: HashSet<TypeKey> = HashSet::from([class]);
        let mut current = class;
        while let Some(parent) = self.parent(current) {
            if !seen.insert(parent) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Directly-implemented capabilities of a class, or super-capabilities of a capability.
    pub fn capabilities(&self, key: TypeKey) -> &[TypeKey] {
        if let Some(node) = self.classes.get(&key) {
            return &node.capabilities;
        }
        self.capabilities.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.classes.len() + self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
