//! Domain model (type identities, the declared type graph, errors, events).

pub mod type_key;
pub mod graph;
pub mod errors;
pub mod events;

pub use self::type_key::{Root, TypeKey, TypeKind};
pub use self::graph::{CapabilityDecl, ClassDecl, TypeGraph, Upcast};
pub use self::errors::{DispatchError, GraphError, InvokeError};
pub use self::events::DispatchEvent;
