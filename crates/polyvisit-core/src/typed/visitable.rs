//! Visitable / Visitor - 値と handler の最小限の契約
//!
//! # 二層構造
//! - **値側**: `Visitable` を実装するだけ（`impl Visitable for Dog {}`）
//! - **handler 側**: `Visitor::visit` が唯一の入口。`Handler` を実装すれば自動で `Visitor` になる

use std::any::Any;

use crate::domain::errors::DispatchError;
use crate::domain::type_key::TypeKey;

/// Object-safe accessors, blanket-implemented for every sized `Visitable`.
pub trait AsVisitable {
    fn as_visitable(&self) -> &dyn Visitable;
    fn as_any(&self) -> &dyn Any;
    fn type_key(&self) -> TypeKey;
}

impl<T: Visitable> AsVisitable for T {
    fn as_visitable(&self) -> &dyn Visitable {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_key(&self) -> TypeKey {
        TypeKey::of::<T>()
    }
}

/// A value that can present itself to a visitor.
pub trait Visitable: AsVisitable + Send + Sync + 'static {
    /// Asks the visitor to dispatch on this value.
    fn accept(&self, visitor: &dyn Visitor) -> Result<(), DispatchError> {
        visitor.visit(self.as_visitable())
    }
}

/// A handler with a single dispatch entry point.
///
/// Only `DispatchError::ResolutionFatal` is ever returned; failures inside the
/// selected operation are recorded and swallowed.
pub trait Visitor: Send + Sync {
    fn visit(&self, value: &dyn Visitable) -> Result<(), DispatchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Leaf(u8);
    impl Visitable for Leaf {}

    #[derive(Default)]
    struct Collect {
        seen: Mutex<Vec<TypeKey>>,
    }

    impl Visitor for Collect {
        fn visit(&self, value: &dyn Visitable) -> Result<(), DispatchError> {
            self.seen.lock().push(value.type_key());
            Ok(())
        }
    }

    #[test]
    fn accept_presents_concrete_type() {
        let visitor = Collect::default();
        let boxed: Box<dyn Visitable> = Box::new(Leaf(3));
        boxed.accept(&visitor).unwrap();

        assert_eq!(*visitor.seen.lock(), vec![TypeKey::of::<Leaf>()]);
        assert_eq!(boxed.as_any().downcast_ref::<Leaf>().map(|l| l.0), Some(3));
    }
}
