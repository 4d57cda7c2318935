//! Handler / Operation - handler 型と、その型が宣言する処理操作
//!
//! # 学習ポイント
//! - 型付きクロージャ (`Fn(&H, &T)`) の登録
//! - Object-safe trait (`DynOperation<H>`) による type erasure
//! - `TypedOperation<H, T, F>` → `DynOperation<H>` の変換（downcast 失敗は `InvokeError::Access`）

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::app::dispatcher::Dispatcher;
use crate::domain::errors::{DispatchError, InvokeError};
use crate::domain::type_key::TypeKey;

use super::table::HandlerTable;
use super::visitable::{Visitable, Visitor};

/// A handler type whose operations live in an explicitly built `HandlerTable`.
///
/// The resolution cache is keyed by table identity, so build the table once per
/// handler type and hand the same `Arc` to every instance (e.g. from a `OnceLock`).
/// A rebuilt table counts as a reloaded handler type: it starts with an empty cache
/// and the old table's entries are purged once it is dropped.
///
/// # 使用例
/// ```ignore
/// struct Printer {
///     table: Arc<HandlerTable<Printer>>,
///     dispatcher: Dispatcher,
/// }
///
/// impl Handler for Printer {
///     fn table(&self) -> &Arc<HandlerTable<Self>> { &self.table }
///     fn dispatcher(&self) -> &Dispatcher { &self.dispatcher }
/// }
///
/// printer.visit(&dog)?; // Visitor is implemented for every Handler
/// ```
pub trait Handler: Send + Sync + Sized + 'static {
    fn table(&self) -> &Arc<HandlerTable<Self>>;
    fn dispatcher(&self) -> &Dispatcher;
}

impl<H: Handler> Visitor for H {
    fn visit(&self, value: &dyn Visitable) -> Result<(), DispatchError> {
        self.dispatcher().dispatch(self, value)
    }
}

/// DynOperation は object-safe な処理操作
///
/// `view` は値そのもの、またはクラス階層を upcast した親の部分です。
/// upcast できなかった場合は `None` になります。
pub trait DynOperation<H>: Send + Sync {
    fn call(&self, handler: &H, value: &dyn Visitable, view: Option<&dyn Any>)
    -> Result<(), InvokeError>;

    /// Declared parameter type.
    fn param(&self) -> TypeKey;
}

/// Operation receiving a typed borrow of its parameter.
pub struct TypedOperation<H, T, F> {
    op: F,
    _marker: PhantomData<fn(&H, &T)>,
}

impl<H, T, F> TypedOperation<H, T, F>
where
    T: Any,
    F: Fn(&H, &T) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(op: F) -> Self {
        Self {
            op,
            _marker: PhantomData,
        }
    }
}

impl<H, T, F> DynOperation<H> for TypedOperation<H, T, F>
where
    T: Any,
    F: Fn(&H, &T) -> anyhow::Result<()> + Send + Sync,
{
    fn call(
        &self,
        handler: &H,
        value: &dyn Visitable,
        view: Option<&dyn Any>,
    ) -> Result<(), InvokeError> {
        let arg = view
            .and_then(|view| view.downcast_ref::<T>())
            .ok_or_else(|| InvokeError::Access {
                expected: TypeKey::of::<T>(),
                value: value.type_key(),
            })?;
        (self.op)(handler, arg).map_err(InvokeError::Failed)
    }

    fn param(&self) -> TypeKey {
        TypeKey::of::<T>()
    }
}

/// Operation receiving the value erased, for capabilities, abstract classes and the root.
pub struct ErasedOperation<H, F> {
    param: TypeKey,
    op: F,
    _marker: PhantomData<fn(&H)>,
}

impl<H, F> ErasedOperation<H, F>
where
    F: Fn(&H, &dyn Visitable) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(param: TypeKey, op: F) -> Self {
        Self {
            param,
            op,
            _marker: PhantomData,
        }
    }
}

impl<H, F> DynOperation<H> for ErasedOperation<H, F>
where
    F: Fn(&H, &dyn Visitable) -> anyhow::Result<()> + Send + Sync,
{
    fn call(
        &self,
        handler: &H,
        value: &dyn Visitable,
        _view: Option<&dyn Any>,
    ) -> Result<(), InvokeError> {
        (self.op)(handler, value).map_err(InvokeError::Failed)
    }

    fn param(&self) -> TypeKey {
        self.param
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Animal, Dog};

    struct Counter;

    #[test]
    fn typed_operation_receives_view() {
        let op = TypedOperation::<Counter, Animal, _>::new(|_, animal: &Animal| {
            anyhow::ensure!(animal.name == "rex", "unexpected name {}", animal.name);
            Ok(())
        });
        let dog = Dog::new("rex", "collie");
        op.call(&Counter, &dog, Some(&dog.animal)).unwrap();
        assert_eq!(op.param(), TypeKey::of::<Animal>());
    }

    #[test]
    fn typed_operation_without_view_is_access_failure() {
        let op = TypedOperation::<Counter, Animal, _>::new(|_, _: &Animal| Ok(()));
        let dog = Dog::new("rex", "collie");

        let err = op.call(&Counter, &dog, None).unwrap_err();
        assert!(matches!(err, InvokeError::Access { expected, .. } if expected == TypeKey::of::<Animal>()));

        let err = op.call(&Counter, &dog, Some(&dog)).unwrap_err();
        assert!(matches!(err, InvokeError::Access { .. }));
    }

    #[test]
    fn erased_operation_propagates_error() {
        let op = ErasedOperation::<Counter, _>::new(TypeKey::root(), |_, value: &dyn Visitable| {
            anyhow::bail!("cannot handle {}", value.type_key().short_name())
        });
        let dog = Dog::new("rex", "collie");
        let err = op.call(&Counter, &dog, None).unwrap_err();
        assert_eq!(err.causes(), vec!["cannot handle Dog".to_string()]);
    }
}
