//! Typed - 値側と handler 側の契約、および処理操作の登録表
//!
//! # 二層構造
//! - **表層（Typed）**: `Visitable`, `Handler`, `HandlerTableBuilder::on::<T>` - 型安全
//! - **内部（Dyn）**: `DynOperation<H>` - object-safe, type erasure

pub mod visitable;
pub mod handler;
pub mod table;

pub use self::visitable::{AsVisitable, Visitable, Visitor};
pub use self::handler::{DynOperation, ErasedOperation, Handler, TypedOperation};
pub use self::table::{Declared, HandlerTable, HandlerTableBuilder, HandlerTypeId, RegistryError};
