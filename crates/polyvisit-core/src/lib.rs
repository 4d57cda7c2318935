//! polyvisit-core
//!
//! 明示的な登録表による多重ディスパッチ（visitor）の実行時ライブラリ。
//!
//! # モジュール構成
//! - **domain**: 型の識別子、型グラフ（クラス階層 + capability）、エラー、イベント
//! - **typed**: `Visitable` / `Visitor` / `Handler` の契約と `HandlerTable`
//! - **app**: resolver, cache, dispatcher, builder
//! - **ports**: `DispatchSink`（診断レコードの受け口）
//! - **impls**: `TracingSink`, `MemorySink`
//! - observability: ログ初期化とキャッシュ統計

pub mod domain;
pub mod typed;
pub mod app;
pub mod ports;
pub mod impls;
pub mod observability;

#[cfg(test)]
pub(crate) mod fixtures;

pub use crate::app::{Binding, Dispatcher, DispatcherBuilder, DispatcherConfig, MatchOrigin};
pub use crate::domain::{CapabilityDecl, ClassDecl, DispatchError, DispatchEvent, Root, TypeGraph, TypeKey};
pub use crate::ports::DispatchSink;
pub use crate::typed::{Handler, HandlerTable, Visitable, Visitor};
