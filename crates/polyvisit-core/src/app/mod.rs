//! App - dispatch のアプリケーション層
//!
//! # 主要コンポーネント
//! - **HandlerResolver**: 型階層と capability グラフを探索して操作を 1 つ選ぶ
//! - **ResolutionCache**: 解決結果を (handler 型, 値の型) ごとにメモ化
//! - **Dispatcher**: 取得 → 呼び出し → 失敗の隔離
//! - **DispatcherBuilder**: 構築と起動時検証

pub mod resolver;
pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod builder;

pub use self::resolver::{Binding, HandlerResolver, MatchOrigin, SearchStep};
pub use self::cache::{Cached, ResolutionCache};
pub use self::config::DispatcherConfig;
pub use self::dispatcher::Dispatcher;
pub use self::builder::{BuildError, DispatcherBuilder};
