//! Errors - dispatch のエラー型と分類
//!
//! # 伝播ポリシー
//! - `DispatchError::ResolutionFatal`: handler 実装の不備。`dispatch` の呼び出し元へ伝播する
//! - `InvokeError`: 操作の実行失敗 / 引数を渡せない。sink に記録して握りつぶす
//! - `GraphError`: 型グラフの宣言ミス。起動時に返す

use super::type_key::TypeKey;

/// Error that crosses the dispatch boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("handler `{handler}` has no fallback operation; cannot handle value of type `{value}`")]
    ResolutionFatal {
        handler: &'static str,
        value: &'static str,
    },
}

/// Failure while invoking a resolved operation. Never leaves the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("operation failed")]
    Failed(#[source] anyhow::Error),

    #[error("operation expects `{expected}` but cannot view value of type `{value}` as it")]
    Access { expected: TypeKey, value: TypeKey },

    #[error("operation panicked: {0}")]
    Panicked(String),
}

impl InvokeError {
    /// Messages of the whole cause chain, outermost first.
    pub fn causes(&self) -> Vec<String> {
        match self {
            InvokeError::Failed(err) => err.chain().map(|cause| cause.to_string()).collect(),
            other => vec![other.to_string()],
        }
    }
}

/// Conflicting declarations in a `TypeGraph`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("type `{0}` is already declared")]
    AlreadyDeclared(&'static str),

    #[error("type `{0}` cannot extend itself")]
    SelfReference(&'static str),

    #[error("the root type cannot be redeclared")]
    RootRedeclared,
}
