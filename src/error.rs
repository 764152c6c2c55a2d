// src/error.rs
//! テーブルエンジンの境界 (JSON 入出力・ポインタ入力) で起きるエラー。
//! レイアウト計算などの純粋関数はエラーを返さず、値をクランプ/デフォルトするだけ。

use thiserror::Error;

use crate::components::stack::{CardId, RegionId};

#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to parse layout descriptor: {0}")]
    LayoutParse(#[source] serde_json::Error),

    #[error("failed to parse table state: {0}")]
    StateParse(#[source] serde_json::Error),

    #[error("failed to parse engine config: {0}")]
    ConfigParse(#[source] serde_json::Error),

    #[error("failed to parse server message: {0}")]
    MessageParse(#[source] serde_json::Error),

    #[error("failed to serialize: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("card {0} is not part of any stack on the table")]
    UnknownCard(CardId),

    #[error("region {0} is not declared in the layout")]
    UnknownRegion(RegionId),

    #[error("region {0} is declared more than once")]
    DuplicateRegion(RegionId),
}

pub type TableResult<T> = Result<T, TableError>;
