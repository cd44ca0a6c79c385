//! # Utility functions and structs
//! Vulkanの本体には存在しないがあると便利なutilityの関数たち。
//! physical deviceの選択とlogical deviceの作成までの初期化処理をここで提供する。

mod query;
pub use query::*;
mod setup;
pub use setup::*;
