//! Vulkanの初期化処理でdestroy処理を忘れたりすることをなくすために用意したラッパーライブラリ。
//! Instance、Surface、Deviceを参照カウンタで管理して、参照がすべて破棄された際に
//! 自動で各種destroy処理を行うようにしたラッパーの構造体の各種Handleが用意されている。
//!
//! SurfaceHandleとDeviceHandleはInstanceHandleの参照を保持するので、
//! Instanceは常に最後に破棄される。
//!
//! physical deviceの選択やlogical deviceの作成といった判断を含む処理はutilsの中で提供する。
//! utilsの関数はVulkanへの問い合わせをtraitを通して行うので、ドライバなしでもテストできる。
#![warn(missing_docs)]

mod config;
pub use config::{SetupConfig, SuitabilityPolicy, DEFAULT_VALIDATION_LAYERS};
mod error;
pub use error::SetupError;

pub mod handles;
pub use handles::*;

pub mod utils;
