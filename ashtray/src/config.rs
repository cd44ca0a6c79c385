use ash::vk;
use std::ffi::CString;

#[cfg(feature = "validation")]
const ENABLE_VALIDATION_LAYERS: bool = true;
#[cfg(not(feature = "validation"))]
const ENABLE_VALIDATION_LAYERS: bool = false;

/// validationを有効にした時に要求するlayerの名前
pub const DEFAULT_VALIDATION_LAYERS: [&str; 1] = ["VK_LAYER_KHRONOS_validation"];

/// physical deviceを適合とみなす条件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuitabilityPolicy {
    /// Graphics Queueに対応したQueueFamilyがあれば適合とする。
    /// presentに対応していなくても選択されるので、logical deviceの作成で失敗しうる。
    GraphicsOnly,
    /// GraphicsとPresentの両方に対応したQueueFamilyがある場合のみ適合とする
    #[default]
    GraphicsAndPresent,
}

/// 初期化処理の設定
#[derive(Debug, Clone)]
pub struct SetupConfig {
    /// ApplicationInfoに渡すアプリケーション名
    pub application_name: String,
    /// ApplicationInfoに渡すエンジン名
    pub engine_name: String,
    /// 要求するVulkanのAPIバージョン
    pub api_version: u32,
    /// validation layerを要求するかどうか
    pub enable_validation: bool,
    /// 要求するvalidation layerの名前
    pub validation_layers: Vec<String>,
    /// physical deviceの適合条件
    pub suitability: SuitabilityPolicy,
}
impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            application_name: "Hello Triangle".to_owned(),
            engine_name: "No Engine".to_owned(),
            api_version: vk::API_VERSION_1_0,
            enable_validation: ENABLE_VALIDATION_LAYERS,
            validation_layers: DEFAULT_VALIDATION_LAYERS
                .iter()
                .map(|l| l.to_string())
                .collect(),
            suitability: SuitabilityPolicy::default(),
        }
    }
}
impl SetupConfig {
    /// 有効なlayerの名前のリストを取得する。
    /// validationが無効な場合は空になる。
    pub fn enabled_layer_names(&self) -> Result<Vec<CString>, crate::SetupError> {
        if !self.enable_validation {
            return Ok(vec![]);
        }
        let layer_names = self
            .validation_layers
            .iter()
            .map(|l| CString::new(l.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(layer_names)
    }
}
