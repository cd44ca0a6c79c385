use ash::vk;
use thiserror::Error;

/// 初期化処理の中で発生するエラー
#[derive(Debug, Error)]
pub enum SetupError {
    /// Vulkanのローダーを読み込めなかった
    #[error("failed to load the Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    /// 利用可能なlayerの列挙に失敗した
    #[error("failed to enumerate instance layers: {0}")]
    LayerEnumeration(vk::Result),

    /// 要求したvalidation layerが存在しない
    #[error("validation layers requested, but not available: {}", .missing.join(", "))]
    ValidationLayerUnavailable {
        /// 見つからなかったlayerの名前
        missing: Vec<String>,
    },

    /// window systemが必要とするinstance拡張を取得できなかった
    #[error("failed to get the instance extensions required by the window system: {0}")]
    RequiredExtensions(vk::Result),

    /// 名前にNUL文字が含まれている
    #[error("invalid name: {0}")]
    InvalidName(#[from] std::ffi::NulError),

    /// vkCreateInstanceが失敗した
    #[error("failed to create instance: {0}")]
    InstanceCreation(vk::Result),

    /// surfaceの作成に失敗した
    #[error("failed to create window surface: {0}")]
    SurfaceCreation(vk::Result),

    /// physical deviceの列挙に失敗した
    #[error("failed to enumerate physical devices: {0}")]
    PhysicalDeviceEnumeration(vk::Result),

    /// physical deviceが一つも存在しない
    #[error("failed to find GPUs with Vulkan support")]
    NoCompatibleDevice,

    /// 条件を満たすphysical deviceが存在しない
    #[error("failed to find a suitable GPU")]
    NoSuitableDevice,

    /// QueueFamilyのindexが揃っていない状態でlogical deviceを作成しようとした
    #[error("queue family indices are incomplete (graphics: {graphics:?}, present: {present:?})")]
    IncompleteQueueFamilies {
        /// Graphics QueueFamilyのindex
        graphics: Option<u32>,
        /// Present QueueFamilyのindex
        present: Option<u32>,
    },

    /// vkCreateDeviceが失敗した
    #[error("failed to create logical device: {0}")]
    DeviceCreation(vk::Result),
}
