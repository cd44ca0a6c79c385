//! 初期化処理がVulkanに問い合わせる部分をtraitとして切り出したもの。
//! 実際のVulkanに対する実装は各Handleとash::Entryが持つ。

use ash::{prelude::VkResult, vk};

/// Instanceの作成前に使う関数群
pub trait InstanceLoader {
    /// 作成されるInstanceの型
    type Instance;

    /// 利用可能なinstance layerを列挙する
    fn enumerate_instance_layer_properties(&self) -> VkResult<Vec<vk::LayerProperties>>;

    /// Instanceを作成する
    ///
    /// ## Safety
    /// create_infoが指すポインタはすべて有効である必要がある。
    unsafe fn create_instance(
        &self,
        create_info: &vk::InstanceCreateInfo,
    ) -> VkResult<Self::Instance>;
}

/// physical deviceの列挙とQueueFamilyの問い合わせ
pub trait PhysicalDeviceQuery {
    /// physical deviceを列挙順に取得する
    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>>;

    /// physical deviceのQueueFamilyをindex順に取得する
    fn get_physical_device_queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties>;
}

/// QueueFamilyがsurfaceへのpresentに対応しているかの問い合わせ
pub trait PresentationSupport {
    /// queue_family_indexのQueueFamilyがsurfaceにpresentできるか確認する
    fn get_physical_device_surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> VkResult<bool>;
}

/// logical deviceの作成
pub trait LogicalDeviceFactory {
    /// 作成されるDeviceの型
    type Device: DeviceQueueSource;

    /// logical deviceを作成する
    ///
    /// ## Safety
    /// device_create_infoが指すポインタはすべて有効である必要がある。
    unsafe fn create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        device_create_info: &vk::DeviceCreateInfo,
    ) -> VkResult<Self::Device>;
}

/// logical deviceからのQueueの取得
pub trait DeviceQueueSource {
    /// QueueFamilyのindexとQueueのindexからQueueを取得する
    fn get_device_queue(&self, queue_family_index: u32, queue_index: u32) -> vk::Queue;
}

impl InstanceLoader for ash::Entry {
    type Instance = ash::Instance;

    fn enumerate_instance_layer_properties(&self) -> VkResult<Vec<vk::LayerProperties>> {
        ash::Entry::enumerate_instance_layer_properties(self)
    }

    unsafe fn create_instance(
        &self,
        create_info: &vk::InstanceCreateInfo,
    ) -> VkResult<Self::Instance> {
        ash::Entry::create_instance(self, create_info, None)
    }
}
