//! 参照カウンタで管理して、参照がすべて破棄された際に
//! Instanceの破棄の処理まで行うInstanceHandleを定義する。

use crate::utils::{self, InstanceRequest, LogicalDeviceFactory, PhysicalDeviceQuery};
use crate::{SetupConfig, SetupError};
use ash::{extensions::ext::DebugUtils, prelude::VkResult, vk};
use std::{
    ffi::{CStr, CString},
    fmt::Debug,
    ops::Deref,
    ptr::NonNull,
    sync::atomic::{fence, AtomicUsize, Ordering},
};

// debug utilsのコールバック関数
unsafe extern "system" fn vulkan_debug_utils_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_types: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let level = if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::Level::Error
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::Level::Warn
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        log::Level::Info
    } else {
        log::Level::Trace
    };
    let types = if message_types.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "[VALIDATION]"
    } else if message_types.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "[PERFORMANCE]"
    } else {
        "[GENERAL]"
    };
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message);
    log::log!(level, "{}{}", types, message.to_string_lossy());

    vk::FALSE
}

fn debug_utils_messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .flags(vk::DebugUtilsMessengerCreateFlagsEXT::empty())
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                // | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                // | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
        )
        .pfn_user_callback(Some(vulkan_debug_utils_callback))
        .build()
}

struct InstanceHandleData {
    entry: ash::Entry,
    instance: ash::Instance,
    layer_names: Vec<CString>,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
    ref_count: AtomicUsize,
}
impl InstanceHandleData {
    fn new(
        config: &SetupConfig,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
    ) -> Result<Self, SetupError> {
        let entry = unsafe { ash::Entry::load()? };

        // 利用可能なinstance拡張の一覧
        match entry.enumerate_instance_extension_properties(None) {
            Ok(extensions) => {
                log::debug!("available extensions:");
                for extension in extensions.iter() {
                    let name = unsafe { CStr::from_ptr(extension.extension_name.as_ptr()) };
                    log::debug!("\t{}", name.to_string_lossy());
                }
            }
            Err(err) => log::warn!("Failed to enumerate instance extensions: {err}"),
        }

        // window systemが必要とする拡張とdebug utils
        let mut extension_names = vec![];
        for &extension in ash_window::enumerate_required_extensions(raw_display_handle)
            .map_err(SetupError::RequiredExtensions)?
        {
            let name = unsafe { CStr::from_ptr(extension) };
            extension_names.push(name.to_owned());
        }
        if config.enable_validation {
            extension_names.push(DebugUtils::name().to_owned());
        }
        log::info!("Required instance extensions: {:?}", extension_names);

        let layer_names = config.enabled_layer_names()?;
        let request = InstanceRequest {
            application_name: CString::new(config.application_name.as_str())?,
            engine_name: CString::new(config.engine_name.as_str())?,
            api_version: config.api_version,
            extension_names,
            layer_names: layer_names.clone(),
        };

        // instanceの作成とdebug utilsの設定
        let mut debug_utils_messenger_create_info = debug_utils_messenger_create_info();
        let instance = utils::create_instance(
            &entry,
            &request,
            config
                .enable_validation
                .then_some(&mut debug_utils_messenger_create_info),
        )?;

        let debug_utils = if config.enable_validation {
            let debug_utils_loader = DebugUtils::new(&entry, &instance);
            let messenger = unsafe {
                debug_utils_loader
                    .create_debug_utils_messenger(&debug_utils_messenger_create_info, None)
            };
            match messenger {
                Ok(messenger) => Some((debug_utils_loader, messenger)),
                Err(err) => {
                    log::warn!("Failed to create debug utils messenger: {err}");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            layer_names,
            debug_utils,
            ref_count: AtomicUsize::new(1),
        })
    }
}

/// ash::Instanceを参照カウントで管理するためのハンドル
pub struct InstanceHandle {
    ptr: NonNull<InstanceHandleData>,
}
impl InstanceHandle {
    /// Instanceを作成する。
    /// validationを要求している場合は、layerが利用可能でなければInstanceを作成せずに失敗する。
    pub fn new(
        config: &SetupConfig,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
    ) -> Result<Self, SetupError> {
        let data = Box::new(InstanceHandleData::new(config, raw_display_handle)?);
        let ptr = unsafe { NonNull::new_unchecked(Box::into_raw(data)) };
        Ok(Self { ptr })
    }

    // create系

    /// SurfaceHandleを作成する
    pub fn create_surface(
        &self,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
    ) -> Result<crate::SurfaceHandle, SetupError> {
        crate::SurfaceHandle::new(self.clone(), raw_display_handle, raw_window_handle)
            .map_err(SetupError::SurfaceCreation)
    }

    /// DeviceHandleを作成する
    pub fn create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        device_create_info: &vk::DeviceCreateInfo,
    ) -> VkResult<crate::DeviceHandle> {
        crate::DeviceHandle::new(self.clone(), physical_device, device_create_info)
    }

    // instanceの各関数

    /// physical deviceを列挙する
    pub fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        unsafe { self.data().instance.enumerate_physical_devices() }
    }

    /// physical deviceのQueueFamilyを取得する
    pub fn get_physical_device_queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        unsafe {
            self.data()
                .instance
                .get_physical_device_queue_family_properties(physical_device)
        }
    }

    /// physical deviceのプロパティを取得する
    pub fn get_physical_device_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceProperties {
        unsafe {
            self.data()
                .instance
                .get_physical_device_properties(physical_device)
        }
    }

    /// Instanceに有効にしたlayerの名前。validationが無効なら空。
    pub fn layer_names(&self) -> &[CString] {
        &self.data().layer_names
    }

    // raw

    /// ash::Entryを取得する
    pub fn entry(&self) -> &ash::Entry {
        &self.data().entry
    }

    fn data(&self) -> &InstanceHandleData {
        unsafe { self.ptr.as_ref() }
    }
}

impl PhysicalDeviceQuery for InstanceHandle {
    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        InstanceHandle::enumerate_physical_devices(self)
    }

    fn get_physical_device_queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        InstanceHandle::get_physical_device_queue_family_properties(self, physical_device)
    }
}

impl LogicalDeviceFactory for InstanceHandle {
    type Device = crate::DeviceHandle;

    unsafe fn create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        device_create_info: &vk::DeviceCreateInfo,
    ) -> VkResult<Self::Device> {
        InstanceHandle::create_device(self, physical_device, device_create_info)
    }
}

// Debugトレイトの実装
impl Debug for InstanceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceHandle")
            .field("instance", &self.data().instance.handle())
            .finish()
    }
}

// InstanceHandleDataの中身はSendかつSyncなのでInstanceHandleはSend
unsafe impl Send for InstanceHandle {}
// InstanceHandleDataの中身はSendかつSyncなのでInstanceHandleはSync
unsafe impl Sync for InstanceHandle {}

// InstanceHandleはash::InstanceにDerefする
impl Deref for InstanceHandle {
    type Target = ash::Instance;
    fn deref(&self) -> &Self::Target {
        &self.data().instance
    }
}

// Cloneで参照カウントを増やす
impl Clone for InstanceHandle {
    fn clone(&self) -> Self {
        if self.data().ref_count.fetch_add(1, Ordering::Relaxed) > usize::MAX / 2 {
            panic!("Too many references to InstanceHandle");
        }
        Self { ptr: self.ptr }
    }
}

// Drop時に参照カウントを減らし、0になったら破棄する
impl Drop for InstanceHandle {
    fn drop(&mut self) {
        if self.data().ref_count.fetch_sub(1, Ordering::Release) == 1 {
            fence(Ordering::Acquire);
            unsafe {
                let data = Box::from_raw(self.ptr.as_ptr());

                // debug utilsの破棄
                if let Some((debug_utils_loader, messenger)) = &data.debug_utils {
                    debug_utils_loader.destroy_debug_utils_messenger(*messenger, None);
                }

                // instanceの破棄
                data.instance.destroy_instance(None);
                log::debug!("Instance destroyed");
            }
        }
    }
}
