//! 参照カウンタで管理して、参照がすべて破棄された際に
//! Deviceの破棄の処理まで行うDeviceHandleを定義する。

use crate::utils::DeviceQueueSource;
use ash::{prelude::VkResult, vk};
use std::{
    fmt::Debug,
    ops::Deref,
    ptr::NonNull,
    sync::atomic::{fence, AtomicUsize, Ordering},
};

struct DeviceHandleData {
    // Deviceより先にInstanceが破棄されないように保持しておく
    _instance: crate::InstanceHandle,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    ref_count: AtomicUsize,
}
impl DeviceHandleData {
    fn new(
        instance: crate::InstanceHandle,
        physical_device: vk::PhysicalDevice,
        device_create_info: &vk::DeviceCreateInfo,
    ) -> VkResult<Self> {
        // create device
        let device = unsafe {
            ash::Instance::create_device(&instance, physical_device, device_create_info, None)?
        };

        Ok(Self {
            _instance: instance,
            physical_device,
            device,
            ref_count: AtomicUsize::new(1),
        })
    }
}

/// ash::Deviceを参照カウントで管理するためのハンドル。
/// Deviceから取得したQueueはDeviceと一緒に破棄される。
pub struct DeviceHandle {
    ptr: NonNull<DeviceHandleData>,
}
impl DeviceHandle {
    pub(crate) fn new(
        instance_handle: crate::InstanceHandle,
        physical_device: vk::PhysicalDevice,
        device_create_info: &vk::DeviceCreateInfo,
    ) -> VkResult<Self> {
        let data = Box::new(DeviceHandleData::new(
            instance_handle,
            physical_device,
            device_create_info,
        )?);
        let ptr = unsafe { NonNull::new_unchecked(Box::into_raw(data)) };
        Ok(Self { ptr })
    }

    // Deviceの関数

    /// Queueを取得する
    pub fn get_device_queue(&self, queue_family_index: u32, queue_index: u32) -> vk::Queue {
        unsafe {
            self.data()
                .device
                .get_device_queue(queue_family_index, queue_index)
        }
    }

    /// Deviceがidleになるまで待つ
    pub fn wait_idle(&self) -> VkResult<()> {
        unsafe { self.data().device.device_wait_idle() }
    }

    /// Deviceの作成元のphysical device
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.data().physical_device
    }

    fn data(&self) -> &DeviceHandleData {
        unsafe { self.ptr.as_ref() }
    }
}

impl DeviceQueueSource for DeviceHandle {
    fn get_device_queue(&self, queue_family_index: u32, queue_index: u32) -> vk::Queue {
        DeviceHandle::get_device_queue(self, queue_family_index, queue_index)
    }
}

// Debugトレイトの実装
impl Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("device", &self.data().device.handle())
            .field("physical_device", &self.data().physical_device)
            .finish()
    }
}

// DeviceHandleDataの中身はSendかつSyncなのでDeviceHandleはSend
unsafe impl Send for DeviceHandle {}
// DeviceHandleDataの中身はSendかつSyncなのでDeviceHandleはSync
unsafe impl Sync for DeviceHandle {}

// DeviceHandleはash::DeviceにDerefする
impl Deref for DeviceHandle {
    type Target = ash::Device;
    fn deref(&self) -> &Self::Target {
        &self.data().device
    }
}

// Cloneで参照カウントを増やす
impl Clone for DeviceHandle {
    fn clone(&self) -> Self {
        if self.data().ref_count.fetch_add(1, Ordering::Relaxed) > usize::MAX / 2 {
            panic!("Too many references to DeviceHandle");
        }
        Self { ptr: self.ptr }
    }
}

// Drop時に参照カウントを減らし、0になったら破棄する
impl Drop for DeviceHandle {
    fn drop(&mut self) {
        if self.data().ref_count.fetch_sub(1, Ordering::Release) == 1 {
            fence(Ordering::Acquire);
            unsafe {
                let data = Box::from_raw(self.ptr.as_ptr());

                // Deviceの破棄
                data.device.destroy_device(None);
                log::debug!("Device destroyed");
            }
        }
    }
}
