//! 参照カウンタで管理して、参照がすべて破棄された際に
//! Surfaceの破棄の処理まで行うSurfaceHandleを定義する。

use crate::utils::PresentationSupport;
use ash::{extensions::khr::Surface, prelude::VkResult, vk};
use std::{
    fmt::Debug,
    ops::Deref,
    ptr::NonNull,
    sync::atomic::{fence, AtomicUsize, Ordering},
};

struct SurfaceHandleData {
    // Surfaceより先にInstanceが破棄されないように保持しておく
    _instance: crate::InstanceHandle,
    surface_loader: Surface,
    surface: vk::SurfaceKHR,
    ref_count: AtomicUsize,
}
impl SurfaceHandleData {
    fn new(
        instance_handle: crate::InstanceHandle,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
    ) -> VkResult<Self> {
        // surfaceの作成
        let (surface_loader, surface) = unsafe {
            let surface_loader = Surface::new(instance_handle.entry(), &instance_handle);
            let surface = ash_window::create_surface(
                instance_handle.entry(),
                &instance_handle,
                raw_display_handle,
                raw_window_handle,
                None,
            )?;
            (surface_loader, surface)
        };

        Ok(Self {
            _instance: instance_handle,
            surface_loader,
            surface,
            ref_count: AtomicUsize::new(1),
        })
    }
}

/// vk::SurfaceKHRを参照カウントで管理するためのハンドル
pub struct SurfaceHandle {
    ptr: NonNull<SurfaceHandleData>,
}
impl SurfaceHandle {
    pub(crate) fn new(
        instance_handle: crate::InstanceHandle,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
    ) -> VkResult<Self> {
        let data = Box::new(SurfaceHandleData::new(
            instance_handle,
            raw_display_handle,
            raw_window_handle,
        )?);
        let ptr = unsafe { NonNull::new_unchecked(Box::into_raw(data)) };
        Ok(Self { ptr })
    }

    // surfaceの関数

    /// PhysicalDeviceのQueueFamilyがSurfaceをサポートしているか確認する
    pub fn get_physical_device_surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> VkResult<bool> {
        unsafe {
            self.data()
                .surface_loader
                .get_physical_device_surface_support(
                    physical_device,
                    queue_family_index,
                    self.data().surface,
                )
        }
    }

    fn data(&self) -> &SurfaceHandleData {
        unsafe { self.ptr.as_ref() }
    }
}

impl PresentationSupport for SurfaceHandle {
    fn get_physical_device_surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> VkResult<bool> {
        SurfaceHandle::get_physical_device_surface_support(self, physical_device, queue_family_index)
    }
}

// Debugトレイトの実装
impl Debug for SurfaceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceHandle")
            .field("surface", &self.data().surface)
            .finish()
    }
}

// SurfaceHandleDataの中身はSendかつSyncなのでSurfaceHandleはSend
unsafe impl Send for SurfaceHandle {}
// SurfaceHandleDataの中身はSendかつSyncなのでSurfaceHandleはSync
unsafe impl Sync for SurfaceHandle {}

// SurfaceHandleはvk::SurfaceKHRにDerefする
impl Deref for SurfaceHandle {
    type Target = vk::SurfaceKHR;
    fn deref(&self) -> &Self::Target {
        &self.data().surface
    }
}

// Cloneで参照カウントを増やす
impl Clone for SurfaceHandle {
    fn clone(&self) -> Self {
        if self.data().ref_count.fetch_add(1, Ordering::Relaxed) > usize::MAX / 2 {
            panic!("Too many references to SurfaceHandle");
        }
        Self { ptr: self.ptr }
    }
}

// Drop時に参照カウントを減らし、0になったら破棄する
impl Drop for SurfaceHandle {
    fn drop(&mut self) {
        if self.data().ref_count.fetch_sub(1, Ordering::Release) == 1 {
            fence(Ordering::Acquire);
            unsafe {
                let data = Box::from_raw(self.ptr.as_ptr());

                // Surfaceの破棄
                // dataがdropされた後にInstanceの参照カウントが減る
                data.surface_loader.destroy_surface(data.surface, None);
                log::debug!("Surface destroyed");
            }
        }
    }
}
