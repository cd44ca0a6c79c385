use anyhow::{Context, Result};
use ashtray::{utils, DeviceHandle, InstanceHandle, SetupConfig, SurfaceHandle};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::ffi::CStr;
use winit::{
    dpi::PhysicalSize,
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::{Window, WindowBuilder},
};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;
const TITLE: &str = "Vulkan";

/// 初期化したVulkanのオブジェクトとwindowを保持する。
/// フィールドは宣言順に破棄されるので、Queue、Device、Surface、Instance、windowの順になる。
pub struct App {
    queues: utils::QueueHandles,
    device: DeviceHandle,
    surface: SurfaceHandle,
    instance: InstanceHandle,
    window: Window,
}
impl App {
    fn init(window: Window, config: &SetupConfig) -> Result<Self> {
        // instanceの作成
        let instance = InstanceHandle::new(config, window.raw_display_handle())
            .context("Failed to create instance")?;

        // surfaceの作成
        let surface = instance
            .create_surface(window.raw_display_handle(), window.raw_window_handle())
            .context("Failed to create surface")?;

        // physical deviceの選択
        let selected = utils::pick_physical_device(&instance, &surface, config.suitability)
            .context("Failed to pick physical device")?;
        let properties = instance.get_physical_device_properties(selected.physical_device);
        let device_name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };
        log::info!(
            "Selected physical device: {} ({:?})",
            device_name.to_string_lossy(),
            properties.device_type
        );

        // デバイスとキューの作成
        let logical_device = utils::create_logical_device(
            &instance,
            selected.physical_device,
            &selected.queue_families,
            instance.layer_names(),
        )
        .context("Failed to create logical device")?;
        log::info!(
            "Logical device created (graphics family: {}, present family: {})",
            logical_device.queues.graphics.family_index,
            logical_device.queues.present.family_index
        );

        Ok(Self {
            queues: logical_device.queues,
            device: logical_device.device,
            surface,
            instance,
            window,
        })
    }

    /// windowを作成して初期化処理を行い、windowが閉じられるまでイベントを処理する
    pub fn run() -> Result<()> {
        let event_loop = EventLoop::new()?;
        let window = WindowBuilder::new()
            .with_title(TITLE)
            .with_inner_size(PhysicalSize::new(WIDTH, HEIGHT))
            .with_resizable(false)
            .build(&event_loop)?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let app = Self::init(window, &SetupConfig::default())?;
        log::debug!(
            "Initialized {:?} / {:?} / {:?} on {:?} with {:?}",
            app.instance,
            app.surface,
            app.device,
            app.device.physical_device(),
            app.queues
        );

        let window_id = app.window.id();
        let mut app = Some(app);
        event_loop.run(move |event, elwt| match event {
            Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                window_id: id,
            } if id == window_id => {
                // windowを閉じる前にVulkanのオブジェクトを破棄する
                if let Some(app) = app.take() {
                    if let Err(err) = app.device.wait_idle() {
                        log::warn!("Failed to wait for device idle: {err}");
                    }
                }
                elwt.exit();
            }
            _ => (),
        })?;
        Ok(())
    }
}
