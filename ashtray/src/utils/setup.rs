use super::query::{
    DeviceQueueSource, InstanceLoader, LogicalDeviceFactory, PhysicalDeviceQuery,
    PresentationSupport,
};
use crate::{SetupError, SuitabilityPolicy};
use ash::vk;
use std::collections::BTreeSet;
use std::ffi::{CStr, CString};

/// Instanceの作成に必要な情報
#[derive(Debug, Clone)]
pub struct InstanceRequest {
    /// アプリケーション名
    pub application_name: CString,
    /// エンジン名
    pub engine_name: CString,
    /// VulkanのAPIバージョン
    pub api_version: u32,
    /// 有効にするinstance拡張
    pub extension_names: Vec<CString>,
    /// 有効にするlayer。空ならvalidationは行わない。
    pub layer_names: Vec<CString>,
}

/// 要求したlayerがすべて利用可能か確認する関数。
/// 見つからなかったlayerがある場合はValidationLayerUnavailableを返す。
pub fn check_validation_layer_support<L: InstanceLoader + ?Sized>(
    loader: &L,
    layer_names: &[CString],
) -> Result<(), SetupError> {
    let available_layers = loader
        .enumerate_instance_layer_properties()
        .map_err(SetupError::LayerEnumeration)?;
    let available_layers = available_layers
        .iter()
        .map(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) })
        .collect::<Vec<_>>();

    let missing = layer_names
        .iter()
        .filter(|name| !available_layers.contains(&name.as_c_str()))
        .map(|name| name.to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(SetupError::ValidationLayerUnavailable { missing });
    }
    Ok(())
}

/// Instanceを作成する関数。
/// layerを要求している場合は、作成の前にlayerが利用可能か確認する。
/// debug_messenger_create_infoを渡すと、Instanceの作成と破棄の間のメッセージも受け取れるようにpush_nextする。
pub fn create_instance<L: InstanceLoader + ?Sized>(
    loader: &L,
    request: &InstanceRequest,
    debug_messenger_create_info: Option<&mut vk::DebugUtilsMessengerCreateInfoEXT>,
) -> Result<L::Instance, SetupError> {
    if !request.layer_names.is_empty() {
        check_validation_layer_support(loader, &request.layer_names)?;
    }

    let app_info = vk::ApplicationInfo::builder()
        .application_name(&request.application_name)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(&request.engine_name)
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(request.api_version);
    let extension_names = request
        .extension_names
        .iter()
        .map(|e| e.as_ptr())
        .collect::<Vec<_>>();
    let layer_names = request
        .layer_names
        .iter()
        .map(|l| l.as_ptr())
        .collect::<Vec<_>>();
    let mut instance_create_info = vk::InstanceCreateInfo::builder()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names);
    if let Some(debug_messenger_create_info) = debug_messenger_create_info {
        instance_create_info = instance_create_info.push_next(debug_messenger_create_info);
    }

    unsafe { loader.create_instance(&instance_create_info) }.map_err(SetupError::InstanceCreation)
}

/// 各種QueueFamilyのindexを格納する構造体。
/// 対応するQueueFamilyが見つからなかったものはNoneになる。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Graphics QueueFamilyのindex
    pub graphics_family: Option<u32>,
    /// surfaceにpresentできるQueueFamilyのindex
    pub present_family: Option<u32>,
}
impl QueueFamilyIndices {
    /// すべてのQueueFamilyが見つかっているか
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// すべてのindexが揃っている場合にQueueIndicesに変換する
    pub fn resolve(&self) -> Result<QueueIndices, SetupError> {
        match (self.graphics_family, self.present_family) {
            (Some(graphics_index), Some(present_index)) => Ok(QueueIndices {
                graphics_index,
                present_index,
            }),
            (graphics, present) => Err(SetupError::IncompleteQueueFamilies { graphics, present }),
        }
    }
}

/// 各種Queueのindexを格納する構造体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueIndices {
    /// Graphics Queueのindex
    pub graphics_index: u32,
    /// Present Queueのindex
    pub present_index: u32,
}
impl QueueIndices {
    /// 重複を除いたQueueFamilyのindexのリスト
    pub fn unique_families(&self) -> Vec<u32> {
        let mut unique_queue_families = BTreeSet::new();
        unique_queue_families.insert(self.graphics_index);
        unique_queue_families.insert(self.present_index);
        unique_queue_families.into_iter().collect()
    }
}

impl SuitabilityPolicy {
    /// QueueFamilyの検索結果が条件を満たすか
    pub fn is_suitable(&self, indices: &QueueFamilyIndices) -> bool {
        match self {
            SuitabilityPolicy::GraphicsOnly => indices.graphics_family.is_some(),
            SuitabilityPolicy::GraphicsAndPresent => indices.is_complete(),
        }
    }
}

/// physical deviceのQueueFamilyを検索する関数。
///
/// Graphicsは最初に見つかったQueueFamilyを使う。
/// presentの確認はGraphicsの結果とは関係なく各QueueFamilyで毎回行い、
/// presentできるQueueFamilyが見つかるたびに記録を更新する。
/// 両方見つかった時点で検索を打ち切る。
pub fn find_queue_families<I, S>(
    instance: &I,
    surface: &S,
    physical_device: vk::PhysicalDevice,
) -> QueueFamilyIndices
where
    I: PhysicalDeviceQuery + ?Sized,
    S: PresentationSupport + ?Sized,
{
    let mut indices = QueueFamilyIndices::default();
    let queue_families = instance.get_physical_device_queue_family_properties(physical_device);
    for (i, queue_family) in queue_families.iter().enumerate() {
        let i = i as u32;
        if indices.graphics_family.is_none()
            && queue_family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        {
            indices.graphics_family = Some(i);
        }
        let present_support = surface
            .get_physical_device_surface_support(physical_device, i)
            .unwrap_or_else(|err| {
                log::warn!("Failed to query surface support of queue family {i}: {err}");
                false
            });
        if present_support {
            indices.present_family = Some(i);
        }
        if indices.is_complete() {
            break;
        }
    }
    indices
}

/// 選択されたphysical deviceとそのQueueFamilyのindex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectedPhysicalDevice {
    /// 選択されたphysical device
    pub physical_device: vk::PhysicalDevice,
    /// 選択時に検索したQueueFamilyのindex
    pub queue_families: QueueFamilyIndices,
}

/// 適当なphysical deviceを選択する関数。
/// 列挙順で最初に条件を満たしたものを選ぶ。
pub fn pick_physical_device<I, S>(
    instance: &I,
    surface: &S,
    policy: SuitabilityPolicy,
) -> Result<SelectedPhysicalDevice, SetupError>
where
    I: PhysicalDeviceQuery + ?Sized,
    S: PresentationSupport + ?Sized,
{
    let physical_devices = instance
        .enumerate_physical_devices()
        .map_err(SetupError::PhysicalDeviceEnumeration)?;
    if physical_devices.is_empty() {
        return Err(SetupError::NoCompatibleDevice);
    }

    physical_devices
        .into_iter()
        .find_map(|physical_device| {
            let queue_families = find_queue_families(instance, surface, physical_device);
            let suitable = policy.is_suitable(&queue_families);
            log::debug!(
                "Physical device candidate {:?}: {:?} (suitable: {})",
                physical_device,
                queue_families,
                suitable
            );
            suitable.then_some(SelectedPhysicalDevice {
                physical_device,
                queue_families,
            })
        })
        .ok_or(SetupError::NoSuitableDevice)
}

/// Queueとそのindexを格納する構造体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueHandle {
    /// Queueのハンドル
    pub queue: vk::Queue,
    /// QueueFamilyのindex
    pub family_index: u32,
    /// Queueのindex
    pub index: u32,
}

/// 各種QueueのQueueHandleを格納する構造体。
/// QueueはDeviceと一緒に破棄されるので個別の破棄は不要。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueHandles {
    /// Graphics QueueのQueueHandle
    pub graphics: QueueHandle,
    /// Present QueueのQueueHandle
    pub present: QueueHandle,
}

/// 作成されたlogical deviceとそのQueue
#[derive(Debug, Clone)]
pub struct LogicalDevice<D> {
    /// logical device
    pub device: D,
    /// Deviceから取得したQueue
    pub queues: QueueHandles,
}

/// logical deviceを作成してQueueを取得する関数。
///
/// QueueFamilyごとに優先度1.0のQueueを1つずつ要求する。
/// GraphicsとPresentが同じQueueFamilyならQueueの要求は1つにまとめる。
/// device featuresとdevice拡張は何も有効にしない。
/// layer_namesは古い実装との互換のためにdeviceにも渡す。現在のドライバでは無視される。
pub fn create_logical_device<F: LogicalDeviceFactory + ?Sized>(
    factory: &F,
    physical_device: vk::PhysicalDevice,
    indices: &QueueFamilyIndices,
    layer_names: &[CString],
) -> Result<LogicalDevice<F::Device>, SetupError> {
    let queue_indices = indices.resolve()?;

    // queue create info
    let queue_priorities = [1.0_f32];
    let queue_create_infos = queue_indices
        .unique_families()
        .into_iter()
        .map(|queue_family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(queue_family)
                .queue_priorities(&queue_priorities)
                .build()
        })
        .collect::<Vec<_>>();
    log::debug!(
        "Requesting queues from families {:?}",
        queue_indices.unique_families()
    );

    let physical_device_features = vk::PhysicalDeviceFeatures::builder().build();
    let layer_names = layer_names.iter().map(|l| l.as_ptr()).collect::<Vec<_>>();

    // device create info
    #[allow(deprecated)]
    let device_create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_create_infos)
        .enabled_features(&physical_device_features)
        .enabled_layer_names(&layer_names);

    // create device
    let device = unsafe { factory.create_device(physical_device, &device_create_info) }
        .map_err(SetupError::DeviceCreation)?;

    // get device queue
    let graphics_queue = device.get_device_queue(queue_indices.graphics_index, 0);
    let present_queue = device.get_device_queue(queue_indices.present_index, 0);

    Ok(LogicalDevice {
        device,
        queues: QueueHandles {
            graphics: QueueHandle {
                queue: graphics_queue,
                family_index: queue_indices.graphics_index,
                index: 0,
            },
            present: QueueHandle {
                queue: present_queue,
                family_index: queue_indices.present_index,
                index: 0,
            },
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::{prelude::VkResult, vk::Handle};
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    fn physical_device(raw: u64) -> vk::PhysicalDevice {
        vk::PhysicalDevice::from_raw(raw)
    }

    fn family(queue_flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn layer(name: &str) -> vk::LayerProperties {
        let mut properties = vk::LayerProperties::default();
        for (dst, src) in properties.layer_name.iter_mut().zip(name.bytes()) {
            *dst = src as std::ffi::c_char;
        }
        properties
    }

    /// physical deviceごとにQueueFamilyとpresent対応を持つスタブ
    #[derive(Default)]
    struct StubPlatform {
        devices: Vec<vk::PhysicalDevice>,
        families: HashMap<u64, Vec<vk::QueueFamilyProperties>>,
        present: HashMap<u64, Vec<u32>>,
        present_queries: RefCell<Vec<(u64, u32)>>,
    }
    impl StubPlatform {
        fn with_device(
            mut self,
            raw: u64,
            families: Vec<vk::QueueFlags>,
            present: Vec<u32>,
        ) -> Self {
            self.devices.push(physical_device(raw));
            self.families
                .insert(raw, families.into_iter().map(family).collect());
            self.present.insert(raw, present);
            self
        }
    }
    impl PhysicalDeviceQuery for StubPlatform {
        fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
            Ok(self.devices.clone())
        }

        fn get_physical_device_queue_family_properties(
            &self,
            physical_device: vk::PhysicalDevice,
        ) -> Vec<vk::QueueFamilyProperties> {
            self.families
                .get(&physical_device.as_raw())
                .cloned()
                .unwrap_or_default()
        }
    }
    impl PresentationSupport for StubPlatform {
        fn get_physical_device_surface_support(
            &self,
            physical_device: vk::PhysicalDevice,
            queue_family_index: u32,
        ) -> VkResult<bool> {
            let raw = physical_device.as_raw();
            self.present_queries
                .borrow_mut()
                .push((raw, queue_family_index));
            Ok(self
                .present
                .get(&raw)
                .map_or(false, |p| p.contains(&queue_family_index)))
        }
    }

    struct FailingEnumeration;
    impl PhysicalDeviceQuery for FailingEnumeration {
        fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
            Err(vk::Result::ERROR_INITIALIZATION_FAILED)
        }

        fn get_physical_device_queue_family_properties(
            &self,
            _physical_device: vk::PhysicalDevice,
        ) -> Vec<vk::QueueFamilyProperties> {
            vec![]
        }
    }

    struct FailingSurface;
    impl PresentationSupport for FailingSurface {
        fn get_physical_device_surface_support(
            &self,
            _physical_device: vk::PhysicalDevice,
            _queue_family_index: u32,
        ) -> VkResult<bool> {
            Err(vk::Result::ERROR_SURFACE_LOST_KHR)
        }
    }

    const GRAPHICS: vk::QueueFlags = vk::QueueFlags::GRAPHICS;
    const COMPUTE: vk::QueueFlags = vk::QueueFlags::COMPUTE;
    const TRANSFER: vk::QueueFlags = vk::QueueFlags::TRANSFER;

    #[test]
    fn no_graphics_family_leaves_graphics_empty() {
        let platform = StubPlatform::default().with_device(1, vec![COMPUTE, TRANSFER], vec![0, 1]);
        let indices = find_queue_families(&platform, &platform, physical_device(1));
        assert_eq!(indices.graphics_family, None);
        assert_eq!(indices.present_family, Some(1));
        assert_eq!(*platform.present_queries.borrow(), vec![(1, 0), (1, 1)]);
    }

    #[test]
    fn later_presenting_family_shares_graphics_queue() {
        let platform = StubPlatform::default().with_device(1, vec![COMPUTE, GRAPHICS], vec![0, 1]);
        let indices = find_queue_families(&platform, &platform, physical_device(1));
        assert_eq!(indices.graphics_family, Some(1));
        assert_eq!(indices.present_family, Some(1));
        assert_eq!(*platform.present_queries.borrow(), vec![(1, 0), (1, 1)]);
        assert_eq!(indices.resolve().unwrap().unique_families(), vec![1]);
    }

    #[test]
    fn no_present_family_leaves_present_empty() {
        let platform =
            StubPlatform::default().with_device(1, vec![COMPUTE, GRAPHICS | COMPUTE], vec![]);
        let indices = find_queue_families(&platform, &platform, physical_device(1));
        assert_eq!(indices.graphics_family, Some(1));
        assert_eq!(indices.present_family, None);
        assert!(!indices.is_complete());
    }

    #[test]
    fn present_is_probed_on_every_family() {
        let platform = StubPlatform::default().with_device(
            1,
            vec![GRAPHICS, COMPUTE, TRANSFER],
            vec![2],
        );
        let indices = find_queue_families(&platform, &platform, physical_device(1));
        assert_eq!(indices.graphics_family, Some(0));
        assert_eq!(indices.present_family, Some(2));
        assert_eq!(
            *platform.present_queries.borrow(),
            vec![(1, 0), (1, 1), (1, 2)]
        );
    }

    #[test]
    fn first_graphics_family_is_kept() {
        let platform =
            StubPlatform::default().with_device(1, vec![TRANSFER, GRAPHICS, GRAPHICS], vec![2]);
        let indices = find_queue_families(&platform, &platform, physical_device(1));
        assert_eq!(indices.graphics_family, Some(1));
        assert_eq!(indices.present_family, Some(2));
    }

    #[test]
    fn search_stops_once_complete() {
        let platform =
            StubPlatform::default().with_device(1, vec![GRAPHICS, GRAPHICS, GRAPHICS], vec![0, 1]);
        let indices = find_queue_families(&platform, &platform, physical_device(1));
        assert_eq!(
            indices,
            QueueFamilyIndices {
                graphics_family: Some(0),
                present_family: Some(0),
            }
        );
        assert_eq!(*platform.present_queries.borrow(), vec![(1, 0)]);
    }

    #[test]
    fn surface_query_failure_counts_as_unsupported() {
        let platform = StubPlatform::default().with_device(1, vec![GRAPHICS], vec![0]);
        let indices = find_queue_families(&platform, &FailingSurface, physical_device(1));
        assert_eq!(indices.graphics_family, Some(0));
        assert_eq!(indices.present_family, None);
    }

    #[test]
    fn empty_enumeration_is_no_compatible_device() {
        let platform = StubPlatform::default();
        let result = pick_physical_device(&platform, &platform, SuitabilityPolicy::GraphicsOnly);
        assert!(matches!(result, Err(SetupError::NoCompatibleDevice)));
    }

    #[test]
    fn enumeration_failure_is_reported() {
        let platform = StubPlatform::default();
        let result = pick_physical_device(
            &FailingEnumeration,
            &platform,
            SuitabilityPolicy::GraphicsOnly,
        );
        assert!(matches!(
            result,
            Err(SetupError::PhysicalDeviceEnumeration(
                vk::Result::ERROR_INITIALIZATION_FAILED
            ))
        ));
    }

    #[test]
    fn no_graphics_anywhere_is_no_suitable_device() {
        let platform = StubPlatform::default()
            .with_device(1, vec![COMPUTE], vec![0])
            .with_device(2, vec![], vec![]);
        let result = pick_physical_device(&platform, &platform, SuitabilityPolicy::GraphicsOnly);
        assert!(matches!(result, Err(SetupError::NoSuitableDevice)));
    }

    #[test]
    fn no_presentation_anywhere_is_no_suitable_device() {
        let platform = StubPlatform::default()
            .with_device(1, vec![GRAPHICS], vec![])
            .with_device(2, vec![GRAPHICS, COMPUTE], vec![]);
        let result =
            pick_physical_device(&platform, &platform, SuitabilityPolicy::GraphicsAndPresent);
        assert!(matches!(result, Err(SetupError::NoSuitableDevice)));
    }

    #[test]
    fn first_suitable_device_wins() {
        let platform = StubPlatform::default()
            .with_device(1, vec![COMPUTE], vec![0])
            .with_device(2, vec![GRAPHICS], vec![0])
            .with_device(3, vec![GRAPHICS], vec![0]);
        for policy in [
            SuitabilityPolicy::GraphicsOnly,
            SuitabilityPolicy::GraphicsAndPresent,
        ] {
            let selected = pick_physical_device(&platform, &platform, policy).unwrap();
            assert_eq!(selected.physical_device, physical_device(2));
            assert_eq!(selected.queue_families.graphics_family, Some(0));
        }
    }

    #[test]
    fn shared_family_is_suitable() {
        let platform = StubPlatform::default().with_device(7, vec![GRAPHICS], vec![0]);
        let selected =
            pick_physical_device(&platform, &platform, SuitabilityPolicy::GraphicsAndPresent)
                .unwrap();
        assert_eq!(selected.physical_device, physical_device(7));
        assert_eq!(
            selected.queue_families.resolve().unwrap().unique_families(),
            vec![0]
        );
    }

    #[test]
    fn graphics_only_policy_accepts_device_without_present() {
        let platform = StubPlatform::default()
            .with_device(1, vec![GRAPHICS], vec![])
            .with_device(2, vec![GRAPHICS], vec![0]);

        let permissive =
            pick_physical_device(&platform, &platform, SuitabilityPolicy::GraphicsOnly).unwrap();
        assert_eq!(permissive.physical_device, physical_device(1));
        assert_eq!(permissive.queue_families.present_family, None);

        let strict =
            pick_physical_device(&platform, &platform, SuitabilityPolicy::GraphicsAndPresent)
                .unwrap();
        assert_eq!(strict.physical_device, physical_device(2));
    }

    /// vkCreateDeviceに渡された内容を記録するスタブ
    #[derive(Default)]
    struct StubDeviceFactory {
        fail_with: Option<vk::Result>,
        created: Cell<usize>,
        requested_families: RefCell<Vec<(u32, u32, f32)>>,
        enabled_extension_count: Cell<u32>,
        enabled_layer_count: Cell<u32>,
        has_features: Cell<bool>,
    }
    struct StubDevice;
    impl DeviceQueueSource for StubDevice {
        fn get_device_queue(&self, queue_family_index: u32, queue_index: u32) -> vk::Queue {
            vk::Queue::from_raw(((queue_family_index as u64) << 8) | queue_index as u64 | 0x1000)
        }
    }
    impl LogicalDeviceFactory for StubDeviceFactory {
        type Device = StubDevice;

        unsafe fn create_device(
            &self,
            _physical_device: vk::PhysicalDevice,
            device_create_info: &vk::DeviceCreateInfo,
        ) -> VkResult<Self::Device> {
            self.created.set(self.created.get() + 1);
            let queue_create_infos = std::slice::from_raw_parts(
                device_create_info.p_queue_create_infos,
                device_create_info.queue_create_info_count as usize,
            );
            for info in queue_create_infos {
                self.requested_families.borrow_mut().push((
                    info.queue_family_index,
                    info.queue_count,
                    *info.p_queue_priorities,
                ));
            }
            self.enabled_extension_count
                .set(device_create_info.enabled_extension_count);
            #[allow(deprecated)]
            let enabled_layer_count = device_create_info.enabled_layer_count;
            self.enabled_layer_count.set(enabled_layer_count);
            self.has_features
                .set(!device_create_info.p_enabled_features.is_null());
            match self.fail_with {
                Some(err) => Err(err),
                None => Ok(StubDevice),
            }
        }
    }

    #[test]
    fn shared_family_requests_single_queue() {
        let factory = StubDeviceFactory::default();
        let indices = QueueFamilyIndices {
            graphics_family: Some(2),
            present_family: Some(2),
        };
        let logical_device =
            create_logical_device(&factory, physical_device(1), &indices, &[]).unwrap();

        assert_eq!(*factory.requested_families.borrow(), vec![(2, 1, 1.0)]);
        assert_eq!(logical_device.queues.graphics, logical_device.queues.present);
        assert_eq!(logical_device.queues.graphics.family_index, 2);
        assert_eq!(factory.enabled_extension_count.get(), 0);
        assert!(factory.has_features.get());
    }

    #[test]
    fn distinct_families_request_two_queues() {
        let factory = StubDeviceFactory::default();
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(3),
        };
        let logical_device =
            create_logical_device(&factory, physical_device(1), &indices, &[]).unwrap();

        assert_eq!(
            *factory.requested_families.borrow(),
            vec![(0, 1, 1.0), (3, 1, 1.0)]
        );
        assert_eq!(logical_device.queues.graphics.family_index, 0);
        assert_eq!(logical_device.queues.present.family_index, 3);
        assert_ne!(
            logical_device.queues.graphics.queue,
            logical_device.queues.present.queue
        );
    }

    #[test]
    fn validation_layers_are_passed_to_device() {
        let factory = StubDeviceFactory::default();
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        let layers = [CString::new("VK_LAYER_KHRONOS_validation").unwrap()];
        create_logical_device(&factory, physical_device(1), &indices, &layers).unwrap();
        assert_eq!(factory.enabled_layer_count.get(), 1);
    }

    #[test]
    fn incomplete_indices_are_rejected_before_creation() {
        let factory = StubDeviceFactory::default();
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: None,
        };
        let result = create_logical_device(&factory, physical_device(1), &indices, &[]);
        assert!(matches!(
            result,
            Err(SetupError::IncompleteQueueFamilies {
                graphics: Some(0),
                present: None,
            })
        ));
        assert_eq!(factory.created.get(), 0);
    }

    #[test]
    fn device_creation_failure_is_reported() {
        let factory = StubDeviceFactory {
            fail_with: Some(vk::Result::ERROR_FEATURE_NOT_PRESENT),
            ..Default::default()
        };
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(1),
        };
        let result = create_logical_device(&factory, physical_device(1), &indices, &[]);
        assert!(matches!(
            result,
            Err(SetupError::DeviceCreation(vk::Result::ERROR_FEATURE_NOT_PRESENT))
        ));
    }

    /// layerの一覧とvkCreateInstanceの呼び出しを記録するスタブ
    #[derive(Default)]
    struct StubLoader {
        layers: Vec<&'static str>,
        fail_with: Option<vk::Result>,
        created: Cell<usize>,
        enabled_layers: RefCell<Vec<String>>,
        enabled_extension_count: Cell<u32>,
        api_version: Cell<u32>,
        has_debug_messenger: Cell<bool>,
    }
    impl InstanceLoader for StubLoader {
        type Instance = ();

        fn enumerate_instance_layer_properties(&self) -> VkResult<Vec<vk::LayerProperties>> {
            Ok(self.layers.iter().map(|l| layer(l)).collect())
        }

        unsafe fn create_instance(&self, create_info: &vk::InstanceCreateInfo) -> VkResult<()> {
            self.created.set(self.created.get() + 1);
            let layer_names = std::slice::from_raw_parts(
                create_info.pp_enabled_layer_names,
                create_info.enabled_layer_count as usize,
            );
            *self.enabled_layers.borrow_mut() = layer_names
                .iter()
                .map(|&l| CStr::from_ptr(l).to_string_lossy().into_owned())
                .collect();
            self.enabled_extension_count
                .set(create_info.enabled_extension_count);
            self.api_version
                .set((*create_info.p_application_info).api_version);
            self.has_debug_messenger.set(!create_info.p_next.is_null());
            match self.fail_with {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    fn request(layers: &[&str]) -> InstanceRequest {
        InstanceRequest {
            application_name: CString::new("Hello Triangle").unwrap(),
            engine_name: CString::new("No Engine").unwrap(),
            api_version: vk::API_VERSION_1_0,
            extension_names: vec![
                CString::new("VK_KHR_surface").unwrap(),
                CString::new("VK_KHR_xcb_surface").unwrap(),
            ],
            layer_names: layers.iter().map(|l| CString::new(*l).unwrap()).collect(),
        }
    }

    #[test]
    fn missing_layer_fails_before_instance_creation() {
        let loader = StubLoader {
            layers: vec!["VK_LAYER_MESA_device_select"],
            ..Default::default()
        };
        let result = create_instance(&loader, &request(&["VK_LAYER_KHRONOS_validation"]), None);
        match result {
            Err(SetupError::ValidationLayerUnavailable { missing }) => {
                assert_eq!(missing, vec!["VK_LAYER_KHRONOS_validation".to_owned()])
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(loader.created.get(), 0);
    }

    #[test]
    fn layer_check_reports_every_missing_layer() {
        let loader = StubLoader {
            layers: vec!["VK_LAYER_KHRONOS_validation"],
            ..Default::default()
        };
        let names = ["VK_LAYER_KHRONOS_validation", "VK_LAYER_A", "VK_LAYER_B"]
            .iter()
            .map(|l| CString::new(*l).unwrap())
            .collect::<Vec<_>>();
        match check_validation_layer_support(&loader, &names) {
            Err(SetupError::ValidationLayerUnavailable { missing }) => {
                assert_eq!(missing, vec!["VK_LAYER_A".to_owned(), "VK_LAYER_B".to_owned()])
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn layer_name_must_match_exactly() {
        let loader = StubLoader {
            layers: vec!["VK_LAYER_KHRONOS_validation_extra"],
            ..Default::default()
        };
        let names = [CString::new("VK_LAYER_KHRONOS_validation").unwrap()];
        assert!(check_validation_layer_support(&loader, &names).is_err());
    }

    #[test]
    fn available_layer_is_enabled_on_instance() {
        let loader = StubLoader {
            layers: vec!["VK_LAYER_MESA_device_select", "VK_LAYER_KHRONOS_validation"],
            ..Default::default()
        };
        create_instance(&loader, &request(&["VK_LAYER_KHRONOS_validation"]), None).unwrap();
        assert_eq!(loader.created.get(), 1);
        assert_eq!(
            *loader.enabled_layers.borrow(),
            vec!["VK_LAYER_KHRONOS_validation".to_owned()]
        );
        assert_eq!(loader.enabled_extension_count.get(), 2);
        assert_eq!(loader.api_version.get(), vk::API_VERSION_1_0);
        assert!(!loader.has_debug_messenger.get());
    }

    #[test]
    fn no_layers_skips_layer_check() {
        // 利用可能なlayerがなくても、要求していなければ作成できる
        let loader = StubLoader::default();
        create_instance(&loader, &request(&[]), None).unwrap();
        assert_eq!(loader.created.get(), 1);
        assert!(loader.enabled_layers.borrow().is_empty());
    }

    #[test]
    fn debug_messenger_is_chained() {
        let loader = StubLoader {
            layers: vec!["VK_LAYER_KHRONOS_validation"],
            ..Default::default()
        };
        let mut debug_messenger_create_info = vk::DebugUtilsMessengerCreateInfoEXT::default();
        create_instance(
            &loader,
            &request(&["VK_LAYER_KHRONOS_validation"]),
            Some(&mut debug_messenger_create_info),
        )
        .unwrap();
        assert!(loader.has_debug_messenger.get());
    }

    #[test]
    fn instance_creation_failure_is_reported() {
        let loader = StubLoader {
            fail_with: Some(vk::Result::ERROR_INCOMPATIBLE_DRIVER),
            ..Default::default()
        };
        let result = create_instance(&loader, &request(&[]), None);
        assert!(matches!(
            result,
            Err(SetupError::InstanceCreation(vk::Result::ERROR_INCOMPATIBLE_DRIVER))
        ));
    }
}
