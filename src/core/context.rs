use std::collections::HashSet;

use crate::{
    config::*,
    core::{devices::pick_physical_device, queues::QueueFamilies, teardown::Teardown},
    error::RenderError,
};

use anyhow::{anyhow, Result};
use log::*;
use vulkanalia::{
    loader::{LibloadingLoader, LIBRARY},
    prelude::v1_0::*,
    vk::ExtDebugUtilsExtension,
    vk::KhrSurfaceExtension,
    window as vk_window,
};
use winit::window::Window;

/// The Vulkan objects every other part of the renderer is built
/// from: loader entry, instance, surface, the chosen physical device
/// and the logical device with its queues. Created once and passed
/// explicitly to every constructor.
pub struct GraphicsContext {
    pub entry: Entry,
    pub instance: Instance,
    pub surface: vk::SurfaceKHR,
    pub physical_device: vk::PhysicalDevice,
    pub queue_families: QueueFamilies,
    pub device: Device,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
}

impl GraphicsContext {
    /// Builds the context, pushing the destruction of everything it
    /// creates onto `teardown`.
    pub unsafe fn create(window: &Window, teardown: &mut Teardown) -> Result<Self> {
        // To create a Vulkan instance, we first need a loader for
        // the initial commands of the Vulkan library, then an entry
        // point built from that loader.
        let loader = LibloadingLoader::new(LIBRARY)?;
        let entry = Entry::new(loader).map_err(|b| anyhow!("{}", b))?;

        let instance = create_instance(window, &entry, teardown)?;

        // Vulkan does not talk to the window system by itself: it
        // renders to surfaces, abstract representations of native
        // windows, which vulkanalia creates for each platform.
        let surface = vk_window::create_surface(&instance, window, window)
            .map_err(|e| RenderError::Initialization("surface", e))?;
        teardown.push("surface", {
            let instance = instance.clone();
            move || unsafe { instance.destroy_surface_khr(surface, None) }
        });
        info!("Surface created.");

        let chosen = pick_physical_device(&instance, surface)?;
        let queue_families = chosen
            .report
            .queue_families
            .complete()
            .ok_or(RenderError::NoSuitableDevice)?;

        let device = create_logical_device(&entry, &instance, chosen.device, &queue_families)?;
        teardown.push("logical device", {
            let device = device.clone();
            move || unsafe { device.destroy_device(None) }
        });

        let graphics_queue = device.get_device_queue(queue_families.graphics, 0);
        let present_queue = device.get_device_queue(queue_families.present, 0);

        Ok(Self {
            entry,
            instance,
            surface,
            physical_device: chosen.device,
            queue_families,
            device,
            graphics_queue,
            present_queue,
        })
    }
}

unsafe fn create_instance(
    window: &Window,
    entry: &Entry,
    teardown: &mut Teardown,
) -> Result<Instance, RenderError> {
    // Validation layers hook into Vulkan calls to check them, which
    // the API itself does very little of. They are only available if
    // installed on the system (with the Vulkan SDK, for example).
    let available_layers = entry
        .enumerate_instance_layer_properties()
        .map_err(|e| RenderError::Initialization("layer list", e))?
        .iter()
        .map(|l| l.layer_name)
        .collect::<HashSet<_>>();

    if VALIDATION_ENABLED && !available_layers.contains(&VALIDATION_LAYER) {
        debug!("Available layers: {:?}", available_layers);
        return Err(RenderError::MissingValidationLayer);
    }

    let layers = if VALIDATION_ENABLED {
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        Vec::new()
    };

    let application_info = vk::ApplicationInfo::builder()
        .application_name(b"Hello Triangle\0")
        .application_version(vk::make_version(1, 0, 0))
        .engine_name(b"No Engine\0")
        .engine_version(vk::make_version(1, 0, 0))
        .api_version(vk::make_version(1, 0, 0));

    // The window system decides which instance extensions are needed
    // to present to it; all of them have to be advertised by the
    // loader.
    let required = vk_window::get_required_instance_extensions(window);
    let available = entry
        .enumerate_instance_extension_properties(None)
        .map_err(|e| RenderError::Initialization("instance extension list", e))?
        .iter()
        .map(|e| e.extension_name)
        .collect::<HashSet<_>>();
    debug!("Required instance extensions: {:?}", required);
    debug!("Available instance extensions: {:?}", available);

    let missing = missing_extensions(required.iter().map(|e| **e), &available);
    if !missing.is_empty() {
        return Err(RenderError::MissingInstanceExtensions(missing));
    }

    let mut extensions = required.iter().map(|e| e.as_ptr()).collect::<Vec<_>>();

    if VALIDATION_ENABLED {
        extensions.push(vk::EXT_DEBUG_UTILS_EXTENSION.name.as_ptr());
    }

    // Since v1.3.216 of the Vulkan API, non-conformant
    // implementations like the one on macOS have to opt in to device
    // enumeration through the portability extensions.
    let loader_version = entry
        .version()
        .map_err(|e| RenderError::Initialization("loader version query", e))?;
    let flags = if cfg!(target_os = "macos") && loader_version >= PORTABILITY_MACOS_VERSION {
        info!("Enabling extensions for macOS portability.");
        extensions.push(vk::KHR_GET_PHYSICAL_DEVICE_PROPERTIES2_EXTENSION.name.as_ptr());
        extensions.push(vk::KHR_PORTABILITY_ENUMERATION_EXTENSION.name.as_ptr());
        vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
    } else {
        vk::InstanceCreateFlags::empty()
    };

    let mut info = vk::InstanceCreateInfo::builder()
        .application_info(&application_info)
        .enabled_layer_names(&layers)
        .enabled_extension_names(&extensions)
        .flags(flags);

    // Chaining the messenger info into the instance info also
    // reports problems from instance creation and destruction.
    let mut debug_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(vk::DebugUtilsMessageSeverityFlagsEXT::all())
        .message_type(vk::DebugUtilsMessageTypeFlagsEXT::all())
        .user_callback(Some(debug_callback));

    if VALIDATION_ENABLED {
        info = info.push_next(&mut debug_info);
    }

    let instance = entry
        .create_instance(&info, None)
        .map_err(|e| RenderError::Initialization("instance", e))?;
    // The entry holds the loaded library: it has to stay alive until
    // the last action has run, even if the context is dropped first.
    teardown.push("instance", {
        let entry = entry.clone();
        let instance = instance.clone();
        move || unsafe {
            instance.destroy_instance(None);
            drop(entry);
        }
    });

    if VALIDATION_ENABLED {
        let messenger = instance
            .create_debug_utils_messenger_ext(&debug_info, None)
            .map_err(|e| RenderError::Initialization("debug messenger", e))?;
        teardown.push("debug messenger", {
            let instance = instance.clone();
            move || unsafe { instance.destroy_debug_utils_messenger_ext(messenger, None) }
        });
    }

    info!("Vulkan instance created.");
    Ok(instance)
}

/// Names of the `required` extensions that are not `available`, in
/// the order they were required.
fn missing_extensions(
    required: impl IntoIterator<Item = vk::ExtensionName>,
    available: &HashSet<vk::ExtensionName>,
) -> Vec<String> {
    required
        .into_iter()
        .filter(|e| !available.contains(e))
        .map(|e| e.to_string())
        .collect()
}

unsafe fn create_logical_device(
    entry: &Entry,
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    queue_families: &QueueFamilies,
) -> Result<Device, RenderError> {
    // One queue per distinct family: when graphics and presentation
    // share a family, a single entry is requested.
    let queue_infos = queue_families.queue_create_infos();

    // Device specific layers are deprecated, but older
    // implementations still expect them.
    let layers = if VALIDATION_ENABLED {
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        vec![]
    };

    let mut extensions = REQUIRED_EXTENSIONS
        .iter()
        .map(|e| e.as_ptr())
        .collect::<Vec<_>>();

    let loader_version = entry
        .version()
        .map_err(|e| RenderError::Initialization("loader version query", e))?;
    if cfg!(target_os = "macos") && loader_version >= PORTABILITY_MACOS_VERSION {
        extensions.push(PORTABILITY_SUBSET_EXTENSION.as_ptr());
    }

    let features = vk::PhysicalDeviceFeatures::builder();

    let info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_infos)
        .enabled_layer_names(&layers)
        .enabled_extension_names(&extensions)
        .enabled_features(&features);

    let device = instance
        .create_device(physical_device, &info, None)
        .map_err(|e| RenderError::Initialization("logical device", e))?;

    info!(
        "Logical device created ({} queue families requested).",
        queue_infos.len()
    );
    Ok(device)
}

extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    type_: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _: *mut std::ffi::c_void,
) -> vk::Bool32 {
    // Validation messages go through our log system instead of the
    // standard output. The function has to use the system ABI and
    // match vk::PFN_vkDebugUtilsMessengerCallbackEXT.
    let data = unsafe { *data };
    let message = unsafe { std::ffi::CStr::from_ptr(data.message) }.to_string_lossy();

    if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        error!("({type_:?}) {message}");
    } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        warn!("({type_:?}) {message}");
    } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::INFO {
        debug!("({type_:?}) {message}");
    } else {
        trace!("({type_:?}) {message}");
    }

    // Returning true would abort the call that triggered the
    // message.
    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_missing_instance_extensions_in_order() {
        let available = [vk::KHR_SURFACE_EXTENSION.name]
            .into_iter()
            .collect::<HashSet<_>>();
        let required = [
            vk::KHR_SURFACE_EXTENSION.name,
            vk::KHR_XLIB_SURFACE_EXTENSION.name,
            vk::KHR_WAYLAND_SURFACE_EXTENSION.name,
        ];

        assert_eq!(
            missing_extensions(required, &available),
            vec!["VK_KHR_xlib_surface".to_string(), "VK_KHR_wayland_surface".to_string()]
        );
        assert!(missing_extensions([vk::KHR_SURFACE_EXTENSION.name], &available).is_empty());
    }
}
