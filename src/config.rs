use vulkanalia::{vk, Version};

pub const WINDOW_WIDTH: u32 = 1024;
pub const WINDOW_HEIGHT: u32 = 768;
pub const WINDOW_TITLE: &str = "Hello Triangle!";

pub const VALIDATION_ENABLED: bool = cfg!(debug_assertions);
pub const VALIDATION_LAYER: vk::ExtensionName = vk::ExtensionName::from_bytes(b"VK_LAYER_KHRONOS_validation");
pub const PORTABILITY_MACOS_VERSION: Version = Version::new(1, 3, 216);
// Provisional extension, not exposed by the default vulkanalia features.
pub const PORTABILITY_SUBSET_EXTENSION: vk::ExtensionName = vk::ExtensionName::from_bytes(b"VK_KHR_portability_subset");

/// Device extensions a physical device must advertise to be
/// considered at all. Presenting to a surface is not part of the
/// core API, so the swapchain extension is the only requirement.
pub const REQUIRED_EXTENSIONS: &[vk::ExtensionName] = &[
    vk::KHR_SWAPCHAIN_EXTENSION.name,
];

/// Number of frames the host may record and submit before it has to
/// wait on the device.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

// Written by build.rs.
pub const VERTEX_SHADER_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/target/shaders/triangle.vert.spv");
pub const FRAGMENT_SHADER_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/target/shaders/triangle.frag.spv");

pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
