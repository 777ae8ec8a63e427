use std::collections::HashSet;

use crate::{
    config::REQUIRED_EXTENSIONS,
    core::{queues::QueueFamilyIndices, swapchain::SwapchainSupport},
    error::RenderError,
};

use vulkanalia::{prelude::v1_0::*, vk::KhrSurfaceExtension};
use log::*;

/// Bonus given to discrete GPUs. It outweighs any difference in image
/// dimension limits between plausible devices.
const DISCRETE_GPU_BONUS: u32 = 1000;

/// What we learn about a physical device before choosing one.
#[derive(Clone, Debug)]
pub struct DeviceReport {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub max_image_dimension_2d: u32,
    pub extensions: HashSet<vk::ExtensionName>,
    pub queue_families: QueueFamilyIndices,
    pub swapchain_support: SwapchainSupport,
}

impl DeviceReport {
    pub unsafe fn query(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<Self> {
        let properties = instance.get_physical_device_properties(physical_device);
        debug!(
            "Physical device {}: {:?}, API {}, driver {}, max image dimension 1D {} / 2D {}.",
            properties.device_name,
            properties.device_type,
            format_version(properties.api_version),
            format_version(properties.driver_version),
            properties.limits.max_image_dimension_1d,
            properties.limits.max_image_dimension_2d,
        );

        let extensions = instance
            .enumerate_device_extension_properties(physical_device, None)?
            .iter()
            .map(|e| e.extension_name)
            .collect::<HashSet<_>>();

        let families = instance.get_physical_device_queue_family_properties(physical_device);
        let queue_families = QueueFamilyIndices::find(&families, |index| {
            instance.get_physical_device_surface_support_khr(physical_device, index, surface)
        })?;

        Self::assemble(
            properties.device_name.to_string(),
            properties.device_type,
            properties.limits.max_image_dimension_2d,
            extensions,
            queue_families,
            || SwapchainSupport::query(instance, surface, physical_device),
        )
    }

    /// Builds a report from the device's properties. The surface is
    /// only queried when the extensions and queue families are usable:
    /// a device that can't present to it must not be asked about it.
    pub fn assemble(
        name: String,
        device_type: vk::PhysicalDeviceType,
        max_image_dimension_2d: u32,
        extensions: HashSet<vk::ExtensionName>,
        queue_families: QueueFamilyIndices,
        swapchain_support: impl FnOnce() -> VkResult<SwapchainSupport>,
    ) -> VkResult<Self> {
        let mut report = Self {
            name,
            device_type,
            max_image_dimension_2d,
            extensions,
            queue_families,
            swapchain_support: SwapchainSupport::default(),
        };

        if report.missing_extensions().is_empty() && report.queue_families.is_complete() {
            report.swapchain_support = swapchain_support()?;
        }
        Ok(report)
    }

    pub fn missing_extensions(&self) -> Vec<vk::ExtensionName> {
        REQUIRED_EXTENSIONS
            .iter()
            .filter(|e| !self.extensions.contains(*e))
            .cloned()
            .collect()
    }

    /// Why the device cannot be used, if it cannot.
    pub fn unsuitability(&self) -> Option<&'static str> {
        if !self.missing_extensions().is_empty() {
            Some("missing required device extensions")
        } else if !self.queue_families.is_complete() {
            Some("missing graphics or present queue family")
        } else if !self.swapchain_support.is_adequate() {
            Some("insufficient swapchain support")
        } else {
            None
        }
    }

    pub fn is_suitable(&self) -> bool {
        self.unsuitability().is_none()
    }

    /// Unusable devices score 0. Otherwise discrete GPUs are strongly
    /// preferred, and within a class the maximum 2D image dimension
    /// serves as a rough measure of how capable the device is.
    pub fn score(&self) -> u32 {
        if !self.is_suitable() {
            return 0;
        }

        let mut score = 1;
        if self.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
            score += DISCRETE_GPU_BONUS;
        }
        score + self.max_image_dimension_2d / 10
    }
}

// Packed as variant.major.minor.patch (3.7.10.12 bits).
fn format_version(version: u32) -> String {
    format!("{}.{}.{}", version >> 22, (version >> 12) & 0x3ff, version & 0xfff)
}

/// A device together with its report and score.
#[derive(Clone, Debug)]
pub struct Candidate<D> {
    pub device: D,
    pub report: DeviceReport,
    pub score: u32,
}

/// Scores every enumerated device and sorts them best first.
///
/// The sort is stable, so of two devices with the same score the one
/// enumerated first comes first.
pub fn rank_devices<D>(devices: impl IntoIterator<Item = (D, DeviceReport)>) -> Vec<Candidate<D>> {
    let mut candidates = devices
        .into_iter()
        .map(|(device, report)| {
            let score = report.score();
            Candidate { device, report, score }
        })
        .collect::<Vec<_>>();

    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates
}

/// Picks the best ranked device, failing when no device scores above
/// zero (including when there is no device at all).
pub fn select_device<D>(
    devices: impl IntoIterator<Item = (D, DeviceReport)>,
) -> Result<Candidate<D>, RenderError> {
    rank_devices(devices)
        .into_iter()
        .next()
        .filter(|best| best.score > 0)
        .ok_or(RenderError::NoSuitableDevice)
}

/// Keeps the devices that could be probed, warning about every device
/// that is skipped. A failed query only rules out that device.
pub fn usable_reports<D>(
    probes: impl IntoIterator<Item = (D, VkResult<DeviceReport>)>,
) -> Vec<(D, DeviceReport)> {
    probes
        .into_iter()
        .filter_map(|(device, probe)| match probe {
            Ok(report) => {
                if let Some(reason) = report.unsuitability() {
                    warn!("Skipping physical device ({}): {}.", report.name, reason);
                }
                Some((device, report))
            }
            Err(e) => {
                warn!("Skipping physical device that failed to report: {}.", e);
                None
            }
        })
        .collect()
}

pub unsafe fn pick_physical_device(
    instance: &Instance,
    surface: vk::SurfaceKHR,
) -> Result<Candidate<vk::PhysicalDevice>, RenderError> {
    // There can be more than one graphics device on the system (a
    // dedicated and an integrated card at the same time, for
    // example). Every one of them is probed, and the highest scoring
    // usable device wins.
    let devices = instance
        .enumerate_physical_devices()
        .map_err(|e| RenderError::Initialization("physical device list", e))?;

    let probes = devices
        .into_iter()
        .map(|device| (device, DeviceReport::query(instance, surface, device)));

    let chosen = select_device(usable_reports(probes))?;
    info!(
        "Selected physical device: {} (score {}).",
        chosen.report.name, chosen.score
    );
    Ok(chosen)
}
