use std::{io, path::PathBuf};

use thiserror::Error;
use vulkanalia::vk;

/// Every failure the renderer can run into. None of them are
/// recoverable: they are propagated up to the application, which
/// reports them and exits.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to create {0}: {1}")]
    Initialization(&'static str, vk::ErrorCode),
    #[error("Validation layer requested, but not available.")]
    MissingValidationLayer,
    #[error("Missing required instance extensions: {}.", .0.join(", "))]
    MissingInstanceExtensions(Vec<String>),
    #[error("Failed to find a suitable physical device.")]
    NoSuitableDevice,
    #[error("Failed to create the swapchain: {0}")]
    ChainCreation(vk::ErrorCode),
    #[error("Failed to create the graphics pipeline: {0}")]
    PipelineCreation(vk::ErrorCode),
    #[error("Couldn't open shader {}: {source}", .path.display())]
    ShaderLoad {
        path: PathBuf,
        source: io::Error,
    },
    #[error("Shader bytecode is not properly aligned ({0} bytes).")]
    ShaderAlignment(usize),
    #[error("Failed to record command buffer: {0}")]
    Recording(vk::ErrorCode),
    #[error("Failed to acquire the next swapchain image: {0}")]
    Acquire(vk::ErrorCode),
    #[error("Swapchain is out of date.")]
    SurfaceOutOfDate,
    #[error("Failed to submit to the graphics queue: {0}")]
    Submission(vk::ErrorCode),
    #[error("Device lost.")]
    DeviceLost,
    #[error("Failed to present swapchain image: {0}")]
    Present(vk::ErrorCode),
    #[error("Failed to allocate {0}: {1}")]
    ResourceAllocation(&'static str, vk::ErrorCode),
    #[error("Failed to find a compatible memory type.")]
    NoCompatibleMemoryType,
}

impl RenderError {
    /// Maps an error code returned by a fence wait or a queue
    /// submission.
    pub fn submission(code: vk::ErrorCode) -> Self {
        if code == vk::ErrorCode::DEVICE_LOST {
            Self::DeviceLost
        } else {
            Self::Submission(code)
        }
    }

    /// Maps an error code returned by the presentation engine.
    pub fn present(code: vk::ErrorCode) -> Self {
        match code {
            vk::ErrorCode::OUT_OF_DATE_KHR => Self::SurfaceOutOfDate,
            vk::ErrorCode::DEVICE_LOST => Self::DeviceLost,
            _ => Self::Present(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_lost_is_singled_out() {
        assert!(matches!(
            RenderError::submission(vk::ErrorCode::DEVICE_LOST),
            RenderError::DeviceLost
        ));
        assert!(matches!(
            RenderError::submission(vk::ErrorCode::OUT_OF_HOST_MEMORY),
            RenderError::Submission(vk::ErrorCode::OUT_OF_HOST_MEMORY)
        ));
    }

    #[test]
    fn out_of_date_present_is_reported_as_stale_surface() {
        assert!(matches!(
            RenderError::present(vk::ErrorCode::OUT_OF_DATE_KHR),
            RenderError::SurfaceOutOfDate
        ));
        assert!(matches!(
            RenderError::present(vk::ErrorCode::SURFACE_LOST_KHR),
            RenderError::Present(_)
        ));
    }

    #[test]
    fn missing_extensions_are_listed() {
        let error = RenderError::MissingInstanceExtensions(vec![
            "VK_KHR_surface".into(),
            "VK_KHR_xcb_surface".into(),
        ]);
        assert_eq!(
            error.to_string(),
            "Missing required instance extensions: VK_KHR_surface, VK_KHR_xcb_surface."
        );
    }
}
