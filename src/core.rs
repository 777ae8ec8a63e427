pub mod buffers;
pub mod commands;
pub mod context;
pub mod devices;
pub mod frame;
pub mod image;
pub mod pipeline;
pub mod queues;
pub mod shaders;
pub mod swapchain;
pub mod sync;
pub mod teardown;
pub mod vertex;
