/// Graphics device module - backend traits and GPU object types

// Module declarations
pub mod graphics_device;
pub mod command_sink;
pub mod buffer;
pub mod texture;
pub mod sampler;
pub mod resource;
pub mod fence;

// Re-export everything from graphics_device.rs
pub use graphics_device::*;

// Re-export from other modules
pub use command_sink::*;
pub use buffer::*;
pub use texture::*;
pub use sampler::*;
pub use resource::*;
pub use fence::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
