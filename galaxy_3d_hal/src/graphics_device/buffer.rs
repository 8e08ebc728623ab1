/// Buffer trait and buffer descriptor

use bitflags::bitflags;
use crate::state::StateCell;

bitflags! {
    /// Ways a buffer may be bound
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferBindFlags: u32 {
        const VERTEX = 0x01;
        const INDEX = 0x02;
        const UNIFORM = 0x04;
        const SHADER_RESOURCE = 0x08;
        const UNORDERED_ACCESS = 0x10;
        const INDIRECT = 0x20;
    }
}

/// Descriptor of a created buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    pub name: String,
    /// Size in bytes
    pub size: u64,
    pub bind_flags: BufferBindFlags,
}

/// Index element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

/// GPU buffer
///
/// Backends own the native object; the HAL only needs its description,
/// its state cell and an opaque handle.
pub trait Buffer: Send + Sync {
    fn desc(&self) -> &BufferDesc;

    fn state(&self) -> &StateCell;

    /// Backend handle (e.g. `VkBuffer` as u64)
    fn native_handle(&self) -> u64;

    /// Typed view used when bound as a formatted buffer (e.g. `VkBufferView` as u64)
    fn native_view(&self) -> u64 {
        0
    }
}
