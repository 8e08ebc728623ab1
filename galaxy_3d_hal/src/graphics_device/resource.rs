/// Shared references to GPU resource objects

use std::fmt;
use std::sync::Arc;
use crate::state::StateCell;
use super::{Buffer, Texture};

/// Ray-tracing acceleration structure
pub trait AccelerationStructure: Send + Sync {
    fn name(&self) -> &str;

    fn state(&self) -> &StateCell;

    fn native_handle(&self) -> u64;
}

/// Strong reference to any state-tracked resource
#[derive(Clone)]
pub enum ResourceRef {
    Buffer(Arc<dyn Buffer>),
    Texture(Arc<dyn Texture>),
    AccelStruct(Arc<dyn AccelerationStructure>),
}

impl ResourceRef {
    pub fn name(&self) -> &str {
        match self {
            ResourceRef::Buffer(buffer) => &buffer.desc().name,
            ResourceRef::Texture(texture) => &texture.desc().name,
            ResourceRef::AccelStruct(accel) => accel.name(),
        }
    }

    pub fn state(&self) -> &StateCell {
        match self {
            ResourceRef::Buffer(buffer) => buffer.state(),
            ResourceRef::Texture(texture) => texture.state(),
            ResourceRef::AccelStruct(accel) => accel.state(),
        }
    }

    pub fn native_handle(&self) -> u64 {
        match self {
            ResourceRef::Buffer(buffer) => buffer.native_handle(),
            ResourceRef::Texture(texture) => texture.native_handle(),
            ResourceRef::AccelStruct(accel) => accel.native_handle(),
        }
    }

    /// True when both refer to the same object
    pub fn same_object(&self, other: &ResourceRef) -> bool {
        match (self, other) {
            (ResourceRef::Buffer(a), ResourceRef::Buffer(b)) => Arc::ptr_eq(a, b),
            (ResourceRef::Texture(a), ResourceRef::Texture(b)) => Arc::ptr_eq(a, b),
            (ResourceRef::AccelStruct(a), ResourceRef::AccelStruct(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ResourceRef::Buffer(_) => "Buffer",
            ResourceRef::Texture(_) => "Texture",
            ResourceRef::AccelStruct(_) => "AccelStruct",
        };
        write!(f, "{}('{}')", kind, self.name())
    }
}

/// Object bound to a cache slot, with the view it is accessed through
#[derive(Clone)]
pub enum BoundObject {
    /// Whole buffer (uniform / storage)
    Buffer(Arc<dyn Buffer>),
    /// Formatted (texel) view of a buffer
    TexelBuffer(Arc<dyn Buffer>),
    Texture(Arc<dyn Texture>),
    AccelStruct(Arc<dyn AccelerationStructure>),
}

impl BoundObject {
    pub fn resource(&self) -> ResourceRef {
        match self {
            BoundObject::Buffer(buffer) | BoundObject::TexelBuffer(buffer) => ResourceRef::Buffer(buffer.clone()),
            BoundObject::Texture(texture) => ResourceRef::Texture(texture.clone()),
            BoundObject::AccelStruct(accel) => ResourceRef::AccelStruct(accel.clone()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            BoundObject::Buffer(buffer) | BoundObject::TexelBuffer(buffer) => &buffer.desc().name,
            BoundObject::Texture(texture) => &texture.desc().name,
            BoundObject::AccelStruct(accel) => accel.name(),
        }
    }

    /// Texture views and texel buffer views share the texture/image ranges
    pub fn is_texture_view(&self) -> bool {
        matches!(self, BoundObject::Texture(_))
    }

    pub fn same_object(&self, other: &BoundObject) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
            && self.resource().same_object(&other.resource())
    }
}

impl fmt::Debug for BoundObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            BoundObject::Buffer(_) => "Buffer",
            BoundObject::TexelBuffer(_) => "TexelBuffer",
            BoundObject::Texture(_) => "Texture",
            BoundObject::AccelStruct(_) => "AccelStruct",
        };
        write!(f, "{}('{}')", kind, self.name())
    }
}
