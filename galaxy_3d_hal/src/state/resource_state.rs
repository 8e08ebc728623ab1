/// Resource usage states and the per-resource state cell.

use std::sync::atomic::{AtomicU32, Ordering};
use bitflags::bitflags;

bitflags! {
    /// GPU-visible usage state of a resource
    ///
    /// The empty set is `UNKNOWN`: the state is not tracked and automatic
    /// transitions never read or write it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceState: u32 {
        const UNDEFINED = 1 << 0;
        const VERTEX_BUFFER = 1 << 1;
        const CONSTANT_BUFFER = 1 << 2;
        const INDEX_BUFFER = 1 << 3;
        const RENDER_TARGET = 1 << 4;
        const UNORDERED_ACCESS = 1 << 5;
        const DEPTH_WRITE = 1 << 6;
        const DEPTH_READ = 1 << 7;
        const SHADER_RESOURCE = 1 << 8;
        const INDIRECT_ARGUMENT = 1 << 9;
        const COPY_DEST = 1 << 10;
        const COPY_SOURCE = 1 << 11;
        const RESOLVE_DEST = 1 << 12;
        const RESOLVE_SOURCE = 1 << 13;
        const INPUT_ATTACHMENT = 1 << 14;
        const PRESENT = 1 << 15;
        const BUILD_AS_READ = 1 << 16;
        const BUILD_AS_WRITE = 1 << 17;
        const RAY_TRACING = 1 << 18;

        const GENERIC_READ = Self::VERTEX_BUFFER.bits()
            | Self::CONSTANT_BUFFER.bits()
            | Self::INDEX_BUFFER.bits()
            | Self::SHADER_RESOURCE.bits()
            | Self::INDIRECT_ARGUMENT.bits()
            | Self::COPY_SOURCE.bits();
    }
}

impl ResourceState {
    pub const UNKNOWN: ResourceState = ResourceState::empty();

    #[inline]
    pub fn is_unknown(self) -> bool {
        self.is_empty()
    }

    /// True when a resource in `self` can be used as `required` without a barrier
    #[inline]
    pub fn satisfies(self, required: ResourceState) -> bool {
        !required.is_empty() && self.contains(required)
    }

    /// True for states that only read the resource
    pub fn is_read_only(self) -> bool {
        !self.is_unknown()
            && (ResourceState::GENERIC_READ
                | ResourceState::DEPTH_READ
                | ResourceState::RESOLVE_SOURCE
                | ResourceState::INPUT_ATTACHMENT
                | ResourceState::BUILD_AS_READ
                | ResourceState::RAY_TRACING
                | ResourceState::PRESENT)
                .contains(self)
    }
}

impl Default for ResourceState {
    fn default() -> Self {
        ResourceState::UNKNOWN
    }
}

/// Last known state of one GPU resource object
///
/// Stored in a relaxed atomic: reading and writing is memory-safe from any
/// thread, but nothing orders concurrent accesses. Racing `Transition`
/// requests on the same resource are a caller error; resources shared across
/// recorders should be set to `UNKNOWN` and transitioned explicitly.
#[derive(Debug, Default)]
pub struct StateCell(AtomicU32);

impl StateCell {
    pub fn new(initial: ResourceState) -> Self {
        Self(AtomicU32::new(initial.bits()))
    }

    #[inline]
    pub fn get(&self) -> ResourceState {
        ResourceState::from_bits_retain(self.0.load(Ordering::Relaxed))
    }

    /// Overwrite the recorded state (an explicit reset re-enables tracking)
    #[inline]
    pub fn set(&self, state: ResourceState) {
        self.0.store(state.bits(), Ordering::Relaxed);
    }

    /// Externally managed resources are never touched by automatic transitions
    #[inline]
    pub fn is_externally_managed(&self) -> bool {
        self.get().is_unknown()
    }

    /// Disable automatic tracking for this resource
    pub fn release_tracking(&self) {
        self.set(ResourceState::UNKNOWN);
    }
}

#[cfg(test)]
#[path = "resource_state_tests.rs"]
mod tests;
