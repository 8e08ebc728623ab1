/// Resource cache: bound objects of one binding-set instance
///
/// Slots are partitioned into the four binding ranges, followed by a small
/// table for separate sampler variables. Offsets passed to the accessors are
/// relative to their range; the signature computes them.
///
/// The slot array is taken from the signature's `CacheAllocator` on the first
/// write, so instances that are created but never bound cost nothing.

use std::sync::Arc;
use crate::graphics_device::{BoundObject, Sampler};
use super::cache_allocator::{CacheAllocator, CacheRegion};
use super::resource_desc::BindingRange;

/// One cache slot
#[derive(Clone, Default)]
pub struct CacheSlot {
    pub object: Option<BoundObject>,
    /// Sampler used with a texture slot, or the sampler of a sampler-table entry
    pub sampler: Option<Arc<dyn Sampler>>,
    /// Backend view handle of `object` at bind time
    pub aux_handle: u64,
}

impl CacheSlot {
    pub fn is_empty(&self) -> bool {
        self.object.is_none() && self.sampler.is_none()
    }
}

/// Per-range slot counts of a cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct CacheLayout {
    pub range_counts: [u32; BindingRange::COUNT],
    pub sampler_count: u32,
}

impl CacheLayout {
    /// Slots of the four binding ranges
    pub fn slot_count(&self) -> u32 {
        self.range_counts.iter().fold(0u32, |sum, &count| sum.saturating_add(count))
    }

    /// Slots including the sampler table
    pub fn total_count(&self) -> u32 {
        self.slot_count().saturating_add(self.sampler_count)
    }

    /// Slots including the sampler table, `None` if they do not fit in `u32`
    pub fn checked_total_count(&self) -> Option<u32> {
        self.range_counts
            .iter()
            .try_fold(self.sampler_count, |sum, &count| sum.checked_add(count))
    }

    pub fn range_count(&self, range: BindingRange) -> u32 {
        self.range_counts[range.index()]
    }

    fn range_start(&self, range: BindingRange) -> u32 {
        self.range_counts[..range.index()].iter().sum()
    }
}

pub struct ResourceCache {
    layout: CacheLayout,
    allocator: Option<Arc<CacheAllocator>>,
    slots: Option<CacheRegion>,
    static_resources_initialized: bool,
}

impl ResourceCache {
    /// Empty cache with no slots
    pub fn new() -> Self {
        Self {
            layout: CacheLayout::default(),
            allocator: None,
            slots: None,
            static_resources_initialized: false,
        }
    }

    /// Set the slot layout. Storage comes from `allocator` when given, from the
    /// heap otherwise, on the first write.
    pub fn initialize(&mut self, layout: CacheLayout, allocator: Option<Arc<CacheAllocator>>) {
        if let Some(allocator) = &allocator {
            debug_assert_eq!(allocator.region_size(), layout.total_count() as usize);
        }
        self.layout = layout;
        self.allocator = allocator;
        self.slots = None;
        self.static_resources_initialized = false;
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    /// Total number of slots of the four binding ranges
    pub fn slot_count(&self) -> u32 {
        self.layout.slot_count()
    }

    /// True once the slot array has been allocated
    pub fn is_allocated(&self) -> bool {
        self.slots.is_some()
    }

    fn slot_index(&self, range: BindingRange, offset: u32) -> Option<usize> {
        if offset < self.layout.range_count(range) {
            Some((self.layout.range_start(range) + offset) as usize)
        } else {
            None
        }
    }

    fn sampler_index(&self, offset: u32) -> Option<usize> {
        if offset < self.layout.sampler_count {
            Some((self.layout.slot_count() + offset) as usize)
        } else {
            None
        }
    }

    fn slots_mut(&mut self) -> &mut CacheRegion {
        let size = self.layout.total_count() as usize;
        let allocator = &self.allocator;
        self.slots.get_or_insert_with(|| match allocator {
            Some(allocator) => allocator.allocate(),
            None => CacheRegion::standalone(size),
        })
    }

    fn slot_at(&self, index: usize) -> Option<&CacheSlot> {
        self.slots.as_ref().and_then(|slots| slots.get(index))
    }

    /// Overwrite a slot's object. Returns false when the offset is out of range.
    pub fn set_resource(&mut self, range: BindingRange, offset: u32, object: Option<BoundObject>) -> bool {
        let Some(index) = self.slot_index(range, offset) else {
            return false;
        };
        let slot = &mut self.slots_mut()[index];
        slot.aux_handle = object.as_ref().map(native_view).unwrap_or(0);
        slot.object = object;
        true
    }

    /// Overwrite the sampler paired with a texture slot
    pub fn set_texture_sampler(&mut self, range: BindingRange, offset: u32, sampler: Option<Arc<dyn Sampler>>) -> bool {
        let Some(index) = self.slot_index(range, offset) else {
            return false;
        };
        self.slots_mut()[index].sampler = sampler;
        true
    }

    /// Overwrite a sampler-table entry
    pub fn set_sampler(&mut self, offset: u32, sampler: Option<Arc<dyn Sampler>>) -> bool {
        let Some(index) = self.sampler_index(offset) else {
            return false;
        };
        self.slots_mut()[index].sampler = sampler;
        true
    }

    pub fn slot(&self, range: BindingRange, offset: u32) -> Option<&CacheSlot> {
        self.slot_index(range, offset).and_then(|index| self.slot_at(index))
    }

    /// Bound object of a slot, None when unbound
    pub fn resource(&self, range: BindingRange, offset: u32) -> Option<&BoundObject> {
        self.slot(range, offset).and_then(|slot| slot.object.as_ref())
    }

    pub fn sampler(&self, offset: u32) -> Option<&Arc<dyn Sampler>> {
        self.sampler_index(offset)
            .and_then(|index| self.slot_at(index))
            .and_then(|slot| slot.sampler.as_ref())
    }

    /// True when a slot holds an object of the expected view kind
    ///
    /// The texture and image ranges hold both texture views and texel buffer
    /// views; `expect_texture_view` tells which one the shader expects there.
    pub fn is_bound(&self, range: BindingRange, offset: u32, expect_texture_view: bool) -> bool {
        match self.resource(range, offset) {
            None => false,
            Some(object) => match range {
                BindingRange::Texture | BindingRange::Image => object.is_texture_view() == expect_texture_view,
                BindingRange::UniformBuffer => matches!(object, BoundObject::Buffer(_)),
                BindingRange::StorageBuffer => {
                    matches!(object, BoundObject::Buffer(_) | BoundObject::AccelStruct(_))
                }
            },
        }
    }

    /// Copy one slot of `src` into this cache
    pub(crate) fn copy_slot_from(
        &mut self,
        src: &ResourceCache,
        range: BindingRange,
        src_offset: u32,
        dst_offset: u32,
    ) -> bool {
        let Some(slot) = src.slot(range, src_offset).cloned() else {
            return false;
        };
        let Some(index) = self.slot_index(range, dst_offset) else {
            return false;
        };
        let dst = &mut self.slots_mut()[index];
        dst.object = slot.object;
        dst.aux_handle = slot.aux_handle;
        if slot.sampler.is_some() {
            dst.sampler = slot.sampler;
        }
        dst.object.is_some()
    }

    /// Copy one sampler-table entry of `src` into this cache
    pub(crate) fn copy_sampler_from(&mut self, src: &ResourceCache, src_offset: u32, dst_offset: u32) -> bool {
        let sampler = src.sampler(src_offset).cloned();
        let bound = sampler.is_some();
        self.set_sampler(dst_offset, sampler) && bound
    }

    /// Standalone copy of every slot, sharing the bound objects
    pub fn snapshot(&self) -> ResourceCache {
        let slots = self.slots.as_ref().map(|slots| {
            let mut region = CacheRegion::standalone(slots.len());
            region.clone_from_slice(slots);
            region
        });
        ResourceCache {
            layout: self.layout,
            allocator: None,
            slots,
            static_resources_initialized: self.static_resources_initialized,
        }
    }

    pub fn static_resources_initialized(&self) -> bool {
        self.static_resources_initialized
    }

    /// Set the marker. Returns false if it was already set.
    pub fn mark_static_resources_initialized(&mut self) -> bool {
        !std::mem::replace(&mut self.static_resources_initialized, true)
    }

    /// Every bound object with its range and offset
    pub fn bound_objects(&self) -> impl Iterator<Item = (BindingRange, u32, &BoundObject)> + '_ {
        BindingRange::ALL.into_iter().flat_map(move |range| {
            (0..self.layout.range_count(range)).filter_map(move |offset| {
                self.resource(range, offset).map(|object| (range, offset, object))
            })
        })
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

fn native_view(object: &BoundObject) -> u64 {
    match object {
        BoundObject::Buffer(buffer) => buffer.native_handle(),
        BoundObject::TexelBuffer(buffer) => buffer.native_view(),
        BoundObject::Texture(texture) => texture.native_view(),
        BoundObject::AccelStruct(accel) => accel.native_handle(),
    }
}

#[cfg(test)]
#[path = "resource_cache_tests.rs"]
mod tests;
