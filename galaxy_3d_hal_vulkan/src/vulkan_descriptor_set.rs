/// Descriptor pools of a command sink
///
/// Every commit writes fresh descriptor sets, so sets never change while a
/// previously recorded command buffer may still read them. Pools are owned by
/// the command list and destroyed with it, once its execution is complete.

use ash::vk;
use galaxy_3d_hal::galaxy3d::Result;
use galaxy_3d_hal::{engine_err, engine_info};
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Sets per shared pool
const POOL_MAX_SETS: u32 = 256;

/// Descriptors of each type per shared pool
const POOL_SIZES: [vk::DescriptorPoolSize; 8] = [
    vk::DescriptorPoolSize { ty: vk::DescriptorType::UNIFORM_BUFFER, descriptor_count: 512 },
    vk::DescriptorPoolSize { ty: vk::DescriptorType::STORAGE_BUFFER, descriptor_count: 256 },
    vk::DescriptorPoolSize { ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER, descriptor_count: 1024 },
    vk::DescriptorPoolSize { ty: vk::DescriptorType::SAMPLED_IMAGE, descriptor_count: 1024 },
    vk::DescriptorPoolSize { ty: vk::DescriptorType::STORAGE_IMAGE, descriptor_count: 128 },
    vk::DescriptorPoolSize { ty: vk::DescriptorType::SAMPLER, descriptor_count: 256 },
    vk::DescriptorPoolSize { ty: vk::DescriptorType::UNIFORM_TEXEL_BUFFER, descriptor_count: 128 },
    vk::DescriptorPoolSize { ty: vk::DescriptorType::STORAGE_TEXEL_BUFFER, descriptor_count: 128 },
];

pub(crate) struct DescriptorAllocator {
    ctx: Arc<GpuContext>,
    /// Shared pools, the last one is current
    pools: Vec<vk::DescriptorPool>,
    /// Pools sized for sets the shared pools cannot hold
    dedicated: Vec<vk::DescriptorPool>,
    name: String,
}

impl DescriptorAllocator {
    pub(crate) fn new(ctx: Arc<GpuContext>, name: impl Into<String>) -> Self {
        Self {
            ctx,
            pools: Vec::new(),
            dedicated: Vec::new(),
            name: name.into(),
        }
    }

    fn create_pool(&self, sizes: &[vk::DescriptorPoolSize], max_sets: u32) -> Result<vk::DescriptorPool> {
        let info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(sizes)
            .max_sets(max_sets);
        unsafe {
            self.ctx.device.create_descriptor_pool(&info, None)
                .map_err(|e| engine_err!("galaxy3d::vulkan", "Failed to create descriptor pool: {:?}", e))
        }
    }

    fn try_allocate(&self, pool: vk::DescriptorPool, layout: vk::DescriptorSetLayout) -> std::result::Result<vk::DescriptorSet, vk::Result> {
        let layouts = [layout];
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        unsafe { self.ctx.device.allocate_descriptor_sets(&allocate_info).map(|sets| sets[0]) }
    }

    /// Allocate a set of `layout`; `sizes` are the set's descriptor counts
    pub(crate) fn allocate(&mut self, layout: vk::DescriptorSetLayout, sizes: &[vk::DescriptorPoolSize]) -> Result<vk::DescriptorSet> {
        if let Some(&current) = self.pools.last() {
            match self.try_allocate(current, layout) {
                Ok(set) => return Ok(set),
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {}
                Err(e) => return Err(engine_err!("galaxy3d::vulkan",
                    "Failed to allocate descriptor set: {:?}", e)),
            }
        }

        // Grow: fresh shared pool
        let pool = self.create_pool(&POOL_SIZES, POOL_MAX_SETS)?;
        self.pools.push(pool);
        if self.pools.len() > 1 {
            engine_info!("galaxy3d::vulkan",
                "Descriptor pool of '{}' exhausted, created new pool (total: {})", self.name, self.pools.len());
        }
        match self.try_allocate(pool, layout) {
            Ok(set) => return Ok(set),
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {}
            Err(e) => return Err(engine_err!("galaxy3d::vulkan",
                "Failed to allocate descriptor set after pool growth: {:?}", e)),
        }

        // The set does not fit an empty shared pool (large arrays, rare types)
        let pool = self.create_pool(sizes, 1)?;
        self.dedicated.push(pool);
        self.try_allocate(pool, layout)
            .map_err(|e| engine_err!("galaxy3d::vulkan", "Failed to allocate descriptor set from a dedicated pool: {:?}", e))
    }
}

impl Drop for DescriptorAllocator {
    fn drop(&mut self) {
        unsafe {
            for &pool in self.pools.iter().chain(&self.dedicated) {
                self.ctx.device.destroy_descriptor_pool(pool, None);
            }
        }
    }
}
