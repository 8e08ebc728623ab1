/// Sampler - Vulkan implementation of the Sampler trait, and the sampler cache
///
/// Engines only need a handful of distinct samplers, and immutable samplers
/// are created once per signature, so identical descriptions share one
/// VkSampler through the device's cache.

use ash::vk;
use ash::vk::Handle;
use galaxy_3d_hal::galaxy3d::device::{Sampler as HalSampler, SamplerDesc};
use galaxy_3d_hal::galaxy3d::Result;
use galaxy_3d_hal::{engine_err, engine_trace};
use rustc_hash::{FxHashMap, FxHasher};
use std::hash::Hasher;
use std::sync::{Arc, Mutex, Weak};

use crate::vulkan_context::GpuContext;
use crate::vulkan_conversions::sampler_create_info;

/// Vulkan sampler
pub struct Sampler {
    ctx: Arc<GpuContext>,
    desc: SamplerDesc,
    pub(crate) sampler: vk::Sampler,
}

impl HalSampler for Sampler {
    fn desc(&self) -> &SamplerDesc {
        &self.desc
    }

    fn native_handle(&self) -> u64 {
        self.sampler.as_raw()
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_sampler(self.sampler, None);
        }
    }
}

fn desc_hash(desc: &SamplerDesc) -> u64 {
    let mut hasher = FxHasher::default();
    desc.hash_into(&mut hasher);
    hasher.finish()
}

/// Samplers by description, held weakly: a sampler is destroyed with its last user
pub(crate) struct SamplerCache {
    ctx: Arc<GpuContext>,
    max_anisotropy: f32,
    cache: Mutex<FxHashMap<u64, Vec<Weak<Sampler>>>>,
}

impl SamplerCache {
    /// `max_anisotropy` is 0 when sampler anisotropy is not enabled on the device
    pub(crate) fn new(ctx: Arc<GpuContext>, max_anisotropy: f32) -> Self {
        Self {
            ctx,
            max_anisotropy,
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    /// Get or create the sampler for `desc`
    pub(crate) fn get(&self, desc: &SamplerDesc) -> Result<Arc<Sampler>> {
        let hash = desc_hash(desc);
        let mut cache = self.cache.lock().map_err(|_| engine_err!("galaxy3d::vulkan", "Sampler cache lock poisoned"))?;
        let bucket = cache.entry(hash).or_default();
        bucket.retain(|weak| weak.strong_count() > 0);

        if let Some(sampler) = bucket.iter().filter_map(Weak::upgrade).find(|sampler| sampler.desc == *desc) {
            return Ok(sampler);
        }

        let info = sampler_create_info(desc, self.max_anisotropy);
        let sampler = unsafe {
            self.ctx.device.create_sampler(&info, None)
                .map_err(|e| engine_err!("galaxy3d::vulkan", "Failed to create sampler: {:?}", e))?
        };
        engine_trace!("galaxy3d::vulkan", "Created sampler {:#018x} ({:?} / {:?})",
            sampler.as_raw(), desc.min_filter, desc.address_u);

        let sampler = Arc::new(Sampler {
            ctx: Arc::clone(&self.ctx),
            desc: *desc,
            sampler,
        });
        bucket.push(Arc::downgrade(&sampler));
        Ok(sampler)
    }

    /// Live samplers
    pub(crate) fn len(&self) -> usize {
        self.cache
            .lock()
            .map(|cache| cache.values().flatten().filter(|weak| weak.strong_count() > 0).count())
            .unwrap_or(0)
    }
}
