/// Pooled storage for binding-set caches
///
/// Every binding-set instance of a signature needs a slot array of the same
/// size. The allocator hands out such regions and recycles them when an
/// instance is dropped; when the pool is empty it grows by `granularity`
/// regions at once. A granularity of 0 or 1 disables pooling.
///
/// # Example
///
/// ```ignore
/// let pool = CacheAllocator::new("Sig", 8, 4);
/// let a = pool.allocate();     // grows the pool by 4 regions
/// let b = pool.allocate();     // taken from the pool
/// drop(a);                     // returned to the pool, slots cleared
/// assert_eq!(pool.len(), 1);
/// ```

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use super::resource_cache::CacheSlot;

pub struct CacheAllocator {
    name: String,
    region_size: usize,
    granularity: u32,
    pool: Mutex<PoolState>,
}

#[derive(Default)]
struct PoolState {
    free_regions: Vec<Box<[CacheSlot]>>,
    /// Regions currently owned by instances
    len: u32,
    /// Regions ever created
    high_water_mark: u32,
}

impl CacheAllocator {
    pub fn new(name: impl Into<String>, region_size: usize, granularity: u32) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            region_size,
            granularity,
            pool: Mutex::new(PoolState::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region_size(&self) -> usize {
        self.region_size
    }

    pub fn is_pooled(&self) -> bool {
        self.granularity > 1
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        match self.pool.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn new_region(&self) -> Box<[CacheSlot]> {
        (0..self.region_size).map(|_| CacheSlot::default()).collect()
    }

    /// Take a cleared region
    pub fn allocate(self: &Arc<Self>) -> CacheRegion {
        let mut pool = self.lock();
        pool.len += 1;

        if !self.is_pooled() {
            pool.high_water_mark += 1;
            return CacheRegion { slots: self.new_region(), pool: Some(Arc::downgrade(self)) };
        }

        if pool.free_regions.is_empty() {
            for _ in 0..self.granularity {
                let region = self.new_region();
                pool.free_regions.push(region);
            }
            pool.high_water_mark += self.granularity;
            crate::engine_trace!("galaxy3d::Cache",
                "Cache pool of '{}' grown to {} regions", self.name, pool.high_water_mark);
        }

        let slots = pool
            .free_regions
            .pop()
            .unwrap_or_else(|| self.new_region());
        CacheRegion { slots, pool: Some(Arc::downgrade(self)) }
    }

    fn release(&self, slots: Box<[CacheSlot]>) {
        let mut pool = self.lock();
        pool.len = pool.len.saturating_sub(1);
        if self.is_pooled() {
            pool.free_regions.push(slots);
        }
    }

    /// Regions currently in use
    pub fn len(&self) -> u32 {
        self.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Regions ever created
    pub fn high_water_mark(&self) -> u32 {
        self.lock().high_water_mark
    }

    /// Regions waiting in the pool
    pub fn free_count(&self) -> usize {
        self.lock().free_regions.len()
    }
}

/// Slot array owned by one cache; returned to its pool on drop
pub struct CacheRegion {
    slots: Box<[CacheSlot]>,
    pool: Option<Weak<CacheAllocator>>,
}

impl CacheRegion {
    /// Region not backed by any pool
    pub fn standalone(size: usize) -> Self {
        Self {
            slots: (0..size).map(|_| CacheSlot::default()).collect(),
            pool: None,
        }
    }
}

impl Deref for CacheRegion {
    type Target = [CacheSlot];

    fn deref(&self) -> &Self::Target {
        &self.slots
    }
}

impl DerefMut for CacheRegion {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.slots
    }
}

impl Drop for CacheRegion {
    fn drop(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = CacheSlot::default();
        }
        let slots = std::mem::take(&mut self.slots);
        if let Some(pool) = self.pool.as_ref().and_then(Weak::upgrade) {
            pool.release(slots);
        }
    }
}

#[cfg(test)]
#[path = "cache_allocator_tests.rs"]
mod tests;
