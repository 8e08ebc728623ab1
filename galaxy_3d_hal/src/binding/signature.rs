/// Resource signature
///
/// A signature is the compiled form of a `SignatureDesc`: every resource gets
/// a binding range and contiguous cache slots, a descriptor set and binding
/// index, and an optional sampler assignment. Signatures are hashed so that
/// pipelines built from identical descriptions can share committed bindings.
///
/// Static resources are stored once in the signature's static cache and
/// copied into every binding-set instance before its first commit.

use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use rustc_hash::FxHasher;
use crate::engine_fail;
use crate::error::{Error, Result};
use crate::graphics_device::{
    BoundObject, GraphicsDevice, LayoutBinding, NativeSignatureLayout, Sampler, SignatureLayoutInfo,
};
use super::cache_allocator::CacheAllocator;
use super::resource_cache::{CacheLayout, ResourceCache};
use super::resource_desc::{
    name_matches, BindingRange, ResourceDesc, ResourceFlags, ResourceKind, ShaderStages, SignatureDesc,
    VariableType,
};

/// Maximum number of signatures in one pipeline layout
pub const MAX_RESOURCE_SIGNATURES: usize = 8;

/// Sampler used by a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerAssignment {
    None,
    /// Index into the signature's immutable samplers
    Immutable(u32),
    /// Index of the separate sampler resource paired through the combined suffix
    Resource(u32),
}

/// Layout attributes of one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceAttribs {
    /// None for sampler resources, which live in the sampler table
    pub range: Option<BindingRange>,
    /// First slot in the range (or sampler table) of the instance caches
    pub cache_offset: u32,
    /// First slot in the static cache, for static resources
    pub static_offset: Option<u32>,
    pub sampler: SamplerAssignment,
    /// Descriptor set, relative to the signature's first set
    pub descriptor_set: u32,
    pub binding: u32,
}

impl ResourceAttribs {
    #[inline]
    pub fn imtbl_sampler_assigned(&self) -> bool {
        matches!(self.sampler, SamplerAssignment::Immutable(_))
    }

    /// Sampler resource whose sampler is baked into the layout
    fn has_storage(&self, kind: ResourceKind) -> bool {
        kind != ResourceKind::Sampler || !self.imtbl_sampler_assigned()
    }
}

/// Immutable sampler created with the signature
pub struct ImmutableSamplerAttribs {
    pub name: String,
    pub stages: ShaderStages,
    pub sampler: Arc<dyn Sampler>,
    /// Sampler resource the sampler is baked into, if any
    pub assigned_resource: Option<u32>,
    pub descriptor_set: u32,
    pub binding: u32,
}

pub struct ResourceSignature {
    desc: SignatureDesc,
    attribs: Vec<ResourceAttribs>,
    immutable_samplers: Vec<ImmutableSamplerAttribs>,
    cache_layout: CacheLayout,
    static_layout: CacheLayout,
    static_resource_count: usize,
    descriptor_set_count: u32,
    hash: u64,
    static_cache: RwLock<ResourceCache>,
    cache_allocator: Arc<CacheAllocator>,
    validation: bool,
    native: Box<dyn NativeSignatureLayout>,
}

impl ResourceSignature {
    /// Compile a signature description
    ///
    /// # Errors
    ///
    /// `InvalidLayout` for malformed descriptions (unsorted resources, zero
    /// array sizes, duplicates, misused flags, slot counts past `u32`), or the
    /// backend's error when a sampler or the native layout cannot be created.
    pub fn new(device: &dyn GraphicsDevice, desc: SignatureDesc) -> Result<Arc<Self>> {
        validate_desc(&desc)?;

        let mut immutable_samplers = Vec::with_capacity(desc.immutable_samplers.len());
        for imtbl in &desc.immutable_samplers {
            immutable_samplers.push(ImmutableSamplerAttribs {
                name: imtbl.sampler_or_texture_name.clone(),
                stages: imtbl.stages,
                sampler: device.create_sampler(&imtbl.desc)?,
                assigned_resource: None,
                descriptor_set: 0,
                binding: 0,
            });
        }

        let suffix = desc.combined_suffix();
        let find_immutable = |name: &str, stages: ShaderStages, as_texture: bool| {
            immutable_samplers.iter().position(|imtbl| {
                imtbl.stages.intersects(stages)
                    && if as_texture {
                        name_matches(&imtbl.name, name, suffix)
                    } else {
                        name_matches(name, &imtbl.name, suffix)
                    }
            })
        };

        // Sampler assignments first: set 0 exists only if something lands in it
        let mut assignments = Vec::with_capacity(desc.resources.len());
        for res in &desc.resources {
            let assignment = match res.kind {
                ResourceKind::Sampler => match find_immutable(&res.name, res.stages, false) {
                    Some(index) => SamplerAssignment::Immutable(index as u32),
                    None => SamplerAssignment::None,
                },
                ResourceKind::SampledTexture => match find_immutable(&res.name, res.stages, true) {
                    Some(index) => SamplerAssignment::Immutable(index as u32),
                    None => match suffix {
                        Some(suffix) => desc
                            .resources
                            .iter()
                            .position(|s| {
                                s.kind == ResourceKind::Sampler
                                    && s.stages.intersects(res.stages)
                                    && s.name.strip_prefix(res.name.as_str()) == Some(suffix)
                            })
                            .map(|index| SamplerAssignment::Resource(index as u32))
                            .unwrap_or(SamplerAssignment::None),
                        None => SamplerAssignment::None,
                    },
                },
                _ => SamplerAssignment::None,
            };
            assignments.push(assignment);
        }

        for (index, (res, assignment)) in desc.resources.iter().zip(&assignments).enumerate() {
            if let (ResourceKind::Sampler, SamplerAssignment::Immutable(imtbl)) = (res.kind, assignment) {
                let imtbl = &mut immutable_samplers[*imtbl as usize];
                if imtbl.assigned_resource.is_none() {
                    imtbl.assigned_resource = Some(index as u32);
                }
            }
        }

        let uses_set_zero = desc.resources.iter().any(|res| res.var_type != VariableType::Dynamic)
            || immutable_samplers.iter().any(|imtbl| imtbl.assigned_resource.is_none());
        let dynamic_set = if uses_set_zero { 1 } else { 0 };
        let mut next_binding = [0u32; 2];

        let mut cache_layout = CacheLayout::default();
        let mut static_layout = CacheLayout::default();
        let mut attribs = Vec::with_capacity(desc.resources.len());

        for (res, sampler) in desc.resources.iter().zip(assignments) {
            let range = res.range();
            let (cache_offset, static_offset) = match range {
                Some(range) => {
                    let offset = reserve_slots(&desc, res, &mut cache_layout.range_counts[range.index()])?;
                    let static_offset = if res.var_type == VariableType::Static {
                        Some(reserve_slots(&desc, res, &mut static_layout.range_counts[range.index()])?)
                    } else {
                        None
                    };
                    (offset, static_offset)
                }
                None if matches!(sampler, SamplerAssignment::Immutable(_)) => (0, None),
                None => {
                    let offset = reserve_slots(&desc, res, &mut cache_layout.sampler_count)?;
                    let static_offset = if res.var_type == VariableType::Static {
                        Some(reserve_slots(&desc, res, &mut static_layout.sampler_count)?)
                    } else {
                        None
                    };
                    (offset, static_offset)
                }
            };

            let descriptor_set = if res.var_type == VariableType::Dynamic { dynamic_set } else { 0 };
            let binding = next_binding[descriptor_set as usize];
            next_binding[descriptor_set as usize] += 1;

            attribs.push(ResourceAttribs {
                range,
                cache_offset,
                static_offset,
                sampler,
                descriptor_set,
                binding,
            });
        }

        if cache_layout.checked_total_count().is_none() {
            engine_fail!("galaxy3d::Signature",
                Error::InvalidLayout(format!("Signature '{}': slot count overflows", desc.name)));
        }

        for imtbl in immutable_samplers.iter_mut() {
            match imtbl.assigned_resource {
                Some(index) => {
                    imtbl.descriptor_set = attribs[index as usize].descriptor_set;
                    imtbl.binding = attribs[index as usize].binding;
                }
                None => {
                    imtbl.descriptor_set = 0;
                    imtbl.binding = next_binding[0];
                    next_binding[0] += 1;
                }
            }
        }

        let descriptor_set_count = if desc.resources.iter().any(|res| res.var_type == VariableType::Dynamic) {
            dynamic_set + 1
        } else if uses_set_zero {
            1
        } else {
            0
        };

        let hash = compute_hash(&desc, &attribs, &immutable_samplers);

        let sets = layout_bindings(&desc, &attribs, &immutable_samplers, descriptor_set_count);
        let native = device.create_signature_layout(&SignatureLayoutInfo {
            name: &desc.name,
            sets: &sets,
        })?;

        let mut static_cache = ResourceCache::new();
        static_cache.initialize(static_layout, None);

        let granularity = desc
            .allocation_granularity
            .unwrap_or(device.config().allocation_granularity);
        let cache_allocator = CacheAllocator::new(desc.name.clone(), cache_layout.total_count() as usize, granularity);

        let static_resource_count = desc
            .resources
            .iter()
            .take_while(|res| res.var_type == VariableType::Static)
            .count();

        crate::engine_debug!("galaxy3d::Signature",
            "Created signature '{}': {} resources, {} slots ({} static), {} descriptor sets, hash {:#018x}",
            desc.name, desc.resources.len(), cache_layout.slot_count(), static_layout.slot_count(),
            descriptor_set_count, hash);

        Ok(Arc::new(Self {
            desc,
            attribs,
            immutable_samplers,
            cache_layout,
            static_layout,
            static_resource_count,
            descriptor_set_count,
            hash,
            static_cache: RwLock::new(static_cache),
            cache_allocator,
            validation: device.config().validation_enabled(),
            native,
        }))
    }

    // ===== Accessors =====

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn desc(&self) -> &SignatureDesc {
        &self.desc
    }

    pub fn binding_index(&self) -> u8 {
        self.desc.binding_index
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn resource_count(&self) -> usize {
        self.desc.resources.len()
    }

    pub fn resource(&self, index: usize) -> &ResourceDesc {
        &self.desc.resources[index]
    }

    pub fn attribs(&self, index: usize) -> &ResourceAttribs {
        &self.attribs[index]
    }

    /// Resources with their attributes, in declaration order
    pub fn resources(&self) -> impl Iterator<Item = (&ResourceDesc, &ResourceAttribs)> {
        self.desc.resources.iter().zip(self.attribs.iter())
    }

    pub fn immutable_samplers(&self) -> &[ImmutableSamplerAttribs] {
        &self.immutable_samplers
    }

    /// Slot counts of the instance caches
    pub fn cache_layout(&self) -> &CacheLayout {
        &self.cache_layout
    }

    /// Slot counts of the static cache
    pub fn static_layout(&self) -> &CacheLayout {
        &self.static_layout
    }

    /// Total slots of the four binding ranges
    pub fn total_slot_count(&self) -> u32 {
        self.cache_layout.slot_count()
    }

    pub fn static_slot_count(&self) -> u32 {
        self.static_layout.slot_count()
    }

    /// Static resources come first; this is their count
    pub fn static_resource_count(&self) -> usize {
        self.static_resource_count
    }

    pub fn descriptor_set_count(&self) -> u32 {
        self.descriptor_set_count
    }

    pub fn combined_sampler_suffix(&self) -> Option<&str> {
        self.desc.combined_suffix()
    }

    pub fn cache_allocator(&self) -> &Arc<CacheAllocator> {
        &self.cache_allocator
    }

    pub fn native(&self) -> &dyn NativeSignatureLayout {
        self.native.as_ref()
    }

    pub(crate) fn validation_enabled(&self) -> bool {
        self.validation
    }

    /// Index of the resource `name` visible to any of `stages`
    pub fn find_resource(&self, stages: ShaderStages, name: &str) -> Option<usize> {
        self.desc
            .resources
            .iter()
            .position(|res| res.name == name && res.stages.intersects(stages))
    }

    /// Index of the immutable sampler a shader sampler variable `name` resolves to
    pub fn find_immutable_sampler(&self, stages: ShaderStages, name: &str) -> Option<usize> {
        let suffix = self.desc.combined_suffix();
        self.immutable_samplers
            .iter()
            .position(|imtbl| imtbl.stages.intersects(stages) && name_matches(name, &imtbl.name, suffix))
    }

    // ===== Compatibility =====

    /// True when committed bindings of `other` can be used with this signature
    ///
    /// Sampler indices are not compared, only whether an immutable sampler is
    /// assigned.
    pub fn is_compatible_with(&self, other: &ResourceSignature) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.hash != other.hash
            || self.desc.binding_index != other.desc.binding_index
            || self.cache_layout != other.cache_layout
            || self.desc.resources.len() != other.desc.resources.len()
            || self.immutable_samplers.len() != other.immutable_samplers.len()
        {
            return false;
        }

        let resources_match = self.resources().zip(other.resources()).all(|((a, a_attr), (b, b_attr))| {
            a.stages == b.stages
                && a.array_size == b.array_size
                && a.kind == b.kind
                && a.var_type == b.var_type
                && a.flags == b.flags
                && a_attr.range == b_attr.range
                && a_attr.cache_offset == b_attr.cache_offset
                && a_attr.imtbl_sampler_assigned() == b_attr.imtbl_sampler_assigned()
        });
        if !resources_match {
            return false;
        }

        self.immutable_samplers
            .iter()
            .zip(other.immutable_samplers.iter())
            .all(|(a, b)| a.stages == b.stages && a.sampler.desc() == b.sampler.desc())
    }

    // ===== Static resources =====

    pub fn static_cache(&self) -> RwLockReadGuard<'_, ResourceCache> {
        match self.static_cache.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn static_cache_mut(&self) -> RwLockWriteGuard<'_, ResourceCache> {
        match self.static_cache.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Bind `object` to element 0 of the static variable `name`
    pub fn set_static(&self, stages: ShaderStages, name: &str, object: BoundObject) -> bool {
        self.set_static_array(stages, name, 0, Some(object))
    }

    /// Bind (or unbind) one element of a static variable
    ///
    /// Unknown names are ignored; binding a non-static variable is an error.
    pub fn set_static_array(
        &self,
        stages: ShaderStages,
        name: &str,
        array_index: u32,
        object: Option<BoundObject>,
    ) -> bool {
        let Some(index) = self.static_resource(stages, name) else {
            return false;
        };
        let mut cache = self.static_cache_mut();
        self.bind_object(&mut cache, index, array_index, object, true)
    }

    /// Bind a sampler to the static sampler variable `name`
    pub fn set_static_sampler(&self, stages: ShaderStages, name: &str, sampler: Arc<dyn Sampler>) -> bool {
        let Some(index) = self.static_resource(stages, name) else {
            return false;
        };
        let mut cache = self.static_cache_mut();
        self.bind_sampler(&mut cache, index, 0, Some(sampler), true)
    }

    fn static_resource(&self, stages: ShaderStages, name: &str) -> Option<usize> {
        let Some(index) = self.find_resource(stages, name) else {
            crate::engine_trace!("galaxy3d::Signature",
                "Static variable '{}' not found in signature '{}'", name, self.desc.name);
            return None;
        };
        if self.desc.resources[index].var_type != VariableType::Static {
            crate::engine_error!("galaxy3d::Signature",
                "Variable '{}' of signature '{}' is not static; bind it through a shader resource binding",
                name, self.desc.name);
            return None;
        }
        Some(index)
    }

    /// Copy every static slot into `dst`
    ///
    /// Unpopulated static slots are reported (validation builds) but do not
    /// stop the copy. Marks `dst` as initialized; a second call on the same
    /// cache does nothing. Returns false if a static slot was unbound.
    pub fn copy_static_resources(&self, dst: &mut ResourceCache) -> bool {
        if dst.static_resources_initialized() {
            crate::engine_warn!("galaxy3d::Signature",
                "Static resources of signature '{}' have already been copied into this binding set",
                self.desc.name);
            return true;
        }

        let src = self.static_cache();
        let mut complete = true;

        for index in 0..self.static_resource_count {
            let res = &self.desc.resources[index];
            let attr = &self.attribs[index];
            let Some(static_offset) = attr.static_offset else {
                continue;
            };

            let mut bound = true;
            for element in 0..res.array_size {
                let copied = match attr.range {
                    Some(range) => {
                        dst.copy_slot_from(&src, range, static_offset + element, attr.cache_offset + element)
                    }
                    None => {
                        let copied = dst.copy_sampler_from(&src, static_offset + element, attr.cache_offset + element);
                        if let Some(sampler) = src.sampler(static_offset + element).cloned() {
                            self.propagate_sampler(dst, index, element, &sampler, false);
                        }
                        copied
                    }
                };
                bound &= copied;
            }

            if !bound {
                complete = false;
                if self.validation {
                    crate::engine_error!("galaxy3d::Signature",
                        "No resource is assigned to static shader variable '{}' in pipeline resource signature '{}'.",
                        res.name, self.desc.name);
                }
            }
        }

        dst.mark_static_resources_initialized();
        complete
    }

    // ===== Cache writes =====

    /// Prepare an instance cache: slot layout, pool and immutable samplers of textures
    pub(crate) fn initialize_instance_cache(&self, cache: &mut ResourceCache) {
        cache.initialize(self.cache_layout, Some(self.cache_allocator.clone()));
        for (res, attr) in self.resources() {
            if let (Some(range), SamplerAssignment::Immutable(imtbl)) = (attr.range, attr.sampler) {
                let sampler = &self.immutable_samplers[imtbl as usize].sampler;
                for element in 0..res.array_size {
                    cache.set_texture_sampler(range, attr.cache_offset + element, Some(sampler.clone()));
                }
            }
        }
    }

    fn slot_offset(&self, index: usize, array_index: u32, static_cache: bool) -> Option<u32> {
        let attr = &self.attribs[index];
        let base = if static_cache { attr.static_offset? } else { attr.cache_offset };
        Some(base + array_index)
    }

    /// Write `object` into the slot of resource `index`
    pub(crate) fn bind_object(
        &self,
        cache: &mut ResourceCache,
        index: usize,
        array_index: u32,
        object: Option<BoundObject>,
        static_cache: bool,
    ) -> bool {
        let res = &self.desc.resources[index];
        let attr = &self.attribs[index];

        if array_index >= res.array_size {
            crate::engine_error!("galaxy3d::Signature",
                "Array index {} is out of range for variable '{}' of size {}",
                array_index, res.name, res.array_size);
            return false;
        }

        let Some(range) = attr.range else {
            crate::engine_error!("galaxy3d::Signature",
                "Variable '{}' is a sampler; bind it with a sampler object", res.name);
            return false;
        };

        if let Some(object) = &object {
            if !object_matches(res, object) {
                crate::engine_error!("galaxy3d::Signature",
                    "Failed to bind object '{}' to variable '{}': a {} is expected",
                    object.name(), res.name, res.kind.name());
                return false;
            }
        }

        let Some(offset) = self.slot_offset(index, array_index, static_cache) else {
            return false;
        };

        if self.validation && !static_cache && res.var_type != VariableType::Dynamic {
            if let (Some(bound), Some(new)) = (cache.resource(range, offset), &object) {
                if !bound.same_object(new) {
                    crate::engine_warn!("galaxy3d::Signature",
                        "Non-null resource '{}' is already bound to {:?} variable '{}'. Rebinding it to '{}'; label the variable as dynamic if it changes between commits",
                        bound.name(), res.var_type, res.name, new.name());
                }
            }
        }

        cache.set_resource(range, offset, object)
    }

    /// Write a sampler into the table entry of sampler resource `index` and
    /// into every texture paired with it
    pub(crate) fn bind_sampler(
        &self,
        cache: &mut ResourceCache,
        index: usize,
        array_index: u32,
        sampler: Option<Arc<dyn Sampler>>,
        static_cache: bool,
    ) -> bool {
        let res = &self.desc.resources[index];
        let attr = &self.attribs[index];

        if res.kind != ResourceKind::Sampler {
            crate::engine_error!("galaxy3d::Signature",
                "Variable '{}' is a {}, not a sampler", res.name, res.kind.name());
            return false;
        }
        if attr.imtbl_sampler_assigned() {
            crate::engine_warn!("galaxy3d::Signature",
                "Sampler '{}' is immutable in signature '{}' and cannot be bound", res.name, self.desc.name);
            return false;
        }
        if array_index >= res.array_size {
            crate::engine_error!("galaxy3d::Signature",
                "Array index {} is out of range for sampler '{}' of size {}", array_index, res.name, res.array_size);
            return false;
        }
        let Some(offset) = self.slot_offset(index, array_index, static_cache) else {
            return false;
        };

        if let Some(sampler) = &sampler {
            self.propagate_sampler(cache, index, array_index, sampler, static_cache);
        }
        cache.set_sampler(offset, sampler)
    }

    /// Copy a sampler into the texture slots paired with sampler resource `index`
    fn propagate_sampler(
        &self,
        cache: &mut ResourceCache,
        index: usize,
        array_index: u32,
        sampler: &Arc<dyn Sampler>,
        static_cache: bool,
    ) {
        let sampler_size = self.desc.resources[index].array_size;
        for (tex_index, (tex, tex_attr)) in self.resources().enumerate() {
            if tex_attr.sampler != SamplerAssignment::Resource(index as u32) {
                continue;
            }
            let Some(range) = tex_attr.range else {
                continue;
            };
            let elements = if sampler_size == 1 {
                0..tex.array_size
            } else if array_index < tex.array_size {
                array_index..array_index + 1
            } else {
                0..0
            };
            for element in elements {
                if let Some(offset) = self.slot_offset(tex_index, element, static_cache) {
                    cache.set_texture_sampler(range, offset, Some(sampler.clone()));
                }
            }
        }
    }

    /// True when every storage-backed slot of `index` holds an object
    pub(crate) fn is_resource_bound(&self, cache: &ResourceCache, index: usize) -> bool {
        let res = &self.desc.resources[index];
        let attr = &self.attribs[index];
        if !attr.has_storage(res.kind) {
            return true;
        }
        let count = if res.flags.contains(ResourceFlags::RUNTIME_ARRAY) { 1 } else { res.array_size };
        (0..count).all(|element| match attr.range {
            Some(range) => cache.is_bound(range, attr.cache_offset + element, expects_texture_view(res)),
            None => cache.sampler(attr.cache_offset + element).is_some(),
        })
    }
}

/// True when the texture/image slot of `res` expects a texture view (vs. a texel buffer view)
pub(crate) fn expects_texture_view(res: &ResourceDesc) -> bool {
    !res.kind.is_buffer()
}

fn object_matches(res: &ResourceDesc, object: &BoundObject) -> bool {
    let formatted = res.flags.contains(ResourceFlags::FORMATTED_BUFFER);
    match (res.kind, object) {
        (ResourceKind::UniformBuffer | ResourceKind::StorageBuffer, BoundObject::TexelBuffer(_)) => formatted,
        (ResourceKind::UniformBuffer | ResourceKind::StorageBuffer, BoundObject::Buffer(_)) => !formatted,
        (ResourceKind::SampledTexture | ResourceKind::StorageTexture | ResourceKind::InputAttachment, BoundObject::Texture(_)) => true,
        (ResourceKind::AccelerationStructure, BoundObject::AccelStruct(_)) => true,
        _ => false,
    }
}

/// Reserve `res.array_size` slots at the end of `counter`, returning the first one
fn reserve_slots(desc: &SignatureDesc, res: &ResourceDesc, counter: &mut u32) -> Result<u32> {
    let offset = *counter;
    match offset.checked_add(res.array_size) {
        Some(end) => {
            *counter = end;
            Ok(offset)
        }
        None => engine_fail!("galaxy3d::Signature", Error::InvalidLayout(format!(
            "Signature '{}': slot count overflows at resource '{}' ({} slots after {})",
            desc.name, res.name, res.array_size, offset
        ))),
    }
}

fn invalid(desc: &SignatureDesc, message: String) -> Result<()> {
    engine_fail!("galaxy3d::Signature",
        Error::InvalidLayout(format!("Signature '{}': {}", desc.name, message)));
}

fn validate_desc(desc: &SignatureDesc) -> Result<()> {
    if desc.name.is_empty() {
        engine_fail!("galaxy3d::Signature", Error::InvalidLayout("Signature name must not be empty".to_string()));
    }
    if desc.binding_index as usize >= MAX_RESOURCE_SIGNATURES {
        return invalid(desc, format!(
            "binding index {} exceeds the maximum of {} signatures",
            desc.binding_index, MAX_RESOURCE_SIGNATURES
        ));
    }
    if desc.use_combined_texture_samplers && desc.combined_sampler_suffix.is_empty() {
        return invalid(desc, "combined texture samplers require a non-empty sampler suffix".to_string());
    }

    for (index, res) in desc.resources.iter().enumerate() {
        if res.name.is_empty() {
            return invalid(desc, format!("resource {} has an empty name", index));
        }
        if res.stages.is_empty() {
            return invalid(desc, format!("resource '{}' is not visible to any shader stage", res.name));
        }
        if res.array_size == 0 {
            return invalid(desc, format!(
                "resource '{}' has zero array size; runtime-sized arrays must set RUNTIME_ARRAY and give an upper bound",
                res.name
            ));
        }
        if res.flags.contains(ResourceFlags::FORMATTED_BUFFER) && !res.kind.is_buffer() {
            return invalid(desc, format!("FORMATTED_BUFFER is only valid for buffers, but '{}' is a {}", res.name, res.kind.name()));
        }
        if res.flags.contains(ResourceFlags::COMBINED_SAMPLER) && res.kind != ResourceKind::SampledTexture {
            return invalid(desc, format!("COMBINED_SAMPLER is only valid for sampled textures, but '{}' is a {}", res.name, res.kind.name()));
        }
        if res.flags.contains(ResourceFlags::READ_ONLY) && res.kind != ResourceKind::StorageBuffer {
            return invalid(desc, format!("READ_ONLY is only valid for storage buffers, but '{}' is a {}", res.name, res.kind.name()));
        }
        if res.flags.contains(ResourceFlags::MULTISAMPLE)
            && !matches!(res.kind, ResourceKind::SampledTexture | ResourceKind::StorageTexture | ResourceKind::InputAttachment)
        {
            return invalid(desc, format!("MULTISAMPLE is only valid for textures, but '{}' is a {}", res.name, res.kind.name()));
        }
        if index > 0 {
            let previous = &desc.resources[index - 1];
            if res.var_type < previous.var_type {
                return invalid(desc, format!(
                    "resources must be sorted by variable type, but '{}' ({:?}) follows '{}' ({:?})",
                    res.name, res.var_type, previous.name, previous.var_type
                ));
            }
        }
        if let Some(other) = desc.resources[..index]
            .iter()
            .find(|other| other.name == res.name && other.stages.intersects(res.stages))
        {
            return invalid(desc, format!(
                "resource '{}' is declared twice for stages {:?}",
                res.name, other.stages & res.stages
            ));
        }
    }

    for (index, imtbl) in desc.immutable_samplers.iter().enumerate() {
        if imtbl.sampler_or_texture_name.is_empty() {
            return invalid(desc, format!("immutable sampler {} has an empty name", index));
        }
        if imtbl.stages.is_empty() {
            return invalid(desc, format!(
                "immutable sampler '{}' is not visible to any shader stage",
                imtbl.sampler_or_texture_name
            ));
        }
        if desc.immutable_samplers[..index].iter().any(|other| {
            other.sampler_or_texture_name == imtbl.sampler_or_texture_name && other.stages.intersects(imtbl.stages)
        }) {
            return invalid(desc, format!(
                "immutable sampler '{}' is declared twice for the same stage",
                imtbl.sampler_or_texture_name
            ));
        }
    }
    Ok(())
}

fn compute_hash(
    desc: &SignatureDesc,
    attribs: &[ResourceAttribs],
    immutable_samplers: &[ImmutableSamplerAttribs],
) -> u64 {
    if desc.resources.is_empty() && immutable_samplers.is_empty() {
        return 0;
    }

    let mut hasher = FxHasher::default();
    desc.binding_index.hash(&mut hasher);
    desc.combined_suffix().hash(&mut hasher);
    for (res, attr) in desc.resources.iter().zip(attribs) {
        res.stages.bits().hash(&mut hasher);
        res.array_size.hash(&mut hasher);
        res.kind.hash(&mut hasher);
        res.var_type.hash(&mut hasher);
        res.flags.bits().hash(&mut hasher);
        attr.range.hash(&mut hasher);
        attr.cache_offset.hash(&mut hasher);
        attr.imtbl_sampler_assigned().hash(&mut hasher);
    }
    for imtbl in immutable_samplers {
        imtbl.stages.bits().hash(&mut hasher);
        imtbl.sampler.desc().hash_into(&mut hasher);
    }
    hasher.finish()
}

fn layout_bindings(
    desc: &SignatureDesc,
    attribs: &[ResourceAttribs],
    immutable_samplers: &[ImmutableSamplerAttribs],
    set_count: u32,
) -> Vec<Vec<LayoutBinding>> {
    let mut sets: Vec<Vec<LayoutBinding>> = (0..set_count).map(|_| Vec::new()).collect();

    for (res, attr) in desc.resources.iter().zip(attribs) {
        let baked = match attr.sampler {
            SamplerAssignment::Immutable(imtbl)
                if res.kind == ResourceKind::Sampler || res.flags.contains(ResourceFlags::COMBINED_SAMPLER) =>
            {
                vec![immutable_samplers[imtbl as usize].sampler.clone()]
            }
            _ => Vec::new(),
        };
        sets[attr.descriptor_set as usize].push(LayoutBinding {
            binding: attr.binding,
            kind: res.kind,
            flags: res.flags,
            array_size: res.array_size,
            stages: res.stages,
            immutable_samplers: baked,
        });
    }

    for imtbl in immutable_samplers.iter().filter(|imtbl| imtbl.assigned_resource.is_none()) {
        sets[imtbl.descriptor_set as usize].push(LayoutBinding {
            binding: imtbl.binding,
            kind: ResourceKind::Sampler,
            flags: ResourceFlags::empty(),
            array_size: 1,
            stages: imtbl.stages,
            immutable_samplers: vec![imtbl.sampler.clone()],
        });
    }
    sets
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
