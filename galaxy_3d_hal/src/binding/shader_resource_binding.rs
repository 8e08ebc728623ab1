/// Binding-set instance of a signature
///
/// Holds the mutable and dynamic resources of one object/material and, once
/// initialized, a copy of the signature's static resources. A binding is
/// committed to a device context, which binds it to the active pipeline.

use std::sync::Arc;
use crate::graphics_device::{BoundObject, Sampler};
use super::resource_cache::ResourceCache;
use super::resource_desc::{ShaderStages, VariableType};
use super::signature::ResourceSignature;

pub struct ShaderResourceBinding {
    signature: Arc<ResourceSignature>,
    cache: ResourceCache,
}

impl ShaderResourceBinding {
    /// Create an instance; copies static resources right away when `init_static` is set
    pub fn new(signature: &Arc<ResourceSignature>, init_static: bool) -> Self {
        let mut cache = ResourceCache::new();
        signature.initialize_instance_cache(&mut cache);
        let mut binding = Self {
            signature: signature.clone(),
            cache,
        };
        if init_static {
            binding.initialize_static_resources();
        }
        binding
    }

    pub fn signature(&self) -> &Arc<ResourceSignature> {
        &self.signature
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Copy the signature's static resources into this instance
    ///
    /// Happens at most once; the device context does it on first commit.
    pub fn initialize_static_resources(&mut self) -> bool {
        self.signature.copy_static_resources(&mut self.cache)
    }

    pub fn static_resources_initialized(&self) -> bool {
        self.cache.static_resources_initialized()
    }

    /// Bind `object` to element 0 of variable `name` visible to `stages`
    ///
    /// Names that do not exist in the signature are ignored.
    pub fn set(&mut self, stages: ShaderStages, name: &str, object: BoundObject) -> bool {
        self.set_array(stages, name, 0, Some(object))
    }

    /// Bind (or unbind with None) one array element of variable `name`
    pub fn set_array(&mut self, stages: ShaderStages, name: &str, array_index: u32, object: Option<BoundObject>) -> bool {
        match self.variable_index(stages, name) {
            Some(index) => self.set_by_index(index, array_index, object),
            None => false,
        }
    }

    /// Bind by resource index, as returned by `ResourceSignature::find_resource`
    pub fn set_by_index(&mut self, index: usize, array_index: u32, object: Option<BoundObject>) -> bool {
        if index >= self.signature.resource_count() {
            crate::engine_error!("galaxy3d::Binding",
                "Resource index {} is out of range for signature '{}'", index, self.signature.name());
            return false;
        }
        if self.check_static(index) {
            return false;
        }
        self.signature.bind_object(&mut self.cache, index, array_index, object, false)
    }

    /// Bind a sampler to the separate sampler variable `name`
    ///
    /// Textures paired with the sampler through the combined-sampler suffix
    /// pick it up as well.
    pub fn set_sampler(&mut self, stages: ShaderStages, name: &str, sampler: Arc<dyn Sampler>) -> bool {
        match self.variable_index(stages, name) {
            Some(index) => {
                if self.check_static(index) {
                    return false;
                }
                self.signature.bind_sampler(&mut self.cache, index, 0, Some(sampler), false)
            }
            None => false,
        }
    }

    /// Bound object of element `array_index` of variable `name`
    pub fn get(&self, stages: ShaderStages, name: &str, array_index: u32) -> Option<&BoundObject> {
        let index = self.signature.find_resource(stages, name)?;
        let attr = self.signature.attribs(index);
        self.cache.resource(attr.range?, attr.cache_offset + array_index)
    }

    /// True when every slot of variable `name` is bound
    pub fn is_bound(&self, stages: ShaderStages, name: &str) -> bool {
        self.signature
            .find_resource(stages, name)
            .is_some_and(|index| self.signature.is_resource_bound(&self.cache, index))
    }

    /// Number of variables with at least one unbound slot
    pub fn unbound_variable_count(&self) -> usize {
        (0..self.signature.resource_count())
            .filter(|&index| !self.signature.is_resource_bound(&self.cache, index))
            .count()
    }

    fn variable_index(&self, stages: ShaderStages, name: &str) -> Option<usize> {
        let index = self.signature.find_resource(stages, name);
        if index.is_none() {
            crate::engine_trace!("galaxy3d::Binding",
                "Variable '{}' not found in signature '{}', binding ignored", name, self.signature.name());
        }
        index
    }

    /// Static variables are bound on the signature
    fn check_static(&self, index: usize) -> bool {
        let res = self.signature.resource(index);
        if res.var_type == VariableType::Static {
            crate::engine_error!("galaxy3d::Binding",
                "Variable '{}' is static; bind it on signature '{}'", res.name, self.signature.name());
            return true;
        }
        false
    }
}

#[cfg(test)]
#[path = "shader_resource_binding_tests.rs"]
mod tests;
