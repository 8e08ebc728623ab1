/// Device descriptor limits and soft limit checks
///
/// Limits are reported as warnings: the driver is the final authority and may
/// still accept a layout that exceeds the queried values.

use rustc_hash::FxHashMap;
use super::resource_desc::{ResourceFlags, ResourceKind};
use super::shader_resources::ShaderResources;

/// Descriptor counting category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitCategory {
    UniformBuffers,
    StorageBuffers,
    SampledImages,
    StorageImages,
    Samplers,
    InputAttachments,
    AccelerationStructures,
}

impl LimitCategory {
    pub const ALL: [LimitCategory; 7] = [
        LimitCategory::UniformBuffers,
        LimitCategory::StorageBuffers,
        LimitCategory::SampledImages,
        LimitCategory::StorageImages,
        LimitCategory::Samplers,
        LimitCategory::InputAttachments,
        LimitCategory::AccelerationStructures,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            LimitCategory::UniformBuffers => "uniform buffers",
            LimitCategory::StorageBuffers => "storage buffers",
            LimitCategory::SampledImages => "sampled images",
            LimitCategory::StorageImages => "storage images",
            LimitCategory::Samplers => "samplers",
            LimitCategory::InputAttachments => "input attachments",
            LimitCategory::AccelerationStructures => "acceleration structures",
        }
    }

    /// Categories a resource counts against
    fn of(kind: ResourceKind, flags: ResourceFlags) -> &'static [LimitCategory] {
        let formatted = flags.contains(ResourceFlags::FORMATTED_BUFFER);
        match kind {
            ResourceKind::UniformBuffer if formatted => &[LimitCategory::SampledImages],
            ResourceKind::UniformBuffer => &[LimitCategory::UniformBuffers],
            ResourceKind::StorageBuffer if formatted => &[LimitCategory::StorageImages],
            ResourceKind::StorageBuffer => &[LimitCategory::StorageBuffers],
            ResourceKind::SampledTexture if flags.contains(ResourceFlags::COMBINED_SAMPLER) => {
                &[LimitCategory::SampledImages, LimitCategory::Samplers]
            }
            ResourceKind::SampledTexture => &[LimitCategory::SampledImages],
            ResourceKind::StorageTexture => &[LimitCategory::StorageImages],
            ResourceKind::Sampler => &[LimitCategory::Samplers],
            ResourceKind::InputAttachment => &[LimitCategory::InputAttachments],
            ResourceKind::AccelerationStructure => &[LimitCategory::AccelerationStructures],
        }
    }
}

/// Descriptor capacity of a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Per-stage maximum, indexed by `LimitCategory`
    pub per_stage: [u32; 7],
    /// Maximum over a whole pipeline layout, indexed by `LimitCategory`
    pub per_layout: [u32; 7],
    /// Maximum descriptors of any kind visible to one stage
    pub max_per_stage_resources: u32,
    pub max_descriptor_sets: u32,
    /// Runtime-sized arrays indexed with non-uniform values
    pub supports_non_uniform_indexing: bool,
}

impl DeviceLimits {
    pub fn per_stage_limit(&self, category: LimitCategory) -> u32 {
        self.per_stage[category.index()]
    }

    pub fn per_layout_limit(&self, category: LimitCategory) -> u32 {
        self.per_layout[category.index()]
    }

    pub fn with_per_stage_limit(mut self, category: LimitCategory, limit: u32) -> Self {
        self.per_stage[category.index()] = limit;
        self
    }

    pub fn with_per_layout_limit(mut self, category: LimitCategory, limit: u32) -> Self {
        self.per_layout[category.index()] = limit;
        self
    }
}

impl Default for DeviceLimits {
    /// Minimum values every Vulkan 1.0 implementation guarantees
    fn default() -> Self {
        Self {
            per_stage: [12, 4, 16, 4, 16, 4, 16],
            per_layout: [72, 24, 96, 24, 96, 4, 16],
            max_per_stage_resources: 128,
            max_descriptor_sets: 4,
            supports_non_uniform_indexing: false,
        }
    }
}

/// Check the resources of a pipeline's stages against `limits`
///
/// Returns the warnings, which are also logged. A resource shared by several
/// stages counts once against the layout limits.
pub fn validate_resource_limits(
    pipeline_name: &str,
    stages: &[ShaderResources],
    limits: &DeviceLimits,
) -> Vec<String> {
    let mut warnings = Vec::new();
    let mut layout_resources: FxHashMap<&str, (u32, &'static [LimitCategory])> = FxHashMap::default();

    for shader in stages {
        let mut counts = [0u32; 7];
        let mut total = 0u32;

        for res in shader.iter() {
            if res.array_size == 0 && !limits.supports_non_uniform_indexing {
                warnings.push(format!(
                    "Shader '{}' declares runtime-sized array '{}', but the device does not support non-uniform descriptor indexing",
                    shader.shader_name, res.name
                ));
            }
            let count = res.array_size.max(1);
            let categories = LimitCategory::of(res.kind, res.flags);
            for category in categories {
                counts[category.index()] = counts[category.index()].saturating_add(count);
            }
            total = total.saturating_add(count);

            let entry = layout_resources.entry(res.name.as_str()).or_insert((0, categories));
            entry.0 = entry.0.max(count);
        }

        for category in LimitCategory::ALL {
            let count = counts[category.index()];
            let limit = limits.per_stage_limit(category);
            if count > limit {
                warnings.push(format!(
                    "Pipeline '{}': shader '{}' uses {} {}, but the device supports at most {} per stage",
                    pipeline_name, shader.shader_name, count, category.name(), limit
                ));
            }
        }
        if total > limits.max_per_stage_resources {
            warnings.push(format!(
                "Pipeline '{}': shader '{}' uses {} resources, but the device supports at most {} per stage",
                pipeline_name, shader.shader_name, total, limits.max_per_stage_resources
            ));
        }
    }

    let mut layout_counts = [0u32; 7];
    for (count, categories) in layout_resources.values() {
        for category in categories.iter() {
            layout_counts[category.index()] = layout_counts[category.index()].saturating_add(*count);
        }
    }
    for category in LimitCategory::ALL {
        let count = layout_counts[category.index()];
        let limit = limits.per_layout_limit(category);
        if count > limit {
            warnings.push(format!(
                "Pipeline '{}' uses {} {}, but the device supports at most {} per pipeline layout",
                pipeline_name, count, category.name(), limit
            ));
        }
    }

    for warning in &warnings {
        crate::engine_warn!("galaxy3d::Limits", "{}", warning);
    }
    warnings
}

#[cfg(test)]
#[path = "limits_tests.rs"]
mod tests;
