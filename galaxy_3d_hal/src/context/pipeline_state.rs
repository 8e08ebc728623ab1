/// Pipeline state objects
///
/// A pipeline state owns the reflected and patched byte code of its stages,
/// the pipeline layout built from its signatures and the backend pipeline.
/// Pipelines created without signatures derive one from reflection.

use std::sync::Arc;
use crate::binding::{
    create_default_signature, validate_resource_limits, ImplicitLayoutDesc, PipelineLayout,
    ResourceSignature, ShaderResourceBinding, ShaderResources, ShaderStageInfo, ShaderStages,
};
use crate::engine_fail;
use crate::error::{Error, Result};
use crate::graphics_device::{
    BoundObject, GraphicsDevice, NativePipeline, NativePipelineInfo, NativeStageInfo, PipelineType, Sampler,
};

/// One shader stage of a pipeline
#[derive(Debug, Clone)]
pub struct ShaderStageDesc {
    pub name: String,
    pub stage: ShaderStages,
    /// SPIR-V words
    pub code: Vec<u32>,
    /// Suffix pairing separate samplers with textures (e.g. "_sampler")
    pub combined_sampler_suffix: Option<String>,
}

impl ShaderStageDesc {
    pub fn new(name: impl Into<String>, stage: ShaderStages, code: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            stage,
            code,
            combined_sampler_suffix: None,
        }
    }

    pub fn with_combined_sampler_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.combined_sampler_suffix = Some(suffix.into());
        self
    }
}

/// Pipeline creation parameters
#[derive(Clone)]
pub struct PipelineStateDesc {
    pub name: String,
    pub pipeline_type: PipelineType,
    pub stages: Vec<ShaderStageDesc>,
    /// Explicit signatures. When empty, one is derived from the stages.
    pub signatures: Vec<Arc<ResourceSignature>>,
    /// Options of the derived signature
    pub implicit_layout: ImplicitLayoutDesc,
}

impl PipelineStateDesc {
    pub fn graphics(name: impl Into<String>) -> Self {
        Self::new(name, PipelineType::Graphics)
    }

    pub fn compute(name: impl Into<String>) -> Self {
        Self::new(name, PipelineType::Compute)
    }

    fn new(name: impl Into<String>, pipeline_type: PipelineType) -> Self {
        Self {
            name: name.into(),
            pipeline_type,
            stages: Vec::new(),
            signatures: Vec::new(),
            implicit_layout: ImplicitLayoutDesc::default(),
        }
    }

    pub fn with_stage(mut self, stage: ShaderStageDesc) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn with_signature(mut self, signature: Arc<ResourceSignature>) -> Self {
        self.signatures.push(signature);
        self
    }

    pub fn with_implicit_layout(mut self, layout: ImplicitLayoutDesc) -> Self {
        self.implicit_layout = layout;
        self
    }
}

pub struct PipelineState {
    name: String,
    pipeline_type: PipelineType,
    stages: Vec<ShaderStageInfo>,
    layout: PipelineLayout,
    /// True when the only signature was derived from reflection
    implicit_signature: bool,
    native: Box<dyn NativePipeline>,
}

impl PipelineState {
    /// Reflect the stages, resolve their resources and create the pipeline
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` if the stage set does not fit the pipeline type
    /// - any reflection, signature or layout error
    pub fn new(device: &dyn GraphicsDevice, desc: &PipelineStateDesc) -> Result<Arc<Self>> {
        validate_stages(desc)?;

        let mut stages = Vec::with_capacity(desc.stages.len());
        for stage in &desc.stages {
            let mut resources = ShaderResources::from_spirv(&stage.name, stage.stage, &stage.code)?;
            if let Some(suffix) = &stage.combined_sampler_suffix {
                resources = resources.with_combined_sampler_suffix(suffix.clone());
            }
            stages.push(ShaderStageInfo {
                resources,
                code: stage.code.clone(),
            });
        }

        let implicit_signature = desc.signatures.is_empty();
        let signatures = if implicit_signature {
            let reflected: Vec<ShaderResources> = stages.iter().map(|s| s.resources.clone()).collect();
            create_default_signature(device, &desc.name, &desc.implicit_layout, &reflected)?
                .into_iter()
                .collect()
        } else {
            desc.signatures.clone()
        };

        if device.config().validation_enabled() {
            let reflected: Vec<ShaderResources> = stages.iter().map(|s| s.resources.clone()).collect();
            validate_resource_limits(&desc.name, &reflected, device.limits());
        }

        let layout = PipelineLayout::build(device, &desc.name, &signatures, &mut stages)?;

        let native_stages: Vec<NativeStageInfo> = stages
            .iter()
            .map(|stage| NativeStageInfo {
                name: &stage.resources.shader_name,
                stage: stage.resources.stage,
                code: &stage.code,
            })
            .collect();
        let native = device.create_pipeline(&NativePipelineInfo {
            name: &desc.name,
            pipeline_type: desc.pipeline_type,
            layout: layout.native(),
            stages: &native_stages,
        })?;

        crate::engine_debug!("galaxy3d::Pipeline",
            "Created {:?} pipeline '{}' with {} stages and {} signatures",
            desc.pipeline_type, desc.name, stages.len(), layout.signatures().count());

        Ok(Arc::new(Self {
            name: desc.name.clone(),
            pipeline_type: desc.pipeline_type,
            stages,
            layout,
            implicit_signature,
            native,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pipeline_type(&self) -> PipelineType {
        self.pipeline_type
    }

    /// Reflected resources and patched byte code, in creation order
    pub fn stages(&self) -> &[ShaderStageInfo] {
        &self.stages
    }

    pub fn layout(&self) -> &PipelineLayout {
        &self.layout
    }

    pub fn signature(&self, binding_index: u8) -> Option<&Arc<ResourceSignature>> {
        self.layout.signature(binding_index)
    }

    pub fn signature_count(&self) -> usize {
        self.layout.signatures().count()
    }

    pub fn has_implicit_signature(&self) -> bool {
        self.implicit_signature
    }

    pub fn native(&self) -> &dyn NativePipeline {
        self.native.as_ref()
    }

    /// True when every signature is compatible with the other pipeline's
    /// signature at the same binding index
    pub fn is_compatible_with(&self, other: &PipelineState) -> bool {
        let count = self.layout.binding_slot_count().max(other.layout.binding_slot_count());
        (0..count as u8).all(|index| match (self.signature(index), other.signature(index)) {
            (None, None) => true,
            (Some(a), Some(b)) => a.is_compatible_with(b),
            _ => false,
        })
    }

    /// Binding set instance of the signature at `binding_index`
    pub fn create_shader_resource_binding(&self, binding_index: u8, init_static: bool) -> Option<ShaderResourceBinding> {
        self.signature(binding_index)
            .map(|signature| ShaderResourceBinding::new(signature, init_static))
    }

    /// Bind a static variable in whichever signature declares it
    pub fn set_static(&self, stages: ShaderStages, name: &str, object: BoundObject) -> bool {
        match self.layout.signatures().find(|sig| sig.find_resource(stages, name).is_some()) {
            Some(signature) => signature.set_static(stages, name, object),
            None => {
                crate::engine_trace!("galaxy3d::Pipeline",
                    "Pipeline '{}' has no static variable '{}'", self.name, name);
                false
            }
        }
    }

    pub fn set_static_sampler(&self, stages: ShaderStages, name: &str, sampler: Arc<dyn Sampler>) -> bool {
        match self.layout.signatures().find(|sig| sig.find_resource(stages, name).is_some()) {
            Some(signature) => signature.set_static_sampler(stages, name, sampler),
            None => false,
        }
    }

    /// Number of static slots across all signatures
    pub fn static_slot_count(&self) -> u32 {
        self.layout.signatures().map(|sig| sig.static_slot_count()).sum()
    }
}

fn validate_stages(desc: &PipelineStateDesc) -> Result<()> {
    if desc.stages.is_empty() {
        engine_fail!("galaxy3d::Pipeline", Error::InvalidOperation(format!(
            "Pipeline '{}' has no shader stages", desc.name
        )));
    }

    let mut seen = ShaderStages::empty();
    for stage in &desc.stages {
        if stage.stage.bits().count_ones() != 1 {
            engine_fail!("galaxy3d::Pipeline", Error::InvalidOperation(format!(
                "Shader '{}' of pipeline '{}' must have exactly one stage", stage.name, desc.name
            )));
        }
        if seen.intersects(stage.stage) {
            engine_fail!("galaxy3d::Pipeline", Error::InvalidOperation(format!(
                "Pipeline '{}' has more than one {:?} shader", desc.name, stage.stage
            )));
        }
        seen |= stage.stage;
    }

    let compute_only = seen == ShaderStages::COMPUTE;
    match desc.pipeline_type {
        PipelineType::Compute if !compute_only => {
            engine_fail!("galaxy3d::Pipeline", Error::InvalidOperation(format!(
                "Compute pipeline '{}' must have exactly one compute shader", desc.name
            )));
        }
        PipelineType::Graphics if seen.contains(ShaderStages::COMPUTE) => {
            engine_fail!("galaxy3d::Pipeline", Error::InvalidOperation(format!(
                "Graphics pipeline '{}' cannot contain a compute shader", desc.name
            )));
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
#[path = "pipeline_state_tests.rs"]
mod tests;
