/// Pipeline - Vulkan implementation of the NativePipeline trait
///
/// Compute pipelines are fully described by their stage and layout and are
/// created here. Graphics pipelines also need vertex input, raster, blend
/// and attachment state, which the HAL does not model: the application
/// provides a `GraphicsPipelineFactory` that builds them from the patched
/// shader stages and the pipeline layout.

use ash::vk;
use galaxy_3d_hal::galaxy3d::binding::ShaderStages;
use galaxy_3d_hal::galaxy3d::device::{NativePipeline, NativePipelineInfo, NativeStageInfo, PipelineType};
use galaxy_3d_hal::galaxy3d::{Error, Result};
use galaxy_3d_hal::{engine_bail, engine_err, engine_error};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_conversions::shader_stage_flags;
use crate::vulkan_layout::PipelineLayout;

/// Entry point every stage is compiled with
const ENTRY_POINT: &std::ffi::CStr = c"main";

/// Everything a graphics pipeline needs from the HAL
pub struct GraphicsPipelineRequest<'a> {
    pub name: &'a str,
    pub layout: vk::PipelineLayout,
    /// Shader stages with their modules, in declaration order
    pub stages: &'a [vk::PipelineShaderStageCreateInfo<'a>],
}

/// Builds graphics pipelines with application-defined fixed-function state
pub trait GraphicsPipelineFactory: Send + Sync {
    fn create_graphics_pipeline(&self, device: &ash::Device, request: &GraphicsPipelineRequest) -> Result<vk::Pipeline>;
}

/// Vulkan pipeline implementation
pub struct Pipeline {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) bind_point: vk::PipelineBindPoint,
}

impl NativePipeline for Pipeline {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
        }
    }
}

/// Shader modules of a pipeline, destroyed once the pipeline exists
struct ShaderModules<'a> {
    device: &'a ash::Device,
    modules: Vec<(vk::ShaderModule, ShaderStages)>,
}

impl<'a> ShaderModules<'a> {
    fn new(ctx: &'a GpuContext, pipeline_name: &str, stages: &[NativeStageInfo]) -> Result<Self> {
        let mut modules = Self {
            device: &ctx.device,
            modules: Vec::with_capacity(stages.len()),
        };
        for stage in stages {
            let create_info = vk::ShaderModuleCreateInfo::default().code(stage.code);
            let module = unsafe {
                ctx.device.create_shader_module(&create_info, None)
                    .map_err(|e| engine_err!("galaxy3d::vulkan",
                        "Failed to create shader module '{}' of pipeline '{}': {:?}", stage.name, pipeline_name, e))?
            };
            ctx.set_object_name(module, stage.name);
            modules.modules.push((module, stage.stage));
        }
        Ok(modules)
    }

    fn stage_infos(&self) -> Vec<vk::PipelineShaderStageCreateInfo<'static>> {
        self.modules
            .iter()
            .map(|&(module, stage)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(shader_stage_flags(stage))
                    .module(module)
                    .name(ENTRY_POINT)
            })
            .collect()
    }
}

impl Drop for ShaderModules<'_> {
    fn drop(&mut self) {
        unsafe {
            for &(module, _) in &self.modules {
                self.device.destroy_shader_module(module, None);
            }
        }
    }
}

pub(crate) fn create_pipeline(
    ctx: &Arc<GpuContext>,
    info: &NativePipelineInfo,
    factory: Option<&dyn GraphicsPipelineFactory>,
) -> Result<Pipeline> {
    let Some(layout) = info.layout.as_any().downcast_ref::<PipelineLayout>() else {
        engine_bail!("galaxy3d::vulkan",
            "Pipeline '{}': layout was not created by the Vulkan device", info.name);
    };

    let modules = ShaderModules::new(ctx, info.name, info.stages)?;
    let stages = modules.stage_infos();

    let (pipeline, bind_point) = match info.pipeline_type {
        PipelineType::Compute => {
            let [stage] = stages.as_slice() else {
                engine_bail!("galaxy3d::vulkan",
                    "Compute pipeline '{}' has {} stages, expected 1", info.name, stages.len());
            };
            let create_info = vk::ComputePipelineCreateInfo::default()
                .stage(*stage)
                .layout(layout.layout);
            let pipelines = unsafe {
                ctx.device.create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
                    .map_err(|(_, e)| engine_err!("galaxy3d::vulkan",
                        "Failed to create compute pipeline '{}': {:?}", info.name, e))?
            };
            (pipelines[0], vk::PipelineBindPoint::COMPUTE)
        }
        PipelineType::Graphics => {
            let Some(factory) = factory else {
                let message = format!(
                    "Graphics pipeline '{}' requires a GraphicsPipelineFactory on the Vulkan device", info.name
                );
                engine_error!("galaxy3d::vulkan", "{}", message);
                return Err(Error::InvalidOperation(message));
            };
            let pipeline = factory.create_graphics_pipeline(&ctx.device, &GraphicsPipelineRequest {
                name: info.name,
                layout: layout.layout,
                stages: &stages,
            })?;
            (pipeline, vk::PipelineBindPoint::GRAPHICS)
        }
    };
    ctx.set_object_name(pipeline, info.name);

    Ok(Pipeline {
        ctx: Arc::clone(ctx),
        pipeline,
        bind_point,
    })
}
