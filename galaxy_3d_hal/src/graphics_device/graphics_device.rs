/// GraphicsDevice trait - the backend seam of the HAL
///
/// The binding algorithms (signatures, layouts, caches, state tracking) are
/// implemented once in this crate. A backend only turns their results into
/// native objects and records native commands.

use std::any::Any;
use std::sync::Arc;
use crate::binding::{DeviceLimits, ResourceFlags, ResourceKind, ShaderStages};
use crate::binding::ResourceSignature;
use crate::config::Config;
use crate::error::Result;
use super::{CommandSink, Sampler, SamplerDesc};

/// Backend object behind a resource signature (e.g. descriptor set layouts)
pub trait NativeSignatureLayout: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Backend object behind a pipeline layout
pub trait NativePipelineLayout: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Backend pipeline object
pub trait NativePipeline: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Finished command sequence, ready for submission
pub trait CommandList: Send {
    /// Number of recorded commands
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

/// One backend binding of a signature's descriptor set
#[derive(Clone)]
pub struct LayoutBinding {
    pub binding: u32,
    pub kind: ResourceKind,
    pub flags: ResourceFlags,
    pub array_size: u32,
    pub stages: ShaderStages,
    /// Samplers baked into the binding
    pub immutable_samplers: Vec<Arc<dyn Sampler>>,
}

/// Backend-agnostic layout of one signature, one entry per descriptor set
pub struct SignatureLayoutInfo<'a> {
    pub name: &'a str,
    pub sets: &'a [Vec<LayoutBinding>],
}

/// Signatures of a pipeline in binding-index order
pub struct PipelineLayoutInfo<'a> {
    pub name: &'a str,
    pub signatures: &'a [Arc<ResourceSignature>],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineType {
    Graphics,
    Compute,
}

/// Patched byte code of one stage
pub struct NativeStageInfo<'a> {
    pub name: &'a str,
    pub stage: ShaderStages,
    pub code: &'a [u32],
}

pub struct NativePipelineInfo<'a> {
    pub name: &'a str,
    pub pipeline_type: PipelineType,
    pub layout: &'a dyn NativePipelineLayout,
    pub stages: &'a [NativeStageInfo<'a>],
}

/// Main graphics device trait
///
/// Implemented by backend-specific devices (Vulkan, mock...)
pub trait GraphicsDevice: Send + Sync {
    fn config(&self) -> &Config;

    /// Descriptor capacity limits of the device
    fn limits(&self) -> &DeviceLimits;

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Arc<dyn Sampler>>;

    /// Create the backend layout of a signature (e.g. descriptor set layouts)
    fn create_signature_layout(&self, info: &SignatureLayoutInfo) -> Result<Box<dyn NativeSignatureLayout>>;

    /// Concatenate signature layouts into a pipeline layout
    fn create_pipeline_layout(&self, info: &PipelineLayoutInfo) -> Result<Box<dyn NativePipelineLayout>>;

    fn create_pipeline(&self, info: &NativePipelineInfo) -> Result<Box<dyn NativePipeline>>;

    /// Start a new command sequence
    fn create_command_sink(&self) -> Result<Box<dyn CommandSink>>;

    /// Execute command lists in order. Fence signals recorded in a list are
    /// applied once the list has executed.
    fn submit(&self, lists: Vec<Box<dyn CommandList>>) -> Result<()>;
}
