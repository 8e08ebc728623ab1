/// Mock graphics device for unit tests (no GPU required)
///
/// Every native object is a plain struct; recorded commands are appended to
/// a log shared with the device so tests can inspect what a context emitted.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use crate::binding::{DeviceLimits, ResourceKind};
use crate::config::Config;
use crate::context::{DrawAttribs, DrawIndexedAttribs, PipelineState};
use crate::error::Result;
use crate::state::{ResourceState, StateCell};
use super::{
    AccelerationStructure, BarrierKind, Buffer, BufferBindFlags, BufferDesc, CommandList, CommandSink, Fence,
    GraphicsDevice, IndexType, NativePipeline, NativePipelineInfo, NativePipelineLayout, NativeSignatureLayout,
    PipelineLayoutInfo, PipelineType, ResourceBindInfo, Sampler, SamplerDesc, SignatureLayoutInfo, StateBarrier,
    Texture, TextureDesc, TextureDimension, TextureFormat,
};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

fn next_handle() -> u64 {
    NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)
}

// ============================================================================
// Mock resources
// ============================================================================

pub struct MockBuffer {
    pub desc: BufferDesc,
    pub state: StateCell,
    pub handle: u64,
}

impl MockBuffer {
    pub fn new(name: &str, size: u64, bind_flags: BufferBindFlags, state: ResourceState) -> Arc<Self> {
        Arc::new(Self {
            desc: BufferDesc {
                name: name.to_string(),
                size,
                bind_flags,
            },
            state: StateCell::new(state),
            handle: next_handle(),
        })
    }

    pub fn uniform(name: &str) -> Arc<Self> {
        Self::new(name, 256, BufferBindFlags::UNIFORM, ResourceState::UNDEFINED)
    }
}

impl Buffer for MockBuffer {
    fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    fn state(&self) -> &StateCell {
        &self.state
    }

    fn native_handle(&self) -> u64 {
        self.handle
    }

    fn native_view(&self) -> u64 {
        self.handle + 1_000_000
    }
}

pub struct MockTexture {
    pub desc: TextureDesc,
    pub state: StateCell,
    pub handle: u64,
}

impl MockTexture {
    pub fn new(desc: TextureDesc, state: ResourceState) -> Arc<Self> {
        Arc::new(Self {
            desc,
            state: StateCell::new(state),
            handle: next_handle(),
        })
    }

    pub fn new_2d(name: &str, state: ResourceState) -> Arc<Self> {
        Self::new(
            TextureDesc {
                name: name.to_string(),
                width: 64,
                height: 64,
                depth_or_layers: 1,
                mip_levels: 1,
                sample_count: 1,
                format: TextureFormat::R8G8B8A8_UNORM,
                dimension: TextureDimension::Tex2D,
            },
            state,
        )
    }
}

impl Texture for MockTexture {
    fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    fn state(&self) -> &StateCell {
        &self.state
    }

    fn native_handle(&self) -> u64 {
        self.handle
    }

    fn native_view(&self) -> u64 {
        self.handle + 2_000_000
    }
}

pub struct MockAccelStruct {
    pub name: String,
    pub state: StateCell,
}

impl MockAccelStruct {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            state: StateCell::new(ResourceState::RAY_TRACING),
        })
    }
}

impl AccelerationStructure for MockAccelStruct {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> &StateCell {
        &self.state
    }

    fn native_handle(&self) -> u64 {
        0
    }
}

pub struct MockSampler {
    pub desc: SamplerDesc,
    pub handle: u64,
}

impl MockSampler {
    pub fn new(desc: SamplerDesc) -> Arc<Self> {
        Arc::new(Self { desc, handle: next_handle() })
    }
}

impl Sampler for MockSampler {
    fn desc(&self) -> &SamplerDesc {
        &self.desc
    }

    fn native_handle(&self) -> u64 {
        self.handle
    }
}

// ============================================================================
// Mock native layouts and pipelines
// ============================================================================

/// (binding, kind, array size, baked sampler count) per set
pub struct MockSignatureLayout {
    pub name: String,
    pub sets: Vec<Vec<(u32, ResourceKind, u32, usize)>>,
}

impl NativeSignatureLayout for MockSignatureLayout {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockPipelineLayout {
    pub name: String,
    pub signatures: Vec<String>,
}

impl NativePipelineLayout for MockPipelineLayout {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockPipeline {
    pub name: String,
    pub pipeline_type: PipelineType,
    /// Patched byte code per stage
    pub stage_code: Vec<Vec<u32>>,
}

impl NativePipeline for MockPipeline {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Command recording
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    Barrier {
        resource: String,
        old_state: ResourceState,
        new_state: ResourceState,
        uav: bool,
    },
    BindPipeline(String),
    BindResources {
        signature: String,
        first_set: u32,
        bound: usize,
    },
    SetVertexBuffers {
        first_slot: u32,
        count: usize,
    },
    SetIndexBuffer(String),
    SetRenderTargets {
        color: Vec<String>,
        depth: Option<String>,
    },
    ClearRenderTarget(String),
    ClearDepthStencil(String),
    Draw(u32),
    DrawIndexed(u32),
    Dispatch(u32, u32, u32),
    UpdateBuffer {
        buffer: String,
        size: usize,
    },
    CopyBuffer {
        src: String,
        dst: String,
        size: u64,
    },
    CopyTexture {
        src: String,
        dst: String,
    },
    SignalFence {
        fence: String,
        value: u64,
    },
}

pub struct MockCommandSink {
    log: Arc<Mutex<Vec<RecordedCommand>>>,
    count: usize,
    fences: Vec<(Arc<Fence>, u64)>,
}

impl MockCommandSink {
    fn record(&mut self, command: RecordedCommand) -> Result<()> {
        self.count += 1;
        match self.log.lock() {
            Ok(mut log) => log.push(command),
            Err(poisoned) => poisoned.into_inner().push(command),
        }
        Ok(())
    }
}

impl CommandSink for MockCommandSink {
    fn resource_barrier(&mut self, barrier: &StateBarrier) -> Result<()> {
        self.record(RecordedCommand::Barrier {
            resource: barrier.resource.name().to_string(),
            old_state: barrier.old_state,
            new_state: barrier.new_state,
            uav: barrier.kind == BarrierKind::UnorderedAccess,
        })
    }

    fn bind_pipeline(&mut self, pipeline: &PipelineState) -> Result<()> {
        self.record(RecordedCommand::BindPipeline(pipeline.name().to_string()))
    }

    fn bind_resources(&mut self, info: &ResourceBindInfo) -> Result<()> {
        self.record(RecordedCommand::BindResources {
            signature: info.signature.name().to_string(),
            first_set: info.first_set,
            bound: info.cache.bound_objects().count(),
        })
    }

    fn set_vertex_buffers(&mut self, first_slot: u32, buffers: &[(Arc<dyn Buffer>, u64)]) -> Result<()> {
        self.record(RecordedCommand::SetVertexBuffers { first_slot, count: buffers.len() })
    }

    fn set_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, _offset: u64, _index_type: IndexType) -> Result<()> {
        self.record(RecordedCommand::SetIndexBuffer(buffer.desc().name.clone()))
    }

    fn set_render_targets(&mut self, color: &[Arc<dyn Texture>], depth: Option<&Arc<dyn Texture>>) -> Result<()> {
        self.record(RecordedCommand::SetRenderTargets {
            color: color.iter().map(|texture| texture.desc().name.clone()).collect(),
            depth: depth.map(|texture| texture.desc().name.clone()),
        })
    }

    fn clear_render_target(&mut self, texture: &Arc<dyn Texture>, _color: [f32; 4]) -> Result<()> {
        self.record(RecordedCommand::ClearRenderTarget(texture.desc().name.clone()))
    }

    fn clear_depth_stencil(&mut self, texture: &Arc<dyn Texture>, _depth: f32, _stencil: u32) -> Result<()> {
        self.record(RecordedCommand::ClearDepthStencil(texture.desc().name.clone()))
    }

    fn draw(&mut self, attribs: &DrawAttribs) -> Result<()> {
        self.record(RecordedCommand::Draw(attribs.vertex_count))
    }

    fn draw_indexed(&mut self, attribs: &DrawIndexedAttribs) -> Result<()> {
        self.record(RecordedCommand::DrawIndexed(attribs.index_count))
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.record(RecordedCommand::Dispatch(x, y, z))
    }

    fn update_buffer(&mut self, buffer: &Arc<dyn Buffer>, _offset: u64, data: &[u8]) -> Result<()> {
        self.record(RecordedCommand::UpdateBuffer {
            buffer: buffer.desc().name.clone(),
            size: data.len(),
        })
    }

    fn copy_buffer(
        &mut self,
        src: &Arc<dyn Buffer>,
        _src_offset: u64,
        dst: &Arc<dyn Buffer>,
        _dst_offset: u64,
        size: u64,
    ) -> Result<()> {
        self.record(RecordedCommand::CopyBuffer {
            src: src.desc().name.clone(),
            dst: dst.desc().name.clone(),
            size,
        })
    }

    fn copy_texture(&mut self, src: &Arc<dyn Texture>, dst: &Arc<dyn Texture>) -> Result<()> {
        self.record(RecordedCommand::CopyTexture {
            src: src.desc().name.clone(),
            dst: dst.desc().name.clone(),
        })
    }

    fn signal_fence(&mut self, fence: &Arc<Fence>, value: u64) -> Result<()> {
        self.fences.push((fence.clone(), value));
        self.record(RecordedCommand::SignalFence {
            fence: fence.name().to_string(),
            value,
        })
    }

    fn finish(self: Box<Self>) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(MockCommandList {
            count: self.count,
            fences: self.fences,
        }))
    }
}

pub struct MockCommandList {
    pub count: usize,
    pub fences: Vec<(Arc<Fence>, u64)>,
}

impl CommandList for MockCommandList {
    fn len(&self) -> usize {
        self.count
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

// ============================================================================
// Mock device
// ============================================================================

pub struct MockGraphicsDevice {
    pub config: Config,
    pub limits: DeviceLimits,
    log: Arc<Mutex<Vec<RecordedCommand>>>,
    submitted: AtomicU64,
    samplers_created: AtomicU64,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self::with_config(Config {
            enable_validation: true,
            ..Config::default()
        })
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            limits: DeviceLimits::default(),
            log: Arc::new(Mutex::new(Vec::new())),
            submitted: AtomicU64::new(0),
            samplers_created: AtomicU64::new(0),
        }
    }

    pub fn with_limits(mut self, limits: DeviceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Commands recorded by every sink of this device so far
    pub fn commands(&self) -> Vec<RecordedCommand> {
        match self.log.lock() {
            Ok(log) => log.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn barriers(&self) -> Vec<RecordedCommand> {
        self.commands()
            .into_iter()
            .filter(|command| matches!(command, RecordedCommand::Barrier { .. }))
            .collect()
    }

    pub fn clear_commands(&self) {
        if let Ok(mut log) = self.log.lock() {
            log.clear();
        }
    }

    pub fn submitted_lists(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn samplers_created(&self) -> u64 {
        self.samplers_created.load(Ordering::Relaxed)
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn config(&self) -> &Config {
        &self.config
    }

    fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Arc<dyn Sampler>> {
        self.samplers_created.fetch_add(1, Ordering::Relaxed);
        Ok(MockSampler::new(*desc))
    }

    fn create_signature_layout(&self, info: &SignatureLayoutInfo) -> Result<Box<dyn NativeSignatureLayout>> {
        Ok(Box::new(MockSignatureLayout {
            name: info.name.to_string(),
            sets: info
                .sets
                .iter()
                .map(|set| {
                    set.iter()
                        .map(|b| (b.binding, b.kind, b.array_size, b.immutable_samplers.len()))
                        .collect()
                })
                .collect(),
        }))
    }

    fn create_pipeline_layout(&self, info: &PipelineLayoutInfo) -> Result<Box<dyn NativePipelineLayout>> {
        Ok(Box::new(MockPipelineLayout {
            name: info.name.to_string(),
            signatures: info.signatures.iter().map(|s| s.name().to_string()).collect(),
        }))
    }

    fn create_pipeline(&self, info: &NativePipelineInfo) -> Result<Box<dyn NativePipeline>> {
        Ok(Box::new(MockPipeline {
            name: info.name.to_string(),
            pipeline_type: info.pipeline_type,
            stage_code: info.stages.iter().map(|stage| stage.code.to_vec()).collect(),
        }))
    }

    fn create_command_sink(&self) -> Result<Box<dyn CommandSink>> {
        Ok(Box::new(MockCommandSink {
            log: self.log.clone(),
            count: 0,
            fences: Vec::new(),
        }))
    }

    fn submit(&self, lists: Vec<Box<dyn CommandList>>) -> Result<()> {
        for list in lists {
            self.submitted.fetch_add(1, Ordering::Relaxed);
            if let Ok(list) = list.into_any().downcast::<MockCommandList>() {
                for (fence, value) in list.fences {
                    fence.signal(value);
                }
            }
        }
        Ok(())
    }
}
