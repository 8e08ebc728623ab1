#![allow(dead_code)]
//! Test utilities - recording graphics device for integration tests
//!
//! Integration tests only see the public API, so they cannot use the crate's
//! internal mock. This device creates plain native objects and appends a
//! line per recorded command to a log shared by every sink it creates.

use galaxy_3d_hal::galaxy3d::binding::DeviceLimits;
use galaxy_3d_hal::galaxy3d::context::{DrawAttribs, DrawIndexedAttribs, PipelineState};
use galaxy_3d_hal::galaxy3d::device::{
    Buffer, BufferBindFlags, BufferDesc, CommandList, CommandSink, Fence, GraphicsDevice, IndexType,
    NativePipeline, NativePipelineInfo, NativePipelineLayout, NativeSignatureLayout, PipelineLayoutInfo,
    ResourceBindInfo, Sampler, SamplerDesc, SignatureLayoutInfo, StateBarrier, Texture, TextureDesc,
    TextureDimension, TextureFormat,
};
use galaxy_3d_hal::galaxy3d::state::{ResourceState, StateCell};
use galaxy_3d_hal::galaxy3d::{Config, Result};
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// RESOURCES
// ============================================================================

pub struct TestBuffer {
    desc: BufferDesc,
    state: StateCell,
    handle: u64,
}

impl Buffer for TestBuffer {
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
        self.handle | (1 << 32)
    }
}

pub fn buffer(name: &str, size: u64, bind_flags: BufferBindFlags, state: ResourceState) -> Arc<dyn Buffer> {
    Arc::new(TestBuffer {
        desc: BufferDesc {
            name: name.to_string(),
            size,
            bind_flags,
        },
        state: StateCell::new(state),
        handle: NEXT_HANDLE.fetch_add(1, Ordering::Relaxed),
    })
}

pub struct TestTexture {
    desc: TextureDesc,
    state: StateCell,
    handle: u64,
}

impl Texture for TestTexture {
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
        self.handle | (2 << 32)
    }
}

pub fn texture_2d(name: &str, state: ResourceState) -> Arc<dyn Texture> {
    Arc::new(TestTexture {
        desc: TextureDesc {
            name: name.to_string(),
            width: 128,
            height: 128,
            depth_or_layers: 1,
            mip_levels: 1,
            sample_count: 1,
            format: TextureFormat::R8G8B8A8_UNORM,
            dimension: TextureDimension::Tex2D,
        },
        state: StateCell::new(state),
        handle: NEXT_HANDLE.fetch_add(1, Ordering::Relaxed),
    })
}

struct TestSampler {
    desc: SamplerDesc,
    handle: u64,
}

impl Sampler for TestSampler {
    fn desc(&self) -> &SamplerDesc {
        &self.desc
    }

    fn native_handle(&self) -> u64 {
        self.handle
    }
}

struct TestNative;

impl NativeSignatureLayout for TestNative {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl NativePipelineLayout for TestNative {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl NativePipeline for TestNative {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// COMMAND RECORDING
// ============================================================================

type CommandLog = Arc<Mutex<Vec<String>>>;

struct TestSink {
    log: CommandLog,
    count: usize,
    fences: Vec<(Arc<Fence>, u64)>,
}

impl TestSink {
    fn record(&mut self, line: String) -> Result<()> {
        self.count += 1;
        self.log.lock().unwrap().push(line);
        Ok(())
    }
}

impl CommandSink for TestSink {
    fn resource_barrier(&mut self, barrier: &StateBarrier) -> Result<()> {
        self.record(format!(
            "barrier {} {:?} -> {:?}",
            barrier.resource.name(),
            barrier.old_state,
            barrier.new_state
        ))
    }

    fn bind_pipeline(&mut self, pipeline: &PipelineState) -> Result<()> {
        self.record(format!("pipeline {}", pipeline.name()))
    }

    fn bind_resources(&mut self, info: &ResourceBindInfo) -> Result<()> {
        self.record(format!("bind {} @{}", info.signature.name(), info.first_set))
    }

    fn set_vertex_buffers(&mut self, first_slot: u32, buffers: &[(Arc<dyn Buffer>, u64)]) -> Result<()> {
        self.record(format!("vertex buffers {} x{}", first_slot, buffers.len()))
    }

    fn set_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, _offset: u64, _index_type: IndexType) -> Result<()> {
        self.record(format!("index buffer {}", buffer.desc().name))
    }

    fn set_render_targets(&mut self, color: &[Arc<dyn Texture>], depth: Option<&Arc<dyn Texture>>) -> Result<()> {
        self.record(format!(
            "render targets {} depth {}",
            color.len(),
            depth.map_or("none", |texture| texture.desc().name.as_str())
        ))
    }

    fn clear_render_target(&mut self, texture: &Arc<dyn Texture>, _color: [f32; 4]) -> Result<()> {
        self.record(format!("clear {}", texture.desc().name))
    }

    fn clear_depth_stencil(&mut self, texture: &Arc<dyn Texture>, _depth: f32, _stencil: u32) -> Result<()> {
        self.record(format!("clear depth {}", texture.desc().name))
    }

    fn draw(&mut self, attribs: &DrawAttribs) -> Result<()> {
        self.record(format!("draw {}", attribs.vertex_count))
    }

    fn draw_indexed(&mut self, attribs: &DrawIndexedAttribs) -> Result<()> {
        self.record(format!("draw indexed {}", attribs.index_count))
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.record(format!("dispatch {}x{}x{}", x, y, z))
    }

    fn update_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64, data: &[u8]) -> Result<()> {
        self.record(format!("update {} +{} {} bytes", buffer.desc().name, offset, data.len()))
    }

    fn copy_buffer(
        &mut self,
        src: &Arc<dyn Buffer>,
        _src_offset: u64,
        dst: &Arc<dyn Buffer>,
        _dst_offset: u64,
        size: u64,
    ) -> Result<()> {
        self.record(format!("copy {} -> {} {} bytes", src.desc().name, dst.desc().name, size))
    }

    fn copy_texture(&mut self, src: &Arc<dyn Texture>, dst: &Arc<dyn Texture>) -> Result<()> {
        self.record(format!("copy {} -> {}", src.desc().name, dst.desc().name))
    }

    fn signal_fence(&mut self, fence: &Arc<Fence>, value: u64) -> Result<()> {
        self.fences.push((fence.clone(), value));
        self.record(format!("signal {} {}", fence.name(), value))
    }

    fn finish(self: Box<Self>) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(TestList {
            count: self.count,
            fences: self.fences,
        }))
    }
}

struct TestList {
    count: usize,
    fences: Vec<(Arc<Fence>, u64)>,
}

impl CommandList for TestList {
    fn len(&self) -> usize {
        self.count
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

// ============================================================================
// DEVICE
// ============================================================================

pub struct TestDevice {
    config: Config,
    limits: DeviceLimits,
    log: CommandLog,
}

impl TestDevice {
    pub fn new() -> Arc<Self> {
        Self::with_limits(DeviceLimits::default())
    }

    pub fn with_limits(limits: DeviceLimits) -> Arc<Self> {
        Arc::new(Self {
            config: Config {
                enable_validation: true,
                ..Config::default()
            },
            limits,
            log: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Commands recorded so far, one line each
    pub fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn barriers(&self) -> Vec<String> {
        self.commands().into_iter().filter(|line| line.starts_with("barrier")).collect()
    }
}

impl GraphicsDevice for TestDevice {
    fn config(&self) -> &Config {
        &self.config
    }

    fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Arc<dyn Sampler>> {
        Ok(Arc::new(TestSampler {
            desc: *desc,
            handle: NEXT_HANDLE.fetch_add(1, Ordering::Relaxed),
        }))
    }

    fn create_signature_layout(&self, _info: &SignatureLayoutInfo) -> Result<Box<dyn NativeSignatureLayout>> {
        Ok(Box::new(TestNative))
    }

    fn create_pipeline_layout(&self, _info: &PipelineLayoutInfo) -> Result<Box<dyn NativePipelineLayout>> {
        Ok(Box::new(TestNative))
    }

    fn create_pipeline(&self, _info: &NativePipelineInfo) -> Result<Box<dyn NativePipeline>> {
        Ok(Box::new(TestNative))
    }

    fn create_command_sink(&self) -> Result<Box<dyn CommandSink>> {
        Ok(Box::new(TestSink {
            log: self.log.clone(),
            count: 0,
            fences: Vec::new(),
        }))
    }

    fn submit(&self, lists: Vec<Box<dyn CommandList>>) -> Result<()> {
        for list in lists {
            if let Ok(list) = list.into_any().downcast::<TestList>() {
                for (fence, value) in list.fences {
                    fence.signal(value);
                }
            }
        }
        Ok(())
    }
}
