/// Command recorder
///
/// A `DeviceContext` records commands into a backend command sink. Every
/// command that uses resources takes a `TransitionMode` and goes through the
/// context's `StateTracker` first, so barriers land in the sequence right
/// before the command that needs them.
///
/// Committed binding sets stay bound across pipeline changes for as long as
/// the new pipeline's signatures are compatible, in binding-index order, with
/// the previous pipeline's.

use std::sync::Arc;
use crate::binding::signature::expects_texture_view;
use crate::binding::{
    ResourceCache, ResourceDesc, ResourceDimension, ResourceFlags, ResourceKind, ResourceSignature,
    ResolvedTarget, ShaderResourceBinding, MAX_RESOURCE_SIGNATURES,
};
use crate::engine_fail;
use crate::error::{Error, Result};
use crate::graphics_device::{
    BoundObject, Buffer, BufferBindFlags, CommandList, CommandSink, Fence, GraphicsDevice, IndexType,
    PipelineType, ResourceBindInfo, ResourceRef, Texture, TextureDimension,
};
use crate::state::{ResourceState, StateTracker, StateTransitionDesc, TransitionMode};
use super::commands::{DrawAttribs, DrawIndexedAttribs};
use super::pipeline_state::PipelineState;

/// Color attachments a single `set_render_targets` call may bind
pub const MAX_RENDER_TARGETS: usize = 8;

/// Binding set committed at one binding index
struct CommittedBinding {
    signature: Arc<ResourceSignature>,
    /// Bound objects at commit time, kept for draw-time validation
    snapshot: Option<ResourceCache>,
}

pub struct DeviceContext {
    name: String,
    device: Arc<dyn GraphicsDevice>,
    sink: Box<dyn CommandSink>,
    tracker: StateTracker,
    validation: bool,
    pipeline: Option<Arc<PipelineState>>,
    committed: [Option<CommittedBinding>; MAX_RESOURCE_SIGNATURES],
    command_count: u64,
}

impl DeviceContext {
    pub fn new(device: Arc<dyn GraphicsDevice>, name: impl Into<String>) -> Result<Self> {
        let sink = device.create_command_sink()?;
        let validation = device.config().validation_enabled();
        Ok(Self {
            name: name.into(),
            device,
            sink,
            tracker: StateTracker::new(validation),
            validation,
            pipeline: None,
            committed: std::array::from_fn(|_| None),
            command_count: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    /// Currently bound pipeline
    pub fn pipeline(&self) -> Option<&Arc<PipelineState>> {
        self.pipeline.as_ref()
    }

    /// True when a binding set is committed at `binding_index`
    pub fn is_committed(&self, binding_index: u8) -> bool {
        self.committed
            .get(binding_index as usize)
            .is_some_and(|committed| committed.is_some())
    }

    /// Commands recorded since the last `finish`
    pub fn command_count(&self) -> u64 {
        self.command_count
    }

    // ===== PIPELINE AND BINDINGS =====

    /// Bind a pipeline
    ///
    /// Committed binding sets survive when every signature up to and
    /// including theirs is compatible between the old and new pipeline.
    pub fn set_pipeline_state(&mut self, pipeline: &Arc<PipelineState>) -> Result<()> {
        if let Some(current) = &self.pipeline {
            if Arc::ptr_eq(current, pipeline) {
                return Ok(());
            }
        }

        self.sink.bind_pipeline(pipeline)?;
        self.command_count += 1;

        let mut compatible = self.pipeline.is_some();
        for index in 0..MAX_RESOURCE_SIGNATURES {
            if compatible {
                let old = self.pipeline.as_ref().and_then(|p| p.signature(index as u8));
                compatible = match (old, pipeline.signature(index as u8)) {
                    (None, None) => true,
                    (Some(a), Some(b)) => a.is_compatible_with(b),
                    _ => false,
                };
            }
            if !compatible {
                if let Some(released) = self.committed[index].take() {
                    crate::engine_trace!("galaxy3d::DeviceContext",
                        "Binding set of signature '{}' released: pipeline '{}' is not compatible",
                        released.signature.name(), pipeline.name());
                }
            }
        }

        self.pipeline = Some(pipeline.clone());
        Ok(())
    }

    /// Bind a binding set for the active pipeline
    ///
    /// Static resources are copied into the set on first commit. Every bound
    /// resource is brought into the state its variable needs according to
    /// `mode`.
    ///
    /// # Errors
    ///
    /// `IncompletePipelineBinding` when no pipeline is bound or the bound
    /// pipeline's signature at the set's binding index is not compatible.
    pub fn commit_shader_resources(
        &mut self,
        binding: &mut ShaderResourceBinding,
        mode: TransitionMode,
    ) -> Result<()> {
        let signature = binding.signature().clone();
        let binding_index = signature.binding_index();

        let Some(pipeline) = self.pipeline.clone() else {
            engine_fail!("galaxy3d::DeviceContext", Error::IncompletePipelineBinding(format!(
                "No pipeline is bound when committing binding set of signature '{}'",
                signature.name()
            )));
        };
        match pipeline.signature(binding_index) {
            Some(expected) if expected.is_compatible_with(&signature) => {}
            _ => {
                engine_fail!("galaxy3d::DeviceContext", Error::IncompletePipelineBinding(format!(
                    "Signature '{}' is not compatible with the signature of pipeline '{}' at binding index {}",
                    signature.name(), pipeline.name(), binding_index
                )));
            }
        }

        if !binding.static_resources_initialized() {
            binding.initialize_static_resources();
        }

        if mode != TransitionMode::None {
            self.process_binding_states(&signature, binding.cache(), mode, "Commit shader resources")?;
        }

        self.sink.bind_resources(&ResourceBindInfo {
            pipeline: &pipeline,
            signature: &signature,
            cache: binding.cache(),
            first_set: pipeline.layout().first_descriptor_set(binding_index),
        })?;
        self.command_count += 1;

        let snapshot = if self.validation { Some(binding.cache().snapshot()) } else { None };
        self.committed[binding_index as usize] = Some(CommittedBinding { signature, snapshot });
        Ok(())
    }

    /// Transition every resource bound in `binding` to the state its variable needs
    pub fn transition_shader_resources(&mut self, binding: &ShaderResourceBinding) -> Result<()> {
        let signature = binding.signature().clone();
        self.process_binding_states(&signature, binding.cache(), TransitionMode::Transition, "Transition shader resources")
    }

    fn process_binding_states(
        &mut self,
        signature: &ResourceSignature,
        cache: &ResourceCache,
        mode: TransitionMode,
        operation: &str,
    ) -> Result<()> {
        for (res, attr) in signature.resources() {
            let (Some(range), Some(required)) = (attr.range, required_state(res)) else {
                continue;
            };
            for element in 0..res.array_size {
                if let Some(object) = cache.resource(range, attr.cache_offset + element) {
                    self.tracker.transition(&object.resource(), required, mode, operation, self.sink.as_mut())?;
                }
            }
        }
        Ok(())
    }

    // ===== INPUT ASSEMBLY AND CLEARS =====

    pub fn set_vertex_buffers(
        &mut self,
        first_slot: u32,
        buffers: &[(Arc<dyn Buffer>, u64)],
        mode: TransitionMode,
    ) -> Result<()> {
        for (buffer, _) in buffers {
            require_bind_flag(buffer, BufferBindFlags::VERTEX, "vertex buffer")?;
            self.tracker.transition(
                &ResourceRef::Buffer(buffer.clone()),
                ResourceState::VERTEX_BUFFER,
                mode,
                "Set vertex buffers",
                self.sink.as_mut(),
            )?;
        }
        self.sink.set_vertex_buffers(first_slot, buffers)?;
        self.command_count += 1;
        Ok(())
    }

    pub fn set_index_buffer(
        &mut self,
        buffer: &Arc<dyn Buffer>,
        offset: u64,
        index_type: IndexType,
        mode: TransitionMode,
    ) -> Result<()> {
        require_bind_flag(buffer, BufferBindFlags::INDEX, "index buffer")?;
        self.tracker.transition(
            &ResourceRef::Buffer(buffer.clone()),
            ResourceState::INDEX_BUFFER,
            mode,
            "Set index buffer",
            self.sink.as_mut(),
        )?;
        self.sink.set_index_buffer(buffer, offset, index_type)?;
        self.command_count += 1;
        Ok(())
    }

    /// Bind color and depth attachments for subsequent draws
    ///
    /// Every attachment must share the first one's extent. Color targets go to
    /// `RENDER_TARGET` and the depth target to `DEPTH_WRITE`.
    pub fn set_render_targets(
        &mut self,
        color: &[Arc<dyn Texture>],
        depth: Option<&Arc<dyn Texture>>,
        mode: TransitionMode,
    ) -> Result<()> {
        if color.len() > MAX_RENDER_TARGETS {
            engine_fail!("galaxy3d::DeviceContext", Error::InvalidOperation(format!(
                "Set render targets: {} color targets exceed the maximum of {}", color.len(), MAX_RENDER_TARGETS
            )));
        }
        if let Some(texture) = color.iter().find(|texture| texture.desc().format.is_depth()) {
            engine_fail!("galaxy3d::DeviceContext", Error::InvalidOperation(format!(
                "Set render targets: texture '{}' has a depth format and cannot be a color target",
                texture.desc().name
            )));
        }
        if let Some(texture) = depth.filter(|texture| !texture.desc().format.is_depth()) {
            engine_fail!("galaxy3d::DeviceContext", Error::InvalidOperation(format!(
                "Set render targets: texture '{}' has no depth format", texture.desc().name
            )));
        }

        let mut attachments = color.iter().chain(depth);
        if let Some(first) = attachments.next() {
            let extent = (first.desc().width, first.desc().height);
            if let Some(other) = attachments.find(|texture| (texture.desc().width, texture.desc().height) != extent) {
                engine_fail!("galaxy3d::DeviceContext", Error::InvalidOperation(format!(
                    "Set render targets: '{}' is {}x{} but '{}' is {}x{}",
                    other.desc().name, other.desc().width, other.desc().height,
                    first.desc().name, extent.0, extent.1
                )));
            }
        }

        for texture in color {
            self.tracker.transition(
                &ResourceRef::Texture(texture.clone()),
                ResourceState::RENDER_TARGET,
                mode,
                "Set render targets",
                self.sink.as_mut(),
            )?;
        }
        if let Some(texture) = depth {
            self.tracker.transition(
                &ResourceRef::Texture(texture.clone()),
                ResourceState::DEPTH_WRITE,
                mode,
                "Set render targets",
                self.sink.as_mut(),
            )?;
        }
        self.sink.set_render_targets(color, depth)?;
        self.command_count += 1;
        Ok(())
    }

    pub fn clear_render_target(&mut self, texture: &Arc<dyn Texture>, color: [f32; 4], mode: TransitionMode) -> Result<()> {
        if texture.desc().format.is_depth() {
            engine_fail!("galaxy3d::DeviceContext", Error::InvalidOperation(format!(
                "Texture '{}' has a depth format and cannot be cleared as a render target",
                texture.desc().name
            )));
        }
        self.tracker.transition(
            &ResourceRef::Texture(texture.clone()),
            ResourceState::RENDER_TARGET,
            mode,
            "Clear render target",
            self.sink.as_mut(),
        )?;
        self.sink.clear_render_target(texture, color)?;
        self.command_count += 1;
        Ok(())
    }

    pub fn clear_depth_stencil(
        &mut self,
        texture: &Arc<dyn Texture>,
        depth: f32,
        stencil: u32,
        mode: TransitionMode,
    ) -> Result<()> {
        if !texture.desc().format.is_depth() {
            engine_fail!("galaxy3d::DeviceContext", Error::InvalidOperation(format!(
                "Texture '{}' has no depth format", texture.desc().name
            )));
        }
        self.tracker.transition(
            &ResourceRef::Texture(texture.clone()),
            ResourceState::DEPTH_WRITE,
            mode,
            "Clear depth stencil",
            self.sink.as_mut(),
        )?;
        self.sink.clear_depth_stencil(texture, depth, stencil)?;
        self.command_count += 1;
        Ok(())
    }

    // ===== DRAW AND DISPATCH =====

    pub fn draw(&mut self, attribs: &DrawAttribs) -> Result<()> {
        self.prepare_pipeline_command(PipelineType::Graphics, "Draw")?;
        self.sink.draw(attribs)?;
        self.command_count += 1;
        Ok(())
    }

    pub fn draw_indexed(&mut self, attribs: &DrawIndexedAttribs) -> Result<()> {
        self.prepare_pipeline_command(PipelineType::Graphics, "DrawIndexed")?;
        self.sink.draw_indexed(attribs)?;
        self.command_count += 1;
        Ok(())
    }

    pub fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32) -> Result<()> {
        self.prepare_pipeline_command(PipelineType::Compute, "Dispatch")?;
        self.sink.dispatch(group_count_x, group_count_y, group_count_z)?;
        self.command_count += 1;
        Ok(())
    }

    fn prepare_pipeline_command(&self, expected: PipelineType, operation: &str) -> Result<()> {
        let Some(pipeline) = &self.pipeline else {
            engine_fail!("galaxy3d::DeviceContext", Error::InvalidOperation(format!(
                "{}: no pipeline is bound", operation
            )));
        };
        if pipeline.pipeline_type() != expected {
            engine_fail!("galaxy3d::DeviceContext", Error::InvalidOperation(format!(
                "{}: pipeline '{}' is a {:?} pipeline", operation, pipeline.name(), pipeline.pipeline_type()
            )));
        }
        if self.validation {
            self.validate_committed_resources(pipeline, operation);
        }
        Ok(())
    }

    /// Log every shader resource of `pipeline` that has nothing bound.
    /// Returns the number of problems found.
    fn validate_committed_resources(&self, pipeline: &PipelineState, operation: &str) -> usize {
        let mut problems = 0;
        let mut missing_sets = 0u32;

        for entry in pipeline.layout().resolved_resources() {
            let ResolvedTarget::Resource(index) = entry.target else {
                continue;
            };
            let Some(signature) = pipeline.signature(entry.binding_index) else {
                continue;
            };
            let shader = &pipeline.stages()[entry.stage_index].resources;
            let reflected = &shader.resources[entry.resource_index];

            let committed = self.committed[entry.binding_index as usize].as_ref();
            let Some(snapshot) = committed.and_then(|c| c.snapshot.as_ref()) else {
                if missing_sets & (1 << entry.binding_index) == 0 {
                    missing_sets |= 1 << entry.binding_index;
                    problems += 1;
                    crate::engine_error!("galaxy3d::DeviceContext",
                        "{}: no binding set is committed for signature '{}' used by pipeline '{}'",
                        operation, signature.name(), pipeline.name());
                }
                continue;
            };

            let res = signature.resource(index);
            let attr = signature.attribs(index);
            // Runtime-sized arrays cannot be checked element by element
            let count = reflected.array_size;

            for element in 0..count {
                let array_suffix = if res.array_size > 1 { format!("[{}]", element) } else { String::new() };
                let bound = match attr.range {
                    Some(range) => match snapshot.resource(range, attr.cache_offset + element) {
                        Some(object) if snapshot.is_bound(range, attr.cache_offset + element, expects_texture_view(res)) => {
                            if let Some(reason) = texture_mismatch(object, reflected.dimension, reflected.is_multisample()) {
                                problems += 1;
                                crate::engine_error!("galaxy3d::DeviceContext",
                                    "{}: texture '{}' bound to variable '{}{}' in shader '{}' of pipeline '{}' {}",
                                    operation, object.name(), res.name, array_suffix, shader.shader_name, pipeline.name(), reason);
                            }
                            true
                        }
                        _ => false,
                    },
                    None if attr.imtbl_sampler_assigned() => true,
                    None => snapshot.sampler(attr.cache_offset + element).is_some(),
                };
                if !bound {
                    problems += 1;
                    crate::engine_error!("galaxy3d::DeviceContext",
                        "{}: no resource is bound to variable '{}{}' in shader '{}' of pipeline '{}'",
                        operation, res.name, array_suffix, shader.shader_name, pipeline.name());
                }
            }
        }
        problems
    }

    // ===== COPIES =====

    pub fn update_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64, data: &[u8], mode: TransitionMode) -> Result<()> {
        check_buffer_range(buffer, offset, data.len() as u64, "Update buffer")?;
        self.tracker.transition(
            &ResourceRef::Buffer(buffer.clone()),
            ResourceState::COPY_DEST,
            mode,
            "Update buffer",
            self.sink.as_mut(),
        )?;
        self.sink.update_buffer(buffer, offset, data)?;
        self.command_count += 1;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn copy_buffer(
        &mut self,
        src: &Arc<dyn Buffer>,
        src_offset: u64,
        src_mode: TransitionMode,
        dst: &Arc<dyn Buffer>,
        dst_offset: u64,
        dst_mode: TransitionMode,
        size: u64,
    ) -> Result<()> {
        check_buffer_range(src, src_offset, size, "Copy buffer")?;
        check_buffer_range(dst, dst_offset, size, "Copy buffer")?;
        self.tracker.transition(
            &ResourceRef::Buffer(src.clone()),
            ResourceState::COPY_SOURCE,
            src_mode,
            "Copy buffer",
            self.sink.as_mut(),
        )?;
        self.tracker.transition(
            &ResourceRef::Buffer(dst.clone()),
            ResourceState::COPY_DEST,
            dst_mode,
            "Copy buffer",
            self.sink.as_mut(),
        )?;
        self.sink.copy_buffer(src, src_offset, dst, dst_offset, size)?;
        self.command_count += 1;
        Ok(())
    }

    pub fn copy_texture(
        &mut self,
        src: &Arc<dyn Texture>,
        src_mode: TransitionMode,
        dst: &Arc<dyn Texture>,
        dst_mode: TransitionMode,
    ) -> Result<()> {
        let (s, d) = (src.desc(), dst.desc());
        if s.width != d.width || s.height != d.height || s.depth_or_layers != d.depth_or_layers || s.format != d.format {
            engine_fail!("galaxy3d::DeviceContext", Error::InvalidOperation(format!(
                "Copy texture: '{}' ({}x{}x{} {:?}) and '{}' ({}x{}x{} {:?}) differ",
                s.name, s.width, s.height, s.depth_or_layers, s.format,
                d.name, d.width, d.height, d.depth_or_layers, d.format
            )));
        }
        self.tracker.transition(
            &ResourceRef::Texture(src.clone()),
            ResourceState::COPY_SOURCE,
            src_mode,
            "Copy texture",
            self.sink.as_mut(),
        )?;
        self.tracker.transition(
            &ResourceRef::Texture(dst.clone()),
            ResourceState::COPY_DEST,
            dst_mode,
            "Copy texture",
            self.sink.as_mut(),
        )?;
        self.sink.copy_texture(src, dst)?;
        self.command_count += 1;
        Ok(())
    }

    // ===== STATES AND SYNCHRONIZATION =====

    /// Explicit barriers; see `StateTracker::transition_resource_states`
    pub fn transition_resource_states(&mut self, transitions: &[StateTransitionDesc]) -> Result<()> {
        self.tracker.transition_resource_states(transitions, self.sink.as_mut())
    }

    /// Signal `fence` to `value` once the commands recorded so far have executed
    pub fn enqueue_signal(&mut self, fence: &Arc<Fence>, value: u64) -> Result<()> {
        self.sink.signal_fence(fence, value)?;
        self.command_count += 1;
        Ok(())
    }

    /// Close the current sequence and start a new one
    ///
    /// The pipeline and committed binding sets are reset.
    pub fn finish(&mut self) -> Result<Box<dyn CommandList>> {
        let next = self.device.create_command_sink()?;
        let sink = std::mem::replace(&mut self.sink, next);
        self.pipeline = None;
        self.committed = std::array::from_fn(|_| None);

        crate::engine_debug!("galaxy3d::DeviceContext",
            "Context '{}' finished a command list of {} commands", self.name, self.command_count);
        self.command_count = 0;
        sink.finish()
    }

    /// Finish and submit the current sequence
    pub fn flush(&mut self) -> Result<()> {
        let list = self.finish()?;
        self.device.submit(vec![list])
    }
}

/// State a bound resource must be in for its variable, None for samplers
pub fn required_state(res: &ResourceDesc) -> Option<ResourceState> {
    let formatted = res.flags.contains(ResourceFlags::FORMATTED_BUFFER);
    match res.kind {
        ResourceKind::UniformBuffer if formatted => Some(ResourceState::SHADER_RESOURCE),
        ResourceKind::UniformBuffer => Some(ResourceState::CONSTANT_BUFFER),
        ResourceKind::StorageBuffer if res.flags.contains(ResourceFlags::READ_ONLY) => Some(ResourceState::SHADER_RESOURCE),
        ResourceKind::StorageBuffer | ResourceKind::StorageTexture => Some(ResourceState::UNORDERED_ACCESS),
        ResourceKind::SampledTexture => Some(ResourceState::SHADER_RESOURCE),
        ResourceKind::InputAttachment => Some(ResourceState::INPUT_ATTACHMENT),
        ResourceKind::AccelerationStructure => Some(ResourceState::RAY_TRACING),
        ResourceKind::Sampler => None,
    }
}

/// Why a bound texture does not fit the shader's declaration, if it does not
fn texture_mismatch(object: &BoundObject, dimension: ResourceDimension, multisample: bool) -> Option<String> {
    let BoundObject::Texture(texture) = object else {
        return None;
    };
    let desc = texture.desc();
    let dimension_ok = match dimension {
        ResourceDimension::Tex1D => desc.dimension == TextureDimension::Tex1D,
        ResourceDimension::Tex1DArray => matches!(desc.dimension, TextureDimension::Tex1D | TextureDimension::Tex1DArray),
        ResourceDimension::Tex2D => desc.dimension == TextureDimension::Tex2D,
        ResourceDimension::Tex2DArray => matches!(desc.dimension, TextureDimension::Tex2D | TextureDimension::Tex2DArray),
        ResourceDimension::Tex3D => desc.dimension == TextureDimension::Tex3D,
        ResourceDimension::TexCube => desc.dimension == TextureDimension::Cube,
        ResourceDimension::TexCubeArray => matches!(desc.dimension, TextureDimension::Cube | TextureDimension::CubeArray),
        ResourceDimension::Undefined | ResourceDimension::Buffer | ResourceDimension::SubpassInput => true,
    };
    if !dimension_ok {
        return Some(format!("is a {:?} texture, but the shader expects {:?}", desc.dimension, dimension));
    }
    if desc.is_multisampled() != multisample {
        return Some(if multisample {
            "is single-sampled, but the shader expects a multisample texture".to_string()
        } else {
            "is multisampled, but the shader expects a single-sample texture".to_string()
        });
    }
    None
}

fn require_bind_flag(buffer: &Arc<dyn Buffer>, flag: BufferBindFlags, usage: &str) -> Result<()> {
    if !buffer.desc().bind_flags.contains(flag) {
        engine_fail!("galaxy3d::DeviceContext", Error::InvalidOperation(format!(
            "Buffer '{}' was not created with the {:?} bind flag and cannot be used as a {}",
            buffer.desc().name, flag, usage
        )));
    }
    Ok(())
}

fn check_buffer_range(buffer: &Arc<dyn Buffer>, offset: u64, size: u64, operation: &str) -> Result<()> {
    let end = offset.checked_add(size);
    if end.is_none_or(|end| end > buffer.desc().size) {
        engine_fail!("galaxy3d::DeviceContext", Error::InvalidOperation(format!(
            "{}: range [{}, +{}) exceeds the {} bytes of buffer '{}'",
            operation, offset, size, buffer.desc().size, buffer.desc().name
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "device_context_tests.rs"]
mod tests;
