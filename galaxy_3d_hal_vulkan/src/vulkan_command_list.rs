/// Command sink and command list - Vulkan implementation
///
/// A sink records into one primary command buffer that is begun at creation
/// and ended by `finish`. Render targets use dynamic rendering: the render
/// pass instance starts lazily at the first draw after `set_render_targets`
/// and ends before any command that is not allowed inside one (barriers,
/// copies, clears, dispatches).
///
/// Objects referenced by recorded commands are retained until the command
/// list is dropped. Pipelines are not: they must outlive the submission.

use ash::vk;
use ash::vk::Handle;
use galaxy_3d_hal::galaxy3d::binding::{ResourceCache, ResourceSignature, SamplerAssignment};
use galaxy_3d_hal::galaxy3d::context::{DrawAttribs, DrawIndexedAttribs, PipelineState};
use galaxy_3d_hal::galaxy3d::device::{
    BarrierKind, BoundObject, Buffer as HalBuffer, CommandList as HalCommandList, CommandSink as HalCommandSink, Fence, IndexType,
    ResourceBindInfo, ResourceRef, Sampler as HalSampler, StateBarrier, Texture as HalTexture, TextureDimension,
};
use galaxy_3d_hal::galaxy3d::state::ResourceState;
use galaxy_3d_hal::galaxy3d::{Error, Result};
use galaxy_3d_hal::{engine_bail, engine_err, engine_error, engine_warn};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_conversions::{
    aspect_mask, descriptor_image_layout, descriptor_type, index_type, state_access, StateAccess,
};
use crate::vulkan_descriptor_set::DescriptorAllocator;
use crate::vulkan_layout::PipelineLayout;
use crate::vulkan_pipeline::Pipeline;
use crate::vulkan_texture::layer_count;

/// vkCmdUpdateBuffer accepts at most 65536 bytes per call
const MAX_UPDATE_SIZE: usize = 65536;

// ============================================================================
// COMMAND BUFFER
// ============================================================================

/// Command pool with its single primary command buffer
struct CommandBuffer {
    ctx: Arc<GpuContext>,
    pool: vk::CommandPool,
    buffer: vk::CommandBuffer,
}

impl CommandBuffer {
    fn begin(ctx: Arc<GpuContext>, name: &str) -> Result<Self> {
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.queue_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT);
            let pool = ctx.device.create_command_pool(&pool_info, None)
                .map_err(|e| engine_err!("galaxy3d::vulkan", "Failed to create command pool: {:?}", e))?;

            // From here on the pool is destroyed by Drop on error
            let mut command_buffer = Self {
                ctx,
                pool,
                buffer: vk::CommandBuffer::null(),
            };

            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let buffers = command_buffer.ctx.device.allocate_command_buffers(&allocate_info)
                .map_err(|e| engine_err!("galaxy3d::vulkan", "Failed to allocate command buffer: {:?}", e))?;
            command_buffer.buffer = buffers[0];
            command_buffer.ctx.set_object_name(command_buffer.buffer, name);

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            command_buffer.ctx.device.begin_command_buffer(command_buffer.buffer, &begin_info)
                .map_err(|e| engine_err!("galaxy3d::vulkan", "Failed to begin command buffer: {:?}", e))?;

            Ok(command_buffer)
        }
    }
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        unsafe {
            // Frees the command buffer too
            self.ctx.device.destroy_command_pool(self.pool, None);
        }
    }
}

// ============================================================================
// DESCRIPTOR WRITES
// ============================================================================

enum DescriptorInfo {
    Buffer(vk::DescriptorBufferInfo),
    Image(vk::DescriptorImageInfo),
    TexelBuffer(vk::BufferView),
    AccelStruct(vk::AccelerationStructureKHR),
}

struct PendingWrite {
    set: vk::DescriptorSet,
    binding: u32,
    element: u32,
    ty: vk::DescriptorType,
    info: DescriptorInfo,
}

/// True when `object` is the kind of view descriptors of `ty` take
fn object_fits(ty: vk::DescriptorType, object: &BoundObject) -> bool {
    match ty {
        vk::DescriptorType::UNIFORM_BUFFER | vk::DescriptorType::STORAGE_BUFFER => {
            matches!(object, BoundObject::Buffer(_))
        }
        vk::DescriptorType::UNIFORM_TEXEL_BUFFER | vk::DescriptorType::STORAGE_TEXEL_BUFFER => {
            matches!(object, BoundObject::TexelBuffer(_))
        }
        vk::DescriptorType::ACCELERATION_STRUCTURE_KHR => matches!(object, BoundObject::AccelStruct(_)),
        _ => matches!(object, BoundObject::Texture(_)),
    }
}

// ============================================================================
// RENDER TARGETS
// ============================================================================

struct ColorTarget {
    view: vk::ImageView,
}

struct DepthTarget {
    view: vk::ImageView,
    has_stencil: bool,
}

struct RenderTargets {
    colors: Vec<ColorTarget>,
    depth: Option<DepthTarget>,
    extent: vk::Extent2D,
}

// ============================================================================
// COMMAND SINK
// ============================================================================

/// Vulkan command sink
pub struct CommandSink {
    command_buffer: CommandBuffer,
    descriptors: DescriptorAllocator,
    /// Pipeline stages shader accesses synchronize with
    shader_stages: vk::PipelineStageFlags,
    render_targets: Option<RenderTargets>,
    rendering: bool,
    retained: Vec<ResourceRef>,
    retained_samplers: Vec<Arc<dyn HalSampler>>,
    fences: Vec<(Arc<Fence>, u64)>,
    command_count: usize,
}

impl CommandSink {
    pub(crate) fn new(ctx: Arc<GpuContext>, shader_stages: vk::PipelineStageFlags, name: &str) -> Result<Self> {
        Ok(Self {
            command_buffer: CommandBuffer::begin(Arc::clone(&ctx), name)?,
            descriptors: DescriptorAllocator::new(ctx, name),
            shader_stages,
            render_targets: None,
            rendering: false,
            retained: Vec::new(),
            retained_samplers: Vec::new(),
            fences: Vec::new(),
            command_count: 0,
        })
    }

    #[inline]
    fn device(&self) -> &ash::Device {
        &self.command_buffer.ctx.device
    }

    #[inline]
    fn cmd(&self) -> vk::CommandBuffer {
        self.command_buffer.buffer
    }

    fn record(&mut self) -> Result<()> {
        self.command_count += 1;
        Ok(())
    }

    fn access(&self, state: ResourceState) -> StateAccess {
        state_access(state, self.shader_stages)
    }

    fn end_rendering(&mut self) {
        if self.rendering {
            unsafe {
                self.device().cmd_end_rendering(self.cmd());
            }
            self.rendering = false;
        }
    }

    /// Start the render pass instance of the current render targets, if needed
    fn begin_rendering(&mut self) {
        let Some(targets) = &self.render_targets else {
            return;
        };
        if self.rendering {
            return;
        }

        let colors: Vec<vk::RenderingAttachmentInfo> = targets
            .colors
            .iter()
            .map(|color| {
                vk::RenderingAttachmentInfo::default()
                    .image_view(color.view)
                    .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                    .load_op(vk::AttachmentLoadOp::LOAD)
                    .store_op(vk::AttachmentStoreOp::STORE)
            })
            .collect();
        let depth = targets.depth.as_ref().map(|depth| {
            vk::RenderingAttachmentInfo::default()
                .image_view(depth.view)
                .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::LOAD)
                .store_op(vk::AttachmentStoreOp::STORE)
        });

        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: targets.extent,
        };
        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(render_area)
            .layer_count(1)
            .color_attachments(&colors);
        if let (Some(depth), Some(target)) = (&depth, &targets.depth) {
            rendering_info = rendering_info.depth_attachment(depth);
            if target.has_stencil {
                rendering_info = rendering_info.stencil_attachment(depth);
            }
        }

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: targets.extent.width as f32,
            height: targets.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        unsafe {
            self.device().cmd_begin_rendering(self.cmd(), &rendering_info);
            self.device().cmd_set_viewport(self.cmd(), 0, &[viewport]);
            self.device().cmd_set_scissor(self.cmd(), 0, &[render_area]);
        }
        self.rendering = true;
    }

    /// Layout transition of a whole image outside the state tracker
    fn image_barrier(&self, texture: &Arc<dyn HalTexture>, from: StateAccess, to: StateAccess) {
        let barrier = vk::ImageMemoryBarrier::default()
            .src_access_mask(from.access)
            .dst_access_mask(to.access)
            .old_layout(from.layout)
            .new_layout(to.layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(vk::Image::from_raw(texture.native_handle()))
            .subresource_range(full_range(texture));
        unsafe {
            self.device().cmd_pipeline_barrier(
                self.cmd(),
                from.stages,
                to.stages,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }

    /// Descriptor writes of every bound element of `signature`
    fn collect_writes(
        &mut self,
        signature: &ResourceSignature,
        cache: &ResourceCache,
        sets: &[vk::DescriptorSet],
    ) -> Vec<PendingWrite> {
        let mut pending = Vec::new();

        for (res, attr) in signature.resources() {
            let ty = descriptor_type(res.kind, res.flags);
            let set = sets[attr.descriptor_set as usize];

            for element in 0..res.array_size {
                let info = match attr.range {
                    // Separate sampler
                    None => {
                        if attr.imtbl_sampler_assigned() {
                            break;
                        }
                        let Some(sampler) = cache.sampler(attr.cache_offset + element) else {
                            continue;
                        };
                        self.retained_samplers.push(Arc::clone(sampler));
                        DescriptorInfo::Image(
                            vk::DescriptorImageInfo::default().sampler(vk::Sampler::from_raw(sampler.native_handle())),
                        )
                    }
                    Some(range) => {
                        let Some(slot) = cache.slot(range, attr.cache_offset + element) else {
                            continue;
                        };
                        let Some(object) = &slot.object else {
                            continue;
                        };
                        if !object_fits(ty, object) {
                            engine_warn!("galaxy3d::vulkan",
                                "'{}' bound to variable '{}' of signature '{}' does not fit a {:?} descriptor",
                                object.name(), res.name, signature.name(), ty);
                            continue;
                        }

                        let info = match ty {
                            vk::DescriptorType::UNIFORM_BUFFER | vk::DescriptorType::STORAGE_BUFFER => {
                                DescriptorInfo::Buffer(vk::DescriptorBufferInfo {
                                    buffer: vk::Buffer::from_raw(slot.aux_handle),
                                    offset: 0,
                                    range: vk::WHOLE_SIZE,
                                })
                            }
                            vk::DescriptorType::UNIFORM_TEXEL_BUFFER | vk::DescriptorType::STORAGE_TEXEL_BUFFER => {
                                DescriptorInfo::TexelBuffer(vk::BufferView::from_raw(slot.aux_handle))
                            }
                            vk::DescriptorType::ACCELERATION_STRUCTURE_KHR => {
                                DescriptorInfo::AccelStruct(vk::AccelerationStructureKHR::from_raw(slot.aux_handle))
                            }
                            _ => {
                                let sampler = if ty == vk::DescriptorType::COMBINED_IMAGE_SAMPLER {
                                    match self.combined_sampler(signature, cache, attr.sampler, element, slot.sampler.as_ref()) {
                                        Some(sampler) => sampler,
                                        None => {
                                            engine_warn!("galaxy3d::vulkan",
                                                "No sampler for combined texture '{}' of signature '{}': descriptor not written",
                                                res.name, signature.name());
                                            continue;
                                        }
                                    }
                                } else {
                                    vk::Sampler::null()
                                };
                                DescriptorInfo::Image(vk::DescriptorImageInfo {
                                    sampler,
                                    image_view: vk::ImageView::from_raw(slot.aux_handle),
                                    image_layout: descriptor_image_layout(res.kind),
                                })
                            }
                        };
                        self.retained.push(object.resource());
                        info
                    }
                };

                pending.push(PendingWrite {
                    set,
                    binding: attr.binding,
                    element,
                    ty,
                    info,
                });
            }
        }
        pending
    }

    /// Sampler of a combined image sampler element; null when baked into the layout
    fn combined_sampler(
        &mut self,
        signature: &ResourceSignature,
        cache: &ResourceCache,
        assignment: SamplerAssignment,
        element: u32,
        paired: Option<&Arc<dyn HalSampler>>,
    ) -> Option<vk::Sampler> {
        let sampler = match (assignment, paired) {
            (SamplerAssignment::Immutable(_), _) => return Some(vk::Sampler::null()),
            (_, Some(sampler)) => sampler,
            (SamplerAssignment::Resource(index), None) => {
                let sampler_res = signature.resource(index as usize);
                let sampler_attr = signature.attribs(index as usize);
                let sampler_element = element.min(sampler_res.array_size.saturating_sub(1));
                cache.sampler(sampler_attr.cache_offset + sampler_element)?
            }
            (SamplerAssignment::None, None) => return None,
        };
        self.retained_samplers.push(Arc::clone(sampler));
        Some(vk::Sampler::from_raw(sampler.native_handle()))
    }
}

/// Range covering every mip level and layer of a texture
fn full_range(texture: &Arc<dyn HalTexture>) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect_mask(texture.desc().format),
        base_mip_level: 0,
        level_count: vk::REMAINING_MIP_LEVELS,
        base_array_layer: 0,
        layer_count: vk::REMAINING_ARRAY_LAYERS,
    }
}

fn native_pipeline(pipeline: &PipelineState) -> Result<(&Pipeline, &PipelineLayout)> {
    let native = pipeline.native().as_any().downcast_ref::<Pipeline>();
    let layout = pipeline.layout().native().as_any().downcast_ref::<PipelineLayout>();
    match (native, layout) {
        (Some(native), Some(layout)) => Ok((native, layout)),
        _ => Err(engine_err!("galaxy3d::vulkan",
            "Pipeline '{}' was not created by the Vulkan device", pipeline.name())),
    }
}

impl HalCommandSink for CommandSink {
    fn resource_barrier(&mut self, barrier: &StateBarrier) -> Result<()> {
        self.end_rendering();

        let (from, to) = match barrier.kind {
            BarrierKind::UnorderedAccess => {
                let uav = self.access(ResourceState::UNORDERED_ACCESS);
                (uav, uav)
            }
            BarrierKind::Transition => (self.access(barrier.old_state), self.access(barrier.new_state)),
        };

        unsafe {
            match &barrier.resource {
                ResourceRef::Buffer(buffer) => {
                    let vk_barrier = vk::BufferMemoryBarrier::default()
                        .src_access_mask(from.access)
                        .dst_access_mask(to.access)
                        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .buffer(vk::Buffer::from_raw(buffer.native_handle()))
                        .offset(0)
                        .size(vk::WHOLE_SIZE);
                    self.device().cmd_pipeline_barrier(
                        self.cmd(), from.stages, to.stages, vk::DependencyFlags::empty(), &[], &[vk_barrier], &[],
                    );
                }
                ResourceRef::Texture(texture) => {
                    self.image_barrier(texture, from, to);
                }
                ResourceRef::AccelStruct(_) => {
                    let vk_barrier = vk::MemoryBarrier::default()
                        .src_access_mask(from.access)
                        .dst_access_mask(to.access);
                    self.device().cmd_pipeline_barrier(
                        self.cmd(), from.stages, to.stages, vk::DependencyFlags::empty(), &[vk_barrier], &[], &[],
                    );
                }
            }
        }
        self.retained.push(barrier.resource.clone());
        self.record()
    }

    fn bind_pipeline(&mut self, pipeline: &PipelineState) -> Result<()> {
        let (native, _) = native_pipeline(pipeline)?;
        unsafe {
            self.device().cmd_bind_pipeline(self.cmd(), native.bind_point, native.pipeline);
        }
        self.record()
    }

    fn bind_resources(&mut self, info: &ResourceBindInfo) -> Result<()> {
        let (native, layout) = native_pipeline(info.pipeline)?;
        let (bind_point, pipeline_layout) = (native.bind_point, layout.layout);
        let set_count = info.signature.descriptor_set_count();
        if set_count == 0 {
            return Ok(());
        }

        let first = info.first_set as usize;
        let last = first + set_count as usize;
        if last > layout.set_layouts.len() {
            engine_bail!("galaxy3d::vulkan",
                "Signature '{}' uses sets {}..{} but pipeline '{}' has {} set layouts",
                info.signature.name(), first, last, info.pipeline.name(), layout.set_layouts.len());
        }

        let mut sets = Vec::with_capacity(set_count as usize);
        for index in first..last {
            sets.push(self.descriptors.allocate(layout.set_layouts[index], &layout.set_sizes[index])?);
        }

        let pending = self.collect_writes(info.signature, info.cache, &sets);

        let mut accel_writes: Vec<vk::WriteDescriptorSetAccelerationStructureKHR> = pending
            .iter()
            .filter_map(|write| match &write.info {
                DescriptorInfo::AccelStruct(handle) => Some(
                    vk::WriteDescriptorSetAccelerationStructureKHR::default()
                        .acceleration_structures(std::slice::from_ref(handle)),
                ),
                _ => None,
            })
            .collect();
        let mut accel_iter = accel_writes.iter_mut();

        let writes: Vec<vk::WriteDescriptorSet> = pending
            .iter()
            .filter_map(|pending| {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(pending.set)
                    .dst_binding(pending.binding)
                    .dst_array_element(pending.element)
                    .descriptor_type(pending.ty);
                Some(match &pending.info {
                    DescriptorInfo::Buffer(info) => write.buffer_info(std::slice::from_ref(info)),
                    DescriptorInfo::Image(info) => write.image_info(std::slice::from_ref(info)),
                    DescriptorInfo::TexelBuffer(view) => write.texel_buffer_view(std::slice::from_ref(view)),
                    DescriptorInfo::AccelStruct(_) => write.descriptor_count(1).push_next(accel_iter.next()?),
                })
            })
            .collect();

        unsafe {
            self.device().update_descriptor_sets(&writes, &[]);
            self.device().cmd_bind_descriptor_sets(self.cmd(), bind_point, pipeline_layout, info.first_set, &sets, &[]);
        }
        self.record()
    }

    fn set_vertex_buffers(&mut self, first_slot: u32, buffers: &[(Arc<dyn HalBuffer>, u64)]) -> Result<()> {
        let handles: Vec<vk::Buffer> = buffers.iter().map(|(buffer, _)| vk::Buffer::from_raw(buffer.native_handle())).collect();
        let offsets: Vec<vk::DeviceSize> = buffers.iter().map(|(_, offset)| *offset).collect();
        unsafe {
            self.device().cmd_bind_vertex_buffers(self.cmd(), first_slot, &handles, &offsets);
        }
        self.retained.extend(buffers.iter().map(|(buffer, _)| ResourceRef::Buffer(Arc::clone(buffer))));
        self.record()
    }

    fn set_index_buffer(&mut self, buffer: &Arc<dyn HalBuffer>, offset: u64, index: IndexType) -> Result<()> {
        unsafe {
            self.device().cmd_bind_index_buffer(self.cmd(), vk::Buffer::from_raw(buffer.native_handle()), offset, index_type(index));
        }
        self.retained.push(ResourceRef::Buffer(Arc::clone(buffer)));
        self.record()
    }

    fn set_render_targets(&mut self, color: &[Arc<dyn HalTexture>], depth: Option<&Arc<dyn HalTexture>>) -> Result<()> {
        self.end_rendering();

        let Some(first) = color.first().or(depth) else {
            self.render_targets = None;
            return self.record();
        };
        let extent = vk::Extent2D {
            width: first.desc().width,
            height: first.desc().height,
        };

        self.render_targets = Some(RenderTargets {
            colors: color
                .iter()
                .map(|texture| ColorTarget {
                    view: vk::ImageView::from_raw(texture.native_view()),
                })
                .collect(),
            depth: depth.map(|texture| DepthTarget {
                view: vk::ImageView::from_raw(texture.native_view()),
                has_stencil: texture.desc().format.has_stencil(),
            }),
            extent,
        });
        self.retained.extend(color.iter().chain(depth).map(|texture| ResourceRef::Texture(Arc::clone(texture))));
        self.record()
    }

    fn clear_render_target(&mut self, texture: &Arc<dyn HalTexture>, color: [f32; 4]) -> Result<()> {
        self.end_rendering();

        // Untracked textures are assumed to be render targets
        let state = texture.state().get();
        let current = if state.is_unknown() { ResourceState::RENDER_TARGET } else { state };
        let (attachment, transfer) = (self.access(current), self.access(ResourceState::COPY_DEST));

        self.image_barrier(texture, attachment, transfer);
        unsafe {
            self.device().cmd_clear_color_image(
                self.cmd(),
                vk::Image::from_raw(texture.native_handle()),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &vk::ClearColorValue { float32: color },
                &[full_range(texture)],
            );
        }
        self.image_barrier(texture, transfer, attachment);

        self.retained.push(ResourceRef::Texture(Arc::clone(texture)));
        self.record()
    }

    fn clear_depth_stencil(&mut self, texture: &Arc<dyn HalTexture>, depth: f32, stencil: u32) -> Result<()> {
        self.end_rendering();

        let state = texture.state().get();
        let current = if state.is_unknown() { ResourceState::DEPTH_WRITE } else { state };
        let (attachment, transfer) = (self.access(current), self.access(ResourceState::COPY_DEST));

        self.image_barrier(texture, attachment, transfer);
        unsafe {
            self.device().cmd_clear_depth_stencil_image(
                self.cmd(),
                vk::Image::from_raw(texture.native_handle()),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &vk::ClearDepthStencilValue { depth, stencil },
                &[full_range(texture)],
            );
        }
        self.image_barrier(texture, transfer, attachment);

        self.retained.push(ResourceRef::Texture(Arc::clone(texture)));
        self.record()
    }

    fn draw(&mut self, attribs: &DrawAttribs) -> Result<()> {
        self.begin_rendering();
        unsafe {
            self.device().cmd_draw(
                self.cmd(),
                attribs.vertex_count,
                attribs.instance_count,
                attribs.first_vertex,
                attribs.first_instance,
            );
        }
        self.record()
    }

    fn draw_indexed(&mut self, attribs: &DrawIndexedAttribs) -> Result<()> {
        self.begin_rendering();
        unsafe {
            self.device().cmd_draw_indexed(
                self.cmd(),
                attribs.index_count,
                attribs.instance_count,
                attribs.first_index,
                attribs.base_vertex,
                attribs.first_instance,
            );
        }
        self.record()
    }

    fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32) -> Result<()> {
        self.end_rendering();
        unsafe {
            self.device().cmd_dispatch(self.cmd(), group_count_x, group_count_y, group_count_z);
        }
        self.record()
    }

    fn update_buffer(&mut self, buffer: &Arc<dyn HalBuffer>, offset: u64, data: &[u8]) -> Result<()> {
        if offset % 4 != 0 || data.len() % 4 != 0 {
            let message = format!(
                "Update of buffer '{}' at offset {} with {} bytes: offset and size must be multiples of 4",
                buffer.desc().name, offset, data.len()
            );
            engine_error!("galaxy3d::vulkan", "{}", message);
            return Err(Error::InvalidOperation(message));
        }
        self.end_rendering();

        let handle = vk::Buffer::from_raw(buffer.native_handle());
        let mut chunk_offset = offset;
        for chunk in data.chunks(MAX_UPDATE_SIZE) {
            unsafe {
                self.device().cmd_update_buffer(self.cmd(), handle, chunk_offset, chunk);
            }
            chunk_offset += chunk.len() as u64;
        }

        self.retained.push(ResourceRef::Buffer(Arc::clone(buffer)));
        self.record()
    }

    fn copy_buffer(
        &mut self,
        src: &Arc<dyn HalBuffer>,
        src_offset: u64,
        dst: &Arc<dyn HalBuffer>,
        dst_offset: u64,
        size: u64,
    ) -> Result<()> {
        self.end_rendering();
        let region = vk::BufferCopy {
            src_offset,
            dst_offset,
            size,
        };
        unsafe {
            self.device().cmd_copy_buffer(
                self.cmd(),
                vk::Buffer::from_raw(src.native_handle()),
                vk::Buffer::from_raw(dst.native_handle()),
                &[region],
            );
        }
        self.retained.push(ResourceRef::Buffer(Arc::clone(src)));
        self.retained.push(ResourceRef::Buffer(Arc::clone(dst)));
        self.record()
    }

    fn copy_texture(&mut self, src: &Arc<dyn HalTexture>, dst: &Arc<dyn HalTexture>) -> Result<()> {
        self.end_rendering();

        let desc = src.desc();
        let aspect = aspect_mask(desc.format);
        let layers = layer_count(desc);
        let is_3d = desc.dimension == TextureDimension::Tex3D;
        let regions: Vec<vk::ImageCopy> = (0..desc.mip_levels.max(1))
            .map(|mip| {
                let subresource = vk::ImageSubresourceLayers {
                    aspect_mask: aspect,
                    mip_level: mip,
                    base_array_layer: 0,
                    layer_count: layers,
                };
                vk::ImageCopy {
                    src_subresource: subresource,
                    src_offset: vk::Offset3D::default(),
                    dst_subresource: subresource,
                    dst_offset: vk::Offset3D::default(),
                    extent: vk::Extent3D {
                        width: (desc.width >> mip).max(1),
                        height: (desc.height >> mip).max(1),
                        depth: if is_3d { (desc.depth_or_layers >> mip).max(1) } else { 1 },
                    },
                }
            })
            .collect();

        unsafe {
            self.device().cmd_copy_image(
                self.cmd(),
                vk::Image::from_raw(src.native_handle()),
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::Image::from_raw(dst.native_handle()),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &regions,
            );
        }
        self.retained.push(ResourceRef::Texture(Arc::clone(src)));
        self.retained.push(ResourceRef::Texture(Arc::clone(dst)));
        self.record()
    }

    fn signal_fence(&mut self, fence: &Arc<Fence>, value: u64) -> Result<()> {
        self.fences.push((Arc::clone(fence), value));
        self.record()
    }

    fn finish(mut self: Box<Self>) -> Result<Box<dyn HalCommandList>> {
        self.end_rendering();
        unsafe {
            self.device().end_command_buffer(self.cmd())
                .map_err(|e| engine_err!("galaxy3d::vulkan", "Failed to end command buffer: {:?}", e))?;
        }

        let sink = *self;
        Ok(Box::new(CommandList {
            command_buffer: sink.command_buffer,
            _descriptors: sink.descriptors,
            _retained: sink.retained,
            _retained_samplers: sink.retained_samplers,
            fences: sink.fences,
            command_count: sink.command_count,
        }))
    }
}

// ============================================================================
// COMMAND LIST
// ============================================================================

/// Finished Vulkan command list
///
/// Owns the command buffer, the descriptor pools its sets came from and the
/// objects its commands reference.
pub struct CommandList {
    command_buffer: CommandBuffer,
    _descriptors: DescriptorAllocator,
    _retained: Vec<ResourceRef>,
    _retained_samplers: Vec<Arc<dyn HalSampler>>,
    pub(crate) fences: Vec<(Arc<Fence>, u64)>,
    command_count: usize,
}

impl CommandList {
    pub(crate) fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer.buffer
    }
}

impl HalCommandList for CommandList {
    fn len(&self) -> usize {
        self.command_count
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

