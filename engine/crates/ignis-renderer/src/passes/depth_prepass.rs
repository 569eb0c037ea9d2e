//! 深度预 Pass
//!
//! 只写深度，不带任何颜色附件和像素着色器；
//! 后续的 forward 不透明 Pass 以 depth-equal 只读方式复用该深度。

use anyhow::Result;
use ash::vk;
use ignis_gfx::device::{BlendMode, GfxBufferHandle, GfxCommandList, GfxDevice, GraphicsPipelineDesc, RenderPassTargets};
use ignis_gfx::shader::GfxShaderHandle;
use ignis_render_interface::render_data::{GeometryPushConstants, GpuCameraData};

use super::geometry_slots;
use crate::geometry_pass::GeometryPass;
use crate::pso_cache::{PipelineStateCache, PsoCacheKey};

pub struct DepthPrePass {
    cache: PipelineStateCache,
    frame_constants: GfxBufferHandle,
}

impl DepthPrePass {
    pub fn new(vertex_shader: GfxShaderHandle, frame_constants: GfxBufferHandle) -> Self {
        Self {
            cache: PipelineStateCache::new(GraphicsPipelineDesc {
                vertex_shader: Some(vertex_shader),
                pixel_shader: None,
                debug_name: "Depth PrePass".to_string(),
                ..Default::default()
            }),
            frame_constants,
        }
    }

    pub fn on_window_resize(&mut self, device: &dyn GfxDevice) {
        self.cache.on_window_resize(device);
    }
}

impl GeometryPass for DepthPrePass {
    fn begin_pass(
        &mut self,
        cmd: &mut dyn GfxCommandList,
        device: &dyn GfxDevice,
        camera: &GpuCameraData,
        targets: &RenderPassTargets,
        canvas: vk::Extent2D,
    ) -> Result<()> {
        debug_assert!(targets.color.is_empty(), "depth pre-pass binds no color attachments");
        let key = PsoCacheKey::from_targets(device, targets, BlendMode::Opaque);
        let pipeline = self.cache.get_or_create(device, &key)?;

        cmd.begin_render_pass(targets);
        cmd.set_viewport(canvas.width as f32, canvas.height as f32);
        cmd.set_scissor(canvas);
        cmd.bind_graphics_pipeline(pipeline);
        cmd.bind_constant_buffer(geometry_slots::FRAME_CB, self.frame_constants);
        cmd.bind_dynamic_constant_buffer(geometry_slots::CAMERA_CB, bytemuck::bytes_of(camera));
        Ok(())
    }

    fn bind_push_constant(&self, cmd: &mut dyn GfxCommandList, push: &GeometryPushConstants) {
        cmd.bind_push_constant(geometry_slots::PUSH, bytemuck::bytes_of(push));
    }

    fn end_pass(&self, cmd: &mut dyn GfxCommandList) {
        cmd.end_render_pass();
    }
}
