//! G-Buffer 填充 Pass
//!
//! 把不透明几何的材质属性写入四张 G-Buffer 附件和深度。
//! 实际的队列遍历在 [`crate::geometry_pass::render_views`]，
//! 本 Pass 只负责管线解析与资源绑定。

use anyhow::Result;
use ash::vk;
use ignis_gfx::device::{BlendMode, GfxBufferHandle, GfxCommandList, GfxDevice, GraphicsPipelineDesc, RenderPassTargets};
use ignis_gfx::shader::GfxShaderHandle;
use ignis_render_interface::render_data::{GeometryPushConstants, GpuCameraData};

use super::geometry_slots;
use crate::geometry_pass::GeometryPass;
use crate::pso_cache::{PipelineStateCache, PsoCacheKey};

pub struct GBufferFillPass {
    cache: PipelineStateCache,
    frame_constants: GfxBufferHandle,
}

impl GBufferFillPass {
    pub fn new(
        vertex_shader: GfxShaderHandle,
        pixel_shader: GfxShaderHandle,
        frame_constants: GfxBufferHandle,
    ) -> Self {
        Self {
            cache: PipelineStateCache::new(GraphicsPipelineDesc {
                vertex_shader: Some(vertex_shader),
                pixel_shader: Some(pixel_shader),
                debug_name: "GBuffer Fill".to_string(),
                ..Default::default()
            }),
            frame_constants,
        }
    }

    pub fn on_window_resize(&mut self, device: &dyn GfxDevice) {
        self.cache.on_window_resize(device);
    }

    /// 初始化阶段按已知的格式组合预热管线
    pub fn prewarm(&mut self, device: &dyn GfxDevice, key: &PsoCacheKey) -> Result<()> {
        self.cache.get_or_create(device, key).map(|_| ())
    }
}

impl GeometryPass for GBufferFillPass {
    fn begin_pass(
        &mut self,
        cmd: &mut dyn GfxCommandList,
        device: &dyn GfxDevice,
        camera: &GpuCameraData,
        targets: &RenderPassTargets,
        canvas: vk::Extent2D,
    ) -> Result<()> {
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
