//! Tone mapping Pass
//!
//! 把 HDR 颜色缓冲映射到呈现目标。渲染目标格式取自实际的
//! back buffer，不做任何假设（swapchain 格式因平台而异）。

use anyhow::Result;
use ash::vk;
use ignis_gfx::device::{
    BlendMode, ColorAttachment, CullMode, DepthStencilState, GfxCommandList, GfxDevice, GfxTextureHandle,
    GraphicsPipelineDesc, LoadOp, PrimitiveType, RasterState, RenderPassTargets,
};
use ignis_gfx::shader::GfxShaderHandle;

use crate::pso_cache::{PipelineStateCache, PsoCacheKey};

mod slots {
    pub const PUSH: u32 = 0;
    /// HDR 源纹理
    pub const SOURCE_SRV: u32 = 1;
}

pub struct ToneMappingPass {
    cache: PipelineStateCache,
    exposure: f32,
}

impl ToneMappingPass {
    pub fn new(vertex_shader: GfxShaderHandle, pixel_shader: GfxShaderHandle) -> Self {
        Self {
            cache: PipelineStateCache::new(GraphicsPipelineDesc {
                prim_type: PrimitiveType::TriangleStrip,
                vertex_shader: Some(vertex_shader),
                pixel_shader: Some(pixel_shader),
                depth_stencil: DepthStencilState {
                    depth_test_enable: false,
                    depth_write_enable: false,
                    stencil_enable: false,
                },
                raster: RasterState { cull_mode: CullMode::None },
                debug_name: "Tone Mapping".to_string(),
                ..Default::default()
            }),
            exposure: 1.0,
        }
    }

    pub fn render(
        &mut self,
        cmd: &mut dyn GfxCommandList,
        device: &dyn GfxDevice,
        source: GfxTextureHandle,
        target: GfxTextureHandle,
        canvas: vk::Extent2D,
    ) -> Result<()> {
        let targets = RenderPassTargets {
            color: vec![ColorAttachment {
                texture: target,
                load_op: LoadOp::DontCare,
                clear: [0.0; 4],
            }],
            depth: None,
        };
        let key = PsoCacheKey::from_targets(device, &targets, BlendMode::Opaque);
        let pipeline = self.cache.get_or_create(device, &key)?;

        cmd.begin_marker("Tone Mapping");
        cmd.begin_render_pass(&targets);
        cmd.set_viewport(canvas.width as f32, canvas.height as f32);
        cmd.set_scissor(canvas);
        cmd.bind_graphics_pipeline(pipeline);
        cmd.bind_dynamic_descriptor_table(slots::SOURCE_SRV, &[source]);
        cmd.bind_push_constant(slots::PUSH, bytemuck::bytes_of(&self.exposure));
        cmd.draw(3, 1, 0, 0);
        cmd.end_render_pass();
        cmd.end_marker();
        Ok(())
    }

    pub fn on_window_resize(&mut self, device: &dyn GfxDevice) {
        self.cache.on_window_resize(device);
    }
}
