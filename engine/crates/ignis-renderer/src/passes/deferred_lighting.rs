//! 延迟光照 Pass
//!
//! 从 G-Buffer 解算光照并写入 HDR 颜色缓冲。两条实现路径：
//! - 计算管线：以 16x16 tile dispatch，经 UAV 写入（默认）
//! - 图形管线：全屏三角形 + 像素着色器（不支持 storage image 的回退）
//!
//! 计算管线与渲染目标格式无关，初始化时创建一次即可；
//! 图形回退路径仍走管线缓存。

use anyhow::{Context, Result};
use ash::vk;
use ignis_gfx::device::{
    BlendMode, ColorAttachment, ComputePipelineDesc, CullMode, DepthStencilState, GfxBufferHandle, GfxCommandList,
    GfxDevice, GfxPipelineHandle, GfxTextureHandle, GraphicsPipelineDesc, LoadOp, RasterState, RenderPassTargets,
};
use ignis_gfx::shader::GfxShaderHandle;
use ignis_render_interface::render_data::{
    DEFERRED_BLOCK_SIZE_X, DEFERRED_BLOCK_SIZE_Y, DeferredLightingCsConstants, GpuCameraData,
};

use crate::pso_cache::{PipelineStateCache, PsoCacheKey};
use crate::targets::GBufferRenderTargets;

/// 光照着色器资源的槽位（计算路径）
mod cs_slots {
    pub const PUSH: u32 = 0;
    pub const FRAME_CB: u32 = 1;
    pub const CAMERA_CB: u32 = 2;
    pub const GBUFFER_SRV: u32 = 3;
    pub const OUTPUT_UAV: u32 = 4;
}

/// 光照着色器资源的槽位（图形回退路径，无 UAV）
mod gfx_slots {
    pub const FRAME_CB: u32 = 0;
    pub const CAMERA_CB: u32 = 1;
    pub const GBUFFER_SRV: u32 = 2;
}

pub struct DeferredLightingPass {
    /// `Some` 表示走计算路径
    compute_pipeline: Option<GfxPipelineHandle>,
    cache: PipelineStateCache,
    frame_constants: GfxBufferHandle,
}

// new & init
impl DeferredLightingPass {
    pub fn new(
        device: &dyn GfxDevice,
        compute_shader: GfxShaderHandle,
        fullscreen_vs: GfxShaderHandle,
        lighting_ps: GfxShaderHandle,
        frame_constants: GfxBufferHandle,
        use_compute: bool,
    ) -> Result<Self> {
        let compute_pipeline = if use_compute {
            let pipeline = device
                .create_compute_pipeline(&ComputePipelineDesc {
                    compute_shader: Some(compute_shader),
                    debug_name: "Deferred Lighting CS".to_string(),
                })
                .context("deferred lighting compute pipeline creation failed")
                .inspect_err(|e| log::error!("{e:#}"))?;
            Some(pipeline)
        } else {
            None
        };

        Ok(Self {
            compute_pipeline,
            cache: PipelineStateCache::new(GraphicsPipelineDesc {
                vertex_shader: Some(fullscreen_vs),
                pixel_shader: Some(lighting_ps),
                depth_stencil: DepthStencilState {
                    depth_test_enable: false,
                    depth_write_enable: false,
                    stencil_enable: false,
                },
                raster: RasterState { cull_mode: CullMode::None },
                debug_name: "Deferred Lighting".to_string(),
                ..Default::default()
            }),
            frame_constants,
        })
    }

    pub fn uses_compute(&self) -> bool {
        self.compute_pipeline.is_some()
    }
}

// render
impl DeferredLightingPass {
    pub fn render(
        &mut self,
        cmd: &mut dyn GfxCommandList,
        device: &dyn GfxDevice,
        camera: &GpuCameraData,
        gbuffer: &GBufferRenderTargets,
        color_target: GfxTextureHandle,
        canvas: vk::Extent2D,
    ) -> Result<()> {
        cmd.begin_marker("Deferred Lighting");
        let result = match self.compute_pipeline {
            Some(pipeline) => {
                self.dispatch_compute(cmd, pipeline, camera, gbuffer, color_target, canvas);
                Ok(())
            }
            None => self.draw_fullscreen(cmd, device, camera, gbuffer, color_target, canvas),
        };
        cmd.end_marker();
        result
    }

    fn dispatch_compute(
        &self,
        cmd: &mut dyn GfxCommandList,
        pipeline: GfxPipelineHandle,
        camera: &GpuCameraData,
        gbuffer: &GBufferRenderTargets,
        color_target: GfxTextureHandle,
        canvas: vk::Extent2D,
    ) {
        let group_x = canvas.width.div_ceil(DEFERRED_BLOCK_SIZE_X);
        let group_y = canvas.height.div_ceil(DEFERRED_BLOCK_SIZE_Y);

        cmd.bind_compute_pipeline(pipeline);
        cmd.bind_constant_buffer(cs_slots::FRAME_CB, self.frame_constants);
        cmd.bind_dynamic_constant_buffer(cs_slots::CAMERA_CB, bytemuck::bytes_of(camera));
        cmd.bind_dynamic_descriptor_table(cs_slots::GBUFFER_SRV, &gbuffer.shader_resources());
        cmd.bind_dynamic_uav_table(cs_slots::OUTPUT_UAV, &[color_target]);
        cmd.bind_push_constant(
            cs_slots::PUSH,
            bytemuck::bytes_of(&DeferredLightingCsConstants {
                dispatch_grid_dim: [group_x, group_y],
                max_tile_width: group_x,
                _pad: 0,
            }),
        );
        cmd.dispatch(group_x, group_y, 1);
    }

    fn draw_fullscreen(
        &mut self,
        cmd: &mut dyn GfxCommandList,
        device: &dyn GfxDevice,
        camera: &GpuCameraData,
        gbuffer: &GBufferRenderTargets,
        color_target: GfxTextureHandle,
        canvas: vk::Extent2D,
    ) -> Result<()> {
        let targets = RenderPassTargets {
            color: vec![ColorAttachment {
                texture: color_target,
                load_op: LoadOp::DontCare,
                clear: [0.0; 4],
            }],
            depth: None,
        };
        let key = PsoCacheKey::from_targets(device, &targets, BlendMode::Opaque);
        let pipeline = self.cache.get_or_create(device, &key)?;

        cmd.begin_render_pass(&targets);
        cmd.set_viewport(canvas.width as f32, canvas.height as f32);
        cmd.set_scissor(canvas);
        cmd.bind_graphics_pipeline(pipeline);
        cmd.bind_constant_buffer(gfx_slots::FRAME_CB, self.frame_constants);
        cmd.bind_dynamic_constant_buffer(gfx_slots::CAMERA_CB, bytemuck::bytes_of(camera));
        cmd.bind_dynamic_descriptor_table(gfx_slots::GBUFFER_SRV, &gbuffer.shader_resources());
        cmd.draw(3, 1, 0, 0);
        cmd.end_render_pass();
        Ok(())
    }
}

// invalidate & destroy
impl DeferredLightingPass {
    /// 图形回退路径的管线随尺寸失效；计算管线与格式无关，保留
    pub fn on_window_resize(&mut self, device: &dyn GfxDevice) {
        self.cache.on_window_resize(device);
    }

    pub fn destroy(&mut self, device: &dyn GfxDevice) {
        if let Some(pipeline) = self.compute_pipeline.take() {
            device.destroy_pipeline(pipeline);
        }
        self.cache.on_window_resize(device);
    }
}
