//! 渲染路径编排
//!
//! 每条渲染路径持有自己的全部尺寸相关资源与 Pass，负责：
//! - 两阶段初始化：先并行加载着色器，再并行创建管线（严格的先后依赖）
//! - 每帧的裁剪、排序、Pass 调度
//! - 所有资源状态转换都由路径在 Pass 边界成对发射，Pass 内部不发 barrier
//! - 窗口尺寸变化：空闲时立即重建，帧中到达则挂起到下一帧帧首
//!
//! 路径状态机：`Uninitialized -> Ready <-> Rendering`。
//! 未初始化时的 `render` / `window_resize` 是显式错误。

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use ash::vk;
use ignis_gfx::barrier::GpuBarrier;
use ignis_gfx::device::{
    BindingFlags, BufferDesc, ColorAttachment, DepthAttachment, GfxBufferHandle, GfxCommandList, GfxDevice,
    GfxTextureHandle, LoadOp, RenderPassTargets, TextureDesc,
};
use ignis_gfx::resource_state::{BufferState, ImageState};
use ignis_gfx::shader::{GfxShaderHandle, ShaderDesc, ShaderFactory, ShaderStage};
use ignis_render_interface::draw_queue::DrawQueue;
use ignis_render_interface::frame_counter::FrameCounter;
use ignis_render_interface::pipeline_settings::{DefaultRendererSettings, RenderPathSettings};
use ignis_render_interface::render_data::{GpuFrameConstants, RenderCamera};
use ignis_render_interface::scene::RenderScene;
use rayon::prelude::*;

use crate::geometry_pass::{GeometryPass, render_views};
use crate::passes::{DeferredLightingPass, DepthPrePass, ForwardOpaquePass, GBufferFillPass, ToneMappingPass};
use crate::pso_cache::PsoCacheKey;
use crate::targets::{GBufferRenderTargets, ShadowAtlas};

/// 渲染路径状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PathState {
    Uninitialized,
    Ready,
    Rendering,
}

/// 调试统计
#[derive(Clone, Copy, Debug, Default)]
pub struct RenderPathStats {
    pub frame_id: u64,
    /// 上一帧通过裁剪的绘制条目数
    pub draw_count: usize,
}

// ============ helpers ============

/// 并行加载一组着色器，顺序与输入一致
fn load_shaders(factory: &dyn ShaderFactory, specs: &[(&str, ShaderStage)]) -> Result<Vec<GfxShaderHandle>> {
    specs
        .par_iter()
        .map(|&(path, stage)| {
            factory
                .create_shader(path, &ShaderDesc::new(stage, path))
                .with_context(|| format!("shader load failed: {path}"))
        })
        .collect()
}

fn create_frame_constants(device: &dyn GfxDevice) -> Result<GfxBufferHandle> {
    device.create_buffer(&BufferDesc {
        size_in_bytes: std::mem::size_of::<GpuFrameConstants>() as u64,
        binding: BindingFlags::CONSTANT_BUFFER,
        initial_state: BufferState::CONSTANT_BUFFER,
        debug_name: "Frame Constants".to_string(),
    })
}

fn create_hdr_color(device: &dyn GfxDevice, extent: vk::Extent2D) -> Result<GfxTextureHandle> {
    device.create_texture(&TextureDesc {
        format: DefaultRendererSettings::HDR_COLOR_FORMAT,
        extent,
        binding: BindingFlags::RENDER_TARGET | BindingFlags::SHADER_RESOURCE | BindingFlags::UNORDERED_ACCESS,
        initial_state: ImageState::SHADER_RESOURCE,
        is_bindless: true,
        debug_name: "HDR Color".to_string(),
        ..Default::default()
    })
}

/// 重写帧常量 buffer：CONSTANT_BUFFER -> COPY_DEST -> CONSTANT_BUFFER
fn upload_frame_constants(cmd: &mut dyn GfxCommandList, buffer: GfxBufferHandle, scene: &dyn RenderScene) {
    let constants = GpuFrameConstants {
        brdf_lut_index: scene.brdf_lut_descriptor_index(),
        ..Default::default()
    };
    cmd.transition_barriers(&[GpuBarrier::buffer(buffer, BufferState::CONSTANT_BUFFER, BufferState::COPY_DEST)]);
    cmd.write_buffer(buffer, bytemuck::bytes_of(&constants));
    cmd.transition_barriers(&[GpuBarrier::buffer(buffer, BufferState::COPY_DEST, BufferState::CONSTANT_BUFFER)]);
}

/// 视锥内实例进入绘制队列（距离 = 相机到包围盒中心）
fn cull_scene(queue: &mut DrawQueue, scene: &dyn RenderScene, camera: &RenderCamera) {
    queue.reset();
    for instance in scene.mesh_instances() {
        let distance = camera.eye.distance(instance.bounds_center);
        queue.push(instance.mesh_id, instance.instance_id, distance);
    }
}

// ================================================================================
// Deferred3D
// ================================================================================

struct DeferredResources {
    frame_constants: GfxBufferHandle,
    gbuffer: GBufferRenderTargets,
    color: GfxTextureHandle,
    shadow_atlas: ShadowAtlas,

    gbuffer_fill: GBufferFillPass,
    lighting: DeferredLightingPass,
    tone_mapping: ToneMappingPass,
}

/// 延迟渲染路径
///
/// 帧序列：G-Buffer 填充 -> 延迟光照 -> tone mapping。
pub struct RenderPath3DDeferred {
    device: Arc<dyn GfxDevice>,
    settings: RenderPathSettings,

    state: PathState,
    res: Option<DeferredResources>,
    canvas: vk::Extent2D,
    pending_resize: Option<vk::Extent2D>,

    frame_counter: FrameCounter,
    /// 跨帧复用分配
    draw_queue: DrawQueue,
}

// new & init
impl RenderPath3DDeferred {
    const SHADERS: [(&'static str, ShaderStage); 6] = [
        ("shaders/gbuffer.vs.hlsl", ShaderStage::Vertex),
        ("shaders/gbuffer.ps.hlsl", ShaderStage::Pixel),
        ("shaders/fullscreen_quad.vs.hlsl", ShaderStage::Vertex),
        ("shaders/deferred_lighting.ps.hlsl", ShaderStage::Pixel),
        ("shaders/deferred_lighting.cs.hlsl", ShaderStage::Compute),
        ("shaders/tone_mapping.ps.hlsl", ShaderStage::Pixel),
    ];

    pub fn new(device: Arc<dyn GfxDevice>, settings: RenderPathSettings) -> Self {
        Self {
            device,
            settings,
            state: PathState::Uninitialized,
            res: None,
            canvas: vk::Extent2D::default(),
            pending_resize: None,
            frame_counter: FrameCounter::new(),
            draw_queue: DrawQueue::new(),
        }
    }

    /// 两阶段初始化：着色器全部就绪后才开始创建管线
    pub fn initialize(&mut self, shader_factory: &dyn ShaderFactory, canvas: vk::Extent2D) -> Result<()> {
        if self.state != PathState::Uninitialized {
            bail!("render path already initialized");
        }
        let device = &*self.device;

        // 阶段一：并行加载着色器
        let shaders = load_shaders(shader_factory, &Self::SHADERS)?;
        log::info!("Deferred3D: {} shaders loaded", shaders.len());

        // 阶段二：创建管线。计算管线与 G-Buffer 管线预热并行进行。
        let frame_constants = create_frame_constants(device)?;
        let mut gbuffer_fill = GBufferFillPass::new(shaders[0], shaders[1], frame_constants);
        let tone_mapping = ToneMappingPass::new(shaders[2], shaders[5]);

        let gbuffer_key = PsoCacheKey {
            rtv_formats: DefaultRendererSettings::GBUFFER_FORMATS.to_vec(),
            depth_format: Some(DefaultRendererSettings::DEPTH_FORMAT_CANDIDATES[0]),
            blend: Default::default(),
        };
        let use_compute = self.settings.enable_compute_deferred_lighting;
        let (lighting, prewarm) = rayon::join(
            || DeferredLightingPass::new(device, shaders[4], shaders[2], shaders[3], frame_constants, use_compute),
            || gbuffer_fill.prewarm(device, &gbuffer_key),
        );
        let lighting = lighting?;
        prewarm?;

        let gbuffer = GBufferRenderTargets::create(device, canvas)?;
        let color = create_hdr_color(device, canvas)?;
        let shadow_atlas = ShadowAtlas::create(device)?;

        self.res = Some(DeferredResources {
            frame_constants,
            gbuffer,
            color,
            shadow_atlas,
            gbuffer_fill,
            lighting,
            tone_mapping,
        });
        self.canvas = canvas;
        self.state = PathState::Ready;
        log::info!("Deferred3D: initialized at {}x{}", canvas.width, canvas.height);
        Ok(())
    }
}

// render
impl RenderPath3DDeferred {
    pub fn render(&mut self, scene: &dyn RenderScene, camera: &RenderCamera) -> Result<()> {
        match self.state {
            PathState::Uninitialized => bail!("render called before initialize"),
            PathState::Rendering => bail!("render is not reentrant"),
            PathState::Ready => {}
        }
        // 帧中挂起的 resize 在下一帧帧首生效
        if let Some(extent) = self.pending_resize.take() {
            self.recreate_size_dependent(extent)?;
        }
        self.state = PathState::Rendering;
        let result = self.record_frame(scene, camera);
        // 录制失败的帧被整体丢弃，路径回到 Ready，不推进帧计数
        self.state = PathState::Ready;
        if result.is_ok() {
            self.frame_counter.next_frame();
        }
        result
    }

    fn record_frame(&mut self, scene: &dyn RenderScene, camera: &RenderCamera) -> Result<()> {
        let tracy = tracy_client::Client::running();
        let _frame_span = tracy.clone().map(|c| c.span(tracy_client::span_location!("deferred frame"), 0));

        let device = &*self.device;
        let res = self.res.as_mut().context("render path resources missing")?;
        let canvas = self.canvas;

        let mut cmd = device.begin_command_list();
        cmd.begin_marker(&self.frame_counter.frame_name());

        upload_frame_constants(cmd.as_mut(), res.frame_constants, scene);

        {
            let _span = tracy.clone().map(|c| c.span(tracy_client::span_location!("cull"), 0));
            cull_scene(&mut self.draw_queue, scene, camera);
            self.draw_queue.sort_opaque();
        }

        // G-Buffer 填充：附件从常驻的 shader-resource 进入写状态
        let mut to_write = Vec::with_capacity(5);
        for &t in &res.gbuffer.attachments()[..4] {
            to_write.push(GpuBarrier::texture(t, ImageState::SHADER_RESOURCE, ImageState::RENDER_TARGET));
        }
        to_write.push(GpuBarrier::texture(res.gbuffer.depth, ImageState::SHADER_RESOURCE, ImageState::DEPTH_WRITE));
        cmd.transition_barriers(&to_write);

        {
            let _span = tracy.clone().map(|c| c.span(tracy_client::span_location!("gbuffer fill"), 0));
            let targets = res.gbuffer.render_pass_targets();
            res.gbuffer_fill.begin_pass(cmd.as_mut(), device, &camera.gpu, &targets, canvas)?;
            render_views(cmd.as_mut(), device, &res.gbuffer_fill, scene, &self.draw_queue, false);
            res.gbuffer_fill.end_pass(cmd.as_mut());
        }

        // 写状态退回读状态；计算光照时读取发生在 compute 阶段
        let gbuffer_read = if res.lighting.uses_compute() {
            ImageState::SHADER_RESOURCE_COMPUTE
        } else {
            ImageState::SHADER_RESOURCE
        };
        let color_write = if res.lighting.uses_compute() {
            ImageState::UNORDERED_ACCESS
        } else {
            ImageState::RENDER_TARGET
        };
        let mut to_read = Vec::with_capacity(6);
        for &t in &res.gbuffer.attachments()[..4] {
            to_read.push(GpuBarrier::texture(t, ImageState::RENDER_TARGET, gbuffer_read));
        }
        to_read.push(GpuBarrier::texture(res.gbuffer.depth, ImageState::DEPTH_WRITE, gbuffer_read));
        to_read.push(GpuBarrier::texture(res.color, ImageState::SHADER_RESOURCE, color_write));
        cmd.transition_barriers(&to_read);

        res.lighting.render(cmd.as_mut(), device, &camera.gpu, &res.gbuffer, res.color, canvas)?;

        // 光照结束：HDR 缓冲转为 tone mapping 的采样源，G-Buffer 回到常驻状态
        let mut after_lighting = vec![GpuBarrier::texture(res.color, color_write, ImageState::SHADER_RESOURCE)];
        if gbuffer_read != ImageState::SHADER_RESOURCE {
            for &t in &res.gbuffer.attachments() {
                after_lighting.push(GpuBarrier::texture(t, gbuffer_read, ImageState::SHADER_RESOURCE));
            }
        }
        cmd.transition_barriers(&after_lighting);

        let back_buffer = device.back_buffer();
        cmd.transition_barriers(&[GpuBarrier::texture(back_buffer, ImageState::PRESENT, ImageState::RENDER_TARGET)]);
        res.tone_mapping.render(cmd.as_mut(), device, res.color, back_buffer, canvas)?;
        cmd.transition_barriers(&[GpuBarrier::texture(back_buffer, ImageState::RENDER_TARGET, ImageState::PRESENT)]);

        cmd.end_marker();
        cmd.close();
        device.execute_command_lists(vec![cmd]);

        if let Some(c) = &tracy {
            c.frame_mark();
        }
        Ok(())
    }
}

// resize
impl RenderPath3DDeferred {
    pub fn window_resize(&mut self, extent: vk::Extent2D) -> Result<()> {
        match self.state {
            PathState::Uninitialized => bail!("window_resize called before initialize"),
            PathState::Rendering => {
                self.pending_resize = Some(extent);
                Ok(())
            }
            PathState::Ready => self.recreate_size_dependent(extent),
        }
    }

    fn recreate_size_dependent(&mut self, extent: vk::Extent2D) -> Result<()> {
        let device = &*self.device;
        let res = self.res.as_mut().context("render path resources missing")?;

        let old_gbuffer = std::mem::replace(&mut res.gbuffer, GBufferRenderTargets::create(device, extent)?);
        old_gbuffer.free(device);
        let old_color = std::mem::replace(&mut res.color, create_hdr_color(device, extent)?);
        device.destroy_texture(old_color);
        let old_atlas = std::mem::replace(&mut res.shadow_atlas, ShadowAtlas::create(device)?);
        old_atlas.free(device);

        // 所有管线缓存保守失效
        res.gbuffer_fill.on_window_resize(device);
        res.lighting.on_window_resize(device);
        res.tone_mapping.on_window_resize(device);

        self.canvas = extent;
        log::info!("Deferred3D: resized to {}x{}", extent.width, extent.height);
        Ok(())
    }
}

// getters & destroy
impl RenderPath3DDeferred {
    pub fn stats(&self) -> RenderPathStats {
        RenderPathStats {
            frame_id: self.frame_counter.frame_id(),
            draw_count: self.draw_queue.len(),
        }
    }

    pub fn destroy(&mut self) {
        let device = &*self.device;
        if let Some(mut res) = self.res.take() {
            res.gbuffer_fill.on_window_resize(device);
            res.lighting.destroy(device);
            res.tone_mapping.on_window_resize(device);
            res.gbuffer.free(device);
            device.destroy_texture(res.color);
            res.shadow_atlas.free(device);
            device.destroy_buffer(res.frame_constants);
        }
        self.state = PathState::Uninitialized;
    }
}

// ================================================================================
// Forward3D
// ================================================================================

struct ForwardResources {
    frame_constants: GfxBufferHandle,
    depth: GfxTextureHandle,
    color: GfxTextureHandle,
    shadow_atlas: ShadowAtlas,

    depth_prepass: DepthPrePass,
    opaque: ForwardOpaquePass,
    tone_mapping: ToneMappingPass,
}

/// 前向渲染路径
///
/// 帧序列：深度预 Pass -> forward 不透明 -> tone mapping。
pub struct RenderPath3DForward {
    device: Arc<dyn GfxDevice>,

    state: PathState,
    res: Option<ForwardResources>,
    canvas: vk::Extent2D,
    pending_resize: Option<vk::Extent2D>,

    frame_counter: FrameCounter,
    draw_queue: DrawQueue,
}

// new & init
impl RenderPath3DForward {
    const SHADERS: [(&'static str, ShaderStage); 5] = [
        ("shaders/depth_only.vs.hlsl", ShaderStage::Vertex),
        ("shaders/forward.vs.hlsl", ShaderStage::Vertex),
        ("shaders/forward.ps.hlsl", ShaderStage::Pixel),
        ("shaders/fullscreen_quad.vs.hlsl", ShaderStage::Vertex),
        ("shaders/tone_mapping.ps.hlsl", ShaderStage::Pixel),
    ];

    pub fn new(device: Arc<dyn GfxDevice>) -> Self {
        Self {
            device,
            state: PathState::Uninitialized,
            res: None,
            canvas: vk::Extent2D::default(),
            pending_resize: None,
            frame_counter: FrameCounter::new(),
            draw_queue: DrawQueue::new(),
        }
    }

    pub fn initialize(&mut self, shader_factory: &dyn ShaderFactory, canvas: vk::Extent2D) -> Result<()> {
        if self.state != PathState::Uninitialized {
            bail!("render path already initialized");
        }
        let device = &*self.device;

        let shaders = load_shaders(shader_factory, &Self::SHADERS)?;
        log::info!("Forward3D: {} shaders loaded", shaders.len());

        let frame_constants = create_frame_constants(device)?;
        let depth_prepass = DepthPrePass::new(shaders[0], frame_constants);
        let opaque = ForwardOpaquePass::new(shaders[1], shaders[2], frame_constants);
        let tone_mapping = ToneMappingPass::new(shaders[3], shaders[4]);

        let depth = Self::create_depth(device, canvas)?;
        let color = create_hdr_color(device, canvas)?;
        let shadow_atlas = ShadowAtlas::create(device)?;

        self.res = Some(ForwardResources {
            frame_constants,
            depth,
            color,
            shadow_atlas,
            depth_prepass,
            opaque,
            tone_mapping,
        });
        self.canvas = canvas;
        self.state = PathState::Ready;
        log::info!("Forward3D: initialized at {}x{}", canvas.width, canvas.height);
        Ok(())
    }

    fn create_depth(device: &dyn GfxDevice, extent: vk::Extent2D) -> Result<GfxTextureHandle> {
        device.create_texture(&TextureDesc {
            format: DefaultRendererSettings::DEPTH_FORMAT_CANDIDATES[0],
            extent,
            binding: BindingFlags::DEPTH_STENCIL | BindingFlags::SHADER_RESOURCE,
            initial_state: ImageState::SHADER_RESOURCE,
            is_bindless: true,
            debug_name: "Forward Depth".to_string(),
            ..Default::default()
        })
    }
}

// render
impl RenderPath3DForward {
    pub fn render(&mut self, scene: &dyn RenderScene, camera: &RenderCamera) -> Result<()> {
        match self.state {
            PathState::Uninitialized => bail!("render called before initialize"),
            PathState::Rendering => bail!("render is not reentrant"),
            PathState::Ready => {}
        }
        if let Some(extent) = self.pending_resize.take() {
            self.recreate_size_dependent(extent)?;
        }
        self.state = PathState::Rendering;
        let result = self.record_frame(scene, camera);
        // 录制失败的帧被整体丢弃，路径回到 Ready，不推进帧计数
        self.state = PathState::Ready;
        if result.is_ok() {
            self.frame_counter.next_frame();
        }
        result
    }

    fn record_frame(&mut self, scene: &dyn RenderScene, camera: &RenderCamera) -> Result<()> {
        let tracy = tracy_client::Client::running();
        let _frame_span = tracy.clone().map(|c| c.span(tracy_client::span_location!("forward frame"), 0));

        let device = &*self.device;
        let res = self.res.as_mut().context("render path resources missing")?;
        let canvas = self.canvas;

        let mut cmd = device.begin_command_list();
        cmd.begin_marker(&self.frame_counter.frame_name());

        upload_frame_constants(cmd.as_mut(), res.frame_constants, scene);

        cull_scene(&mut self.draw_queue, scene, camera);
        self.draw_queue.sort_opaque();

        // 深度预 Pass
        cmd.transition_barriers(&[GpuBarrier::texture(
            res.depth,
            ImageState::SHADER_RESOURCE,
            ImageState::DEPTH_WRITE,
        )]);
        let prepass_targets = RenderPassTargets {
            color: Vec::new(),
            depth: Some(DepthAttachment {
                texture: res.depth,
                load_op: LoadOp::Clear,
                clear_depth: 1.0,
                read_only: false,
            }),
        };
        res.depth_prepass.begin_pass(cmd.as_mut(), device, &camera.gpu, &prepass_targets, canvas)?;
        render_views(cmd.as_mut(), device, &res.depth_prepass, scene, &self.draw_queue, false);
        res.depth_prepass.end_pass(cmd.as_mut());

        // forward 不透明：深度转只读，颜色进入写状态
        cmd.transition_barriers(&[
            GpuBarrier::texture(res.depth, ImageState::DEPTH_WRITE, ImageState::DEPTH_READ),
            GpuBarrier::texture(res.color, ImageState::SHADER_RESOURCE, ImageState::RENDER_TARGET),
        ]);
        let opaque_targets = RenderPassTargets {
            color: vec![ColorAttachment {
                texture: res.color,
                load_op: LoadOp::Clear,
                clear: [0.0, 0.0, 0.0, 1.0],
            }],
            depth: Some(DepthAttachment {
                texture: res.depth,
                load_op: LoadOp::Load,
                clear_depth: 1.0,
                read_only: true,
            }),
        };
        res.opaque.begin_pass(cmd.as_mut(), device, &camera.gpu, &opaque_targets, canvas)?;
        render_views(cmd.as_mut(), device, &res.opaque, scene, &self.draw_queue, false);
        res.opaque.end_pass(cmd.as_mut());

        cmd.transition_barriers(&[
            GpuBarrier::texture(res.color, ImageState::RENDER_TARGET, ImageState::SHADER_RESOURCE),
            GpuBarrier::texture(res.depth, ImageState::DEPTH_READ, ImageState::SHADER_RESOURCE),
        ]);

        let back_buffer = device.back_buffer();
        cmd.transition_barriers(&[GpuBarrier::texture(back_buffer, ImageState::PRESENT, ImageState::RENDER_TARGET)]);
        res.tone_mapping.render(cmd.as_mut(), device, res.color, back_buffer, canvas)?;
        cmd.transition_barriers(&[GpuBarrier::texture(back_buffer, ImageState::RENDER_TARGET, ImageState::PRESENT)]);

        cmd.end_marker();
        cmd.close();
        device.execute_command_lists(vec![cmd]);

        if let Some(c) = &tracy {
            c.frame_mark();
        }
        Ok(())
    }
}

// resize
impl RenderPath3DForward {
    pub fn window_resize(&mut self, extent: vk::Extent2D) -> Result<()> {
        match self.state {
            PathState::Uninitialized => bail!("window_resize called before initialize"),
            PathState::Rendering => {
                self.pending_resize = Some(extent);
                Ok(())
            }
            PathState::Ready => self.recreate_size_dependent(extent),
        }
    }

    fn recreate_size_dependent(&mut self, extent: vk::Extent2D) -> Result<()> {
        let device = &*self.device;
        let res = self.res.as_mut().context("render path resources missing")?;

        let old_depth = std::mem::replace(&mut res.depth, Self::create_depth(device, extent)?);
        device.destroy_texture(old_depth);
        let old_color = std::mem::replace(&mut res.color, create_hdr_color(device, extent)?);
        device.destroy_texture(old_color);
        let old_atlas = std::mem::replace(&mut res.shadow_atlas, ShadowAtlas::create(device)?);
        old_atlas.free(device);

        res.depth_prepass.on_window_resize(device);
        res.opaque.on_window_resize(device);
        res.tone_mapping.on_window_resize(device);

        self.canvas = extent;
        log::info!("Forward3D: resized to {}x{}", extent.width, extent.height);
        Ok(())
    }
}

// getters & destroy
impl RenderPath3DForward {
    pub fn stats(&self) -> RenderPathStats {
        RenderPathStats {
            frame_id: self.frame_counter.frame_id(),
            draw_count: self.draw_queue.len(),
        }
    }

    pub fn destroy(&mut self) {
        let device = &*self.device;
        if let Some(mut res) = self.res.take() {
            res.depth_prepass.on_window_resize(device);
            res.opaque.on_window_resize(device);
            res.tone_mapping.on_window_resize(device);
            device.destroy_texture(res.depth);
            device.destroy_texture(res.color);
            res.shadow_atlas.free(device);
            device.destroy_buffer(res.frame_constants);
        }
        self.state = PathState::Uninitialized;
    }
}
