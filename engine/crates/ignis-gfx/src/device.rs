//! 设备与命令列表抽象
//!
//! 渲染管线只通过这里的 trait 与原生 GPU API 交互：
//! 资源创建、命令录制、barrier 提交、呈现目标查询。
//! 具体后端（以及测试中的 mock 设备）各自实现这两个 trait。

use anyhow::Result;
use ash::vk;
use bitflags::bitflags;

use crate::barrier::GpuBarrier;
use crate::descriptor::{DescriptorHeapAllocation, DescriptorIndex};
use crate::shader::GfxShaderHandle;

slotmap::new_key_type! {
    /// 设备持有的纹理
    pub struct GfxTextureHandle;
    /// 设备持有的缓冲区
    pub struct GfxBufferHandle;
    /// 编译完成的图形/计算管线
    pub struct GfxPipelineHandle;
}

bitflags! {
    /// 纹理的绑定用途
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct BindingFlags: u32 {
        const SHADER_RESOURCE  = 1 << 0;
        const RENDER_TARGET    = 1 << 1;
        const DEPTH_STENCIL    = 1 << 2;
        const UNORDERED_ACCESS = 1 << 3;
        const CONSTANT_BUFFER  = 1 << 4;
        const INDEX_BUFFER     = 1 << 5;
    }
}

/// 纹理描述
#[derive(Clone, Debug)]
pub struct TextureDesc {
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub array_layers: u32,
    pub binding: BindingFlags,
    pub initial_state: crate::resource_state::ImageState,
    /// 是否注册进 bindless 描述符表
    pub is_bindless: bool,
    pub optimized_clear: [f32; 4],
    pub debug_name: String,
}

impl Default for TextureDesc {
    fn default() -> Self {
        Self {
            format: vk::Format::UNDEFINED,
            extent: vk::Extent2D { width: 1, height: 1 },
            array_layers: 1,
            binding: BindingFlags::SHADER_RESOURCE,
            initial_state: crate::resource_state::ImageState::SHADER_RESOURCE,
            is_bindless: false,
            optimized_clear: [0.0, 0.0, 0.0, 1.0],
            debug_name: String::new(),
        }
    }
}

/// 缓冲区描述
#[derive(Clone, Debug)]
pub struct BufferDesc {
    pub size_in_bytes: u64,
    pub binding: BindingFlags,
    pub initial_state: crate::resource_state::BufferState,
    pub debug_name: String,
}

impl Default for BufferDesc {
    fn default() -> Self {
        Self {
            size_in_bytes: 0,
            binding: BindingFlags::CONSTANT_BUFFER,
            initial_state: crate::resource_state::BufferState::CONSTANT_BUFFER,
            debug_name: String::new(),
        }
    }
}

/// 图元类型
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    #[default]
    TriangleList,
    TriangleStrip,
}

/// 背面剔除模式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CullMode {
    #[default]
    Back,
    Front,
    None,
}

/// 混合模式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    #[default]
    Opaque,
    AlphaBlend,
}

/// 深度/模板状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub stencil_enable: bool,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test_enable: true,
            depth_write_enable: true,
            stencil_enable: false,
        }
    }
}

/// 光栅化状态
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RasterState {
    pub cull_mode: CullMode,
}

/// 图形管线描述
///
/// rtv_formats/depth_format 必须与实际绑定的渲染目标匹配，
/// 这也是管线缓存的 key 来源。
#[derive(Clone, Debug, Default)]
pub struct GraphicsPipelineDesc {
    pub prim_type: PrimitiveType,
    pub vertex_shader: Option<GfxShaderHandle>,
    pub pixel_shader: Option<GfxShaderHandle>,
    pub depth_stencil: DepthStencilState,
    pub raster: RasterState,
    pub blend: BlendMode,
    pub rtv_formats: Vec<vk::Format>,
    pub depth_format: Option<vk::Format>,
    pub debug_name: String,
}

/// 计算管线描述
#[derive(Clone, Debug, Default)]
pub struct ComputePipelineDesc {
    pub compute_shader: Option<GfxShaderHandle>,
    pub debug_name: String,
}

/// 附件加载行为
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadOp {
    #[default]
    Clear,
    Load,
    DontCare,
}

/// 颜色附件
#[derive(Clone, Copy, Debug)]
pub struct ColorAttachment {
    pub texture: GfxTextureHandle,
    pub load_op: LoadOp,
    pub clear: [f32; 4],
}

/// 深度附件
#[derive(Clone, Copy, Debug)]
pub struct DepthAttachment {
    pub texture: GfxTextureHandle,
    pub load_op: LoadOp,
    pub clear_depth: f32,
    pub read_only: bool,
}

/// 一次渲染 Pass 绑定的目标集合
#[derive(Clone, Debug, Default)]
pub struct RenderPassTargets {
    pub color: Vec<ColorAttachment>,
    pub depth: Option<DepthAttachment>,
}

/// 命令列表内的瞬态 GPU 分配（per-frame upload ring）
#[derive(Clone, Copy, Debug)]
pub struct GpuAllocation {
    pub buffer: GfxBufferHandle,
    pub offset: u64,
    pub size: u64,
}

/// GPU 设备边界
///
/// 由具体后端实现。所有方法可从任意线程调用；
/// 管线创建在初始化阶段会被并行调用。
pub trait GfxDevice: Send + Sync {
    // ============ 资源创建/销毁 ============

    fn create_texture(&self, desc: &TextureDesc) -> Result<GfxTextureHandle>;
    fn destroy_texture(&self, texture: GfxTextureHandle);
    /// 查询纹理描述。句柄无效是编程错误。
    fn texture_desc(&self, texture: GfxTextureHandle) -> TextureDesc;

    fn create_buffer(&self, desc: &BufferDesc) -> Result<GfxBufferHandle>;
    fn destroy_buffer(&self, buffer: GfxBufferHandle);

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<GfxPipelineHandle>;
    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<GfxPipelineHandle>;
    fn destroy_pipeline(&self, pipeline: GfxPipelineHandle);

    // ============ 描述符 ============

    /// 从设备的 shader-visible 描述符堆中划出一段连续分配
    fn allocate_descriptor_heap(&self, capacity: u32) -> Result<DescriptorHeapAllocation>;

    /// 查询缓冲区 SRV 在 bindless 表中的索引
    fn buffer_descriptor_index(&self, buffer: GfxBufferHandle) -> DescriptorIndex;

    // ============ 命令提交 ============

    fn begin_command_list(&self) -> Box<dyn GfxCommandList>;
    fn execute_command_lists(&self, cmds: Vec<Box<dyn GfxCommandList>>);

    // ============ 呈现目标 ============

    fn back_buffer(&self) -> GfxTextureHandle;
}

/// 命令列表边界
///
/// 录制是单线程的；帧间回压（fence 等待）由后端在
/// `execute_command_lists` / present 内部处理。
pub trait GfxCommandList {
    // ============ 调试标记 ============

    fn begin_marker(&mut self, name: &str);
    fn end_marker(&mut self);

    // ============ Pass 与状态 ============

    fn begin_render_pass(&mut self, targets: &RenderPassTargets);
    fn end_render_pass(&mut self);

    fn set_viewport(&mut self, width: f32, height: f32);
    fn set_scissor(&mut self, extent: vk::Extent2D);

    fn bind_graphics_pipeline(&mut self, pipeline: GfxPipelineHandle);
    fn bind_compute_pipeline(&mut self, pipeline: GfxPipelineHandle);

    // ============ 资源绑定 ============

    fn bind_constant_buffer(&mut self, slot: u32, buffer: GfxBufferHandle);
    /// 将数据写入 upload ring 并绑定为 constant buffer
    fn bind_dynamic_constant_buffer(&mut self, slot: u32, data: &[u8]);
    fn bind_dynamic_descriptor_table(&mut self, slot: u32, textures: &[GfxTextureHandle]);
    fn bind_dynamic_uav_table(&mut self, slot: u32, textures: &[GfxTextureHandle]);
    fn bind_push_constant(&mut self, slot: u32, data: &[u8]);
    fn bind_index_buffer(&mut self, buffer: GfxBufferHandle);

    // ============ 数据上传 ============

    /// 从 per-frame upload ring 分配一段 CPU 可写内存
    fn allocate_upload(&mut self, size_in_bytes: u64, alignment: u64) -> GpuAllocation;
    /// 向 upload 分配写入数据
    fn write_upload(&mut self, allocation: &GpuAllocation, offset: u64, data: &[u8]);
    /// 向设备缓冲区写入数据（要求目标处于 COPY_DEST 状态）
    fn write_buffer(&mut self, buffer: GfxBufferHandle, data: &[u8]);

    // ============ 绘制与调度 ============

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);
    fn draw_indexed(&mut self, index_count: u32, instance_count: u32, first_index: u32);
    fn dispatch(&mut self, group_x: u32, group_y: u32, group_z: u32);

    // ============ 同步 ============

    fn transition_barriers(&mut self, barriers: &[GpuBarrier]);

    // ============ 结束 ============

    fn close(&mut self);
}
