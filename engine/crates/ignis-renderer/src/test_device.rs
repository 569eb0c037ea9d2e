//! 测试用 mock 设备
//!
//! 将命令录制为 [`Cmd`] 序列，供测试断言绘制次序与 barrier 配对；
//! 资源创建只分配 slotmap 句柄并计数，不触碰任何原生 API。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use ash::vk;
use ignis_gfx::barrier::GpuBarrier;
use ignis_gfx::descriptor::{DescriptorHeapAllocation, DescriptorIndex};
use ignis_gfx::device::{
    BufferDesc, ComputePipelineDesc, GfxBufferHandle, GfxCommandList, GfxDevice, GfxPipelineHandle, GfxTextureHandle,
    GpuAllocation, GraphicsPipelineDesc, RenderPassTargets, TextureDesc,
};
use ignis_gfx::shader::{GfxShaderHandle, ShaderDesc, ShaderFactory};
use ignis_render_interface::scene::{MeshInstance, MeshRecord, RenderScene};
use slotmap::SlotMap;

/// 录制下来的一条命令
#[derive(Clone, Debug)]
pub enum Cmd {
    BeginMarker(String),
    EndMarker,
    BeginRenderPass { color_count: usize, has_depth: bool },
    EndRenderPass,
    SetViewport { width: f32, height: f32 },
    SetScissor { extent: vk::Extent2D },
    BindGraphicsPipeline(GfxPipelineHandle),
    BindComputePipeline(GfxPipelineHandle),
    BindConstantBuffer { slot: u32 },
    BindDynamicConstantBuffer { slot: u32, size: usize },
    BindDescriptorTable { slot: u32, count: usize },
    BindUavTable { slot: u32, count: usize },
    BindPushConstant { slot: u32, size: usize },
    BindIndexBuffer(GfxBufferHandle),
    WriteBuffer { buffer: GfxBufferHandle, size: usize },
    Draw { vertex_count: u32, instance_count: u32 },
    DrawIndexed { index_count: u32, instance_count: u32, first_index: u32 },
    Dispatch { group_x: u32, group_y: u32, group_z: u32 },
    Barrier(GpuBarrier),
    Close,
}

struct DeviceState {
    textures: SlotMap<GfxTextureHandle, TextureDesc>,
    buffers: SlotMap<GfxBufferHandle, BufferDesc>,
    pipelines: SlotMap<GfxPipelineHandle, ()>,
    buffer_indices: HashMap<GfxBufferHandle, DescriptorIndex>,
    next_buffer_index: DescriptorIndex,
    graphics_pipeline_compiles: usize,
    compute_pipeline_compiles: usize,
    executed_lists: usize,
    fail_next_graphics_pipeline: bool,
}

/// 录制型 mock 设备
pub struct MockDevice {
    state: Mutex<DeviceState>,
    log: Arc<Mutex<Vec<Cmd>>>,
    back_buffer: GfxTextureHandle,
    upload_ring: GfxBufferHandle,
}

// new & init
impl MockDevice {
    pub fn new() -> Self {
        let mut state = DeviceState {
            textures: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            pipelines: SlotMap::with_key(),
            buffer_indices: HashMap::new(),
            next_buffer_index: 0,
            graphics_pipeline_compiles: 0,
            compute_pipeline_compiles: 0,
            executed_lists: 0,
            fail_next_graphics_pipeline: false,
        };
        let back_buffer = state.textures.insert(TextureDesc {
            format: vk::Format::B8G8R8A8_UNORM,
            extent: vk::Extent2D { width: 1280, height: 720 },
            debug_name: "Back Buffer".to_string(),
            ..Default::default()
        });
        let upload_ring = state.buffers.insert(BufferDesc {
            size_in_bytes: 1 << 20,
            debug_name: "Upload Ring".to_string(),
            ..Default::default()
        });
        Self {
            state: Mutex::new(state),
            log: Arc::new(Mutex::new(Vec::new())),
            back_buffer,
            upload_ring,
        }
    }
}

// 测试断言入口
impl MockDevice {
    pub fn graphics_pipeline_compiles(&self) -> usize {
        self.state.lock().unwrap().graphics_pipeline_compiles
    }

    pub fn compute_pipeline_compiles(&self) -> usize {
        self.state.lock().unwrap().compute_pipeline_compiles
    }

    /// 存活纹理数（back buffer 计入）
    pub fn live_textures(&self) -> usize {
        self.state.lock().unwrap().textures.len()
    }

    pub fn executed_lists(&self) -> usize {
        self.state.lock().unwrap().executed_lists
    }

    /// 取出并清空命令记录；接收命令列表以保证录制已结束
    pub fn drain_command_log(&self, cmd: Box<dyn GfxCommandList>) -> Vec<Cmd> {
        drop(cmd);
        std::mem::take(&mut *self.log.lock().unwrap())
    }

    /// 不消费命令列表的版本，用于 `execute_command_lists` 之后
    pub fn take_command_log(&self) -> Vec<Cmd> {
        std::mem::take(&mut *self.log.lock().unwrap())
    }

    /// 让下一次图形管线创建失败一次，模拟着色器/管线编译错误
    pub fn fail_next_graphics_pipeline(&self) {
        self.state.lock().unwrap().fail_next_graphics_pipeline = true;
    }
}

impl GfxDevice for MockDevice {
    fn create_texture(&self, desc: &TextureDesc) -> Result<GfxTextureHandle> {
        Ok(self.state.lock().unwrap().textures.insert(desc.clone()))
    }

    fn destroy_texture(&self, texture: GfxTextureHandle) {
        let removed = self.state.lock().unwrap().textures.remove(texture);
        assert!(removed.is_some(), "double destroy of texture {texture:?}");
    }

    fn texture_desc(&self, texture: GfxTextureHandle) -> TextureDesc {
        self.state.lock().unwrap().textures[texture].clone()
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<GfxBufferHandle> {
        Ok(self.state.lock().unwrap().buffers.insert(desc.clone()))
    }

    fn destroy_buffer(&self, buffer: GfxBufferHandle) {
        let removed = self.state.lock().unwrap().buffers.remove(buffer);
        assert!(removed.is_some(), "double destroy of buffer {buffer:?}");
    }

    fn create_graphics_pipeline(&self, _desc: &GraphicsPipelineDesc) -> Result<GfxPipelineHandle> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next_graphics_pipeline) {
            anyhow::bail!("graphics pipeline compilation failed");
        }
        state.graphics_pipeline_compiles += 1;
        Ok(state.pipelines.insert(()))
    }

    fn create_compute_pipeline(&self, _desc: &ComputePipelineDesc) -> Result<GfxPipelineHandle> {
        let mut state = self.state.lock().unwrap();
        state.compute_pipeline_compiles += 1;
        Ok(state.pipelines.insert(()))
    }

    fn destroy_pipeline(&self, pipeline: GfxPipelineHandle) {
        let removed = self.state.lock().unwrap().pipelines.remove(pipeline);
        assert!(removed.is_some(), "double destroy of pipeline {pipeline:?}");
    }

    fn allocate_descriptor_heap(&self, capacity: u32) -> Result<DescriptorHeapAllocation> {
        Ok(DescriptorHeapAllocation {
            cpu_base: 0x1000,
            gpu_base: 0x8000_0000,
            stride: 32,
            capacity,
        })
    }

    fn buffer_descriptor_index(&self, buffer: GfxBufferHandle) -> DescriptorIndex {
        let mut state = self.state.lock().unwrap();
        if let Some(&index) = state.buffer_indices.get(&buffer) {
            return index;
        }
        let index = state.next_buffer_index;
        state.next_buffer_index += 1;
        state.buffer_indices.insert(buffer, index);
        index
    }

    fn begin_command_list(&self) -> Box<dyn GfxCommandList> {
        Box::new(MockCommandList {
            log: Arc::clone(&self.log),
            upload_ring: self.upload_ring,
            upload_cursor: 0,
        })
    }

    fn execute_command_lists(&self, cmds: Vec<Box<dyn GfxCommandList>>) {
        self.state.lock().unwrap().executed_lists += cmds.len();
    }

    fn back_buffer(&self) -> GfxTextureHandle {
        self.back_buffer
    }
}

/// 录制型命令列表，所有调用追加到设备共享的日志
pub struct MockCommandList {
    log: Arc<Mutex<Vec<Cmd>>>,
    upload_ring: GfxBufferHandle,
    upload_cursor: u64,
}

impl MockCommandList {
    fn record(&self, cmd: Cmd) {
        self.log.lock().unwrap().push(cmd);
    }
}

impl GfxCommandList for MockCommandList {
    fn begin_marker(&mut self, name: &str) {
        self.record(Cmd::BeginMarker(name.to_string()));
    }

    fn end_marker(&mut self) {
        self.record(Cmd::EndMarker);
    }

    fn begin_render_pass(&mut self, targets: &RenderPassTargets) {
        self.record(Cmd::BeginRenderPass {
            color_count: targets.color.len(),
            has_depth: targets.depth.is_some(),
        });
    }

    fn end_render_pass(&mut self) {
        self.record(Cmd::EndRenderPass);
    }

    fn set_viewport(&mut self, width: f32, height: f32) {
        self.record(Cmd::SetViewport { width, height });
    }

    fn set_scissor(&mut self, extent: vk::Extent2D) {
        self.record(Cmd::SetScissor { extent });
    }

    fn bind_graphics_pipeline(&mut self, pipeline: GfxPipelineHandle) {
        self.record(Cmd::BindGraphicsPipeline(pipeline));
    }

    fn bind_compute_pipeline(&mut self, pipeline: GfxPipelineHandle) {
        self.record(Cmd::BindComputePipeline(pipeline));
    }

    fn bind_constant_buffer(&mut self, slot: u32, _buffer: GfxBufferHandle) {
        self.record(Cmd::BindConstantBuffer { slot });
    }

    fn bind_dynamic_constant_buffer(&mut self, slot: u32, data: &[u8]) {
        self.record(Cmd::BindDynamicConstantBuffer { slot, size: data.len() });
    }

    fn bind_dynamic_descriptor_table(&mut self, slot: u32, textures: &[GfxTextureHandle]) {
        self.record(Cmd::BindDescriptorTable {
            slot,
            count: textures.len(),
        });
    }

    fn bind_dynamic_uav_table(&mut self, slot: u32, textures: &[GfxTextureHandle]) {
        self.record(Cmd::BindUavTable {
            slot,
            count: textures.len(),
        });
    }

    fn bind_push_constant(&mut self, slot: u32, data: &[u8]) {
        self.record(Cmd::BindPushConstant { slot, size: data.len() });
    }

    fn bind_index_buffer(&mut self, buffer: GfxBufferHandle) {
        self.record(Cmd::BindIndexBuffer(buffer));
    }

    fn allocate_upload(&mut self, size_in_bytes: u64, alignment: u64) -> GpuAllocation {
        let offset = self.upload_cursor.next_multiple_of(alignment.max(1));
        self.upload_cursor = offset + size_in_bytes;
        GpuAllocation {
            buffer: self.upload_ring,
            offset,
            size: size_in_bytes,
        }
    }

    fn write_upload(&mut self, allocation: &GpuAllocation, offset: u64, data: &[u8]) {
        assert!(offset + data.len() as u64 <= allocation.size, "upload write out of bounds");
    }

    fn write_buffer(&mut self, buffer: GfxBufferHandle, data: &[u8]) {
        self.record(Cmd::WriteBuffer {
            buffer,
            size: data.len(),
        });
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, _first_vertex: u32, _first_instance: u32) {
        self.record(Cmd::Draw {
            vertex_count,
            instance_count,
        });
    }

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32, first_index: u32) {
        self.record(Cmd::DrawIndexed {
            index_count,
            instance_count,
            first_index,
        });
    }

    fn dispatch(&mut self, group_x: u32, group_y: u32, group_z: u32) {
        self.record(Cmd::Dispatch { group_x, group_y, group_z });
    }

    fn transition_barriers(&mut self, barriers: &[GpuBarrier]) {
        for barrier in barriers {
            self.record(Cmd::Barrier(*barrier));
        }
    }

    fn close(&mut self) {
        self.record(Cmd::Close);
    }
}

/// 线程安全的 mock 着色器工厂
#[derive(Default)]
pub struct MockShaderFactory {
    shaders: Mutex<SlotMap<GfxShaderHandle, String>>,
}

impl MockShaderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loaded_shaders(&self) -> usize {
        self.shaders.lock().unwrap().len()
    }
}

impl ShaderFactory for MockShaderFactory {
    fn create_shader(&self, path: &str, _desc: &ShaderDesc) -> Result<GfxShaderHandle> {
        Ok(self.shaders.lock().unwrap().insert(path.to_string()))
    }
}

/// 固定布局的测试场景
///
/// `meshes` 为 `(mesh_id, 实例数)`；instance id 跨 mesh 连续编号，
/// 包围盒中心沿 +X 按加入顺序递增，保证距离排序可预测。
pub struct TestScene {
    instances: Vec<MeshInstance>,
    meshes: HashMap<u32, MeshRecord>,
    index_buffer: GfxBufferHandle,
}

impl TestScene {
    pub fn new(device: &MockDevice, meshes: &[(u32, u32)]) -> Self {
        let mut pairs = Vec::new();
        let mut next_instance = 0u32;
        for &(mesh_id, count) in meshes {
            for _ in 0..count {
                pairs.push((mesh_id, next_instance));
                next_instance += 1;
            }
        }
        Self::with_instances(device, &pairs)
    }

    /// 逐实例指定 `(mesh_id, instance_id)`；实例 id 可以任意稀疏
    pub fn with_instances(device: &MockDevice, pairs: &[(u32, u32)]) -> Self {
        let index_buffer = device
            .create_buffer(&BufferDesc {
                size_in_bytes: 1 << 16,
                debug_name: "Global Index Buffer".to_string(),
                ..Default::default()
            })
            .unwrap();

        let mut records = HashMap::new();
        let mut instances = Vec::new();
        for (slot, &(mesh_id, instance_id)) in pairs.iter().enumerate() {
            records.insert(
                mesh_id,
                MeshRecord {
                    total_indices: 36,
                    global_index_offset: mesh_id * 36,
                    geometry_index: mesh_id,
                    material_index: mesh_id,
                },
            );
            instances.push(MeshInstance {
                mesh_id,
                instance_id,
                world: glam::Mat4::IDENTITY,
                bounds_center: glam::Vec3::new(1.0 + slot as f32, 0.0, 0.0),
                global_buffer_index: slot as u32,
            });
        }

        Self {
            instances,
            meshes: records,
            index_buffer,
        }
    }
}

impl RenderScene for TestScene {
    fn mesh_instances(&self) -> &[MeshInstance] {
        &self.instances
    }

    fn mesh(&self, mesh_id: u32) -> &MeshRecord {
        &self.meshes[&mesh_id]
    }

    fn instance(&self, instance_id: u32) -> &MeshInstance {
        self.instances
            .iter()
            .find(|i| i.instance_id == instance_id)
            .expect("unknown instance id")
    }

    fn global_index_buffer(&self) -> GfxBufferHandle {
        self.index_buffer
    }
}
