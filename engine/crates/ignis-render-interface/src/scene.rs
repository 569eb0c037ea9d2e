//! 场景边界
//!
//! 实体组件存储本身不属于渲染核心；渲染路径只要求场景暴露
//! 一组带稳定整数 id 的网格实例记录（含包围数据与变换），
//! 以及全局索引缓冲区等共享 GPU 资源。

use ignis_gfx::descriptor::{DescriptorIndex, INVALID_DESCRIPTOR_INDEX};
use ignis_gfx::device::GfxBufferHandle;

/// 网格在全局缓冲区中的投影
#[derive(Clone, Copy, Debug, Default)]
pub struct MeshRecord {
    /// 该网格的索引总数
    pub total_indices: u32,
    /// 在全局索引缓冲区中的起始索引
    pub global_index_offset: u32,
    /// 几何数据在全局几何缓冲区中的索引
    pub geometry_index: u32,
    /// 材质在全局材质缓冲区中的索引
    pub material_index: u32,
}

/// 一个网格实例
///
/// id 是稳定的整数标识符，受绘制队列的 24 位空间约束。
#[derive(Clone, Copy, Debug)]
pub struct MeshInstance {
    /// 所引用网格的稳定 id
    pub mesh_id: u32,
    /// 实例自身的稳定 id
    pub instance_id: u32,
    pub world: glam::Mat4,
    /// 包围盒中心（用于视空间距离计算）
    pub bounds_center: glam::Vec3,
    /// 实例数据在全局实例缓冲区中的索引
    pub global_buffer_index: u32,
}

/// 渲染路径消费的场景视图
///
/// 由 ECS/场景子系统实现；此处只是数据边界，不含存储机制。
pub trait RenderScene {
    /// 可裁剪的网格实例集合
    fn mesh_instances(&self) -> &[MeshInstance];

    /// 按稳定 id 查询网格记录。id 无效是编程错误。
    fn mesh(&self, mesh_id: u32) -> &MeshRecord;

    /// 按稳定 id 查询网格实例。id 无效是编程错误。
    ///
    /// 实例 id 不要求连续；绘制队列只携带 id，
    /// 回查实例数据必须走这里而不是 [`Self::mesh_instances`] 的下标。
    fn instance(&self, instance_id: u32) -> &MeshInstance;

    /// 场景共享的全局索引缓冲区
    fn global_index_buffer(&self) -> GfxBufferHandle;

    /// BRDF LUT 的 bindless 索引（未加载时为无效索引）
    fn brdf_lut_descriptor_index(&self) -> DescriptorIndex {
        INVALID_DESCRIPTOR_INDEX
    }
}
