//! 上传到 GPU 的常量结构
//!
//! 所有结构都是 `#[repr(C)]` 的 POD，经由 bytemuck 直接写入
//! constant buffer / upload ring。布局与着色器侧一一对应。

use bytemuck::{Pod, Zeroable};
use ignis_gfx::descriptor::{DescriptorIndex, INVALID_DESCRIPTOR_INDEX};

/// 相机常量（每帧经 dynamic constant buffer 绑定）
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct GpuCameraData {
    pub view_projection: glam::Mat4,
    pub view_projection_inv: glam::Mat4,
    pub proj_inv: glam::Mat4,
    pub view_inv: glam::Mat4,
}

/// 渲染路径消费的相机视图
///
/// `gpu` 部分原样上传；`eye` 用于 CPU 侧的距离排序。
#[derive(Clone, Copy, Debug, Default)]
pub struct RenderCamera {
    pub eye: glam::Vec3,
    pub gpu: GpuCameraData,
}

/// 帧常量（常驻 constant buffer，每帧重写一次）
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuFrameConstants {
    /// BRDF LUT 在 bindless 表中的索引
    pub brdf_lut_index: DescriptorIndex,
    /// 光源数据缓冲区的 bindless 索引
    pub light_buffer_index: DescriptorIndex,
    pub light_data_offset: u32,
    pub light_count: u32,
    /// 实例矩阵缓冲区的 bindless 索引
    pub matrices_index: DescriptorIndex,
    pub matrices_data_offset: u32,
    pub _pad: [u32; 2],
}

impl Default for GpuFrameConstants {
    fn default() -> Self {
        Self {
            brdf_lut_index: INVALID_DESCRIPTOR_INDEX,
            light_buffer_index: INVALID_DESCRIPTOR_INDEX,
            light_data_offset: 0,
            light_count: 0,
            matrices_index: INVALID_DESCRIPTOR_INDEX,
            matrices_data_offset: 0,
            _pad: [0; 2],
        }
    }
}

/// 几何 Pass 的 push constant
///
/// 每个 draw 绑定一次：几何/材质在全局缓冲区中的索引，
/// 以及实例指针数据所在的 bindless 缓冲区与偏移。
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct GeometryPushConstants {
    pub geometry_index: u32,
    pub material_index: u32,
    pub instance_ptr_buffer_index: DescriptorIndex,
    pub instance_ptr_data_offset: u32,
}

/// 写入 upload ring 的实例指针
///
/// `[23:0]` 实例在全局实例缓冲区中的索引，`[31:24]` 相机索引。
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct GpuMeshInstancePointer {
    pub data: u32,
}

impl GpuMeshInstancePointer {
    pub fn new(instance_buffer_index: u32, camera_index: u32) -> Self {
        debug_assert!(instance_buffer_index < (1 << 24));
        debug_assert!(camera_index < (1 << 8));
        Self {
            data: (instance_buffer_index & 0x00FF_FFFF) | (camera_index << 24),
        }
    }
}

/// 延迟光照计算着色器的 push constant
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct DeferredLightingCsConstants {
    pub dispatch_grid_dim: [u32; 2],
    pub max_tile_width: u32,
    pub _pad: u32,
}

/// 计算光照的 tile 尺寸（与着色器内常量一致）
pub const DEFERRED_BLOCK_SIZE_X: u32 = 16;
pub const DEFERRED_BLOCK_SIZE_Y: u32 = 16;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_pointer_packing() {
        let ptr = GpuMeshInstancePointer::new(0x0012_3456, 3);
        assert_eq!(ptr.data & 0x00FF_FFFF, 0x0012_3456);
        assert_eq!(ptr.data >> 24, 3);
    }

    #[test]
    fn test_push_constants_are_pod() {
        // bytemuck 序列化后大小与 repr(C) 布局一致
        let push = GeometryPushConstants::default();
        assert_eq!(bytemuck::bytes_of(&push).len(), 16);
    }
}
