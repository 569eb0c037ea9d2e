//! 几何 Pass 抽象与绘制队列遍历
//!
//! Pass 类型只提供三个能力：绑定渲染目标与管线（`begin_pass`）、
//! 为每个 draw 提供 push constant（`bind_push_constant`）、收尾（`end_pass`）。
//! 队列遍历和实例合批在 [`render_views`] 中统一完成，
//! 渲染路径保证每帧每 Pass 恰好调用一次 `begin_pass`。

use anyhow::Result;
use ash::vk;
use ignis_gfx::device::{GfxCommandList, GfxDevice, GpuAllocation, RenderPassTargets};
use ignis_render_interface::draw_queue::DrawQueue;
use ignis_render_interface::render_data::{GeometryPushConstants, GpuCameraData, GpuMeshInstancePointer};
use ignis_render_interface::scene::RenderScene;
use itertools::Itertools;

/// 几何 Pass
///
/// 实现者持有自己的管线缓存与公共资源引用（组合而非继承）。
pub trait GeometryPass {
    /// 绑定渲染目标、解析并绑定管线、设置视口/裁剪、绑定帧与相机常量。
    /// 每帧每 Pass 由渲染路径恰好调用一次。
    fn begin_pass(
        &mut self,
        cmd: &mut dyn GfxCommandList,
        device: &dyn GfxDevice,
        camera: &GpuCameraData,
        targets: &RenderPassTargets,
        canvas: vk::Extent2D,
    ) -> Result<()>;

    /// 为一个实例批次绑定 push constant，队列遍历期间每批调用一次
    fn bind_push_constant(&self, cmd: &mut dyn GfxCommandList, push: &GeometryPushConstants);

    fn end_pass(&self, cmd: &mut dyn GfxCommandList);
}

/// 按排序后的队列发射绘制
///
/// 连续共享同一 mesh id 的条目合并为一次 instanced draw；
/// 每个实例的指针数据写入命令列表的瞬态 upload 分配，
/// 着色器经由该缓冲区的 bindless 索引取回。
pub fn render_views(
    cmd: &mut dyn GfxCommandList,
    device: &dyn GfxDevice,
    pass: &dyn GeometryPass,
    scene: &dyn RenderScene,
    draw_queue: &DrawQueue,
    mark_meshes: bool,
) {
    cmd.begin_marker("Render View");

    if draw_queue.is_empty() {
        cmd.end_marker();
        return;
    }

    let stride = std::mem::size_of::<GpuMeshInstancePointer>() as u64;
    let instance_alloc: GpuAllocation = cmd.allocate_upload(stride * draw_queue.len() as u64, stride);
    let instance_buffer_index = device.buffer_descriptor_index(instance_alloc.buffer);

    cmd.bind_index_buffer(scene.global_index_buffer());

    let mut instance_count: u32 = 0;

    // 队列已排序，同 mesh 的条目必然相邻
    for (mesh_id, group) in &draw_queue.items().iter().group_by(|item| item.mesh_id()) {
        let data_offset = (instance_alloc.offset + instance_count as u64 * stride) as u32;

        let mut num_instances: u32 = 0;
        for item in group {
            // 队列条目只携带稳定 id，按 id 回查实例（id 不要求连续）
            let instance = scene.instance(item.instance_id());

            let ptr = GpuMeshInstancePointer::new(instance.global_buffer_index, 0);
            cmd.write_upload(&instance_alloc, instance_count as u64 * stride, bytemuck::bytes_of(&ptr));
            num_instances += 1;
            instance_count += 1;
        }

        let mesh = scene.mesh(mesh_id);
        if mark_meshes {
            cmd.begin_marker(&format!("Mesh {mesh_id}"));
        }
        pass.bind_push_constant(
            cmd,
            &GeometryPushConstants {
                geometry_index: mesh.geometry_index,
                material_index: mesh.material_index,
                instance_ptr_buffer_index: instance_buffer_index,
                instance_ptr_data_offset: data_offset,
            },
        );
        cmd.draw_indexed(mesh.total_indices, num_instances, mesh.global_index_offset);
        if mark_meshes {
            cmd.end_marker();
        }
    }

    cmd.end_marker();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_device::{Cmd, MockDevice, TestScene};

    /// 只记录 push constant 的测试 Pass
    struct RecordingPass;

    impl GeometryPass for RecordingPass {
        fn begin_pass(
            &mut self,
            _cmd: &mut dyn GfxCommandList,
            _device: &dyn GfxDevice,
            _camera: &GpuCameraData,
            _targets: &RenderPassTargets,
            _canvas: vk::Extent2D,
        ) -> Result<()> {
            Ok(())
        }

        fn bind_push_constant(&self, cmd: &mut dyn GfxCommandList, push: &GeometryPushConstants) {
            cmd.bind_push_constant(0, bytemuck::bytes_of(push));
        }

        fn end_pass(&self, _cmd: &mut dyn GfxCommandList) {}
    }

    #[test]
    fn test_consecutive_same_mesh_items_are_batched() {
        let device = MockDevice::new();
        let scene = TestScene::new(&device, &[(1, 3), (2, 1)]);

        let mut queue = DrawQueue::new();
        // mesh 1 的三个实例 + mesh 2 的一个实例
        queue.push(1, 0, 4.0);
        queue.push(1, 1, 2.0);
        queue.push(1, 2, 3.0);
        queue.push(2, 3, 1.0);
        queue.sort_opaque();

        let mut cmd = device.begin_command_list();
        render_views(cmd.as_mut(), &device, &RecordingPass, &scene, &queue, false);
        cmd.close();
        let log = device.drain_command_log(cmd);

        let draws: Vec<_> = log
            .iter()
            .filter_map(|c| match c {
                Cmd::DrawIndexed { instance_count, .. } => Some(*instance_count),
                _ => None,
            })
            .collect();
        // mesh 1 合并为一次 3 实例的 draw，mesh 2 单独一次
        assert_eq!(draws, vec![3, 1]);
    }

    #[test]
    fn test_sparse_instance_ids_resolve_by_lookup() {
        let device = MockDevice::new();
        // 实例 id 稀疏且远大于实例数量
        let scene = TestScene::with_instances(&device, &[(1, 100), (1, 205), (2, 907)]);

        let mut queue = DrawQueue::new();
        queue.push(1, 100, 1.0);
        queue.push(1, 205, 2.0);
        queue.push(2, 907, 3.0);
        queue.sort_opaque();

        let mut cmd = device.begin_command_list();
        render_views(cmd.as_mut(), &device, &RecordingPass, &scene, &queue, false);
        cmd.close();
        let log = device.drain_command_log(cmd);

        let draws: Vec<_> = log
            .iter()
            .filter_map(|c| match c {
                Cmd::DrawIndexed { instance_count, .. } => Some(*instance_count),
                _ => None,
            })
            .collect();
        assert_eq!(draws, vec![2, 1]);
    }

    #[test]
    fn test_empty_queue_emits_no_draws() {
        let device = MockDevice::new();
        let scene = TestScene::new(&device, &[]);
        let queue = DrawQueue::new();

        let mut cmd = device.begin_command_list();
        render_views(cmd.as_mut(), &device, &RecordingPass, &scene, &queue, false);
        cmd.close();
        let log = device.drain_command_log(cmd);

        assert!(!log.iter().any(|c| matches!(c, Cmd::DrawIndexed { .. })));
    }
}
