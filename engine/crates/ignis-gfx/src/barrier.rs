//! GPU barrier 构建
//!
//! 分为两层：
//! - [`GpuBarrier`]：句柄层的状态转换描述，由渲染管线在 Pass 边界构造，
//!   在单次命令录制范围内消费。同一资源的 before/after 必须严格配对。
//! - [`GfxImageBarrier`] / [`GfxBufferBarrier`]：vk 层的 barrier 构建器，
//!   由具体设备后端在降级 [`GpuBarrier`] 时使用。

use ash::vk;

use crate::device::{GfxBufferHandle, GfxTextureHandle};
use crate::resource_state::{BufferState, ImageState};

/// 一次资源状态转换
///
/// 生命周期局限于单个命令列表的录制范围。
#[derive(Clone, Copy, Debug)]
pub enum GpuBarrier {
    /// 图像状态转换
    Texture {
        texture: GfxTextureHandle,
        before: ImageState,
        after: ImageState,
    },
    /// 缓冲区状态转换
    Buffer {
        buffer: GfxBufferHandle,
        before: BufferState,
        after: BufferState,
    },
    /// 全局 memory barrier
    Memory,
}

impl GpuBarrier {
    #[inline]
    pub fn texture(texture: GfxTextureHandle, before: ImageState, after: ImageState) -> Self {
        Self::Texture { texture, before, after }
    }

    #[inline]
    pub fn buffer(buffer: GfxBufferHandle, before: BufferState, after: BufferState) -> Self {
        Self::Buffer { buffer, before, after }
    }

    /// 检查转换是否有实际效果
    ///
    /// layout 相同且两侧均为只读时可以跳过。
    pub fn is_effective(&self) -> bool {
        match self {
            Self::Texture { before, after, .. } => {
                before.layout != after.layout || before.is_write() || after.is_write()
            }
            Self::Buffer { before, after, .. } => before.is_write() || after.is_write(),
            Self::Memory => true,
        }
    }
}

/// 便捷创建 image memory barrier 的结构体
pub struct GfxImageBarrier {
    inner: vk::ImageMemoryBarrier2<'static>,
}

impl Default for GfxImageBarrier {
    fn default() -> Self {
        Self {
            inner: vk::ImageMemoryBarrier2 {
                old_layout: vk::ImageLayout::UNDEFINED,
                new_layout: vk::ImageLayout::UNDEFINED,
                src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                subresource_range: vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_array_layer: 0,
                    layer_count: 1,
                    base_mip_level: 0,
                    level_count: 1,
                },
                ..Default::default()
            },
        }
    }
}

impl GfxImageBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从句柄层的状态对构建 vk barrier（image 由后端填入）
    pub fn from_states(image: vk::Image, before: ImageState, after: ImageState) -> Self {
        Self::new()
            .image(image)
            .layout_transfer(before.layout, after.layout)
            .src_mask(before.stage, before.access)
            .dst_mask(after.stage, after.access)
            .image_aspect_flag(Self::infer_aspect(after.layout))
    }

    #[inline]
    pub fn inner(&self) -> &vk::ImageMemoryBarrier2<'_> {
        &self.inner
    }

    /// builder
    #[inline]
    pub fn layout_transfer(mut self, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) -> Self {
        self.inner.old_layout = old_layout;
        self.inner.new_layout = new_layout;
        self
    }

    /// builder
    #[inline]
    pub fn src_mask(mut self, src_stage_mask: vk::PipelineStageFlags2, src_access_mask: vk::AccessFlags2) -> Self {
        self.inner.src_stage_mask = src_stage_mask;
        self.inner.src_access_mask = src_access_mask;
        self
    }

    /// builder
    #[inline]
    pub fn dst_mask(mut self, dst_stage_mask: vk::PipelineStageFlags2, dst_access_mask: vk::AccessFlags2) -> Self {
        self.inner.dst_stage_mask = dst_stage_mask;
        self.inner.dst_access_mask = dst_access_mask;
        self
    }

    /// builder
    /// layer 和 miplevel 都使用默认值
    #[inline]
    pub fn image_aspect_flag(mut self, aspect_mask: vk::ImageAspectFlags) -> Self {
        self.inner.subresource_range.aspect_mask = aspect_mask;
        self
    }

    /// builder
    #[inline]
    pub fn image(mut self, image: vk::Image) -> Self {
        self.inner.image = image;
        self
    }

    /// 根据 layout 推断 aspect
    fn infer_aspect(layout: vk::ImageLayout) -> vk::ImageAspectFlags {
        match layout {
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL | vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL => {
                vk::ImageAspectFlags::DEPTH
            }
            _ => vk::ImageAspectFlags::COLOR,
        }
    }
}

pub struct GfxBufferBarrier {
    inner: vk::BufferMemoryBarrier2<'static>,
}

impl Default for GfxBufferBarrier {
    fn default() -> Self {
        Self {
            inner: vk::BufferMemoryBarrier2 {
                src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                size: vk::WHOLE_SIZE,
                ..Default::default()
            },
        }
    }
}

impl GfxBufferBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从句柄层的状态对构建 vk barrier
    pub fn from_states(buffer: vk::Buffer, before: BufferState, after: BufferState) -> Self {
        Self::new()
            .buffer(buffer, 0, vk::WHOLE_SIZE)
            .src_mask(before.stage, before.access)
            .dst_mask(after.stage, after.access)
    }

    #[inline]
    pub fn inner(&self) -> &vk::BufferMemoryBarrier2<'_> {
        &self.inner
    }

    #[inline]
    pub fn src_mask(mut self, src_stage_mask: vk::PipelineStageFlags2, src_access_mask: vk::AccessFlags2) -> Self {
        self.inner.src_stage_mask = src_stage_mask;
        self.inner.src_access_mask = src_access_mask;
        self
    }

    #[inline]
    pub fn dst_mask(mut self, dst_stage_mask: vk::PipelineStageFlags2, dst_access_mask: vk::AccessFlags2) -> Self {
        self.inner.dst_stage_mask = dst_stage_mask;
        self.inner.dst_access_mask = dst_access_mask;
        self
    }

    #[inline]
    pub fn buffer(mut self, buffer: vk::Buffer, offset: vk::DeviceSize, size: vk::DeviceSize) -> Self {
        self.inner.buffer = buffer;
        self.inner.offset = offset;
        self.inner.size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::Key;

    #[test]
    fn test_layout_change_is_effective() {
        let barrier = GpuBarrier::texture(GfxTextureHandle::null(), ImageState::SHADER_RESOURCE, ImageState::RENDER_TARGET);
        assert!(barrier.is_effective());
    }

    #[test]
    fn test_read_to_read_is_skippable() {
        // 同 layout 的只读到只读可以跳过
        let barrier = GpuBarrier::texture(
            GfxTextureHandle::null(),
            ImageState::SHADER_RESOURCE,
            ImageState::SHADER_RESOURCE_COMPUTE,
        );
        assert!(!barrier.is_effective());
    }

    #[test]
    fn test_write_to_read_is_effective() {
        let barrier = GpuBarrier::texture(GfxTextureHandle::null(), ImageState::UNORDERED_ACCESS, ImageState::SHADER_RESOURCE);
        assert!(barrier.is_effective());

        let barrier = GpuBarrier::buffer(GfxBufferHandle::null(), BufferState::COPY_DEST, BufferState::CONSTANT_BUFFER);
        assert!(barrier.is_effective());
    }

    #[test]
    fn test_from_states_fills_vk_fields() {
        let b = GfxImageBarrier::from_states(vk::Image::null(), ImageState::RENDER_TARGET, ImageState::SHADER_RESOURCE);
        assert_eq!(b.inner().old_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(b.inner().new_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(b.inner().subresource_range.aspect_mask, vk::ImageAspectFlags::COLOR);
    }
}
