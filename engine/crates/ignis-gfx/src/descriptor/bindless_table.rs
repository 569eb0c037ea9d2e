//! Bindless 描述符表
//!
//! 持有一段固定容量的描述符堆分配，是"按索引绑定"的唯一权威：
//! 索引到 CPU/GPU 句柄的换算全部封装在这里，
//! 偏移算术不暴露给调用方。

use anyhow::{Result, bail};

use super::{DescriptorIndex, DescriptorIndexPool};

/// CPU 侧描述符句柄（堆内地址）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CpuDescriptorHandle(pub u64);

/// GPU 侧描述符句柄（shader-visible 地址）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpuDescriptorHandle(pub u64);

/// 描述符堆中的一段连续分配
///
/// 由设备后端创建（见 `GfxDevice::allocate_descriptor_heap`），
/// 容量在创建时固定。
#[derive(Clone, Copy, Debug)]
pub struct DescriptorHeapAllocation {
    pub cpu_base: u64,
    pub gpu_base: u64,
    /// 单个描述符的字节跨度
    pub stride: u32,
    pub capacity: u32,
}

impl DescriptorHeapAllocation {
    #[inline]
    fn cpu_handle(&self, index: DescriptorIndex) -> CpuDescriptorHandle {
        CpuDescriptorHandle(self.cpu_base + index as u64 * self.stride as u64)
    }

    #[inline]
    fn gpu_handle(&self, index: DescriptorIndex) -> GpuDescriptorHandle {
        GpuDescriptorHandle(self.gpu_base + index as u64 * self.stride as u64)
    }
}

/// Bindless 描述符表
///
/// # 不变量
/// - 每个存活索引唯一映射到一对有效的 CPU/GPU 句柄
/// - 索引不会被并发地双重分配（由索引池的锁保证）
/// - 存活索引数不超过堆容量（由 `allocate` 检查）
pub struct BindlessDescriptorTable {
    allocation: DescriptorHeapAllocation,
    index_pool: DescriptorIndexPool,
}

// new & init
impl BindlessDescriptorTable {
    /// 接管一段固定容量的堆分配
    pub fn new(allocation: DescriptorHeapAllocation) -> Self {
        log::info!(
            "BindlessDescriptorTable: capacity={}, stride={}B",
            allocation.capacity,
            allocation.stride
        );
        Self {
            allocation,
            index_pool: DescriptorIndexPool::new(),
        }
    }
}

// allocate & free
impl BindlessDescriptorTable {
    /// 分配一个描述符槽位
    ///
    /// 超出堆容量是显式错误。失败的分配不产生任何副作用，
    /// 之后释放的槽位仍按 FIFO 顺序复用。
    pub fn allocate(&self) -> Result<DescriptorIndex> {
        match self.index_pool.allocate_capped(self.allocation.capacity) {
            Some(index) => Ok(index),
            None => {
                log::error!(
                    "bindless descriptor heap exhausted: capacity={}",
                    self.allocation.capacity
                );
                bail!("bindless descriptor heap exhausted (capacity = {})", self.allocation.capacity);
            }
        }
    }

    /// 释放一个槽位。每个索引恰好释放一次。
    pub fn free(&self, index: DescriptorIndex) {
        debug_assert!(index < self.allocation.capacity);
        self.index_pool.release(index);
    }
}

// handle 换算
impl BindlessDescriptorTable {
    /// 索引对应的 CPU 句柄
    ///
    /// # Panics
    /// index 超出表容量是编程错误。
    #[inline]
    pub fn cpu_handle(&self, index: DescriptorIndex) -> CpuDescriptorHandle {
        assert!(index < self.allocation.capacity, "descriptor index {index} out of range");
        self.allocation.cpu_handle(index)
    }

    /// 索引对应的 GPU 句柄
    #[inline]
    pub fn gpu_handle(&self, index: DescriptorIndex) -> GpuDescriptorHandle {
        assert!(index < self.allocation.capacity, "descriptor index {index} out of range");
        self.allocation.gpu_handle(index)
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.allocation.capacity
    }

    /// 当前存活的槽位数
    #[inline]
    pub fn live_count(&self) -> usize {
        self.index_pool.live_count()
    }
}
