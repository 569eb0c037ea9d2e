//! Bindless 描述符管理
//!
//! 着色器通过整数索引访问共享描述符表中的资源。
//! [`index_pool`] 负责索引的分配与回收，
//! [`bindless_table`] 持有堆分配并完成索引到句柄的换算。

mod bindless_table;
mod index_pool;

pub use bindless_table::{BindlessDescriptorTable, CpuDescriptorHandle, DescriptorHeapAllocation, GpuDescriptorHandle};
pub use index_pool::DescriptorIndexPool;

/// bindless 描述符表中的一个槽位
pub type DescriptorIndex = u32;

/// 无效索引哨兵值
pub const INVALID_DESCRIPTOR_INDEX: DescriptorIndex = DescriptorIndex::MAX;
