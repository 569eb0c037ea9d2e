//! 描述符索引池
//!
//! 线程安全的自由链表分配器。异步资源加载会从任意线程
//! 分配/释放索引，因此整个状态由单个 mutex 保护，
//! 临界区有界（仅队列操作）。

use std::collections::VecDeque;
use std::sync::Mutex;

use super::DescriptorIndex;

struct PoolState {
    /// 已释放、等待复用的索引（FIFO）
    free_queue: VecDeque<DescriptorIndex>,
    /// 下一个从未分配过的索引
    next_index: DescriptorIndex,
    /// debug 构建下的存活表，用于捕捉双重释放
    #[cfg(debug_assertions)]
    live: Vec<bool>,
}

impl PoolState {
    #[cfg(debug_assertions)]
    fn mark_live(&mut self, index: DescriptorIndex) {
        if self.live.len() <= index as usize {
            self.live.resize(index as usize + 1, false);
        }
        debug_assert!(!self.live[index as usize], "descriptor index {index} allocated twice");
        self.live[index as usize] = true;
    }
}

/// 向 bindless 描述符表发放小整数索引
///
/// 分配优先复用已释放的索引；自由队列为空时发放单调递增的新索引。
/// 持有固定容量堆的描述符表通过 [`Self::allocate_capped`] 限制新索引的发放。
///
/// # 契约
/// 释放同一索引两次、或使用已释放的索引，是调用方错误：
/// debug 构建下触发断言，release 构建下行为未定义。
pub struct DescriptorIndexPool {
    state: Mutex<PoolState>,
}

impl Default for DescriptorIndexPool {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorIndexPool {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PoolState {
                free_queue: VecDeque::new(),
                next_index: 0,
                #[cfg(debug_assertions)]
                live: Vec::new(),
            }),
        }
    }

    /// 分配一个索引
    ///
    /// 自由队列非空时返回最早释放的索引，否则返回计数器当前值并递增。
    pub fn allocate(&self) -> DescriptorIndex {
        let mut state = self.state.lock().unwrap();

        let index = if let Some(index) = state.free_queue.pop_front() {
            index
        } else {
            let index = state.next_index;
            state.next_index += 1;
            index
        };

        #[cfg(debug_assertions)]
        state.mark_live(index);

        index
    }

    /// 在容量上限内分配一个索引
    ///
    /// 复用策略与 [`Self::allocate`] 相同，但新索引的发放以 `capacity`
    /// 为上限。达到上限且自由队列为空时返回 `None`，
    /// 失败的分配不产生任何副作用，已释放的槽位始终保持可复用。
    pub fn allocate_capped(&self, capacity: DescriptorIndex) -> Option<DescriptorIndex> {
        let mut state = self.state.lock().unwrap();

        let index = if let Some(index) = state.free_queue.pop_front() {
            index
        } else if state.next_index < capacity {
            let index = state.next_index;
            state.next_index += 1;
            index
        } else {
            return None;
        };

        #[cfg(debug_assertions)]
        state.mark_live(index);

        Some(index)
    }

    /// 释放一个索引，使其可被后续分配复用
    pub fn release(&self, index: DescriptorIndex) {
        let mut state = self.state.lock().unwrap();

        #[cfg(debug_assertions)]
        {
            debug_assert!(
                state.live.get(index as usize).copied().unwrap_or(false),
                "descriptor index {index} released twice or never allocated"
            );
            state.live[index as usize] = false;
        }

        state.free_queue.push_back(index);
    }

    /// 当前存活的分配数（高水位减去自由队列长度）
    pub fn live_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.next_index as usize - state.free_queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_monotonic_when_free_queue_empty() {
        let pool = DescriptorIndexPool::new();
        assert_eq!(pool.allocate(), 0);
        assert_eq!(pool.allocate(), 1);
        assert_eq!(pool.allocate(), 2);
    }

    #[test]
    fn test_released_index_reused_before_new() {
        let pool = DescriptorIndexPool::new();
        let a = pool.allocate();
        let b = pool.allocate();
        pool.release(a);
        pool.release(b);

        // FIFO：先释放的先复用，且不发放更高的新索引
        assert_eq!(pool.allocate(), a);
        assert_eq!(pool.allocate(), b);
        assert_eq!(pool.allocate(), 2);
    }

    #[test]
    fn test_capped_allocate_reuses_freed_before_failing() {
        let pool = DescriptorIndexPool::new();
        let a = pool.allocate_capped(2).unwrap();
        let b = pool.allocate_capped(2).unwrap();
        assert_eq!(pool.allocate_capped(2), None);

        // 失败的分配没有副作用：释放后的槽位立即可复用
        pool.release(a);
        assert_eq!(pool.allocate_capped(2), Some(a));
        pool.release(b);
        assert_eq!(pool.allocate_capped(2), Some(b));
        assert_eq!(pool.live_count(), 2);
    }

    #[test]
    fn test_live_indices_are_unique() {
        let pool = DescriptorIndexPool::new();
        let mut live = HashSet::new();
        let mut handles = Vec::new();

        for round in 0..8 {
            for _ in 0..16 {
                let idx = pool.allocate();
                assert!(live.insert(idx), "index {idx} issued twice while live");
                handles.push(idx);
            }
            // 每轮释放一半
            for idx in handles.drain(..8 + round) {
                live.remove(&idx);
                pool.release(idx);
            }
        }
    }

    #[test]
    fn test_concurrent_allocate_release() {
        let pool = Arc::new(DescriptorIndexPool::new());
        let mut threads = Vec::new();
        for _ in 0..4 {
            let pool = Arc::clone(&pool);
            threads.push(std::thread::spawn(move || {
                for _ in 0..256 {
                    let idx = pool.allocate();
                    pool.release(idx);
                }
            }));
        }
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    #[should_panic(expected = "released twice")]
    #[cfg(debug_assertions)]
    fn test_double_release_asserts_in_debug() {
        let pool = DescriptorIndexPool::new();
        let idx = pool.allocate();
        pool.release(idx);
        pool.release(idx);
    }
}
