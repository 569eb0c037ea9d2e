//! 每帧的绘制队列
//!
//! 可见性裁剪的输出是一组 64 位打包 key（mesh id + 视空间距离 + instance id），
//! 排序一次后按序消费，帧末清空。队列只在提交线程上变更。

use half::f16;

const ID_BITS_MASK: u64 = 0x00FF_FFFF;
const MESH_SHIFT: u64 = 40;
const DISTANCE_SHIFT: u64 = 24;

/// 一次绘制的打包排序 key
///
/// 位布局：`[63:40]` mesh id（24 位），`[39:24]` 半精度距离，
/// `[23:0]` instance id（24 位）。
///
/// 距离采用 IEEE 754 半精度编码：真实距离差小于该量级下
/// 半精度分辨率的两个条目会并列，回退到 mesh/instance 次序。
/// 这是接受的精度/性能取舍。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawItem {
    data: u64,
}

impl DrawItem {
    /// 打包一个绘制条目
    ///
    /// id 超出 24 位空间表示绘制队列达到上限，
    /// 属调用方契约违反（仅 debug 断言）。
    pub fn new(mesh_id: u32, instance_id: u32, distance: f32) -> Self {
        debug_assert!(mesh_id < 0x00FF_FFFF, "draw queue mesh id limit reached");
        debug_assert!(instance_id < 0x00FF_FFFF, "draw queue instance id limit reached");

        let mut data = 0u64;
        data |= (mesh_id as u64 & ID_BITS_MASK) << MESH_SHIFT;
        data |= (f16::from_f32(distance).to_bits() as u64 & 0xFFFF) << DISTANCE_SHIFT;
        data |= instance_id as u64 & ID_BITS_MASK;
        Self { data }
    }

    #[inline]
    pub fn mesh_id(&self) -> u32 {
        ((self.data >> MESH_SHIFT) & ID_BITS_MASK) as u32
    }

    #[inline]
    pub fn instance_id(&self) -> u32 {
        (self.data & ID_BITS_MASK) as u32
    }

    #[inline]
    pub fn distance(&self) -> f32 {
        f16::from_bits(((self.data >> DISTANCE_SHIFT) & 0xFFFF) as u16).to_f32()
    }

    /// 原始打包值。不透明排序直接按此值升序：
    /// mesh 优先（提高 instancing 合批），距离次之（front-to-back）。
    #[inline]
    pub fn packed(&self) -> u64 {
        self.data
    }

    /// 透明排序用的重打包值：交换 mesh 与距离的位域，
    /// 使距离成为最高优先级，mesh id 作为次级合批依据。
    #[inline]
    fn transparent_key(&self) -> u64 {
        let mut key = 0u64;
        key |= ((self.data >> DISTANCE_SHIFT) & 0xFFFF) << 48;
        key |= ((self.data >> MESH_SHIFT) & ID_BITS_MASK) << 24;
        key |= self.data & ID_BITS_MASK;
        key
    }
}

/// 每帧瞬态的绘制队列
///
/// 生命周期：帧首 `reset` → 裁剪期间 `push` → 一次排序 → 按序消费。
/// 不跨帧持久化。
#[derive(Default)]
pub struct DrawQueue {
    items: Vec<DrawItem>,
}

impl DrawQueue {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, mesh_id: u32, instance_id: u32, distance: f32) {
        self.items.push(DrawItem::new(mesh_id, instance_id, distance));
    }

    /// 不透明排序：mesh 优先，距离 front-to-back
    pub fn sort_opaque(&mut self) {
        self.items.sort_unstable_by_key(DrawItem::packed);
    }

    /// 透明排序：距离优先，back-to-front（远的先画），mesh 次之
    pub fn sort_transparent(&mut self) {
        self.items.sort_unstable_by(|a, b| b.transparent_key().cmp(&a.transparent_key()));
    }

    #[inline]
    pub fn reset(&mut self) {
        self.items.clear();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn items(&self) -> &[DrawItem] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack_round_trip() {
        let item = DrawItem::new(0x00AB_CDEF, 0x0012_3456, 37.5);
        assert_eq!(item.mesh_id(), 0x00AB_CDEF);
        assert_eq!(item.instance_id(), 0x0012_3456);
        // 距离在半精度舍入误差内
        assert!((item.distance() - 37.5).abs() <= 37.5 * f16::EPSILON.to_f32());
    }

    #[test]
    fn test_opaque_sort_is_mesh_major() {
        let mut queue = DrawQueue::new();
        queue.push(1, 0, 5.0);
        queue.push(1, 1, 2.0);
        queue.push(2, 0, 1.0);
        queue.sort_opaque();

        let order: Vec<_> = queue.items().iter().map(|i| (i.mesh_id(), i.instance_id())).collect();
        // mesh 优先；同 mesh 内距离升序（front-to-back）
        assert_eq!(order, vec![(1, 1), (1, 0), (2, 0)]);
    }

    #[test]
    fn test_opaque_sort_distance_ascending_within_mesh() {
        let mut queue = DrawQueue::new();
        for (inst, dist) in [(0u32, 9.0f32), (1, 1.0), (2, 4.0)] {
            queue.push(7, inst, dist);
        }
        queue.sort_opaque();

        let dists: Vec<f32> = queue.items().iter().map(DrawItem::distance).collect();
        assert!(dists.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_transparent_sort_is_back_to_front() {
        let mut queue = DrawQueue::new();
        queue.push(1, 0, 5.0);
        queue.push(1, 1, 2.0);
        queue.push(2, 0, 1.0);
        queue.sort_transparent();

        // 距离优先、降序：最远的先画
        let order: Vec<_> = queue.items().iter().map(|i| (i.mesh_id(), i.instance_id())).collect();
        assert_eq!(order, vec![(1, 0), (1, 1), (2, 0)]);

        let dists: Vec<f32> = queue.items().iter().map(DrawItem::distance).collect();
        assert!(dists.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_transparent_sort_mesh_tie_break() {
        let mut queue = DrawQueue::new();
        queue.push(1, 0, 3.0);
        queue.push(2, 0, 3.0);
        queue.sort_transparent();

        // 距离并列时 mesh id 降序（与重打包 key 的整体降序一致）
        let order: Vec<_> = queue.items().iter().map(|i| i.mesh_id()).collect();
        assert_eq!(order, vec![2, 1]);
    }

    #[test]
    fn test_reset_clears_queue() {
        let mut queue = DrawQueue::new();
        queue.push(1, 2, 3.0);
        assert_eq!(queue.len(), 1);
        assert!(!queue.is_empty());

        queue.reset();
        assert!(queue.is_empty());
    }
}
