//! 渲染路径使用的各个 Pass
//!
//! 几何类 Pass 实现 [`crate::geometry_pass::GeometryPass`]，
//! 全屏类 Pass（光照、tone mapping）各自暴露 `render`。
//! 所有 Pass 自持管线缓存，窗口尺寸变化时由渲染路径统一通知失效。

pub mod deferred_lighting;
pub mod depth_prepass;
pub mod forward_opaque;
pub mod gbuffer_fill;
pub mod tone_mapping;

pub use deferred_lighting::DeferredLightingPass;
pub use depth_prepass::DepthPrePass;
pub use forward_opaque::ForwardOpaquePass;
pub use gbuffer_fill::GBufferFillPass;
pub use tone_mapping::ToneMappingPass;

/// 几何类 Pass 的根签名槽位约定（与着色器侧一致）
pub(crate) mod geometry_slots {
    /// push constant：每 draw 的几何/材质/实例指针
    pub const PUSH: u32 = 0;
    /// 常驻帧常量 buffer
    pub const FRAME_CB: u32 = 1;
    /// 每帧相机常量（dynamic）
    pub const CAMERA_CB: u32 = 2;
}
