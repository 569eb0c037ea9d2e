//! Ignis 渲染管线层
//!
//! 在 GFX 边界之上组装实际的渲染路径：
//! - 按渲染目标格式组合缓存管线对象（[`pso_cache`]）
//! - 几何 Pass 抽象与实例合批的队列遍历（[`geometry_pass`]）
//! - G-Buffer / 阴影图集等尺寸相关资源捆（[`targets`]）
//! - Forward3D / Deferred3D 渲染路径编排（[`render_path`]）

pub mod geometry_pass;
pub mod passes;
pub mod pso_cache;
pub mod render_path;
pub mod targets;

#[cfg(test)]
mod test_device;
