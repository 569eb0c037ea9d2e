//! Ignis 的 GPU 边界层
//!
//! 本 crate 定义渲染器与原生图形 API 之间的边界：
//! - 设备与命令列表的 trait 抽象（资源创建、命令录制、提交）
//! - 资源状态词汇表与 barrier 构建
//! - Bindless 描述符表及其索引池

pub mod barrier;
pub mod descriptor;
pub mod device;
pub mod resource_state;
pub mod shader;
