//! 着色器工厂边界
//!
//! 着色器的编译/加载不属于本层；渲染管线只通过 [`ShaderFactory`]
//! 以路径 + 阶段请求一个不透明句柄。

use anyhow::Result;

slotmap::new_key_type! {
    /// 加载完成的着色器
    pub struct GfxShaderHandle;
}

/// 着色器阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
    Compute,
}

/// 着色器加载参数
#[derive(Clone, Debug)]
pub struct ShaderDesc {
    pub stage: ShaderStage,
    pub debug_name: String,
}

impl ShaderDesc {
    pub fn new(stage: ShaderStage, debug_name: impl Into<String>) -> Self {
        Self {
            stage,
            debug_name: debug_name.into(),
        }
    }
}

/// 着色器工厂
///
/// 初始化阶段会从多个 rayon 任务并行调用，实现必须线程安全。
/// 加载失败对调用方是致命错误，不存在降级渲染路径。
pub trait ShaderFactory: Send + Sync {
    fn create_shader(&self, path: &str, desc: &ShaderDesc) -> Result<GfxShaderHandle>;
}
