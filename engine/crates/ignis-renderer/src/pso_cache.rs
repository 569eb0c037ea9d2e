//! 每个 Pass 的管线状态缓存
//!
//! 管线对象按（渲染目标格式集合 + 深度格式 + 混合模式）为 key 惰性创建。
//! 窗口尺寸变化时整体失效：所有条目被保守地视为尺寸相关。
//! 无其他淘汰策略，实际使用中条目数受格式组合的低基数约束。

use std::collections::HashMap;

use anyhow::{Context, Result};
use ash::vk;
use ignis_gfx::device::{BlendMode, GfxDevice, GfxPipelineHandle, GraphicsPipelineDesc, RenderPassTargets};

/// 管线缓存 key
///
/// 相等与哈希是结构性的：格式序列有序比较。
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PsoCacheKey {
    pub rtv_formats: Vec<vk::Format>,
    pub depth_format: Option<vk::Format>,
    pub blend: BlendMode,
}

impl PsoCacheKey {
    /// 从实际绑定的渲染目标推导 key，格式经设备查询
    pub fn from_targets(device: &dyn GfxDevice, targets: &RenderPassTargets, blend: BlendMode) -> Self {
        Self {
            rtv_formats: targets.color.iter().map(|a| device.texture_desc(a.texture).format).collect(),
            depth_format: targets.depth.map(|d| device.texture_desc(d.texture).format),
            blend,
        }
    }
}

/// 单个 Pass 的管线状态缓存
///
/// 持有该 Pass 固定的着色器与状态模板；每个 key 只编译一次。
pub struct PipelineStateCache {
    /// 固定部分：着色器、图元、深度/光栅状态。格式字段按 key 填充。
    template: GraphicsPipelineDesc,
    entries: HashMap<PsoCacheKey, GfxPipelineHandle>,
}

// new & init
impl PipelineStateCache {
    pub fn new(template: GraphicsPipelineDesc) -> Self {
        Self {
            template,
            entries: HashMap::new(),
        }
    }
}

// lookup
impl PipelineStateCache {
    /// 查询或编译 key 对应的管线
    ///
    /// 命中时直接返回缓存句柄，不触发任何编译。
    /// 编译失败对该 Pass 是致命错误：缺失的管线无法被静默跳过。
    pub fn get_or_create(&mut self, device: &dyn GfxDevice, key: &PsoCacheKey) -> Result<GfxPipelineHandle> {
        if let Some(&pipeline) = self.entries.get(key) {
            return Ok(pipeline);
        }

        let mut desc = self.template.clone();
        desc.rtv_formats = key.rtv_formats.clone();
        desc.depth_format = key.depth_format;
        desc.blend = key.blend;

        let pipeline = device
            .create_graphics_pipeline(&desc)
            .with_context(|| format!("pipeline compilation failed for pass '{}'", desc.debug_name))
            .inspect_err(|e| log::error!("{e:#}"))?;

        self.entries.insert(key.clone(), pipeline);
        Ok(pipeline)
    }
}

// invalidate
impl PipelineStateCache {
    /// 窗口尺寸变化：销毁全部管线并清空缓存
    pub fn on_window_resize(&mut self, device: &dyn GfxDevice) {
        for (_, pipeline) in self.entries.drain() {
            device.destroy_pipeline(pipeline);
        }
    }
}

// getters
impl PipelineStateCache {
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
