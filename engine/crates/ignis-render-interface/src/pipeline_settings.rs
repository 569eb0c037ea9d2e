//! 渲染管线配置

use ash::vk;

/// 渲染器默认配置
pub struct DefaultRendererSettings;

impl DefaultRendererSettings {
    /// HDR 颜色缓冲格式
    pub const HDR_COLOR_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;

    /// G-Buffer 各附件格式（albedo / normal / surface / specular）
    pub const GBUFFER_FORMATS: [vk::Format; 4] = [
        vk::Format::R8G8B8A8_UNORM,
        vk::Format::R16G16B16A16_SFLOAT,
        vk::Format::R8G8B8A8_UNORM,
        vk::Format::R8G8B8A8_UNORM,
    ];

    /// 深度格式候选，按优先级排列
    pub const DEPTH_FORMAT_CANDIDATES: &'static [vk::Format] = &[
        vk::Format::D32_SFLOAT_S8_UINT,
        vk::Format::D32_SFLOAT,
        vk::Format::D24_UNORM_S8_UINT,
        vk::Format::D16_UNORM,
    ];

    /// 阴影图集格式与尺寸
    pub const SHADOW_ATLAS_FORMAT: vk::Format = vk::Format::D16_UNORM;
    pub const SHADOW_ATLAS_RESOLUTION: u32 = 2048;
}

/// 帧级渲染配置
#[derive(Copy, Clone, Default)]
pub struct FrameSettings {
    pub color_format: vk::Format,
    pub depth_format: vk::Format,
    pub canvas_extent: vk::Extent2D,
}

/// 渲染路径配置
#[derive(Copy, Clone)]
pub struct RenderPathSettings {
    /// 延迟光照走计算管线（否则为全屏三角形图形管线）
    pub enable_compute_deferred_lighting: bool,
}

impl Default for RenderPathSettings {
    fn default() -> Self {
        Self {
            enable_compute_deferred_lighting: true,
        }
    }
}
