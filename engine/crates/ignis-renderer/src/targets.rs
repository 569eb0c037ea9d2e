//! 渲染路径持有的 GPU 资源捆
//!
//! 每个资源捆在 initialize / resize 时整体创建，在相反事件整体释放；
//! 不存在部分有效的状态（创建中途失败会回收已创建的部分）。

use anyhow::Result;
use ash::vk;
use ignis_gfx::device::{
    BindingFlags, ColorAttachment, DepthAttachment, GfxDevice, GfxTextureHandle, LoadOp, RenderPassTargets,
    TextureDesc,
};
use ignis_gfx::resource_state::ImageState;
use ignis_render_interface::pipeline_settings::DefaultRendererSettings;

/// G-Buffer 渲染目标捆
///
/// 附件在 Pass 之外停留在 shader-resource 状态；
/// 进出 G-Buffer 填充 Pass 的状态转换由渲染路径负责。
pub struct GBufferRenderTargets {
    pub albedo: GfxTextureHandle,
    pub normal: GfxTextureHandle,
    pub surface: GfxTextureHandle,
    pub specular: GfxTextureHandle,
    pub depth: GfxTextureHandle,

    pub formats: [vk::Format; 4],
    pub depth_format: vk::Format,
    pub extent: vk::Extent2D,
}

impl GBufferRenderTargets {
    pub fn create(device: &dyn GfxDevice, extent: vk::Extent2D) -> Result<Self> {
        let formats = DefaultRendererSettings::GBUFFER_FORMATS;
        let depth_format = DefaultRendererSettings::DEPTH_FORMAT_CANDIDATES[0];

        let mut created: Vec<GfxTextureHandle> = Vec::with_capacity(5);
        let mut make_color = |name: &str, format: vk::Format| -> Result<GfxTextureHandle> {
            let tex = device.create_texture(&TextureDesc {
                format,
                extent,
                binding: BindingFlags::RENDER_TARGET | BindingFlags::SHADER_RESOURCE,
                initial_state: ImageState::SHADER_RESOURCE,
                is_bindless: true,
                debug_name: name.to_string(),
                ..Default::default()
            })?;
            created.push(tex);
            Ok(tex)
        };

        let result = (|| {
            let albedo = make_color("GBuffer Albedo", formats[0])?;
            let normal = make_color("GBuffer Normal", formats[1])?;
            let surface = make_color("GBuffer Surface", formats[2])?;
            let specular = make_color("GBuffer Specular", formats[3])?;
            let depth = device.create_texture(&TextureDesc {
                format: depth_format,
                extent,
                binding: BindingFlags::DEPTH_STENCIL | BindingFlags::SHADER_RESOURCE,
                initial_state: ImageState::SHADER_RESOURCE,
                is_bindless: true,
                debug_name: "GBuffer Depth".to_string(),
                ..Default::default()
            })?;
            Ok::<_, anyhow::Error>((albedo, normal, surface, specular, depth))
        })();

        match result {
            Ok((albedo, normal, surface, specular, depth)) => Ok(Self {
                albedo,
                normal,
                surface,
                specular,
                depth,
                formats,
                depth_format,
                extent,
            }),
            Err(e) => {
                // 资源捆不允许部分有效
                for tex in created {
                    device.destroy_texture(tex);
                }
                Err(e)
            }
        }
    }

    pub fn free(self, device: &dyn GfxDevice) {
        device.destroy_texture(self.albedo);
        device.destroy_texture(self.normal);
        device.destroy_texture(self.surface);
        device.destroy_texture(self.specular);
        device.destroy_texture(self.depth);
    }

    /// G-Buffer 填充 Pass 绑定的目标集合（全附件清空）
    pub fn render_pass_targets(&self) -> RenderPassTargets {
        let color = [self.albedo, self.normal, self.surface, self.specular]
            .into_iter()
            .map(|texture| ColorAttachment {
                texture,
                load_op: LoadOp::Clear,
                clear: [0.0, 0.0, 0.0, 1.0],
            })
            .collect();
        RenderPassTargets {
            color,
            depth: Some(DepthAttachment {
                texture: self.depth,
                load_op: LoadOp::Clear,
                clear_depth: 1.0,
                read_only: false,
            }),
        }
    }

    /// 光照 Pass 读取的附件顺序（depth 在前，与着色器侧一致）
    pub fn shader_resources(&self) -> [GfxTextureHandle; 5] {
        [self.depth, self.albedo, self.normal, self.surface, self.specular]
    }

    /// 写入状态下的颜色附件 + 深度，用于 Pass 前后的 barrier 配对
    pub fn attachments(&self) -> [GfxTextureHandle; 5] {
        [self.albedo, self.normal, self.surface, self.specular, self.depth]
    }
}

/// 阴影图集
///
/// 分辨率固定，但与其他尺寸相关资源同生命周期管理，
/// 随渲染路径的 initialize / resize 整体重建。
/// 目前没有 Pass 写入或采样它；阴影 Pass 接入后在这里取纹理。
pub struct ShadowAtlas {
    pub texture: GfxTextureHandle,
    pub format: vk::Format,
    pub resolution: u32,
}

impl ShadowAtlas {
    pub fn create(device: &dyn GfxDevice) -> Result<Self> {
        let resolution = DefaultRendererSettings::SHADOW_ATLAS_RESOLUTION;
        let format = DefaultRendererSettings::SHADOW_ATLAS_FORMAT;
        let texture = device.create_texture(&TextureDesc {
            format,
            extent: vk::Extent2D {
                width: resolution,
                height: resolution,
            },
            binding: BindingFlags::DEPTH_STENCIL | BindingFlags::SHADER_RESOURCE,
            initial_state: ImageState::SHADER_RESOURCE,
            is_bindless: true,
            debug_name: "Shadow Atlas".to_string(),
            ..Default::default()
        })?;
        Ok(Self {
            texture,
            format,
            resolution,
        })
    }

    pub fn free(self, device: &dyn GfxDevice) {
        device.destroy_texture(self.texture);
    }
}
