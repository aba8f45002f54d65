//! Background removal: raw product photo in, transparent cutout out.

use std::io::Cursor;

use adstudio_types::enums::SegmentMode;
use adstudio_types::models::{Image, SegmentImageConfig, SegmentImageSource};
use futures_util::future::BoxFuture;
use image::imageops::FilterType;
use image::{GrayImage, ImageFormat, Rgba, RgbaImage};

use crate::client::Client;
use crate::error::{Error, Result};

/// Vertex AI 前景分割模型。
pub const DEFAULT_SEGMENTATION_MODEL: &str = "image-segmentation-001";

/// 抠图能力接口。
pub trait BackgroundStripper: Send + Sync {
    /// 将原始图片字节转换为背景透明的 RGBA 图像。
    fn strip<'a>(&'a self, raw: &'a [u8]) -> BoxFuture<'a, Result<RgbaImage>>;
}

/// 抠图后的产品图。整个运行期间只创建一次，之后只读共享。
#[derive(Debug, Clone)]
pub struct ProductCutout {
    image: RgbaImage,
    png: Vec<u8>,
}

impl ProductCutout {
    /// # Errors
    /// 图像尺寸为零或 PNG 编码失败时返回错误。
    pub fn new(image: RgbaImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::InvalidConfig {
                message: "product cutout has zero width or height".into(),
            });
        }
        let png = encode_png(&image)?;
        Ok(Self { image, png })
    }

    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// PNG 编码后的字节，用于多模态请求。
    #[must_use]
    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

pub(crate) fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}

/// 使用 Vertex AI 前景分割生成 alpha 通道。
#[derive(Clone)]
pub struct VertexForegroundStripper {
    client: Client,
    model: String,
}

impl VertexForegroundStripper {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            model: DEFAULT_SEGMENTATION_MODEL.to_string(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    async fn strip_remote(&self, raw: &[u8]) -> Result<RgbaImage> {
        let photo = image::load_from_memory(raw)?.to_rgba8();
        let mime = image::guess_format(raw)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| "image/png".to_string());

        let source = SegmentImageSource {
            prompt: None,
            image: Some(Image::from_bytes(raw.to_vec(), mime)),
        };
        let config = SegmentImageConfig {
            mode: Some(SegmentMode::Foreground),
            max_predictions: Some(1),
            ..Default::default()
        };
        let response = self
            .client
            .models()
            .segment_image(&self.model, source, config)
            .await?;

        let mask_bytes = response
            .generated_masks
            .iter()
            .filter_map(|generated| generated.mask.as_ref())
            .find_map(|mask| mask.image_bytes.as_deref())
            .ok_or(Error::NoMask)?;
        let mask = image::load_from_memory(mask_bytes)?.to_luma8();
        Ok(apply_mask(photo, &mask))
    }
}

impl BackgroundStripper for VertexForegroundStripper {
    fn strip<'a>(&'a self, raw: &'a [u8]) -> BoxFuture<'a, Result<RgbaImage>> {
        Box::pin(self.strip_remote(raw))
    }
}

/// 用 mask 亮度作为 alpha；mask 尺寸不一致时先缩放到原图尺寸。
fn apply_mask(mut photo: RgbaImage, mask: &GrayImage) -> RgbaImage {
    let (width, height) = photo.dimensions();
    let resized;
    let mask = if mask.dimensions() == (width, height) {
        mask
    } else {
        resized = image::imageops::resize(mask, width, height, FilterType::Triangle);
        &resized
    };
    for (x, y, pixel) in photo.enumerate_pixels_mut() {
        let coverage = mask.get_pixel(x, y)[0];
        pixel[3] = pixel[3].min(coverage);
    }
    photo
}

/// 基于角点颜色的本地抠图，适合纯色背景的棚拍图。
#[derive(Debug, Clone, Copy)]
pub struct ChromaKeyStripper {
    threshold: u8,
}

impl Default for ChromaKeyStripper {
    fn default() -> Self {
        Self { threshold: 30 }
    }
}

impl ChromaKeyStripper {
    #[must_use]
    pub const fn with_threshold(threshold: u8) -> Self {
        Self { threshold }
    }

    fn key_out(&self, mut photo: RgbaImage) -> RgbaImage {
        if photo.width() == 0 || photo.height() == 0 {
            return photo;
        }
        let key = *photo.get_pixel(0, 0);
        for pixel in photo.pixels_mut() {
            let close = (0..3).all(|c| pixel[c].abs_diff(key[c]) < self.threshold);
            if close {
                *pixel = Rgba([0, 0, 0, 0]);
            }
        }
        photo
    }
}

impl BackgroundStripper for ChromaKeyStripper {
    fn strip<'a>(&'a self, raw: &'a [u8]) -> BoxFuture<'a, Result<RgbaImage>> {
        Box::pin(async move {
            let photo = image::load_from_memory(raw)?.to_rgba8();
            Ok(self.key_out(photo))
        })
    }
}

/// 原样解码为 RGBA，适用于已经带透明通道的产品图。
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughStripper;

impl BackgroundStripper for PassthroughStripper {
    fn strip<'a>(&'a self, raw: &'a [u8]) -> BoxFuture<'a, Result<RgbaImage>> {
        Box::pin(async move { Ok(image::load_from_memory(raw)?.to_rgba8()) })
    }
}
