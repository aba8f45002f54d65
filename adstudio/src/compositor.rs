//! Deterministic layering of a product cutout over a generated scene.
//!
//! The scene is stretched to the canvas, the cutout is scaled to a fixed share
//! of the canvas height (aspect preserved) and centred with a downward bias so
//! it reads as standing on a surface. Everything here is pure: the same inputs
//! always give byte-identical output.

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage, RgbaImage};

/// 合成画布与产品摆放参数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeLayout {
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// 产品高度占画布高度的比例。
    pub scale_factor: f64,
    /// 产品相对垂直居中位置向下的偏移（像素）。
    pub vertical_bias: i64,
    pub filter: FilterType,
}

impl Default for CompositeLayout {
    fn default() -> Self {
        Self {
            canvas_width: 1024,
            canvas_height: 1024,
            scale_factor: 0.6,
            vertical_bias: 50,
            filter: FilterType::Lanczos3,
        }
    }
}

/// 缩放后的产品尺寸及其在画布上的左上角坐标。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductPlacement {
    pub width: u32,
    pub height: u32,
    /// 可能为负：产品超出画布时被裁剪。
    pub x: i64,
    pub y: i64,
}

impl ProductPlacement {
    /// 计算缩放尺寸与偏移。
    #[must_use]
    pub fn compute(layout: &CompositeLayout, cutout_width: u32, cutout_height: u32) -> Self {
        let height = scaled(f64::from(layout.canvas_height) * layout.scale_factor);
        let width = if cutout_height == 0 {
            1
        } else {
            scaled(f64::from(height) * f64::from(cutout_width) / f64::from(cutout_height))
        };
        let x = (i64::from(layout.canvas_width) - i64::from(width)).div_euclid(2);
        let y = (i64::from(layout.canvas_height) - i64::from(height)).div_euclid(2)
            + layout.vertical_bias;
        Self {
            width,
            height,
            x,
            y,
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scaled(value: f64) -> u32 {
    value.round().clamp(1.0, f64::from(u32::MAX)) as u32
}

/// 使用默认布局合成。
#[must_use]
pub fn composite(scene: &DynamicImage, cutout: &RgbaImage) -> RgbImage {
    composite_with(&CompositeLayout::default(), scene, cutout)
}

/// 使用指定布局合成，输出尺寸恒等于画布尺寸且不含 alpha。
#[must_use]
pub fn composite_with(
    layout: &CompositeLayout,
    scene: &DynamicImage,
    cutout: &RgbaImage,
) -> RgbImage {
    let (canvas_width, canvas_height) = (layout.canvas_width, layout.canvas_height);

    // Force the scene opaque before it goes under the product.
    let background = scene
        .resize_exact(canvas_width, canvas_height, layout.filter)
        .to_rgb8();
    let background = DynamicImage::ImageRgb8(background).to_rgba8();

    let placement = ProductPlacement::compute(layout, cutout.width(), cutout.height());
    let (product, x) = resize_visible(layout, cutout, &placement);

    let mut canvas = RgbaImage::new(canvas_width, canvas_height);
    imageops::replace(&mut canvas, &background, 0, 0);
    imageops::overlay(&mut canvas, &product, x, placement.y);

    DynamicImage::ImageRgba8(canvas).to_rgb8()
}

/// Resizes the cutout to its placement. A product wider than the canvas is
/// first cropped to the source columns that land on the canvas, so the
/// resized buffer stays bounded by the canvas width.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn resize_visible(
    layout: &CompositeLayout,
    cutout: &RgbaImage,
    placement: &ProductPlacement,
) -> (RgbaImage, i64) {
    if placement.width <= layout.canvas_width || cutout.width() == 0 {
        let product = imageops::resize(cutout, placement.width, placement.height, layout.filter);
        return (product, placement.x);
    }

    // Canvas pixels per source column.
    let ratio = f64::from(placement.width) / f64::from(cutout.width());
    let first = (-placement.x).max(0) as f64;
    let last = first + f64::from(layout.canvas_width);
    let start = ((first / ratio).floor() as u32).min(cutout.width() - 1);
    let end = ((last / ratio).ceil() as u32).clamp(start + 1, cutout.width());

    let window = imageops::crop_imm(cutout, start, 0, end - start, cutout.height()).to_image();
    let width = scaled(f64::from(end - start) * ratio);
    let x = placement.x + (f64::from(start) * ratio).round() as i64;
    (
        imageops::resize(&window, width, placement.height, layout.filter),
        x,
    )
}
