//! # 几何归一化模块
//!
//! ## 设计思路
//!
//! 检测服务对输入有三条几何限制：宽高比不超过 3:1、短边不小于 64、长边不超过 4096。
//! 这里固定“先裁剪、后缩放”的顺序：
//!
//! 1. 宽高比超限时，沿长轴居中裁剪到恰好 `max_aspect`，短轴保持完整
//! 2. 再按短边下限 / 长边上限计算缩放比例，等比缩放
//!
//! ## 实现思路
//!
//! - 两个约束同时触发时，长边上限优先（保证传输体积可控），短边下限可能无法满足。
//! - 缩放后尺寸四舍五入且每轴至少 1 像素；尺寸不变时直接返回原图，避免无谓重采样。
//! - 缩放取整可能让宽高比超出上限 1 像素以内，最后再做一次宽高比裁剪，保证结果是不动点。
//! - 优先使用 `fast_image_resize` 卷积缩放，失败时回退 `image::resize_exact`。

use fast_image_resize as fr;
use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, Rgba};

use super::source::RasterImage;
use super::{VisionConfig, VisionError};

/// 几何约束参数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryBounds {
    pub max_aspect: f32,
    pub min_short_side: u32,
    pub max_long_side: u32,
}

impl GeometryBounds {
    pub fn from_config(config: &VisionConfig) -> Self {
        Self {
            max_aspect: config.max_aspect,
            min_short_side: config.min_short_side,
            max_long_side: config.max_long_side,
        }
    }
}

/// 完整归一化：宽高比裁剪 → 尺寸约束缩放 → 取整后宽高比校正。
///
/// 输出是不动点：对结果再次调用 `normalize` 返回相同尺寸。
pub fn normalize(image: RasterImage, bounds: GeometryBounds, filter: FilterType) -> RasterImage {
    let cropped = crop_to_max_aspect(image, bounds.max_aspect);
    let resized = resize_within_bounds(cropped, bounds.min_short_side, bounds.max_long_side, filter);
    // 缩放时两轴各自四舍五入，宽高比可能略超上限（如 4096x1365）
    crop_to_max_aspect(resized, bounds.max_aspect)
}

/// 宽高比超过 `max_aspect` 时沿长轴居中裁剪。
pub fn crop_to_max_aspect(image: RasterImage, max_aspect: f32) -> RasterImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width as f64, height as f64);
    let max_aspect = max_aspect as f64;

    if (w / h).max(h / w) <= max_aspect {
        return image;
    }

    let (x, y, crop_w, crop_h) = if w / h > max_aspect {
        let target_w = ((max_aspect * h).floor() as u32).clamp(1, width);
        ((width - target_w) / 2, 0, target_w, height)
    } else {
        let target_h = ((max_aspect * w).floor() as u32).clamp(1, height);
        (0, (height - target_h) / 2, width, target_h)
    };

    log::info!(
        "✂️ 宽高比裁剪：{}x{} -> {}x{}（offset={},{}）",
        width,
        height,
        crop_w,
        crop_h,
        x,
        y
    );

    let cropped = image.as_dynamic().crop_imm(x, y, crop_w, crop_h);
    RasterImage::new(cropped).unwrap_or(image)
}

/// 计算满足尺寸约束的目标尺寸；无需变化时返回 `None`。
pub fn target_dimensions(
    width: u32,
    height: u32,
    min_short_side: u32,
    max_long_side: u32,
) -> Option<(u32, u32)> {
    let (w, h) = (width as f64, height as f64);
    let short_side = w.min(h);
    let long_side = w.max(h);

    let mut scale = if short_side < min_short_side as f64 {
        min_short_side as f64 / short_side
    } else {
        1.0
    };

    // 长边上限优先：放大后超出上限时按上限重新计算
    if long_side * scale > max_long_side as f64 {
        scale = max_long_side as f64 / long_side;
    }

    let new_w = ((w * scale).round() as u32).max(1);
    let new_h = ((h * scale).round() as u32).max(1);

    if new_w == width && new_h == height {
        None
    } else {
        Some((new_w, new_h))
    }
}

/// 按短边下限 / 长边上限等比缩放。
pub fn resize_within_bounds(
    image: RasterImage,
    min_short_side: u32,
    max_long_side: u32,
    filter: FilterType,
) -> RasterImage {
    let (width, height) = image.dimensions();
    let Some((target_width, target_height)) =
        target_dimensions(width, height, min_short_side, max_long_side)
    else {
        return image;
    };

    log::info!(
        "📐 尺寸约束缩放：{}x{} -> {}x{}（filter={:?}）",
        width,
        height,
        target_width,
        target_height,
        filter
    );

    let resized = match resize_with_fast_image_resize(
        image.as_dynamic(),
        target_width,
        target_height,
        filter,
    ) {
        Ok(resized) => resized,
        Err(err) => {
            log::warn!("⚠️ fast_image_resize 缩放失败，回退 image::resize_exact：{}", err);
            image
                .as_dynamic()
                .resize_exact(target_width, target_height, filter)
        }
    };

    RasterImage::new(resized).unwrap_or(image)
}

fn resize_with_fast_image_resize(
    image: &DynamicImage,
    target_width: u32,
    target_height: u32,
    filter: FilterType,
) -> Result<DynamicImage, VisionError> {
    let src = image.to_rgba8();
    let (src_width, src_height) = src.dimensions();

    let src_image =
        fr::images::Image::from_vec_u8(src_width, src_height, src.into_raw(), fr::PixelType::U8x4)
            .map_err(|e| VisionError::Decode(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    let options = fr::ResizeOptions::new()
        .resize_alg(fr::ResizeAlg::Convolution(to_fast_filter(filter)));

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| VisionError::Decode(format!("fast_image_resize 执行失败：{}", e)))?;

    let rgba = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(
        target_width,
        target_height,
        dst_image.into_vec(),
    )
    .ok_or_else(|| VisionError::Decode("fast_image_resize 输出缓冲长度异常".to_string()))?;

    Ok(DynamicImage::ImageRgba8(rgba))
}

fn to_fast_filter(filter: FilterType) -> fr::FilterType {
    match filter {
        FilterType::Nearest => fr::FilterType::Box,
        FilterType::Triangle => fr::FilterType::Bilinear,
        FilterType::CatmullRom => fr::FilterType::CatmullRom,
        FilterType::Gaussian => fr::FilterType::Mitchell,
        FilterType::Lanczos3 => fr::FilterType::Lanczos3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(width: u32, height: u32) -> RasterImage {
        RasterImage::new(DynamicImage::new_luma8(width, height)).expect("valid test image")
    }

    fn bounds() -> GeometryBounds {
        GeometryBounds {
            max_aspect: 3.0,
            min_short_side: 64,
            max_long_side: 4096,
        }
    }

    #[test]
    fn wide_image_is_center_cropped_to_max_aspect() {
        let image = DynamicImage::ImageLuma8(image::GrayImage::from_fn(12000, 2000, |x, _| {
            if x < 3000 || x >= 9000 {
                image::Luma([0])
            } else {
                image::Luma([200])
            }
        }));
        let cropped = crop_to_max_aspect(RasterImage::new(image).unwrap(), 3.0);

        assert_eq!(cropped.dimensions(), (6000, 2000));
        // 两侧各丢弃 3000 像素，剩下的全部是中间区域
        let luma = cropped.as_dynamic().to_luma8();
        assert_eq!(luma.get_pixel(0, 0).0, [200]);
        assert_eq!(luma.get_pixel(5999, 1999).0, [200]);
    }

    #[test]
    fn tall_image_is_center_cropped_on_height_only() {
        let cropped = crop_to_max_aspect(gray(100, 500), 3.0);
        assert_eq!(cropped.dimensions(), (100, 300));
    }

    #[test]
    fn aspect_within_limit_is_untouched() {
        let cropped = crop_to_max_aspect(gray(300, 100), 3.0);
        assert_eq!(cropped.dimensions(), (300, 100));
    }

    #[test]
    fn small_square_is_scaled_up_to_short_side_floor() {
        let normalized = normalize(gray(40, 40), bounds(), FilterType::Lanczos3);
        assert_eq!(normalized.dimensions(), (64, 64));
    }

    #[test]
    fn oversized_image_is_scaled_down_to_long_side_ceiling() {
        let normalized = normalize(gray(5000, 2500), bounds(), FilterType::Triangle);
        assert_eq!(normalized.dimensions(), (4096, 2048));
    }

    #[test]
    fn long_side_ceiling_wins_when_both_constraints_trigger() {
        assert_eq!(target_dimensions(50, 140, 64, 100), Some((36, 100)));
        assert_eq!(target_dimensions(1, 4000, 64, 4096), Some((1, 4096)));
    }

    #[test]
    fn normalized_image_is_returned_unchanged() {
        let first = normalize(gray(1000, 200), bounds(), FilterType::Lanczos3);
        let dims = first.dimensions();
        let second = normalize(first, bounds(), FilterType::Lanczos3);
        assert_eq!(second.dimensions(), dims);
        assert_eq!(target_dimensions(dims.0, dims.1, 64, 4096), None);
    }

    #[test]
    fn downscaled_wide_image_is_a_fixed_point() {
        let first = normalize(gray(12000, 2000), bounds(), FilterType::Triangle);
        let (w, h) = first.dimensions();
        assert_eq!((w, h), (4095, 1365));
        assert!(w as f64 / h as f64 <= 3.0);

        let second = normalize(first, bounds(), FilterType::Triangle);
        assert_eq!(second.dimensions(), (w, h));
    }

    #[test]
    fn resize_output_is_rgba_with_expected_len() {
        let resized = resize_within_bounds(gray(10, 20), 64, 4096, FilterType::CatmullRom);
        assert_eq!(resized.dimensions(), (64, 128));
        assert_eq!(resized.as_dynamic().to_rgba8().into_raw().len(), 64 * 128 * 4);
    }
}
