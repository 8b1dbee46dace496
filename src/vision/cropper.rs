//! # 区域裁剪模块
//!
//! 识别矩形使用的是“实际发送给检测服务的图片”（归一化后）的坐标空间，
//! 调用方必须传入归一化后的图片，而不是原始输入图片。
//!
//! 裁剪前先把矩形钳制到图片范围内；钳制后为空的矩形返回 `EmptyRegion`，
//! 批量处理时用整张源图替代，保证单个坏区域不会中断整批。

use super::category::coarsen;
use super::source::{CroppedRegionImage, DetectedRegion, PixelRect, RasterImage};
use super::VisionError;

/// 钳制到图片范围后的裁剪区域。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// 将矩形钳制到 `image_width x image_height` 范围内。
pub fn clamp_rect(
    rect: PixelRect,
    image_width: u32,
    image_height: u32,
) -> Result<CropRegion, VisionError> {
    let (image_width, image_height) = (image_width as i64, image_height as i64);
    let x = rect.left.max(0);
    let y = rect.top.max(0);
    let width = rect.width.min(image_width - x);
    let height = rect.height.min(image_height - y);

    if width <= 0 || height <= 0 {
        return Err(VisionError::EmptyRegion(format!(
            "矩形 ({}, {}, {}x{}) 钳制到 {}x{} 后为空",
            rect.left, rect.top, rect.width, rect.height, image_width, image_height
        )));
    }

    Ok(CropRegion {
        x: x as u32,
        y: y as u32,
        width: width as u32,
        height: height as u32,
    })
}

/// 按矩形裁剪出深拷贝子图。
pub fn crop(source: &RasterImage, rect: PixelRect) -> Result<RasterImage, VisionError> {
    let region = clamp_rect(rect, source.width(), source.height())?;
    RasterImage::new(
        source
            .as_dynamic()
            .crop_imm(region.x, region.y, region.width, region.height),
    )
}

/// 批量裁剪并归类；空区域以整张源图替代。
pub fn crop_regions(source: &RasterImage, regions: Vec<DetectedRegion>) -> Vec<CroppedRegionImage> {
    regions
        .into_iter()
        .map(|region| {
            let (image, used_full_image) = match crop(source, region.rect) {
                Ok(image) => (image, false),
                Err(err) => {
                    log::warn!("⚠️ 区域「{}」裁剪失败，改用整张图片：{}", region.label, err);
                    (source.clone(), true)
                }
            };
            let category = coarsen(&region.label);

            CroppedRegionImage {
                image,
                region,
                category,
                used_full_image,
            }
        })
        .collect()
}
