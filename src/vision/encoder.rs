//! # 自适应载荷编码模块
//!
//! ## 设计思路
//!
//! 以 JPEG 有损编码为基础，从初始质量开始逐级降低，直到同时满足：
//! - `len(base64(jpeg)) <= max_bytes`
//! - `len("image=" + percentEncode(base64(jpeg))) <= max_bytes`
//!
//! 只检查 base64 长度是不够的：`+`、`/`、`=` 在表单编码后会膨胀为 3 个字符。
//!
//! ## 实现思路
//!
//! - 质量由整数步序号推导（`initial - i * step`），严格单调递减，循环次数有上界。
//! - 返回“最后一次成功”的编码结果，不再重新编码。
//! - 质量降到下限仍超限时返回 `BudgetExceeded`，由调用方提示用户换更低分辨率图片。

use base64::{Engine as _, engine::general_purpose};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageEncoder, RgbImage};

use super::form::{FORM_FIELD_PREFIX, build_form, strict_encoded_len};
use super::source::{EncodingAttempt, RasterImage};
use super::{VisionConfig, VisionError};

/// 浮点步数计算的容差，避免 0.7 / 0.1 = 6.999… 少算一步。
const STEP_EPSILON: f32 = 1e-4;

/// 编码预算参数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeBudget {
    pub initial_quality: f32,
    pub min_quality: f32,
    pub quality_step: f32,
    pub max_bytes: usize,
}

impl EncodeBudget {
    pub fn from_config(config: &VisionConfig) -> Self {
        Self {
            initial_quality: config.initial_quality,
            min_quality: config.min_quality,
            quality_step: config.quality_step,
            max_bytes: config.max_bytes,
        }
    }

    /// 依次尝试的质量序列（含首尾）。
    pub fn quality_ladder(&self) -> Vec<f32> {
        if !(self.quality_step > 0.0) || self.initial_quality < self.min_quality {
            return vec![self.initial_quality];
        }

        let steps =
            ((self.initial_quality - self.min_quality) / self.quality_step + STEP_EPSILON).floor() as u32;
        (0..=steps)
            .map(|index| self.initial_quality - index as f32 * self.quality_step)
            .collect()
    }
}

impl EncodingAttempt {
    /// 由本次编码结果构造表单请求体。
    pub fn form_body(&self) -> Result<Vec<u8>, VisionError> {
        build_form(&general_purpose::STANDARD.encode(&self.payload))
    }
}

/// 逐级降低质量，直到同时满足 base64 与表单体积上限。
pub fn encode_under_budget(
    image: &RasterImage,
    budget: EncodeBudget,
) -> Result<EncodingAttempt, VisionError> {
    let rgb = flatten_alpha(image);
    let mut last_lengths = (0, 0);

    for quality in budget.quality_ladder() {
        let payload = encode_rgb_jpeg(&rgb, quality)?;
        let base64 = general_purpose::STANDARD.encode(&payload);
        let base64_len = base64.len();
        let form_len = FORM_FIELD_PREFIX.len() + strict_encoded_len(&base64);

        log::info!(
            "📦 当前质量：{:.2} | Base64: {}B | URL Encoded: {}B",
            quality,
            base64_len,
            form_len
        );

        if base64_len <= budget.max_bytes && form_len <= budget.max_bytes {
            return Ok(EncodingAttempt {
                quality,
                payload,
                base64_len,
                form_len,
            });
        }

        last_lengths = (base64_len, form_len);
    }

    log::warn!(
        "❌ 质量降到 {:.2} 仍超过 {} 字节限制",
        budget.min_quality,
        budget.max_bytes
    );

    Err(VisionError::BudgetExceeded {
        max_bytes: budget.max_bytes,
        min_quality: budget.min_quality,
        base64_len: last_lengths.0,
        form_len: last_lengths.1,
    })
}

/// 以指定质量（0~1）编码为 JPEG。
pub fn encode_jpeg(image: &RasterImage, quality: f32) -> Result<Vec<u8>, VisionError> {
    encode_rgb_jpeg(&flatten_alpha(image), quality)
}

fn encode_rgb_jpeg(rgb: &RgbImage, quality: f32) -> Result<Vec<u8>, VisionError> {
    let quality_percent = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality_percent);
    encoder
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| VisionError::Encode(format!("JPEG 编码失败：{}", e)))?;

    if buffer.is_empty() {
        return Err(VisionError::Encode("JPEG 编码器未产生输出".to_string()));
    }

    Ok(buffer)
}

/// 将透明通道合成到白色背景上（JPEG 不支持透明）。
pub(crate) fn flatten_alpha(image: &RasterImage) -> RgbImage {
    let dynamic = image.as_dynamic();
    if !dynamic.color().has_alpha() {
        return dynamic.to_rgb8();
    }

    let rgba = dynamic.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let inv_alpha = 1.0 - alpha;
        let blend = |c: u8| (c as f32 * alpha + 255.0 * inv_alpha).round() as u8;
        rgb.put_pixel(x, y, image::Rgb([blend(r), blend(g), blend(b)]));
    }

    rgb
}
