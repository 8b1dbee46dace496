//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `ImageSource` 表示外部来源语义
//! - `RawImageData` 表示已加载但未解码的字节
//! - `RasterImage` 表示已解码的像素数据（宽高均 >= 1）
//! - `EncodingAttempt` / `PreparedPayload` 表示满足预算的传输载荷
//! - `DetectedRegion` / `CroppedRegionImage` 表示识别与裁剪结果

use image::{DynamicImage, GenericImageView};
use serde::Serialize;

use super::category::CoarseCategory;
use super::VisionError;

/// 图片输入来源。
pub enum ImageSource {
    /// 已在内存中的原始字节。
    Bytes(Vec<u8>),
    /// Base64（支持 Data URL 与纯 Base64 字符串）。
    Base64(String),
    /// 本地文件路径来源。
    FilePath(String),
}

/// 加载阶段输出：原始字节与来源标识。
pub(crate) struct RawImageData {
    /// 原始图片字节。
    pub(crate) bytes: Vec<u8>,
    /// 来源提示（用于日志与诊断）。
    pub(crate) source_hint: &'static str,
}

/// 已解码的位图。
///
/// 每次几何变换都返回新的 `RasterImage`，不在原图上就地修改。
#[derive(Debug, Clone)]
pub struct RasterImage {
    inner: DynamicImage,
}

impl RasterImage {
    /// 包装已解码图像，拒绝宽或高为 0 的图像。
    pub fn new(inner: DynamicImage) -> Result<Self, VisionError> {
        if inner.width() == 0 || inner.height() == 0 {
            return Err(VisionError::Decode(format!(
                "图片尺寸无效：{}x{}",
                inner.width(),
                inner.height()
            )));
        }
        Ok(Self { inner })
    }

    /// 直接从内存字节解码（不做体积与像素上限校验）。
    pub fn decode(bytes: &[u8]) -> Result<Self, VisionError> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| VisionError::Decode(format!("图片解码失败：{}", e)))?;
        Self::new(decoded)
    }

    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.inner.dimensions()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.inner
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.inner
    }
}

/// 单次编码尝试的结果。
#[derive(Debug, Clone)]
pub struct EncodingAttempt {
    /// 本次使用的 JPEG 质量（0~1）。
    pub quality: f32,
    /// JPEG 字节。
    pub payload: Vec<u8>,
    /// base64 字符串长度（字节）。
    pub base64_len: usize,
    /// 完整表单体 `image=<percent-encoded>` 的长度（字节）。
    pub form_len: usize,
}

/// 满足预算、可直接发送的载荷。
///
/// `normalized` 记录了检测服务实际看到的坐标空间，后续裁剪必须基于它。
#[derive(Debug, Clone)]
pub struct PreparedPayload {
    pub normalized: RasterImage,
    pub original_size: (u32, u32),
    pub attempt: EncodingAttempt,
    pub form_body: Vec<u8>,
}

/// 检测服务返回的绝对像素矩形（可能越界，裁剪前需钳制）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixelRect {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

/// 单个识别结果。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedRegion {
    pub label: String,
    pub score: f64,
    pub rect: PixelRect,
}

/// 裁剪后的子图及其识别信息。
///
/// 子图为深拷贝，源图在此之后可以释放。
#[derive(Debug, Clone)]
pub struct CroppedRegionImage {
    pub image: RasterImage,
    pub region: DetectedRegion,
    pub category: CoarseCategory,
    /// 钳制后矩形为空、改用整张源图替代时为 `true`。
    pub used_full_image: bool,
}

impl CroppedRegionImage {
    pub fn label(&self) -> &str {
        &self.region.label
    }

    pub fn score(&self) -> f64 {
        self.region.score
    }

    /// 将子图编码为 JPEG，供下游持久化与展示。
    pub fn to_jpeg(&self, quality: f32) -> Result<Vec<u8>, VisionError> {
        super::encoder::encode_jpeg(&self.image, quality)
    }
}
