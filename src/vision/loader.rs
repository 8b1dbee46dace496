//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源（内存字节 / Base64 / 本地文件）的原始字节加载，并在解码前尽早校验：
//! 体积、文件签名、头部声明的像素尺寸。目标是尽快失败，避免为超大或伪造的输入分配内存。
//!
//! ## 实现思路
//!
//! - Base64：支持 Data URL，解码前按长度估算体积上限。
//! - 文件：存在性 + metadata 体积限制 + 读取。
//! - 解码：先读头部尺寸校验像素上限，再完整解码。

use std::io::Cursor;
use std::path::Path;

use base64::{Engine as _, engine::general_purpose};

use super::source::{RawImageData, RasterImage};
use super::{ImageSource, VisionConfig, VisionError, VisionPipeline};

const DATA_URL_BASE64_MARKER: &str = ";base64,";

impl VisionPipeline {
    /// 按来源加载原始字节。
    pub(crate) fn load(&self, source: ImageSource) -> Result<RawImageData, VisionError> {
        match source {
            ImageSource::Bytes(bytes) => Self::load_from_bytes(bytes, &self.config),
            ImageSource::Base64(data) => Self::load_from_base64(&data, &self.config),
            ImageSource::FilePath(path) => Self::load_from_file(&path, &self.config),
        }
    }

    fn load_from_bytes(bytes: Vec<u8>, config: &VisionConfig) -> Result<RawImageData, VisionError> {
        if bytes.len() as u64 > config.max_file_size {
            return Err(VisionError::ResourceLimit(format!(
                "图片体积过大：{:.2} MB（限制：{:.2} MB）",
                bytes.len() as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "bytes",
        })
    }

    /// 从 Base64 字符串加载图片原始字节。
    fn load_from_base64(data: &str, config: &VisionConfig) -> Result<RawImageData, VisionError> {
        log::info!("📝 开始处理 base64 图片");

        let bytes = Self::parse_base64_with_limit(data, config.max_file_size)?;
        if bytes.len() as u64 > config.max_file_size {
            return Err(VisionError::ResourceLimit(format!(
                "Base64 解码后体积过大：{:.2} MB（限制：{:.2} MB）",
                bytes.len() as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "base64",
        })
    }

    /// 从本地路径加载图片原始字节。
    fn load_from_file(path: &str, config: &VisionConfig) -> Result<RawImageData, VisionError> {
        log::info!("📁 开始读取本地图片 - 路径: {}", path);

        let file_path = Path::new(path);
        if !file_path.exists() {
            return Err(VisionError::FileSystem(format!("文件不存在：{}", path)));
        }

        let metadata = std::fs::metadata(file_path)
            .map_err(|e| VisionError::FileSystem(format!("无法读取文件信息：{}", e)))?;
        if metadata.len() > config.max_file_size {
            return Err(VisionError::ResourceLimit(format!(
                "文件过大：{:.2} MB（限制：{:.2} MB）",
                metadata.len() as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        let bytes = std::fs::read(file_path)
            .map_err(|e| VisionError::FileSystem(format!("无法读取图片文件：{}", e)))?;
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "file",
        })
    }

    /// 解码原始字节；先按头部尺寸校验像素上限。
    pub(crate) fn decode(&self, raw: RawImageData) -> Result<RasterImage, VisionError> {
        let (header_width, header_height) = Self::inspect_dimensions_from_memory(&raw.bytes)?;
        Self::validate_pixel_limits(&self.config, header_width, header_height)?;

        let image = RasterImage::decode(&raw.bytes)?;
        let (width, height) = image.dimensions();
        Self::validate_pixel_limits(&self.config, width, height)?;

        log::debug!("🖼️ 解码完成 - 来源: {} 尺寸: {}x{}", raw.source_hint, width, height);
        Ok(image)
    }

    fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), VisionError> {
        image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| VisionError::InvalidFormat(format!("无法识别图片格式：{}", e)))?
            .into_dimensions()
            .map_err(|e| VisionError::Decode(format!("无法读取图片尺寸：{}", e)))
    }

    fn validate_pixel_limits(
        config: &VisionConfig,
        width: u32,
        height: u32,
    ) -> Result<(), VisionError> {
        let pixels = (width as u64)
            .checked_mul(height as u64)
            .ok_or_else(|| VisionError::ResourceLimit("图片像素数溢出".to_string()))?;

        if pixels > config.max_decoded_pixels {
            return Err(VisionError::ResourceLimit(format!(
                "图片像素过大：{} 像素（限制：{} 像素）",
                pixels, config.max_decoded_pixels
            )));
        }

        Ok(())
    }

    fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> Result<u64, VisionError> {
        let len = base64_data.trim().len() as u64;
        let groups = len
            .checked_add(3)
            .ok_or_else(|| VisionError::ResourceLimit("Base64 输入长度溢出".to_string()))?
            / 4;

        groups
            .checked_mul(3)
            .ok_or_else(|| VisionError::ResourceLimit("Base64 解码体积估算溢出".to_string()))
    }

    /// 解析 Base64 输入（支持 Data URL / 纯 Base64）。
    fn parse_base64_with_limit(data: &str, max_file_size: u64) -> Result<Vec<u8>, VisionError> {
        let normalized = data.trim();

        let base64_data = if normalized.starts_with("data:image/") {
            let marker = normalized
                .find(DATA_URL_BASE64_MARKER)
                .ok_or_else(|| VisionError::InvalidFormat("缺少 base64 标记".to_string()))?;
            &normalized[marker + DATA_URL_BASE64_MARKER.len()..]
        } else {
            normalized
        };

        let estimated_len = Self::estimate_base64_decoded_upper_bound_len(base64_data)?;
        if estimated_len > max_file_size {
            return Err(VisionError::ResourceLimit(format!(
                "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
                estimated_len as f64 / 1024.0 / 1024.0,
                max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        general_purpose::STANDARD
            .decode(base64_data)
            .map_err(|e| VisionError::Decode(format!("Base64 解码失败：{}", e)))
    }

    /// 通过文件签名（magic bytes）校验输入是否为图片。
    fn validate_image_signature(bytes: &[u8]) -> Result<(), VisionError> {
        if bytes.is_empty() {
            return Err(VisionError::InvalidFormat("图片内容为空".to_string()));
        }

        let kind = infer::get(bytes)
            .ok_or_else(|| VisionError::InvalidFormat("无法识别图片类型".to_string()))?;
        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(VisionError::InvalidFormat(format!(
                "文件签名不是图片类型：{}",
                kind.mime_type()
            )));
        }

        Ok(())
    }
}
