//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `VisionPipeline` 只负责流程编排与配置持有，不直接处理网络细节。
//! 处理链路固定为：
//! 1. 按来源加载原始字节
//! 2. 解码并做几何归一化
//! 3. 自适应编码到预算以内并构造表单
//! 4. 提交识别（由 `DetectionClient` 负责节流与重试）
//! 5. 在归一化后的图片上裁剪并归类
//!
//! ## 实现思路
//!
//! - 构造时校验配置，非法参数不会进入编码循环。
//! - 解码、缩放与编码是 CPU 密集操作，异步链路通过 `spawn_blocking` 放到阻塞线程池执行。
//! - 记录 `load/normalize/encode/detect/crop/total` 阶段耗时，便于性能诊断。

use std::time::Instant;

use super::client::{DetectionClient, DetectionTransport};
use super::cropper::crop_regions;
use super::encoder::{EncodeBudget, encode_under_budget};
use super::geometry::{GeometryBounds, normalize};
use super::response::parse_detections;
use super::source::{CroppedRegionImage, PreparedPayload, RasterImage};
use super::{ImageSource, VisionConfig, VisionError};

/// 识别流水线。
#[derive(Debug, Clone)]
pub struct VisionPipeline {
    pub(super) config: VisionConfig,
}

impl VisionPipeline {
    /// 根据配置创建流水线。
    ///
    /// # 示例
    /// ```rust,ignore
    /// use findthings_vision::vision::{ImageSource, VisionConfig, VisionPipeline};
    ///
    /// let pipeline = VisionPipeline::new(VisionConfig::default())?;
    /// let prepared = pipeline.prepare(ImageSource::FilePath("desk.jpg".into()))?;
    /// # Ok::<(), findthings_vision::vision::VisionError>(())
    /// ```
    pub fn new(config: VisionConfig) -> Result<Self, VisionError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    /// 加载、归一化并编码，得到可直接提交的载荷。
    pub fn prepare(&self, source: ImageSource) -> Result<PreparedPayload, VisionError> {
        let total_start = Instant::now();

        let load_start = Instant::now();
        let raw = self.load(source)?;
        let decoded = self.decode(raw)?;
        let load_elapsed = load_start.elapsed();
        let original_size = decoded.dimensions();

        let normalize_start = Instant::now();
        let normalized = self.normalize(decoded);
        let normalize_elapsed = normalize_start.elapsed();

        let encode_start = Instant::now();
        let attempt = encode_under_budget(&normalized, EncodeBudget::from_config(&self.config))?;
        let form_body = attempt.form_body()?;
        let encode_elapsed = encode_start.elapsed();

        log::info!(
            "✅ 载荷准备完成 - {}x{} -> {}x{} 质量={:.2} 表单={}B | load={}ms normalize={}ms encode={}ms total={}ms",
            original_size.0,
            original_size.1,
            normalized.width(),
            normalized.height(),
            attempt.quality,
            form_body.len(),
            load_elapsed.as_millis(),
            normalize_elapsed.as_millis(),
            encode_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(PreparedPayload {
            normalized,
            original_size,
            attempt,
            form_body,
        })
    }

    /// `prepare` 的异步版本：在阻塞线程池中执行，不占用异步运行时的工作线程。
    pub async fn prepare_async(&self, source: ImageSource) -> Result<PreparedPayload, VisionError> {
        let pipeline = self.clone();
        tokio::task::spawn_blocking(move || pipeline.prepare(source))
            .await
            .map_err(|e| VisionError::Worker(format!("载荷准备线程执行失败：{}", e)))?
    }

    /// 按配置做几何归一化。
    pub fn normalize(&self, image: RasterImage) -> RasterImage {
        normalize(
            image,
            GeometryBounds::from_config(&self.config),
            self.config.resize_filter,
        )
    }

    /// 完整链路：准备载荷、提交识别、裁剪并归类。
    pub async fn analyze<T: DetectionTransport>(
        &self,
        source: ImageSource,
        client: &DetectionClient<T>,
    ) -> Result<Vec<CroppedRegionImage>, VisionError> {
        let total_start = Instant::now();
        let prepared = self.prepare_async(source).await?;

        let detect_start = Instant::now();
        let regions = client.detect(&prepared.form_body).await?;
        let detect_elapsed = detect_start.elapsed();

        let crop_start = Instant::now();
        let crops = crop_regions(&prepared.normalized, regions);
        let crop_elapsed = crop_start.elapsed();

        log::info!(
            "✅ 识别完成 - {} 个区域 | detect={}ms crop={}ms total={}ms",
            crops.len(),
            detect_elapsed.as_millis(),
            crop_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(crops)
    }

    /// 从已获得的响应体解析并裁剪（用于离线回放或自定义传输）。
    pub fn regions_from_response(
        &self,
        normalized: &RasterImage,
        body: &[u8],
    ) -> Result<Vec<CroppedRegionImage>, VisionError> {
        let regions = parse_detections(body)?;
        Ok(crop_regions(normalized, regions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::client::TransportResponse;
    use crate::vision::form::{FORM_FIELD_PREFIX, percent_decode_form_value};
    use base64::{Engine as _, engine::general_purpose};
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
    use std::io::Cursor;

    fn create_png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            let r = (x % 255) as u8;
            let g = (y % 255) as u8;
            let b = ((x + y) % 255) as u8;
            Rgba([r, g, b, 255])
        });

        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    struct CannedTransport(&'static str);

    impl DetectionTransport for CannedTransport {
        async fn post_form(&self, body: Vec<u8>) -> Result<TransportResponse, VisionError> {
            assert!(body.starts_with(FORM_FIELD_PREFIX.as_bytes()));
            Ok(TransportResponse {
                status: 200,
                body: self.0.as_bytes().to_vec(),
            })
        }
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = VisionConfig {
            max_aspect: 0.0,
            ..VisionConfig::default()
        };
        assert!(matches!(
            VisionPipeline::new(config),
            Err(VisionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn prepare_normalizes_and_encodes_within_budget() {
        let pipeline = VisionPipeline::new(VisionConfig::default()).unwrap();
        let prepared = pipeline
            .prepare(ImageSource::Bytes(create_png_bytes(600, 100)))
            .expect("prepare failed");

        assert_eq!(prepared.original_size, (600, 100));
        assert_eq!(prepared.normalized.dimensions(), (300, 100));
        assert!(prepared.form_body.len() <= pipeline.config().max_bytes);
        assert_eq!(prepared.form_body.len(), prepared.attempt.form_len);

        let encoded = std::str::from_utf8(&prepared.form_body[FORM_FIELD_PREFIX.len()..]).unwrap();
        let base64 = percent_decode_form_value(encoded).unwrap();
        let jpeg = general_purpose::STANDARD.decode(base64).unwrap();
        assert_eq!(jpeg, prepared.attempt.payload);
    }

    #[test]
    fn prepare_reports_budget_exceeded() {
        let config = VisionConfig {
            max_bytes: 64,
            ..VisionConfig::default()
        };
        let pipeline = VisionPipeline::new(config).unwrap();
        let result = pipeline.prepare(ImageSource::Bytes(create_png_bytes(256, 256)));
        assert!(matches!(result, Err(VisionError::BudgetExceeded { .. })));
    }

    #[tokio::test]
    async fn prepare_async_matches_prepare() {
        let pipeline = VisionPipeline::new(VisionConfig::default()).unwrap();
        let bytes = create_png_bytes(1200, 100);

        let blocking = pipeline.prepare(ImageSource::Bytes(bytes.clone())).unwrap();
        let offloaded = pipeline
            .prepare_async(ImageSource::Bytes(bytes))
            .await
            .expect("prepare_async failed");

        assert_eq!(offloaded.normalized.dimensions(), (300, 100));
        assert_eq!(offloaded.normalized.dimensions(), blocking.normalized.dimensions());
        assert_eq!(offloaded.form_body, blocking.form_body);
    }

    #[tokio::test]
    async fn prepare_async_propagates_pipeline_errors() {
        let pipeline = VisionPipeline::new(VisionConfig::default()).unwrap();
        let result = pipeline
            .prepare_async(ImageSource::Bytes(b"not an image".to_vec()))
            .await;
        assert!(result.is_err());
        assert!(!matches!(result, Err(VisionError::Worker(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn analyze_crops_in_normalized_coordinates() {
        let config = VisionConfig {
            min_request_interval_ms: 0,
            ..VisionConfig::default()
        };
        let pipeline = VisionPipeline::new(config.clone()).unwrap();
        let client = DetectionClient::with_transport(
            CannedTransport(
                r#"{"result":[
                    {"name":"T恤","score":"0.6","location":{"left":250,"top":50,"width":100,"height":100}},
                    {"name":"键盘","score":0.95,"location":{"left":0,"top":0,"width":20,"height":10}}
                ]}"#,
            ),
            &config,
        );

        let crops = pipeline
            .analyze(ImageSource::Bytes(create_png_bytes(900, 100)), &client)
            .await
            .expect("analyze failed");

        assert_eq!(crops.len(), 2);
        assert_eq!(crops[0].label(), "键盘");
        assert_eq!(crops[0].category.as_str(), "电子产品");
        assert_eq!(crops[1].label(), "T恤");
        // 归一化后为 300x100，矩形被钳制到 50x50
        assert_eq!(crops[1].image.dimensions(), (50, 50));
        assert!(!crops[1].used_full_image);
    }

    #[test]
    fn regions_from_response_uses_given_image() {
        let pipeline = VisionPipeline::new(VisionConfig::default()).unwrap();
        let normalized = RasterImage::decode(&create_png_bytes(100, 100)).unwrap();
        let body = r#"{"result":[{"name":"飞碟","score":0.3,"location":{"left":200,"top":0,"width":5,"height":5}}]}"#;

        let crops = pipeline.regions_from_response(&normalized, body.as_bytes()).unwrap();
        assert_eq!(crops.len(), 1);
        assert!(crops[0].used_full_image);
        assert_eq!(crops[0].image.dimensions(), (100, 100));
    }
}
