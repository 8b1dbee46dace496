//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `VisionConfig`，保证运行时行为可观测、可调整、可测试。
//! 其中编码档位（quality / balanced / speed）作为高层语义，映射到底层参数组合。
//!
//! ## 实现思路
//!
//! - `Default` 提供与识别服务限制一致的生产配置（4MB、3:1、64~4096 像素）。
//! - 支持从 JSON 文件加载，缺失字段取默认值；访问令牌可由环境变量覆盖。
//! - `validate` 在流水线入口统一校验，避免非法参数进入编码循环。

use std::path::Path;
use std::time::Duration;

use image::imageops::FilterType;
use serde::Deserialize;

use super::VisionError;

/// 默认多物体检测接口地址。
pub const DEFAULT_ENDPOINT: &str =
    "https://aip.baidubce.com/rest/2.0/image-classify/v1/multi_object_detect";

/// 访问令牌环境变量名。
pub const ACCESS_TOKEN_ENV: &str = "FINDTHINGS_ACCESS_TOKEN";

/// 识别流水线配置。
///
/// 字段覆盖了加载、几何归一化、编码预算、请求节流与重试五个阶段。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// 允许的最大宽高比（长边 / 短边）。
    pub max_aspect: f32,
    /// 归一化后短边下限（像素）。
    pub min_short_side: u32,
    /// 归一化后长边上限（像素）。
    pub max_long_side: u32,
    /// base64 与表单编码后各自允许的最大字节数。
    pub max_bytes: usize,
    /// 初始 JPEG 质量（0~1）。
    pub initial_quality: f32,
    /// 最低 JPEG 质量，低于该值即判定超出预算。
    pub min_quality: f32,
    /// 每轮降低的质量步长。
    pub quality_step: f32,
    /// 读取原始字节时允许的最大文件体积（字节）。
    pub max_file_size: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 检测接口地址。
    pub endpoint: String,
    /// 访问令牌，以查询参数 `access_token` 附加在接口地址上。
    pub access_token: Option<String>,
    /// 两次请求之间的最小间隔（毫秒）。
    pub min_request_interval_ms: u64,
    /// 单次请求的绝对超时（秒）。
    pub request_timeout_secs: u64,
    /// 建立连接超时（秒）。
    pub connect_timeout_secs: u64,
    /// 限流 / 网络瞬时错误时的最大尝试次数（含首次）。
    pub max_attempts: u32,
    /// 线性退避基准间隔（毫秒），第 n 次重试等待 `n * base`。
    pub retry_base_delay_ms: u64,
    /// 导出裁剪子图时使用的 JPEG 质量。
    pub region_jpeg_quality: f32,
    /// 缩放滤镜策略。
    #[serde(skip)]
    pub resize_filter: FilterType,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            max_aspect: 3.0,
            min_short_side: 64,
            max_long_side: 4096,
            max_bytes: 4 * 1024 * 1024,
            initial_quality: 0.9,
            min_quality: 0.2,
            quality_step: 0.1,
            max_file_size: 50 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            access_token: None,
            min_request_interval_ms: 1_000,
            request_timeout_secs: 15,
            connect_timeout_secs: 8,
            max_attempts: 3,
            retry_base_delay_ms: 1_000,
            region_jpeg_quality: 0.9,
            resize_filter: FilterType::Lanczos3,
        }
    }
}

/// 编码档位（面向产品/用户语义）。
///
/// - `Quality`：尽量保真，质量下限较高
/// - `Balanced`：与识别服务推荐参数一致
/// - `Speed`：更低起始质量，更快满足预算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisionProfile {
    Quality,
    Balanced,
    Speed,
}

impl VisionProfile {
    /// 从外部字符串解析档位。
    pub fn parse(profile: &str) -> Result<Self, VisionError> {
        match profile.trim().to_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            "speed" => Ok(Self::Speed),
            other => Err(VisionError::InvalidConfig(format!(
                "未知编码档位：{}（可选：quality / balanced / speed）",
                other
            ))),
        }
    }

    /// 将档位输出为稳定字符串。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Balanced => "balanced",
            Self::Speed => "speed",
        }
    }
}

impl VisionConfig {
    /// 从 JSON 文件加载配置，缺失字段取默认值。
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, VisionError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| VisionError::FileSystem(format!("无法读取配置文件 {}：{}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| VisionError::InvalidConfig(format!("解析配置文件失败：{}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// 若设置了 `FINDTHINGS_ACCESS_TOKEN`，用其覆盖访问令牌。
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            let token = token.trim();
            if !token.is_empty() {
                self.access_token = Some(token.to_string());
            }
        }
        self
    }

    /// 校验参数组合是否合法。
    pub fn validate(&self) -> Result<(), VisionError> {
        if !self.max_aspect.is_finite() || self.max_aspect < 1.0 {
            return Err(VisionError::InvalidConfig(format!(
                "max_aspect 必须 >= 1.0，当前：{}",
                self.max_aspect
            )));
        }
        if self.min_short_side == 0 {
            return Err(VisionError::InvalidConfig("min_short_side 必须 > 0".to_string()));
        }
        if self.max_long_side < self.min_short_side {
            return Err(VisionError::InvalidConfig(format!(
                "max_long_side（{}）不能小于 min_short_side（{}）",
                self.max_long_side, self.min_short_side
            )));
        }
        if self.max_bytes <= super::form::FORM_FIELD_PREFIX.len() {
            return Err(VisionError::InvalidConfig(format!(
                "max_bytes 过小：{}",
                self.max_bytes
            )));
        }
        if !(self.min_quality > 0.0
            && self.min_quality <= self.initial_quality
            && self.initial_quality <= 1.0)
        {
            return Err(VisionError::InvalidConfig(format!(
                "质量参数必须满足 0 < min_quality（{}）<= initial_quality（{}）<= 1",
                self.min_quality, self.initial_quality
            )));
        }
        if !(self.quality_step > 0.0 && self.quality_step <= 1.0) {
            return Err(VisionError::InvalidConfig(format!(
                "quality_step 必须在 (0, 1] 之间，当前：{}",
                self.quality_step
            )));
        }
        if !(self.region_jpeg_quality > 0.0 && self.region_jpeg_quality <= 1.0) {
            return Err(VisionError::InvalidConfig(format!(
                "region_jpeg_quality 必须在 (0, 1] 之间，当前：{}",
                self.region_jpeg_quality
            )));
        }
        if self.max_attempts == 0 || self.max_attempts > 10 {
            return Err(VisionError::InvalidConfig("max_attempts 必须在 1~10 之间".to_string()));
        }
        if !(1..=120).contains(&self.request_timeout_secs) {
            return Err(VisionError::InvalidConfig(
                "request_timeout_secs 必须在 1~120 秒之间".to_string(),
            ));
        }
        if !(1..=120).contains(&self.connect_timeout_secs) {
            return Err(VisionError::InvalidConfig(
                "connect_timeout_secs 必须在 1~120 秒之间".to_string(),
            ));
        }
        if self.endpoint.trim().is_empty() {
            return Err(VisionError::InvalidConfig("endpoint 不能为空".to_string()));
        }

        Ok(())
    }

    /// 基于当前参数反推编码档位。
    pub fn infer_profile(&self) -> VisionProfile {
        if self.min_quality >= 0.5 {
            return VisionProfile::Quality;
        }
        if self.initial_quality <= 0.75 {
            return VisionProfile::Speed;
        }
        VisionProfile::Balanced
    }

    /// 应用指定档位到实际参数。
    pub fn apply_profile(&mut self, profile: VisionProfile) {
        match profile {
            VisionProfile::Quality => {
                self.initial_quality = 0.95;
                self.min_quality = 0.5;
                self.quality_step = 0.05;
                self.resize_filter = FilterType::Lanczos3;
            }
            VisionProfile::Balanced => {
                self.initial_quality = 0.9;
                self.min_quality = 0.2;
                self.quality_step = 0.1;
                self.resize_filter = FilterType::Lanczos3;
            }
            VisionProfile::Speed => {
                self.initial_quality = 0.75;
                self.min_quality = 0.2;
                self.quality_step = 0.15;
                self.resize_filter = FilterType::Triangle;
            }
        }
    }

    pub(crate) fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub(crate) fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub(crate) fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}
