//! # 物品识别模块（vision）
//!
//! ## 设计思路
//!
//! 该模块将“图片加载 → 几何归一化 → 自适应编码 → 严格表单 → 提交识别 → 解析 → 裁剪归类”
//! 按职责拆分为多个子模块，每个阶段都是可单独测试的纯函数或小型结构体。
//!
//! - `handler`：编排整条处理流水线
//! - `loader`：负责内存 / Base64 / 文件加载与体积、签名、像素校验
//! - `geometry`：宽高比裁剪与尺寸约束缩放
//! - `encoder`：JPEG 质量逐级回退，直到满足体积预算
//! - `form`：严格百分号编码的 `image=` 表单体
//! - `client` / `rate_limit`：请求节流、超时与有界重试
//! - `response`：容错解析识别结果
//! - `cropper` / `category`：按矩形裁剪并映射为粗类别
//! - `config/error/source`：配置、错误、中间数据模型
//!
//! ## 实现思路
//!
//! 对外只暴露流水线入口与结果类型；各阶段函数也公开，便于离线调试单个阶段。
//! 请求节流状态由 `DetectionClient` 持有，不使用进程级全局状态。
//!
//! ## 调用链
//!
//! ```text
//! ImageSource
//!    ↓
//! handler.rs（统一编排 + 阶段耗时日志）
//!    ├─ loader.rs（加载 + 体积 / 签名 / 像素校验）
//!    ├─ geometry.rs（裁到 3:1 以内 + 64~4096 缩放）
//!    ├─ encoder.rs + form.rs（质量回退 + image= 表单）
//!    ├─ client.rs（节流 + 超时 + 重试）→ response.rs（解析）
//!    └─ cropper.rs + category.rs（在归一化图片上裁剪 + 归类）
//!    ↓
//! Vec<CroppedRegionImage>
//! ```
//!
//! ## 分层职责建议
//!
//! - 服务端限制变更（体积 / 尺寸）优先改 `config.rs`
//! - 业务流程顺序变更优先改 `handler.rs`
//! - 新增物品标签优先改 `category.rs` 的映射表

mod category;
mod client;
mod config;
mod cropper;
mod encoder;
mod error;
mod form;
mod geometry;
mod handler;
mod loader;
mod rate_limit;
mod response;
mod source;

pub use category::{CoarseCategory, coarsen};
pub use client::{DetectionClient, DetectionTransport, HttpTransport, TransportResponse};
pub use config::{ACCESS_TOKEN_ENV, DEFAULT_ENDPOINT, VisionConfig, VisionProfile};
pub use cropper::{CropRegion, clamp_rect, crop, crop_regions};
pub use encoder::{EncodeBudget, encode_jpeg, encode_under_budget};
pub use error::VisionError;
pub use form::{
    FORM_CONTENT_TYPE, FORM_FIELD_PREFIX, build_form, percent_decode_form_value,
    percent_encode_strict, strict_encoded_len,
};
pub use geometry::{GeometryBounds, crop_to_max_aspect, normalize, resize_within_bounds, target_dimensions};
pub use handler::VisionPipeline;
pub use rate_limit::RateLimiter;
pub use response::{DetectionSummary, WireScore, parse_detections, parse_detections_with_summary};
pub use source::{
    CroppedRegionImage, DetectedRegion, EncodingAttempt, ImageSource, PixelRect, PreparedPayload,
    RasterImage,
};
