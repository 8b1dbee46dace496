//! # 识别响应解析模块
//!
//! ## 设计思路
//!
//! 检测服务的 `score` 字段有时是数字、有时是数字字符串，这里在解析边界用
//! 带标签的联合类型 `WireScore` 显式建模，解析后统一为 `f64`。
//!
//! ## 实现思路
//!
//! - 顶层 JSON 无效或缺少 `result` 数组：整体解析失败。
//! - 单条缺少 `name` 或 `location` 任一字段：仅丢弃该条（记录日志），其余照常返回。
//! - 响应体带 `error_code` 时按服务端错误处理，限流类错误码可重试。

use serde::Deserialize;
use serde_json::Value;

use super::source::{DetectedRegion, PixelRect};
use super::VisionError;

/// 服务端限流类错误码（并发 / QPS 超限）。
const RATE_LIMIT_ERROR_CODES: [i64; 2] = [4, 18];

/// 线上 `score` 字段：数字或数字字符串。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WireScore {
    Number(f64),
    Text(String),
}

impl WireScore {
    /// 归一化为数字，字符串解析失败时为 `0.0`。
    pub fn value(&self) -> f64 {
        match self {
            Self::Number(n) if n.is_finite() => *n,
            Self::Number(_) => 0.0,
            Self::Text(text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireLocation {
    left: i64,
    top: i64,
    width: i64,
    height: i64,
}

#[derive(Debug, Deserialize)]
struct WireDetection {
    name: String,
    #[serde(default)]
    score: Option<WireScore>,
    location: WireLocation,
}

#[derive(Debug, Deserialize)]
struct WireEnvelope {
    result: Option<Vec<Value>>,
    error_code: Option<i64>,
    error_msg: Option<String>,
}

/// 解析结果与丢弃统计。
#[derive(Debug, Clone, Default)]
pub struct DetectionSummary {
    pub regions: Vec<DetectedRegion>,
    pub dropped: usize,
}

/// 解析检测响应，返回按得分降序排列的区域列表。
pub fn parse_detections(body: &[u8]) -> Result<Vec<DetectedRegion>, VisionError> {
    parse_detections_with_summary(body).map(|summary| summary.regions)
}

/// 同 [`parse_detections`]，额外返回被丢弃的条目数。
pub fn parse_detections_with_summary(body: &[u8]) -> Result<DetectionSummary, VisionError> {
    let envelope: WireEnvelope = serde_json::from_slice(body)
        .map_err(|e| VisionError::Parse(format!("响应不是有效的 JSON 对象：{}", e)))?;

    if let Some(code) = envelope.error_code.filter(|code| *code != 0) {
        let message = envelope.error_msg.unwrap_or_default();
        return Err(if RATE_LIMIT_ERROR_CODES.contains(&code) {
            VisionError::RateLimited(format!("error_code={} {}", code, message))
        } else {
            VisionError::Service { code, message }
        });
    }

    let items = envelope
        .result
        .ok_or_else(|| VisionError::Parse("响应缺少 result 字段".to_string()))?;

    let mut summary = DetectionSummary::default();
    for (index, item) in items.into_iter().enumerate() {
        match parse_region(item) {
            Ok(region) => summary.regions.push(region),
            Err(err) => {
                log::warn!("⚠️ 丢弃第 {} 条识别结果：{}", index, err);
                summary.dropped += 1;
            }
        }
    }

    summary
        .regions
        .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    log::info!(
        "🔍 识别结果解析完成：保留 {} 条，丢弃 {} 条",
        summary.regions.len(),
        summary.dropped
    );

    Ok(summary)
}

fn parse_region(item: Value) -> Result<DetectedRegion, VisionError> {
    let wire: WireDetection =
        serde_json::from_value(item).map_err(|e| VisionError::MalformedRegion(e.to_string()))?;

    Ok(DetectedRegion {
        label: wire.name,
        score: wire.score.map(|s| s.value()).unwrap_or(0.0),
        rect: PixelRect {
            left: wire.location.left,
            top: wire.location.top,
            width: wire.location.width,
            height: wire.location.height,
        },
    })
}
