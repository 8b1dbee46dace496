//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载识别链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! ## 错误分级
//!
//! - 致命：`Decode` / `Encode` / `BudgetExceeded` / `FormBuild` / `Parse` / `Timeout` / `Service` / `Worker`
//! - 可重试：`Network` / `RateLimited`（由 `DetectionClient` 有界重试）
//! - 单条可恢复：`MalformedRegion` / `EmptyRegion`（丢弃或整图替代，不影响整批）

/// 识别流水线统一错误类型。
///
/// 该类型会在 crate 顶层被上转为 `AppError`。
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("解码错误：{0}")]
    Decode(String),

    #[error("编码错误：{0}")]
    Encode(String),

    /// 质量降到下限仍无法同时满足 base64 与表单体积上限。
    #[error(
        "无法满足 {max_bytes} 字节限制（质量降到 {min_quality:.2} 仍超过：base64={base64_len}B 表单={form_len}B），请尝试更低分辨率图片"
    )]
    BudgetExceeded {
        max_bytes: usize,
        min_quality: f32,
        base64_len: usize,
        form_len: usize,
    },

    #[error("构造表单请求体失败：{0}")]
    FormBuild(String),

    #[error("网络错误：{0}")]
    Network(String),

    #[error("请求过于频繁：{0}")]
    RateLimited(String),

    #[error("超时错误：{0}")]
    Timeout(String),

    #[error("响应解析失败：{0}")]
    Parse(String),

    #[error("识别结果条目无效：{0}")]
    MalformedRegion(String),

    #[error("裁剪区域为空：{0}")]
    EmptyRegion(String),

    #[error("服务端错误（error_code={code}）：{message}")]
    Service { code: i64, message: String },

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("配置无效：{0}")]
    InvalidConfig(String),

    #[error("后台任务执行失败：{0}")]
    Worker(String),
}

impl VisionError {
    /// 是否属于瞬时错误（允许有界重试）。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimited(_))
    }
}

impl From<VisionError> for String {
    fn from(error: VisionError) -> Self {
        error.to_string()
    }
}
