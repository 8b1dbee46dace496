//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，流水线内部错误 `VisionError`、文件读写错误与
//! 结果序列化错误都在这里汇合，CLI 入口只处理这一种错误类型。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `VisionError` / `std::io::Error` / `serde_json::Error` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串，便于以 JSON 输出给调用方。

use serde::Serialize;

use crate::vision::VisionError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 识别流水线错误（加载 / 编码 / 请求 / 解析）
    #[error("{0}")]
    Vision(#[from] VisionError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 结果序列化失败
    #[error("结果序列化失败: {0}")]
    Serialize(#[from] serde_json::Error),

    /// 命令行参数组合无效
    #[error("参数无效: {0}")]
    Usage(String),
}

impl AppError {
    /// 进程退出码：参数错误为 2，其余为 1。
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => 2,
            _ => 1,
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
