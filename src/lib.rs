//! # FindThings 物品识别：库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  调用方（CLI / 物品库导入）                               │
//! │       │  ImageSource（字节 / Base64 / 文件）              │
//! └───────┼──────────────────────────────────────────────────┘
//!         ↓
//! ┌───────┼──────────────────────────────────────────────────┐
//! │  vision::VisionPipeline                                  │
//! │   ├─ loader     加载 + 体积 / 签名 / 像素校验              │
//! │   ├─ geometry   3:1 居中裁剪 + 64~4096 等比缩放           │
//! │   ├─ encoder    JPEG 质量回退（≤ 4MB）                    │
//! │   └─ form       image=<严格百分号编码>                     │
//! │       ↓                                                  │
//! │  vision::DetectionClient（节流 + 超时 + 有界重试）        │
//! │       ↓                                                  │
//! │   ├─ response   容错解析（score 数字 / 字符串）            │
//! │   ├─ cropper    归一化坐标系裁剪 + 越界钳制                │
//! │   └─ category   细标签 → 粗类别                           │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError`，CLI 与调用方的返回类型 |
//! | [`vision`] | 从图片到“裁剪子图 + 粗类别”的完整识别流水线 |

pub mod error;
pub mod vision;
