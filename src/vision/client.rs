//! # 检测请求模块
//!
//! ## 设计思路
//!
//! 把“发送表单并拿到响应字节”抽象为 `DetectionTransport`，真实实现基于 reqwest，
//! 测试中可替换为内存假实现。重试、节流、超时等策略集中在 `DetectionClient`，
//! 与具体传输方式无关。
//!
//! ## 实现思路
//!
//! - 每次尝试前先经过调用方持有的 `RateLimiter`。
//! - 每次尝试有独立的绝对超时；超时直接失败，不再重试。
//! - 限流（HTTP 429 / 服务端限流错误码）与网络瞬时错误按线性退避重试，
//!   重试时重新提交同一份载荷，不重新编码。

use std::future::Future;
use std::time::Duration;

use super::form::FORM_CONTENT_TYPE;
use super::rate_limit::RateLimiter;
use super::response::parse_detections;
use super::source::DetectedRegion;
use super::{VisionConfig, VisionError};

/// 传输层响应。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 表单提交通道。
pub trait DetectionTransport: Send + Sync {
    fn post_form(
        &self,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<TransportResponse, VisionError>> + Send;
}

/// 基于 reqwest 的 HTTP 传输实现。
pub struct HttpTransport {
    client: reqwest::Client,
    url: reqwest::Url,
    timeout_secs: u64,
}

impl HttpTransport {
    pub fn new(config: &VisionConfig) -> Result<Self, VisionError> {
        let url = match config.access_token.as_deref() {
            Some(token) => reqwest::Url::parse_with_params(&config.endpoint, &[("access_token", token)]),
            None => reqwest::Url::parse(&config.endpoint),
        }
        .map_err(|e| VisionError::InvalidConfig(format!("接口地址无效：{}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| VisionError::Network(format!("无法创建 HTTP 客户端：{}", e)))?;

        Ok(Self {
            client,
            url,
            timeout_secs: config.request_timeout_secs,
        })
    }

    /// 去掉查询参数，避免访问令牌进入日志。
    fn redacted_url(&self) -> String {
        let mut url = self.url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.to_string()
    }

    fn map_reqwest_error(&self, e: reqwest::Error) -> VisionError {
        let (is_timeout, is_connect) = (e.is_timeout(), e.is_connect());
        let message = e.without_url().to_string();
        if is_timeout {
            VisionError::Timeout(format!("请求超时（{}秒）", self.timeout_secs))
        } else if is_connect {
            VisionError::Network(format!("无法连接：{}", message))
        } else {
            VisionError::Network(format!("请求失败：{}", message))
        }
    }
}

impl DetectionTransport for HttpTransport {
    async fn post_form(&self, body: Vec<u8>) -> Result<TransportResponse, VisionError> {
        log::debug!("🌐 提交识别请求 - {} ({}B)", self.redacted_url(), body.len());

        let response = self
            .client
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_reqwest_error(e))?
            .to_vec();

        Ok(TransportResponse { status, body })
    }
}

/// 检测服务客户端：节流 + 超时 + 有界重试。
pub struct DetectionClient<T> {
    transport: T,
    limiter: RateLimiter,
    request_timeout: Duration,
    max_attempts: u32,
    retry_base_delay: Duration,
}

impl DetectionClient<HttpTransport> {
    /// 基于配置创建 HTTP 客户端。
    pub fn from_config(config: &VisionConfig) -> Result<Self, VisionError> {
        Ok(Self::with_transport(HttpTransport::new(config)?, config))
    }
}

impl<T: DetectionTransport> DetectionClient<T> {
    pub fn with_transport(transport: T, config: &VisionConfig) -> Self {
        Self {
            transport,
            limiter: RateLimiter::new(config.min_request_interval()),
            request_timeout: config.request_timeout(),
            max_attempts: config.max_attempts.max(1),
            retry_base_delay: config.retry_base_delay(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// 提交表单体并解析识别结果。
    pub async fn detect(&self, form_body: &[u8]) -> Result<Vec<DetectedRegion>, VisionError> {
        let mut attempt = 1;
        loop {
            match self.attempt_once(form_body, attempt).await {
                Ok(regions) => return Ok(regions),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.retry_base_delay * attempt;
                    log::warn!(
                        "🔄 第 {}/{} 次识别失败，{}ms 后重试：{}",
                        attempt,
                        self.max_attempts,
                        delay.as_millis(),
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    log::error!("❌ 识别请求失败（第 {} 次）：{}", attempt, err);
                    return Err(err);
                }
            }
        }
    }

    async fn attempt_once(
        &self,
        form_body: &[u8],
        attempt: u32,
    ) -> Result<Vec<DetectedRegion>, VisionError> {
        self.limiter.acquire().await;
        log::info!("🚀 发送识别请求（第 {} 次，{}B）", attempt, form_body.len());

        let response = tokio::time::timeout(
            self.request_timeout,
            self.transport.post_form(form_body.to_vec()),
        )
        .await
        .map_err(|_| {
            VisionError::Timeout(format!("请求超过 {}ms 未完成", self.request_timeout.as_millis()))
        })??;

        Self::classify_status(&response)?;
        parse_detections(&response.body)
    }

    fn classify_status(response: &TransportResponse) -> Result<(), VisionError> {
        if response.is_success() {
            return Ok(());
        }

        let snippet: String = String::from_utf8_lossy(&response.body).chars().take(200).collect();
        Err(match response.status {
            429 => VisionError::RateLimited(format!("HTTP 429 {}", snippet)),
            500..=599 => VisionError::Network(format!("HTTP {} 服务器错误", response.status)),
            status => VisionError::Service {
                code: status as i64,
                message: snippet,
            },
        })
    }
}
