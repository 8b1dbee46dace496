//! # 严格表单编码模块
//!
//! 检测服务要求请求体为 `application/x-www-form-urlencoded`，且只有一个字段 `image`。
//! base64 会引入 `+`、`/`、`=`，这三个字符在表单中必须转义为 `%2B`、`%2F`、`%3D`，
//! 否则服务端会把 `+` 解析为空格导致图片损坏。
//!
//! 只保留 RFC 3986 非保留字符（字母、数字、`-` `_` `.` `~`），其余一律百分号编码。

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use super::VisionError;

/// 表单字段前缀。
pub const FORM_FIELD_PREFIX: &str = "image=";

/// 表单请求体的 Content-Type。
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// 需要转义的字符集合：除非保留字符外全部转义。
const STRICT_FORM_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// 对 base64 字符串做严格百分号编码。
pub fn percent_encode_strict(input: &str) -> String {
    utf8_percent_encode(input, STRICT_FORM_SET).to_string()
}

/// 计算 `percent_encode_strict(input).len()`，不分配新字符串。
pub fn strict_encoded_len(input: &str) -> usize {
    input
        .bytes()
        .map(|b| if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') { 1 } else { 3 })
        .sum()
}

/// 构造表单请求体：`image=<percent-encoded base64>`。
pub fn build_form(base64_payload: &str) -> Result<Vec<u8>, VisionError> {
    if base64_payload.is_empty() {
        return Err(VisionError::FormBuild("base64 载荷为空".to_string()));
    }

    let encoded = percent_encode_strict(base64_payload);
    let mut body = String::with_capacity(FORM_FIELD_PREFIX.len() + encoded.len());
    body.push_str(FORM_FIELD_PREFIX);
    body.push_str(&encoded);

    log::debug!(
        "🧪 表单前60字符：{}",
        body.chars().take(60).collect::<String>()
    );

    Ok(body.into_bytes())
}

/// 还原百分号编码（用于自检与测试）。
pub fn percent_decode_form_value(encoded: &str) -> Result<String, VisionError> {
    percent_decode_str(encoded)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| VisionError::FormBuild(format!("百分号解码失败：{}", e)))
}
