use crate::application::verifier::NotificationVerifier;
use crate::domain::errors::{PaymentError, PaymentResult};
use crate::infrastructure::certificates::PlatformCertificates;
use crate::ports::wechat_pay_port::UpstreamResponse;
use serde_json::{Map, Value};

/// 应答验签方式
#[derive(Debug, Clone, Copy)]
pub enum ResponseVerification<'a> {
    /// 用平台证书验签
    Verify(&'a PlatformCertificates),
    /// 跳过验签，仅用于首次下载平台证书
    Bypass,
}

/// 读取微信支付应答：状态码 → 验签 → 业务错误，成功时返回 JSON 对象
///
/// 空应答体（如关单的 204）返回空对象。
pub fn read_result(
    response: &UpstreamResponse,
    verification: ResponseVerification<'_>,
    verifier: &NotificationVerifier,
) -> PaymentResult<Map<String, Value>> {
    ensure_success(response)?;

    if let ResponseVerification::Verify(certificates) = verification {
        verifier.verify(&response.signature_headers(), &response.body, certificates)?;
    }

    if response.body.trim().is_empty() {
        return Ok(Map::new());
    }

    let result = match serde_json::from_str::<Value>(&response.body)? {
        Value::Object(map) => map,
        other => {
            return Err(PaymentError::upstream(
                "INVALID_RESPONSE",
                format!("Expected JSON object, got: {}", other),
            ));
        }
    };

    let code = non_empty(&result, "code");
    let message = non_empty(&result, "message");
    if code.is_some() || message.is_some() {
        return Err(PaymentError::upstream(
            code.unwrap_or("FAIL"),
            message.unwrap_or_default(),
        ));
    }

    Ok(result)
}

/// 非 2xx 时按错误报文转换为业务错误
pub fn ensure_success(response: &UpstreamResponse) -> PaymentResult<()> {
    if response.is_success() {
        Ok(())
    } else {
        Err(error_from_body(response))
    }
}

/// 从结果中取必需的字符串字段
pub fn required_str<'a>(result: &'a Map<String, Value>, name: &str) -> PaymentResult<&'a str> {
    non_empty(result, name).ok_or_else(|| {
        PaymentError::upstream("INVALID_RESPONSE", format!("Missing {} in response", name))
    })
}

fn non_empty<'a>(result: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    result
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn error_from_body(response: &UpstreamResponse) -> PaymentError {
    let fallback_code = format!("HTTP_{}", response.status);
    match serde_json::from_str::<Map<String, Value>>(&response.body) {
        Ok(body) => PaymentError::upstream(
            non_empty(&body, "code").unwrap_or(fallback_code.as_str()),
            non_empty(&body, "message").unwrap_or(response.body.as_str()),
        ),
        Err(_) => PaymentError::upstream(fallback_code, response.body.clone()),
    }
}
