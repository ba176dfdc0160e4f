use thiserror::Error;

/// 回调/应答验签错误
///
/// 任何一种都意味着本次请求不可信，直接拒绝，不做内部重试。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// 缺少签名相关的请求头
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    /// 时间戳超出允许的时钟偏移
    #[error("Clock offset exceeded: {offset}s")]
    ClockOffsetExceeded { offset: i64 },

    /// 平台证书序列号不存在或已过期
    #[error("No platform certificate found for serial: {0}")]
    UnknownCertificate(String),

    /// 签名不匹配
    #[error("Invalid signature")]
    InvalidSignature,
}

/// 支付层错误类型
#[derive(Error, Debug)]
pub enum PaymentError {
    /// 配置与订单都没有提供 app_id
    #[error("app_id not found in either merchant config or order")]
    MissingAppId,

    /// 参数校验失败
    #[error("Validation error: {0}")]
    Validation(String),

    /// 金额无效
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// 微信支付返回的业务错误
    #[error("WeChat Pay error: {code}-{message}")]
    UpstreamError { code: String, message: String },

    /// 网络层错误（超时、DNS 等），可使用同一商户订单号重试
    #[error("Transport error: {0}")]
    TransportError(#[from] reqwest::Error),

    /// 应答验签失败
    #[error("Response signature rejected: {0}")]
    Signature(#[from] SignatureError),

    /// 加解密错误
    #[error("Cryptography error: {0}")]
    Crypto(String),

    /// 平台证书错误
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl PaymentError {
    /// 只有网络层错误可以安全重试（上游按商户订单号幂等）
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::TransportError(_))
    }

    pub fn upstream(code: impl Into<String>, message: impl Into<String>) -> Self {
        PaymentError::UpstreamError {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// 支付结果类型
pub type PaymentResult<T> = Result<T, PaymentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_errors_are_retryable() {
        assert!(!PaymentError::MissingAppId.is_retryable());
        assert!(!PaymentError::upstream("PARAM_ERROR", "bad").is_retryable());
        assert!(!PaymentError::Signature(SignatureError::InvalidSignature).is_retryable());
    }

    #[test]
    fn test_upstream_error_display() {
        let err = PaymentError::upstream("ORDERPAID", "该订单已支付");
        assert_eq!(err.to_string(), "WeChat Pay error: ORDERPAID-该订单已支付");
    }

    #[test]
    fn test_signature_error_display() {
        assert_eq!(
            SignatureError::MissingHeader("Wechatpay-Nonce").to_string(),
            "Missing header: Wechatpay-Nonce"
        );
        assert_eq!(
            SignatureError::ClockOffsetExceeded { offset: 301 }.to_string(),
            "Clock offset exceeded: 301s"
        );
    }
}
