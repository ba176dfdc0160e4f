use crate::domain::SignatureError;
use crate::infrastructure::certificates::PlatformCertificates;
use crate::infrastructure::crypto::{build_verify_message, verify_signature};
use crate::ports::wechat_pay_port::{
    HEADER_NONCE, HEADER_SERIAL, HEADER_SIGNATURE, HEADER_TIMESTAMP, SignatureHeaders,
};
use chrono::{DateTime, Utc};

/// 允许的时钟偏移（秒）
pub const MAX_CLOCK_OFFSET: i64 = 300;

/// 唯一支持的签名类型
pub const SIGNATURE_TYPE_RSA: &str = "WECHATPAY2-SHA256-RSA2048";

/// 回调通知、应答的验签器
#[derive(Debug, Clone, Copy)]
pub struct NotificationVerifier {
    max_clock_offset: i64,
}

impl Default for NotificationVerifier {
    fn default() -> Self {
        Self {
            max_clock_offset: MAX_CLOCK_OFFSET,
        }
    }
}

impl NotificationVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_clock_offset(mut self, seconds: i64) -> Self {
        self.max_clock_offset = seconds;
        self
    }

    pub fn verify(
        &self,
        headers: &SignatureHeaders,
        body: &str,
        certificates: &PlatformCertificates,
    ) -> Result<(), SignatureError> {
        self.verify_at(headers, body, certificates, Utc::now())
    }

    /// 以给定时间为“现在”验签
    pub fn verify_at(
        &self,
        headers: &SignatureHeaders,
        body: &str,
        certificates: &PlatformCertificates,
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        let signature = require(&headers.signature, HEADER_SIGNATURE)?;
        let timestamp = require(&headers.timestamp, HEADER_TIMESTAMP)?;
        let serial = require(&headers.serial, HEADER_SERIAL)?;
        let nonce = require(&headers.nonce, HEADER_NONCE)?;

        // 无法解析的时间戳按超出偏移处理
        let ts: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| SignatureError::ClockOffsetExceeded { offset: i64::MAX })?;
        let offset = now.timestamp().saturating_sub(ts).saturating_abs();
        if offset > self.max_clock_offset {
            return Err(SignatureError::ClockOffsetExceeded { offset });
        }

        if let Some(signature_type) = &headers.signature_type {
            if signature_type != SIGNATURE_TYPE_RSA {
                return Err(SignatureError::InvalidSignature);
            }
        }

        let certificate = certificates
            .get(serial)
            .filter(|cert| !cert.is_expired_at(now))
            .ok_or_else(|| SignatureError::UnknownCertificate(serial.to_string()))?;

        let message = build_verify_message(timestamp, nonce, body);
        if verify_signature(&certificate.verifying_key, &message, signature) {
            Ok(())
        } else {
            Err(SignatureError::InvalidSignature)
        }
    }
}

fn require<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, SignatureError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(SignatureError::MissingHeader(name))
}
