use crate::domain::errors::PaymentResult;
use crate::domain::MerchantIdentity;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

pub const HEADER_SIGNATURE: &str = "Wechatpay-Signature";
pub const HEADER_TIMESTAMP: &str = "Wechatpay-Timestamp";
pub const HEADER_SERIAL: &str = "Wechatpay-Serial";
pub const HEADER_NONCE: &str = "Wechatpay-Nonce";
pub const HEADER_SIGNATURE_TYPE: &str = "Wechatpay-Signature-Type";

/// 请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

/// 发往微信支付的请求（path 含查询串，body 为已序列化的 JSON）
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<String>,
}

impl UpstreamRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post_json<T: serde::Serialize>(path: impl Into<String>, body: &T) -> PaymentResult<Self> {
        Ok(Self {
            method: HttpMethod::Post,
            path: path.into(),
            body: Some(serde_json::to_string(body)?),
        })
    }

    /// 参与签名的请求体
    pub fn body_str(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }
}

/// 微信支付的原始应答
#[derive(Debug, Clone, Default)]
pub struct UpstreamResponse {
    pub status: u16,
    /// 头名统一小写
    pub headers: HashMap<String, String>,
    /// 应答体文本，验签与 JSON 解析用
    pub body: String,
    /// 原始字节，账单文件等非文本内容用
    pub raw: Vec<u8>,
}

impl UpstreamResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            status,
            headers: HashMap::new(),
            raw: body.clone().into_bytes(),
            body,
        }
    }

    pub fn from_raw(status: u16, raw: Vec<u8>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: String::from_utf8_lossy(&raw).into_owned(),
            raw,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn signature_headers(&self) -> SignatureHeaders {
        SignatureHeaders::from_lookup(|name| self.header(name).map(str::to_string))
    }
}

/// 验签所需的请求头/应答头
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureHeaders {
    pub signature: Option<String>,
    pub timestamp: Option<String>,
    pub serial: Option<String>,
    pub nonce: Option<String>,
    pub signature_type: Option<String>,
}

impl SignatureHeaders {
    /// 通过任意头查找函数构造，适配不同的 HTTP 头类型
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            signature: lookup(HEADER_SIGNATURE),
            timestamp: lookup(HEADER_TIMESTAMP),
            serial: lookup(HEADER_SERIAL),
            nonce: lookup(HEADER_NONCE),
            signature_type: lookup(HEADER_SIGNATURE_TYPE),
        }
    }
}

/// 微信支付 HTTP 客户端端口
#[async_trait]
pub trait WeChatPayPort: Send + Sync {
    /// 以商户身份签名并发送请求
    async fn send(
        &self,
        merchant: &MerchantIdentity,
        request: &UpstreamRequest,
    ) -> PaymentResult<UpstreamResponse>;
}
