use crate::domain::entities::DEFAULT_BASE_URL;
use crate::domain::errors::{PaymentError, PaymentResult};
use crate::domain::MerchantIdentity;
use crate::infrastructure::certificates::PlatformCertificates;
use std::collections::HashMap;
use std::time::Duration;

/// 微信支付配置
#[derive(Debug, Clone)]
pub struct WeChatPayConfig {
    /// 商户身份
    pub merchant: MerchantIdentity,

    /// 本地平台证书（序列号 => 文件路径）
    pub platform_cert_paths: HashMap<String, String>,

    /// 平台证书刷新周期（秒），0 表示不刷新
    pub cert_refresh_secs: u64,

    /// 请求微信支付的超时时间（秒）
    pub http_timeout_secs: u64,
}

impl WeChatPayConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let private_key = match std::env::var("WECHAT_PRIVATE_KEY") {
            Ok(pem) if !pem.trim().is_empty() => pem,
            _ => {
                let path = required("WECHAT_PRIVATE_KEY_PATH")?;
                std::fs::read_to_string(&path).map_err(|e| {
                    PaymentError::Configuration(format!("read private key {}: {}", path, e))
                })?
            }
        };

        let merchant = MerchantIdentity {
            mchid: required("WECHAT_MCHID")?,
            appid: std::env::var("WECHAT_APPID").ok().filter(|s| !s.is_empty()),
            serial_no: required("WECHAT_SERIAL_NO")?,
            private_key,
            api_v3_key: required("WECHAT_API_V3_KEY")?,
            notify_url: required("WECHAT_NOTIFY_URL")?,
            base_url: std::env::var("WECHAT_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        };
        merchant.validate()?;

        Ok(Self {
            merchant,
            platform_cert_paths: parse_cert_paths(
                &std::env::var("WECHAT_PLATFORM_CERTS").unwrap_or_default(),
            )?,
            cert_refresh_secs: parse_u64("WECHAT_CERT_REFRESH_SECS", 12 * 60 * 60)?,
            http_timeout_secs: parse_u64("WECHAT_HTTP_TIMEOUT_SECS", 10)?,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// 刷新周期；未启用时为 None
    pub fn cert_refresh_interval(&self) -> Option<Duration> {
        (self.cert_refresh_secs > 0).then(|| Duration::from_secs(self.cert_refresh_secs))
    }

    /// 读取本地平台证书文件
    pub fn load_platform_certificates(&self) -> PaymentResult<PlatformCertificates> {
        let mut pems = HashMap::new();
        for (serial, path) in &self.platform_cert_paths {
            let pem = std::fs::read_to_string(path).map_err(|e| {
                PaymentError::Certificate(format!("read platform certificate {}: {}", path, e))
            })?;
            pems.insert(serial.clone(), pem);
        }
        PlatformCertificates::from_pem_map(&pems)
    }
}

/// 服务监听配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let port = match std::env::var("SERVER_PORT") {
            Ok(v) => v
                .parse()
                .map_err(|_| PaymentError::Configuration(format!("Invalid SERVER_PORT: {}", v)))?,
            Err(_) => 3000,
        };

        Ok(Self {
            host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn required(name: &str) -> PaymentResult<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PaymentError::Configuration(format!("{} must be set", name)))
}

fn parse_u64(name: &str, default: u64) -> PaymentResult<u64> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => v
            .parse()
            .map_err(|_| PaymentError::Configuration(format!("Invalid {}: {}", name, v))),
        _ => Ok(default),
    }
}

/// 解析 `serial=path,serial=path`
fn parse_cert_paths(raw: &str) -> PaymentResult<HashMap<String, String>> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (serial, path) = item.split_once('=').ok_or_else(|| {
                PaymentError::Configuration(format!(
                    "WECHAT_PLATFORM_CERTS entry must be serial=path: {}",
                    item
                ))
            })?;
            Ok((serial.trim().to_string(), path.trim().to_string()))
        })
        .collect()
}
