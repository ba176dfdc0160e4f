use crate::domain::errors::{PaymentError, PaymentResult};
use crate::domain::value_objects::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 默认 API 基础URL
pub const DEFAULT_BASE_URL: &str = "https://api.mch.weixin.qq.com";

/// 商户身份（按终端/租户在启动时提供，运行期只读）
#[derive(Clone, Serialize, Deserialize)]
pub struct MerchantIdentity {
    /// 商户号
    pub mchid: String,

    /// 默认 APPID（订单可覆盖）
    pub appid: Option<String>,

    /// 商户API证书序列号
    pub serial_no: String,

    /// 商户API私钥内容（PKCS#8 或 PKCS#1 PEM）
    pub private_key: String,

    /// 商户API v3密钥（用于回调通知、平台证书解密）
    pub api_v3_key: String,

    /// 支付结果通知地址
    pub notify_url: String,

    /// API基础URL
    pub base_url: String,
}

impl MerchantIdentity {
    pub fn validate(&self) -> PaymentResult<()> {
        if self.mchid.is_empty() {
            return Err(PaymentError::Configuration("mchid is required".to_string()));
        }
        if self.serial_no.is_empty() {
            return Err(PaymentError::Configuration(
                "serial_no is required".to_string(),
            ));
        }
        if self.api_v3_key.len() != 32 {
            return Err(PaymentError::Configuration(format!(
                "api_v3_key must be 32 bytes, got {}",
                self.api_v3_key.len()
            )));
        }
        if !self.notify_url.starts_with("https://") && !self.notify_url.starts_with("http://") {
            return Err(PaymentError::Configuration(format!(
                "notify_url must be an absolute URL: {}",
                self.notify_url
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for MerchantIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerchantIdentity")
            .field("mchid", &self.mchid)
            .field("appid", &self.appid)
            .field("serial_no", &self.serial_no)
            .field("private_key", &"<redacted>")
            .field("api_v3_key", &"<redacted>")
            .field("notify_url", &self.notify_url)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// 下单描述
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDescriptor {
    /// 商户订单号
    pub out_trade_no: String,

    /// 支付金额（元）
    pub amount: Decimal,

    /// 商品描述
    pub description: String,

    /// 用户OpenID（公众号、小程序支付时必填）
    #[serde(default)]
    pub openid: Option<String>,

    /// H5 支付完成后的跳转地址
    #[serde(default)]
    pub redirect_url: Option<String>,

    /// 覆盖配置中的 APPID
    #[serde(default)]
    pub app_id: Option<String>,

    /// 是否指定分账
    #[serde(default)]
    pub profit_sharing: Option<bool>,

    /// 附加数据
    #[serde(default)]
    pub attach: Option<String>,
}

impl OrderDescriptor {
    pub fn new(out_trade_no: impl Into<String>, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            out_trade_no: out_trade_no.into(),
            amount,
            description: description.into(),
            openid: None,
            redirect_url: None,
            app_id: None,
            profit_sharing: None,
            attach: None,
        }
    }

    /// 校验订单，返回换算后的金额
    pub fn validate(&self) -> PaymentResult<Money> {
        // 商户订单号：6-32 位数字、大小写字母 _-|*
        let len = self.out_trade_no.len();
        if !(6..=32).contains(&len) {
            return Err(PaymentError::Validation(
                "out_trade_no must be 6-32 characters".to_string(),
            ));
        }
        if !is_order_no(&self.out_trade_no, &['_', '-', '|', '*']) {
            return Err(PaymentError::Validation(format!(
                "out_trade_no contains invalid characters: {}",
                self.out_trade_no
            )));
        }

        if self.description.is_empty() || self.description.chars().count() > 127 {
            return Err(PaymentError::Validation(
                "Description must be 1-127 characters".to_string(),
            ));
        }

        if let Some(attach) = &self.attach {
            if attach.chars().count() > 128 {
                return Err(PaymentError::Validation(
                    "attach must not exceed 128 characters".to_string(),
                ));
            }
        }

        Money::from_yuan(self.amount)
    }
}

/// 退款申请
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundDescriptor {
    /// 微信支付订单号（与商户订单号二选一）
    #[serde(default)]
    pub transaction_id: Option<String>,

    /// 商户订单号
    #[serde(default)]
    pub out_trade_no: Option<String>,

    /// 商户退款单号
    pub out_refund_no: String,

    /// 退款原因
    #[serde(default)]
    pub reason: Option<String>,

    /// 退款金额（元）
    pub refund: Decimal,

    /// 原订单金额（元）
    pub total: Decimal,
}

impl RefundDescriptor {
    /// 校验退款申请，返回 (退款金额, 原订单金额)
    pub fn validate(&self) -> PaymentResult<(Money, Money)> {
        if self.transaction_id.is_none() && self.out_trade_no.is_none() {
            return Err(PaymentError::Validation(
                "Either transaction_id or out_trade_no is required".to_string(),
            ));
        }

        let len = self.out_refund_no.len();
        if !(1..=64).contains(&len) || !is_order_no(&self.out_refund_no, &['_', '-', '|', '*', '@']) {
            return Err(PaymentError::Validation(format!(
                "Invalid out_refund_no: {}",
                self.out_refund_no
            )));
        }

        let refund = Money::from_yuan(self.refund)?;
        let total = Money::from_yuan(self.total)?;
        if refund.to_cents() > total.to_cents() {
            return Err(PaymentError::InvalidAmount(format!(
                "refund {} exceeds total {}",
                refund, total
            )));
        }

        Ok((refund, total))
    }
}

fn is_order_no(value: &str, punctuation: &[char]) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || punctuation.contains(&c))
}
