use crate::domain::errors::{PaymentError, PaymentResult};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 终端支付渠道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Terminal {
    /// 微信公众号
    Wechat,
    /// 微信小程序
    Routine,
    /// 手机H5
    H5,
    /// 电脑PC
    Pc,
    /// 苹果APP
    Apple,
    /// 安卓APP
    Android,
}

impl Terminal {
    pub const ALL: [Terminal; 6] = [
        Terminal::Wechat,
        Terminal::Routine,
        Terminal::H5,
        Terminal::Pc,
        Terminal::Apple,
        Terminal::Android,
    ];

    /// 渠道编码
    pub fn code(&self) -> u8 {
        match self {
            Terminal::Wechat => 1,
            Terminal::Routine => 2,
            Terminal::H5 => 3,
            Terminal::Pc => 4,
            Terminal::Apple => 5,
            Terminal::Android => 6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Terminal::Wechat => "wechat",
            Terminal::Routine => "routine",
            Terminal::H5 => "h5",
            Terminal::Pc => "pc",
            Terminal::Apple => "apple",
            Terminal::Android => "android",
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            Terminal::Wechat => "微信公众号",
            Terminal::Routine => "微信小程序",
            Terminal::H5 => "手机H5",
            Terminal::Pc => "电脑PC",
            Terminal::Apple => "苹果APP",
            Terminal::Android => "安卓APP",
        }
    }

    /// 渠道对应的下单方式
    pub fn trade_type(&self) -> TradeType {
        match self {
            Terminal::Wechat | Terminal::Routine => TradeType::Jsapi,
            Terminal::H5 => TradeType::H5,
            Terminal::Pc => TradeType::Native,
            Terminal::Apple | Terminal::Android => TradeType::App,
        }
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Terminal {
    type Err = PaymentError;

    /// 支持渠道名（`routine`）或渠道编码（`2`）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Terminal::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s) || t.code().to_string() == s)
            .ok_or_else(|| PaymentError::Validation(format!("Unknown terminal: {}", s)))
    }
}

impl TryFrom<String> for Terminal {
    type Error = PaymentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Terminal> for String {
    fn from(value: Terminal) -> Self {
        value.name().to_string()
    }
}

/// 下单方式（每种对应一个 v3 下单接口）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeType {
    Jsapi,
    H5,
    Native,
    App,
}

impl TradeType {
    pub fn path(&self) -> &'static str {
        match self {
            TradeType::Jsapi => "/v3/pay/transactions/jsapi",
            TradeType::H5 => "/v3/pay/transactions/h5",
            TradeType::Native => "/v3/pay/transactions/native",
            TradeType::App => "/v3/pay/transactions/app",
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeType::Jsapi => write!(f, "JSAPI"),
            TradeType::H5 => write!(f, "MWEB"),
            TradeType::Native => write!(f, "NATIVE"),
            TradeType::App => write!(f, "APP"),
        }
    }
}

/// 货币金额（分为单位，避免浮点数精度问题）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// 金额（分）
    pub amount_cents: i64,
}

impl Money {
    /// 由元转换，精确十进制乘法，最多两位小数
    pub fn from_yuan(amount: Decimal) -> PaymentResult<Self> {
        let cents = amount
            .checked_mul(Decimal::from(100))
            .ok_or_else(|| PaymentError::InvalidAmount(format!("{} overflows", amount)))?;

        if !cents.fract().is_zero() {
            return Err(PaymentError::InvalidAmount(format!(
                "{} has more than two decimal places",
                amount
            )));
        }

        if cents <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount(
                "Amount must be greater than 0".to_string(),
            ));
        }

        let amount_cents = cents
            .to_i64()
            .ok_or_else(|| PaymentError::InvalidAmount(format!("{} overflows", amount)))?;

        Ok(Self { amount_cents })
    }

    /// 创建新的金额对象（单位：分）
    pub fn from_cents(cents: i64) -> Self {
        Self { amount_cents: cents }
    }

    /// 转换为元
    pub fn to_yuan(&self) -> Decimal {
        Decimal::new(self.amount_cents, 2)
    }

    /// 转换为分
    pub fn to_cents(&self) -> i64 {
        self.amount_cents
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "¥{}", self.to_yuan())
    }
}

/// JSAPI / 小程序调起支付参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(rename = "appId")]
    pub app_id: String,
    #[serde(rename = "timeStamp")]
    pub time_stamp: String,
    #[serde(rename = "nonceStr")]
    pub nonce_str: String,
    pub package: String,
    #[serde(rename = "signType")]
    pub sign_type: String,
    #[serde(rename = "paySign")]
    pub pay_sign: String,
}

/// APP 调起支付参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSdkConfig {
    pub appid: String,
    pub partnerid: String,
    pub prepayid: String,
    pub package: String,
    pub noncestr: String,
    pub timestamp: String,
    pub sign: String,
}

/// 客户端调起支付所需的数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LaunchPayload {
    BridgeConfig(BridgeConfig),
    CodeUrl(String),
    RedirectUrl(String),
    AppSdkConfig(AppSdkConfig),
}
