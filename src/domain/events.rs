use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 支付成功通知
pub const EVENT_TRANSACTION_SUCCESS: &str = "TRANSACTION.SUCCESS";
/// 退款成功通知
pub const EVENT_REFUND_SUCCESS: &str = "REFUND.SUCCESS";

/// 领域事件trait
pub trait DomainEvent {
    fn event_type(&self) -> &str;
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// 回调通知报文
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    pub id: String,
    pub create_time: String,
    pub event_type: String,
    #[serde(default)]
    pub resource_type: String,
    pub resource: NotificationResource,
    #[serde(default)]
    pub summary: String,
}

/// 通知资源数据（AEAD_AES_256_GCM 密文）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResource {
    pub algorithm: String,
    pub ciphertext: String,
    pub nonce: String,
    #[serde(default)]
    pub associated_data: String,
    #[serde(default)]
    pub original_type: Option<String>,
}

/// 支付事件类别
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEventKind {
    PaymentSucceeded,
    RefundSucceeded,
    Other(String),
}

impl PaymentEventKind {
    /// 按事件类型与解密后的资源归类
    pub fn classify(event_type: &str, resource: &Map<String, Value>) -> Self {
        match event_type {
            EVENT_TRANSACTION_SUCCESS
                if resource.get("trade_state").and_then(Value::as_str) == Some("SUCCESS") =>
            {
                PaymentEventKind::PaymentSucceeded
            }
            EVENT_REFUND_SUCCESS => PaymentEventKind::RefundSucceeded,
            other => PaymentEventKind::Other(other.to_string()),
        }
    }
}

/// 已验签、已解密的支付事件，分发完成后丢弃
#[derive(Debug, Clone)]
pub struct PaymentEvent {
    kind: PaymentEventKind,
    resource: Map<String, Value>,
    envelope: NotificationEnvelope,
    received_at: DateTime<Utc>,
}

impl PaymentEvent {
    pub fn new(envelope: NotificationEnvelope, resource: Map<String, Value>) -> Self {
        Self {
            kind: PaymentEventKind::classify(&envelope.event_type, &resource),
            resource,
            envelope,
            received_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> &PaymentEventKind {
        &self.kind
    }

    /// 解密后的资源数据
    pub fn resource(&self) -> &Map<String, Value> {
        &self.resource
    }

    /// 原始通知报文
    pub fn envelope(&self) -> &NotificationEnvelope {
        &self.envelope
    }

    pub fn out_trade_no(&self) -> Option<&str> {
        self.resource.get("out_trade_no").and_then(Value::as_str)
    }

    /// 以支付通知的结构读取资源
    pub fn transaction(&self) -> Option<TransactionNotify> {
        self.resource_as()
    }

    /// 以退款通知的结构读取资源
    pub fn refund(&self) -> Option<RefundNotify> {
        self.resource_as()
    }

    fn resource_as<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(Value::Object(self.resource.clone())).ok()
    }
}

impl DomainEvent for PaymentEvent {
    fn event_type(&self) -> &str {
        &self.envelope.event_type
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

/// 支付成功通知（解密后）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionNotify {
    pub appid: String,
    pub mchid: String,
    pub out_trade_no: String,
    pub transaction_id: String,
    pub trade_type: String,
    pub trade_state: String,
    #[serde(default)]
    pub trade_state_desc: String,
    #[serde(default)]
    pub success_time: Option<String>,
    #[serde(default)]
    pub attach: Option<String>,
    pub amount: NotifyAmount,
    #[serde(default)]
    pub payer: Option<NotifyPayer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyAmount {
    pub total: i64,
    #[serde(default)]
    pub payer_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyPayer {
    pub openid: String,
}

/// 退款结果通知（解密后）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundNotify {
    pub mchid: String,
    pub out_trade_no: String,
    pub transaction_id: String,
    pub out_refund_no: String,
    pub refund_id: String,
    pub refund_status: String,
    #[serde(default)]
    pub success_time: Option<String>,
    #[serde(default)]
    pub user_received_account: Option<String>,
    pub amount: RefundNotifyAmount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundNotifyAmount {
    pub total: i64,
    pub refund: i64,
    pub payer_total: i64,
    pub payer_refund: i64,
}
