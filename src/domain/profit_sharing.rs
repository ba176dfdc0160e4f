use super::errors::{PaymentError, PaymentResult};
use super::value_objects::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 分账接收方类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiverType {
    /// 商户号
    MerchantId,
    /// 个人 openid（由直连商户 appid 转换得到）
    PersonalOpenid,
    /// 个人在子商户应用下的 openid，仅服务商模式
    PersonalSubOpenid,
}

/// 接收方与分账方的关系
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    ServiceProvider,
    Store,
    Staff,
    StoreOwner,
    Partner,
    Headquarter,
    Brand,
    Distributor,
    User,
    Supplier,
    Custom,
}

/// 添加到分账接收方列表的接收方
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverDescriptor {
    #[serde(rename = "type")]
    pub receiver_type: ReceiverType,
    pub account: String,
    /// 接收方全称，须已用平台证书公钥加密
    #[serde(default)]
    pub name: Option<String>,
    pub relation_type: RelationType,
    /// 关系为 `CUSTOM` 时必填
    #[serde(default)]
    pub custom_relation: Option<String>,
}

impl ReceiverDescriptor {
    pub fn validate(&self) -> PaymentResult<()> {
        if self.account.is_empty() {
            return Err(PaymentError::Validation("Receiver account is required".to_string()));
        }
        if self.receiver_type == ReceiverType::MerchantId && self.name.as_deref().unwrap_or_default().is_empty() {
            return Err(PaymentError::Validation(
                "name is required for MERCHANT_ID receivers".to_string(),
            ));
        }
        if self.relation_type == RelationType::Custom
            && self.custom_relation.as_deref().unwrap_or_default().is_empty()
        {
            return Err(PaymentError::Validation(
                "custom_relation is required when relation_type is CUSTOM".to_string(),
            ));
        }
        Ok(())
    }
}

/// 一次分账中的接收方
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharingReceiver {
    #[serde(rename = "type")]
    pub receiver_type: ReceiverType,
    pub account: String,
    /// 个人接收方姓名，须已用平台证书公钥加密
    #[serde(default)]
    pub name: Option<String>,
    /// 分账金额（元）
    pub amount: Decimal,
    pub description: String,
}

/// 分账请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharingOrderDescriptor {
    pub transaction_id: String,
    pub out_order_no: String,
    pub receivers: Vec<SharingReceiver>,
    /// 分账后解冻剩余未分资金
    #[serde(default = "default_unfreeze_unsplit")]
    pub unfreeze_unsplit: bool,
}

fn default_unfreeze_unsplit() -> bool {
    true
}

impl SharingOrderDescriptor {
    /// 校验分账请求，返回每个接收方换算后的金额
    pub fn validate(&self) -> PaymentResult<Vec<Money>> {
        require_no("transaction_id", &self.transaction_id)?;
        require_no("out_order_no", &self.out_order_no)?;

        if self.receivers.is_empty() {
            return Err(PaymentError::Validation(
                "At least one receiver is required".to_string(),
            ));
        }

        self.receivers
            .iter()
            .map(|receiver| {
                if receiver.account.is_empty() {
                    return Err(PaymentError::Validation("Receiver account is required".to_string()));
                }
                if receiver.description.is_empty() || receiver.description.chars().count() > 80 {
                    return Err(PaymentError::Validation(
                        "Receiver description must be 1-80 characters".to_string(),
                    ));
                }
                Money::from_yuan(receiver.amount)
            })
            .collect()
    }
}

/// 分账回退请求（分账单号与微信分账单号二选一）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnOrderDescriptor {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub out_order_no: Option<String>,
    pub out_return_no: String,
    /// 回退商户号
    pub return_mchid: String,
    /// 回退金额（元）
    pub amount: Decimal,
    pub description: String,
}

impl ReturnOrderDescriptor {
    pub fn validate(&self) -> PaymentResult<Money> {
        if self.order_id.is_none() && self.out_order_no.is_none() {
            return Err(PaymentError::Validation(
                "Either order_id or out_order_no is required".to_string(),
            ));
        }
        require_no("out_return_no", &self.out_return_no)?;
        if self.return_mchid.is_empty() {
            return Err(PaymentError::Validation("return_mchid is required".to_string()));
        }
        if self.description.is_empty() {
            return Err(PaymentError::Validation("description is required".to_string()));
        }
        Money::from_yuan(self.amount)
    }
}

/// 解冻剩余资金请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnfreezeDescriptor {
    pub transaction_id: String,
    pub out_order_no: String,
    pub description: String,
}

/// 分账账单压缩格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TarType {
    Gzip,
}

/// 申请账单的应答
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillDownload {
    pub download_url: String,
    pub hash_type: String,
    pub hash_value: String,
}

fn require_no(field: &str, value: &str) -> PaymentResult<()> {
    if value.is_empty() || value.len() > 64 {
        return Err(PaymentError::Validation(format!("{} must be 1-64 characters", field)));
    }
    Ok(())
}
