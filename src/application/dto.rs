use crate::domain::{
    LaunchPayload, OrderDescriptor, ReceiverDescriptor, ReceiverType, RefundDescriptor, ReturnOrderDescriptor,
    SharingOrderDescriptor, TarType, Terminal, UnfreezeDescriptor,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 创建支付请求
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    /// 支付终端
    pub terminal: Terminal,

    /// 订单信息
    #[serde(flatten)]
    pub order: OrderDescriptor,
}

/// 支付结果
#[derive(Debug, Serialize)]
pub struct PayResult {
    /// 客户端调起支付的数据
    pub config: LaunchPayload,

    /// 支付方式
    pub pay_type: String,

    /// 支付渠道
    pub pay_channel: String,
}

impl PayResult {
    pub fn wechat(terminal: Terminal, config: LaunchPayload) -> Self {
        Self {
            config,
            pay_type: "wechat".to_string(),
            pay_channel: terminal.name().to_string(),
        }
    }
}

/// 退款请求
#[derive(Debug, Deserialize)]
pub struct CreateRefundRequest {
    #[serde(default)]
    pub terminal: Option<Terminal>,

    #[serde(flatten)]
    pub refund: RefundDescriptor,
}

/// 查询参数中的终端
#[derive(Debug, Default, Deserialize)]
pub struct TerminalQuery {
    #[serde(default)]
    pub terminal: Option<Terminal>,
}

/// 请求分账
#[derive(Debug, Deserialize)]
pub struct CreateSharingOrderRequest {
    #[serde(default)]
    pub terminal: Option<Terminal>,

    #[serde(flatten)]
    pub order: SharingOrderDescriptor,
}

/// 查询分账结果的参数
#[derive(Debug, Deserialize)]
pub struct SharingOrderQuery {
    #[serde(default)]
    pub terminal: Option<Terminal>,
    pub transaction_id: String,
}

/// 请求分账回退
#[derive(Debug, Deserialize)]
pub struct CreateReturnOrderRequest {
    #[serde(default)]
    pub terminal: Option<Terminal>,

    #[serde(flatten)]
    pub order: ReturnOrderDescriptor,
}

/// 查询分账回退的参数
#[derive(Debug, Deserialize)]
pub struct ReturnOrderQuery {
    #[serde(default)]
    pub terminal: Option<Terminal>,
    pub out_order_no: String,
}

/// 解冻剩余资金
#[derive(Debug, Deserialize)]
pub struct UnfreezeRequest {
    #[serde(default)]
    pub terminal: Option<Terminal>,

    #[serde(flatten)]
    pub unfreeze: UnfreezeDescriptor,
}

/// 添加分账接收方
#[derive(Debug, Deserialize)]
pub struct AddReceiverRequest {
    #[serde(default)]
    pub terminal: Option<Terminal>,

    #[serde(flatten)]
    pub receiver: ReceiverDescriptor,
}

/// 删除分账接收方
#[derive(Debug, Deserialize)]
pub struct DeleteReceiverRequest {
    #[serde(default)]
    pub terminal: Option<Terminal>,
    #[serde(rename = "type")]
    pub receiver_type: ReceiverType,
    pub account: String,
}

/// 申请分账账单的参数
#[derive(Debug, Deserialize)]
pub struct BillQuery {
    #[serde(default)]
    pub terminal: Option<Terminal>,
    pub bill_date: NaiveDate,
    #[serde(default)]
    pub tar_type: Option<TarType>,
}

/// 证书刷新结果
#[derive(Debug, Serialize)]
pub struct CertificatesRefreshed {
    pub serial_nos: Vec<String>,
}

/// 错误响应
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}
