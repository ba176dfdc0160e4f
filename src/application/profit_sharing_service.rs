use crate::application::payment_service::{PaymentService, path_segment};
use crate::domain::errors::{PaymentError, PaymentResult};
use crate::domain::{
    BillDownload, MerchantIdentity, ReceiverDescriptor, ReceiverType, RelationType, ReturnOrderDescriptor,
    SharingOrderDescriptor, TarType, Terminal, UnfreezeDescriptor,
};
use crate::ports::wechat_pay_port::{UpstreamRequest, WeChatPayPort};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use sha1::{Digest, Sha1};
use std::sync::Arc;
use tracing::{info, warn};

const ORDERS_PATH: &str = "/v3/profitsharing/orders";
const RETURN_ORDERS_PATH: &str = "/v3/profitsharing/return-orders";
const RECEIVERS_PATH: &str = "/v3/profitsharing/receivers";

#[derive(Debug, Serialize)]
struct OrderBody<'a> {
    appid: &'a str,
    transaction_id: &'a str,
    out_order_no: &'a str,
    receivers: Vec<ReceiverAmount<'a>>,
    unfreeze_unsplit: bool,
}

#[derive(Debug, Serialize)]
struct ReceiverAmount<'a> {
    #[serde(rename = "type")]
    receiver_type: ReceiverType,
    account: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    amount: i64,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct ReturnBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    order_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    out_order_no: Option<&'a str>,
    out_return_no: &'a str,
    return_mchid: &'a str,
    amount: i64,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct AddReceiverBody<'a> {
    appid: &'a str,
    #[serde(rename = "type")]
    receiver_type: ReceiverType,
    account: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    relation_type: RelationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_relation: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct DeleteReceiverBody<'a> {
    appid: &'a str,
    #[serde(rename = "type")]
    receiver_type: ReceiverType,
    account: &'a str,
}

/// 普通商户分账
///
/// 交易成功的资金按周期分给合作方、员工或用户。下单时需带 `profit_sharing = true`。
pub struct ProfitSharingService<T: WeChatPayPort> {
    payments: Arc<PaymentService<T>>,
}

impl<T: WeChatPayPort> ProfitSharingService<T> {
    pub fn new(payments: Arc<PaymentService<T>>) -> Self {
        Self { payments }
    }

    /// 请求分账
    pub async fn create_order(
        &self,
        terminal: Option<Terminal>,
        order: &SharingOrderDescriptor,
    ) -> PaymentResult<Map<String, Value>> {
        let amounts = order.validate()?;
        let merchant = self.payments.merchant(terminal)?;

        let receivers = order
            .receivers
            .iter()
            .zip(&amounts)
            .map(|(receiver, amount)| ReceiverAmount {
                receiver_type: receiver.receiver_type,
                account: &receiver.account,
                name: receiver.name.as_deref().filter(|n| !n.is_empty()),
                amount: amount.to_cents(),
                description: &receiver.description,
            })
            .collect();

        let request = UpstreamRequest::post_json(
            ORDERS_PATH,
            &OrderBody {
                appid: app_id(&merchant)?,
                transaction_id: &order.transaction_id,
                out_order_no: &order.out_order_no,
                receivers,
                unfreeze_unsplit: order.unfreeze_unsplit,
            },
        )?;

        let result = self.payments.call(&merchant, &request).await?;
        let total: i64 = amounts.iter().map(|m| m.to_cents()).sum();
        info!(
            transaction_id = %order.transaction_id,
            out_order_no = %order.out_order_no,
            receivers = amounts.len(),
            total,
            "Profit sharing requested"
        );
        Ok(result)
    }

    /// 查询分账结果（含解冻剩余资金的结果）
    pub async fn query_order(
        &self,
        terminal: Option<Terminal>,
        transaction_id: &str,
        out_order_no: &str,
    ) -> PaymentResult<Map<String, Value>> {
        let merchant = self.payments.merchant(terminal)?;
        let path = format!(
            "{}/{}?transaction_id={}",
            ORDERS_PATH,
            path_segment(out_order_no)?,
            path_segment(transaction_id)?
        );
        self.payments.call(&merchant, &UpstreamRequest::get(path)).await
    }

    /// 请求分账回退
    pub async fn create_return_order(
        &self,
        terminal: Option<Terminal>,
        order: &ReturnOrderDescriptor,
    ) -> PaymentResult<Map<String, Value>> {
        let amount = order.validate()?;
        let merchant = self.payments.merchant(terminal)?;

        let request = UpstreamRequest::post_json(
            RETURN_ORDERS_PATH,
            &ReturnBody {
                order_id: order.order_id.as_deref(),
                out_order_no: order.out_order_no.as_deref(),
                out_return_no: &order.out_return_no,
                return_mchid: &order.return_mchid,
                amount: amount.to_cents(),
                description: &order.description,
            },
        )?;

        let result = self.payments.call(&merchant, &request).await?;
        info!(out_return_no = %order.out_return_no, amount = %amount, "Profit sharing return requested");
        Ok(result)
    }

    /// 查询分账回退结果
    pub async fn query_return_order(
        &self,
        terminal: Option<Terminal>,
        out_return_no: &str,
        out_order_no: &str,
    ) -> PaymentResult<Map<String, Value>> {
        let merchant = self.payments.merchant(terminal)?;
        let path = format!(
            "{}/{}?out_order_no={}",
            RETURN_ORDERS_PATH,
            path_segment(out_return_no)?,
            path_segment(out_order_no)?
        );
        self.payments.call(&merchant, &UpstreamRequest::get(path)).await
    }

    /// 解冻剩余资金，异步处理，结果通过 `query_order` 获取
    pub async fn unfreeze_order(
        &self,
        terminal: Option<Terminal>,
        unfreeze: &UnfreezeDescriptor,
    ) -> PaymentResult<Map<String, Value>> {
        path_segment(&unfreeze.transaction_id)?;
        path_segment(&unfreeze.out_order_no)?;
        if unfreeze.description.is_empty() {
            return Err(PaymentError::Validation("description is required".to_string()));
        }

        let merchant = self.payments.merchant(terminal)?;
        let request = UpstreamRequest::post_json(format!("{}/unfreeze", ORDERS_PATH), unfreeze)?;
        self.payments.call(&merchant, &request).await
    }

    /// 查询订单剩余待分金额
    pub async fn query_order_amount(
        &self,
        terminal: Option<Terminal>,
        transaction_id: &str,
    ) -> PaymentResult<Map<String, Value>> {
        let merchant = self.payments.merchant(terminal)?;
        let path = format!(
            "/v3/profitsharing/transactions/{}/amounts",
            path_segment(transaction_id)?
        );
        self.payments.call(&merchant, &UpstreamRequest::get(path)).await
    }

    /// 添加分账接收方
    pub async fn add_receiver(
        &self,
        terminal: Option<Terminal>,
        receiver: &ReceiverDescriptor,
    ) -> PaymentResult<Map<String, Value>> {
        receiver.validate()?;
        let merchant = self.payments.merchant(terminal)?;

        let request = UpstreamRequest::post_json(
            format!("{}/add", RECEIVERS_PATH),
            &AddReceiverBody {
                appid: app_id(&merchant)?,
                receiver_type: receiver.receiver_type,
                account: &receiver.account,
                name: receiver.name.as_deref().filter(|n| !n.is_empty()),
                relation_type: receiver.relation_type,
                custom_relation: receiver.custom_relation.as_deref().filter(|c| !c.is_empty()),
            },
        )?;

        let result = self.payments.call(&merchant, &request).await?;
        info!(account = %receiver.account, relation_type = ?receiver.relation_type, "Profit sharing receiver added");
        Ok(result)
    }

    /// 删除分账接收方
    pub async fn delete_receiver(
        &self,
        terminal: Option<Terminal>,
        receiver_type: ReceiverType,
        account: &str,
    ) -> PaymentResult<Map<String, Value>> {
        if account.is_empty() {
            return Err(PaymentError::Validation("Receiver account is required".to_string()));
        }
        let merchant = self.payments.merchant(terminal)?;

        let request = UpstreamRequest::post_json(
            format!("{}/delete", RECEIVERS_PATH),
            &DeleteReceiverBody {
                appid: app_id(&merchant)?,
                receiver_type,
                account,
            },
        )?;

        let result = self.payments.call(&merchant, &request).await?;
        info!(account, "Profit sharing receiver deleted");
        Ok(result)
    }

    /// 申请分账账单，仅支持三个月内
    pub async fn bills(
        &self,
        terminal: Option<Terminal>,
        bill_date: NaiveDate,
        tar_type: Option<TarType>,
    ) -> PaymentResult<BillDownload> {
        let merchant = self.payments.merchant(terminal)?;
        let mut path = format!("/v3/profitsharing/bills?bill_date={}", bill_date.format("%Y-%m-%d"));
        if let Some(TarType::Gzip) = tar_type {
            path.push_str("&tar_type=GZIP");
        }

        let result = self.payments.call(&merchant, &UpstreamRequest::get(path)).await?;
        Ok(serde_json::from_value(Value::Object(result))?)
    }

    /// 下载账单并校验摘要，返回原始文件内容
    pub async fn download_bill(&self, terminal: Option<Terminal>, bill: &BillDownload) -> PaymentResult<Vec<u8>> {
        if !bill.hash_type.eq_ignore_ascii_case("SHA1") {
            return Err(PaymentError::Validation(format!(
                "Unsupported bill hash_type: {}",
                bill.hash_type
            )));
        }

        let merchant = self.payments.merchant(terminal)?;
        let path = download_path(&merchant, &bill.download_url)?;
        let response = self.payments.fetch(&merchant, &UpstreamRequest::get(path)).await?;

        let digest = format!("{:x}", Sha1::digest(&response.raw));
        if !digest.eq_ignore_ascii_case(&bill.hash_value) {
            warn!(expected = %bill.hash_value, actual = %digest, "Bill hash mismatch");
            return Err(PaymentError::upstream("BILL_HASH_MISMATCH", "Bill file hash mismatch"));
        }

        Ok(response.raw)
    }
}

fn app_id(merchant: &MerchantIdentity) -> PaymentResult<&str> {
    merchant
        .appid
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or(PaymentError::MissingAppId)
}

/// 下载地址必须指向商户配置的网关，只取路径参与签名
fn download_path(merchant: &MerchantIdentity, download_url: &str) -> PaymentResult<String> {
    download_url
        .strip_prefix(merchant.base_url.trim_end_matches('/'))
        .filter(|path| path.starts_with('/'))
        .map(str::to_string)
        .ok_or_else(|| PaymentError::Validation(format!("Unexpected bill download url: {}", download_url)))
}
