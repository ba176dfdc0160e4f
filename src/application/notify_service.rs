use crate::application::dispatcher::Dispatcher;
use crate::application::verifier::NotificationVerifier;
use crate::domain::errors::PaymentResult;
use crate::domain::{DomainEvent, MerchantIdentity, NotificationEnvelope, PaymentEvent};
use crate::infrastructure::certificates::CertificateStore;
use crate::infrastructure::crypto::decrypt_aes_256_gcm;
use crate::ports::notification_port::NotifyReply;
use crate::ports::pay_config_port::PayConfigPort;
use crate::ports::wechat_pay_port::SignatureHeaders;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info};

/// 支付结果回调处理
///
/// 验签 → 解密 → 归类 → 分发。任何一步失败都返回 FAIL，由微信按策略重发。
pub struct PayNotifyService {
    config: Arc<dyn PayConfigPort>,
    certificates: Arc<CertificateStore>,
    verifier: NotificationVerifier,
    dispatcher: Dispatcher,
}

impl PayNotifyService {
    pub fn new(
        config: Arc<dyn PayConfigPort>,
        certificates: Arc<CertificateStore>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            config,
            certificates,
            verifier: NotificationVerifier::new(),
            dispatcher,
        }
    }

    pub async fn handle(&self, headers: &SignatureHeaders, body: &str) -> NotifyReply {
        let merchant = match self.resolve_merchant(headers).await {
            Ok(merchant) => merchant,
            Err(e) => {
                error!(error = %e, "no merchant configured for notifications");
                return NotifyReply::fail(e.to_string());
            }
        };

        let certificates = self.certificates.snapshot(&merchant.mchid).await;
        if let Err(e) = self.verifier.verify(headers, body, &certificates) {
            error!(
                serial = headers.serial.as_deref().unwrap_or_default(),
                timestamp = headers.timestamp.as_deref().unwrap_or_default(),
                error = %e,
                "notification signature rejected"
            );
            return NotifyReply::fail(e.to_string());
        }

        let event = match decode_event(&merchant, body) {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "failed to decode notification");
                return NotifyReply::fail(e.to_string());
            }
        };

        info!(
            event_id = %event.envelope().id,
            event_type = event.event_type(),
            out_trade_no = event.out_trade_no().unwrap_or_default(),
            received_at = %event.occurred_at(),
            "payment notification received"
        );

        self.dispatcher.dispatch(&event).await
    }

    /// 按 `Wechatpay-Serial` 找到持有该平台证书的商户，找不到时用默认商户
    async fn resolve_merchant(&self, headers: &SignatureHeaders) -> PaymentResult<Arc<MerchantIdentity>> {
        if let Some(serial) = headers.serial.as_deref() {
            if let Some(mchid) = self.certificates.mchid_for_serial(serial).await {
                if let Some(merchant) = self.config.merchants().into_iter().find(|m| m.mchid == mchid) {
                    return Ok(merchant);
                }
            }
        }
        self.config.get(None)
    }
}

/// 解析通知报文并解密 resource
fn decode_event(merchant: &MerchantIdentity, body: &str) -> PaymentResult<PaymentEvent> {
    let envelope: NotificationEnvelope = serde_json::from_str(body)?;
    let resource = &envelope.resource;
    let plaintext = decrypt_aes_256_gcm(
        &merchant.api_v3_key,
        &resource.nonce,
        &resource.associated_data,
        &resource.ciphertext,
    )?;
    let resource: Map<String, Value> = serde_json::from_str(&plaintext)?;

    Ok(PaymentEvent::new(envelope, resource))
}
