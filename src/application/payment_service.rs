use crate::application::dto::PayResult;
use crate::application::order_builder::OrderBuilder;
use crate::application::response::{ResponseVerification, ensure_success, read_result};
use crate::application::verifier::NotificationVerifier;
use crate::domain::errors::{PaymentError, PaymentResult};
use crate::domain::{LaunchPayload, MerchantIdentity, OrderDescriptor, RefundDescriptor, Terminal};
use crate::infrastructure::certificates::{CertificateStore, CertificatesResponse, PlatformCertificates};
use crate::ports::pay_config_port::PayConfigPort;
use crate::ports::wechat_pay_port::{UpstreamRequest, UpstreamResponse, WeChatPayPort};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

const CERTIFICATES_PATH: &str = "/v3/certificates";
const REFUNDS_PATH: &str = "/v3/refund/domestic/refunds";

#[derive(Debug, Serialize)]
struct RefundBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    out_trade_no: Option<&'a str>,
    out_refund_no: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
    notify_url: &'a str,
    amount: RefundAmount,
}

#[derive(Debug, Serialize)]
struct RefundAmount {
    refund: i64,
    total: i64,
    currency: &'static str,
}

#[derive(Debug, Serialize)]
struct CloseBody<'a> {
    mchid: &'a str,
}

/// 支付服务
pub struct PaymentService<T: WeChatPayPort> {
    wechat_pay: Arc<T>,
    config: Arc<dyn PayConfigPort>,
    certificates: Arc<CertificateStore>,
    builder: OrderBuilder,
    verifier: NotificationVerifier,
}

impl<T: WeChatPayPort> PaymentService<T> {
    pub fn new(
        wechat_pay: Arc<T>,
        config: Arc<dyn PayConfigPort>,
        certificates: Arc<CertificateStore>,
    ) -> Self {
        let verifier = NotificationVerifier::new();
        Self {
            wechat_pay,
            config,
            certificates,
            builder: OrderBuilder::new(verifier),
            verifier,
        }
    }

    /// 统一下单，返回调起支付的数据
    pub async fn pay(
        &self,
        terminal: Terminal,
        order: &OrderDescriptor,
        client_ip: Option<&str>,
    ) -> PaymentResult<PayResult> {
        let config = self.prepay(terminal, order, client_ip).await?;
        Ok(PayResult::wechat(terminal, config))
    }

    pub async fn prepay(
        &self,
        terminal: Terminal,
        order: &OrderDescriptor,
        client_ip: Option<&str>,
    ) -> PaymentResult<LaunchPayload> {
        info!(terminal = %terminal, out_trade_no = %order.out_trade_no, "Creating payment");

        let merchant = self.config.get(Some(terminal))?;
        let prepared = self.builder.build(&merchant, terminal, order, client_ip)?;

        let response = self.wechat_pay.send(&merchant, &prepared.request).await?;
        let certificates = self.certificates.snapshot(&merchant.mchid).await;
        let payload = self.builder.normalize(
            &merchant,
            &prepared,
            &response,
            ResponseVerification::Verify(&certificates),
        )?;

        info!(
            out_trade_no = %prepared.out_trade_no,
            trade_type = %prepared.trade_type,
            amount = %prepared.amount,
            "Payment created"
        );
        Ok(payload)
    }

    /// 按商户订单号查询订单
    pub async fn query_order(
        &self,
        terminal: Option<Terminal>,
        out_trade_no: &str,
    ) -> PaymentResult<Map<String, Value>> {
        let merchant = self.config.get(terminal)?;
        let path = format!(
            "/v3/pay/transactions/out-trade-no/{}?mchid={}",
            path_segment(out_trade_no)?,
            merchant.mchid
        );

        let result = self.call(&merchant, &UpstreamRequest::get(path)).await?;
        let trade_state = result.get("trade_state").and_then(Value::as_str).unwrap_or_default();
        debug!(out_trade_no, trade_state, "Order queried");
        Ok(result)
    }

    /// 关闭未支付订单
    pub async fn close_order(&self, terminal: Option<Terminal>, out_trade_no: &str) -> PaymentResult<()> {
        let merchant = self.config.get(terminal)?;
        let path = format!(
            "/v3/pay/transactions/out-trade-no/{}/close",
            path_segment(out_trade_no)?
        );
        let request = UpstreamRequest::post_json(
            path,
            &CloseBody {
                mchid: &merchant.mchid,
            },
        )?;

        self.call(&merchant, &request).await?;
        info!(out_trade_no, "Order closed");
        Ok(())
    }

    /// 申请退款
    pub async fn refund(
        &self,
        terminal: Option<Terminal>,
        refund: &RefundDescriptor,
    ) -> PaymentResult<Map<String, Value>> {
        let (refund_amount, total) = refund.validate()?;
        let merchant = self.config.get(terminal)?;

        let request = UpstreamRequest::post_json(
            REFUNDS_PATH,
            &RefundBody {
                transaction_id: refund.transaction_id.as_deref(),
                out_trade_no: refund.out_trade_no.as_deref(),
                out_refund_no: &refund.out_refund_no,
                reason: refund.reason.as_deref(),
                notify_url: &merchant.notify_url,
                amount: RefundAmount {
                    refund: refund_amount.to_cents(),
                    total: total.to_cents(),
                    currency: "CNY",
                },
            },
        )?;

        let result = self.call(&merchant, &request).await?;
        let status = result.get("status").and_then(Value::as_str).unwrap_or_default();
        info!(
            out_refund_no = %refund.out_refund_no,
            refund = %refund_amount,
            status,
            "Refund requested"
        );
        Ok(result)
    }

    /// 按商户退款单号查询退款
    pub async fn query_refund(
        &self,
        terminal: Option<Terminal>,
        out_refund_no: &str,
    ) -> PaymentResult<Map<String, Value>> {
        let merchant = self.config.get(terminal)?;
        let path = format!("{}/{}", REFUNDS_PATH, path_segment(out_refund_no)?);
        self.call(&merchant, &UpstreamRequest::get(path)).await
    }

    /// 下载并解密平台证书
    ///
    /// `verify = false` 仅用于本地还没有任何平台证书时的首次下载。
    pub async fn certificates(
        &self,
        merchant: &MerchantIdentity,
        verify: bool,
    ) -> PaymentResult<PlatformCertificates> {
        let response = self
            .wechat_pay
            .send(merchant, &UpstreamRequest::get(CERTIFICATES_PATH))
            .await?;

        let current = self.certificates.snapshot(&merchant.mchid).await;
        let verification = if verify {
            ResponseVerification::Verify(&current)
        } else {
            warn!(mchid = %merchant.mchid, "Downloading platform certificates without signature verification");
            ResponseVerification::Bypass
        };

        let result = read_result(&response, verification, &self.verifier)?;
        let downloaded: CertificatesResponse = serde_json::from_value(Value::Object(result))?;
        if downloaded.data.is_empty() {
            return Err(PaymentError::upstream(
                "NO_CERTIFICATE",
                "No platform certificate returned",
            ));
        }

        let certificates = downloaded
            .data
            .iter()
            .map(|data| data.decrypt(&merchant.api_v3_key))
            .collect::<PaymentResult<Vec<_>>>()?;

        Ok(PlatformCertificates::new(certificates))
    }

    /// 刷新默认商户的平台证书
    pub async fn refresh_certificates(&self) -> PaymentResult<Vec<String>> {
        let merchant = self.config.get(None)?;
        self.refresh_certificates_for(&merchant).await
    }

    /// 下载平台证书并整体替换本地快照；本地为空时跳过应答验签
    pub async fn refresh_certificates_for(&self, merchant: &MerchantIdentity) -> PaymentResult<Vec<String>> {
        let verify = !self.certificates.snapshot(&merchant.mchid).await.is_empty();
        let certificates = self.certificates(merchant, verify).await?;

        let mut serials: Vec<String> = certificates.serials().into_iter().map(String::from).collect();
        serials.sort();

        self.certificates.replace(&merchant.mchid, certificates).await;
        Ok(serials)
    }

    /// 按终端取商户身份
    pub(crate) fn merchant(&self, terminal: Option<Terminal>) -> PaymentResult<Arc<MerchantIdentity>> {
        self.config.get(terminal)
    }

    /// 发送请求，只检查状态码，不验签（账单文件等）
    pub(crate) async fn fetch(
        &self,
        merchant: &MerchantIdentity,
        request: &UpstreamRequest,
    ) -> PaymentResult<UpstreamResponse> {
        let response = self.wechat_pay.send(merchant, request).await?;
        ensure_success(&response)?;
        Ok(response)
    }

    /// 发送请求并验签读取结果
    pub(crate) async fn call(
        &self,
        merchant: &MerchantIdentity,
        request: &UpstreamRequest,
    ) -> PaymentResult<Map<String, Value>> {
        let response = self.wechat_pay.send(merchant, request).await?;
        let certificates = self.certificates.snapshot(&merchant.mchid).await;
        read_result(
            &response,
            ResponseVerification::Verify(&certificates),
            &self.verifier,
        )
    }
}

/// 商户单号只允许字母数字与 `_-|*@`，直接拼进路径
pub(crate) fn path_segment(no: &str) -> PaymentResult<&str> {
    let valid = !no.is_empty()
        && no.len() <= 64
        && no
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '|' | '*' | '@'));
    if valid {
        Ok(no)
    } else {
        Err(PaymentError::Validation(format!("Invalid merchant number: {}", no)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::DEFAULT_BASE_URL;
    use crate::infrastructure::crypto::decrypt::encrypt_aes_256_gcm;
    use crate::infrastructure::crypto::test_keys;
    use crate::ports::pay_config_port::StaticPayConfig;
    use crate::ports::wechat_pay_port::{HttpMethod, UpstreamResponse};
    use async_trait::async_trait;
    use rsa::RsaPublicKey;
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::str::FromStr;
    use std::sync::Mutex;

    const API_V3_KEY: &str = "01234567890123456789012345678901";

    /// 记录请求并返回固定应答的假客户端
    #[derive(Default)]
    struct FakeWeChatPay {
        requests: Mutex<Vec<UpstreamRequest>>,
        response: Mutex<Option<UpstreamResponse>>,
    }

    impl FakeWeChatPay {
        fn replying(response: UpstreamResponse) -> Self {
            Self {
                requests: Mutex::default(),
                response: Mutex::new(Some(response)),
            }
        }

        fn requests(&self) -> Vec<UpstreamRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WeChatPayPort for FakeWeChatPay {
        async fn send(
            &self,
            _merchant: &MerchantIdentity,
            request: &UpstreamRequest,
        ) -> PaymentResult<UpstreamResponse> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(self
                .response
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| UpstreamResponse::new(500, "")))
        }
    }

    fn merchant() -> MerchantIdentity {
        MerchantIdentity {
            mchid: "1900000001".to_string(),
            appid: Some("wx_mp".to_string()),
            serial_no: "MERCHANT_SERIAL".to_string(),
            private_key: test_keys::merchant_key()
                .to_pkcs8_pem(LineEnding::LF)
                .unwrap()
                .to_string(),
            api_v3_key: API_V3_KEY.to_string(),
            notify_url: "https://example.com/wechat/pay/callback".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    fn service(fake: FakeWeChatPay) -> (PaymentService<FakeWeChatPay>, Arc<FakeWeChatPay>, Arc<CertificateStore>) {
        let fake = Arc::new(fake);
        let store = Arc::new(CertificateStore::new());
        let config = Arc::new(StaticPayConfig::new(merchant()).unwrap());
        (PaymentService::new(fake.clone(), config, store.clone()), fake, store)
    }

    #[tokio::test]
    async fn test_jsapi_without_openid_sends_nothing() {
        let (service, fake, _) = service(FakeWeChatPay::default());
        let order = OrderDescriptor::new("ORDER_000001", Decimal::from_str("1.00").unwrap(), "商品");

        let result = service.pay(Terminal::Routine, &order, None).await;
        assert!(matches!(result, Err(PaymentError::Validation(_))));
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn test_unsigned_response_rejected() {
        let fake = FakeWeChatPay::replying(UpstreamResponse::new(200, r#"{"code_url":"weixin://wxpay/x"}"#));
        let (service, _, _) = service(fake);
        let order = OrderDescriptor::new("ORDER_000001", Decimal::from_str("1.00").unwrap(), "商品");

        assert!(matches!(
            service.pay(Terminal::Pc, &order, None).await,
            Err(PaymentError::Signature(_))
        ));
    }

    #[tokio::test]
    async fn test_refund_request_body() {
        let fake = FakeWeChatPay::replying(UpstreamResponse::new(400, r#"{"code":"NOT_ENOUGH","message":"余额不足"}"#));
        let (service, fake, _) = service(fake);
        let refund = RefundDescriptor {
            transaction_id: None,
            out_trade_no: Some("ORDER_000001".to_string()),
            out_refund_no: "REFUND@0001".to_string(),
            reason: Some("退货".to_string()),
            refund: Decimal::from_str("0.50").unwrap(),
            total: Decimal::from_str("1.00").unwrap(),
        };

        assert!(matches!(
            service.refund(None, &refund).await,
            Err(PaymentError::UpstreamError { .. })
        ));

        let requests = fake.requests();
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].path, "/v3/refund/domestic/refunds");
        let body: Value = serde_json::from_str(requests[0].body_str()).unwrap();
        assert_eq!(body["out_trade_no"], "ORDER_000001");
        assert_eq!(body["amount"]["refund"], 50);
        assert_eq!(body["amount"]["total"], 100);
        assert_eq!(body["notify_url"], "https://example.com/wechat/pay/callback");
        assert!(body.get("transaction_id").is_none());
    }

    #[tokio::test]
    async fn test_query_rejects_path_injection() {
        let (service, fake, _) = service(FakeWeChatPay::default());
        assert!(matches!(
            service.query_order(None, "../../v3/certificates").await,
            Err(PaymentError::Validation(_))
        ));
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_certificates_without_verification() {
        let pem = RsaPublicKey::from(test_keys::platform_key())
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        let body = json!({
            "data": [{
                "serial_no": "PLATFORM_SERIAL",
                "effective_time": "2024-01-01T00:00:00+08:00",
                "expire_time": "2099-01-01T00:00:00+08:00",
                "encrypt_certificate": {
                    "algorithm": "AEAD_AES_256_GCM",
                    "nonce": "0123456789ab",
                    "associated_data": "certificate",
                    "ciphertext": encrypt_aes_256_gcm(API_V3_KEY, "0123456789ab", "certificate", &pem)
                }
            }]
        });
        let fake = FakeWeChatPay::replying(UpstreamResponse::new(200, body.to_string()));
        let (service, fake, store) = service(fake);

        let serials = service.refresh_certificates().await.unwrap();
        assert_eq!(serials, vec!["PLATFORM_SERIAL".to_string()]);
        assert_eq!(fake.requests()[0].path, "/v3/certificates");
        assert!(store.snapshot("1900000001").await.get("PLATFORM_SERIAL").is_some());

        // 已有证书后，未签名的应答不再被接受
        assert!(matches!(
            service.refresh_certificates().await,
            Err(PaymentError::Signature(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_certificate_list_is_error() {
        let fake = FakeWeChatPay::replying(UpstreamResponse::new(200, r#"{"data":[]}"#));
        let (service, _, _) = service(fake);

        match service.certificates(&merchant(), false).await {
            Err(PaymentError::UpstreamError { code, .. }) => assert_eq!(code, "NO_CERTIFICATE"),
            other => panic!("unexpected: {:?}", other.map(|c| c.len())),
        }
    }

    #[test]
    fn test_path_segment() {
        assert_eq!(path_segment("ORDER_001|a*b@c-d").unwrap(), "ORDER_001|a*b@c-d");
        assert!(path_segment("").is_err());
        assert!(path_segment("a/b").is_err());
        assert!(path_segment("a?b=1").is_err());
    }
}
