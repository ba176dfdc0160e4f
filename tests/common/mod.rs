#![allow(dead_code)]

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use wechat_pay_gateway::api::{self, AppState};
use wechat_pay_gateway::application::{Dispatcher, PayNotifyService, PaymentService, ProfitSharingService};
use wechat_pay_gateway::domain::MerchantIdentity;
use wechat_pay_gateway::infrastructure::adapters::WeChatPayAdapter;
use wechat_pay_gateway::infrastructure::certificates::{
    CertificateStore, PlatformCertificate, PlatformCertificates,
};
use wechat_pay_gateway::infrastructure::crypto::{MerchantSigner, build_verify_message};
use wechat_pay_gateway::ports::StaticPayConfig;

pub const MCHID: &str = "1900000001";
pub const APPID: &str = "wx8888888888888888";
pub const API_V3_KEY: &str = "01234567890123456789012345678901";
pub const PLATFORM_SERIAL: &str = "5157F09EFDC096DE15EBE81A47057A7232F1B8E1";

static MERCHANT_KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
static PLATFORM_KEY: OnceLock<RsaPrivateKey> = OnceLock::new();

pub fn merchant_key() -> &'static RsaPrivateKey {
    MERCHANT_KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap())
}

pub fn platform_key() -> &'static RsaPrivateKey {
    PLATFORM_KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap())
}

pub fn merchant(base_url: &str) -> MerchantIdentity {
    MerchantIdentity {
        mchid: MCHID.to_string(),
        appid: Some(APPID.to_string()),
        serial_no: "MERCHANT_SERIAL".to_string(),
        private_key: merchant_key()
            .to_pkcs8_pem(LineEnding::LF)
            .unwrap()
            .to_string(),
        api_v3_key: API_V3_KEY.to_string(),
        notify_url: "https://example.com/wechat/pay/callback".to_string(),
        base_url: base_url.to_string(),
    }
}

pub fn platform_certificates() -> PlatformCertificates {
    PlatformCertificates::new(vec![PlatformCertificate::new(
        PLATFORM_SERIAL,
        RsaPublicKey::from(platform_key()),
        None,
    )])
}

/// 以微信支付平台身份签名：返回 (timestamp, nonce, signature)
pub fn platform_sign(body: &str) -> (String, String, String) {
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    let signer = MerchantSigner::new(platform_key().clone());
    let signature = signer.sign(&build_verify_message(&timestamp, &nonce, body));
    (timestamp, nonce, signature)
}

/// 带平台签名的上游应答
pub fn signed(status: u16, body: &str) -> wiremock::ResponseTemplate {
    let (timestamp, nonce, signature) = platform_sign(body);
    wiremock::ResponseTemplate::new(status)
        .insert_header("Wechatpay-Timestamp", timestamp.as_str())
        .insert_header("Wechatpay-Nonce", nonce.as_str())
        .insert_header("Wechatpay-Signature", signature.as_str())
        .insert_header("Wechatpay-Serial", PLATFORM_SERIAL)
        .set_body_string(body.to_string())
}

pub fn encrypt(plaintext: &str, nonce: &str, associated_data: &str) -> String {
    let cipher = Aes256Gcm::new_from_slice(API_V3_KEY.as_bytes()).unwrap();
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(nonce.as_bytes()),
            Payload {
                msg: plaintext.as_bytes(),
                aad: associated_data.as_bytes(),
            },
        )
        .unwrap();
    BASE64.encode(ciphertext)
}

/// 组装完整的路由，上游指向 `base_url`
pub async fn app(base_url: &str, dispatcher: Dispatcher) -> axum::Router {
    let store = Arc::new(CertificateStore::new());
    store.replace(MCHID, platform_certificates()).await;

    let config = Arc::new(StaticPayConfig::new(merchant(base_url)).unwrap());
    let adapter = Arc::new(WeChatPayAdapter::new(Duration::from_secs(5)).unwrap());

    let payment_service = Arc::new(PaymentService::new(adapter, config.clone(), store.clone()));
    api::create_router(AppState {
        profit_sharing_service: Arc::new(ProfitSharingService::new(payment_service.clone())),
        payment_service,
        notify_service: Arc::new(PayNotifyService::new(config, store, dispatcher)),
    })
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
