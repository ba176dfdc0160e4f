use crate::domain::MerchantIdentity;
use crate::domain::errors::{PaymentError, PaymentResult};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::RwLock;

/// 认证类型
pub const AUTH_SCHEMA: &str = "WECHATPAY2-SHA256-RSA2048";

/// 商户私钥签名器（SHA256withRSA）
#[derive(Clone)]
pub struct MerchantSigner {
    signing_key: SigningKey<Sha256>,
}

impl MerchantSigner {
    /// 加载商户私钥，支持 PKCS#8 与 PKCS#1 PEM
    pub fn from_pem(pem: &str) -> PaymentResult<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| PaymentError::Crypto(format!("Failed to load private key: {}", e)))?;

        Ok(Self::new(private_key))
    }

    pub fn new(private_key: RsaPrivateKey) -> Self {
        Self {
            signing_key: SigningKey::<Sha256>::new(private_key),
        }
    }

    /// 签名并 Base64 编码
    pub fn sign(&self, message: &str) -> String {
        let signature = self
            .signing_key
            .sign_with_rng(&mut rand::thread_rng(), message.as_bytes());
        BASE64.encode(signature.to_bytes())
    }
}

/// 按商户缓存已解析的私钥，避免每次请求都解析 PEM
#[derive(Default)]
pub struct SignerCache {
    signers: RwLock<HashMap<String, MerchantSigner>>,
}

impl SignerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, merchant: &MerchantIdentity) -> PaymentResult<MerchantSigner> {
        let key = format!("{}:{}", merchant.mchid, merchant.serial_no);
        if let Some(signer) = self
            .signers
            .read()
            .map_err(|_| PaymentError::Crypto("signer cache poisoned".to_string()))?
            .get(&key)
        {
            return Ok(signer.clone());
        }

        let signer = MerchantSigner::from_pem(&merchant.private_key)?;
        self.signers
            .write()
            .map_err(|_| PaymentError::Crypto("signer cache poisoned".to_string()))?
            .insert(key, signer.clone());
        Ok(signer)
    }
}

/// 请求签名串：`METHOD\nPATH\nTIMESTAMP\nNONCE\nBODY\n`
pub fn build_sign_message(method: &str, path: &str, timestamp: i64, nonce: &str, body: &str) -> String {
    format!("{method}\n{path}\n{timestamp}\n{nonce}\n{body}\n")
}

/// Authorization 头
pub fn build_authorization(
    mchid: &str,
    serial_no: &str,
    timestamp: i64,
    nonce: &str,
    signature: &str,
) -> String {
    format!(
        r#"{AUTH_SCHEMA} mchid="{mchid}",nonce_str="{nonce}",timestamp="{timestamp}",serial_no="{serial_no}",signature="{signature}""#
    )
}

/// 32 位随机串
pub fn generate_nonce() -> String {
    uuid::Uuid::new_v4().simple().to_string().to_uppercase()
}
