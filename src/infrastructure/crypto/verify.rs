use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use sha2::Sha256;

/// 验签串：`TIMESTAMP\nNONCE\nBODY\n`
pub fn build_verify_message(timestamp: &str, nonce: &str, body: &str) -> String {
    format!("{timestamp}\n{nonce}\n{body}\n")
}

/// 用平台证书公钥验证 Base64 签名；无法解码的签名视为不匹配
pub fn verify_signature(verifying_key: &VerifyingKey<Sha256>, message: &str, signature_base64: &str) -> bool {
    let Ok(sig_bytes) = BASE64.decode(signature_base64) else {
        return false;
    };
    let Ok(signature) = Signature::try_from(sig_bytes.as_slice()) else {
        return false;
    };

    verifying_key.verify(message.as_bytes(), &signature).is_ok()
}
