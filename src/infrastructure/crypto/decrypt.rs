use crate::domain::errors::{PaymentError, PaymentResult};
use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};

/// AEAD_AES_256_GCM 解密回调资源或平台证书
///
/// 密钥为 32 字节 API v3 密钥，nonce 为 12 字节，密文为 Base64。
pub fn decrypt_aes_256_gcm(
    api_v3_key: &str,
    nonce: &str,
    associated_data: &str,
    ciphertext_base64: &str,
) -> PaymentResult<String> {
    let key_bytes = api_v3_key.as_bytes();
    if key_bytes.len() != 32 {
        return Err(PaymentError::Crypto(format!(
            "api_v3_key must be 32 bytes, got {}",
            key_bytes.len()
        )));
    }

    let nonce_bytes = nonce.as_bytes();
    if nonce_bytes.len() != 12 {
        return Err(PaymentError::Crypto(format!(
            "nonce must be 12 bytes, got {}",
            nonce_bytes.len()
        )));
    }

    let ciphertext = BASE64
        .decode(ciphertext_base64)
        .map_err(|e| PaymentError::Crypto(format!("Base64 decode error: {}", e)))?;

    let cipher = Aes256Gcm::new_from_slice(key_bytes)
        .map_err(|e| PaymentError::Crypto(format!("AES init error: {}", e)))?;

    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: &ciphertext,
                aad: associated_data.as_bytes(),
            },
        )
        .map_err(|e| PaymentError::Crypto(format!("Decrypt error: {}", e)))?;

    String::from_utf8(plaintext).map_err(|e| PaymentError::Crypto(format!("UTF8 decode error: {}", e)))
}

#[cfg(test)]
pub(crate) fn encrypt_aes_256_gcm(api_v3_key: &str, nonce: &str, associated_data: &str, plaintext: &str) -> String {
    let cipher = Aes256Gcm::new_from_slice(api_v3_key.as_bytes()).unwrap();
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
