pub mod decrypt;
pub mod sign;
pub mod verify;

pub use decrypt::decrypt_aes_256_gcm;
pub use sign::{MerchantSigner, SignerCache, build_authorization, build_sign_message, generate_nonce};
pub use verify::{build_verify_message, verify_signature};

/// 测试用 RSA 密钥，生成一次后复用
#[cfg(test)]
pub(crate) mod test_keys {
    use rsa::RsaPrivateKey;
    use std::sync::OnceLock;

    static MERCHANT: OnceLock<RsaPrivateKey> = OnceLock::new();
    static PLATFORM: OnceLock<RsaPrivateKey> = OnceLock::new();

    pub fn merchant_key() -> &'static RsaPrivateKey {
        MERCHANT.get_or_init(|| RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap())
    }

    pub fn platform_key() -> &'static RsaPrivateKey {
        PLATFORM.get_or_init(|| RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap())
    }
}
