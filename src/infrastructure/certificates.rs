use crate::domain::errors::{PaymentError, PaymentResult};
use crate::infrastructure::crypto::decrypt_aes_256_gcm;
use chrono::{DateTime, Utc};
use rsa::RsaPublicKey;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs1v15::VerifyingKey;
use rsa::pkcs8::DecodePublicKey;
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use x509_cert::der::DecodePem;

/// 微信支付平台证书（只保留验签需要的公钥与有效期）
#[derive(Debug, Clone)]
pub struct PlatformCertificate {
    pub serial_no: String,
    pub verifying_key: VerifyingKey<Sha256>,
    pub expire_time: Option<DateTime<Utc>>,
}

impl PlatformCertificate {
    pub fn new(serial_no: impl Into<String>, public_key: RsaPublicKey, expire_time: Option<DateTime<Utc>>) -> Self {
        Self {
            serial_no: serial_no.into(),
            verifying_key: VerifyingKey::<Sha256>::new(public_key),
            expire_time,
        }
    }

    /// 从 PEM 加载：X.509 证书（取 notAfter 为过期时间）或公钥
    pub fn from_pem(serial_no: impl Into<String>, pem: &str) -> PaymentResult<Self> {
        if pem.contains("BEGIN CERTIFICATE") {
            let (public_key, expire_time) = parse_x509(pem)?;
            return Ok(Self::new(serial_no, public_key, Some(expire_time)));
        }

        let public_key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| PaymentError::Certificate(format!("parse public key: {}", e)))?;

        Ok(Self::new(serial_no, public_key, None))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expire_time.is_some_and(|t| t <= now)
    }
}

fn parse_x509(pem: &str) -> PaymentResult<(RsaPublicKey, DateTime<Utc>)> {
    let cert = x509_cert::Certificate::from_pem(pem)
        .map_err(|e| PaymentError::Certificate(format!("parse X.509 certificate: {}", e)))?;

    let spki_der = cert
        .tbs_certificate
        .subject_public_key_info
        .subject_public_key
        .raw_bytes();
    let public_key = RsaPublicKey::from_pkcs1_der(spki_der)
        .map_err(|e| PaymentError::Certificate(format!("parse RSA public key: {}", e)))?;

    let not_after = cert.tbs_certificate.validity.not_after.to_unix_duration();
    let expire_time = DateTime::<Utc>::from_timestamp(not_after.as_secs() as i64, 0)
        .ok_or_else(|| PaymentError::Certificate("certificate notAfter out of range".to_string()))?;

    Ok((public_key, expire_time))
}

/// 平台证书集合的不可变快照
#[derive(Debug, Clone, Default)]
pub struct PlatformCertificates {
    certs: HashMap<String, PlatformCertificate>,
}

impl PlatformCertificates {
    pub fn new(certs: impl IntoIterator<Item = PlatformCertificate>) -> Self {
        Self {
            certs: certs
                .into_iter()
                .map(|cert| (cert.serial_no.clone(), cert))
                .collect(),
        }
    }

    /// 从 `序列号 => PEM` 映射加载
    pub fn from_pem_map(pems: &HashMap<String, String>) -> PaymentResult<Self> {
        let certs = pems
            .iter()
            .map(|(serial, pem)| PlatformCertificate::from_pem(serial.clone(), pem))
            .collect::<PaymentResult<Vec<_>>>()?;
        Ok(Self::new(certs))
    }

    pub fn get(&self, serial_no: &str) -> Option<&PlatformCertificate> {
        self.certs.get(serial_no)
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn serials(&self) -> Vec<&str> {
        self.certs.keys().map(String::as_str).collect()
    }
}

/// 按商户号保存平台证书快照
///
/// 刷新时整体替换 `Arc`，读者拿到的快照永远是完整的。
#[derive(Default)]
pub struct CertificateStore {
    snapshots: RwLock<HashMap<String, Arc<PlatformCertificates>>>,
}

impl CertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前快照；未加载时为空集合（验签将失败）
    pub async fn snapshot(&self, mchid: &str) -> Arc<PlatformCertificates> {
        self.snapshots
            .read()
            .await
            .get(mchid)
            .cloned()
            .unwrap_or_default()
    }

    /// 持有该序列号平台证书的商户号
    pub async fn mchid_for_serial(&self, serial_no: &str) -> Option<String> {
        self.snapshots
            .read()
            .await
            .iter()
            .find(|(_, certificates)| certificates.get(serial_no).is_some())
            .map(|(mchid, _)| mchid.clone())
    }

    pub async fn replace(&self, mchid: &str, certificates: PlatformCertificates) {
        info!(mchid, count = certificates.len(), "platform certificates updated");
        self.snapshots
            .write()
            .await
            .insert(mchid.to_string(), Arc::new(certificates));
    }
}

/// `GET /v3/certificates` 应答
#[derive(Debug, Clone, Deserialize)]
pub struct CertificatesResponse {
    #[serde(default)]
    pub data: Vec<CertificateData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CertificateData {
    pub serial_no: String,
    pub effective_time: String,
    pub expire_time: String,
    pub encrypt_certificate: EncryptCertificate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncryptCertificate {
    pub algorithm: String,
    pub nonce: String,
    pub associated_data: String,
    pub ciphertext: String,
}

impl CertificateData {
    /// 用 API v3 密钥解密证书并解析公钥
    pub fn decrypt(&self, api_v3_key: &str) -> PaymentResult<PlatformCertificate> {
        let enc = &self.encrypt_certificate;
        let pem = decrypt_aes_256_gcm(api_v3_key, &enc.nonce, &enc.associated_data, &enc.ciphertext)?;
        debug!(serial_no = %self.serial_no, "platform certificate decrypted");

        let mut cert = PlatformCertificate::from_pem(self.serial_no.clone(), &pem)?;
        if let Ok(expire) = DateTime::parse_from_rfc3339(&self.expire_time) {
            cert.expire_time = Some(expire.with_timezone(&Utc));
        }
        Ok(cert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::crypto::test_keys;
    use chrono::Duration;
    use rsa::pkcs8::{EncodePublicKey, LineEnding};

    fn public_pem() -> String {
        RsaPublicKey::from(test_keys::platform_key())
            .to_public_key_pem(LineEnding::LF)
            .unwrap()
    }

    fn cert(serial: &str) -> PlatformCertificate {
        PlatformCertificate::new(serial, RsaPublicKey::from(test_keys::platform_key()), None)
    }

    #[test]
    fn test_from_public_key_pem() {
        let cert = PlatformCertificate::from_pem("SERIAL_A", &public_pem()).unwrap();
        assert_eq!(cert.serial_no, "SERIAL_A");
        assert!(cert.expire_time.is_none());
        assert!(!cert.is_expired_at(Utc::now()));
    }

    #[test]
    fn test_from_pem_rejects_garbage() {
        assert!(matches!(
            PlatformCertificate::from_pem("S", "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n"),
            Err(PaymentError::Certificate(_))
        ));
        assert!(PlatformCertificate::from_pem("S", "garbage").is_err());
    }

    #[test]
    fn test_expiry() {
        let mut c = cert("SERIAL_A");
        c.expire_time = Some(Utc::now() - Duration::seconds(1));
        assert!(c.is_expired_at(Utc::now()));
    }

    #[test]
    fn test_collection_lookup() {
        let certs = PlatformCertificates::new(vec![cert("SERIAL_A"), cert("SERIAL_B")]);
        assert_eq!(certs.len(), 2);
        assert!(certs.get("SERIAL_A").is_some());
        assert!(certs.get("SERIAL_C").is_none());

        let mut pems = HashMap::new();
        pems.insert("SERIAL_P".to_string(), public_pem());
        let loaded = PlatformCertificates::from_pem_map(&pems).unwrap();
        assert_eq!(loaded.serials(), vec!["SERIAL_P"]);
    }

    #[tokio::test]
    async fn test_store_replaces_snapshot_atomically() {
        let store = CertificateStore::new();
        assert!(store.snapshot("1900000001").await.is_empty());

        store
            .replace("1900000001", PlatformCertificates::new(vec![cert("SERIAL_A")]))
            .await;
        let before = store.snapshot("1900000001").await;

        store
            .replace("1900000001", PlatformCertificates::new(vec![cert("SERIAL_B")]))
            .await;
        let after = store.snapshot("1900000001").await;

        // 旧快照不受替换影响
        assert!(before.get("SERIAL_A").is_some());
        assert!(before.get("SERIAL_B").is_none());
        assert!(after.get("SERIAL_A").is_none());
        assert!(after.get("SERIAL_B").is_some());
        assert!(store.snapshot("1900000002").await.is_empty());
    }

    #[tokio::test]
    async fn test_mchid_for_serial() {
        let store = CertificateStore::new();
        store
            .replace("1900000001", PlatformCertificates::new(vec![cert("SERIAL_A")]))
            .await;
        store
            .replace("1900000002", PlatformCertificates::new(vec![cert("SERIAL_B")]))
            .await;

        assert_eq!(store.mchid_for_serial("SERIAL_B").await.as_deref(), Some("1900000002"));
        assert_eq!(store.mchid_for_serial("SERIAL_A").await.as_deref(), Some("1900000001"));
        assert!(store.mchid_for_serial("SERIAL_X").await.is_none());
    }

    #[test]
    fn test_decrypt_downloaded_certificate() {
        let key = "01234567890123456789012345678901";
        let ciphertext = crate::infrastructure::crypto::decrypt::encrypt_aes_256_gcm(
            key,
            "0123456789ab",
            "certificate",
            &public_pem(),
        );
        let data = CertificateData {
            serial_no: "SERIAL_D".to_string(),
            effective_time: "2024-01-01T00:00:00+08:00".to_string(),
            expire_time: "2099-01-01T00:00:00+08:00".to_string(),
            encrypt_certificate: EncryptCertificate {
                algorithm: "AEAD_AES_256_GCM".to_string(),
                nonce: "0123456789ab".to_string(),
                associated_data: "certificate".to_string(),
                ciphertext,
            },
        };

        let cert = data.decrypt(key).unwrap();
        assert_eq!(cert.serial_no, "SERIAL_D");
        assert!(cert.expire_time.is_some());
        assert!(!cert.is_expired_at(Utc::now()));
    }
}
