use crate::domain::errors::PaymentResult;
use crate::domain::MerchantIdentity;
use crate::infrastructure::crypto::{SignerCache, build_authorization, build_sign_message, generate_nonce};
use crate::ports::wechat_pay_port::*;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

const CLIENT_USER_AGENT: &str = concat!("wechat-pay-gateway/", env!("CARGO_PKG_VERSION"));

/// 微信支付 HTTP 适配器
///
/// 只负责签名与传输；应答验签、业务解析由应用层完成。
pub struct WeChatPayAdapter {
    client: Client,
    signers: SignerCache,
}

impl WeChatPayAdapter {
    pub fn new(timeout: Duration) -> PaymentResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            signers: SignerCache::new(),
        }
    }

    /// 生成 Authorization 头
    fn authorization(&self, merchant: &MerchantIdentity, request: &UpstreamRequest) -> PaymentResult<String> {
        let timestamp = chrono::Utc::now().timestamp();
        let nonce = generate_nonce();
        let message = build_sign_message(
            &request.method.to_string(),
            &request.path,
            timestamp,
            &nonce,
            request.body_str(),
        );
        let signature = self.signers.get(merchant)?.sign(&message);

        Ok(build_authorization(
            &merchant.mchid,
            &merchant.serial_no,
            timestamp,
            &nonce,
            &signature,
        ))
    }
}

#[async_trait]
impl WeChatPayPort for WeChatPayAdapter {
    async fn send(
        &self,
        merchant: &MerchantIdentity,
        request: &UpstreamRequest,
    ) -> PaymentResult<UpstreamResponse> {
        let url = format!("{}{}", merchant.base_url.trim_end_matches('/'), request.path);
        let authorization = self.authorization(merchant, request)?;

        let builder = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self
                .client
                .post(&url)
                .header(CONTENT_TYPE, "application/json")
                .body(request.body_str().to_string()),
        };

        debug!(method = %request.method, path = %request.path, body = request.body_str(), "WeChat pay request");

        let response = builder
            .header(AUTHORIZATION, authorization)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .send()
            .await?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let mut upstream = UpstreamResponse::from_raw(status, response.bytes().await?.to_vec());
        upstream.headers = headers;

        if upstream.is_success() {
            debug!(status, body = %upstream.body, "WeChat pay response");
        } else {
            warn!(status, path = %request.path, body = %upstream.body, "WeChat pay API error");
        }

        Ok(upstream)
    }
}
