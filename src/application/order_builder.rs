use crate::application::response::{ResponseVerification, read_result, required_str};
use crate::application::verifier::NotificationVerifier;
use crate::domain::errors::{PaymentError, PaymentResult};
use crate::domain::{
    AppSdkConfig, BridgeConfig, LaunchPayload, MerchantIdentity, Money, OrderDescriptor, Terminal,
    TradeType,
};
use crate::infrastructure::crypto::{SignerCache, generate_nonce};
use crate::ports::wechat_pay_port::{UpstreamRequest, UpstreamResponse};
use serde::Serialize;
use tracing::debug;

/// 已构造、待发送的下单请求
#[derive(Debug, Clone)]
pub struct PrepayRequest {
    pub terminal: Terminal,
    pub trade_type: TradeType,
    pub app_id: String,
    pub out_trade_no: String,
    pub amount: Money,
    pub redirect_url: Option<String>,
    pub request: UpstreamRequest,
}

#[derive(Debug, Serialize)]
struct PrepayBody<'a> {
    appid: &'a str,
    mchid: &'a str,
    description: &'a str,
    out_trade_no: &'a str,
    notify_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    attach: Option<&'a str>,
    amount: PrepayAmount,
    #[serde(skip_serializing_if = "Option::is_none")]
    payer: Option<Payer<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scene_info: Option<SceneInfo<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    settle_info: Option<SettleInfo>,
}

#[derive(Debug, Serialize)]
struct PrepayAmount {
    total: i64,
    currency: &'static str,
}

#[derive(Debug, Serialize)]
struct Payer<'a> {
    openid: &'a str,
}

#[derive(Debug, Serialize)]
struct SceneInfo<'a> {
    payer_client_ip: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    h5_info: Option<H5Info>,
}

#[derive(Debug, Serialize)]
struct H5Info {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct SettleInfo {
    profit_sharing: bool,
}

/// 按终端构造下单请求，并把应答转换成客户端调起支付的数据
#[derive(Default)]
pub struct OrderBuilder {
    signers: SignerCache,
    verifier: NotificationVerifier,
}

impl OrderBuilder {
    pub fn new(verifier: NotificationVerifier) -> Self {
        Self {
            signers: SignerCache::new(),
            verifier,
        }
    }

    /// 构造下单请求；所有校验都在发请求之前完成
    pub fn build(
        &self,
        merchant: &MerchantIdentity,
        terminal: Terminal,
        order: &OrderDescriptor,
        client_ip: Option<&str>,
    ) -> PaymentResult<PrepayRequest> {
        let amount = order.validate()?;
        let trade_type = terminal.trade_type();

        let app_id = order
            .app_id
            .as_deref()
            .or(merchant.appid.as_deref())
            .filter(|id| !id.is_empty())
            .ok_or(PaymentError::MissingAppId)?;

        let client_ip = client_ip.filter(|ip| !ip.is_empty());

        let payer = match trade_type {
            TradeType::Jsapi => {
                let openid = order
                    .openid
                    .as_deref()
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| {
                        PaymentError::Validation(format!("openid is required for terminal {}", terminal))
                    })?;
                Some(Payer { openid })
            }
            _ => None,
        };

        let scene_info = match trade_type {
            TradeType::H5 => {
                let ip = client_ip.ok_or_else(|| {
                    PaymentError::Validation("payer client ip is required for H5 payment".to_string())
                })?;
                Some(SceneInfo {
                    payer_client_ip: ip,
                    h5_info: Some(H5Info { kind: "Wap" }),
                })
            }
            _ => client_ip.map(|ip| SceneInfo {
                payer_client_ip: ip,
                h5_info: None,
            }),
        };

        let body = PrepayBody {
            appid: app_id,
            mchid: &merchant.mchid,
            description: &order.description,
            out_trade_no: &order.out_trade_no,
            notify_url: &merchant.notify_url,
            attach: order.attach.as_deref(),
            amount: PrepayAmount {
                total: amount.to_cents(),
                currency: "CNY",
            },
            payer,
            scene_info,
            settle_info: order.profit_sharing.map(|profit_sharing| SettleInfo { profit_sharing }),
        };

        let request = UpstreamRequest::post_json(trade_type.path(), &body)?;
        debug!(terminal = %terminal, trade_type = %trade_type, out_trade_no = %order.out_trade_no, "prepay request built");

        Ok(PrepayRequest {
            terminal,
            trade_type,
            app_id: app_id.to_string(),
            out_trade_no: order.out_trade_no.clone(),
            amount,
            redirect_url: order.redirect_url.clone(),
            request,
        })
    }

    /// 把下单应答转换成调起支付的数据
    pub fn normalize(
        &self,
        merchant: &MerchantIdentity,
        prepared: &PrepayRequest,
        response: &UpstreamResponse,
        verification: ResponseVerification<'_>,
    ) -> PaymentResult<LaunchPayload> {
        let result = read_result(response, verification, &self.verifier)?;

        match prepared.trade_type {
            TradeType::Jsapi => {
                let prepay_id = required_str(&result, "prepay_id")?;
                Ok(LaunchPayload::BridgeConfig(self.bridge_config(
                    merchant,
                    &prepared.app_id,
                    prepay_id,
                )?))
            }
            TradeType::App => {
                let prepay_id = required_str(&result, "prepay_id")?;
                Ok(LaunchPayload::AppSdkConfig(self.app_sdk_config(
                    merchant,
                    &prepared.app_id,
                    prepay_id,
                )?))
            }
            TradeType::Native => Ok(LaunchPayload::CodeUrl(
                required_str(&result, "code_url")?.to_string(),
            )),
            TradeType::H5 => {
                let h5_url = required_str(&result, "h5_url")?;
                Ok(LaunchPayload::RedirectUrl(match &prepared.redirect_url {
                    Some(redirect) if !redirect.is_empty() => {
                        format!("{}&redirect_url={}", h5_url, urlencoding::encode(redirect))
                    }
                    _ => h5_url.to_string(),
                }))
            }
        }
    }

    /// JSAPI / 小程序调起支付参数
    pub fn bridge_config(
        &self,
        merchant: &MerchantIdentity,
        app_id: &str,
        prepay_id: &str,
    ) -> PaymentResult<BridgeConfig> {
        let time_stamp = chrono::Utc::now().timestamp().to_string();
        let nonce_str = generate_nonce();
        let package = format!("prepay_id={}", prepay_id);
        let message = format!("{}\n{}\n{}\n{}\n", app_id, time_stamp, nonce_str, package);

        Ok(BridgeConfig {
            app_id: app_id.to_string(),
            time_stamp,
            nonce_str,
            package,
            sign_type: "RSA".to_string(),
            pay_sign: self.signers.get(merchant)?.sign(&message),
        })
    }

    /// APP 调起支付参数
    pub fn app_sdk_config(
        &self,
        merchant: &MerchantIdentity,
        app_id: &str,
        prepay_id: &str,
    ) -> PaymentResult<AppSdkConfig> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let noncestr = generate_nonce();
        let message = format!("{}\n{}\n{}\n{}\n", app_id, timestamp, noncestr, prepay_id);

        Ok(AppSdkConfig {
            appid: app_id.to_string(),
            partnerid: merchant.mchid.clone(),
            prepayid: prepay_id.to_string(),
            package: "Sign=WXPay".to_string(),
            noncestr,
            timestamp,
            sign: self.signers.get(merchant)?.sign(&message),
        })
    }
}
