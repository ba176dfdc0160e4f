use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use wechat_pay_gateway::api::{self, AppState};
use wechat_pay_gateway::application::{Dispatcher, PayNotifyService, PaymentService, ProfitSharingService};
use wechat_pay_gateway::domain::PaymentEvent;
use wechat_pay_gateway::infrastructure::adapters::WeChatPayAdapter;
use wechat_pay_gateway::infrastructure::certificates::CertificateStore;
use wechat_pay_gateway::infrastructure::config::{ServerConfig, WeChatPayConfig};
use wechat_pay_gateway::ports::{HandlerOutcome, PayConfigPort, StaticPayConfig, handler_fn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载环境变量
    dotenvy::dotenv().ok();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Starting WeChat Pay gateway...");

    let wechat_config = WeChatPayConfig::from_env()?;
    let server_config = ServerConfig::from_env()?;
    info!(mchid = %wechat_config.merchant.mchid, "WeChat Pay configuration loaded");

    let pay_config = Arc::new(StaticPayConfig::new(wechat_config.merchant.clone())?);
    let merchant = Arc::new(wechat_config.merchant.clone());

    // 本地平台证书
    let certificates = Arc::new(CertificateStore::new());
    let local = wechat_config.load_platform_certificates()?;
    if !local.is_empty() {
        certificates.replace(&merchant.mchid, local).await;
    }

    let wechat_adapter = Arc::new(WeChatPayAdapter::new(wechat_config.http_timeout())?);
    let payment_service = Arc::new(PaymentService::new(
        wechat_adapter,
        pay_config.clone(),
        certificates.clone(),
    ));

    // 定时刷新平台证书
    if let Some(interval) = wechat_config.cert_refresh_interval() {
        let service = payment_service.clone();
        let merchants = pay_config.merchants();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                for merchant in &merchants {
                    match service.refresh_certificates_for(merchant).await {
                        Ok(serials) => info!(mchid = %merchant.mchid, ?serials, "Platform certificates refreshed"),
                        Err(e) => error!(mchid = %merchant.mchid, error = %e, "Platform certificate refresh failed"),
                    }
                }
            }
        });
    } else if certificates.snapshot(&merchant.mchid).await.is_empty() {
        warn!("No platform certificates loaded and refresh disabled; notifications will be rejected");
    }

    // 业务方在这里订阅支付事件
    let dispatcher = Dispatcher::new()
        .on_payment_succeeded(handler_fn(|event: &PaymentEvent| {
            if let Some(tx) = event.transaction() {
                info!(
                    out_trade_no = %tx.out_trade_no,
                    transaction_id = %tx.transaction_id,
                    total = tx.amount.total,
                    "Payment succeeded"
                );
            }
            Ok(HandlerOutcome::Continue)
        }))
        .on_refund_succeeded(handler_fn(|event: &PaymentEvent| {
            if let Some(refund) = event.refund() {
                info!(
                    out_refund_no = %refund.out_refund_no,
                    refund = refund.amount.refund,
                    "Refund succeeded"
                );
            }
            Ok(HandlerOutcome::Continue)
        }));

    let notify_service = Arc::new(PayNotifyService::new(pay_config, certificates, dispatcher));
    let profit_sharing_service = Arc::new(ProfitSharingService::new(payment_service.clone()));

    let app = api::create_router(AppState {
        payment_service,
        notify_service,
        profit_sharing_service,
    });

    let addr = server_config.addr();
    info!("Server listening on {}", addr);
    info!("  ANY  {} - WeChat Pay notification", api::NOTIFY_PATH);
    info!("  POST /api/payments - Create payment");
    info!("  GET  /api/payments/:out_trade_no - Query payment");
    info!("  POST /api/refunds - Request refund");
    info!("  POST /api/profit-sharing/orders - Request profit sharing");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
