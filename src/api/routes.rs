use super::handlers::*;
use crate::ports::WeChatPayPort;
use axum::{
    Router,
    routing::{any, get, post},
};
use tower_http::trace::TraceLayer;

/// 微信支付回调地址
pub const NOTIFY_PATH: &str = "/wechat/pay/callback";

pub fn create_router<T: WeChatPayPort + 'static>(state: AppState<T>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(NOTIFY_PATH, any(wechat_notify::<T>))
        .route("/api/payments", post(create_payment::<T>))
        .route("/api/payments/:out_trade_no", get(query_payment::<T>))
        .route("/api/payments/:out_trade_no/close", post(close_payment::<T>))
        .route("/api/refunds", post(create_refund::<T>))
        .route("/api/refunds/:out_refund_no", get(query_refund::<T>))
        .route("/api/certificates/refresh", post(refresh_certificates::<T>))
        .route("/api/profit-sharing/orders", post(create_sharing_order::<T>))
        .route("/api/profit-sharing/orders/unfreeze", post(unfreeze_order::<T>))
        .route("/api/profit-sharing/orders/:out_order_no", get(query_sharing_order::<T>))
        .route("/api/profit-sharing/return-orders", post(create_return_order::<T>))
        .route("/api/profit-sharing/return-orders/:out_return_no", get(query_return_order::<T>))
        .route(
            "/api/profit-sharing/transactions/:transaction_id/amounts",
            get(query_order_amount::<T>),
        )
        .route("/api/profit-sharing/receivers", post(add_receiver::<T>))
        .route("/api/profit-sharing/receivers/delete", post(delete_receiver::<T>))
        .route("/api/profit-sharing/bills", get(sharing_bills::<T>))
        .route("/api/profit-sharing/bills/download", post(download_sharing_bill::<T>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
