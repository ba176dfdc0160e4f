use crate::application::{
    AddReceiverRequest, BillQuery, CertificatesRefreshed, CreatePaymentRequest, CreateRefundRequest,
    CreateReturnOrderRequest, CreateSharingOrderRequest, DeleteReceiverRequest, ErrorResponse, PayNotifyService,
    PaymentService, ProfitSharingService, ReturnOrderQuery, SharingOrderQuery, TerminalQuery, UnfreezeRequest,
};
use crate::domain::{BillDownload, PaymentError};
use crate::ports::notification_port::NotifyReply;
use crate::ports::wechat_pay_port::{SignatureHeaders, WeChatPayPort};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 应用状态
pub struct AppState<T: WeChatPayPort> {
    pub payment_service: Arc<PaymentService<T>>,
    pub notify_service: Arc<PayNotifyService>,
    pub profit_sharing_service: Arc<ProfitSharingService<T>>,
}

impl<T: WeChatPayPort> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            payment_service: self.payment_service.clone(),
            notify_service: self.notify_service.clone(),
            profit_sharing_service: self.profit_sharing_service.clone(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// 错误到 HTTP 状态码的映射
fn api_error(e: PaymentError) -> ApiError {
    let (status, code) = match &e {
        PaymentError::Validation(_) | PaymentError::InvalidAmount(_) | PaymentError::MissingAppId => {
            (StatusCode::BAD_REQUEST, "INVALID_REQUEST")
        }
        PaymentError::UpstreamError { .. } => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
        PaymentError::Signature(_) => (StatusCode::BAD_GATEWAY, "SIGNATURE_ERROR"),
        PaymentError::TransportError(_) => (StatusCode::SERVICE_UNAVAILABLE, "TRANSPORT_ERROR"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    };

    if status.is_server_error() {
        error!(error = %e, retryable = e.is_retryable(), "Request failed");
    } else {
        warn!(error = %e, "Request rejected");
    }

    (status, Json(ErrorResponse::new(code, e.to_string())))
}

/// 客户端 IP：优先取反向代理头
fn client_ip(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header("x-real-ip")
        .or_else(|| header("x-forwarded-for").and_then(|v| v.split(',').next()).map(str::trim))
        .map(str::to_string)
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()))
}

/// 创建支付订单
pub async fn create_payment<T: WeChatPayPort + 'static>(
    State(state): State<AppState<T>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!(terminal = %request.terminal, out_trade_no = %request.order.out_trade_no, "Received payment creation request");

    let ip = client_ip(&headers, connect_info.as_ref());
    state
        .payment_service
        .pay(request.terminal, &request.order, ip.as_deref())
        .await
        .map(|result| (StatusCode::CREATED, Json(result)))
        .map_err(api_error)
}

/// 查询订单
pub async fn query_payment<T: WeChatPayPort + 'static>(
    State(state): State<AppState<T>>,
    Path(out_trade_no): Path<String>,
    Query(query): Query<TerminalQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .payment_service
        .query_order(query.terminal, &out_trade_no)
        .await
        .map(Json)
        .map_err(api_error)
}

/// 关闭订单
pub async fn close_payment<T: WeChatPayPort + 'static>(
    State(state): State<AppState<T>>,
    Path(out_trade_no): Path<String>,
    Query(query): Query<TerminalQuery>,
) -> Result<StatusCode, ApiError> {
    state
        .payment_service
        .close_order(query.terminal, &out_trade_no)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(api_error)
}

/// 申请退款
pub async fn create_refund<T: WeChatPayPort + 'static>(
    State(state): State<AppState<T>>,
    Json(request): Json<CreateRefundRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!(out_refund_no = %request.refund.out_refund_no, "Received refund request");

    state
        .payment_service
        .refund(request.terminal, &request.refund)
        .await
        .map(Json)
        .map_err(api_error)
}

/// 查询退款
pub async fn query_refund<T: WeChatPayPort + 'static>(
    State(state): State<AppState<T>>,
    Path(out_refund_no): Path<String>,
    Query(query): Query<TerminalQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .payment_service
        .query_refund(query.terminal, &out_refund_no)
        .await
        .map(Json)
        .map_err(api_error)
}

/// 下载并安装平台证书
pub async fn refresh_certificates<T: WeChatPayPort + 'static>(
    State(state): State<AppState<T>>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .payment_service
        .refresh_certificates()
        .await
        .map(|serial_nos| Json(CertificatesRefreshed { serial_nos }))
        .map_err(api_error)
}

/// 请求分账
pub async fn create_sharing_order<T: WeChatPayPort + 'static>(
    State(state): State<AppState<T>>,
    Json(request): Json<CreateSharingOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!(out_order_no = %request.order.out_order_no, "Received profit sharing request");

    state
        .profit_sharing_service
        .create_order(request.terminal, &request.order)
        .await
        .map(Json)
        .map_err(api_error)
}

/// 查询分账结果
pub async fn query_sharing_order<T: WeChatPayPort + 'static>(
    State(state): State<AppState<T>>,
    Path(out_order_no): Path<String>,
    Query(query): Query<SharingOrderQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .profit_sharing_service
        .query_order(query.terminal, &query.transaction_id, &out_order_no)
        .await
        .map(Json)
        .map_err(api_error)
}

/// 请求分账回退
pub async fn create_return_order<T: WeChatPayPort + 'static>(
    State(state): State<AppState<T>>,
    Json(request): Json<CreateReturnOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .profit_sharing_service
        .create_return_order(request.terminal, &request.order)
        .await
        .map(Json)
        .map_err(api_error)
}

/// 查询分账回退结果
pub async fn query_return_order<T: WeChatPayPort + 'static>(
    State(state): State<AppState<T>>,
    Path(out_return_no): Path<String>,
    Query(query): Query<ReturnOrderQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .profit_sharing_service
        .query_return_order(query.terminal, &out_return_no, &query.out_order_no)
        .await
        .map(Json)
        .map_err(api_error)
}

/// 解冻剩余资金
pub async fn unfreeze_order<T: WeChatPayPort + 'static>(
    State(state): State<AppState<T>>,
    Json(request): Json<UnfreezeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .profit_sharing_service
        .unfreeze_order(request.terminal, &request.unfreeze)
        .await
        .map(Json)
        .map_err(api_error)
}

/// 查询剩余待分金额
pub async fn query_order_amount<T: WeChatPayPort + 'static>(
    State(state): State<AppState<T>>,
    Path(transaction_id): Path<String>,
    Query(query): Query<TerminalQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .profit_sharing_service
        .query_order_amount(query.terminal, &transaction_id)
        .await
        .map(Json)
        .map_err(api_error)
}

/// 添加分账接收方
pub async fn add_receiver<T: WeChatPayPort + 'static>(
    State(state): State<AppState<T>>,
    Json(request): Json<AddReceiverRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .profit_sharing_service
        .add_receiver(request.terminal, &request.receiver)
        .await
        .map(Json)
        .map_err(api_error)
}

/// 删除分账接收方
pub async fn delete_receiver<T: WeChatPayPort + 'static>(
    State(state): State<AppState<T>>,
    Json(request): Json<DeleteReceiverRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .profit_sharing_service
        .delete_receiver(request.terminal, request.receiver_type, &request.account)
        .await
        .map(Json)
        .map_err(api_error)
}

/// 申请分账账单
pub async fn sharing_bills<T: WeChatPayPort + 'static>(
    State(state): State<AppState<T>>,
    Query(query): Query<BillQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .profit_sharing_service
        .bills(query.terminal, query.bill_date, query.tar_type)
        .await
        .map(Json)
        .map_err(api_error)
}

/// 下载分账账单文件
pub async fn download_sharing_bill<T: WeChatPayPort + 'static>(
    State(state): State<AppState<T>>,
    Query(query): Query<TerminalQuery>,
    Json(bill): Json<BillDownload>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .profit_sharing_service
        .download_bill(query.terminal, &bill)
        .await
        .map(|content| ([(header::CONTENT_TYPE, "application/octet-stream")], content))
        .map_err(api_error)
}

/// 微信支付回调
pub async fn wechat_notify<T: WeChatPayPort + 'static>(
    State(state): State<AppState<T>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<NotifyReply>) {
    let reply = match std::str::from_utf8(&body) {
        Ok(body) => notify_reply(&state, &headers, body).await,
        Err(e) => {
            warn!(error = %e, "notification body is not UTF-8");
            NotifyReply::fail("Invalid notification body")
        }
    };

    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_REQUEST);
    (status, Json(reply))
}

async fn notify_reply<T: WeChatPayPort + 'static>(
    state: &AppState<T>,
    headers: &HeaderMap,
    body: &str,
) -> NotifyReply {
    let signature_headers = SignatureHeaders::from_lookup(|name| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });

    state.notify_service.handle(&signature_headers, body).await
}

/// 健康检查
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_proxy_headers() {
        let peer = ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 5000)));

        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(&peer)).as_deref(), Some("10.0.0.1"));
        assert_eq!(client_ip(&headers, None), None);

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.2"));
        assert_eq!(client_ip(&headers, Some(&peer)).as_deref(), Some("203.0.113.7"));

        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.1"));
        assert_eq!(client_ip(&headers, Some(&peer)).as_deref(), Some("198.51.100.1"));
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(api_error(PaymentError::MissingAppId).0, StatusCode::BAD_REQUEST);
        assert_eq!(
            api_error(PaymentError::upstream("ORDERPAID", "paid")).0,
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            api_error(PaymentError::Configuration("x".to_string())).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
