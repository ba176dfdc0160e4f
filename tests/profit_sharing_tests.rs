mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::signed;
use serde_json::json;
use sha1::{Digest, Sha1};
use tower::ServiceExt;
use wechat_pay_gateway::application::Dispatcher;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_create_sharing_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/profitsharing/orders"))
        .and(body_partial_json(json!({
            "appid": common::APPID,
            "transaction_id": "4208450740201411110007820472",
            "out_order_no": "P20150806125346",
            "receivers": [{
                "type": "MERCHANT_ID",
                "account": "86693852",
                "amount": 888,
                "description": "分给商户A"
            }],
            "unfreeze_unsplit": true
        })))
        .respond_with(signed(
            200,
            r#"{"transaction_id":"4208450740201411110007820472","out_order_no":"P20150806125346","order_id":"3008450740201411110007820472","state":"PROCESSING"}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let app = common::app(&server.uri(), Dispatcher::new()).await;
    let response = app
        .oneshot(post_json(
            "/api/profit-sharing/orders",
            json!({
                "transaction_id": "4208450740201411110007820472",
                "out_order_no": "P20150806125346",
                "receivers": [{
                    "type": "MERCHANT_ID",
                    "account": "86693852",
                    "amount": "8.88",
                    "description": "分给商户A"
                }]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["state"], "PROCESSING");
    assert_eq!(body["order_id"], "3008450740201411110007820472");
}

#[tokio::test]
async fn test_query_return_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/profitsharing/return-orders/R20190516001"))
        .and(query_param("out_order_no", "P20150806125346"))
        .respond_with(signed(
            200,
            r#"{"out_return_no":"R20190516001","return_mchid":"86693852","amount":10,"result":"SUCCESS"}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let app = common::app(&server.uri(), Dispatcher::new()).await;
    let response = app
        .oneshot(get(
            "/api/profit-sharing/return-orders/R20190516001?out_order_no=P20150806125346",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::body_json(response).await["result"], "SUCCESS");
}

#[tokio::test]
async fn test_custom_relation_required_before_upstream_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let app = common::app(&server.uri(), Dispatcher::new()).await;
    let response = app
        .oneshot(post_json(
            "/api/profit-sharing/receivers",
            json!({
                "type": "PERSONAL_OPENID",
                "account": "oUpF8uMuAJO_M2pxb1Q9zNjWeS6o",
                "relation_type": "CUSTOM"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(common::body_json(response).await["error"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_add_receiver() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/profitsharing/receivers/add"))
        .and(body_partial_json(json!({
            "appid": common::APPID,
            "type": "PERSONAL_OPENID",
            "account": "oUpF8uMuAJO_M2pxb1Q9zNjWeS6o",
            "relation_type": "STAFF"
        })))
        .respond_with(signed(
            200,
            r#"{"type":"PERSONAL_OPENID","account":"oUpF8uMuAJO_M2pxb1Q9zNjWeS6o","relation_type":"STAFF"}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let app = common::app(&server.uri(), Dispatcher::new()).await;
    let response = app
        .oneshot(post_json(
            "/api/profit-sharing/receivers",
            json!({
                "type": "PERSONAL_OPENID",
                "account": "oUpF8uMuAJO_M2pxb1Q9zNjWeS6o",
                "relation_type": "STAFF"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::body_json(response).await["relation_type"], "STAFF");
}

/// 申请账单并指向 mock 服务上的账单文件
async fn mount_bill(server: &MockServer, content: &str, hash_value: &str) {
    let bill = json!({
        "download_url": format!("{}/v3/billdownload/file?token=6XIv5TUPto7pByrTQKhd6kwvyKLG2uY2wMMR8cNXqaA", server.uri()),
        "hash_type": "SHA1",
        "hash_value": hash_value
    });
    Mock::given(method("GET"))
        .and(path("/v3/profitsharing/bills"))
        .and(query_param("bill_date", "2024-01-31"))
        .respond_with(signed(200, &bill.to_string()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/billdownload/file"))
        .and(query_param("token", "6XIv5TUPto7pByrTQKhd6kwvyKLG2uY2wMMR8cNXqaA"))
        .respond_with(ResponseTemplate::new(200).set_body_string(content.to_string()))
        .mount(server)
        .await;
}

async fn apply_and_download(app: axum::Router) -> axum::response::Response {
    let response = app
        .clone()
        .oneshot(get("/api/profit-sharing/bills?bill_date=2024-01-31"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bill = common::body_json(response).await;
    assert_eq!(bill["hash_type"], "SHA1");

    app.oneshot(post_json("/api/profit-sharing/bills/download", bill))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_bill_download_checks_hash() {
    let content = "分账时间,分账单号,接收方\n`2024-01-31 10:00:00,`3008450740201411110007820472,`86693852\n";
    let hash = format!("{:x}", Sha1::digest(content.as_bytes()));

    let server = MockServer::start().await;
    mount_bill(&server, content, &hash).await;

    let app = common::app(&server.uri(), Dispatcher::new()).await;
    let response = apply_and_download(app).await;

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), content.as_bytes());
}

#[tokio::test]
async fn test_bill_download_rejects_hash_mismatch() {
    let server = MockServer::start().await;
    mount_bill(&server, "tampered", "0000000000000000000000000000000000000000").await;

    let app = common::app(&server.uri(), Dispatcher::new()).await;
    let response = apply_and_download(app).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        common::body_json(response).await["message"],
        "WeChat Pay error: BILL_HASH_MISMATCH-Bill file hash mismatch"
    );
}
