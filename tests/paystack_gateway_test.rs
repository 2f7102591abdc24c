use std::time::Duration;

use assert_matches::assert_matches;
use marketplace_api::{
    errors::ServiceError,
    services::payments::{
        gateway::{GatewayInitRequest, GatewayMetadata},
        PaymentGateway, PaystackGateway,
    },
};
use serde_json::json;
use wiremock::{
    matchers::{bearer_token, body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

const SECRET: &str = "sk_test_gateway";

fn gateway(server: &MockServer) -> PaystackGateway {
    PaystackGateway::new(&server.uri(), SECRET, Some(Duration::from_secs(5)))
        .expect("gateway client")
}

fn init_request() -> GatewayInitRequest {
    GatewayInitRequest {
        amount: 500_000,
        email: "buyer@example.com".to_string(),
        reference: "order_1700000000000".to_string(),
        callback_url: "https://shop.example.com/payment/callback".to_string(),
        metadata: GatewayMetadata {
            order_data: r#"{"customer_id":"x"}"#.to_string(),
        },
    }
}

#[tokio::test]
async fn initialize_posts_transaction_and_returns_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transaction/initialize"))
        .and(bearer_token(SECRET))
        .and(body_partial_json(json!({
            "amount": 500000,
            "email": "buyer@example.com",
            "reference": "order_1700000000000",
            "callback_url": "https://shop.example.com/payment/callback",
            "metadata": { "order_data": r#"{"customer_id":"x"}"# },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "message": "Authorization URL created",
            "data": {
                "authorization_url": "https://checkout.paystack.com/0peioxfhpn",
                "access_code": "0peioxfhpn",
                "reference": "order_1700000000000",
            },
        })))
        .expect(1)
        .mount(&server)
        .await;

    let authorization = gateway(&server)
        .initialize(&init_request())
        .await
        .expect("authorization");

    assert_eq!(
        authorization.authorization_url,
        "https://checkout.paystack.com/0peioxfhpn"
    );
    assert_eq!(authorization.access_code, "0peioxfhpn");
    assert_eq!(authorization.reference, "order_1700000000000");
}

#[tokio::test]
async fn initialize_rejection_carries_gateway_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transaction/initialize"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "status": false,
            "message": "Invalid key",
        })))
        .mount(&server)
        .await;

    let result = gateway(&server).initialize(&init_request()).await;
    assert_matches!(result, Err(ServiceError::GatewayError(message)) if message == "Invalid key");
}

#[tokio::test]
async fn initialize_with_unreadable_body_uses_fallback_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transaction/initialize"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let result = gateway(&server).initialize(&init_request()).await;
    assert_matches!(
        result,
        Err(ServiceError::GatewayError(message)) if message == "Payment initialization failed"
    );
}

#[tokio::test]
async fn verify_returns_transaction_with_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transaction/verify/order_1700000000000"))
        .and(bearer_token(SECRET))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "message": "Verification successful",
            "data": {
                "status": "success",
                "reference": "order_1700000000000",
                "amount": 500000,
                "gateway_response": "Approved",
                "currency": "NGN",
                "metadata": { "order_data": r#"{"customer_id":"x"}"# },
            },
        })))
        .expect(1)
        .mount(&server)
        .await;

    let transaction = gateway(&server)
        .verify("order_1700000000000")
        .await
        .expect("transaction");

    assert!(transaction.is_success());
    assert_eq!(transaction.amount, 500_000);
    assert_eq!(transaction.gateway_response.as_deref(), Some("Approved"));
    assert_eq!(
        transaction.order_data().as_deref(),
        Some(r#"{"customer_id":"x"}"#)
    );
}

#[tokio::test]
async fn verify_reports_non_success_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transaction/verify/order_abandoned"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "message": "Verification successful",
            "data": { "status": "abandoned", "reference": "order_abandoned", "amount": 500000 },
        })))
        .mount(&server)
        .await;

    let transaction = gateway(&server)
        .verify("order_abandoned")
        .await
        .expect("transaction");
    assert!(!transaction.is_success());
    assert_eq!(transaction.status, "abandoned");
}

#[tokio::test]
async fn verify_unknown_reference_is_a_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transaction/verify/order_missing"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "status": false,
            "message": "Transaction reference not found",
        })))
        .mount(&server)
        .await;

    let result = gateway(&server).verify("order_missing").await;
    assert_matches!(
        result,
        Err(ServiceError::GatewayError(message)) if message == "Transaction reference not found"
    );
}

#[tokio::test]
async fn unreachable_gateway_is_reported() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let gateway = PaystackGateway::new(&uri, SECRET, Some(Duration::from_secs(2))).unwrap();
    let result = gateway.verify("order_1").await;
    assert_matches!(
        result,
        Err(ServiceError::GatewayError(message)) if message == "Payment verification failed"
    );
}
