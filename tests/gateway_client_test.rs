use ayurvedic_store::config::GatewayConfig;
use ayurvedic_store::payments::{GatewayClient, PaymentError};
use httpmock::prelude::*;
use secrecy::SecretString;
use serde_json::json;

fn client(server: &MockServer) -> GatewayClient {
    GatewayClient::new(&GatewayConfig {
        base_url: server.base_url(),
        key_id: "rzp_test_key".to_string(),
        key_secret: SecretString::from("key-secret".to_string()),
        webhook_secret: SecretString::from("whsec".to_string()),
    })
}

#[tokio::test]
async fn test_create_order() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/orders")
                .header_exists("authorization")
                .json_body_partial(r#"{"amount": 41000, "currency": "INR", "receipt": "rcpt_1"}"#);
            then.status(200).json_body(json!({
                "id": "order_Q1",
                "entity": "order",
                "amount": 41000,
                "currency": "INR",
                "receipt": "rcpt_1",
                "status": "created"
            }));
        })
        .await;

    let order = client(&server).create_order(41000, "INR", "rcpt_1", &json!({"items": 2})).await.unwrap();

    mock.assert_async().await;
    assert_eq!(order.id, "order_Q1");
    assert_eq!(order.amount, 41000);
    assert_eq!(order.status, "created");
}

#[tokio::test]
async fn test_create_order_below_minimum_never_calls_gateway() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/orders");
            then.status(200);
        })
        .await;

    let err = client(&server).create_order(50, "INR", "rcpt_2", &json!({})).await.unwrap_err();

    assert!(matches!(err, PaymentError::InvalidAmount(_)));
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_gateway_error_envelope() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/orders");
            then.status(400).json_body(json!({
                "error": {"code": "BAD_REQUEST_ERROR", "description": "Authentication failed"}
            }));
        })
        .await;

    let err = client(&server).create_order(41000, "INR", "rcpt_3", &json!({})).await.unwrap_err();

    match err {
        PaymentError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Authentication failed");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_order() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/orders/order_Q1");
            then.status(200).json_body(json!({
                "id": "order_Q1",
                "amount": 54900,
                "currency": "INR",
                "status": "attempted"
            }));
        })
        .await;

    let order = client(&server).fetch_order("order_Q1").await.unwrap();

    mock.assert_async().await;
    assert_eq!(order.amount, 54900);
    assert_eq!(order.receipt, None);
}

#[tokio::test]
async fn test_fetch_unknown_order() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/orders/order_missing");
            then.status(404).body("not found");
        })
        .await;

    let err = client(&server).fetch_order("order_missing").await.unwrap_err();

    assert!(matches!(err, PaymentError::Api { status: 404, .. }));
}
