use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use storefront_api::errors::ServiceError;
use storefront_api::services::paystack::{PaymentGateway, PaystackClient};

const SECRET: &str = "sk_test_wiremock";

#[tokio::test]
async fn initialize_sends_the_minor_unit_amount_exactly_once() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/transaction/initialize"))
        .and(header("authorization", format!("Bearer {}", SECRET).as_str()))
        // 150 naira goes over the wire as 15000 kobo.
        .and(body_partial_json(json!({
            "email": "buyer@example.com",
            "amount": 15000,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "message": "Authorization URL created",
            "data": {
                "authorization_url": "https://checkout.paystack.com/abc123",
                "access_code": "abc123",
                "reference": "ref_abc123",
            },
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = PaystackClient::new(server.uri(), SECRET.to_string());
    let initialized = client
        .initialize_transaction("buyer@example.com", dec!(150), Some("https://shop.example.com/cb"))
        .await
        .expect("initialize succeeds");

    assert_eq!(
        initialized.authorization_url,
        "https://checkout.paystack.com/abc123"
    );
    assert_eq!(initialized.reference, "ref_abc123");
}

#[tokio::test]
async fn verify_queries_the_reference_path() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/transaction/verify/ref_abc123"))
        .and(header("authorization", format!("Bearer {}", SECRET).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "message": "Verification successful",
            "data": {
                "reference": "ref_abc123",
                "status": "success",
                "amount": 15000,
            },
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = PaystackClient::new(server.uri(), SECRET.to_string());
    let verified = client
        .verify_transaction("ref_abc123")
        .await
        .expect("verify succeeds");

    assert!(verified.is_successful());
    assert_eq!(verified.amount, 15000);
}

#[tokio::test]
async fn refund_posts_the_reference_and_minor_unit_amount() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/refund"))
        .and(body_partial_json(json!({
            "transaction": "ref_abc123",
            "amount": 9999,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "message": "Refund has been queued for processing",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = PaystackClient::new(server.uri(), SECRET.to_string());
    client
        .refund_transaction("ref_abc123", dec!(99.99))
        .await
        .expect("refund succeeds");
}

#[tokio::test]
async fn declined_envelope_surfaces_the_gateway_message() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/transaction/verify/ref_declined"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "status": false,
            "message": "Transaction reference not found",
        })))
        .mount(&server)
        .await;

    let client = PaystackClient::new(server.uri(), SECRET.to_string());
    let err = client
        .verify_transaction("ref_declined")
        .await
        .expect_err("declined envelope is an error");

    match err {
        ServiceError::PaymentFailed(message) => {
            assert_eq!(message, "Transaction reference not found");
        }
        other => panic!("expected PaymentFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_gateway_is_an_external_service_error() {
    // Nothing listens on this port.
    let client = PaystackClient::new("http://127.0.0.1:9".to_string(), SECRET.to_string());

    let err = client
        .verify_transaction("ref_any")
        .await
        .expect_err("transport failure is an error");
    assert!(matches!(err, ServiceError::ExternalServiceError(_)));
}
