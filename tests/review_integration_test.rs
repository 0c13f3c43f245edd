mod common;

use axum::http::{Method, StatusCode};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

use common::{read_json, TestApp};

#[tokio::test]
async fn a_user_reviews_a_product_once() {
    let app = TestApp::new().await;
    let (_, token) = app.register_and_login_user("ada").await;
    let category_id = app.seed_category("Books").await;
    let product_id = app.seed_product(category_id, dec!(25.00)).await;
    let review_uri = format!("/api/v1/products/{}/reviews", product_id);

    let response = app
        .request(
            Method::POST,
            &review_uri,
            Some(json!({"rating": 5, "review_text": "Excellent"})),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["rating"], 5);

    // Second review for the same product by the same user is rejected.
    let response = app
        .request(
            Method::POST,
            &review_uri,
            Some(json!({"rating": 1, "review_text": "Changed my mind"})),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("already reviewed"));

    // A different user can still review the product.
    let (_, other) = app.register_and_login_user("bob").await;
    let response = app
        .request(
            Method::POST,
            &review_uri,
            Some(json!({"rating": 3})),
            Some(&other),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn reviews_are_publicly_listed_per_product() {
    let app = TestApp::new().await;
    let (_, token) = app.register_and_login_user("ada").await;
    let category_id = app.seed_category("Books").await;
    let product_id = app.seed_product(category_id, dec!(25.00)).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/products/{}/reviews", product_id),
            Some(json!({"rating": 4, "review_text": "Solid"})),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/products/{}/reviews", product_id),
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let reviews = body.as_array().unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0]["rating"], 4);
}

#[tokio::test]
async fn reviewing_an_unknown_product_is_not_found() {
    let app = TestApp::new().await;
    let (_, token) = app.register_and_login_user("ada").await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/products/{}/reviews", Uuid::new_v4()),
            Some(json!({"rating": 5})),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/products/{}/reviews", Uuid::new_v4()),
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rating_outside_one_to_five_is_rejected() {
    let app = TestApp::new().await;
    let (_, token) = app.register_and_login_user("ada").await;
    let category_id = app.seed_category("Books").await;
    let product_id = app.seed_product(category_id, dec!(25.00)).await;

    for rating in [0, 6] {
        let response = app
            .request(
                Method::POST,
                &format!("/api/v1/products/{}/reviews", product_id),
                Some(json!({"rating": rating})),
                Some(&token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn only_the_author_or_an_admin_deletes_a_review() {
    let app = TestApp::new().await;
    let (_, author) = app.register_and_login_user("ada").await;
    let (_, other) = app.register_and_login_user("bob").await;
    let (_, admin) = app.register_and_login_admin("grace").await;
    let category_id = app.seed_category("Books").await;
    let product_id = app.seed_product(category_id, dec!(25.00)).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/products/{}/reviews", product_id),
            Some(json!({"rating": 2, "review_text": "Meh"})),
            Some(&author),
        )
        .await;
    let review = read_json(response).await;
    let review_id = review["id"].as_str().unwrap().to_string();
    let delete_uri = format!("/api/v1/reviews/{}", review_id);

    let response = app
        .request(Method::DELETE, &delete_uri, None, Some(&other))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request(Method::DELETE, &delete_uri, None, Some(&author))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Deleting again is a 404, and admins may delete other users' reviews.
    let response = app
        .request(Method::DELETE, &delete_uri, None, Some(&admin))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/products/{}/reviews", product_id),
            Some(json!({"rating": 4})),
            Some(&other),
        )
        .await;
    let review = read_json(response).await;
    let review_id = review["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/reviews/{}", review_id),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
