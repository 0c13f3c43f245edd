use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use storefront_api::auth::AuthService;
use storefront_api::config::AppConfig;
use storefront_api::db::{establish_connection_with_config, DbConfig};
use storefront_api::errors::ServiceError;
use storefront_api::events::{process_events, EventSender};
use storefront_api::handlers::AppServices;
use storefront_api::services::accounts::AccountService;
use storefront_api::services::carts::CartService;
use storefront_api::services::catalog::{CatalogService, CategoryInput, ProductInput};
use storefront_api::services::orders::OrderService;
use storefront_api::services::payments::PaymentService;
use storefront_api::services::paystack::{
    InitializedTransaction, PaymentGateway, PaystackClient, VerifiedTransaction,
};
use storefront_api::services::reviews::ReviewService;
use storefront_api::{app_router, AppState};

const TEST_JWT_SECRET: &str =
    "integration_test_signing_key_that_is_comfortably_longer_than_sixty_four_characters";

/// Scripted in-process gateway. Records every call so tests can assert how
/// often the order workflow reached out, and lets tests pick the verification
/// outcome per reference.
pub struct MockGateway {
    counter: AtomicUsize,
    pub init_calls: Mutex<Vec<(String, Decimal)>>,
    pub refund_calls: Mutex<Vec<(String, Decimal)>>,
    verify_success: AtomicBool,
    fail_refund: AtomicBool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
            init_calls: Mutex::new(Vec::new()),
            refund_calls: Mutex::new(Vec::new()),
            verify_success: AtomicBool::new(true),
            fail_refund: AtomicBool::new(false),
        }
    }

    /// Makes subsequent verifications report the given outcome.
    pub fn set_verify_success(&self, success: bool) {
        self.verify_success.store(success, Ordering::SeqCst);
    }

    #[allow(dead_code)]
    pub fn set_fail_refund(&self, fail: bool) {
        self.fail_refund.store(fail, Ordering::SeqCst);
    }

    pub fn refund_count(&self) -> usize {
        self.refund_calls.lock().unwrap().len()
    }

    pub fn init_count(&self) -> usize {
        self.init_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn initialize_transaction(
        &self,
        email: &str,
        amount: Decimal,
        _callback_url: Option<&str>,
    ) -> Result<InitializedTransaction, ServiceError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        self.init_calls
            .lock()
            .unwrap()
            .push((email.to_string(), amount));

        Ok(InitializedTransaction {
            authorization_url: format!("https://checkout.mock/{}", n),
            access_code: format!("code_{}", n),
            reference: format!("mockref_{}", n),
        })
    }

    async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<VerifiedTransaction, ServiceError> {
        let status = if self.verify_success.load(Ordering::SeqCst) {
            "success"
        } else {
            "failed"
        };

        Ok(VerifiedTransaction {
            reference: reference.to_string(),
            status: status.to_string(),
            amount: 0,
        })
    }

    async fn refund_transaction(
        &self,
        reference: &str,
        amount: Decimal,
    ) -> Result<(), ServiceError> {
        if self.fail_refund.load(Ordering::SeqCst) {
            return Err(ServiceError::ExternalServiceError(
                "Refund rejected".to_string(),
            ));
        }
        self.refund_calls
            .lock()
            .unwrap()
            .push((reference.to_string(), amount));
        Ok(())
    }
}

/// Harness backed by an in-memory SQLite database and a scripted gateway.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<MockGateway>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        // A single pooled connection keeps every query on the same in-memory
        // database.
        let db_config = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = establish_connection_with_config(&db_config)
            .await
            .expect("failed to open in-memory test database");

        for sql in SCHEMA {
            pool.execute(Statement::from_string(
                DatabaseBackend::Sqlite,
                sql.to_string(),
            ))
            .await
            .expect("failed to create test schema");
        }

        let db = Arc::new(pool);
        let config = test_config();

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(process_events(event_rx));
        let shared_events = Arc::new(event_sender.clone());

        let auth = Arc::new(AuthService::new(
            config.jwt_secret.clone(),
            config.jwt_expiration,
        ));
        let gateway = Arc::new(MockGateway::new());

        let services = AppServices {
            auth: auth.clone(),
            accounts: Arc::new(AccountService::new(
                db.clone(),
                auth.clone(),
                shared_events.clone(),
            )),
            catalog: Arc::new(CatalogService::new(db.clone(), shared_events.clone())),
            carts: Arc::new(CartService::new(db.clone(), shared_events.clone())),
            orders: Arc::new(OrderService::new(
                db.clone(),
                gateway.clone(),
                PaymentService::new(),
                shared_events.clone(),
                None,
            )),
            reviews: Arc::new(ReviewService::new(db.clone(), shared_events)),
            // Points nowhere; the raw gateway surface is covered by the
            // wiremock suite instead.
            paystack: Arc::new(PaystackClient::new(
                "http://127.0.0.1:9".to_string(),
                "sk_test_unused".to_string(),
            )),
        };

        let state = AppState {
            db,
            config,
            event_sender,
            services,
        };
        let router = app_router(state.clone());

        Self {
            router,
            state,
            gateway,
            _event_task: event_task,
        }
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Registers a customer through the API and returns (user id, token).
    pub async fn register_and_login_user(&self, username: &str) -> (Uuid, String) {
        let response = self
            .request(
                Method::POST,
                "/api/v1/auth/register",
                Some(json!({
                    "full_name": "Test Customer",
                    "username": username,
                    "password": "a-sufficiently-long-password",
                })),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = self
            .request(
                Method::POST,
                "/api/v1/auth/login",
                Some(json!({
                    "username": username,
                    "password": "a-sufficiently-long-password",
                })),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = read_json(response).await;
        let id = Uuid::parse_str(body["id"].as_str().expect("login response id"))
            .expect("login response id is a uuid");
        let token = body["token"].as_str().expect("login token").to_string();
        (id, token)
    }

    /// Registers an administrator through the API and returns (admin id, token).
    pub async fn register_and_login_admin(&self, username: &str) -> (Uuid, String) {
        let response = self
            .request(
                Method::POST,
                "/api/v1/auth/admin/register",
                Some(json!({
                    "full_name": "Test Admin",
                    "username": username,
                    "password": "a-sufficiently-long-password",
                })),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = self
            .request(
                Method::POST,
                "/api/v1/auth/admin/login",
                Some(json!({
                    "username": username,
                    "password": "a-sufficiently-long-password",
                })),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = read_json(response).await;
        let id = Uuid::parse_str(body["id"].as_str().expect("login response id"))
            .expect("login response id is a uuid");
        let token = body["token"].as_str().expect("login token").to_string();
        (id, token)
    }

    /// Seeds a category directly through the service layer.
    pub async fn seed_category(&self, name: &str) -> Uuid {
        let category = self
            .state
            .services
            .catalog
            .create_category(CategoryInput {
                name: name.to_string(),
                description: None,
            })
            .await
            .expect("seed category");
        category.id
    }

    /// Seeds a product directly through the service layer.
    pub async fn seed_product(&self, category_id: Uuid, price: Decimal) -> Uuid {
        let product = self
            .state
            .services
            .catalog
            .create_product(
                ProductInput {
                    description: "Seeded test product".to_string(),
                    price,
                    is_in_stock: true,
                    image_url: None,
                    category_id,
                },
                Uuid::new_v4(),
            )
            .await
            .expect("seed product");
        product.id
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Reads a response body as JSON.
pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body is not valid json")
}

/// Reads a decimal field regardless of whether it arrived as a string or a
/// number.
#[allow(dead_code)]
pub fn decimal_field(value: &Value) -> Decimal {
    use std::str::FromStr;

    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => {
            Decimal::from_str(&n.to_string()).expect("decimal number")
        }
        other => panic!("expected a decimal value, got {:?}", other),
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: TEST_JWT_SECRET.to_string(),
        jwt_expiration: 3600,
        host: "127.0.0.1".to_string(),
        port: 18080,
        environment: "development".to_string(),
        log_level: "info".to_string(),
        log_json: false,
        cors_allowed_origins: None,
        cors_allow_any_origin: false,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 30,
        db_idle_timeout_secs: 600,
        db_acquire_timeout_secs: 8,
        paystack_secret_key: "sk_test_unused".to_string(),
        paystack_base_url: "http://127.0.0.1:9".to_string(),
        payment_callback_url: None,
        event_channel_capacity: 64,
    }
}

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY NOT NULL,
        full_name TEXT NOT NULL,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS admins (
        id TEXT PRIMARY KEY NOT NULL,
        full_name TEXT NOT NULL,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS categories (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        created_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS products (
        id TEXT PRIMARY KEY NOT NULL,
        description TEXT NOT NULL,
        price REAL NOT NULL,
        is_in_stock INTEGER NOT NULL,
        image_url TEXT,
        category_id TEXT NOT NULL,
        created_by TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS carts (
        id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL UNIQUE,
        total REAL NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS cart_items (
        id TEXT PRIMARY KEY NOT NULL,
        cart_id TEXT NOT NULL,
        product_id TEXT NOT NULL,
        quantity INTEGER NOT NULL,
        unit_price REAL NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS orders (
        id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL,
        total_amount REAL NOT NULL,
        status TEXT NOT NULL,
        payment_reference TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS order_items (
        id TEXT PRIMARY KEY NOT NULL,
        order_id TEXT NOT NULL,
        product_id TEXT NOT NULL,
        quantity INTEGER NOT NULL,
        price REAL NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS payments (
        id TEXT PRIMARY KEY NOT NULL,
        order_id TEXT NOT NULL,
        method TEXT NOT NULL,
        transaction_id TEXT,
        gateway_reference TEXT NOT NULL,
        gateway_status TEXT,
        status TEXT NOT NULL,
        amount REAL NOT NULL,
        currency TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS reviews (
        id TEXT PRIMARY KEY NOT NULL,
        product_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        rating INTEGER NOT NULL,
        review_text TEXT,
        created_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS shipping_info (
        id TEXT PRIMARY KEY NOT NULL,
        order_id TEXT NOT NULL UNIQUE,
        address TEXT NOT NULL,
        city TEXT NOT NULL,
        state TEXT NOT NULL,
        zip_code TEXT NOT NULL,
        country TEXT NOT NULL
    );"#,
];
