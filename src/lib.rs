use axum::{
    extract::State,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put, MethodRouter},
    Json, Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use utoipa::ToSchema;

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod openapi;
pub mod services;

use crate::auth::{auth_middleware, require_roles, AuthRouterExt, Role};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Common response wrapper for status endpoints
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
        }
    }
}

/// Builds the full application router.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .merge(openapi::swagger_ui())
        .nest("/api/v1", api_v1_routes(&state))
        .with_state(state)
}

/// Guards a method router with the auth middleware plus the single
/// parameterized role check. The auth layer is added last so it runs first.
fn guarded(
    mr: MethodRouter<AppState>,
    state: &AppState,
    roles: &[Role],
) -> MethodRouter<AppState> {
    mr.layer(from_fn_with_state(roles.to_vec(), require_roles))
        .layer(from_fn_with_state(state.clone(), auth_middleware))
}

/// API v1 routes.
///
/// Paths that mix public and role-gated methods are declared once, with the
/// guard applied per method; fully gated groups use `with_roles`.
pub fn api_v1_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/auth/register", post(handlers::auth::register_user))
        .route("/auth/login", post(handlers::auth::login_user))
        .route("/auth/admin/register", post(handlers::auth::register_admin))
        .route("/auth/admin/login", post(handlers::auth::login_admin))
        .route(
            "/products",
            get(handlers::products::list_products).merge(guarded(
                post(handlers::products::create_product),
                state,
                &[Role::Admin],
            )),
        )
        .route(
            "/products/:id",
            get(handlers::products::get_product).merge(guarded(
                put(handlers::products::update_product)
                    .delete(handlers::products::delete_product),
                state,
                &[Role::Admin],
            )),
        )
        .route(
            "/products/:id/reviews",
            get(handlers::reviews::list_reviews).merge(guarded(
                post(handlers::reviews::create_review),
                state,
                &[Role::User],
            )),
        )
        .route(
            "/categories",
            get(handlers::products::list_categories).merge(guarded(
                post(handlers::products::create_category),
                state,
                &[Role::Admin],
            )),
        )
        .route(
            "/payments/callback",
            get(handlers::orders::payment_callback),
        )
        .route("/status", get(status_handler))
        .route("/health", get(health_check));

    let user_routes = Router::new()
        .route("/cart", get(handlers::carts::get_cart))
        .route("/cart/add", post(handlers::carts::add_to_cart))
        .route(
            "/cart/items/:product_id",
            delete(handlers::carts::remove_from_cart),
        )
        .route(
            "/orders",
            post(handlers::orders::create_order).get(handlers::orders::list_orders),
        )
        .route("/orders/:id/cancel", post(handlers::orders::cancel_order))
        .route(
            "/users/me",
            get(handlers::users::get_profile).put(handlers::users::update_profile),
        )
        .with_roles(state.clone(), &[Role::User]);

    // Orders are readable by their owner and by admins; review deletion is
    // author-or-admin, enforced in the service.
    let shared_routes = Router::new()
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/reviews/:id", delete(handlers::reviews::delete_review))
        .with_roles(state.clone(), &[Role::User, Role::Admin]);

    let admin_routes = Router::new()
        .route("/orders/:id/ship", post(handlers::orders::ship_order))
        .route("/users", get(handlers::users::list_users))
        .route(
            "/payments/initialize-transaction",
            post(handlers::payments::initialize_transaction),
        )
        .route(
            "/payments/verify/:reference",
            get(handlers::payments::verify_transaction),
        )
        .route(
            "/payments/transactions",
            get(handlers::payments::list_transactions),
        )
        .route(
            "/payments/transactions/:id",
            get(handlers::payments::fetch_transaction),
        )
        .route(
            "/payments/charge-authorization",
            post(handlers::payments::charge_authorization),
        )
        .route(
            "/payments/transaction-timeline/:id_or_reference",
            get(handlers::payments::transaction_timeline),
        )
        .route(
            "/payments/transaction-totals",
            get(handlers::payments::transaction_totals),
        )
        .route(
            "/payments/export-transactions",
            get(handlers::payments::export_transactions),
        )
        .with_roles(state.clone(), &[Role::Admin]);

    public
        .merge(user_routes)
        .merge(shared_routes)
        .merge(admin_routes)
}

async fn root() -> &'static str {
    "Storefront API is running"
}

async fn status_handler() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(json!({
        "service": "storefront-api",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<serde_json::Value>> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    Json(ApiResponse::success(json!({
        "status": db_status,
        "database": db_status,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}
