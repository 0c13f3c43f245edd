use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use tokio::sync::mpsc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use storefront_api::auth::AuthService;
use storefront_api::config::{init_tracing, load_config};
use storefront_api::db::establish_connection_from_app_config;
use storefront_api::events::{process_events, EventSender};
use storefront_api::handlers::AppServices;
use storefront_api::services::accounts::AccountService;
use storefront_api::services::carts::CartService;
use storefront_api::services::catalog::CatalogService;
use storefront_api::services::orders::OrderService;
use storefront_api::services::payments::PaymentService;
use storefront_api::services::paystack::{PaymentGateway, PaystackClient};
use storefront_api::services::reviews::ReviewService;
use storefront_api::{app_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    init_tracing(config.log_level(), config.log_json);

    info!(
        environment = %config.environment,
        "Starting storefront-api v{}",
        env!("CARGO_PKG_VERSION")
    );

    let db = Arc::new(establish_connection_from_app_config(&config).await?);

    let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
    let event_sender = EventSender::new(event_tx);
    tokio::spawn(process_events(event_rx));

    let shared_events = Arc::new(event_sender.clone());
    let auth = Arc::new(AuthService::new(
        config.jwt_secret.clone(),
        config.jwt_expiration,
    ));
    let paystack = Arc::new(PaystackClient::new(
        config.paystack_base_url.clone(),
        config.paystack_secret_key.clone(),
    ));
    let gateway: Arc<dyn PaymentGateway> = paystack.clone();

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
            gateway,
            PaymentService::new(),
            shared_events.clone(),
            config.payment_callback_url.clone(),
        )),
        reviews: Arc::new(ReviewService::new(db.clone(), shared_events)),
        paystack,
    };

    let state = AppState {
        db,
        config: config.clone(),
        event_sender,
        services,
    };

    let cors = build_cors_layer(&state);
    let app = app_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

/// Builds the CORS layer from configuration. Explicit origins win; a
/// permissive layer is only used in development or with the explicit opt-in.
fn build_cors_layer(state: &AppState) -> CorsLayer {
    let config = &state.config;

    if let Some(raw) = config.cors_allowed_origins.as_deref() {
        let origins: Vec<HeaderValue> = raw
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        if !origins.is_empty() {
            return CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
        }
    }

    if config.should_allow_permissive_cors() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    // Config validation requires origins outside development, so this only
    // triggers when every configured origin failed to parse.
    error!("No usable CORS origins configured; defaulting to a restrictive layer");
    CorsLayer::new()
}

/// Waits for either ctrl-c or SIGTERM so in-flight requests can drain.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install ctrl-c handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
