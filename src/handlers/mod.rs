use std::sync::Arc;

use crate::auth::AuthService;
use crate::services::accounts::AccountService;
use crate::services::carts::CartService;
use crate::services::catalog::CatalogService;
use crate::services::orders::OrderService;
use crate::services::paystack::PaystackClient;
use crate::services::reviews::ReviewService;

pub mod auth;
pub mod carts;
pub mod common;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod users;

/// Aggregate of the application's services, shared through `AppState`.
#[derive(Clone)]
pub struct AppServices {
    pub auth: Arc<AuthService>,
    pub accounts: Arc<AccountService>,
    pub catalog: Arc<CatalogService>,
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub reviews: Arc<ReviewService>,
    pub paystack: Arc<PaystackClient>,
}
