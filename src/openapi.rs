use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = r#"
E-commerce backend: authentication, product catalog, shopping cart, orders,
reviews, and Paystack payment processing.

## Authentication

Authenticated endpoints expect a JWT in the Authorization header:

```
Authorization: Bearer <your-jwt-token>
```

Tokens are issued by the login endpoints and expire after one hour.
"#
    ),
    paths(
        // Auth
        crate::handlers::auth::register_user,
        crate::handlers::auth::login_user,
        crate::handlers::auth::register_admin,
        crate::handlers::auth::login_admin,

        // Catalog
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,

        // Reviews
        crate::handlers::reviews::list_reviews,
        crate::handlers::reviews::create_review,
        crate::handlers::reviews::delete_review,

        // Cart
        crate::handlers::carts::get_cart,
        crate::handlers::carts::add_to_cart,
        crate::handlers::carts::remove_from_cart,

        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::ship_order,
        crate::handlers::orders::payment_callback,

        // Users
        crate::handlers::users::get_profile,
        crate::handlers::users::update_profile,
        crate::handlers::users::list_users,

        // Gateway pass-throughs
        crate::handlers::payments::initialize_transaction,
    ),
    components(
        schemas(
            crate::services::accounts::RegisterInput,
            crate::services::accounts::LoginInput,
            crate::services::accounts::LoginResponse,
            crate::services::accounts::AccountSummary,
            crate::services::accounts::UpdateProfileInput,
            crate::services::catalog::ProductInput,
            crate::services::catalog::CategoryInput,
            crate::services::carts::AddToCartInput,
            crate::services::carts::CartWithItems,
            crate::services::orders::CreateOrderInput,
            crate::services::orders::OrderLineInput,
            crate::services::orders::ShippingInput,
            crate::services::orders::CreatedOrder,
            crate::services::orders::OrderWithItems,
            crate::services::orders::CallbackOutcome,
            crate::services::reviews::CreateReviewInput,
            crate::handlers::payments::InitializeTransactionInput,
            crate::handlers::payments::ChargeAuthorizationInput,
            crate::auth::CurrentUser,
            crate::auth::Role,
            crate::entities::product::Model,
            crate::entities::category::Model,
            crate::entities::cart::Model,
            crate::entities::cart_item::Model,
            crate::entities::order::Model,
            crate::entities::order_item::Model,
            crate::entities::review::Model,
            crate::entities::shipping_info::Model,
            crate::entities::order::OrderStatus,
            crate::entities::payment::PaymentStatus,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration and login"),
        (name = "Catalog", description = "Products and categories"),
        (name = "Cart", description = "Per-user shopping cart"),
        (name = "Orders", description = "Order and payment workflow"),
        (name = "Reviews", description = "Product reviews"),
        (name = "Users", description = "Account profiles"),
        (name = "Payments", description = "Payment gateway surface")
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
