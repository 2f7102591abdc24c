use axum::{routing::get, Json, Router};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Marketplace API",
        version = "0.1.0",
        description = r#"
# Marketplace checkout and payments API

Cart, checkout, order history and the online payment flow of a local-commerce
marketplace.

## Authentication

Buyer endpoints require a bearer token whose subject is the buyer's id:

```
Authorization: Bearer <your-jwt-token>
```

Payment verification, the gateway callback and the gateway webhook are not
authenticated; everything they do is derived from gateway-confirmed data.

## Money

Amounts are integers in the currency's smallest unit (kobo for NGN).

## Error Handling

REST endpoints share one error body:

```json
{
  "error": "Bad Request",
  "message": "Validation error: Cart is empty",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

The payment functions keep their own contract: `{error, details?}` on
initiation failures and HTTP 200 with a `status` field for every
verification outcome.
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Cart", description = "Buyer cart endpoints"),
        (name = "Checkout", description = "Checkout submission"),
        (name = "Orders", description = "Buyer order history"),
        (name = "Payments", description = "Payment initiation, verification, callback and webhook"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Cart
        crate::handlers::cart::get_cart,
        crate::handlers::cart::add_to_cart,
        crate::handlers::cart::update_cart_item,
        crate::handlers::cart::remove_cart_item,
        crate::handlers::cart::clear_cart,

        // Checkout
        crate::handlers::checkout::submit_checkout,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,

        // Payments
        crate::handlers::payment_functions::process_payment,
        crate::handlers::payment_functions::verify_payment,
        crate::handlers::payment_callback::payment_callback,
        crate::handlers::payment_webhooks::paystack_webhook,
    ),
    components(
        schemas(
            crate::ResponseMeta,

            // Cart and checkout
            crate::services::commerce::CartSummary,
            crate::services::commerce::CartLineView,
            crate::services::commerce::CheckoutForm,
            crate::services::commerce::CheckoutRequest,
            crate::handlers::cart::AddItemRequest,
            crate::handlers::cart::UpdateQuantityRequest,
            crate::handlers::cart::ClearCartResponse,
            crate::handlers::checkout::PlacedOrdersResponse,

            // Orders
            crate::entities::order::Model,
            crate::entities::order_item::Model,
            crate::entities::order::PaymentMethod,
            crate::entities::order::PaymentStatus,
            crate::entities::order::OrderStatus,
            crate::handlers::orders::OrderDetail,

            // Payments
            crate::services::payments::InitiatePaymentRequest,
            crate::services::payments::PaymentAuthorization,
            crate::services::payments::PendingOrderPayload,
            crate::services::payments::types::VendorOrderDraft,
            crate::services::payments::types::OrderLineDraft,
            crate::services::payments::VerifyPaymentRequest,
            crate::services::payments::VerificationOutcome,
            crate::services::payments::CallbackView,
            crate::services::payments::CallbackStatus,
            crate::handlers::payment_functions::FunctionError,
            crate::handlers::payment_functions::VerificationFailure,

            // Error types
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

/// Serves the generated document as JSON
pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        OPENAPI_JSON_PATH,
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}
