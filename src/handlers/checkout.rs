use axum::{
    extract::{Json, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::post,
    Extension, Router,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::handlers::common::{created_response, request_origin, success_response};
use crate::{
    auth::AuthenticatedUser,
    entities::order,
    errors::ServiceError,
    services::{
        commerce::{CheckoutOutcome, CheckoutRequest},
        payments::PaymentAuthorization,
    },
    AppState,
};

pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/", post(submit_checkout))
}

/// Orders written by a cash-on-delivery checkout
#[derive(Debug, Serialize, ToSchema)]
pub struct PlacedOrdersResponse {
    pub message: String,
    pub order_ids: Vec<Uuid>,
    pub orders: Vec<order::Model>,
}

/// Submit the cart for checkout.
///
/// Cash on delivery writes the orders immediately (201). Gateway payments
/// return the hosted payment page to redirect the buyer to (200).
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Cash on delivery orders placed", body = PlacedOrdersResponse),
        (status = 200, description = "Gateway transaction opened", body = PaymentAuthorization),
        (status = 400, description = "Invalid form or empty cart", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway rejected the transaction", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn submit_checkout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Response, ServiceError> {
    let origin = request_origin(&headers, &state.config);

    let outcome = state
        .services
        .checkout
        .submit(user.user_id, payload, origin.as_deref())
        .await?;

    Ok(match outcome {
        CheckoutOutcome::OrdersPlaced(orders) => created_response(PlacedOrdersResponse {
            message: "Order placed successfully".to_string(),
            order_ids: orders.iter().map(|o| o.id).collect(),
            orders,
        }),
        CheckoutOutcome::PaymentRedirect(authorization) => success_response(authorization),
    }
    .into_response())
}
