use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::handlers::common::success_response;
use crate::{
    auth::AuthenticatedUser,
    errors::ServiceError,
    services::commerce::{AddToCartInput, CartSummary},
    AppState,
};

/// Creates the router for the authenticated buyer's cart
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/", delete(clear_cart))
        .route("/items", post(add_to_cart))
        .route("/items/:product_id", put(update_cart_item))
        .route("/items/:product_id", delete(remove_cart_item))
}

/// Get the buyer's cart with totals
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "Current cart", body = CartSummary),
        (status = 401, description = "Missing or invalid token", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, ServiceError> {
    let summary = state.services.cart.summary(user.user_id).await?;
    Ok(success_response(summary))
}

/// Add a product to the cart
#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    request_body = AddItemRequest,
    responses(
        (status = 200, description = "Updated cart", body = CartSummary),
        (status = 400, description = "Invalid quantity or unavailable product", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let summary = state
        .services
        .cart
        .add_item(
            user.user_id,
            AddToCartInput {
                product_id: payload.product_id,
                quantity: payload.quantity,
            },
        )
        .await?;

    Ok(success_response(summary))
}

/// Set the quantity of a cart line
#[utoipa::path(
    put,
    path = "/api/v1/cart/items/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product in the cart")),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "Updated cart", body = CartSummary),
        (status = 404, description = "Product is not in the cart", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let summary = state
        .services
        .cart
        .update_quantity(user.user_id, product_id, payload.quantity)
        .await?;

    Ok(success_response(summary))
}

/// Remove a product from the cart
#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product in the cart")),
    responses(
        (status = 200, description = "Updated cart", body = CartSummary),
        (status = 404, description = "Product is not in the cart", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let summary = state
        .services
        .cart
        .remove_item(user.user_id, product_id)
        .await?;

    Ok(success_response(summary))
}

/// Remove every line from the cart
#[utoipa::path(
    delete,
    path = "/api/v1/cart",
    responses((status = 200, description = "Cart cleared", body = ClearCartResponse)),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, ServiceError> {
    let removed = state.services.cart.clear(user.user_id).await?;
    Ok(success_response(ClearCartResponse {
        message: "Cart cleared successfully".to_string(),
        removed,
    }))
}

// Request DTOs

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateQuantityRequest {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClearCartResponse {
    pub message: String,
    pub removed: u64,
}
