use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use gestularia_core::pricing::CheckoutInput;
use gestularia_core::types::OrderStatus;

use crate::auth::Merchant;
use crate::problem::ApiError;
use crate::router::AppState;
use crate::stores::require_store;

/// Storefront checkout payload. Price related fields sent by the client are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    store_id: Option<String>,
    customer_name: Option<String>,
    customer_email: Option<String>,
    customer_phone: Option<String>,
    notes: Option<String>,
    #[serde(default)]
    items: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    product_id: Option<String>,
    #[serde(default)]
    quantity: i64,
}

impl From<CreateOrderRequest> for CheckoutInput {
    fn from(request: CreateOrderRequest) -> Self {
        Self {
            store_id: request.store_id,
            customer_name: request.customer_name,
            customer_email: request.customer_email,
            customer_phone: request.customer_phone,
            notes: request.notes,
            items: request
                .items
                .into_iter()
                .map(|item| (item.product_id, item.quantity))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    status: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(request) = payload?;
    let order = state
        .order_service()
        .create_order(request.into(), state.now())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Pedido creado exitosamente",
            "order": order,
        })),
    ))
}

pub async fn list(
    State(state): State<AppState>,
    merchant: Merchant,
) -> Result<Json<Value>, ApiError> {
    let store = require_store(&state, &merchant).await?;
    let orders = state.database().orders().list_for_store(&store.id).await?;
    Ok(Json(json!({ "orders": orders })))
}

pub async fn update_status(
    State(state): State<AppState>,
    merchant: Merchant,
    Path(order_id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let status = request
        .status
        .as_deref()
        .and_then(|value| value.parse::<OrderStatus>().ok())
        .ok_or_else(|| ApiError::validation("Estado inválido"))?;

    let store = require_store(&state, &merchant).await?;
    let order = state
        .order_service()
        .update_status(&store.id, &order_id, status, state.now())
        .await?;

    Ok(Json(json!({
        "message": "Pedido actualizado exitosamente",
        "order": order,
    })))
}
