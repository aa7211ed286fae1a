use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use gestularia_core::validation::{non_blank, required, validate_price, ValidationError};
use gestularia_storage::{NewProduct, ProductChanges};

use crate::auth::Merchant;
use crate::problem::ApiError;
use crate::router::AppState;
use crate::stores::{owned_store, require_store};

const PRODUCT_NOT_FOUND: &str = "Producto no encontrado";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    name: Option<String>,
    description: Option<String>,
    price: Option<Decimal>,
    image: Option<String>,
    is_active: Option<bool>,
}

impl ProductRequest {
    fn name(&self) -> Result<String, ValidationError> {
        required(self.name.as_deref(), "name")
    }

    fn price(&self) -> Result<Decimal, ValidationError> {
        validate_price(self.price.ok_or(ValidationError::Required("price"))?)
    }
}

pub async fn create(
    State(state): State<AppState>,
    merchant: Merchant,
    payload: Result<Json<ProductRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let name = request.name()?;
    let price = request.price()?;
    let store = require_store(&state, &merchant).await?;

    let description = non_blank(request.description.as_deref());
    let image = non_blank(request.image.as_deref());
    let product = state
        .database()
        .products()
        .insert(&NewProduct {
            store_id: &store.id,
            name: &name,
            description: description.as_deref(),
            price,
            image: image.as_deref(),
            created_at: state.now(),
        })
        .await?;

    info!(stage = "products", product_id = %product.id, store_id = %store.id, "product created");
    Ok(Json(json!({
        "message": "Producto creado exitosamente",
        "product": product,
    })))
}

pub async fn list(
    State(state): State<AppState>,
    merchant: Merchant,
) -> Result<Json<Value>, ApiError> {
    let products = match owned_store(&state, &merchant).await? {
        Some(store) => state.database().products().list_for_store(&store.id).await?,
        None => Vec::new(),
    };
    Ok(Json(json!({ "products": products })))
}

pub async fn show(
    State(state): State<AppState>,
    merchant: Merchant,
    Path(product_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let store = require_store(&state, &merchant).await?;
    let product = state
        .database()
        .products()
        .find_for_store(&store.id, &product_id)
        .await?
        .ok_or_else(|| ApiError::not_found(PRODUCT_NOT_FOUND))?;
    Ok(Json(json!({ "product": product })))
}

pub async fn update(
    State(state): State<AppState>,
    merchant: Merchant,
    Path(product_id): Path<String>,
    payload: Result<Json<ProductRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let store = require_store(&state, &merchant).await?;
    let name = request.name()?;
    let price = request.price()?;

    let description = non_blank(request.description.as_deref());
    let image = non_blank(request.image.as_deref());
    let product = state
        .database()
        .products()
        .update(
            &store.id,
            &product_id,
            &ProductChanges {
                name: &name,
                description: description.as_deref(),
                price,
                image: image.as_deref(),
                is_active: request.is_active,
                updated_at: state.now(),
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found(PRODUCT_NOT_FOUND))?;

    info!(stage = "products", product_id = %product.id, store_id = %store.id, "product updated");
    Ok(Json(json!({
        "message": "Producto actualizado exitosamente",
        "product": product,
    })))
}

pub async fn remove(
    State(state): State<AppState>,
    merchant: Merchant,
    Path(product_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let store = require_store(&state, &merchant).await?;
    let deleted = state
        .database()
        .products()
        .delete(&store.id, &product_id)
        .await?;
    if !deleted {
        return Err(ApiError::not_found(PRODUCT_NOT_FOUND));
    }

    info!(stage = "products", %product_id, store_id = %store.id, "product deleted");
    Ok(Json(json!({ "message": "Producto eliminado exitosamente" })))
}
