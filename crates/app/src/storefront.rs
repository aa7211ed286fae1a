//! Public storefront lookup, the target of tenant rewrites.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use gestularia_core::types::Product;

use crate::problem::ApiError;
use crate::router::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PublicStore {
    id: String,
    name: String,
    slug: String,
    description: Option<String>,
    primary_color: String,
    background_color: String,
    owner: Owner,
    products: Vec<Product>,
}

#[derive(Debug, Serialize)]
struct Owner {
    name: Option<String>,
    email: String,
}

pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let store = state
        .database()
        .stores()
        .find_by_slug(&slug)
        .await?
        .filter(|store| store.is_active)
        .ok_or_else(|| ApiError::not_found("Tienda no encontrada"))?;

    let owner = state
        .database()
        .users()
        .find_by_id(&store.user_id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("store {} has no owner", store.id)))?;
    let products = state
        .database()
        .products()
        .list_active_for_store(&store.id)
        .await?;

    let public = PublicStore {
        id: store.id,
        name: store.name,
        slug: store.slug,
        description: store.description,
        primary_color: store.primary_color,
        background_color: store.background_color,
        owner: Owner {
            name: owner.name,
            email: owner.email,
        },
        products,
    };
    Ok(Json(json!({ "store": public })))
}
