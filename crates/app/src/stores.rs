use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use gestularia_core::types::{Order, Product, Store};
use gestularia_core::validation::{
    non_blank, required, theme_color, validate_slug, DEFAULT_BACKGROUND_COLOR,
    DEFAULT_PRIMARY_COLOR,
};
use gestularia_storage::NewStore;

use crate::auth::Merchant;
use crate::problem::ApiError;
use crate::router::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoreRequest {
    name: Option<String>,
    slug: Option<String>,
    description: Option<String>,
    primary_color: Option<String>,
    background_color: Option<String>,
}

/// The merchant's store with its catalog and order history.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreOverview {
    #[serde(flatten)]
    store: Store,
    products: Vec<Product>,
    orders: Vec<Order>,
}

pub async fn create(
    State(state): State<AppState>,
    merchant: Merchant,
    payload: Result<Json<CreateStoreRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;

    let name = required(request.name.as_deref(), "name")?;
    let slug = required(request.slug.as_deref(), "slug")?;
    validate_slug(&slug)?;
    let primary_color = theme_color(request.primary_color.as_deref(), DEFAULT_PRIMARY_COLOR)?;
    let background_color =
        theme_color(request.background_color.as_deref(), DEFAULT_BACKGROUND_COLOR)?;
    let description = non_blank(request.description.as_deref());

    let store = state
        .database()
        .stores()
        .insert(&NewStore {
            user_id: &merchant.user_id,
            name: &name,
            slug: &slug,
            description: description.as_deref(),
            primary_color: &primary_color,
            background_color: &background_color,
            created_at: state.now(),
        })
        .await?;

    info!(
        stage = "stores",
        store_id = %store.id,
        slug = %store.slug,
        owner = %merchant.email,
        owner_name = merchant.name.as_deref().unwrap_or_default(),
        "store created"
    );
    Ok(Json(json!({
        "message": "Tienda creada exitosamente",
        "store": store,
    })))
}

pub async fn overview(
    State(state): State<AppState>,
    merchant: Merchant,
) -> Result<Json<Value>, ApiError> {
    let Some(store) = owned_store(&state, &merchant).await? else {
        return Ok(Json(json!({ "store": null })));
    };

    let products = state.database().products().list_for_store(&store.id).await?;
    let orders = state.database().orders().list_for_store(&store.id).await?;
    let overview = StoreOverview {
        store,
        products,
        orders,
    };
    Ok(Json(json!({ "store": overview })))
}

pub(crate) async fn owned_store(
    state: &AppState,
    merchant: &Merchant,
) -> Result<Option<Store>, ApiError> {
    Ok(state
        .database()
        .stores()
        .find_by_owner(&merchant.user_id)
        .await?)
}

/// Like [`owned_store`] but a merchant without a store is a 404.
pub(crate) async fn require_store(
    state: &AppState,
    merchant: &Merchant,
) -> Result<Store, ApiError> {
    owned_store(state, merchant)
        .await?
        .ok_or_else(|| ApiError::not_found("No se encontró una tienda para este usuario"))
}

#[cfg(test)]
mod tests {
    use crate::router::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn creates_store_with_default_colors() {
        let state = setup_state().await;
        let token = token_for("ana@example.com");
        let response = send(
            &state,
            "POST",
            "/api/stores",
            Some(&token),
            Some(json!({ "name": "Acme", "slug": "acme", "description": "  " })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["message"], "Tienda creada exitosamente");
        assert_eq!(body["store"]["slug"], "acme");
        assert_eq!(body["store"]["primaryColor"], "#3B82F6");
        assert_eq!(body["store"]["backgroundColor"], "#FFFFFF");
        assert_eq!(body["store"]["isActive"], true);
        assert!(body["store"]["description"].is_null());
    }

    #[tokio::test]
    async fn taken_slug_is_a_conflict_and_writes_nothing() {
        let state = setup_state().await;
        seed_store(&state, "ana@example.com", "acme").await;

        let token = token_for("bea@example.com");
        let response = send(
            &state,
            "POST",
            "/api/stores",
            Some(&token),
            Some(json!({ "name": "Otra", "slug": "acme" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Este slug ya está en uso");

        let overview =
            json_body(send(&state, "GET", "/api/stores", Some(&token), None).await).await;
        assert!(overview["store"].is_null());
        let public = json_body(send(&state, "GET", "/tienda/acme", None, None).await).await;
        assert_eq!(public["store"]["name"], "Tienda");
    }

    #[tokio::test]
    async fn one_store_per_merchant() {
        let state = setup_state().await;
        let (token, _) = seed_store(&state, "ana@example.com", "acme").await;
        let response = send(
            &state,
            "POST",
            "/api/stores",
            Some(&token),
            Some(json!({ "name": "Otra", "slug": "otra" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Ya tienes una tienda creada");
    }

    #[tokio::test]
    async fn rejects_invalid_input() {
        let state = setup_state().await;
        let token = token_for("ana@example.com");
        for body in [
            json!({ "name": "Acme" }),
            json!({ "name": " ", "slug": "acme" }),
            json!({ "name": "Acme", "slug": "Acme Shop" }),
            json!({ "name": "Acme", "slug": "www" }),
            json!({ "name": "Acme", "slug": "acme", "primaryColor": "blue" }),
        ] {
            let response =
                send(&state, "POST", "/api/stores", Some(&token), Some(body.clone())).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        }
    }

    #[tokio::test]
    async fn malformed_json_is_a_validation_error() {
        let state = setup_state().await;
        let token = token_for("ana@example.com");
        let response = send(&state, "POST", "/api/stores", Some(&token), Some(json!([1, 2]))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn overview_nests_products_and_orders() {
        let state = setup_state().await;
        let (token, store) = seed_store(&state, "ana@example.com", "acme").await;
        let product = seed_product(&state, &token, "Camiseta", 10.0).await;
        let response = send(
            &state,
            "POST",
            "/api/orders",
            None,
            Some(json!({
                "storeId": store["id"],
                "customerName": "Bea",
                "customerEmail": "bea@example.com",
                "items": [{ "productId": product["id"], "quantity": 1 }],
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = json_body(send(&state, "GET", "/api/stores", Some(&token), None).await).await;
        assert_eq!(body["store"]["slug"], "acme");
        assert_eq!(body["store"]["products"].as_array().unwrap().len(), 1);
        assert_eq!(body["store"]["orders"].as_array().unwrap().len(), 1);
        assert_eq!(body["store"]["orders"][0]["items"][0]["product"]["name"], "Camiseta");
    }
}
