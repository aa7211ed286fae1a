use axum::{extract::State, Json};
use tracing::debug;

use gestularia_core::analytics::{compute_analytics, SalesAnalytics};

use crate::auth::Merchant;
use crate::problem::ApiError;
use crate::router::AppState;
use crate::stores::require_store;

pub async fn report(
    State(state): State<AppState>,
    merchant: Merchant,
) -> Result<Json<SalesAnalytics>, ApiError> {
    let store = require_store(&state, &merchant).await?;
    let orders = state
        .database()
        .orders()
        .list_sales_for_store(&store.id)
        .await?;

    let analytics = compute_analytics(&orders, state.report_timezone())?;
    debug!(
        stage = "analytics",
        store_id = %store.id,
        sales = analytics.sales_count,
        "computed sales analytics"
    );
    Ok(Json(analytics))
}

#[cfg(test)]
mod tests {
    use crate::router::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn empty_store_reports_zeroes() {
        let state = setup_state().await;
        let (token, _) = seed_store(&state, "ana@example.com", "acme").await;
        let response = send(&state, "GET", "/api/analytics", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["totalRevenue"], json!(0.0));
        assert_eq!(body["salesCount"], 0);
        assert_eq!(body["averageOrderValue"], json!(0.0));
        assert_eq!(body["dailySeries"], json!([]));
        assert_eq!(body["topProducts"], json!([]));
    }

    #[tokio::test]
    async fn reports_revenue_and_top_products() {
        let state = setup_state().await;
        let (token, store) = seed_store(&state, "ana@example.com", "acme").await;
        let a = seed_product(&state, &token, "A", 10.0).await;
        let b = seed_product(&state, &token, "B", 5.0).await;
        let response = send(
            &state,
            "POST",
            "/api/orders",
            None,
            Some(json!({
                "storeId": store["id"],
                "customerName": "Bea",
                "customerEmail": "bea@example.com",
                "items": [
                    { "productId": a["id"], "quantity": 2 },
                    { "productId": b["id"], "quantity": 1 },
                ],
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = json_body(send(&state, "GET", "/api/analytics", Some(&token), None).await).await;
        assert_eq!(body["totalRevenue"], json!(25.0));
        assert_eq!(body["salesCount"], 1);
        assert_eq!(body["averageOrderValue"], json!(25.0));
        assert_eq!(
            body["topProducts"],
            json!([
                { "productId": a["id"], "name": "A", "count": 2 },
                { "productId": b["id"], "name": "B", "count": 1 },
            ])
        );
        assert_eq!(
            body["dailySeries"],
            json!([{ "date": "2024-03-05", "name": "05 mar", "total": 25.0 }])
        );
    }

    #[tokio::test]
    async fn cancelled_orders_are_excluded() {
        let state = setup_state().await;
        let (token, store) = seed_store(&state, "ana@example.com", "acme").await;
        let a = seed_product(&state, &token, "A", 10.0).await;
        let created = json_body(
            send(
                &state,
                "POST",
                "/api/orders",
                None,
                Some(json!({
                    "storeId": store["id"],
                    "customerName": "Bea",
                    "customerEmail": "bea@example.com",
                    "items": [{ "productId": a["id"], "quantity": 1 }],
                })),
            )
            .await,
        )
        .await;
        let uri = format!("/api/orders/{}", created["order"]["id"].as_str().unwrap());
        send(&state, "PATCH", &uri, Some(&token), Some(json!({ "status": "CANCELLED" }))).await;

        let body = json_body(send(&state, "GET", "/api/analytics", Some(&token), None).await).await;
        assert_eq!(body["salesCount"], 0);
        assert_eq!(body["averageOrderValue"], json!(0.0));
    }

    #[tokio::test]
    async fn merchants_without_store_get_not_found() {
        let state = setup_state().await;
        let token = token_for("ana@example.com");
        let response = send(&state, "GET", "/api/analytics", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
