use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::Layer;

use gestularia_core::tenant::TenantResolver;
use gestularia_storage::Database;

use crate::auth::TokenValidator;
use crate::checkout::OrderService;
use crate::tenant::{TenantRewrite, TenantRewriteLayer};
use crate::{analytics, orders, products, storefront, stores, telemetry};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    database: Database,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
    token_validator: TokenValidator,
    resolver: Arc<TenantResolver>,
    report_timezone: Tz,
    order_service: OrderService,
}

impl AppState {
    pub fn new(
        metrics: PrometheusHandle,
        database: Database,
        auth_secret: &[u8],
        resolver: TenantResolver,
        report_timezone: Tz,
    ) -> Self {
        let order_service = OrderService::new(database.clone());
        Self {
            metrics,
            database,
            clock: Arc::new(Utc::now),
            token_validator: TokenValidator::new(auth_secret),
            resolver: Arc::new(resolver),
            report_timezone,
            order_service,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn token_validator(&self) -> &TokenValidator {
        &self.token_validator
    }

    pub fn resolver(&self) -> Arc<TenantResolver> {
        self.resolver.clone()
    }

    pub fn report_timezone(&self) -> Tz {
        self.report_timezone
    }

    pub fn order_service(&self) -> &OrderService {
        &self.order_service
    }
}

/// Full service: tenant rewriting in front of the router.
pub fn app(state: AppState) -> TenantRewrite<Router> {
    TenantRewriteLayer::new(state.resolver()).layer(app_router(state))
}

pub fn app_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/stores", post(stores::create).get(stores::overview))
        .route("/products", post(products::create).get(products::list))
        .route(
            "/products/:id",
            get(products::show)
                .put(products::update)
                .delete(products::remove),
        )
        .route("/orders", post(orders::create).get(orders::list))
        .route("/orders/:id", patch(orders::update_status))
        .route("/analytics", get(analytics::report));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/tienda/:slug", get(storefront::show))
        .route("/tienda/:slug/", get(storefront::show))
        .nest("/api", api)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}
