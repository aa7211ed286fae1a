mod analytics;
mod auth;
mod checkout;
mod orders;
mod problem;
mod products;
mod router;
mod storefront;
mod stores;
mod telemetry;
mod tenant;

use std::net::SocketAddr;

use axum::{extract::Request, ServiceExt};
use chrono_tz::Tz;
use tracing::info;

use gestularia_core::tenant::TenantResolver;
use gestularia_storage::Database;
use gestularia_util::{load_env_file, AppConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let report_timezone: Tz = config
        .report_timezone
        .parse()
        .map_err(|err| format!("APP_REPORT_TIMEZONE is not a valid IANA timezone: {err}"))?;

    let database = Database::connect(&config.database_url).await?;
    database.run_migrations().await?;
    info!(stage = "storage", url = %config.database_url, "database ready");

    let resolver = TenantResolver::new(config.apex_domain.clone(), config.dev_hosts.clone());
    let state = router::AppState::new(
        metrics,
        database,
        &config.auth_secret,
        resolver,
        report_timezone,
    );

    let addr: SocketAddr = config.bind_addr;
    info!(
        stage = "app",
        %addr,
        env = %config.environment.as_str(),
        apex = %config.apex_domain,
        "starting HTTP server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let app = router::app(state);
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .await
        .map_err(|err| err.into())
}
