use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use http::HeaderValue;
use tokio::signal;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use tracing::{error, info, warn};

use threepl_api as api;

const REQUEST_TIMEOUT_SECS: u64 = 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("loading configuration")?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);
    api::handlers::health::init_start_time();

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db = Arc::new(db_pool);

    // Outbound collaborators
    let shipping: Arc<dyn api::integrations::shipstation::ShippingPlatform> = Arc::new(
        api::integrations::shipstation::ShipStationClient::new(&cfg.shipping)?,
    );
    if cfg.shipping.api_key.is_none() {
        warn!("Shipping platform credentials not configured; webhook fetches will be rejected upstream");
    }
    let notifier = api::notifications::notifier_from_config(&cfg.notifications)?;

    // Outbox worker mirrors orders to the shipping platform
    let outbox_worker = if cfg.outbox.enabled {
        let dispatcher = api::events::outbox::OutboxDispatcher::new(
            db.clone(),
            shipping.clone(),
            cfg.outbox.clone(),
        );
        Some(api::events::outbox::start_worker(
            dispatcher,
            Duration::from_millis(cfg.outbox.poll_interval_ms),
        ))
    } else {
        info!("Outbox worker disabled; mirrored orders stay pending until drained");
        None
    };

    let configured_origins = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    let cors_layer = if let Some(origins) = configured_origins {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_credentials(cfg.cors_allow_credentials)
    } else if cfg.should_allow_permissive_cors() {
        info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        CorsLayer::permissive()
    } else {
        error!("Missing CORS configuration detected; set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true");
        anyhow::bail!("Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true");
    };

    let bind_addr = format!("{}:{}", cfg.host, cfg.port);
    let max_body_size = cfg.max_body_size;
    let state = api::AppState::new(db, cfg, shipping, notifier);
    info!(
        stores = state.directory.store_count(),
        "brand directory loaded"
    );

    let app = api::app_router(state)
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .layer(CompressionLayer::new())
        .layer(cors_layer);

    // Bind and serve
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    info!("threepl-api listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(worker) = outbox_worker {
        worker.abort();
    }
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
