use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::post;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use gearshop_config::GatewayConfig;

use crate::routes::{GatewayState, exchange_token, fetch_customer};

/// Build the proxy router for a validated configuration.
pub fn router(config: GatewayConfig) -> Router {
    let cors = cors_layer(&config);
    let state = GatewayState::new(config);

    Router::new()
        .route("/api/shopify-auth/callback", post(exchange_token))
        .route("/api/shopify-auth/customer", post(fetch_customer))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &GatewayConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    match config.allowed_origin() {
        Some(origin) => match origin.parse::<HeaderValue>() {
            Ok(origin) => layer.allow_origin(origin),
            Err(e) => {
                warn!(error = %e, origin, "invalid allowed origin, refusing cross-origin requests");
                layer
            }
        },
        None => layer.allow_origin(Any),
    }
}

/// Bind and serve the gateway until shutdown.
pub async fn start_gateway(config: GatewayConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.bind(), config.port());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "gateway listening");

    axum::serve(listener, router(config)).await?;
    Ok(())
}
