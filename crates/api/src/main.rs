use std::net::SocketAddr;

use anyhow::Result;
use loopwalk_api::{build_app, ApiConfig};
use loopwalk_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("loopwalk_api");

    let config = ApiConfig::from_env()?;
    let app = build_app(&config)?;

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    tracing::info!(bind = %config.bind, model = %config.openai.model, "loopwalk api started");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
