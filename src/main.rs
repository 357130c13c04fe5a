use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use nutrition_assistant::core::config::AppPaths;
use nutrition_assistant::core::logging;
use nutrition_assistant::server::router::router;
use nutrition_assistant::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(&AppPaths::new());

    let state = AppState::initialize().await?;
    tracing::debug!(config = %state.config.config_path().display(), "Configuration loaded");

    let bind_addr = format!(
        "{}:{}",
        state.settings.server.host, state.settings.server.port
    );
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    println!("NUTRITION_PORT={}", addr.port());
    tracing::info!("Listening on {}", addr);

    let app: Router = router(state);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
