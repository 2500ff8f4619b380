use std::sync::Arc;
use std::time::Duration;
use taskflow_rust::config::Settings;
use taskflow_rust::router::create_app_router;
use taskflow_rust::tasks::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = Settings::new()?;
    let addr = settings.server.socket_addr()?;
    let sweep_every = sweep_interval(settings.app.widget_state_ttl_secs);

    // Initialize application state
    let state = Arc::new(AppState::with_settings(settings.app)?);
    tracing::info!(tools = state.registry.len(), "Registered Taskflow tools");

    // Drop widget state that has gone stale
    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_every);
        loop {
            ticker.tick().await;
            let removed = sweeper.widgets.sweep_stale();
            if removed > 0 {
                tracing::debug!(removed, "Swept stale widget state");
            }
        }
    });

    // Build application router with all routes and middleware
    let app = create_app_router(state);

    tracing::info!("Server running on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// A quarter of the TTL, between one second and ten minutes.
fn sweep_interval(ttl_secs: u64) -> Duration {
    Duration::from_secs((ttl_secs / 4).clamp(1, 600))
}
