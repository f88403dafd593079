use session_engine::EngineConfig;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use config::ServerConfig;
use state::Engine;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let server_config = ServerConfig::from_env()?;
    let engine_config = EngineConfig::from_env()?;

    let engine = Engine::build(&server_config, engine_config).await?;
    // Picks up sessions left over from a previous run, then idles until woken.
    engine.watcher.spawn();

    let app = routes::router(engine.state);
    let listener = TcpListener::bind(("0.0.0.0", server_config.port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
