mod configuration;
mod error;
mod logging;
mod routes;
mod state;
mod storage;

use tower_http::cors::{Any, CorsLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = configuration::Settings::new()?;
    logging::init(settings.log.json);

    let addr = settings.server.socket_addr()?;
    info!(
        model = %settings.provider.model,
        db = %settings.database.path.display(),
        max_rows = settings.database.max_rows,
        "starting finchat server"
    );

    // Create app state
    let state = state::AppState::new(settings);

    // Create router with CORS support
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
