use std::sync::Arc;

use filmgate_api::app::{build_app, services::AppServices};
use filmgate_api::config::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    filmgate_observability::init();

    let settings = Settings::from_env()?;
    let services = AppServices::connect(&settings).await?;
    let app = build_app(Arc::new(services))?;

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
