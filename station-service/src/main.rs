use std::net::SocketAddr;

use station_service::{config::StationConfig, routes::router, station::Station};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting voting station service");

    let config = StationConfig::from_env()?;
    let station = Station::open(&config).await?;
    if station.is_degraded() {
        warn!("Durable store unavailable, votes are kept in the fast store only");
    }

    // Serve right away; logins wait for reconciliation to finish.
    let init = station.clone();
    tokio::spawn(async move {
        match init.initialize().await {
            Ok(status) => {
                if let Some(banner) = status.banner() {
                    warn!("{}", banner);
                }
            }
            Err(e) => error!("Station initialization failed: {e}"),
        }
    });

    let app = router(station, config.db_path.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
