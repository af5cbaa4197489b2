#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::{net::SocketAddr, sync::Arc};

    use maintenance_calendar::{EngineConfig, InMemoryCalendarStore, http_api};
    use tracing::info;
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = EngineConfig::from_env()?;
    let addr: SocketAddr = std::env::var("MAINTENANCE_CALENDAR_HTTP_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        .parse()?;

    let store: http_api::SharedStore = match std::env::var("MAINTENANCE_CALENDAR_DB") {
        #[cfg(feature = "sqlite")]
        Ok(path) => {
            info!(%path, "using SQLite calendar store");
            Arc::new(maintenance_calendar::SqliteCalendarStore::new(path)?)
        }
        #[cfg(not(feature = "sqlite"))]
        Ok(_) => {
            tracing::warn!("MAINTENANCE_CALENDAR_DB ignored: built without the `sqlite` feature");
            Arc::new(InMemoryCalendarStore::new())
        }
        Err(_) => {
            info!("using in-memory calendar store");
            Arc::new(InMemoryCalendarStore::new())
        }
    };

    let state = http_api::AppState::new(store, config);
    http_api::serve(addr, state).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
