use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use medtwin::api::api_router;
use medtwin::config::{self, Settings};
use medtwin::CoreState;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    info!("MedTwin starting v{}", config::APP_VERSION);

    // Built before the runtime: the agent and calendar clients are
    // blocking reqwest clients driven from spawn_blocking.
    let settings = Settings::from_env();
    let bind_addr = settings.bind_addr.clone();
    let core = Arc::new(CoreState::new(settings)?);

    // Open once up front so migrations run before traffic arrives
    let conn = core.open_db()?;
    info!(
        tables = medtwin::db::count_tables(&conn)?,
        db = %core.db_path().display(),
        "Database ready"
    );
    drop(conn);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let app = api_router(core);
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Listening on {bind_addr}");
        axum::serve(listener, app).await?;
        Ok(())
    })
}
