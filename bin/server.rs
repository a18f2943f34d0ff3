// Finance Dashboard - Web Server
// REST API with Axum over the SQLite-backed plan store

use anyhow::{Context, Result};
use finance_dashboard::api::{router, AppState};
use finance_dashboard::{seed_plans, AppConfig, SqliteStore};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let (config, load_error) = AppConfig::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_directive()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(e) = &load_error {
        AppConfig::report_load_error(e);
    }

    println!("🌐 Finance Dashboard - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let catalog = config.load_catalog()?;
    let store = SqliteStore::open(&config.database_path)?;
    let seeded = seed_plans(&store, &catalog)?;
    info!(db = ?config.database_path, plans = seeded, "store ready");
    println!("✓ Database opened: {:?} ({} plans)", config.database_path, seeded);

    let app = router(AppState::new(store, catalog, &config.default_plan));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    println!("\n🚀 Server running on http://{}", config.bind_addr);
    println!("   API: http://{}/api/plans", config.bind_addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
