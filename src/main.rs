use std::env;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use mes_rbac::path::Hierarchy;
use mes_rbac::{db, setup, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|arg| arg == "-help" || arg == "--help") {
        println!("Usage: mes-rbac [OPTIONS]");
        println!("Options:");
        println!("  -config <path>  Path to configuration file (default: ./etc/mes-rbac.toml)");
        println!("  -help, --help   Print this help message");
        return Ok(());
    }

    let config_path = args
        .iter()
        .skip_while(|arg| arg.as_str() != "-config")
        .nth(1)
        .map(|s| s.to_string())
        .unwrap_or_else(|| "./etc/mes-rbac.toml".to_string());

    // Load configuration first (before logging init)
    let config = Config::load(&config_path).unwrap_or_else(|e| {
        eprintln!("Could not load config file: {}, using defaults", e);
        Config::default()
    });

    // Priority: RUST_LOG env var > config file > default "info"
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting mes-rbac...");
    info!("Loading configuration from: {}", config_path);

    let db_conn = db::init_database(&config.database).await.map_err(|e| {
        tracing::error!("Database initialization failed: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;

    let state = AppState::new(db_conn, config);

    let admin = setup::ensure_defaults(&state).await?;
    info!("Built-in role {} ready ({})", admin.code, admin.id);

    // Repair materialized paths left stale by manual edits or interrupted cascades
    let paths = state.paths();
    for hierarchy in [Hierarchy::Department, Hierarchy::Permission] {
        let report = paths.rebuild_all(hierarchy).await?;
        for err in report.dangling_references(hierarchy) {
            warn!("{}", err);
        }
        for (id, err) in &report.failures {
            warn!("Could not rebuild {} {}: {}", hierarchy.entity_name(), id, err);
        }
    }

    info!("Hierarchy check complete");
    Ok(())
}
