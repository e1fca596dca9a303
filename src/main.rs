use std::sync::Arc;
use std::time::Duration;

use replypilot::config::PipelineConfig;
use replypilot::pipeline::{sweep, CommentProcessor};
use replypilot::platform::{DryRunAiClient, DryRunPlatformClient};
use replypilot::response::TemplateStore;
use replypilot::store::{Database, LibSqlBackend};

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let batch_size: usize = std::env::var("REPLYPILOT_BATCH_SIZE")
        .unwrap_or_else(|_| "25".to_string())
        .parse()
        .unwrap_or(25);

    let config = PipelineConfig {
        batch_size,
        batch_interval: env_secs("REPLYPILOT_BATCH_INTERVAL_SECS", 60),
        sweep_interval: env_secs("REPLYPILOT_SWEEP_INTERVAL_SECS", 300),
        ..Default::default()
    };

    eprintln!("ReplyPilot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Batch size: {}", config.batch_size);
    eprintln!("   Batch interval: {:?}", config.batch_interval);

    // ── Database ─────────────────────────────────────────────────────────
    let db_path =
        std::env::var("REPLYPILOT_DB_PATH").unwrap_or_else(|_| "./data/replypilot.db".to_string());

    let db_path_ref = std::path::Path::new(&db_path);
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(db_path_ref)
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {}", db_path, e);
                std::process::exit(1);
            }),
    );

    eprintln!("   Database: {}", db_path);

    // Dry-run clients log outbound actions instead of calling a platform.
    // Real integrations plug in behind the same traits.
    let platform = Arc::new(DryRunPlatformClient);
    let ai = Arc::new(DryRunAiClient);

    let processor = CommentProcessor::new(
        Arc::clone(&db),
        ai,
        platform,
        TemplateStore::default_templates(),
        config.clone(),
    );

    // ── Background sweep ─────────────────────────────────────────────────
    let sweep_handle = sweep::spawn_sweep_task(Arc::clone(&db), config.clone());

    // ── Batch loop ───────────────────────────────────────────────────────
    let mut interval = tokio::time::interval(config.batch_interval);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = processor.run_batch().await {
                    tracing::error!(error = %e, "Batch run failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Shutting down");
                sweep_handle.abort();
                break;
            }
        }
    }

    Ok(())
}
