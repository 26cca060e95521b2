//! Kassa server
//!
//! Main entry point for the Kassa backend service. Hosts the overdue payment
//! checker for the lifetime of the process.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kassa_core::clock::SystemClock;
use kassa_core::overdue::OverdueScheduler;
use kassa_db::{PaymentRepository, connect_with};
use kassa_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kassa=debug,kassa_core=debug,kassa_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load()?;

    // Connect to database
    let db = connect_with(&config.database).await?;
    info!("Connected to database");

    let shutdown = CancellationToken::new();

    let scheduler = if config.scheduler.enabled {
        let payments = Arc::new(PaymentRepository::new(db.clone()));
        let scheduler =
            OverdueScheduler::from_config(payments, Arc::new(SystemClock), &config.scheduler);
        Some(scheduler.spawn(shutdown.clone()))
    } else {
        info!("Overdue payment checker disabled");
        None
    };

    shutdown_signal().await;
    info!("Shutting down");
    shutdown.cancel();

    if let Some(handle) = scheduler {
        handle.await?;
    }
    db.close().await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
