#![doc = include_str!("../README.md")]

mod server;

use anyhow::Context;
use clap::Parser;
use floodgate::{AdmissionGate, Floodgate};
use server::config::{CliArgs, ServerConfig};
use server::service::handler::{AppState, router};
use server::service::processor::RequestProcessor;
use server::service::request::RequestDescriptor;
use server::telemetry::init_telemetry;
use tokio::net::TcpListener;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    // The pool exists before the first connection is accepted.
    let floodgate = Floodgate::start(
        config.pool.clone(),
        RequestProcessor::new(config.processing_delay),
    )?;

    let listener = TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server_addr))?;
    log_startup_info(&config);

    let state = AppState {
        floodgate: floodgate.clone(),
        response_delay: config.response_delay,
        count_rejections_as_errors: config.count_rejections_as_errors,
    };

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(floodgate.gate().clone()))
        .await
        .context("server error")?;

    // 3. Drain what was admitted before the gate closed
    match floodgate.shutdown().await {
        Ok(()) => tracing::info!("Service shut down successfully"),
        Err(e) => tracing::error!("Error during pool shutdown: {e}"),
    }

    let snapshot = floodgate.stats();
    tracing::info!(
        admitted = snapshot.admitted,
        rejected_full = snapshot.rejected_full,
        rejected_closed = snapshot.rejected_closed,
        processed = snapshot.processed,
        failed = snapshot.failed,
        "Final pool statistics"
    );

    // 4. Flush exporters last so the drain above is exported
    providers.shutdown();
    Ok(())
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting server on {} with full config: {:#?}",
            config.server_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting server on {} with {} workers and queue capacity {}",
            config.server_addr,
            config.pool.pool_size,
            config.pool.queue_capacity
        );
    }
}

async fn shutdown_signal(gate: AdmissionGate<RequestDescriptor>) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                core::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = core::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            core::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");

    // 1. Refuse new work; requests still arriving get a 503
    gate.close();
    // 2. axum now waits for in-flight responses before returning
}
