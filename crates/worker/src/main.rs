//! The mediamill worker daemon.
//!
//! Wires the durable job store, the in-process queue, the ComfyUI
//! backend client, and the delivery channels into a single [`JobWorker`]
//! and runs it until a termination signal arrives.

mod config;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediamill_comfyui::ComfyApi;
use mediamill_events::TelegramApi;
use mediamill_jobs::{JobQueue, JobStore, JobWorker, TelegramNotifier, WorkerConfig};

use config::WorkerdConfig;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerdConfig::from_env();
    tracing::info!(
        data_root = %config.data_root.display(),
        comfyui_url = %config.comfyui_url,
        "Loaded worker configuration"
    );

    // --- Storage and queue ---
    let store = Arc::new(
        JobStore::open(&config.data_root)
            .await
            .expect("Failed to open job store"),
    );
    let queue = Arc::new(JobQueue::new());

    // --- Generation backend ---
    let backend = Arc::new(ComfyApi::new(config.comfyui_url.clone()));
    if backend.is_reachable().await {
        let latency = backend.latency_ms().await;
        tracing::info!(latency_ms = ?latency, "ComfyUI is reachable");
    } else {
        tracing::warn!(url = %config.comfyui_url, "ComfyUI is not reachable; jobs will fail until it is");
    }

    // --- Worker ---
    let mut worker_config = WorkerConfig::new(
        config.workflow_path.clone(),
        config.song_workflow_path.clone(),
    );
    worker_config.job_timeout = config.job_timeout();
    worker_config.poll_interval = config.poll_interval();

    let mut worker = JobWorker::new(
        Arc::clone(&queue),
        Arc::clone(&store),
        backend,
        worker_config,
    );

    if let Some(token) = &config.telegram_bot_token {
        let notifier = TelegramNotifier::new(
            TelegramApi::new(token),
            Arc::clone(&store),
            config.telegram_default_chat_id.clone(),
            config.public_base_url.clone(),
        );
        worker = worker.with_notifier(Arc::new(notifier));
        tracing::info!("Telegram notifications enabled");
    }

    let worker = Arc::new(worker);
    worker.start();

    // --- Run until a termination signal ---
    shutdown_signal().await;

    worker.stop().await;
    let stats = worker.stats();
    tracing::info!(
        success = stats.success,
        failed = stats.failed,
        timed_out = stats.timed_out,
        canceled = stats.canceled,
        pending = queue.size(),
        "Worker shut down"
    );
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the daemon
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
