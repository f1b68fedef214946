use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ingestconf::IngestConfig;
use midi_ingest::publisher::PROCESSING_COMPLETE;
use midi_ingest::{
    telemetry, web, EventPublisher, FileHandle, MidiFileProcessor, ProcessingQueue, QueueConfig,
    SubscriberHub, UploadStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// MIDI upload and analysis service
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of ./midi-ingest.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Worker pool size
        #[arg(short, long)]
        workers: Option<usize>,

        /// Where uploads are written
        #[arg(long)]
        upload_dir: Option<PathBuf>,
    },

    /// Analyze files locally and print each notification as a JSON line
    Analyze {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, sources) = IngestConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Command::Config => {
            for file in &sources.files {
                println!("# loaded: {}", file.display());
            }
            for var in &sources.env_overrides {
                println!("# env: {}", var);
            }
            print!("{}", config.to_toml());
            Ok(())
        }
        Command::Analyze { files } => {
            telemetry::init(&config.telemetry).context("Failed to initialize telemetry")?;
            let result = analyze(&config, files).await;
            telemetry::shutdown();
            result
        }
        Command::Serve {
            port,
            workers,
            upload_dir,
        } => {
            if let Some(port) = port {
                config.bind.http_port = port;
            }
            if let Some(workers) = workers {
                config.queue.workers = workers;
            }
            if let Some(dir) = upload_dir {
                config.paths.upload_dir = dir;
            }

            telemetry::init(&config.telemetry).context("Failed to initialize telemetry")?;
            for file in &sources.files {
                tracing::info!(config.file = %file.display(), "Loaded config");
            }
            let result = serve(config).await;
            telemetry::shutdown();
            result
        }
    }
}

async fn serve(config: IngestConfig) -> Result<()> {
    let store = Arc::new(
        UploadStore::new(&config.paths.upload_dir).context("Failed to create upload directory")?,
    );

    let hub = SubscriberHub::new(config.queue.event_capacity);
    let publisher = EventPublisher::new(Arc::new(hub.clone()));
    let queue = ProcessingQueue::start(
        QueueConfig::from(&config.queue),
        Arc::new(MidiFileProcessor),
        publisher,
    );

    let app = web::router(web::AppState {
        queue: queue.clone(),
        hub: hub.clone(),
        store,
        max_files: config.queue.max_files_per_upload,
        started_at: Instant::now(),
    });

    let addr = config.bind.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Listening on http://{}", addr);
    tracing::info!("   Upload: POST http://{}/api/upload", addr);
    tracing::info!("   Events: GET http://{}/api/events", addr);
    tracing::info!("   Health: GET http://{}/health", addr);

    let shutdown_token = CancellationToken::new();

    // Periodic statistics logging
    let stats_queue = queue.clone();
    let stats_hub = hub.clone();
    let stats_ct = shutdown_token.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let stats = stats_queue.stats();
                    tracing::info!(
                        queue.queued = stats.queued,
                        queue.running = stats.running,
                        queue.succeeded = stats.succeeded,
                        queue.failed = stats.failed,
                        queue.batches_drained = stats.batches_drained,
                        subscribers = stats_hub.subscriber_count(),
                        "Server statistics"
                    );
                }
                _ = stats_ct.cancelled() => break,
            }
        }
    });

    let server_ct = shutdown_token.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        server_ct.cancelled().await;
        tracing::info!("Server shutdown signal received");
    });

    let server_task = tokio::spawn(async move { server.await });

    wait_for_signal().await;
    shutdown_token.cancel();

    // SSE streams never end on their own; don't wait on them forever.
    match tokio::time::timeout(Duration::from_secs(5), server_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::error!("Server shutdown with error: {:?}", e),
        Ok(Err(e)) => tracing::error!("Server task failed: {:?}", e),
        Err(_) => tracing::warn!("Open connections did not close in time"),
    }

    queue.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Handle both SIGINT (Ctrl+C) and SIGTERM (systemd, containers, etc.)
async fn wait_for_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                match signal(SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Run the queue over local files, printing notifications until the batch drains.
async fn analyze(config: &IngestConfig, files: Vec<PathBuf>) -> Result<()> {
    let hub = SubscriberHub::new(config.queue.event_capacity.max(files.len() * 2 + 1));
    let mut subscription = hub.subscribe("stdout");

    let queue = ProcessingQueue::start(
        QueueConfig::from(&config.queue),
        Arc::new(MidiFileProcessor),
        EventPublisher::new(Arc::new(hub.clone())),
    );

    let total = files.len();
    let handles = queue.enqueue_batch(files.iter().map(|p| FileHandle::from_path(p)).collect());

    while let Some(notification) = subscription.recv().await {
        println!("{}", serde_json::to_string(&notification)?);
        if notification.event == PROCESSING_COMPLETE {
            break;
        }
    }

    let mut failed = 0;
    for handle in handles {
        if !handle.outcome().await.is_success() {
            failed += 1;
        }
    }
    queue.shutdown().await;

    if failed > 0 {
        anyhow::bail!("{} of {} files failed", failed, total);
    }
    Ok(())
}
