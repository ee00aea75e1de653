use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use storyloom::config::Settings;
use storyloom::database::{establish_connection, setup_database};
use storyloom::failure::FailureRecorder;
use storyloom::genai::ChatClient;
use storyloom::media::{BlobUploader, ImageHandler, TtsHandler, VideoComposer};
use storyloom::orchestrator::StoryOrchestrator;
use storyloom::persistence::PersistenceCoordinator;
use storyloom::queue::connect_queue;
use storyloom::server::start_server;
use storyloom::store::JobStore;
use storyloom::worker::{Reconciler, StageHandlers, Worker, WorkerConfig};

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the dispatch API server.
    Serve {
        #[clap(short, long, default_value = "3000")]
        port: u16,
    },
    /// Run the generation worker.
    Work,
    /// Apply pending database migrations and exit.
    Migrate,
}

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    if let Err(e) = run(args.command).await {
        error!(error = %e, "fatal initialization failure");
        process::exit(1);
    }
}

async fn run(command: Command) -> Result<()> {
    let settings = Settings::from_env();
    settings.validate()?;

    let database_url = settings
        .database_url
        .clone()
        .unwrap_or_else(|| "sqlite://storyloom.db?mode=rwc".to_string());

    let db = establish_connection(&database_url).await?;
    setup_database(&db).await?;

    match command {
        Command::Migrate => {
            info!("migrations applied");
        }
        Command::Serve { port } => {
            let queue = connect_queue(&settings).await?;
            start_server(port, db.clone(), queue).await?;
        }
        Command::Work => {
            run_worker(&settings, db.clone()).await?;
        }
    }

    db.close().await?;
    Ok(())
}

async fn run_worker(settings: &Settings, db: sea_orm::DatabaseConnection) -> Result<()> {
    let queue = connect_queue(settings).await?;
    let store = JobStore::new(db.clone());
    let recorder = Arc::new(FailureRecorder::new(
        db.clone(),
        settings.slack_webhook.clone(),
    ));

    let chat = Arc::new(
        ChatClient::new(
            settings.openai_api_key.clone().unwrap_or_default(),
            settings.openai_base_url.clone(),
        )?
        .with_backoff_base(Duration::from_millis(settings.backoff_base_ms)),
    );

    let uploader = BlobUploader::new(&settings.upload_dir);
    let handlers = StageHandlers {
        orchestrator: Arc::new(StoryOrchestrator::new(chat, recorder.clone())),
        persistence: Arc::new(PersistenceCoordinator::new(
            store.clone(),
            queue.clone(),
            recorder.clone(),
            settings.skip_persistence,
        )),
        image: Arc::new(ImageHandler::new(
            settings.image_api_key.clone(),
            uploader.clone(),
        )),
        tts: Arc::new(TtsHandler::new(
            settings.tts_api_key.clone(),
            uploader.clone(),
        )),
        video: Arc::new(VideoComposer::new(&settings.upload_dir)),
        uploader,
    };

    let worker = Worker::new(
        store.clone(),
        queue.clone(),
        recorder,
        handlers,
        WorkerConfig {
            concurrency: settings.worker_concurrency,
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            max_retries: settings.max_retries,
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    if settings.reconcile_interval_ms > 0 {
        let reconciler = Reconciler::new(
            store,
            queue,
            Duration::from_millis(settings.reconcile_interval_ms),
            settings.reconcile_stale_secs,
        );
        let reconciler_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            reconciler.run(reconciler_shutdown).await;
        });
    }

    worker.run(shutdown_rx).await;
    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level.to_string()))
        .init();
}
