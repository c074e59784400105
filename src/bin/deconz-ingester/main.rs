mod args;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use args::Args;
use chrono::Utc;
use clap::Parser as _;
use deconz_ingest::connection::{ConnectionManager, WebsocketSource};
use deconz_ingest::deconz::RestApi;
use deconz_ingest::directory::{CachingDirectory, SensorDirectory};
use deconz_ingest::event::EventDecoder;
use deconz_ingest::fill::FillScheduler;
use deconz_ingest::pipeline::run_pipeline;
use deconz_ingest::sink::{PgSink, Sink, Source, TimeseriesRecord, WriterConfig, new_pool, spawn_writer};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = run().await {
        eprintln!("{e:#}");
        return ExitCode::from(1);
    }

    ExitCode::from(0)
}

async fn run() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args.log_level)?;

    let api = RestApi::new(args.deconz_addr.clone(), &args.api_key)?;

    let pool = new_pool(&args.database_url).await?;
    let sink: Arc<dyn Sink> = Arc::new(PgSink::new(pool));

    if args.once {
        return run_once(&api, sink.as_ref()).await;
    }

    run_websocket(&args, api, sink).await
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level: {log_level}"))?,
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    Ok(())
}

async fn run_once(api: &RestApi, sink: &dyn Sink) -> Result<()> {
    let sensors = api.sensors().await.context("failed to fetch sensors")?;

    let now = Utc::now();
    let records: Vec<TimeseriesRecord> = sensors
        .values()
        .filter_map(|sensor| TimeseriesRecord::from_sensor(sensor, Source::Rest, now))
        .collect();

    sink.write_batch(&records)
        .await
        .context("failed to write sensor states")?;

    info!(count = records.len(), "wrote sensor states");

    Ok(())
}

async fn run_websocket(args: &Args, api: RestApi, sink: Arc<dyn Sink>) -> Result<()> {
    let websocket_url = match &args.websocket_addr {
        Some(url) => url.clone(),
        None => api.websocket_url().await?,
    };

    let directory: Arc<dyn SensorDirectory> = Arc::new(
        CachingDirectory::new(api, args.directory_refresh_interval())
            .await
            .context("failed to load sensors")?,
    );

    let token = CancellationToken::new();
    listen_for_shutdown(token.clone())?;

    let (records, writer) = spawn_writer(sink, WriterConfig::default());

    let (manager, events) = ConnectionManager::start(
        Arc::new(WebsocketSource::new(websocket_url)),
        EventDecoder::new(Arc::clone(&directory)),
        args.connection_config(),
    );

    let fill_config = args.fill_config();
    if fill_config.enabled {
        info!(
            fill_interval = %fill_config.fill_interval,
            last_seen_timeout = %fill_config.last_seen_timeout,
            "filling sensor values enabled"
        );
    }
    let fill = FillScheduler::new(directory, fill_config);

    run_pipeline(events, fill, records, token).await;

    if !manager.shutdown(args.shutdown_timeout()).await {
        warn!("websocket did not close within the shutdown timeout");
    }

    writer.await.context("sink writer failed")?;

    info!("exiting");

    Ok(())
}

/// Cancels `token` on SIGINT or SIGTERM.
fn listen_for_shutdown(token: CancellationToken) -> Result<()> {
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("failed to install SIGTERM handler")?;

    tokio::spawn(async move {
        #[cfg(unix)]
        let terminate = async {
            sigterm.recv().await;
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::pin!(terminate);

        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("received SIGINT"),
                Err(err) => {
                    warn!("failed to listen for SIGINT: {err}");
                    (&mut terminate).await;
                    info!("received SIGTERM");
                }
            },
            _ = &mut terminate => info!("received SIGTERM"),
        }

        token.cancel();
    });

    Ok(())
}
