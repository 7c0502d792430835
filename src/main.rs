use std::{future::IntoFuture, process, sync::Arc};

use reportgen::{
    application::{
        error::AppError,
        jobs::ReportJobProcessor,
        render::{PdfRenderService, RenderPipelineConfig, ReportFonts},
        webhook::HttpWebhookDispatcher,
    },
    config,
    infra::{
        broker::BrokerConnection,
        error::InfraError,
        http::{self, ApiState},
        telemetry,
    },
};
use tokio::sync::watch;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Work(config::WorkArgs::default()));

    let _log_guard = telemetry::init(&settings.logging)?;

    match command {
        config::Command::Work(_) => run_work(settings).await,
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_work(settings: config::Settings) -> Result<(), AppError> {
    let fonts = ReportFonts::load(
        settings.render.font_regular_path.as_deref(),
        settings.render.font_bold_path.as_deref(),
    )?;
    let renderer = PdfRenderService::new(RenderPipelineConfig::from(&settings.render), fonts);
    let dispatcher = HttpWebhookDispatcher::new(settings.webhook.timeout)
        .map_err(|err| AppError::unexpected(err.to_string()))?;
    let processor = ReportJobProcessor::new(Arc::new(renderer), Arc::new(dispatcher));

    let broker = BrokerConnection::connect(&settings.broker).await?;
    let shutdown = spawn_shutdown_listener();

    let result = broker
        .consume(processor, shutdown, settings.worker.shutdown_grace)
        .await;
    broker.close().await;

    result.map_err(AppError::from)
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let broker = Arc::new(BrokerConnection::connect(&settings.broker).await?);
    let router = http::build_router(ApiState {
        queue: broker.clone(),
    });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "ingestion API listening");

    let mut shutdown = spawn_shutdown_listener();
    let mut server_shutdown = shutdown.clone();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.wait_for(|stop| *stop).await;
        })
        .into_future();
    tokio::pin!(server);

    let result = tokio::select! {
        result = &mut server => result.map_err(server_error),
        _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => {
            let grace = settings.server.graceful_shutdown;
            match tokio::time::timeout(grace, &mut server).await {
                Ok(result) => result.map_err(server_error),
                Err(_) => {
                    warn!(grace_seconds = grace.as_secs(), "graceful shutdown timed out");
                    Ok(())
                }
            }
        }
    };

    broker.close().await;
    result
}

fn server_error(err: std::io::Error) -> AppError {
    AppError::unexpected(format!("server error: {err}"))
}

/// Flips the returned receiver to `true` on Ctrl-C or SIGTERM.
fn spawn_shutdown_listener() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        let _ = tx.send(true);
    });
    rx
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(err) => {
            error!(error = %err, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
