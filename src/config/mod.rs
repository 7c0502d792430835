//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::NonZeroU16,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::render::{PageSize, RenderPipelineConfig};

mod cli;

pub use cli::{BrokerOverrides, CliArgs, Command, LoggingOverrides, ServeArgs, WorkArgs};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "reportgen";
const ENV_PREFIX: &str = "REPORTGEN";
const DEFAULT_BROKER_HOST: &str = "localhost";
const DEFAULT_BROKER_PORT: u16 = 5672;
const DEFAULT_BROKER_USERNAME: &str = "guest";
const DEFAULT_BROKER_PASSWORD: &str = "guest";
const DEFAULT_BROKER_VHOST: &str = "/";
const DEFAULT_BROKER_QUEUE: &str = "report_requests";
const DEFAULT_BROKER_PREFETCH: u16 = 4;
const DEFAULT_CONSUMER_TAG: &str = "reportgen-worker";
const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PAGE_SIZE: &str = "a4";
const DEFAULT_MARGIN_MM: f32 = 20.0;
const DEFAULT_FONT_SIZE_PT: f32 = 11.0;
const DEFAULT_IMAGE_DPI: f32 = 96.0;
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_WORKER_SHUTDOWN_GRACE_SECS: u64 = 30;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub broker: BrokerSettings,
    pub webhook: WebhookSettings,
    pub render: RenderSettings,
    pub server: ServerSettings,
    pub worker: WorkerSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
    /// Directory for daily-rolling log files; console only when unset.
    pub file_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Clone)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vhost: String,
    pub queue: String,
    pub prefetch: NonZeroU16,
    pub consumer_tag: String,
}

// Keeps the password out of logs.
impl std::fmt::Debug for BrokerSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("vhost", &self.vhost)
            .field("queue", &self.queue)
            .field("prefetch", &self.prefetch)
            .field("consumer_tag", &self.consumer_tag)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct WebhookSettings {
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub page_size: PageSize,
    pub margin_mm: f32,
    pub font_size_pt: f32,
    pub image_dpi: f32,
    pub font_regular_path: Option<PathBuf>,
    pub font_bold_path: Option<PathBuf>,
}

impl From<&RenderSettings> for RenderPipelineConfig {
    fn from(settings: &RenderSettings) -> Self {
        Self {
            page_size: settings.page_size,
            margin_mm: settings.margin_mm,
            font_size_pt: settings.font_size_pt,
            image_dpi: settings.image_dpi,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub shutdown_grace: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Work(args)) => raw.apply_work_overrides(args),
        Some(Command::Serve(args)) => raw.apply_serve_overrides(args),
        None => raw.apply_work_overrides(&WorkArgs::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    broker: RawBrokerSettings,
    webhook: RawWebhookSettings,
    render: RawRenderSettings,
    server: RawServerSettings,
    worker: RawWorkerSettings,
}

impl RawSettings {
    fn apply_work_overrides(&mut self, overrides: &WorkArgs) {
        self.apply_logging_overrides(&overrides.logging);
        self.apply_broker_overrides(&overrides.broker);

        if let Some(prefetch) = overrides.broker_prefetch {
            self.broker.prefetch = Some(prefetch);
        }
        if let Some(seconds) = overrides.webhook_timeout_seconds {
            self.webhook.timeout_seconds = Some(seconds);
        }
        if let Some(size) = overrides.render_page_size.as_ref() {
            self.render.page_size = Some(size.clone());
        }
        if let Some(seconds) = overrides.worker_shutdown_grace_seconds {
            self.worker.shutdown_grace_seconds = Some(seconds);
        }
    }

    fn apply_serve_overrides(&mut self, overrides: &ServeArgs) {
        self.apply_logging_overrides(&overrides.logging);
        self.apply_broker_overrides(&overrides.broker);

        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
    }

    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(dir) = overrides.log_file_dir.as_ref() {
            self.logging.file_dir = Some(dir.clone());
        }
    }

    fn apply_broker_overrides(&mut self, overrides: &BrokerOverrides) {
        if let Some(host) = overrides.broker_host.as_ref() {
            self.broker.host = Some(host.clone());
        }
        if let Some(port) = overrides.broker_port {
            self.broker.port = Some(port);
        }
        if let Some(queue) = overrides.broker_queue.as_ref() {
            self.broker.queue = Some(queue.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            broker,
            webhook,
            render,
            server,
            worker,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            broker: build_broker_settings(broker)?,
            webhook: build_webhook_settings(webhook)?,
            render: build_render_settings(render)?,
            server: build_server_settings(server)?,
            worker: build_worker_settings(worker)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    let file_dir = optional_path(logging.file_dir);

    Ok(LoggingSettings {
        level,
        format,
        file_dir,
    })
}

fn build_broker_settings(broker: RawBrokerSettings) -> Result<BrokerSettings, LoadError> {
    let host = non_empty(broker.host, DEFAULT_BROKER_HOST, "broker.host")?;

    let port = broker.port.unwrap_or(DEFAULT_BROKER_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "broker.port",
            "port must be greater than zero",
        ));
    }

    let username = non_empty(broker.username, DEFAULT_BROKER_USERNAME, "broker.username")?;
    let password = broker
        .password
        .unwrap_or_else(|| DEFAULT_BROKER_PASSWORD.to_string());
    let vhost = non_empty(broker.vhost, DEFAULT_BROKER_VHOST, "broker.vhost")?;
    let queue = non_empty(broker.queue, DEFAULT_BROKER_QUEUE, "broker.queue")?;
    let consumer_tag = non_empty(broker.consumer_tag, DEFAULT_CONSUMER_TAG, "broker.consumer_tag")?;

    let prefetch = NonZeroU16::new(broker.prefetch.unwrap_or(DEFAULT_BROKER_PREFETCH))
        .ok_or_else(|| LoadError::invalid("broker.prefetch", "must be greater than zero"))?;

    Ok(BrokerSettings {
        host,
        port,
        username,
        password,
        vhost,
        queue,
        prefetch,
        consumer_tag,
    })
}

fn build_webhook_settings(webhook: RawWebhookSettings) -> Result<WebhookSettings, LoadError> {
    Ok(WebhookSettings {
        timeout: positive_seconds(
            webhook.timeout_seconds,
            DEFAULT_WEBHOOK_TIMEOUT_SECS,
            "webhook.timeout_seconds",
        )?,
    })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let page_size = render
        .page_size
        .as_deref()
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .parse::<PageSize>()
        .map_err(|reason| LoadError::invalid("render.page_size", reason))?;

    let margin_mm = render.margin_mm.unwrap_or(DEFAULT_MARGIN_MM);
    let (_, height) = page_size.dimensions_mm();
    if !margin_mm.is_finite() || margin_mm < 0.0 || margin_mm * 4.0 >= height {
        return Err(LoadError::invalid(
            "render.margin_mm",
            "must be non-negative and leave room for content",
        ));
    }

    let font_size_pt = positive_f32(render.font_size, DEFAULT_FONT_SIZE_PT, "render.font_size")?;
    let image_dpi = positive_f32(render.image_dpi, DEFAULT_IMAGE_DPI, "render.image_dpi")?;

    Ok(RenderSettings {
        page_size,
        margin_mm,
        font_size_pt,
        image_dpi,
        font_regular_path: optional_path(render.font_regular_path),
        font_bold_path: optional_path(render.font_bold_path),
    })
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_shutdown = positive_seconds(
        server.graceful_shutdown_seconds,
        DEFAULT_GRACEFUL_SHUTDOWN_SECS,
        "server.graceful_shutdown_seconds",
    )?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown,
    })
}

fn build_worker_settings(worker: RawWorkerSettings) -> Result<WorkerSettings, LoadError> {
    Ok(WorkerSettings {
        shutdown_grace: positive_seconds(
            worker.shutdown_grace_seconds,
            DEFAULT_WORKER_SHUTDOWN_GRACE_SECS,
            "worker.shutdown_grace_seconds",
        )?,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
    file_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBrokerSettings {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    vhost: Option<String>,
    queue: Option<String>,
    prefetch: Option<u16>,
    consumer_tag: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawWebhookSettings {
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    page_size: Option<String>,
    margin_mm: Option<f32>,
    font_size: Option<f32>,
    image_dpi: Option<f32>,
    font_regular_path: Option<PathBuf>,
    font_bold_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawWorkerSettings {
    shutdown_grace_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_empty(value: Option<String>, default: &str, key: &'static str) -> Result<String, LoadError> {
    let value = value.unwrap_or_else(|| default.to_string());
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LoadError::invalid(key, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// A blank path is treated as unset so environment overrides can clear a file setting.
fn optional_path(value: Option<PathBuf>) -> Option<PathBuf> {
    value.filter(|path| !path.to_string_lossy().trim().is_empty())
}

fn positive_seconds(
    value: Option<u64>,
    default: u64,
    key: &'static str,
) -> Result<Duration, LoadError> {
    match value.unwrap_or(default) {
        0 => Err(LoadError::invalid(key, "must be greater than zero")),
        seconds => Ok(Duration::from_secs(seconds)),
    }
}

fn positive_f32(value: Option<f32>, default: f32, key: &'static str) -> Result<f32, LoadError> {
    let value = value.unwrap_or(default);
    if !value.is_finite() || value <= 0.0 {
        return Err(LoadError::invalid(key, "must be a positive number"));
    }
    Ok(value)
}
