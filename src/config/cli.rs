use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the reportgen binary.
#[derive(Debug, Parser)]
#[command(
    name = "reportgen",
    version,
    about = "Queue-driven PDF report worker and ingestion API"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "REPORTGEN_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Consume report requests from the queue (default).
    Work(WorkArgs),
    /// Run the HTTP ingestion API that publishes requests to the queue.
    Serve(ServeArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Also write logs to daily-rolling files in this directory.
    #[arg(
        long = "log-file-dir",
        value_name = "DIR",
        value_hint = ValueHint::DirPath
    )]
    pub log_file_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct BrokerOverrides {
    /// Override the broker host.
    #[arg(long = "broker-host", value_name = "HOST")]
    pub broker_host: Option<String>,

    /// Override the broker port.
    #[arg(long = "broker-port", value_name = "PORT")]
    pub broker_port: Option<u16>,

    /// Override the durable queue name.
    #[arg(long = "broker-queue", value_name = "NAME")]
    pub broker_queue: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct WorkArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub broker: BrokerOverrides,

    /// Override the number of unacknowledged deliveries processed at once.
    #[arg(long = "broker-prefetch", value_name = "COUNT")]
    pub broker_prefetch: Option<u16>,

    /// Override the webhook HTTP timeout.
    #[arg(long = "webhook-timeout-seconds", value_name = "SECONDS")]
    pub webhook_timeout_seconds: Option<u64>,

    /// Override the page size (a4|letter).
    #[arg(long = "render-page-size", value_name = "SIZE")]
    pub render_page_size: Option<String>,

    /// Override how long in-flight messages may finish after shutdown is requested.
    #[arg(long = "worker-shutdown-grace-seconds", value_name = "SECONDS")]
    pub worker_shutdown_grace_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub broker: BrokerOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,
}
