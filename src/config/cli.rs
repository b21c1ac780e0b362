use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the roller-render binary.
#[derive(Debug, Parser)]
#[command(name = "roller-render", version, about = "Weblog rendering front end")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "ROLLER_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the rendering HTTP service.
    Serve(Box<ServeArgs>),
    /// Classify a single request URL and print the result as JSON.
    Classify(ClassifyArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

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

    #[command(flatten)]
    pub classifier: ClassifierOverrides,

    /// Override the site file served by the in-memory lookup.
    #[arg(long = "site-file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub site_file: Option<PathBuf>,

    /// Disable the planet and weblog page caches.
    #[arg(long = "no-cache", action = clap::ArgAction::SetTrue)]
    pub no_cache: bool,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ClassifierOverrides {
    /// Override the maximum number of tags in a tag intersection query.
    #[arg(long = "max-tags", value_name = "COUNT")]
    pub max_tags: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub classifier: ClassifierOverrides,

    /// Authenticated user to attach to the request.
    #[arg(long = "user", value_name = "NAME")]
    pub user: Option<String>,

    /// Request path and query, e.g. `/roller-ui/rendering/page/alice/entry/hello`.
    #[arg(value_name = "URL")]
    pub url: String,
}
