use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use hostbridge_origin::{
    HttpOriginSource, OriginListSource, OriginValidator, StaticOriginSource, ValidatorConfig,
    DEFAULT_ORIGINS_ENDPOINT,
};

use crate::exit::{origin_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod check_origin;
pub mod envinfo;
pub mod negotiate;
pub mod origins;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check whether origins would be trusted as a host or child.
    CheckOrigin(CheckOriginArgs),
    /// Resolve and print the origin allow-list.
    Origins(OriginsArgs),
    /// Negotiate a runtime from initialize response arguments.
    Negotiate(NegotiateArgs),
    /// Run an in-process host/app session and print the message transcript.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Print build and environment diagnostics.
    Envinfo(EnvinfoArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::CheckOrigin(args) => check_origin::run(args, format),
        Command::Origins(args) => origins::run(args, format),
        Command::Negotiate(args) => negotiate::run(args, format),
        Command::Simulate(args) => simulate::run(args, format),
        Command::Version(args) => version::run(args),
        Command::Envinfo(args) => envinfo::run(args, format),
    }
}

/// Where the origin allow-list comes from.
#[derive(Args, Debug)]
pub struct OriginSourceArgs {
    /// Use the built-in fallback list instead of fetching.
    #[arg(long)]
    pub offline: bool,
    /// Allow-list endpoint. Ignored with --offline.
    #[arg(long, value_name = "URL", env = "HOSTBRIDGE_ORIGINS_ENDPOINT")]
    pub endpoint: Option<String>,
    /// Maximum time to wait for the endpoint (e.g. 1500ms, 2s).
    #[arg(long, default_value = "1500ms")]
    pub fetch_timeout: String,
}

pub struct ResolvedSource {
    pub source: Arc<dyn OriginListSource>,
    pub config: ValidatorConfig,
    pub offline: bool,
}

impl OriginSourceArgs {
    pub fn resolve(&self) -> CliResult<ResolvedSource> {
        let config = ValidatorConfig {
            endpoint: self
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ORIGINS_ENDPOINT.to_string()),
            fetch_timeout: parse_timeout(&self.fetch_timeout)?,
        };

        if self.offline {
            return Ok(ResolvedSource {
                source: Arc::new(StaticOriginSource::fallback()),
                config,
                offline: true,
            });
        }

        let source = HttpOriginSource::new(config.endpoint.clone(), config.fetch_timeout)
            .map_err(|err| origin_error("failed to build allow-list client", err))?;
        Ok(ResolvedSource {
            source: Arc::new(source),
            config,
            offline: false,
        })
    }

    pub fn validator(&self) -> CliResult<OriginValidator> {
        let resolved = self.resolve()?;
        Ok(OriginValidator::with_config(resolved.source, resolved.config))
    }
}

#[derive(Args, Debug)]
pub struct CheckOriginArgs {
    /// Origins to check (e.g. https://teams.microsoft.com).
    #[arg(required = true)]
    pub origins: Vec<String>,
    /// Extra trusted origins (comma-separated, `*.` wildcards allowed).
    #[arg(long, value_delimiter = ',')]
    pub additional: Vec<String>,
    #[command(flatten)]
    pub source: OriginSourceArgs,
}

#[derive(Args, Debug)]
pub struct OriginsArgs {
    /// Fail instead of using the fallback list when the fetch fails.
    #[arg(long)]
    pub strict: bool,
    #[command(flatten)]
    pub source: OriginSourceArgs,
}

#[derive(Args, Debug)]
pub struct NegotiateArgs {
    /// Frame context reported by the host (first response argument).
    pub context: String,
    /// Host client type (second response argument).
    pub client_type: String,
    /// Runtime JSON or client version (third response argument).
    pub runtime: Option<String>,
    /// Runtime JSON when the third argument is a version (fourth argument).
    pub runtime_fallback: Option<String>,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Origin the simulated host posts from.
    #[arg(long, default_value = "https://teams.microsoft.com")]
    pub host_origin: String,
    /// Origin of the simulated app.
    #[arg(long, default_value = "https://app.contoso.com")]
    pub app_origin: String,
    /// Frame context the host reports.
    #[arg(long, default_value = "content")]
    pub context: String,
    /// Client type the host reports.
    #[arg(long, default_value = "web")]
    pub client_type: String,
    /// Runtime payload the host answers initialize with (JSON or a version).
    #[arg(long)]
    pub runtime: Option<String>,
    /// Extra trusted origins passed to initialize (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub valid_origins: Vec<String>,
    /// Also relay a request from a nested child window.
    #[arg(long)]
    pub child: bool,
    /// Initialize timeout (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct EnvinfoArgs {}

pub fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("failed to start async runtime: {err}")))
}

pub fn parse_timeout(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "timeout must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
