mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "hostbridge", version, about = "Host/app cross-window messaging CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "HOSTBRIDGE_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_check_origin_subcommand() {
        let cli = Cli::try_parse_from([
            "hostbridge",
            "check-origin",
            "https://teams.microsoft.com",
            "--offline",
            "--additional",
            "https://*.contoso.com,https://app.fabrikam.com",
        ])
        .expect("check-origin args should parse");

        match cli.command {
            Command::CheckOrigin(args) => {
                assert!(args.source.offline);
                assert_eq!(args.additional.len(), 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_origins_with_explicit_endpoint() {
        let cli = Cli::try_parse_from([
            "hostbridge",
            "origins",
            "--strict",
            "--endpoint",
            "https://example.com/valid.json",
            "--fetch-timeout",
            "2s",
        ])
        .expect("origins args should parse");

        match cli.command {
            Command::Origins(args) => {
                assert!(args.strict);
                assert_eq!(
                    args.source.endpoint.as_deref(),
                    Some("https://example.com/valid.json")
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn check_origin_requires_an_origin() {
        let err = Cli::try_parse_from(["hostbridge", "check-origin", "--offline"])
            .expect_err("missing origin should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_negotiate_subcommand() {
        let cli = Cli::try_parse_from(["hostbridge", "negotiate", "content", "web", "1.6.0"])
            .expect("negotiate args should parse");
        assert!(matches!(cli.command, Command::Negotiate(_)));
    }

    #[test]
    fn parses_simulate_subcommand() {
        let cli = Cli::try_parse_from(["hostbridge", "simulate", "--child", "--timeout", "500ms"])
            .expect("simulate args should parse");
        assert!(matches!(cli.command, Command::Simulate(_)));
    }
}
