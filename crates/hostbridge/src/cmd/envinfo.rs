use hostbridge_origin::{DEFAULT_FETCH_TIMEOUT, DEFAULT_ORIGINS_ENDPOINT, FALLBACK_VALID_ORIGINS};
use serde::Serialize;

use crate::cmd::EnvinfoArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{new_table, print_json, OutputFormat};

const ENDPOINT_ENV: &str = "HOSTBRIDGE_ORIGINS_ENDPOINT";

#[derive(Serialize)]
struct BuildFacts {
    version: &'static str,
    target: &'static str,
    features: Vec<&'static str>,
}

#[derive(Serialize)]
struct OriginFacts {
    default_endpoint: &'static str,
    endpoint_override: Option<String>,
    fetch_timeout_ms: u64,
    fallback_entries: usize,
}

#[derive(Serialize)]
struct EnvInfoOutput {
    schema_id: &'static str,
    build: BuildFacts,
    origins: OriginFacts,
}

impl EnvInfoOutput {
    fn collect(endpoint_override: Option<String>) -> Self {
        Self {
            schema_id: "https://schemas.3leaps.dev/hostbridge/cli/v1/envinfo.schema.json",
            build: BuildFacts {
                version: env!("CARGO_PKG_VERSION"),
                target: option_env!("HOSTBRIDGE_BUILD_TARGET").unwrap_or("unknown"),
                features: active_features(),
            },
            origins: OriginFacts {
                default_endpoint: DEFAULT_ORIGINS_ENDPOINT,
                endpoint_override,
                fetch_timeout_ms: u64::try_from(DEFAULT_FETCH_TIMEOUT.as_millis())
                    .unwrap_or(u64::MAX),
                fallback_entries: FALLBACK_VALID_ORIGINS.len(),
            },
        }
    }
}

pub fn run(_args: EnvinfoArgs, format: OutputFormat) -> CliResult<i32> {
    let endpoint_override = std::env::var(ENDPOINT_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty());
    let output = EnvInfoOutput::collect(endpoint_override);

    match format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Table | OutputFormat::Pretty => {
            let mut table = new_table(vec!["SETTING", "VALUE"]);
            for (key, value) in rows(&output) {
                table.add_row(vec![key.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Raw => println!("{}", output.build.version),
    }
    Ok(SUCCESS)
}

fn rows(output: &EnvInfoOutput) -> Vec<(&'static str, String)> {
    let origins = &output.origins;
    vec![
        ("version", output.build.version.to_string()),
        ("target", output.build.target.to_string()),
        ("features", output.build.features.join(", ")),
        ("origins endpoint", origins.default_endpoint.to_string()),
        (
            ENDPOINT_ENV,
            origins
                .endpoint_override
                .clone()
                .unwrap_or_else(|| "(not set)".to_string()),
        ),
        ("fetch timeout", format!("{}ms", origins.fetch_timeout_ms)),
        ("fallback entries", origins.fallback_entries.to_string()),
    ]
}

fn active_features() -> Vec<&'static str> {
    let mut features = Vec::new();
    if cfg!(feature = "fetch") {
        features.push("fetch");
    }
    if cfg!(feature = "cli") {
        features.push("cli");
    }
    features
}
