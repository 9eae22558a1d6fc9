use hostbridge_origin::fallback::fallback_list;
use hostbridge_origin::OriginError;
use serde::Serialize;

use crate::cmd::{runtime, OriginsArgs, ResolvedSource};
use crate::exit::{origin_error, CliResult, SUCCESS};
use crate::output::{new_table, print_json, OutputFormat};

#[derive(Serialize)]
struct OriginsOutput {
    schema_id: &'static str,
    source: &'static str,
    endpoint: Option<String>,
    count: usize,
    origins: Vec<String>,
}

pub fn run(args: OriginsArgs, format: OutputFormat) -> CliResult<i32> {
    let resolved = args.source.resolve()?;

    let (source, origins) = if resolved.offline {
        ("fallback", fallback_list())
    } else {
        match fetch(&resolved)? {
            Ok(origins) => ("endpoint", origins),
            Err(err) if args.strict => {
                return Err(origin_error("failed to resolve allow-list", err));
            }
            Err(err) => {
                tracing::warn!(error = %err, "using fallback allow-list");
                ("fallback", fallback_list())
            }
        }
    };

    let out = OriginsOutput {
        schema_id: "https://schemas.3leaps.dev/hostbridge/cli/v1/origins.schema.json",
        source,
        endpoint: (!resolved.offline).then(|| resolved.config.endpoint.clone()),
        count: origins.len(),
        origins,
    };
    print_origins(&out, format);
    Ok(SUCCESS)
}

fn fetch(resolved: &ResolvedSource) -> CliResult<Result<Vec<String>, OriginError>> {
    let timeout = resolved.config.fetch_timeout;
    let rt = runtime()?;
    Ok(rt.block_on(async {
        match tokio::time::timeout(timeout, resolved.source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(OriginError::Timeout(timeout)),
        }
    }))
}

fn print_origins(out: &OriginsOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["#", "HOST PATTERN"]);
            for (index, origin) in out.origins.iter().enumerate() {
                table.add_row(vec![(index + 1).to_string(), origin.clone()]);
            }
            println!("{table}");
            println!("source: {} ({} entries)", out.source, out.count);
        }
        OutputFormat::Pretty => {
            println!("allow-list ({}, {} entries)\n", out.source, out.count);
            for origin in &out.origins {
                println!("  {origin}");
            }
        }
        OutputFormat::Raw => {
            for origin in &out.origins {
                println!("{origin}");
            }
        }
    }
}
