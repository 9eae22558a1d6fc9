use hostbridge_origin::host_of;
use serde::Serialize;
use url::Url;

use crate::cmd::{runtime, CheckOriginArgs};
use crate::exit::{CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{new_table, print_json, OutputFormat};

#[derive(Serialize)]
struct OriginVerdict {
    origin: String,
    host: Option<String>,
    valid: bool,
}

#[derive(Serialize)]
struct CheckOriginOutput {
    schema_id: &'static str,
    offline: bool,
    additional_origins: Vec<String>,
    results: Vec<OriginVerdict>,
    all_valid: bool,
}

pub fn run(args: CheckOriginArgs, format: OutputFormat) -> CliResult<i32> {
    let urls = args
        .origins
        .iter()
        .map(String::as_str)
        .map(parse_origin)
        .collect::<CliResult<Vec<_>>>()?;

    let mut validator = args.source.validator()?;
    validator.set_additional_origins(&args.additional);

    let rt = runtime()?;
    let results: Vec<OriginVerdict> = rt.block_on(async {
        let mut results = Vec::with_capacity(urls.len());
        for url in &urls {
            results.push(OriginVerdict {
                origin: url.origin().ascii_serialization(),
                host: host_of(url),
                valid: validator.is_valid_origin(url).await,
            });
        }
        results
    });

    let all_valid = results.iter().all(|verdict| verdict.valid);
    let out = CheckOriginOutput {
        schema_id: "https://schemas.3leaps.dev/hostbridge/cli/v1/origin-check.schema.json",
        offline: args.source.offline,
        additional_origins: validator.additional_origins().to_vec(),
        results,
        all_valid,
    };
    print_check(&out, format);

    Ok(if all_valid { SUCCESS } else { FAILURE })
}

fn parse_origin(input: &str) -> CliResult<Url> {
    Url::parse(input.trim())
        .map_err(|err| CliError::new(USAGE, format!("invalid origin '{input}': {err}")))
}

fn print_check(out: &CheckOriginOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["ORIGIN", "HOST", "TRUSTED"]);
            for verdict in &out.results {
                table.add_row(vec![
                    verdict.origin.clone(),
                    verdict.host.clone().unwrap_or_else(|| "-".to_string()),
                    verdict_label(verdict.valid).to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for verdict in &out.results {
                println!("{} {}", verdict_label(verdict.valid), verdict.origin);
            }
        }
        OutputFormat::Raw => {
            for verdict in &out.results {
                println!("{}", verdict.valid);
            }
        }
    }
}

fn verdict_label(valid: bool) -> &'static str {
    if valid {
        "trusted"
    } else {
        "rejected"
    }
}
