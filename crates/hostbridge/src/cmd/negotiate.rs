use hostbridge_session::{negotiate, InitializeOutcome};
use serde::Serialize;
use serde_json::Value;

use crate::cmd::NegotiateArgs;
use crate::exit::{negotiation_error, CliResult, SUCCESS};
use crate::output::{new_table, print_json, OutputFormat};

#[derive(Serialize)]
pub struct NegotiationOutput {
    pub schema_id: &'static str,
    pub context: String,
    pub client_type: String,
    pub client_supported_sdk_version: String,
    pub api_version: u32,
    pub is_legacy_teams: bool,
    pub capabilities: Vec<String>,
    pub runtime_config: Value,
}

impl NegotiationOutput {
    pub fn from_outcome(outcome: &InitializeOutcome) -> Self {
        let runtime = &outcome.runtime_config;
        Self {
            schema_id: "https://schemas.3leaps.dev/hostbridge/cli/v1/negotiation.schema.json",
            context: outcome.context.clone(),
            client_type: outcome.client_type.clone(),
            client_supported_sdk_version: outcome.client_supported_sdk_version.clone(),
            api_version: runtime.api_version,
            is_legacy_teams: runtime.is_legacy_teams,
            capabilities: runtime.supports.keys().cloned().collect(),
            runtime_config: serde_json::to_value(runtime).unwrap_or(Value::Null),
        }
    }
}

pub fn run(args: NegotiateArgs, format: OutputFormat) -> CliResult<i32> {
    let outcome = negotiate(&response_args(&args))
        .map_err(|err| negotiation_error("negotiation failed", err))?;

    print_negotiation(&NegotiationOutput::from_outcome(&outcome), format);
    Ok(SUCCESS)
}

/// Arguments as a host would post them: every slot is a string.
fn response_args(args: &NegotiateArgs) -> Vec<Value> {
    [
        Some(&args.context),
        Some(&args.client_type),
        args.runtime.as_ref(),
        args.runtime_fallback.as_ref(),
    ]
    .into_iter()
    .flatten()
    .map(|slot| Value::String(slot.clone()))
    .collect()
}

pub fn print_negotiation(out: &NegotiationOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["FIELD", "VALUE"]);
            table
                .add_row(vec!["context", out.context.as_str()])
                .add_row(vec!["client type", out.client_type.as_str()])
                .add_row(vec![
                    "client sdk version",
                    out.client_supported_sdk_version.as_str(),
                ])
                .add_row(vec!["api version".to_string(), out.api_version.to_string()])
                .add_row(vec![
                    "legacy teams".to_string(),
                    out.is_legacy_teams.to_string(),
                ])
                .add_row(vec!["capabilities".to_string(), out.capabilities.join(", ")]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "context={} client_type={} sdk={} api_version={}",
                out.context, out.client_type, out.client_supported_sdk_version, out.api_version
            );
            println!("capabilities: {}", out.capabilities.join(", "));
        }
        OutputFormat::Raw => println!(
            "{}",
            serde_json::to_string(&out.runtime_config).unwrap_or_else(|_| "{}".to_string())
        ),
    }
}
