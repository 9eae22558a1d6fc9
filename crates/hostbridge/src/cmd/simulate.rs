//! In-process host/app session.
//!
//! Wires a [`Session`] to channel-backed host and child windows and plays
//! the host side: answer initialize, fire a host action, answer a request
//! and (optionally) a request relayed from a nested child.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hostbridge_envelope::{classify_from_child, Inbound, InboundRequest, MessageResponse};
use hostbridge_origin::OriginValidator;
use hostbridge_session::{
    EmbeddingContext, InboundMessage, MessageDisposition, Session, SessionConfig, Target,
    INITIALIZE_FUNC,
};
use hostbridge_window::{ChannelWindow, Mailbox, WindowRef};
use serde::Serialize;
use serde_json::{json, Value};

use crate::cmd::{parse_timeout, runtime, SimulateArgs};
use crate::exit::{session_error, CliError, CliResult, DATA_INVALID, INTERNAL, SUCCESS};
use crate::output::{new_table, print_json, OutputFormat};

const SIMULATE_TAG: &str = "v2_cli.simulate";
const CHILD_ACTION: &str = "child.getData";

#[derive(Debug, Serialize)]
struct TranscriptEntry {
    step: usize,
    from: &'static str,
    to: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct SimulateOutput {
    schema_id: &'static str,
    context: String,
    client_type: String,
    client_supported_sdk_version: String,
    api_version: u32,
    capabilities: Vec<String>,
    transcript: Vec<TranscriptEntry>,
}

struct Simulator {
    session: Session,
    host: WindowRef,
    host_origin: String,
    host_box: Mailbox,
    transcript: Vec<TranscriptEntry>,
}

impl Simulator {
    fn record(&mut self, from: &'static str, to: &'static str, message: String) {
        tracing::debug!(from, to, %message, "simulated message");
        self.transcript.push(TranscriptEntry {
            step: self.transcript.len() + 1,
            from,
            to,
            message,
        });
    }

    /// Everything the app has posted to the host since the last call.
    fn host_inbox(&mut self) -> Vec<Value> {
        let mut messages = Vec::new();
        for delivery in self.host_box.drain() {
            self.record("app", "host", describe(&delivery.data));
            messages.push(delivery.data);
        }
        messages
    }

    async fn host_posts(&mut self, data: Value) -> MessageDisposition {
        self.record("host", "app", describe(&data));
        let message = InboundMessage::new(self.host.clone(), self.host_origin.clone(), data);
        let disposition = self.session.handle_message(message).await;
        if let MessageDisposition::Ignored(reason) = disposition {
            tracing::warn!(?reason, origin = %self.host_origin, "app ignored host message");
        }
        disposition
    }

    /// Answer the first request named `func` the host received.
    async fn host_answers(
        &mut self,
        inbox: &[Value],
        func: &str,
        args: Vec<Value>,
        partial: Option<bool>,
    ) -> CliResult<()> {
        let request = find_request(inbox, func).ok_or_else(|| {
            CliError::new(INTERNAL, format!("host never received a {func} request"))
        })?;
        self.host_posts(response_to(&request, args, partial)?).await;
        Ok(())
    }
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_timeout(&args.timeout)?;
    let rt = runtime()?;
    let out = rt.block_on(simulate(&args, timeout))?;
    print_simulation(&out, format);
    Ok(SUCCESS)
}

async fn simulate(args: &SimulateArgs, timeout: Duration) -> CliResult<SimulateOutput> {
    let (app, _app_box) = ChannelWindow::open("app", args.app_origin.clone());
    let (host, host_box) = ChannelWindow::open("host", args.host_origin.clone());

    let context = EmbeddingContext::new(app, args.app_origin.clone()).with_parent(host.clone());
    let config = SessionConfig {
        initialize_timeout: timeout,
        ..SessionConfig::default()
    };
    let mut sim = Simulator {
        session: Session::with_config(context, OriginValidator::offline(), config),
        host,
        host_origin: args.host_origin.clone(),
        host_box,
        transcript: Vec::new(),
    };

    // Parent origin is unknown until the host speaks, so this waits in the queue.
    sim.session
        .notify_parent(SIMULATE_TAG, "appLoaded", vec![json!(args.app_origin)])
        .map_err(|err| session_error("failed to queue appLoaded", err))?;
    let queued = sim.session.queued_len(Target::Parent);
    sim.record("app", "queue", format!("{queued} message(s) held for the parent"));

    let valid_origins = (!args.valid_origins.is_empty()).then_some(args.valid_origins.as_slice());
    let pending = sim
        .session
        .initialize(valid_origins)
        .map_err(|err| session_error("initialize failed", err))?;
    let inbox = sim.host_inbox();
    let runtime_slot = args.runtime.clone().unwrap_or_else(default_runtime);
    sim.host_answers(
        &inbox,
        INITIALIZE_FUNC,
        vec![
            json!(args.context),
            json!(args.client_type),
            Value::String(runtime_slot),
        ],
        None,
    )
    .await?;
    sim.host_inbox();

    let outcome = pending
        .wait()
        .await
        .map_err(|err| session_error("initialize failed", err))?;
    sim.session.complete_initialize(outcome.clone());

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    sim.session
        .register_handler(
            SIMULATE_TAG,
            "themeChange",
            move |theme| {
                counter.fetch_add(1, Ordering::SeqCst);
                tracing::info!(?theme, "themeChange handled");
                None
            },
            true,
            Vec::new(),
        )
        .map_err(|err| session_error("failed to register handler", err))?;
    sim.host_inbox();
    sim.host_posts(json!({ "func": "themeChange", "args": ["dark"] }))
        .await;
    let handled = calls.load(Ordering::SeqCst);
    sim.record("app", "handler", format!("themeChange handled {handled} time(s)"));

    let response = sim
        .session
        .send_message_to_parent(SIMULATE_TAG, "getContext", Vec::new())
        .map_err(|err| session_error("getContext failed", err))?;
    let inbox = sim.host_inbox();
    sim.host_answers(
        &inbox,
        "getContext",
        vec![json!({ "frameContext": args.context, "hostClientType": args.client_type })],
        None,
    )
    .await?;
    let context_args = response
        .await
        .map_err(|err| session_error("getContext failed", err))?;
    tracing::info!(args = ?context_args, "getContext resolved");

    if args.child {
        relay_child_request(&mut sim, &args.app_origin).await?;
    }

    let runtime = &outcome.runtime_config;
    Ok(SimulateOutput {
        schema_id: "https://schemas.3leaps.dev/hostbridge/cli/v1/simulation.schema.json",
        context: outcome.context.clone(),
        client_type: outcome.client_type.clone(),
        client_supported_sdk_version: outcome.client_supported_sdk_version.clone(),
        api_version: runtime.api_version,
        capabilities: runtime.supports.keys().cloned().collect(),
        transcript: sim.transcript,
    })
}

async fn relay_child_request(sim: &mut Simulator, child_origin: &str) -> CliResult<()> {
    let (child, mut child_box) = ChannelWindow::open("child", child_origin.to_string());

    let request = json!({ "id": 0, "func": CHILD_ACTION, "args": ["profile"] });
    sim.record("child", "app", describe(&request));
    let disposition = sim
        .session
        .handle_message(InboundMessage::new(child, child_origin.to_string(), request))
        .await;
    if disposition != MessageDisposition::Child {
        return Err(CliError::new(
            DATA_INVALID,
            format!("child request was not accepted: {disposition:?}"),
        ));
    }

    let inbox = sim.host_inbox();
    sim.host_answers(&inbox, CHILD_ACTION, vec![json!("loading")], Some(true))
        .await?;
    sim.host_answers(&inbox, CHILD_ACTION, vec![json!({ "name": "Contoso" })], None)
        .await?;

    for delivery in child_box.drain() {
        sim.record("app", "child", describe(&delivery.data));
    }
    Ok(())
}

fn default_runtime() -> String {
    json!({
        "apiVersion": 2,
        "supports": {
            "appInstallDialog": {},
            "dialog": { "url": {} },
            "pages": { "config": {}, "tabs": {} },
            "teamsCore": {}
        }
    })
    .to_string()
}

/// Requests the app posted to the host, which sees the app as its child.
fn find_request(messages: &[Value], func: &str) -> Option<InboundRequest> {
    messages.iter().find_map(|data| match classify_from_child(data) {
        Ok(Inbound::Request(request)) if request.func == func => Some(request),
        _ => None,
    })
}

fn response_to(
    request: &InboundRequest,
    args: Vec<Value>,
    partial: Option<bool>,
) -> CliResult<Value> {
    let id = request.id.ok_or_else(|| {
        CliError::new(DATA_INVALID, format!("{} request has no id", request.func))
    })?;
    serde_json::to_value(MessageResponse::new(id, request.uuid, args, partial))
        .map_err(|err| CliError::new(INTERNAL, format!("failed to encode response: {err}")))
}

fn describe(data: &Value) -> String {
    match classify_from_child(data) {
        Ok(Inbound::Request(request)) => {
            let id = request.id.map(|id| format!(" #{id}")).unwrap_or_default();
            let proxied = if data.get("isProxiedFromChild") == Some(&Value::Bool(true)) {
                " (from child)"
            } else {
                ""
            };
            format!(
                "request{id} {}{proxied} args={}",
                request.func,
                Value::Array(request.args)
            )
        }
        Ok(Inbound::Response(response)) => {
            let partial = if response.is_partial() { " (partial)" } else { "" };
            format!(
                "response #{}{partial} args={}",
                response.id,
                Value::Array(response.args)
            )
        }
        Ok(Inbound::Unknown) => data.to_string(),
        Err(err) => format!("<{err}>"),
    }
}

fn print_simulation(out: &SimulateOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["STEP", "FROM", "TO", "MESSAGE"]);
            for entry in &out.transcript {
                table.add_row(vec![
                    entry.step.to_string(),
                    entry.from.to_string(),
                    entry.to.to_string(),
                    entry.message.clone(),
                ]);
            }
            println!("{table}");
            println!(
                "negotiated: context={} client_type={} api_version={} capabilities={}",
                out.context,
                out.client_type,
                out.api_version,
                out.capabilities.len()
            );
        }
        OutputFormat::Pretty => {
            for entry in &out.transcript {
                println!(
                    "[{:>2}] {:>5} -> {:<7} {}",
                    entry.step, entry.from, entry.to, entry.message
                );
            }
        }
        OutputFormat::Raw => {
            for entry in &out.transcript {
                println!("{}", entry.message);
            }
        }
    }
}
