//! Request ids and pending-response bookkeeping.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use hostbridge_envelope::{MessageId, MessageRequest, MessageResponse};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::error::{Result, SessionError};
use crate::relay::RelayRecord;

/// Legacy callback: `(args, is_partial_response)`.
pub type Callback = Box<dyn FnMut(Vec<Value>, bool) + Send>;

/// Observer for request round-trip times.
pub type LatencyObserver = Arc<dyn Fn(&LatencySample) + Send + Sync>;

/// How to deliver the answer(s) to one request.
pub enum PendingCallback {
    /// Called for every response until the terminal one.
    Callback(Callback),
    /// Resolved by the first response. Emptied once used.
    Resolver(Option<oneshot::Sender<Vec<Value>>>),
    /// Fed every partial response and the terminal one.
    Stream(mpsc::UnboundedSender<PartialResponse>),
    /// Answers are routed to a child window.
    Relay(RelayRecord),
}

impl fmt::Debug for PendingCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingCallback::Callback(_) => f.write_str("Callback"),
            PendingCallback::Resolver(sender) => f
                .debug_tuple("Resolver")
                .field(&sender.as_ref().map(|_| "waiting"))
                .finish(),
            PendingCallback::Stream(_) => f.write_str("Stream"),
            PendingCallback::Relay(record) => f.debug_tuple("Relay").field(record).finish(),
        }
    }
}

/// One round-trip measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencySample {
    pub id: MessageId,
    pub uuid: Uuid,
    pub func: String,
    pub elapsed: Duration,
}

/// What the session must still do with a response.
#[derive(Debug)]
pub enum Dispatch {
    /// Delivered to a local waiter.
    Delivered,
    /// Forward to the child recorded at relay time.
    Relay(RelayRecord, MessageResponse),
    /// No request with this id is pending.
    Unknown,
}

struct PendingEntry {
    func: String,
    uuid: Uuid,
    sent_at: Instant,
    callback: PendingCallback,
}

/// Allocates request ids and routes responses to their waiters.
pub struct Correlator {
    next_id: MessageId,
    pending: HashMap<MessageId, PendingEntry>,
    latency_observer: Option<LatencyObserver>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            pending: HashMap::new(),
            latency_observer: None,
        }
    }

    /// Build the next request. Ids start at 0 and increase by one.
    pub fn next_request(
        &mut self,
        api_version_tag: &str,
        func: &str,
        args: Vec<Value>,
    ) -> MessageRequest {
        let id = self.next_id;
        self.next_id += 1;
        MessageRequest::new(id, Uuid::new_v4(), func, args, api_version_tag)
    }

    /// Wait for responses to `request`.
    pub fn register(&mut self, request: &MessageRequest, callback: PendingCallback) {
        self.pending.insert(
            request.id,
            PendingEntry {
                func: request.func.clone(),
                uuid: request.uuid,
                sent_at: Instant::now(),
                callback,
            },
        );
    }

    /// Stop waiting for `id`.
    pub fn forget(&mut self, id: MessageId) -> bool {
        self.pending.remove(&id).is_some()
    }

    pub fn is_pending(&self, id: MessageId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn set_latency_observer(&mut self, observer: LatencyObserver) {
        self.latency_observer = Some(observer);
    }

    /// Route a response to whoever waits for its id.
    ///
    /// The entry stays registered across partial responses and is removed
    /// by the terminal one.
    pub fn on_response(&mut self, response: MessageResponse) -> Dispatch {
        let id = response.id;
        let partial = response.is_partial();
        let Some(entry) = self.pending.get_mut(&id) else {
            tracing::debug!(id, "response for unknown message id dropped");
            return Dispatch::Unknown;
        };

        if response.uuid.is_some() {
            let sample = LatencySample {
                id,
                uuid: entry.uuid,
                func: entry.func.clone(),
                elapsed: entry.sent_at.elapsed(),
            };
            tracing::debug!(
                id = sample.id,
                uuid = %sample.uuid,
                func = %sample.func,
                elapsed_ms = sample.elapsed.as_millis() as u64,
                "response latency"
            );
            if let Some(observer) = &self.latency_observer {
                observer(&sample);
            }
        }

        tracing::debug!(id, partial, "dispatching response");
        let dispatch = match &mut entry.callback {
            PendingCallback::Callback(callback) => {
                callback(response.args, partial);
                Dispatch::Delivered
            }
            PendingCallback::Resolver(sender) => {
                if let Some(sender) = sender.take() {
                    // Receiver may be gone if the caller stopped waiting.
                    let _ = sender.send(response.args);
                }
                Dispatch::Delivered
            }
            PendingCallback::Stream(sender) => {
                let _ = sender.send(PartialResponse {
                    args: response.args,
                    is_partial: partial,
                });
                Dispatch::Delivered
            }
            PendingCallback::Relay(record) => Dispatch::Relay(record.clone(), response),
        };

        if !partial {
            self.pending.remove(&id);
        }
        dispatch
    }

    /// Drop every pending entry and restart ids at 0.
    ///
    /// Outstanding futures and streams observe the session closing.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.next_id = 0;
    }
}

/// One response delivered to a streaming request.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialResponse {
    pub args: Vec<Value>,
    /// False for the terminal response.
    pub is_partial: bool,
}

/// Future of a request's first response.
#[derive(Debug)]
pub struct ResponseFuture {
    id: MessageId,
    rx: oneshot::Receiver<Vec<Value>>,
}

impl ResponseFuture {
    pub(crate) fn new(id: MessageId, rx: oneshot::Receiver<Vec<Value>>) -> Self {
        Self { id, rx }
    }

    /// Id of the request this future waits for.
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// First response argument, or `null`.
    pub async fn unwrap(self) -> Result<Value> {
        let args = self.await?;
        Ok(args.into_iter().next().unwrap_or(Value::Null))
    }

    /// Interpret a `[status, reason]` answer.
    ///
    /// A falsy status fails with the reason, or `default_error` when the
    /// host gave none.
    pub async fn status_and_reason(self, default_error: &str) -> Result<()> {
        let args = self.await?;
        let mut args = args.into_iter();
        let status = args.next().unwrap_or(Value::Null);
        if is_truthy(&status) {
            return Ok(());
        }
        let reason = match args.next() {
            Some(Value::String(reason)) if !reason.is_empty() => reason,
            _ => default_error.to_string(),
        };
        Err(SessionError::HostFailure(reason))
    }

    /// Interpret an `[error, result]` answer.
    pub async fn sdk_error<T: DeserializeOwned>(self) -> Result<T> {
        let args = self.await?;
        let mut args = args.into_iter();
        let error = args.next().unwrap_or(Value::Null);
        if is_truthy(&error) {
            return Err(host_error(error));
        }
        let result = args.next().unwrap_or(Value::Null);
        Ok(serde_json::from_value(result)?)
    }
}

impl Future for ResponseFuture {
    type Output = Result<Vec<Value>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| SessionError::SessionClosed))
    }
}

/// Every response to a streaming request, terminal one last.
#[derive(Debug)]
pub struct PartialResponses {
    id: MessageId,
    rx: mpsc::UnboundedReceiver<PartialResponse>,
}

impl PartialResponses {
    pub(crate) fn new(id: MessageId, rx: mpsc::UnboundedReceiver<PartialResponse>) -> Self {
        Self { id, rx }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Next response. `None` after the terminal response or teardown.
    pub async fn next(&mut self) -> Option<PartialResponse> {
        self.rx.recv().await
    }
}

impl futures_core::Stream for PartialResponses {
    type Item = PartialResponse;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SdkError {
    error_code: i64,
    #[serde(default)]
    message: Option<String>,
}

fn host_error(error: Value) -> SessionError {
    match serde_json::from_value::<SdkError>(error.clone()) {
        Ok(sdk) => SessionError::HostError {
            code: sdk.error_code,
            message: sdk.message.unwrap_or_default(),
        },
        Err(_) => SessionError::HostFailure(error.to_string()),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    fn response(id: MessageId, args: Vec<Value>, partial: Option<bool>) -> MessageResponse {
        MessageResponse::new(id, None, args, partial)
    }

    #[test]
    fn ids_are_monotonic_from_zero() {
        let mut correlator = Correlator::new();
        let ids: Vec<_> = (0..4)
            .map(|_| correlator.next_request("v2_foo", "foo", vec![]).id)
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);

        let a = correlator.next_request("v2_foo", "foo", vec![]);
        let b = correlator.next_request("v2_foo", "foo", vec![]);
        assert_ne!(a.uuid, b.uuid);
    }

    #[test]
    fn callback_sees_every_partial_then_terminal() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&calls);
        let mut correlator = Correlator::new();
        let request = correlator.next_request("v2_foo", "foo", vec![]);
        correlator.register(
            &request,
            PendingCallback::Callback(Box::new(move |args, partial| {
                seen.lock().unwrap().push((args, partial));
            })),
        );

        for n in 0..3 {
            correlator.on_response(response(request.id, vec![json!(n)], Some(true)));
            assert!(correlator.is_pending(request.id));
        }
        correlator.on_response(response(request.id, vec![json!("done")], None));

        assert!(!correlator.is_pending(request.id));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 4);
        assert!(calls[..3].iter().all(|(_, partial)| *partial));
        assert_eq!(calls[3], (vec![json!("done")], false));
    }

    #[test]
    fn unknown_id_is_dropped() {
        let mut correlator = Correlator::new();
        assert!(matches!(
            correlator.on_response(response(99, vec![], None)),
            Dispatch::Unknown
        ));
    }

    #[tokio::test]
    async fn resolver_takes_first_response() {
        let mut correlator = Correlator::new();
        let request = correlator.next_request("v2_foo", "foo", vec![]);
        let (tx, rx) = oneshot::channel();
        correlator.register(&request, PendingCallback::Resolver(Some(tx)));

        correlator.on_response(response(request.id, vec![json!(1)], Some(true)));
        assert!(correlator.is_pending(request.id));
        correlator.on_response(response(request.id, vec![json!(2)], None));
        assert!(!correlator.is_pending(request.id));

        let args = ResponseFuture::new(request.id, rx).await.unwrap();
        assert_eq!(args, vec![json!(1)]);
    }

    #[tokio::test]
    async fn stream_ends_after_terminal() {
        let mut correlator = Correlator::new();
        let request = correlator.next_request("v2_foo", "foo", vec![]);
        let (tx, rx) = mpsc::unbounded_channel();
        correlator.register(&request, PendingCallback::Stream(tx));
        let mut stream = PartialResponses::new(request.id, rx);

        correlator.on_response(response(request.id, vec![json!("a")], Some(true)));
        correlator.on_response(response(request.id, vec![json!("b")], Some(false)));

        assert_eq!(stream.next().await.unwrap().args, vec![json!("a")]);
        let last = stream.next().await.unwrap();
        assert!(!last.is_partial);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn reset_closes_waiters() {
        let mut correlator = Correlator::new();
        let request = correlator.next_request("v2_foo", "foo", vec![]);
        let (tx, rx) = oneshot::channel();
        correlator.register(&request, PendingCallback::Resolver(Some(tx)));

        correlator.reset();

        assert!(matches!(
            ResponseFuture::new(request.id, rx).await,
            Err(SessionError::SessionClosed)
        ));
        assert_eq!(correlator.next_request("v2_foo", "foo", vec![]).id, 0);
    }

    #[test]
    fn latency_reported_when_uuid_present() {
        let samples = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&samples);
        let mut correlator = Correlator::new();
        correlator.set_latency_observer(Arc::new(move |sample: &LatencySample| {
            sink.lock().unwrap().push(sample.clone());
        }));

        let first = correlator.next_request("v2_foo", "foo", vec![]);
        correlator.register(&first, PendingCallback::Callback(Box::new(|_, _| {})));
        correlator.on_response(response(first.id, vec![], None));

        let second = correlator.next_request("v2_foo", "bar", vec![]);
        correlator.register(&second, PendingCallback::Callback(Box::new(|_, _| {})));
        correlator.on_response(MessageResponse::new(second.id, Some(second.uuid), vec![], None));

        let samples = samples.lock().unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].func, "bar");
        assert_eq!(samples[0].uuid, second.uuid);
    }

    fn resolved(args: Vec<Value>) -> ResponseFuture {
        let (tx, rx) = oneshot::channel();
        tx.send(args).unwrap();
        ResponseFuture::new(0, rx)
    }

    #[tokio::test]
    async fn unwrap_returns_first_arg() {
        assert_eq!(resolved(vec![json!("x"), json!("y")]).unwrap().await.unwrap(), json!("x"));
        assert_eq!(resolved(vec![]).unwrap().await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn status_and_reason_maps_failures() {
        assert!(resolved(vec![json!(true)]).status_and_reason("default").await.is_ok());

        let err = resolved(vec![json!(false), json!("denied")])
            .status_and_reason("default")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::HostFailure(reason) if reason == "denied"));

        let err = resolved(vec![json!(false)])
            .status_and_reason("default")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::HostFailure(reason) if reason == "default"));
    }

    #[tokio::test]
    async fn sdk_error_maps_error_objects() {
        let value: String = resolved(vec![Value::Null, json!("ok")]).sdk_error().await.unwrap();
        assert_eq!(value, "ok");

        let err = resolved(vec![json!({"errorCode": 100, "message": "not supported"})])
            .sdk_error::<Value>()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::HostError { code: 100, ref message } if message == "not supported"
        ));
    }
}
