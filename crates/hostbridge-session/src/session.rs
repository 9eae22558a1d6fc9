use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use hostbridge_envelope::{
    classify, classify_from_child, decode_inbound, encode, CodecConfig, Inbound, InboundRequest,
    MessageEvent, MessageId, MessageRequest, MessageResponse, Outbound,
};
use hostbridge_origin::OriginValidator;
use hostbridge_window::{NativeInterface, WindowRef, ANY_ORIGIN};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::correlator::{
    Callback, Correlator, Dispatch, LatencyObserver, PartialResponses, PendingCallback,
    ResponseFuture,
};
use crate::error::{Result, SessionError};
use crate::handlers::{Handler, HandlerRegistry};
use crate::handshake::{negotiate, InitializeOutcome, INITIALIZE_FUNC};
use crate::queue::{OutboundQueues, Target};
use crate::relay::{handler_result_args, RelayRecord, RELAY_API_VERSION_TAG};
use crate::relationship::Relationships;
use crate::runtime::RuntimeConfig;

/// Action sent to the host when a handler is registered.
pub const REGISTER_HANDLER_FUNC: &str = "registerHandler";

/// Telemetry tag of the initialize request.
pub const INITIALIZE_API_VERSION_TAG: &str = "v2_app.initialize";

/// Session tuning knobs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound for the initialize round trip.
    pub initialize_timeout: Duration,
    /// Version reported to the host in the initialize request.
    pub library_version: String,
    /// Limits for payloads crossing the native bridge.
    pub codec: CodecConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initialize_timeout: Duration::from_secs(60),
            library_version: env!("CARGO_PKG_VERSION").to_string(),
            codec: CodecConfig::default(),
        }
    }
}

/// The browsing context a session runs in.
#[derive(Clone)]
pub struct EmbeddingContext {
    /// Our own window. Messages from it are echoes and are ignored.
    pub current_window: WindowRef,
    /// Our own origin. Messages from it skip allow-list validation.
    pub current_origin: String,
    /// Embedding window (frame parent or opener), if any.
    pub parent: Option<WindowRef>,
    /// Native bridge of a frameless host, if any.
    pub native: Option<Arc<dyn NativeInterface>>,
}

impl EmbeddingContext {
    pub fn new(current_window: WindowRef, current_origin: impl Into<String>) -> Self {
        Self {
            current_window,
            current_origin: current_origin.into(),
            parent: None,
            native: None,
        }
    }

    pub fn with_parent(mut self, parent: WindowRef) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_native(mut self, native: Arc<dyn NativeInterface>) -> Self {
        self.native = Some(native);
        self
    }
}

impl fmt::Debug for EmbeddingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingContext")
            .field("current_window", &self.current_window)
            .field("current_origin", &self.current_origin)
            .field("parent", &self.parent)
            .field("native", &self.native.as_ref().map(|_| "<native bridge>"))
            .finish()
    }
}

/// A message posted to our window by another window.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub source: WindowRef,
    pub origin: String,
    pub data: Value,
}

impl InboundMessage {
    pub fn new(source: WindowRef, origin: impl Into<String>, data: Value) -> Self {
        Self {
            source,
            origin: origin.into(),
            data,
        }
    }
}

/// Why an inbound message was not acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Body is not a JSON object.
    NotAnObject,
    /// Sent by our own window.
    SelfEcho,
    /// Origin failed validation.
    UntrustedOrigin,
    /// Sender holds neither the parent nor the child slot.
    UnknownSender,
}

/// What became of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDisposition {
    Parent,
    Child,
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitState {
    NotStarted,
    Pending,
    Completed,
}

/// The pending initialize round trip.
///
/// Resolves to the negotiated outcome, to
/// [`SessionError::InitializationTimeout`] once the deadline passes, or to
/// the negotiation failure.
#[derive(Debug)]
pub struct PendingInitialize {
    response: ResponseFuture,
    deadline: tokio::time::Instant,
    timeout: Duration,
}

impl PendingInitialize {
    /// Id of the initialize request.
    pub fn id(&self) -> MessageId {
        self.response.id()
    }

    /// Wait for the host's answer and negotiate the runtime.
    pub async fn wait(self) -> Result<InitializeOutcome> {
        let args = tokio::time::timeout_at(self.deadline, self.response)
            .await
            .map_err(|_| SessionError::InitializationTimeout(self.timeout))??;
        Ok(negotiate(&args)?)
    }
}

/// Messaging state of one embedded context.
///
/// Owns the parent/child bindings, the outbound queues, pending requests,
/// handlers and the origin validator. All mutation goes through `&mut self`
/// from a single task; futures returned by the send methods hold no borrow.
pub struct Session {
    config: SessionConfig,
    context: EmbeddingContext,
    frameless: bool,
    state: InitState,
    relationships: Relationships,
    queues: OutboundQueues,
    correlator: Correlator,
    handlers: HandlerRegistry,
    validator: OriginValidator,
    outcome: Option<InitializeOutcome>,
}

impl Session {
    pub fn new(context: EmbeddingContext, validator: OriginValidator) -> Self {
        Self::with_config(context, validator, SessionConfig::default())
    }

    pub fn with_config(
        context: EmbeddingContext,
        validator: OriginValidator,
        config: SessionConfig,
    ) -> Self {
        Self {
            config,
            context,
            frameless: false,
            state: InitState::NotStarted,
            relationships: Relationships::new(),
            queues: OutboundQueues::new(),
            correlator: Correlator::new(),
            handlers: HandlerRegistry::new(),
            validator,
            outcome: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether the host talks through the native bridge.
    pub fn is_frameless(&self) -> bool {
        self.frameless
    }

    /// Whether [`Session::complete_initialize`] has run.
    pub fn is_initialized(&self) -> bool {
        self.state == InitState::Completed
    }

    /// Negotiated runtime, once initialization completed.
    pub fn runtime_config(&self) -> Option<&RuntimeConfig> {
        self.outcome.as_ref().map(|outcome| &outcome.runtime_config)
    }

    /// Full initialize outcome, once initialization completed.
    pub fn initialize_outcome(&self) -> Option<&InitializeOutcome> {
        self.outcome.as_ref()
    }

    pub fn parent_origin(&self) -> Option<&str> {
        self.relationships.binding(Target::Parent).origin()
    }

    pub fn child_origin(&self) -> Option<&str> {
        self.relationships.binding(Target::Child).origin()
    }

    /// Messages waiting for `target` to become reachable.
    pub fn queued_len(&self, target: Target) -> usize {
        self.queues.len(target)
    }

    /// Wait until nothing is queued for `target`.
    ///
    /// The returned future holds no borrow of the session; the queue drains
    /// as [`Session::handle_message`] binds the target. Fails with
    /// [`SessionError::QueueTimeout`] once `timeout` passes and with
    /// [`SessionError::SessionClosed`] if the session is dropped first.
    pub fn wait_for_queue(
        &self,
        target: Target,
        timeout: Duration,
    ) -> impl Future<Output = Result<()>> + 'static {
        let mut depth = self.queues.watch_depth(target);
        async move {
            let drained = async { depth.wait_for(|len| *len == 0).await.map(|_| ()) };
            match tokio::time::timeout(timeout, drained).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(_)) => Err(SessionError::SessionClosed),
                Err(_) => Err(SessionError::QueueTimeout { target, timeout }),
            }
        }
    }

    pub fn validator(&self) -> &OriginValidator {
        &self.validator
    }

    pub fn validator_mut(&mut self) -> &mut OriginValidator {
        &mut self.validator
    }

    pub fn set_latency_observer(&mut self, observer: LatencyObserver) {
        self.correlator.set_latency_observer(observer);
    }

    /// Start the initialize handshake.
    ///
    /// Posts `initialize` with `[library_version]` to the parent with the
    /// wildcard origin, or through the native bridge when there is no
    /// parent. `valid_origins` extends the origin allow-list.
    pub fn initialize(&mut self, valid_origins: Option<&[String]>) -> Result<PendingInitialize> {
        if self.state != InitState::NotStarted {
            return Err(SessionError::AlreadyInitialized);
        }

        let parent = self.context.parent.clone();
        match (&parent, &self.context.native) {
            (Some(parent), _) => {
                self.frameless = false;
                self.relationships.expect_parent(parent.clone());
            }
            (None, Some(_)) => self.frameless = true,
            (None, None) => return Err(SessionError::NoParentWindow),
        }

        if let Some(origins) = valid_origins {
            self.validator.set_additional_origins(origins);
        }

        let request = self.correlator.next_request(
            INITIALIZE_API_VERSION_TAG,
            INITIALIZE_FUNC,
            vec![Value::String(self.config.library_version.clone())],
        );
        let (tx, rx) = oneshot::channel();
        self.correlator
            .register(&request, PendingCallback::Resolver(Some(tx)));

        let posted = match &parent {
            Some(parent) if !self.frameless => {
                let value = serde_json::to_value(&request)?;
                parent.post_message(&value, ANY_ORIGIN).map_err(SessionError::from)
            }
            _ => self.post_native(&request),
        };
        if let Err(err) = posted {
            self.correlator.forget(request.id);
            return Err(err);
        }

        tracing::info!(
            id = request.id,
            frameless = self.frameless,
            version = %self.config.library_version,
            "initialize sent"
        );
        self.state = InitState::Pending;

        Ok(PendingInitialize {
            response: ResponseFuture::new(request.id, rx),
            deadline: tokio::time::Instant::now() + self.config.initialize_timeout,
            timeout: self.config.initialize_timeout,
        })
    }

    /// Store the negotiated outcome and mark the session initialized.
    pub fn complete_initialize(&mut self, outcome: InitializeOutcome) {
        tracing::info!(
            context = %outcome.context,
            client_type = %outcome.client_type,
            api_version = outcome.runtime_config.api_version,
            client_supported_sdk_version = %outcome.client_supported_sdk_version,
            "initialization completed"
        );
        self.outcome = Some(outcome);
        self.state = InitState::Completed;
    }

    /// Tear the session down.
    ///
    /// Clears bindings, queues, pending requests, handlers and the origin
    /// cache. Outstanding futures fail with [`SessionError::SessionClosed`].
    pub fn uninitialize(&mut self) {
        tracing::debug!(
            pending = self.correlator.pending_len(),
            queued_parent = self.queues.len(Target::Parent),
            queued_child = self.queues.len(Target::Child),
            "uninitializing session"
        );
        self.relationships.clear();
        self.queues.clear();
        self.correlator.reset();
        self.handlers.clear();
        self.validator.reset();
        self.outcome = None;
        self.frameless = false;
        self.state = InitState::NotStarted;
    }

    /// Send a request to the parent and get a future of its first answer.
    pub fn send_message_to_parent(
        &mut self,
        api_version_tag: &str,
        func: &str,
        args: Vec<Value>,
    ) -> Result<ResponseFuture> {
        let (tx, rx) = oneshot::channel();
        let request = self.send_request(
            api_version_tag,
            func,
            args,
            Some(PendingCallback::Resolver(Some(tx))),
            false,
        )?;
        Ok(ResponseFuture::new(request.id, rx))
    }

    /// Send a request to the parent; `callback` gets every answer with its
    /// partial flag.
    pub fn send_message_to_parent_with_callback(
        &mut self,
        api_version_tag: &str,
        func: &str,
        args: Vec<Value>,
        callback: impl FnMut(Vec<Value>, bool) + Send + 'static,
    ) -> Result<MessageId> {
        let callback: Callback = Box::new(callback);
        let request = self.send_request(
            api_version_tag,
            func,
            args,
            Some(PendingCallback::Callback(callback)),
            false,
        )?;
        Ok(request.id)
    }

    /// Send a request to the parent and stream every answer.
    pub fn send_streaming(
        &mut self,
        api_version_tag: &str,
        func: &str,
        args: Vec<Value>,
    ) -> Result<PartialResponses> {
        let (tx, rx) = mpsc::unbounded_channel();
        let request = self.send_request(
            api_version_tag,
            func,
            args,
            Some(PendingCallback::Stream(tx)),
            false,
        )?;
        Ok(PartialResponses::new(request.id, rx))
    }

    /// Send a request to the parent without waiting for an answer.
    pub fn notify_parent(
        &mut self,
        api_version_tag: &str,
        func: &str,
        args: Vec<Value>,
    ) -> Result<MessageId> {
        Ok(self.send_request(api_version_tag, func, args, None, false)?.id)
    }

    /// Send an id-less event to the child, queueing it until the child is
    /// reachable.
    pub fn send_event_to_child(&mut self, func: &str, args: Vec<Value>) -> Result<()> {
        let event = Outbound::Event(MessageEvent::new(func, args));
        self.transmit(Target::Child, event)
    }

    /// Register the primary handler for `name`.
    ///
    /// With `notify_host`, tells the parent through `registerHandler` with
    /// `[name, ...extra_args]`.
    pub fn register_handler(
        &mut self,
        api_version_tag: &str,
        name: &str,
        handler: impl FnMut(&[Value]) -> Option<Value> + Send + 'static,
        notify_host: bool,
        extra_args: Vec<Value>,
    ) -> Result<()> {
        self.handlers.set_primary(name, Box::new(handler));
        if notify_host {
            let mut args = Vec::with_capacity(extra_args.len() + 1);
            args.push(Value::String(name.to_string()));
            args.extend(extra_args);
            self.send_request(api_version_tag, REGISTER_HANDLER_FUNC, args, None, false)?;
        }
        Ok(())
    }

    pub fn remove_handler(&mut self, name: &str) {
        self.handlers.remove(name);
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains(name)
    }

    /// Chain a plugin handler behind the handler for `name`.
    pub fn add_plugin_handler(&mut self, plugin: &str, name: &str, handler: Handler) {
        self.handlers.add_plugin(plugin, name, handler);
    }

    /// Remove every handler `plugin` chained.
    pub fn remove_plugin(&mut self, plugin: &str) {
        self.handlers.remove_plugin(plugin);
    }

    /// Invoke the handlers for `name` directly.
    pub fn call_handler(&mut self, name: &str, args: &[Value]) -> (bool, Option<Value>) {
        self.handlers.call(name, args)
    }

    /// Resolve the origin allow-list ahead of the first message.
    pub async fn prefetch_origins(&self) {
        self.validator.prefetch().await;
    }

    /// Process a message posted to our window.
    ///
    /// Untrusted, malformed and unattributable messages are dropped; this
    /// never fails.
    pub async fn handle_message(&mut self, message: InboundMessage) -> MessageDisposition {
        if !message.data.is_object() {
            return MessageDisposition::Ignored(IgnoreReason::NotAnObject);
        }
        if let Some(reason) = self.reject_source(&message.source, &message.origin).await {
            return MessageDisposition::Ignored(reason);
        }

        let role = self
            .relationships
            .observe(&message.source, &message.origin, self.frameless);
        self.flush_all();

        match role {
            Some(Target::Parent) => {
                self.handle_parent_message(&message.data);
                MessageDisposition::Parent
            }
            Some(Target::Child) => {
                self.handle_child_message(&message.source, &message.data);
                MessageDisposition::Child
            }
            None => {
                tracing::debug!(
                    source = message.source.label(),
                    origin = %message.origin,
                    "message from a window that is neither parent nor child"
                );
                MessageDisposition::Ignored(IgnoreReason::UnknownSender)
            }
        }
    }

    /// Process a payload delivered by the native bridge.
    ///
    /// Native messages come from the host itself and skip origin checks.
    pub fn handle_native_message(&mut self, payload: &[u8]) -> Result<MessageDisposition> {
        let inbound = decode_inbound(payload, &self.config.codec)?;
        self.dispatch_parent(inbound);
        Ok(MessageDisposition::Parent)
    }

    async fn reject_source(&self, source: &WindowRef, origin: &str) -> Option<IgnoreReason> {
        if source.same_window(&self.context.current_window) {
            return Some(IgnoreReason::SelfEcho);
        }
        if !origin.is_empty() && origin == self.context.current_origin {
            return None;
        }
        let url = match Url::parse(origin) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(origin, error = %err, "origin rejected: not a valid URL");
                return Some(IgnoreReason::UntrustedOrigin);
            }
        };
        if self.validator.is_valid_origin(&url).await {
            None
        } else {
            Some(IgnoreReason::UntrustedOrigin)
        }
    }

    fn handle_parent_message(&mut self, data: &Value) {
        match classify(data) {
            Ok(inbound) => self.dispatch_parent(inbound),
            Err(err) => tracing::debug!(error = %err, "malformed message from parent dropped"),
        }
    }

    fn dispatch_parent(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Response(response) => {
                tracing::debug!(id = response.id, "response from parent");
                self.route_response(response);
            }
            Inbound::Request(request) => {
                tracing::debug!(func = %request.func, "action message from parent");
                let (called, _) = self.handlers.call(&request.func, &request.args);
                if !called && self.relationships.binding(Target::Child).window().is_some() {
                    if let Err(err) = self.send_event_to_child(&request.func, request.args) {
                        tracing::warn!(error = %err, "failed to forward event to child");
                    }
                }
            }
            Inbound::Unknown => tracing::debug!("unknown message from parent dropped"),
        }
    }

    fn route_response(&mut self, response: MessageResponse) {
        let Dispatch::Relay(record, response) = self.correlator.on_response(response) else {
            return;
        };

        let child = self.relationships.binding(Target::Child);
        let resolved = child
            .resolved()
            .filter(|(window, _)| window.same_window(&record.child));
        let Some((window, origin)) = resolved else {
            tracing::debug!(
                child_id = record.child_id,
                func = %record.func,
                "child changed since relay; answer dropped"
            );
            return;
        };

        let reply = record.response(response.args, response.is_partial_response);
        if let Err(err) = post(window, origin, &Outbound::Response(reply)) {
            tracing::warn!(
                child_id = record.child_id,
                error = %err,
                "failed to relay answer to child"
            );
        }
    }

    fn handle_child_message(&mut self, source: &WindowRef, data: &Value) {
        let request = match classify_from_child(data) {
            Ok(Inbound::Request(request)) => request,
            Ok(_) => {
                tracing::debug!("non-request message from child dropped");
                return;
            }
            Err(err) => {
                tracing::debug!(error = %err, "malformed message from child dropped");
                return;
            }
        };
        let Some(child_id) = request.id else {
            tracing::debug!(func = %request.func, "child request without id dropped");
            return;
        };

        let (called, result) = self.handlers.call(&request.func, &request.args);
        if let (true, Some(result)) = (called, result) {
            tracing::debug!(
                child_id,
                func = %request.func,
                "answering child from local handler"
            );
            let args = handler_result_args(result);
            let reply = MessageResponse::new(child_id, request.uuid, args, None);
            if let Err(err) = self.transmit(Target::Child, Outbound::Response(reply)) {
                tracing::warn!(child_id, error = %err, "failed to answer child");
            }
            return;
        }

        if let Err(err) = self.relay_to_parent(source, child_id, request) {
            tracing::warn!(child_id, error = %err, "failed to relay child request");
        }
    }

    fn relay_to_parent(
        &mut self,
        source: &WindowRef,
        child_id: MessageId,
        request: InboundRequest,
    ) -> Result<()> {
        let record = RelayRecord {
            child_id,
            child_uuid: request.uuid,
            child: source.clone(),
            func: request.func.clone(),
        };
        let relayed = self.send_request(
            RELAY_API_VERSION_TAG,
            &request.func,
            request.args,
            Some(PendingCallback::Relay(record)),
            true,
        )?;
        tracing::debug!(
            child_id,
            relayed_id = relayed.id,
            func = %request.func,
            "relayed child request to parent"
        );
        Ok(())
    }

    fn send_request(
        &mut self,
        api_version_tag: &str,
        func: &str,
        args: Vec<Value>,
        pending: Option<PendingCallback>,
        proxied_from_child: bool,
    ) -> Result<MessageRequest> {
        let mut request = self.correlator.next_request(api_version_tag, func, args);
        if proxied_from_child {
            request = request.proxied_from_child();
        }
        if let Some(pending) = pending {
            self.correlator.register(&request, pending);
        }

        let sent = if self.frameless {
            self.post_native(&request)
        } else {
            self.transmit(Target::Parent, Outbound::Request(request.clone()))
        };
        if let Err(err) = sent {
            self.correlator.forget(request.id);
            return Err(err);
        }
        Ok(request)
    }

    fn post_native(&self, request: &MessageRequest) -> Result<()> {
        let native = self
            .context
            .native
            .as_ref()
            .ok_or(SessionError::NoParentWindow)?;
        let payload = encode(request, &self.config.codec)?;
        tracing::debug!(id = request.id, func = %request.func, "sending via native bridge");
        native.frameless_post_message(payload)?;
        Ok(())
    }

    /// Post now when `target` is reachable and nothing older is waiting,
    /// otherwise queue behind the older messages and flush.
    fn transmit(&mut self, target: Target, message: Outbound) -> Result<()> {
        let binding = self.relationships.binding(target);
        let reachable = binding.resolved().filter(|(window, _)| !window.is_closed());
        let Some((window, origin)) = reachable else {
            self.queues.enqueue(target, message);
            return Ok(());
        };

        if self.queues.len(target) == 0 {
            tracing::debug!(%target, message = %message.describe(), origin, "posting message");
            return post(window, origin, &message);
        }

        self.queues.enqueue(target, message);
        if let Err(err) = self.queues.flush(target, Some(window), Some(origin)) {
            tracing::warn!(%target, error = %err, "queue flush stopped");
        }
        Ok(())
    }

    fn flush_all(&mut self) {
        for target in [Target::Parent, Target::Child] {
            let binding = self.relationships.binding(target);
            if let Err(err) = self.queues.flush(target, binding.window(), binding.origin()) {
                tracing::warn!(%target, error = %err, "queue flush stopped");
            }
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("frameless", &self.frameless)
            .field("parent_origin", &self.parent_origin())
            .field("child_origin", &self.child_origin())
            .field("queued_parent", &self.queues.len(Target::Parent))
            .field("queued_child", &self.queues.len(Target::Child))
            .field("pending", &self.correlator.pending_len())
            .finish()
    }
}

fn post(window: &WindowRef, origin: &str, message: &Outbound) -> Result<()> {
    let value = message.to_value()?;
    window.post_message(&value, origin)?;
    Ok(())
}
