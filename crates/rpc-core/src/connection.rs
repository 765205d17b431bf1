//! # RPC Connection
//!
//! Realm bootstrap: wires the function registry and the call correlator
//! onto the transport's inbox exactly once, spawns the dispatch task, and
//! exposes the call-side API (`remote_function`, `run_in_background`,
//! `run_in_tab`).
//!
//! ## Message flow
//!
//! ```text
//! caller ──invoke──→ [PendingCalls] ──encode──→ [Transport] ─ ─ ─→ remote realm
//!                                                                       │
//!   future settles ←──settle by id── [dispatch task] ←─ ─ ─ response ───┘
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use rpc_transport::{Inbox, IncomingMessage, Transport, TransportError};
use rpc_types::{codec, CallEnvelope, CallId, RpcError, SenderInfo, TabId, Target};

use crate::correlator::PendingCalls;
use crate::registry::{FunctionRegistry, Handler};
use crate::router;

use std::collections::HashMap;

/// Which side of the extension this realm plays.
///
/// Used for diagnostics, and to decide whether proxied requests are
/// forwarded: only the background holds a route to every tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcRole {
    /// The background/service-worker realm.
    Background,
    /// A content script, popup, or options page.
    Content,
}

/// How long the background keeps a proxy-return entry for a forwarded call
/// whose tab never answers, before evicting it.
pub const DEFAULT_PROXY_TTL: Duration = Duration::from_secs(120);

/// Bootstrap options for a realm's RPC connection.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Human-readable side name for diagnostics ("background",
    /// "content-script-global", "popup", ...). Not used for routing.
    pub side_name: String,
    /// The realm's role.
    pub role: RpcRole,
    /// Start with incoming dispatch held until [`RpcConnection::unpause`].
    /// Messages queue in the transport inbox in the meantime.
    pub paused: bool,
    /// Eviction deadline for proxy-return entries; forwarded tabs have this
    /// long to answer before the relay route is forgotten.
    pub proxy_ttl: Duration,
}

impl RpcConfig {
    /// Config with dispatch running immediately.
    #[must_use]
    pub fn new(side_name: impl Into<String>, role: RpcRole) -> Self {
        Self {
            side_name: side_name.into(),
            role,
            paused: false,
            proxy_ttl: DEFAULT_PROXY_TTL,
        }
    }

    /// Hold incoming dispatch until `unpause`.
    #[must_use]
    pub fn paused(mut self) -> Self {
        self.paused = true;
        self
    }

    /// Override [`DEFAULT_PROXY_TTL`] for proxy-return entries.
    #[must_use]
    pub fn proxy_ttl(mut self, ttl: Duration) -> Self {
        self.proxy_ttl = ttl;
        self
    }
}

/// Function name every background connection answers as a liveness ping.
///
/// Lets realms racing against background startup confirm the registry is
/// wired before issuing real calls.
pub const CONFIRM_BACKGROUND_LOADED: &str = "confirmBackgroundScriptLoaded";

/// One forwarded proxy call awaiting the tab's response.
struct ProxiedEntry {
    origin: SenderInfo,
    forwarded_at: Instant,
}

struct ConnectionShared {
    side_name: String,
    role: RpcRole,
    transport: Arc<dyn Transport>,
    registry: Arc<FunctionRegistry>,
    pending: Arc<PendingCalls>,
    /// Proxied call ids → origin sender, for relaying tab responses back.
    /// Entries a tab never answers are evicted after `proxy_ttl`, so the
    /// table stays bounded when forwards go to closed tabs.
    proxied: Mutex<HashMap<CallId, ProxiedEntry>>,
    proxy_ttl: Duration,
    pause: watch::Sender<bool>,
}

/// One realm's RPC endpoint: registration side and call side in one.
///
/// Dropping the connection aborts its dispatch task; in-flight callers
/// then observe [`RpcError::ConnectionClosed`] or stay pending per the
/// base contract.
pub struct RpcConnection {
    shared: Arc<ConnectionShared>,
    dispatch: JoinHandle<()>,
}

/// Wire a realm onto its transport.
///
/// Subscribes to the transport's inbox (exactly once per realm), spawns
/// the dispatch task, and - for background-role realms - registers the
/// [`CONFIRM_BACKGROUND_LOADED`] liveness handler.
pub fn setup_rpc_connection(
    transport: Arc<dyn Transport>,
    config: RpcConfig,
) -> Result<RpcConnection, TransportError> {
    let inbox = transport.subscribe()?;
    let (pause_tx, pause_rx) = watch::channel(config.paused);

    let registry = Arc::new(FunctionRegistry::new());
    if config.role == RpcRole::Background {
        registry.register_fn(CONFIRM_BACKGROUND_LOADED, |_args, _sender| async {
            Ok(Value::Bool(true))
        });
    }

    let shared = Arc::new(ConnectionShared {
        side_name: config.side_name,
        role: config.role,
        transport,
        registry,
        pending: Arc::new(PendingCalls::new()),
        proxied: Mutex::new(HashMap::new()),
        proxy_ttl: config.proxy_ttl,
        pause: pause_tx,
    });

    debug!(side = %shared.side_name, role = ?shared.role, "rpc connection set up");
    let dispatch = tokio::spawn(dispatch_loop(shared.clone(), inbox, pause_rx));
    Ok(RpcConnection { shared, dispatch })
}

impl RpcConnection {
    /// The realm's function registry, for piecemeal registration.
    #[must_use]
    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.shared.registry
    }

    /// Human-readable side name given at bootstrap.
    #[must_use]
    pub fn side_name(&self) -> &str {
        &self.shared.side_name
    }

    /// The realm's role.
    #[must_use]
    pub fn role(&self) -> RpcRole {
        self.shared.role
    }

    /// Number of calls currently awaiting a response.
    #[must_use]
    pub fn pending_calls(&self) -> usize {
        self.shared.pending.len()
    }

    /// Number of forwarded proxy calls awaiting a tab's response.
    #[must_use]
    pub fn proxied_calls(&self) -> usize {
        self.shared.proxied.lock().len()
    }

    /// Register every entry of `handlers` as a callable remote function.
    pub fn make_remotely_callable<I>(&self, handlers: I)
    where
        I: IntoIterator<Item = (String, Handler)>,
    {
        for (name, handler) in handlers {
            self.shared.registry.register(name, handler);
        }
    }

    /// Release a paused connection's incoming dispatch.
    pub fn unpause(&self) {
        let _ = self.shared.pause.send(false);
    }

    /// Callable handle on a function registered in the background realm.
    #[must_use]
    pub fn remote_function(&self, name: &str) -> RemoteFunction {
        self.remote(name, router::resolve_target(None), None)
    }

    /// Callable handle on a function in the given tab's content script.
    #[must_use]
    pub fn remote_function_in_tab(&self, name: &str, tab: TabId) -> RemoteFunction {
        self.remote(name, router::resolve_target(Some(tab)), None)
    }

    /// Callable handle on a tab's function, relayed through the background.
    ///
    /// For realms that hold no route to tabs themselves (popup, options
    /// page): the request travels to the background, which forwards it to
    /// the tab and relays the response back. The proxy mark rides in the
    /// envelope, so the resolved target is the background itself.
    #[must_use]
    pub fn remote_function_via_background(&self, name: &str, tab: TabId) -> RemoteFunction {
        self.remote(name, router::resolve_target(None), Some(tab))
    }

    /// Target-bound accessor for a whole interface of named functions in
    /// the background realm.
    #[must_use]
    pub fn run_in_background(&self) -> RemoteInterface {
        RemoteInterface {
            shared: self.shared.clone(),
            target: router::resolve_target(None),
        }
    }

    /// Target-bound accessor for a whole interface of named functions in
    /// the given tab.
    #[must_use]
    pub fn run_in_tab(&self, tab: TabId) -> RemoteInterface {
        RemoteInterface {
            shared: self.shared.clone(),
            target: router::resolve_target(Some(tab)),
        }
    }

    /// Ping the background until it answers or attempts run out.
    ///
    /// Each attempt calls [`CONFIRM_BACKGROUND_LOADED`] with `per_attempt`
    /// as its deadline. Returns the last error when every attempt fails.
    pub async fn ensure_background_ready(
        &self,
        per_attempt: Duration,
        attempts: u32,
    ) -> Result<(), RpcError> {
        let ping = self
            .remote_function(CONFIRM_BACKGROUND_LOADED)
            .with_timeout(per_attempt);
        let mut last = RpcError::DeadlineExceeded {
            function: CONFIRM_BACKGROUND_LOADED.to_owned(),
            after: per_attempt,
        };
        for attempt in 0..attempts.max(1) {
            match ping.call_raw(Vec::new()).await {
                Ok(_) => return Ok(()),
                Err(error) => {
                    debug!(side = %self.shared.side_name, attempt, %error, "background not ready yet");
                    last = error;
                }
            }
        }
        Err(last)
    }

    /// Tear down the dispatch task. In-flight calls stay unresolved.
    pub fn shutdown(&self) {
        self.dispatch.abort();
    }
}

impl Drop for RpcConnection {
    fn drop(&mut self) {
        self.dispatch.abort();
    }
}

impl RpcConnection {
    fn remote(&self, name: &str, target: Target, proxy_tab: Option<TabId>) -> RemoteFunction {
        RemoteFunction {
            shared: self.shared.clone(),
            function: name.to_owned(),
            target,
            proxy_tab,
            deadline: None,
        }
    }
}

/// A callable proxy for one remote function.
///
/// Cheap to clone; every invocation is an independent in-flight call with
/// its own correlation id.
#[derive(Clone)]
pub struct RemoteFunction {
    shared: Arc<ConnectionShared>,
    function: String,
    target: Target,
    proxy_tab: Option<TabId>,
    deadline: Option<Duration>,
}

impl RemoteFunction {
    /// Opt into rejecting the call after `deadline`.
    ///
    /// The base contract never times out on its own. When the deadline
    /// fires, the pending entry is removed immediately, so a response
    /// arriving later is dropped on the unknown-id path.
    #[must_use]
    pub fn with_timeout(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Invoke with a typed argument pack and a typed return value.
    ///
    /// Tuples become the wire args array (`(21,)` calls with one argument,
    /// `()` with none); anything not JSON-serializable fails fast before a
    /// message is sent.
    pub async fn call<A, R>(&self, args: A) -> Result<R, RpcError>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let args = codec::to_args(&self.function, &args)?;
        let value = self.call_raw(args).await?;
        serde_json::from_value(value).map_err(|source| RpcError::Deserialize {
            function: self.function.clone(),
            source,
        })
    }

    /// Invoke with pre-encoded JSON arguments, returning the raw value.
    pub async fn call_raw(&self, args: Vec<Value>) -> Result<Value, RpcError> {
        let mut envelope = CallEnvelope::new(&self.function, args);
        envelope.proxy_tab = self.proxy_tab;
        let call_id = envelope.call_id;
        let payload = codec::encode_request(&envelope)?;

        let receiver = self.shared.pending.begin(call_id, &self.function);
        debug!(
            side = %self.shared.side_name,
            function = %self.function,
            %call_id,
            target = %self.target,
            "rpc request dispatched"
        );
        if let Err(error) =
            router::dispatch(self.shared.transport.as_ref(), self.target, payload).await
        {
            self.shared.pending.abandon(call_id);
            warn!(function = %self.function, %error, "rpc request could not be dispatched");
            return Err(RpcError::ConnectionClosed {
                function: self.function.clone(),
            });
        }

        let outcome = match self.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, receiver).await {
                Ok(settled) => settled,
                Err(_elapsed) => {
                    self.shared.pending.abandon(call_id);
                    return Err(RpcError::DeadlineExceeded {
                        function: self.function.clone(),
                        after: deadline,
                    });
                }
            },
            None => receiver.await,
        };
        let outcome = outcome.map_err(|_| RpcError::ConnectionClosed {
            function: self.function.clone(),
        })?;
        outcome.into_result(&self.function)
    }
}

/// Target-bound accessor for a whole interface of named remote functions.
#[derive(Clone)]
pub struct RemoteInterface {
    shared: Arc<ConnectionShared>,
    target: Target,
}

impl RemoteInterface {
    /// Handle on one function of the interface.
    #[must_use]
    pub fn function(&self, name: &str) -> RemoteFunction {
        RemoteFunction {
            shared: self.shared.clone(),
            function: name.to_owned(),
            target: self.target,
            proxy_tab: None,
            deadline: None,
        }
    }

    /// One-shot typed call of a named function.
    pub async fn call<A, R>(&self, name: &str, args: A) -> Result<R, RpcError>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        self.function(name).call(args).await
    }
}

// ============================================================================
// Dispatch task
// ============================================================================

async fn dispatch_loop(
    shared: Arc<ConnectionShared>,
    mut inbox: Inbox,
    mut paused: watch::Receiver<bool>,
) {
    while let Some(message) = inbox.recv().await {
        if *paused.borrow() {
            // Hold delivery while paused; messages queue behind this one.
            if paused.wait_for(|paused| !*paused).await.is_err() {
                return;
            }
        }
        handle_incoming(&shared, message);
    }
    debug!(side = %shared.side_name, "rpc inbox closed, dispatch task exiting");
}

fn handle_incoming(shared: &Arc<ConnectionShared>, message: IncomingMessage) {
    if let Some(request) = codec::decode_request(&message.payload) {
        // Requests run on their own task so a slow handler cannot block
        // the responses (or other requests) queued behind it.
        let shared = shared.clone();
        tokio::spawn(async move {
            handle_request(&shared, request, message.sender).await;
        });
    } else if let Some(response) = codec::decode_response(&message.payload) {
        handle_response(shared, response);
    }
    // Anything else is foreign channel noise; not ours to judge.
}

async fn handle_request(shared: &Arc<ConnectionShared>, request: CallEnvelope, sender: SenderInfo) {
    debug!(
        side = %shared.side_name,
        function = %request.function,
        call_id = %request.call_id,
        "rpc request received"
    );

    // Proxied requests are relayed by the background, not fulfilled by it.
    if let Some(tab) = request.proxy_tab {
        if shared.role == RpcRole::Background {
            forward_proxied(shared, request, sender, tab).await;
        } else {
            warn!(
                side = %shared.side_name,
                function = %request.function,
                "proxied request reached a non-background realm, dropping"
            );
        }
        return;
    }

    let response = shared.registry.handle_request(&request, sender).await;
    let payload = match codec::encode_response(&response) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(function = %request.function, %error, "rpc response could not be encoded");
            return;
        }
    };
    if let Err(error) =
        router::dispatch_reply(shared.transport.as_ref(), &sender, payload).await
    {
        warn!(function = %request.function, %error, "rpc response could not be sent");
    }
}

async fn forward_proxied(
    shared: &Arc<ConnectionShared>,
    request: CallEnvelope,
    origin: SenderInfo,
    tab: TabId,
) {
    debug!(
        function = %request.function,
        call_id = %request.call_id,
        %tab,
        "relaying proxied request to tab"
    );
    let call_id = request.call_id;
    let forwarded = CallEnvelope {
        proxy_tab: None,
        ..request
    };
    let payload = match codec::encode_request(&forwarded) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(function = %forwarded.function, %error, "proxied request could not be re-encoded");
            return;
        }
    };
    shared.proxied.lock().insert(
        call_id,
        ProxiedEntry {
            origin,
            forwarded_at: Instant::now(),
        },
    );
    if let Err(error) = shared.transport.send_to_tab(tab, payload).await {
        warn!(function = %forwarded.function, %error, "proxied request could not be forwarded");
        shared.proxied.lock().remove(&call_id);
        return;
    }

    // Forwards are fire-and-forget, so a tab that closed mid-call never
    // answers; evict the return entry once the TTL elapses so the table
    // stays bounded.
    let shared = shared.clone();
    tokio::spawn(async move {
        tokio::time::sleep(shared.proxy_ttl).await;
        let evicted = shared.proxied.lock().remove(&call_id);
        if let Some(entry) = evicted {
            debug!(
                function = %forwarded.function,
                %call_id,
                waited = ?entry.forwarded_at.elapsed(),
                "proxy-return entry evicted, tab never answered"
            );
        }
    });
}

fn handle_response(shared: &Arc<ConnectionShared>, response: rpc_types::ResponseEnvelope) {
    // Results of proxied calls are relayed back to the realm that
    // originated them, not settled here.
    let origin = shared
        .proxied
        .lock()
        .remove(&response.call_id)
        .map(|entry| entry.origin);
    if let Some(origin) = origin {
        let shared = shared.clone();
        tokio::spawn(async move {
            let payload = match codec::encode_response(&response) {
                Ok(payload) => payload,
                Err(error) => {
                    warn!(function = %response.function, %error, "proxied response could not be re-encoded");
                    return;
                }
            };
            if let Err(error) = shared.transport.send_to_sender(&origin, payload).await {
                warn!(function = %response.function, %error, "proxied response could not be relayed");
            }
        });
        return;
    }

    shared.pending.settle(response.call_id, response.outcome);
}
