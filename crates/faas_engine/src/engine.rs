//! The engine — owns the registry, the inbound queue and the transport.
//!
//! Functions are registered with [`Engine::register`]; each new subject gets
//! a queue-group subscription whose messages are forwarded into one bounded
//! queue. [`Engine::run`] drains that queue through the dispatch loop until
//! the engine is closed or the transport drops the subscriptions.

use std::future::Future;
use std::sync::Arc;

use faas_net::subjects::{function_subject, queue_group};
use faas_net::{Auth, Envelope, InboundMessage, NatsConnection, Params, Subscription, Transport};
use futures::StreamExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::callback::Callback;
use crate::client::Client;
use crate::config::{Backpressure, DispatchMode, EngineConfig};
use crate::dispatch::{self, Dispatcher};
use crate::error::EngineError;
use crate::registry::{FunctionRegistry, Handler};

/// The inbound queue and the tasks feeding it.
struct Queue {
    sender: Mutex<Option<mpsc::Sender<InboundMessage>>>,
    receiver: Mutex<Option<mpsc::Receiver<InboundMessage>>>,
    forwarders: Mutex<Vec<JoinHandle<()>>>,
}

impl Queue {
    fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
            forwarders: Mutex::new(Vec::new()),
        }
    }

    /// Drop the engine's sender and stop all forwarders. The receiver yields
    /// whatever is already queued, then ends.
    async fn close(&self) -> bool {
        let was_open = self.sender.lock().await.take().is_some();
        for forwarder in self.forwarders.lock().await.drain(..) {
            forwarder.abort();
        }
        was_open
    }
}

struct Inner {
    config: EngineConfig,
    transport: Arc<dyn Transport>,
    registry: FunctionRegistry,
    client: Client,
    queue: Arc<Queue>,
    /// Serialises `register` so a subject is never subscribed twice.
    registration: Mutex<()>,
}

/// A function runtime instance. Cloning yields another handle to the same
/// engine.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Connect to NATS and create an engine.
    ///
    /// Uses `config.nats_url` when set, otherwise the `NATS_URL` environment
    /// variable or the default local server.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Connect`] if the connection fails.
    pub async fn init(config: EngineConfig) -> Result<Self, EngineError> {
        let conn = match config.nats_url.as_deref() {
            Some(url) => NatsConnection::connect_to(url).await,
            None => NatsConnection::connect().await,
        }
        .map_err(EngineError::Connect)?;
        Ok(Self::with_transport(config, Arc::new(conn)))
    }

    /// Create an engine over an existing transport.
    #[must_use]
    pub fn with_transport(config: EngineConfig, transport: Arc<dyn Transport>) -> Self {
        info!(
            engine = config.name,
            queue_capacity = config.queue_capacity,
            "engine created"
        );
        let queue = Arc::new(Queue::new(config.queue_capacity));
        let client = Client::new(Arc::clone(&transport));
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                registry: FunctionRegistry::new(),
                client,
                queue,
                registration: Mutex::new(()),
            }),
        }
    }

    /// Returns the engine name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Returns the function registry.
    #[must_use]
    pub fn registry(&self) -> &FunctionRegistry {
        &self.inner.registry
    }

    /// Returns the client used by [`call`](Self::call).
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.inner.client
    }

    /// Returns `true` if `function_name` is registered on this engine.
    #[must_use]
    pub fn is_registered(&self, function_name: &str) -> bool {
        self.inner
            .registry
            .contains(&function_subject(self.name(), function_name))
    }

    /// Register a function under `faas:<engine>:<function_name>`.
    ///
    /// A new subject is subscribed with the engine name as queue group, so
    /// engines sharing a name load-balance requests. Registering a subject
    /// that already has a handler succeeds without resubscribing and keeps
    /// the first handler.
    ///
    /// # Errors
    ///
    /// [`EngineError::Subscribe`] if the transport refuses the subscription
    /// (nothing is recorded), [`EngineError::Closed`] after
    /// [`close`](Self::close).
    pub async fn register<F, Fut>(&self, function_name: &str, handler: F) -> Result<(), EngineError>
    where
        F: Fn(Params, Option<Auth>, Callback) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register_handler(function_name, Arc::new(handler)).await
    }

    /// Register an already type-erased handler. See [`register`](Self::register).
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub async fn register_handler(
        &self,
        function_name: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<(), EngineError> {
        let subject = function_subject(self.name(), function_name);
        let _guard = self.inner.registration.lock().await;

        if self.inner.registry.contains(&subject) {
            debug!(engine = self.name(), subject, "function already registered");
            return Ok(());
        }

        // Held until the forwarder is tracked so `close` cannot miss it.
        let sender_slot = self.inner.queue.sender.lock().await;
        let Some(sender) = sender_slot.clone() else {
            return Err(EngineError::Closed(self.name().to_string()));
        };

        let subscription = self
            .inner
            .transport
            .queue_subscribe(&subject, &queue_group(self.name()))
            .await
            .map_err(|source| EngineError::Subscribe {
                subject: subject.clone(),
                source,
            })?;
        self.inner.registry.insert_if_absent(&subject, handler);

        let forwarder = tokio::spawn(forward(
            subscription,
            sender,
            self.inner.config.backpressure,
            subject.clone(),
            Arc::clone(&self.inner.queue),
        ));
        self.inner.queue.forwarders.lock().await.push(forwarder);
        drop(sender_slot);

        info!(engine = self.name(), subject, "function registered");
        Ok(())
    }

    /// Run the dispatch loop until the queue closes.
    ///
    /// Messages are handled per the configured [`DispatchMode`]. In the
    /// default sequential mode the next message is not taken until the
    /// current handler invocation has returned.
    ///
    /// The loop can be started once per engine. After it returns the engine
    /// is spent; serving again needs a new engine and fresh registrations.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::LoopConsumed`] if the loop was started before,
    /// including when that earlier run has already returned.
    pub async fn run(&self) -> Result<(), EngineError> {
        let Some(mut queue) = self.inner.queue.receiver.lock().await.take() else {
            return Err(EngineError::LoopConsumed(self.name().to_string()));
        };

        let dispatcher = Dispatcher::new(
            self.name().to_string(),
            self.inner.registry.clone(),
            Arc::clone(&self.inner.transport),
        );

        info!(engine = self.name(), mode = ?self.inner.config.dispatch, "dispatch loop started");
        match self.inner.config.dispatch {
            DispatchMode::Sequential => dispatcher.drain(&mut queue).await,
            DispatchMode::Pool { workers } => {
                dispatch::run_pool(dispatcher, queue, workers, self.inner.config.queue_capacity)
                    .await;
            }
        }
        info!(engine = self.name(), "dispatch loop stopped: queue closed");
        Ok(())
    }

    /// Close the inbound queue. Subscriptions are dropped, the dispatch loop
    /// finishes what is queued and returns, and further registrations fail.
    pub async fn close(&self) {
        if self.inner.queue.close().await {
            info!(engine = self.name(), "engine closed");
        }
    }

    /// Returns `true` once the engine has been closed.
    pub async fn is_closed(&self) -> bool {
        self.inner.queue.sender.lock().await.is_none()
    }

    /// Call a function on any engine. See [`Client::call`].
    ///
    /// # Errors
    ///
    /// See [`Client::call`].
    pub async fn call(
        &self,
        engine_name: &str,
        function_name: &str,
        params: &Params,
        timeout_ms: u64,
    ) -> Result<Params, EngineError> {
        self.inner
            .client
            .call(engine_name, function_name, params, timeout_ms)
            .await
    }

    /// Call a function with an explicit envelope. See [`Client::invoke`].
    ///
    /// # Errors
    ///
    /// See [`Client::call`].
    pub async fn invoke(
        &self,
        engine_name: &str,
        function_name: &str,
        envelope: &Envelope,
        timeout_ms: u64,
    ) -> Result<Params, EngineError> {
        self.inner
            .client
            .invoke(engine_name, function_name, envelope, timeout_ms)
            .await
    }
}

/// Move messages from one subscription into the engine queue.
async fn forward(
    mut subscription: Subscription,
    queue_tx: mpsc::Sender<InboundMessage>,
    backpressure: Backpressure,
    subject: String,
    queue: Arc<Queue>,
) {
    while let Some(msg) = subscription.next().await {
        match backpressure {
            Backpressure::Block => {
                if queue_tx.send(msg).await.is_err() {
                    return;
                }
            }
            Backpressure::Drop => match queue_tx.try_send(msg) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(dropped)) => {
                    warn!(subject, reply = ?dropped.reply, "inbound queue full; dropping message");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => return,
            },
        }
    }

    warn!(subject, "subscription ended; closing engine queue");
    drop(queue_tx);
    queue.close().await;
}
