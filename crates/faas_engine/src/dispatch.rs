//! The dispatch loop.
//!
//! Pulls inbound messages off the engine queue and runs them through
//! route → decode/validate → handler. Every dispatch-time failure is
//! contained here: rejected envelopes get an `{"ack":false}` reply, messages
//! for unregistered subjects are dropped without reply, and a panicking
//! handler is logged. Only the queue closing ends the loop.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use faas_net::subjects::parse_function_subject;
use faas_net::{ACK_FALSE, InboundMessage, Transport};
use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::callback::Callback;
use crate::envelope::validate_envelope;
use crate::registry::FunctionRegistry;

/// Routes single messages to their handlers.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    engine: String,
    registry: FunctionRegistry,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    pub(crate) fn new(engine: String, registry: FunctionRegistry, transport: Arc<dyn Transport>) -> Self {
        Self {
            engine,
            registry,
            transport,
        }
    }

    /// Dispatch messages until `queue` closes.
    pub(crate) async fn drain(&self, queue: &mut mpsc::Receiver<InboundMessage>) {
        while let Some(msg) = queue.recv().await {
            self.dispatch(msg).await;
        }
    }

    /// Handle one message. Returns once the handler invocation has returned,
    /// whether or not it has responded yet.
    pub(crate) async fn dispatch(&self, msg: InboundMessage) {
        let InboundMessage {
            subject,
            reply,
            payload,
        } = msg;

        let Some(handler) = self.registry.get(&subject) else {
            let function = parse_function_subject(&subject).map(|(_, function)| function);
            debug!(engine = self.engine, subject, function = ?function, "no function registered for subject; ignoring");
            return;
        };

        let envelope = match validate_envelope(&payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(engine = self.engine, subject, error = %e, "rejecting request");
                self.reject(&subject, reply.as_deref()).await;
                return;
            }
        };

        debug!(engine = self.engine, subject, has_auth = envelope.auth.is_some(), "invoking function");
        let callback = Callback::new(Arc::clone(&self.transport), subject.clone(), reply);
        let invocation = handler.call(envelope.params, envelope.auth, callback);
        if AssertUnwindSafe(invocation).catch_unwind().await.is_err() {
            error!(engine = self.engine, subject, "function panicked");
        }
    }

    async fn reject(&self, subject: &str, reply: Option<&str>) {
        let Some(reply) = reply else {
            debug!(subject, "rejected request had no reply address");
            return;
        };
        if let Err(e) = self.transport.publish(reply, ACK_FALSE.to_vec()).await {
            error!(subject, reply, error = %e, "failed to publish ack:false");
        }
    }
}

/// Pick the worker lane for a subject.
pub(crate) fn lane_for(subject: &str, lanes: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    subject.hash(&mut hasher);
    (hasher.finish() % lanes.max(1) as u64) as usize
}

/// Fan the queue out onto `workers` sequential lanes keyed by subject.
pub(crate) async fn run_pool(
    dispatcher: Dispatcher,
    mut queue: mpsc::Receiver<InboundMessage>,
    workers: usize,
    lane_capacity: usize,
) {
    let workers = workers.max(1);
    let mut lanes = Vec::with_capacity(workers);
    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let (tx, mut rx) = mpsc::channel(lane_capacity.max(1));
        let worker = dispatcher.clone();
        handles.push(tokio::spawn(async move { worker.drain(&mut rx).await }));
        lanes.push(tx);
    }

    while let Some(msg) = queue.recv().await {
        let lane = lane_for(&msg.subject, workers);
        if lanes[lane].send(msg).await.is_err() {
            error!(engine = dispatcher.engine, lane, "dispatch worker stopped; message lost");
        }
    }

    drop(lanes);
    for handle in handles {
        if let Err(e) = handle.await {
            error!(engine = dispatcher.engine, error = %e, "dispatch worker failed");
        }
    }
}
