//! Result reporting from handlers back to the requester.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use faas_net::{ACK_FALSE, Transport};
use serde::Serialize;
use tracing::{debug, error, warn};

/// Handed to every handler invocation; publishes responses to the
/// requester's reply address.
///
/// Cloning is cheap and clones report to the same address, so a handler may
/// move a clone into a spawned task and respond later. Every call to
/// [`respond`](Self::respond) publishes, including repeated ones.
#[derive(Clone)]
pub struct Callback {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    subject: String,
    reply: Option<String>,
    invocations: AtomicUsize,
}

impl std::fmt::Debug for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callback")
            .field("subject", &self.inner.subject)
            .field("reply", &self.inner.reply)
            .field("invocations", &self.invocations())
            .finish()
    }
}

impl Callback {
    pub(crate) fn new(transport: Arc<dyn Transport>, subject: String, reply: Option<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                subject,
                reply,
                invocations: AtomicUsize::new(0),
            }),
        }
    }

    /// The function subject the request arrived on.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.inner.subject
    }

    /// The requester's reply address, if it left one.
    #[must_use]
    pub fn reply_to(&self) -> Option<&str> {
        self.inner.reply.as_deref()
    }

    /// How many times [`respond`](Self::respond) has been called.
    #[must_use]
    pub fn invocations(&self) -> usize {
        self.inner.invocations.load(Ordering::Relaxed)
    }

    /// Publish `response` as JSON to the reply address.
    ///
    /// If the response cannot be encoded, `{"ack":false}` is published in
    /// its place. Failures are logged and never returned to the handler.
    pub async fn respond<T: Serialize + Sync + ?Sized>(&self, response: &T) {
        let subject = self.inner.subject.as_str();
        let previous = self.inner.invocations.fetch_add(1, Ordering::Relaxed);
        if previous > 0 {
            warn!(subject, invocations = previous + 1, "callback invoked again; publishing another reply");
        }

        let Some(reply) = self.inner.reply.as_deref() else {
            debug!(subject, "request carried no reply address; response discarded");
            return;
        };

        let payload = match faas_net::encode(response) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(subject, error = %e, "failed to encode response; replying ack:false");
                ACK_FALSE.to_vec()
            }
        };

        if let Err(e) = self.inner.transport.publish(reply, payload).await {
            error!(subject, reply, error = %e, "failed to publish response");
        }
    }
}
