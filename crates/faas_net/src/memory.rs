//! In-process transport.
//!
//! [`MemoryBus`] mimics the parts of NATS the runtime relies on: exact
//! subject matching, queue groups with one delivery per group, plain
//! subscribers that each get a copy, and request/reply through unique inbox
//! subjects. It lets engines talk to each other inside one process, which is
//! what the test suites use instead of a live server.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::NetError;
use crate::messages::InboundMessage;
use crate::transport::{Subscription, Transport};

/// Prefix for generated reply subjects.
pub const INBOX_PREFIX: &str = "_INBOX";

#[derive(Debug)]
struct Route {
    group: Option<String>,
    tx: mpsc::UnboundedSender<InboundMessage>,
}

#[derive(Debug, Default)]
struct BusState {
    closed: bool,
    refuse_subscriptions: bool,
    /// Routes keyed by exact subject.
    routes: HashMap<String, Vec<Route>>,
    /// Round-robin cursor per `(subject, group)`.
    cursors: HashMap<(String, String), usize>,
}

impl BusState {
    /// Deliver a message, returning how many subscribers received it.
    fn deliver(&mut self, msg: &InboundMessage) -> usize {
        let Some(routes) = self.routes.get_mut(&msg.subject) else {
            return 0;
        };
        routes.retain(|r| !r.tx.is_closed());

        let mut delivered = 0;
        let mut groups: HashMap<&str, Vec<&Route>> = HashMap::new();
        for route in routes.iter() {
            match &route.group {
                Some(group) => groups.entry(group.as_str()).or_default().push(route),
                None => {
                    if route.tx.send(msg.clone()).is_ok() {
                        delivered += 1;
                    }
                }
            }
        }

        for (group, members) in groups {
            let cursor = self
                .cursors
                .entry((msg.subject.clone(), group.to_string()))
                .or_insert(0);
            let member = members[*cursor % members.len()];
            *cursor = cursor.wrapping_add(1);
            if member.tx.send(msg.clone()).is_ok() {
                delivered += 1;
            }
        }

        trace!(subject = msg.subject, delivered, "delivered message");
        delivered
    }

    fn add_route(&mut self, subject: &str, group: Option<&str>) -> Result<Subscription, NetError> {
        if self.closed {
            return Err(NetError::Closed);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes
            .entry(subject.to_string())
            .or_default()
            .push(Route {
                group: group.map(str::to_string),
                tx,
            });
        Ok(receiver_stream(rx))
    }
}

fn receiver_stream(rx: mpsc::UnboundedReceiver<InboundMessage>) -> Subscription {
    futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|m| (m, rx)) }).boxed()
}

/// A shared in-process message bus. Clones refer to the same bus.
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    state: Arc<Mutex<BusState>>,
}

impl MemoryBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `subject` outside any queue group; every plain
    /// subscriber receives its own copy.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Closed`] once the bus is closed.
    pub async fn subscribe(&self, subject: &str) -> Result<Subscription, NetError> {
        self.state.lock().await.add_route(subject, None)
    }

    /// Publish a message that carries an explicit reply address.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Closed`] once the bus is closed.
    pub async fn publish_with_reply(
        &self,
        subject: &str,
        reply: &str,
        payload: Vec<u8>,
    ) -> Result<(), NetError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(NetError::Closed);
        }
        state.deliver(&InboundMessage {
            subject: subject.to_string(),
            reply: Some(reply.to_string()),
            payload,
        });
        Ok(())
    }

    /// Number of live subscriptions on `subject`.
    pub async fn subscriber_count(&self, subject: &str) -> usize {
        let state = self.state.lock().await;
        state
            .routes
            .get(subject)
            .map_or(0, |routes| routes.iter().filter(|r| !r.tx.is_closed()).count())
    }

    /// Make subsequent subscription attempts fail (or succeed again).
    pub async fn refuse_subscriptions(&self, refuse: bool) {
        self.state.lock().await.refuse_subscriptions = refuse;
    }

    /// Close the bus, ending every subscription stream.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        state.routes.clear();
        debug!("memory bus closed");
    }
}

#[async_trait]
impl Transport for MemoryBus {
    async fn queue_subscribe(&self, subject: &str, group: &str) -> Result<Subscription, NetError> {
        let mut state = self.state.lock().await;
        if state.refuse_subscriptions {
            return Err(NetError::SubscribeRefused(subject.to_string()));
        }
        state.add_route(subject, Some(group))
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), NetError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(NetError::Closed);
        }
        state.deliver(&InboundMessage {
            subject: subject.to_string(),
            reply: None,
            payload,
        });
        Ok(())
    }

    async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, NetError> {
        let inbox = format!("{INBOX_PREFIX}.{}", Uuid::new_v4().simple());
        let mut replies = {
            let mut state = self.state.lock().await;
            let replies = state.add_route(&inbox, None)?;
            let delivered = state.deliver(&InboundMessage {
                subject: subject.to_string(),
                reply: Some(inbox.clone()),
                payload,
            });
            if delivered == 0 {
                state.routes.remove(&inbox);
                return Err(NetError::NoResponders(subject.to_string()));
            }
            replies
        };

        let outcome = match tokio::time::timeout(timeout, replies.next()).await {
            Ok(Some(reply)) => Ok(reply.payload),
            Ok(None) => Err(NetError::Closed),
            Err(_) => Err(NetError::Timeout {
                subject: subject.to_string(),
                timeout,
            }),
        };
        self.state.lock().await.routes.remove(&inbox);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_plain_subscribers_each_get_a_copy() {
        let bus = MemoryBus::new();
        let mut a = bus.subscribe("s").await.unwrap();
        let mut b = bus.subscribe("s").await.unwrap();
        bus.publish("s", b"hi".to_vec()).await.unwrap();
        assert_eq!(a.next().await.unwrap().payload, b"hi");
        assert_eq!(b.next().await.unwrap().payload, b"hi");
    }

    #[tokio::test]
    async fn test_queue_group_delivers_once_round_robin() {
        let bus = MemoryBus::new();
        let mut a = bus.queue_subscribe("s", "g").await.unwrap();
        let mut b = bus.queue_subscribe("s", "g").await.unwrap();
        bus.publish("s", b"1".to_vec()).await.unwrap();
        bus.publish("s", b"2".to_vec()).await.unwrap();

        assert_eq!(a.next().await.unwrap().payload, b"1");
        assert_eq!(b.next().await.unwrap().payload, b"2");
        let nothing = tokio::time::timeout(Duration::from_millis(20), a.next()).await;
        assert!(nothing.is_err(), "each message goes to exactly one member");
    }

    #[tokio::test]
    async fn test_distinct_groups_both_receive() {
        let bus = MemoryBus::new();
        let mut a = bus.queue_subscribe("s", "g1").await.unwrap();
        let mut b = bus.queue_subscribe("s", "g2").await.unwrap();
        bus.publish("s", b"x".to_vec()).await.unwrap();
        assert!(a.next().await.is_some());
        assert!(b.next().await.is_some());
    }

    #[tokio::test]
    async fn test_request_reply() {
        let bus = MemoryBus::new();
        let mut sub = bus.queue_subscribe("svc", "g").await.unwrap();
        let responder = bus.clone();
        tokio::spawn(async move {
            let msg = sub.next().await.unwrap();
            let reply = msg.reply.unwrap();
            responder.publish(&reply, b"pong".to_vec()).await.unwrap();
        });

        let reply = bus
            .request("svc", b"ping".to_vec(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reply, b"pong");
    }

    #[tokio::test]
    async fn test_request_without_responders() {
        let bus = MemoryBus::new();
        let err = bus
            .request("nobody", Vec::new(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::NoResponders(_)));
    }

    #[tokio::test]
    async fn test_request_times_out() {
        let bus = MemoryBus::new();
        let _silent = bus.queue_subscribe("svc", "g").await.unwrap();
        let err = bus
            .request("svc", Vec::new(), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_request_inboxes_are_removed() {
        let bus = MemoryBus::new();
        let _silent = bus.queue_subscribe("svc", "g").await.unwrap();
        for _ in 0..20 {
            let err = bus
                .request("svc", Vec::new(), Duration::from_millis(1))
                .await
                .unwrap_err();
            assert!(err.is_timeout());
        }
        for _ in 0..5 {
            bus.request("nobody", Vec::new(), Duration::from_millis(1))
                .await
                .unwrap_err();
        }

        let mut answered = bus.queue_subscribe("echo", "g").await.unwrap();
        let responder = bus.clone();
        tokio::spawn(async move {
            while let Some(msg) = answered.next().await {
                let reply = msg.reply.unwrap();
                responder.publish(&reply, msg.payload).await.unwrap();
            }
        });
        for _ in 0..5 {
            bus.request("echo", b"x".to_vec(), Duration::from_secs(1))
                .await
                .unwrap();
        }

        let routes = bus.state.lock().await.routes.len();
        assert_eq!(routes, 2, "only the svc and echo subscriptions remain");
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned() {
        let bus = MemoryBus::new();
        let sub = bus.queue_subscribe("s", "g").await.unwrap();
        assert_eq!(bus.subscriber_count("s").await, 1);
        drop(sub);
        assert_eq!(bus.subscriber_count("s").await, 0);
    }

    #[tokio::test]
    async fn test_close_ends_streams() {
        let bus = MemoryBus::new();
        let mut sub = bus.queue_subscribe("s", "g").await.unwrap();
        bus.close().await;
        assert!(sub.next().await.is_none());
        assert!(matches!(
            bus.publish("s", Vec::new()).await,
            Err(NetError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_refused_subscription() {
        let bus = MemoryBus::new();
        bus.refuse_subscriptions(true).await;
        let result = bus.queue_subscribe("s", "g").await;
        assert!(matches!(result, Err(NetError::SubscribeRefused(_))));
    }
}
