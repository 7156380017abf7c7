//! # faas_net
//!
//! Transport layer for the function runtime.
//!
//! This crate provides:
//!
//! - [`subjects`] — `faas:<engine>:<function>` subject builders.
//! - [`messages`] — Envelope, ack sentinel and transport-neutral messages.
//! - [`codec`] — JSON serialisation/deserialisation helpers.
//! - [`transport`] — The [`Transport`] trait every bus implements.
//! - [`connection`] — NATS-backed transport.
//! - [`memory`] — In-process transport with NATS-like semantics.
//! - [`error`] — Network-layer error types.

pub mod codec;
pub mod connection;
pub mod error;
pub mod memory;
pub mod messages;
pub mod subjects;
pub mod transport;

pub use codec::{decode, encode};
pub use connection::NatsConnection;
pub use error::NetError;
pub use memory::MemoryBus;
pub use messages::{ACK_FALSE, Auth, Envelope, InboundMessage, Params};
pub use transport::{Subscription, Transport};
