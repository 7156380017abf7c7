//! # faas_engine
//!
//! A small function runtime over a publish/subscribe bus.
//!
//! An [`Engine`] exposes named functions under `faas:<engine>:<function>`.
//! Each process:
//!
//! 1. Connects to NATS (or any [`Transport`](faas_net::Transport)).
//! 2. Registers its functions; each subject is subscribed with the engine
//!    name as queue group so same-named instances share the load.
//! 3. Runs the dispatch loop: decode the envelope, validate it, invoke the
//!    handler, publish its response to the request's reply address.
//!
//! The same engine (or a bare [`Client`]) invokes remote functions and
//! waits, with a timeout, for the single reply.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use faas_engine::{Callback, Engine, EngineConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), faas_engine::EngineError> {
//!     let engine = Engine::init(EngineConfig::new("math")).await?;
//!
//!     engine
//!         .register("add", |params, _auth, cb: Callback| async move {
//!             let a = params.get("a").and_then(|v| v.as_i64()).unwrap_or(0);
//!             let b = params.get("b").and_then(|v| v.as_i64()).unwrap_or(0);
//!             cb.respond(&json!({ "sum": a + b })).await;
//!         })
//!         .await?;
//!
//!     engine.run().await
//! }
//! ```

pub mod callback;
pub mod client;
pub mod config;
mod dispatch;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod registry;

pub use callback::Callback;
pub use client::{Client, is_nack};
pub use config::{Backpressure, DispatchMode, EngineConfig};
pub use engine::Engine;
pub use envelope::validate_envelope;
pub use error::{EngineError, EnvelopeError};
pub use registry::{FunctionRegistry, Handler};

pub use faas_net::{Auth, Envelope, Params};
