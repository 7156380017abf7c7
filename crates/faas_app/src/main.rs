//! # faas_app
//!
//! Command-line front end for the function runtime.
//!
//! - `serve` starts an engine with the demo functions and runs its dispatch
//!   loop until Ctrl-C.
//! - `call` invokes a function on any engine and prints the reply.
//!
//! The NATS URL comes from `--nats-url`, else `NATS_URL`, else
//! `nats://localhost:4222`.

mod functions;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use faas_engine::{Backpressure, Client, DispatchMode, Engine, EngineConfig, Envelope, Params};
use faas_net::NatsConnection;

#[derive(Parser)]
#[command(name = "faas_app", about = "Serve and call functions over NATS")]
struct Args {
    /// NATS server URL
    #[arg(short, long, global = true)]
    nats_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register the demo functions and serve requests
    Serve {
        /// Engine name (subject namespace and queue group)
        #[arg(long)]
        name: String,

        /// Inbound queue capacity
        #[arg(long, default_value_t = faas_engine::config::DEFAULT_QUEUE_CAPACITY)]
        queue_capacity: usize,

        /// Dispatch on this many workers instead of one sequential loop
        #[arg(long)]
        workers: Option<usize>,

        /// Drop messages when the queue is full instead of waiting
        #[arg(long)]
        drop_when_full: bool,
    },

    /// Call a function and print its reply
    Call {
        /// Target engine name
        #[arg(long)]
        engine: String,

        /// Function name
        #[arg(long)]
        function: String,

        /// Function parameters as a JSON object
        #[arg(long, default_value = "{}")]
        params: String,

        /// Auth data as a JSON object
        #[arg(long)]
        auth: Option<String>,

        /// Reply timeout in milliseconds
        #[arg(long, default_value_t = 1000)]
        timeout_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("faas_app=info".parse()?))
        .init();

    let args = Args::parse();

    match args.command {
        Command::Serve {
            name,
            queue_capacity,
            workers,
            drop_when_full,
        } => {
            let mut config = EngineConfig::new(name).with_queue_capacity(queue_capacity);
            if let Some(url) = args.nats_url {
                config = config.with_nats_url(url);
            }
            if let Some(workers) = workers {
                config = config.with_dispatch(DispatchMode::Pool { workers });
            }
            if drop_when_full {
                config = config.with_backpressure(Backpressure::Drop);
            }
            serve(config).await
        }
        Command::Call {
            engine,
            function,
            params,
            auth,
            timeout_ms,
        } => {
            let params: Params = serde_json::from_str(&params).context("--params must be a JSON object")?;
            let mut envelope = Envelope::new(params);
            if let Some(auth) = auth {
                envelope = envelope.with_auth(serde_json::from_str(&auth).context("--auth must be a JSON object")?);
            }
            call(args.nats_url.as_deref(), &engine, &function, &envelope, timeout_ms).await
        }
    }
}

async fn serve(config: EngineConfig) -> Result<()> {
    let engine = Engine::init(config).await?;
    functions::register_all(&engine).await?;
    info!(engine = engine.name(), functions = ?engine.registry().subjects(), "engine serving");

    tokio::select! {
        result = engine.run() => result?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("interrupt received; shutting down");
            engine.close().await;
        }
    }

    info!("engine shut down");
    Ok(())
}

async fn call(
    nats_url: Option<&str>,
    engine: &str,
    function: &str,
    envelope: &Envelope,
    timeout_ms: u64,
) -> Result<()> {
    let conn = match nats_url {
        Some(url) => NatsConnection::connect_to(url).await?,
        None => NatsConnection::connect().await?,
    };
    let client = Client::new(Arc::new(conn));

    let reply = client.invoke(engine, function, envelope, timeout_ms).await?;
    if faas_engine::is_nack(&reply) {
        warn!(engine, function, "function rejected the request");
    }
    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}
