//! Demo functions served by `faas_app serve`.

use faas_engine::{Auth, Callback, Engine, EngineError, Params};

/// Register every demo function on `engine`.
pub async fn register_all(engine: &Engine) -> Result<(), EngineError> {
    engine.register("echo", echo).await?;
    engine.register("whoami", whoami).await?;
    Ok(())
}

/// Replies with the request parameters.
async fn echo(params: Params, _auth: Option<Auth>, cb: Callback) {
    cb.respond(&params).await;
}

/// Replies with the caller's auth data, or `{}` when there is none.
async fn whoami(_params: Params, auth: Option<Auth>, cb: Callback) {
    cb.respond(&auth.unwrap_or_default()).await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use faas_engine::{EngineConfig, Envelope};
    use faas_net::MemoryBus;
    use serde_json::{Value, json};

    use super::*;

    fn object(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    async fn serving(bus: &MemoryBus) -> Engine {
        let engine = Engine::with_transport(EngineConfig::new("demo"), Arc::new(bus.clone()));
        register_all(&engine).await.unwrap();
        let runner = engine.clone();
        tokio::spawn(async move { runner.run().await });
        engine
    }

    #[tokio::test]
    async fn test_register_all() {
        let bus = MemoryBus::new();
        let engine = serving(&bus).await;
        assert_eq!(
            engine.registry().subjects(),
            vec!["faas:demo:echo", "faas:demo:whoami"]
        );
    }

    #[tokio::test]
    async fn test_echo() {
        let bus = MemoryBus::new();
        let engine = serving(&bus).await;
        let envelope = Envelope::new(object(json!({ "msg": "hi", "n": [1, 2] })));
        let reply = engine.invoke("demo", "echo", &envelope, 500).await.unwrap();
        assert_eq!(reply, object(json!({ "msg": "hi", "n": [1, 2] })));
    }

    #[tokio::test]
    async fn test_whoami() {
        let bus = MemoryBus::new();
        let engine = serving(&bus).await;

        let anonymous = engine
            .invoke("demo", "whoami", &Envelope::default(), 500)
            .await
            .unwrap();
        assert!(anonymous.is_empty());

        let envelope = Envelope::default().with_auth(object(json!({ "user": "ada" })));
        let reply = engine.invoke("demo", "whoami", &envelope, 500).await.unwrap();
        assert_eq!(reply, object(json!({ "user": "ada" })));
    }
}
