//! Trial-decode dispatch of opaque JSON payloads to typed handlers.
//!
//! A [`Dispatcher`] offers a payload to its handlers in registration order and
//! invokes the first whose input type decodes it. Order matters: a handler
//! whose input has only optional fields accepts everything, so register
//! handlers with the most specific inputs first. The handlers shipped in
//! [`events`] have disjoint required fields.

pub mod events;

pub use events::{
    AuthResponse, AuthorizerEvent, AuthorizerHandler, HttpEvent, HttpEventHandler,
    HttpEventResponse, PolicyDocument, PolicyStatement,
};

use crate::error::{RelayError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// A typed request handler.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    type Input: DeserializeOwned + Send;
    type Output: Serialize + Send;

    fn name(&self) -> &'static str;

    async fn handle(&self, input: Self::Input) -> Result<Self::Output>;
}

#[async_trait]
trait ErasedHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` when the payload does not decode as this handler's input.
    async fn try_handle(&self, payload: &[u8]) -> Option<Result<Vec<u8>>>;
}

#[async_trait]
impl<H: Handler> ErasedHandler for H {
    fn name(&self) -> &'static str {
        Handler::name(self)
    }

    async fn try_handle(&self, payload: &[u8]) -> Option<Result<Vec<u8>>> {
        let input = serde_json::from_slice::<H::Input>(payload).ok()?;
        debug!("Dispatching to {}", Handler::name(self));
        let result = match self.handle(input).await {
            Ok(output) => serde_json::to_vec(&output).map_err(|e| {
                RelayError::internal_error(format!(
                    "Failed to encode {} output: {}",
                    Handler::name(self),
                    e
                ))
            }),
            Err(e) => Err(e),
        };
        Some(result)
    }
}

/// Ordered list of handlers.
#[derive(Default)]
pub struct Dispatcher {
    handlers: Vec<Box<dyn ErasedHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler; earlier registrations win.
    pub fn register<H: Handler>(mut self, handler: H) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Run the first handler that accepts `payload` and return its encoded output.
    pub async fn dispatch(&self, payload: &[u8]) -> Result<Vec<u8>> {
        for handler in &self.handlers {
            if let Some(result) = handler.try_handle(payload).await {
                return result;
            }
        }
        Err(RelayError::NoMatchingHandler(format!(
            "payload of {} bytes (tried {})",
            payload.len(),
            self.handler_names().join(", ")
        )))
    }

    /// The serverless entry point: token authorizer events and HTTP events
    /// replayed through `router`.
    pub fn for_events(router: axum::Router, auth_token: Option<String>) -> Self {
        Self::new()
            .register(AuthorizerHandler::new(auth_token))
            .register(HttpEventHandler::new(router))
    }

    /// [`Self::dispatch`] for an already parsed JSON value.
    pub async fn dispatch_value(&self, payload: &serde_json::Value) -> Result<serde_json::Value> {
        let bytes = serde_json::to_vec(payload)
            .map_err(|e| RelayError::internal_error(format!("Failed to encode payload: {}", e)))?;
        let output = self.dispatch(&bytes).await?;
        serde_json::from_slice(&output)
            .map_err(|e| RelayError::internal_error(format!("Handler output is not JSON: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Ping {
        ping: String,
    }

    #[derive(Deserialize)]
    struct Add {
        a: i64,
        b: i64,
    }

    struct PingHandler;
    struct AddHandler;
    struct FailingHandler;

    #[async_trait]
    impl Handler for PingHandler {
        type Input = Ping;
        type Output = String;

        fn name(&self) -> &'static str {
            "ping"
        }

        async fn handle(&self, input: Ping) -> Result<String> {
            Ok(format!("pong {}", input.ping))
        }
    }

    #[async_trait]
    impl Handler for AddHandler {
        type Input = Add;
        type Output = i64;

        fn name(&self) -> &'static str {
            "add"
        }

        async fn handle(&self, input: Add) -> Result<i64> {
            Ok(input.a + input.b)
        }
    }

    #[async_trait]
    impl Handler for FailingHandler {
        type Input = Add;
        type Output = i64;

        fn name(&self) -> &'static str {
            "failing"
        }

        async fn handle(&self, _input: Add) -> Result<i64> {
            Err(RelayError::not_found("nothing to add"))
        }
    }

    #[tokio::test]
    async fn test_routes_to_only_matching_handler() {
        let dispatcher = Dispatcher::new().register(PingHandler).register(AddHandler);

        let out = dispatcher.dispatch_value(&json!({"a": 2, "b": 3})).await.unwrap();
        assert_eq!(out, json!(5));

        let out = dispatcher.dispatch_value(&json!({"ping": "x"})).await.unwrap();
        assert_eq!(out, json!("pong x"));
    }

    #[tokio::test]
    async fn test_no_matching_handler() {
        let dispatcher = Dispatcher::new().register(PingHandler).register(AddHandler);
        let err = dispatcher.dispatch(b"{\"c\": 1}").await.unwrap_err();
        assert!(matches!(err, RelayError::NoMatchingHandler(_)));

        let err = dispatcher.dispatch(b"not json").await.unwrap_err();
        assert!(matches!(err, RelayError::NoMatchingHandler(_)));
    }

    #[tokio::test]
    async fn test_first_registration_wins_and_errors_propagate() {
        let dispatcher = Dispatcher::new().register(FailingHandler).register(AddHandler);
        let err = dispatcher
            .dispatch_value(&json!({"a": 1, "b": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::NotFound(_)));
        assert_eq!(dispatcher.handler_names(), vec!["failing", "add"]);
    }
}
