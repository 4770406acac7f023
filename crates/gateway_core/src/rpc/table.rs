//! Method-name dispatch for client RPCs.
//!
//! The table is built once at startup and never mutated afterwards, so it is
//! shared across every connection without locking.

use super::handler::{handler_fn, ErasedHandler, RpcHandler};
use crate::{connection::Client, error::GatewayError, games::GameOperations};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

pub const FIND_GAME: &str = "find_game";
pub const CREATE_GAME: &str = "create_game";
pub const JOIN_GAME: &str = "join_game";
pub const LEFT_GAME: &str = "left_game";

/// Immutable mapping from RPC method name to handler.
pub struct DispatchTable {
    handlers: HashMap<&'static str, Arc<dyn ErasedHandler>>,
    call_timeout: Option<Duration>,
}

/// Builder for [`DispatchTable`].
#[derive(Default)]
pub struct DispatchTableBuilder {
    handlers: HashMap<&'static str, Arc<dyn ErasedHandler>>,
    call_timeout: Option<Duration>,
}

impl DispatchTableBuilder {
    /// Registers `handler` under `name`. A later registration of the same name
    /// replaces the earlier one.
    pub fn method<H: RpcHandler>(mut self, name: &'static str, handler: H) -> Self {
        self.handlers.insert(name, Arc::new(handler));
        self
    }

    /// Bounds each handler call. An elapsed deadline is logged and reported as
    /// [`GatewayError::Internal`].
    pub fn call_timeout(mut self, call_timeout: Option<Duration>) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn build(self) -> DispatchTable {
        DispatchTable {
            handlers: self.handlers,
            call_timeout: self.call_timeout,
        }
    }
}

impl DispatchTable {
    pub fn builder() -> DispatchTableBuilder {
        DispatchTableBuilder::default()
    }

    /// Builder pre-populated with the four game methods routed to `games`.
    pub fn for_games<G>(games: Arc<G>) -> DispatchTableBuilder
    where
        G: GameOperations + ?Sized + 'static,
    {
        let find = games.clone();
        let create = games.clone();
        let join = games.clone();
        let left = games;

        Self::builder()
            .method(
                FIND_GAME,
                handler_fn(move |client, payload| {
                    let games = find.clone();
                    async move { games.find_game(&client, &payload).await }
                }),
            )
            .method(
                CREATE_GAME,
                handler_fn(move |client, payload| {
                    let games = create.clone();
                    async move { games.create_game(&client, &payload).await }
                }),
            )
            .method(
                JOIN_GAME,
                handler_fn(move |client, payload| {
                    let games = join.clone();
                    async move { games.join_game(&client, &payload).await }
                }),
            )
            .method(
                LEFT_GAME,
                handler_fn(move |client, payload| {
                    let games = left.clone();
                    async move { games.left_game(&client, &payload).await }
                }),
            )
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<&'static str> {
        let mut methods: Vec<&'static str> = self.handlers.keys().copied().collect();
        methods.sort_unstable();
        methods
    }

    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Invokes `method` and returns the JSON-encoded reply.
    ///
    /// # Errors
    ///
    /// * [`GatewayError::MethodNotFound`] - unknown method; nothing is invoked or logged
    /// * [`GatewayError::Handler`] - the handler's own error, logged once and passed through
    /// * [`GatewayError::Internal`] - reply serialization failed or the call timed out,
    ///   logged once
    pub async fn dispatch(
        &self,
        client: &Client,
        method: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>, GatewayError> {
        let Some(handler) = self.handlers.get(method) else {
            return Err(GatewayError::MethodNotFound);
        };

        let invocation = handler.invoke(client, payload);
        let outcome = match self.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, invocation).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!(
                        method,
                        user_id = client.user_id(),
                        "RPC handler timed out after {:?}",
                        limit
                    );
                    return Err(GatewayError::Internal(format!(
                        "{method} timed out after {limit:?}"
                    )));
                }
            },
            None => invocation.await,
        };

        match outcome {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(e)) => {
                error!(method, user_id = client.user_id(), error = %e, "Failed to encode RPC reply");
                Err(GatewayError::Internal(e.to_string()))
            }
            Err(e) => {
                error!(method, user_id = client.user_id(), error = %e, "RPC handler failed");
                Err(GatewayError::Handler(e))
            }
        }
    }
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTable")
            .field("methods", &self.methods())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}
