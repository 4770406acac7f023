//! RPC handler abstraction.
//!
//! [`RpcHandler`] is the typed interface game operations implement. The
//! dispatch table stores handlers behind the object-safe [`ErasedHandler`],
//! which runs the handler and then encodes its reply.

use crate::{connection::Client, error::HandlerError};
use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;

/// A single RPC method.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use gateway_core::{Client, HandlerError, RpcHandler};
///
/// struct Echo;
///
/// #[async_trait]
/// impl RpcHandler for Echo {
///     type Reply = String;
///
///     async fn call(&self, client: &Client, _payload: &[u8]) -> Result<String, HandlerError> {
///         Ok(client.user_id().to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait RpcHandler: Send + Sync + 'static {
    /// Value returned on success, serialized to JSON by the dispatch table
    type Reply: Serialize + Send;

    async fn call(&self, client: &Client, payload: &[u8]) -> Result<Self::Reply, HandlerError>;
}

/// Type-erased handler stored in the dispatch table.
///
/// The outer `Result` carries handler failures verbatim; the inner one carries
/// reply serialization failures.
#[async_trait]
pub(crate) trait ErasedHandler: Send + Sync {
    async fn invoke(
        &self,
        client: &Client,
        payload: &[u8],
    ) -> Result<serde_json::Result<Vec<u8>>, HandlerError>;
}

#[async_trait]
impl<H: RpcHandler> ErasedHandler for H {
    async fn invoke(
        &self,
        client: &Client,
        payload: &[u8],
    ) -> Result<serde_json::Result<Vec<u8>>, HandlerError> {
        let reply = self.call(client, payload).await?;
        Ok(serde_json::to_vec(&reply))
    }
}

/// Handler backed by an async closure. See [`handler_fn`].
#[derive(Clone)]
pub struct FnHandler<F> {
    f: F,
}

/// Wraps an async closure as an [`RpcHandler`].
///
/// The closure receives owned copies of the client and payload so the returned
/// future can be `'static`.
pub fn handler_fn<F, Fut, R>(f: F) -> FnHandler<F>
where
    F: Fn(Client, Vec<u8>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    R: Serialize + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut, R> RpcHandler for FnHandler<F>
where
    F: Fn(Client, Vec<u8>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    R: Serialize + Send + 'static,
{
    type Reply = R;

    async fn call(&self, client: &Client, payload: &[u8]) -> Result<R, HandlerError> {
        (self.f)(client.clone(), payload.to_vec()).await
    }
}

impl<F> std::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}
