//! The game gateway's answer to every transport event.
//!
//! Subscribe goes through the [`ChannelAuthorizer`], RPC through the
//! [`DispatchTable`]. Everything else is a declared no-op or an empty result.

use super::surface::EventSurface;
use super::types::*;
use crate::{
    channel::ChannelAuthorizer, config::PublishPolicy, connection::Client, error::GatewayError,
    rpc::DispatchTable,
};
use async_trait::async_trait;
use tracing::trace;

/// [`EventSurface`] implementation for the game gateway.
#[derive(Debug)]
pub struct GatewayHandler {
    authorizer: ChannelAuthorizer,
    rpc: DispatchTable,
    publish_policy: PublishPolicy,
}

impl GatewayHandler {
    pub fn new(authorizer: ChannelAuthorizer, rpc: DispatchTable) -> Self {
        Self {
            authorizer,
            rpc,
            publish_policy: PublishPolicy::default(),
        }
    }

    pub fn with_publish_policy(mut self, publish_policy: PublishPolicy) -> Self {
        self.publish_policy = publish_policy;
        self
    }

    pub fn publish_policy(&self) -> PublishPolicy {
        self.publish_policy
    }

    pub fn dispatch_table(&self) -> &DispatchTable {
        &self.rpc
    }
}

#[async_trait]
impl EventSurface for GatewayHandler {
    async fn on_alive(&self, _client: &Client) {}

    async fn on_disconnect(&self, client: &Client, event: &DisconnectEvent) {
        trace!(user_id = client.user_id(), reason = ?event.reason, "client disconnected");
    }

    async fn on_subscribe(
        &self,
        client: &Client,
        event: &SubscribeEvent,
    ) -> Result<SubscribeReply, GatewayError> {
        self.authorizer.authorize(client, &event.channel).await?;
        Ok(SubscribeReply::default())
    }

    async fn on_unsubscribe(&self, _client: &Client, _event: &UnsubscribeEvent) {}

    async fn on_publish(
        &self,
        client: &Client,
        event: &PublishEvent,
    ) -> Result<PublishReply, GatewayError> {
        match self.publish_policy {
            PublishPolicy::AllowAll => {}
            PublishPolicy::SubscribeRules => {
                self.authorizer.authorize(client, &event.channel).await?;
            }
        }
        Ok(PublishReply::default())
    }

    async fn on_rpc(&self, client: &Client, event: &RpcEvent) -> Result<RpcReply, GatewayError> {
        let data = self.rpc.dispatch(client, &event.method, &event.data).await?;
        Ok(RpcReply { data })
    }

    async fn on_refresh(
        &self,
        _client: &Client,
        _event: &RefreshEvent,
    ) -> Result<RefreshReply, GatewayError> {
        Ok(RefreshReply::default())
    }

    async fn on_sub_refresh(
        &self,
        _client: &Client,
        _event: &SubRefreshEvent,
    ) -> Result<SubRefreshReply, GatewayError> {
        Ok(SubRefreshReply::default())
    }

    async fn on_message(&self, _client: &Client, _event: &MessageEvent) {}

    async fn on_presence(
        &self,
        _client: &Client,
        _event: &PresenceEvent,
    ) -> Result<PresenceReply, GatewayError> {
        Ok(PresenceReply::default())
    }

    async fn on_presence_stats(
        &self,
        _client: &Client,
        _event: &PresenceStatsEvent,
    ) -> Result<PresenceStatsReply, GatewayError> {
        Ok(PresenceStatsReply::default())
    }

    async fn on_history(
        &self,
        _client: &Client,
        _event: &HistoryEvent,
    ) -> Result<HistoryReply, GatewayError> {
        Ok(HistoryReply::default())
    }
}
