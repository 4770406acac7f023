//! The gateway's declared capability set.
//!
//! [`EventSurface`] has one method per transport event and no default bodies:
//! adding a [`ClientEvent`] variant or a trait method fails to compile until
//! every implementor answers it explicitly.

use super::types::*;
use crate::{connection::Client, error::GatewayError};
use async_trait::async_trait;

#[async_trait]
pub trait EventSurface: Send + Sync {
    /// Connection heartbeat.
    async fn on_alive(&self, client: &Client);

    /// Connection closed. Resource cleanup belongs to the transport.
    async fn on_disconnect(&self, client: &Client, event: &DisconnectEvent);

    async fn on_subscribe(
        &self,
        client: &Client,
        event: &SubscribeEvent,
    ) -> Result<SubscribeReply, GatewayError>;

    async fn on_unsubscribe(&self, client: &Client, event: &UnsubscribeEvent);

    async fn on_publish(
        &self,
        client: &Client,
        event: &PublishEvent,
    ) -> Result<PublishReply, GatewayError>;

    async fn on_rpc(&self, client: &Client, event: &RpcEvent) -> Result<RpcReply, GatewayError>;

    async fn on_refresh(
        &self,
        client: &Client,
        event: &RefreshEvent,
    ) -> Result<RefreshReply, GatewayError>;

    async fn on_sub_refresh(
        &self,
        client: &Client,
        event: &SubRefreshEvent,
    ) -> Result<SubRefreshReply, GatewayError>;

    async fn on_message(&self, client: &Client, event: &MessageEvent);

    async fn on_presence(
        &self,
        client: &Client,
        event: &PresenceEvent,
    ) -> Result<PresenceReply, GatewayError>;

    async fn on_presence_stats(
        &self,
        client: &Client,
        event: &PresenceStatsEvent,
    ) -> Result<PresenceStatsReply, GatewayError>;

    async fn on_history(
        &self,
        client: &Client,
        event: &HistoryEvent,
    ) -> Result<HistoryReply, GatewayError>;
}

/// Routes an event to the matching [`EventSurface`] hook.
pub async fn dispatch_event<S>(
    surface: &S,
    client: &Client,
    event: &ClientEvent,
) -> Result<EventReply, GatewayError>
where
    S: EventSurface + ?Sized,
{
    let reply = match event {
        ClientEvent::Alive => {
            surface.on_alive(client).await;
            EventReply::None
        }
        ClientEvent::Disconnect(e) => {
            surface.on_disconnect(client, e).await;
            EventReply::None
        }
        ClientEvent::Subscribe(e) => EventReply::Subscribe(surface.on_subscribe(client, e).await?),
        ClientEvent::Unsubscribe(e) => {
            surface.on_unsubscribe(client, e).await;
            EventReply::None
        }
        ClientEvent::Publish(e) => EventReply::Publish(surface.on_publish(client, e).await?),
        ClientEvent::Rpc(e) => EventReply::Rpc(surface.on_rpc(client, e).await?),
        ClientEvent::Refresh(e) => EventReply::Refresh(surface.on_refresh(client, e).await?),
        ClientEvent::SubRefresh(e) => {
            EventReply::SubRefresh(surface.on_sub_refresh(client, e).await?)
        }
        ClientEvent::Message(e) => {
            surface.on_message(client, e).await;
            EventReply::None
        }
        ClientEvent::Presence(e) => EventReply::Presence(surface.on_presence(client, e).await?),
        ClientEvent::PresenceStats(e) => {
            EventReply::PresenceStats(surface.on_presence_stats(client, e).await?)
        }
        ClientEvent::History(e) => EventReply::History(surface.on_history(client, e).await?),
    };
    Ok(reply)
}
