use crate::events::*;
use crate::server::handlers::MAX_IN_FLIGHT_COMMANDS;
use crate::test_support::ErrorCounter;
use crate::*;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::instrument::WithSubscriber;

/// Membership oracle whose answers tests can flip between calls.
#[derive(Default)]
struct Roster {
    members: Mutex<HashSet<(i64, i64)>>,
}

impl Roster {
    async fn seat(&self, game_id: i64, user_id: i64) {
        self.members.lock().await.insert((game_id, user_id));
    }

    async fn unseat(&self, game_id: i64, user_id: i64) {
        self.members.lock().await.remove(&(game_id, user_id));
    }
}

#[async_trait]
impl MembershipOracle for Roster {
    async fn is_member(&self, game_id: i64, user_id: i64) -> Result<bool, OracleError> {
        Ok(self.members.lock().await.contains(&(game_id, user_id)))
    }
}

/// Oracle that answers like its roster after a delay.
struct SlowRoster {
    roster: Roster,
    delay: Duration,
}

#[async_trait]
impl MembershipOracle for SlowRoster {
    async fn is_member(&self, game_id: i64, user_id: i64) -> Result<bool, OracleError> {
        tokio::time::sleep(self.delay).await;
        self.roster.is_member(game_id, user_id).await
    }
}

fn gateway(roster: Arc<Roster>) -> GatewayHandler {
    let rpc = DispatchTable::for_games(Arc::new(GameStore::new())).build();
    GatewayHandler::new(ChannelAuthorizer::new(roster), rpc)
}

async fn subscribe(handler: &GatewayHandler, client: &Client, channel: &str) -> Result<EventReply, GatewayError> {
    let event = ClientEvent::Subscribe(SubscribeEvent {
        channel: channel.to_string(),
    });
    dispatch_event(handler, client, &event).await
}

async fn rpc(handler: &GatewayHandler, client: &Client, method: &str, data: &[u8]) -> Result<EventReply, GatewayError> {
    let event = ClientEvent::Rpc(RpcEvent {
        method: method.to_string(),
        data: data.to_vec(),
    });
    dispatch_event(handler, client, &event).await
}

#[tokio::test(flavor = "multi_thread")]
async fn test_user_42_session_scenario() {
    let roster = Arc::new(Roster::default());
    let handler = gateway(roster.clone());
    let client = Client::new(1, "42", None);

    assert_eq!(
        subscribe(&handler, &client, "user_42").await,
        Ok(EventReply::Subscribe(SubscribeReply::default()))
    );
    assert_eq!(
        subscribe(&handler, &client, "user_7").await,
        Err(GatewayError::PermissionDenied)
    );

    roster.seat(100, 42).await;
    assert!(subscribe(&handler, &client, "game_100").await.is_ok());
    roster.unseat(100, 42).await;
    assert_eq!(
        subscribe(&handler, &client, "game_100").await,
        Err(GatewayError::PermissionDenied)
    );

    let Ok(EventReply::Rpc(RpcReply { data })) =
        rpc(&handler, &client, "create_game", br#"{"max_players":4}"#).await
    else {
        panic!("create_game should succeed");
    };
    let created: GameSummary = serde_json::from_slice(&data).unwrap();
    assert_eq!(created.owner_id, 42);
    assert_eq!(created.players, vec![42]);
    assert_eq!(created.max_players, 4);

    assert_eq!(
        rpc(&handler, &client, "delete_game", b"{}").await,
        Err(GatewayError::MethodNotFound)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lobby_and_malformed_game_channels() {
    let handler = gateway(Arc::new(Roster::default()));
    let client = Client::new(1, "42", None);

    assert!(subscribe(&handler, &client, "lobby").await.is_ok());
    assert!(subscribe(&handler, &client, "").await.is_ok());
    assert_eq!(
        subscribe(&handler, &client, "game_abc").await,
        Err(GatewayError::BadRequest)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_query_hooks_are_empty() {
    let handler = gateway(Arc::new(Roster::default()));
    let client = Client::new(1, "42", None);

    for channel in ["user_7", "game_abc", "lobby"] {
        let presence = ClientEvent::Presence(PresenceEvent {
            channel: channel.to_string(),
        });
        let stats = ClientEvent::PresenceStats(PresenceStatsEvent {
            channel: channel.to_string(),
        });
        let history = ClientEvent::History(HistoryEvent {
            channel: channel.to_string(),
            limit: Some(10),
        });

        assert_eq!(
            dispatch_event(&handler, &client, &presence).await,
            Ok(EventReply::Presence(PresenceReply::default()))
        );
        assert_eq!(
            dispatch_event(&handler, &client, &stats).await,
            Ok(EventReply::PresenceStats(PresenceStatsReply::default()))
        );
        assert_eq!(
            dispatch_event(&handler, &client, &history).await,
            Ok(EventReply::History(HistoryReply::default()))
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fire_and_forget_hooks() {
    let handler = gateway(Arc::new(Roster::default()));
    let client = Client::new(1, "42", None);

    let events = [
        ClientEvent::Alive,
        ClientEvent::Unsubscribe(UnsubscribeEvent {
            channel: "user_7".to_string(),
        }),
        ClientEvent::Message(MessageEvent { data: json!("hi") }),
        ClientEvent::Disconnect(DisconnectEvent {
            reason: DisconnectReason::ClientClosed,
        }),
    ];
    for event in &events {
        assert_eq!(dispatch_event(&handler, &client, event).await, Ok(EventReply::None));
    }

    let refresh = ClientEvent::Refresh(RefreshEvent { token: None });
    assert_eq!(
        dispatch_event(&handler, &client, &refresh).await,
        Ok(EventReply::Refresh(RefreshReply::default()))
    );

    let sub_refresh = ClientEvent::SubRefresh(SubRefreshEvent {
        channel: "user_7".to_string(),
    });
    assert_eq!(
        dispatch_event(&handler, &client, &sub_refresh).await,
        Ok(EventReply::SubRefresh(SubRefreshReply::default()))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_publish_policies() {
    let client = Client::new(1, "42", None);
    let event = ClientEvent::Publish(PublishEvent {
        channel: "user_7".to_string(),
        data: json!({"text": "hi"}),
    });

    let open = gateway(Arc::new(Roster::default()));
    assert_eq!(open.publish_policy(), PublishPolicy::AllowAll);
    assert!(dispatch_event(&open, &client, &event).await.is_ok());

    let strict = gateway(Arc::new(Roster::default())).with_publish_policy(PublishPolicy::SubscribeRules);
    assert_eq!(
        dispatch_event(&strict, &client, &event).await,
        Err(GatewayError::PermissionDenied)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rpc_failures_log_once_through_surface() {
    let counter = ErrorCounter::default();
    let handler = gateway(Arc::new(Roster::default()));
    let client = Client::new(1, "42", None);

    async {
        assert_eq!(
            rpc(&handler, &client, "join_game", br#"{"game_id":9}"#).await,
            Err(GatewayError::Handler(HandlerError::new(4004, "game 9 not found")))
        );
        assert_eq!(
            subscribe(&handler, &client, "user_7").await,
            Err(GatewayError::PermissionDenied)
        );
        assert_eq!(
            rpc(&handler, &client, "delete_game", b"").await,
            Err(GatewayError::MethodNotFound)
        );
    }
    .with_subscriber(counter.subscriber())
    .await;

    assert_eq!(counter.errors(), 1);
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_gateway(config: ServerConfig) -> (std::net::SocketAddr, Arc<GameStore>, watch::Sender<bool>) {
    let games = Arc::new(GameStore::new());
    let surface = Arc::new(create_game_gateway(&config, games.clone()));
    let server = create_server_with_config(config, surface, Arc::new(InsecureIdentityResolver));
    let listener = server.bind().await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move { server.serve(listener, shutdown_rx).await });
    (addr, games, shutdown_tx)
}

async fn start_surface(
    surface: GatewayHandler,
) -> (std::net::SocketAddr, Arc<ConnectionManager>, watch::Sender<bool>) {
    let server = create_server_with_config(local_config(), Arc::new(surface), Arc::new(InsecureIdentityResolver));
    let connections = server.connection_manager();
    let listener = server.bind().await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move { server.serve(listener, shutdown_rx).await });
    (addr, connections, shutdown_tx)
}

fn local_config() -> ServerConfig {
    ServerConfig {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        ..Default::default()
    }
}

async fn send(ws: &mut Socket, command: Value) {
    ws.send(Message::Text(command.to_string().into())).await.expect("send");
}

async fn next_json(ws: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("json frame");
        }
    }
}

async fn call(ws: &mut Socket, id: u64, method: &str, params: Value) -> Value {
    send(ws, json!({"id": id, "method": method, "params": params})).await;
    loop {
        let frame = next_json(ws).await;
        if frame["id"] == json!(id) {
            return frame;
        }
    }
}

async fn connect_as(addr: std::net::SocketAddr, user: &str) -> Socket {
    let (mut ws, _) = connect_async(format!("ws://{addr}")).await.expect("connect");
    let reply = call(&mut ws, 1, "connect", json!({"token": user})).await;
    assert_eq!(reply["result"]["user"], json!(user));
    ws
}

#[tokio::test(flavor = "multi_thread")]
async fn test_websocket_subscribe_publish_and_rpc() {
    let (addr, games, shutdown) = start_gateway(local_config()).await;
    let mut alice = connect_as(addr, "42").await;
    let mut bob = connect_as(addr, "7").await;

    let denied = call(&mut alice, 2, "subscribe", json!({"channel": "user_7"})).await;
    assert_eq!(denied["error"]["code"], json!(103));

    let created = call(
        &mut alice,
        3,
        "rpc",
        json!({"method": "create_game", "data": {"max_players": 2}}),
    )
    .await;
    let game_id = created["result"]["data"]["game_id"].as_i64().expect("game id");
    let channel = format!("game_{game_id}");
    assert_eq!(created["result"]["data"]["channel"], json!(channel));

    let not_yet = call(&mut bob, 2, "subscribe", json!({"channel": channel})).await;
    assert_eq!(not_yet["error"]["code"], json!(103));

    let joined = call(
        &mut bob,
        3,
        "rpc",
        json!({"method": "join_game", "data": {"game_id": game_id}}),
    )
    .await;
    assert_eq!(joined["result"]["data"]["players"], json!([42, 7]));
    assert!(games.game(game_id).await.is_some_and(|g| g.is_full()));

    let ok = call(&mut alice, 4, "subscribe", json!({"channel": channel})).await;
    assert_eq!(ok["result"], json!({}));

    let published = call(
        &mut bob,
        4,
        "publish",
        json!({"channel": channel, "data": {"move": "e4"}}),
    )
    .await;
    assert_eq!(published["result"], json!({}));

    let push = next_json(&mut alice).await;
    assert_eq!(push, json!({"push": {"channel": channel, "data": {"move": "e4"}}}));

    let missing = call(&mut alice, 5, "rpc", json!({"method": "delete_game"})).await;
    assert_eq!(missing["error"], json!({"code": 104, "message": "method not found"}));

    let unknown = call(&mut alice, 6, "rpc", json!({"method": "join_game", "data": {"game_id": 999}})).await;
    assert_eq!(unknown["error"]["code"], json!(4004));

    let _ = shutdown.send(true);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_websocket_requires_connect_first() {
    let (addr, _games, shutdown) = start_gateway(local_config()).await;
    let (mut ws, _) = connect_async(format!("ws://{addr}")).await.expect("connect");

    let reply = call(&mut ws, 1, "subscribe", json!({"channel": "lobby"})).await;
    assert_eq!(reply["error"]["code"], json!(103));

    // The gateway closes the socket after refusing the session.
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());

    let _ = shutdown.send(true);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_websocket_disconnect_releases_subscriptions() {
    let config = local_config();
    let games = Arc::new(GameStore::new());
    let surface = Arc::new(create_game_gateway(&config, games));
    let server = Arc::new(create_server_with_config(
        config,
        surface,
        Arc::new(InsecureIdentityResolver),
    ));
    let connections = server.connection_manager();
    let listener = server.bind().await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let serving = server.clone();
    tokio::spawn(async move { serving.serve(listener, shutdown_rx).await });

    let mut ws = connect_as(addr, "42").await;
    let reply = call(&mut ws, 2, "subscribe", json!({"channel": "lobby"})).await;
    assert!(reply["error"].is_null());
    assert_eq!(connections.subscribers("lobby").await.len(), 1);

    ws.close(None).await.expect("close");
    drop(ws);

    let mut released = false;
    for _ in 0..100 {
        if connections.connection_count().await == 0 {
            released = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(released);
    assert!(connections.subscribers("lobby").await.is_empty());

    let _ = shutdown_tx.send(true);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_websocket_malformed_frame_gets_error_reply() {
    let (addr, _games, shutdown) = start_gateway(local_config()).await;
    let mut ws = connect_as(addr, "42").await;

    ws.send(Message::Text("{not json".into())).await.expect("send");
    let reply = next_json(&mut ws).await;
    assert_eq!(reply, json!({"id": 0, "error": {"code": 107, "message": "bad request"}}));

    // The session survives the bad frame.
    let ok = call(&mut ws, 2, "subscribe", json!({"channel": "lobby"})).await;
    assert_eq!(ok["result"], json!({}));

    let _ = shutdown.send(true);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_websocket_unsubscribe_wins_over_slow_subscribe() {
    let oracle = Arc::new(SlowRoster {
        roster: Roster::default(),
        delay: Duration::from_millis(200),
    });
    oracle.roster.seat(1, 42).await;
    let rpc = DispatchTable::for_games(Arc::new(GameStore::new())).build();
    let (addr, connections, shutdown) = start_surface(GatewayHandler::new(ChannelAuthorizer::new(oracle), rpc)).await;

    let mut ws = connect_as(addr, "42").await;
    send(&mut ws, json!({"id": 2, "method": "subscribe", "params": {"channel": "game_1"}})).await;
    send(&mut ws, json!({"id": 3, "method": "unsubscribe", "params": {"channel": "game_1"}})).await;

    let mut pending: HashSet<u64> = [2, 3].into_iter().collect();
    while !pending.is_empty() {
        let reply = next_json(&mut ws).await;
        assert!(reply["error"].is_null(), "unexpected error: {reply}");
        if let Some(id) = reply["id"].as_u64() {
            pending.remove(&id);
        }
    }

    assert!(connections.subscribers("game_1").await.is_empty());

    // Subscribing again afterwards still works.
    let again = call(&mut ws, 4, "subscribe", json!({"channel": "game_1"})).await;
    assert_eq!(again["result"], json!({}));
    assert_eq!(connections.subscribers("game_1").await.len(), 1);

    let _ = shutdown.send(true);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_websocket_caps_commands_in_flight() {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let rpc = {
        let running = running.clone();
        let peak = peak.clone();
        DispatchTable::builder()
            .method(
                "slow",
                handler_fn(move |_client, _payload| {
                    let running = running.clone();
                    let peak = peak.clone();
                    async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, HandlerError>(json!({}))
                    }
                }),
            )
            .build()
    };
    let surface = GatewayHandler::new(ChannelAuthorizer::new(Arc::new(Roster::default())), rpc);
    let (addr, _connections, shutdown) = start_surface(surface).await;

    let mut ws = connect_as(addr, "42").await;
    let total = MAX_IN_FLIGHT_COMMANDS as u64 + 16;
    for id in 2..2 + total {
        send(&mut ws, json!({"id": id, "method": "rpc", "params": {"method": "slow"}})).await;
    }

    let mut replies = 0;
    while replies < total {
        let reply = next_json(&mut ws).await;
        assert_eq!(reply["result"], json!({"data": {}}));
        replies += 1;
    }

    let peak = peak.load(Ordering::SeqCst);
    assert!(peak <= MAX_IN_FLIGHT_COMMANDS, "{peak} commands ran at once");
    assert!(peak > 1, "commands of one connection should still overlap");

    let _ = shutdown.send(true);
}
