#![allow(clippy::unwrap_used)]
// End-to-end tests for `Controller` against wiremock Kodi and TVHeadend servers.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use kodilink_core::{
    Attribute, Backend, BroadcastSink, BrowseModel, ChannelGroup, Command, CommandResult,
    ConnectionStatus, Controller, CoreError, Endpoint, EntityEvent, EpgScope, IntegrationConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

/// JSON-RPC reply echoing the request id.
struct RpcReply {
    result: Value,
    delay: Duration,
}

impl Respond for RpcReply {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
        ResponseTemplate::new(200)
            .set_body_json(json!({
                "jsonrpc": "2.0",
                "id": body["id"],
                "result": self.result,
            }))
            .set_delay(self.delay)
    }
}

async fn mount_rpc(server: &MockServer, rpc_method: &str, result: Value) {
    mount_rpc_delayed(server, rpc_method, result, Duration::ZERO).await;
}

async fn mount_rpc_delayed(server: &MockServer, rpc_method: &str, result: Value, delay: Duration) {
    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(RpcReply { result, delay })
        .mount(server)
        .await;
}

/// Kodi with one TV channel (BBC One, number 3) and no radio channels.
async fn mount_kodi_basics(server: &MockServer) {
    mount_rpc(server, "JSONRPC.Ping", json!("pong")).await;
    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .and(body_partial_json(json!({
            "method": "PVR.GetChannels",
            "params": { "channelgroupid": "alltv" }
        })))
        .respond_with(RpcReply {
            result: json!({ "channels": [
                { "channelid": 7, "channelnumber": 3, "label": "BBC One", "thumbnail": "" }
            ]}),
            delay: Duration::ZERO,
        })
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .and(body_partial_json(json!({
            "method": "PVR.GetChannels",
            "params": { "channelgroupid": "allradio" }
        })))
        .respond_with(RpcReply {
            result: json!({ "channels": [] }),
            delay: Duration::ZERO,
        })
        .mount(server)
        .await;
    mount_rpc(server, "Application.GetProperties", json!({ "volume": 40, "muted": false })).await;
}

async fn mount_playing_news(server: &MockServer) {
    mount_rpc(server, "Player.GetActivePlayers", json!([{ "playerid": 1, "type": "video" }])).await;
    mount_rpc(
        server,
        "Player.GetItem",
        json!({ "item": { "type": "channel", "title": "News", "label": "BBC One", "thumbnail": "" } }),
    )
    .await;
    mount_rpc(
        server,
        "Player.GetProperties",
        json!({
            "speed": 1,
            "time": { "hours": 0, "minutes": 1, "seconds": 0, "milliseconds": 0 },
            "totaltime": { "hours": 0, "minutes": 30, "seconds": 0, "milliseconds": 0 }
        }),
    )
    .await;
}

async fn mount_tvheadend(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/serverinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Tvheadend",
            "sw_version": "4.3",
            "api_version": 19
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/channel/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [
                { "key": "uuid-123", "val": "BBC One" },
                { "key": "uuid-456", "val": "BBC Two" }
            ]
        })))
        .mount(server)
        .await;
}

fn endpoint(server: &MockServer) -> Endpoint {
    Endpoint::new(Url::parse(&server.uri()).unwrap())
}

/// A listener standing in for the Kodi event server.
async fn event_server() -> (TcpListener, Endpoint) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let url = Url::parse(&format!("tcp://127.0.0.1:{port}")).unwrap();
    (listener, Endpoint::new(url))
}

fn fast_config() -> IntegrationConfig {
    IntegrationConfig {
        poll_interval: Duration::from_millis(50),
        epg_interval: Duration::from_millis(50),
        progress_tick: Duration::from_millis(100),
        retry_delay: Duration::from_millis(10),
        max_probe_attempts: 2,
        liveness_every: 0,
        ..IntegrationConfig::default()
    }
}

async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_without_backends_fails_fast() {
    let ctrl = Controller::new(IntegrationConfig::default(), Arc::new(BroadcastSink::new()));
    let err = ctrl.connect().await.unwrap_err();
    assert!(matches!(err, CoreError::NotConfigured));
    assert!(!ctrl.is_connected().await);
}

#[tokio::test]
async fn test_commands_need_a_connection() {
    let ctrl = Controller::new(IntegrationConfig::default(), Arc::new(BroadcastSink::new()));
    let err = ctrl.execute(Command::PlayPause).await.unwrap_err();
    assert!(matches!(err, CoreError::Disconnected));
}

#[tokio::test]
async fn test_full_session_maps_channels_polls_player_and_loads_epg() {
    let kodi = MockServer::start().await;
    let tvh = MockServer::start().await;
    mount_kodi_basics(&kodi).await;
    mount_playing_news(&kodi).await;
    mount_tvheadend(&tvh).await;

    let now = chrono::Utc::now().timestamp();
    Mock::given(method("GET"))
        .and(path("/api/epg/events/grid"))
        .and(query_param("channel", "uuid-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [{
                "channelUuid": "uuid-123",
                "start": now - 600,
                "stop": now + 1800,
                "title": "News"
            }],
            "totalCount": 1
        })))
        .expect(1)
        .mount(&tvh)
        .await;

    let data_dir = tempfile::tempdir().unwrap();
    let (_listener, events) = event_server().await;
    let config = IntegrationConfig {
        kodi: Some(endpoint(&kodi)),
        kodi_events: Some(events),
        tvheadend: Some(endpoint(&tvh)),
        data_dir: Some(data_dir.path().to_path_buf()),
        ..fast_config()
    };
    let sink = Arc::new(BroadcastSink::new());
    let ctrl = Controller::new(config, sink.clone());

    ctrl.connect().await.unwrap();
    assert_eq!(ctrl.status(Backend::Kodi), ConnectionStatus::Online);
    assert_eq!(ctrl.status(Backend::Tvheadend), ConnectionStatus::Online);
    assert_eq!(ctrl.status(Backend::EventSocket), ConnectionStatus::Online);

    // Mapping joined on the label and persisted.
    let tv = ctrl.mapping(ChannelGroup::Tv).await;
    assert_eq!(tv.uuid_for(3), Some("uuid-123"));
    assert_eq!(tv.number_for("uuid-123"), Some(3));
    assert_eq!(tv.len(), 1);
    let stored = ctrl.mapping_store().unwrap().load().unwrap().unwrap();
    assert_eq!(stored.tv, tv);

    // Player snapshot filled by the poll cycle.
    wait_until(|| async { ctrl.player_snapshot().await.duration_secs == 1800 }).await;
    let snapshot = ctrl.player_snapshot().await;
    assert_eq!(snapshot.title, "News");
    assert_eq!(snapshot.artist, "BBC One");
    assert_eq!(snapshot.media_type, "channel");
    assert!(snapshot.is_playing);

    // EPG: one fetch per pass, the second pass finds a fresh cache.
    ctrl.run_epg_pass().await.unwrap();
    assert!(ctrl.epg_expiration().await.is_some());
    assert_eq!(ctrl.run_epg_pass().await.unwrap(), 0);

    let CommandResult::Browse(model) = ctrl.execute(Command::ShowEpg(EpgScope::All)).await.unwrap()
    else {
        panic!("expected a browse model");
    };
    let BrowseModel::Epg(grid) = model.as_ref() else {
        panic!("expected an EPG grid");
    };
    let news: Vec<_> = grid.programs().filter(|p| p.title == "News").collect();
    assert_eq!(news.len(), 1);
    assert_eq!(news[0].y, 3);

    let CommandResult::Browse(model) = ctrl
        .execute(Command::ShowChannelPrograms { channel_id: 7 })
        .await
        .unwrap()
    else {
        panic!("expected a browse model");
    };
    let BrowseModel::Programs(programs) = model.as_ref() else {
        panic!("expected a program list");
    };
    assert_eq!(programs.items.len(), 1);
    assert!(programs.items[0].title.ends_with(" News"));

    ctrl.disconnect().await;
    assert!(!ctrl.is_connected().await);
    assert!(ctrl.player_snapshot().await.is_clear());
}

#[tokio::test]
async fn test_cached_mapping_skips_reconciliation() {
    let kodi = MockServer::start().await;
    let tvh = MockServer::start().await;
    mount_kodi_basics(&kodi).await;
    mount_rpc(&kodi, "Player.GetActivePlayers", json!([])).await;
    mount_tvheadend(&tvh).await;

    let data_dir = tempfile::tempdir().unwrap();
    let (_listener, events) = event_server().await;
    let config = IntegrationConfig {
        kodi: Some(endpoint(&kodi)),
        kodi_events: Some(events),
        tvheadend: Some(endpoint(&tvh)),
        data_dir: Some(data_dir.path().to_path_buf()),
        epg_interval: Duration::from_secs(3600),
        ..fast_config()
    };

    let first = Controller::new(config.clone(), Arc::new(BroadcastSink::new()));
    first.connect().await.unwrap();
    first.disconnect().await;

    // A fresh controller reads the mapping back without asking TVHeadend.
    tvh.reset().await;
    Mock::given(method("GET"))
        .and(path("/api/serverinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "Tvheadend" })))
        .mount(&tvh)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/channel/list"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&tvh)
        .await;

    let second = Controller::new(config, Arc::new(BroadcastSink::new()));
    second.connect().await.unwrap();
    assert_eq!(second.mapping(ChannelGroup::Tv).await.uuid_for(3), Some("uuid-123"));
    second.disconnect().await;
}

#[tokio::test]
async fn test_disconnect_during_in_flight_poll_clears_player() {
    let kodi = MockServer::start().await;
    mount_kodi_basics(&kodi).await;
    mount_rpc_delayed(
        &kodi,
        "Player.GetActivePlayers",
        json!([{ "playerid": 1, "type": "video" }]),
        Duration::from_secs(3),
    )
    .await;

    let (_listener, events) = event_server().await;
    let config = IntegrationConfig {
        kodi: Some(endpoint(&kodi)),
        kodi_events: Some(events),
        ..fast_config()
    };
    let sink = Arc::new(BroadcastSink::new());
    let ctrl = Controller::new(config, sink.clone());
    ctrl.connect().await.unwrap();
    assert_eq!(ctrl.status(Backend::Tvheadend), ConnectionStatus::Unconfigured);

    tokio::time::sleep(Duration::from_millis(150)).await;
    let mut rx = sink.subscribe();
    tokio::time::timeout(Duration::from_secs(1), ctrl.disconnect())
        .await
        .expect("disconnect must not wait for the pending poll");

    assert!(ctrl.player_snapshot().await.is_clear());
    assert_eq!(ctrl.status(Backend::Kodi), ConnectionStatus::Offline);
    assert_eq!(ctrl.status(Backend::Tvheadend), ConnectionStatus::Unconfigured);

    // Nothing from the abandoned request reaches the entity.
    tokio::time::sleep(Duration::from_millis(200)).await;
    while let Ok(event) = rx.try_recv() {
        if let EntityEvent::Attribute { update, .. } = event.as_ref() {
            assert_ne!(update.attribute, Attribute::MediaTitle);
        }
    }
}

#[tokio::test]
async fn test_unreachable_kodi_exhausts_probes_and_prompts() {
    let kodi = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&kodi)
        .await;

    let config = IntegrationConfig {
        kodi: Some(endpoint(&kodi)),
        ..fast_config()
    };
    let sink = Arc::new(BroadcastSink::new());
    let mut rx = sink.subscribe();
    let ctrl = Controller::new(config, sink.clone());

    let err = ctrl.connect().await.unwrap_err();
    assert!(
        matches!(err, CoreError::ConnectionFailed { backend: Backend::Kodi, attempts: 2, .. }),
        "unexpected error: {err:?}"
    );
    assert_eq!(ctrl.status(Backend::Kodi), ConnectionStatus::Offline);
    assert!(!ctrl.is_connected().await);

    let prompted = std::iter::from_fn(|| rx.try_recv().ok())
        .any(|e| matches!(e.as_ref(), EntityEvent::ReconnectPrompt { .. }));
    assert!(prompted);
}

#[tokio::test]
async fn test_tvheadend_alone_is_enough_to_connect() {
    let tvh = MockServer::start().await;
    mount_tvheadend(&tvh).await;

    let config = IntegrationConfig {
        tvheadend: Some(endpoint(&tvh)),
        epg_interval: Duration::from_secs(3600),
        ..fast_config()
    };
    let ctrl = Controller::new(config, Arc::new(BroadcastSink::new()));
    ctrl.connect().await.unwrap();
    assert_eq!(ctrl.status(Backend::Kodi), ConnectionStatus::Unconfigured);

    let err = ctrl.execute(Command::PlayPause).await.unwrap_err();
    assert!(matches!(err, CoreError::Unsupported { .. }));
    ctrl.disconnect().await;
}

#[tokio::test]
async fn test_stop_without_active_player_is_rejected() {
    let kodi = MockServer::start().await;
    mount_kodi_basics(&kodi).await;
    mount_rpc(&kodi, "Player.GetActivePlayers", json!([])).await;

    let (_listener, events) = event_server().await;
    let config = IntegrationConfig {
        kodi: Some(endpoint(&kodi)),
        kodi_events: Some(events),
        ..fast_config()
    };
    let ctrl = Controller::new(config, Arc::new(BroadcastSink::new()));
    ctrl.connect().await.unwrap();

    let err = ctrl.execute(Command::Stop).await.unwrap_err();
    assert!(
        matches!(&err, CoreError::Unsupported { reason, .. } if reason == "no active player"),
        "unexpected error: {err:?}"
    );
    ctrl.disconnect().await;
}

#[tokio::test]
async fn test_set_volume_publishes_new_level() {
    let kodi = MockServer::start().await;
    mount_kodi_basics(&kodi).await;
    mount_rpc(&kodi, "Player.GetActivePlayers", json!([])).await;
    mount_rpc(&kodi, "Application.SetVolume", json!(25)).await;

    let (_listener, events) = event_server().await;
    let config = IntegrationConfig {
        kodi: Some(endpoint(&kodi)),
        kodi_events: Some(events),
        ..fast_config()
    };
    let sink = Arc::new(BroadcastSink::new());
    let mut rx = sink.subscribe();
    let ctrl = Controller::new(config, sink.clone());
    ctrl.connect().await.unwrap();

    let result = ctrl.execute(Command::SetVolume(25)).await.unwrap();
    assert!(matches!(result, CommandResult::Volume(25)));
    assert_eq!(ctrl.volume().await, Some(25));

    let published = std::iter::from_fn(|| rx.try_recv().ok()).any(|e| {
        matches!(e.as_ref(), EntityEvent::Attribute { update, .. }
            if update.attribute == Attribute::Volume && update.value.to_string() == "25")
    });
    assert!(published);
    ctrl.disconnect().await;
}

#[tokio::test]
async fn test_quit_notification_tears_session_down() {
    let kodi = MockServer::start().await;
    mount_kodi_basics(&kodi).await;
    mount_rpc(&kodi, "Player.GetActivePlayers", json!([])).await;

    let (listener, events) = event_server().await;
    let config = IntegrationConfig {
        kodi: Some(endpoint(&kodi)),
        kodi_events: Some(events),
        ..fast_config()
    };
    let ctrl = Controller::new(config, Arc::new(BroadcastSink::new()));
    ctrl.connect().await.unwrap();

    let (mut stream, _) = listener.accept().await.unwrap();
    stream
        .write_all(br#"{"jsonrpc":"2.0","method":"System.OnQuit","params":{"data":null,"sender":"xbmc"}}"#)
        .await
        .unwrap();

    wait_until(|| async { !ctrl.is_connected().await }).await;
    assert_eq!(ctrl.status(Backend::Kodi), ConnectionStatus::Offline);
    assert_eq!(ctrl.status(Backend::EventSocket), ConnectionStatus::Offline);
}

/// Number of JSON-RPC calls to `rpc_method` the mock has seen.
async fn calls(server: &MockServer, rpc_method: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| {
            serde_json::from_slice::<Value>(&r.body).is_ok_and(|b| b["method"] == rpc_method)
        })
        .count()
}

#[tokio::test]
async fn test_resume_notification_polls_immediately() {
    let kodi = MockServer::start().await;
    mount_kodi_basics(&kodi).await;
    mount_rpc(&kodi, "Player.GetActivePlayers", json!([])).await;

    let (listener, events) = event_server().await;
    let config = IntegrationConfig {
        kodi: Some(endpoint(&kodi)),
        kodi_events: Some(events),
        poll_interval: Duration::from_secs(3600),
        ..fast_config()
    };
    let ctrl = Controller::new(config, Arc::new(BroadcastSink::new()));
    ctrl.connect().await.unwrap();
    let (mut stream, _) = listener.accept().await.unwrap();

    // The interval fires once right away; after that only a notification polls.
    wait_until(|| async { calls(&kodi, "Player.GetActivePlayers").await >= 1 }).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let before = calls(&kodi, "Player.GetActivePlayers").await;

    stream
        .write_all(br#"{"jsonrpc":"2.0","method":"Player.OnResume","params":{"data":{"player":{"playerid":1}},"sender":"xbmc"}}"#)
        .await
        .unwrap();

    wait_until(|| async { calls(&kodi, "Player.GetActivePlayers").await > before }).await;
    ctrl.disconnect().await;
}

#[tokio::test]
async fn test_paused_channel_can_be_resumed() {
    let kodi = MockServer::start().await;
    mount_kodi_basics(&kodi).await;
    mount_rpc(&kodi, "Player.GetActivePlayers", json!([{ "playerid": 1, "type": "video" }])).await;
    mount_rpc(
        &kodi,
        "Player.GetItem",
        json!({ "item": { "type": "channel", "title": "News", "label": "BBC One", "thumbnail": "" } }),
    )
    .await;
    mount_rpc(
        &kodi,
        "Player.GetProperties",
        json!({
            "speed": 0,
            "time": { "hours": 0, "minutes": 1, "seconds": 0, "milliseconds": 0 },
            "totaltime": { "hours": 0, "minutes": 30, "seconds": 0, "milliseconds": 0 }
        }),
    )
    .await;
    mount_rpc(&kodi, "Player.PlayPause", json!({ "speed": 1 })).await;

    let (_listener, events) = event_server().await;
    let config = IntegrationConfig {
        kodi: Some(endpoint(&kodi)),
        kodi_events: Some(events),
        ..fast_config()
    };
    let sink = Arc::new(BroadcastSink::new());
    let ctrl = Controller::new(config, sink.clone());
    ctrl.connect().await.unwrap();

    wait_until(|| async { calls(&kodi, "Player.GetProperties").await >= 1 }).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let snapshot = ctrl.player_snapshot().await;
    assert!(snapshot.is_clear());
    assert_eq!(snapshot.player_id, Some(1));

    // Further ticks leave the paused entity alone.
    let mut rx = sink.subscribe();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let churn = std::iter::from_fn(|| rx.try_recv().ok())
        .filter(|e| matches!(e.as_ref(), EntityEvent::Attribute { .. }))
        .count();
    assert_eq!(churn, 0);

    ctrl.execute(Command::PlayPause).await.unwrap();
    ctrl.disconnect().await;
    assert_eq!(ctrl.player_snapshot().await.player_id, None);
}

#[tokio::test]
async fn test_disconnect_cancels_a_connect_in_progress() {
    let kodi = MockServer::start().await;
    mount_rpc_delayed(&kodi, "JSONRPC.Ping", json!("pong"), Duration::from_secs(30)).await;

    let config = IntegrationConfig {
        kodi: Some(endpoint(&kodi)),
        timeout: Duration::from_secs(2),
        max_probe_attempts: 3,
        ..fast_config()
    };
    let ctrl = Controller::new(config, Arc::new(BroadcastSink::new()));

    let connecting = tokio::spawn({
        let ctrl = ctrl.clone();
        async move { ctrl.connect().await }
    });
    wait_until(|| async { ctrl.status(Backend::Kodi) == ConnectionStatus::Connecting }).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    tokio::time::timeout(Duration::from_millis(500), ctrl.disconnect())
        .await
        .expect("disconnect must not wait for the probes");

    let result = tokio::time::timeout(Duration::from_millis(500), connecting)
        .await
        .expect("connect must stop once cancelled")
        .unwrap();
    assert!(matches!(result, Err(CoreError::Disconnected)), "unexpected result: {result:?}");
    assert!(!ctrl.is_connected().await);
    assert_eq!(ctrl.status(Backend::Kodi), ConnectionStatus::Offline);
}
