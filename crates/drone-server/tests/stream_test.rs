//! Realtime stream integration tests against servers bound to ephemeral ports.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use drone_core::{AgentState, ChannelPublisher, GeoPoint, Pipeline, PipelineConfig, TelemetryEvent};
use drone_server::{api, state::AppState};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    command_addr: SocketAddr,
    stream_addr: SocketAddr,
    bus: ChannelPublisher,
    _shutdown: broadcast::Sender<()>,
}

async fn start_server() -> TestServer {
    let (shutdown, _) = broadcast::channel(1);
    let bus = ChannelPublisher::new(1024);
    let agent = AgentState::new(9, "drone", GeoPoint::new(0.0, 0.0, 0.0), 0.5, 10_800.0);
    let config = PipelineConfig {
        tick: Duration::ZERO,
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::spawn(agent, bus.clone(), config, &shutdown);
    let state = Arc::new(AppState::new(
        pipeline.commands.clone(),
        pipeline.sink.clone(),
        None,
        shutdown.clone(),
    ));

    let command_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let stream_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let command_addr = command_listener.local_addr().unwrap();
    let stream_addr = stream_listener.local_addr().unwrap();

    let command_app = api::command_routes().with_state(state.clone());
    let stream_app = api::stream_routes().with_state(state);
    tokio::spawn(async move { axum::serve(command_listener, command_app).await });
    tokio::spawn(async move { axum::serve(stream_listener, stream_app).await });

    TestServer {
        command_addr,
        stream_addr,
        bus,
        _shutdown: shutdown,
    }
}

async fn connect(server: &TestServer) -> Socket {
    let (socket, _) = connect_async(format!("ws://{}/ws", server.stream_addr))
        .await
        .expect("ws connect");
    socket
}

async fn next_text(socket: &mut Socket) -> Option<String> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("no message within timeout")?;
        match msg.ok()? {
            Message::Text(text) => return Some(text),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
}

/// Send a greeting and wait for its echo; the socket is attached once this returns.
async fn handshake(socket: &mut Socket, greeting: &str) -> String {
    socket.send(Message::Text(greeting.to_string())).await.unwrap();
    loop {
        let text = next_text(socket).await.expect("socket closed");
        if text.starts_with("Your message is:") {
            return text;
        }
    }
}

async fn post_fly(server: &TestServer, body: serde_json::Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{}/fly", server.command_addr))
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn echoes_inbound_text() {
    let server = start_server().await;
    let mut socket = connect(&server).await;

    let echo = handshake(&mut socket, "hello drone").await;

    assert!(echo.starts_with("Your message is: hello drone. Time received : "));
}

#[tokio::test]
async fn streams_telemetry_and_publishes_per_tick() {
    let server = start_server().await;
    let mut bus = server.bus.subscribe();
    let mut socket = connect(&server).await;
    handshake(&mut socket, "ready").await;

    let res = post_fly(
        &server,
        json!({
            "path": "random",
            "start": {"lat": 0.0, "lon": 0.0},
            "end": {"lat": 2.0, "lon": 0.0, "alt": 30.0}
        }),
    )
    .await;
    assert_eq!(res.status(), reqwest::StatusCode::OK);

    let mut ticks = Vec::new();
    loop {
        let text = next_text(&mut socket).await.expect("socket closed");
        let event: TelemetryEvent = serde_json::from_str(&text).unwrap();
        let done = event.position() == GeoPoint::new(2.0, 0.0, 30.0);
        assert!(!text.contains("speed"));
        ticks.push(event);
        if done {
            break;
        }
    }
    // Start leg (zero length) + 3 steps of 0.5 + the snap.
    assert_eq!(ticks.len(), 5);

    let mut published = 0;
    while let Ok((topic, _payload)) = bus.try_recv() {
        assert_eq!(topic, "drone-9");
        published += 1;
    }
    assert_eq!(published, ticks.len());
}

#[tokio::test]
async fn newer_connection_replaces_older_sink() {
    let server = start_server().await;
    let mut first = connect(&server).await;
    handshake(&mut first, "first").await;

    let mut second = connect(&server).await;
    handshake(&mut second, "second").await;

    assert!(next_text(&mut first).await.is_none());
}

#[tokio::test]
async fn rejects_malformed_command() {
    let server = start_server().await;

    let res = reqwest::Client::new()
        .post(format!("http://{}/fly", server.command_addr))
        .header("content-type", "application/json")
        .body("{\"path\": 5}")
        .send()
        .await
        .unwrap();

    assert!(res.status().is_client_error());
}
