mod common;

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use replay_core::{
    http, CommandOutcome, GatewayError, InspectorConfig, LiveGateway, OperatorCommand, Session,
};
use telemetry_proto::{decode_frame_json, encode_frame_json, Side};
use tokio::runtime::Runtime;

/// Serve `gateway` on an ephemeral port; the runtime must outlive the test.
fn start_server(gateway: Arc<LiveGateway>) -> Result<(Runtime, SocketAddr)> {
    let runtime = Runtime::new()?;
    let listener = runtime.block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))?;
    let addr = listener.local_addr()?;
    runtime.spawn(http::serve(listener, gateway));
    Ok((runtime, addr))
}

fn request(addr: SocketAddr, method: &str, body: &str) -> Result<(u16, String)> {
    let mut stream = TcpStream::connect(addr).context("connect to gateway")?;
    stream.set_read_timeout(Some(Duration::from_secs(10)))?;
    write!(
        stream,
        "{method} /frame HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )?;
    let mut response = String::new();
    stream.read_to_string(&mut response)?;

    let status = response
        .split_whitespace()
        .nth(1)
        .context("missing status line")?
        .parse()?;
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    Ok((status, body))
}

fn status_field(body: &str) -> Result<String> {
    let reply: Value =
        serde_json::from_str(body).with_context(|| format!("reply body {body:?}"))?;
    reply["status"]
        .as_str()
        .map(str::to_string)
        .context("reply without a status string")
}

fn live_session(config: InspectorConfig) -> (Session, Arc<LiveGateway>) {
    let (session, _renders) = Session::live(config);
    let gateway = Arc::clone(session.gateway().expect("live session has a gateway"));
    (session, gateway)
}

#[test]
fn malformed_post_leaves_state_and_next_post_succeeds() -> Result<()> {
    let (session, gateway) = live_session(common::test_config());
    let (_runtime, addr) = start_server(gateway)?;

    let (status, body) = request(addr, "POST", &common::frame_json(4, 3, 5))?;
    assert_eq!(status, 200);
    assert_eq!(status_field(&body)?, "success");
    let before = session.state().lock().clone();
    assert_eq!(before.score(Side::Red), 5);

    let (status, body) = request(addr, "POST", "{\"step\": 5, \"points\": [")?;
    assert_eq!(status, 400);
    let reply: Value = serde_json::from_str(&body)?;
    assert_eq!(reply["status"], "error");
    assert!(reply["error"].as_str().is_some_and(|error| !error.is_empty()));
    assert_eq!(*session.state().lock(), before);

    let (status, _) = request(addr, "POST", &common::frame_json(5, 4, 5))?;
    assert_eq!(status, 200);
    assert_eq!(session.state().lock().turn_index(), Some(5));

    let metrics = session.metrics();
    assert_eq!(metrics.frames_applied, 2);
    assert_eq!(metrics.frames_rejected, 1);
    Ok(())
}

#[test]
fn non_post_requests_are_refused() -> Result<()> {
    let (session, gateway) = live_session(common::test_config());
    let (_runtime, addr) = start_server(gateway)?;

    let (status, _) = request(addr, "GET", "")?;
    assert_eq!(status, 405);
    assert_eq!(session.state().lock().turn_index(), None);
    Ok(())
}

#[test]
fn reset_marker_clears_live_state() -> Result<()> {
    let (session, gateway) = live_session(common::test_config());
    let (_runtime, addr) = start_server(gateway)?;

    request(addr, "POST", r#"{"step": 3, "relics": [[1, 2]], "points": [1, 1]}"#)?;
    assert_eq!(session.state().lock().frame().relics.len(), 1);

    let (status, _) = request(addr, "POST", r#"{"relics": [[1, 2]]}"#)?;
    assert_eq!(status, 200);
    let state = session.state().lock();
    assert_eq!(state.turn_index(), None);
    assert!(state.frame().relics.is_empty());
    assert_eq!(state.score(Side::Blue), 0);
    Ok(())
}

#[test]
fn concurrent_post_is_busy_until_operator_acknowledges() -> Result<()> {
    let mut config = common::test_config();
    config.gateway.synchronous_ack = true;
    config.gateway.ack_timeout_ms = 10_000;
    let (mut session, renders) = Session::live(config);
    let gateway = Arc::clone(session.gateway().expect("live session has a gateway"));
    let (_runtime, addr) = start_server(gateway)?;

    let first = thread::spawn(move || request(addr, "POST", &common::frame_json(1, 0, 0)));
    let render = renders
        .recv_timeout(Duration::from_secs(10))
        .context("first frame never rendered")?;
    assert_eq!(render.turn_index, Some(1));

    let (status, body) = request(addr, "POST", &common::frame_json(2, 0, 0))?;
    assert_eq!(status, 503);
    assert_eq!(status_field(&body)?, "busy");

    assert_eq!(
        session.handle(OperatorCommand::Acknowledge),
        CommandOutcome::Acknowledged
    );
    let (status, _) = first.join().expect("first request thread")?;
    assert_eq!(status, 200);

    let metrics = session.metrics();
    assert_eq!(metrics.busy_rejections, 1);
    assert_eq!(metrics.implicit_acks, 0);
    assert_eq!(session.state().lock().turn_index(), Some(1));
    Ok(())
}

#[test]
fn unacknowledged_frame_is_released_by_timeout() {
    let mut config = common::test_config();
    config.gateway.synchronous_ack = true;
    config.gateway.ack_timeout_ms = 30;
    let (session, gateway) = live_session(config);

    let reply = gateway.ingest(common::frame_json(9, 1, 2).as_bytes()).unwrap();
    let reply: Value = serde_json::from_slice(&reply).unwrap();
    assert_eq!(reply, serde_json::json!({"status": "success"}));
    assert_eq!(session.metrics().implicit_acks, 1);
    assert!(matches!(
        gateway.ingest(b"[1, 2]"),
        Err(GatewayError::Decode(_))
    ));
}

#[test]
fn applied_frame_reads_back_exactly() {
    let (session, gateway) = live_session(common::test_config());
    let body = r#"{
        "step": [12], "match_step": [2], "points": [7, 4], "wins": [1, 0],
        "unit_move_cost": 2, "unit_sap_cost": [30], "unit_sap_range": 3, "unit_sensor_range": 2,
        "asteroids": [[0, 1]], "nebula": [[1, 1]], "relics": [[3, 3]],
        "vantage_points": [[2, 2]], "halo_tiles": [[2, 3], [3, 2]],
        "blue_shuttles": [[0, 0], [1, 0]], "blue_shuttles_actions": [[1, 0, 0], [5, -2, 1]],
        "red_shuttles": [[3, 3]], "blue_shuttles_energy": [100, 50], "red_shuttles_energy": [75],
        "energy": [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
        "vision": [1, 1, 0, 0, 1, 1, 0, 0, 1, 1, 0, 0, 1, 1, 0, 0],
        "unexplored_frontier": [[3, 0]],
        "ignored_key": {"nested": true}
    }"#;
    gateway.ingest(body.as_bytes()).unwrap();

    let expected = decode_frame_json(body.as_bytes()).unwrap();
    let state = session.state().lock();
    assert_eq!(state.frame(), &expected);
    assert_eq!(state.frame().unit_sap_cost, 30);
    assert_eq!(state.frame().blue_actions[1].dx, -2);

    let canonical = encode_frame_json(state.frame()).unwrap();
    assert_eq!(decode_frame_json(canonical.as_bytes()).unwrap(), expected);
}
