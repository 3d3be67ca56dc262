//! [`CockpitServer`] – HTTP health endpoint and WebSocket bridge.
//!
//! Listens on `0.0.0.0:8000` (configurable via [`CockpitServer::with_port`]).
//!
//! * Regular HTTP requests → 200 OK with a JSON health body.
//! * WebSocket upgrades → bidirectional bridge to the [`Robot`].
//!
//! # Wire protocol
//!
//! | Direction | Message |
//! |---|---|
//! | down, on connect | `{"type":"status","status":"connected","robot_state":…}` |
//! | down | `{"type":"status","robot_state":…}` for every status event |
//! | down | `{"type":"alert","alert":…}` for every alert |
//! | up | `{"type":"control_command","command":…,"params":…}` |
//! | down, reply | `{"type":"robot_response","status":"ok"\|"dropped"\|"error","action":…}` |
//! | up | `{"type":"set_autonomy","level":"manual"\|"semi"\|"auto"}` |
//! | down, reply | `{"type":"autonomy_changed","level":…}` or `{"type":"error","message":…}` |
//!
//! Upstream messages from one client are applied in arrival order by a
//! per-connection worker, so a long command such as `drop` never stalls the
//! status feed.  `emergency_stop` skips that queue and runs at once.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{Sink, SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tankbot_middleware::Topic;
use tankbot_runtime::{DispatchOutcome, Robot};
use tankbot_types::{Event, EventPayload, TankError, WireCommand};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Default TCP port for the cockpit server.
pub const DEFAULT_PORT: u16 = 8000;

const HEALTH_BODY: &str = r#"{"status":"ok","message":"Robot API is running"}"#;

/// Replies waiting to be written to one client.
const REPLY_BUFFER: usize = 32;

// ─────────────────────────────────────────────────────────────────────────────
// CockpitServer
// ─────────────────────────────────────────────────────────────────────────────

pub struct CockpitServer {
    robot: Arc<Robot>,
    port: u16,
}

impl CockpitServer {
    /// Create a server for `robot` on the [`DEFAULT_PORT`].
    pub fn new(robot: Arc<Robot>) -> Self {
        Self {
            robot,
            port: DEFAULT_PORT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bind the configured port and serve forever.
    ///
    /// # Errors
    ///
    /// Returns [`TankError::Channel`] if the TCP listener cannot bind.
    pub async fn run(self) -> Result<(), TankError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TankError::Channel(format!("cockpit bind error on {addr}: {e}")))?;
        info!(port = self.port, "cockpit listening");
        self.serve(listener).await;
        Ok(())
    }

    /// Accept connections on an already bound listener.
    pub async fn serve(self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let robot = Arc::clone(&self.robot);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, robot).await {
                            warn!(%peer, error = %e, "cockpit client error");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "cockpit accept error"),
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-connection handler
// ─────────────────────────────────────────────────────────────────────────────

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    robot: Arc<Robot>,
) -> Result<(), TankError> {
    // `peek` leaves the request in place for the WebSocket handshake.
    let mut buf = [0u8; 1024];
    let n = stream
        .peek(&mut buf)
        .await
        .map_err(|e| TankError::Channel(format!("peek error from {peer}: {e}")))?;

    let head = String::from_utf8_lossy(&buf[..n]).to_lowercase();
    let is_ws_upgrade = head
        .lines()
        .any(|line| line.starts_with("upgrade:") && line.contains("websocket"));

    if is_ws_upgrade {
        handle_ws(stream, peer, robot).await
    } else {
        serve_health(stream).await
    }
}

async fn serve_health(mut stream: TcpStream) -> Result<(), TankError> {
    let response = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        HEALTH_BODY.len(),
        HEALTH_BODY
    );
    stream
        .write_all(response.as_bytes())
        .await
        .map_err(|e| TankError::Channel(format!("HTTP write error: {e}")))
}

async fn handle_ws(stream: TcpStream, peer: SocketAddr, robot: Arc<Robot>) -> Result<(), TankError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| TankError::Channel(format!("WS handshake from {peer}: {e}")))?;
    info!(%peer, "cockpit client connected");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let mut status_rx = robot.subscribe(Topic::Status);
    let mut alerts_rx = robot.subscribe(Topic::Alerts);

    let hello = json!({
        "type": "status",
        "status": "connected",
        "robot_state": robot.state(),
    });
    send(&mut ws_tx, &hello).await?;

    let (reply_tx, mut reply_rx) = mpsc::channel::<Value>(REPLY_BUFFER);
    let (queue_tx, queue_rx) = mpsc::unbounded_channel::<Upstream>();
    tokio::spawn(run_commands(Arc::clone(&robot), queue_rx, reply_tx.clone()));

    loop {
        let outgoing = tokio::select! {
            event = status_rx.recv() => match forward(event, peer) {
                Forward::Send(msg) => Some(msg),
                Forward::Skip => None,
                Forward::Closed => break,
            },
            event = alerts_rx.recv() => match forward(event, peer) {
                Forward::Send(msg) => Some(msg),
                Forward::Skip => None,
                Forward::Closed => break,
            },
            Some(reply) = reply_rx.recv() => Some(reply),
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    match parse_upstream(text.as_str()) {
                        Some(message) if message.is_emergency_stop() => {
                            let robot = Arc::clone(&robot);
                            let replies = reply_tx.clone();
                            tokio::spawn(async move {
                                let reply = apply_upstream(message, &robot).await;
                                let _ = replies.send(reply).await;
                            });
                        }
                        Some(message) => {
                            if queue_tx.send(message).is_err() {
                                break;
                            }
                        }
                        None => {}
                    }
                    None
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(%peer, error = %e, "websocket read error");
                    break;
                }
                Some(Ok(_)) => None,
            },
        };
        if let Some(msg) = outgoing {
            send(&mut ws_tx, &msg).await?;
        }
    }

    info!(%peer, "cockpit client disconnected");
    Ok(())
}

async fn send<S>(ws_tx: &mut S, msg: &Value) -> Result<(), TankError>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    ws_tx
        .send(Message::Text(msg.to_string().into()))
        .await
        .map_err(|e| TankError::Channel(format!("WS send error: {e}")))
}

/// Apply queued upstream messages one at a time, in arrival order.
async fn run_commands(
    robot: Arc<Robot>,
    mut queue: mpsc::UnboundedReceiver<Upstream>,
    replies: mpsc::Sender<Value>,
) {
    while let Some(message) = queue.recv().await {
        let reply = apply_upstream(message, &robot).await;
        if replies.send(reply).await.is_err() {
            break;
        }
    }
}

enum Forward {
    Send(Value),
    Skip,
    Closed,
}

fn forward(event: Result<Event, RecvError>, peer: SocketAddr) -> Forward {
    match event {
        Ok(event) => Forward::Send(downstream_message(&event)),
        Err(RecvError::Lagged(n)) => {
            warn!(%peer, skipped = n, "cockpit client lagging");
            Forward::Skip
        }
        Err(RecvError::Closed) => Forward::Closed,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Message translation
// ─────────────────────────────────────────────────────────────────────────────

/// Render a bus event for the client.
pub(crate) fn downstream_message(event: &Event) -> Value {
    match &event.payload {
        EventPayload::Status(state) => json!({ "type": "status", "robot_state": state }),
        EventPayload::Alert(alert) => json!({ "type": "alert", "alert": alert }),
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Upstream {
    ControlCommand {
        command: String,
        #[serde(default)]
        params: Value,
    },
    SetAutonomy {
        level: String,
    },
}

impl Upstream {
    fn is_emergency_stop(&self) -> bool {
        matches!(self, Upstream::ControlCommand { command, .. } if command == "emergency_stop")
    }
}

/// Decode one client message.  Malformed or unknown messages are ignored.
fn parse_upstream(text: &str) -> Option<Upstream> {
    serde_json::from_str(text)
        .map_err(|e| debug!(error = %e, "ignoring malformed cockpit message"))
        .ok()
}

/// Apply one client message and build the reply.
async fn apply_upstream(message: Upstream, robot: &Robot) -> Value {
    match message {
        Upstream::ControlCommand { command, params } => {
            let wire = WireCommand::new(command, params);
            let (status, reason) = match robot.execute(&wire).await {
                DispatchOutcome::Applied => ("ok", None),
                DispatchOutcome::Dropped(e) => ("dropped", Some(e.to_string())),
                DispatchOutcome::Failed(e) => ("error", Some(e.to_string())),
            };
            let mut reply = json!({
                "type": "robot_response",
                "status": status,
                "action": wire.command,
            });
            if let Some(reason) = reason {
                reply["reason"] = Value::String(reason);
            }
            reply
        }
        Upstream::SetAutonomy { level } => match robot.set_autonomy_level(&level).await {
            Ok(level) => json!({ "type": "autonomy_changed", "level": level }),
            Err(e) => json!({ "type": "error", "message": e.to_string() }),
        },
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
