//! OCPP WebSocket server
//!
//! Accepts charge station connections at `ws://<host>:<port>/ocpp/{charge_station_id}`.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::negotiator::{Negotiated, ProtocolNegotiator};
use super::router::FrameRouter;
use crate::application::CallContext;
use crate::infrastructure::SharedSessionRegistry;
use crate::shared::shutdown::ShutdownSignal;

type ServerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// OCPP WebSocket Server
pub struct OcppServer {
    sessions: SharedSessionRegistry,
    router: Arc<FrameRouter>,
    negotiator: Arc<ProtocolNegotiator>,
    shutdown: ShutdownSignal,
}

impl OcppServer {
    pub fn new(
        sessions: SharedSessionRegistry,
        router: Arc<FrameRouter>,
        negotiator: ProtocolNegotiator,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            sessions,
            router,
            negotiator: Arc::new(negotiator),
            shutdown,
        }
    }

    pub async fn bind(address: &str) -> ServerResult<TcpListener> {
        Ok(TcpListener::bind(address).await?)
    }

    /// Accept connections until the shutdown signal fires.
    pub async fn run(&self, listener: TcpListener) -> ServerResult<()> {
        let addr = listener.local_addr()?;
        info!("🔌 OCPP Central System started on ws://{}", addr);
        info!(
            "   Charge stations should connect to: ws://{}/ocpp/{{charge_station_id}} ({})",
            addr,
            self.negotiator.supported_subprotocols().join(", ")
        );

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => self.spawn_connection(stream, addr),
                        Err(e) => error!("Failed to accept connection: {}", e),
                    }
                }
                _ = self.shutdown.wait() => {
                    info!(
                        connected = self.sessions.count(),
                        "🛑 WebSocket server received shutdown signal"
                    );
                    return Ok(());
                }
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let sessions = self.sessions.clone();
        let router = self.router.clone();
        let negotiator = self.negotiator.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            if let Err(e) =
                handle_connection(stream, addr, sessions, router, negotiator, shutdown).await
            {
                error!("Connection error from {}: {}", addr, e);
            }
        });
    }

    pub fn sessions(&self) -> &SharedSessionRegistry {
        &self.sessions
    }
}

/// Extract charge station ID from WebSocket request path.
/// Expected format: /ocpp/{charge_station_id} or /{charge_station_id}
fn extract_charge_station_id(path: &str) -> Option<String> {
    let path = path.trim_start_matches('/');

    if let Some(id) = path.strip_prefix("ocpp/") {
        let id = id.trim_start_matches('/');
        if !id.is_empty() && !id.contains('/') {
            return Some(id.to_string());
        }
    }

    if !path.is_empty() && !path.contains('/') {
        return Some(path.to_string());
    }

    None
}

/// Handle a single WebSocket connection
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    sessions: SharedSessionRegistry,
    router: Arc<FrameRouter>,
    negotiator: Arc<ProtocolNegotiator>,
    shutdown: ShutdownSignal,
) -> ServerResult<()> {
    debug!("New connection from: {}", addr);

    let mut handshake: Option<(String, Negotiated)> = None;

    let ws_stream = tokio_tungstenite::accept_hdr_async(
        stream,
        |req: &Request, mut response: Response| {
            let charge_station_id = extract_charge_station_id(req.uri().path())
                .unwrap_or_else(|| format!("CS_{}", addr.port()));

            let requested = req
                .headers()
                .get("Sec-WebSocket-Protocol")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");

            let negotiated = negotiator.negotiate_or_default(&charge_station_id, requested);
            if let Some(subprotocol) = negotiated.subprotocol {
                response
                    .headers_mut()
                    .insert("Sec-WebSocket-Protocol", HeaderValue::from_static(subprotocol));
            }

            handshake = Some((charge_station_id, negotiated));
            Ok(response)
        },
    )
    .await?;

    let (charge_station_id, negotiated) =
        handshake.ok_or("handshake completed without negotiation")?;
    let version = negotiated.version;

    info!(charge_station_id, %version, %addr, "Charge station connected");

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let reply_tx = tx.clone();

    let (connection_id, evicted) = sessions.register(&charge_station_id, tx, version);
    if let Some(old) = evicted {
        let dropped = router.disconnected(&charge_station_id);
        debug!(
            charge_station_id,
            evicted_connection_id = old.connection_id,
            dropped_calls = dropped,
            "Forgot calls of the replaced session"
        );
    }

    // Cancelled on disconnect or server shutdown
    let session_signal = shutdown.child();
    let ctx = CallContext::with_cancellation(session_signal.clone());

    let cs_send = charge_station_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            debug!(charge_station_id = %cs_send, frame = %msg, "->");
            if let Err(e) = ws_sender.send(Message::Text(msg)).await {
                error!(charge_station_id = %cs_send, "Send error: {}", e);
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let cs_recv = charge_station_id.clone();
    let router_recv = router.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    debug!(charge_station_id = %cs_recv, frame = %text, "<-");

                    if let Some(reply) = router_recv.route(&ctx, &cs_recv, version, &text).await {
                        if reply_tx.send(reply).is_err() {
                            break;
                        }
                    }
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Close(frame)) => {
                    debug!(charge_station_id = %cs_recv, "Close frame received: {:?}", frame);
                    break;
                }
                Ok(Message::Binary(data)) => {
                    warn!(
                        charge_station_id = %cs_recv,
                        "Binary message received ({} bytes), ignoring",
                        data.len()
                    );
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => {
                    warn!(charge_station_id = %cs_recv, "WebSocket error: {}", e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {},
        _ = &mut recv_task => {},
        _ = shutdown.wait() => {
            info!(charge_station_id, "Connection closing due to server shutdown");
        }
    }

    session_signal.trigger();
    recv_task.abort();
    send_task.abort();

    // A newer connection may already own the session and its calls
    if sessions.unregister(&charge_station_id, connection_id) {
        let dropped = router.disconnected(&charge_station_id);
        info!(charge_station_id, dropped_calls = dropped, "Charge station disconnected");
    }

    Ok(())
}
