//! WebSocket transport for the client.
//!
//! Provides [`Socket`] which handles WebSocket I/O for the event stream.
//! This is a thin layer that just sends/receives text frames - connection
//! and subscription logic remains in the Sans-IO [`ChatSession`].
//!
//! [`ChatSession`]: crate::ChatSession

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Message,
        client::IntoClientRequest,
        http::{HeaderValue, header::AUTHORIZATION},
    },
};

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Stream error.
    #[error("stream error: {0}")]
    Stream(String),
}

/// One inbound event from the socket task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketFrame {
    /// A text frame from the server, ready for
    /// [`ChatSession::handle_frame`](crate::ChatSession::handle_frame).
    Text(String),
    /// The connection closed; feed this into
    /// [`ChatSession::transport_closed`](crate::ChatSession::transport_closed).
    Closed {
        /// Close reason, possibly empty.
        reason: String,
    },
}

/// Handle to an open WebSocket connection.
///
/// Provides channels for frame transport. Frames are sent/received via
/// the channels, and an internal task handles the WebSocket I/O.
pub struct Socket {
    /// Send encoded frames to the server.
    pub outgoing: mpsc::Sender<String>,
    /// Receive frames and the close notification from the server.
    pub incoming: mpsc::Receiver<SocketFrame>,
    /// Abort handle to stop the socket task.
    abort_handle: tokio::task::AbortHandle,
}

impl Socket {
    /// Stop the connection.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }
}

/// Open a WebSocket connection to the event gateway.
///
/// Returns a [`Socket`] with channels for frame transport. The bearer
/// token, when present, is sent as an `Authorization` header during the
/// handshake.
///
/// # Errors
///
/// - `TransportError::Connection` if the URL or token is malformed or the
///   handshake fails
pub async fn connect(url: &str, bearer_token: Option<&str>) -> Result<Socket, TransportError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| TransportError::Connection(format!("invalid url: {e}")))?;

    if let Some(token) = bearer_token {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| TransportError::Connection(format!("invalid bearer token: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }

    let (stream, _response) = connect_async(request)
        .await
        .map_err(|e| TransportError::Connection(format!("handshake failed: {e}")))?;

    let (outgoing_tx, outgoing_rx) = mpsc::channel::<String>(32);
    let (incoming_tx, incoming_rx) = mpsc::channel::<SocketFrame>(32);

    // Spawn socket handler
    let handle = tokio::spawn(run_socket(stream, outgoing_rx, incoming_tx));

    Ok(Socket {
        outgoing: outgoing_tx,
        incoming: incoming_rx,
        abort_handle: handle.abort_handle(),
    })
}

/// Run the socket, bridging between channels and the WebSocket.
async fn run_socket(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut outgoing: mpsc::Receiver<String>,
    incoming: mpsc::Sender<SocketFrame>,
) {
    let (mut sink, mut source) = stream.split();

    // Spawn reader task for incoming frames
    let read_handle = tokio::spawn(async move {
        while let Some(next) = source.next().await {
            match next {
                Ok(Message::Text(text)) => {
                    if incoming.send(SocketFrame::Text(text)).await.is_err() {
                        break;
                    }
                },
                // Ping/pong handled by the library; binary frames are not
                // part of the protocol.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_)) => {},
                Ok(Message::Close(frame)) => {
                    let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                    let _ = incoming.send(SocketFrame::Closed { reason }).await;
                    break;
                },
                Err(e) => {
                    let _ = incoming.send(SocketFrame::Closed { reason: e.to_string() }).await;
                    break;
                },
            }
        }
    });

    // Main loop: write outgoing frames
    while let Some(frame) = outgoing.recv().await {
        if let Err(e) = sink.send(Message::Text(frame)).await {
            tracing::warn!(error = %e, "websocket write failed");
            break;
        }
    }

    let _ = sink.close().await;
    read_handle.abort();
}
