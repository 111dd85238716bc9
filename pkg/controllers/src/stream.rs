use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use futures_util::StreamExt;
use pkg_types::snapshot::ResourceKind;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::{AUTHORIZATION, ORIGIN};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};

/// One undecoded watch notification.
pub type RawMessage = Vec<u8>;

/// A live subscription to one resource collection.
#[async_trait]
pub trait WatchStream: Send {
    /// Wait for the next message. Any error means the stream is finished.
    async fn next_message(&mut self) -> Result<RawMessage>;
}

/// Opens watch subscriptions against the orchestrator.
#[async_trait]
pub trait StreamConnector: Send + Sync + 'static {
    type Stream: WatchStream + 'static;

    /// Connect and complete the streaming handshake for `url`.
    async fn open(&self, url: &str) -> Result<Self::Stream>;
}

/// Turn the configured API server address into a WebSocket base URL.
/// Accepts `host:port`, `http://host:port` and `ws://host:port`.
pub fn websocket_base(master: &str) -> Result<String> {
    let master = master.trim().trim_end_matches('/');
    if master.is_empty() {
        bail!("orchestrator API address is empty");
    }
    let base = if let Some(rest) = master.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if master.starts_with("ws://") {
        master.to_string()
    } else if master.starts_with("https://") || master.starts_with("wss://") {
        bail!("TLS API endpoints are not supported: {}", master);
    } else if master.contains("://") {
        bail!("unsupported scheme in API address {}", master);
    } else {
        format!("ws://{}", master)
    };
    Ok(base)
}

/// Full watch URL for `kind` under a WebSocket base URL.
pub fn watch_url(base: &str, kind: ResourceKind) -> String {
    format!("{}{}", base, kind.watch_path())
}

/// Watch subscriptions over the orchestrator's WebSocket watch endpoint.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    token: Option<String>,
}

impl WebSocketConnector {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

#[async_trait]
impl StreamConnector for WebSocketConnector {
    type Stream = WebSocketWatch;

    async fn open(&self, url: &str) -> Result<WebSocketWatch> {
        let mut request = url
            .into_client_request()
            .map_err(|e| anyhow!("Invalid watch URL {}: {}", url, e))?;
        let headers = request.headers_mut();
        headers.insert(ORIGIN, HeaderValue::from_str(url)?);
        if let Some(token) = &self.token {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
        }

        info!("Connect to orchestrator watch {}", url);
        let (ws, resp) = connect_async(request)
            .await
            .map_err(|e| anyhow!("WebSocket handshake with {} failed: {}", url, e))?;
        debug!("Watch handshake for {} answered {}", url, resp.status());
        Ok(WebSocketWatch { inner: ws })
    }
}

pub struct WebSocketWatch {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl WatchStream for WebSocketWatch {
    async fn next_message(&mut self) -> Result<RawMessage> {
        loop {
            match self.inner.next().await {
                Some(Ok(msg @ (Message::Text(_) | Message::Binary(_)))) => {
                    return Ok(msg.into_data().to_vec());
                }
                Some(Ok(Message::Close(frame))) => {
                    return Err(anyhow!("watch stream closed by remote: {:?}", frame));
                }
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(anyhow!("watch stream read failed: {}", e)),
                None => return Err(anyhow!("watch stream ended")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        extract::ws::{Message as WsMessage, WebSocketUpgrade},
        http::HeaderMap,
        response::Response,
        routing::get,
    };

    #[test]
    fn test_websocket_base_normalization() {
        assert_eq!(websocket_base("10.0.0.1:8080").unwrap(), "ws://10.0.0.1:8080");
        assert_eq!(websocket_base("http://10.0.0.1:8080/").unwrap(), "ws://10.0.0.1:8080");
        assert_eq!(websocket_base("ws://master:8080").unwrap(), "ws://master:8080");
        assert!(websocket_base("").is_err());
        assert!(websocket_base("https://master:6443").is_err());
        assert!(websocket_base("ftp://master").is_err());
    }

    #[test]
    fn test_watch_urls() {
        let base = websocket_base("master:8080").unwrap();
        assert_eq!(
            watch_url(&base, ResourceKind::Pod),
            "ws://master:8080/api/v1/pods?watch=true"
        );
        assert_eq!(
            watch_url(&base, ResourceKind::Service),
            "ws://master:8080/api/v1/services?watch=true"
        );
    }

    /// Echo the Authorization header, send one event, then close.
    async fn watch_handler(ws: WebSocketUpgrade, headers: HeaderMap) -> Response {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none")
            .to_string();
        ws.on_upgrade(move |mut socket| async move {
            let _ = socket.send(WsMessage::Text(auth.into())).await;
            let _ = socket
                .send(WsMessage::Text(
                    r#"{"type":"ADDED","object":{"metadata":{"name":"web"}}}"#
                        .to_string()
                        .into(),
                ))
                .await;
            let _ = socket.send(WsMessage::Close(None)).await;
        })
    }

    #[tokio::test]
    async fn test_reads_messages_until_remote_close() {
        let app = Router::new().route("/api/v1/pods", get(watch_handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base = websocket_base(&addr.to_string()).unwrap();
        let connector = WebSocketConnector::new(Some("s3cret".to_string()));
        let mut stream = connector
            .open(&watch_url(&base, ResourceKind::Pod))
            .await
            .unwrap();

        assert_eq!(stream.next_message().await.unwrap(), b"Bearer s3cret".to_vec());
        let event = stream.next_message().await.unwrap();
        assert!(String::from_utf8(event).unwrap().contains("\"ADDED\""));
        assert!(stream.next_message().await.is_err());
    }

    #[tokio::test]
    async fn test_open_fails_without_server() {
        let connector = WebSocketConnector::default();
        assert!(
            connector
                .open("ws://127.0.0.1:1/api/v1/pods?watch=true")
                .await
                .is_err()
        );
    }
}
