use anyhow::{Context as _, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Url;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};

use crate::connection::{EventSource, FrameStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`EventSource`] that dials the gateway's websocket.
#[derive(Debug, Clone)]
pub struct WebsocketSource {
    url: Url,
}

impl WebsocketSource {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl EventSource for WebsocketSource {
    async fn connect(&self) -> Result<Box<dyn FrameStream>> {
        let (ws, _) = connect_async(self.url.as_str())
            .await
            .with_context(|| format!("failed to connect to {}", self.url))?;

        info!(url = %self.url, "websocket connected");

        Ok(Box::new(WebsocketStream { ws }))
    }
}

struct WebsocketStream {
    ws: WsStream,
}

#[async_trait]
impl FrameStream for WebsocketStream {
    async fn next_frame(&mut self) -> Option<Result<Vec<u8>>> {
        loop {
            let message = match self.ws.next().await? {
                Ok(message) => message,
                Err(err) => return Some(Err(err).context("failed to read from websocket")),
            };

            match message {
                Message::Text(text) => return Some(Ok(text.as_str().as_bytes().to_vec())),
                Message::Binary(data) => return Some(Ok(data.to_vec())),
                Message::Close(frame) => {
                    debug!(?frame, "websocket closed by peer");
                    return None;
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) {
        if let Err(err) = self.ws.close(None).await {
            debug!("failed to close websocket cleanly: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::SinkExt;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use super::*;

    async fn serve_once(messages: Vec<Message>) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            for message in messages {
                ws.send(message).await.unwrap();
            }
            let _ = ws.close(None).await;
            // wait for the client's close reply
            while let Some(Ok(_)) = ws.next().await {}
        });

        Url::parse(&format!("ws://{addr}/")).unwrap()
    }

    #[tokio::test]
    async fn test_frames_until_close() {
        let url = serve_once(vec![
            Message::text(r#"{"t": "event"}"#),
            Message::Ping(vec![1u8].into()),
            Message::binary(b"{}".to_vec()),
        ])
        .await;

        let source = WebsocketSource::new(url);
        let mut stream = source.connect().await.unwrap();

        assert_eq!(
            stream.next_frame().await.unwrap().unwrap(),
            br#"{"t": "event"}"#
        );
        assert_eq!(stream.next_frame().await.unwrap().unwrap(), b"{}");
        assert!(stream.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = WebsocketSource::new(Url::parse(&format!("ws://{addr}/")).unwrap());
        let err = source.connect().await.err().unwrap();
        assert!(format!("{err:#}").contains("failed to connect"));
    }

    #[tokio::test]
    async fn test_wss_negotiates_tls() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut tcp, _) = listener.accept().await.unwrap();
            let mut first = [0u8; 1];
            tcp.read_exact(&mut first).await.unwrap();
            first[0]
        });

        let source = WebsocketSource::new(Url::parse(&format!("wss://{addr}/")).unwrap());
        let result = source.connect().await;

        // 0x16 is a TLS handshake record
        assert_eq!(server.await.unwrap(), 0x16);
        assert!(result.is_err());
    }
}
