use async_trait::async_trait;
use futures_util::StreamExt;
use log::debug;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::{FeedConnection, FeedConnector, FeedEvent};
use crate::error::StreamError;

/// Opens the live results feed over WebSocket.
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

#[async_trait]
impl FeedConnector for WsConnector {
    async fn connect(&self, target: &Url) -> Result<Box<dyn FeedConnection>, StreamError> {
        let (ws_stream, _) = connect_async(target.as_str())
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?;
        Ok(Box::new(WsConnection {
            stream: ws_stream,
            failed: false,
        }))
    }
}

pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    // Set after a read error so the next read reports the close
    failed: bool,
}

#[async_trait]
impl FeedConnection for WsConnection {
    async fn next_event(&mut self) -> FeedEvent {
        if self.failed {
            return FeedEvent::Closed(Some("connection lost".to_string()));
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return FeedEvent::Message(text),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => return FeedEvent::Message(text),
                    Err(_) => debug!("Skipping non UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    return FeedEvent::Closed(frame.map(|f| f.reason.to_string()));
                }
                // Ping/Pong are answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    self.failed = true;
                    return FeedEvent::Error(StreamError::Read(e.to_string()).to_string());
                }
                None => return FeedEvent::Closed(None),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("Error closing results feed: {}", e);
        }
    }
}
