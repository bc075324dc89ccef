use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rustls::ClientConfig;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};

use crate::error::{Error, Result};
use crate::transport::{FrameTransport, TransportFuture};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A single WebSocket session to a module.
pub struct WsTransport {
    ws: WsStream,
}

impl WsTransport {
    /// Open a WebSocket session to `uri`.
    ///
    /// `wss://` URIs use `tls`; `ws://` URIs connect in the clear. The whole handshake
    /// (DNS, TCP, TLS, HTTP upgrade) must finish within `connect_timeout`.
    pub async fn connect(
        uri: &str,
        tls: Arc<ClientConfig>,
        connect_timeout: Duration,
    ) -> Result<Self> {
        check_scheme(uri)?;
        let request = uri.into_client_request().map_err(|e| Error::InvalidUri {
            uri: uri.to_string(),
            reason: match e {
                tokio_tungstenite::tungstenite::Error::Url(_) => "not a websocket url",
                _ => "cannot build upgrade request",
            },
        })?;

        let connect =
            connect_async_tls_with_config(request, None, true, Some(Connector::Rustls(tls)));
        let (ws, response) = tokio::time::timeout(connect_timeout, connect)
            .await
            .map_err(|_| {
                Error::Connection(format!("handshake not finished after {connect_timeout:?}"))
            })?
            .map_err(Error::connection)?;

        crate::debug::note(uri, &format!("websocket upgraded ({})", response.status()));
        Ok(Self { ws })
    }

    async fn recv_text_impl(&mut self) -> Result<String> {
        loop {
            let message = match self.ws.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(Error::connection(e)),
                None => return Err(Error::ConnectionClosed),
            };

            match message {
                Message::Text(text) => return Ok(text),
                Message::Binary(bytes) => {
                    return String::from_utf8(bytes)
                        .map_err(|_| Error::Protocol("binary frame is not UTF-8 text"));
                }
                Message::Close(_) => return Err(Error::ConnectionClosed),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }
}

impl FrameTransport for WsTransport {
    fn send_text<'a>(&'a mut self, frame: &'a str) -> TransportFuture<'a, ()> {
        Box::pin(async move {
            self.ws
                .send(Message::Text(frame.to_string()))
                .await
                .map_err(Error::connection)
        })
    }

    fn recv_text(&mut self) -> TransportFuture<'_, String> {
        Box::pin(self.recv_text_impl())
    }

    fn close(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move { self.ws.close(None).await.map_err(Error::connection) })
    }
}

pub(crate) fn check_scheme(uri: &str) -> Result<()> {
    let scheme = uri.split_once("://").map(|(scheme, _)| scheme);
    match scheme {
        Some(s) if s.eq_ignore_ascii_case("wss") || s.eq_ignore_ascii_case("ws") => Ok(()),
        Some(_) => Err(Error::InvalidUri {
            uri: uri.to_string(),
            reason: "scheme must be wss:// or ws://",
        }),
        None => Err(Error::InvalidUri {
            uri: uri.to_string(),
            reason: "missing scheme, expected wss://host:port",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_check() {
        assert!(check_scheme("wss://192.168.0.130:55688").is_ok());
        assert!(check_scheme("ws://127.0.0.1:9000").is_ok());
        assert!(matches!(
            check_scheme("https://192.168.0.130"),
            Err(Error::InvalidUri { .. })
        ));
        assert!(matches!(
            check_scheme("192.168.0.130:55688"),
            Err(Error::InvalidUri { .. })
        ));
    }
}
