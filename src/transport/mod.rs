use core::future::Future;
use core::pin::Pin;

use crate::error::Result;

/// Boxed future returned by [`FrameTransport`] methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A message-oriented channel to one module.
///
/// Implementations deliver whole text frames. They do not apply timeouts; the exchange
/// bounds each wait itself.
pub trait FrameTransport: Send {
    /// Send one text frame.
    fn send_text<'a>(&'a mut self, frame: &'a str) -> TransportFuture<'a, ()>;

    /// Wait for the next text frame.
    ///
    /// A peer close before a frame arrives is [`crate::Error::ConnectionClosed`].
    fn recv_text(&mut self) -> TransportFuture<'_, String>;

    /// Close the channel.
    fn close(&mut self) -> TransportFuture<'_, ()>;
}

pub(crate) mod websocket;
