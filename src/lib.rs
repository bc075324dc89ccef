#![deny(unsafe_code)]
#![warn(missing_docs)]

//! A control client for out-of-band management modules driven over a TLS WebSocket.
//!
//! The crate implements:
//! - the fixed command catalog (`get_config`, `set_config`, `reboot`, `set_certificate`)
//! - validation of `set_config` key/value arguments
//! - the request envelope and its two-frame reply (acknowledgment, then result)
//! - mutual TLS with an optional client certificate
//!
//! It exposes a small public API (`Client`, `ClientBuilder`, `CommandKind`,
//! `DeviceCommand` and the wire types) while keeping transport details internal.
//!
//! ```no_run
//! # async fn example() -> nxoob::Result<()> {
//! use nxoob::{Client, CommandKind};
//!
//! let client = Client::builder("wss://192.168.0.11:55688").build()?;
//! let command = CommandKind::GetConfig.build(None)?;
//! for (key, value) in client.run(&command).await? {
//!     println!("{key}: {value}");
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod commands;
pub mod debug;
mod device_config;
mod error;
mod exchange;
pub mod format;
mod observe;
pub mod protocol;
mod tls;
mod transport;
mod types;

pub use crate::client::{Client, ClientBuilder, DEFAULT_CONNECT_TIMEOUT};
pub use crate::commands::{
    CERTIFICATE_APP_GUID, CERTIFICATE_MODULE, CommandDescriptor, CommandKind, DEVICE_APP_GUID,
    DEVICE_MODULE, DeviceCommand,
};
pub use crate::device_config::{ConfigError, ConfigKey, IP_MODES, ValueRule, parse_assignments};
pub use crate::error::{Error, Result};
pub use crate::exchange::{DEFAULT_REPLY_TIMEOUT, Exchange, ExchangeState, Timeouts};
pub use crate::transport::websocket::WsTransport;
pub use crate::transport::{FrameTransport, TransportFuture};
pub use crate::types::{Command, Param, Route, ServerTrust, Target};
