use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::device_config::ConfigError;

/// Result type used across this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
///
/// Every variant is terminal for the invocation that produced it; nothing is retried.
#[derive(Debug, Error)]
pub enum Error {
    /// The command name is not part of the catalog.
    #[error("command {0:?} is not supported")]
    UnsupportedCommand(String),

    /// The command needs an argument and none was given.
    #[error("command {command} requires an argument ({expected})")]
    MissingArgument {
        /// Catalog name of the command.
        command: &'static str,
        /// What the argument should be.
        expected: &'static str,
    },

    /// The target URI is malformed or uses an unsupported scheme.
    #[error("invalid uri {uri:?}: {reason}")]
    InvalidUri {
        /// URI as given by the caller.
        uri: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A `set_config` argument failed validation.
    #[error("invalid configuration: {0}")]
    Validation(#[from] ConfigError),

    /// A file named by the caller could not be read.
    #[error("cannot read {}: {source}", path.display())]
    File {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Only one half of the client certificate/key pair was supplied.
    #[error("incomplete client credential: {0}")]
    IncompleteCredential(&'static str),

    /// Certificate or key material could not be used to build the TLS context.
    #[error("client credential error: {0}")]
    Credential(String),

    /// DNS, TCP, TLS or HTTP upgrade failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// The peer closed the WebSocket before the expected frame arrived.
    #[error("connection closed by the module")]
    ConnectionClosed,

    /// I/O error (socket, OS, etc.).
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// No acknowledgment arrived in time.
    #[error("timeout waiting for acknowledgment after {0:?}")]
    AckTimeout(Duration),

    /// The acknowledgment did not report `ACCEPTED`.
    #[error("command not accepted by oob module. Received: {payload}")]
    NotAccepted {
        /// The raw acknowledgment frame.
        payload: String,
    },

    /// No result arrived in time after the acknowledgment.
    #[error("timeout waiting for result after {0:?}")]
    ResultTimeout(Duration),

    /// A frame could not be decoded as the expected JSON document.
    #[error("protocol decode error: {0}")]
    ProtocolDecode(String),

    /// The peer sent something the protocol does not allow.
    #[error("protocol error: {0}")]
    Protocol(&'static str),
}

impl Error {
    pub(crate) fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn connection(err: impl std::fmt::Display) -> Self {
        Self::Connection(err.to_string())
    }

    /// Short, stable label for the error family. Used as a log field and metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::UnsupportedCommand(_) | Error::MissingArgument { .. } | Error::InvalidUri { .. } => {
                "usage"
            }
            Error::Validation(_) => "validation",
            Error::File { .. } => "file",
            Error::IncompleteCredential(_) | Error::Credential(_) => "credential",
            Error::Connection(_) | Error::ConnectionClosed | Error::Io(_) => "connection",
            Error::AckTimeout(_) => "ack_timeout",
            Error::NotAccepted { .. } => "not_accepted",
            Error::ResultTimeout(_) => "result_timeout",
            Error::ProtocolDecode(_) | Error::Protocol(_) => "protocol",
        }
    }
}
