//! Wire format of the plugin command channel.
//!
//! A request is a JSON-RPC shaped envelope carrying one or more commands. The module
//! answers with two frames: an acknowledgment whose `params.commandState` says whether
//! the command was taken, then a result frame whose `params.commandAcks` lists
//! per-command outcomes.

use core::fmt;
use core::num::NonZeroU32;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{Command, Target};

/// `jsonrpc` field value.
pub const PROTOCOL_VERSION: &str = "2.0";
/// `method` field value for local plugin commands.
pub const METHOD: &str = "v1/notifyPluginLocalCommand";
/// `commandSource` field value.
pub const COMMAND_SOURCE: &str = "local";
/// `commandState` value that lets the exchange proceed.
pub const STATE_ACCEPTED: &str = "ACCEPTED";

/// Correlation id of a command: `<uuid>|<index>`, index starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId {
    /// Request UUID, identical to `clientAppGUID`.
    pub request_id: Uuid,
    /// 1-based position of the command in the request.
    pub index: u32,
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.request_id, self.index)
    }
}

impl FromStr for CommandId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (uuid, index) = s
            .split_once('|')
            .ok_or(Error::Protocol("commandId has no '|' separator"))?;
        let request_id =
            Uuid::parse_str(uuid).map_err(|_| Error::Protocol("commandId uuid is malformed"))?;
        let index: u32 = index
            .parse()
            .map_err(|_| Error::Protocol("commandId index is not a number"))?;
        if index == 0 {
            return Err(Error::Protocol("commandId index must be positive"));
        }
        Ok(Self { request_id, index })
    }
}

impl Serialize for CommandId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CommandId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Outbound request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Always [`PROTOCOL_VERSION`].
    pub jsonrpc: String,
    /// Always [`METHOD`].
    pub method: String,
    /// Request body.
    pub params: RequestParams,
}

/// Body of a [`RequestEnvelope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParams {
    /// Fresh per request.
    #[serde(rename = "clientAppGUID")]
    pub client_app_guid: Uuid,
    /// Target plugin application.
    #[serde(rename = "appGUID")]
    pub app_guid: String,
    /// Wall-clock time of construction, Unix seconds.
    pub epoch: i64,
    /// `<clientAppGUID>|<index>`.
    pub command_id: CommandId,
    /// Always [`COMMAND_SOURCE`].
    pub command_source: String,
    /// Target module.
    pub module_name: String,
    /// Commands to run.
    pub commands: Vec<Command>,
}

impl RequestEnvelope {
    /// Serialize to the JSON text sent on the wire.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::ProtocolDecode(e.to_string()))
    }

    /// The correlation id carried by this request.
    pub fn command_id(&self) -> CommandId {
        self.params.command_id
    }
}

/// Wrap `command` for `target` with a fresh request id and the current time.
pub fn build_envelope(
    target: &Target,
    command: Command,
    sequence_index: NonZeroU32,
) -> RequestEnvelope {
    build_envelope_at(
        target,
        command,
        sequence_index,
        Uuid::new_v4(),
        chrono::Utc::now().timestamp(),
    )
}

pub(crate) fn build_envelope_at(
    target: &Target,
    command: Command,
    sequence_index: NonZeroU32,
    request_id: Uuid,
    epoch: i64,
) -> RequestEnvelope {
    RequestEnvelope {
        jsonrpc: PROTOCOL_VERSION.to_string(),
        method: METHOD.to_string(),
        params: RequestParams {
            client_app_guid: request_id,
            app_guid: target.app_guid.clone(),
            epoch,
            command_id: CommandId {
                request_id,
                index: sequence_index.get(),
            },
            command_source: COMMAND_SOURCE.to_string(),
            module_name: target.module_name.clone(),
            commands: vec![command],
        },
    }
}

#[derive(Debug, Deserialize)]
struct AckEnvelope {
    params: Option<AckParams>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AckParams {
    command_state: Option<Value>,
    #[serde(default, deserialize_with = "echoed_command_id")]
    command_id: Option<String>,
}

/// An echoed `commandId` is kept only when it is a string. Any other shape is
/// dropped so it cannot affect acceptance or decoding.
fn echoed_command_id<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> core::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(id) => Some(id),
        _ => None,
    })
}

/// Facts taken from an accepted acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgment {
    /// `params.commandId`, when the module echoes it.
    pub command_id: Option<String>,
}

/// Check that `frame` is an acknowledgment with `commandState == "ACCEPTED"`.
///
/// Anything else, including a frame that is not JSON, is [`Error::NotAccepted`] carrying
/// the raw frame.
pub fn parse_ack(frame: &str) -> Result<Acknowledgment> {
    let not_accepted = || Error::NotAccepted {
        payload: frame.to_string(),
    };

    let ack: AckEnvelope = serde_json::from_str(frame).map_err(|_| not_accepted())?;
    let params = ack.params.ok_or_else(not_accepted)?;
    match params.command_state {
        Some(Value::String(state)) if state == STATE_ACCEPTED => Ok(Acknowledgment {
            command_id: params.command_id,
        }),
        _ => Err(not_accepted()),
    }
}

/// Inbound result frame.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ResultEnvelope {
    /// Result body, if present.
    #[serde(default)]
    pub params: Option<ResultParams>,
}

/// Body of a [`ResultEnvelope`].
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultParams {
    /// Echoed correlation id, if the module sends one as a string.
    #[serde(default, deserialize_with = "echoed_command_id")]
    pub command_id: Option<String>,
    /// Per-command outcomes, in command order.
    #[serde(default)]
    pub command_acks: Option<Vec<CommandAck>>,
}

/// Outcome of one command.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct CommandAck {
    /// Returned data. Keys keep the order the module sent them in.
    #[serde(default)]
    pub result: Option<Map<String, Value>>,
    /// Any other fields the module includes.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResultEnvelope {
    /// Decode a result frame.
    pub fn from_json(frame: &str) -> Result<Self> {
        serde_json::from_str(frame).map_err(|e| Error::ProtocolDecode(e.to_string()))
    }

    /// `params.commandId`, if present.
    pub fn command_id(&self) -> Option<&str> {
        self.params.as_ref()?.command_id.as_deref()
    }

    /// `params.commandAcks`, empty when absent.
    pub fn command_acks(&self) -> &[CommandAck] {
        self.params
            .as_ref()
            .and_then(|p| p.command_acks.as_deref())
            .unwrap_or(&[])
    }
}
