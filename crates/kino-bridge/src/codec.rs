//! Method channel codec
//!
//! Host calls arrive as `{ "method": ..., "arguments": ... }` and are decoded
//! into typed [`Command`]s. Every call gets exactly one [`MethodReply`].

use crate::{error::ChannelError, types::PlayerHandle, Error, Result};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

/// A call as sent by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    pub fn without_arguments(method: impl Into<String>) -> Self {
        Self::new(method, Value::Null)
    }
}

/// Decoded host command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Dispose every player
    Init,
    /// Create a player, replying with its handle
    Create,
    /// Command addressed to one player
    Player {
        handle: PlayerHandle,
        command: PlayerCommand,
    },
}

/// Command forwarded to a single player
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    SetLooping(bool),
    SetVolume(f64),
    SetDataSource(String),
    Play,
    Pause,
    SeekTo(i64),
    Position,
    Dispose,
}

impl PlayerCommand {
    /// Method name on the wire
    pub fn method(&self) -> &'static str {
        match self {
            PlayerCommand::SetLooping(_) => "setLooping",
            PlayerCommand::SetVolume(_) => "setVolume",
            PlayerCommand::SetDataSource(_) => "setDataSource",
            PlayerCommand::Play => "play",
            PlayerCommand::Pause => "pause",
            PlayerCommand::SeekTo(_) => "seekTo",
            PlayerCommand::Position => "position",
            PlayerCommand::Dispose => "dispose",
        }
    }
}

#[derive(Deserialize)]
struct HandleArgs {
    #[serde(alias = "textureId")]
    handle: PlayerHandle,
}

#[derive(Deserialize)]
struct LoopingArgs {
    #[serde(alias = "textureId")]
    handle: PlayerHandle,
    looping: bool,
}

#[derive(Deserialize)]
struct VolumeArgs {
    #[serde(alias = "textureId")]
    handle: PlayerHandle,
    volume: f64,
}

#[derive(Deserialize)]
struct DataSourceArgs {
    #[serde(alias = "textureId")]
    handle: PlayerHandle,
    uri: String,
}

#[derive(Deserialize)]
struct SeekArgs {
    #[serde(alias = "textureId")]
    handle: PlayerHandle,
    #[serde(rename = "positionMs", alias = "location", deserialize_with = "truncated_millis")]
    position_ms: i64,
}

/// Millisecond positions may arrive as any JSON number; fractions are dropped
fn truncated_millis<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    let number = Number::deserialize(deserializer)?;
    number
        .as_i64()
        .or_else(|| number.as_f64().filter(|ms| ms.is_finite()).map(|ms| ms as i64))
        .ok_or_else(|| D::Error::custom(format!("position {number} is out of range")))
}

fn arguments<T: DeserializeOwned>(call: &MethodCall) -> Result<T> {
    serde_json::from_value(call.arguments.clone())
        .map_err(|e| Error::invalid_argument(call.method.as_str(), e))
}

fn addressed(call: &MethodCall, command: PlayerCommand) -> Result<Command> {
    let HandleArgs { handle } = arguments(call)?;
    Ok(Command::Player { handle, command })
}

impl Command {
    /// Decode a host call. Unknown method names yield `NotImplemented`.
    pub fn decode(call: &MethodCall) -> Result<Self> {
        match call.method.as_str() {
            "init" => Ok(Command::Init),
            "create" => Ok(Command::Create),
            "setLooping" => {
                let args: LoopingArgs = arguments(call)?;
                Ok(Command::Player {
                    handle: args.handle,
                    command: PlayerCommand::SetLooping(args.looping),
                })
            }
            "setVolume" => {
                let args: VolumeArgs = arguments(call)?;
                Ok(Command::Player {
                    handle: args.handle,
                    command: PlayerCommand::SetVolume(args.volume),
                })
            }
            "setDataSource" => {
                let args: DataSourceArgs = arguments(call)?;
                Ok(Command::Player {
                    handle: args.handle,
                    command: PlayerCommand::SetDataSource(args.uri),
                })
            }
            "seekTo" => {
                let args: SeekArgs = arguments(call)?;
                Ok(Command::Player {
                    handle: args.handle,
                    command: PlayerCommand::SeekTo(args.position_ms),
                })
            }
            "play" => addressed(call, PlayerCommand::Play),
            "pause" => addressed(call, PlayerCommand::Pause),
            "position" => addressed(call, PlayerCommand::Position),
            "dispose" => addressed(call, PlayerCommand::Dispose),
            other => Err(Error::NotImplemented(other.to_string())),
        }
    }
}

/// Reply to one method call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum MethodReply {
    Success { result: Value },
    Error(ChannelError),
    NotImplemented,
}

impl MethodReply {
    pub fn is_success(&self) -> bool {
        matches!(self, MethodReply::Success { .. })
    }

    /// Result value of a successful call
    pub fn result(&self) -> Option<&Value> {
        match self {
            MethodReply::Success { result } => Some(result),
            _ => None,
        }
    }

    /// Error code of a failed call
    pub fn error_code(&self) -> Option<&str> {
        match self {
            MethodReply::Error(error) => Some(error.code.as_str()),
            _ => None,
        }
    }
}

impl From<Result<Value>> for MethodReply {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(result) => MethodReply::Success { result },
            Err(Error::NotImplemented(_)) => MethodReply::NotImplemented,
            Err(e) => MethodReply::Error(ChannelError::from(&e)),
        }
    }
}
