//! Output formatting for CLI

use kino_bridge::{MethodCall, MethodReply, PlayerHandle, SinkMessage};
use serde_json::{json, Value};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// One line describing the reply to `call`
pub fn format_reply(call: &MethodCall, reply: &MethodReply, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => compact(&json!({
            "type": "reply",
            "method": call.method,
            "reply": reply,
        })),
        OutputFormat::Text => match reply {
            MethodReply::Success { result } if result.is_null() => {
                format!("<- {} ok", call.method)
            }
            MethodReply::Success { result } => {
                format!("<- {} ok {}", call.method, compact(result))
            }
            MethodReply::Error(error) => {
                format!("<- {} error [{}] {}", call.method, error.code, error.message)
            }
            MethodReply::NotImplemented => format!("<- {} not implemented", call.method),
        },
    }
}

/// One line describing a message from `handle`'s event stream
pub fn format_event(handle: PlayerHandle, message: &SinkMessage, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            let body = match message {
                SinkMessage::Event(event) => json!({ "event": event }),
                SinkMessage::Error(error) => json!({ "error": error }),
                SinkMessage::EndOfStream => json!({ "endOfStream": true }),
            };
            compact(&json!({ "type": "event", "handle": handle, "message": body }))
        }
        OutputFormat::Text => match message {
            SinkMessage::Event(event) => {
                let payload = serde_json::to_value(event).unwrap_or(Value::Null);
                format!("[{handle}] {} {}", event.name(), compact(&payload))
            }
            SinkMessage::Error(error) => {
                format!("[{handle}] error [{}] {}", error.code, error.message)
            }
            SinkMessage::EndOfStream => format!("[{handle}] end of stream"),
        },
    }
}
