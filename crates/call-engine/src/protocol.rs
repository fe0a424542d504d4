//! # Command Decoding and Wire Frames
//!
//! Sessions exchange newline-delimited JSON:
//!
//! ```text
//! client -> server   {"command": "call", "id": "c1"}
//! server -> client   {"type": "update", "message": "call c1 received"}
//! ```
//!
//! Decoding produces a [`Command`] before anything reaches the dispatcher;
//! missing fields and unknown verbs are rejected here as
//! [`CallCenterError::MalformedCommand`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dispatcher::{CallId, Dispatcher, OperatorId, Outcome};
use crate::error::{CallCenterError, Result};

/// A decoded command: one verb and its identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Call(CallId),
    Answer(OperatorId),
    Reject(OperatorId),
    Hangup(CallId),
    Info(String),
}

impl Command {
    pub const VERBS: [&'static str; 5] = ["call", "answer", "reject", "hangup", "info"];

    /// Build a command from a verb and id, rejecting unknown verbs and empty ids
    pub fn new(verb: &str, id: &str) -> Result<Self> {
        let id = id.trim();
        if id.is_empty() {
            return Err(CallCenterError::malformed(match verb {
                "call" | "hangup" => "no call id specified".to_string(),
                "answer" | "reject" => "no operator id specified".to_string(),
                "info" => "no info object specified, expected 'calls' or 'operators'".to_string(),
                other => format!("invalid command {}", other),
            }));
        }

        match verb {
            "call" => Ok(Command::Call(CallId::from(id))),
            "answer" => Ok(Command::Answer(OperatorId::from(id))),
            "reject" => Ok(Command::Reject(OperatorId::from(id))),
            "hangup" => Ok(Command::Hangup(CallId::from(id))),
            "info" => Ok(Command::Info(id.to_string())),
            other => Err(CallCenterError::malformed(format!("invalid command {}", other))),
        }
    }

    /// Decode an interactive shell line such as `call c1` or `info calls`
    pub fn parse_line(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, id) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        Self::new(verb, id)
    }

    /// Decode one inbound JSON frame
    pub fn from_json(frame: &str) -> Result<Self> {
        let request: CommandRequest = serde_json::from_str(frame)?;
        Self::try_from(request)
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Command::Call(_) => "call",
            Command::Answer(_) => "answer",
            Command::Reject(_) => "reject",
            Command::Hangup(_) => "hangup",
            Command::Info(_) => "info",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Command::Call(id) | Command::Hangup(id) => id.as_str(),
            Command::Answer(id) | Command::Reject(id) => id.as_str(),
            Command::Info(scope) => scope,
        }
    }

    /// Whether the command only reads dispatcher state
    pub fn is_read_only(&self) -> bool {
        matches!(self, Command::Info(_))
    }

    /// Inbound frame for this command
    pub fn to_request(&self) -> CommandRequest {
        CommandRequest {
            command: Some(self.verb().to_string()),
            id: Some(self.id().to_string()),
        }
    }

    /// Apply a mutating or read-only command to the dispatcher
    pub fn dispatch(&self, dispatcher: &mut Dispatcher) -> Vec<Outcome> {
        match self {
            Command::Call(id) => dispatcher.submit_call(id.clone()),
            Command::Answer(id) => dispatcher.answer(id),
            Command::Reject(id) => dispatcher.reject(id),
            Command::Hangup(id) => dispatcher.hangup(id),
            Command::Info(scope) => dispatcher.info(scope),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb(), self.id())
    }
}

/// Inbound frame `{"command": ..., "id": ...}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl TryFrom<CommandRequest> for Command {
    type Error = CallCenterError;

    fn try_from(request: CommandRequest) -> Result<Self> {
        match (request.command, request.id) {
            (Some(command), Some(id)) => Command::new(&command, &id),
            _ => Err(CallCenterError::malformed("'command' or 'id' not found")),
        }
    }
}

/// Kind of outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Update,
    Error,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Update => f.write_str("update"),
            MessageKind::Error => f.write_str("error"),
        }
    }
}

/// Outbound frame `{"type": ..., "message": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub message: String,
}

impl ServerMessage {
    pub fn update(message: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Update,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Error,
            message: message.into(),
        }
    }

    /// Encode as one JSON line including the trailing newline
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn from_line(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim_end())?)
    }
}

impl From<&Outcome> for ServerMessage {
    fn from(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Update(update) => ServerMessage::update(update.to_string()),
            Outcome::Error(err) => ServerMessage::error(err.to_string()),
        }
    }
}

impl From<&CallCenterError> for ServerMessage {
    fn from(err: &CallCenterError) -> Self {
        ServerMessage::error(err.to_string())
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_json_frames() {
        let cmd = Command::from_json(r#"{"command": "call", "id": "c1"}"#).unwrap();
        assert_eq!(cmd, Command::Call(CallId::from("c1")));

        let cmd = Command::from_json(r#"{"command": "answer", "id": "A"}"#).unwrap();
        assert_eq!(cmd, Command::Answer(OperatorId::from("A")));
    }

    #[test]
    fn missing_fields_are_malformed() {
        let err = Command::from_json(r#"{"command": "call"}"#).unwrap_err();
        assert!(matches!(err, CallCenterError::MalformedCommand(_)));
        assert_eq!(err.to_string(), "'command' or 'id' not found");
    }

    #[test]
    fn unknown_verb_is_malformed() {
        let err = Command::from_json(r#"{"command": "transfer", "id": "c1"}"#).unwrap_err();
        assert_eq!(err.to_string(), "invalid command transfer");
    }

    #[test]
    fn invalid_json_is_a_json_error() {
        let err = Command::from_json("call c1").unwrap_err();
        assert!(matches!(err, CallCenterError::Json(_)));
    }

    #[test]
    fn parses_shell_lines() {
        assert_eq!(
            Command::parse_line("  hangup   c7 ").unwrap(),
            Command::Hangup(CallId::from("c7"))
        );
        assert_eq!(
            Command::parse_line("info calls").unwrap(),
            Command::Info("calls".to_string())
        );
        let err = Command::parse_line("answer").unwrap_err();
        assert_eq!(err.to_string(), "no operator id specified");
    }

    #[test]
    fn request_encoding_matches_wire_format() {
        let request = Command::Reject(OperatorId::from("B")).to_request();
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"command":"reject","id":"B"}"#);
    }

    #[test]
    fn server_message_line() {
        let line = ServerMessage::update("call c1 received").to_line().unwrap();
        assert_eq!(line, "{\"type\":\"update\",\"message\":\"call c1 received\"}\n");
        assert_eq!(
            ServerMessage::from_line(&line).unwrap(),
            ServerMessage::update("call c1 received")
        );
    }

    #[test]
    fn dispatch_routes_to_operation() {
        let mut dispatcher = Dispatcher::new(1);
        let out = Command::Call(CallId::from("c1")).dispatch(&mut dispatcher);
        let messages: Vec<ServerMessage> = out.iter().map(ServerMessage::from).collect();
        assert_eq!(
            messages,
            vec![
                ServerMessage::update("call c1 received"),
                ServerMessage::update("call c1 ringing for operator A"),
            ]
        );
        assert!(Command::Info("calls".into()).is_read_only());
        assert!(!Command::Hangup(CallId::from("c1")).is_read_only());
    }
}
