//! Messages exchanged over an interactive `/connect` session.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolResult;

/// An execution stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Compile,
    Run,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Compile => f.write_str("compile"),
            Stage::Run => f.write_str("run"),
        }
    }
}

/// An output stream of a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// How a stage's process ended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal name, if the process was killed.
    pub signal: Option<String>,
}

impl ExitStatus {
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn signal(signal: impl Into<String>) -> Self {
        Self {
            code: None,
            signal: Some(signal.into()),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A message sent by the client.
///
/// Unrecognised `type` values decode to [`ClientMessage::Unknown`] so the
/// session can decide how to treat them for its current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Job request fields, validated by the server's resolution strategy.
    Init(Map<String, Value>),
    Data {
        #[serde(default)]
        stream: String,
        #[serde(default)]
        data: String,
    },
    Signal {
        #[serde(default)]
        signal: String,
    },
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Decode a text frame.
    pub fn from_json(text: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn stdin(data: impl Into<String>) -> Self {
        ClientMessage::Data {
            stream: "stdin".to_string(),
            data: data.into(),
        }
    }

    pub fn signal(name: impl Into<String>) -> Self {
        ClientMessage::Signal {
            signal: name.into(),
        }
    }

    /// Build an `init` message from a JSON object; non-object values yield an empty request.
    pub fn init(request: Value) -> Self {
        match request {
            Value::Object(map) => ClientMessage::Init(map),
            _ => ClientMessage::Init(Map::new()),
        }
    }
}

/// A message sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// The job was primed against this runtime.
    Runtime { language: String, version: String },
    /// A chunk of job output.
    Data { stream: OutputStream, data: String },
    /// A stage is starting.
    Stage { stage: Stage },
    /// A stage has finished.
    Exit {
        stage: Stage,
        #[serde(flatten)]
        status: ExitStatus,
    },
    /// The session failed; a close with code 4002 follows.
    Error { message: String },
}

impl ServerMessage {
    pub fn runtime(language: impl Into<String>, version: impl Into<String>) -> Self {
        ServerMessage::Runtime {
            language: language.into(),
            version: version.into(),
        }
    }

    pub fn stdout(data: impl Into<String>) -> Self {
        ServerMessage::Data {
            stream: OutputStream::Stdout,
            data: data.into(),
        }
    }

    pub fn stderr(data: impl Into<String>) -> Self {
        ServerMessage::Data {
            stream: OutputStream::Stderr,
            data: data.into(),
        }
    }

    pub fn stage(stage: Stage) -> Self {
        ServerMessage::Stage { stage }
    }

    pub fn exit(stage: Stage, status: ExitStatus) -> Self {
        ServerMessage::Exit { stage, status }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Encode as a text frame.
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_init_keeps_request_fields_without_tag() {
        let msg = ClientMessage::from_json(
            r#"{"type":"init","language":"python","version":"*","files":[]}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::Init(fields) => {
                assert_eq!(fields.get("language"), Some(&json!("python")));
                assert!(!fields.contains_key("type"));
            }
            other => panic!("Expected init, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_decodes() {
        let msg = ClientMessage::from_json(r#"{"type":"resize","cols":80}"#).unwrap();
        assert_eq!(msg, ClientMessage::Unknown);
    }

    #[test]
    fn test_missing_type_is_malformed() {
        assert!(ClientMessage::from_json(r#"{"data":"x"}"#).is_err());
        assert!(ClientMessage::from_json("not json").is_err());
    }

    #[test]
    fn test_data_defaults_missing_fields() {
        let msg = ClientMessage::from_json(r#"{"type":"data","data":"hi"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Data {
                stream: String::new(),
                data: "hi".to_string()
            }
        );
    }

    #[test]
    fn test_exit_status_is_flattened() {
        let msg = ServerMessage::exit(Stage::Run, ExitStatus::code(0));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"type": "exit", "stage": "run", "code": 0, "signal": null})
        );
    }

    #[test]
    fn test_data_message_shape() {
        let value = serde_json::to_value(ServerMessage::stderr("oops")).unwrap();
        assert_eq!(value, json!({"type": "data", "stream": "stderr", "data": "oops"}));
    }
}
