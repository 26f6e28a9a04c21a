//! Streaming response assembly
//!
//! Decoded backend events are folded, strictly in arrival order, into one
//! live [`StreamingMessage`]. When the stream ends the message text is
//! re-segmented into blocks and scanned for citations exactly once.
//!
//! Session lifecycle: `Idle → Streaming → {Finalized | Aborted | Errored}`.

mod assembler;
pub mod hydrate;
mod session;

pub use assembler::StreamAssembler;
pub use hydrate::{hydrate_chart, ChartResolver, ChartSpec, HydrationError, MapChartResolver};
pub use session::{abort_signal, run_session, AbortHandle, EventResult, TransportError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::blocks::ContentBlock;
use crate::citation::Citation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Tool call progress. Only moves forward: running → complete | error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Running,
    Complete,
    Error,
}

/// A tool invocation reported by the backend. Calls are identified by list
/// position; several calls may share a name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub status: ToolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

impl ToolCall {
    pub fn running(name: impl Into<String>, args: Option<Value>) -> Self {
        Self {
            name: name.into(),
            status: ToolStatus::Running,
            args,
            output: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == ToolStatus::Running
    }

    /// Running → complete. Returns false (and changes nothing) otherwise.
    pub fn complete(&mut self, output: Option<Value>) -> bool {
        if !self.is_running() {
            return false;
        }
        self.status = ToolStatus::Complete;
        self.output = output;
        true
    }

    /// Running → error. Returns false (and changes nothing) otherwise.
    pub fn fail(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.status = ToolStatus::Error;
        true
    }
}

/// The message being built while a response streams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub blocks: Vec<ContentBlock>,
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,
    pub created_at: DateTime<Utc>,
}

impl StreamingMessage {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            content: String::new(),
            blocks: vec![],
            tool_calls: vec![],
            citations: None,
            created_at: Utc::now(),
        }
    }

    /// Empty assistant message with a fresh id
    pub fn assistant() -> Self {
        Self::new(Uuid::new_v4().to_string(), Role::Assistant)
    }

    /// Submitted user prompt
    pub fn user(content: impl Into<String>) -> Self {
        let mut message = Self::new(Uuid::new_v4().to_string(), Role::User);
        message.content = content.into();
        message
    }

    /// Id of the single text block that grows while streaming
    pub fn open_text_block_id(&self) -> String {
        format!("{}-text", self.id)
    }

    pub fn block(&self, id: &str) -> Option<&ContentBlock> {
        self.blocks.iter().find(|b| b.id() == id)
    }

    pub fn running_tools(&self) -> impl Iterator<Item = &ToolCall> {
        self.tool_calls.iter().filter(|c| c.is_running())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Streaming,
    Finalized,
    Aborted,
    Errored,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Finalized | SessionState::Aborted | SessionState::Errored
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Streaming => "streaming",
            SessionState::Finalized => "finalized",
            SessionState::Aborted => "aborted",
            SessionState::Errored => "errored",
        }
    }
}

fn default_tool_name() -> String {
    "unknown_tool".to_string()
}

fn default_error_message() -> String {
    "Unknown error".to_string()
}

/// One decoded backend event. Accepts both the dotted event names and the
/// raw underscore names emitted by the multi-agent endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "text.delta", alias = "text_delta")]
    TextDelta {
        #[serde(default)]
        delta: String,
    },

    #[serde(rename = "tool.call", alias = "tool_call")]
    ToolCall {
        #[serde(default = "default_tool_name")]
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        args: Option<Value>,
    },

    #[serde(rename = "tool.output", alias = "tool_output")]
    ToolOutput {
        #[serde(default = "default_tool_name")]
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
    },

    #[serde(rename = "chart.reference", alias = "chart_reference")]
    ChartReference {
        #[serde(rename = "dataRef", alias = "data_ref", alias = "ref")]
        data_ref: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subtitle: Option<String>,
        #[serde(
            rename = "specType",
            alias = "spec_type",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        spec_type: Option<String>,
    },

    #[serde(rename = "error")]
    Error {
        #[serde(default = "default_error_message")]
        message: String,
    },

    /// Explicit end-of-stream sentinel
    #[serde(rename = "done")]
    Done,

    /// Unrecognized event type; folds as a no-op
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    pub fn text(delta: impl Into<String>) -> Self {
        StreamEvent::TextDelta {
            delta: delta.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::TextDelta { .. } => "text.delta",
            StreamEvent::ToolCall { .. } => "tool.call",
            StreamEvent::ToolOutput { .. } => "tool.output",
            StreamEvent::ChartReference { .. } => "chart.reference",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Done => "done",
            StreamEvent::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: Value) -> StreamEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_decode_dotted_and_underscore_names() {
        assert_eq!(
            decode(json!({"type": "text.delta", "delta": "Hi"})),
            StreamEvent::text("Hi")
        );
        assert_eq!(
            decode(json!({"type": "text_delta", "delta": "Hi"})),
            StreamEvent::text("Hi")
        );
        assert_eq!(
            decode(json!({"type": "tool_call", "name": "query_genie", "args": "{\"q\":1}"})),
            StreamEvent::ToolCall {
                name: "query_genie".into(),
                args: Some(json!("{\"q\":1}")),
            }
        );
    }

    #[test]
    fn test_decode_defaults() {
        assert_eq!(
            decode(json!({"type": "tool.output"})),
            StreamEvent::ToolOutput {
                name: "unknown_tool".into(),
                output: None,
            }
        );
        assert_eq!(
            decode(json!({"type": "error"})),
            StreamEvent::Error {
                message: "Unknown error".into()
            }
        );
        assert_eq!(decode(json!({"type": "text.delta"})), StreamEvent::text(""));
    }

    #[test]
    fn test_decode_chart_reference_aliases() {
        let expected = StreamEvent::ChartReference {
            data_ref: "genie://stmt/1".into(),
            title: Some("Revenue".into()),
            subtitle: None,
            spec_type: Some("line".into()),
        };
        assert_eq!(
            decode(json!({"type": "chart.reference", "dataRef": "genie://stmt/1", "title": "Revenue", "specType": "line"})),
            expected
        );
        assert_eq!(
            decode(json!({"type": "chart_reference", "ref": "genie://stmt/1", "title": "Revenue", "spec_type": "line"})),
            expected
        );
    }

    #[test]
    fn test_unknown_event_type() {
        assert_eq!(decode(json!({"type": "reasoning.delta", "delta": "hmm"})), StreamEvent::Unknown);
        assert_eq!(decode(json!({"type": "done"})), StreamEvent::Done);
    }

    #[test]
    fn test_tool_status_only_moves_forward() {
        let mut call = ToolCall::running("search", None);
        assert!(call.complete(Some(json!("ok"))));
        assert!(!call.fail());
        assert!(!call.complete(None));
        assert_eq!(call.status, ToolStatus::Complete);
        assert_eq!(call.output, Some(json!("ok")));

        let mut call = ToolCall::running("search", None);
        assert!(call.fail());
        assert!(!call.complete(Some(json!("late"))));
        assert_eq!(call.status, ToolStatus::Error);
        assert_eq!(call.output, None);
    }

    #[test]
    fn test_message_constructors() {
        let user = StreamingMessage::user("What's our revenue?");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.content, "What's our revenue?");

        let assistant = StreamingMessage::assistant();
        assert_eq!(assistant.role, Role::Assistant);
        assert!(assistant.content.is_empty());
        assert_ne!(assistant.id, user.id);
        assert_eq!(assistant.open_text_block_id(), format!("{}-text", assistant.id));
    }
}
