//! Thread summary models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Action name the agent side emits when it could not build a proper interrupt.
pub const IMPROPER_SCHEMA: &str = "Improper schema";

/// Thread status as reported by the orchestration service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    Idle,
    Busy,
    Interrupted,
    Error,
}

impl ThreadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadStatus::Idle => "idle",
            ThreadStatus::Busy => "busy",
            ThreadStatus::Interrupted => "interrupted",
            ThreadStatus::Error => "error",
        }
    }
}

/// Thread summary returned by search and get.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    /// Thread ID
    pub thread_id: String,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Last update time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Current status
    pub status: ThreadStatus,

    /// Free-form metadata (holds `assistant_id` among others)
    #[serde(default)]
    pub metadata: Value,

    /// Opaque graph values (messages etc.)
    #[serde(default)]
    pub values: Value,

    /// Pending interrupts keyed by task ID, when the service embeds them
    #[serde(default)]
    pub interrupts: BTreeMap<String, Vec<Interrupt>>,
}

impl Thread {
    /// Text of the first human message, or an empty string.
    pub fn first_human_message(&self) -> String {
        let Some(messages) = self.values.get("messages").and_then(Value::as_array) else {
            return String::new();
        };

        messages
            .iter()
            .find(|msg| msg.get("type").and_then(Value::as_str) == Some("human"))
            .and_then(|msg| msg.get("content"))
            .map(message_text)
            .unwrap_or_default()
    }
}

/// Flatten message content that is either a plain string or a list of typed parts.
fn message_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter(|part| part.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

/// Raw interrupt record attached to a thread or task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interrupt {
    /// Interrupt payload, normally a human interrupt or a list of them
    #[serde(default)]
    pub value: Value,

    /// Interrupt ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// When the interrupt fires ("during", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
}

/// Structured pause point awaiting external input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HumanInterrupt {
    #[serde(default)]
    pub action_request: Option<ActionRequest>,

    #[serde(default)]
    pub config: Option<InterruptConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The action an agent wants a human to review
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    #[serde(default)]
    pub action: Option<String>,

    #[serde(default)]
    pub args: Value,
}

/// Which responses the interrupt accepts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterruptConfig {
    #[serde(default)]
    pub allow_ignore: bool,
    #[serde(default)]
    pub allow_respond: bool,
    #[serde(default)]
    pub allow_edit: bool,
    #[serde(default)]
    pub allow_accept: bool,
}

impl HumanInterrupt {
    /// Parse an interrupt payload; malformed payloads become an empty interrupt.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    /// The requested action name, if any.
    pub fn action(&self) -> Option<&str> {
        self.action_request.as_ref()?.action.as_deref()
    }

    /// Whether the payload carries a usable action.
    pub fn has_valid_schema(&self) -> bool {
        matches!(self.action(), Some(action) if !action.is_empty() && action != IMPROPER_SCHEMA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_thread_deserializes_service_shape() {
        let thread: Thread = serde_json::from_value(json!({
            "thread_id": "t-1",
            "created_at": "2025-01-15T10:00:00+00:00",
            "updated_at": "2025-01-15T10:05:00+00:00",
            "status": "interrupted",
            "metadata": { "assistant_id": "agent-1" },
            "values": { "messages": [] },
            "interrupts": {
                "task-1": [{ "value": { "action_request": { "action": "send_email", "args": {} } }, "id": "i-1" }]
            }
        }))
        .unwrap();

        assert_eq!(thread.thread_id, "t-1");
        assert_eq!(thread.status, ThreadStatus::Interrupted);
        assert_eq!(thread.interrupts["task-1"].len(), 1);
    }

    #[test]
    fn test_thread_without_optional_fields() {
        let thread: Thread = serde_json::from_value(json!({
            "thread_id": "t-2",
            "created_at": "2025-01-15T10:00:00Z",
            "status": "idle"
        }))
        .unwrap();

        assert!(thread.interrupts.is_empty());
        assert!(thread.updated_at.is_none());
        assert_eq!(thread.values, Value::Null);
    }

    #[test]
    fn test_first_human_message_string_content() {
        let thread: Thread = serde_json::from_value(json!({
            "thread_id": "t-3",
            "created_at": "2025-01-15T10:00:00Z",
            "status": "idle",
            "values": { "messages": [
                { "type": "ai", "content": "hello" },
                { "type": "human", "content": "book a flight" }
            ]}
        }))
        .unwrap();

        assert_eq!(thread.first_human_message(), "book a flight");
    }

    #[test]
    fn test_first_human_message_part_content() {
        let thread: Thread = serde_json::from_value(json!({
            "thread_id": "t-4",
            "created_at": "2025-01-15T10:00:00Z",
            "status": "idle",
            "values": { "messages": [
                { "type": "human", "content": [
                    { "type": "text", "text": "summarize" },
                    { "type": "image_url", "image_url": "x" },
                    { "type": "text", "text": "this doc" }
                ]}
            ]}
        }))
        .unwrap();

        assert_eq!(thread.first_human_message(), "summarize this doc");
    }

    #[test]
    fn test_first_human_message_list_values() {
        let thread: Thread = serde_json::from_value(json!({
            "thread_id": "t-5",
            "created_at": "2025-01-15T10:00:00Z",
            "status": "idle",
            "values": [1, 2, 3]
        }))
        .unwrap();

        assert_eq!(thread.first_human_message(), "");
    }

    #[test]
    fn test_human_interrupt_schema_checks() {
        let valid = HumanInterrupt::from_value(&json!({
            "action_request": { "action": "approve", "args": {} },
            "config": { "allow_accept": true }
        }));
        assert!(valid.has_valid_schema());
        assert_eq!(valid.action(), Some("approve"));

        let improper = HumanInterrupt::from_value(&json!({
            "action_request": { "action": IMPROPER_SCHEMA }
        }));
        assert!(!improper.has_valid_schema());

        let malformed = HumanInterrupt::from_value(&json!("just a string"));
        assert!(!malformed.has_valid_schema());
        assert_eq!(malformed, HumanInterrupt::default());
    }
}
