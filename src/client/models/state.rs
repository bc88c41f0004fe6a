//! Thread state snapshot models

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::thread::Interrupt;

/// Upstream state snapshot returned by `get_thread_state`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadState {
    #[serde(default)]
    pub values: Value,

    /// Nodes scheduled to run next
    #[serde(default)]
    pub next: Vec<String>,

    #[serde(default)]
    pub tasks: Vec<ThreadTask>,

    #[serde(default)]
    pub checkpoint: Value,

    #[serde(default)]
    pub metadata: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// A pending task in a state snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadTask {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub interrupts: Vec<Interrupt>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ThreadState {
    /// All interrupts across every task, in task order.
    pub fn task_interrupts(&self) -> impl Iterator<Item = &Interrupt> {
        self.tasks.iter().flat_map(|task| task.interrupts.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_deserializes_with_tasks() {
        let state: ThreadState = serde_json::from_value(json!({
            "values": { "messages": [] },
            "next": ["human_review"],
            "tasks": [
                { "id": "task-1", "name": "human_review", "interrupts": [
                    { "value": { "action_request": { "action": "approve" } } }
                ]},
                { "id": "task-2", "name": "tools" }
            ],
            "checkpoint": { "checkpoint_id": "c-1" },
            "created_at": "2025-01-15T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(state.next, vec!["human_review"]);
        assert_eq!(state.tasks.len(), 2);
        assert_eq!(state.task_interrupts().count(), 1);
    }

    #[test]
    fn test_empty_state() {
        let state: ThreadState = serde_json::from_value(json!({})).unwrap();
        assert_eq!(state.task_interrupts().count(), 0);
    }
}
