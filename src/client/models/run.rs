//! Mutation and run models

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Node name that terminates a graph run.
const END_NODE: &str = "__end__";

/// Body of `update_thread_state`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePatch {
    pub values: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_node: Option<String>,
}

impl StatePatch {
    /// Patch that ends the thread without running further nodes.
    pub fn ignore() -> Self {
        Self {
            values: Value::Null,
            as_node: Some(END_NODE.to_string()),
        }
    }
}

/// Kind of human response sent back to an interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum HumanResponseKind {
    Accept,
    Ignore,
    Response,
    Edit,
}

/// One response to a pending interrupt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanResponse {
    #[serde(rename = "type")]
    pub kind: HumanResponseKind,

    #[serde(default)]
    pub args: Value,
}

/// Command resuming an interrupted run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCommand {
    pub resume: Vec<HumanResponse>,
}

/// Run created by `create_run`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub thread_id: String,

    #[serde(default)]
    pub assistant_id: String,

    #[serde(default)]
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}
