//! Interrupt extraction and schema checks

use serde_json::Value;

use crate::client::models::{HumanInterrupt, Interrupt, Thread, ThreadState};

/// Expand one raw interrupt; its value is either a single interrupt or a list.
fn expand(interrupt: &Interrupt) -> Vec<HumanInterrupt> {
    match &interrupt.value {
        Value::Array(items) => items.iter().map(HumanInterrupt::from_value).collect(),
        Value::Null => Vec::new(),
        value => vec![HumanInterrupt::from_value(value)],
    }
}

/// Interrupts embedded in a thread summary, if it carries any.
pub fn from_thread(thread: &Thread) -> Option<Vec<HumanInterrupt>> {
    let found: Vec<_> = thread.interrupts.values().flatten().flat_map(expand).collect();
    (!found.is_empty()).then_some(found)
}

/// Interrupts pending on any task of a state snapshot.
pub fn from_state(state: &ThreadState) -> Vec<HumanInterrupt> {
    state.task_interrupts().flat_map(expand).collect()
}

/// True when there is nothing to show or any interrupt lacks a usable action.
pub fn is_invalid_schema(interrupts: &[HumanInterrupt]) -> bool {
    interrupts.is_empty() || interrupts.iter().any(|i| !i.has_valid_schema())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::fixtures;
    use crate::client::models::{IMPROPER_SCHEMA, ThreadStatus};
    use serde_json::json;

    #[test]
    fn test_from_thread_empty() {
        let thread = fixtures::thread("t-1", ThreadStatus::Interrupted, 0);
        assert!(from_thread(&thread).is_none());
    }

    #[test]
    fn test_from_thread_flattens_lists() {
        let mut thread = fixtures::interrupted_with_embedded("t-1", 0);
        thread.interrupts.insert(
            "task-2".to_string(),
            vec![Interrupt {
                value: json!([
                    { "action_request": { "action": "a" } },
                    { "action_request": { "action": "b" } }
                ]),
                id: None,
                when: None,
            }],
        );

        let found = from_thread(&thread).unwrap();
        assert_eq!(found.len(), 3);
        assert!(!is_invalid_schema(&found));
    }

    #[test]
    fn test_from_state_collects_task_interrupts() {
        let state = fixtures::state_with_interrupt("send_email");
        let found = from_state(&state);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].action(), Some("send_email"));
    }

    #[test]
    fn test_invalid_schema_rules() {
        assert!(is_invalid_schema(&[]));

        let improper = HumanInterrupt::from_value(&json!({
            "action_request": { "action": IMPROPER_SCHEMA }
        }));
        let valid = HumanInterrupt::from_value(&json!({
            "action_request": { "action": "ok" }
        }));
        assert!(is_invalid_schema(&[valid.clone(), improper]));
        assert!(is_invalid_schema(&[HumanInterrupt::default()]));
        assert!(!is_invalid_schema(&[valid]));
    }
}
