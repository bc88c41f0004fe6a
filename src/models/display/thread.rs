//! Thread and interrupt display models

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;

use super::common::{one_line, truncate_string};
use crate::client::models::{HumanInterrupt, ThreadDetail};
use crate::output::formatters::format_age;

const TITLE_WIDTH: usize = 48;

/// Thread row for `threads list`
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct ThreadDisplay {
    #[tabled(rename = "THREAD ID")]
    pub thread_id: String,

    #[tabled(rename = "STATUS")]
    pub status: String,

    #[tabled(rename = "TITLE")]
    pub title: String,

    /// Pending interrupt action, or why it cannot be shown
    #[tabled(rename = "ACTION")]
    pub action: String,

    #[tabled(rename = "CREATED")]
    pub created: String,
}

impl ThreadDisplay {
    pub fn from_detail(detail: &ThreadDetail, now: DateTime<Utc>) -> Self {
        let action = if detail.degraded {
            "(unavailable)".to_string()
        } else if detail.invalid_schema {
            "(invalid)".to_string()
        } else {
            detail
                .interrupts
                .as_ref()
                .and_then(|found| found.first())
                .and_then(HumanInterrupt::action)
                .unwrap_or("-")
                .to_string()
        };

        Self {
            thread_id: detail.thread.thread_id.clone(),
            status: detail.status.as_str().to_string(),
            title: thread_title(detail),
            action,
            created: format_age(detail.thread.created_at, now),
        }
    }
}

impl From<&ThreadDetail> for ThreadDisplay {
    fn from(detail: &ThreadDetail) -> Self {
        Self::from_detail(detail, Utc::now())
    }
}

/// First human message on one line, or the thread ID when there is none.
pub(super) fn title_of(message: String, thread_id: &str) -> String {
    let text = one_line(&message);
    if text.is_empty() {
        thread_id.to_string()
    } else {
        truncate_string(&text, TITLE_WIDTH)
    }
}

fn thread_title(detail: &ThreadDetail) -> String {
    title_of(detail.thread.first_human_message(), &detail.thread.thread_id)
}

/// Interrupt row for `threads show`
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct InterruptDisplay {
    #[tabled(rename = "ACTION")]
    pub action: String,

    #[tabled(rename = "DESCRIPTION")]
    pub description: String,

    /// Response types the interrupt accepts
    #[tabled(rename = "ALLOWED")]
    pub allowed: String,
}

impl From<&HumanInterrupt> for InterruptDisplay {
    fn from(interrupt: &HumanInterrupt) -> Self {
        let allowed = interrupt
            .config
            .as_ref()
            .map(|c| {
                [
                    (c.allow_accept, "accept"),
                    (c.allow_edit, "edit"),
                    (c.allow_respond, "response"),
                    (c.allow_ignore, "ignore"),
                ]
                .iter()
                .filter(|(allowed, _)| *allowed)
                .map(|(_, name)| *name)
                .collect::<Vec<_>>()
                .join(", ")
            })
            .unwrap_or_default();

        Self {
            action: interrupt.action().unwrap_or("-").to_string(),
            description: interrupt
                .description
                .as_deref()
                .map(|d| truncate_string(&one_line(d), 60))
                .unwrap_or_default(),
            allowed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::models::{Thread, ThreadStatus};
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    fn thread(values: serde_json::Value) -> Thread {
        serde_json::from_value(json!({
            "thread_id": "t-1",
            "created_at": (now() - Duration::minutes(5)).to_rfc3339(),
            "status": "interrupted",
            "values": values,
        }))
        .unwrap()
    }

    fn interrupt() -> HumanInterrupt {
        HumanInterrupt::from_value(&json!({
            "action_request": { "action": "send_email", "args": {} },
            "config": { "allow_accept": true, "allow_respond": true },
            "description": "Send the\ndraft?"
        }))
    }

    #[test]
    fn test_display_with_interrupt() {
        let mut detail = ThreadDetail::plain(thread(json!({
            "messages": [{ "type": "human", "content": "Draft a reply" }]
        })));
        detail.interrupts = Some(vec![interrupt()]);

        let display = ThreadDisplay::from_detail(&detail, now());

        assert_eq!(display.thread_id, "t-1");
        assert_eq!(display.status, "interrupted");
        assert_eq!(display.title, "Draft a reply");
        assert_eq!(display.action, "send_email");
        assert_eq!(display.created, "5m ago");
    }

    #[test]
    fn test_display_marks_unshowable_details() {
        let mut detail = ThreadDetail::plain(thread(json!({})));
        detail.invalid_schema = true;
        assert_eq!(ThreadDisplay::from_detail(&detail, now()).action, "(invalid)");

        detail.degraded = true;
        assert_eq!(
            ThreadDisplay::from_detail(&detail, now()).action,
            "(unavailable)"
        );
    }

    #[test]
    fn test_title_falls_back_to_id() {
        let detail = ThreadDetail::plain(thread(json!({ "messages": [] })));
        assert_eq!(ThreadDisplay::from_detail(&detail, now()).title, "t-1");
        assert_eq!(detail.thread.status, ThreadStatus::Interrupted);
    }

    #[test]
    fn test_interrupt_display() {
        let display = InterruptDisplay::from(&interrupt());

        assert_eq!(display.action, "send_email");
        assert_eq!(display.description, "Send the draft?");
        assert_eq!(display.allowed, "accept, response");
    }
}
