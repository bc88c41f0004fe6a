//! Chat-history view: recent threads grouped by day

use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::Serialize;
use tabled::Tabled;

use super::thread::title_of;
use crate::client::models::Thread;
use crate::output::formatters::format_local;

/// Day bucket relative to today, in local time. Weeks start on Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryGroup {
    Today,
    Yesterday,
    ThisWeek,
    Older,
}

impl HistoryGroup {
    pub const ALL: [HistoryGroup; 4] = [
        HistoryGroup::Today,
        HistoryGroup::Yesterday,
        HistoryGroup::ThisWeek,
        HistoryGroup::Older,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            HistoryGroup::Today => "Today",
            HistoryGroup::Yesterday => "Yesterday",
            HistoryGroup::ThisWeek => "This Week",
            HistoryGroup::Older => "Older",
        }
    }

    pub fn classify(date: NaiveDate, today: NaiveDate) -> Self {
        let week_start = today - Duration::days(today.weekday().num_days_from_monday() as i64);

        if date >= today {
            HistoryGroup::Today
        } else if date == today - Duration::days(1) {
            HistoryGroup::Yesterday
        } else if date >= week_start {
            HistoryGroup::ThisWeek
        } else {
            HistoryGroup::Older
        }
    }
}

#[derive(Debug, Clone, Tabled, Serialize)]
pub struct HistoryEntry {
    #[tabled(rename = "THREAD ID")]
    pub thread_id: String,

    #[tabled(rename = "TITLE")]
    pub title: String,

    #[tabled(rename = "STATUS")]
    pub status: String,

    #[tabled(rename = "CREATED")]
    pub created: String,
}

impl From<&Thread> for HistoryEntry {
    fn from(thread: &Thread) -> Self {
        Self {
            thread_id: thread.thread_id.clone(),
            title: title_of(thread.first_human_message(), &thread.thread_id),
            status: thread.status.as_str().to_string(),
            created: format_local(thread.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistorySection {
    pub group: HistoryGroup,
    pub threads: Vec<HistoryEntry>,
}

/// Group threads newest first into non-empty day buckets.
pub fn group_history(threads: &[Thread], today: NaiveDate) -> Vec<HistorySection> {
    let mut sorted: Vec<&Thread> = threads.iter().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    HistoryGroup::ALL
        .iter()
        .map(|group| HistorySection {
            group: *group,
            threads: sorted
                .iter()
                .filter(|t| {
                    HistoryGroup::classify(t.created_at.with_timezone(&Local).date_naive(), today)
                        == *group
                })
                .map(|t| HistoryEntry::from(*t))
                .collect(),
        })
        .filter(|section| !section.threads.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::models::ThreadStatus;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_classify_midweek() {
        // Thursday
        let today = date(2025, 1, 16);

        assert_eq!(HistoryGroup::classify(today, today), HistoryGroup::Today);
        assert_eq!(
            HistoryGroup::classify(date(2025, 1, 15), today),
            HistoryGroup::Yesterday
        );
        assert_eq!(
            HistoryGroup::classify(date(2025, 1, 13), today),
            HistoryGroup::ThisWeek
        );
        assert_eq!(
            HistoryGroup::classify(date(2025, 1, 12), today),
            HistoryGroup::Older
        );
    }

    #[test]
    fn test_classify_on_monday() {
        let monday = date(2025, 1, 13);

        assert_eq!(
            HistoryGroup::classify(date(2025, 1, 12), monday),
            HistoryGroup::Yesterday
        );
        assert_eq!(
            HistoryGroup::classify(date(2025, 1, 11), monday),
            HistoryGroup::Older
        );
    }

    fn local_thread(id: &str, day: NaiveDate, hour: u32, message: Option<&str>) -> Thread {
        let local = Local
            .from_local_datetime(&day.and_hms_opt(hour, 0, 0).unwrap())
            .earliest()
            .unwrap();
        let values = match message {
            Some(text) => json!({ "messages": [{ "type": "human", "content": text }] }),
            None => json!({}),
        };
        Thread {
            thread_id: id.to_string(),
            created_at: local.with_timezone(&Utc),
            updated_at: None,
            status: ThreadStatus::Idle,
            metadata: json!({}),
            values,
            interrupts: BTreeMap::new(),
        }
    }

    #[test]
    fn test_group_history() {
        let today = date(2025, 1, 16);
        let threads = vec![
            local_thread("old", date(2025, 1, 2), 9, Some("Quarterly report")),
            local_thread("morning", today, 9, Some("Plan the offsite")),
            local_thread("evening", today, 18, None),
            local_thread("tuesday", date(2025, 1, 14), 12, Some("Fix login")),
        ];

        let sections = group_history(&threads, today);

        let groups: Vec<HistoryGroup> = sections.iter().map(|s| s.group).collect();
        assert_eq!(
            groups,
            vec![
                HistoryGroup::Today,
                HistoryGroup::ThisWeek,
                HistoryGroup::Older
            ]
        );

        let today_ids: Vec<&str> = sections[0]
            .threads
            .iter()
            .map(|e| e.thread_id.as_str())
            .collect();
        assert_eq!(today_ids, vec!["evening", "morning"]);
        assert_eq!(sections[0].threads[0].title, "evening");
        assert_eq!(sections[0].threads[1].title, "Plan the offsite");
        assert_eq!(sections[2].threads[0].thread_id, "old");
    }
}
