//! Table output formatting

use colored::Colorize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Rows},
};

/// Format rows as a rounded table
pub fn format_table<T: Tabled>(data: &[T]) -> String {
    if data.is_empty() {
        return "No results found.".to_string();
    }

    let mut table = Table::new(data);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    table.to_string()
}

/// A bold heading followed by its table; empty sections render as nothing.
pub fn format_section<T: Tabled>(title: &str, data: &[T]) -> Option<String> {
    if data.is_empty() {
        return None;
    }
    Some(format!("{}\n{}", title.bold(), format_table(data)))
}
