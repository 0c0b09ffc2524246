use chrono::NaiveDateTime;
use std::fmt::Write;

use crate::database::Record;

pub const MAX_RECORDS: usize = 10;
pub const MAX_MESSAGE_LEN: usize = 4000;
const MAX_VALUE_LEN: usize = 50;
const TRUNCATED_VALUE_LEN: usize = 47;

/// Cuts values longer than 50 characters to 47 plus "...".
pub fn truncate_value(value: &str) -> String {
    if value.chars().count() > MAX_VALUE_LEN {
        let cut: String = value.chars().take(TRUNCATED_VALUE_LEN).collect();
        format!("{}...", cut)
    } else {
        value.to_string()
    }
}

pub fn format_records(records: &[Record], max_records: usize, exported_at: &NaiveDateTime) -> String {
    if records.is_empty() {
        return "No data to display".to_string();
    }

    let mut text = String::new();
    let _ = writeln!(text, "Records found: {}", records.len());
    let _ = writeln!(text, "Exported at: {}", exported_at.format("%Y-%m-%d %H:%M:%S"));
    text.push('\n');

    for (i, record) in records.iter().take(max_records).enumerate() {
        let _ = writeln!(text, "Record #{}:", i + 1);
        for (column, value) in record {
            let _ = writeln!(text, "   • {}: {}", column, truncate_value(value));
        }
        text.push('\n');
    }

    if records.len() > max_records {
        let _ = writeln!(text, "... and {} more records", records.len() - max_records);
    }

    text
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

/// Splits `text` into pieces of at most `max_len` characters, preferring a
/// blank line, then a line break, then a hard cut.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_len {
        let limit = byte_offset(rest, max_len);
        let window = &rest[..limit];
        let split = window
            .rfind("\n\n")
            .filter(|&pos| pos > 0)
            .or_else(|| window.rfind('\n').filter(|&pos| pos > 0))
            .unwrap_or(limit);

        parts.push(rest[..split].to_string());
        rest = rest[split..].trim_start();
    }

    if !rest.is_empty() || parts.is_empty() {
        parts.push(rest.to_string());
    }
    parts
}

/// Adds "Part i/n" headers when a message had to be split.
pub fn label_parts(parts: Vec<String>) -> Vec<String> {
    let total = parts.len();
    if total <= 1 {
        return parts;
    }
    parts
        .into_iter()
        .enumerate()
        .map(|(i, part)| format!("Part {}/{}\n\n{}", i + 1, total, part))
        .collect()
}
