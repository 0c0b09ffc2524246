use chrono::Local;
use tracing::{error, info, warn};

use crate::database::{Record, records_to_json};
use crate::error::RelayError;
use crate::format::{MAX_MESSAGE_LEN, MAX_RECORDS, format_records, label_parts, split_message};
use crate::telegram::Notifier;

/// Serialized size above which data goes out as a file.
pub const FILE_THRESHOLD: usize = 3000;
pub const EXPORT_FILENAME: &str = "database_export.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Messages { parts: usize },
    File,
    NoData,
}

pub struct RelayUseCase {
    notifier: Box<dyn Notifier>,
}

impl RelayUseCase {
    pub fn new(notifier: Box<dyn Notifier>) -> Self {
        Self { notifier }
    }

    pub async fn relay(
        &self,
        records: &[Record],
        message: &str,
        as_file: bool,
    ) -> Result<RelayOutcome, RelayError> {
        if records.is_empty() {
            warn!("no data to send");
            self.notifier
                .send_text(&format!("❌ {}: no data to send", message))
                .await?;
            return Ok(RelayOutcome::NoData);
        }
        info!(records = records.len(), "relaying records");

        let json = records_to_json(records);
        if as_file || json.to_string().chars().count() > FILE_THRESHOLD {
            self.send_as_file(&json, message).await?;
            return Ok(RelayOutcome::File);
        }

        let exported_at = Local::now().naive_local();
        let text = format!(
            "✅ {}\n\n{}",
            message,
            format_records(records, MAX_RECORDS, &exported_at)
        );
        let parts = label_parts(split_message(&text, MAX_MESSAGE_LEN));
        let total = parts.len();

        // keep going after a failed part so the rest still arrives
        let mut first_error = None;
        for (i, part) in parts.iter().enumerate() {
            if let Err(e) = self.notifier.send_text(part).await {
                error!(part = i + 1, total, error = %e, "failed to send part");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(RelayOutcome::Messages { parts: total }),
        }
    }

    async fn send_as_file(&self, json: &serde_json::Value, message: &str) -> Result<(), RelayError> {
        self.notifier
            .send_text(&format!("{}\n📎 Data sent as a file", message))
            .await?;

        let contents = serde_json::to_vec_pretty(json)
            .map_err(|e| RelayError::Malformed(e.to_string()))?;
        self.notifier.send_document(EXPORT_FILENAME, contents).await
    }
}
