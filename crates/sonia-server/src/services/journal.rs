//! Journal entries with model-assigned emotions.

use chrono::{TimeZone, Utc};
use sonia_core::{now_millis, EmotionData, JournalEntry, User};
use tracing::{info, warn};
use uuid::Uuid;

use crate::dto::JournalRequest;
use crate::error::AppError;
use crate::ServerState;

/// `Entry YYYY-MM-DD` for the UTC day of `timestamp_ms`.
pub fn default_title(timestamp_ms: i64) -> String {
    let date = Utc
        .timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    format!("Entry {date}")
}

/// Analyses and stores a new entry.
///
/// The entry is always saved: when the model fails or answers with
/// something unusable it is tagged with the neutral emotion.
pub async fn create_entry(state: &ServerState, user: &User, req: JournalRequest) -> Result<JournalEntry, AppError> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(AppError::bad_request("Content is required"));
    }

    let context = state.store.get_context(&user.id)?;
    let emotion = match state.model.analyze_journal(content, &context).await {
        Ok(Some(emotion)) => emotion.without_response(),
        Ok(None) => EmotionData::neutral(),
        Err(e) => {
            warn!("Journal analysis failed, using neutral: {}", e);
            EmotionData::neutral()
        }
    };

    let timestamp = now_millis();
    let title = req
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| default_title(timestamp));

    let entry = JournalEntry {
        id: Uuid::new_v4().to_string(),
        title,
        content: content.to_string(),
        timestamp,
        emotion,
    };
    state.store.add_journal_entry(&user.id, &entry)?;
    info!(user = %user.id, label = %entry.emotion.label, "Journal entry saved");
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_title_uses_utc_date() {
        // 2024-03-09T23:30:00Z
        assert_eq!(default_title(1_710_027_000_000), "Entry 2024-03-09");
    }
}
