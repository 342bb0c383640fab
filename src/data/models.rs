//! Shared row types for the data layer.
//!
//! `HearingRecord` is the single canonical row shape at the parser/store
//! boundary: the parser emits it, the sync engine diffs it against stored
//! `Hearing` rows, and the store persists it. Callers never branch on the
//! header spelling the parser saw.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Court division a cause list belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, TS,
)]
#[sqlx(type_name = "division", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Division {
    Criminal,
    Civil,
}

impl Division {
    /// Display name as it appears in published link text.
    pub fn name(&self) -> &'static str {
        match self {
            Division::Criminal => "Criminal",
            Division::Civil => "Civil",
        }
    }
}

/// How a pipeline run was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, TS)]
#[sqlx(type_name = "run_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum RunKind {
    Scheduled,
    Startup,
    Manual,
}

/// Terminal status of a pipeline run.
///
/// Runs are inserted optimistically as `Success` and flip to `Failed` only
/// through the error path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, TS)]
#[sqlx(type_name = "run_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum RunStatus {
    Success,
    Failed,
}

/// Logical identity of a hearing within the archive.
///
/// Two rows with the same key are the same hearing; differences in any other
/// field make one an update of the other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HearingKey {
    pub list_date: NaiveDate,
    pub case_number: String,
    pub time: String,
}

/// A stored hearing row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Hearing {
    pub id: i64,
    pub list_date: NaiveDate,
    pub case_number: String,
    pub time: String,
    pub hearing_datetime: DateTime<Utc>,
    pub venue: Option<String>,
    pub judge: Option<String>,
    pub case_details: String,
    pub hearing_type: String,
    pub additional_information: String,
    pub division: Division,
    pub source_url: String,
    pub scraped_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Hearing {
    pub fn key(&self) -> HearingKey {
        HearingKey {
            list_date: self.list_date,
            case_number: self.case_number.clone(),
            time: self.time.clone(),
        }
    }
}

/// A validated hearing parsed from a cause list page, not yet stored.
#[derive(Debug, Clone, PartialEq)]
pub struct HearingRecord {
    pub list_date: NaiveDate,
    pub case_number: String,
    pub time: String,
    pub hearing_datetime: DateTime<Utc>,
    pub venue: Option<String>,
    pub judge: Option<String>,
    pub case_details: String,
    pub hearing_type: String,
    pub additional_information: String,
    pub division: Division,
    pub source_url: String,
    pub scraped_at: DateTime<Utc>,
}

impl HearingRecord {
    pub fn key(&self) -> HearingKey {
        HearingKey {
            list_date: self.list_date,
            case_number: self.case_number.clone(),
            time: self.time.clone(),
        }
    }
}

/// A pipeline run history row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScrapeRun {
    pub id: i64,
    pub kind: RunKind,
    pub status: RunStatus,
    pub summary_url: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub links_discovered: i32,
    pub links_processed: i32,
    pub records_added: i32,
    pub records_updated: i32,
    pub records_deleted: i32,
    pub summary_page_status: Option<i32>,
    pub error_message: Option<String>,
    pub error_details: Option<serde_json::Value>,
}

/// A saved text search owned by a user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SavedSearch {
    pub id: i64,
    pub user_id: i64,
    pub search_text: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// A user account row joined with its status code.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub status: String,
    pub email_notifications: bool,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// One entry of a user's append-only status audit trail.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatusHistoryEntry {
    pub status: String,
    pub changed_by: Option<i64>,
    pub notes: String,
    pub changed_at: DateTime<Utc>,
}
