//! Differential synchronization of parsed rows against the archive.
//!
//! For one list date the stored rows are made to exactly equal the
//! deduplicated input: new identity keys insert, matching keys with changed
//! fields update in place, and keys the upstream no longer publishes are
//! hard-deleted. Everything happens inside one transaction; no other date is
//! touched.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::data::hearings;
use crate::data::models::{Hearing, HearingKey, HearingRecord};

/// Row counts applied by one sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// The add/update/delete partition for one list date.
#[derive(Debug, Default)]
pub struct SyncPlan {
    pub inserts: Vec<HearingRecord>,
    pub updates: Vec<(i64, HearingRecord)>,
    pub delete_ids: Vec<i64>,
    /// Input rows discarded because a later row carried the same identity key.
    pub duplicates: usize,
}

impl SyncPlan {
    pub fn counts(&self) -> SyncCounts {
        SyncCounts {
            added: self.inserts.len(),
            updated: self.updates.len(),
            deleted: self.delete_ids.len(),
        }
    }
}

fn norm(value: Option<&str>) -> &str {
    value.map(str::trim).unwrap_or("")
}

/// Whether a stored row differs from its incoming counterpart in any field
/// that matters. Null and empty string compare equal, text is trimmed, and
/// instants compare in UTC.
fn differs(existing: &Hearing, incoming: &HearingRecord) -> bool {
    norm(existing.venue.as_deref()) != norm(incoming.venue.as_deref())
        || norm(existing.judge.as_deref()) != norm(incoming.judge.as_deref())
        || existing.case_details.trim() != incoming.case_details.trim()
        || existing.hearing_type.trim() != incoming.hearing_type.trim()
        || existing.additional_information.trim() != incoming.additional_information.trim()
        || existing.hearing_datetime != incoming.hearing_datetime
}

/// Partition incoming rows against the stored rows for the same list date.
///
/// Input duplicates by identity key keep the last occurrence.
pub fn plan_sync(existing: &[Hearing], incoming: Vec<HearingRecord>) -> SyncPlan {
    let mut order: Vec<HearingKey> = Vec::new();
    let mut deduped: HashMap<HearingKey, HearingRecord> = HashMap::new();
    let mut duplicates = 0;

    for record in incoming {
        let key = record.key();
        if deduped.insert(key.clone(), record).is_some() {
            duplicates += 1;
        } else {
            order.push(key);
        }
    }

    let existing_by_key: HashMap<HearingKey, &Hearing> =
        existing.iter().map(|h| (h.key(), h)).collect();

    let mut plan = SyncPlan {
        duplicates,
        ..Default::default()
    };

    for key in &order {
        let Some(record) = deduped.remove(key) else {
            continue;
        };
        match existing_by_key.get(key) {
            None => plan.inserts.push(record),
            Some(old) if differs(old, &record) => plan.updates.push((old.id, record)),
            Some(_) => {}
        }
    }

    let new_keys: HashSet<&HearingKey> = order.iter().collect();
    plan.delete_ids = existing
        .iter()
        .filter(|h| !new_keys.contains(&h.key()))
        .map(|h| h.id)
        .collect();

    plan
}

/// Apply a full sync for one list date inside a single transaction.
///
/// On any store error the transaction rolls back and the date's rows are
/// untouched.
pub async fn sync_hearings(
    pool: &PgPool,
    list_date: NaiveDate,
    rows: Vec<HearingRecord>,
) -> Result<SyncCounts> {
    debug_assert!(rows.iter().all(|r| r.list_date == list_date));

    let mut tx = pool.begin().await?;

    let existing = hearings::list_by_date(&mut *tx, list_date).await?;
    let plan = plan_sync(&existing, rows);

    if plan.duplicates > 0 {
        warn!(
            date = %list_date,
            duplicates = plan.duplicates,
            "input rows shared identity keys; keeping the last occurrence"
        );
    }

    for record in &plan.inserts {
        hearings::insert(&mut *tx, record).await?;
    }
    for (id, record) in &plan.updates {
        hearings::update(&mut *tx, *id, record).await?;
    }
    if !plan.delete_ids.is_empty() {
        hearings::delete_by_ids(&mut *tx, &plan.delete_ids).await?;
    }

    tx.commit().await?;

    let counts = plan.counts();
    info!(
        date = %list_date,
        added = counts.added,
        updated = counts.updated,
        deleted = counts.deleted,
        "cause list synchronized"
    );
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::Division;
    use chrono::{TimeZone, Utc};

    fn list_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 2).unwrap()
    }

    fn record(case_number: &str, time: &str, venue: Option<&str>, judge: Option<&str>) -> HearingRecord {
        HearingRecord {
            list_date: list_date(),
            case_number: case_number.to_string(),
            time: time.to_string(),
            hearing_datetime: Utc.with_ymd_and_hms(2025, 9, 2, 9, 30, 0).unwrap(),
            venue: venue.map(String::from),
            judge: judge.map(String::from),
            case_details: "R v Example".to_string(),
            hearing_type: "Appeal".to_string(),
            additional_information: String::new(),
            division: Division::Criminal,
            source_url: "https://www.judiciary.uk/lists/crim".to_string(),
            scraped_at: Utc::now(),
        }
    }

    fn stored(id: i64, rec: &HearingRecord) -> Hearing {
        Hearing {
            id,
            list_date: rec.list_date,
            case_number: rec.case_number.clone(),
            time: rec.time.clone(),
            hearing_datetime: rec.hearing_datetime,
            venue: rec.venue.clone(),
            judge: rec.judge.clone(),
            case_details: rec.case_details.clone(),
            hearing_type: rec.hearing_type.clone(),
            additional_information: rec.additional_information.clone(),
            division: rec.division,
            source_url: rec.source_url.clone(),
            scraped_at: rec.scraped_at,
            created_at: rec.scraped_at,
        }
    }

    #[test]
    fn first_ingest_adds_everything() {
        let incoming = vec![
            record("202500001 A 1", "10am", Some("Court 5"), Some("Smith J")),
            record("202500002 B 1", "11am", Some("Court 5"), Some("Smith J")),
            record("202500003 C 1", "2pm", Some("Court 6"), Some("Jones J")),
        ];
        let plan = plan_sync(&[], incoming);
        assert_eq!(plan.counts(), SyncCounts { added: 3, updated: 0, deleted: 0 });
        assert_eq!(plan.duplicates, 0);
    }

    #[test]
    fn unchanged_rows_produce_an_empty_plan() {
        let rec = record("202500001 A 1", "10am", Some("Court 5"), Some("Smith J"));
        let existing = vec![stored(1, &rec)];
        let plan = plan_sync(&existing, vec![rec]);
        assert_eq!(plan.counts(), SyncCounts::default());
    }

    #[test]
    fn changed_judge_updates_in_place() {
        let old = record("202500001 A 1", "10am", Some("Court 5"), Some("Jones J"));
        let existing = vec![stored(7, &old)];
        let new = record("202500001 A 1", "10am", Some("Court 5"), Some("Smith J"));

        let plan = plan_sync(&existing, vec![new]);
        assert_eq!(plan.counts(), SyncCounts { added: 0, updated: 1, deleted: 0 });
        assert_eq!(plan.updates[0].0, 7);
    }

    #[test]
    fn missing_keys_are_deleted() {
        let keep = record("202500001 A 1", "10am", Some("Court 5"), Some("Smith J"));
        let drop = record("202500002 B 1", "11am", Some("Court 5"), Some("Smith J"));
        let existing = vec![stored(1, &keep), stored(2, &drop)];

        let plan = plan_sync(&existing, vec![keep]);
        assert_eq!(plan.counts(), SyncCounts { added: 0, updated: 0, deleted: 1 });
        assert_eq!(plan.delete_ids, vec![2]);
    }

    #[test]
    fn duplicate_keys_keep_the_last_occurrence() {
        let first = record("202500001 A 1", "10am", Some("Court 5"), Some("Jones J"));
        let mut second = first.clone();
        second.judge = Some("Smith J".to_string());

        let plan = plan_sync(&[], vec![first, second]);
        assert_eq!(plan.duplicates, 1);
        assert_eq!(plan.inserts.len(), 1);
        assert_eq!(plan.inserts[0].judge.as_deref(), Some("Smith J"));
    }

    #[test]
    fn null_and_empty_compare_equal() {
        let mut old = record("202500001 A 1", "10am", None, Some("Smith J"));
        old.additional_information = String::new();
        let mut stored_row = stored(3, &old);
        stored_row.venue = None;

        let mut new = old.clone();
        new.venue = Some("  ".to_string());

        let plan = plan_sync(&[stored_row], vec![new]);
        assert_eq!(plan.counts(), SyncCounts::default());
    }

    #[test]
    fn time_is_part_of_the_identity_key() {
        let old = record("202500001 A 1", "10am", Some("Court 5"), Some("Smith J"));
        let existing = vec![stored(1, &old)];
        let mut moved = old.clone();
        moved.time = "2pm".to_string();
        moved.hearing_datetime = Utc.with_ymd_and_hms(2025, 9, 2, 13, 0, 0).unwrap();

        let plan = plan_sync(&existing, vec![moved]);
        // A moved hearing is a new row plus a deletion, not an update.
        assert_eq!(plan.counts(), SyncCounts { added: 1, updated: 0, deleted: 1 });
    }
}
