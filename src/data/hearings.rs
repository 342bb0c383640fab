//! Database query functions for stored hearings.

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use ts_rs::TS;

use crate::data::models::{Division, Hearing, HearingRecord};

const HEARING_SELECT: &str = "SELECT id, list_date, case_number, time, hearing_datetime, \
            venue, judge, case_details, hearing_type, additional_information, \
            division, source_url, scraped_at, created_at \
     FROM hearings";

/// Full-text match expression over the searchable hearing columns.
///
/// Mirrors the GIN index expression in the initial migration; keep the two in
/// sync or the planner falls back to a sequential scan.
const FTS_MATCH: &str = "to_tsvector('english', concat_ws(' ', case_details, hearing_type, \
     additional_information, judge, venue)) @@ websearch_to_tsquery('english', ";

/// Columns the public listing endpoint can sort by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SortColumn {
    HearingDatetime,
    CaseNumber,
    CreatedAt,
}

impl SortColumn {
    fn as_sql(self) -> &'static str {
        match self {
            SortColumn::HearingDatetime => "hearing_datetime",
            SortColumn::CaseNumber => "case_number",
            SortColumn::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filters for the public hearing listing.
///
/// All fields are optional; `None` disables that filter.
#[derive(Debug, Default, Clone)]
pub struct HearingFilter {
    pub date: Option<NaiveDate>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub case_number: Option<String>,
    pub division: Option<Division>,
    pub search: Option<String>,
    pub sort_by: Option<SortColumn>,
    pub sort_order: Option<SortOrder>,
    pub limit: i64,
    pub offset: i64,
}

const FILTER_WHERE: &str = "WHERE ($1::date IS NULL OR list_date = $1) \
       AND ($2::date IS NULL OR list_date >= $2) \
       AND ($3::date IS NULL OR list_date <= $3) \
       AND ($4::text IS NULL OR case_number ILIKE '%' || $4 || '%') \
       AND ($5::division IS NULL OR division = $5) \
       AND ($6::text IS NULL OR (to_tsvector('english', concat_ws(' ', case_details, \
            hearing_type, additional_information, judge, venue)) \
            @@ websearch_to_tsquery('english', $6) \
            OR case_number ILIKE '%' || $6 || '%'))";

/// List hearings matching the filter, returning `(rows, total)`.
pub async fn list(pool: &PgPool, filter: &HearingFilter) -> Result<(Vec<Hearing>, i64)> {
    let sort_column = filter.sort_by.unwrap_or(SortColumn::HearingDatetime).as_sql();
    let sort_order = filter.sort_order.unwrap_or(SortOrder::Asc).as_sql();

    let rows: Vec<Hearing> = sqlx::query_as(&format!(
        "{HEARING_SELECT} {FILTER_WHERE} \
         ORDER BY {sort_column} {sort_order}, id {sort_order} LIMIT $7 OFFSET $8"
    ))
    .bind(filter.date)
    .bind(filter.date_from)
    .bind(filter.date_to)
    .bind(filter.case_number.as_deref())
    .bind(filter.division)
    .bind(filter.search.as_deref())
    .bind(filter.limit)
    .bind(filter.offset)
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(&format!("SELECT count(*) FROM hearings {FILTER_WHERE}"))
        .bind(filter.date)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .bind(filter.case_number.as_deref())
        .bind(filter.division)
        .bind(filter.search.as_deref())
        .fetch_one(pool)
        .await?;

    Ok((rows, total))
}

/// Fetch a single hearing by id.
pub async fn get(pool: &PgPool, id: i64) -> Result<Option<Hearing>> {
    let row = sqlx::query_as(&format!("{HEARING_SELECT} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// All stored hearings for one list date, in published order.
pub async fn list_by_date(
    executor: impl PgExecutor<'_>,
    list_date: NaiveDate,
) -> Result<Vec<Hearing>> {
    let rows = sqlx::query_as(&format!(
        "{HEARING_SELECT} WHERE list_date = $1 ORDER BY hearing_datetime, id"
    ))
    .bind(list_date)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// Insert one parsed hearing.
pub async fn insert(executor: impl PgExecutor<'_>, record: &HearingRecord) -> Result<()> {
    sqlx::query(
        "INSERT INTO hearings (list_date, case_number, time, hearing_datetime, venue, judge, \
             case_details, hearing_type, additional_information, division, source_url, scraped_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(record.list_date)
    .bind(&record.case_number)
    .bind(&record.time)
    .bind(record.hearing_datetime)
    .bind(record.venue.as_deref())
    .bind(record.judge.as_deref())
    .bind(&record.case_details)
    .bind(&record.hearing_type)
    .bind(&record.additional_information)
    .bind(record.division)
    .bind(&record.source_url)
    .bind(record.scraped_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// Overwrite the mutable fields of a stored hearing.
pub async fn update(executor: impl PgExecutor<'_>, id: i64, record: &HearingRecord) -> Result<()> {
    sqlx::query(
        "UPDATE hearings SET hearing_datetime = $2, venue = $3, judge = $4, case_details = $5, \
             hearing_type = $6, additional_information = $7, source_url = $8, scraped_at = $9 \
         WHERE id = $1",
    )
    .bind(id)
    .bind(record.hearing_datetime)
    .bind(record.venue.as_deref())
    .bind(record.judge.as_deref())
    .bind(&record.case_details)
    .bind(&record.hearing_type)
    .bind(&record.additional_information)
    .bind(&record.source_url)
    .bind(record.scraped_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// Hard-delete hearings by id.
pub async fn delete_by_ids(executor: impl PgExecutor<'_>, ids: &[i64]) -> Result<u64> {
    let result = sqlx::query("DELETE FROM hearings WHERE id = ANY($1)")
        .bind(ids)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Hearings on any of the given dates matching a saved-search text.
///
/// Matches either the full-text index over the descriptive columns or the
/// case number as a substring. Ordered by list date then hearing time,
/// capped at `limit`.
pub async fn search_for_notification(
    pool: &PgPool,
    search_text: &str,
    dates: &[NaiveDate],
    limit: i64,
) -> Result<Vec<Hearing>> {
    let rows = sqlx::query_as(&format!(
        "{HEARING_SELECT} \
         WHERE list_date = ANY($1) \
           AND ({FTS_MATCH}$2) OR case_number ILIKE '%' || $2 || '%') \
         ORDER BY list_date ASC, hearing_datetime ASC LIMIT $3"
    ))
    .bind(dates)
    .bind(search_text)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Per-date listing counts for the public dates endpoint.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DateCount {
    pub date: NaiveDate,
    pub division: Division,
    pub count: i64,
}

/// Distinct `(list_date, division)` pairs with row counts, newest first.
pub async fn dates_summary(pool: &PgPool, limit: i64) -> Result<Vec<DateCount>> {
    let rows = sqlx::query_as(
        "SELECT list_date AS date, division, count(*) AS count \
         FROM hearings GROUP BY list_date, division \
         ORDER BY list_date DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
