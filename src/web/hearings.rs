//! Hearing listing and detail handlers.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::data::hearings::{self, DateCount, HearingFilter, SortColumn, SortOrder};
use crate::data::models::{Division, Hearing};
use crate::state::AppState;
use crate::web::error::{ApiError, OptionNotFoundExt, db_error};

/// Upper bound on page size, regardless of what the client asks for.
const MAX_PAGE_SIZE: i64 = 100;

/// Cap on the dates summary endpoint.
const MAX_DATES: i64 = 100;

#[derive(Debug, Deserialize, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct HearingsParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub division: Option<Division>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortColumn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
}

#[derive(Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct HearingResponse {
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
}

impl From<Hearing> for HearingResponse {
    fn from(h: Hearing) -> Self {
        Self {
            id: h.id,
            list_date: h.list_date,
            case_number: h.case_number,
            time: h.time,
            hearing_datetime: h.hearing_datetime,
            venue: h.venue,
            judge: h.judge,
            case_details: h.case_details,
            hearing_type: h.hearing_type,
            additional_information: h.additional_information,
            division: h.division,
            source_url: h.source_url,
            scraped_at: h.scraped_at,
        }
    }
}

#[derive(Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
    pub total: i64,
}

#[derive(Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct HearingsListResponse {
    pub data: Vec<HearingResponse>,
    pub pagination: Pagination,
}

/// List hearings with filtering, sorting, and pagination.
pub(super) async fn list_hearings(
    State(state): State<AppState>,
    Query(params): Query<HearingsParams>,
) -> Result<Json<HearingsListResponse>, ApiError> {
    if params.offset < 0 {
        return Err(ApiError::BadRequest("offset must not be negative".into()));
    }

    let limit = params
        .limit
        .unwrap_or(state.config.records_per_page_default)
        .clamp(1, MAX_PAGE_SIZE);

    let filter = HearingFilter {
        date: params.date,
        date_from: params.date_from,
        date_to: params.date_to,
        case_number: params.case_number.filter(|s| !s.trim().is_empty()),
        division: params.division,
        search: params.search.filter(|s| !s.trim().is_empty()),
        sort_by: params.sort_by,
        sort_order: params.sort_order,
        limit,
        offset: params.offset,
    };

    let (rows, total) = hearings::list(&state.db_pool, &filter)
        .await
        .map_err(db_error)?;

    Ok(Json(HearingsListResponse {
        data: rows.into_iter().map(HearingResponse::from).collect(),
        pagination: Pagination {
            limit,
            offset: params.offset,
            total,
        },
    }))
}

/// Fetch one hearing by id.
pub(super) async fn get_hearing(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<HearingResponse>, ApiError> {
    let hearing = hearings::get(&state.db_pool, id)
        .await
        .map_err(db_error)?
        .or_not_found("hearing")?;
    Ok(Json(hearing.into()))
}

/// Distinct list dates with per-division counts, newest first.
pub(super) async fn list_dates(
    State(state): State<AppState>,
) -> Result<Json<Vec<DateCount>>, ApiError> {
    let dates = hearings::dates_summary(&state.db_pool, MAX_DATES)
        .await
        .map_err(db_error)?;
    Ok(Json(dates))
}
