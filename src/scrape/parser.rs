//! Parsing the hearing table out of a cause list page.
//!
//! Cause list pages carry a single GOV.UK styled table. Header spellings
//! drift between publications ("Case Number", "Case number", "Case no."
//! never, fortunately), so headers are mapped by substring. The venue and
//! judge columns use visual run-on: an empty cell repeats the value above it.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use html_scraper::{ElementRef, Html, Selector};
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

use crate::data::models::{Division, HearingRecord};
use crate::scrape::LONDON;

static TABLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.govuk-table").unwrap());
static THEAD_ROW_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("thead tr").unwrap());
static ROW_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th, td").unwrap());

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d{1,2})(?::(\d{2}))?\s*(am|pm)$").unwrap());

/// Expected case number shape: nine digits, a space, a letter, more digits.
/// Mismatches are published occasionally and are warned about, not dropped.
static CASE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{9} [A-Z] \d+$").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("no cause list table found in page")]
    NoTable,
    #[error("required column `{0}` missing from table header")]
    MissingColumn(&'static str),
    #[error("first row has an empty `{0}` cell with nothing to inherit")]
    MalformedFirstRow(&'static str),
}

/// Header-to-canonical-column mapping for one table.
#[derive(Debug, Default)]
struct ColumnMap {
    venue: Option<usize>,
    judge: Option<usize>,
    time: Option<usize>,
    case_number: Option<usize>,
    case_details: Option<usize>,
    hearing_type: Option<usize>,
    additional_information: Option<usize>,
}

impl ColumnMap {
    /// Map lowercased header cells by substring. Longer phrases are checked
    /// first so "hearing time" never lands on the time column by accident.
    fn from_headers(headers: &[String]) -> Self {
        let mut map = Self::default();
        for (index, header) in headers.iter().enumerate() {
            let header = header.to_lowercase();
            let slot = if header.contains("additional information") {
                &mut map.additional_information
            } else if header.contains("case number") {
                &mut map.case_number
            } else if header.contains("case details") {
                &mut map.case_details
            } else if header.contains("hearing type") {
                &mut map.hearing_type
            } else if header.contains("venue") {
                &mut map.venue
            } else if header.contains("judge") {
                &mut map.judge
            } else if header.contains("time") {
                &mut map.time
            } else {
                continue;
            };
            if slot.is_none() {
                *slot = Some(index);
            }
        }
        map
    }
}

/// Concatenated, whitespace-normalized text of one cell.
fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve an inheritable cell: non-empty cells update the run-on value,
/// empty cells repeat it. An empty cell in the first row has nothing to
/// repeat and marks the table malformed.
fn inherit_cell(
    cells: &[String],
    index: Option<usize>,
    last: &mut Option<String>,
    row_index: usize,
    column: &'static str,
) -> Result<Option<String>, ParseError> {
    let Some(index) = index else {
        return Ok(None);
    };
    let raw = cells.get(index).map(|s| s.trim()).unwrap_or("");
    if !raw.is_empty() {
        *last = Some(raw.to_string());
        return Ok(Some(raw.to_string()));
    }
    match last {
        Some(value) => Ok(Some(value.clone())),
        None if row_index == 0 => Err(ParseError::MalformedFirstRow(column)),
        None => Ok(None),
    }
}

/// Parse a published time-of-day string like `10:30am` or `2pm`.
pub fn parse_listing_time(s: &str) -> Option<NaiveTime> {
    let caps = TIME_RE.captures(s.trim())?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    if !(1..=12).contains(&hour) || minute > 59 {
        return None;
    }

    let is_pm = caps[3].eq_ignore_ascii_case("pm");
    let hour24 = if is_pm {
        if hour == 12 { 12 } else { hour + 12 }
    } else if hour == 12 {
        0
    } else {
        hour
    };
    NaiveTime::from_hms_opt(hour24, minute, 0)
}

/// Combine a list date with a local time into an instant.
///
/// Times around the DST transitions need care: an ambiguous autumn time
/// resolves to the earlier instant, and a spring-forward wall time that never
/// occurs is shifted an hour later.
pub fn combine_list_datetime(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    use chrono::offset::LocalResult;

    let naive = date.and_time(time);
    match LONDON.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let shifted = naive + chrono::Duration::hours(1);
            match LONDON.from_local_datetime(&shifted).earliest() {
                Some(dt) => dt.with_timezone(&Utc),
                None => Utc.from_utc_datetime(&naive),
            }
        }
    }
}

/// Parse the first cause list table in `body` into validated hearing rows.
///
/// Rows failing validation are dropped with a warning; structural problems
/// (no table, missing critical columns, malformed first row) are fatal.
pub fn parse_cause_list(
    body: &str,
    list_date: NaiveDate,
    source_url: &str,
    division: Division,
    scraped_at: DateTime<Utc>,
) -> Result<Vec<HearingRecord>, ParseError> {
    let html = Html::parse_document(body);

    let tables: Vec<ElementRef> = html.select(&TABLE_SELECTOR).collect();
    let table = *tables.first().ok_or(ParseError::NoTable)?;
    if tables.len() > 1 {
        warn!(
            count = tables.len(),
            url = source_url,
            "page has multiple cause list tables; using the first"
        );
    }

    let all_rows: Vec<ElementRef> = table.select(&ROW_SELECTOR).collect();
    let head_rows: Vec<ElementRef> = table.select(&THEAD_ROW_SELECTOR).collect();

    let (header_row, body_rows): (ElementRef, Vec<ElementRef>) = if let Some(head) = head_rows.first()
    {
        let body = all_rows
            .into_iter()
            .filter(|row| !head_rows.iter().any(|h| h.id() == row.id()))
            .collect();
        (*head, body)
    } else {
        match all_rows.split_first() {
            Some((first, rest)) => (*first, rest.to_vec()),
            None => return Err(ParseError::MissingColumn("time")),
        }
    };

    let headers: Vec<String> = header_row.select(&CELL_SELECTOR).map(cell_text).collect();
    let map = ColumnMap::from_headers(&headers);
    if map.time.is_none() {
        return Err(ParseError::MissingColumn("time"));
    }
    if map.case_number.is_none() {
        return Err(ParseError::MissingColumn("case number"));
    }

    let mut last_venue: Option<String> = None;
    let mut last_judge: Option<String> = None;
    let mut records = Vec::with_capacity(body_rows.len());

    for (row_index, row) in body_rows.iter().enumerate() {
        let cells: Vec<String> = row.select(&CELL_SELECTOR).map(cell_text).collect();

        let venue = inherit_cell(&cells, map.venue, &mut last_venue, row_index, "venue")?;
        let judge = inherit_cell(&cells, map.judge, &mut last_judge, row_index, "judge")?;

        let plain = |index: Option<usize>| -> String {
            index
                .and_then(|i| cells.get(i))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };

        let time = plain(map.time);
        let case_number = plain(map.case_number);

        let Some(local_time) = parse_listing_time(&time) else {
            warn!(
                row = row_index,
                time = %time,
                url = source_url,
                "dropping row with unparseable time"
            );
            continue;
        };
        if case_number.is_empty() {
            warn!(row = row_index, url = source_url, "dropping row with empty case number");
            continue;
        }
        if !CASE_NUMBER_RE.is_match(&case_number) {
            warn!(
                row = row_index,
                case_number = %case_number,
                "case number does not match the expected pattern"
            );
        }

        records.push(HearingRecord {
            list_date,
            case_number,
            hearing_datetime: combine_list_datetime(list_date, local_time),
            time,
            venue,
            judge,
            case_details: plain(map.case_details),
            hearing_type: plain(map.hearing_type),
            additional_information: plain(map.additional_information),
            division,
            source_url: source_url.to_string(),
            scraped_at,
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const LIST_DATE: &str = "2025-09-02";

    fn list_date() -> NaiveDate {
        LIST_DATE.parse().unwrap()
    }

    fn parse(body: &str) -> Result<Vec<HearingRecord>, ParseError> {
        parse_cause_list(
            body,
            list_date(),
            "https://www.judiciary.uk/lists/crim-2-sep",
            Division::Criminal,
            Utc::now(),
        )
    }

    fn table(rows: &str) -> String {
        format!(
            r#"<html><body><table class="govuk-table">
            <thead><tr>
              <th>Venue</th><th>Judge</th><th>Time</th><th>Case Number</th>
              <th>Case Details</th><th>Hearing Type</th><th>Additional Information</th>
            </tr></thead>
            <tbody>{rows}</tbody>
            </table></body></html>"#
        )
    }

    #[test]
    fn time_grammar() {
        assert_eq!(
            parse_listing_time("10:30am"),
            NaiveTime::from_hms_opt(10, 30, 0)
        );
        assert_eq!(parse_listing_time("2pm"), NaiveTime::from_hms_opt(14, 0, 0));
        assert_eq!(parse_listing_time("2 PM"), NaiveTime::from_hms_opt(14, 0, 0));
        assert_eq!(parse_listing_time("12am"), NaiveTime::from_hms_opt(0, 0, 0));
        assert_eq!(parse_listing_time("12pm"), NaiveTime::from_hms_opt(12, 0, 0));
        assert_eq!(parse_listing_time("1pm"), NaiveTime::from_hms_opt(13, 0, 0));
        assert_eq!(parse_listing_time("13pm"), None);
        assert_eq!(parse_listing_time("0am"), None);
        assert_eq!(parse_listing_time("10:75am"), None);
        assert_eq!(parse_listing_time("1030"), None);
        assert_eq!(parse_listing_time(""), None);
    }

    #[test]
    fn combine_respects_bst() {
        // 2 September is BST (UTC+1): 10:30 local is 09:30 UTC.
        let dt = combine_list_datetime(list_date(), NaiveTime::from_hms_opt(10, 30, 0).unwrap());
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 9, 2, 9, 30, 0).unwrap());

        // 15 January is GMT: local equals UTC.
        let winter = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let dt = combine_list_datetime(winter, NaiveTime::from_hms_opt(10, 30, 0).unwrap());
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap());
    }

    #[test]
    fn combine_handles_spring_forward_gap() {
        // 1:30am on 30 March 2025 never occurs in London; it shifts to 2:30am
        // BST, which is 01:30 UTC.
        let gap_date = NaiveDate::from_ymd_opt(2025, 3, 30).unwrap();
        let dt = combine_list_datetime(gap_date, NaiveTime::from_hms_opt(1, 30, 0).unwrap());
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 3, 30, 1, 30, 0).unwrap());
    }

    #[test]
    fn parses_rows_with_inheritance() {
        let body = table(
            r#"<tr><td>Court 5</td><td>Smith J</td><td>10:30am</td><td>202500123 A 1</td>
                   <td>R v Example</td><td>Appeal against conviction</td><td></td></tr>
               <tr><td></td><td></td><td>11am</td><td>202500124 B 1</td>
                   <td>R v Other</td><td>Sentence</td><td>Video link</td></tr>
               <tr><td>Court 6</td><td></td><td>2pm</td><td>202500125 C 1</td>
                   <td>R v Third</td><td>Appeal</td><td></td></tr>"#,
        );

        let rows = parse(&body).unwrap();
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].venue.as_deref(), Some("Court 5"));
        assert_eq!(rows[0].judge.as_deref(), Some("Smith J"));
        assert_eq!(rows[1].venue.as_deref(), Some("Court 5"));
        assert_eq!(rows[1].judge.as_deref(), Some("Smith J"));
        assert_eq!(rows[2].venue.as_deref(), Some("Court 6"));
        assert_eq!(rows[2].judge.as_deref(), Some("Smith J"));

        assert_eq!(rows[0].additional_information, "");
        assert_eq!(rows[1].additional_information, "Video link");
        assert_eq!(rows[0].time, "10:30am");
        assert_eq!(
            rows[0].hearing_datetime,
            Utc.with_ymd_and_hms(2025, 9, 2, 9, 30, 0).unwrap()
        );
    }

    #[test]
    fn empty_first_row_inheritable_cell_is_fatal() {
        let body = table(
            r#"<tr><td></td><td>Smith J</td><td>10am</td><td>202500123 A 1</td>
                   <td>R v Example</td><td>Appeal</td><td></td></tr>"#,
        );
        assert!(matches!(
            parse(&body),
            Err(ParseError::MalformedFirstRow("venue"))
        ));
    }

    #[test]
    fn missing_time_column_is_fatal() {
        let body = r#"<table class="govuk-table">
            <thead><tr><th>Venue</th><th>Case Number</th></tr></thead>
            <tbody><tr><td>Court 5</td><td>202500123 A 1</td></tr></tbody>
            </table>"#;
        assert!(matches!(
            parse(body),
            Err(ParseError::MissingColumn("time"))
        ));
    }

    #[test]
    fn missing_case_number_column_is_fatal() {
        let body = r#"<table class="govuk-table">
            <thead><tr><th>Time</th><th>Case Details</th></tr></thead>
            <tbody><tr><td>10am</td><td>R v Example</td></tr></tbody>
            </table>"#;
        assert!(matches!(
            parse(body),
            Err(ParseError::MissingColumn("case number"))
        ));
    }

    #[test]
    fn no_table_is_fatal() {
        assert!(matches!(
            parse("<html><body><p>maintenance</p></body></html>"),
            Err(ParseError::NoTable)
        ));
    }

    #[test]
    fn rows_with_bad_time_are_dropped_not_fatal() {
        let body = table(
            r#"<tr><td>Court 5</td><td>Smith J</td><td>TBC</td><td>202500123 A 1</td>
                   <td>R v Example</td><td>Appeal</td><td></td></tr>
               <tr><td></td><td></td><td>11am</td><td>202500124 B 1</td>
                   <td>R v Other</td><td>Sentence</td><td></td></tr>"#,
        );
        let rows = parse(&body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].case_number, "202500124 B 1");
        // Inheritance still saw the first row's venue and judge.
        assert_eq!(rows[0].venue.as_deref(), Some("Court 5"));
    }

    #[test]
    fn unexpected_case_number_shape_is_kept() {
        let body = table(
            r#"<tr><td>Court 5</td><td>Smith J</td><td>10am</td><td>Ref 42</td>
                   <td>R v Example</td><td>Appeal</td><td></td></tr>"#,
        );
        let rows = parse(&body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].case_number, "Ref 42");
    }

    #[test]
    fn empty_table_parses_to_no_rows() {
        let rows = parse(&table("")).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn headerless_table_uses_first_row_as_header() {
        let body = r#"<table class="govuk-table">
            <tr><td>Time</td><td>Case number</td></tr>
            <tr><td>9:15am</td><td>202500126 D 2</td></tr>
            </table>"#;
        let rows = parse(body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].time, "9:15am");
    }

    #[test]
    fn first_of_multiple_tables_wins() {
        let body = format!(
            "{}{}",
            table(
                r#"<tr><td>Court 1</td><td>A J</td><td>10am</td><td>202500001 A 1</td>
                       <td>First</td><td>Appeal</td><td></td></tr>"#
            ),
            table(
                r#"<tr><td>Court 2</td><td>B J</td><td>11am</td><td>202500002 B 1</td>
                       <td>Second</td><td>Appeal</td><td></td></tr>"#
            )
        );
        let rows = parse(&body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].case_details, "First");
    }
}
