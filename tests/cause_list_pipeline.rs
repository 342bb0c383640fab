//! End-to-end tests of the scrape path that needs no network or database:
//! summary discovery -> table parsing -> sync planning over HTML fixtures.

use chrono::{NaiveDate, TimeZone, Utc};
use url::Url;

use causelist::data::models::{Division, Hearing, HearingRecord};
use causelist::scrape::discovery::discover_cause_lists;
use causelist::scrape::parser::{ParseError, parse_cause_list};
use causelist::scrape::sync::{SyncCounts, plan_sync};

const SUMMARY_PAGE: &str = r#"
<html><body>
<main>
  <h1>Royal Courts of Justice daily lists</h1>
  <ul>
    <li><a href="/lists/kb-02-09-2025">King's Bench daily cause list 2 September 2025</a></li>
    <li><a href="/lists/coa-crim-02-09-2025">Court of Appeal (Criminal Division) daily cause list for Tuesday 2 September 2025</a></li>
    <li><a href="/lists/coa-crim-03-09-2025">Court of Appeal (Criminal Division) daily cause list for Wednesday 3 September 2025</a></li>
    <li><a href="/lists/coa-civ-02-09-2025">Court of Appeal (Civil Division) daily cause list for Tuesday 2 September 2025</a></li>
  </ul>
</main>
</body></html>
"#;

const LIST_PAGE: &str = r#"
<html><body>
<h1>Court of Appeal (Criminal Division) daily cause list</h1>
<p>Hearings listed before the judges of the Criminal Division.</p>
<table class="govuk-table">
  <thead class="govuk-table__head">
    <tr class="govuk-table__row">
      <th>Venue</th><th>Judge</th><th>Time</th><th>Case Number</th>
      <th>Case Details</th><th>Hearing Type</th><th>Additional Information</th>
    </tr>
  </thead>
  <tbody class="govuk-table__body">
    <tr><td>Court 4</td><td>Holroyde LJ</td><td>10:30am</td><td>202401234 B 2</td>
        <td>R v Atkinson</td><td>Appeal against conviction</td><td></td></tr>
    <tr><td></td><td></td><td>11:15am</td><td>202402345 A 1</td>
        <td>R v Burton</td><td>Appeal against sentence</td><td>Video link</td></tr>
    <tr><td>Court 6</td><td>Carr J</td><td>2pm</td><td>202403456 C 3</td>
        <td>R v Chen</td><td>Renewed application</td><td></td></tr>
  </tbody>
</table>
</body></html>
"#;

fn list_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, 2).unwrap()
}

fn parse_fixture() -> Vec<HearingRecord> {
    parse_cause_list(
        LIST_PAGE,
        list_date(),
        "https://www.judiciary.uk/lists/coa-crim-02-09-2025",
        Division::Criminal,
        Utc::now(),
    )
    .unwrap()
}

fn stored(id: i64, record: &HearingRecord) -> Hearing {
    Hearing {
        id,
        list_date: record.list_date,
        case_number: record.case_number.clone(),
        time: record.time.clone(),
        hearing_datetime: record.hearing_datetime,
        venue: record.venue.clone(),
        judge: record.judge.clone(),
        case_details: record.case_details.clone(),
        hearing_type: record.hearing_type.clone(),
        additional_information: record.additional_information.clone(),
        division: record.division,
        source_url: record.source_url.clone(),
        scraped_at: record.scraped_at,
        created_at: record.scraped_at,
    }
}

#[test]
fn discovery_selects_the_division_links_for_both_dates() {
    let now = Utc.with_ymd_and_hms(2025, 9, 2, 8, 0, 0).unwrap();
    let base = Url::parse("https://www.judiciary.uk/court-lists/").unwrap();

    let links = discover_cause_lists(
        SUMMARY_PAGE,
        &base,
        Division::Criminal,
        now,
        &["www.judiciary.uk"],
    );

    assert_eq!(links.len(), 2);
    assert_eq!(
        links[0].url.as_str(),
        "https://www.judiciary.uk/lists/coa-crim-02-09-2025"
    );
    assert_eq!(links[0].target_date, list_date());
    assert_eq!(
        links[1].url.as_str(),
        "https://www.judiciary.uk/lists/coa-crim-03-09-2025"
    );
    assert_eq!(
        links[1].target_date,
        NaiveDate::from_ymd_opt(2025, 9, 3).unwrap()
    );
}

#[test]
fn parsed_fixture_carries_inherited_columns_and_local_times() {
    let rows = parse_fixture();
    assert_eq!(rows.len(), 3);

    // Row 2 inherits both venue and judge from row 1.
    assert_eq!(rows[1].venue.as_deref(), Some("Court 4"));
    assert_eq!(rows[1].judge.as_deref(), Some("Holroyde LJ"));
    // Row 3 names its own venue and judge, resetting both runs.
    assert_eq!(rows[2].venue.as_deref(), Some("Court 6"));
    assert_eq!(rows[2].judge.as_deref(), Some("Carr J"));

    // 10:30am BST is 09:30 UTC.
    assert_eq!(
        rows[0].hearing_datetime,
        Utc.with_ymd_and_hms(2025, 9, 2, 9, 30, 0).unwrap()
    );
    assert_eq!(rows[2].time, "2pm");
    assert_eq!(
        rows[2].hearing_datetime,
        Utc.with_ymd_and_hms(2025, 9, 2, 13, 0, 0).unwrap()
    );
}

#[test]
fn first_ingest_plans_every_row_as_an_insert() {
    let rows = parse_fixture();
    let plan = plan_sync(&[], rows);
    assert_eq!(
        plan.counts(),
        SyncCounts {
            added: 3,
            updated: 0,
            deleted: 0
        }
    );
}

#[test]
fn reingest_of_identical_page_is_a_no_op() {
    let rows = parse_fixture();
    let existing: Vec<Hearing> = rows
        .iter()
        .enumerate()
        .map(|(i, r)| stored(i as i64 + 1, r))
        .collect();

    let plan = plan_sync(&existing, rows);
    assert_eq!(plan.counts(), SyncCounts::default());
}

#[test]
fn upstream_edits_become_updates_and_retractions_become_deletes() {
    let rows = parse_fixture();
    let existing: Vec<Hearing> = rows
        .iter()
        .enumerate()
        .map(|(i, r)| stored(i as i64 + 1, r))
        .collect();

    // The upstream corrects a judge and retracts the 2pm hearing.
    let mut edited: Vec<HearingRecord> = rows;
    edited[1].judge = Some("Edis LJ".to_string());
    edited.remove(2);

    let plan = plan_sync(&existing, edited);
    assert_eq!(
        plan.counts(),
        SyncCounts {
            added: 0,
            updated: 1,
            deleted: 1
        }
    );
    assert_eq!(plan.updates[0].0, 2);
    assert_eq!(plan.delete_ids, vec![3]);
}

#[test]
fn page_without_required_columns_is_a_fatal_parse_error() {
    let page = r#"
        <table class="govuk-table">
          <thead><tr><th>Venue</th><th>Judge</th><th>Case Details</th></tr></thead>
          <tbody><tr><td>Court 4</td><td>Holroyde LJ</td><td>R v Atkinson</td></tr></tbody>
        </table>
    "#;
    let result = parse_cause_list(
        page,
        list_date(),
        "https://www.judiciary.uk/lists/broken",
        Division::Criminal,
        Utc::now(),
    );
    assert!(matches!(result, Err(ParseError::MissingColumn("time"))));
}
