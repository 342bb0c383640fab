//! Locating today's and tomorrow's cause list links on the summary page.
//!
//! The summary page is an ordinary content page; the cause list links are
//! identified purely by their visible text, which names the court, the
//! division, and the list date in prose (e.g. "Court of Appeal (Criminal
//! Division) daily cause list for Tuesday 2 September 2025").

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use html_scraper::{Html, Selector};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

use crate::data::models::Division;
use crate::scrape::LONDON;

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").unwrap());

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// A cause list link selected from the summary page.
#[derive(Debug, Clone)]
pub struct DiscoveredLink {
    pub url: Url,
    pub link_text: String,
    pub target_date: NaiveDate,
    pub division: Division,
}

/// Select the cause list links for today and tomorrow (London time).
///
/// For each target date the first anchor whose text matches is taken; an
/// anchor is never selected twice. An empty result is not an error — lists
/// are simply not published yet.
pub fn discover_cause_lists(
    body: &str,
    summary_url: &Url,
    division: Division,
    now: DateTime<Utc>,
    allowed_hosts: &[&str],
) -> Vec<DiscoveredLink> {
    let today = now.with_timezone(&LONDON).date_naive();
    let targets = [today, today + Days::new(1)];

    let html = Html::parse_document(body);
    let anchors: Vec<(String, String)> = html
        .select(&ANCHOR_SELECTOR)
        .filter_map(|a| {
            let href = a.attr("href")?.trim();
            if href.is_empty() {
                return None;
            }
            let text = a.text().collect::<Vec<_>>().join(" ");
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            Some((href.to_string(), text))
        })
        .collect();

    let mut links: Vec<DiscoveredLink> = Vec::new();
    for target in targets {
        let Some((href, text)) = anchors
            .iter()
            .find(|(_, text)| link_text_matches(text, division, target))
        else {
            debug!(date = %target, division = division.name(), "no cause list link found");
            continue;
        };

        let url = match summary_url.join(href) {
            Ok(url) => url,
            Err(e) => {
                warn!(href = %href, error = %e, "failed to resolve cause list href");
                continue;
            }
        };

        // The same anchor can name both dates ("lists for 2 and 3 September");
        // today wins and tomorrow is not duplicated.
        if links.iter().any(|l| l.url == url) {
            debug!(url = %url, date = %target, "link already selected for an earlier date");
            continue;
        }

        match url.host_str() {
            Some(host) if allowed_hosts.contains(&host) => {}
            host => warn!(
                ?host,
                url = %url,
                "cause list link points outside the expected hosts"
            ),
        }

        links.push(DiscoveredLink {
            url,
            link_text: text.clone(),
            target_date: target,
            division,
        });
    }

    links
}

/// Whether an anchor's visible text names this division's cause list for the
/// given date.
fn link_text_matches(text: &str, division: Division, date: NaiveDate) -> bool {
    let lower = text.to_lowercase();
    if !lower.contains("court of appeal") {
        return false;
    }
    if !lower.contains(&division.name().to_lowercase()) {
        return false;
    }

    let day = date.day();
    if !contains_word(text, &day.to_string()) && !contains_word(text, &format!("{day:02}")) {
        return false;
    }

    let month = MONTH_NAMES[date.month0() as usize];
    if !contains_word(text, month) && !contains_word(text, &month[..3]) {
        return false;
    }

    contains_word(text, &date.year().to_string())
}

/// Case-insensitive whole-word containment; words are delimited by any
/// non-letter, non-digit character.
fn contains_word(text: &str, word: &str) -> bool {
    let pattern = format!(r"(?i)(^|[^a-z0-9]){}($|[^a-z0-9])", regex::escape(word));
    Regex::new(&pattern)
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn matches_full_and_abbreviated_month() {
        let d = date(2025, 9, 2);
        assert!(link_text_matches(
            "Court of Appeal (Criminal Division) daily cause list for Tuesday 2 September 2025",
            Division::Criminal,
            d
        ));
        assert!(link_text_matches(
            "Court of Appeal Criminal Division cause list 02 Sep 2025",
            Division::Criminal,
            d
        ));
    }

    #[test]
    fn day_must_be_a_whole_word() {
        let d = date(2025, 9, 2);
        // "12" and "22" contain the digit 2 but not as a whole word.
        assert!(!link_text_matches(
            "Court of Appeal Criminal Division cause list 12 September 2025",
            Division::Criminal,
            d
        ));
        assert!(!link_text_matches(
            "Court of Appeal Criminal Division cause list 22 September 2025",
            Division::Criminal,
            d
        ));
    }

    #[test]
    fn rejects_wrong_division_and_year() {
        let d = date(2025, 9, 2);
        assert!(!link_text_matches(
            "Court of Appeal (Civil Division) daily cause list for 2 September 2025",
            Division::Criminal,
            d
        ));
        assert!(!link_text_matches(
            "Court of Appeal Criminal Division cause list 2 September 2024",
            Division::Criminal,
            d
        ));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let d = date(2025, 9, 2);
        assert!(link_text_matches(
            "COURT OF APPEAL CRIMINAL DIVISION CAUSE LIST 2 SEPTEMBER 2025",
            Division::Criminal,
            d
        ));
    }

    #[test]
    fn discovers_today_then_tomorrow_without_duplicates() {
        // 10:00 UTC on 2 September 2025 is 11:00 in London (BST).
        let now = Utc.with_ymd_and_hms(2025, 9, 2, 10, 0, 0).unwrap();
        let base = Url::parse("https://www.judiciary.uk/lists/").unwrap();
        let body = r#"
            <html><body>
            <a href="/other">Unrelated page</a>
            <a href="/lists/crim-3-sep">Court of Appeal (Criminal Division) daily cause list for Wednesday 3 September 2025</a>
            <a href="/lists/crim-2-sep">Court of Appeal (Criminal Division) daily cause list for Tuesday 2 September 2025</a>
            <a href="/lists/crim-2-sep-dup">Court of Appeal Criminal Division list 2 September 2025</a>
            </body></html>
        "#;

        let links = discover_cause_lists(
            body,
            &base,
            Division::Criminal,
            now,
            &["www.judiciary.uk"],
        );

        assert_eq!(links.len(), 2);
        assert_eq!(links[0].target_date, date(2025, 9, 2));
        assert!(links[0].url.as_str().ends_with("/lists/crim-2-sep"));
        assert_eq!(links[1].target_date, date(2025, 9, 3));
        assert!(links[1].url.as_str().ends_with("/lists/crim-3-sep"));
    }

    #[test]
    fn same_anchor_is_not_selected_twice() {
        let now = Utc.with_ymd_and_hms(2025, 9, 2, 10, 0, 0).unwrap();
        let base = Url::parse("https://www.judiciary.uk/lists/").unwrap();
        let body = r#"
            <a href="/lists/combined">Court of Appeal Criminal Division cause list for 2 and 3 September 2025</a>
        "#;

        let links = discover_cause_lists(
            body,
            &base,
            Division::Criminal,
            now,
            &["www.judiciary.uk"],
        );

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target_date, date(2025, 9, 2));
    }

    #[test]
    fn empty_page_yields_no_links() {
        let now = Utc.with_ymd_and_hms(2025, 9, 2, 10, 0, 0).unwrap();
        let base = Url::parse("https://www.judiciary.uk/lists/").unwrap();
        let links = discover_cause_lists(
            "<html><body><p>Nothing here</p></body></html>",
            &base,
            Division::Criminal,
            now,
            &["www.judiciary.uk"],
        );
        assert!(links.is_empty());
    }
}
