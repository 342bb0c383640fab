//! Saved-search matching, run after each pipeline sync.
//!
//! Matching is stateless over today's and tomorrow's listings; repeat digests
//! are acceptable and bounded only by the per-user sliding-window rate limit.

use chrono::{DateTime, Days, Duration, Utc};
use sqlx::PgPool;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::data::models::Hearing;
use crate::data::saved_searches::{self, ActiveSearch};
use crate::data::{hearings, notifications};
use crate::mailer::{DigestSection, Mailer};
use crate::scrape::LONDON;
use crate::utils::log_if_slow;

/// Hard cap on matches per search in one digest.
const MAX_MATCHES_PER_SEARCH: i64 = 100;

const SLOW_QUERY_THRESHOLD: std::time::Duration = std::time::Duration::from_millis(500);

/// What the matcher did in one invocation.
#[derive(Debug, Default, Clone, Copy)]
pub struct MatcherOutcome {
    pub users_considered: usize,
    pub users_rate_limited: usize,
    pub digests_sent: usize,
}

/// One user's enabled searches, grouped from the active-search join.
#[derive(Debug)]
struct UserSearches {
    user_id: i64,
    email: String,
    display_name: String,
    searches: Vec<(i64, String)>,
}

fn group_by_user(rows: Vec<ActiveSearch>) -> Vec<UserSearches> {
    let mut groups: Vec<UserSearches> = Vec::new();
    for row in rows {
        match groups.last_mut() {
            Some(group) if group.user_id == row.user_id => {
                group.searches.push((row.search_id, row.search_text));
            }
            _ => groups.push(UserSearches {
                user_id: row.user_id,
                email: row.email,
                display_name: row.display_name,
                searches: vec![(row.search_id, row.search_text)],
            }),
        }
    }
    groups
}

/// Run every enabled saved search over today's and tomorrow's listings and
/// dispatch one digest per user with matches.
///
/// Today/tomorrow are computed at matcher time, so a run that straddles
/// midnight matches against the dates current when matching happens.
pub async fn run_saved_search_matching(
    pool: &PgPool,
    mailer: &Mailer,
    config: &Config,
    now: DateTime<Utc>,
) -> anyhow::Result<MatcherOutcome> {
    let mut outcome = MatcherOutcome::default();

    let rows = saved_searches::list_active_with_users(pool).await?;
    if rows.is_empty() {
        debug!("no enabled saved searches with notifiable owners");
        return Ok(outcome);
    }

    let today = now.with_timezone(&LONDON).date_naive();
    let dates = [today, today + Days::new(1)];
    let window_start = now - Duration::hours(config.notification_window_hours);

    for user in group_by_user(rows) {
        outcome.users_considered += 1;

        let sent_recently = notifications::count_since(pool, user.user_id, window_start).await?;
        if sent_recently >= config.notification_max_per_window {
            debug!(
                user_id = user.user_id,
                sent_recently,
                window_hours = config.notification_window_hours,
                "notification rate limit reached, skipping user"
            );
            outcome.users_rate_limited += 1;
            continue;
        }

        let mut matched: Vec<(String, Vec<Hearing>)> = Vec::new();
        for (search_id, search_text) in &user.searches {
            let start = Instant::now();
            let matches = hearings::search_for_notification(
                pool,
                search_text,
                &dates,
                MAX_MATCHES_PER_SEARCH,
            )
            .await?;
            log_if_slow(start, SLOW_QUERY_THRESHOLD, "search_for_notification");
            if matches.is_empty() {
                debug!(search_id, "saved search matched nothing");
            } else {
                matched.push((search_text.clone(), matches));
            }
        }

        if matched.is_empty() {
            continue;
        }

        let sections: Vec<DigestSection<'_>> = matched
            .iter()
            .map(|(text, matches)| DigestSection {
                search_text: text,
                matches,
            })
            .collect();
        let total_matches: usize = sections.iter().map(|s| s.matches.len()).sum();

        match mailer
            .saved_search_digest(&user.email, &user.display_name, &sections)
            .await
        {
            Ok(true) => {
                notifications::record(
                    pool,
                    user.user_id,
                    total_matches as i64,
                    sections.len() as i64,
                )
                .await?;
                outcome.digests_sent += 1;
            }
            Ok(false) => {}
            Err(e) => {
                // Dispatch failures are per-user and never fail the run.
                warn!(user_id = user.user_id, error = %e, "failed to dispatch digest");
            }
        }
    }

    if outcome.digests_sent > 0 {
        info!(
            digests = outcome.digests_sent,
            rate_limited = outcome.users_rate_limited,
            "saved search digests dispatched"
        );
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(user_id: i64, search_id: i64, text: &str) -> ActiveSearch {
        ActiveSearch {
            search_id,
            search_text: text.to_string(),
            user_id,
            email: format!("user{user_id}@example.org"),
            display_name: format!("User {user_id}"),
        }
    }

    #[test]
    fn grouping_preserves_user_and_search_order() {
        let rows = vec![
            row(1, 10, "fraud"),
            row(1, 11, "murder"),
            row(2, 12, "appeal"),
        ];
        let groups = group_by_user(rows);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].user_id, 1);
        assert_eq!(
            groups[0]
                .searches
                .iter()
                .map(|(_, t)| t.as_str())
                .collect::<Vec<_>>(),
            vec!["fraud", "murder"]
        );
        assert_eq!(groups[1].user_id, 2);
        assert_eq!(groups[1].searches.len(), 1);
    }

    #[test]
    fn empty_input_groups_to_nothing() {
        assert!(group_by_user(Vec::new()).is_empty());
    }
}
