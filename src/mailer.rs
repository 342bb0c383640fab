//! Outbound email: scraper data-error reports and saved-search digests.
//!
//! Dispatch is best-effort. A misconfigured or unreachable relay never fails
//! the pipeline; without SMTP configuration the sink logs and drops.

use chrono::NaiveDate;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::data::models::Hearing;
use crate::scrape::LONDON;

/// Cap on the raw HTML attached to table-parsing error reports.
const HTML_SAMPLE_MAX_BYTES: usize = 2048;

/// Which stage of the pipeline produced a data error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataErrorKind {
    LinkDiscovery,
    TableParsing,
}

impl DataErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataErrorKind::LinkDiscovery => "link-discovery",
            DataErrorKind::TableParsing => "table-parsing",
        }
    }
}

/// A scraper failure report for the operations inbox.
#[derive(Debug, Default)]
pub struct DataErrorReport {
    pub error: String,
    pub date: Option<NaiveDate>,
    pub url: Option<String>,
    pub html_sample: Option<String>,
    pub context: Option<String>,
}

/// One section of a saved-search digest.
pub struct DigestSection<'a> {
    pub search_text: &'a str,
    pub matches: &'a [Hearing],
}

/// Truncate a page body for inclusion in an error report.
pub fn truncate_html_sample(body: &str) -> String {
    if body.len() <= HTML_SAMPLE_MAX_BYTES {
        return body.to_string();
    }
    let mut end = HTML_SAMPLE_MAX_BYTES;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<Mailbox>,
    error_recipient: Option<Mailbox>,
    base_url: String,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Self {
        let from = config.smtp_from.as_deref().and_then(|raw| {
            raw.parse::<Mailbox>()
                .map_err(|e| warn!(from = raw, error = %e, "invalid SMTP from address"))
                .ok()
        });

        let transport = match (&config.smtp_host, &from) {
            (Some(host), Some(_)) => {
                match AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host) {
                    Ok(builder) => {
                        let mut builder = builder.port(config.smtp_port);
                        if let (Some(user), Some(pass)) =
                            (&config.smtp_username, &config.smtp_password)
                        {
                            builder =
                                builder.credentials(Credentials::new(user.clone(), pass.clone()));
                        }
                        Some(builder.build())
                    }
                    Err(e) => {
                        warn!(host = %host, error = %e, "failed to build SMTP transport; email dispatch disabled");
                        None
                    }
                }
            }
            _ => {
                info!("SMTP not configured; email dispatch disabled");
                None
            }
        };

        let error_recipient = config.data_error_recipient.as_deref().and_then(|raw| {
            raw.parse::<Mailbox>()
                .map_err(|e| warn!(recipient = raw, error = %e, "invalid data error recipient"))
                .ok()
        });

        Self {
            transport,
            from,
            error_recipient,
            base_url: config.public_base_url.clone(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.transport.is_some() && self.from.is_some()
    }

    /// Report a scraper data error to the operations inbox.
    ///
    /// Failures are logged and swallowed.
    pub async fn data_error(&self, kind: DataErrorKind, report: DataErrorReport) {
        let Some(recipient) = self.error_recipient.clone() else {
            debug!(kind = kind.as_str(), "no data error recipient configured; dropping report");
            return;
        };

        let subject = match report.date {
            Some(date) => format!("[causelist] {} error for {date}", kind.as_str()),
            None => format!("[causelist] {} error", kind.as_str()),
        };
        let body = render_data_error(kind, &report);

        if let Err(e) = self.send(recipient, &subject, body).await {
            warn!(kind = kind.as_str(), error = %e, "failed to dispatch data error report");
        }
    }

    /// Send one saved-search digest. Returns `Ok(true)` when the message was
    /// actually handed to the relay, `Ok(false)` when dispatch is disabled.
    pub async fn saved_search_digest(
        &self,
        email: &str,
        display_name: &str,
        sections: &[DigestSection<'_>],
    ) -> anyhow::Result<bool> {
        if !self.enabled() {
            debug!(user = email, "email dispatch disabled; digest not sent");
            return Ok(false);
        }

        let to: Mailbox = format!("{display_name} <{email}>")
            .parse()
            .or_else(|_| email.parse())?;

        let total: usize = sections.iter().map(|s| s.matches.len()).sum();
        let subject = format!(
            "{total} hearing{} matching your saved searches",
            if total == 1 { "" } else { "s" }
        );
        let body = render_digest(display_name, sections, &self.base_url);

        self.send(to, &subject, body).await?;
        Ok(true)
    }

    async fn send(&self, to: Mailbox, subject: &str, body: String) -> anyhow::Result<()> {
        let (Some(transport), Some(from)) = (&self.transport, &self.from) else {
            anyhow::bail!("email dispatch disabled");
        };

        let message = Message::builder()
            .from(from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        transport.send(message).await?;
        Ok(())
    }
}

fn render_data_error(kind: DataErrorKind, report: &DataErrorReport) -> String {
    let mut body = format!("Scraper {} failure\n\nError: {}\n", kind.as_str(), report.error);
    if let Some(date) = report.date {
        body.push_str(&format!("List date: {date}\n"));
    }
    if let Some(url) = &report.url {
        body.push_str(&format!("URL: {url}\n"));
    }
    if let Some(context) = &report.context {
        body.push_str(&format!("Context: {context}\n"));
    }
    if let Some(sample) = &report.html_sample {
        body.push_str("\n--- page sample ---\n");
        body.push_str(sample);
        body.push('\n');
    }
    body
}

fn render_digest(display_name: &str, sections: &[DigestSection<'_>], base_url: &str) -> String {
    let mut body = format!("Hello {display_name},\n\nNew cause list entries match your saved searches:\n");

    for section in sections {
        body.push_str(&format!("\n\"{}\"\n", section.search_text));
        for hearing in section.matches {
            let date_formatted = hearing
                .hearing_datetime
                .with_timezone(&LONDON)
                .format("%A %-d %B %Y");
            let judge = hearing.judge.as_deref().unwrap_or("-");
            let venue = hearing.venue.as_deref().unwrap_or("-");
            body.push_str(&format!(
                "  - {} ({}): {date_formatted}, {}, {venue}, {judge}\n",
                hearing.case_details, hearing.hearing_type, hearing.time
            ));
        }
    }

    body.push_str(&format!("\nBrowse the full listings: {base_url}\n"));
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::Division;
    use chrono::{TimeZone, Utc};

    fn hearing(case_details: &str) -> Hearing {
        Hearing {
            id: 1,
            list_date: NaiveDate::from_ymd_opt(2025, 9, 2).unwrap(),
            case_number: "202500001 A 1".to_string(),
            time: "10:30am".to_string(),
            hearing_datetime: Utc.with_ymd_and_hms(2025, 9, 2, 9, 30, 0).unwrap(),
            venue: Some("Court 5".to_string()),
            judge: Some("Smith J".to_string()),
            case_details: case_details.to_string(),
            hearing_type: "Appeal".to_string(),
            additional_information: String::new(),
            division: Division::Criminal,
            source_url: "https://www.judiciary.uk/lists/crim".to_string(),
            scraped_at: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn digest_lists_each_section() {
        let hearings = vec![hearing("R v Example")];
        let sections = vec![DigestSection {
            search_text: "Example",
            matches: &hearings,
        }];
        let body = render_digest("Jo", &sections, "https://lists.example.org");

        assert!(body.contains("Hello Jo"));
        assert!(body.contains("\"Example\""));
        assert!(body.contains("R v Example"));
        assert!(body.contains("Tuesday 2 September 2025"));
        assert!(body.contains("10:30am"));
        assert!(body.contains("https://lists.example.org"));
    }

    #[test]
    fn html_sample_is_capped_at_a_char_boundary() {
        let sample = "é".repeat(3000);
        let truncated = truncate_html_sample(&sample);
        assert!(truncated.len() <= HTML_SAMPLE_MAX_BYTES);
        assert!(truncated.chars().all(|c| c == 'é'));
    }
}
