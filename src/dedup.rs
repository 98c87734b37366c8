//! Validation and deduplication of raw contacts into the final lead set.

use crate::email::{EmailValidator, EmailVerdict};
use crate::models::{Lead, RawContact};
use crate::progress::progress_bar;
use std::collections::HashSet;

/// Why a raw contact did not become a lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SkipReason {
    MissingEmail,
    /// Failed the fast syntactic pre-filter.
    InvalidFormat,
    /// Failed full validation or the deliverability check.
    Rejected(String),
    /// Another contact with the same normalized email was seen first.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ContactSkip {
    /// Position of the contact in the input sequence.
    pub index: usize,
    pub email: Option<String>,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FinalizeReport {
    /// Leads in first-seen order, unique by normalized email.
    pub leads: Vec<Lead>,
    pub skipped: Vec<ContactSkip>,
}

impl FinalizeReport {
    pub(crate) fn count(&self, reason: fn(&SkipReason) -> bool) -> usize {
        self.skipped.iter().filter(|s| reason(&s.reason)).count()
    }
}

/// Validates every raw contact and keeps the first one per normalized email.
///
/// Later contacts with an already seen email are dropped even if they carry
/// more fields; nothing is merged.
///
/// # Arguments
/// * `raw` - Raw contacts in extraction order.
/// * `validator` - The email validator for this run.
pub(crate) async fn finalize(raw: &[RawContact], validator: &EmailValidator) -> FinalizeReport {
    tracing::info!(target: "validate_task", "Validating and deduplicating {} raw contacts...", raw.len());

    let mut report = FinalizeReport::default();
    let mut seen_emails: HashSet<String> = HashSet::new();
    let bar = progress_bar(raw.len(), "Validating");

    for (index, contact) in raw.iter().enumerate() {
        bar.inc(1);
        let email = match contact.email.as_deref() {
            Some(email) if !email.is_empty() => email,
            _ => {
                report.skipped.push(ContactSkip {
                    index,
                    email: None,
                    reason: SkipReason::MissingEmail,
                });
                continue;
            }
        };

        let skip = |reason: SkipReason| ContactSkip {
            index,
            email: Some(email.to_string()),
            reason,
        };

        let normalized = match validator.validate(email).await {
            EmailVerdict::Valid(normalized) => normalized,
            EmailVerdict::InvalidFormat => {
                tracing::debug!(target: "validate_task", "Invalid format: {}", email);
                report.skipped.push(skip(SkipReason::InvalidFormat));
                continue;
            }
            EmailVerdict::Rejected(reason) => {
                tracing::debug!(target: "validate_task", "Rejected {}: {}", email, reason);
                report.skipped.push(skip(SkipReason::Rejected(reason)));
                continue;
            }
        };

        if !seen_emails.insert(normalized.clone()) {
            report.skipped.push(skip(SkipReason::Duplicate));
            continue;
        }

        report.leads.push(Lead {
            url: contact.url.clone(),
            name: contact.name.clone(),
            title: contact.title.clone(),
            email: Some(normalized),
            linkedin: contact.linkedin.clone(),
            company: contact.company.clone(),
            phone: contact.phone.clone(),
            ..Default::default()
        });
    }
    bar.finish_and_clear();

    if validator.checks_deliverability() {
        let mut domains: Vec<&str> = report
            .leads
            .iter()
            .filter_map(|lead| lead.email.as_deref()?.rsplit_once('@').map(|(_, d)| d))
            .collect();
        domains.sort_unstable();
        domains.dedup();
        for domain in domains {
            if !validator.has_mx_records(domain).await {
                tracing::info!(target: "validate_task",
                    "Leads at {} were accepted without a confirmed MX record", domain
                );
            }
        }
    }

    tracing::info!(target: "validate_task",
        "Kept {} leads ({} without email, {} invalid, {} duplicates)",
        report.leads.len(),
        report.count(|r| matches!(r, SkipReason::MissingEmail)),
        report.count(|r| matches!(r, SkipReason::InvalidFormat | SkipReason::Rejected(_))),
        report.count(|r| matches!(r, SkipReason::Duplicate))
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(url: &str, email: Option<&str>, name: Option<&str>) -> RawContact {
        RawContact {
            url: url.to_string(),
            email: email.map(str::to_string),
            name: name.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_case_and_whitespace_variants_collapse() {
        let raw = vec![
            contact("https://x.com/a", Some("A@X.com"), None),
            contact("https://x.com/b", Some("a@x.com "), None),
        ];
        let report = finalize(&raw, &EmailValidator::syntax_only()).await;
        assert_eq!(report.leads.len(), 1);
        assert_eq!(report.leads[0].email.as_deref(), Some("a@x.com"));
        assert_eq!(report.leads[0].url, "https://x.com/a");
        assert_eq!(report.skipped[0].reason, SkipReason::Duplicate);
    }

    #[tokio::test]
    async fn test_first_seen_wins_without_merge() {
        let raw = vec![
            contact("https://x.com/contact", Some("ann@x.com"), None),
            contact("https://x.com/team", Some("Ann@x.com"), Some("Ann Lee")),
        ];
        let report = finalize(&raw, &EmailValidator::syntax_only()).await;
        assert_eq!(report.leads.len(), 1);
        assert_eq!(report.leads[0].url, "https://x.com/contact");
        assert!(report.leads[0].name.is_none());
    }

    #[tokio::test]
    async fn test_skips_are_reported_with_reasons() {
        let raw = vec![
            contact("u0", None, Some("No Email")),
            contact("u1", Some(""), None),
            contact("u2", Some("not-an-email"), None),
            contact("u3", Some("bad..dots@x.com"), None),
            contact("u4", Some("ok@x.com"), None),
        ];
        let report = finalize(&raw, &EmailValidator::syntax_only()).await;
        assert_eq!(report.leads.len(), 1);
        let reasons: Vec<_> = report.skipped.iter().map(|s| (s.index, s.reason.clone())).collect();
        assert_eq!(reasons[0], (0, SkipReason::MissingEmail));
        assert_eq!(reasons[1], (1, SkipReason::MissingEmail));
        assert_eq!(reasons[2], (2, SkipReason::InvalidFormat));
        assert!(matches!(reasons[3], (3, SkipReason::Rejected(_))));
    }

    #[tokio::test]
    async fn test_output_order_is_first_seen_and_idempotent() {
        let raw = vec![
            contact("u", Some("c@x.com"), None),
            contact("u", Some("a@x.com"), None),
            contact("u", Some("b@x.com"), None),
            contact("u", Some("a@x.com"), None),
        ];
        let validator = EmailValidator::syntax_only();
        let first = finalize(&raw, &validator).await;
        let second = finalize(&raw, &validator).await;
        let emails: Vec<_> = first.leads.iter().filter_map(|l| l.email.as_deref()).collect();
        assert_eq!(emails, vec!["c@x.com", "a@x.com", "b@x.com"]);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_lead_copies_contact_fields() {
        let raw = vec![RawContact {
            url: "https://x.com/team".to_string(),
            name: Some("Bo Chen".to_string()),
            title: Some("CTO".to_string()),
            email: Some("Bo@X.com".to_string()),
            linkedin: Some("https://linkedin.com/in/bo".to_string()),
            company: Some("X".to_string()),
            phone: Some("+1 555 0100".to_string()),
        }];
        let lead = finalize(&raw, &EmailValidator::syntax_only()).await.leads.remove(0);
        assert_eq!(lead.email.as_deref(), Some("bo@x.com"));
        assert_eq!(lead.title.as_deref(), Some("CTO"));
        assert_eq!(lead.phone.as_deref(), Some("+1 555 0100"));
        assert_eq!(lead.source_page, None);
        assert_eq!(lead.confidence, 0.0);
    }
}
