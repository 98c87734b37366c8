//! Email address normalization, validation and extraction from free text.

use crate::config::Config;
use crate::dns::{create_resolver, resolve_mail_server};
use crate::error::{AppError, Result};
use lettre::Address;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use trust_dns_resolver::TokioAsyncResolver;

/// Anchored pre-filter run before any expensive validation.
static BASIC_EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("Failed to compile basic email regex pattern. This should not happen.")
});

/// Unanchored pattern used to find email-looking substrings in page text.
static TEXT_EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
        .expect("Failed to compile text email regex pattern. This should not happen.")
});

const MAX_LOCAL_PART_LEN: usize = 64;
const MAX_ADDRESS_LEN: usize = 254;

/// Special-use top-level domains (RFC 6761 and friends) that never receive public mail.
const SPECIAL_USE_TLDS: &[&str] = &["arpa", "invalid", "local", "localhost", "onion", "test"];

/// Outcome of validating a single address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EmailVerdict {
    /// The address is valid; carries its normalized form.
    Valid(String),
    /// Rejected by the fast regex pre-filter.
    InvalidFormat,
    /// Rejected by full validation or the deliverability check.
    Rejected(String),
}

/// Finds every email-looking substring in `text`.
///
/// Matches are collapsed case-insensitively; the first spelling seen is kept and
/// the order of first appearance is preserved.
pub(crate) fn extract_emails_from_text(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    TEXT_EMAIL_REGEX
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|email| seen.insert(email.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Trims and lower-cases the address. Idempotent.
fn clean(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Fast syntactic pre-filter, applied to the cleaned address.
pub(crate) fn passes_prefilter(email: &str) -> bool {
    BASIC_EMAIL_REGEX.is_match(&clean(email))
}

/// Full syntactic validation and normalization, without any network access.
///
/// # Returns
/// * `Ok(String)` with the normalized address.
/// * `Err(String)` describing why the address is not valid.
pub(crate) fn normalize_email(email: &str) -> std::result::Result<String, String> {
    let email = clean(email);
    if email.is_empty() {
        return Err("Empty email".to_string());
    }
    if email.len() > MAX_ADDRESS_LEN {
        return Err(format!("Address longer than {} characters", MAX_ADDRESS_LEN));
    }

    let address = Address::from_str(&email).map_err(|e| e.to_string())?;
    let (local, domain) = (address.user(), address.domain());

    if local.len() > MAX_LOCAL_PART_LEN {
        return Err(format!(
            "Local part longer than {} characters",
            MAX_LOCAL_PART_LEN
        ));
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return Err("Misplaced dot in local part".to_string());
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err("Domain must contain a dot".to_string());
    }
    for label in &labels {
        if label.is_empty() {
            return Err("Empty domain label".to_string());
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(format!("Domain label '{}' starts or ends with a hyphen", label));
        }
    }

    if let Some(tld) = labels.last().filter(|tld| SPECIAL_USE_TLDS.contains(*tld)) {
        return Err(format!("Special-use domain .{} cannot receive mail", tld));
    }

    Ok(format!("{}@{}", local, domain))
}

/// What a DNS lookup revealed about a domain's ability to receive mail.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DomainCheck {
    /// At least one MX record.
    Mx,
    /// No MX record, but the domain resolves to an address.
    AddressOnly,
    /// NXDOMAIN, null MX, or no MX/A/AAAA records at all.
    Undeliverable(String),
    /// The lookup itself failed (timeout, unreachable nameserver). Never cached.
    Unknown(String),
}

/// Validates addresses, optionally checking that their domain can receive mail.
pub(crate) struct EmailValidator {
    resolver: Option<Arc<TokioAsyncResolver>>,
    // Definitive answers only; transient failures are retried on the next address.
    domain_cache: Mutex<HashMap<String, DomainCheck>>,
}

impl EmailValidator {
    /// Creates a validator according to the configuration. A DNS resolver is only
    /// built when deliverability checking is enabled.
    pub(crate) fn new(config: &Config) -> Result<Self> {
        let resolver = if config.check_deliverability {
            Some(Arc::new(create_resolver(config)?))
        } else {
            None
        };
        Ok(Self {
            resolver,
            domain_cache: Mutex::new(HashMap::new()),
        })
    }

    /// A validator that never touches the network.
    #[cfg(test)]
    pub(crate) fn syntax_only() -> Self {
        Self {
            resolver: None,
            domain_cache: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn checks_deliverability(&self) -> bool {
        self.resolver.is_some()
    }

    /// Validates one address.
    ///
    /// # Arguments
    /// * `email` - The raw address as extracted from a page.
    ///
    /// # Returns
    /// * `EmailVerdict::Valid` with the normalized address, or the rejection stage.
    pub(crate) async fn validate(&self, email: &str) -> EmailVerdict {
        if !passes_prefilter(email) {
            return EmailVerdict::InvalidFormat;
        }

        let normalized = match normalize_email(email) {
            Ok(normalized) => normalized,
            Err(reason) => return EmailVerdict::Rejected(reason),
        };

        if self.resolver.is_some() {
            let domain = normalized.rsplit_once('@').map(|(_, d)| d).unwrap_or_default();
            match self.check_domain(domain).await {
                DomainCheck::Undeliverable(reason) => return EmailVerdict::Rejected(reason),
                DomainCheck::Unknown(reason) => {
                    tracing::debug!(target: "validate_task",
                        "Deliverability of {} unknown ({}), accepting {}", domain, reason, normalized
                    );
                }
                DomainCheck::Mx | DomainCheck::AddressOnly => {}
            }
        }

        EmailVerdict::Valid(normalized)
    }

    /// Checks whether the domain publishes MX records. Returns false when
    /// deliverability checking is disabled or the lookup failed.
    pub(crate) async fn has_mx_records(&self, domain: &str) -> bool {
        self.resolver.is_some() && self.check_domain(domain).await == DomainCheck::Mx
    }

    async fn check_domain(&self, domain: &str) -> DomainCheck {
        if let Some(cached) = self.cached(domain) {
            return cached;
        }
        let Some(resolver) = &self.resolver else {
            return DomainCheck::Unknown("deliverability checking disabled".to_string());
        };

        let outcome = match resolve_mail_server(resolver, domain).await {
            Ok(server) if server.is_mx() => DomainCheck::Mx,
            Ok(server) => {
                tracing::debug!(target: "validate_task",
                    "{} has no MX records, accepting A record {}", domain, server.exchange
                );
                DomainCheck::AddressOnly
            }
            Err(e @ (AppError::NxDomain(_) | AppError::NoDnsRecords(_))) => {
                DomainCheck::Undeliverable(format!("Domain {} cannot receive mail: {}", domain, e))
            }
            Err(e) => return DomainCheck::Unknown(e.to_string()),
        };

        if let Ok(mut cache) = self.domain_cache.lock() {
            cache.insert(domain.to_string(), outcome.clone());
        }
        outcome
    }

    fn cached(&self, domain: &str) -> Option<DomainCheck> {
        self.domain_cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(domain).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_emails_collapses_case_variants() {
        let emails = extract_emails_from_text("reach us at sales@acme.io or SALES@acme.io");
        assert_eq!(emails, vec!["sales@acme.io".to_string()]);
    }

    #[test]
    fn test_extract_emails_keeps_first_appearance_order() {
        let text = "Bob: bob@x.com\nAnn: ann@x.co.uk, again bob@x.com";
        assert_eq!(
            extract_emails_from_text(text),
            vec!["bob@x.com".to_string(), "ann@x.co.uk".to_string()]
        );
    }

    #[test]
    fn test_extract_emails_requires_two_letter_tld() {
        assert!(extract_emails_from_text("broken a@b.c and @nothing.com").is_empty());
    }

    #[test]
    fn test_prefilter() {
        assert!(passes_prefilter("  John.Doe+tag@Example.COM "));
        assert!(!passes_prefilter("john doe@example.com"));
        assert!(!passes_prefilter("john@localhost"));
        assert!(!passes_prefilter(""));
    }

    #[test]
    fn test_normalize_email_lowercases_and_trims() {
        assert_eq!(normalize_email("A@X.com").unwrap(), "a@x.com");
        assert_eq!(normalize_email("a@x.com ").unwrap(), "a@x.com");
    }

    #[test]
    fn test_normalize_email_is_a_projection() {
        for email in ["Ann.Lee@Example.org", " bob+news@sub.example.co.uk", "x_y@a-b.io"] {
            let once = normalize_email(email).unwrap();
            let twice = normalize_email(&once).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_normalize_email_rejects_bad_dots_and_hyphens() {
        assert!(normalize_email("john..doe@example.com").is_err());
        assert!(normalize_email(".john@example.com").is_err());
        assert!(normalize_email("john@-example.com").is_err());
        assert!(normalize_email("john@example..com").is_err());
    }

    #[tokio::test]
    async fn test_validate_without_deliverability() {
        let validator = EmailValidator::syntax_only();
        assert!(!validator.checks_deliverability());
        assert_eq!(
            validator.validate("Jane@Acme.io").await,
            EmailVerdict::Valid("jane@acme.io".to_string())
        );
        assert_eq!(validator.validate("jane@acme").await, EmailVerdict::InvalidFormat);
        assert!(matches!(
            validator.validate("jane..doe@acme.io").await,
            EmailVerdict::Rejected(_)
        ));
        assert!(!validator.has_mx_records("acme.io").await);
    }

    #[test]
    fn test_normalize_email_rejects_special_use_domains() {
        for email in ["x@host.local", "a@b.test", "ops@mail.invalid", "root@localhost.localhost"] {
            assert!(normalize_email(email).is_err(), "{}", email);
        }
        assert_eq!(normalize_email("a@testing.io").unwrap(), "a@testing.io");
    }

    fn deliverability_config() -> Config {
        Config {
            check_deliverability: true,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_cached_domain_answers_skip_the_resolver() {
        let validator = EmailValidator::new(&deliverability_config()).unwrap();
        {
            let mut cache = validator.domain_cache.lock().unwrap();
            cache.insert(
                "dead.io".to_string(),
                DomainCheck::Undeliverable("Domain dead.io cannot receive mail".to_string()),
            );
            cache.insert("fallback.io".to_string(), DomainCheck::AddressOnly);
            cache.insert("mail.io".to_string(), DomainCheck::Mx);
        }

        assert_eq!(
            validator.validate("ann@dead.io").await,
            EmailVerdict::Rejected("Domain dead.io cannot receive mail".to_string())
        );
        assert_eq!(
            validator.validate("Bob@Fallback.io").await,
            EmailVerdict::Valid("bob@fallback.io".to_string())
        );
        assert!(validator.has_mx_records("mail.io").await);
        assert!(!validator.has_mx_records("fallback.io").await);
    }

    #[tokio::test]
    async fn test_unreachable_nameserver_accepts_and_does_not_cache() {
        let config = Config {
            // TEST-NET-1, never answers.
            dns_servers: vec!["192.0.2.1".to_string()],
            dns_timeout: std::time::Duration::from_millis(300),
            ..deliverability_config()
        };
        let validator = EmailValidator::new(&config).unwrap();

        assert_eq!(
            validator.validate("ann@gmail.com").await,
            EmailVerdict::Valid("ann@gmail.com".to_string())
        );
        assert_eq!(
            validator.validate("bob@gmail.com").await,
            EmailVerdict::Valid("bob@gmail.com".to_string())
        );
        assert!(validator.cached("gmail.com").is_none());
    }
}
