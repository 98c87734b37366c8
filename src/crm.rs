//! Pushes leads to external CRMs (HubSpot, Instantly).

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::Lead;
use crate::progress::progress_bar;
use reqwest::Client;
use serde_json::{Value, json};

/// A CRM the leads can be pushed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CrmTarget {
    HubSpot,
    Instantly,
}

impl CrmTarget {
    fn label(self) -> &'static str {
        match self {
            CrmTarget::HubSpot => "HubSpot",
            CrmTarget::Instantly => "Instantly",
        }
    }

    /// Builds the request body for one lead.
    pub(crate) fn payload(self, lead: &Lead) -> Value {
        let (first_name, last_name) = split_name(lead.name.as_deref());
        match self {
            CrmTarget::HubSpot => {
                let text = |v: &Option<String>| v.clone().unwrap_or_default();
                json!({
                    "properties": {
                        "email": text(&lead.email),
                        "firstname": first_name,
                        "lastname": last_name,
                        "jobtitle": text(&lead.title),
                        "company": text(&lead.company),
                        "phone": text(&lead.phone),
                        "linkedin": text(&lead.linkedin),
                    }
                })
            }
            CrmTarget::Instantly => json!({
                "email": lead.email,
                "first_name": first_name,
                "last_name": last_name,
                "company": lead.company,
                "title": lead.title,
                "phone": lead.phone,
                "custom_fields": {
                    "linkedin": lead.linkedin,
                    "source": "firecrawl-extractor",
                }
            }),
        }
    }
}

/// Splits a full name into the first token and the rest.
fn split_name(name: Option<&str>) -> (String, String) {
    let mut parts = name.unwrap_or("").split_whitespace();
    let first = parts.next().unwrap_or("").to_string();
    let rest = parts.collect::<Vec<_>>().join(" ");
    (first, rest)
}

/// Counts for one push run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PushSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Pushes leads to CRMs, one request per lead.
pub(crate) struct CrmClient {
    http_client: Client,
    hubspot: Option<(String, String)>,
    instantly: Option<(String, String)>,
}

impl CrmClient {
    pub(crate) fn new(config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.crm_timeout)
            .build()
            .map_err(|e| {
                AppError::Generic(anyhow::anyhow!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            hubspot: config
                .hubspot_api_key
                .clone()
                .map(|key| (config.hubspot_url.clone(), key)),
            instantly: config
                .instantly_api_key
                .clone()
                .map(|key| (config.instantly_url.clone(), key)),
        })
    }

    fn endpoint(&self, target: CrmTarget) -> Option<&(String, String)> {
        match target {
            CrmTarget::HubSpot => self.hubspot.as_ref(),
            CrmTarget::Instantly => self.instantly.as_ref(),
        }
    }

    /// Pushes every lead with an email to `target`.
    ///
    /// A failed request is counted and logged, and the remaining leads are still
    /// pushed. Without an API key nothing is sent.
    pub(crate) async fn push(&self, target: CrmTarget, leads: &[Lead]) -> PushSummary {
        let mut summary = PushSummary::default();
        let Some((url, api_key)) = self.endpoint(target) else {
            tracing::warn!(target: "crm_task", "{} API key not configured", target.label());
            return summary;
        };

        let leads: Vec<&Lead> = leads
            .iter()
            .filter(|l| l.email.as_deref().is_some_and(|e| !e.is_empty()))
            .collect();
        tracing::info!(target: "crm_task", "Pushing {} leads to {}...", leads.len(), target.label());

        let bar = progress_bar(leads.len(), target.label());
        for lead in leads {
            summary.attempted += 1;
            let result = self
                .http_client
                .post(url)
                .bearer_auth(api_key)
                .json(&target.payload(lead))
                .send()
                .await
                .and_then(|response| response.error_for_status());

            match result {
                Ok(_) => summary.succeeded += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(target: "crm_task",
                        "Failed {}: {}", lead.email.as_deref().unwrap_or(""), e
                    );
                }
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        tracing::info!(target: "crm_task",
            "Successfully pushed {}/{} leads to {}",
            summary.succeeded,
            summary.attempted,
            target.label()
        );
        summary
    }
}
