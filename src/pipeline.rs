//! Pipeline orchestrator: Discovery → Filtering → Extraction → Validation.

use crate::dedup::finalize;
use crate::discovery::{DiscoverySource, discover};
use crate::email::EmailValidator;
use crate::extraction::{ExtractionEngine, ExtractionSettings};
use crate::filter::filter_candidates;
use crate::firecrawl::ScrapeService;
use crate::models::Lead;
use std::sync::Arc;
use std::time::Instant;

/// States of a single pipeline run. Transitions are linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PipelineStage {
    Idle,
    Discovering,
    Filtering,
    Extracting,
    Validating,
    Done,
    Aborted,
}

/// Terminal outcome of a run.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PipelineOutcome {
    /// Discovery found no URLs; nothing downstream ran.
    Aborted,
    /// Every stage ran but no valid lead survived.
    NoLeads,
    Completed(Vec<Lead>),
}

/// Summary of a run, including the stages it passed through.
#[derive(Debug, Clone)]
pub(crate) struct PipelineReport {
    pub outcome: PipelineOutcome,
    pub stages: Vec<PipelineStage>,
    pub discovery_source: Option<DiscoverySource>,
    pub discovered: usize,
    pub candidates: usize,
    pub candidate_fallback: bool,
    pub pages_extracted: usize,
    pub page_failures: usize,
    pub batches_fallen_back: usize,
    pub raw_contacts: usize,
}

impl PipelineReport {
    fn new() -> Self {
        Self {
            outcome: PipelineOutcome::NoLeads,
            stages: vec![PipelineStage::Idle],
            discovery_source: None,
            discovered: 0,
            candidates: 0,
            candidate_fallback: false,
            pages_extracted: 0,
            page_failures: 0,
            batches_fallen_back: 0,
            raw_contacts: 0,
        }
    }

    fn enter(&mut self, stage: PipelineStage) {
        tracing::debug!(target: "pipeline_task", "Stage: {:?}", stage);
        self.stages.push(stage);
    }

    pub(crate) fn leads(&self) -> &[Lead] {
        match &self.outcome {
            PipelineOutcome::Completed(leads) => leads,
            _ => &[],
        }
    }
}

/// Runs the lead extraction pipeline. Holds no state between runs.
pub(crate) struct LeadPipeline {
    service: Arc<dyn ScrapeService>,
    extraction: ExtractionEngine,
    validator: EmailValidator,
}

impl LeadPipeline {
    pub(crate) fn new(
        service: Arc<dyn ScrapeService>,
        settings: ExtractionSettings,
        validator: EmailValidator,
    ) -> Self {
        Self {
            extraction: ExtractionEngine::new(service.clone(), settings),
            service,
            validator,
        }
    }

    /// Runs every stage once for `domain`.
    ///
    /// `page_ceiling` bounds the crawl and, a second time, the number of
    /// candidate pages handed to extraction.
    pub(crate) async fn run(&self, domain: &str, page_ceiling: usize) -> PipelineReport {
        let start_time = Instant::now();
        let mut report = PipelineReport::new();
        tracing::info!(target: "pipeline_task", "Starting lead extraction for: {}", domain);

        report.enter(PipelineStage::Discovering);
        let discovery = discover(self.service.as_ref(), domain, page_ceiling).await;
        report.discovery_source = Some(discovery.source);
        report.discovered = discovery.urls.len();
        if discovery.urls.is_empty() {
            tracing::error!(target: "pipeline_task", "No URLs found. Aborting run.");
            report.enter(PipelineStage::Aborted);
            report.outcome = PipelineOutcome::Aborted;
            return report;
        }

        report.enter(PipelineStage::Filtering);
        let selection = filter_candidates(&discovery.urls);
        report.candidates = selection.urls.len();
        report.candidate_fallback = selection.used_fallback;
        tracing::info!(target: "pipeline_task", "Selected {} candidate pages", selection.urls.len());

        report.enter(PipelineStage::Extracting);
        let ceiling = page_ceiling.min(selection.urls.len());
        let extraction = self.extraction.extract(&selection.urls[..ceiling]).await;
        report.pages_extracted = extraction.pages_scraped;
        report.page_failures = extraction.failures.len();
        report.batches_fallen_back = extraction.batches_fallen_back;
        for failure in &extraction.failures {
            tracing::debug!(target: "pipeline_task", "Skipped page {}: {}", failure.url, failure.reason);
        }
        report.raw_contacts = extraction.contacts.len();
        tracing::info!(target: "pipeline_task", "Extracted {} raw results", extraction.contacts.len());

        report.enter(PipelineStage::Validating);
        let finalized = finalize(&extraction.contacts, &self.validator).await;
        for skip in &finalized.skipped {
            tracing::trace!(target: "pipeline_task",
                "Raw contact #{} ({}) skipped: {:?}",
                skip.index,
                skip.email.as_deref().unwrap_or("-"),
                skip.reason
            );
        }
        tracing::info!(target: "pipeline_task", "Final lead count: {}", finalized.leads.len());

        report.enter(PipelineStage::Done);
        report.outcome = if finalized.leads.is_empty() {
            tracing::warn!(target: "pipeline_task", "No valid leads found");
            PipelineOutcome::NoLeads
        } else {
            PipelineOutcome::Completed(finalized.leads)
        };

        tracing::info!(target: "pipeline_task",
            "Run for {} finished in {:.2?}", domain, start_time.elapsed()
        );
        report
    }
}
