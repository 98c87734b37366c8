use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod crm;
mod dedup;
mod discovery;
mod dns;
mod domain;
mod email;
mod error;
mod extraction;
mod filter;
mod firecrawl;
mod models;
mod normalizer;
mod output;
mod pipeline;
mod progress;
#[cfg(test)]
mod testing;

use config::{AppArgs, Config};
use crm::{CrmClient, CrmTarget};
use email::EmailValidator;
use extraction::ExtractionSettings;
use firecrawl::FirecrawlClient;
use pipeline::{LeadPipeline, PipelineOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    // Environment from .env must be in place before clap reads `env` values.
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = AppArgs::parse();
    let config = config::build_config(&args).context("Failed to build configuration")?;
    let target = domain::normalize_url(&args.domain)
        .with_context(|| format!("Invalid target domain '{}'", args.domain))?;

    run(&config, target.as_str()).await?;

    info!("Done!");
    Ok(())
}

async fn run(config: &Config, domain: &str) -> Result<()> {
    let service = Arc::new(FirecrawlClient::new(config)?);
    let validator = EmailValidator::new(config)?;

    if validator.checks_deliverability() {
        info!("Deliverability checks enabled");
    }

    let pipeline = LeadPipeline::new(service, ExtractionSettings::from_config(config), validator);
    let report = pipeline.run(domain, config.max_pages).await;
    tracing::debug!("Pipeline stages: {:?}", report.stages);
    info!(
        "Discovered {} URLs via {:?}, {} candidate pages{}, {} raw contacts ({} batches retried page by page)",
        report.discovered,
        report.discovery_source,
        report.candidates,
        if report.candidate_fallback { " (unfiltered fallback)" } else { "" },
        report.raw_contacts,
        report.batches_fallen_back
    );

    match report.outcome {
        PipelineOutcome::Completed(_) => {}
        PipelineOutcome::NoLeads => {
            info!("No valid leads found for {}", domain);
            return Ok(());
        }
        PipelineOutcome::Aborted => {
            info!("No URLs could be discovered for {}. Nothing to extract.", domain);
            return Ok(());
        }
    }
    let leads = report.leads();

    let files = output::save_results(leads, &config.output_dir, &config.output_basename)
        .context("Failed to save results")?;
    info!(
        "Extraction complete! Found {} valid leads ({} pages scraped, {} failed). Results in {}",
        leads.len(),
        report.pages_extracted,
        report.page_failures,
        files.json.display()
    );

    if config.push_to_hubspot || config.push_to_instantly {
        let crm = CrmClient::new(config)?;
        if config.push_to_hubspot {
            crm.push(CrmTarget::HubSpot, leads).await;
        }
        if config.push_to_instantly {
            crm.push(CrmTarget::Instantly, leads).await;
        }
    }

    Ok(())
}
