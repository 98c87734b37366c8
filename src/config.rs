//! Defines the configuration settings for the lead-harvester application.

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Command line arguments for lead-harvester
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Extract leads from websites using Firecrawl",
    long_about = None,
    after_help = "Examples:\n  lead-harvester --domain https://example.com\n  lead-harvester --domain https://example.com --max-pages 200 --output my_leads\n  lead-harvester --domain https://example.com --push-hubspot"
)]
pub(crate) struct AppArgs {
    /// Target domain to extract leads from (e.g., https://example.com)
    #[arg(long)]
    pub domain: String,

    /// Maximum number of pages to process
    #[arg(long, env = "MAX_PAGES")]
    pub max_pages: Option<usize>,

    /// Base filename for output files
    #[arg(long)]
    pub output: Option<String>,

    /// Directory where output files are written
    #[arg(long, env = "LEAD_HARVESTER_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Push results to HubSpot CRM
    #[arg(long, default_value = "false")]
    pub push_hubspot: bool,

    /// Push results to Instantly
    #[arg(long, default_value = "false")]
    pub push_instantly: bool,

    /// Scrape candidate pages one by one instead of in batches
    #[arg(long, default_value = "false")]
    pub no_batch: bool,

    /// Number of URLs sent per batch scrape request
    #[arg(long, env = "BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Check that email domains can receive mail (DNS lookups)
    #[arg(long, default_value = "false")]
    pub check_deliverability: bool,

    /// Path to configuration file (TOML format)
    #[arg(long, env = "LEAD_HARVESTER_CONFIG")]
    pub config_file: Option<String>,

    /// Firecrawl API key
    #[arg(long, env = "FIRECRAWL_API_KEY", hide_env_values = true)]
    pub firecrawl_api_key: Option<String>,

    /// HubSpot private app token
    #[arg(long, env = "HUBSPOT_API_KEY", hide_env_values = true)]
    pub hubspot_api_key: Option<String>,

    /// Instantly API key
    #[arg(long, env = "INSTANTLY_API_KEY", hide_env_values = true)]
    pub instantly_api_key: Option<String>,
}

/// TOML Configuration file structure
#[derive(Deserialize, Debug, Default)]
struct ConfigFile {
    firecrawl: Option<FirecrawlConfig>,
    extraction: Option<ExtractionConfig>,
    validation: Option<ValidationConfig>,
    dns: Option<DnsConfig>,
    crm: Option<CrmConfig>,
    output: Option<OutputConfig>,
}

#[derive(Deserialize, Debug, Default)]
struct FirecrawlConfig {
    api_url: Option<String>,
    request_timeout: Option<u64>,
    job_timeout: Option<u64>,
    poll_interval: Option<f32>,
}

#[derive(Deserialize, Debug, Default)]
struct ExtractionConfig {
    batch_size: Option<usize>,
    max_pages: Option<usize>,
    use_batch: Option<bool>,
    batch_delay: Option<f32>,
    single_delay: Option<f32>,
}

#[derive(Deserialize, Debug, Default)]
struct ValidationConfig {
    check_deliverability: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
struct DnsConfig {
    dns_timeout: Option<u64>,
    dns_servers: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default)]
struct CrmConfig {
    push_to_hubspot: Option<bool>,
    push_to_instantly: Option<bool>,
    hubspot_url: Option<String>,
    instantly_url: Option<String>,
    request_timeout: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
struct OutputConfig {
    directory: Option<PathBuf>,
    basename: Option<String>,
}

/// Application configuration settings.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    /// API key for the Firecrawl service. Required.
    pub firecrawl_api_key: String,
    /// Base URL of the Firecrawl API.
    pub firecrawl_api_url: String,
    /// Timeout for individual HTTP requests to Firecrawl.
    pub request_timeout: Duration,
    /// Maximum time to wait for a crawl or batch job to complete.
    pub job_timeout: Duration,
    /// Interval between job status polls.
    pub poll_interval: Duration,
    /// Number of URLs per batch scrape request.
    pub batch_size: usize,
    /// Page ceiling for discovery and extraction.
    pub max_pages: usize,
    /// Use batch scraping when more than one page is extracted.
    pub use_batch: bool,
    /// Pause after each successful batch.
    pub batch_delay: Duration,
    /// Pause after each successful individual scrape.
    pub single_delay: Duration,
    /// Run DNS deliverability checks during email validation.
    pub check_deliverability: bool,
    /// DNS servers to use for resolution.
    pub dns_servers: Vec<String>,
    /// Timeout for DNS resolution queries.
    pub dns_timeout: Duration,
    pub hubspot_api_key: Option<String>,
    pub instantly_api_key: Option<String>,
    pub push_to_hubspot: bool,
    pub push_to_instantly: bool,
    pub hubspot_url: String,
    pub instantly_url: String,
    /// Timeout for each CRM push request.
    pub crm_timeout: Duration,
    /// Directory for the output files.
    pub output_dir: PathBuf,
    /// Base filename for the output files.
    pub output_basename: String,
}

impl Default for Config {
    fn default() -> Self {
        let dns_servers = vec![
            "8.8.8.8".to_string(),
            "8.8.4.4".to_string(),
            "1.1.1.1".to_string(),
            "1.0.0.1".to_string(),
        ];

        Config {
            firecrawl_api_key: String::new(),
            firecrawl_api_url: "https://api.firecrawl.dev".to_string(),
            request_timeout: Duration::from_secs(60),
            job_timeout: Duration::from_secs(600),
            poll_interval: Duration::from_secs(3),
            batch_size: 50,
            max_pages: 500,
            use_batch: true,
            batch_delay: Duration::from_millis(500),
            single_delay: Duration::from_millis(200),
            check_deliverability: false,
            dns_servers,
            dns_timeout: Duration::from_secs(5),
            hubspot_api_key: None,
            instantly_api_key: None,
            push_to_hubspot: false,
            push_to_instantly: false,
            hubspot_url: "https://api.hubapi.com/crm/v3/objects/contacts".to_string(),
            instantly_url: "https://api.instantly.ai/v1/contacts".to_string(),
            crm_timeout: Duration::from_secs(10),
            output_dir: PathBuf::from("output"),
            output_basename: "leads".to_string(),
        }
    }
}

/// Load configuration from a TOML file
fn load_config_file(file_path: &str) -> anyhow::Result<ConfigFile> {
    let path = Path::new(file_path);
    if !path.exists() {
        tracing::warn!("Configuration file {} not found, using defaults", file_path);
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", file_path))?;

    let config: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML configuration from {}", file_path))?;

    tracing::info!("Loaded configuration from {}", file_path);
    Ok(config)
}

fn apply_file_config(config: &mut Config, file_config: &ConfigFile) {
    if let Some(firecrawl) = &file_config.firecrawl {
        if let Some(url) = &firecrawl.api_url {
            config.firecrawl_api_url = url.clone();
        }
        if let Some(timeout) = firecrawl.request_timeout {
            config.request_timeout = Duration::from_secs(timeout);
        }
        if let Some(timeout) = firecrawl.job_timeout {
            config.job_timeout = Duration::from_secs(timeout);
        }
        if let Some(interval) = firecrawl.poll_interval {
            config.poll_interval = Duration::from_secs_f32(interval.max(0.0));
        }
    }

    if let Some(extraction) = &file_config.extraction {
        if let Some(size) = extraction.batch_size {
            config.batch_size = size;
        }
        if let Some(pages) = extraction.max_pages {
            config.max_pages = pages;
        }
        if let Some(use_batch) = extraction.use_batch {
            config.use_batch = use_batch;
        }
        if let Some(delay) = extraction.batch_delay {
            config.batch_delay = Duration::from_secs_f32(delay.max(0.0));
        }
        if let Some(delay) = extraction.single_delay {
            config.single_delay = Duration::from_secs_f32(delay.max(0.0));
        }
    }

    if let Some(validation) = &file_config.validation {
        if let Some(check) = validation.check_deliverability {
            config.check_deliverability = check;
        }
    }

    if let Some(dns) = &file_config.dns {
        if let Some(timeout) = dns.dns_timeout {
            config.dns_timeout = Duration::from_secs(timeout);
        }
        if let Some(servers) = &dns.dns_servers {
            config.dns_servers = servers.clone();
        }
    }

    if let Some(crm) = &file_config.crm {
        if let Some(push) = crm.push_to_hubspot {
            config.push_to_hubspot = push;
        }
        if let Some(push) = crm.push_to_instantly {
            config.push_to_instantly = push;
        }
        if let Some(url) = &crm.hubspot_url {
            config.hubspot_url = url.clone();
        }
        if let Some(url) = &crm.instantly_url {
            config.instantly_url = url.clone();
        }
        if let Some(timeout) = crm.request_timeout {
            config.crm_timeout = Duration::from_secs(timeout);
        }
    }

    if let Some(output) = &file_config.output {
        if let Some(dir) = &output.directory {
            config.output_dir = dir.clone();
        }
        if let Some(basename) = &output.basename {
            config.output_basename = basename.clone();
        }
    }
}

/// Reads a boolean toggle from the environment. Only "true" (any case) enables it.
fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
}

/// Apply environment toggles that have no dedicated CLI flag.
fn apply_env_toggles(config: &mut Config) {
    if let Some(push) = env_flag("PUSH_TO_HUBSPOT") {
        config.push_to_hubspot = push;
    }
    if let Some(push) = env_flag("PUSH_TO_INSTANTLY") {
        config.push_to_instantly = push;
    }
    if let Some(check) = env_flag("CHECK_DELIVERABILITY") {
        config.check_deliverability = check;
    }
}

/// Apply command line arguments to the Config instance
fn apply_cli_args(config: &mut Config, args: &AppArgs) {
    if let Some(pages) = args.max_pages {
        config.max_pages = pages;
    }

    if let Some(ref basename) = args.output {
        config.output_basename = basename.clone();
    }

    if let Some(ref dir) = args.output_dir {
        config.output_dir = dir.clone();
    }

    if let Some(size) = args.batch_size {
        config.batch_size = size;
    }

    if args.no_batch {
        config.use_batch = false;
    }

    if args.check_deliverability {
        config.check_deliverability = true;
    }

    // Flags can only switch a push on; the env/file toggles stay in effect otherwise.
    config.push_to_hubspot |= args.push_hubspot;
    config.push_to_instantly |= args.push_instantly;

    if let Some(ref key) = args.firecrawl_api_key {
        config.firecrawl_api_key = key.trim().to_string();
    }

    if let Some(ref key) = args.hubspot_api_key {
        config.hubspot_api_key = Some(key.clone()).filter(|k| !k.trim().is_empty());
    }

    if let Some(ref key) = args.instantly_api_key {
        config.instantly_api_key = Some(key.clone()).filter(|k| !k.trim().is_empty());
    }
}

fn validate_config(config: &mut Config) -> anyhow::Result<()> {
    if config.firecrawl_api_key.is_empty() {
        anyhow::bail!("FIRECRAWL_API_KEY is required");
    }

    if config.batch_size == 0 {
        config.batch_size = 1;
        tracing::warn!("Batch size was set to 0. Setting to 1.");
    }

    if config.max_pages == 0 {
        config.max_pages = 1;
        tracing::warn!("Max pages was set to 0. Setting to 1.");
    }

    if config.dns_servers.is_empty() {
        config.dns_servers = vec!["8.8.8.8".to_string(), "1.1.1.1".to_string()];
        tracing::warn!("DNS servers list was empty. Setting to default public DNS servers.");
    }

    if config.output_basename.trim().is_empty() {
        config.output_basename = "leads".to_string();
        tracing::warn!("Output basename was empty. Setting to 'leads'.");
    }

    Ok(())
}

/// Builds the run configuration from defaults, an optional TOML file, the
/// environment and the parsed command line, in increasing precedence.
///
/// # Errors
/// Fails when the Firecrawl API key is missing, which must stop the process
/// before any pipeline stage runs.
pub(crate) fn build_config(args: &AppArgs) -> anyhow::Result<Config> {
    let mut config = Config::default();

    if let Some(ref file_path) = args.config_file {
        let file_config = load_config_file(file_path)?;
        apply_file_config(&mut config, &file_config);
    } else {
        for path in ["./lead-harvester.toml", "./config.toml"].iter() {
            if Path::new(path).exists() {
                match load_config_file(path) {
                    Ok(file_config) => {
                        apply_file_config(&mut config, &file_config);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load configuration from {}: {}", path, e);
                    }
                }
            }
        }
    }

    apply_env_toggles(&mut config);
    apply_cli_args(&mut config, args);

    validate_config(&mut config)?;

    tracing::debug!(
        "Final configuration: batch_size={}, max_pages={}, use_batch={}, check_deliverability={}",
        config.batch_size,
        config.max_pages,
        config.use_batch,
        config.check_deliverability
    );

    Ok(config)
}
