//! `odata-conformance`: checks an OData service, or captured payloads,
//! against the protocol's conformance rules.
//!
//! **Usage:**
//! ```text
//! odata-conformance --service-root <uri> [--target <path>] [--format atom|json|jsonverbose]
//! odata-conformance --config run.toml [--category entry --category feed]
//! odata-conformance --offline-payload person.json --offline-metadata metadata.xml
//! ```
//!
//! Command-line flags override the configuration file. Exits non-zero if any
//! rule fails or faults.

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use odata_conformance::{
    run, Cancellation, Category, ConformanceReport, Format, OfflineConfig, Outcome, RuleRegistry,
    RunConfig,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Run the OData conformance rules against a service.
#[derive(Parser)]
#[command(
    name = "odata-conformance",
    about = "Validate an OData service against the protocol's conformance rules"
)]
struct Args {
    /// TOML run configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root URI of the service under test.
    #[arg(long)]
    service_root: Option<String>,

    /// Resource to start from, relative to the service root.
    #[arg(long)]
    target: Option<String>,

    /// Payload dialect to request (atom, json, jsonverbose).
    #[arg(long)]
    format: Option<Format>,

    /// Only run rules of this category (repeatable).
    #[arg(long = "category")]
    categories: Vec<Category>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Largest response body accepted, in bytes.
    #[arg(long)]
    max_bytes: Option<usize>,

    /// Upper bound on resources the crawl fetches.
    #[arg(long)]
    max_resources: Option<usize>,

    /// Check a payload file (or a directory of them) instead of a live service.
    #[arg(long)]
    offline_payload: Option<PathBuf>,

    /// Metadata document for offline payloads.
    #[arg(long, requires = "offline_payload")]
    offline_metadata: Option<PathBuf>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    /// Log level for the engine (error, warn, info, debug, trace).
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    /// The configuration file, if any, with flags applied on top.
    fn into_config(self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };
        if let Some(root) = self.service_root {
            config.service_root = root;
        }
        if let Some(target) = self.target {
            config.target = Some(target);
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if !self.categories.is_empty() {
            config.categories = self.categories;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(max_bytes) = self.max_bytes {
            config.max_bytes = max_bytes;
        }
        if let Some(max_resources) = self.max_resources {
            config.max_resources = max_resources;
        }
        if let Some(payload) = self.offline_payload {
            let offline = config.offline.get_or_insert_with(|| OfflineConfig {
                payload: payload.clone(),
                metadata: None,
                content_type: None,
                uri: None,
            });
            offline.payload = payload;
            if self.offline_metadata.is_some() {
                offline.metadata = self.offline_metadata;
            }
        }
        Ok(config)
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("odata_conformance={level},warn")))
        .context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn print_report(report: &ConformanceReport) {
    println!("OData Conformance Report");
    println!("========================");
    println!();

    for verdict in &report.results {
        println!("[{}] {} — {}", verdict.outcome.tag(), verdict.rule_id, verdict.summary());
        if verdict.outcome == Outcome::Pass {
            continue;
        }
        println!("       at {}", verdict.uri);
        if let Some(fragment) = verdict.violation.as_ref().and_then(|v| v.fragment.as_deref()) {
            println!("       {fragment}");
        }
        if let Some(citation) = verdict.citations.first() {
            println!("       see {citation}");
        }
    }
    for not_run in &report.not_run {
        println!("[SKIP] {} — not run at {}", not_run.rule_id, not_run.uri);
    }

    let counts = report.counts();
    println!();
    println!(
        "Summary: {} passed, {} failed, {} skipped, {} errors",
        counts.pass, counts.fail, counts.skipped, counts.error
    );
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;
    let json = args.json;

    let config = args.into_config()?;
    debug!(?config, "effective configuration");
    let report = run(&config, RuleRegistry::builtin(), &Cancellation::new())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    let counts = report.counts();
    if counts.fail > 0 || counts.error > 0 {
        eprintln!(
            "Conformance FAILED: {} rule(s) failed, {} faulted.",
            counts.fail, counts.error
        );
        process::exit(1);
    }

    if !json {
        println!("Conformance PASSED.");
    }
    Ok(())
}
