//! Crawl orchestration: fetch the metadata once, walk the service from the
//! target resource, and dispatch the rules against every context.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::RunConfig;
use crate::context::{ContextBuilder, MetadataDocument, PayloadType};
use crate::fetch::{Fetcher, HeaderList, HttpFetcher, HttpResponse};
use crate::report::{ConformanceReport, RuleVerdict, Violation};
use crate::rules::{Cancellation, Category, Dispatcher, RuleRegistry};
use crate::validators::response::ResourceRetrievable;

/// Runs `registry` against the service described by `config`.
///
/// Live runs crawl over HTTP; configurations with an `offline` section read
/// payloads from disk instead.
///
/// # Errors
///
/// Fails on an invalid configuration, when the HTTP client cannot be built,
/// or when offline payloads cannot be read. Rule failures and unreachable
/// resources are reported, never returned as errors.
pub fn run(
    config: &RunConfig,
    registry: &RuleRegistry,
    cancel: &Cancellation,
) -> anyhow::Result<ConformanceReport> {
    config.validate().context("invalid run configuration")?;
    if config.offline.is_some() {
        return run_offline(config, registry, cancel);
    }
    let fetcher = HttpFetcher::new(config.timeout()).context("failed to build the HTTP client")?;
    crawl(config, registry, Arc::new(fetcher), cancel)
}

fn dispatcher<'r>(config: &RunConfig, registry: &'r RuleRegistry) -> Dispatcher<'r> {
    Dispatcher::new(registry)
        .categories(config.categories.iter().copied())
        .parallel(config.parallel)
}

fn builder(config: &RunConfig) -> anyhow::Result<ContextBuilder> {
    let root = config.service_root_url()?;
    let mut builder = ContextBuilder::new(root)
        .accept(config.accept_header())
        .max_bytes(config.max_bytes);
    for (name, value) in &config.headers {
        builder = builder.header(name.clone(), value.clone());
    }
    Ok(builder)
}

fn reports_core(config: &RunConfig) -> bool {
    config.categories.is_empty() || config.categories.contains(&Category::Core)
}

/// Crawls breadth-first from the configured target through `fetcher`.
///
/// `$metadata` is fetched first. When it cannot be fetched or parsed the
/// crawl continues with metadata-absent contexts. Service documents enqueue
/// their collections and feeds enqueue their first entry, up to
/// `max_resources` resources.
///
/// # Errors
///
/// Fails only when the configuration does not yield a service root or
/// target.
pub fn crawl(
    config: &RunConfig,
    registry: &RuleRegistry,
    fetcher: Arc<dyn Fetcher>,
    cancel: &Cancellation,
) -> anyhow::Result<ConformanceReport> {
    let dispatcher = dispatcher(config, registry);
    let mut builder = builder(config)?.transport(Arc::clone(&fetcher));
    let mut report = ConformanceReport::new();

    let metadata_uri = builder
        .service_root()
        .join("$metadata")
        .context("service root cannot be joined")?
        .to_string();
    let request = builder.request(metadata_uri.as_str()).accept("application/xml");
    match fetcher.fetch(&request) {
        Ok(response) if response.is_success() => {
            match MetadataDocument::parse(response.body.as_str()) {
                Ok(metadata) => builder = builder.metadata(Arc::new(metadata)),
                Err(e) => {
                    warn!(uri = %metadata_uri, error = %e, "metadata document does not parse");
                    builder = builder.metadata_error(e.to_string());
                }
            }
            let ctx = builder.build(&metadata_uri, response);
            report.extend(dispatcher.run(&ctx, cancel));
        }
        Ok(response) => {
            warn!(uri = %metadata_uri, status = response.status, "metadata unavailable");
            builder = builder.metadata_error(format!("$metadata returned status {}", response.status));
        }
        Err(e) => {
            warn!(uri = %metadata_uri, error = %e, "metadata unavailable");
            builder = builder.metadata_error(e.to_string());
        }
    }

    let target = config.target_uri()?;
    let mut seen = HashSet::from([target.clone()]);
    let mut queue = VecDeque::from([target]);
    let mut fetched = 0;
    while let Some(uri) = queue.pop_front() {
        if fetched >= config.max_resources || cancel.is_cancelled() {
            debug!(pending = queue.len() + 1, "crawl stopped");
            break;
        }
        fetched += 1;

        let response = match fetcher.fetch(&builder.request(uri.as_str())) {
            Ok(response) => response,
            Err(e) => {
                warn!(%uri, error = %e, "resource unavailable");
                if reports_core(config) {
                    report.push(RuleVerdict::fail(
                        &ResourceRetrievable::DESCRIPTOR,
                        uri.as_str(),
                        Violation::new(e.to_string()).at(uri.as_str()),
                    ));
                }
                continue;
            }
        };

        let ctx = builder.build(&uri, response);
        info!(
            %uri,
            status = ctx.status,
            format = ?ctx.format,
            payload = ?ctx.payload_type,
            "checking resource"
        );
        report.extend(dispatcher.run(&ctx, cancel));

        let mut next = ctx.collection_links();
        if ctx.payload_type == PayloadType::Feed {
            next.extend(ctx.read_link());
        }
        for link in next {
            if seen.insert(link.clone()) {
                queue.push_back(link);
            }
        }
    }
    Ok(report)
}

/// Checks payloads read from disk.
///
/// The `offline.payload` path is a single file or a directory whose files
/// are checked in name order. All payloads share the configured request URI
/// (or the target). A configured metadata file is checked too and attached
/// to every payload context.
///
/// # Errors
///
/// Fails when the configuration has no `offline` section or a configured
/// file cannot be read.
pub fn run_offline(
    config: &RunConfig,
    registry: &RuleRegistry,
    cancel: &Cancellation,
) -> anyhow::Result<ConformanceReport> {
    let offline = config
        .offline
        .as_ref()
        .context("configuration has no offline section")?;
    let dispatcher = dispatcher(config, registry);
    let mut builder = builder(config)?.offline();
    let mut report = ConformanceReport::new();

    if let Some(path) = &offline.metadata {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read metadata {}", path.display()))?;
        match MetadataDocument::parse(raw.as_str()) {
            Ok(metadata) => builder = builder.metadata(Arc::new(metadata)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "metadata document does not parse");
                builder = builder.metadata_error(e.to_string());
            }
        }
        let uri = builder
            .service_root()
            .join("$metadata")
            .context("service root cannot be joined")?
            .to_string();
        let response = HttpResponse::new(200, headers_for(path, Some("application/xml")), raw);
        report.extend(dispatcher.run(&builder.build(&uri, response), cancel));
    } else {
        builder = builder.metadata_error("no metadata document configured");
    }

    let uri = match offline.uri.as_deref() {
        Some(uri) => uri.to_string(),
        None => config.target_uri()?,
    };
    for path in payload_files(&offline.payload)? {
        if cancel.is_cancelled() {
            break;
        }
        let body = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read payload {}", path.display()))?;
        let response = HttpResponse::new(
            200,
            headers_for(&path, offline.content_type.as_deref()),
            body,
        );
        let ctx = builder.build(&uri, response);
        info!(
            path = %path.display(),
            format = ?ctx.format,
            payload = ?ctx.payload_type,
            "checking payload"
        );
        report.extend(dispatcher.run(&ctx, cancel));
    }
    Ok(report)
}

/// Files under `payload`, sorted; `payload` itself when it is a file.
fn payload_files(payload: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !payload.is_dir() {
        return Ok(vec![payload.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(payload).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", payload.display()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Response headers for a payload file: the configured content type, or one
/// guessed from the extension. Unknown extensions get no `Content-Type` and
/// the format is sniffed from the body.
fn headers_for(path: &Path, content_type: Option<&str>) -> HeaderList {
    let guessed = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Some("application/json"),
        Some("atom") => Some("application/atom+xml"),
        Some("xml" | "edmx") => Some("application/xml"),
        _ => None,
    };
    content_type
        .or(guessed)
        .map(|value| ("Content-Type", value))
        .into_iter()
        .collect()
}
