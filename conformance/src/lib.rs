//! OData conformance engine.
//!
//! Checks whether a live OData service, or payloads captured from one,
//! conform to the protocol. Every exchange `GET uri → response` becomes a
//! [`ServiceContext`]. The [`Dispatcher`] runs each applicable rule of a
//! [`RuleRegistry`] against that context and collects the verdicts into a
//! [`ConformanceReport`].
//!
//! # Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`uri`] | Classifies request URIs into resource kinds and segment paths |
//! | [`fetch`] | HTTP boundary: live `reqwest` fetcher and an in-memory one |
//! | [`context`] | Detects format, payload type and version; shares metadata |
//! | [`verifiers`] | Tree grammars for XML/Atom, JSON Schema for JSON |
//! | [`rules`] | Rule descriptors, applicability, registry and dispatcher |
//! | [`validators`] | The built-in rule policies, one module per area |
//! | [`config`] | TOML run configuration |
//! | [`crawl`] | Metadata fetch, breadth-first crawl and offline runs |
//! | [`report`] | Per-rule verdicts and their aggregation |
//!
//! # Entry Point
//!
//! ```no_run
//! use odata_conformance::{run, Cancellation, RuleRegistry, RunConfig};
//!
//! let config = RunConfig {
//!     service_root: "https://services.odata.org/V4/OData/OData.svc/".into(),
//!     ..RunConfig::default()
//! };
//! let report = run(&config, RuleRegistry::builtin(), &Cancellation::new())
//!     .expect("run failed");
//! assert!(report.all_passed());
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod config;
pub mod context;
pub mod crawl;
pub mod fetch;
pub mod report;
pub mod rules;
pub mod tests;
pub mod uri;
pub mod validators;
pub mod verifiers;
pub mod xmlns;

pub use config::{ConfigError, Format, OfflineConfig, RunConfig};
pub use context::{ContextBuilder, MetadataDocument, ServiceContext};
pub use crawl::{crawl, run, run_offline};
pub use fetch::{FetchError, FetchRequest, Fetcher, HttpFetcher, HttpResponse, StaticFetcher};
pub use report::{ConformanceReport, Outcome, RuleVerdict, Violation};
pub use rules::{Cancellation, Category, Dispatcher, Rule, RuleDescriptor, RuleRegistry, Verdict};
