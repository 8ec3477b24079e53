//! Rule policies, applicability, and verdicts.
//!
//! A rule is a static [`RuleDescriptor`] plus one `verify` method. The
//! descriptor's [`Applicability`] is a conjunction of independent
//! predicates over the [`ServiceContext`]; every predicate left at its
//! default means "don't care". The [`Dispatcher`] evaluates applicability,
//! runs the applicable rules and turns their [`Verdict`]s into a report.

mod dispatcher;
mod registry;

use std::fmt;
use std::str::FromStr;

use odata_edm::ProtocolVersion;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::{MetadataVerbosity, PayloadFormat, PayloadType, ServiceContext};
use crate::uri::UriKind;
use crate::verifiers::{VerificationResult, VerifierError};

pub use crate::report::Violation;
pub use dispatcher::{Cancellation, Dispatcher, IllegalTransition, RuleState};
pub use registry::RuleRegistry;

/// Area of the protocol a rule checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Headers and retrieval.
    Core,
    /// Single entities.
    Entry,
    /// Entity collections.
    Feed,
    /// Entity references (`$links`, `$ref`).
    Link,
    /// Metadata documents.
    Metadata,
    /// Service documents.
    Service,
    /// Error payloads.
    Error,
}

impl Category {
    /// Every category.
    pub const ALL: [Category; 7] = [
        Self::Core,
        Self::Entry,
        Self::Feed,
        Self::Link,
        Self::Metadata,
        Self::Service,
        Self::Error,
    ];

    /// Lower-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Entry => "entry",
            Self::Feed => "feed",
            Self::Link => "link",
            Self::Metadata => "metadata",
            Self::Service => "service",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unknown category name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown rule category `{0}`")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// RFC 2119 requirement level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequirementLevel {
    /// MUST.
    #[serde(rename = "MUST")]
    Must,
    /// MUST NOT.
    #[serde(rename = "MUST NOT")]
    MustNot,
    /// SHOULD.
    #[serde(rename = "SHOULD")]
    Should,
    /// MAY.
    #[serde(rename = "MAY")]
    May,
}

impl fmt::Display for RequirementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Must => "MUST",
            Self::MustNot => "MUST NOT",
            Self::Should => "SHOULD",
            Self::May => "MAY",
        })
    }
}

/// Inclusive range of protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VersionRange {
    /// Oldest version included.
    pub min: ProtocolVersion,
    /// Newest version included.
    pub max: ProtocolVersion,
}

impl VersionRange {
    /// Every version.
    pub const ANY: VersionRange = VersionRange::between(ProtocolVersion::V1, ProtocolVersion::V4);

    /// `min..=max`.
    #[must_use]
    pub const fn between(min: ProtocolVersion, max: ProtocolVersion) -> Self {
        Self { min, max }
    }

    /// Exactly `version`.
    #[must_use]
    pub const fn only(version: ProtocolVersion) -> Self {
        Self::between(version, version)
    }

    /// `version` and newer.
    #[must_use]
    pub const fn since(version: ProtocolVersion) -> Self {
        Self::between(version, ProtocolVersion::V4)
    }

    /// `version` and older.
    #[must_use]
    pub const fn up_to(version: ProtocolVersion) -> Self {
        Self::between(ProtocolVersion::V1, version)
    }

    /// True when `version` is in the range.
    #[must_use]
    pub fn contains(&self, version: ProtocolVersion) -> bool {
        self.min <= version && version <= self.max
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}..={}", self.min, self.max)
        }
    }
}

/// When a rule applies. Empty lists and `None` mean "don't care".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applicability {
    /// Payload types the rule inspects.
    pub payload_types: &'static [PayloadType],
    /// Payload formats the rule understands.
    pub formats: &'static [PayloadFormat],
    /// Protocol versions the rule belongs to.
    pub versions: VersionRange,
    /// Addressing kinds of the request URI.
    pub uri_kinds: &'static [UriKind],
    /// The rule needs the metadata document.
    pub requires_metadata: bool,
    /// The rule issues secondary requests.
    pub requires_online: bool,
    /// Restricts to offline (`Some(true)`) or live (`Some(false)`) contexts.
    pub offline: Option<bool>,
    /// Restricts to projected or unprojected requests.
    pub projection: Option<bool>,
    /// Restricts to media link entries or ordinary entries.
    pub media_link_entry: Option<bool>,
    /// JSON metadata verbosities the rule understands.
    pub verbosity: &'static [MetadataVerbosity],
}

/// Why a rule does not apply to a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Payload type not listed.
    PayloadType(PayloadType),
    /// Payload format not listed.
    Format(PayloadFormat),
    /// Protocol version out of range.
    Version(ProtocolVersion),
    /// URI kind not listed.
    UriKind(UriKind),
    /// The rule needs metadata and none is available.
    MetadataUnavailable,
    /// The rule needs a transport and the context has none.
    Offline,
    /// The context's offline flag does not match.
    OfflineMismatch,
    /// The projection flag does not match.
    Projection,
    /// The media-link-entry flag does not match.
    MediaLinkEntry,
    /// Metadata verbosity not listed.
    Verbosity(MetadataVerbosity),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadType(t) => write!(f, "payload type {t:?} not applicable"),
            Self::Format(p) => write!(f, "payload format {p:?} not applicable"),
            Self::Version(v) => write!(f, "protocol version {v} not applicable"),
            Self::UriKind(k) => write!(f, "URI kind {k:?} not applicable"),
            Self::MetadataUnavailable => f.write_str("metadata document unavailable"),
            Self::Offline => f.write_str("secondary requests unavailable"),
            Self::OfflineMismatch => f.write_str("offline flag mismatch"),
            Self::Projection => f.write_str("projection flag mismatch"),
            Self::MediaLinkEntry => f.write_str("media link entry flag mismatch"),
            Self::Verbosity(v) => write!(f, "metadata verbosity {v:?} not applicable"),
        }
    }
}

impl Applicability {
    /// Applies to every context.
    pub const ANY: Applicability = Applicability {
        payload_types: &[],
        formats: &[],
        versions: VersionRange::ANY,
        uri_kinds: &[],
        requires_metadata: false,
        requires_online: false,
        offline: None,
        projection: None,
        media_link_entry: None,
        verbosity: &[],
    };

    /// Checks every predicate against `ctx`, reporting the first mismatch.
    ///
    /// # Errors
    ///
    /// Returns the [`SkipReason`] of the first predicate `ctx` fails.
    pub fn check(&self, ctx: &ServiceContext) -> Result<(), SkipReason> {
        fn listed<T: PartialEq>(list: &[T], value: &T) -> bool {
            list.is_empty() || list.contains(value)
        }
        fn flag(want: Option<bool>, have: bool) -> bool {
            want.map_or(true, |w| w == have)
        }

        if !listed(self.payload_types, &ctx.payload_type) {
            return Err(SkipReason::PayloadType(ctx.payload_type));
        }
        if !listed(self.formats, &ctx.format) {
            return Err(SkipReason::Format(ctx.format));
        }
        if !self.versions.contains(ctx.version) {
            return Err(SkipReason::Version(ctx.version));
        }
        if !listed(self.uri_kinds, &ctx.path.kind) {
            return Err(SkipReason::UriKind(ctx.path.kind));
        }
        if self.requires_metadata && ctx.model().is_none() {
            return Err(SkipReason::MetadataUnavailable);
        }
        if self.requires_online && !ctx.is_online() {
            return Err(SkipReason::Offline);
        }
        if !flag(self.offline, ctx.is_offline()) {
            return Err(SkipReason::OfflineMismatch);
        }
        if !flag(self.projection, ctx.projection) {
            return Err(SkipReason::Projection);
        }
        if !flag(self.media_link_entry, ctx.media_link_entry) {
            return Err(SkipReason::MediaLinkEntry);
        }
        if !listed(self.verbosity, &ctx.verbosity) {
            return Err(SkipReason::Verbosity(ctx.verbosity));
        }
        Ok(())
    }

    /// True when [`Applicability::check`] passes.
    #[must_use]
    pub fn matches(&self, ctx: &ServiceContext) -> bool {
        self.check(ctx).is_ok()
    }
}

/// Static description of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleDescriptor {
    /// Unique identifier, `category/name`.
    pub id: &'static str,
    /// Category.
    pub category: Category,
    /// What the rule checks.
    pub description: &'static str,
    /// Sections of the protocol specification the rule enforces.
    pub citations: &'static [&'static str],
    /// Requirement level.
    pub level: RequirementLevel,
    /// When the rule applies.
    pub applicability: Applicability,
}

/// The tri-state result of one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The payload conforms.
    Pass,
    /// The payload does not conform.
    Fail(Violation),
    /// The precondition the rule needed was absent from this payload.
    NotApplicable(String),
}

impl Verdict {
    /// A not-applicable verdict.
    #[must_use]
    pub fn not_applicable(reason: impl Into<String>) -> Self {
        Self::NotApplicable(reason.into())
    }

    /// A failing verdict with only a message.
    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(Violation::new(message))
    }

    /// Maps a verifier result, prefixing failure messages with `context`.
    #[must_use]
    pub fn from_verification(result: VerificationResult, context: &str) -> Self {
        match result {
            VerificationResult::Pass => Self::Pass,
            VerificationResult::Fail(evidence) => {
                let mut violation = Violation::from_evidence(&evidence);
                if !context.is_empty() {
                    violation.message = format!("{context}: {}", violation.message);
                }
                Self::Fail(violation)
            }
            VerificationResult::NotApplicable => {
                Self::NotApplicable("verifier could not judge the payload".to_string())
            }
        }
    }
}

/// A rule that could not reach a verdict. Recorded as an engine error, never
/// as a protocol violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// The verifier rejected the schema the rule built.
    #[error(transparent)]
    Verifier(#[from] VerifierError),

    /// The rule could not build its schema.
    #[error("schema construction failed: {0}")]
    Schema(String),

    /// Anything else.
    #[error("{0}")]
    Fault(String),
}

/// A conformance rule.
pub trait Rule: Send + Sync {
    /// Static description.
    fn descriptor(&self) -> &RuleDescriptor;

    /// Checks `ctx`.
    ///
    /// Called at most once per context, and only when the descriptor's
    /// applicability matched.
    ///
    /// # Errors
    ///
    /// Returns a [`RuleError`] when the rule cannot reach a verdict.
    fn verify(&self, ctx: &ServiceContext) -> Result<Verdict, RuleError>;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use url::Url;

    use super::*;
    use crate::context::{ContextBuilder, MetadataDocument};
    use crate::fetch::{HeaderList, HttpResponse};
    use crate::tests::fixtures;

    fn atom_entry_v3() -> ServiceContext {
        let root = Url::parse(fixtures::SERVICE_ROOT).expect("root");
        let doc = MetadataDocument::parse(fixtures::PEOPLE_V3_METADATA).expect("metadata");
        let headers: HeaderList = [
            ("Content-Type", "application/atom+xml;type=entry"),
            ("DataServiceVersion", "3.0"),
        ]
        .into_iter()
        .collect();
        ContextBuilder::new(root).metadata(Arc::new(doc)).build(
            "http://host/svc.svc/People(1)",
            HttpResponse::new(200, headers, fixtures::ATOM_ENTRY_PERSON),
        )
    }

    #[test]
    fn categories_parse_case_insensitively() {
        assert_eq!("Entry".parse::<Category>(), Ok(Category::Entry));
        assert_eq!(" metadata ".parse::<Category>(), Ok(Category::Metadata));
        assert!("payload".parse::<Category>().is_err());
        assert_eq!(Category::Link.to_string(), "link");
    }

    #[test]
    fn version_ranges() {
        let range = VersionRange::since(ProtocolVersion::V3);
        assert!(range.contains(ProtocolVersion::V4));
        assert!(!range.contains(ProtocolVersion::V2));
        assert!(VersionRange::ANY.contains(ProtocolVersion::V1));
        assert_eq!(VersionRange::only(ProtocolVersion::V4).to_string(), "4.0");
        assert_eq!(VersionRange::up_to(ProtocolVersion::V3).to_string(), "1.0..=3.0");
    }

    #[test]
    fn applicability_reports_the_first_mismatch() {
        let ctx = atom_entry_v3();
        assert_eq!(Applicability::ANY.check(&ctx), Ok(()));

        let json_v4 = Applicability {
            formats: &[PayloadFormat::JsonLight],
            versions: VersionRange::only(ProtocolVersion::V4),
            ..Applicability::ANY
        };
        assert_eq!(json_v4.check(&ctx), Err(SkipReason::Format(PayloadFormat::Atom)));

        let feeds = Applicability {
            payload_types: &[PayloadType::Feed],
            ..Applicability::ANY
        };
        assert_eq!(feeds.check(&ctx), Err(SkipReason::PayloadType(PayloadType::Entry)));

        let online = Applicability {
            requires_online: true,
            ..Applicability::ANY
        };
        assert_eq!(online.check(&ctx), Err(SkipReason::Offline));

        let entries = Applicability {
            payload_types: &[PayloadType::Entry],
            uri_kinds: &[UriKind::Entity],
            requires_metadata: true,
            projection: Some(false),
            media_link_entry: Some(false),
            ..Applicability::ANY
        };
        assert!(entries.matches(&ctx));
    }

    #[test]
    fn verification_results_map_to_verdicts() {
        use crate::verifiers::Evidence;

        let fail = VerificationResult::Fail(Evidence::message("bad").at_line(4));
        match Verdict::from_verification(fail, "entry") {
            Verdict::Fail(v) => {
                assert_eq!(v.message, "entry: bad");
                assert_eq!(v.line, Some(4));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            Verdict::from_verification(VerificationResult::Pass, "entry"),
            Verdict::Pass
        );
    }
}
