//! Structural verifiers.
//!
//! Two engines share one contract: given a schema built for the occasion
//! and a document, return a [`VerificationResult`]. The tree verifier
//! evaluates a [`grammar::Grammar`] against an XML document; the JSON
//! verifier evaluates a JSON Schema (usually assembled with
//! [`json_schema::JsonSchemaBuilder`]) against a JSON document. Both are
//! stateless and may be shared between threads.
//!
//! | Verifier | Schema | Evidence on failure |
//! |----------|--------|---------------------|
//! | [`TreeVerifier`] | [`grammar::Grammar`] | 1-based line of the furthest node no alternative could accept |
//! | [`JsonVerifier`] | `serde_json::Value` (draft 7) | byte offset, line and column of the offending member |

pub mod grammar;
pub mod json_schema;

mod json;
mod locate;
mod tree;

use serde::Serialize;
use thiserror::Error;

pub use json::JsonVerifier;
pub use tree::TreeVerifier;

/// Where and why a document did not conform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evidence {
    /// Human-readable description.
    pub message: String,
    /// 1-based line.
    pub line: Option<usize>,
    /// 1-based column.
    pub column: Option<usize>,
    /// Byte offset into the document.
    pub offset: Option<usize>,
    /// Excerpt of the offending text.
    pub fragment: Option<String>,
}

impl Evidence {
    /// Evidence carrying only a message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
            offset: None,
            fragment: None,
        }
    }

    /// Sets the line.
    #[must_use]
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Sets the excerpt, shortened to a readable length.
    #[must_use]
    pub fn with_fragment(mut self, fragment: &str) -> Self {
        self.fragment = Some(excerpt(fragment));
        self
    }
}

/// Outcome of one verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum VerificationResult {
    /// The document conforms.
    Pass,
    /// The document does not conform.
    Fail(Evidence),
    /// The verifier could not judge the document.
    NotApplicable,
}

impl VerificationResult {
    /// True for [`VerificationResult::Pass`].
    #[must_use]
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// The evidence of a failure.
    #[must_use]
    pub fn evidence(&self) -> Option<&Evidence> {
        match self {
            Self::Fail(evidence) => Some(evidence),
            _ => None,
        }
    }
}

/// A schema the verifier cannot evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifierError {
    /// The JSON Schema does not compile.
    #[error("invalid JSON schema: {0}")]
    InvalidSchema(String),

    /// A grammar reference names no definition.
    #[error("grammar references undefined production `{0}`")]
    UndefinedProduction(String),

    /// A grammar definition refers to itself without passing through an
    /// element.
    #[error("grammar production `{0}` is recursive outside an element")]
    RecursiveProduction(String),
}

const EXCERPT_LIMIT: usize = 160;

/// First `EXCERPT_LIMIT` characters of `text`, on one line.
pub(crate) fn excerpt(text: &str) -> String {
    let flat: String = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if flat.chars().count() <= EXCERPT_LIMIT {
        flat
    } else {
        let cut: String = flat.chars().take(EXCERPT_LIMIT).collect();
        format!("{cut}…")
    }
}
