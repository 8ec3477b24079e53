//! Errors raised while parsing metadata or resolving names against it.

use thiserror::Error;

/// Failure to parse a CSDL document or to resolve a name in the model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EdmError {
    /// The metadata text is not well-formed XML.
    #[error("metadata is not well-formed XML: {0}")]
    Xml(String),

    /// The document parsed, but is not a CSDL document.
    #[error("document root <{0}> is not an Edmx or Schema element")]
    NotCsdl(String),

    /// A qualified type name does not resolve to a declared type.
    #[error("unknown type `{0}`")]
    UnknownType(String),

    /// A base-type chain loops back on itself.
    #[error("base-type chain of `{0}` is cyclic")]
    InheritanceCycle(String),

    /// A path segment is not a navigation property of the type reached so far.
    #[error("`{segment}` is not a navigation property of `{entity_type}`")]
    UnknownNavigation {
        /// The entity type being navigated from.
        entity_type: String,
        /// The offending path segment.
        segment: String,
    },

    /// The association named by a navigation property is not declared.
    #[error("navigation property `{navigation}` refers to undeclared relationship `{relationship}`")]
    UnresolvedRelationship {
        /// Navigation property name.
        navigation: String,
        /// Relationship name as written in the metadata.
        relationship: String,
    },

    /// The relationship exists but has no end with the requested role.
    #[error("relationship `{relationship}` has no end with role `{role}`")]
    UnresolvedRole {
        /// Relationship name.
        relationship: String,
        /// Role the navigation property points at.
        role: String,
    },

    /// An `$expand` or `$select` expression could not be tokenized.
    #[error("malformed path expression `{0}`")]
    MalformedPath(String),
}
