//! Entry rules.
//!
//! Atom entries are checked with grammars built from the entity type in
//! scope; JSON entries with schemas from
//! [`JsonSchemaBuilder`](crate::verifiers::json_schema::JsonSchemaBuilder).
//! The ETag and read-link rules work on either format.

mod atom;
mod etag;
mod json;
mod read_link;

pub use atom::{AtomCategoryTerm, AtomDeclaredProperties};
pub use etag::EtagConsistency;
pub use json::{JsonDeclaredProperties, JsonExpandedNavigation};
pub use read_link::ReadLinkDereferenceable;
