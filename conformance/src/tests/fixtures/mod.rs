//! Metadata and payload fixtures for a small people service.
//!
//! The service root of every fixture is `http://host/svc.svc/`. The V3
//! documents describe `Person` through associations; the V4 documents
//! describe the same model with typed navigation properties.

mod atom;
mod json;
mod metadata;

pub use atom::{
    ATOM_ENTRY_PERSON, ATOM_ENTRY_UNDECLARED_PROPERTY, ATOM_FEED_NO_TITLE, ATOM_FEED_PEOPLE,
    ATOM_SERVICE_DOCUMENT, XML_LINKS_FRIENDS, XML_METADATA_ERROR,
};
pub use json::{
    JSON_ERROR_V3, JSON_ERROR_V4, JSON_ERROR_V4_BAD, JSON_FEED_PEOPLE_V4, JSON_PERSON_EXPANDED_V4,
    JSON_PERSON_MISSING_NAME_V4, JSON_PERSON_UNDECLARED_V4, JSON_PERSON_V4, JSON_PERSON_VERBOSE_V2,
    JSON_REF_COLLECTION_V4, JSON_SERVICE_DOCUMENT_V4,
};
pub use metadata::{PEOPLE_V3_METADATA, PEOPLE_V4_METADATA, UNRESOLVED_NAVIGATION_METADATA};

/// Service root shared by every fixture.
pub const SERVICE_ROOT: &str = "http://host/svc.svc/";
