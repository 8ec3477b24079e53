//! XML namespace URIs used by Atom and XML payloads.

use odata_edm::ProtocolVersion;

/// Atom syndication format.
pub const ATOM: &str = "http://www.w3.org/2005/Atom";
/// Atom publishing protocol (service documents).
pub const APP: &str = "http://www.w3.org/2007/app";
/// The `xml:` prefix.
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

/// Data namespace (`d:`) for V1–V3.
pub const DATA_V3: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices";
/// Metadata namespace (`m:`) for V1–V3.
pub const METADATA_V3: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices/metadata";
/// Category scheme for V1–V3.
pub const SCHEME_V3: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices/scheme";
/// Navigation link relation prefix for V1–V3.
pub const RELATED_V3: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices/related/";

/// Data namespace for V4.
pub const DATA_V4: &str = "http://docs.oasis-open.org/odata/ns/data";
/// Metadata namespace for V4.
pub const METADATA_V4: &str = "http://docs.oasis-open.org/odata/ns/metadata";
/// Category scheme for V4.
pub const SCHEME_V4: &str = "http://docs.oasis-open.org/odata/ns/scheme";
/// Navigation link relation prefix for V4.
pub const RELATED_V4: &str = "http://docs.oasis-open.org/odata/ns/related/";

/// EDMX wrapper, V1–V3.
pub const EDMX_V3: &str = "http://schemas.microsoft.com/ado/2007/06/edmx";
/// EDMX wrapper, V4.
pub const EDMX_V4: &str = "http://docs.oasis-open.org/odata/ns/edmx";

/// Data namespace for `version`.
#[must_use]
pub fn data(version: ProtocolVersion) -> &'static str {
    if version == ProtocolVersion::V4 {
        DATA_V4
    } else {
        DATA_V3
    }
}

/// Metadata namespace for `version`.
#[must_use]
pub fn metadata(version: ProtocolVersion) -> &'static str {
    if version == ProtocolVersion::V4 {
        METADATA_V4
    } else {
        METADATA_V3
    }
}

/// Category scheme for `version`.
#[must_use]
pub fn scheme(version: ProtocolVersion) -> &'static str {
    if version == ProtocolVersion::V4 {
        SCHEME_V4
    } else {
        SCHEME_V3
    }
}

/// True for either generation of the data namespace.
#[must_use]
pub fn is_data(ns: &str) -> bool {
    ns == DATA_V3 || ns == DATA_V4
}

/// True for either generation of the metadata namespace.
#[must_use]
pub fn is_metadata(ns: &str) -> bool {
    ns == METADATA_V3 || ns == METADATA_V4
}

/// True for either generation of the category scheme.
#[must_use]
pub fn is_scheme(uri: &str) -> bool {
    uri == SCHEME_V3 || uri == SCHEME_V4
}
