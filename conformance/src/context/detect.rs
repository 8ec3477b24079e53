//! Payload format, payload type, version and verbosity detection.
//!
//! Detection works from the response alone (headers and body) plus the
//! classified URI; it never assumes anything a particular rule needs.

use odata_edm::ProtocolVersion;
use roxmltree::Document;
use serde::Serialize;
use serde_json::Value;

use crate::fetch::HeaderList;
use crate::uri::UriKind;
use crate::xmlns;

/// Wire format of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PayloadFormat {
    /// Atom or AtomPub XML.
    Atom,
    /// Other XML (metadata, `$links`, errors, properties).
    Xml,
    /// V1–V3 verbose JSON.
    JsonVerbose,
    /// V3 JSON light or V4 JSON.
    JsonLight,
    /// Plain text.
    Text,
    /// Binary or unknown media.
    Binary,
    /// Empty body.
    None,
}

impl PayloadFormat {
    /// True for the JSON formats.
    #[must_use]
    pub fn is_json(self) -> bool {
        matches!(self, Self::JsonVerbose | Self::JsonLight)
    }

    /// True for the XML formats.
    #[must_use]
    pub fn is_xml(self) -> bool {
        matches!(self, Self::Atom | Self::Xml)
    }
}

/// Shape of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PayloadType {
    /// Collection of entities.
    Feed,
    /// Single entity.
    Entry,
    /// Single entity reference.
    Link,
    /// Collection of entity references.
    Links,
    /// Service document.
    ServiceDocument,
    /// Metadata document.
    Metadata,
    /// Error payload.
    Error,
    /// Individual property.
    Property,
    /// Raw value (`$value`, `$count`, media).
    RawValue,
    /// Recognized format, unrecognized shape.
    Other,
    /// No payload, or a payload that could not be parsed.
    None,
}

/// How much metadata a JSON payload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MetadataVerbosity {
    /// Verbose JSON.
    Verbose,
    /// Minimal metadata.
    Minimal,
    /// Full metadata.
    Full,
    /// No metadata.
    None,
    /// Not a JSON payload.
    NotApplicable,
}

/// A parsed `Content-Type` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MediaType {
    pub essence: String,
    pub params: Vec<(String, String)>,
}

impl MediaType {
    pub(crate) fn parse(value: &str) -> Self {
        let mut parts = value.split(';');
        let essence = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        let params = parts
            .filter_map(|p| {
                let (name, value) = p.split_once('=')?;
                Some((
                    name.trim().to_ascii_lowercase(),
                    value.trim().trim_matches('"').to_ascii_lowercase(),
                ))
            })
            .collect();
        Self { essence, params }
    }

    pub(crate) fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Looks at the first non-whitespace character.
fn sniff(body: &str) -> Option<char> {
    body.trim_start_matches('\u{feff}').trim_start().chars().next()
}

/// Detects the payload format from the media type, falling back to the
/// body when the media type is absent or generic.
pub(crate) fn format(media: Option<&MediaType>, body: &str) -> PayloadFormat {
    if body.trim().is_empty() {
        return PayloadFormat::None;
    }
    let essence = media.map_or("", |m| m.essence.as_str());
    match essence {
        "application/atom+xml" | "application/atomsvc+xml" => PayloadFormat::Atom,
        "application/xml" | "text/xml" => xml_flavor(body),
        "application/json" | "text/json" | "application/javascript" => {
            json_flavor(media, body)
        }
        "text/plain" => PayloadFormat::Text,
        "" => match sniff(body) {
            Some('<') => xml_flavor(body),
            Some('{') | Some('[') => json_flavor(media, body),
            _ => PayloadFormat::Text,
        },
        _ => PayloadFormat::Binary,
    }
}

fn xml_flavor(body: &str) -> PayloadFormat {
    match Document::parse(body) {
        Ok(doc) => {
            let ns = doc.root_element().tag_name().namespace().unwrap_or_default();
            if ns == xmlns::ATOM || ns == xmlns::APP {
                PayloadFormat::Atom
            } else {
                PayloadFormat::Xml
            }
        }
        Err(_) => PayloadFormat::Xml,
    }
}

fn json_flavor(media: Option<&MediaType>, body: &str) -> PayloadFormat {
    if let Some(odata) = media.and_then(|m| m.param("odata")) {
        return if odata == "verbose" {
            PayloadFormat::JsonVerbose
        } else {
            PayloadFormat::JsonLight
        };
    }
    if media.and_then(|m| m.param("odata.metadata")).is_some() {
        return PayloadFormat::JsonLight;
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) if map.contains_key("d") => PayloadFormat::JsonVerbose,
        _ => PayloadFormat::JsonLight,
    }
}

/// Protocol version: `OData-Version`, then `DataServiceVersion`, then
/// content-type parameters, then the metadata's declared version, then V1.
pub(crate) fn version(
    headers: &HeaderList,
    media: Option<&MediaType>,
    metadata_version: Option<ProtocolVersion>,
) -> ProtocolVersion {
    if let Some(v) = headers.get("OData-Version").and_then(ProtocolVersion::parse) {
        return v;
    }
    if let Some(v) = headers
        .get("DataServiceVersion")
        .and_then(ProtocolVersion::parse)
    {
        return v;
    }
    if let Some(media) = media {
        if media.param("odata.metadata").is_some() {
            return ProtocolVersion::V4;
        }
        match media.param("odata") {
            Some("minimalmetadata" | "fullmetadata" | "nometadata") => return ProtocolVersion::V3,
            Some("verbose") => return ProtocolVersion::V2,
            _ => {}
        }
    }
    metadata_version.unwrap_or(ProtocolVersion::V1)
}

/// Metadata verbosity of a JSON payload. Light JSON without a level
/// parameter is `Minimal` under V4 and `Verbose` before it.
pub(crate) fn verbosity(
    format: PayloadFormat,
    media: Option<&MediaType>,
    version: ProtocolVersion,
) -> MetadataVerbosity {
    match format {
        PayloadFormat::JsonVerbose => MetadataVerbosity::Verbose,
        PayloadFormat::JsonLight => {
            let level = media.and_then(|m| m.param("odata.metadata").or_else(|| m.param("odata")));
            match level {
                Some("full" | "fullmetadata") => MetadataVerbosity::Full,
                Some("none" | "nometadata") => MetadataVerbosity::None,
                Some("minimal" | "minimalmetadata") => MetadataVerbosity::Minimal,
                _ if version >= ProtocolVersion::V4 => MetadataVerbosity::Minimal,
                _ => MetadataVerbosity::Verbose,
            }
        }
        _ => MetadataVerbosity::NotApplicable,
    }
}

/// Payload type of an XML document.
pub(crate) fn xml_type(doc: &Document<'_>) -> PayloadType {
    let root = doc.root_element();
    let ns = root.tag_name().namespace().unwrap_or_default();
    match (ns, root.tag_name().name()) {
        (xmlns::ATOM, "feed") => PayloadType::Feed,
        (xmlns::ATOM, "entry") => PayloadType::Entry,
        (xmlns::APP, "service") => PayloadType::ServiceDocument,
        (xmlns::EDMX_V3 | xmlns::EDMX_V4, "Edmx") => PayloadType::Metadata,
        (ns, "error") if xmlns::is_metadata(ns) => PayloadType::Error,
        (ns, "ref") if xmlns::is_metadata(ns) => PayloadType::Link,
        (ns, "links") if xmlns::is_data(ns) => PayloadType::Links,
        (ns, "uri") if xmlns::is_data(ns) => PayloadType::Link,
        (ns, _) if xmlns::is_data(ns) || xmlns::is_metadata(ns) => PayloadType::Property,
        _ => PayloadType::Other,
    }
}

/// Payload type of a JSON document.
pub(crate) fn json_type(value: &Value, format: PayloadFormat, kind: UriKind) -> PayloadType {
    let Some(map) = value.as_object() else {
        return PayloadType::Other;
    };
    if map.contains_key("error") || map.contains_key("odata.error") {
        return PayloadType::Error;
    }
    if format == PayloadFormat::JsonVerbose {
        return map.get("d").map_or(PayloadType::Other, |d| verbose_type(d, kind));
    }

    let context = map
        .get("@odata.context")
        .or_else(|| map.get("odata.metadata"))
        .and_then(Value::as_str);
    if let Some(fragment) = context.map(|c| c.split_once('#').map(|(_, f)| f)) {
        let Some(fragment) = fragment else {
            return PayloadType::ServiceDocument;
        };
        if fragment == "Collection($ref)" {
            return PayloadType::Links;
        }
        if fragment == "$ref" {
            return PayloadType::Link;
        }
        if fragment.contains("/$links/") {
            return if map.contains_key("value") {
                PayloadType::Links
            } else {
                PayloadType::Link
            };
        }
        if fragment.ends_with("/$entity") || fragment.ends_with("/@Element") {
            return PayloadType::Entry;
        }
        if fragment.starts_with("Collection(Edm.") || fragment.starts_with("Edm.") {
            return PayloadType::Property;
        }
    }

    match map.get("value") {
        Some(Value::Array(items)) => {
            if items.iter().all(|i| i.get("url").is_some() && i.get("name").is_some())
                && matches!(kind, UriKind::ServiceDocument)
            {
                PayloadType::ServiceDocument
            } else if matches!(kind, UriKind::LinkCollection) {
                PayloadType::Links
            } else if matches!(kind, UriKind::Property) {
                PayloadType::Property
            } else {
                PayloadType::Feed
            }
        }
        Some(_) => PayloadType::Property,
        None => match kind {
            UriKind::LinkSingle => PayloadType::Link,
            UriKind::Property => PayloadType::Property,
            _ if map.contains_key("url") && map.len() <= 2 => PayloadType::Link,
            _ => PayloadType::Entry,
        },
    }
}

fn verbose_type(d: &Value, kind: UriKind) -> PayloadType {
    let items = match d {
        Value::Array(items) => Some(items),
        Value::Object(map) => match map.get("results") {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    };
    if let Some(items) = items {
        let all_refs = !items.is_empty()
            && items
                .iter()
                .all(|i| i.as_object().is_some_and(|o| o.len() == 1 && o.contains_key("uri")));
        return if all_refs || (items.is_empty() && kind == UriKind::LinkCollection) {
            PayloadType::Links
        } else {
            PayloadType::Feed
        };
    }
    let Some(map) = d.as_object() else {
        return PayloadType::Other;
    };
    if map.contains_key("EntitySets") {
        PayloadType::ServiceDocument
    } else if map.contains_key("__metadata") {
        PayloadType::Entry
    } else if map.len() == 1 && map.contains_key("uri") {
        PayloadType::Link
    } else if map.len() == 1 {
        PayloadType::Property
    } else {
        PayloadType::Other
    }
}
