//! Link extraction from payloads: read links of entries, the first entry of
//! a feed, and the collections of a service document.
//!
//! Read links are looked up in a fixed order: the edit link, then the self
//! (read) link, then the entry id. Relative links resolve against the
//! nearest `xml:base` (Atom) or the request URI.

use odata_edm::{EntityTypeId, MetadataModel};
use roxmltree::{Document, Node};
use serde_json::Value;
use url::Url;

use crate::xmlns;

/// Resolves `href` against `base`, leaving absolute URIs untouched.
pub(crate) fn resolve(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(String::from)
}

/// Effective `xml:base` of `node`, resolved against `fallback`.
fn xml_base(node: Node<'_, '_>, fallback: &Url) -> Url {
    let bases: Vec<&str> = node
        .ancestors()
        .filter_map(|n| n.attribute((xmlns::XML, "base")))
        .collect();
    bases
        .iter()
        .rev()
        .try_fold(fallback.clone(), |acc, b| acc.join(b).ok())
        .unwrap_or_else(|| fallback.clone())
}

fn atom_child<'a, 'input>(node: Node<'a, 'input>, local: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.has_tag_name((xmlns::ATOM, local)))
}

/// Entry elements of an Atom document: the root entry, or a feed's entries.
pub(crate) fn atom_entries<'a, 'input>(doc: &'a Document<'input>) -> Vec<Node<'a, 'input>> {
    let root = doc.root_element();
    if root.has_tag_name((xmlns::ATOM, "entry")) {
        return vec![root];
    }
    root.children()
        .filter(|c| c.is_element() && c.has_tag_name((xmlns::ATOM, "entry")))
        .collect()
}

/// Read link of an Atom entry.
pub(crate) fn atom_read_link(entry: Node<'_, '_>, request: &Url) -> Option<String> {
    let base = xml_base(entry, request);
    for rel in ["edit", "self"] {
        let href = entry
            .children()
            .filter(|c| c.is_element() && c.has_tag_name((xmlns::ATOM, "link")))
            .find(|l| l.attribute("rel") == Some(rel))
            .and_then(|l| l.attribute("href"));
        if let Some(href) = href {
            return resolve(&base, href);
        }
    }
    atom_child(entry, "id")
        .and_then(|id| id.text())
        .and_then(|id| resolve(&base, id))
}

/// Collection hrefs of an AtomPub service document.
pub(crate) fn atom_collections(doc: &Document<'_>, request: &Url) -> Vec<String> {
    doc.descendants()
        .filter(|n| n.has_tag_name((xmlns::APP, "collection")))
        .filter_map(|n| {
            let href = n.attribute("href")?;
            resolve(&xml_base(n, request), href)
        })
        .collect()
}

/// Entity objects of a JSON entry or feed, in document order.
pub(crate) fn json_entities(value: &Value) -> Vec<&Value> {
    let body = value.get("d").unwrap_or(value);
    let items = match body {
        Value::Array(items) => Some(items),
        Value::Object(map) => map
            .get("value")
            .or_else(|| map.get("results"))
            .and_then(Value::as_array),
        _ => None,
    };
    match items {
        Some(items) => items.iter().filter(|i| i.is_object()).collect(),
        None if body.is_object() => vec![body],
        None => Vec::new(),
    }
}

const EDIT_LINKS: [&str; 2] = ["@odata.editLink", "odata.editLink"];
const READ_LINKS: [&str; 2] = ["@odata.readLink", "odata.readLink"];
const IDS: [&str; 2] = ["@odata.id", "odata.id"];

/// Read link of a JSON entity, annotations only.
pub(crate) fn json_read_link(entity: &Value, request: &Url) -> Option<String> {
    let annotation = |names: &[&str]| {
        names
            .iter()
            .find_map(|name| entity.get(*name).and_then(Value::as_str))
    };
    annotation(&EDIT_LINKS)
        .or_else(|| annotation(&READ_LINKS))
        .or_else(|| entity.pointer("/__metadata/uri").and_then(Value::as_str))
        .or_else(|| annotation(&IDS))
        .and_then(|href| resolve(request, href))
}

/// Canonical `Set(key)` URL of a JSON entity built from its key values.
pub(crate) fn canonical_link(
    entity: &Value,
    model: &MetadataModel,
    ty: EntityTypeId,
    service_root: &Url,
    entity_set: &str,
) -> Option<String> {
    let keys = model.key_properties(ty);
    if keys.is_empty() {
        return None;
    }
    let mut parts = Vec::with_capacity(keys.len());
    for key in &keys {
        let literal = match entity.get(&key.name)? {
            Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        parts.push(if keys.len() == 1 {
            literal
        } else {
            format!("{}={literal}", key.name)
        });
    }
    resolve(service_root, &format!("{entity_set}({})", parts.join(",")))
}

/// Collection URLs of a JSON service document.
pub(crate) fn json_collections(value: &Value, request: &Url) -> Vec<String> {
    if let Some(sets) = value.pointer("/d/EntitySets").and_then(Value::as_array) {
        return sets
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|name| resolve(request, name))
            .collect();
    }
    value
        .get("value")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|i| {
                    i.get("kind")
                        .and_then(Value::as_str)
                        .map_or(true, |k| k == "EntitySet")
                })
                .filter_map(|i| i.get("url").and_then(Value::as_str))
                .filter_map(|href| resolve(request, href))
                .collect()
        })
        .unwrap_or_default()
}
