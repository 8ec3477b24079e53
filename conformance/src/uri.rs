//! Request URI classification.
//!
//! Parses the part of a request URI below the service root into typed path
//! segments and tags the result with the addressing kind it denotes. With a
//! metadata model the classifier can tell navigation properties from
//! structural ones and to-one from to-many; without one, shapes that depend
//! on that distinction are reported as [`UriKind::Unclassified`].

use std::sync::OnceLock;

use odata_edm::{split_top_level, EdmError, EntityTypeId, ExpandTree, MetadataModel, NavigationStack};
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::Serialize;
use url::Url;

/// Addressing kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UriKind {
    /// The service root.
    ServiceDocument,
    /// `$metadata`.
    Metadata,
    /// `$batch`.
    Batch,
    /// An entity set: `/People`.
    EntitySet,
    /// A single entity by key, or a singleton: `/People(1)`.
    Entity,
    /// A to-many navigation: `/People(1)/Friends`.
    NavigationCollection,
    /// A navigation reaching a single entity: `/People(1)/BestFriend`.
    NavigationEntity,
    /// A structural property: `/People(1)/Name`.
    Property,
    /// The raw value of a property: `/People(1)/Name/$value`.
    PropertyValue,
    /// The media resource of a media link entry: `/Photos(1)/$value`.
    MediaResource,
    /// `$count` over a collection.
    Count,
    /// Links to a to-many navigation: `$links/Friends` or `Friends/$ref`.
    LinkCollection,
    /// Link to a single entity: `$links/BestFriend` or `BestFriend/$ref`.
    LinkSingle,
    /// A function import or service operation.
    ServiceOperation,
    /// Anything else.
    Unclassified,
}

impl UriKind {
    /// True for the navigation kinds.
    #[must_use]
    pub fn is_navigation(self) -> bool {
        matches!(self, Self::NavigationCollection | Self::NavigationEntity)
    }

    /// True for the link (`$links` / `$ref`) kinds.
    #[must_use]
    pub fn is_link(self) -> bool {
        matches!(self, Self::LinkCollection | Self::LinkSingle)
    }
}

/// One value of a key predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyValue {
    /// Key property name for composite keys.
    pub name: Option<String>,
    /// Literal as written, e.g. `'ALFKI'` or `guid'…'`.
    pub literal: String,
}

impl KeyValue {
    /// The literal without its type prefix and quotes, with `''` unescaped.
    #[must_use]
    pub fn unquoted(&self) -> String {
        let literal = self.literal.trim();
        match literal.find('\'') {
            Some(open) if literal.ends_with('\'') && literal.len() > open + 1 => {
                literal[open + 1..literal.len() - 1].replace("''", "'")
            }
            _ => literal.to_string(),
        }
    }
}

/// A parenthesized key predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyPredicate {
    /// Text between the parentheses.
    pub raw: String,
    /// Parsed values.
    pub values: Vec<KeyValue>,
}

impl KeyPredicate {
    /// Parses the text between the parentheses.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            return None;
        }
        let mut values = Vec::new();
        for part in split_top_level(raw, ',')? {
            let pieces = split_top_level(part, '=')?;
            let value = match pieces.as_slice() {
                [literal] => KeyValue {
                    name: None,
                    literal: literal.trim().to_string(),
                },
                [name, literal] => KeyValue {
                    name: Some(name.trim().to_string()),
                    literal: literal.trim().to_string(),
                },
                _ => return None,
            };
            if value.literal.is_empty() {
                return None;
            }
            values.push(value);
        }
        Some(Self {
            raw: raw.to_string(),
            values,
        })
    }

    /// True for `(A=1,B=2)`.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.values.len() > 1
    }
}

/// A classified path segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PathSegment {
    /// Entity set, optionally keyed.
    EntitySet {
        /// Set name.
        name: String,
        /// Key predicate.
        key: Option<KeyPredicate>,
    },
    /// Singleton.
    Singleton {
        /// Singleton name.
        name: String,
    },
    /// Function import call.
    ServiceOperation {
        /// Operation name.
        name: String,
        /// Parenthesized arguments, if any.
        arguments: Option<String>,
    },
    /// Navigation property, optionally keyed.
    Navigation {
        /// Property name.
        name: String,
        /// Key predicate.
        key: Option<KeyPredicate>,
    },
    /// Structural property.
    Property {
        /// Property name.
        name: String,
    },
    /// Derived-type cast.
    TypeCast {
        /// Qualified type name.
        name: String,
    },
    /// A member that could not be resolved without metadata.
    Member {
        /// Member name.
        name: String,
        /// Key predicate.
        key: Option<KeyPredicate>,
    },
    /// `$metadata`.
    Metadata,
    /// `$batch`.
    Batch,
    /// `$count`.
    Count,
    /// `$value`.
    Value,
    /// `$links`.
    Links,
    /// `$ref`.
    Ref,
}

/// Query options with normalized names.
///
/// System options lose their `$` prefix and are lower-cased, so `$expand`,
/// `expand` and `$EXPAND` are the same option. Custom options keep their
/// spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryOptions {
    entries: Vec<(String, String)>,
}

const SYSTEM_OPTIONS: &[&str] = &[
    "expand",
    "select",
    "filter",
    "orderby",
    "top",
    "skip",
    "skiptoken",
    "inlinecount",
    "count",
    "format",
    "search",
    "levels",
    "apply",
    "compute",
    "deltatoken",
    "schemaversion",
    "id",
    "callback",
];

/// System options lose their `$` and case; custom options are kept as given.
fn normalize(name: &str) -> String {
    let stripped = name.strip_prefix('$').unwrap_or(name);
    let lowered = stripped.to_ascii_lowercase();
    if SYSTEM_OPTIONS.contains(&lowered.as_str()) {
        lowered
    } else {
        name.to_string()
    }
}

impl QueryOptions {
    /// Builds options from raw `(name, value)` pairs.
    pub fn from_pairs<I, N, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .filter_map(|(name, value)| {
                let name = name.as_ref();
                if name.is_empty() {
                    return None;
                }
                Some((normalize(name), value.into()))
            })
            .collect();
        Self { entries }
    }

    /// First value of an option, by normalized name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = normalize(name);
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// True when the option is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All options in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Parsed `$expand`, if present.
    ///
    /// # Errors
    ///
    /// [`EdmError::MalformedPath`] when the expression cannot be tokenized.
    pub fn expand(&self) -> Option<Result<ExpandTree, EdmError>> {
        self.get("expand").map(ExpandTree::parse)
    }

    /// Parsed `$select` paths, if present.
    ///
    /// # Errors
    ///
    /// [`EdmError::MalformedPath`] when the expression cannot be tokenized.
    pub fn select(&self) -> Option<Result<Vec<Vec<String>>, EdmError>> {
        self.get("select")
            .map(|s| ExpandTree::parse(s).map(|t| t.paths()))
    }
}

/// A classified request URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourcePath {
    /// The URI as given.
    pub uri: String,
    /// Segments below the service root.
    pub segments: Vec<PathSegment>,
    /// Addressing kind.
    pub kind: UriKind,
    /// Query options.
    pub query: QueryOptions,
    /// Entity set (or singleton) named by the first segment.
    pub entity_set: Option<String>,
    /// Entity type addressed by the path, when metadata made it known.
    #[serde(skip)]
    pub target_type: Option<EntityTypeId>,
}

impl ResourcePath {
    fn unclassified(uri: &str, query: QueryOptions) -> Self {
        Self {
            uri: uri.to_string(),
            segments: Vec::new(),
            kind: UriKind::Unclassified,
            query,
            entity_set: None,
            target_type: None,
        }
    }

    /// Names of the navigation segments, in order.
    #[must_use]
    pub fn navigation_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                PathSegment::Navigation { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// True when any segment carries a key predicate.
    #[must_use]
    pub fn has_key(&self) -> bool {
        self.segments.iter().any(|s| {
            matches!(
                s,
                PathSegment::EntitySet { key: Some(_), .. }
                    | PathSegment::Navigation { key: Some(_), .. }
            )
        })
    }

    /// Resolves the navigation segments against `model`, starting from the
    /// entity set's type.
    ///
    /// # Errors
    ///
    /// [`EdmError::UnknownType`] when the entity set is unknown, otherwise
    /// whatever navigation resolution reports.
    pub fn navigation_stack(&self, model: &MetadataModel) -> Result<NavigationStack, EdmError> {
        let set = self.entity_set.as_deref().unwrap_or_default();
        let start = model
            .entity_type_of_set(set)
            .ok_or_else(|| EdmError::UnknownType(set.to_string()))?;
        model.resolve_navigation_stack(start, &self.navigation_names())
    }
}

/// Classifies request URIs relative to a service root.
#[derive(Debug, Clone)]
pub struct UriClassifier<'m> {
    root: Url,
    model: Option<&'m MetadataModel>,
}

fn segment_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^([^()]+?)(?:\((.*)\))?$").ok())
        .as_ref()
}

/// Splits `Name(args)` into name and argument text.
fn split_segment(segment: &str) -> Option<(String, Option<String>)> {
    let caps = segment_pattern()?.captures(segment)?;
    let name = caps.get(1)?.as_str().trim().to_string();
    let args = caps.get(2).map(|m| m.as_str().to_string());
    Some((name, args))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Root,
    Collection,
    Single,
    Navigation { many: bool },
    NavigationSingle,
    Property,
    Operation,
    Terminal(UriKind),
    Unknown,
}

impl<'m> UriClassifier<'m> {
    /// Classifier for the given service root.
    #[must_use]
    pub fn new(service_root: Url) -> Self {
        Self {
            root: service_root,
            model: None,
        }
    }

    /// Uses `model` to resolve members below the entity set.
    #[must_use]
    pub fn with_metadata(mut self, model: &'m MetadataModel) -> Self {
        self.model = Some(model);
        self
    }

    /// Classifies `uri`. Never fails: shapes that cannot be recognized
    /// come back as [`UriKind::Unclassified`].
    #[must_use]
    pub fn classify(&self, uri: &str) -> ResourcePath {
        let Ok(url) = Url::parse(uri) else {
            return ResourcePath::unclassified(uri, QueryOptions::default());
        };
        let query = QueryOptions::from_pairs(url.query_pairs().map(|(n, v)| (n.into_owned(), v.into_owned())));

        let root_path = self.root.path().trim_end_matches('/');
        let same_origin = url.scheme() == self.root.scheme()
            && url.host_str() == self.root.host_str()
            && url.port_or_known_default() == self.root.port_or_known_default();
        let Some(rest) = url.path().strip_prefix(root_path).filter(|_| same_origin) else {
            return ResourcePath::unclassified(uri, query);
        };
        if !(rest.is_empty() || rest.starts_with('/')) {
            return ResourcePath::unclassified(uri, query);
        }

        let raw_segments: Vec<String> = rest
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
            .collect();

        match self.walk(&raw_segments) {
            Some((segments, kind, entity_set, target_type)) => ResourcePath {
                uri: uri.to_string(),
                segments,
                kind,
                query,
                entity_set,
                target_type,
            },
            None => ResourcePath::unclassified(uri, query),
        }
    }

    #[allow(clippy::type_complexity)]
    fn walk(
        &self,
        raw: &[String],
    ) -> Option<(Vec<PathSegment>, UriKind, Option<String>, Option<EntityTypeId>)> {
        let mut segments = Vec::with_capacity(raw.len());
        let mut state = State::Root;
        let mut current: Option<EntityTypeId> = None;
        let mut entity_set = None;
        let mut pending_links = false;

        for text in raw {
            if let State::Terminal(_) = state {
                return None;
            }
            match text.as_str() {
                "$metadata" if state == State::Root => {
                    segments.push(PathSegment::Metadata);
                    state = State::Terminal(UriKind::Metadata);
                }
                "$batch" if state == State::Root => {
                    segments.push(PathSegment::Batch);
                    state = State::Terminal(UriKind::Batch);
                }
                "$count" => {
                    segments.push(PathSegment::Count);
                    state = match state {
                        State::Collection | State::Navigation { many: true } => {
                            State::Terminal(UriKind::Count)
                        }
                        _ => return None,
                    };
                }
                "$value" => {
                    segments.push(PathSegment::Value);
                    state = match state {
                        State::Property => State::Terminal(UriKind::PropertyValue),
                        State::Single | State::NavigationSingle => {
                            State::Terminal(UriKind::MediaResource)
                        }
                        _ => return None,
                    };
                }
                "$links" => {
                    if !matches!(state, State::Single | State::NavigationSingle) {
                        return None;
                    }
                    segments.push(PathSegment::Links);
                    pending_links = true;
                }
                "$ref" => {
                    segments.push(PathSegment::Ref);
                    state = match state {
                        State::Navigation { many: true } | State::Collection => {
                            State::Terminal(UriKind::LinkCollection)
                        }
                        State::Navigation { many: false }
                        | State::NavigationSingle
                        | State::Single => State::Terminal(UriKind::LinkSingle),
                        _ => return None,
                    };
                }
                _ => {
                    let (name, args) = split_segment(text)?;
                    if name.starts_with('$') {
                        return None;
                    }
                    let key = match args.as_deref() {
                        Some(a) if !a.trim().is_empty() => Some(KeyPredicate::parse(a)?),
                        _ => None,
                    };
                    if state == State::Root {
                        entity_set = Some(name.clone());
                        let (segment, next, ty) = self.first_segment(name, key, args)?;
                        segments.push(segment);
                        state = next;
                        current = ty;
                        continue;
                    }
                    let (segment, next, ty) = self.member_segment(state, current, name, key)?;
                    segments.push(segment);
                    state = next;
                    current = ty;
                    if pending_links {
                        pending_links = false;
                        state = match state {
                            State::Navigation { many: true } => {
                                State::Terminal(UriKind::LinkCollection)
                            }
                            State::Navigation { many: false } | State::NavigationSingle => {
                                State::Terminal(UriKind::LinkSingle)
                            }
                            _ => return None,
                        };
                    }
                }
            }
        }
        if pending_links {
            return None;
        }

        let kind = match state {
            State::Root => UriKind::ServiceDocument,
            State::Collection => UriKind::EntitySet,
            State::Single => UriKind::Entity,
            State::Navigation { many: true } => UriKind::NavigationCollection,
            State::Navigation { many: false } | State::NavigationSingle => {
                UriKind::NavigationEntity
            }
            State::Property => UriKind::Property,
            State::Operation => UriKind::ServiceOperation,
            State::Terminal(kind) => kind,
            State::Unknown => UriKind::Unclassified,
        };
        Some((segments, kind, entity_set, current))
    }

    fn first_segment(
        &self,
        name: String,
        key: Option<KeyPredicate>,
        args: Option<String>,
    ) -> Option<(PathSegment, State, Option<EntityTypeId>)> {
        let Some(model) = self.model else {
            let state = if key.is_some() {
                State::Single
            } else {
                State::Collection
            };
            return Some((PathSegment::EntitySet { name, key }, state, None));
        };
        if let Some(set) = model.entity_set(&name) {
            let ty = set.entity_type;
            let state = if key.is_some() {
                State::Single
            } else {
                State::Collection
            };
            return Some((PathSegment::EntitySet { name, key }, state, ty));
        }
        if key.is_none() {
            if let Some(single) = model.singleton(&name) {
                let ty = single.entity_type;
                return Some((PathSegment::Singleton { name }, State::Single, ty));
            }
        }
        if let Some(op) = model.function_import(&name) {
            let ty = op
                .entity_set
                .as_deref()
                .and_then(|s| model.entity_type_of_set(s));
            let returns_collection = op
                .return_type
                .as_deref()
                .is_some_and(|t| t.starts_with("Collection("));
            let state = match (ty, returns_collection) {
                (Some(_), true) => State::Collection,
                (Some(_), false) => State::Single,
                _ => State::Operation,
            };
            return Some((
                PathSegment::ServiceOperation {
                    name,
                    arguments: args,
                },
                state,
                ty,
            ));
        }
        None
    }

    fn member_segment(
        &self,
        state: State,
        current: Option<EntityTypeId>,
        name: String,
        key: Option<KeyPredicate>,
    ) -> Option<(PathSegment, State, Option<EntityTypeId>)> {
        let (Some(model), Some(ty)) = (self.model, current) else {
            // Without metadata a member cannot be told apart; anything
            // below a property is a nested property.
            return match state {
                State::Property if key.is_none() => {
                    Some((PathSegment::Property { name }, State::Property, None))
                }
                _ => Some((PathSegment::Member { name, key }, State::Unknown, None)),
            };
        };
        match state {
            State::Single | State::NavigationSingle | State::Navigation { many: false } => {}
            State::Navigation { many: true } | State::Collection if name.contains('.') => {}
            _ => return None,
        }

        if let Ok(end) = model.navigation_end(ty, &name) {
            let next = match (end.multiplicity.is_many(), key.is_some()) {
                (true, false) => State::Navigation { many: true },
                (true, true) => State::NavigationSingle,
                (false, _) => State::Navigation { many: false },
            };
            return Some((PathSegment::Navigation { name, key }, next, Some(end.target)));
        }
        if key.is_none() {
            if model.property(ty, &name).is_some() {
                return Some((PathSegment::Property { name }, State::Property, None));
            }
            if let Some(derived) = model.resolve_entity_type(&name) {
                if name.contains('.') && model.base_chain(derived).contains(&ty) {
                    return Some((PathSegment::TypeCast { name }, state, Some(derived)));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures;

    fn root() -> Url {
        Url::parse("http://host/svc.svc/").expect("root")
    }

    fn model() -> MetadataModel {
        MetadataModel::parse(fixtures::PEOPLE_V4_METADATA).expect("metadata")
    }

    #[test]
    fn root_and_system_resources() {
        let c = UriClassifier::new(root());
        assert_eq!(c.classify("http://host/svc.svc").kind, UriKind::ServiceDocument);
        assert_eq!(c.classify("http://host/svc.svc/").kind, UriKind::ServiceDocument);
        assert_eq!(c.classify("http://host/svc.svc/$metadata").kind, UriKind::Metadata);
        assert_eq!(c.classify("http://host/svc.svc/$batch").kind, UriKind::Batch);
        assert_eq!(c.classify("http://other/svc.svc/People").kind, UriKind::Unclassified);
        assert_eq!(c.classify("http://host/svc.svcx/People").kind, UriKind::Unclassified);
    }

    #[test]
    fn sets_and_keys_without_metadata() {
        let c = UriClassifier::new(root());
        let set = c.classify("http://host/svc.svc/People/");
        assert_eq!(set.kind, UriKind::EntitySet);
        assert_eq!(set.entity_set.as_deref(), Some("People"));
        assert_eq!(c.classify("http://host/svc.svc/People(1)").kind, UriKind::Entity);
        assert_eq!(c.classify("http://host/svc.svc/People/$count").kind, UriKind::Count);
        assert_eq!(
            c.classify("http://host/svc.svc/People(1)/Friends").kind,
            UriKind::Unclassified
        );
    }

    #[test]
    fn navigation_kinds_follow_multiplicity() {
        let m = model();
        let c = UriClassifier::new(root()).with_metadata(&m);
        let friends = c.classify("http://host/svc.svc/People(1)/Friends");
        assert_eq!(friends.kind, UriKind::NavigationCollection);
        let stack = friends.navigation_stack(&m).expect("stack");
        assert_eq!(stack.len(), 1);
        assert!(stack.steps[0].multiplicity.is_many());

        assert_eq!(
            c.classify("http://host/svc.svc/People(1)/BestFriend").kind,
            UriKind::NavigationEntity
        );
        assert_eq!(
            c.classify("http://host/svc.svc/People(1)/Friends(2)").kind,
            UriKind::NavigationEntity
        );
        assert_eq!(
            c.classify("http://host/svc.svc/People(1)/Friends/$count").kind,
            UriKind::Count
        );
    }

    #[test]
    fn properties_values_and_links() {
        let m = model();
        let c = UriClassifier::new(root()).with_metadata(&m);
        assert_eq!(c.classify("http://host/svc.svc/People(1)/Name").kind, UriKind::Property);
        assert_eq!(
            c.classify("http://host/svc.svc/People(1)/Name/$value").kind,
            UriKind::PropertyValue
        );
        assert_eq!(
            c.classify("http://host/svc.svc/Photos(7)/$value").kind,
            UriKind::MediaResource
        );
        assert_eq!(
            c.classify("http://host/svc.svc/People(1)/Friends/$ref").kind,
            UriKind::LinkCollection
        );
        assert_eq!(
            c.classify("http://host/svc.svc/People(1)/$links/BestFriend").kind,
            UriKind::LinkSingle
        );
        assert_eq!(
            c.classify("http://host/svc.svc/People(1)/$links/Friends").kind,
            UriKind::LinkCollection
        );
        assert_eq!(
            c.classify("http://host/svc.svc/People(1)/Nope").kind,
            UriKind::Unclassified
        );
        assert_eq!(c.classify("http://host/svc.svc/Me").kind, UriKind::Entity);
        assert_eq!(
            c.classify("http://host/svc.svc/GetTopPeople(n=3)").kind,
            UriKind::EntitySet
        );
    }

    #[test]
    fn encoding_and_option_aliases_normalize() {
        let m = model();
        let c = UriClassifier::new(root()).with_metadata(&m);
        let plain = c.classify("http://host/svc.svc/People(1)/Friends?$expand=Friends&$select=Name");
        let encoded =
            c.classify("http://host/svc.svc/People%281%29/Friends/?expand=Friends&SELECT=Name");
        assert_eq!(plain.segments, encoded.segments);
        assert_eq!(plain.kind, encoded.kind);
        assert_eq!(plain.query.get("expand"), encoded.query.get("$expand"));
        assert_eq!(encoded.query.get("select"), Some("Name"));
    }

    #[test]
    fn option_lookups_normalize_like_storage() {
        let query = QueryOptions::from_pairs([("$Select", "Name"), ("Mode", "fast")]);
        assert_eq!(query.get("Select"), Some("Name"));
        assert_eq!(query.get("$SELECT"), Some("Name"));
        assert!(query.contains("select"));
        assert_eq!(query.get("Mode"), Some("fast"));
        assert_eq!(query.get("mode"), None);
    }

    #[test]
    fn composite_and_quoted_keys() {
        let key = KeyPredicate::parse("OrderID=1,ProductID='a,b'").expect("key");
        assert!(key.is_composite());
        assert_eq!(key.values[1].name.as_deref(), Some("ProductID"));
        assert_eq!(key.values[1].unquoted(), "a,b");
        let quoted = KeyPredicate::parse("'O''Neil'").expect("key");
        assert_eq!(quoted.values[0].unquoted(), "O'Neil");
        assert!(KeyPredicate::parse("").is_none());
        assert!(KeyPredicate::parse("A=1=2").is_none());
    }
}
