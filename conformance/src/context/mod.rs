//! Service context: one HTTP exchange fused with the service's metadata and
//! the classified request URI.
//!
//! A [`ServiceContext`] is built once per crawled resource by a
//! [`ContextBuilder`] and never mutated afterwards. Rules read the derived
//! facts (payload format and type, protocol version, entity type in scope,
//! flags) and, when they need another exchange, fetch through the context
//! without touching it.
//!
//! | Fact | Source |
//! |------|--------|
//! | [`PayloadFormat`] | `Content-Type`, else content sniffing |
//! | [`PayloadType`] | root element (XML), context URL or shape (JSON), URI kind |
//! | [`ProtocolVersion`] | `OData-Version`, `DataServiceVersion`, media type parameters, metadata, V1 |
//! | entity type | `category@term`, `odata.type`, context URL, URI |
//! | projection | `$select` present |
//! | media link entry | entity type declares `HasStream` |

mod detect;
mod links;

use std::sync::Arc;

use odata_edm::{EdmError, EntityTypeId, MetadataModel, ProtocolVersion};
use roxmltree::Document;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::fetch::{FetchError, FetchRequest, Fetcher, HeaderList, HttpResponse, DEFAULT_MAX_BYTES};
use crate::uri::{ResourcePath, UriClassifier, UriKind};
use crate::xmlns;

pub use detect::{MetadataVerbosity, PayloadFormat, PayloadType};

use detect::MediaType;

/// A metadata document: raw text and its parsed model.
#[derive(Debug, Clone)]
pub struct MetadataDocument {
    /// Document text as fetched.
    pub raw: String,
    /// Parsed model.
    pub model: MetadataModel,
}

impl MetadataDocument {
    /// Parses `raw`.
    ///
    /// # Errors
    ///
    /// Returns the [`EdmError`] of [`MetadataModel::parse`].
    pub fn parse(raw: impl Into<String>) -> Result<Self, EdmError> {
        let raw = raw.into();
        let model = MetadataModel::parse(&raw)?;
        Ok(Self { raw, model })
    }
}

/// Builds [`ServiceContext`]s for one service.
///
/// The builder holds what every context of a run shares: the service root,
/// the metadata document, the transport and the request template. It is
/// cheap to clone.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    service_root: Url,
    metadata: Option<Arc<MetadataDocument>>,
    metadata_error: Option<String>,
    transport: Option<Arc<dyn Fetcher>>,
    accept: Option<String>,
    headers: Vec<(String, String)>,
    max_bytes: usize,
    offline: bool,
}

impl ContextBuilder {
    /// A builder for the service rooted at `service_root`, with no metadata
    /// and no transport.
    #[must_use]
    pub fn new(service_root: Url) -> Self {
        Self {
            service_root,
            metadata: None,
            metadata_error: None,
            transport: None,
            accept: None,
            headers: Vec::new(),
            max_bytes: DEFAULT_MAX_BYTES,
            offline: false,
        }
    }

    /// Shares `metadata` with every context built.
    #[must_use]
    pub fn metadata(mut self, metadata: Arc<MetadataDocument>) -> Self {
        self.metadata = Some(metadata);
        self.metadata_error = None;
        self
    }

    /// Records why no metadata is available.
    #[must_use]
    pub fn metadata_error(mut self, error: impl Into<String>) -> Self {
        self.metadata = None;
        self.metadata_error = Some(error.into());
        self
    }

    /// Transport for secondary fetches.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Fetcher>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// `Accept` header of the request under test.
    #[must_use]
    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    /// Adds a header sent with every request.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Body size cap for secondary fetches.
    #[must_use]
    pub fn max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Marks contexts as built from payloads on disk. Offline contexts have
    /// no transport.
    #[must_use]
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self.transport = None;
        self
    }

    /// Service root.
    #[must_use]
    pub fn service_root(&self) -> &Url {
        &self.service_root
    }

    /// The request this builder would issue for `uri`.
    #[must_use]
    pub fn request(&self, uri: impl Into<String>) -> FetchRequest {
        let mut request = FetchRequest::get(uri).max_bytes(self.max_bytes);
        if let Some(accept) = &self.accept {
            request = request.accept(accept.clone());
        }
        for (name, value) in &self.headers {
            request = request.header(name.clone(), value.clone());
        }
        request
    }

    /// Builds the context of the exchange `GET uri → response`.
    ///
    /// Never fails and never fetches: payloads that cannot be parsed leave
    /// the payload type at [`PayloadType::None`] with the parse error in
    /// [`ServiceContext::payload_error`].
    #[must_use]
    pub fn build(&self, uri: &str, response: HttpResponse) -> ServiceContext {
        let model = self.metadata.as_deref().map(|m| &m.model);
        let mut classifier = UriClassifier::new(self.service_root.clone());
        if let Some(model) = model {
            classifier = classifier.with_metadata(model);
        }
        let path = classifier.classify(uri);

        let media = response.content_type().map(MediaType::parse);
        let format = detect::format(media.as_ref(), &response.body);
        let version = detect::version(
            &response.headers,
            media.as_ref(),
            model.and_then(MetadataModel::version),
        );
        let verbosity = detect::verbosity(format, media.as_ref(), version);

        let mut payload_error = None;
        let mut json = None;
        let payload_type = match format {
            PayloadFormat::Atom | PayloadFormat::Xml => match Document::parse(&response.body) {
                Ok(doc) => detect::xml_type(&doc),
                Err(e) => {
                    payload_error = Some(format!("malformed XML payload: {e}"));
                    PayloadType::None
                }
            },
            PayloadFormat::JsonLight | PayloadFormat::JsonVerbose => {
                match serde_json::from_str::<Value>(&response.body) {
                    Ok(value) => {
                        let ty = detect::json_type(&value, format, path.kind);
                        json = Some(value);
                        ty
                    }
                    Err(e) => {
                        payload_error = Some(format!("malformed JSON payload: {e}"));
                        PayloadType::None
                    }
                }
            }
            PayloadFormat::Text | PayloadFormat::Binary => PayloadType::RawValue,
            PayloadFormat::None => PayloadType::None,
        };

        let uri_url = Url::parse(uri).unwrap_or_else(|_| self.service_root.clone());
        let (entity_type, type_name) = match (model, payload_type) {
            (Some(model), PayloadType::Entry | PayloadType::Feed) => entity_type_in_scope(
                model,
                payload_type,
                &response.body,
                json.as_ref(),
                &path,
            ),
            _ => (None, None),
        };
        let media_link_entry = match (model, entity_type) {
            (Some(model), Some(ty)) => model.has_stream(ty),
            _ => false,
        };

        let context = ServiceContext {
            uri: uri.to_string(),
            uri_url,
            status: response.status,
            headers: response.headers,
            body: response.body,
            projection: path.query.contains("select"),
            path,
            format,
            payload_type,
            payload_error,
            version,
            verbosity,
            entity_type,
            type_name,
            requires_metadata: format == PayloadFormat::JsonLight
                && matches!(verbosity, MetadataVerbosity::Minimal | MetadataVerbosity::None),
            media_link_entry,
            json,
            template: self.clone(),
        };
        debug!(
            uri = %context.uri,
            status = context.status,
            format = ?context.format,
            payload = ?context.payload_type,
            version = %context.version,
            kind = ?context.path.kind,
            "built service context"
        );
        context
    }
}

/// Entity type in scope and the raw discriminator that named it.
///
/// Sources in priority order: the payload's discriminator, the context
/// URL, the URI. A feed has a discriminator only when every entry carries
/// the same one. A source naming a type the metadata does not know falls
/// through to the next one.
fn entity_type_in_scope(
    model: &MetadataModel,
    payload_type: PayloadType,
    body: &str,
    json: Option<&Value>,
    path: &ResourcePath,
) -> (Option<EntityTypeId>, Option<String>) {
    let names = match json {
        Some(value) => links::json_entities(value)
            .into_iter()
            .map(json_discriminator)
            .collect(),
        None => atom_discriminators(body),
    };
    let discriminator = match payload_type {
        PayloadType::Entry => names.into_iter().next().flatten(),
        PayloadType::Feed => agreed(names),
        _ => None,
    };
    let from_discriminator = discriminator
        .as_deref()
        .and_then(|name| model.resolve_entity_type(name));
    let from_context = json
        .and_then(|v| {
            v.get("@odata.context")
                .or_else(|| v.get("odata.metadata"))
                .and_then(Value::as_str)
        })
        .and_then(|context| context_url_type(model, context));
    let ty = from_discriminator
        .or(from_context)
        .or(path.target_type);
    (ty, discriminator)
}

/// The one name every entry carries, if there is one.
fn agreed(names: Vec<Option<String>>) -> Option<String> {
    let mut names = names.into_iter();
    let first = names.next()??;
    names
        .all(|name| name.as_deref() == Some(first.as_str()))
        .then_some(first)
}

fn atom_discriminators(body: &str) -> Vec<Option<String>> {
    let Ok(doc) = Document::parse(body) else {
        return Vec::new();
    };
    links::atom_entries(&doc)
        .into_iter()
        .map(|entry| {
            entry
                .children()
                .filter(|c| c.has_tag_name((xmlns::ATOM, "category")))
                .find(|c| c.attribute("scheme").is_some_and(xmlns::is_scheme))
                .and_then(|c| c.attribute("term"))
                .map(str::to_string)
        })
        .collect()
}

fn json_discriminator(entity: &Value) -> Option<String> {
    entity
        .get("@odata.type")
        .or_else(|| entity.get("odata.type"))
        .or_else(|| entity.pointer("/__metadata/type"))
        .and_then(Value::as_str)
        .map(|name| name.trim_start_matches('#').to_string())
}

/// Entity type named by a context URL fragment such as `People/$entity`,
/// `People(Friends)/$entity` or `People/Demo.Employee`.
fn context_url_type(model: &MetadataModel, context: &str) -> Option<EntityTypeId> {
    let (_, fragment) = context.split_once('#')?;
    let mut parts = fragment.split('/');
    let set = parts.next()?;
    let set = set.split_once('(').map_or(set, |(name, _)| name);
    let base = model.entity_type_of_set(set)?;
    let cast = parts
        .next()
        .filter(|p| p.contains('.') && !p.starts_with('$') && !p.starts_with('@'))
        .and_then(|p| model.resolve_entity_type(p));
    Some(cast.unwrap_or(base))
}

/// Everything known about one HTTP exchange.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    /// Request URI.
    pub uri: String,
    uri_url: Url,
    /// Classified request URI.
    pub path: ResourcePath,
    /// Response status.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderList,
    /// Response body.
    pub body: String,
    /// Detected payload format.
    pub format: PayloadFormat,
    /// Detected payload type.
    pub payload_type: PayloadType,
    /// Why the payload could not be parsed.
    pub payload_error: Option<String>,
    /// Protocol version in effect.
    pub version: ProtocolVersion,
    /// JSON metadata verbosity.
    pub verbosity: MetadataVerbosity,
    /// Entity type in scope.
    pub entity_type: Option<EntityTypeId>,
    /// Type name the payload itself declared, resolvable or not.
    pub type_name: Option<String>,
    /// The payload leaves type information to the metadata.
    pub requires_metadata: bool,
    /// The request carried `$select`.
    pub projection: bool,
    /// The entity type in scope has a media resource.
    pub media_link_entry: bool,
    json: Option<Value>,
    template: ContextBuilder,
}

impl ServiceContext {
    /// Service root.
    #[must_use]
    pub fn service_root(&self) -> &Url {
        &self.template.service_root
    }

    /// The metadata document, if one was available.
    #[must_use]
    pub fn metadata(&self) -> Option<&MetadataDocument> {
        self.template.metadata.as_deref()
    }

    /// The parsed metadata model, if one was available.
    #[must_use]
    pub fn model(&self) -> Option<&MetadataModel> {
        self.metadata().map(|m| &m.model)
    }

    /// Why the metadata is absent, when it was requested and failed.
    #[must_use]
    pub fn metadata_error(&self) -> Option<&str> {
        self.template.metadata_error.as_deref()
    }

    /// True for contexts built from payloads on disk.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.template.offline
    }

    /// True when secondary fetches are possible.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.template.transport.is_some()
    }

    /// Addressing kind of the request URI.
    #[must_use]
    pub fn uri_kind(&self) -> UriKind {
        self.path.kind
    }

    /// A response header.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The body as an XML tree. `None` for non-XML or malformed payloads.
    #[must_use]
    pub fn xml(&self) -> Option<Document<'_>> {
        if self.format.is_xml() {
            Document::parse(&self.body).ok()
        } else {
            None
        }
    }

    /// The body as a JSON value. `None` for non-JSON or malformed payloads.
    #[must_use]
    pub fn json(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    /// Qualified name of the entity type in scope.
    #[must_use]
    pub fn entity_type_name(&self) -> Option<String> {
        let model = self.model()?;
        self.entity_type.map(|ty| model.entity_type(ty).full_name())
    }

    /// Issues a secondary request through the context's transport.
    ///
    /// # Errors
    ///
    /// [`FetchError::Unavailable`] for offline contexts, otherwise whatever
    /// the transport reports.
    pub fn fetch(&self, request: &FetchRequest) -> Result<HttpResponse, FetchError> {
        match &self.template.transport {
            Some(transport) => transport.fetch(request),
            None => Err(FetchError::Unavailable {
                uri: request.uri.clone(),
            }),
        }
    }

    /// A request for `uri` carrying this context's headers and size cap.
    #[must_use]
    pub fn request(&self, uri: impl Into<String>) -> FetchRequest {
        self.template.request(uri)
    }

    /// Re-requests this context's URI with a different `Accept` header and
    /// extra headers, returning the sibling context.
    ///
    /// # Errors
    ///
    /// Whatever [`ServiceContext::fetch`] reports.
    pub fn refetch_with(
        &self,
        accept: &str,
        headers: &[(&str, &str)],
    ) -> Result<ServiceContext, FetchError> {
        let mut template = self.template.clone().accept(accept);
        for (name, value) in headers {
            template = template.header(*name, *value);
        }
        let response = self.fetch(&template.request(self.uri.clone()))?;
        Ok(template.build(&self.uri, response))
    }

    /// A sibling context for another response to the same request, sharing
    /// the metadata and transport.
    #[must_use]
    pub fn derive(&self, response: HttpResponse) -> ServiceContext {
        self.template.build(&self.uri, response)
    }

    /// A context for `uri → response` built with this context's settings.
    #[must_use]
    pub fn derive_at(&self, uri: &str, response: HttpResponse) -> ServiceContext {
        self.template.build(uri, response)
    }

    /// Read link of the entry (or of a feed's first entry).
    ///
    /// Looks at the edit link, then the self link, then the id; JSON
    /// entities without link annotations fall back to the canonical
    /// `Set(key)` URL when the metadata knows the key.
    #[must_use]
    pub fn read_link(&self) -> Option<String> {
        match self.format {
            PayloadFormat::Atom => {
                let doc = self.xml()?;
                let entry = links::atom_entries(&doc).into_iter().next()?;
                links::atom_read_link(entry, &self.uri_url)
            }
            PayloadFormat::JsonLight | PayloadFormat::JsonVerbose => {
                let entity = links::json_entities(self.json()?).into_iter().next()?;
                links::json_read_link(entity, &self.uri_url).or_else(|| {
                    let model = self.model()?;
                    let ty = self.entity_type?;
                    let set = self.path.entity_set.as_deref()?;
                    links::canonical_link(entity, model, ty, self.service_root(), set)
                })
            }
            _ => None,
        }
    }

    /// Collection URLs listed by a service document.
    #[must_use]
    pub fn collection_links(&self) -> Vec<String> {
        if self.payload_type != PayloadType::ServiceDocument {
            return Vec::new();
        }
        match self.format {
            PayloadFormat::Atom | PayloadFormat::Xml => self
                .xml()
                .map(|doc| links::atom_collections(&doc, &self.uri_url))
                .unwrap_or_default(),
            PayloadFormat::JsonLight | PayloadFormat::JsonVerbose => self
                .json()
                .map(|value| links::json_collections(value, &self.uri_url))
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Resolves `href` against the request URI.
    #[must_use]
    pub fn resolve(&self, href: &str) -> Option<String> {
        links::resolve(&self.uri_url, href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::StaticFetcher;
    use crate::tests::fixtures;

    fn builder(metadata: &str) -> ContextBuilder {
        let root = Url::parse(fixtures::SERVICE_ROOT).expect("root");
        let doc = MetadataDocument::parse(metadata).expect("metadata");
        ContextBuilder::new(root).metadata(Arc::new(doc))
    }

    fn response(content_type: &str, headers: &[(&str, &str)], body: &str) -> HttpResponse {
        let mut list = HeaderList::new();
        list.push("Content-Type", content_type);
        for (name, value) in headers {
            list.push(*name, *value);
        }
        HttpResponse::new(200, list, body)
    }

    #[test]
    fn atom_entry_context() {
        let ctx = builder(fixtures::PEOPLE_V3_METADATA).build(
            "http://host/svc.svc/People(1)",
            response(
                "application/atom+xml;type=entry",
                &[("DataServiceVersion", "2.0")],
                fixtures::ATOM_ENTRY_PERSON,
            ),
        );
        assert_eq!(ctx.format, PayloadFormat::Atom);
        assert_eq!(ctx.payload_type, PayloadType::Entry);
        assert_eq!(ctx.version, ProtocolVersion::V2);
        assert_eq!(ctx.verbosity, MetadataVerbosity::NotApplicable);
        assert_eq!(ctx.type_name.as_deref(), Some("Demo.Person"));
        assert_eq!(ctx.entity_type_name().as_deref(), Some("Demo.Person"));
        assert!(!ctx.requires_metadata);
        assert!(!ctx.projection);
        assert!(!ctx.media_link_entry);
        assert!(!ctx.is_offline() && !ctx.is_online());
        assert_eq!(ctx.read_link().as_deref(), Some("http://host/svc.svc/People(1)"));
    }

    #[test]
    fn json_entry_context_resolves_through_the_context_url() {
        let ctx = builder(fixtures::PEOPLE_V4_METADATA).build(
            "http://host/svc.svc/People(1)?$select=Name",
            response(
                "application/json;odata.metadata=minimal",
                &[("OData-Version", "4.0")],
                fixtures::JSON_PERSON_V4,
            ),
        );
        assert_eq!(ctx.format, PayloadFormat::JsonLight);
        assert_eq!(ctx.payload_type, PayloadType::Entry);
        assert_eq!(ctx.version, ProtocolVersion::V4);
        assert_eq!(ctx.verbosity, MetadataVerbosity::Minimal);
        assert_eq!(ctx.type_name, None);
        assert_eq!(ctx.entity_type_name().as_deref(), Some("Demo.Person"));
        assert!(ctx.requires_metadata);
        assert!(ctx.projection);
        assert_eq!(ctx.read_link().as_deref(), Some("http://host/svc.svc/People(1)"));
    }

    #[test]
    fn plain_json_before_v4_is_verbose() {
        let ctx = builder(fixtures::PEOPLE_V3_METADATA).build(
            "http://host/svc.svc/People(1)",
            response(
                "application/json",
                &[("DataServiceVersion", "3.0")],
                r#"{"odata.metadata":"http://host/svc.svc/$metadata#People/@Element","Id":1,"Name":"Ann"}"#,
            ),
        );
        assert_eq!(ctx.format, PayloadFormat::JsonLight);
        assert_eq!(ctx.version, ProtocolVersion::V3);
        assert_eq!(ctx.verbosity, MetadataVerbosity::Verbose);
        assert!(!ctx.requires_metadata);
    }

    #[test]
    fn discriminators_pick_derived_types() {
        let ctx = builder(fixtures::PEOPLE_V4_METADATA).build(
            "http://host/svc.svc/People(3)",
            response(
                "application/json",
                &[],
                r##"{"@odata.type":"#Demo.Employee","Id":3,"Name":"Cy","Salary":10}"##,
            ),
        );
        assert_eq!(ctx.entity_type_name().as_deref(), Some("Demo.Employee"));

        let unknown = builder(fixtures::PEOPLE_V4_METADATA).build(
            "http://host/svc.svc/People(3)",
            response("application/json", &[], r##"{"@odata.type":"#Demo.Nobody","Id":3}"##),
        );
        assert_eq!(unknown.type_name.as_deref(), Some("Demo.Nobody"));
        assert_eq!(unknown.entity_type_name().as_deref(), Some("Demo.Person"));
    }

    #[test]
    fn feeds_take_the_discriminator_their_entries_share() {
        let feed = |body: &str| {
            builder(fixtures::PEOPLE_V4_METADATA).build(
                "http://host/svc.svc/People",
                response("application/json", &[("OData-Version", "4.0")], body),
            )
        };

        let employees = feed(
            r##"{"@odata.context":"http://host/svc.svc/$metadata#People","value":[
                {"@odata.type":"#Demo.Employee","Id":3,"Name":"Cy","Salary":10},
                {"@odata.type":"#Demo.Employee","Id":4,"Name":"Di","Salary":20}]}"##,
        );
        assert_eq!(employees.payload_type, PayloadType::Feed);
        assert_eq!(employees.type_name.as_deref(), Some("Demo.Employee"));
        assert_eq!(employees.entity_type_name().as_deref(), Some("Demo.Employee"));

        let mixed = feed(fixtures::JSON_FEED_PEOPLE_V4);
        assert_eq!(mixed.payload_type, PayloadType::Feed);
        assert_eq!(mixed.type_name, None);
        assert_eq!(mixed.entity_type_name().as_deref(), Some("Demo.Person"));
    }

    #[test]
    fn media_link_entries_follow_has_stream() {
        let ctx = builder(fixtures::PEOPLE_V4_METADATA).build(
            "http://host/svc.svc/Photos(1)",
            response("application/json", &[("OData-Version", "4.0")], r#"{"Id":1}"#),
        );
        assert_eq!(ctx.payload_type, PayloadType::Entry);
        assert!(ctx.media_link_entry);
    }

    #[test]
    fn malformed_payloads_have_no_type() {
        let ctx = builder(fixtures::PEOPLE_V4_METADATA).build(
            "http://host/svc.svc/People(1)",
            response("application/json", &[], r#"{"Id": 1,"#),
        );
        assert_eq!(ctx.payload_type, PayloadType::None);
        assert!(ctx.payload_error.as_deref().is_some_and(|e| e.contains("JSON")));
        assert!(ctx.json().is_none());
        assert_eq!(ctx.entity_type, None);
    }

    #[test]
    fn contexts_without_metadata() {
        let root = Url::parse(fixtures::SERVICE_ROOT).expect("root");
        let ctx = ContextBuilder::new(root)
            .metadata_error("timed out")
            .build(
                "http://host/svc.svc/People(1)/Friends",
                response("application/atom+xml", &[], fixtures::ATOM_FEED_PEOPLE),
            );
        assert!(ctx.model().is_none());
        assert_eq!(ctx.metadata_error(), Some("timed out"));
        assert_eq!(ctx.uri_kind(), UriKind::Unclassified);
        assert_eq!(ctx.payload_type, PayloadType::Feed);
        assert_eq!(ctx.version, ProtocolVersion::V1);
        assert_eq!(ctx.entity_type, None);
    }

    #[test]
    fn service_document_collections() {
        let ctx = builder(fixtures::PEOPLE_V4_METADATA).build(
            fixtures::SERVICE_ROOT,
            response("application/json", &[], fixtures::JSON_SERVICE_DOCUMENT_V4),
        );
        assert_eq!(ctx.payload_type, PayloadType::ServiceDocument);
        assert_eq!(
            ctx.collection_links(),
            vec!["http://host/svc.svc/People", "http://host/svc.svc/Photos"]
        );
    }

    #[test]
    fn refetch_builds_a_sibling_without_touching_the_original() {
        let uri = "http://host/svc.svc/People(1)";
        let fetcher = StaticFetcher::new().with(
            uri,
            response("application/atom+xml", &[], fixtures::ATOM_ENTRY_PERSON),
        );
        let ctx = builder(fixtures::PEOPLE_V3_METADATA)
            .transport(Arc::new(fetcher))
            .accept("application/json")
            .build(uri, response("application/json", &[], fixtures::JSON_PERSON_V4));
        assert!(ctx.is_online());

        let sibling = ctx
            .refetch_with("application/atom+xml", &[("MaxDataServiceVersion", "3.0")])
            .expect("refetch");
        assert_eq!(sibling.format, PayloadFormat::Atom);
        assert_eq!(ctx.format, PayloadFormat::JsonLight);
        assert!(sibling.model().is_some());

        let offline = builder(fixtures::PEOPLE_V3_METADATA)
            .offline()
            .build(uri, response("application/json", &[], fixtures::JSON_PERSON_V4));
        assert!(offline.is_offline());
        assert!(matches!(
            offline.refetch_with("application/atom+xml", &[]),
            Err(FetchError::Unavailable { .. })
        ));
    }
}
