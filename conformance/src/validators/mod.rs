//! Built-in conformance rules.
//!
//! Each submodule groups the rules of one [`Category`](crate::rules::Category).
//! A rule is a unit struct carrying a `const` [`RuleDescriptor`](crate::rules::RuleDescriptor); its
//! `verify` builds a grammar or JSON schema from the context and hands it to
//! a verifier.
//!
//! | Module | Checks |
//! |--------|--------|
//! | [`response`] | response headers and retrievability (category `core`) |
//! | [`entry`] | single entities, Atom and JSON |
//! | [`feed`] | Atom feed framing |
//! | [`link`] | entity references (`$links`, `$ref`) |
//! | [`metadata`] | navigation resolution in CSDL |
//! | [`service`] | JSON service documents |
//! | [`error`] | JSON error payloads |

pub mod entry;
pub mod error;
pub mod feed;
pub mod link;
pub mod metadata;
pub mod response;
pub mod service;

use odata_edm::ProtocolVersion;
use serde_json::Value;

use crate::context::{PayloadFormat, ServiceContext};
use crate::rules::{Rule, RuleError, Verdict};
use crate::verifiers::grammar::{Grammar, NameClass, Pattern, ValuePattern};
use crate::verifiers::json_schema::JsonFlavor;
use crate::verifiers::{JsonVerifier, TreeVerifier};

/// Every built-in rule, in reporting order.
#[must_use]
pub fn builtin_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(response::ContentType),
        Box::new(response::VersionHeader),
        Box::new(response::ResourceRetrievable),
        Box::new(entry::AtomCategoryTerm),
        Box::new(entry::AtomDeclaredProperties),
        Box::new(entry::JsonDeclaredProperties),
        Box::new(entry::JsonExpandedNavigation),
        Box::new(entry::EtagConsistency),
        Box::new(entry::ReadLinkDereferenceable),
        Box::new(feed::AtomIdTitle),
        Box::new(link::ReferenceShape),
        Box::new(metadata::NavigationResolves),
        Box::new(service::JsonServiceDocument),
        Box::new(error::JsonErrorShape),
    ]
}

/// JSON dialect of a JSON context, `None` otherwise.
pub(crate) fn json_flavor(ctx: &ServiceContext) -> Option<JsonFlavor> {
    match ctx.format {
        PayloadFormat::JsonVerbose => Some(JsonFlavor::Verbose {
            results_wrapped: ctx.version >= ProtocolVersion::V2,
        }),
        PayloadFormat::JsonLight if ctx.version == ProtocolVersion::V4 => Some(JsonFlavor::V4),
        PayloadFormat::JsonLight => Some(JsonFlavor::Light),
        _ => None,
    }
}

/// Checks the context body against a JSON schema.
pub(crate) fn check_json(
    ctx: &ServiceContext,
    schema: &Value,
    context: &str,
) -> Result<Verdict, RuleError> {
    let result = JsonVerifier.verify(schema, &ctx.body)?;
    Ok(located(Verdict::from_verification(result, context), ctx))
}

/// Checks the context body against a grammar.
pub(crate) fn check_xml(
    ctx: &ServiceContext,
    grammar: &Grammar,
    context: &str,
) -> Result<Verdict, RuleError> {
    let result = TreeVerifier.verify(grammar, &ctx.body)?;
    Ok(located(Verdict::from_verification(result, context), ctx))
}

fn located(verdict: Verdict, ctx: &ServiceContext) -> Verdict {
    match verdict {
        Verdict::Fail(violation) if violation.destination.is_none() => {
            Verdict::Fail(violation.at(ctx.uri.clone()))
        }
        other => other,
    }
}

/// Attributes, text and elements, except the attributes in `names`.
pub(crate) fn content_except_attributes(names: impl IntoIterator<Item = NameClass>) -> Pattern {
    Pattern::zero_or_more(Pattern::choice([
        attributes_except_one(names),
        Pattern::Text,
        Pattern::any_element(),
    ]))
}

/// Any number of attributes, none of them named in `names`.
pub(crate) fn attributes_except(names: impl IntoIterator<Item = NameClass>) -> Pattern {
    Pattern::zero_or_more(attributes_except_one(names))
}

fn attributes_except_one(names: impl IntoIterator<Item = NameClass>) -> Pattern {
    Pattern::attribute(NameClass::any_except(names), ValuePattern::Any)
}

#[cfg(test)]
pub(crate) mod support {
    //! Context construction for rule tests.

    use std::sync::Arc;

    use url::Url;

    use crate::context::{ContextBuilder, MetadataDocument, ServiceContext};
    use crate::fetch::{HeaderList, HttpResponse};
    use crate::rules::{Rule, Verdict};
    use crate::tests::fixtures;

    pub fn builder(metadata: Option<&str>) -> ContextBuilder {
        let root = Url::parse(fixtures::SERVICE_ROOT).expect("root");
        let builder = ContextBuilder::new(root);
        match metadata {
            Some(text) => builder.metadata(Arc::new(MetadataDocument::parse(text).expect("metadata"))),
            None => builder,
        }
    }

    pub fn response(status: u16, headers: &[(&str, &str)], body: &str) -> HttpResponse {
        let list: HeaderList = headers.iter().copied().collect();
        HttpResponse::new(status, list, body)
    }

    pub fn context(
        metadata: Option<&str>,
        uri: &str,
        headers: &[(&str, &str)],
        body: &str,
    ) -> ServiceContext {
        builder(metadata).build(uri, response(200, headers, body))
    }

    /// Runs `rule` the way the dispatcher would, applicability first.
    pub fn run(rule: &dyn Rule, ctx: &ServiceContext) -> Verdict {
        if let Err(reason) = rule.descriptor().applicability.check(ctx) {
            return Verdict::not_applicable(reason.to_string());
        }
        rule.verify(ctx).expect("rule error")
    }

    pub fn applies(rule: &dyn Rule, ctx: &ServiceContext) -> bool {
        rule.descriptor().applicability.matches(ctx)
    }

    pub fn failure(verdict: Verdict) -> crate::rules::Violation {
        match verdict {
            Verdict::Fail(violation) => violation,
            other => panic!("expected a failure, got {other:?}"),
        }
    }
}
