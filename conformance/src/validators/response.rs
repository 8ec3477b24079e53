//! Response-level rules: content type, protocol version header, and
//! whether the resource could be retrieved at all.
//!
//! These apply to every live exchange regardless of payload shape. Payloads
//! read from disk have no real headers, so the header rules skip them.

use odata_edm::ProtocolVersion;

use crate::context::{PayloadFormat, ServiceContext};
use crate::rules::{
    Applicability, Category, RequirementLevel, Rule, RuleDescriptor, RuleError, Verdict, Violation,
};

/// A response with a body declares its media type, and the body is
/// well-formed in that type.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentType;

impl ContentType {
    const DESCRIPTOR: RuleDescriptor = RuleDescriptor {
        id: "core/content-type",
        category: Category::Core,
        description: "responses with a body carry a Content-Type and a well-formed payload",
        citations: &["RFC 7231 3.1.1.5", "[MS-ODATA] 2.2.5.2", "OData-Protocol 8.1.1"],
        level: RequirementLevel::Must,
        applicability: Applicability {
            offline: Some(false),
            ..Applicability::ANY
        },
    };
}

impl Rule for ContentType {
    fn descriptor(&self) -> &RuleDescriptor {
        &Self::DESCRIPTOR
    }

    fn verify(&self, ctx: &ServiceContext) -> Result<Verdict, RuleError> {
        if ctx.body.trim().is_empty() {
            return Ok(Verdict::not_applicable("response has no body"));
        }
        if ctx.header("Content-Type").map_or(true, |v| v.trim().is_empty()) {
            return Ok(Verdict::Fail(
                Violation::new("response carries a body but no Content-Type header")
                    .at(ctx.uri.clone()),
            ));
        }
        Ok(match &ctx.payload_error {
            Some(error) => Verdict::Fail(Violation::new(error.clone()).at(ctx.uri.clone())),
            None => Verdict::Pass,
        })
    }
}

/// Every response names the protocol version it was produced under.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionHeader;

const VERSION_HEADERS: [&str; 2] = ["OData-Version", "DataServiceVersion"];

impl VersionHeader {
    const DESCRIPTOR: RuleDescriptor = RuleDescriptor {
        id: "core/version-header",
        category: Category::Core,
        description: "responses carry a recognizable OData-Version or DataServiceVersion header",
        citations: &["[MS-ODATA] 2.2.5.3", "OData-Protocol 8.1.5"],
        level: RequirementLevel::Must,
        applicability: Applicability {
            formats: &[
                PayloadFormat::Atom,
                PayloadFormat::Xml,
                PayloadFormat::JsonLight,
                PayloadFormat::JsonVerbose,
            ],
            offline: Some(false),
            ..Applicability::ANY
        },
    };
}

impl Rule for VersionHeader {
    fn descriptor(&self) -> &RuleDescriptor {
        &Self::DESCRIPTOR
    }

    fn verify(&self, ctx: &ServiceContext) -> Result<Verdict, RuleError> {
        let Some((name, value)) = VERSION_HEADERS
            .iter()
            .find_map(|name| ctx.header(name).map(|value| (*name, value)))
        else {
            return Ok(Verdict::Fail(
                Violation::new("response carries neither OData-Version nor DataServiceVersion")
                    .at(ctx.uri.clone()),
            ));
        };
        if ProtocolVersion::parse(value).is_none() {
            return Ok(Verdict::Fail(
                Violation::new(format!("{name} header value {value:?} is not a protocol version"))
                    .at(ctx.uri.clone()),
            ));
        }
        Ok(Verdict::Pass)
    }
}

/// The resource answered with a success status.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceRetrievable;

impl ResourceRetrievable {
    /// Also used for resources the crawl could not fetch at all.
    pub const DESCRIPTOR: RuleDescriptor = RuleDescriptor {
        id: "core/resource-retrievable",
        category: Category::Core,
        description: "addressable resources are retrievable with GET",
        citations: &["[MS-ODATA] 2.2.7.2", "OData-Protocol 11.2"],
        level: RequirementLevel::Must,
        applicability: Applicability::ANY,
    };
}

impl Rule for ResourceRetrievable {
    fn descriptor(&self) -> &RuleDescriptor {
        &Self::DESCRIPTOR
    }

    fn verify(&self, ctx: &ServiceContext) -> Result<Verdict, RuleError> {
        if (200..300).contains(&ctx.status) {
            Ok(Verdict::Pass)
        } else {
            Ok(Verdict::Fail(
                Violation::new(format!("GET returned status {}", ctx.status)).at(ctx.uri.clone()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures;
    use crate::validators::support;

    const URI: &str = "http://host/svc.svc/People(1)";

    #[test]
    fn content_type_is_required_with_a_body() {
        let ctx = support::context(None, URI, &[], fixtures::JSON_PERSON_V4);
        let violation = support::failure(support::run(&ContentType, &ctx));
        assert!(violation.message.contains("no Content-Type"));
        assert_eq!(violation.destination.as_deref(), Some(URI));

        let empty = support::context(None, URI, &[], "");
        assert!(matches!(
            support::run(&ContentType, &empty),
            Verdict::NotApplicable(_)
        ));

        let ok = support::context(
            None,
            URI,
            &[("Content-Type", "application/json")],
            fixtures::JSON_PERSON_V4,
        );
        assert_eq!(support::run(&ContentType, &ok), Verdict::Pass);
    }

    #[test]
    fn malformed_bodies_fail_the_content_type() {
        let ctx = support::context(None, URI, &[("Content-Type", "application/json")], r#"{"Id": "#);
        let violation = support::failure(support::run(&ContentType, &ctx));
        assert!(violation.message.contains("malformed JSON"));
    }

    #[test]
    fn version_header() {
        let missing = support::context(
            None,
            URI,
            &[("Content-Type", "application/json")],
            fixtures::JSON_PERSON_V4,
        );
        let violation = support::failure(support::run(&VersionHeader, &missing));
        assert!(violation.message.contains("neither"));

        let bogus = support::context(
            None,
            URI,
            &[("Content-Type", "application/json"), ("OData-Version", "five")],
            fixtures::JSON_PERSON_V4,
        );
        assert!(matches!(support::run(&VersionHeader, &bogus), Verdict::Fail(_)));

        for (name, value) in [("OData-Version", "4.0"), ("DataServiceVersion", "2.0;NetFx")] {
            let ctx = support::context(
                None,
                URI,
                &[("Content-Type", "application/json"), (name, value)],
                fixtures::JSON_PERSON_V4,
            );
            assert_eq!(support::run(&VersionHeader, &ctx), Verdict::Pass);
        }

        let raw = support::context(None, URI, &[("Content-Type", "text/plain")], "3");
        assert!(!support::applies(&VersionHeader, &raw));

        let offline = support::builder(None)
            .offline()
            .build(URI, support::response(200, &[], fixtures::JSON_PERSON_V4));
        assert!(!support::applies(&VersionHeader, &offline));
        assert!(!support::applies(&ContentType, &offline));
    }

    #[test]
    fn non_success_statuses_fail_retrieval() {
        let ctx = support::builder(None).build(
            URI,
            support::response(
                404,
                &[("Content-Type", "application/json")],
                fixtures::JSON_ERROR_V4,
            ),
        );
        let violation = support::failure(support::run(&ResourceRetrievable, &ctx));
        assert_eq!(violation.message, "GET returned status 404");
    }
}
