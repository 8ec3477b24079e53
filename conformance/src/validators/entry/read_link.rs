//! Read links resolve to retrievable resources.

use tracing::debug;

use crate::context::{PayloadFormat, PayloadType, ServiceContext};
use crate::rules::{
    Applicability, Category, RequirementLevel, Rule, RuleDescriptor, RuleError, Verdict, Violation,
};

/// The read link of an entry (the first entry of a feed) can be fetched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadLinkDereferenceable;

impl ReadLinkDereferenceable {
    const DESCRIPTOR: RuleDescriptor = RuleDescriptor {
        id: "entry/read-link-dereferenceable",
        category: Category::Entry,
        description: "the entry's edit, self or id link answers GET with a success status",
        citations: &["[MS-ODATA] 2.2.6.2.2", "OData-JSON 4.5.8", "OData-Protocol 4.1"],
        level: RequirementLevel::Should,
        applicability: Applicability {
            payload_types: &[PayloadType::Entry, PayloadType::Feed],
            formats: &[
                PayloadFormat::Atom,
                PayloadFormat::JsonLight,
                PayloadFormat::JsonVerbose,
            ],
            requires_online: true,
            ..Applicability::ANY
        },
    };
}

impl Rule for ReadLinkDereferenceable {
    fn descriptor(&self) -> &RuleDescriptor {
        &Self::DESCRIPTOR
    }

    fn verify(&self, ctx: &ServiceContext) -> Result<Verdict, RuleError> {
        let Some(link) = ctx.read_link() else {
            return Ok(Verdict::not_applicable("entry exposes no read link"));
        };
        debug!(uri = %ctx.uri, link = %link, "dereferencing read link");
        Ok(match ctx.fetch(&ctx.request(link.clone())) {
            Err(e) => Verdict::Fail(Violation::new(e.to_string()).at(link)),
            Ok(response) if !response.is_success() => Verdict::Fail(
                Violation::new(format!("read link answered with status {}", response.status))
                    .at(link),
            ),
            Ok(_) => Verdict::Pass,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fetch::StaticFetcher;
    use crate::tests::fixtures;
    use crate::validators::support;

    const ATOM: [(&str, &str); 1] = [("Content-Type", "application/atom+xml;type=entry")];

    fn online(fetcher: StaticFetcher) -> ServiceContext {
        support::builder(Some(fixtures::PEOPLE_V3_METADATA))
            .transport(Arc::new(fetcher))
            .build(
                "http://host/svc.svc/People(1)",
                support::response(200, &ATOM, fixtures::ATOM_ENTRY_PERSON),
            )
    }

    #[test]
    fn retrievable_read_link_passes() {
        let fetcher = StaticFetcher::new().with(
            "http://host/svc.svc/People(1)",
            support::response(200, &ATOM, fixtures::ATOM_ENTRY_PERSON),
        );
        assert_eq!(support::run(&ReadLinkDereferenceable, &online(fetcher)), Verdict::Pass);
    }

    #[test]
    fn unreachable_read_link_fails() {
        let violation = support::failure(support::run(
            &ReadLinkDereferenceable,
            &online(StaticFetcher::new()),
        ));
        assert!(violation.message.contains("could not retrieve resource"));
        assert_eq!(violation.destination.as_deref(), Some("http://host/svc.svc/People(1)"));

        let gone = StaticFetcher::new().with(
            "http://host/svc.svc/People(1)",
            support::response(410, &[], ""),
        );
        let violation = support::failure(support::run(&ReadLinkDereferenceable, &online(gone)));
        assert!(violation.message.contains("410"));
    }

    #[test]
    fn offline_contexts_are_skipped() {
        let ctx = support::context(
            Some(fixtures::PEOPLE_V3_METADATA),
            "http://host/svc.svc/People(1)",
            &ATOM,
            fixtures::ATOM_ENTRY_PERSON,
        );
        assert!(!support::applies(&ReadLinkDereferenceable, &ctx));
    }
}
