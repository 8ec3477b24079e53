//! Feed rules.
//!
//! An Atom feed is framed by exactly one `atom:id` with a non-empty IRI
//! and exactly one `atom:title`; entries, links and extension elements may
//! appear around them in any order.

use crate::context::{PayloadFormat, PayloadType, ServiceContext};
use crate::rules::{
    Applicability, Category, RequirementLevel, Rule, RuleDescriptor, RuleError, Verdict,
};
use crate::validators::check_xml;
use crate::verifiers::grammar::{Grammar, NameClass, Pattern, ValuePattern};
use crate::xmlns;

/// `atom:feed` carries `atom:id` and `atom:title`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomIdTitle;

impl AtomIdTitle {
    const DESCRIPTOR: RuleDescriptor = RuleDescriptor {
        id: "feed/atom-id-title",
        category: Category::Feed,
        description: "atom:feed contains exactly one atom:id and one atom:title",
        citations: &["RFC 4287 4.1.1", "[MS-ODATA] 2.2.6.2.1"],
        level: RequirementLevel::Must,
        applicability: Applicability {
            payload_types: &[PayloadType::Feed],
            formats: &[PayloadFormat::Atom],
            ..Applicability::ANY
        },
    };

    fn grammar() -> Grammar {
        let atom = |local: &str| NameClass::qualified(xmlns::ATOM, local);
        Grammar::new(Pattern::element(
            atom("feed"),
            Pattern::interleave([
                Pattern::any_attributes(),
                Pattern::element(
                    atom("id"),
                    Pattern::interleave([
                        Pattern::any_attributes(),
                        Pattern::Value(ValuePattern::NonEmpty),
                    ]),
                ),
                Pattern::element(atom("title"), Pattern::any_content()),
                Pattern::zero_or_more(Pattern::any_element_except([atom("id"), atom("title")])),
            ]),
        ))
        .namespace("atom", xmlns::ATOM)
        .with_standard_library()
    }
}

impl Rule for AtomIdTitle {
    fn descriptor(&self) -> &RuleDescriptor {
        &Self::DESCRIPTOR
    }

    fn verify(&self, ctx: &ServiceContext) -> Result<Verdict, RuleError> {
        check_xml(ctx, &Self::grammar(), "feed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures;
    use crate::validators::support;

    fn feed(body: &str) -> ServiceContext {
        support::context(
            None,
            "http://host/svc.svc/People",
            &[("Content-Type", "application/atom+xml;type=feed")],
            body,
        )
    }

    #[test]
    fn framed_feed_passes() {
        assert_eq!(support::run(&AtomIdTitle, &feed(fixtures::ATOM_FEED_PEOPLE)), Verdict::Pass);
    }

    #[test]
    fn missing_title_points_at_the_feed() {
        let violation = support::failure(support::run(&AtomIdTitle, &feed(fixtures::ATOM_FEED_NO_TITLE)));
        assert_eq!(violation.line, Some(2));
        assert!(violation.message.starts_with("feed: "));
        assert!(violation.message.contains("missing required content"));
    }

    #[test]
    fn empty_id_and_duplicate_title_fail() {
        let empty_id = fixtures::ATOM_FEED_PEOPLE.replace(
            "<id>http://host/svc.svc/People</id>",
            "<id></id>",
        );
        assert!(matches!(support::run(&AtomIdTitle, &feed(&empty_id)), Verdict::Fail(_)));

        let twice = fixtures::ATOM_FEED_PEOPLE.replace(
            r#"<title type="text">People</title>"#,
            r#"<title type="text">People</title><title>Again</title>"#,
        );
        let violation = support::failure(support::run(&AtomIdTitle, &feed(&twice)));
        assert_eq!(violation.line, Some(4));
    }
}
