//! ETag header and payload agreement.

use odata_edm::MetadataModel;

use crate::context::{PayloadFormat, PayloadType, ServiceContext};
use crate::rules::{
    Applicability, Category, RequirementLevel, Rule, RuleDescriptor, RuleError, Verdict,
};
use crate::validators::{check_json, check_xml, content_except_attributes, json_flavor};
use crate::verifiers::grammar::{Grammar, NameClass, Pattern};
use crate::verifiers::json_schema::JsonSchemaBuilder;
use crate::xmlns;

/// When an entry response carries an `ETag` header, the entry itself
/// carries the same value (`m:etag`, `@odata.etag`, `odata.etag` or
/// `__metadata.etag`).
#[derive(Debug, Clone, Copy, Default)]
pub struct EtagConsistency;

impl EtagConsistency {
    const DESCRIPTOR: RuleDescriptor = RuleDescriptor {
        id: "entry/etag-consistency",
        category: Category::Entry,
        description: "the ETag response header matches the entry's ETag annotation",
        citations: &["[MS-ODATA] 2.2.5.4", "OData-JSON 4.5.10", "OData-Atom 6"],
        level: RequirementLevel::Must,
        applicability: Applicability {
            payload_types: &[PayloadType::Entry],
            formats: &[
                PayloadFormat::Atom,
                PayloadFormat::JsonLight,
                PayloadFormat::JsonVerbose,
            ],
            ..Applicability::ANY
        },
    };
}

impl Rule for EtagConsistency {
    fn descriptor(&self) -> &RuleDescriptor {
        &Self::DESCRIPTOR
    }

    fn verify(&self, ctx: &ServiceContext) -> Result<Verdict, RuleError> {
        let Some(etag) = ctx.header("ETag").map(str::trim) else {
            return Ok(Verdict::not_applicable("response has no ETag header"));
        };
        if let Some(flavor) = json_flavor(ctx) {
            let empty = MetadataModel::default();
            let builder = JsonSchemaBuilder::new(ctx.model().unwrap_or(&empty), flavor);
            return check_json(ctx, &builder.etag(etag), "entity ETag");
        }

        let attribute = NameClass::qualified(xmlns::metadata(ctx.version), "etag");
        let grammar = Grammar::new(Pattern::element(
            NameClass::qualified(xmlns::ATOM, "entry"),
            Pattern::interleave([
                Pattern::attribute_equals(attribute.clone(), etag),
                content_except_attributes([attribute]),
            ]),
        ))
        .with_standard_library();
        check_xml(ctx, &grammar, "entry ETag")
    }
}
