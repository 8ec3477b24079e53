//! Entity reference rules (`$links` in V1–V3, `$ref` in V4).

use odata_edm::{MetadataModel, ProtocolVersion};

use crate::context::{PayloadFormat, PayloadType, ServiceContext};
use crate::rules::{
    Applicability, Category, RequirementLevel, Rule, RuleDescriptor, RuleError, Verdict,
};
use crate::validators::{check_json, check_xml, json_flavor};
use crate::verifiers::grammar::{Grammar, NameClass, Pattern, ValuePattern};
use crate::verifiers::json_schema::JsonSchemaBuilder;
use crate::xmlns;

/// Reference payloads hold one non-empty URI per referenced entity.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceShape;

impl ReferenceShape {
    const DESCRIPTOR: RuleDescriptor = RuleDescriptor {
        id: "link/reference-shape",
        category: Category::Link,
        description: "entity reference payloads hold a non-empty URI per referenced entity",
        citations: &["[MS-ODATA] 2.2.6.5", "[MS-ODATA] 2.2.6.3.10", "OData-JSON 14"],
        level: RequirementLevel::Must,
        applicability: Applicability {
            payload_types: &[PayloadType::Link, PayloadType::Links],
            formats: &[
                PayloadFormat::Xml,
                PayloadFormat::JsonLight,
                PayloadFormat::JsonVerbose,
            ],
            ..Applicability::ANY
        },
    };

    fn xml_grammar() -> Grammar {
        let data = |local: &str| NameClass::qualified(xmlns::DATA_V3, local);
        let uri = Pattern::element(
            data("uri"),
            Pattern::interleave([
                Pattern::any_attributes(),
                Pattern::Value(ValuePattern::NonEmpty),
            ]),
        );
        let links = Pattern::element(
            data("links"),
            Pattern::interleave([
                Pattern::any_attributes(),
                Pattern::zero_or_more(uri.clone()),
                Pattern::optional(Pattern::element(
                    NameClass::qualified(xmlns::METADATA_V3, "count"),
                    Pattern::Text,
                )),
                Pattern::optional(Pattern::element(data("next"), Pattern::Text)),
            ]),
        );
        Grammar::new(Pattern::choice([links, uri]))
            .namespace("d", xmlns::DATA_V3)
            .namespace("m", xmlns::METADATA_V3)
            .with_standard_library()
    }
}

impl Rule for ReferenceShape {
    fn descriptor(&self) -> &RuleDescriptor {
        &Self::DESCRIPTOR
    }

    fn verify(&self, ctx: &ServiceContext) -> Result<Verdict, RuleError> {
        let collection = ctx.payload_type == PayloadType::Links;
        if let Some(flavor) = json_flavor(ctx) {
            let empty = MetadataModel::default();
            let builder = JsonSchemaBuilder::new(ctx.model().unwrap_or(&empty), flavor);
            return check_json(ctx, &builder.reference(collection), "reference");
        }
        if ctx.version == ProtocolVersion::V4 {
            return Ok(Verdict::not_applicable("4.0 references are JSON or Atom only"));
        }
        check_xml(ctx, &Self::xml_grammar(), "reference")
    }
}
