//! JSON entry rules.

use crate::context::{PayloadFormat, PayloadType, ServiceContext};
use crate::rules::{
    Applicability, Category, RequirementLevel, Rule, RuleDescriptor, RuleError, Verdict,
};
use crate::validators::{check_json, json_flavor};
use crate::verifiers::json_schema::JsonSchemaBuilder;

const JSON_ENTRY: Applicability = Applicability {
    payload_types: &[PayloadType::Entry],
    formats: &[PayloadFormat::JsonLight, PayloadFormat::JsonVerbose],
    requires_metadata: true,
    ..Applicability::ANY
};

/// Builder and entity type for a JSON entry, or why there are none.
fn prepare(ctx: &ServiceContext) -> Result<(JsonSchemaBuilder<'_>, odata_edm::EntityTypeId), Verdict> {
    let model = ctx
        .model()
        .ok_or_else(|| Verdict::not_applicable("metadata document unavailable"))?;
    let flavor = json_flavor(ctx).ok_or_else(|| Verdict::not_applicable("payload is not JSON"))?;
    let ty = ctx
        .entity_type
        .ok_or_else(|| Verdict::not_applicable("entity type of the entry is unknown"))?;
    Ok((JsonSchemaBuilder::new(model, flavor), ty))
}

/// The entry carries the declared properties of its type, correctly
/// typed, and nothing undeclared unless the type is open.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDeclaredProperties;

impl JsonDeclaredProperties {
    const DESCRIPTOR: RuleDescriptor = RuleDescriptor {
        id: "entry/json-declared-properties",
        category: Category::Entry,
        description: "JSON entries carry exactly the declared (or selected) properties with matching types",
        citations: &["[MS-ODATA] 2.2.6.3.3", "OData-JSON 6", "OData-JSON 7"],
        level: RequirementLevel::Must,
        applicability: JSON_ENTRY,
    };
}

impl Rule for JsonDeclaredProperties {
    fn descriptor(&self) -> &RuleDescriptor {
        &Self::DESCRIPTOR
    }

    fn verify(&self, ctx: &ServiceContext) -> Result<Verdict, RuleError> {
        let (builder, ty) = match prepare(ctx) {
            Ok(prepared) => prepared,
            Err(verdict) => return Ok(verdict),
        };
        let entity = match ctx.path.query.select() {
            None => builder.entity(ty),
            Some(Err(e)) => {
                return Ok(Verdict::not_applicable(format!("$select does not parse: {e}")))
            }
            Some(Ok(paths)) => {
                let selected: Vec<&str> = paths
                    .iter()
                    .filter_map(|path| path.first())
                    .map(String::as_str)
                    .collect();
                if selected.contains(&"*") {
                    builder.entity(ty)
                } else {
                    builder.entity_with(ty, &selected)
                }
            }
        };
        check_json(ctx, &builder.entry_document(entity), "entity")
    }
}

/// Navigation properties named in `$expand` are inlined with the shape
/// their multiplicity calls for, level by level.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExpandedNavigation;

impl JsonExpandedNavigation {
    const DESCRIPTOR: RuleDescriptor = RuleDescriptor {
        id: "entry/json-expanded-navigation",
        category: Category::Entry,
        description: "expanded navigation properties are inlined as arrays (to-many) or objects (to-one)",
        citations: &["[MS-ODATA] 2.2.6.3.9", "OData-JSON 8.3"],
        level: RequirementLevel::Must,
        applicability: Applicability {
            projection: Some(false),
            ..JSON_ENTRY
        },
    };
}

impl Rule for JsonExpandedNavigation {
    fn descriptor(&self) -> &RuleDescriptor {
        &Self::DESCRIPTOR
    }

    fn verify(&self, ctx: &ServiceContext) -> Result<Verdict, RuleError> {
        let tree = match ctx.path.query.expand() {
            None => return Ok(Verdict::not_applicable("request has no $expand")),
            Some(Err(e)) => {
                return Ok(Verdict::not_applicable(format!("$expand does not parse: {e}")))
            }
            Some(Ok(tree)) => tree,
        };
        let (builder, ty) = match prepare(ctx) {
            Ok(prepared) => prepared,
            Err(verdict) => return Ok(verdict),
        };
        let entity = match builder.expanded(ty, &tree) {
            Ok(schema) => schema,
            Err(e) => {
                return Ok(Verdict::not_applicable(format!("$expand does not resolve: {e}")))
            }
        };
        check_json(ctx, &builder.entry_document(entity), "expanded entity")
    }
}
