//! Error payload rules.

use odata_edm::ProtocolVersion;
use serde_json::{json, Value};

use crate::context::{PayloadFormat, PayloadType, ServiceContext};
use crate::rules::{
    Applicability, Category, RequirementLevel, Rule, RuleDescriptor, RuleError, Verdict,
};
use crate::validators::check_json;

/// JSON error bodies carry a code and a message in the shape of their
/// dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonErrorShape;

impl JsonErrorShape {
    const DESCRIPTOR: RuleDescriptor = RuleDescriptor {
        id: "error/json-error-shape",
        category: Category::Error,
        description: "JSON error payloads carry code and message members of the dialect's shape",
        citations: &["[MS-ODATA] 2.2.8.1.2", "OData-JSON 19"],
        level: RequirementLevel::Must,
        applicability: Applicability {
            payload_types: &[PayloadType::Error],
            formats: &[PayloadFormat::JsonLight, PayloadFormat::JsonVerbose],
            ..Applicability::ANY
        },
    };

    fn schema(format: PayloadFormat, version: ProtocolVersion) -> Value {
        let localized = json!({
            "type": "object",
            "required": ["value"],
            "properties": {"lang": {"type": "string"}, "value": {"type": "string"}},
        });
        let (member, message) = match (format, version) {
            (PayloadFormat::JsonLight, ProtocolVersion::V4) => ("error", json!({"type": "string"})),
            (PayloadFormat::JsonLight, _) => ("odata.error", localized),
            _ => ("error", localized),
        };
        let mut body = json!({
            "type": "object",
            "required": ["code", "message"],
            "properties": {"code": {"type": "string"}, "message": message},
        });
        if version == ProtocolVersion::V4 {
            body["properties"]["target"] = json!({"type": "string"});
            body["properties"]["details"] = json!({"type": "array"});
        }
        let mut properties = serde_json::Map::new();
        properties.insert(member.to_string(), body);
        json!({"type": "object", "required": [member], "properties": properties})
    }
}

impl Rule for JsonErrorShape {
    fn descriptor(&self) -> &RuleDescriptor {
        &Self::DESCRIPTOR
    }

    fn verify(&self, ctx: &ServiceContext) -> Result<Verdict, RuleError> {
        check_json(ctx, &Self::schema(ctx.format, ctx.version), "error")
    }
}
