//! Service document rules.

use odata_edm::ProtocolVersion;
use serde_json::{json, Value};

use crate::context::{PayloadFormat, PayloadType, ServiceContext};
use crate::rules::{
    Applicability, Category, RequirementLevel, Rule, RuleDescriptor, RuleError, Verdict,
};
use crate::validators::check_json;

/// A JSON service document lists its collections in the shape of its
/// dialect: `d.EntitySets` (verbose), `value[]` of `name`/`url` (light),
/// plus a `kind` from a fixed set in 4.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonServiceDocument;

impl JsonServiceDocument {
    const DESCRIPTOR: RuleDescriptor = RuleDescriptor {
        id: "service/json-service-document",
        category: Category::Service,
        description: "JSON service documents list named collections with URLs",
        citations: &["[MS-ODATA] 2.2.6.3.12", "OData-JSON 5"],
        level: RequirementLevel::Must,
        applicability: Applicability {
            payload_types: &[PayloadType::ServiceDocument],
            formats: &[PayloadFormat::JsonLight, PayloadFormat::JsonVerbose],
            ..Applicability::ANY
        },
    };

    fn schema(format: PayloadFormat, version: ProtocolVersion) -> Value {
        if format == PayloadFormat::JsonVerbose {
            return json!({
                "type": "object",
                "required": ["d"],
                "properties": {"d": {
                    "type": "object",
                    "required": ["EntitySets"],
                    "properties": {"EntitySets": {"type": "array", "items": {"type": "string"}}},
                }},
            });
        }
        let mut item = json!({
            "type": "object",
            "required": ["name", "url"],
            "properties": {
                "name": {"type": "string", "minLength": 1},
                "url": {"type": "string", "minLength": 1},
            },
        });
        if version == ProtocolVersion::V4 {
            item["properties"]["kind"] =
                json!({"enum": ["EntitySet", "Singleton", "FunctionImport", "ServiceDocument"]});
            item["properties"]["title"] = json!({"type": "string"});
        }
        json!({
            "type": "object",
            "required": ["value"],
            "properties": {"value": {"type": "array", "items": item}},
        })
    }
}

impl Rule for JsonServiceDocument {
    fn descriptor(&self) -> &RuleDescriptor {
        &Self::DESCRIPTOR
    }

    fn verify(&self, ctx: &ServiceContext) -> Result<Verdict, RuleError> {
        check_json(ctx, &Self::schema(ctx.format, ctx.version), "service document")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures;
    use crate::validators::support;

    const V4: [(&str, &str); 2] = [("Content-Type", "application/json"), ("OData-Version", "4.0")];

    #[test]
    fn v4_service_document() {
        let ctx = support::context(None, fixtures::SERVICE_ROOT, &V4, fixtures::JSON_SERVICE_DOCUMENT_V4);
        assert_eq!(ctx.payload_type, PayloadType::ServiceDocument);
        assert_eq!(support::run(&JsonServiceDocument, &ctx), Verdict::Pass);

        let unknown_kind = fixtures::JSON_SERVICE_DOCUMENT_V4.replace("Singleton", "Table");
        let bad = support::context(None, fixtures::SERVICE_ROOT, &V4, &unknown_kind);
        let violation = support::failure(support::run(&JsonServiceDocument, &bad));
        assert!(violation.message.starts_with("service document: "));
    }

    #[test]
    fn missing_url_fails() {
        let body = r#"{"@odata.context":"http://host/svc.svc/$metadata","value":[{"name":"People"}]}"#;
        let ctx = support::context(None, fixtures::SERVICE_ROOT, &V4, body);
        let violation = support::failure(support::run(&JsonServiceDocument, &ctx));
        assert!(violation.message.contains("url"), "{}", violation.message);
    }

    #[test]
    fn verbose_service_document() {
        let ctx = support::context(
            None,
            fixtures::SERVICE_ROOT,
            &[("Content-Type", "application/json"), ("DataServiceVersion", "2.0")],
            r#"{"d":{"EntitySets":["People","Photos"]}}"#,
        );
        assert_eq!(ctx.payload_type, PayloadType::ServiceDocument);
        assert_eq!(support::run(&JsonServiceDocument, &ctx), Verdict::Pass);
    }
}
