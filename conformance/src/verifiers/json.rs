//! JSON Schema evaluation with positional evidence.

use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, ValidationError};
use serde_json::Value;

use super::locate::{self, Span};
use super::{excerpt, Evidence, VerificationResult, VerifierError};

/// Evaluates JSON Schemas (draft 7) against JSON documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonVerifier;

impl JsonVerifier {
    /// Verifies `document` against `schema`.
    ///
    /// A document that is not valid JSON fails with the parser's position.
    /// Only the first schema violation is reported.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::InvalidSchema`] when `schema` does not
    /// compile.
    pub fn verify(&self, schema: &Value, document: &str) -> Result<VerificationResult, VerifierError> {
        let validator = jsonschema::options()
            .with_draft(Draft::Draft7)
            .build(schema)
            .map_err(|e| VerifierError::InvalidSchema(e.to_string()))?;

        let instance: Value = match serde_json::from_str(document) {
            Ok(value) => value,
            Err(e) => {
                let mut evidence = Evidence::message(format!("document is not valid JSON: {e}"))
                    .at_line(e.line());
                evidence.column = Some(e.column());
                return Ok(VerificationResult::Fail(evidence));
            }
        };

        let first = validator.iter_errors(&instance).next();
        Ok(match first {
            None => VerificationResult::Pass,
            Some(error) => VerificationResult::Fail(evidence_for(&error, schema, document)),
        })
    }
}

fn evidence_for(error: &ValidationError<'_>, schema: &Value, document: &str) -> Evidence {
    let pointer = error.instance_path().to_string();
    let tokens = locate::pointer_tokens(&pointer);
    let target = locate::find(document, &tokens);

    let (offset, fragment) = match (error.kind(), target) {
        (ValidationErrorKind::Required { property }, Some(object)) => {
            let missing = property.as_str().unwrap_or_default();
            let required = schema
                .pointer(&error.schema_path().to_string())
                .and_then(Value::as_array);
            let offset = missing_member_offset(document, object, missing, required);
            (Some(offset), document.get(object.start..object.end))
        }
        (_, Some(span)) => (Some(span.start), document.get(span.start..span.end)),
        (_, None) => (None, None),
    };

    let location = if pointer.is_empty() { "/" } else { pointer.as_str() };
    let mut evidence = Evidence::message(format!("{location}: {error}"));
    if let Some(offset) = offset {
        let (line, column) = locate::line_column(document, offset);
        evidence.line = Some(line);
        evidence.column = Some(column);
        evidence.offset = Some(offset);
    }
    evidence.fragment = fragment.map(excerpt);
    evidence
}

/// Where a missing member would have been: just after the nearest
/// preceding `required` member that is present, else just inside the brace.
fn missing_member_offset(
    document: &str,
    object: Span,
    missing: &str,
    required: Option<&Vec<Value>>,
) -> usize {
    let inside = object.start + 1;
    let Some(members) = locate::members(document, object.start) else {
        return inside;
    };
    let Some(required) = required else {
        return inside;
    };
    let names: Vec<&str> = required.iter().filter_map(Value::as_str).collect();
    let Some(index) = names.iter().position(|n| *n == missing) else {
        return inside;
    };
    names[..index]
        .iter()
        .rev()
        .find_map(|name| members.iter().find(|m| m.key == *name))
        .map_or(inside, |m| m.value.end)
}
