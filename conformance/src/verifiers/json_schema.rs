//! JSON Schema construction from metadata.
//!
//! [`JsonSchemaBuilder`] emits draft 7 schemas for the JSON dialects the
//! protocol has used over its versions. Schemas are plain
//! `serde_json::Value`s so rules can combine or extend them before handing
//! them to [`super::JsonVerifier`].

use odata_edm::{element_type, EdmError, EntityTypeId, ExpandTree, MetadataModel, Multiplicity, Property};
use serde_json::{json, Map, Value};

/// JSON dialect of the payload being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonFlavor {
    /// V4 JSON: `@odata.*` annotations, bare arrays for collections.
    V4,
    /// V3 JSON light: `odata.*` annotations.
    Light,
    /// V1–V3 verbose JSON: `d` wrapper and `__metadata`. `results_wrapped`
    /// is true from V2 on, where collections are `{"results": [...]}`.
    Verbose {
        /// Collections wrapped in `results`.
        results_wrapped: bool,
    },
}

impl JsonFlavor {
    fn annotation(self, term: &str) -> String {
        match self {
            Self::V4 => format!("@odata.{term}"),
            Self::Light | Self::Verbose { .. } => format!("odata.{term}"),
        }
    }
}

/// Builds schemas for entities, expansions, ETags and references.
#[derive(Debug, Clone, Copy)]
pub struct JsonSchemaBuilder<'m> {
    model: &'m MetadataModel,
    flavor: JsonFlavor,
}

/// Resolved expand paths regrouped by first segment, so `A/B,A/C` become
/// one `A` branch with two children.
#[derive(Debug, Default)]
struct Branches(Vec<(String, Branches)>);

impl Branches {
    fn child(&mut self, name: &str) -> &mut Self {
        let index = match self.0.iter().position(|(n, _)| n == name) {
            Some(index) => index,
            None => {
                self.0.push((name.to_string(), Self::default()));
                self.0.len() - 1
            }
        };
        &mut self.0[index].1
    }
}

impl<'m> JsonSchemaBuilder<'m> {
    /// Builder for `flavor` over `model`.
    #[must_use]
    pub fn new(model: &'m MetadataModel, flavor: JsonFlavor) -> Self {
        Self { model, flavor }
    }

    /// Dialect in use.
    #[must_use]
    pub fn flavor(&self) -> JsonFlavor {
        self.flavor
    }

    /// Schema for one entity of `ty`: every declared property (inherited
    /// included) is required with a type matching its EDM type. Unless the
    /// type is open, members other than declared properties, navigation
    /// properties and annotations are rejected.
    #[must_use]
    pub fn entity(&self, ty: EntityTypeId) -> Value {
        let properties = self.model.declared_properties(ty, true);
        let names: Vec<&str> = properties.iter().map(|p| p.name.as_str()).collect();
        self.entity_with(ty, &names)
    }

    /// Entity schema restricted to `selected` properties (a projection).
    #[must_use]
    pub fn entity_with(&self, ty: EntityTypeId, selected: &[&str]) -> Value {
        let mut props = Map::new();
        let mut required = Vec::new();
        for property in self.model.declared_properties(ty, true) {
            if !selected.contains(&property.name.as_str()) {
                continue;
            }
            props.insert(property.name.clone(), self.property(property));
            required.push(Value::String(property.name.clone()));
        }
        if matches!(self.flavor, JsonFlavor::Verbose { .. }) {
            props.insert(
                "__metadata".to_string(),
                json!({"type": "object", "properties": {"uri": {"type": "string"}, "type": {"type": "string"}}}),
            );
            for nav in self.model.navigation_properties(ty, true) {
                props.insert(
                    nav.name.clone(),
                    json!({"anyOf": [
                        {"type": "object", "required": ["__deferred"], "properties": {"__deferred": {"type": "object", "required": ["uri"]}}},
                        {"type": ["object", "array", "null"]}
                    ]}),
                );
            }
        } else {
            for nav in self.model.navigation_properties(ty, true) {
                props
                    .entry(nav.name.clone())
                    .or_insert_with(|| json!({"type": ["object", "array", "null"]}));
            }
        }

        let mut schema = json!({
            "type": "object",
            "required": required,
            "properties": props,
        });
        if !self.model.entity_type(ty).open_type {
            schema["patternProperties"] = json!({"[@.]": {}});
            schema["additionalProperties"] = Value::Bool(false);
        }
        schema
    }

    /// Entity schema with the navigation properties of `tree` expanded
    /// inline: arrays for to-many, objects (or `null` when optional) for
    /// to-one, nested per level.
    ///
    /// # Errors
    ///
    /// Fails when a path segment is not a navigation property of the type
    /// reached so far, or when a navigation end cannot be resolved.
    pub fn expanded(&self, ty: EntityTypeId, tree: &ExpandTree) -> Result<Value, EdmError> {
        let mut branches = Branches::default();
        for stack in self.model.resolve_expand(ty, tree)? {
            let mut node = &mut branches;
            for name in stack.names() {
                node = node.child(name);
            }
        }
        self.expanded_branches(ty, &branches)
    }

    fn expanded_branches(&self, ty: EntityTypeId, branches: &Branches) -> Result<Value, EdmError> {
        let mut schema = self.entity(ty);
        for (name, sub) in &branches.0 {
            let end = self.model.navigation_end(ty, name)?;
            let target = self.expanded_branches(end.target, sub)?;
            let member = match (end.multiplicity, self.flavor) {
                (Multiplicity::Many, JsonFlavor::Verbose { results_wrapped: true }) => json!({
                    "type": "object",
                    "required": ["results"],
                    "properties": {"results": {"type": "array", "items": target}},
                }),
                (Multiplicity::Many, _) => json!({"type": "array", "items": target}),
                (Multiplicity::One, _) => target,
                (Multiplicity::ZeroOrOne, _) => json!({"anyOf": [target, {"type": "null"}]}),
            };
            schema["properties"][name.as_str()] = member;
            if let Some(required) = schema["required"].as_array_mut() {
                required.push(Value::String(name.clone()));
            }
        }
        Ok(schema)
    }

    /// Wraps an entry schema the way the dialect frames a single entity.
    #[must_use]
    pub fn entry_document(&self, entity: Value) -> Value {
        match self.flavor {
            JsonFlavor::Verbose { .. } => json!({
                "type": "object",
                "required": ["d"],
                "properties": {"d": entity},
            }),
            JsonFlavor::V4 | JsonFlavor::Light => entity,
        }
    }

    /// Wraps an entry schema the way the dialect frames a collection.
    #[must_use]
    pub fn feed_document(&self, entity: Value) -> Value {
        let array = json!({"type": "array", "items": entity});
        match self.flavor {
            JsonFlavor::Verbose {
                results_wrapped: true,
            } => json!({
                "type": "object",
                "required": ["d"],
                "properties": {"d": {"type": "object", "required": ["results"], "properties": {"results": array}}},
            }),
            JsonFlavor::Verbose {
                results_wrapped: false,
            } => json!({"type": "object", "required": ["d"], "properties": {"d": array}}),
            JsonFlavor::V4 | JsonFlavor::Light => json!({
                "type": "object",
                "required": ["value"],
                "properties": {"value": array},
            }),
        }
    }

    /// Schema pinning the entry's ETag annotation to `etag`.
    #[must_use]
    pub fn etag(&self, etag: &str) -> Value {
        match self.flavor {
            JsonFlavor::Verbose { .. } => self.entry_document(json!({
                "type": "object",
                "required": ["__metadata"],
                "properties": {"__metadata": {
                    "type": "object",
                    "required": ["etag"],
                    "properties": {"etag": {"enum": [etag]}},
                }},
            })),
            JsonFlavor::V4 | JsonFlavor::Light => {
                let name = self.flavor.annotation("etag");
                let mut props = Map::new();
                props.insert(name.clone(), json!({"enum": [etag]}));
                json!({"type": "object", "required": [name], "properties": props})
            }
        }
    }

    /// Schema for an entity reference payload (`$ref` / `$links`), single
    /// or collection.
    #[must_use]
    pub fn reference(&self, collection: bool) -> Value {
        let member = match self.flavor {
            JsonFlavor::V4 => "@odata.id",
            JsonFlavor::Light => "url",
            JsonFlavor::Verbose { .. } => "uri",
        };
        let mut props = Map::new();
        props.insert(member.to_string(), json!({"type": "string", "minLength": 1}));
        let single = json!({"type": "object", "required": [member], "properties": props});
        match (collection, self.flavor) {
            (false, JsonFlavor::Verbose { .. }) => self.entry_document(single),
            (false, _) => single,
            (true, _) => self.feed_document(single),
        }
    }

    /// Schema for one property value, by EDM type.
    fn property(&self, property: &Property) -> Value {
        let mut schema = if property.is_collection() {
            let item = self.type_schema(element_type(&property.type_name));
            match self.flavor {
                JsonFlavor::Verbose {
                    results_wrapped: true,
                } => json!({"anyOf": [
                    {"type": "array", "items": item},
                    {"type": "object", "required": ["results"], "properties": {"results": {"type": "array", "items": item}}}
                ]}),
                _ => json!({"type": "array", "items": item}),
            }
        } else {
            self.type_schema(&property.type_name)
        };
        if property.nullable {
            schema = json!({"anyOf": [schema, {"type": "null"}]});
        }
        schema
    }

    fn type_schema(&self, type_name: &str) -> Value {
        let verbose = matches!(self.flavor, JsonFlavor::Verbose { .. });
        match type_name {
            "Edm.Int16" | "Edm.Int32" | "Edm.Byte" | "Edm.SByte" => json!({"type": "integer"}),
            // 64-bit and decimal values may be serialized as strings.
            "Edm.Int64" | "Edm.Decimal" => json!({"type": ["integer", "number", "string"]}),
            "Edm.Double" | "Edm.Single" => json!({"type": ["number", "string"]}),
            "Edm.Boolean" => json!({"type": "boolean"}),
            "Edm.String" | "Edm.Guid" | "Edm.DateTime" | "Edm.DateTimeOffset" | "Edm.Date"
            | "Edm.TimeOfDay" | "Edm.Time" | "Edm.Duration" | "Edm.Binary" => {
                json!({"type": "string"})
            }
            other => match self.model.resolve_complex_type(other) {
                Some(complex) => {
                    let mut props = Map::new();
                    for p in self.model.complex_properties(complex) {
                        props.insert(p.name.clone(), self.property(p));
                    }
                    if verbose {
                        props.insert("__metadata".to_string(), json!({"type": "object"}));
                    }
                    json!({"type": "object", "properties": props})
                }
                // Enums, spatial and type definitions: shape not checked.
                None => json!({}),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures;
    use crate::verifiers::{JsonVerifier, VerificationResult};

    fn v4() -> MetadataModel {
        MetadataModel::parse(fixtures::PEOPLE_V4_METADATA).expect("metadata")
    }

    fn v3() -> MetadataModel {
        MetadataModel::parse(fixtures::PEOPLE_V3_METADATA).expect("metadata")
    }

    fn check(schema: &Value, doc: &str) -> VerificationResult {
        JsonVerifier.verify(schema, doc).expect("schema compiles")
    }

    #[test]
    fn entity_schema_requires_declared_properties() {
        let model = v4();
        let person = model.resolve_entity_type("Demo.Person").expect("type");
        let schema = JsonSchemaBuilder::new(&model, JsonFlavor::V4).entity(person);
        assert_eq!(schema["required"], json!(["Id", "Name"]));
        assert!(check(&schema, fixtures::JSON_PERSON_V4).is_pass());
        assert!(!check(&schema, fixtures::JSON_PERSON_MISSING_NAME_V4).is_pass());
        let undeclared = check(&schema, fixtures::JSON_PERSON_UNDECLARED_V4);
        assert!(undeclared.evidence().expect("failure").message.contains("Nickname"));
    }

    #[test]
    fn derived_types_include_inherited_properties() {
        let model = v4();
        let employee = model.resolve_entity_type("Demo.Employee").expect("type");
        let schema = JsonSchemaBuilder::new(&model, JsonFlavor::V4).entity(employee);
        assert_eq!(schema["required"], json!(["Id", "Name", "Salary"]));
        assert!(check(&schema, r#"{"Id":3,"Name":"Cy","Salary":"10.5"}"#).is_pass());
        assert!(check(&schema, r#"{"Id":3,"Name":"Cy","Salary":null}"#).is_pass());
    }

    #[test]
    fn expanded_schema_mirrors_multiplicity() {
        let model = v4();
        let person = model.resolve_entity_type("Person").expect("type");
        let builder = JsonSchemaBuilder::new(&model, JsonFlavor::V4);
        let tree = ExpandTree::parse("Friends,BestFriend").expect("expand");
        let schema = builder.expanded(person, &tree).expect("schema");
        assert_eq!(schema["properties"]["Friends"]["type"], "array");
        assert!(check(&schema, fixtures::JSON_PERSON_EXPANDED_V4).is_pass());

        let to_one_as_array = r#"{"Id":1,"Name":"Ann","Friends":[],"BestFriend":[]}"#;
        assert!(!check(&schema, to_one_as_array).is_pass());
        let null_best_friend = r#"{"Id":1,"Name":"Ann","Friends":[],"BestFriend":null}"#;
        assert!(check(&schema, null_best_friend).is_pass());

        let nested = ExpandTree::parse("Friends($expand=Friends),Friends/BestFriend").expect("expand");
        let schema = builder.expanded(person, &nested).expect("schema");
        let friend = &schema["properties"]["Friends"]["items"];
        assert_eq!(friend["required"], json!(["Id", "Name", "Friends", "BestFriend"]));

        let unknown = ExpandTree::parse("Enemies").expect("expand");
        assert!(builder.expanded(person, &unknown).is_err());
    }

    #[test]
    fn verbose_collections_are_wrapped_in_results() {
        let model = v3();
        let person = model.resolve_entity_type("Person").expect("type");
        let builder = JsonSchemaBuilder::new(&model, JsonFlavor::Verbose { results_wrapped: true });
        let tree = ExpandTree::parse("Friends").expect("expand");
        let schema = builder.expanded(person, &tree).expect("schema");
        assert_eq!(schema["properties"]["Friends"]["required"], json!(["results"]));

        let entry = builder.entry_document(builder.entity(person));
        assert!(check(&entry, fixtures::JSON_PERSON_VERBOSE_V2).is_pass());
    }

    #[test]
    fn etag_and_reference_schemas() {
        let model = v4();
        let builder = JsonSchemaBuilder::new(&model, JsonFlavor::V4);
        assert!(check(&builder.etag("W/\"'Ann'\""), fixtures::JSON_PERSON_V4).is_pass());
        assert!(!check(&builder.etag("W/\"other\""), fixtures::JSON_PERSON_V4).is_pass());
        assert!(check(&builder.reference(true), fixtures::JSON_REF_COLLECTION_V4).is_pass());
        assert!(!check(&builder.reference(false), fixtures::JSON_REF_COLLECTION_V4).is_pass());

        let verbose = JsonSchemaBuilder::new(&model, JsonFlavor::Verbose { results_wrapped: true });
        assert!(check(&verbose.etag("W/\"'Ann'\""), fixtures::JSON_PERSON_VERBOSE_V2).is_pass());
    }

    #[test]
    fn complex_values_check_inherited_members() {
        let doc = r#"<Schema Namespace="Geo" xmlns="http://docs.oasis-open.org/odata/ns/edm">
  <ComplexType Name="Address"><Property Name="Street" Type="Edm.String"/></ComplexType>
  <ComplexType Name="UsAddress" BaseType="Geo.Address"><Property Name="Zip" Type="Edm.String"/></ComplexType>
  <EntityType Name="Site">
    <Key><PropertyRef Name="Id"/></Key>
    <Property Name="Id" Type="Edm.Int32" Nullable="false"/>
    <Property Name="Location" Type="Geo.UsAddress" Nullable="false"/>
  </EntityType>
</Schema>"#;
        let model = MetadataModel::parse(doc).expect("metadata");
        let site = model.resolve_entity_type("Geo.Site").expect("type");
        let schema = JsonSchemaBuilder::new(&model, JsonFlavor::V4).entity(site);
        assert!(check(&schema, r#"{"Id":1,"Location":{"Street":"Main","Zip":"1"}}"#).is_pass());
        assert!(!check(&schema, r#"{"Id":1,"Location":{"Street":7,"Zip":"1"}}"#).is_pass());
    }
}
