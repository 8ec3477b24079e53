//! CSDL (EDMX) parsing.
//!
//! Element and attribute names are matched on their local part only, so
//! documents are accepted whatever prefixes (or EDM namespace revision) they
//! use. Parsing happens in two passes: the first collects declarations as
//! written, the second resolves names into table indices.

use std::collections::HashMap;

use roxmltree::{Document, Node, ParsingOptions};

use crate::error::EdmError;
use crate::model::{
    element_type, qualify_with, ComplexType, EntityContainer, EntitySet, EntityType,
    EntityTypeId, FunctionImport, MetadataModel, Multiplicity, NavigationBinding, NavigationEnd,
    NavigationProperty, Property, Relationship, RelationshipEnd, RelationshipId, SchemaInfo,
};
use crate::version::ProtocolVersion;

impl MetadataModel {
    /// Parses a CSDL metadata document.
    ///
    /// Navigation properties whose relationship cannot be resolved do not
    /// fail the parse; the failure is kept on the property and reported by
    /// [`MetadataModel::navigation_end`].
    ///
    /// # Errors
    ///
    /// Returns [`EdmError::Xml`] for malformed XML, [`EdmError::NotCsdl`] for
    /// a document that is not EDMX/CSDL, [`EdmError::UnknownType`] for an
    /// undeclared base type and [`EdmError::InheritanceCycle`] for a cyclic
    /// base-type chain.
    pub fn parse(text: &str) -> Result<Self, EdmError> {
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let doc = Document::parse_with_options(text, options)
            .map_err(|e| EdmError::Xml(e.to_string()))?;
        let root = doc.root_element();

        let mut model = MetadataModel::default();
        let schemas: Vec<Node<'_, '_>> = match root.tag_name().name() {
            "Edmx" => {
                model.version = edmx_version(root);
                root.descendants()
                    .filter(|n| n.is_element() && n.tag_name().name() == "Schema")
                    .collect()
            }
            "Schema" => vec![root],
            other => return Err(EdmError::NotCsdl(other.to_string())),
        };

        model.schemas = schemas
            .iter()
            .filter_map(|s| {
                attr(*s, "Namespace").map(|ns| SchemaInfo {
                    namespace: ns.to_string(),
                    alias: attr(*s, "Alias").map(str::to_string),
                })
            })
            .collect();

        let mut raw_navigation: Vec<Vec<NavigationBinding>> = Vec::new();
        for schema in &schemas {
            let namespace = attr(*schema, "Namespace").unwrap_or_default().to_string();
            for child in schema.children().filter(Node::is_element) {
                match child.tag_name().name() {
                    "EntityType" => {
                        let (entity, bindings) = parse_entity_type(child, &namespace);
                        model.entity_types.push(entity);
                        raw_navigation.push(bindings);
                    }
                    "ComplexType" => model.complex_types.push(ComplexType {
                        name: attr(child, "Name").unwrap_or_default().to_string(),
                        namespace: namespace.clone(),
                        base_type_name: attr(child, "BaseType").map(str::to_string),
                        properties: parse_properties(child),
                    }),
                    "Association" => model.relationships.push(parse_association(child, &namespace)),
                    "EntityContainer" => model.containers.push(parse_container(child)),
                    _ => {}
                }
            }
        }

        resolve(&mut model, raw_navigation)?;
        Ok(model)
    }
}

/// Returns an attribute by local name, ignoring its namespace.
fn attr<'a>(node: Node<'a, '_>, local: &str) -> Option<&'a str> {
    node.attributes()
        .find(|a| a.name() == local)
        .map(|a| a.value())
}

fn children_named<'a, 'input>(
    node: Node<'a, 'input>,
    local: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == local)
}

fn flag(node: Node<'_, '_>, local: &str) -> bool {
    attr(node, local).is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Reads the protocol version off the EDMX root: CSDL 4.0 declares it on
/// `Edmx@Version`, earlier revisions on `DataServices@DataServiceVersion`.
fn edmx_version(root: Node<'_, '_>) -> Option<ProtocolVersion> {
    let edmx = attr(root, "Version").and_then(ProtocolVersion::parse);
    if edmx == Some(ProtocolVersion::V4) {
        return edmx;
    }
    children_named(root, "DataServices")
        .find_map(|ds| attr(ds, "DataServiceVersion"))
        .and_then(ProtocolVersion::parse)
}

fn parse_properties(node: Node<'_, '_>) -> Vec<Property> {
    children_named(node, "Property")
        .map(|p| Property {
            name: attr(p, "Name").unwrap_or_default().to_string(),
            type_name: attr(p, "Type").unwrap_or_default().to_string(),
            nullable: !attr(p, "Nullable").is_some_and(|v| v.eq_ignore_ascii_case("false")),
            max_length: attr(p, "MaxLength").map(str::to_string),
            concurrency_token: attr(p, "ConcurrencyMode").is_some_and(|v| v == "Fixed"),
        })
        .collect()
}

fn parse_entity_type(node: Node<'_, '_>, namespace: &str) -> (EntityType, Vec<NavigationBinding>) {
    let key = children_named(node, "Key")
        .flat_map(|k| children_named(k, "PropertyRef"))
        .filter_map(|r| attr(r, "Name").map(str::to_string))
        .collect();

    let mut navigation = Vec::new();
    let mut bindings = Vec::new();
    for nav in children_named(node, "NavigationProperty") {
        let binding = match attr(nav, "Relationship") {
            Some(relationship) => NavigationBinding::Association {
                relationship: relationship.to_string(),
                from_role: attr(nav, "FromRole").unwrap_or_default().to_string(),
                to_role: attr(nav, "ToRole").unwrap_or_default().to_string(),
            },
            None => NavigationBinding::Typed {
                type_name: attr(nav, "Type").unwrap_or_default().to_string(),
                nullable: !attr(nav, "Nullable").is_some_and(|v| v.eq_ignore_ascii_case("false")),
                partner: attr(nav, "Partner").map(str::to_string),
            },
        };
        let name = attr(nav, "Name").unwrap_or_default().to_string();
        navigation.push(NavigationProperty {
            name: name.clone(),
            binding: binding.clone(),
            end: Err(EdmError::UnknownNavigation {
                entity_type: String::new(),
                segment: name,
            }),
        });
        bindings.push(binding);
    }

    let entity = EntityType {
        name: attr(node, "Name").unwrap_or_default().to_string(),
        namespace: namespace.to_string(),
        base_type_name: attr(node, "BaseType").map(str::to_string),
        base: None,
        key,
        is_abstract: flag(node, "Abstract"),
        has_stream: flag(node, "HasStream"),
        open_type: flag(node, "OpenType"),
        properties: parse_properties(node),
        navigation,
    };
    (entity, bindings)
}

fn parse_association(node: Node<'_, '_>, namespace: &str) -> Relationship {
    let name = attr(node, "Name").unwrap_or_default();
    Relationship {
        name: format!("{namespace}.{name}"),
        ends: children_named(node, "End")
            .map(|end| RelationshipEnd {
                role: attr(end, "Role").unwrap_or_default().to_string(),
                type_name: attr(end, "Type").unwrap_or_default().to_string(),
                multiplicity: attr(end, "Multiplicity")
                    .and_then(Multiplicity::parse)
                    .unwrap_or(Multiplicity::ZeroOrOne),
            })
            .collect(),
        synthesized: false,
    }
}

fn parse_container(node: Node<'_, '_>) -> EntityContainer {
    let set = |n: Node<'_, '_>, type_attr: &str| EntitySet {
        name: attr(n, "Name").unwrap_or_default().to_string(),
        entity_type_name: attr(n, type_attr).unwrap_or_default().to_string(),
        entity_type: None,
    };
    let function_imports = node
        .children()
        .filter(|n| {
            n.is_element() && matches!(n.tag_name().name(), "FunctionImport" | "ActionImport")
        })
        .map(|f| FunctionImport {
            name: attr(f, "Name").unwrap_or_default().to_string(),
            return_type: attr(f, "ReturnType")
                .map(str::to_string)
                .or_else(|| operation_return_type(f)),
            entity_set: attr(f, "EntitySet").map(str::to_string),
        })
        .collect();
    let is_v4 = attr(node, "IsDefaultEntityContainer").is_none();
    EntityContainer {
        name: attr(node, "Name").unwrap_or_default().to_string(),
        is_default: is_v4 || flag(node, "IsDefaultEntityContainer"),
        entity_sets: children_named(node, "EntitySet")
            .map(|n| set(n, "EntityType"))
            .collect(),
        singletons: children_named(node, "Singleton")
            .map(|n| set(n, "Type"))
            .collect(),
        function_imports,
        association_sets: children_named(node, "AssociationSet")
            .filter_map(|n| attr(n, "Name").map(str::to_string))
            .collect(),
    }
}

/// V4 imports point at a `Function`/`Action` whose `ReturnType` child
/// carries the type.
fn operation_return_type(import: Node<'_, '_>) -> Option<String> {
    let target = attr(import, "Function").or_else(|| attr(import, "Action"))?;
    let short = target.rsplit('.').next().unwrap_or(target);
    import
        .document()
        .descendants()
        .filter(|n| n.is_element() && matches!(n.tag_name().name(), "Function" | "Action"))
        .find(|n| attr(*n, "Name") == Some(short))
        .and_then(|op| children_named(op, "ReturnType").next())
        .and_then(|rt| attr(rt, "Type"))
        .map(str::to_string)
}

/// Second pass: resolves base types, entity sets and navigation ends.
fn resolve(
    model: &mut MetadataModel,
    raw_navigation: Vec<Vec<NavigationBinding>>,
) -> Result<(), EdmError> {
    model.by_full_name = model
        .entity_types
        .iter()
        .enumerate()
        .map(|(i, t)| (t.full_name(), EntityTypeId(i)))
        .collect();

    for i in 0..model.entity_types.len() {
        let base = match &model.entity_types[i].base_type_name {
            Some(name) => {
                let qualified = qualify_with(&model.schemas, name);
                let id = model
                    .by_full_name
                    .get(&qualified)
                    .copied()
                    .ok_or(EdmError::UnknownType(qualified))?;
                Some(id)
            }
            None => None,
        };
        model.entity_types[i].base = base;
    }
    check_acyclic(model)?;

    let lookup = model.by_full_name.clone();
    let schemas = model.schemas.clone();
    let find = |name: &str| lookup.get(&qualify_with(&schemas, name)).copied();

    for container in &mut model.containers {
        for set in container
            .entity_sets
            .iter_mut()
            .chain(container.singletons.iter_mut())
        {
            set.entity_type = find(&set.entity_type_name);
        }
    }

    let association_index: HashMap<String, RelationshipId> = model
        .relationships
        .iter()
        .enumerate()
        .map(|(i, r)| (r.name.clone(), RelationshipId(i)))
        .collect();

    for (type_index, bindings) in raw_navigation.into_iter().enumerate() {
        let owner = model.entity_types[type_index].full_name();
        for (nav_index, binding) in bindings.into_iter().enumerate() {
            let nav_name = model.entity_types[type_index].navigation[nav_index]
                .name
                .clone();
            let end = match binding {
                NavigationBinding::Association {
                    relationship,
                    to_role,
                    ..
                } => {
                    let qualified = qualify_with(&schemas, &relationship);
                    match association_index.get(&qualified) {
                        None => Err(EdmError::UnresolvedRelationship {
                            navigation: nav_name,
                            relationship,
                        }),
                        Some(rel_id) => {
                            let rel = &model.relationships[rel_id.0];
                            match rel.ends.iter().find(|e| e.role == to_role) {
                                None => Err(EdmError::UnresolvedRole {
                                    relationship: rel.name.clone(),
                                    role: to_role,
                                }),
                                Some(end) => find(&end.type_name)
                                    .map(|target| NavigationEnd {
                                        relationship: *rel_id,
                                        target,
                                        multiplicity: end.multiplicity,
                                    })
                                    .ok_or_else(|| EdmError::UnknownType(end.type_name.clone())),
                            }
                        }
                    }
                }
                NavigationBinding::Typed {
                    type_name,
                    nullable,
                    ..
                } => {
                    let target_name = element_type(&type_name).to_string();
                    let multiplicity = if type_name.starts_with("Collection(") {
                        Multiplicity::Many
                    } else if nullable {
                        Multiplicity::ZeroOrOne
                    } else {
                        Multiplicity::One
                    };
                    match find(&target_name) {
                        None => Err(EdmError::UnknownType(target_name)),
                        Some(target) => {
                            let rel_id = RelationshipId(model.relationships.len());
                            model.relationships.push(Relationship {
                                name: format!("{owner}/{nav_name}"),
                                ends: vec![
                                    RelationshipEnd {
                                        role: owner.clone(),
                                        type_name: owner.clone(),
                                        multiplicity: Multiplicity::ZeroOrOne,
                                    },
                                    RelationshipEnd {
                                        role: nav_name.clone(),
                                        type_name: qualify_with(&schemas, &target_name),
                                        multiplicity,
                                    },
                                ],
                                synthesized: true,
                            });
                            Ok(NavigationEnd {
                                relationship: rel_id,
                                target,
                                multiplicity,
                            })
                        }
                    }
                }
            };
            model.entity_types[type_index].navigation[nav_index].end = end;
        }
    }
    Ok(())
}

fn check_acyclic(model: &MetadataModel) -> Result<(), EdmError> {
    for (start, entity) in model.entity_types.iter().enumerate() {
        let mut steps = 0usize;
        let mut current = entity.base;
        while let Some(EntityTypeId(next)) = current {
            steps += 1;
            if next == start || steps > model.entity_types.len() {
                return Err(EdmError::InheritanceCycle(entity.full_name()));
            }
            current = model.entity_types[next].base;
        }
    }
    Ok(())
}
