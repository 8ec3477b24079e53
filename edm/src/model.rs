//! Core metadata model types.
//!
//! Entity types, complex types and relationships live in flat tables inside
//! [`MetadataModel`]; cross references (base types, navigation targets) are
//! stored as table indices rather than pointers, so a model is cheap to
//! share read-only across threads once parsed.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::EdmError;
use crate::version::ProtocolVersion;

/// Index of an entity type inside its [`MetadataModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityTypeId(pub(crate) usize);

/// Index of a relationship inside its [`MetadataModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelationshipId(pub(crate) usize);

/// Cardinality of one end of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Multiplicity {
    /// Exactly one (`1`).
    One,
    /// Zero or one (`0..1`).
    ZeroOrOne,
    /// Zero or more (`*`).
    Many,
}

impl Multiplicity {
    /// Parses the CSDL spelling of a multiplicity.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "1" => Some(Self::One),
            "0..1" => Some(Self::ZeroOrOne),
            "*" => Some(Self::Many),
            _ => None,
        }
    }

    /// True for the to-many end.
    #[must_use]
    pub fn is_many(self) -> bool {
        self == Self::Many
    }
}

/// A structural (non-navigation) property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Property name.
    pub name: String,
    /// Declared type as written, e.g. `Edm.String` or `Collection(NS.Address)`.
    pub type_name: String,
    /// `Nullable` facet; CSDL defaults it to true.
    pub nullable: bool,
    /// `MaxLength` facet, if declared.
    pub max_length: Option<String>,
    /// True when `ConcurrencyMode="Fixed"` makes the property part of the ETag.
    pub concurrency_token: bool,
}

impl Property {
    /// True when the declared type is `Collection(...)`.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.type_name.starts_with("Collection(")
    }

    /// True for primitive `Edm.*` types (collections of primitives included).
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        element_type(&self.type_name).starts_with("Edm.")
    }
}

/// How a navigation property names its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationBinding {
    /// CSDL 1.0 to 3.0: an association and a pair of roles.
    Association {
        /// Qualified association name.
        relationship: String,
        /// Role of the declaring end.
        from_role: String,
        /// Role of the target end.
        to_role: String,
    },
    /// CSDL 4.0: a target type, optionally wrapped in `Collection(...)`.
    Typed {
        /// Declared type as written.
        type_name: String,
        /// `Nullable` facet.
        nullable: bool,
        /// Partner navigation property on the target, if declared.
        partner: Option<String>,
    },
}

/// A navigation property of an entity type.
#[derive(Debug, Clone)]
pub struct NavigationProperty {
    /// Property name.
    pub name: String,
    /// Relationship information as declared.
    pub binding: NavigationBinding,
    pub(crate) end: Result<NavigationEnd, EdmError>,
}

impl NavigationProperty {
    /// The relationship end this property resolves to.
    ///
    /// # Errors
    ///
    /// Returns the resolution failure recorded while the model was built
    /// (missing relationship, missing role, unknown target type).
    pub fn end(&self) -> Result<&NavigationEnd, &EdmError> {
        self.end.as_ref()
    }
}

/// The resolved far end of a navigation property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationEnd {
    /// Relationship the end belongs to.
    pub relationship: RelationshipId,
    /// Entity type reached by following the property.
    pub target: EntityTypeId,
    /// Cardinality of the target end.
    pub multiplicity: Multiplicity,
}

/// One end of a relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipEnd {
    /// Role name.
    pub role: String,
    /// Qualified entity type name of the end.
    pub type_name: String,
    /// Cardinality of the end.
    pub multiplicity: Multiplicity,
}

/// An association (CSDL 1.0 to 3.0) or a relationship synthesized from a
/// CSDL 4.0 navigation property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Qualified name.
    pub name: String,
    /// The two ends.
    pub ends: Vec<RelationshipEnd>,
    /// True when the record was synthesized rather than declared.
    pub synthesized: bool,
}

/// An entity type.
#[derive(Debug, Clone)]
pub struct EntityType {
    /// Short name.
    pub name: String,
    /// Declaring schema namespace.
    pub namespace: String,
    /// Qualified base type name as written, if any.
    pub base_type_name: Option<String>,
    /// Resolved base type.
    pub base: Option<EntityTypeId>,
    /// Key property names declared on this type (empty for derived types).
    pub key: Vec<String>,
    /// `Abstract` attribute.
    pub is_abstract: bool,
    /// `HasStream` attribute: instances are media link entries.
    pub has_stream: bool,
    /// `OpenType` attribute.
    pub open_type: bool,
    /// Properties declared on this type, in document order.
    pub properties: Vec<Property>,
    /// Navigation properties declared on this type, in document order.
    pub navigation: Vec<NavigationProperty>,
}

impl EntityType {
    /// `Namespace.Name`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

/// A complex type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexType {
    /// Short name.
    pub name: String,
    /// Declaring schema namespace.
    pub namespace: String,
    /// Qualified base type name as written, if any.
    pub base_type_name: Option<String>,
    /// Properties declared on this type.
    pub properties: Vec<Property>,
}

impl ComplexType {
    /// `Namespace.Name`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

/// An entity set or a singleton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySet {
    /// Set name.
    pub name: String,
    /// Entity type name as written.
    pub entity_type_name: String,
    /// Resolved entity type.
    pub entity_type: Option<EntityTypeId>,
}

/// A function import (service operation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionImport {
    /// Operation name.
    pub name: String,
    /// Declared return type, if any.
    pub return_type: Option<String>,
    /// Entity set the results belong to, if any.
    pub entity_set: Option<String>,
}

/// An entity container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityContainer {
    /// Container name.
    pub name: String,
    /// `IsDefaultEntityContainer`; CSDL 4.0 has a single container, treated as default.
    pub is_default: bool,
    /// Entity sets.
    pub entity_sets: Vec<EntitySet>,
    /// Singletons (CSDL 4.0).
    pub singletons: Vec<EntitySet>,
    /// Function and action imports.
    pub function_imports: Vec<FunctionImport>,
    /// Association set names (CSDL 1.0 to 3.0).
    pub association_sets: Vec<String>,
}

/// A schema namespace and its optional alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaInfo {
    /// Schema namespace.
    pub namespace: String,
    /// Schema alias, if declared.
    pub alias: Option<String>,
}

/// A parsed metadata document.
#[derive(Debug, Clone, Default)]
pub struct MetadataModel {
    pub(crate) version: Option<ProtocolVersion>,
    pub(crate) schemas: Vec<SchemaInfo>,
    pub(crate) entity_types: Vec<EntityType>,
    pub(crate) complex_types: Vec<ComplexType>,
    pub(crate) relationships: Vec<Relationship>,
    pub(crate) containers: Vec<EntityContainer>,
    pub(crate) by_full_name: HashMap<String, EntityTypeId>,
}

/// Strips a `Collection(...)` wrapper from a type name.
#[must_use]
pub fn element_type(type_name: &str) -> &str {
    type_name
        .strip_prefix("Collection(")
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(type_name)
}

impl MetadataModel {
    /// Protocol version declared by the document (`DataServiceVersion` or
    /// the EDMX version for 4.0), if any.
    #[must_use]
    pub fn version(&self) -> Option<ProtocolVersion> {
        self.version
    }

    /// Declared schemas.
    #[must_use]
    pub fn schemas(&self) -> &[SchemaInfo] {
        &self.schemas
    }

    /// All entity types, in declaration order.
    pub fn entity_types(&self) -> impl Iterator<Item = (EntityTypeId, &EntityType)> {
        self.entity_types
            .iter()
            .enumerate()
            .map(|(i, t)| (EntityTypeId(i), t))
    }

    /// Entity type by id.
    ///
    /// Ids are only meaningful for the model that produced them.
    #[must_use]
    pub fn entity_type(&self, id: EntityTypeId) -> &EntityType {
        &self.entity_types[id.0]
    }

    /// Relationship by id.
    #[must_use]
    pub fn relationship(&self, id: RelationshipId) -> &Relationship {
        &self.relationships[id.0]
    }

    /// All relationships, declared and synthesized.
    #[must_use]
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Entity containers.
    #[must_use]
    pub fn containers(&self) -> &[EntityContainer] {
        &self.containers
    }

    /// Rewrites an alias-qualified name into its namespace-qualified form.
    #[must_use]
    pub fn qualify(&self, name: &str) -> String {
        qualify_with(&self.schemas, name)
    }

    /// Resolves an entity type by qualified name, alias-qualified name or
    /// short name. A leading `#` (as in `@odata.type`) is ignored.
    ///
    /// Short names match the first declared type with that name.
    #[must_use]
    pub fn resolve_entity_type(&self, name: &str) -> Option<EntityTypeId> {
        let name = name.trim().trim_start_matches('#');
        if name.is_empty() {
            return None;
        }
        if let Some(id) = self.by_full_name.get(&self.qualify(name)) {
            return Some(*id);
        }
        self.entity_types()
            .find(|(_, t)| t.name == name)
            .map(|(id, _)| id)
    }

    /// Resolves a complex type by qualified, alias-qualified or short name.
    #[must_use]
    pub fn resolve_complex_type(&self, name: &str) -> Option<&ComplexType> {
        let qualified = self.qualify(element_type(name.trim_start_matches('#')));
        self.complex_types
            .iter()
            .find(|c| c.full_name() == qualified)
            .or_else(|| self.complex_types.iter().find(|c| c.name == qualified))
    }

    /// The inheritance chain of `id`, farthest ancestor first, ending with `id`.
    #[must_use]
    pub fn base_chain(&self, id: EntityTypeId) -> Vec<EntityTypeId> {
        let mut chain = vec![id];
        let mut current = self.entity_type(id).base;
        // Cycles are rejected at parse time; the bound only guards foreign ids.
        while let Some(base) = current {
            if chain.len() > self.entity_types.len() {
                break;
            }
            chain.push(base);
            current = self.entity_type(base).base;
        }
        chain.reverse();
        chain
    }

    /// Structural properties of an entity type.
    ///
    /// With `include_inherited`, properties of every ancestor come first
    /// (farthest ancestor first), followed by the type's own; a name already
    /// seen higher up the chain is not repeated.
    #[must_use]
    pub fn declared_properties(&self, id: EntityTypeId, include_inherited: bool) -> Vec<&Property> {
        let chain = if include_inherited {
            self.base_chain(id)
        } else {
            vec![id]
        };
        let mut seen = std::collections::HashSet::new();
        chain
            .into_iter()
            .flat_map(|t| self.entity_type(t).properties.iter())
            .filter(|p| seen.insert(p.name.as_str()))
            .collect()
    }

    /// Properties of a complex type including those of its base types,
    /// farthest ancestor first. Unresolvable or cyclic bases end the walk.
    #[must_use]
    pub fn complex_properties<'a>(&'a self, complex: &'a ComplexType) -> Vec<&'a Property> {
        let mut chain = vec![complex];
        let mut current = complex.base_type_name.as_deref();
        while let Some(base) = current.and_then(|name| self.resolve_complex_type(name)) {
            if chain.iter().any(|c| std::ptr::eq(*c, base)) {
                break;
            }
            chain.push(base);
            current = base.base_type_name.as_deref();
        }
        let mut seen = std::collections::HashSet::new();
        chain
            .into_iter()
            .rev()
            .flat_map(|c| c.properties.iter())
            .filter(|p| seen.insert(p.name.as_str()))
            .collect()
    }

    /// Navigation properties of an entity type, ancestors first when
    /// `include_inherited` is set.
    #[must_use]
    pub fn navigation_properties(
        &self,
        id: EntityTypeId,
        include_inherited: bool,
    ) -> Vec<&NavigationProperty> {
        let chain = if include_inherited {
            self.base_chain(id)
        } else {
            vec![id]
        };
        let mut seen = std::collections::HashSet::new();
        chain
            .into_iter()
            .flat_map(|t| self.entity_type(t).navigation.iter())
            .filter(|n| seen.insert(n.name.as_str()))
            .collect()
    }

    /// Looks up a navigation property declared on `id` or any ancestor.
    #[must_use]
    pub fn navigation_property(&self, id: EntityTypeId, name: &str) -> Option<&NavigationProperty> {
        self.navigation_properties(id, true)
            .into_iter()
            .find(|n| n.name == name)
    }

    /// Looks up a structural property declared on `id` or any ancestor.
    #[must_use]
    pub fn property(&self, id: EntityTypeId, name: &str) -> Option<&Property> {
        self.declared_properties(id, true)
            .into_iter()
            .find(|p| p.name == name)
    }

    /// Resolves the far end of a navigation property.
    ///
    /// # Errors
    ///
    /// [`EdmError::UnknownNavigation`] when `name` is not a navigation
    /// property of the type, or the relationship failure recorded for it.
    pub fn navigation_end(&self, id: EntityTypeId, name: &str) -> Result<NavigationEnd, EdmError> {
        let nav = self
            .navigation_property(id, name)
            .ok_or_else(|| EdmError::UnknownNavigation {
                entity_type: self.entity_type(id).full_name(),
                segment: name.to_string(),
            })?;
        nav.end.clone()
    }

    /// Key properties of an entity type, taken from the nearest type in the
    /// chain that declares a key.
    #[must_use]
    pub fn key_properties(&self, id: EntityTypeId) -> Vec<&Property> {
        let chain = self.base_chain(id);
        let key_names = chain
            .iter()
            .rev()
            .map(|t| &self.entity_type(*t).key)
            .find(|k| !k.is_empty());
        match key_names {
            Some(names) => names
                .iter()
                .filter_map(|n| self.property(id, n))
                .collect(),
            None => Vec::new(),
        }
    }

    /// True when the type or any ancestor declares `HasStream="true"`.
    #[must_use]
    pub fn has_stream(&self, id: EntityTypeId) -> bool {
        self.base_chain(id)
            .iter()
            .any(|t| self.entity_type(*t).has_stream)
    }

    /// Types deriving (directly or indirectly) from `id`, excluding `id`.
    #[must_use]
    pub fn derived_types(&self, id: EntityTypeId) -> Vec<EntityTypeId> {
        self.entity_types()
            .map(|(t, _)| t)
            .filter(|t| *t != id && self.base_chain(*t).contains(&id))
            .collect()
    }

    /// Containers with the default container first.
    fn containers_by_preference(&self) -> impl Iterator<Item = &EntityContainer> {
        self.containers
            .iter()
            .filter(|c| c.is_default)
            .chain(self.containers.iter().filter(|c| !c.is_default))
    }

    /// Every entity set across all containers, default container first.
    pub fn entity_sets(&self) -> impl Iterator<Item = &EntitySet> {
        self.containers_by_preference()
            .flat_map(|c| c.entity_sets.iter())
    }

    /// Looks up an entity set, preferring the default container.
    #[must_use]
    pub fn entity_set(&self, name: &str) -> Option<&EntitySet> {
        self.entity_sets().find(|s| s.name == name)
    }

    /// Looks up a singleton, preferring the default container.
    #[must_use]
    pub fn singleton(&self, name: &str) -> Option<&EntitySet> {
        self.containers_by_preference()
            .flat_map(|c| c.singletons.iter())
            .find(|s| s.name == name)
    }

    /// Entity type of the named entity set or singleton.
    #[must_use]
    pub fn entity_type_of_set(&self, name: &str) -> Option<EntityTypeId> {
        self.entity_set(name)
            .or_else(|| self.singleton(name))
            .and_then(|s| s.entity_type)
    }

    /// Looks up a function import, preferring the default container.
    #[must_use]
    pub fn function_import(&self, name: &str) -> Option<&FunctionImport> {
        self.containers_by_preference()
            .flat_map(|c| c.function_imports.iter())
            .find(|f| f.name == name)
    }
}

/// Rewrites `Alias.Name` to `Namespace.Name` given the declared schemas.
pub(crate) fn qualify_with(schemas: &[SchemaInfo], name: &str) -> String {
    if let Some((prefix, local)) = name.rsplit_once('.') {
        if let Some(schema) = schemas
            .iter()
            .find(|s| s.alias.as_deref() == Some(prefix))
        {
            return format!("{}.{}", schema.namespace, local);
        }
    }
    name.to_string()
}
