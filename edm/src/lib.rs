//! OData Entity Data Model.
//!
//! Parses a service's CSDL metadata document into a [`MetadataModel`]: entity
//! types with single-inheritance chains, complex types, relationships with
//! per-end multiplicities, and entity containers. The model is immutable
//! after parsing and is meant to be shared read-only between every
//! evaluation context that refers to the same service.
//!
//! # Entry Point
//!
//! ```
//! use odata_edm::{MetadataModel, Multiplicity};
//!
//! let csdl = r#"<Schema Namespace="Demo" xmlns="http://docs.oasis-open.org/odata/ns/edm">
//!   <EntityType Name="Person">
//!     <Key><PropertyRef Name="Id"/></Key>
//!     <Property Name="Id" Type="Edm.Int32" Nullable="false"/>
//!     <NavigationProperty Name="Friends" Type="Collection(Demo.Person)"/>
//!   </EntityType>
//! </Schema>"#;
//! let model = MetadataModel::parse(csdl).unwrap();
//! let person = model.resolve_entity_type("Demo.Person").unwrap();
//! let stack = model.resolve_navigation_stack(person, &["Friends"]).unwrap();
//! assert_eq!(stack.steps[0].multiplicity, Multiplicity::Many);
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

mod csdl;
pub mod error;
pub mod expand;
pub mod model;
pub mod navigation;
pub mod version;

pub use error::EdmError;
pub use expand::{split_top_level, ExpandItem, ExpandTree};
pub use model::{
    element_type, ComplexType, EntityContainer, EntitySet, EntityType, EntityTypeId,
    FunctionImport, MetadataModel, Multiplicity, NavigationBinding, NavigationEnd,
    NavigationProperty, Property, Relationship, RelationshipEnd, RelationshipId, SchemaInfo,
};
pub use navigation::{NavigationStack, NavigationStep};
pub use version::ProtocolVersion;
