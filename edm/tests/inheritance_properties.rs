//! Property-based tests for base-type property inheritance.
//!
//! Builds CSDL documents with randomly shaped single-inheritance chains and
//! checks that inherited property lists come back ancestor-first, complete
//! and free of duplicates.

use std::collections::HashSet;

use odata_edm::MetadataModel;
use proptest::prelude::*;

/// Renders a chain `T0 <- T1 <- ... <- Tn`, where level `i` declares
/// `counts[i]` properties named `L{i}P{j}`.
fn chain_document(counts: &[usize]) -> String {
    let mut doc = String::from(
        r#"<Schema Namespace="Chain" xmlns="http://docs.oasis-open.org/odata/ns/edm">"#,
    );
    for (level, count) in counts.iter().enumerate() {
        if level == 0 {
            doc.push_str(r#"<EntityType Name="T0"><Key><PropertyRef Name="L0P0"/></Key>"#);
        } else {
            doc.push_str(&format!(
                r#"<EntityType Name="T{level}" BaseType="Chain.T{}">"#,
                level - 1
            ));
        }
        for j in 0..*count {
            doc.push_str(&format!(r#"<Property Name="L{level}P{j}" Type="Edm.String"/>"#));
        }
        doc.push_str("</EntityType>");
    }
    doc.push_str("</Schema>");
    doc
}

proptest! {
    /// Inherited properties are the ordered union of every level, root first.
    #[test]
    fn prop_inherited_properties_root_first(
        tail in prop::collection::vec(0usize..4, 0..6),
        root_extra in 0usize..3,
    ) {
        let mut counts = vec![1 + root_extra];
        counts.extend(tail);
        let model = MetadataModel::parse(&chain_document(&counts)).unwrap();
        let leaf = model
            .resolve_entity_type(&format!("Chain.T{}", counts.len() - 1))
            .unwrap();

        let names: Vec<String> = model
            .declared_properties(leaf, true)
            .iter()
            .map(|p| p.name.clone())
            .collect();
        let expected: Vec<String> = counts
            .iter()
            .enumerate()
            .flat_map(|(level, count)| (0..*count).map(move |j| format!("L{level}P{j}")))
            .collect();
        prop_assert_eq!(&names, &expected);

        let unique: HashSet<&String> = names.iter().collect();
        prop_assert_eq!(unique.len(), names.len());
    }

    /// Without inheritance only the type's own properties are returned.
    #[test]
    fn prop_own_properties_only(tail in prop::collection::vec(0usize..4, 1..5)) {
        let mut counts = vec![1];
        counts.extend(tail);
        let model = MetadataModel::parse(&chain_document(&counts)).unwrap();
        let last = counts.len() - 1;
        let leaf = model.resolve_entity_type(&format!("T{last}")).unwrap();
        prop_assert_eq!(model.declared_properties(leaf, false).len(), counts[last]);
        prop_assert_eq!(model.base_chain(leaf).len(), counts.len());
    }

    /// Keys are inherited from the root of the chain.
    #[test]
    fn prop_keys_inherited(tail in prop::collection::vec(0usize..3, 0..5)) {
        let mut counts = vec![1];
        counts.extend(tail);
        let model = MetadataModel::parse(&chain_document(&counts)).unwrap();
        let leaf = model
            .resolve_entity_type(&format!("T{}", counts.len() - 1))
            .unwrap();
        let keys: Vec<&str> = model
            .key_properties(leaf)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        prop_assert_eq!(keys, vec!["L0P0"]);
    }
}
