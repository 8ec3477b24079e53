//! Atom entry rules.

use crate::context::{PayloadFormat, PayloadType, ServiceContext};
use crate::rules::{
    Applicability, Category, RequirementLevel, Rule, RuleDescriptor, RuleError, Verdict,
};
use crate::validators::{attributes_except, check_xml};
use crate::verifiers::grammar::{Grammar, NameClass, Pattern, ValuePattern};
use crate::xmlns;

const ATOM_ENTRY: Applicability = Applicability {
    payload_types: &[PayloadType::Entry],
    formats: &[PayloadFormat::Atom],
    requires_metadata: true,
    ..Applicability::ANY
};

fn atom(local: &str) -> NameClass {
    NameClass::qualified(xmlns::ATOM, local)
}

/// The entry's category names the addressed entity type or one derived
/// from it, under the data services scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomCategoryTerm;

impl AtomCategoryTerm {
    const DESCRIPTOR: RuleDescriptor = RuleDescriptor {
        id: "entry/atom-category-term",
        category: Category::Entry,
        description: "atom:category term names the entity type of the addressed set or a subtype",
        citations: &["[MS-ODATA] 2.2.6.2.2", "OData-Atom 5.1.2"],
        level: RequirementLevel::Must,
        applicability: ATOM_ENTRY,
    };

    fn grammar(names: Vec<String>, scheme: &str) -> Grammar {
        let term = NameClass::local("term");
        let scheme_name = NameClass::local("scheme");
        let category = Pattern::element(
            atom("category"),
            Pattern::interleave([
                Pattern::attribute(term.clone(), ValuePattern::OneOf(names)),
                Pattern::attribute_equals(scheme_name.clone(), scheme),
                attributes_except([term, scheme_name]),
            ]),
        );
        Grammar::new(Pattern::element(
            atom("entry"),
            Pattern::interleave([
                Pattern::any_attributes(),
                category,
                Pattern::zero_or_more(Pattern::any_element_except([atom("category")])),
            ]),
        ))
        .namespace("atom", xmlns::ATOM)
        .with_standard_library()
    }
}

impl Rule for AtomCategoryTerm {
    fn descriptor(&self) -> &RuleDescriptor {
        &Self::DESCRIPTOR
    }

    fn verify(&self, ctx: &ServiceContext) -> Result<Verdict, RuleError> {
        let Some(model) = ctx.model() else {
            return Ok(Verdict::not_applicable("metadata document unavailable"));
        };
        let Some(expected) = ctx.path.target_type else {
            return Ok(Verdict::not_applicable("request URI names no entity type"));
        };
        let mut names = Vec::new();
        for ty in std::iter::once(expected).chain(model.derived_types(expected)) {
            let name = model.entity_type(ty).full_name();
            names.push(format!("#{name}"));
            names.push(name);
        }
        let grammar = Self::grammar(names, xmlns::scheme(ctx.version));
        check_xml(ctx, &grammar, "entry category")
    }
}

/// Every property inside `m:properties` is declared on the entity type.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomDeclaredProperties;

impl AtomDeclaredProperties {
    const DESCRIPTOR: RuleDescriptor = RuleDescriptor {
        id: "entry/atom-declared-properties",
        category: Category::Entry,
        description: "m:properties of an entry of a closed type hold declared properties only",
        citations: &["[MS-ODATA] 2.2.6.2.2.1", "OData-Atom 6.1"],
        level: RequirementLevel::Must,
        applicability: ATOM_ENTRY,
    };
}

impl Rule for AtomDeclaredProperties {
    fn descriptor(&self) -> &RuleDescriptor {
        &Self::DESCRIPTOR
    }

    fn verify(&self, ctx: &ServiceContext) -> Result<Verdict, RuleError> {
        let Some(model) = ctx.model() else {
            return Ok(Verdict::not_applicable("metadata document unavailable"));
        };
        let Some(ty) = ctx.entity_type else {
            return Ok(Verdict::not_applicable("entity type of the entry is unknown"));
        };
        if model.entity_type(ty).open_type {
            return Ok(Verdict::not_applicable("entity type is open"));
        }

        let data = xmlns::data(ctx.version);
        let meta = xmlns::metadata(ctx.version);
        let declared = model.declared_properties(ty, true).into_iter().map(|p| {
            Pattern::optional(Pattern::element(
                NameClass::qualified(data, p.name.clone()),
                Pattern::any_content(),
            ))
        });
        let properties = Pattern::element(
            NameClass::qualified(meta, "properties"),
            Pattern::interleave(std::iter::once(Pattern::any_attributes()).chain(declared)),
        );
        let content = Pattern::element(
            atom("content"),
            Pattern::interleave([Pattern::any_attributes(), Pattern::optional(properties.clone())]),
        );
        // Media link entries carry m:properties beside atom:content.
        let grammar = Grammar::new(Pattern::element(
            atom("entry"),
            Pattern::interleave([
                Pattern::any_attributes(),
                Pattern::optional(content),
                Pattern::optional(properties),
                Pattern::zero_or_more(Pattern::any_element_except([
                    atom("content"),
                    NameClass::qualified(meta, "properties"),
                ])),
            ]),
        ))
        .namespace("atom", xmlns::ATOM)
        .namespace("m", meta)
        .namespace("d", data)
        .with_standard_library();
        check_xml(ctx, &grammar, "entry properties")
    }
}
