//! Metadata document rules.

use odata_edm::MetadataModel;
use roxmltree::Document;

use crate::context::{PayloadType, ServiceContext};
use crate::rules::{
    Applicability, Category, RequirementLevel, Rule, RuleDescriptor, RuleError, Verdict, Violation,
};
use crate::verifiers::excerpt;

/// Every navigation property resolves to a declared relationship end (CSDL
/// 1.0–3.0) or a declared entity type (CSDL 4.0).
#[derive(Debug, Clone, Copy, Default)]
pub struct NavigationResolves;

impl NavigationResolves {
    const DESCRIPTOR: RuleDescriptor = RuleDescriptor {
        id: "metadata/navigation-resolves",
        category: Category::Metadata,
        description: "navigation properties name declared associations, roles and entity types",
        citations: &["[MC-CSDL] 2.1.4", "OData-CSDL 7.1"],
        level: RequirementLevel::Must,
        applicability: Applicability {
            payload_types: &[PayloadType::Metadata],
            ..Applicability::ANY
        },
    };
}

/// Line and excerpt of `<NavigationProperty Name=nav>` inside
/// `<EntityType Name=owner>`.
fn locate(doc: &Document<'_>, owner: &str, nav: &str) -> Option<(usize, String)> {
    let node = doc
        .descendants()
        .filter(|n| n.tag_name().name() == "EntityType" && n.attribute("Name") == Some(owner))
        .flat_map(|n| n.children())
        .find(|n| n.tag_name().name() == "NavigationProperty" && n.attribute("Name") == Some(nav))?;
    let range = node.range();
    let line = doc.text_pos_at(range.start).row as usize;
    let fragment = doc.input_text().get(range).map(excerpt).unwrap_or_default();
    Some((line, fragment))
}

impl Rule for NavigationResolves {
    fn descriptor(&self) -> &RuleDescriptor {
        &Self::DESCRIPTOR
    }

    fn verify(&self, ctx: &ServiceContext) -> Result<Verdict, RuleError> {
        let model = match MetadataModel::parse(&ctx.body) {
            Ok(model) => model,
            Err(e) => {
                return Ok(Verdict::Fail(
                    Violation::new(format!("metadata document does not parse: {e}"))
                        .at(ctx.uri.clone()),
                ))
            }
        };
        let unresolved: Vec<(String, String, String)> = model
            .entity_types()
            .flat_map(|(_, ty)| {
                ty.navigation.iter().filter_map(move |nav| {
                    nav.end()
                        .err()
                        .map(|e| (ty.name.clone(), nav.name.clone(), format!("{}: {e}", ty.full_name())))
                })
            })
            .collect();
        let Some((owner, nav, message)) = unresolved.first() else {
            return Ok(Verdict::Pass);
        };

        let message = match unresolved.len() {
            1 => message.clone(),
            n => format!("{message} (and {} more)", n - 1),
        };
        let mut violation = Violation::new(message).at(ctx.uri.clone());
        let doc = Document::parse(&ctx.body).ok();
        if let Some((line, fragment)) = doc.as_ref().and_then(|d| locate(d, owner, nav)) {
            violation.line = Some(line);
            violation = violation.with_fragment(fragment);
        }
        Ok(Verdict::Fail(violation))
    }
}
