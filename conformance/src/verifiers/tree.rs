//! Grammar evaluation by pattern derivatives.
//!
//! The document is consumed node by node; each step replaces the current
//! pattern with its derivative, so every alternative is carried along until
//! it dies. The first node at which the derivative collapses to
//! `NotAllowed` is the furthest point any alternative reached, and its line
//! becomes the evidence.

use std::rc::Rc;

use roxmltree::{Document, Node, NodeType};

use super::grammar::{Grammar, NameClass, Pattern, ValuePattern};
use super::{excerpt, Evidence, VerificationResult, VerifierError};

/// Evaluates [`Grammar`]s against XML documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeVerifier;

impl TreeVerifier {
    /// Verifies `document` against `grammar`.
    ///
    /// A document that is not well-formed fails with the parser's position.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError`] when the grammar refers to an undefined
    /// production or recurses outside an element.
    pub fn verify(
        &self,
        grammar: &Grammar,
        document: &str,
    ) -> Result<VerificationResult, VerifierError> {
        match Document::parse_with_options(
            document,
            roxmltree::ParsingOptions {
                allow_dtd: true,
                ..roxmltree::ParsingOptions::default()
            },
        ) {
            Ok(doc) => self.verify_document(grammar, &doc),
            Err(e) => Ok(VerificationResult::Fail(
                Evidence::message(format!("document is not well-formed XML: {e}"))
                    .at_line(e.pos().row as usize),
            )),
        }
    }

    /// Verifies an already parsed document.
    ///
    /// # Errors
    ///
    /// As [`TreeVerifier::verify`].
    pub fn verify_document(
        &self,
        grammar: &Grammar,
        doc: &Document<'_>,
    ) -> Result<VerificationResult, VerifierError> {
        let mut eval = Evaluator {
            grammar,
            doc,
            failure: None,
        };
        let start = eval.compile(grammar.start(), &mut Vec::new())?;
        let root = doc.root_element();
        let after = eval.child_deriv(&start, root)?;
        if after.nullable() {
            return Ok(VerificationResult::Pass);
        }
        let evidence = eval.failure.take().unwrap_or_else(|| {
            eval.evidence_at(root, "document element does not match the grammar")
        });
        Ok(VerificationResult::Fail(evidence))
    }
}

#[derive(Debug, PartialEq)]
enum Pat<'g> {
    Empty,
    NotAllowed,
    Text,
    Value(&'g ValuePattern),
    Choice(Rc<Pat<'g>>, Rc<Pat<'g>>),
    Interleave(Rc<Pat<'g>>, Rc<Pat<'g>>),
    Group(Rc<Pat<'g>>, Rc<Pat<'g>>),
    OneOrMore(Rc<Pat<'g>>),
    Attribute(&'g NameClass, &'g ValuePattern),
    Element(&'g NameClass, &'g Pattern),
    After(Rc<Pat<'g>>, Rc<Pat<'g>>),
}

type P<'g> = Rc<Pat<'g>>;

impl Pat<'_> {
    fn nullable(&self) -> bool {
        match self {
            Pat::Empty | Pat::Text => true,
            Pat::Choice(a, b) => a.nullable() || b.nullable(),
            Pat::Group(a, b) | Pat::Interleave(a, b) => a.nullable() && b.nullable(),
            Pat::OneOrMore(p) => p.nullable(),
            Pat::Value(v) => v.matches(""),
            Pat::NotAllowed | Pat::Attribute(..) | Pat::Element(..) | Pat::After(..) => false,
        }
    }

    fn is_not_allowed(&self) -> bool {
        matches!(self, Pat::NotAllowed)
    }
}

fn not_allowed<'g>() -> P<'g> {
    Rc::new(Pat::NotAllowed)
}

fn empty<'g>() -> P<'g> {
    Rc::new(Pat::Empty)
}

fn choice<'g>(a: P<'g>, b: P<'g>) -> P<'g> {
    if a.is_not_allowed() {
        b
    } else if b.is_not_allowed() || a == b {
        a
    } else {
        Rc::new(Pat::Choice(a, b))
    }
}

fn group<'g>(a: P<'g>, b: P<'g>) -> P<'g> {
    match (&*a, &*b) {
        (Pat::NotAllowed, _) | (_, Pat::NotAllowed) => not_allowed(),
        (Pat::Empty, _) => b,
        (_, Pat::Empty) => a,
        _ => Rc::new(Pat::Group(a, b)),
    }
}

fn interleave<'g>(a: P<'g>, b: P<'g>) -> P<'g> {
    match (&*a, &*b) {
        (Pat::NotAllowed, _) | (_, Pat::NotAllowed) => not_allowed(),
        (Pat::Empty, _) => b,
        (_, Pat::Empty) => a,
        _ => Rc::new(Pat::Interleave(a, b)),
    }
}

fn after<'g>(a: P<'g>, b: P<'g>) -> P<'g> {
    if a.is_not_allowed() || b.is_not_allowed() {
        not_allowed()
    } else {
        Rc::new(Pat::After(a, b))
    }
}

fn one_or_more<'g>(p: P<'g>) -> P<'g> {
    if p.is_not_allowed() {
        p
    } else {
        Rc::new(Pat::OneOrMore(p))
    }
}

/// Rebuilds every `After(x, y)` leaf of `p` as `After(x, f(y))`.
fn apply_after<'g>(p: &P<'g>, f: &dyn Fn(P<'g>) -> P<'g>) -> P<'g> {
    match &**p {
        Pat::After(a, b) => after(a.clone(), f(b.clone())),
        Pat::Choice(a, b) => choice(apply_after(a, f), apply_after(b, f)),
        _ => not_allowed(),
    }
}

struct Evaluator<'g, 'd, 'input> {
    grammar: &'g Grammar,
    doc: &'d Document<'input>,
    failure: Option<Evidence>,
}

impl<'g> Evaluator<'g, '_, '_> {
    /// Lowers a pattern, inlining references. Element content is lowered
    /// lazily when the element is entered.
    fn compile(&self, pattern: &'g Pattern, stack: &mut Vec<&'g str>) -> Result<P<'g>, VerifierError> {
        let fold = |this: &Self,
                    members: &'g [Pattern],
                    unit: P<'g>,
                    join: fn(P<'g>, P<'g>) -> P<'g>,
                    stack: &mut Vec<&'g str>|
         -> Result<P<'g>, VerifierError> {
            let mut acc: Option<P<'g>> = None;
            for member in members.iter().rev() {
                let p = this.compile(member, stack)?;
                acc = Some(match acc {
                    None => p,
                    Some(rest) => join(p, rest),
                });
            }
            Ok(acc.unwrap_or(unit))
        };
        Ok(match pattern {
            Pattern::Empty => empty(),
            Pattern::Text => Rc::new(Pat::Text),
            Pattern::Value(v) => Rc::new(Pat::Value(v)),
            Pattern::Element { name, content } => Rc::new(Pat::Element(name, content)),
            Pattern::Attribute { name, value } => Rc::new(Pat::Attribute(name, value)),
            Pattern::Group(members) => fold(self, members, empty(), group, stack)?,
            Pattern::Interleave(members) => fold(self, members, empty(), interleave, stack)?,
            Pattern::Choice(members) => fold(self, members, not_allowed(), choice, stack)?,
            Pattern::Optional(p) => choice(self.compile(p, stack)?, empty()),
            Pattern::ZeroOrMore(p) => choice(one_or_more(self.compile(p, stack)?), empty()),
            Pattern::OneOrMore(p) => one_or_more(self.compile(p, stack)?),
            Pattern::Ref(name) => {
                if stack.contains(&name.as_str()) {
                    return Err(VerifierError::RecursiveProduction(name.clone()));
                }
                let target = self
                    .grammar
                    .production(name)
                    .ok_or_else(|| VerifierError::UndefinedProduction(name.clone()))?;
                stack.push(name);
                let compiled = self.compile(target, stack);
                stack.pop();
                compiled?
            }
        })
    }

    fn evidence_at(&self, node: Node<'_, '_>, message: impl Into<String>) -> Evidence {
        let range = node.range();
        let pos = self.doc.text_pos_at(range.start);
        let text = self.doc.input_text();
        let fragment = text.get(range).unwrap_or_default();
        let mut evidence = Evidence::message(message).at_line(pos.row as usize);
        evidence.column = Some(pos.col as usize);
        evidence.offset = Some(node.range().start);
        if !fragment.is_empty() {
            evidence.fragment = Some(excerpt(fragment));
        }
        evidence
    }

    fn fail(&mut self, node: Node<'_, '_>, message: String) {
        if self.failure.is_none() {
            self.failure = Some(self.evidence_at(node, message));
        }
    }

    fn child_deriv(&mut self, p: &P<'g>, node: Node<'_, '_>) -> Result<P<'g>, VerifierError> {
        if node.is_text() {
            let text = node.text().unwrap_or_default();
            let d = self.text_deriv(p, text);
            if d.is_not_allowed() {
                self.fail(node, format!("unexpected text {:?}", excerpt(text)));
            }
            return Ok(d);
        }

        let tag = node.tag_name();
        let ns = tag.namespace().unwrap_or_default();
        let local = tag.name();
        let display = qualified(ns, local);

        let mut d = self.start_tag_open_deriv(p, ns, local, &mut Vec::new())?;
        if d.is_not_allowed() {
            self.fail(node, format!("element {display} is not allowed here"));
            return Ok(d);
        }
        for attribute in node.attributes() {
            d = att_deriv(&d, attribute.namespace().unwrap_or_default(), attribute.name(), attribute.value());
            if d.is_not_allowed() {
                self.fail(
                    node,
                    format!(
                        "attribute {} with value {:?} is not allowed on {display}",
                        qualified(attribute.namespace().unwrap_or_default(), attribute.name()),
                        attribute.value()
                    ),
                );
                return Ok(d);
            }
        }
        d = start_tag_close_deriv(&d);
        if d.is_not_allowed() {
            self.fail(node, format!("element {display} is missing a required attribute"));
            return Ok(d);
        }

        let children: Vec<Node<'_, '_>> = node
            .children()
            .filter(|c| matches!(c.node_type(), NodeType::Element | NodeType::Text))
            .collect();
        let has_elements = children.iter().any(Node::is_element);
        let significant: Vec<Node<'_, '_>> = children
            .iter()
            .copied()
            .filter(|c| !(has_elements && c.is_text() && is_whitespace(c.text().unwrap_or_default())))
            .collect();

        if significant.is_empty() {
            d = choice(d.clone(), self.text_deriv(&d, ""));
        } else if let [only] = significant.as_slice() {
            if only.is_text() && is_whitespace(only.text().unwrap_or_default()) {
                let t = self.text_deriv(&d, only.text().unwrap_or_default());
                d = choice(d, t);
            } else {
                d = self.child_deriv(&d, *only)?;
            }
        } else {
            for child in significant {
                d = self.child_deriv(&d, child)?;
                if d.is_not_allowed() {
                    return Ok(d);
                }
            }
        }
        if d.is_not_allowed() {
            return Ok(d);
        }

        let end = end_tag_deriv(&d);
        if end.is_not_allowed() {
            self.fail(node, format!("element {display} is missing required content"));
        }
        Ok(end)
    }

    fn text_deriv(&self, p: &P<'g>, text: &str) -> P<'g> {
        match &**p {
            Pat::Choice(a, b) => choice(self.text_deriv(a, text), self.text_deriv(b, text)),
            Pat::Interleave(a, b) => choice(
                interleave(self.text_deriv(a, text), b.clone()),
                interleave(a.clone(), self.text_deriv(b, text)),
            ),
            Pat::Group(a, b) => {
                let first = group(self.text_deriv(a, text), b.clone());
                if a.nullable() {
                    choice(first, self.text_deriv(b, text))
                } else {
                    first
                }
            }
            Pat::After(a, b) => after(self.text_deriv(a, text), b.clone()),
            Pat::OneOrMore(inner) => group(
                self.text_deriv(inner, text),
                choice(p.clone(), empty()),
            ),
            Pat::Text => p.clone(),
            Pat::Value(v) if v.matches(text) => empty(),
            _ => not_allowed(),
        }
    }

    fn start_tag_open_deriv(
        &self,
        p: &P<'g>,
        ns: &str,
        local: &str,
        stack: &mut Vec<&'g str>,
    ) -> Result<P<'g>, VerifierError> {
        Ok(match &**p {
            Pat::Choice(a, b) => choice(
                self.start_tag_open_deriv(a, ns, local, stack)?,
                self.start_tag_open_deriv(b, ns, local, stack)?,
            ),
            Pat::Element(name, content) => {
                if name.contains(ns, local) {
                    after(self.compile(content, stack)?, empty())
                } else {
                    not_allowed()
                }
            }
            Pat::Interleave(a, b) => {
                let left = self.start_tag_open_deriv(a, ns, local, stack)?;
                let right = self.start_tag_open_deriv(b, ns, local, stack)?;
                let (a, b) = (a.clone(), b.clone());
                choice(
                    apply_after(&left, &|x| interleave(x, b.clone())),
                    apply_after(&right, &|x| interleave(a.clone(), x)),
                )
            }
            Pat::OneOrMore(inner) => {
                let d = self.start_tag_open_deriv(inner, ns, local, stack)?;
                let rest = choice(p.clone(), empty());
                apply_after(&d, &|x| group(x, rest.clone()))
            }
            Pat::Group(a, b) => {
                let d = self.start_tag_open_deriv(a, ns, local, stack)?;
                let b2 = b.clone();
                let first = apply_after(&d, &|x| group(x, b2.clone()));
                if a.nullable() {
                    choice(first, self.start_tag_open_deriv(b, ns, local, stack)?)
                } else {
                    first
                }
            }
            Pat::After(a, b) => {
                let d = self.start_tag_open_deriv(a, ns, local, stack)?;
                let b2 = b.clone();
                apply_after(&d, &|x| after(x, b2.clone()))
            }
            _ => not_allowed(),
        })
    }
}

fn att_deriv<'g>(p: &P<'g>, ns: &str, local: &str, value: &str) -> P<'g> {
    match &**p {
        Pat::After(a, b) => after(att_deriv(a, ns, local, value), b.clone()),
        Pat::Choice(a, b) => choice(att_deriv(a, ns, local, value), att_deriv(b, ns, local, value)),
        Pat::Group(a, b) => choice(
            group(att_deriv(a, ns, local, value), b.clone()),
            group(a.clone(), att_deriv(b, ns, local, value)),
        ),
        Pat::Interleave(a, b) => choice(
            interleave(att_deriv(a, ns, local, value), b.clone()),
            interleave(a.clone(), att_deriv(b, ns, local, value)),
        ),
        Pat::OneOrMore(inner) => group(
            att_deriv(inner, ns, local, value),
            choice(p.clone(), empty()),
        ),
        Pat::Attribute(name, v) if name.contains(ns, local) && v.matches(value) => empty(),
        _ => not_allowed(),
    }
}

fn start_tag_close_deriv<'g>(p: &P<'g>) -> P<'g> {
    match &**p {
        Pat::After(a, b) => after(start_tag_close_deriv(a), b.clone()),
        Pat::Choice(a, b) => choice(start_tag_close_deriv(a), start_tag_close_deriv(b)),
        Pat::Group(a, b) => group(start_tag_close_deriv(a), start_tag_close_deriv(b)),
        Pat::Interleave(a, b) => interleave(start_tag_close_deriv(a), start_tag_close_deriv(b)),
        Pat::OneOrMore(inner) => one_or_more(start_tag_close_deriv(inner)),
        Pat::Attribute(..) => not_allowed(),
        _ => p.clone(),
    }
}

fn end_tag_deriv<'g>(p: &P<'g>) -> P<'g> {
    match &**p {
        Pat::Choice(a, b) => choice(end_tag_deriv(a), end_tag_deriv(b)),
        Pat::After(a, b) if a.nullable() => b.clone(),
        _ => not_allowed(),
    }
}

fn is_whitespace(text: &str) -> bool {
    text.chars().all(char::is_whitespace)
}

fn qualified(ns: &str, local: &str) -> String {
    if ns.is_empty() {
        local.to_string()
    } else {
        format!("{{{ns}}}{local}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures;
    use crate::xmlns;

    fn atom(local: &str) -> NameClass {
        NameClass::qualified(xmlns::ATOM, local)
    }

    fn feed_grammar() -> Grammar {
        Grammar::new(Pattern::open_element(
            atom("feed"),
            Pattern::interleave([
                Pattern::element(atom("id"), Pattern::Text),
                Pattern::open_element(atom("title"), Pattern::Text),
                Pattern::zero_or_more(Pattern::any_element_except([atom("id"), atom("title")])),
            ]),
        ))
        .with_standard_library()
    }

    #[test]
    fn accepts_conforming_feed() {
        let result = TreeVerifier
            .verify(&feed_grammar(), fixtures::ATOM_FEED_PEOPLE)
            .expect("grammar");
        assert_eq!(result, VerificationResult::Pass);
    }

    #[test]
    fn reports_missing_content_at_the_element() {
        let result = TreeVerifier
            .verify(&feed_grammar(), fixtures::ATOM_FEED_NO_TITLE)
            .expect("grammar");
        let evidence = result.evidence().expect("failure");
        assert_eq!(evidence.line, Some(2));
        assert!(evidence.message.contains("missing required content"));
    }

    #[test]
    fn attribute_literals_are_enforced() {
        let grammar = Grammar::new(Pattern::element(
            NameClass::local("a"),
            Pattern::attribute_equals(NameClass::local("x"), "1"),
        ));
        assert!(TreeVerifier.verify(&grammar, r#"<a x="1"/>"#).expect("grammar").is_pass());
        let bad = TreeVerifier.verify(&grammar, r#"<a x="2"/>"#).expect("grammar");
        assert!(bad.evidence().expect("failure").message.contains("attribute x"));
        let missing = TreeVerifier.verify(&grammar, "<a/>").expect("grammar");
        assert!(missing.evidence().expect("failure").message.contains("missing a required attribute"));
    }

    #[test]
    fn groups_enforce_order_and_report_the_offending_line() {
        let grammar = Grammar::new(Pattern::element(
            NameClass::local("r"),
            Pattern::group([
                Pattern::empty_element(NameClass::local("a")),
                Pattern::empty_element(NameClass::local("b")),
            ]),
        ))
        .with_standard_library();
        assert!(TreeVerifier.verify(&grammar, "<r><a/><b/></r>").expect("grammar").is_pass());
        let swapped = TreeVerifier
            .verify(&grammar, "<r>\n<b/>\n<a/>\n</r>")
            .expect("grammar");
        assert_eq!(swapped.evidence().and_then(|e| e.line), Some(2));
    }

    #[test]
    fn empty_elements_reject_content() {
        let grammar = Grammar::new(Pattern::empty_element(NameClass::local("e")))
            .with_standard_library();
        assert!(TreeVerifier.verify(&grammar, r#"<e k="v">  </e>"#).expect("grammar").is_pass());
        assert!(!TreeVerifier.verify(&grammar, "<e>text</e>").expect("grammar").is_pass());
    }

    #[test]
    fn link_relations() {
        let grammar = Grammar::new(Pattern::open_element(
            atom("entry"),
            Pattern::interleave([
                Pattern::link_with_rel(xmlns::ATOM, &["edit", "self"]),
                Pattern::zero_or_more(Pattern::any_element_except([atom("link")])),
            ]),
        ))
        .with_standard_library();
        let ok = r#"<entry xmlns="http://www.w3.org/2005/Atom"><id/><link rel="self" href="x"/></entry>"#;
        let bad = r#"<entry xmlns="http://www.w3.org/2005/Atom"><id/><link rel="alternate" href="x"/></entry>"#;
        assert!(TreeVerifier.verify(&grammar, ok).expect("grammar").is_pass());
        assert!(!TreeVerifier.verify(&grammar, bad).expect("grammar").is_pass());
    }

    #[test]
    fn grammar_faults_are_errors() {
        let undefined = Grammar::new(Pattern::Ref("nowhere".into()));
        assert_eq!(
            TreeVerifier.verify(&undefined, "<a/>"),
            Err(VerifierError::UndefinedProduction("nowhere".into()))
        );
        let looping = Grammar::new(Pattern::Ref("loop".into()))
            .define("loop", Pattern::choice([Pattern::Ref("loop".into()), Pattern::Empty]));
        assert_eq!(
            TreeVerifier.verify(&looping, "<a/>"),
            Err(VerifierError::RecursiveProduction("loop".into()))
        );
    }

    #[test]
    fn malformed_documents_fail_with_position() {
        let result = TreeVerifier
            .verify(&feed_grammar(), "<feed>\n<id>\n</feed>")
            .expect("grammar");
        assert!(result.evidence().expect("failure").message.contains("not well-formed"));
    }
}
