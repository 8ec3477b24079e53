//! Tree grammars for XML payloads.
//!
//! A [`Grammar`] is a start pattern plus named productions, in the spirit
//! of RELAX NG. Rules build one per invocation from metadata-derived names
//! and the standard productions installed by [`Grammar::with_standard_library`]:
//!
//! | Production | Matches |
//! |------------|---------|
//! | `anyElement` | any element with any attributes and content |
//! | `anyContent` | any mix of attributes, text and elements |
//! | `anyAttributes` | zero or more attributes with any name and value |
//!
//! ```
//! use odata_conformance::verifiers::grammar::{Grammar, NameClass, Pattern};
//!
//! let atom = "http://www.w3.org/2005/Atom";
//! let grammar = Grammar::new(Pattern::open_element(
//!     NameClass::qualified(atom, "feed"),
//!     Pattern::interleave([
//!         Pattern::open_element(NameClass::qualified(atom, "id"), Pattern::Text),
//!         Pattern::zero_or_more(Pattern::any_element()),
//!     ]),
//! ))
//! .namespace("atom", atom)
//! .with_standard_library();
//! assert!(grammar.render().contains("element atom:feed"));
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

/// Name of the any-element production.
pub const ANY_ELEMENT: &str = "anyElement";
/// Name of the any-content production.
pub const ANY_CONTENT: &str = "anyContent";
/// Name of the any-attributes production.
pub const ANY_ATTRIBUTES: &str = "anyAttributes";

/// Element or attribute names a pattern accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum NameClass {
    /// Exactly one expanded name. An empty namespace means "no namespace".
    Name {
        /// Namespace URI.
        ns: String,
        /// Local name.
        local: String,
    },
    /// Any name.
    AnyName,
    /// Any name in the namespace.
    NsName(String),
    /// Names matched by the first class but not the second.
    Except(Box<NameClass>, Box<NameClass>),
    /// Names matched by any member.
    Choice(Vec<NameClass>),
}

impl NameClass {
    /// A namespace-qualified name.
    #[must_use]
    pub fn qualified(ns: impl Into<String>, local: impl Into<String>) -> Self {
        Self::Name {
            ns: ns.into(),
            local: local.into(),
        }
    }

    /// A name in no namespace (the usual case for attributes).
    #[must_use]
    pub fn local(local: impl Into<String>) -> Self {
        Self::qualified("", local)
    }

    /// Any name except the given ones.
    #[must_use]
    pub fn any_except(names: impl IntoIterator<Item = NameClass>) -> Self {
        Self::Except(
            Box::new(Self::AnyName),
            Box::new(Self::Choice(names.into_iter().collect())),
        )
    }

    /// True when the class accepts `{ns}local`.
    #[must_use]
    pub fn contains(&self, ns: &str, local: &str) -> bool {
        match self {
            Self::Name { ns: n, local: l } => n == ns && l == local,
            Self::AnyName => true,
            Self::NsName(n) => n == ns,
            Self::Except(base, except) => base.contains(ns, local) && !except.contains(ns, local),
            Self::Choice(members) => members.iter().any(|m| m.contains(ns, local)),
        }
    }
}

/// Constraint on attribute values and element text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ValuePattern {
    /// Any value.
    Any,
    /// Equal to the literal after whitespace normalization.
    Literal(String),
    /// Equal to one of the literals after whitespace normalization.
    OneOf(Vec<String>),
    /// Any value with at least one non-whitespace character.
    NonEmpty,
}

impl ValuePattern {
    /// True when `value` satisfies the pattern.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
        match self {
            Self::Any => true,
            Self::Literal(literal) => normalized == normalize(literal),
            Self::OneOf(literals) => literals.iter().any(|l| normalized == normalize(l)),
            Self::NonEmpty => !normalized.is_empty(),
        }
    }
}

fn normalize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A content pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Pattern {
    /// Nothing.
    Empty,
    /// Any text, including none.
    Text,
    /// Text satisfying a value pattern.
    Value(ValuePattern),
    /// An element and its content.
    Element {
        /// Accepted names.
        name: NameClass,
        /// Attributes and children.
        content: Box<Pattern>,
    },
    /// One attribute.
    Attribute {
        /// Accepted names.
        name: NameClass,
        /// Accepted values.
        value: ValuePattern,
    },
    /// Members in order.
    Group(Vec<Pattern>),
    /// Members in any order.
    Interleave(Vec<Pattern>),
    /// Exactly one member.
    Choice(Vec<Pattern>),
    /// Zero or one occurrence.
    Optional(Box<Pattern>),
    /// Zero or more occurrences.
    ZeroOrMore(Box<Pattern>),
    /// One or more occurrences.
    OneOrMore(Box<Pattern>),
    /// A named production.
    Ref(String),
}

impl Pattern {
    /// `element name { content }`.
    #[must_use]
    pub fn element(name: NameClass, content: Pattern) -> Self {
        Self::Element {
            name,
            content: Box::new(content),
        }
    }

    /// An element that also accepts any attributes besides those `content`
    /// names.
    #[must_use]
    pub fn open_element(name: NameClass, content: Pattern) -> Self {
        Self::element(name, Self::interleave([Self::any_attributes(), content]))
    }

    /// An element with any attributes and no content.
    #[must_use]
    pub fn empty_element(name: NameClass) -> Self {
        Self::element(name, Self::any_attributes())
    }

    /// `attribute name { value }`.
    #[must_use]
    pub fn attribute(name: NameClass, value: ValuePattern) -> Self {
        Self::Attribute { name, value }
    }

    /// An attribute whose value must equal `literal`.
    #[must_use]
    pub fn attribute_equals(name: NameClass, literal: impl Into<String>) -> Self {
        Self::attribute(name, ValuePattern::Literal(literal.into()))
    }

    /// An Atom `link` whose `rel` is one of `rels`, with any other
    /// attributes and content.
    #[must_use]
    pub fn link_with_rel<S: AsRef<str>>(atom_ns: &str, rels: &[S]) -> Self {
        Self::element(
            NameClass::qualified(atom_ns, "link"),
            Self::interleave([
                Self::attribute(
                    NameClass::local("rel"),
                    ValuePattern::OneOf(rels.iter().map(|r| r.as_ref().to_string()).collect()),
                ),
                Self::any_attributes(),
                Self::any_content(),
            ]),
        )
    }

    /// Any element except those named.
    #[must_use]
    pub fn any_element_except(names: impl IntoIterator<Item = NameClass>) -> Self {
        Self::element(NameClass::any_except(names), Self::any_content())
    }

    /// Reference to `anyElement`.
    #[must_use]
    pub fn any_element() -> Self {
        Self::Ref(ANY_ELEMENT.to_string())
    }

    /// Reference to `anyContent`.
    #[must_use]
    pub fn any_content() -> Self {
        Self::Ref(ANY_CONTENT.to_string())
    }

    /// Reference to `anyAttributes`.
    #[must_use]
    pub fn any_attributes() -> Self {
        Self::Ref(ANY_ATTRIBUTES.to_string())
    }

    /// Sequence.
    #[must_use]
    pub fn group(members: impl IntoIterator<Item = Pattern>) -> Self {
        Self::Group(members.into_iter().collect())
    }

    /// Unordered sequence.
    #[must_use]
    pub fn interleave(members: impl IntoIterator<Item = Pattern>) -> Self {
        Self::Interleave(members.into_iter().collect())
    }

    /// Alternatives.
    #[must_use]
    pub fn choice(members: impl IntoIterator<Item = Pattern>) -> Self {
        Self::Choice(members.into_iter().collect())
    }

    /// `p?`
    #[must_use]
    pub fn optional(pattern: Pattern) -> Self {
        Self::Optional(Box::new(pattern))
    }

    /// `p*`
    #[must_use]
    pub fn zero_or_more(pattern: Pattern) -> Self {
        Self::ZeroOrMore(Box::new(pattern))
    }

    /// `p+`
    #[must_use]
    pub fn one_or_more(pattern: Pattern) -> Self {
        Self::OneOrMore(Box::new(pattern))
    }
}

/// A start pattern plus named productions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grammar {
    start: Pattern,
    defines: BTreeMap<String, Pattern>,
    namespaces: Vec<(String, String)>,
}

impl Grammar {
    /// A grammar whose documents must match `start`.
    #[must_use]
    pub fn new(start: Pattern) -> Self {
        Self {
            start,
            defines: BTreeMap::new(),
            namespaces: Vec::new(),
        }
    }

    /// Adds or replaces a named production.
    #[must_use]
    pub fn define(mut self, name: impl Into<String>, pattern: Pattern) -> Self {
        self.defines.insert(name.into(), pattern);
        self
    }

    /// Declares a prefix used when rendering names.
    #[must_use]
    pub fn namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.push((prefix.into(), uri.into()));
        self
    }

    /// Installs `anyElement`, `anyContent` and `anyAttributes`.
    #[must_use]
    pub fn with_standard_library(self) -> Self {
        let any_attribute = Pattern::attribute(NameClass::AnyName, ValuePattern::Any);
        self.define(
            ANY_ELEMENT,
            Pattern::element(NameClass::AnyName, Pattern::any_content()),
        )
        .define(
            ANY_CONTENT,
            Pattern::zero_or_more(Pattern::choice([
                any_attribute.clone(),
                Pattern::Text,
                Pattern::any_element(),
            ])),
        )
        .define(ANY_ATTRIBUTES, Pattern::zero_or_more(any_attribute))
    }

    /// Start pattern.
    #[must_use]
    pub fn start(&self) -> &Pattern {
        &self.start
    }

    /// Production by name.
    #[must_use]
    pub fn production(&self, name: &str) -> Option<&Pattern> {
        self.defines.get(name)
    }

    /// Compact text form, for evidence and debugging.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (prefix, uri) in &self.namespaces {
            let _ = writeln!(out, "namespace {prefix} = \"{uri}\"");
        }
        let _ = writeln!(out, "start = {}", self.render_pattern(&self.start));
        for (name, pattern) in &self.defines {
            let _ = writeln!(out, "{name} = {}", self.render_pattern(pattern));
        }
        out
    }

    fn render_name(&self, name: &NameClass) -> String {
        match name {
            NameClass::Name { ns, local } if ns.is_empty() => local.clone(),
            NameClass::Name { ns, local } => match self.namespaces.iter().find(|(_, u)| u == ns) {
                Some((prefix, _)) => format!("{prefix}:{local}"),
                None => format!("{{{ns}}}{local}"),
            },
            NameClass::AnyName => "*".to_string(),
            NameClass::NsName(ns) => match self.namespaces.iter().find(|(_, u)| u == ns) {
                Some((prefix, _)) => format!("{prefix}:*"),
                None => format!("{{{ns}}}*"),
            },
            NameClass::Except(base, except) => {
                format!("{} - {}", self.render_name(base), self.render_name(except))
            }
            NameClass::Choice(members) => {
                let parts: Vec<String> = members.iter().map(|m| self.render_name(m)).collect();
                format!("({})", parts.join(" | "))
            }
        }
    }

    fn render_pattern(&self, pattern: &Pattern) -> String {
        let join = |members: &[Pattern], sep: &str| {
            let parts: Vec<String> = members.iter().map(|m| self.render_pattern(m)).collect();
            format!("({})", parts.join(sep))
        };
        match pattern {
            Pattern::Empty => "empty".to_string(),
            Pattern::Text => "text".to_string(),
            Pattern::Value(value) => render_value(value),
            Pattern::Element { name, content } => format!(
                "element {} {{ {} }}",
                self.render_name(name),
                self.render_pattern(content)
            ),
            Pattern::Attribute { name, value } => format!(
                "attribute {} {{ {} }}",
                self.render_name(name),
                render_value(value)
            ),
            Pattern::Group(members) => join(members, ", "),
            Pattern::Interleave(members) => join(members, " & "),
            Pattern::Choice(members) => join(members, " | "),
            Pattern::Optional(p) => format!("{}?", self.render_pattern(p)),
            Pattern::ZeroOrMore(p) => format!("{}*", self.render_pattern(p)),
            Pattern::OneOrMore(p) => format!("{}+", self.render_pattern(p)),
            Pattern::Ref(name) => name.clone(),
        }
    }
}

fn render_value(value: &ValuePattern) -> String {
    match value {
        ValuePattern::Any => "text".to_string(),
        ValuePattern::NonEmpty => "xsd:string { minLength = \"1\" }".to_string(),
        ValuePattern::Literal(l) => format!("{l:?}"),
        ValuePattern::OneOf(ls) => ls
            .iter()
            .map(|l| format!("{l:?}"))
            .collect::<Vec<_>>()
            .join(" | "),
    }
}
