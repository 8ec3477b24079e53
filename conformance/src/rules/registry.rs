//! The rule registry.

use std::collections::HashSet;
use std::sync::OnceLock;

use tracing::warn;

use super::{Category, Rule};
use crate::validators;

/// An immutable set of rules with unique identifiers.
pub struct RuleRegistry {
    rules: Vec<Box<dyn Rule>>,
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|r| r.descriptor().id))
            .finish()
    }
}

impl RuleRegistry {
    /// Registers `rules`. A rule whose identifier is already taken is
    /// dropped with a warning.
    #[must_use]
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        let mut seen = HashSet::new();
        let rules = rules
            .into_iter()
            .filter(|rule| {
                let id = rule.descriptor().id;
                let fresh = seen.insert(id);
                if !fresh {
                    warn!(rule = id, "duplicate rule identifier ignored");
                }
                fresh
            })
            .collect();
        Self { rules }
    }

    /// The built-in rules, registered once per process.
    #[must_use]
    pub fn builtin() -> &'static RuleRegistry {
        static BUILTIN: OnceLock<RuleRegistry> = OnceLock::new();
        BUILTIN.get_or_init(|| Self::new(validators::builtin_rules()))
    }

    /// Every rule, in registration order.
    pub fn rules(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    /// Rules of one category.
    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &dyn Rule> {
        self.rules()
            .filter(move |r| r.descriptor().category == category)
    }

    /// Looks a rule up by identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&dyn Rule> {
        self.rules().find(|r| r.descriptor().id == id)
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rule is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
