//! Navigation stacks: expand and select paths resolved against the model.

use crate::error::EdmError;
use crate::expand::ExpandTree;
use crate::model::{EntityTypeId, MetadataModel, Multiplicity};

/// One resolved step of a navigation path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationStep {
    /// Navigation property followed.
    pub property: String,
    /// Entity type the step starts from.
    pub source: EntityTypeId,
    /// Entity type reached.
    pub target: EntityTypeId,
    /// Cardinality of the reached end.
    pub multiplicity: Multiplicity,
}

/// An ordered sequence of navigation steps, one per path segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationStack {
    /// Steps in path order.
    pub steps: Vec<NavigationStep>,
}

impl NavigationStack {
    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True for the empty stack.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Entity type reached by the last step.
    #[must_use]
    pub fn target(&self) -> Option<EntityTypeId> {
        self.steps.last().map(|s| s.target)
    }

    /// Property names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.property.as_str()).collect()
    }
}

impl MetadataModel {
    /// Resolves a chain of navigation segments starting at `start`.
    ///
    /// Resolution fails closed: the first segment that is not a navigation
    /// property of the type reached so far (or whose relationship does not
    /// resolve) fails the whole path. A single segment spelled with `.`
    /// separators is accepted as a chained path when it is not itself a
    /// property name.
    ///
    /// # Errors
    ///
    /// [`EdmError::UnknownNavigation`], [`EdmError::UnresolvedRelationship`],
    /// [`EdmError::UnresolvedRole`] or [`EdmError::UnknownType`].
    pub fn resolve_navigation_stack<S: AsRef<str>>(
        &self,
        start: EntityTypeId,
        segments: &[S],
    ) -> Result<NavigationStack, EdmError> {
        let mut expanded: Vec<&str> = Vec::new();
        for segment in segments {
            let segment = segment.as_ref();
            expanded.extend(self.split_legacy_segment(start, &expanded, segment));
        }

        let mut steps = Vec::with_capacity(expanded.len());
        let mut current = start;
        for segment in expanded {
            let end = self.navigation_end(current, segment)?;
            steps.push(NavigationStep {
                property: segment.to_string(),
                source: current,
                target: end.target,
                multiplicity: end.multiplicity,
            });
            current = end.target;
        }
        Ok(NavigationStack { steps })
    }

    /// Resolves every leaf path of an expand tree.
    ///
    /// # Errors
    ///
    /// Fails on the first path that does not resolve.
    pub fn resolve_expand(
        &self,
        start: EntityTypeId,
        tree: &ExpandTree,
    ) -> Result<Vec<NavigationStack>, EdmError> {
        tree.paths()
            .iter()
            .map(|path| self.resolve_navigation_stack(start, path))
            .collect()
    }

    /// Splits `A.B` into `[A, B]` when `A.B` is not a navigation property of
    /// the type reached after `prefix`, but `A` is.
    fn split_legacy_segment<'s>(
        &self,
        start: EntityTypeId,
        prefix: &[&str],
        segment: &'s str,
    ) -> Vec<&'s str> {
        if !segment.contains('.') {
            return vec![segment];
        }
        let reached = prefix.iter().try_fold(start, |t, s| {
            self.navigation_end(t, s).ok().map(|e| e.target)
        });
        let Some(reached) = reached else {
            return vec![segment];
        };
        if self.navigation_property(reached, segment).is_some() {
            return vec![segment];
        }
        let parts: Vec<&str> = segment.split('.').collect();
        let chained = parts.iter().try_fold(reached, |t, s| {
            self.navigation_end(t, s).ok().map(|e| e.target)
        });
        if chained.is_some() {
            parts
        } else {
            vec![segment]
        }
    }
}
