//! `$expand` / `$select` path expressions.
//!
//! An expression is a comma-separated list of branches; each branch is a
//! `/`-chained path, optionally followed (OData 4.0) by nested query options
//! in parentheses:
//!
//! ```
//! use odata_edm::ExpandTree;
//!
//! let tree = ExpandTree::parse("Orders($select=Id;$expand=Items),Customer/Address").unwrap();
//! assert_eq!(
//!     tree.paths(),
//!     vec![
//!         vec!["Orders".to_string(), "Items".to_string()],
//!         vec!["Customer".to_string(), "Address".to_string()],
//!     ]
//! );
//! ```

use crate::error::EdmError;

/// One branch of an expand expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandItem {
    /// Chained path segments.
    pub path: Vec<String>,
    /// Nested query options other than `$expand`, as `(name, value)`.
    pub options: Vec<(String, String)>,
    /// Nested `$expand`, if any.
    pub nested: Option<ExpandTree>,
}

/// A parsed expand (or select) expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandTree {
    /// Top-level branches, in the order written.
    pub items: Vec<ExpandItem>,
}

impl ExpandTree {
    /// Parses an expression.
    ///
    /// # Errors
    ///
    /// [`EdmError::MalformedPath`] for empty branches, empty segments,
    /// unbalanced parentheses or unterminated quotes.
    pub fn parse(expression: &str) -> Result<Self, EdmError> {
        let malformed = || EdmError::MalformedPath(expression.to_string());
        let mut items = Vec::new();
        for branch in split_top_level(expression, ',').ok_or_else(malformed)? {
            let branch = branch.trim();
            if branch.is_empty() {
                return Err(malformed());
            }
            let (path_text, options_text) = match branch.find('(') {
                Some(open) => {
                    let inner = branch[open + 1..]
                        .strip_suffix(')')
                        .ok_or_else(malformed)?;
                    (&branch[..open], Some(inner))
                }
                None => (branch, None),
            };
            let path: Vec<String> = path_text.split('/').map(|s| s.trim().to_string()).collect();
            if path.iter().any(String::is_empty) {
                return Err(malformed());
            }

            let mut options = Vec::new();
            let mut nested = None;
            if let Some(text) = options_text {
                for option in split_top_level(text, ';').ok_or_else(malformed)? {
                    let Some((name, value)) = option.split_once('=') else {
                        continue;
                    };
                    let name = name.trim().trim_start_matches('$').to_ascii_lowercase();
                    if name == "expand" {
                        nested = Some(ExpandTree::parse(value)?);
                    } else {
                        options.push((name, value.trim().to_string()));
                    }
                }
            }
            items.push(ExpandItem {
                path,
                options,
                nested,
            });
        }
        Ok(Self { items })
    }

    /// Flattens the tree into one full segment list per leaf.
    #[must_use]
    pub fn paths(&self) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        for item in &self.items {
            match &item.nested {
                Some(nested) if !nested.items.is_empty() => {
                    for tail in nested.paths() {
                        let mut full = item.path.clone();
                        full.extend(tail);
                        out.push(full);
                    }
                }
                _ => out.push(item.path.clone()),
            }
        }
        out
    }

    /// True when no branch was given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Splits on `sep` where it appears outside parentheses and single-quoted
/// literals. Returns `None` if parentheses or quotes are unbalanced.
pub fn split_top_level(text: &str, sep: char) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_quote = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            c if c == sep && !in_quote && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if depth != 0 || in_quote {
        return None;
    }
    parts.push(&text[start..]);
    Some(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(paths: &[&[&str]]) -> Vec<Vec<String>> {
        paths
            .iter()
            .map(|p| p.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn branches_and_chains() {
        let tree = ExpandTree::parse("A/B, C").expect("parse");
        assert_eq!(tree.paths(), owned(&[&["A", "B"], &["C"]]));
    }

    #[test]
    fn nested_options_are_separated() {
        let tree = ExpandTree::parse("Orders($select=Id;$top=2;$expand=Items($expand=Product),Notes)")
            .expect("parse");
        assert_eq!(tree.items.len(), 1);
        assert_eq!(
            tree.items[0].options,
            vec![
                ("select".to_string(), "Id".to_string()),
                ("top".to_string(), "2".to_string())
            ]
        );
        assert_eq!(
            tree.paths(),
            owned(&[&["Orders", "Items", "Product"], &["Orders", "Notes"]])
        );
    }

    #[test]
    fn quoted_separators_do_not_split() {
        let parts = split_top_level("a eq 'x,y',b", ',').expect("balanced");
        assert_eq!(parts, vec!["a eq 'x,y'", "b"]);
    }

    #[test]
    fn malformed_expressions_fail() {
        assert!(ExpandTree::parse("A,,B").is_err());
        assert!(ExpandTree::parse("A/").is_err());
        assert!(ExpandTree::parse("A($expand=B").is_err());
        assert!(ExpandTree::parse("A)").is_err());
    }
}
