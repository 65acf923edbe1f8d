//! Cascade selection of accounts to import.
//!
//! Selecting an account pulls in every eligible account above and below it:
//! a child cannot be imported without its parents. Deselecting only clears
//! the account and the accounts below it; parents stay because siblings may
//! still need them.

use crate::error::{EngineError, Result};
use crate::tree::AccountTree;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionSet(BTreeSet<String>);

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn codes(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

pub struct CascadeSelector<'a> {
    tree: &'a AccountTree,
}

impl<'a> CascadeSelector<'a> {
    pub fn new(tree: &'a AccountTree) -> Self {
        Self { tree }
    }

    pub fn is_eligible(&self, code: &str) -> bool {
        self.tree.get(code).is_some_and(|node| node.is_eligible())
    }

    /// Adds `code` with its eligible ancestors and descendants. Ineligible
    /// or unknown codes leave the selection untouched.
    pub fn select(&self, selection: &SelectionSet, code: &str) -> SelectionSet {
        let mut next = selection.clone();
        if !self.is_eligible(code) {
            return next;
        }

        next.0.insert(code.to_string());
        for descendant in self.tree.prefix_descendants(code) {
            if self.is_eligible(descendant) {
                next.0.insert(descendant.to_string());
            }
        }
        for ancestor in self.tree.prefix_ancestors(code) {
            if self.is_eligible(ancestor) {
                next.0.insert(ancestor.to_string());
            }
        }

        next
    }

    /// Removes `code` and its eligible descendants. Ancestors are kept.
    pub fn deselect(&self, selection: &SelectionSet, code: &str) -> SelectionSet {
        let mut next = selection.clone();
        if !self.is_eligible(code) {
            return next;
        }

        next.0.remove(code);
        for descendant in self.tree.prefix_descendants(code) {
            if self.is_eligible(descendant) {
                next.0.remove(descendant);
            }
        }

        next
    }

    pub fn toggle(&self, selection: &SelectionSet, code: &str) -> SelectionSet {
        if selection.contains(code) {
            self.deselect(selection, code)
        } else {
            self.select(selection, code)
        }
    }

    /// Select-all / select-none over the codes currently on screen. Only
    /// eligible codes are touched and nothing cascades beyond `visible`.
    pub fn set_visible<'c, I>(&self, selection: &SelectionSet, visible: I, selected: bool) -> SelectionSet
    where
        I: IntoIterator<Item = &'c str>,
    {
        let mut next = selection.clone();
        for code in visible {
            if !self.is_eligible(code) {
                continue;
            }
            if selected {
                next.0.insert(code.to_string());
            } else {
                next.0.remove(code);
            }
        }
        next
    }
}

/// Codes matching a search box: code prefix or case-insensitive label
/// substring. An empty query matches everything.
pub fn visible_codes<'t>(tree: &'t AccountTree, query: &str) -> Vec<&'t str> {
    let query = query.trim();
    if query.is_empty() {
        return tree.codes().collect();
    }

    let needle = query.to_lowercase();
    tree.iter()
        .filter(|(_, node)| {
            node.code.starts_with(query) || node.label.to_lowercase().contains(&needle)
        })
        .map(|(_, node)| node.code.as_str())
        .collect()
}

/// Every selected code must have all of its eligible ancestors selected.
pub fn verify_consistency(tree: &AccountTree, selection: &SelectionSet) -> Result<()> {
    for code in selection.iter() {
        for ancestor in tree.prefix_ancestors(code) {
            let eligible = tree.get(ancestor).is_some_and(|n| n.is_eligible());
            if eligible && !selection.contains(ancestor) {
                return Err(EngineError::SelectionInconsistent {
                    code: code.to_string(),
                    missing: ancestor.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::CodeHierarchyBuilder;
    use crate::schema::{ChartConfig, CodeEntity};

    fn new_accounts_tree() -> AccountTree {
        let config = ChartConfig::default();
        let entities = vec![
            CodeEntity::new("4", "Ingresos"),
            CodeEntity::new("41", "Operacionales"),
            CodeEntity::new("4135", "Comercio al por mayor"),
            CodeEntity::new("413505", "Productos agricolas").posting(),
            CodeEntity::new("413510", "Productos mineros").posting(),
        ];
        CodeHierarchyBuilder::new(&config).build(&entities)
    }

    fn as_vec(selection: &SelectionSet) -> Vec<&str> {
        selection.iter().collect()
    }

    #[test]
    fn test_select_pulls_in_ancestors() {
        let tree = new_accounts_tree();
        let selector = CascadeSelector::new(&tree);

        let selected = selector.select(&SelectionSet::new(), "413505");
        assert_eq!(as_vec(&selected), vec!["4", "41", "4135", "413505"]);
        verify_consistency(&tree, &selected).unwrap();
    }

    #[test]
    fn test_deselect_keeps_ancestors() {
        let tree = new_accounts_tree();
        let selector = CascadeSelector::new(&tree);

        let selected = selector.select(&SelectionSet::new(), "413505");
        let deselected = selector.deselect(&selected, "413505");
        assert_eq!(as_vec(&deselected), vec!["4", "41", "4135"]);
    }

    #[test]
    fn test_select_group_pulls_in_descendants() {
        let tree = new_accounts_tree();
        let selector = CascadeSelector::new(&tree);

        let selected = selector.select(&SelectionSet::new(), "4135");
        assert_eq!(
            as_vec(&selected),
            vec!["4", "41", "4135", "413505", "413510"]
        );

        let cleared = selector.deselect(&selected, "41");
        assert_eq!(as_vec(&cleared), vec!["4"]);
    }

    #[test]
    fn test_baseline_accounts_are_skipped() {
        let config = ChartConfig::default();
        let entities = vec![
            CodeEntity::new("4", "Ingresos").in_baseline(),
            CodeEntity::new("41", "Operacionales"),
            CodeEntity::new("4135", "Comercio").in_baseline(),
            CodeEntity::new("413505", "Agricolas").posting(),
        ];
        let tree = CodeHierarchyBuilder::new(&config).build(&entities);
        let selector = CascadeSelector::new(&tree);

        let selected = selector.select(&SelectionSet::new(), "413505");
        assert_eq!(as_vec(&selected), vec!["41", "413505"]);

        let untouched = selector.select(&selected, "4135");
        assert_eq!(untouched, selected);
        verify_consistency(&tree, &selected).unwrap();
    }

    #[test]
    fn test_unknown_code_is_ignored() {
        let tree = new_accounts_tree();
        let selector = CascadeSelector::new(&tree);
        let selected = selector.select(&SelectionSet::new(), "9999");
        assert!(selected.is_empty());
    }

    #[test]
    fn test_toggle_round_trip() {
        let tree = new_accounts_tree();
        let selector = CascadeSelector::new(&tree);

        let on = selector.toggle(&SelectionSet::new(), "413510");
        assert!(on.contains("413510"));
        let off = selector.toggle(&on, "413510");
        assert!(!off.contains("413510"));
        assert!(off.contains("4135"));
    }

    #[test]
    fn test_bulk_select_respects_search_filter() {
        let tree = new_accounts_tree();
        let selector = CascadeSelector::new(&tree);

        let visible = visible_codes(&tree, "productos");
        assert_eq!(visible, vec!["413505", "413510"]);

        let all = selector.set_visible(&SelectionSet::new(), visible.iter().copied(), true);
        assert_eq!(as_vec(&all), vec!["413505", "413510"]);

        let none = selector.set_visible(&all, visible_codes(&tree, "4135"), false);
        assert!(none.is_empty());
    }

    #[test]
    fn test_empty_query_shows_everything() {
        let tree = new_accounts_tree();
        assert_eq!(visible_codes(&tree, "  ").len(), tree.len());
    }

    #[test]
    fn test_verify_reports_missing_ancestor() {
        let tree = new_accounts_tree();
        let selection: SelectionSet = ["413505"].into_iter().collect();
        let result = verify_consistency(&tree, &selection);
        assert!(matches!(
            result,
            Err(EngineError::SelectionInconsistent { ref missing, .. }) if missing == "4"
        ));
    }

    #[test]
    fn test_selection_serializes_as_list() {
        let selection: SelectionSet = ["41", "4"].into_iter().collect();
        let json = serde_json::to_string(&selection).unwrap();
        assert_eq!(json, r#"["4","41"]"#);
    }
}
