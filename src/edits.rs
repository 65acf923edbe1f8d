use crate::error::{EngineError, Result};
use crate::periods::PeriodDistributor;
use crate::rollup::{ChangeSet, RollupCalculator};
use crate::tree::{AccountTree, NodeId};
use log::debug;
use serde::{Deserialize, Serialize};

/// A user edit against the values of an account tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TreeEdit {
    /// Set the annual value of a posting account.
    SetValue { code: String, value: f64 },

    /// Reset the account's own value to zero.
    ClearValue { code: String },

    /// Multiply the own values of an account and everything below it
    /// (e.g. -1.0 to flip sign).
    ScaleValues { code: String, factor: f64 },
}

impl TreeEdit {
    pub fn code(&self) -> &str {
        match self {
            TreeEdit::SetValue { code, .. }
            | TreeEdit::ClearValue { code }
            | TreeEdit::ScaleValues { code, .. } => code,
        }
    }
}

/// Writes an own value and the period buckets derived from it. Rollups are
/// left for the caller to recompute.
pub(crate) fn write_own_value(tree: &mut AccountTree, id: NodeId, value: f64) {
    let node = tree.node_mut(id);
    node.own_value = value;
    node.period_values = PeriodDistributor::distribute(value);
}

/// Applies one edit in place: periods are redistributed first, then every
/// rollup is recomputed.
pub fn apply_edit(tree: &mut AccountTree, edit: &TreeEdit) -> Result<ChangeSet> {
    let id = tree
        .id_of(edit.code())
        .ok_or_else(|| EngineError::UnknownCode(edit.code().to_string()))?;

    match edit {
        TreeEdit::SetValue { code, value } => {
            if !tree.node(id).allows_direct_value {
                return Err(EngineError::DirectValueNotAllowed(code.clone()));
            }
            write_own_value(tree, id, *value);
        }
        TreeEdit::ClearValue { .. } => {
            write_own_value(tree, id, 0.0);
        }
        TreeEdit::ScaleValues { factor, .. } => {
            let mut targets = vec![id];
            targets.extend(tree.subtree(id));
            for target in targets {
                let scaled = tree.node(target).own_value * factor;
                write_own_value(tree, target, scaled);
            }
        }
    }

    debug!("Applied {:?}", edit);
    Ok(RollupCalculator::recompute_with_changes(tree))
}

/// Applies edits in order to a copy of `base`. If any edit fails, `base` is
/// unaffected and the error is returned.
pub fn apply_edits(base: &AccountTree, edits: &[TreeEdit]) -> Result<(AccountTree, ChangeSet)> {
    let mut tree = base.clone();
    let mut combined = ChangeSet {
        changes: Vec::new(),
        grand_total: tree.grand_total(),
    };

    for edit in edits {
        let changes = apply_edit(&mut tree, edit)?;
        combined = combined.merge(changes);
    }

    Ok((tree, combined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::CodeHierarchyBuilder;
    use crate::rollup::verify_rollups;
    use crate::schema::{ChartConfig, CodeEntity};

    fn base_tree() -> AccountTree {
        let config = ChartConfig::default();
        let entities = vec![
            CodeEntity::new("5", "Gastos"),
            CodeEntity::new("51", "Administracion"),
            CodeEntity::new("5105", "Personal"),
            CodeEntity::new("510506", "Sueldos").posting(),
            CodeEntity::new("510527", "Auxilio de transporte").posting(),
        ];
        CodeHierarchyBuilder::new(&config).build(&entities)
    }

    #[test]
    fn test_set_value_distributes_then_rolls_up() {
        let mut tree = base_tree();
        let changes = apply_edit(
            &mut tree,
            &TreeEdit::SetValue {
                code: "510506".to_string(),
                value: 2400.0,
            },
        )
        .unwrap();

        let leaf = tree.get("510506").unwrap();
        assert_eq!(leaf.own_value, 2400.0);
        assert!(leaf.period_values.values().iter().all(|&v| v == 200.0));
        assert_eq!(tree.get("5").unwrap().rollup_value, 2400.0);
        assert_eq!(changes.grand_total, 2400.0);
        assert_eq!(changes.changes.len(), 4);
    }

    #[test]
    fn test_set_value_on_grouping_account_fails() {
        let mut tree = base_tree();
        let result = apply_edit(
            &mut tree,
            &TreeEdit::SetValue {
                code: "5105".to_string(),
                value: 1.0,
            },
        );
        assert!(matches!(result, Err(EngineError::DirectValueNotAllowed(_))));
    }

    #[test]
    fn test_unknown_code_fails() {
        let mut tree = base_tree();
        let result = apply_edit(
            &mut tree,
            &TreeEdit::ClearValue {
                code: "9".to_string(),
            },
        );
        assert!(matches!(result, Err(EngineError::UnknownCode(ref c)) if c == "9"));
    }

    #[test]
    fn test_scale_flips_subtree() {
        let edits = vec![
            TreeEdit::SetValue {
                code: "510506".to_string(),
                value: 1200.0,
            },
            TreeEdit::SetValue {
                code: "510527".to_string(),
                value: 120.0,
            },
            TreeEdit::ScaleValues {
                code: "5105".to_string(),
                factor: -1.0,
            },
        ];

        let (tree, changes) = apply_edits(&base_tree(), &edits).unwrap();

        assert_eq!(tree.get("510506").unwrap().own_value, -1200.0);
        assert_eq!(tree.get("510527").unwrap().period_values.get(0), Some(-10.0));
        assert_eq!(tree.get("5").unwrap().rollup_value, -1320.0);
        assert_eq!(changes.get("5").unwrap().previous, 0.0);
        assert_eq!(changes.get("5").unwrap().current, -1320.0);
        verify_rollups(&tree, 1e-9).unwrap();
    }

    #[test]
    fn test_failed_batch_leaves_base_untouched() {
        let base = base_tree();
        let edits = vec![
            TreeEdit::SetValue {
                code: "510506".to_string(),
                value: 50.0,
            },
            TreeEdit::SetValue {
                code: "51".to_string(),
                value: 1.0,
            },
        ];

        assert!(apply_edits(&base, &edits).is_err());
        assert_eq!(base.get("510506").unwrap().own_value, 0.0);
    }

    #[test]
    fn test_clear_value_removes_contribution() {
        let edits = vec![
            TreeEdit::SetValue {
                code: "510506".to_string(),
                value: 600.0,
            },
            TreeEdit::ClearValue {
                code: "510506".to_string(),
            },
        ];
        let (tree, changes) = apply_edits(&base_tree(), &edits).unwrap();

        assert_eq!(tree.grand_total(), 0.0);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_edit_deserializes_from_tagged_json() {
        let edit: TreeEdit =
            serde_json::from_str(r#"{"action": "set_value", "code": "510506", "value": 10.0}"#)
                .unwrap();
        assert_eq!(
            edit,
            TreeEdit::SetValue {
                code: "510506".to_string(),
                value: 10.0
            }
        );
    }
}
