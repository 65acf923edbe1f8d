use crate::error::{EngineError, Result};
use crate::tree::AccountTree;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupChange {
    pub code: String,
    pub previous: f64,
    pub current: f64,
}

/// Nodes whose rollup moved during a recomputation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub changes: Vec<RollupChange>,
    pub grand_total: f64,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn get(&self, code: &str) -> Option<&RollupChange> {
        self.changes.iter().find(|c| c.code == code)
    }

    /// Folds a later change set into this one, keeping the earliest
    /// `previous` and the latest `current` per code. Codes that ended up
    /// where they started are dropped.
    pub fn merge(self, later: ChangeSet) -> ChangeSet {
        let mut by_code: BTreeMap<String, RollupChange> = self
            .changes
            .into_iter()
            .map(|c| (c.code.clone(), c))
            .collect();

        for change in later.changes {
            by_code
                .entry(change.code.clone())
                .and_modify(|existing| existing.current = change.current)
                .or_insert(change);
        }

        ChangeSet {
            changes: by_code
                .into_values()
                .filter(|c| c.previous != c.current)
                .collect(),
            grand_total: later.grand_total,
        }
    }
}

pub struct RollupCalculator;

impl RollupCalculator {
    /// Recomputes every rollup and returns the grand total.
    pub fn recompute(tree: &mut AccountTree) -> f64 {
        // Children always sit after their parent, so walking backwards is
        // a post-order traversal.
        for i in (0..tree.nodes.len()).rev() {
            let child_sum: f64 = tree.nodes[i]
                .children
                .iter()
                .map(|c| tree.nodes[c.index()].rollup_value)
                .sum();
            let node = &mut tree.nodes[i];
            node.rollup_value = node.own_value + child_sum;
        }

        tree.grand_total()
    }

    pub fn recompute_with_changes(tree: &mut AccountTree) -> ChangeSet {
        let before: Vec<f64> = tree.nodes.iter().map(|n| n.rollup_value).collect();
        let grand_total = Self::recompute(tree);

        let changes = tree
            .nodes
            .iter()
            .zip(before)
            .filter(|(node, previous)| node.rollup_value != *previous)
            .map(|(node, previous)| RollupChange {
                code: node.code.clone(),
                previous,
                current: node.rollup_value,
            })
            .collect();

        ChangeSet {
            changes,
            grand_total,
        }
    }
}

/// Checks `rollup == own + Σ child rollups` for every node.
pub fn verify_rollups(tree: &AccountTree, tolerance: f64) -> Result<()> {
    for (_, node) in tree.iter() {
        let expected = node.own_value
            + node
                .children
                .iter()
                .map(|&c| tree.node(c).rollup_value)
                .sum::<f64>();

        if (expected - node.rollup_value).abs() > tolerance {
            return Err(EngineError::RollupMismatch {
                code: node.code.clone(),
                expected,
                actual: node.rollup_value,
            });
        }
    }

    Ok(())
}
