//! Arena storage for the account forest.
//!
//! Nodes live in one vector in sorted code order and refer to each other by
//! [`NodeId`]. A parent's code is always a strict prefix of its children's
//! codes, so every child sits at a higher index than its parent.

use crate::error::EngineError;
use crate::periods::PeriodBuckets;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub code: String,
    pub label: String,
    pub allows_direct_value: bool,
    pub exists_in_baseline: bool,
    pub depth: usize,
    pub parent: Option<NodeId>,
    /// Sorted by code.
    pub children: Vec<NodeId>,
    pub own_value: f64,
    pub rollup_value: f64,
    pub period_values: PeriodBuckets,
}

impl TreeNode {
    pub fn is_group(&self) -> bool {
        !self.children.is_empty()
    }

    /// Only accounts that are new relative to the baseline take part in
    /// cascade selection.
    pub fn is_eligible(&self) -> bool {
        !self.exists_in_baseline
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAccountTree")]
pub struct AccountTree {
    pub(crate) nodes: Vec<TreeNode>,
    pub(crate) roots: Vec<NodeId>,
    pub(crate) index: BTreeMap<String, NodeId>,
}

/// Snapshot shape as read from JSON, before the arena links are checked.
#[derive(Deserialize)]
struct RawAccountTree {
    nodes: Vec<TreeNode>,
    roots: Vec<NodeId>,
    index: BTreeMap<String, NodeId>,
}

fn invalid(message: String) -> EngineError {
    EngineError::InvalidSnapshot(message)
}

fn strictly_ascending(ids: &[NodeId]) -> bool {
    ids.windows(2).all(|pair| pair[0] < pair[1])
}

impl TryFrom<RawAccountTree> for AccountTree {
    type Error = EngineError;

    fn try_from(raw: RawAccountTree) -> Result<Self, Self::Error> {
        let RawAccountTree {
            nodes,
            roots,
            index,
        } = raw;
        let len = nodes.len();
        let in_bounds = |id: NodeId| id.0 < len;

        for pair in nodes.windows(2) {
            if pair[0].code >= pair[1].code {
                return Err(invalid(format!(
                    "nodes out of code order: {} before {}",
                    pair[0].code, pair[1].code
                )));
            }
        }

        for (i, node) in nodes.iter().enumerate() {
            match node.parent {
                Some(parent) => {
                    if !in_bounds(parent) || parent.0 >= i {
                        return Err(invalid(format!(
                            "{} must come after its parent {}",
                            node.code, parent.0
                        )));
                    }
                    let parent_node = &nodes[parent.0];
                    if !parent_node.children.contains(&NodeId(i))
                        || !node.code.starts_with(parent_node.code.as_str())
                        || node.depth != parent_node.depth + 1
                    {
                        return Err(invalid(format!(
                            "{} is not a child of {}",
                            node.code, parent_node.code
                        )));
                    }
                }
                None => {
                    if node.depth != 0 || !roots.contains(&NodeId(i)) {
                        return Err(invalid(format!("{} is not listed as a root", node.code)));
                    }
                }
            }

            if !strictly_ascending(&node.children) {
                return Err(invalid(format!("children of {} are not sorted", node.code)));
            }
            for &child in &node.children {
                if !in_bounds(child) || nodes[child.0].parent != Some(NodeId(i)) {
                    return Err(invalid(format!(
                        "{} lists child {} that does not point back",
                        node.code, child.0
                    )));
                }
            }
        }

        if !strictly_ascending(&roots)
            || roots
                .iter()
                .any(|&root| !in_bounds(root) || nodes[root.0].parent.is_some())
        {
            return Err(invalid("roots must be sorted parentless nodes".to_string()));
        }

        if index.len() != len {
            return Err(invalid(format!(
                "index has {} entries for {} nodes",
                index.len(),
                len
            )));
        }
        for (code, &id) in &index {
            if !in_bounds(id) || nodes[id.0].code != *code {
                return Err(invalid(format!("index entry {} points at the wrong node", code)));
            }
        }

        Ok(Self {
            nodes,
            roots,
            index,
        })
    }
}

impl AccountTree {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id.0]
    }

    pub fn id_of(&self, code: &str) -> Option<NodeId> {
        self.index.get(code).copied()
    }

    pub fn get(&self, code: &str) -> Option<&TreeNode> {
        self.id_of(code).map(|id| self.node(id))
    }

    pub fn contains(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    /// All nodes in sorted code order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &TreeNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Structural ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            out.push(parent);
            current = self.node(parent).parent;
        }
        out
    }

    /// Structural descendants of `id`, depth-first.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Every node in display order: each root followed by its subtree.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        for &root in &self.roots {
            out.push(root);
            out.extend(self.subtree(root));
        }
        out
    }

    /// Codes that are strict prefixes of `code`, shortest first. Unlike
    /// [`AccountTree::ancestors`] this also finds accounts skipped by a gap
    /// in the numbering.
    pub fn prefix_ancestors<'t>(&'t self, code: &str) -> Vec<&'t str> {
        code.char_indices()
            .skip(1)
            .filter_map(|(end, _)| self.index.get_key_value(&code[..end]))
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// Codes that start with `code` and are longer than it, in sorted order.
    pub fn prefix_descendants<'t>(&'t self, code: &'t str) -> impl Iterator<Item = &'t str> + 't {
        self.index
            .range::<str, _>((Bound::Excluded(code), Bound::Unbounded))
            .map(|(key, _)| key.as_str())
            .take_while(move |key| key.starts_with(code))
    }

    pub fn grand_total(&self) -> f64 {
        self.roots.iter().map(|&r| self.node(r).rollup_value).sum()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
