use crate::periods::PeriodBuckets;
use crate::schema::{ChartConfig, CodeEntity};
use crate::tree::{AccountTree, NodeId, TreeNode};
use log::{debug, warn};
use std::collections::BTreeMap;

/// Builds an [`AccountTree`] from a flat list of coded accounts.
pub struct CodeHierarchyBuilder<'a> {
    config: &'a ChartConfig,
}

impl<'a> CodeHierarchyBuilder<'a> {
    pub fn new(config: &'a ChartConfig) -> Self {
        Self { config }
    }

    /// Entities outside the permitted classes are dropped. An entity whose
    /// candidate parent is not in the list becomes a root.
    pub fn build(&self, entities: &[CodeEntity]) -> AccountTree {
        let mut permitted: Vec<&CodeEntity> = entities
            .iter()
            .filter(|e| self.config.is_permitted(&e.code))
            .collect();
        permitted.sort_by(|a, b| a.code.cmp(&b.code));

        debug!(
            "Building account tree from {} of {} entities",
            permitted.len(),
            entities.len()
        );

        let mut nodes: Vec<TreeNode> = Vec::with_capacity(permitted.len());
        let mut index: BTreeMap<String, NodeId> = BTreeMap::new();

        // Pass 1: index every code before attaching anything.
        for entity in permitted {
            if index.contains_key(&entity.code) {
                warn!("Skipping duplicate account code {}", entity.code);
                continue;
            }
            index.insert(entity.code.clone(), NodeId(nodes.len()));
            nodes.push(TreeNode {
                code: entity.code.clone(),
                label: entity.label.clone(),
                allows_direct_value: entity.allows_direct_value,
                exists_in_baseline: entity.exists_in_baseline,
                depth: 0,
                parent: None,
                children: Vec::new(),
                own_value: 0.0,
                rollup_value: 0.0,
                period_values: PeriodBuckets::default(),
            });
        }

        // Pass 2: attach.
        let mut roots = Vec::new();
        for i in 0..nodes.len() {
            let parent = self
                .config
                .segments
                .candidate_parent(&nodes[i].code)
                .and_then(|parent_code| index.get(parent_code).copied());

            match parent {
                Some(parent_id) => {
                    nodes[i].parent = Some(parent_id);
                    nodes[i].depth = nodes[parent_id.0].depth + 1;
                    nodes[parent_id.0].children.push(NodeId(i));
                }
                None => roots.push(NodeId(i)),
            }
        }

        debug!(
            "Account tree has {} nodes under {} roots",
            nodes.len(),
            roots.len()
        );

        AccountTree {
            nodes,
            roots,
            index,
        }
    }
}
