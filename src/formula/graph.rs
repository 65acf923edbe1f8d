//! Dependency graph between formula rows.

use crate::error::{EngineError, Result};
use std::collections::{BTreeMap, VecDeque};

/// Edges run from a row to the formula rows it reads. References to labels
/// that are not formula rows (inputs, unknown labels) are not edges.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    labels: Vec<String>,
    dependencies: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// `rows` pairs each formula label with the labels its expression
    /// references. Labels must be unique.
    pub fn build<'r, I, R>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'r str, R)>,
        R: IntoIterator<Item = &'r str>,
    {
        let rows: Vec<(&str, Vec<&str>)> = rows
            .into_iter()
            .map(|(label, refs)| (label, refs.into_iter().collect()))
            .collect();

        let mut position: BTreeMap<&str, usize> = BTreeMap::new();
        for (i, (label, _)) in rows.iter().enumerate() {
            if position.insert(*label, i).is_some() {
                return Err(EngineError::DuplicateFormulaLabel(label.to_string()));
            }
        }

        let mut graph = DependencyGraph {
            labels: rows.iter().map(|(label, _)| label.to_string()).collect(),
            dependencies: vec![Vec::new(); rows.len()],
            dependents: vec![Vec::new(); rows.len()],
        };

        for (i, (_, refs)) in rows.iter().enumerate() {
            for reference in refs {
                if let Some(&dep) = position.get(reference) {
                    if !graph.dependencies[i].contains(&dep) {
                        graph.dependencies[i].push(dep);
                        graph.dependents[dep].push(i);
                    }
                }
            }
        }

        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label(&self, index: usize) -> &str {
        &self.labels[index]
    }

    /// Kahn's algorithm. Rows with no pending dependencies are released in
    /// their original order.
    pub fn topological_order(&self) -> Result<Vec<usize>> {
        let count = self.labels.len();
        let mut in_degree: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut queue: VecDeque<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(count);

        while let Some(node) = queue.pop_front() {
            order.push(node);
            for &dependent in &self.dependents[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if order.len() != count {
            return Err(EngineError::FormulaCycle {
                labels: self.find_cycle(&in_degree),
            });
        }

        Ok(order)
    }

    /// Longest chain of formula rows ending at each row (a row reading only
    /// inputs has depth 1).
    pub fn depths(&self) -> Result<Vec<usize>> {
        let order = self.topological_order()?;
        let mut depth = vec![1; self.labels.len()];
        for node in order {
            for &dep in &self.dependencies[node] {
                depth[node] = depth[node].max(depth[dep] + 1);
            }
        }
        Ok(depth)
    }

    /// Every row Kahn's algorithm could not release still waits on another
    /// such row, so following those edges must revisit a row.
    fn find_cycle(&self, in_degree: &[usize]) -> Vec<String> {
        let Some(start) = (0..in_degree.len()).find(|&i| in_degree[i] > 0) else {
            return Vec::new();
        };

        let mut path = vec![start];
        let mut current = start;
        loop {
            let Some(&next) = self.dependencies[current]
                .iter()
                .find(|&&dep| in_degree[dep] > 0)
            else {
                break;
            };

            if let Some(pos) = path.iter().position(|&n| n == next) {
                let mut cycle: Vec<String> =
                    path[pos..].iter().map(|&n| self.labels[n].clone()).collect();
                cycle.push(self.labels[next].clone());
                return cycle;
            }

            path.push(next);
            current = next;
        }

        path.iter().map(|&n| self.labels[n].clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(rows: Vec<(&'static str, Vec<&'static str>)>) -> Result<DependencyGraph> {
        DependencyGraph::build(rows)
    }

    fn labels(graph: &DependencyGraph, order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| graph.label(i).to_string()).collect()
    }

    #[test]
    fn test_forward_reference_orders_dependency_first() {
        let g = graph(vec![("41", vec!["27", "40"]), ("40", vec!["27"])]).unwrap();
        let order = g.topological_order().unwrap();
        assert_eq!(labels(&g, &order), vec!["40", "41"]);
    }

    #[test]
    fn test_input_references_are_not_edges() {
        let g = graph(vec![("41", vec!["27", "28"]), ("82", vec!["67", "81"])]).unwrap();
        let order = g.topological_order().unwrap();
        assert_eq!(labels(&g, &order), vec!["41", "82"]);
        assert_eq!(g.depths().unwrap(), vec![1, 1]);
    }

    #[test]
    fn test_cycle_is_reported_with_path() {
        let g = graph(vec![
            ("a", vec!["b"]),
            ("b", vec!["c"]),
            ("c", vec!["a"]),
            ("d", vec!["a"]),
        ])
        .unwrap();
        match g.topological_order() {
            Err(EngineError::FormulaCycle { labels }) => {
                assert_eq!(labels, vec!["a", "b", "c", "a"]);
            }
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let g = graph(vec![("x", vec!["x"])]).unwrap();
        assert!(matches!(
            g.topological_order(),
            Err(EngineError::FormulaCycle { ref labels }) if labels == &["x", "x"]
        ));
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let result = graph(vec![("a", vec![]), ("a", vec![])]);
        assert!(matches!(result, Err(EngineError::DuplicateFormulaLabel(ref l)) if l == "a"));
    }

    #[test]
    fn test_depths_follow_longest_chain() {
        let g = graph(vec![
            ("d", vec!["c", "a"]),
            ("c", vec!["b"]),
            ("b", vec!["a"]),
            ("a", vec!["in"]),
        ])
        .unwrap();
        assert_eq!(g.depths().unwrap(), vec![4, 3, 2, 1]);
    }
}
