use super::graph::DependencyGraph;
use super::parser::{parse, Expr};
use super::FormulaError;
use crate::error::{EngineError, Result};
use crate::schema::{EvaluationStrategy, FormulaRowDef};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq)]
pub struct RowFailure {
    pub label: String,
    pub error: FormulaError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormulaReport {
    /// Every non-header row plus any input labels no row mentions.
    pub values: BTreeMap<String, f64>,
    /// Rows left at their seeded value (or zero), in row order.
    pub failures: Vec<RowFailure>,
    /// Referenced labels that no row or input defines. They read as zero.
    pub unresolved: BTreeSet<String>,
    /// False when every fixed-point pass still changed a value.
    pub converged: bool,
    pub passes: usize,
}

impl FormulaReport {
    pub fn value(&self, label: &str) -> Option<f64> {
        self.values.get(label).copied()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.unresolved.is_empty()
    }
}

struct CompiledRow<'r> {
    label: &'r str,
    expr: Expr,
}

pub struct FormulaEvaluator {
    strategy: EvaluationStrategy,
}

impl Default for FormulaEvaluator {
    fn default() -> Self {
        Self::topological()
    }
}

impl FormulaEvaluator {
    pub fn new(strategy: EvaluationStrategy) -> Self {
        Self { strategy }
    }

    pub fn topological() -> Self {
        Self::new(EvaluationStrategy::Topological)
    }

    pub fn fixed_point(passes: usize) -> Self {
        Self::new(EvaluationStrategy::FixedPoint { passes })
    }

    /// Resolves every formula row against `inputs`.
    ///
    /// Per-row problems (bad syntax, division by zero) are collected in the
    /// report. When several rows share a label the last one defines it and
    /// the earlier ones are reported as `DuplicateLabel` failures. Only a
    /// circular reference under the topological strategy is an error.
    pub fn evaluate(
        &self,
        rows: &[FormulaRowDef],
        inputs: &BTreeMap<String, f64>,
    ) -> Result<FormulaReport> {
        info!(
            "Evaluating {} formula rows with {} inputs ({:?})",
            rows.len(),
            inputs.len(),
            self.strategy
        );

        let mut values = inputs.clone();
        let mut failures: BTreeMap<String, FormulaError> = BTreeMap::new();
        let mut compiled = Vec::new();

        let mut defining_row: BTreeMap<&str, usize> = BTreeMap::new();
        for (i, row) in rows.iter().enumerate().filter(|(_, r)| !r.is_header) {
            defining_row.insert(row.label.as_str(), i);
        }
        let is_shadowed = |i: usize, row: &FormulaRowDef| {
            defining_row.get(row.label.as_str()) != Some(&i)
        };

        for (i, row) in rows.iter().enumerate().filter(|(_, r)| !r.is_header) {
            if is_shadowed(i, row) {
                continue;
            }

            values.entry(row.label.clone()).or_insert(0.0);

            let source = row
                .expression
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty());

            if let Some(source) = source {
                match parse(source) {
                    Ok(expr) => compiled.push(CompiledRow {
                        label: &row.label,
                        expr,
                    }),
                    Err(error) => {
                        failures.insert(row.label.clone(), error);
                    }
                }
            }
        }

        let unresolved: BTreeSet<String> = compiled
            .iter()
            .flat_map(|row| row.expr.references())
            .filter(|label| !values.contains_key(*label))
            .map(str::to_string)
            .collect();

        debug!(
            "{} formula rows compiled, {} failed to parse, {} unresolved references",
            compiled.len(),
            failures.len(),
            unresolved.len()
        );

        let (converged, passes) = match self.strategy {
            EvaluationStrategy::Topological => {
                run_topological(&compiled, &mut values, &mut failures)?;
                (true, 1)
            }
            EvaluationStrategy::FixedPoint { passes } => {
                if passes == 0 {
                    return Err(EngineError::InvalidPassCount(passes));
                }
                (
                    run_fixed_point(&compiled, passes, &mut values, &mut failures),
                    passes,
                )
            }
        };

        let mut ordered_failures = Vec::with_capacity(failures.len());
        for (i, row) in rows.iter().enumerate().filter(|(_, r)| !r.is_header) {
            let failure = if is_shadowed(i, row) {
                Some(FormulaError::DuplicateLabel)
            } else {
                failures.remove(&row.label)
            };
            if let Some(error) = failure {
                warn!("Formula row {} left unresolved: {}", row.label, error);
                ordered_failures.push(RowFailure {
                    label: row.label.clone(),
                    error,
                });
            }
        }

        Ok(FormulaReport {
            values,
            failures: ordered_failures,
            unresolved,
            converged,
            passes,
        })
    }
}

fn run_topological(
    compiled: &[CompiledRow<'_>],
    values: &mut BTreeMap<String, f64>,
    failures: &mut BTreeMap<String, FormulaError>,
) -> Result<()> {
    let graph = DependencyGraph::build(
        compiled
            .iter()
            .map(|row| (row.label, row.expr.references())),
    )?;

    for index in graph.topological_order()? {
        evaluate_row(&compiled[index], values, failures);
    }

    Ok(())
}

/// Returns whether the last pass reached a fixed point.
fn run_fixed_point(
    compiled: &[CompiledRow<'_>],
    passes: usize,
    values: &mut BTreeMap<String, f64>,
    failures: &mut BTreeMap<String, FormulaError>,
) -> bool {
    let mut converged = false;

    for pass in 1..=passes {
        let mut changed = false;
        for row in compiled {
            changed |= evaluate_row(row, values, failures);
        }
        debug!("Fixed-point pass {} changed values: {}", pass, changed);
        if !changed {
            converged = true;
        }
    }

    if !converged {
        warn!(
            "Formula values were still changing after {} passes and may be under-resolved",
            passes
        );
    }

    converged
}

/// Writes the row's value back, or records the failure and leaves the
/// previous value in place. Returns whether the stored value changed.
fn evaluate_row(
    row: &CompiledRow<'_>,
    values: &mut BTreeMap<String, f64>,
    failures: &mut BTreeMap<String, FormulaError>,
) -> bool {
    let result = row
        .expr
        .eval(&|label: &str| values.get(label).copied().unwrap_or(0.0));

    match result {
        Ok(value) => {
            failures.remove(row.label);
            let previous = values.insert(row.label.to_string(), value);
            previous != Some(value)
        }
        Err(error) => {
            failures.insert(row.label.to_string(), error);
            false
        }
    }
}
