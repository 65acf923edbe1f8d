//! # Account Rollup Engine
//!
//! A library for turning a flat PUC-style chart of accounts into a tree with
//! rolled-up totals, and for resolving the formula rows of tax and budget
//! worksheets.
//!
//! ## Core Concepts
//!
//! - **Code hierarchy**: an account's parent is inferred from its code
//!   length (`4` → `41` → `4135` → `413505` → `41350501` ...)
//! - **Rollup**: every node's total is its own value plus its children's totals
//! - **Periods**: an annual value is split into twelve equal, rounded buckets
//! - **Cascade selection**: picking an account to import pulls in its parents
//!   and children, restricted to accounts not already in the baseline
//! - **Formula rows**: named values such as `[27]+[28]` or `max(0, [67]-[81])`
//!
//! ## Example
//!
//! ```rust,ignore
//! use account_rollup_engine::*;
//! use std::collections::BTreeMap;
//!
//! let config = ChartConfig::default();
//! let entities = vec![
//!     CodeEntity::new("4", "Ingresos"),
//!     CodeEntity::new("41", "Operacionales"),
//!     CodeEntity::new("4135", "Comercio al por mayor y al por menor"),
//!     CodeEntity::new("413505", "Productos agricolas").posting(),
//! ];
//! let values = BTreeMap::from([("413505".to_string(), 1200.0)]);
//!
//! let tree = process_chart(&config, &entities, &values).unwrap();
//! assert_eq!(tree.get("4").unwrap().rollup_value, 1200.0);
//! ```

pub mod edits;
pub mod error;
pub mod formula;
pub mod hierarchy;
pub mod ingestion;
pub mod periods;
pub mod rollup;
pub mod schema;
pub mod segments;
pub mod selection;
pub mod tree;
pub mod utils;

pub use edits::{apply_edit, apply_edits, TreeEdit};
pub use error::{EngineError, Result};
pub use formula::{FormulaError, FormulaEvaluator, FormulaReport, RowFailure};
pub use hierarchy::CodeHierarchyBuilder;
pub use ingestion::*;
pub use periods::{PeriodBuckets, PeriodCalendar, PeriodDistributor, PERIODS_PER_YEAR};
pub use rollup::{verify_rollups, ChangeSet, RollupCalculator, RollupChange};
pub use schema::*;
pub use segments::{SegmentRule, SegmentScheme};
pub use selection::{verify_consistency, visible_codes, CascadeSelector, SelectionSet};
pub use tree::{AccountTree, NodeId, TreeNode};

use log::{debug, info};
use std::collections::BTreeMap;

const ROLLUP_TOLERANCE: f64 = 1e-6;

pub struct ChartProcessor<'a> {
    config: &'a ChartConfig,
}

impl<'a> ChartProcessor<'a> {
    pub fn new(config: &'a ChartConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, entities: &[CodeEntity]) -> AccountTree {
        CodeHierarchyBuilder::new(self.config).build(entities)
    }

    /// Builds the tree, loads `values` as own values (with their period
    /// buckets), recomputes rollups and verifies them.
    ///
    /// Loaded values are accepted on any account, including grouping
    /// accounts; values for codes outside the tree are ignored.
    pub fn process(
        &self,
        entities: &[CodeEntity],
        values: &BTreeMap<String, f64>,
    ) -> Result<AccountTree> {
        self.config.validate()?;

        info!(
            "Processing chart of {} accounts with {} seeded values",
            entities.len(),
            values.len()
        );

        let mut tree = self.build(entities);

        let mut ignored = 0;
        for (code, value) in values {
            match tree.id_of(code) {
                Some(id) => edits::write_own_value(&mut tree, id, *value),
                None => ignored += 1,
            }
        }
        if ignored > 0 {
            debug!("{} seeded values had no matching account", ignored);
        }

        let grand_total = RollupCalculator::recompute(&mut tree);
        verify_rollups(&tree, ROLLUP_TOLERANCE)?;

        debug!(
            "Chart has {} accounts, grand total {}",
            tree.len(),
            grand_total
        );

        Ok(tree)
    }

    pub fn evaluate_formulas(
        &self,
        rows: &[FormulaRowDef],
        inputs: &BTreeMap<String, f64>,
    ) -> Result<FormulaReport> {
        FormulaEvaluator::new(self.config.formula_strategy.clone()).evaluate(rows, inputs)
    }

    pub fn calendar(&self) -> Result<PeriodCalendar> {
        PeriodCalendar::new(self.config.fiscal_year_end_month)
    }
}

pub fn process_chart(
    config: &ChartConfig,
    entities: &[CodeEntity],
    values: &BTreeMap<String, f64>,
) -> Result<AccountTree> {
    ChartProcessor::new(config).process(entities, values)
}

pub fn evaluate_formulas(
    config: &ChartConfig,
    rows: &[FormulaRowDef],
    inputs: &BTreeMap<String, f64>,
) -> Result<FormulaReport> {
    ChartProcessor::new(config).evaluate_formulas(rows, inputs)
}
