use crate::error::{EngineError, Result};
use crate::formula::DEFAULT_FIXED_POINT_PASSES;
use crate::segments::SegmentScheme;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CodeEntity {
    #[schemars(
        description = "Account code made of digits. Its length determines the nesting level (e.g. '4', '41', '4135', '413505')."
    )]
    pub code: String,

    #[schemars(description = "Display name of the account")]
    pub label: String,

    #[serde(default)]
    #[schemars(
        description = "True for posting accounts that can receive a direct value, false for pure grouping accounts"
    )]
    pub allows_direct_value: bool,

    #[serde(default)]
    #[schemars(
        description = "True when the account already exists in the reference baseline. Such accounts are shown but never cascade-selected."
    )]
    pub exists_in_baseline: bool,
}

impl CodeEntity {
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
            allows_direct_value: false,
            exists_in_baseline: false,
        }
    }

    pub fn posting(mut self) -> Self {
        self.allows_direct_value = true;
        self
    }

    pub fn in_baseline(mut self) -> Self {
        self.exists_in_baseline = true;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChartInput {
    #[schemars(description = "Flat list of account records, in any order")]
    pub entities: Vec<CodeEntity>,
}

impl ChartInput {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ChartInput)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormulaRowDef {
    #[schemars(description = "Short identifier other rows reference as [label]")]
    pub label: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    #[schemars(
        description = "Expression such as '[27]+[28]' or 'max(0, [67]-[81])'. Null for rows whose value is an input."
    )]
    pub expression: Option<String>,

    #[serde(default)]
    #[schemars(description = "Section separator without a value")]
    pub is_header: bool,
}

impl FormulaRowDef {
    pub fn literal(label: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            display_name: display_name.into(),
            expression: None,
            is_header: false,
        }
    }

    pub fn formula(
        label: impl Into<String>,
        display_name: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            display_name: display_name.into(),
            expression: Some(expression.into()),
            is_header: false,
        }
    }

    pub fn header(label: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            display_name: display_name.into(),
            expression: None,
            is_header: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FormulaSheet {
    #[schemars(description = "Ordered rows. Order matters only for display and fixed-point passes.")]
    pub rows: Vec<FormulaRowDef>,
}

impl FormulaSheet {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(FormulaSheet)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", tag = "strategy")]
pub enum EvaluationStrategy {
    /// Dependency graph, evaluated once in topological order. Cycles are errors.
    Topological,

    /// Repeated passes over the rows in list order.
    FixedPoint { passes: usize },
}

impl Default for EvaluationStrategy {
    fn default() -> Self {
        Self::Topological
    }
}

impl EvaluationStrategy {
    pub fn fixed_point() -> Self {
        Self::FixedPoint {
            passes: DEFAULT_FIXED_POINT_PASSES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartConfig {
    /// Leading digits of the account classes the tree is built from.
    /// Empty means every code is accepted.
    pub permitted_classes: Vec<String>,
    pub segments: SegmentScheme,
    pub fiscal_year_end_month: u32,
    pub formula_strategy: EvaluationStrategy,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            permitted_classes: ["4", "5", "6", "7"].iter().map(|c| c.to_string()).collect(),
            segments: SegmentScheme::puc(),
            fiscal_year_end_month: 12,
            formula_strategy: EvaluationStrategy::Topological,
        }
    }
}

impl ChartConfig {
    pub fn unfiltered() -> Self {
        Self {
            permitted_classes: Vec::new(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: ChartConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        crate::utils::validate_fiscal_year_end_month(self.fiscal_year_end_month)?;
        self.segments.validate()?;

        if let EvaluationStrategy::FixedPoint { passes } = self.formula_strategy {
            if passes == 0 {
                return Err(EngineError::InvalidPassCount(passes));
            }
        }

        Ok(())
    }

    pub fn is_permitted(&self, code: &str) -> bool {
        self.permitted_classes.is_empty()
            || self
                .permitted_classes
                .iter()
                .any(|class| code.starts_with(class.as_str()))
    }
}
