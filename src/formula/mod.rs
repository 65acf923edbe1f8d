//! Named formula rows that reference each other by label, e.g.
//! `[27]+[28]` or `max(0, [67]-[81])`.

mod evaluator;
pub mod graph;
pub mod parser;

pub use evaluator::{FormulaEvaluator, FormulaReport, RowFailure};
pub use graph::DependencyGraph;
pub use parser::{parse, Expr, MAX_NESTING};

use thiserror::Error;

/// Pass budget of the fixed-point strategy. Enough for reference chains up
/// to three rows deep.
pub const DEFAULT_FIXED_POINT_PASSES: usize = 3;

/// Why a single formula row could not be evaluated. These never abort the
/// evaluation of other rows.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("expression is empty")]
    EmptyExpression,

    #[error("unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { character: char, position: usize },

    #[error("reference opened at position {position} is never closed")]
    UnterminatedReference { position: usize },

    #[error("empty reference at position {position}")]
    EmptyReference { position: usize },

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unexpected '{found}' at position {position}")]
    UnexpectedToken { found: String, position: usize },

    #[error("expression ends unexpectedly")]
    UnexpectedEnd,

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{0}' needs at least one argument")]
    MissingArguments(String),

    #[error("expression nests deeper than {limit} levels")]
    NestingTooDeep { limit: usize },

    #[error("row is replaced by a later row with the same label")]
    DuplicateLabel,

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NonFinite,
}
