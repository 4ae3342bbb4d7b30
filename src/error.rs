//! Error types for graph construction and re-evaluation.

use num_traits::ToPrimitive;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while evaluating an expression node.
///
/// Domain violations are detected at the moment the offending value is
/// computed: either when the node is first constructed, or when a later
/// [`update`](crate::Var::update) replays the graph with new leaf values.
/// None of these conditions is transient, so no error is retried; callers
/// wanting resilience must validate inputs before building the expression.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// An elementary function was evaluated outside its domain, e.g. the
    /// square root or logarithm of a negative number.
    #[error("{op}: argument {argument} is outside the function's domain")]
    Domain { op: &'static str, argument: f64 },

    /// A denominator evaluated to exactly zero at division time.
    #[error("{op}: division by zero")]
    DivisionByZero { op: &'static str },

    /// A value was assigned to a variable that is defined by an expression.
    /// Only leaf-backed variables can be set directly.
    #[error("variable is defined by an expression and cannot be assigned directly")]
    InvalidReassignment,
}

impl Error {
    pub(crate) fn domain<T: ToPrimitive>(op: &'static str, argument: T) -> Self {
        Error::Domain {
            op,
            argument: argument.to_f64().unwrap_or(f64::NAN),
        }
    }
}
