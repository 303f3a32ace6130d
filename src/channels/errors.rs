//! Channel error types.

use miette::Diagnostic;
use thiserror::Error;

use crate::reducers::ReducerError;

/// Failures raised by channel operations.
#[derive(Debug, Error, Diagnostic)]
pub enum ChannelError {
    /// A single-slot channel received more than one write in one step.
    #[error("At key '{key}': Can receive only one value per step.")]
    #[diagnostic(
        code(graphloom::channels::invalid_update),
        help("Only one write per superstep may reach '{key}'; add a reducer to aggregate writes.")
    )]
    InvalidUpdate { key: String },

    /// A read on a channel holding no value.
    #[error("channel '{key}' is empty")]
    #[diagnostic(code(graphloom::channels::empty))]
    Empty { key: String },

    /// The aggregate operator failed while folding a write.
    #[error("operator failed for channel '{key}': {source}")]
    #[diagnostic(code(graphloom::channels::operator))]
    Operator {
        key: String,
        #[source]
        source: ReducerError,
    },

    /// A checkpoint kind that cannot be restored without extra context.
    #[error("channel '{key}' requires its operator to restore from a checkpoint")]
    #[diagnostic(
        code(graphloom::channels::restore),
        help("Use OperatorAggregate::from_checkpoint and supply the operator.")
    )]
    Restore { key: String },
}
