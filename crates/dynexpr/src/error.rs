//! Construction-time validation errors.

use thiserror::Error;

use crate::ast::{ExpressionType, Type};

/// Why a node could not be built. Raised eagerly by the factory and by
/// `update`, never by reduction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("Expression must be writeable: {0}")]
    NotWritable(String),

    #[error("Expression must be readable: {0}")]
    NotReadable(String),

    #[error("Operator kind {0:?} is not supported here")]
    NotSupported(ExpressionType),

    #[error("Type {ty} is not valid for {usage}")]
    InvalidType { ty: Type, usage: &'static str },

    #[error("{0} must not be empty")]
    EmptyName(&'static str),

    #[error("{node} requires at least {min} argument(s), got {got}")]
    ArgumentCount {
        node: &'static str,
        min: usize,
        got: usize,
    },
}
