//! dynexpr - dynamically-bound expression nodes
//!
//! Expression-tree nodes whose operations are bound at run time by a
//! call-site binder, and the lowering that turns them into primitive trees.
//!
//! Pipeline: factory -> ast::dynamic nodes -> reduce() -> ast::core::Expr -> eval()
//!
//! Compound assignments (`+=`, `??=`, `++`, ...) over dynamic members and
//! indexers lower to a read-modify-write that evaluates the receiver and
//! arguments exactly once.

pub mod argument;
pub mod ast;
pub mod binder;
pub mod error;
pub mod eval;
pub mod factory;
pub mod pretty;
pub mod reduce;
pub mod runtime;
pub mod visit;

// Re-export commonly used types
pub use argument::{Argument, IntoArgument};
pub use ast::core::{Expr, ExprKind, Variable};
pub use ast::dynamic::DynamicExpr;
pub use ast::value::{NativeFunction, Object, StructValue, Value};
pub use ast::{ExpressionType, Type};
pub use binder::{ArgumentFlags, BinderFlags, BinderOptions, CallSiteBinder, Operation};
pub use error::BuildError;
pub use eval::{EvalContext, EvalError, eval};
pub use pretty::pretty;
pub use runtime::{BasicRuntime, DynamicRuntime};
pub use visit::{Visitor, contains_dynamic, reduce_all};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DynexprError {
    #[error("Build error: {0}")]
    Build(#[from] BuildError),
    #[error("Eval error: {0}")]
    Eval(#[from] EvalError),
}

/// Fully lower `expr` and evaluate it in `ctx`.
pub fn run<R: DynamicRuntime>(
    expr: &Expr,
    ctx: &mut EvalContext<R>,
) -> Result<Value, DynexprError> {
    let lowered = reduce_all(expr);
    let result = eval(&lowered, ctx)?;
    Ok(result)
}
