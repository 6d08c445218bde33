//! Operands of dynamically-bound operations
//!
//! An `Argument` pairs an expression with what the binder needs to know
//! about it: its name when passed by name, and its binding flags.

use std::rc::Rc;

use crate::ast::Type;
use crate::ast::core::{Expr, ExprKind, Variable};
use crate::binder::{ArgumentFlags, ArgumentInfo};
use crate::error::BuildError;

/// Immutable argument handle; cloning keeps identity.
#[derive(Debug, Clone)]
pub struct Argument(Rc<ArgumentData>);

#[derive(Debug)]
struct ArgumentData {
    expression: Expr,
    name: Option<String>,
    flags: ArgumentFlags,
}

impl Argument {
    /// Argument with flags inferred from the expression.
    pub fn new(expression: Expr) -> Result<Self, BuildError> {
        let flags = ArgumentFlags::infer(&expression);
        Self::with_flags(expression, None, flags)
    }

    /// Named argument (`name: expression`), flags inferred.
    pub fn named(name: impl Into<String>, expression: Expr) -> Result<Self, BuildError> {
        let flags = ArgumentFlags::infer(&expression) | ArgumentFlags::NAMED_ARGUMENT;
        Self::with_flags(expression, Some(name.into()), flags)
    }

    /// Argument with explicit name and flags.
    pub fn with_flags(
        expression: Expr,
        name: Option<String>,
        flags: ArgumentFlags,
    ) -> Result<Self, BuildError> {
        require_readable(&expression)?;
        if name.as_deref().is_some_and(str::is_empty) {
            return Err(BuildError::EmptyName("argument name"));
        }
        Ok(Self::from_parts(expression, name, flags))
    }

    /// Assignment target: only has to be writable, flags inferred.
    pub fn target(expression: Expr) -> Result<Self, BuildError> {
        require_writable(&expression)?;
        let flags = ArgumentFlags::infer(&expression);
        Ok(Self::from_parts(expression, None, flags))
    }

    pub(crate) fn from_parts(expression: Expr, name: Option<String>, flags: ArgumentFlags) -> Self {
        Argument(Rc::new(ArgumentData {
            expression,
            name,
            flags,
        }))
    }

    pub fn expression(&self) -> &Expr {
        &self.0.expression
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn flags(&self) -> ArgumentFlags {
        self.0.flags
    }

    pub fn ty(&self) -> Type {
        self.0.expression.ty()
    }

    /// Binding information handed to the binder for this argument.
    pub fn info(&self) -> ArgumentInfo {
        ArgumentInfo::new(self.0.flags, self.0.name.clone())
    }

    pub fn ptr_eq(&self, other: &Argument) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Same argument over a different expression. Returns `self` when the
    /// expression is the one already held. A write-only target stays a
    /// target: the replacement must be writable instead of readable.
    pub fn update(&self, expression: Expr) -> Result<Argument, BuildError> {
        if expression.ptr_eq(&self.0.expression) {
            return Ok(self.clone());
        }
        if self.0.expression.can_read() {
            return Self::with_flags(expression, self.0.name.clone(), self.0.flags);
        }
        require_writable(&expression)?;
        Ok(Self::from_parts(expression, self.0.name.clone(), self.0.flags))
    }
}

impl ArgumentFlags {
    /// Flags for an argument given only its expression: literal non-null
    /// constants are `CONSTANT`, anything not typed as the dynamic type binds
    /// with `USE_COMPILE_TIME_TYPE`.
    pub fn infer(expression: &Expr) -> ArgumentFlags {
        let mut flags = ArgumentFlags::empty();
        if let ExprKind::Constant { value, .. } = expression.kind()
            && !value.is_null()
        {
            flags |= ArgumentFlags::CONSTANT;
        }
        if expression.ty() != Type::Object {
            flags |= ArgumentFlags::USE_COMPILE_TIME_TYPE;
        }
        flags
    }
}

pub(crate) fn require_readable(expression: &Expr) -> Result<(), BuildError> {
    if expression.can_read() {
        Ok(())
    } else {
        Err(BuildError::NotReadable(expression.to_string()))
    }
}

pub(crate) fn require_writable(expression: &Expr) -> Result<(), BuildError> {
    if expression.can_write() {
        Ok(())
    } else {
        Err(BuildError::NotWritable(expression.to_string()))
    }
}

/// Anything the factory accepts where an argument is expected: a bare
/// expression (flags inferred) or a pre-built `Argument` (flags kept).
pub trait IntoArgument {
    fn into_argument(self) -> Result<Argument, BuildError>;

    /// Left operand of an assignment. Bare expressions only have to be
    /// writable here; the assignment node checks readability when its
    /// operator reads the target.
    fn into_target(self) -> Result<Argument, BuildError>
    where
        Self: Sized,
    {
        self.into_argument()
    }
}

impl IntoArgument for Argument {
    fn into_argument(self) -> Result<Argument, BuildError> {
        Ok(self)
    }
}

impl IntoArgument for &Argument {
    fn into_argument(self) -> Result<Argument, BuildError> {
        Ok(self.clone())
    }
}

impl IntoArgument for Expr {
    fn into_argument(self) -> Result<Argument, BuildError> {
        Argument::new(self)
    }

    fn into_target(self) -> Result<Argument, BuildError> {
        Argument::target(self)
    }
}

impl IntoArgument for &Expr {
    fn into_argument(self) -> Result<Argument, BuildError> {
        Argument::new(self.clone())
    }

    fn into_target(self) -> Result<Argument, BuildError> {
        Argument::target(self.clone())
    }
}

impl IntoArgument for Variable {
    fn into_argument(self) -> Result<Argument, BuildError> {
        Argument::new(Expr::from(self))
    }

    fn into_target(self) -> Result<Argument, BuildError> {
        Argument::target(Expr::from(self))
    }
}

impl IntoArgument for &Variable {
    fn into_argument(self) -> Result<Argument, BuildError> {
        Argument::new(Expr::from(self))
    }

    fn into_target(self) -> Result<Argument, BuildError> {
        Argument::target(Expr::from(self))
    }
}

pub(crate) fn into_arguments<I>(arguments: I) -> Result<Vec<Argument>, BuildError>
where
    I: IntoIterator,
    I::Item: IntoArgument,
{
    arguments
        .into_iter()
        .map(IntoArgument::into_argument)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::core::Access;

    #[test]
    fn infers_constant_only_for_non_null_literals() {
        assert!(ArgumentFlags::infer(&Expr::constant(5)).contains(ArgumentFlags::CONSTANT));
        assert!(!ArgumentFlags::infer(&Expr::null(Type::Object)).contains(ArgumentFlags::CONSTANT));
    }

    #[test]
    fn infers_compile_time_type_for_non_dynamic() {
        let d = Expr::from(Variable::new("d", Type::Object));
        let i = Expr::from(Variable::new("i", Type::Int));
        assert_eq!(ArgumentFlags::infer(&d), ArgumentFlags::empty());
        assert_eq!(
            ArgumentFlags::infer(&i),
            ArgumentFlags::USE_COMPILE_TIME_TYPE
        );
    }

    #[test]
    fn named_argument_sets_flag() {
        let arg = Argument::named("count", Expr::constant(3)).unwrap();
        assert_eq!(arg.name(), Some("count"));
        assert!(arg.flags().contains(ArgumentFlags::NAMED_ARGUMENT));
        assert!(Argument::named("", Expr::constant(3)).is_err());
    }

    #[test]
    fn update_with_same_expression_is_identity() {
        let e = Expr::constant(1);
        let arg = Argument::new(e.clone()).unwrap();
        assert!(arg.update(e).unwrap().ptr_eq(&arg));
    }

    #[test]
    fn update_with_new_expression_keeps_name_and_flags() {
        let arg = Argument::with_flags(
            Expr::constant(1),
            Some("x".into()),
            ArgumentFlags::IS_REF,
        )
        .unwrap();
        let updated = arg.update(Expr::constant(2)).unwrap();
        assert!(!updated.ptr_eq(&arg));
        assert_eq!(updated.name(), Some("x"));
        assert_eq!(updated.flags(), ArgumentFlags::IS_REF);
    }

    #[test]
    fn rejects_write_only_expression() {
        let obj = Expr::from(Variable::new("obj", Type::class("Sink")));
        let sink = Expr::member_with_access(obj, "Value", Type::Int, Access::WriteOnly);
        assert!(matches!(
            Argument::new(sink),
            Err(BuildError::NotReadable(_))
        ));
    }

    #[test]
    fn write_only_expression_is_a_valid_target() {
        let obj = Expr::from(Variable::new("obj", Type::class("Sink")));
        let sink = Expr::member_with_access(obj.clone(), "Value", Type::Int, Access::WriteOnly);
        let target = Argument::target(sink).unwrap();
        assert_eq!(target.flags(), ArgumentFlags::USE_COMPILE_TIME_TYPE);

        let other = Expr::member_with_access(obj, "Other", Type::Int, Access::WriteOnly);
        assert!(target.update(other).is_ok());
        assert!(matches!(
            Argument::target(Expr::constant(1)),
            Err(BuildError::NotWritable(_))
        ));
    }
}
