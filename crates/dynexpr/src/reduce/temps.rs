//! Temp capture for lowering
//!
//! Receivers and arguments that are read and then written must be evaluated
//! once. A `TempScope` collects the temps and their initializing
//! assignments for one reduction and wraps the tail in a block.

use crate::argument::Argument;
use crate::ast::Type;
use crate::ast::core::{Expr, ExprKind, Variable};
use crate::binder::ArgumentFlags;

#[derive(Debug, Default)]
pub(crate) struct TempScope {
    variables: Vec<Variable>,
    statements: Vec<Expr>,
}

impl TempScope {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Evaluate `expr` into a fresh temp and return the temp. Temps from an
    /// enclosing lowering are already single-assignment and come back as is.
    pub(crate) fn capture(&mut self, expr: &Expr, name: &str) -> Expr {
        if expr.as_variable().is_some_and(Variable::is_synthesized) {
            return expr.clone();
        }
        let temp = Variable::synthesized(name, expr.ty());
        let temp_expr = Expr::from(&temp);
        self.statements
            .push(Expr::assign(temp_expr.clone(), expr.clone()));
        self.variables.push(temp);
        temp_expr
    }

    /// Capture a member or indexer receiver.
    ///
    /// Value-typed storage stays where it is so writes through the receiver
    /// land in the original slot: variables are used directly, array
    /// elements keep their slot with the array and index captured.
    pub(crate) fn spill_receiver(&mut self, object: &Expr) -> Expr {
        match object.kind() {
            ExprKind::Variable(_) if object.ty().is_value_type() => object.clone(),
            ExprKind::Constant { ty: Type::Meta, .. } => object.clone(),
            ExprKind::Index {
                object: array,
                arguments,
                ty,
            } if ty.is_value_type() && array.ty().element_type().is_some() => {
                let array = self.capture(array, "__object");
                let arguments = arguments
                    .iter()
                    .enumerate()
                    .map(|(i, index)| self.capture(index, &format!("__arg{i}")))
                    .collect();
                Expr::index(array, arguments, ty.clone())
            }
            _ => self.capture(object, "__object"),
        }
    }

    /// Capture argument `index` as `__arg{index}`. By-ref arguments denote a
    /// location, not a value, and are left alone.
    pub(crate) fn spill_argument(&mut self, argument: &Argument, index: usize) -> Argument {
        if argument.flags().is_by_ref() {
            return argument.clone();
        }
        let temp = self.capture(argument.expression(), &format!("__arg{index}"));
        rebind_to_temp(argument, temp)
    }

    pub(crate) fn spill_arguments(&mut self, arguments: &[Argument]) -> Vec<Argument> {
        arguments
            .iter()
            .enumerate()
            .map(|(i, argument)| self.spill_argument(argument, i))
            .collect()
    }

    pub(crate) fn push(&mut self, statement: Expr) {
        self.statements.push(statement);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.statements.is_empty()
    }

    /// Block of the captures followed by `tail`; just `tail` if nothing was
    /// captured.
    pub(crate) fn finish(mut self, tail: Expr) -> Expr {
        if self.is_empty() {
            return tail;
        }
        self.statements.push(tail);
        Expr::block(self.variables, self.statements)
    }
}

/// Same argument over a captured temp. A temp is never a literal.
pub(crate) fn rebind_to_temp(argument: &Argument, temp: Expr) -> Argument {
    if temp.ptr_eq(argument.expression()) {
        return argument.clone();
    }
    Argument::from_parts(
        temp,
        argument.name().map(str::to_owned),
        argument.flags() - ArgumentFlags::CONSTANT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scope_returns_tail() {
        let tail = Expr::constant(1);
        let out = TempScope::new().finish(tail.clone());
        assert!(out.ptr_eq(&tail));
    }

    #[test]
    fn capture_declares_and_assigns() {
        let mut scope = TempScope::new();
        let obj = Expr::from(Variable::new("obj", Type::Object));
        let temp = scope.capture(&obj, "__object");
        let temp_var = temp.as_variable().unwrap().clone();
        assert!(temp_var.is_synthesized());
        assert_eq!(temp_var.name(), "__object");

        let block = scope.finish(temp.clone());
        let ExprKind::Block { variables, body } = block.kind() else {
            panic!("expected block");
        };
        assert_eq!(variables, &vec![temp_var]);
        assert_eq!(body.len(), 2);
        assert!(body[1].ptr_eq(&temp));
    }

    #[test]
    fn synthesized_temps_are_not_recaptured() {
        let mut scope = TempScope::new();
        let obj = Expr::from(Variable::new("obj", Type::Object));
        let first = scope.capture(&obj, "__object");
        let second = scope.capture(&first, "__object");
        assert!(first.ptr_eq(&second));
    }

    #[test]
    fn value_typed_variable_receiver_stays_in_place() {
        let mut scope = TempScope::new();
        let point = Expr::from(Variable::new("p", Type::structure("Point")));
        let receiver = scope.spill_receiver(&point);
        assert!(receiver.ptr_eq(&point));
        assert!(scope.is_empty());
    }

    #[test]
    fn value_typed_array_element_keeps_its_slot() {
        let mut scope = TempScope::new();
        let points = Expr::from(Variable::new("points", Type::array(Type::structure("Point"))));
        let element = Expr::array_index(points, Expr::constant(2));
        let receiver = scope.spill_receiver(&element);
        let ExprKind::Index { object, arguments, .. } = receiver.kind() else {
            panic!("expected index");
        };
        assert!(object.as_variable().unwrap().is_synthesized());
        assert!(arguments[0].as_variable().unwrap().is_synthesized());
    }

    #[test]
    fn by_ref_arguments_are_not_captured() {
        let mut scope = TempScope::new();
        let x = Expr::from(Variable::new("x", Type::Int));
        let arg = Argument::with_flags(x, None, ArgumentFlags::IS_REF).unwrap();
        let spilled = scope.spill_argument(&arg, 0);
        assert!(spilled.ptr_eq(&arg));
        assert!(scope.is_empty());
    }

    #[test]
    fn captured_constant_loses_constant_flag() {
        let mut scope = TempScope::new();
        let arg = Argument::new(Expr::constant(3)).unwrap();
        let spilled = scope.spill_argument(&arg, 1);
        assert!(!spilled.flags().contains(ArgumentFlags::CONSTANT));
        assert_eq!(spilled.expression().as_variable().unwrap().name(), "__arg1");
    }
}
