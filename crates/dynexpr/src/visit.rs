//! Tree rewriting
//!
//! A `Visitor` rewrites a tree bottom-up. Every `visit_*` method defaults to
//! the matching `walk_*` function, which visits the children and rebuilds
//! the node only if some child changed. An untouched subtree comes back as
//! the very same `Expr`, so rewriting a large tree where little changes is
//! cheap.
//!
//! Rebuilding a dynamic node goes through its `update`, which re-runs
//! construction validation; that is the only way a rewrite can fail.
//!
//! # Example
//!
//! ```text
//! struct RenameMembers;
//!
//! impl Visitor for RenameMembers {
//!     fn visit_get_member(&mut self, expr: &Expr, node: &Rc<GetMemberDynamic>)
//!         -> Result<Expr, BuildError>
//!     {
//!         let object = self.visit(node.object())?;
//!         let renamed = GetMemberDynamic::new(object, "Renamed", node.arguments().to_vec(), ..)?;
//!         Ok(renamed.into())
//!     }
//! }
//! ```

use std::rc::Rc;

use crate::argument::Argument;
use crate::ast::core::{Expr, ExprKind, Variable};
use crate::ast::dynamic::{
    AssignBinaryDynamic, AssignUnaryDynamic, BinaryDynamic, ConvertDynamic, DynamicExpr,
    GetIndexDynamic, GetMemberDynamic, InvokeConstructorDynamic, InvokeDynamic,
    InvokeMemberDynamic, InvokeTarget, UnaryDynamic,
};
use crate::ast::value::Value;
use crate::binder::DynamicCallSite;
use crate::error::BuildError;

// Visitor Trait

pub trait Visitor {
    /// Visit any expression.
    fn visit(&mut self, expr: &Expr) -> Result<Expr, BuildError> {
        walk_expr(self, expr)
    }

    fn visit_argument(&mut self, argument: &Argument) -> Result<Argument, BuildError> {
        walk_argument(self, argument)
    }

    /// Variables are leaves.
    fn visit_variable(&mut self, expr: &Expr, _variable: &Variable) -> Result<Expr, BuildError> {
        Ok(expr.clone())
    }

    /// Constants are leaves.
    fn visit_constant(&mut self, expr: &Expr, _value: &Value) -> Result<Expr, BuildError> {
        Ok(expr.clone())
    }

    /// Visit a dynamic node; dispatches to the per-kind method.
    fn visit_dynamic(&mut self, expr: &Expr, node: &DynamicExpr) -> Result<Expr, BuildError> {
        walk_dynamic(self, expr, node)
    }

    fn visit_binary(&mut self, expr: &Expr, node: &Rc<BinaryDynamic>) -> Result<Expr, BuildError> {
        walk_binary(self, expr, node)
    }

    fn visit_unary(&mut self, expr: &Expr, node: &Rc<UnaryDynamic>) -> Result<Expr, BuildError> {
        walk_unary(self, expr, node)
    }

    fn visit_assign_binary(
        &mut self,
        expr: &Expr,
        node: &Rc<AssignBinaryDynamic>,
    ) -> Result<Expr, BuildError> {
        walk_assign_binary(self, expr, node)
    }

    fn visit_assign_unary(
        &mut self,
        expr: &Expr,
        node: &Rc<AssignUnaryDynamic>,
    ) -> Result<Expr, BuildError> {
        walk_assign_unary(self, expr, node)
    }

    fn visit_get_member(
        &mut self,
        expr: &Expr,
        node: &Rc<GetMemberDynamic>,
    ) -> Result<Expr, BuildError> {
        walk_get_member(self, expr, node)
    }

    fn visit_get_index(
        &mut self,
        expr: &Expr,
        node: &Rc<GetIndexDynamic>,
    ) -> Result<Expr, BuildError> {
        walk_get_index(self, expr, node)
    }

    fn visit_invoke(&mut self, expr: &Expr, node: &Rc<InvokeDynamic>) -> Result<Expr, BuildError> {
        walk_invoke(self, expr, node)
    }

    fn visit_invoke_member(
        &mut self,
        expr: &Expr,
        node: &Rc<InvokeMemberDynamic>,
    ) -> Result<Expr, BuildError> {
        walk_invoke_member(self, expr, node)
    }

    fn visit_invoke_constructor(
        &mut self,
        expr: &Expr,
        node: &Rc<InvokeConstructorDynamic>,
    ) -> Result<Expr, BuildError> {
        walk_invoke_constructor(self, expr, node)
    }

    fn visit_convert(
        &mut self,
        expr: &Expr,
        node: &Rc<ConvertDynamic>,
    ) -> Result<Expr, BuildError> {
        walk_convert(self, expr, node)
    }
}

impl Expr {
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) -> Result<Expr, BuildError> {
        visitor.visit(self)
    }
}

// Walk Functions

pub fn walk_argument<V: Visitor + ?Sized>(
    visitor: &mut V,
    argument: &Argument,
) -> Result<Argument, BuildError> {
    let expression = visitor.visit(argument.expression())?;
    argument.update(expression)
}

fn walk_arguments<V: Visitor + ?Sized>(
    visitor: &mut V,
    arguments: &[Argument],
) -> Result<Vec<Argument>, BuildError> {
    arguments
        .iter()
        .map(|argument| visitor.visit_argument(argument))
        .collect()
}

fn walk_all<V: Visitor + ?Sized>(
    visitor: &mut V,
    exprs: &[Expr],
) -> Result<(Vec<Expr>, bool), BuildError> {
    let mut changed = false;
    let mut out = Vec::with_capacity(exprs.len());
    for expr in exprs {
        let new = visitor.visit(expr)?;
        changed |= !new.ptr_eq(expr);
        out.push(new);
    }
    Ok((out, changed))
}

/// `expr` itself when `updated` is the node it already wraps.
fn same_or_new<T>(expr: &Expr, node: &Rc<T>, updated: Rc<T>) -> Expr
where
    Rc<T>: Into<Expr>,
{
    if Rc::ptr_eq(node, &updated) {
        expr.clone()
    } else {
        updated.into()
    }
}

/// Visit the children of a primitive node, rebuilding it if any changed.
pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expr) -> Result<Expr, BuildError> {
    match expr.kind() {
        ExprKind::Constant { value, .. } => visitor.visit_constant(expr, value),
        ExprKind::Variable(variable) => visitor.visit_variable(expr, variable),
        ExprKind::Default(_) => Ok(expr.clone()),
        ExprKind::Extension(node) => visitor.visit_dynamic(expr, node),

        ExprKind::Assign { target, value } => {
            let new_target = visitor.visit(target)?;
            let new_value = visitor.visit(value)?;
            if new_target.ptr_eq(target) && new_value.ptr_eq(value) {
                return Ok(expr.clone());
            }
            Ok(Expr::assign(new_target, new_value))
        }
        ExprKind::Block { variables, body } => {
            let (body, changed) = walk_all(visitor, body)?;
            if !changed {
                return Ok(expr.clone());
            }
            Ok(Expr::block(variables.clone(), body))
        }
        ExprKind::Conditional {
            test,
            if_true,
            if_false,
            ty,
        } => {
            let new_test = visitor.visit(test)?;
            let new_true = visitor.visit(if_true)?;
            let new_false = visitor.visit(if_false)?;
            if new_test.ptr_eq(test) && new_true.ptr_eq(if_true) && new_false.ptr_eq(if_false) {
                return Ok(expr.clone());
            }
            Ok(Expr::conditional_typed(
                new_test,
                new_true,
                new_false,
                ty.clone(),
            ))
        }
        ExprKind::Coalesce { left, right } => {
            let new_left = visitor.visit(left)?;
            let new_right = visitor.visit(right)?;
            if new_left.ptr_eq(left) && new_right.ptr_eq(right) {
                return Ok(expr.clone());
            }
            Ok(Expr::coalesce(new_left, new_right))
        }
        ExprKind::Convert { operand, ty } => {
            let new_operand = visitor.visit(operand)?;
            if new_operand.ptr_eq(operand) {
                return Ok(expr.clone());
            }
            Ok(Expr::convert(new_operand, ty.clone()))
        }
        ExprKind::Member {
            object,
            name,
            ty,
            access,
        } => {
            let new_object = visitor.visit(object)?;
            if new_object.ptr_eq(object) {
                return Ok(expr.clone());
            }
            Ok(Expr::member_with_access(
                new_object,
                name.clone(),
                ty.clone(),
                *access,
            ))
        }
        ExprKind::Index {
            object,
            arguments,
            ty,
        } => {
            let new_object = visitor.visit(object)?;
            let (arguments, changed) = walk_all(visitor, arguments)?;
            if !changed && new_object.ptr_eq(object) {
                return Ok(expr.clone());
            }
            Ok(Expr::index(new_object, arguments, ty.clone()))
        }
        ExprKind::Call {
            function,
            arguments,
            ty,
        } => {
            let (arguments, changed) = walk_all(visitor, arguments)?;
            if !changed {
                return Ok(expr.clone());
            }
            Ok(Expr::call(function.clone(), arguments, ty.clone()))
        }
        ExprKind::DynamicCall { site, ty } => {
            let (arguments, changed) = walk_all(visitor, &site.arguments)?;
            if !changed {
                return Ok(expr.clone());
            }
            let site = DynamicCallSite {
                binder: site.binder.clone(),
                arguments,
                argument_types: site.argument_types.clone(),
            };
            Ok(Expr::dynamic_call(site, ty.clone()))
        }
    }
}

pub fn walk_dynamic<V: Visitor + ?Sized>(
    visitor: &mut V,
    expr: &Expr,
    node: &DynamicExpr,
) -> Result<Expr, BuildError> {
    match node {
        DynamicExpr::Binary(node) => visitor.visit_binary(expr, node),
        DynamicExpr::Unary(node) => visitor.visit_unary(expr, node),
        DynamicExpr::AssignBinary(node) => visitor.visit_assign_binary(expr, node),
        DynamicExpr::AssignUnary(node) => visitor.visit_assign_unary(expr, node),
        DynamicExpr::GetMember(node) => visitor.visit_get_member(expr, node),
        DynamicExpr::GetIndex(node) => visitor.visit_get_index(expr, node),
        DynamicExpr::Invoke(node) => visitor.visit_invoke(expr, node),
        DynamicExpr::InvokeMember(node) => visitor.visit_invoke_member(expr, node),
        DynamicExpr::InvokeConstructor(node) => visitor.visit_invoke_constructor(expr, node),
        DynamicExpr::Convert(node) => visitor.visit_convert(expr, node),
    }
}

pub fn walk_binary<V: Visitor + ?Sized>(
    visitor: &mut V,
    expr: &Expr,
    node: &Rc<BinaryDynamic>,
) -> Result<Expr, BuildError> {
    let left = visitor.visit_argument(node.left())?;
    let right = visitor.visit_argument(node.right())?;
    Ok(same_or_new(expr, node, node.update(left, right)?))
}

pub fn walk_unary<V: Visitor + ?Sized>(
    visitor: &mut V,
    expr: &Expr,
    node: &Rc<UnaryDynamic>,
) -> Result<Expr, BuildError> {
    let operand = visitor.visit_argument(node.operand())?;
    Ok(same_or_new(expr, node, node.update(operand)?))
}

pub fn walk_assign_binary<V: Visitor + ?Sized>(
    visitor: &mut V,
    expr: &Expr,
    node: &Rc<AssignBinaryDynamic>,
) -> Result<Expr, BuildError> {
    let left = visitor.visit_argument(node.left())?;
    let right = visitor.visit_argument(node.right())?;
    Ok(same_or_new(expr, node, node.update(left, right)?))
}

pub fn walk_assign_unary<V: Visitor + ?Sized>(
    visitor: &mut V,
    expr: &Expr,
    node: &Rc<AssignUnaryDynamic>,
) -> Result<Expr, BuildError> {
    let operand = visitor.visit_argument(node.operand())?;
    Ok(same_or_new(expr, node, node.update(operand)?))
}

pub fn walk_get_member<V: Visitor + ?Sized>(
    visitor: &mut V,
    expr: &Expr,
    node: &Rc<GetMemberDynamic>,
) -> Result<Expr, BuildError> {
    let object = visitor.visit(node.object())?;
    let arguments = walk_arguments(visitor, node.arguments())?;
    Ok(same_or_new(expr, node, node.update(object, arguments)?))
}

pub fn walk_get_index<V: Visitor + ?Sized>(
    visitor: &mut V,
    expr: &Expr,
    node: &Rc<GetIndexDynamic>,
) -> Result<Expr, BuildError> {
    let object = visitor.visit(node.object())?;
    let arguments = walk_arguments(visitor, node.arguments())?;
    Ok(same_or_new(expr, node, node.update(object, arguments)?))
}

pub fn walk_invoke<V: Visitor + ?Sized>(
    visitor: &mut V,
    expr: &Expr,
    node: &Rc<InvokeDynamic>,
) -> Result<Expr, BuildError> {
    let callee = visitor.visit(node.expression())?;
    let arguments = walk_arguments(visitor, node.arguments())?;
    Ok(same_or_new(expr, node, node.update(callee, arguments)?))
}

pub fn walk_invoke_member<V: Visitor + ?Sized>(
    visitor: &mut V,
    expr: &Expr,
    node: &Rc<InvokeMemberDynamic>,
) -> Result<Expr, BuildError> {
    let target = match node.target() {
        InvokeTarget::Instance(object) => InvokeTarget::Instance(visitor.visit(object)?),
        InvokeTarget::Static(ty) => InvokeTarget::Static(ty.clone()),
    };
    let arguments = walk_arguments(visitor, node.arguments())?;
    Ok(same_or_new(expr, node, node.update(target, arguments)?))
}

pub fn walk_invoke_constructor<V: Visitor + ?Sized>(
    visitor: &mut V,
    expr: &Expr,
    node: &Rc<InvokeConstructorDynamic>,
) -> Result<Expr, BuildError> {
    let arguments = walk_arguments(visitor, node.arguments())?;
    Ok(same_or_new(expr, node, node.update(arguments)?))
}

pub fn walk_convert<V: Visitor + ?Sized>(
    visitor: &mut V,
    expr: &Expr,
    node: &Rc<ConvertDynamic>,
) -> Result<Expr, BuildError> {
    let operand = visitor.visit(node.expression())?;
    Ok(same_or_new(expr, node, node.update(operand)?))
}

// Full reduction

struct ReduceAll;

impl Visitor for ReduceAll {
    fn visit_dynamic(&mut self, _expr: &Expr, node: &DynamicExpr) -> Result<Expr, BuildError> {
        let reduced = node.reduce();
        self.visit(&reduced)
    }
}

/// Reduce every dynamic node in `expr`, including those nested in operands
/// and in the output of other reductions, until only primitive nodes
/// remain.
pub fn reduce_all(expr: &Expr) -> Expr {
    match ReduceAll.visit(expr) {
        Ok(reduced) => reduced,
        // Dynamic nodes are reduced before their children are visited, so
        // nothing is ever rebuilt through validation.
        Err(err) => unreachable!("full reduction rebuilt an invalid node: {err}"),
    }
}

/// Whether `expr` still contains a dynamic node anywhere.
pub fn contains_dynamic(expr: &Expr) -> bool {
    struct Finder(bool);

    impl Visitor for Finder {
        fn visit_dynamic(&mut self, expr: &Expr, _node: &DynamicExpr) -> Result<Expr, BuildError> {
            self.0 = true;
            Ok(expr.clone())
        }
    }

    let mut finder = Finder(false);
    // Finder never rebuilds anything.
    let _ = finder.visit(expr);
    finder.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Type;
    use crate::binder::BinderOptions;
    use crate::factory;

    struct Identity;
    impl Visitor for Identity {}

    /// Replaces every variable named `from` with `to`.
    struct Substitute {
        from: &'static str,
        to: Expr,
    }

    impl Visitor for Substitute {
        fn visit_variable(&mut self, expr: &Expr, variable: &Variable) -> Result<Expr, BuildError> {
            if variable.name() == self.from {
                Ok(self.to.clone())
            } else {
                Ok(expr.clone())
            }
        }
    }

    fn var(name: &str, ty: Type) -> Expr {
        Expr::from(Variable::new(name, ty))
    }

    fn sample() -> Expr {
        let obj = var("obj", Type::Object);
        let member = factory::get_member(obj, "Count", BinderOptions::new()).unwrap();
        factory::add_assign(member, var("delta", Type::Object), BinderOptions::new()).unwrap()
    }

    #[test]
    fn identity_visit_returns_same_tree() {
        let expr = sample();
        let out = expr.accept(&mut Identity).unwrap();
        assert!(out.ptr_eq(&expr));

        let reduced = expr.reduce();
        assert!(reduced.accept(&mut Identity).unwrap().ptr_eq(&reduced));
    }

    #[test]
    fn substitution_rebuilds_only_the_changed_path() {
        let expr = sample();
        let replacement = var("other", Type::Object);
        let out = expr
            .accept(&mut Substitute {
                from: "delta",
                to: replacement.clone(),
            })
            .unwrap();
        assert!(!out.ptr_eq(&expr));
        let Some(DynamicExpr::AssignBinary(new)) = out.as_dynamic() else {
            panic!("expected compound assignment");
        };
        let Some(DynamicExpr::AssignBinary(old)) = expr.as_dynamic() else {
            panic!("expected compound assignment");
        };
        assert!(new.left().ptr_eq(old.left()));
        assert!(new.right().expression().ptr_eq(&replacement));
    }

    #[test]
    fn rewrite_revalidates() {
        let x = var("x", Type::Object);
        let expr = factory::add_assign(&x, Expr::constant(1), BinderOptions::new()).unwrap();
        let err = expr
            .accept(&mut Substitute {
                from: "x",
                to: Expr::constant(1),
            })
            .unwrap_err();
        assert!(matches!(err, BuildError::NotWritable(_)));
    }

    #[test]
    fn reduce_all_leaves_no_dynamic_nodes() {
        let inner = factory::add(var("a", Type::Object), Expr::constant(1), BinderOptions::new())
            .unwrap();
        let outer = factory::get_index(
            var("list", Type::Object),
            [inner],
            BinderOptions::new(),
        )
        .unwrap();
        let expr = factory::post_increment_assign(outer, BinderOptions::new()).unwrap();
        assert!(contains_dynamic(&expr));
        let reduced = reduce_all(&expr);
        assert!(!contains_dynamic(&reduced));
    }
}
