//! Compound assignment lowering
//!
//! Every compound assignment lowers to: captures of the target's receiver
//! and arguments, one read, the operator as a dynamic call, one write. The
//! target decides what read and write look like:
//!
//! - a variable is read and written in place
//! - a static member or index is rebuilt over captured operands
//! - a dynamic member or index becomes get/set calls over captured operands
//!
//! `+=` and `-=` on a dynamic member without arguments first ask the binder
//! whether the member is an event and, if so, call its accessor instead.

use std::rc::Rc;

use log::{debug, trace};

use super::temps::TempScope;
use super::{binary_call, convert_to, lowered_argument, unary_call};
use crate::ast::core::{Expr, ExprKind};
use crate::ast::dynamic::{
    AssignBinaryDynamic, AssignUnaryDynamic, DynamicExpr, GetIndexDynamic, GetMemberDynamic,
    InvokeMemberDynamic, InvokeTarget,
};
use crate::ast::{ExpressionType, Type};
use crate::binder::BinderFlags;
use crate::factory::{Fixity, binder_operator, fixity};

/// Assignment target after its operands have been captured.
enum Target {
    /// Variable, or static member/index over captured operands
    Static(Expr),
    Member(Rc<GetMemberDynamic>),
    Index(Rc<GetIndexDynamic>),
}

impl Target {
    /// Capture the operands of `target` into `scope`.
    fn spill(target: &Expr, scope: &mut TempScope) -> Target {
        match target.kind() {
            ExprKind::Member {
                object,
                name,
                ty,
                access,
            } => {
                let object = scope.spill_receiver(object);
                Target::Static(Expr::member_with_access(
                    object,
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
                let object = scope.spill_receiver(object);
                let arguments = arguments
                    .iter()
                    .enumerate()
                    .map(|(i, index)| scope.capture(index, &format!("__arg{i}")))
                    .collect();
                Target::Static(Expr::index(object, arguments, ty.clone()))
            }
            ExprKind::Extension(DynamicExpr::GetMember(member)) => {
                let object = scope.spill_receiver(member.object());
                let arguments = scope.spill_arguments(member.arguments());
                Target::Member(member.with_operands(object, arguments))
            }
            ExprKind::Extension(DynamicExpr::GetIndex(index)) => {
                let object = scope.spill_receiver(index.object());
                let arguments = scope.spill_arguments(index.arguments());
                Target::Index(index.with_operands(object, arguments))
            }
            _ => Target::Static(target.clone()),
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            Target::Static(_) => "static",
            Target::Member(_) => "dynamic member",
            Target::Index(_) => "dynamic index",
        }
    }

    fn read(&self) -> Expr {
        match self {
            Target::Static(target) => target.clone(),
            Target::Member(member) => member.reduce(),
            Target::Index(index) => index.reduce(),
        }
    }

    /// Store `value`, yielding the stored value. Static targets convert
    /// the value to their own type first.
    fn write(
        &self,
        value: Expr,
        explicit: bool,
        flags: BinderFlags,
        context: Option<Type>,
    ) -> Expr {
        match self {
            Target::Static(target) => {
                let value = convert_to(value, &target.ty(), explicit, flags, context);
                Expr::assign(target.clone(), value)
            }
            Target::Member(member) => member.reduce_assignment(&lowered_argument(value), flags),
            Target::Index(index) => index.reduce_assignment(&lowered_argument(value), flags),
        }
    }
}

/// The read-modify-write shared by binary and unary compound assignment.
///
/// Prefix yields the written value. Postfix reads into `__temp` before the
/// operator runs and yields it.
fn read_modify_write(
    mut scope: TempScope,
    target: Target,
    fixity: Fixity,
    flags: BinderFlags,
    context: Option<Type>,
    operator: impl FnOnce(Expr) -> Expr,
) -> Expr {
    trace!("read-modify-write over {} target, {fixity:?}", target.shape());
    match fixity {
        Fixity::Prefix => {
            let value = operator(target.read());
            scope.finish(target.write(value, true, flags, context))
        }
        Fixity::Postfix => {
            let old = scope.capture(&target.read(), "__temp");
            let value = operator(old.clone());
            let write = target.write(value, true, flags, context);
            scope.push(write);
            scope.finish(old)
        }
    }
}

fn is_event_operator(kind: ExpressionType) -> Option<&'static str> {
    match kind {
        ExpressionType::AddAssign | ExpressionType::AddAssignChecked => Some("add_"),
        ExpressionType::SubtractAssign | ExpressionType::SubtractAssignChecked => Some("remove_"),
        _ => None,
    }
}

impl AssignBinaryDynamic {
    pub fn reduce(&self) -> Expr {
        match self.kind() {
            ExpressionType::Assign => self.reduce_assign(),
            ExpressionType::NullCoalescingAssign => self.reduce_coalesce_assign(),
            kind => {
                let left = self.left().expression();
                if let Some(prefix) = is_event_operator(kind)
                    && let Some(DynamicExpr::GetMember(member)) = left.as_dynamic()
                    && member.arguments().is_empty()
                {
                    return self.reduce_event(member, prefix);
                }
                let mut scope = TempScope::new();
                let target = Target::spill(left, &mut scope);
                self.reduce_compound(scope, target)
            }
        }
    }

    /// `left = right`. Dynamic targets become their set call.
    fn reduce_assign(&self) -> Expr {
        let left = self.left().expression();
        match left.as_dynamic() {
            Some(DynamicExpr::GetMember(member)) => {
                member.reduce_assignment(self.right(), self.flags())
            }
            Some(DynamicExpr::GetIndex(index)) => {
                index.reduce_assignment(self.right(), self.flags())
            }
            _ => {
                let value = convert_to(
                    self.right().expression().clone(),
                    &left.ty(),
                    false,
                    self.flags(),
                    self.context().cloned(),
                );
                Expr::assign(left.clone(), value)
            }
        }
    }

    /// `left ??= right` as `get(temps) ?? set(temps, right)`.
    fn reduce_coalesce_assign(&self) -> Expr {
        let mut scope = TempScope::new();
        let target = Target::spill(self.left().expression(), &mut scope);
        trace!("lowering ??= over {} target", target.shape());
        let read = target.read();
        let write = match &target {
            Target::Member(member) => member.reduce_assignment(self.right(), self.flags()),
            Target::Index(index) => index.reduce_assignment(self.right(), self.flags()),
            Target::Static(_) => target.write(
                self.right().expression().clone(),
                false,
                self.flags(),
                self.context().cloned(),
            ),
        };
        scope.finish(Expr::coalesce(read, write))
    }

    fn reduce_compound(&self, scope: TempScope, target: Target) -> Expr {
        let operator = binder_operator(self.kind());
        let flags = self.flags();
        let context = self.context().cloned();
        let right = self.right().clone();
        let op_flags = flags | BinderFlags::VALUE_FROM_COMPOUND_ASSIGNMENT;
        let op_context = context.clone();
        read_modify_write(scope, target, Fixity::Prefix, flags, context, move |value| {
            binary_call(operator, lowered_argument(value), right, op_flags, op_context)
        })
    }

    /// `{ __object = receiver; IsEvent(__object) ? __object.add_X(right) : compound }`
    fn reduce_event(&self, member: &Rc<GetMemberDynamic>, accessor_prefix: &str) -> Expr {
        debug!(
            "lowering {:?} on member {} with event probe",
            self.kind(),
            member.name()
        );
        let mut scope = TempScope::new();
        let object = scope.spill_receiver(member.object());
        let member = member.with_operands(object.clone(), Vec::new());

        let probe = member.reduce_is_event();
        let accessor = InvokeMemberDynamic::from_parts(
            InvokeTarget::Instance(object),
            format!("{accessor_prefix}{}", member.name()),
            Vec::new(),
            vec![self.right().clone()],
            self.flags() | BinderFlags::INVOKE_SPECIAL_NAME | BinderFlags::RESULT_DISCARDED,
            self.context().cloned(),
        )
        .reduce();
        let compound = self.reduce_compound(TempScope::new(), Target::Member(member));

        scope.finish(Expr::conditional_typed(
            probe,
            accessor,
            compound,
            Type::Object,
        ))
    }
}

impl AssignUnaryDynamic {
    pub fn reduce(&self) -> Expr {
        let operator = binder_operator(self.kind());
        let fixity = fixity(self.kind());
        let flags = self.flags();
        let context = self.context().cloned();
        let mut scope = TempScope::new();
        let target = Target::spill(self.operand().expression(), &mut scope);
        let op_flags = flags | BinderFlags::VALUE_FROM_COMPOUND_ASSIGNMENT;
        let op_context = context.clone();
        read_modify_write(scope, target, fixity, flags, context, move |value| {
            unary_call(operator, lowered_argument(value), op_flags, op_context)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::core::Variable;
    use crate::binder::{BinderOptions, DynamicCallSite, Operation};
    use crate::factory;

    fn var(name: &str, ty: Type) -> Expr {
        Expr::from(Variable::new(name, ty))
    }

    fn site_of(expr: &Expr) -> &DynamicCallSite {
        match expr.kind() {
            ExprKind::DynamicCall { site, .. } => site,
            other => panic!("expected dynamic call, got {other:?}"),
        }
    }

    fn block_parts(expr: &Expr) -> (&[Variable], &[Expr]) {
        match expr.kind() {
            ExprKind::Block { variables, body } => (variables, body),
            other => panic!("expected block, got {other:?}"),
        }
    }

    fn temp_names(expr: &Expr) -> Vec<String> {
        block_parts(expr)
            .0
            .iter()
            .map(|v| v.name().to_owned())
            .collect()
    }

    #[test]
    fn compound_over_dynamic_variable_needs_no_temps() {
        let x = var("x", Type::Object);
        let expr = factory::add_assign(&x, Expr::constant(1), BinderOptions::new()).unwrap();
        let reduced = expr.reduce();
        let ExprKind::Assign { target, value } = reduced.kind() else {
            panic!("expected assign, got {reduced:?}");
        };
        assert!(target.ptr_eq(&x));
        let site = site_of(value);
        assert_eq!(
            site.binder.operation,
            Operation::BinaryOperation(ExpressionType::Add)
        );
        assert!(
            site.binder
                .flags
                .contains(BinderFlags::VALUE_FROM_COMPOUND_ASSIGNMENT)
        );
    }

    #[test]
    fn compound_over_typed_variable_converts_back_explicitly() {
        let n = var("n", Type::Int);
        let d = var("d", Type::Object);
        let expr = factory::multiply_assign(&n, &d, BinderOptions::new()).unwrap();
        let reduced = expr.reduce();
        let ExprKind::Assign { value, .. } = reduced.kind() else {
            panic!("expected assign");
        };
        let site = site_of(value);
        assert_eq!(site.binder.operation, Operation::Convert(Type::Int));
        assert!(site.binder.flags.contains(BinderFlags::CONVERT_EXPLICIT));
    }

    #[test]
    fn plain_assign_converts_implicitly() {
        let n = var("n", Type::Int);
        let d = var("d", Type::Object);
        let expr = factory::assign(&n, &d, BinderOptions::new()).unwrap();
        let reduced = expr.reduce();
        let ExprKind::Assign { value, .. } = reduced.kind() else {
            panic!("expected assign");
        };
        let site = site_of(value);
        assert_eq!(site.binder.operation, Operation::Convert(Type::Int));
        assert!(!site.binder.flags.contains(BinderFlags::CONVERT_EXPLICIT));
    }

    #[test]
    fn plain_assign_to_dynamic_member_is_set_member() {
        let obj = var("obj", Type::Object);
        let member = factory::get_member(obj, "Name", BinderOptions::new()).unwrap();
        let expr = factory::assign(member, Expr::constant("x"), BinderOptions::new()).unwrap();
        let reduced = expr.reduce();
        assert_eq!(
            site_of(&reduced).binder.operation,
            Operation::SetMember("Name".into())
        );
    }

    #[test]
    fn compound_over_dynamic_index_captures_receiver_and_arguments() {
        let obj = var("obj", Type::Object);
        let i = var("i", Type::Int);
        let j = var("j", Type::Int);
        let target = factory::get_index(obj, [&i, &j], BinderOptions::new()).unwrap();
        let expr = factory::subtract_assign(target, Expr::constant(1), BinderOptions::new())
            .unwrap();
        let reduced = expr.reduce();
        assert_eq!(temp_names(&reduced), ["__object", "__arg0", "__arg1"]);
        let (_, body) = block_parts(&reduced);
        let set = site_of(body.last().unwrap());
        assert_eq!(set.binder.operation, Operation::SetIndex);
        assert_eq!(set.arguments.len(), 4);
        let get = site_of(&set.arguments[3]);
        let read = site_of(&get.arguments[0]);
        assert_eq!(read.binder.operation, Operation::GetIndex);
        for (set_arg, read_arg) in set.arguments[..3].iter().zip(&read.arguments) {
            assert!(set_arg.ptr_eq(read_arg));
        }
    }

    #[test]
    fn prefix_increment_yields_set_result() {
        let obj = var("obj", Type::Object);
        let member = factory::get_member(obj, "Count", BinderOptions::new()).unwrap();
        let expr = factory::pre_increment_assign(member, BinderOptions::new()).unwrap();
        let reduced = expr.reduce();
        assert_eq!(temp_names(&reduced), ["__object"]);
        let (_, body) = block_parts(&reduced);
        let last = site_of(body.last().unwrap());
        assert_eq!(last.binder.operation, Operation::SetMember("Count".into()));
        let op = site_of(&last.arguments[1]);
        assert_eq!(
            op.binder.operation,
            Operation::UnaryOperation(ExpressionType::Increment)
        );
    }

    #[test]
    fn postfix_increment_yields_captured_old_value() {
        let obj = var("obj", Type::Object);
        let member = factory::get_member(obj, "Count", BinderOptions::new()).unwrap();
        let expr = factory::post_increment_assign(member, BinderOptions::new()).unwrap();
        let reduced = expr.reduce();
        assert_eq!(temp_names(&reduced), ["__object", "__temp"]);
        let (variables, body) = block_parts(&reduced);
        assert_eq!(body.len(), 4);
        let old = body.last().unwrap().as_variable().unwrap();
        assert_eq!(old, &variables[1]);
        let set = site_of(&body[2]);
        let op = site_of(&set.arguments[1]);
        assert!(op.arguments[0].as_variable() == Some(old));
    }

    #[test]
    fn postfix_over_variable_captures_old_value() {
        let x = var("x", Type::Object);
        let expr = factory::post_decrement_assign(&x, BinderOptions::new()).unwrap();
        let reduced = expr.reduce();
        assert_eq!(temp_names(&reduced), ["__temp"]);
    }

    #[test]
    fn checked_flag_reaches_the_operator_call() {
        let x = var("x", Type::Object);
        for (checked, expr) in [
            (
                true,
                factory::add_assign_checked(&x, Expr::constant(1), BinderOptions::new()),
            ),
            (
                false,
                factory::add_assign(&x, Expr::constant(1), BinderOptions::new()),
            ),
        ] {
            let reduced = expr.unwrap().reduce();
            let ExprKind::Assign { value, .. } = reduced.kind() else {
                panic!("expected assign");
            };
            assert_eq!(
                site_of(value)
                    .binder
                    .flags
                    .contains(BinderFlags::CHECKED_CONTEXT),
                checked
            );
        }
    }

    #[test]
    fn add_assign_on_member_probes_for_event() {
        let obj = var("obj", Type::Object);
        let member = factory::get_member(obj, "Changed", BinderOptions::new()).unwrap();
        let handler = var("handler", Type::Function);
        let expr = factory::add_assign(member, &handler, BinderOptions::new()).unwrap();
        let reduced = expr.reduce();
        assert_eq!(temp_names(&reduced), ["__object"]);
        let (_, body) = block_parts(&reduced);
        let ExprKind::Conditional {
            test,
            if_true,
            if_false,
            ..
        } = body[1].kind()
        else {
            panic!("expected conditional");
        };
        assert_eq!(
            site_of(test).binder.operation,
            Operation::IsEvent("Changed".into())
        );
        let accessor = site_of(if_true);
        assert!(matches!(
            &accessor.binder.operation,
            Operation::InvokeMember { name, .. } if name == "add_Changed"
        ));
        assert!(accessor.binder.flags.contains(
            BinderFlags::INVOKE_SPECIAL_NAME | BinderFlags::RESULT_DISCARDED
        ));
        assert!(accessor.arguments[1].ptr_eq(&handler));
        assert_eq!(
            site_of(if_false).binder.operation,
            Operation::SetMember("Changed".into())
        );
    }

    #[test]
    fn subtract_assign_uses_remove_accessor() {
        let obj = var("obj", Type::Object);
        let member = factory::get_member(obj, "Changed", BinderOptions::new()).unwrap();
        let expr = factory::subtract_assign_checked(member, Expr::constant(1), BinderOptions::new())
            .unwrap();
        let reduced = expr.reduce();
        let (_, body) = block_parts(&reduced);
        let ExprKind::Conditional { if_true, .. } = body[1].kind() else {
            panic!("expected conditional");
        };
        assert!(matches!(
            &site_of(if_true).binder.operation,
            Operation::InvokeMember { name, .. } if name == "remove_Changed"
        ));
    }

    #[test]
    fn multiply_assign_on_member_has_no_event_probe() {
        let obj = var("obj", Type::Object);
        let member = factory::get_member(obj, "Count", BinderOptions::new()).unwrap();
        let expr = factory::multiply_assign(member, Expr::constant(2), BinderOptions::new())
            .unwrap();
        let reduced = expr.reduce();
        let (_, body) = block_parts(&reduced);
        assert!(!matches!(body[1].kind(), ExprKind::Conditional { .. }));
    }

    #[test]
    fn coalesce_assign_reads_and_writes_through_same_temps() {
        let obj = var("obj", Type::Object);
        let member = factory::get_member(obj, "Name", BinderOptions::new()).unwrap();
        let expr =
            factory::null_coalescing_assign(member, Expr::constant("default"), BinderOptions::new())
                .unwrap();
        let reduced = expr.reduce();
        let (variables, body) = block_parts(&reduced);
        let ExprKind::Coalesce { left, right } = body[1].kind() else {
            panic!("expected coalesce");
        };
        let get = site_of(left);
        let set = site_of(right);
        assert_eq!(get.binder.operation, Operation::GetMember("Name".into()));
        assert_eq!(set.binder.operation, Operation::SetMember("Name".into()));
        assert_eq!(get.arguments[0].as_variable(), Some(&variables[0]));
        assert!(get.arguments[0].ptr_eq(&set.arguments[0]));
    }

    #[test]
    fn static_member_receiver_is_captured() {
        let widget = var("widget", Type::class("Widget"));
        let size = Expr::member(widget, "Size", Type::Object);
        let expr = factory::add_assign(size, Expr::constant(1), BinderOptions::new()).unwrap();
        let reduced = expr.reduce();
        assert_eq!(temp_names(&reduced), ["__object"]);
        let (_, body) = block_parts(&reduced);
        assert!(matches!(body[1].kind(), ExprKind::Assign { .. }));
    }
}
