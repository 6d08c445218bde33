//! Reduction: dynamic nodes to primitive nodes
//!
//! Each dynamic node describes its call site through `reduce_dynamic` and
//! lowers to a `DynamicCall` through `reduce`. Compound assignment lowers
//! through the engine in [`assign`]; `&&`/`||` lower to a truth probe and a
//! conditional.
//!
//! Reduction is one step: operand expressions are kept as they are, so a
//! nested dynamic node is still an `Extension` in the output. Use
//! [`crate::visit::reduce_all`] to reach a fixed point.

mod assign;
mod temps;

use log::trace;

use crate::argument::Argument;
use crate::ast::core::{Expr, ExprKind};
use crate::ast::dynamic::{
    BinaryDynamic, ConvertDynamic, DynamicExpr, GetIndexDynamic, GetMemberDynamic,
    InvokeConstructorDynamic, InvokeDynamic, InvokeMemberDynamic, InvokeTarget, UnaryDynamic,
};
use crate::ast::{ExpressionType, Type};
use crate::binder::{
    ArgumentFlags, ArgumentInfo, BinderFlags, CallSiteBuilder, DynamicCallSite, Operation,
};
use crate::factory::binder_operator;

use temps::{TempScope, rebind_to_temp};

impl Expr {
    /// Whether `reduce` would change this node.
    pub fn can_reduce(&self) -> bool {
        matches!(self.kind(), ExprKind::Extension(_))
    }

    /// Lower a dynamic node one step. Primitive nodes come back unchanged.
    pub fn reduce(&self) -> Expr {
        match self.kind() {
            ExprKind::Extension(node) => node.reduce(),
            _ => self.clone(),
        }
    }
}

impl DynamicExpr {
    pub fn reduce(&self) -> Expr {
        match self {
            DynamicExpr::Binary(node) => node.reduce(),
            DynamicExpr::Unary(node) => node.reduce(),
            DynamicExpr::AssignBinary(node) => node.reduce(),
            DynamicExpr::AssignUnary(node) => node.reduce(),
            DynamicExpr::GetMember(node) => node.reduce(),
            DynamicExpr::GetIndex(node) => node.reduce(),
            DynamicExpr::Invoke(node) => node.reduce(),
            DynamicExpr::InvokeMember(node) => node.reduce(),
            DynamicExpr::InvokeConstructor(node) => node.reduce(),
            DynamicExpr::Convert(node) => node.reduce(),
        }
    }

    /// The single call site this node stands for. Compound assignments
    /// lower to several call sites and have none of their own.
    pub fn reduce_dynamic(&self) -> Option<DynamicCallSite> {
        match self {
            DynamicExpr::Binary(node) => Some(node.reduce_dynamic()),
            DynamicExpr::Unary(node) => Some(node.reduce_dynamic()),
            DynamicExpr::AssignBinary(_) | DynamicExpr::AssignUnary(_) => None,
            DynamicExpr::GetMember(node) => Some(node.reduce_dynamic()),
            DynamicExpr::GetIndex(node) => Some(node.reduce_dynamic()),
            DynamicExpr::Invoke(node) => Some(node.reduce_dynamic()),
            DynamicExpr::InvokeMember(node) => Some(node.reduce_dynamic()),
            DynamicExpr::InvokeConstructor(node) => Some(node.reduce_dynamic()),
            DynamicExpr::Convert(node) => Some(node.reduce_dynamic()),
        }
    }
}

// ============ Call-site helpers ============

fn push_argument(site: &mut CallSiteBuilder, argument: &Argument) {
    site.push(argument.info(), argument.expression().clone());
}

fn push_arguments(site: &mut CallSiteBuilder, arguments: &[Argument]) {
    for argument in arguments {
        push_argument(site, argument);
    }
}

fn is_type_constant(expr: &Expr) -> bool {
    matches!(expr.kind(), ExprKind::Constant { ty: Type::Meta, .. })
}

/// Value-typed storage the binder can mutate in place: a variable or an
/// array element.
fn is_value_slot(expr: &Expr) -> bool {
    if !expr.ty().is_value_type() {
        return false;
    }
    match expr.kind() {
        ExprKind::Variable(_) => true,
        ExprKind::Index { object, .. } => object.ty().element_type().is_some(),
        _ => false,
    }
}

/// Binding information for a member or indexer receiver.
///
/// Get operations never pass the receiver by-ref; set operations do when it
/// is a value-typed slot, so the binder writes through to it.
fn receiver_info(object: &Expr, for_write: bool) -> ArgumentInfo {
    let mut flags = if is_type_constant(object) {
        ArgumentFlags::IS_STATIC_TYPE | ArgumentFlags::USE_COMPILE_TIME_TYPE
    } else {
        ArgumentFlags::infer(object) - ArgumentFlags::CONSTANT
    };
    if for_write && is_value_slot(object) {
        flags |= ArgumentFlags::IS_REF;
    }
    ArgumentInfo::new(flags, None)
}

fn static_type_info() -> ArgumentInfo {
    ArgumentInfo::new(
        ArgumentFlags::IS_STATIC_TYPE | ArgumentFlags::USE_COMPILE_TIME_TYPE,
        None,
    )
}

/// Argument for a value produced during lowering.
fn lowered_argument(expression: Expr) -> Argument {
    let flags = ArgumentFlags::infer(&expression);
    Argument::from_parts(expression, None, flags)
}

/// One-step binary call `operator(left, right)`.
fn binary_call(
    operator: ExpressionType,
    left: Argument,
    right: Argument,
    flags: BinderFlags,
    context: Option<Type>,
) -> Expr {
    let mut site = CallSiteBuilder::with_capacity(2);
    push_argument(&mut site, &left);
    push_argument(&mut site, &right);
    let site = site.finish(Operation::BinaryOperation(operator), flags, context);
    Expr::dynamic_call(site, Type::Object)
}

fn unary_call(
    operator: ExpressionType,
    operand: Argument,
    flags: BinderFlags,
    context: Option<Type>,
) -> Expr {
    let ty = match operator {
        ExpressionType::IsTrue | ExpressionType::IsFalse => Type::Bool,
        _ => Type::Object,
    };
    let mut site = CallSiteBuilder::with_capacity(1);
    push_argument(&mut site, &operand);
    let site = site.finish(Operation::UnaryOperation(operator), flags, context);
    Expr::dynamic_call(site, ty)
}

/// `(ty)value` through the binder, or `value` itself when it already fits.
fn convert_to(
    value: Expr,
    ty: &Type,
    explicit: bool,
    flags: BinderFlags,
    context: Option<Type>,
) -> Expr {
    if ty.is_reference_assignable_from(&value.ty()) {
        return value;
    }
    let mut flags = flags & BinderFlags::CHECKED_CONTEXT;
    if explicit {
        flags |= BinderFlags::CONVERT_EXPLICIT;
    }
    ConvertDynamic::from_parts(value, ty.clone(), flags, context).reduce()
}

// ============ Operators ============

impl BinaryDynamic {
    pub fn reduce_dynamic(&self) -> DynamicCallSite {
        let mut site = CallSiteBuilder::with_capacity(2);
        push_argument(&mut site, self.left());
        push_argument(&mut site, self.right());
        site.finish(
            Operation::BinaryOperation(binder_operator(self.kind())),
            self.flags(),
            self.context().cloned(),
        )
    }

    pub fn reduce(&self) -> Expr {
        match self.kind() {
            ExpressionType::AndAlso => self.reduce_logical(ExpressionType::IsFalse),
            ExpressionType::OrElse => self.reduce_logical(ExpressionType::IsTrue),
            _ => Expr::dynamic_call(self.reduce_dynamic(), Type::Object),
        }
    }

    /// `{ __left = left; probe(__left) ? __left : op(__left, right) }`
    ///
    /// `probe` is `IsFalse` for `&&` and `IsTrue` for `||`; `right` is only
    /// evaluated when the probe fails.
    fn reduce_logical(&self, probe: ExpressionType) -> Expr {
        trace!("lowering {:?} through {probe:?} probe", self.kind());
        let flags = self.flags() - BinderFlags::BINARY_OPERATION_LOGICAL;
        let context = self.context().cloned();

        let mut scope = TempScope::new();
        let left = scope.capture(self.left().expression(), "__left");
        let left_arg = rebind_to_temp(self.left(), left.clone());

        let test = unary_call(probe, left_arg.clone(), flags, context.clone());
        let short_circuit = convert_to(left, &Type::Object, false, flags, context.clone());
        let operator = binder_operator(self.kind());
        let full = binary_call(operator, left_arg, self.right().clone(), flags, context);

        scope.finish(Expr::conditional_typed(
            test,
            short_circuit,
            full,
            Type::Object,
        ))
    }
}

impl UnaryDynamic {
    pub fn reduce_dynamic(&self) -> DynamicCallSite {
        let mut site = CallSiteBuilder::with_capacity(1);
        push_argument(&mut site, self.operand());
        site.finish(
            Operation::UnaryOperation(binder_operator(self.kind())),
            self.flags(),
            self.context().cloned(),
        )
    }

    pub fn reduce(&self) -> Expr {
        Expr::dynamic_call(self.reduce_dynamic(), self.ty())
    }
}

// ============ Member and index access ============

impl GetMemberDynamic {
    pub fn reduce_dynamic(&self) -> DynamicCallSite {
        let mut site = CallSiteBuilder::with_capacity(1 + self.arguments().len());
        site.push(receiver_info(self.object(), false), self.object().clone());
        push_arguments(&mut site, self.arguments());
        site.finish(
            Operation::GetMember(self.name().to_owned()),
            self.flags(),
            self.context().cloned(),
        )
    }

    pub fn reduce(&self) -> Expr {
        Expr::dynamic_call(self.reduce_dynamic(), Type::Object)
    }

    /// `object.name = value` as a set-member call. Yields the value stored.
    pub fn reduce_assignment(&self, value: &Argument, flags: BinderFlags) -> Expr {
        let mut site = CallSiteBuilder::with_capacity(2 + self.arguments().len());
        site.push(receiver_info(self.object(), true), self.object().clone());
        push_arguments(&mut site, self.arguments());
        push_argument(&mut site, value);
        let site = site.finish(
            Operation::SetMember(self.name().to_owned()),
            self.flags() | flags,
            self.context().cloned(),
        );
        Expr::dynamic_call(site, Type::Object)
    }

    /// Probe whether `name` is an event on the receiver.
    pub(crate) fn reduce_is_event(&self) -> Expr {
        let mut site = CallSiteBuilder::with_capacity(1);
        site.push(receiver_info(self.object(), false), self.object().clone());
        let site = site.finish(
            Operation::IsEvent(self.name().to_owned()),
            self.flags(),
            self.context().cloned(),
        );
        Expr::dynamic_call(site, Type::Bool)
    }
}

impl GetIndexDynamic {
    pub fn reduce_dynamic(&self) -> DynamicCallSite {
        let mut site = CallSiteBuilder::with_capacity(1 + self.arguments().len());
        site.push(receiver_info(self.object(), false), self.object().clone());
        push_arguments(&mut site, self.arguments());
        site.finish(Operation::GetIndex, self.flags(), self.context().cloned())
    }

    pub fn reduce(&self) -> Expr {
        Expr::dynamic_call(self.reduce_dynamic(), Type::Object)
    }

    /// `object[arguments] = value` as a set-index call. Yields the value
    /// stored.
    pub fn reduce_assignment(&self, value: &Argument, flags: BinderFlags) -> Expr {
        let mut site = CallSiteBuilder::with_capacity(2 + self.arguments().len());
        site.push(receiver_info(self.object(), true), self.object().clone());
        push_arguments(&mut site, self.arguments());
        push_argument(&mut site, value);
        let site = site.finish(
            Operation::SetIndex,
            self.flags() | flags,
            self.context().cloned(),
        );
        Expr::dynamic_call(site, Type::Object)
    }
}

// ============ Invocation ============

impl InvokeDynamic {
    pub fn reduce_dynamic(&self) -> DynamicCallSite {
        let mut site = CallSiteBuilder::with_capacity(1 + self.arguments().len());
        let callee = self.expression();
        let flags = ArgumentFlags::infer(callee) - ArgumentFlags::CONSTANT;
        site.push(ArgumentInfo::new(flags, None), callee.clone());
        push_arguments(&mut site, self.arguments());
        site.finish(Operation::Invoke, self.flags(), self.context().cloned())
    }

    pub fn reduce(&self) -> Expr {
        Expr::dynamic_call(self.reduce_dynamic(), Type::Object)
    }
}

impl InvokeMemberDynamic {
    pub fn reduce_dynamic(&self) -> DynamicCallSite {
        let mut site = CallSiteBuilder::with_capacity(1 + self.arguments().len());
        match self.target() {
            InvokeTarget::Instance(object) => {
                site.push(receiver_info(object, false), object.clone());
            }
            InvokeTarget::Static(ty) => {
                site.push(static_type_info(), Expr::type_constant(ty.clone()));
            }
        }
        push_arguments(&mut site, self.arguments());
        site.finish(
            Operation::InvokeMember {
                name: self.name().to_owned(),
                type_arguments: self.type_arguments().to_vec(),
            },
            self.flags(),
            self.context().cloned(),
        )
    }

    pub fn reduce(&self) -> Expr {
        Expr::dynamic_call(self.reduce_dynamic(), Type::Object)
    }
}

impl InvokeConstructorDynamic {
    pub fn reduce_dynamic(&self) -> DynamicCallSite {
        let mut site = CallSiteBuilder::with_capacity(1 + self.arguments().len());
        site.push(static_type_info(), Expr::type_constant(self.ty().clone()));
        push_arguments(&mut site, self.arguments());
        site.finish(
            Operation::InvokeConstructor,
            self.flags(),
            self.context().cloned(),
        )
    }

    pub fn reduce(&self) -> Expr {
        Expr::dynamic_call(self.reduce_dynamic(), self.ty().clone())
    }
}

// ============ Conversion ============

impl ConvertDynamic {
    pub fn reduce_dynamic(&self) -> DynamicCallSite {
        let mut site = CallSiteBuilder::with_capacity(1);
        let operand = self.expression();
        let flags = ArgumentFlags::infer(operand) - ArgumentFlags::CONSTANT;
        site.push(ArgumentInfo::new(flags, None), operand.clone());
        site.finish(
            Operation::Convert(self.ty().clone()),
            self.flags(),
            self.context().cloned(),
        )
    }

    pub fn reduce(&self) -> Expr {
        Expr::dynamic_call(self.reduce_dynamic(), self.ty().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::core::Variable;
    use crate::binder::BinderOptions;
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

    #[test]
    fn primitive_nodes_do_not_reduce() {
        let c = Expr::constant(1);
        assert!(!c.can_reduce());
        assert!(c.reduce().ptr_eq(&c));
    }

    #[test]
    fn binary_reduces_to_one_call() {
        let d = var("d", Type::Object);
        let expr = factory::add(&d, Expr::constant(2), BinderOptions::new()).unwrap();
        let reduced = expr.reduce();
        let site = site_of(&reduced);
        assert_eq!(
            site.binder.operation,
            Operation::BinaryOperation(ExpressionType::Add)
        );
        assert_eq!(site.arguments.len(), 2);
        assert!(site.arguments[0].ptr_eq(&d));
        assert_eq!(
            site.binder.arguments[1].flags,
            ArgumentFlags::CONSTANT | ArgumentFlags::USE_COMPILE_TIME_TYPE
        );
        assert!(site.argument_types.is_none());
    }

    #[test]
    fn checked_binary_passes_plain_operator_with_checked_flag() {
        let d = var("d", Type::Object);
        let expr = factory::subtract_checked(&d, &d, BinderOptions::new()).unwrap();
        let reduced = expr.reduce();
        let site = site_of(&reduced);
        assert_eq!(
            site.binder.operation,
            Operation::BinaryOperation(ExpressionType::Subtract)
        );
        assert!(site.binder.flags.contains(BinderFlags::CHECKED_CONTEXT));
    }

    #[test]
    fn and_also_probes_is_false() {
        let a = var("a", Type::Object);
        let b = var("b", Type::Object);
        let expr = factory::and_also(&a, &b, BinderOptions::new()).unwrap();
        let reduced = expr.reduce();
        let ExprKind::Block { variables, body } = reduced.kind() else {
            panic!("expected block, got {reduced:?}");
        };
        assert_eq!(variables.len(), 1);
        assert_eq!(variables[0].name(), "__left");
        let ExprKind::Conditional { test, if_false, .. } = body[1].kind() else {
            panic!("expected conditional");
        };
        assert_eq!(
            site_of(test).binder.operation,
            Operation::UnaryOperation(ExpressionType::IsFalse)
        );
        let full = site_of(if_false);
        assert_eq!(
            full.binder.operation,
            Operation::BinaryOperation(ExpressionType::And)
        );
        assert!(!full.binder.flags.contains(BinderFlags::BINARY_OPERATION_LOGICAL));
        assert!(full.arguments[1].ptr_eq(&b));
    }

    #[test]
    fn get_member_never_passes_receiver_by_ref() {
        let p = var("p", Type::structure("Point"));
        let expr = factory::get_member(p, "X", BinderOptions::new()).unwrap();
        let reduced = expr.reduce();
        let site = site_of(&reduced);
        assert!(!site.is_by_ref(0));
        assert!(site.argument_types.is_none());
    }

    #[test]
    fn set_member_passes_value_typed_variable_by_ref() {
        let p = var("p", Type::structure("Point"));
        let node = GetMemberDynamic::new(p, "X", vec![], BinderOptions::new()).unwrap();
        let value = Argument::new(Expr::constant(3)).unwrap();
        let reduced = node.reduce_assignment(&value, BinderFlags::empty());
        let site = site_of(&reduced);
        assert_eq!(site.binder.operation, Operation::SetMember("X".into()));
        assert!(site.is_by_ref(0));
        assert_eq!(
            site.argument_types.as_ref().unwrap()[0],
            Type::structure("Point").by_ref()
        );
    }

    #[test]
    fn set_member_on_reference_receiver_is_by_value() {
        let obj = var("obj", Type::Object);
        let node = GetMemberDynamic::new(obj, "Count", vec![], BinderOptions::new()).unwrap();
        let value = Argument::new(Expr::constant(3)).unwrap();
        let reduced = node.reduce_assignment(&value, BinderFlags::empty());
        assert!(site_of(&reduced).argument_types.is_none());
    }

    #[test]
    fn set_index_passes_value_typed_array_element_by_ref() {
        let points = var("points", Type::array(Type::structure("Point")));
        let element = Expr::array_index(points, Expr::constant(0));
        let node = GetIndexDynamic::new(
            element,
            vec![Argument::new(Expr::constant("X")).unwrap()],
            BinderOptions::new(),
        )
        .unwrap();
        let value = Argument::new(Expr::constant(1)).unwrap();
        let get = node.reduce();
        let set = node.reduce_assignment(&value, BinderFlags::empty());
        assert!(!site_of(&get).is_by_ref(0));
        assert!(site_of(&set).is_by_ref(0));
    }

    #[test]
    fn static_invoke_passes_type_constant() {
        let expr = factory::invoke_static_member(
            Type::class("Math"),
            "Abs",
            vec![],
            [Expr::constant(-3)],
            BinderOptions::new(),
        )
        .unwrap();
        let reduced = expr.reduce();
        let site = site_of(&reduced);
        assert!(
            site.binder.arguments[0]
                .flags
                .contains(ArgumentFlags::IS_STATIC_TYPE)
        );
        assert_eq!(
            site.arguments[0].as_constant(),
            Some(&crate::ast::value::Value::Type(Type::class("Math")))
        );
    }

    #[test]
    fn convert_reduces_to_target_type() {
        let d = var("d", Type::Object);
        let expr = factory::convert(
            d,
            Type::Int,
            BinderOptions::new().with_flags(BinderFlags::CONVERT_EXPLICIT),
        )
        .unwrap();
        let reduced = expr.reduce();
        assert_eq!(reduced.ty(), Type::Int);
        assert_eq!(site_of(&reduced).binder.operation, Operation::Convert(Type::Int));
    }

    #[test]
    fn reduce_is_repeatable() {
        let d = var("d", Type::Object);
        let expr = factory::multiply_checked(&d, &d, BinderOptions::new()).unwrap();
        let first = expr.reduce();
        let second = expr.reduce();
        assert_eq!(site_of(&first).binder, site_of(&second).binder);
    }
}
