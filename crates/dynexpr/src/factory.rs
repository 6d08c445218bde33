//! Validating constructors for dynamic nodes
//!
//! Every supported operator kind has one row in [`OPERATORS`]: which node
//! shape accepts it, which operator the binder receives and which binder
//! flags it implies. The generic `make_*` functions consult the table; the
//! per-operator helpers below are generated from it.

use crate::argument::{IntoArgument, into_arguments};
use crate::ast::ExpressionType;
use crate::ast::Type;
use crate::ast::core::Expr;
use crate::ast::dynamic::{
    AssignBinaryDynamic, AssignUnaryDynamic, BinaryDynamic, ConvertDynamic, GetIndexDynamic,
    GetMemberDynamic, InvokeConstructorDynamic, InvokeDynamic, InvokeMemberDynamic, InvokeTarget,
    UnaryDynamic,
};
use crate::binder::{BinderFlags, BinderOptions};
use crate::error::BuildError;

/// Node shape an operator kind belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Binary,
    Unary,
    BinaryAssign,
    UnaryAssign,
}

/// Whether a unary assignment yields the value after or before the update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fixity {
    Prefix,
    Postfix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorInfo {
    pub kind: ExpressionType,
    pub shape: Shape,
    /// Operator handed to the binder. `None` for `Assign` and
    /// `NullCoalescingAssign`, which never call an operator.
    pub operator: Option<ExpressionType>,
    /// Flags every node of this kind carries.
    pub flags: BinderFlags,
    pub fixity: Fixity,
}

const NONE: BinderFlags = BinderFlags::empty();
const CHECKED: BinderFlags = BinderFlags::CHECKED_CONTEXT;
const LOGICAL: BinderFlags = BinderFlags::BINARY_OPERATION_LOGICAL;

const fn row(
    kind: ExpressionType,
    shape: Shape,
    operator: Option<ExpressionType>,
    flags: BinderFlags,
    fixity: Fixity,
) -> OperatorInfo {
    OperatorInfo {
        kind,
        shape,
        operator,
        flags,
        fixity,
    }
}

const fn binary(
    kind: ExpressionType,
    operator: ExpressionType,
    flags: BinderFlags,
) -> OperatorInfo {
    row(kind, Shape::Binary, Some(operator), flags, Fixity::Prefix)
}

const fn unary(kind: ExpressionType, operator: ExpressionType, flags: BinderFlags) -> OperatorInfo {
    row(kind, Shape::Unary, Some(operator), flags, Fixity::Prefix)
}

const fn compound(
    kind: ExpressionType,
    operator: ExpressionType,
    flags: BinderFlags,
) -> OperatorInfo {
    row(kind, Shape::BinaryAssign, Some(operator), flags, Fixity::Prefix)
}

const fn step(
    kind: ExpressionType,
    operator: ExpressionType,
    flags: BinderFlags,
    fixity: Fixity,
) -> OperatorInfo {
    row(kind, Shape::UnaryAssign, Some(operator), flags, fixity)
}

use ExpressionType as E;
use Fixity::{Postfix, Prefix};

/// Every operator kind a dynamic node accepts. Kinds missing here
/// (`Power`, `Coalesce`, `PowerAssign`, ...) are rejected with
/// [`BuildError::NotSupported`].
pub static OPERATORS: &[OperatorInfo] = &[
    // Binary
    binary(E::Add, E::Add, NONE),
    binary(E::AddChecked, E::Add, CHECKED),
    binary(E::Subtract, E::Subtract, NONE),
    binary(E::SubtractChecked, E::Subtract, CHECKED),
    binary(E::Multiply, E::Multiply, NONE),
    binary(E::MultiplyChecked, E::Multiply, CHECKED),
    binary(E::Divide, E::Divide, NONE),
    binary(E::Modulo, E::Modulo, NONE),
    binary(E::And, E::And, NONE),
    binary(E::Or, E::Or, NONE),
    binary(E::ExclusiveOr, E::ExclusiveOr, NONE),
    binary(E::LeftShift, E::LeftShift, NONE),
    binary(E::RightShift, E::RightShift, NONE),
    binary(E::Equal, E::Equal, NONE),
    binary(E::NotEqual, E::NotEqual, NONE),
    binary(E::LessThan, E::LessThan, NONE),
    binary(E::LessThanOrEqual, E::LessThanOrEqual, NONE),
    binary(E::GreaterThan, E::GreaterThan, NONE),
    binary(E::GreaterThanOrEqual, E::GreaterThanOrEqual, NONE),
    binary(E::AndAlso, E::And, LOGICAL),
    binary(E::OrElse, E::Or, LOGICAL),
    // Unary
    unary(E::Negate, E::Negate, NONE),
    unary(E::NegateChecked, E::Negate, CHECKED),
    unary(E::UnaryPlus, E::UnaryPlus, NONE),
    unary(E::Not, E::Not, NONE),
    unary(E::OnesComplement, E::OnesComplement, NONE),
    unary(E::IsTrue, E::IsTrue, NONE),
    unary(E::IsFalse, E::IsFalse, NONE),
    unary(E::Increment, E::Increment, NONE),
    unary(E::Decrement, E::Decrement, NONE),
    // Compound assignment
    row(E::Assign, Shape::BinaryAssign, None, NONE, Prefix),
    row(E::NullCoalescingAssign, Shape::BinaryAssign, None, NONE, Prefix),
    compound(E::AddAssign, E::Add, NONE),
    compound(E::AddAssignChecked, E::Add, CHECKED),
    compound(E::SubtractAssign, E::Subtract, NONE),
    compound(E::SubtractAssignChecked, E::Subtract, CHECKED),
    compound(E::MultiplyAssign, E::Multiply, NONE),
    compound(E::MultiplyAssignChecked, E::Multiply, CHECKED),
    compound(E::DivideAssign, E::Divide, NONE),
    compound(E::ModuloAssign, E::Modulo, NONE),
    compound(E::AndAssign, E::And, NONE),
    compound(E::OrAssign, E::Or, NONE),
    compound(E::ExclusiveOrAssign, E::ExclusiveOr, NONE),
    compound(E::LeftShiftAssign, E::LeftShift, NONE),
    compound(E::RightShiftAssign, E::RightShift, NONE),
    // Increment / decrement assignment
    step(E::PreIncrementAssign, E::Increment, NONE, Prefix),
    step(E::PreIncrementCheckedAssign, E::Increment, CHECKED, Prefix),
    step(E::PreDecrementAssign, E::Decrement, NONE, Prefix),
    step(E::PreDecrementCheckedAssign, E::Decrement, CHECKED, Prefix),
    step(E::PostIncrementAssign, E::Increment, NONE, Postfix),
    step(E::PostIncrementCheckedAssign, E::Increment, CHECKED, Postfix),
    step(E::PostDecrementAssign, E::Decrement, NONE, Postfix),
    step(E::PostDecrementCheckedAssign, E::Decrement, CHECKED, Postfix),
];

/// Table row for `kind`, if any node shape accepts it.
pub fn operator_info(kind: ExpressionType) -> Option<&'static OperatorInfo> {
    OPERATORS.iter().find(|info| info.kind == kind)
}

/// Operator the binder receives for a kind that already passed
/// construction. A miss is a bug in this crate.
pub(crate) fn binder_operator(kind: ExpressionType) -> ExpressionType {
    match operator_info(kind).and_then(|info| info.operator) {
        Some(operator) => operator,
        None => unreachable!("operator kind {kind:?} has no binder operator"),
    }
}

pub(crate) fn fixity(kind: ExpressionType) -> Fixity {
    match operator_info(kind) {
        Some(info) => info.fixity,
        None => unreachable!("operator kind {kind:?} has no table row"),
    }
}

// ============ Generic constructors ============

pub fn make_binary(
    kind: ExpressionType,
    left: impl IntoArgument,
    right: impl IntoArgument,
    options: BinderOptions,
) -> Result<Expr, BuildError> {
    let node = BinaryDynamic::new(kind, left.into_argument()?, right.into_argument()?, options)?;
    Ok(node.into())
}

pub fn make_unary(
    kind: ExpressionType,
    operand: impl IntoArgument,
    options: BinderOptions,
) -> Result<Expr, BuildError> {
    let node = UnaryDynamic::new(kind, operand.into_argument()?, options)?;
    Ok(node.into())
}

pub fn make_binary_assign(
    kind: ExpressionType,
    left: impl IntoArgument,
    right: impl IntoArgument,
    options: BinderOptions,
) -> Result<Expr, BuildError> {
    let node =
        AssignBinaryDynamic::new(kind, left.into_target()?, right.into_argument()?, options)?;
    Ok(node.into())
}

pub fn make_unary_assign(
    kind: ExpressionType,
    operand: impl IntoArgument,
    options: BinderOptions,
) -> Result<Expr, BuildError> {
    let node = AssignUnaryDynamic::new(kind, operand.into_argument()?, options)?;
    Ok(node.into())
}

// ============ Member access and invocation ============

/// `object.name`
pub fn get_member(
    object: Expr,
    name: impl Into<String>,
    options: BinderOptions,
) -> Result<Expr, BuildError> {
    let node = GetMemberDynamic::new(object, name, Vec::new(), options)?;
    Ok(node.into())
}

/// `object.name[arguments]`, a parameterized member.
pub fn get_member_with<I>(
    object: Expr,
    name: impl Into<String>,
    arguments: I,
    options: BinderOptions,
) -> Result<Expr, BuildError>
where
    I: IntoIterator,
    I::Item: IntoArgument,
{
    let node = GetMemberDynamic::new(object, name, into_arguments(arguments)?, options)?;
    Ok(node.into())
}

/// `object[arguments]`
pub fn get_index<I>(object: Expr, arguments: I, options: BinderOptions) -> Result<Expr, BuildError>
where
    I: IntoIterator,
    I::Item: IntoArgument,
{
    let node = GetIndexDynamic::new(object, into_arguments(arguments)?, options)?;
    Ok(node.into())
}

/// `expression(arguments)`
pub fn invoke<I>(expression: Expr, arguments: I, options: BinderOptions) -> Result<Expr, BuildError>
where
    I: IntoIterator,
    I::Item: IntoArgument,
{
    let node = InvokeDynamic::new(expression, into_arguments(arguments)?, options)?;
    Ok(node.into())
}

/// `object.name<type_arguments>(arguments)`
pub fn invoke_member<I>(
    object: Expr,
    name: impl Into<String>,
    type_arguments: Vec<Type>,
    arguments: I,
    options: BinderOptions,
) -> Result<Expr, BuildError>
where
    I: IntoIterator,
    I::Item: IntoArgument,
{
    let node = InvokeMemberDynamic::new(
        InvokeTarget::Instance(object),
        name,
        type_arguments,
        into_arguments(arguments)?,
        options,
    )?;
    Ok(node.into())
}

/// `ty.name<type_arguments>(arguments)`
pub fn invoke_static_member<I>(
    ty: Type,
    name: impl Into<String>,
    type_arguments: Vec<Type>,
    arguments: I,
    options: BinderOptions,
) -> Result<Expr, BuildError>
where
    I: IntoIterator,
    I::Item: IntoArgument,
{
    let node = InvokeMemberDynamic::new(
        InvokeTarget::Static(ty),
        name,
        type_arguments,
        into_arguments(arguments)?,
        options,
    )?;
    Ok(node.into())
}

/// `new ty(arguments)`
pub fn invoke_constructor<I>(
    ty: Type,
    arguments: I,
    options: BinderOptions,
) -> Result<Expr, BuildError>
where
    I: IntoIterator,
    I::Item: IntoArgument,
{
    let node = InvokeConstructorDynamic::new(ty, into_arguments(arguments)?, options)?;
    Ok(node.into())
}

/// `(ty)expression`, implicit unless `options` carries `CONVERT_EXPLICIT`.
pub fn convert(expression: Expr, ty: Type, options: BinderOptions) -> Result<Expr, BuildError> {
    let node = ConvertDynamic::new(expression, ty, options)?;
    Ok(node.into())
}

// ============ Per-operator helpers ============

macro_rules! binary_helpers {
    ($($name:ident => $kind:ident),* $(,)?) => {
        $(
            #[doc = concat!("Dynamically-bound `", stringify!($kind), "`.")]
            pub fn $name(
                left: impl IntoArgument,
                right: impl IntoArgument,
                options: BinderOptions,
            ) -> Result<Expr, BuildError> {
                make_binary(ExpressionType::$kind, left, right, options)
            }
        )*
    };
}

macro_rules! unary_helpers {
    ($($name:ident => $kind:ident),* $(,)?) => {
        $(
            #[doc = concat!("Dynamically-bound `", stringify!($kind), "`.")]
            pub fn $name(
                operand: impl IntoArgument,
                options: BinderOptions,
            ) -> Result<Expr, BuildError> {
                make_unary(ExpressionType::$kind, operand, options)
            }
        )*
    };
}

macro_rules! binary_assign_helpers {
    ($($name:ident => $kind:ident),* $(,)?) => {
        $(
            #[doc = concat!("Dynamically-bound `", stringify!($kind), "` over a writable target.")]
            pub fn $name(
                left: impl IntoArgument,
                right: impl IntoArgument,
                options: BinderOptions,
            ) -> Result<Expr, BuildError> {
                make_binary_assign(ExpressionType::$kind, left, right, options)
            }
        )*
    };
}

macro_rules! unary_assign_helpers {
    ($($name:ident => $kind:ident),* $(,)?) => {
        $(
            #[doc = concat!(
                "Dynamically-bound `",
                stringify!($kind),
                "` over a readable, writable target."
            )]
            pub fn $name(
                operand: impl IntoArgument,
                options: BinderOptions,
            ) -> Result<Expr, BuildError> {
                make_unary_assign(ExpressionType::$kind, operand, options)
            }
        )*
    };
}

binary_helpers! {
    add => Add,
    add_checked => AddChecked,
    subtract => Subtract,
    subtract_checked => SubtractChecked,
    multiply => Multiply,
    multiply_checked => MultiplyChecked,
    divide => Divide,
    modulo => Modulo,
    and => And,
    or => Or,
    exclusive_or => ExclusiveOr,
    left_shift => LeftShift,
    right_shift => RightShift,
    equal => Equal,
    not_equal => NotEqual,
    less_than => LessThan,
    less_than_or_equal => LessThanOrEqual,
    greater_than => GreaterThan,
    greater_than_or_equal => GreaterThanOrEqual,
    and_also => AndAlso,
    or_else => OrElse,
}

unary_helpers! {
    negate => Negate,
    negate_checked => NegateChecked,
    unary_plus => UnaryPlus,
    not => Not,
    ones_complement => OnesComplement,
    is_true => IsTrue,
    is_false => IsFalse,
    increment => Increment,
    decrement => Decrement,
}

binary_assign_helpers! {
    assign => Assign,
    null_coalescing_assign => NullCoalescingAssign,
    add_assign => AddAssign,
    add_assign_checked => AddAssignChecked,
    subtract_assign => SubtractAssign,
    subtract_assign_checked => SubtractAssignChecked,
    multiply_assign => MultiplyAssign,
    multiply_assign_checked => MultiplyAssignChecked,
    divide_assign => DivideAssign,
    modulo_assign => ModuloAssign,
    and_assign => AndAssign,
    or_assign => OrAssign,
    exclusive_or_assign => ExclusiveOrAssign,
    left_shift_assign => LeftShiftAssign,
    right_shift_assign => RightShiftAssign,
}

unary_assign_helpers! {
    pre_increment_assign => PreIncrementAssign,
    pre_increment_checked_assign => PreIncrementCheckedAssign,
    pre_decrement_assign => PreDecrementAssign,
    pre_decrement_checked_assign => PreDecrementCheckedAssign,
    post_increment_assign => PostIncrementAssign,
    post_increment_checked_assign => PostIncrementCheckedAssign,
    post_decrement_assign => PostDecrementAssign,
    post_decrement_checked_assign => PostDecrementCheckedAssign,
}
