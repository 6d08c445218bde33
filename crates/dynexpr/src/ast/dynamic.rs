//! Dynamically-bound nodes
//!
//! One immutable node type per operation kind. Nodes are built through the
//! validating constructors here (the factory module wraps them), reduced by
//! the `reduce` module and rewritten through `update`, which hands back the
//! very same `Rc` when no child changed.

use std::rc::Rc;

use super::core::Expr;
use super::{ExpressionType, Type};
use crate::argument::{Argument, require_readable, require_writable};
use crate::binder::{BinderFlags, BinderOptions};
use crate::error::BuildError;
use crate::factory::{Shape, operator_info};

/// A dynamically-bound node of any kind.
#[derive(Debug, Clone)]
pub enum DynamicExpr {
    Binary(Rc<BinaryDynamic>),
    Unary(Rc<UnaryDynamic>),
    AssignBinary(Rc<AssignBinaryDynamic>),
    AssignUnary(Rc<AssignUnaryDynamic>),
    GetMember(Rc<GetMemberDynamic>),
    GetIndex(Rc<GetIndexDynamic>),
    Invoke(Rc<InvokeDynamic>),
    InvokeMember(Rc<InvokeMemberDynamic>),
    InvokeConstructor(Rc<InvokeConstructorDynamic>),
    Convert(Rc<ConvertDynamic>),
}

impl DynamicExpr {
    pub fn ty(&self) -> Type {
        match self {
            DynamicExpr::Binary(_)
            | DynamicExpr::GetMember(_)
            | DynamicExpr::GetIndex(_)
            | DynamicExpr::Invoke(_)
            | DynamicExpr::InvokeMember(_) => Type::Object,
            DynamicExpr::Unary(node) => node.ty(),
            DynamicExpr::AssignBinary(node) => node.left().ty(),
            DynamicExpr::AssignUnary(node) => node.operand().ty(),
            DynamicExpr::InvokeConstructor(node) => node.ty().clone(),
            DynamicExpr::Convert(node) => node.ty().clone(),
        }
    }

    pub fn flags(&self) -> BinderFlags {
        match self {
            DynamicExpr::Binary(node) => node.flags,
            DynamicExpr::Unary(node) => node.flags,
            DynamicExpr::AssignBinary(node) => node.flags,
            DynamicExpr::AssignUnary(node) => node.flags,
            DynamicExpr::GetMember(node) => node.flags,
            DynamicExpr::GetIndex(node) => node.flags,
            DynamicExpr::Invoke(node) => node.flags,
            DynamicExpr::InvokeMember(node) => node.flags,
            DynamicExpr::InvokeConstructor(node) => node.flags,
            DynamicExpr::Convert(node) => node.flags,
        }
    }

    /// Member and index reads are the only dynamic nodes that can be
    /// assigned to.
    pub fn is_lvalue(&self) -> bool {
        matches!(self, DynamicExpr::GetMember(_) | DynamicExpr::GetIndex(_))
    }
}

macro_rules! impl_into_expr {
    ($($node:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<Rc<$node>> for DynamicExpr {
                fn from(node: Rc<$node>) -> Self {
                    DynamicExpr::$variant(node)
                }
            }

            impl From<Rc<$node>> for Expr {
                fn from(node: Rc<$node>) -> Self {
                    Expr::extension(DynamicExpr::$variant(node))
                }
            }
        )*
    };
}

impl_into_expr! {
    BinaryDynamic => Binary,
    UnaryDynamic => Unary,
    AssignBinaryDynamic => AssignBinary,
    AssignUnaryDynamic => AssignUnary,
    GetMemberDynamic => GetMember,
    GetIndexDynamic => GetIndex,
    InvokeDynamic => Invoke,
    InvokeMemberDynamic => InvokeMember,
    InvokeConstructorDynamic => InvokeConstructor,
    ConvertDynamic => Convert,
}

fn require_first_class(ty: &Type, usage: &'static str) -> Result<(), BuildError> {
    if ty.is_first_class() {
        Ok(())
    } else {
        Err(BuildError::InvalidType {
            ty: ty.clone(),
            usage,
        })
    }
}

fn validate_options(options: &BinderOptions) -> Result<(), BuildError> {
    match &options.context {
        Some(context) => require_first_class(context, "binder context"),
        None => Ok(()),
    }
}

fn options_of(flags: BinderFlags, context: &Option<Type>) -> BinderOptions {
    BinderOptions {
        flags,
        context: context.clone(),
    }
}

fn same_arguments(current: &[Argument], new: &[Argument]) -> bool {
    current.len() == new.len() && current.iter().zip(new).all(|(a, b)| a.ptr_eq(b))
}

// ============ Operators ============

/// Dynamically-bound binary operator: `left op right`.
#[derive(Debug)]
pub struct BinaryDynamic {
    kind: ExpressionType,
    left: Argument,
    right: Argument,
    flags: BinderFlags,
    context: Option<Type>,
}

impl BinaryDynamic {
    pub fn new(
        kind: ExpressionType,
        left: Argument,
        right: Argument,
        options: BinderOptions,
    ) -> Result<Rc<Self>, BuildError> {
        let info = operator_info(kind)
            .filter(|info| info.shape == Shape::Binary)
            .ok_or(BuildError::NotSupported(kind))?;
        validate_options(&options)?;
        Ok(Self::from_parts(
            kind,
            left,
            right,
            options.flags | info.flags,
            options.context,
        ))
    }

    pub(crate) fn from_parts(
        kind: ExpressionType,
        left: Argument,
        right: Argument,
        flags: BinderFlags,
        context: Option<Type>,
    ) -> Rc<Self> {
        Rc::new(Self {
            kind,
            left,
            right,
            flags,
            context,
        })
    }

    pub fn kind(&self) -> ExpressionType {
        self.kind
    }

    pub fn left(&self) -> &Argument {
        &self.left
    }

    pub fn right(&self) -> &Argument {
        &self.right
    }

    pub fn flags(&self) -> BinderFlags {
        self.flags
    }

    pub fn context(&self) -> Option<&Type> {
        self.context.as_ref()
    }

    pub fn update(
        self: &Rc<Self>,
        left: Argument,
        right: Argument,
    ) -> Result<Rc<Self>, BuildError> {
        if left.ptr_eq(&self.left) && right.ptr_eq(&self.right) {
            return Ok(Rc::clone(self));
        }
        Self::new(self.kind, left, right, options_of(self.flags, &self.context))
    }
}

/// Dynamically-bound unary operator: `op operand`.
#[derive(Debug)]
pub struct UnaryDynamic {
    kind: ExpressionType,
    operand: Argument,
    flags: BinderFlags,
    context: Option<Type>,
}

impl UnaryDynamic {
    pub fn new(
        kind: ExpressionType,
        operand: Argument,
        options: BinderOptions,
    ) -> Result<Rc<Self>, BuildError> {
        let info = operator_info(kind)
            .filter(|info| info.shape == Shape::Unary)
            .ok_or(BuildError::NotSupported(kind))?;
        validate_options(&options)?;
        Ok(Self::from_parts(
            kind,
            operand,
            options.flags | info.flags,
            options.context,
        ))
    }

    pub(crate) fn from_parts(
        kind: ExpressionType,
        operand: Argument,
        flags: BinderFlags,
        context: Option<Type>,
    ) -> Rc<Self> {
        Rc::new(Self {
            kind,
            operand,
            flags,
            context,
        })
    }

    pub fn kind(&self) -> ExpressionType {
        self.kind
    }

    pub fn operand(&self) -> &Argument {
        &self.operand
    }

    pub fn flags(&self) -> BinderFlags {
        self.flags
    }

    pub fn context(&self) -> Option<&Type> {
        self.context.as_ref()
    }

    /// Truth probes yield `bool`; every other operator yields a dynamic value.
    pub fn ty(&self) -> Type {
        match self.kind {
            ExpressionType::IsTrue | ExpressionType::IsFalse => Type::Bool,
            _ => Type::Object,
        }
    }

    pub fn update(self: &Rc<Self>, operand: Argument) -> Result<Rc<Self>, BuildError> {
        if operand.ptr_eq(&self.operand) {
            return Ok(Rc::clone(self));
        }
        Self::new(self.kind, operand, options_of(self.flags, &self.context))
    }
}

// ============ Compound assignment ============

/// Dynamically-bound assignment with a binary operator: `left op= right`,
/// plus plain `=` and `??=`.
#[derive(Debug)]
pub struct AssignBinaryDynamic {
    kind: ExpressionType,
    left: Argument,
    right: Argument,
    flags: BinderFlags,
    context: Option<Type>,
}

impl AssignBinaryDynamic {
    pub fn new(
        kind: ExpressionType,
        left: Argument,
        right: Argument,
        options: BinderOptions,
    ) -> Result<Rc<Self>, BuildError> {
        let info = operator_info(kind)
            .filter(|info| info.shape == Shape::BinaryAssign)
            .ok_or(BuildError::NotSupported(kind))?;
        require_writable(left.expression())?;
        if kind != ExpressionType::Assign {
            require_readable(left.expression())?;
        }
        validate_options(&options)?;
        Ok(Rc::new(Self {
            kind,
            left,
            right,
            flags: options.flags | info.flags,
            context: options.context,
        }))
    }

    pub fn kind(&self) -> ExpressionType {
        self.kind
    }

    pub fn left(&self) -> &Argument {
        &self.left
    }

    pub fn right(&self) -> &Argument {
        &self.right
    }

    pub fn flags(&self) -> BinderFlags {
        self.flags
    }

    pub fn context(&self) -> Option<&Type> {
        self.context.as_ref()
    }

    /// Assignment has no type of its own.
    pub fn ty(&self) -> Type {
        self.left.ty()
    }

    pub fn update(
        self: &Rc<Self>,
        left: Argument,
        right: Argument,
    ) -> Result<Rc<Self>, BuildError> {
        if left.ptr_eq(&self.left) && right.ptr_eq(&self.right) {
            return Ok(Rc::clone(self));
        }
        Self::new(self.kind, left, right, options_of(self.flags, &self.context))
    }
}

/// Dynamically-bound increment or decrement assignment, prefix or postfix.
#[derive(Debug)]
pub struct AssignUnaryDynamic {
    kind: ExpressionType,
    operand: Argument,
    flags: BinderFlags,
    context: Option<Type>,
}

impl AssignUnaryDynamic {
    pub fn new(
        kind: ExpressionType,
        operand: Argument,
        options: BinderOptions,
    ) -> Result<Rc<Self>, BuildError> {
        let info = operator_info(kind)
            .filter(|info| info.shape == Shape::UnaryAssign)
            .ok_or(BuildError::NotSupported(kind))?;
        // Read for the fetch, written for the store.
        require_readable(operand.expression())?;
        require_writable(operand.expression())?;
        validate_options(&options)?;
        Ok(Rc::new(Self {
            kind,
            operand,
            flags: options.flags | info.flags,
            context: options.context,
        }))
    }

    pub fn kind(&self) -> ExpressionType {
        self.kind
    }

    pub fn operand(&self) -> &Argument {
        &self.operand
    }

    pub fn flags(&self) -> BinderFlags {
        self.flags
    }

    pub fn context(&self) -> Option<&Type> {
        self.context.as_ref()
    }

    pub fn ty(&self) -> Type {
        self.operand.ty()
    }

    pub fn update(self: &Rc<Self>, operand: Argument) -> Result<Rc<Self>, BuildError> {
        if operand.ptr_eq(&self.operand) {
            return Ok(Rc::clone(self));
        }
        Self::new(self.kind, operand, options_of(self.flags, &self.context))
    }
}

// ============ Member and index access ============

/// Dynamically-bound member read: `object.name`, or `object.name[arguments]`
/// for a parameterized property.
#[derive(Debug)]
pub struct GetMemberDynamic {
    object: Expr,
    name: String,
    arguments: Vec<Argument>,
    flags: BinderFlags,
    context: Option<Type>,
}

impl GetMemberDynamic {
    pub fn new(
        object: Expr,
        name: impl Into<String>,
        arguments: Vec<Argument>,
        options: BinderOptions,
    ) -> Result<Rc<Self>, BuildError> {
        let name = name.into();
        if name.is_empty() {
            return Err(BuildError::EmptyName("member name"));
        }
        require_readable(&object)?;
        validate_options(&options)?;
        Ok(Self::from_parts(
            object,
            name,
            arguments,
            options.flags,
            options.context,
        ))
    }

    pub(crate) fn from_parts(
        object: Expr,
        name: String,
        arguments: Vec<Argument>,
        flags: BinderFlags,
        context: Option<Type>,
    ) -> Rc<Self> {
        Rc::new(Self {
            object,
            name,
            arguments,
            flags,
            context,
        })
    }

    pub fn object(&self) -> &Expr {
        &self.object
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn flags(&self) -> BinderFlags {
        self.flags
    }

    pub fn context(&self) -> Option<&Type> {
        self.context.as_ref()
    }

    /// Same member over new operands, skipping validation.
    pub(crate) fn with_operands(&self, object: Expr, arguments: Vec<Argument>) -> Rc<Self> {
        Self::from_parts(
            object,
            self.name.clone(),
            arguments,
            self.flags,
            self.context.clone(),
        )
    }

    pub fn update(
        self: &Rc<Self>,
        object: Expr,
        arguments: Vec<Argument>,
    ) -> Result<Rc<Self>, BuildError> {
        if object.ptr_eq(&self.object) && same_arguments(&self.arguments, &arguments) {
            return Ok(Rc::clone(self));
        }
        Self::new(
            object,
            self.name.clone(),
            arguments,
            options_of(self.flags, &self.context),
        )
    }
}

/// Dynamically-bound indexer read: `object[arguments]`.
#[derive(Debug)]
pub struct GetIndexDynamic {
    object: Expr,
    arguments: Vec<Argument>,
    flags: BinderFlags,
    context: Option<Type>,
}

impl GetIndexDynamic {
    pub fn new(
        object: Expr,
        arguments: Vec<Argument>,
        options: BinderOptions,
    ) -> Result<Rc<Self>, BuildError> {
        if arguments.is_empty() {
            return Err(BuildError::ArgumentCount {
                node: "dynamic index",
                min: 1,
                got: 0,
            });
        }
        require_readable(&object)?;
        validate_options(&options)?;
        Ok(Self::from_parts(
            object,
            arguments,
            options.flags,
            options.context,
        ))
    }

    pub(crate) fn from_parts(
        object: Expr,
        arguments: Vec<Argument>,
        flags: BinderFlags,
        context: Option<Type>,
    ) -> Rc<Self> {
        Rc::new(Self {
            object,
            arguments,
            flags,
            context,
        })
    }

    pub fn object(&self) -> &Expr {
        &self.object
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn flags(&self) -> BinderFlags {
        self.flags
    }

    pub fn context(&self) -> Option<&Type> {
        self.context.as_ref()
    }

    pub(crate) fn with_operands(&self, object: Expr, arguments: Vec<Argument>) -> Rc<Self> {
        Self::from_parts(object, arguments, self.flags, self.context.clone())
    }

    pub fn update(
        self: &Rc<Self>,
        object: Expr,
        arguments: Vec<Argument>,
    ) -> Result<Rc<Self>, BuildError> {
        if object.ptr_eq(&self.object) && same_arguments(&self.arguments, &arguments) {
            return Ok(Rc::clone(self));
        }
        Self::new(object, arguments, options_of(self.flags, &self.context))
    }
}

// ============ Invocation ============

/// Dynamically-bound delegate invocation: `expression(arguments)`.
#[derive(Debug)]
pub struct InvokeDynamic {
    expression: Expr,
    arguments: Vec<Argument>,
    flags: BinderFlags,
    context: Option<Type>,
}

impl InvokeDynamic {
    pub fn new(
        expression: Expr,
        arguments: Vec<Argument>,
        options: BinderOptions,
    ) -> Result<Rc<Self>, BuildError> {
        require_readable(&expression)?;
        validate_options(&options)?;
        Ok(Rc::new(Self {
            expression,
            arguments,
            flags: options.flags,
            context: options.context,
        }))
    }

    pub fn expression(&self) -> &Expr {
        &self.expression
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn flags(&self) -> BinderFlags {
        self.flags
    }

    pub fn context(&self) -> Option<&Type> {
        self.context.as_ref()
    }

    pub fn update(
        self: &Rc<Self>,
        expression: Expr,
        arguments: Vec<Argument>,
    ) -> Result<Rc<Self>, BuildError> {
        if expression.ptr_eq(&self.expression) && same_arguments(&self.arguments, &arguments) {
            return Ok(Rc::clone(self));
        }
        Self::new(expression, arguments, options_of(self.flags, &self.context))
    }
}

/// Receiver of a dynamic member invocation.
#[derive(Debug, Clone)]
pub enum InvokeTarget {
    /// `object.Method(...)`
    Instance(Expr),
    /// `Type.Method(...)`
    Static(Type),
}

impl InvokeTarget {
    fn same_as(&self, other: &InvokeTarget) -> bool {
        match (self, other) {
            (InvokeTarget::Instance(a), InvokeTarget::Instance(b)) => a.ptr_eq(b),
            (InvokeTarget::Static(a), InvokeTarget::Static(b)) => a == b,
            _ => false,
        }
    }
}

/// Dynamically-bound method call: `target.name<type_arguments>(arguments)`.
#[derive(Debug)]
pub struct InvokeMemberDynamic {
    target: InvokeTarget,
    name: String,
    type_arguments: Vec<Type>,
    arguments: Vec<Argument>,
    flags: BinderFlags,
    context: Option<Type>,
}

impl InvokeMemberDynamic {
    pub fn new(
        target: InvokeTarget,
        name: impl Into<String>,
        type_arguments: Vec<Type>,
        arguments: Vec<Argument>,
        options: BinderOptions,
    ) -> Result<Rc<Self>, BuildError> {
        let name = name.into();
        if name.is_empty() {
            return Err(BuildError::EmptyName("method name"));
        }
        match &target {
            InvokeTarget::Instance(object) => require_readable(object)?,
            InvokeTarget::Static(ty) => require_first_class(ty, "static invocation target")?,
        }
        for ty in &type_arguments {
            require_first_class(ty, "type argument")?;
        }
        validate_options(&options)?;
        Ok(Self::from_parts(
            target,
            name,
            type_arguments,
            arguments,
            options.flags,
            options.context,
        ))
    }

    pub(crate) fn from_parts(
        target: InvokeTarget,
        name: String,
        type_arguments: Vec<Type>,
        arguments: Vec<Argument>,
        flags: BinderFlags,
        context: Option<Type>,
    ) -> Rc<Self> {
        Rc::new(Self {
            target,
            name,
            type_arguments,
            arguments,
            flags,
            context,
        })
    }

    pub fn target(&self) -> &InvokeTarget {
        &self.target
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_arguments(&self) -> &[Type] {
        &self.type_arguments
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn flags(&self) -> BinderFlags {
        self.flags
    }

    pub fn context(&self) -> Option<&Type> {
        self.context.as_ref()
    }

    pub fn update(
        self: &Rc<Self>,
        target: InvokeTarget,
        arguments: Vec<Argument>,
    ) -> Result<Rc<Self>, BuildError> {
        if target.same_as(&self.target) && same_arguments(&self.arguments, &arguments) {
            return Ok(Rc::clone(self));
        }
        Self::new(
            target,
            self.name.clone(),
            self.type_arguments.clone(),
            arguments,
            options_of(self.flags, &self.context),
        )
    }
}

/// Dynamically-bound constructor call: `new ty(arguments)`.
#[derive(Debug)]
pub struct InvokeConstructorDynamic {
    ty: Type,
    arguments: Vec<Argument>,
    flags: BinderFlags,
    context: Option<Type>,
}

impl InvokeConstructorDynamic {
    pub fn new(
        ty: Type,
        arguments: Vec<Argument>,
        options: BinderOptions,
    ) -> Result<Rc<Self>, BuildError> {
        require_first_class(&ty, "constructed type")?;
        validate_options(&options)?;
        Ok(Rc::new(Self {
            ty,
            arguments,
            flags: options.flags,
            context: options.context,
        }))
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn flags(&self) -> BinderFlags {
        self.flags
    }

    pub fn context(&self) -> Option<&Type> {
        self.context.as_ref()
    }

    pub fn update(self: &Rc<Self>, arguments: Vec<Argument>) -> Result<Rc<Self>, BuildError> {
        if same_arguments(&self.arguments, &arguments) {
            return Ok(Rc::clone(self));
        }
        Self::new(
            self.ty.clone(),
            arguments,
            options_of(self.flags, &self.context),
        )
    }
}

// ============ Conversion ============

/// Dynamically-bound conversion to a static type: `(ty)expression`.
/// Implicit unless built with `CONVERT_EXPLICIT`.
#[derive(Debug)]
pub struct ConvertDynamic {
    expression: Expr,
    ty: Type,
    flags: BinderFlags,
    context: Option<Type>,
}

impl ConvertDynamic {
    pub fn new(expression: Expr, ty: Type, options: BinderOptions) -> Result<Rc<Self>, BuildError> {
        require_readable(&expression)?;
        require_first_class(&ty, "conversion target")?;
        validate_options(&options)?;
        Ok(Self::from_parts(expression, ty, options.flags, options.context))
    }

    pub(crate) fn from_parts(
        expression: Expr,
        ty: Type,
        flags: BinderFlags,
        context: Option<Type>,
    ) -> Rc<Self> {
        Rc::new(Self {
            expression,
            ty,
            flags,
            context,
        })
    }

    pub fn expression(&self) -> &Expr {
        &self.expression
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn is_explicit(&self) -> bool {
        self.flags.contains(BinderFlags::CONVERT_EXPLICIT)
    }

    pub fn flags(&self) -> BinderFlags {
        self.flags
    }

    pub fn context(&self) -> Option<&Type> {
        self.context.as_ref()
    }

    pub fn update(self: &Rc<Self>, expression: Expr) -> Result<Rc<Self>, BuildError> {
        if expression.ptr_eq(&self.expression) {
            return Ok(Rc::clone(self));
        }
        Self::new(
            expression,
            self.ty.clone(),
            options_of(self.flags, &self.context),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::core::{Access, Variable};

    fn dynamic_var(name: &str) -> Expr {
        Expr::from(Variable::new(name, Type::Object))
    }

    fn arg(expr: &Expr) -> Argument {
        Argument::new(expr.clone()).unwrap()
    }

    #[test]
    fn binary_rejects_assignment_kinds() {
        let x = dynamic_var("x");
        let err = BinaryDynamic::new(
            ExpressionType::AddAssign,
            arg(&x),
            arg(&x),
            BinderOptions::new(),
        )
        .unwrap_err();
        assert_eq!(err, BuildError::NotSupported(ExpressionType::AddAssign));
    }

    #[test]
    fn checked_kind_sets_checked_flag_at_construction() {
        let x = dynamic_var("x");
        let node = BinaryDynamic::new(
            ExpressionType::MultiplyChecked,
            arg(&x),
            arg(&x),
            BinderOptions::new(),
        )
        .unwrap();
        assert!(node.flags().contains(BinderFlags::CHECKED_CONTEXT));
    }

    #[test]
    fn context_must_be_first_class() {
        let x = dynamic_var("x");
        let err = GetMemberDynamic::new(
            x,
            "Count",
            vec![],
            BinderOptions::new().with_context(Type::Void),
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::InvalidType { .. }));
    }

    #[test]
    fn assignment_requires_writable_left() {
        let err = AssignBinaryDynamic::new(
            ExpressionType::AddAssign,
            arg(&Expr::constant(1)),
            arg(&dynamic_var("y")),
            BinderOptions::new(),
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::NotWritable(_)));
    }

    #[test]
    fn only_plain_assignment_accepts_write_only_left() {
        let obj = Expr::from(Variable::new("obj", Type::class("Sink")));
        let sink = Expr::member_with_access(obj, "Value", Type::Int, Access::WriteOnly);
        let left = Argument::target(sink).unwrap();

        let node = AssignBinaryDynamic::new(
            ExpressionType::Assign,
            left.clone(),
            arg(&Expr::constant(1)),
            BinderOptions::new(),
        )
        .unwrap();
        assert_eq!(node.ty(), Type::Int);

        for kind in [ExpressionType::AddAssign, ExpressionType::NullCoalescingAssign] {
            let err = AssignBinaryDynamic::new(
                kind,
                left.clone(),
                arg(&Expr::constant(1)),
                BinderOptions::new(),
            )
            .unwrap_err();
            assert!(matches!(err, BuildError::NotReadable(_)), "{kind:?}");
        }
    }

    #[test]
    fn assignment_type_is_left_type() {
        let counter = Expr::from(Variable::new("counter", Type::Int));
        let node = AssignBinaryDynamic::new(
            ExpressionType::AddAssign,
            arg(&counter),
            arg(&dynamic_var("delta")),
            BinderOptions::new(),
        )
        .unwrap();
        assert_eq!(node.ty(), Type::Int);
    }

    #[test]
    fn index_requires_arguments() {
        let err = GetIndexDynamic::new(dynamic_var("list"), vec![], BinderOptions::new())
            .unwrap_err();
        assert!(matches!(err, BuildError::ArgumentCount { min: 1, .. }));
    }

    #[test]
    fn update_same_children_returns_same_node() {
        let obj = dynamic_var("obj");
        let index = arg(&Expr::constant(0));
        let node = GetIndexDynamic::new(obj.clone(), vec![index.clone()], BinderOptions::new())
            .unwrap();
        let same = node.update(obj, vec![index]).unwrap();
        assert!(Rc::ptr_eq(&node, &same));
    }

    #[test]
    fn update_new_child_builds_new_node() {
        let obj = dynamic_var("obj");
        let node = GetMemberDynamic::new(obj, "Count", vec![], BinderOptions::new()).unwrap();
        let other = dynamic_var("other");
        let updated = node.update(other.clone(), vec![]).unwrap();
        assert!(!Rc::ptr_eq(&node, &updated));
        assert!(updated.object().ptr_eq(&other));
        assert_eq!(updated.name(), "Count");
    }

    #[test]
    fn static_target_rejects_pointer_type() {
        let err = InvokeMemberDynamic::new(
            InvokeTarget::Static(Type::Pointer(Box::new(Type::Int))),
            "Parse",
            vec![],
            vec![],
            BinderOptions::new(),
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::InvalidType { .. }));
    }

    #[test]
    fn convert_rejects_by_ref_target() {
        let err = ConvertDynamic::new(
            dynamic_var("x"),
            Type::Int.by_ref(),
            BinderOptions::new(),
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::InvalidType { .. }));
    }
}
