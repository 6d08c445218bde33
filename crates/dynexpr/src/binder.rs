//! Call-site binder descriptions
//!
//! Reduction never binds anything itself. It describes the operation for
//! the runtime binder: which operation, in which context, with which
//! per-argument binding information. The `DynamicCall` primitive carries
//! that description together with the argument expressions.

use std::fmt;

use bitflags::bitflags;

use crate::ast::ExpressionType;
use crate::ast::Type;
use crate::ast::core::Expr;

bitflags! {
    /// How the binder should treat the operation as a whole.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BinderFlags: u32 {
        /// Arithmetic overflow raises instead of wrapping.
        const CHECKED_CONTEXT = 1;
        /// Member was named without a receiver (`M()` rather than `this.M()`).
        const INVOKE_SIMPLE_NAME = 1 << 1;
        /// Member is a compiler-reserved accessor such as `add_Changed`.
        const INVOKE_SPECIAL_NAME = 1 << 2;
        /// Operator came from `&&` / `||`.
        const BINARY_OPERATION_LOGICAL = 1 << 3;
        const CONVERT_EXPLICIT = 1 << 4;
        const CONVERT_ARRAY_INDEX = 1 << 5;
        const RESULT_INDEXED = 1 << 6;
        /// Operation is the read-modify part of a compound assignment.
        const VALUE_FROM_COMPOUND_ASSIGNMENT = 1 << 7;
        /// Caller ignores the result.
        const RESULT_DISCARDED = 1 << 8;
    }
}

bitflags! {
    /// How the binder should treat one argument.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ArgumentFlags: u32 {
        /// Bind against the static type rather than the runtime type.
        const USE_COMPILE_TIME_TYPE = 1;
        /// Argument is a literal.
        const CONSTANT = 1 << 1;
        const NAMED_ARGUMENT = 1 << 2;
        const IS_REF = 1 << 3;
        const IS_OUT = 1 << 4;
        /// Argument is a type reference (static member access).
        const IS_STATIC_TYPE = 1 << 5;
    }
}

impl ArgumentFlags {
    /// Whether the argument travels as a reference to its storage location.
    pub fn is_by_ref(self) -> bool {
        self.intersects(ArgumentFlags::IS_REF | ArgumentFlags::IS_OUT)
    }
}

/// Per-argument binding information, position-for-position with the
/// argument expressions of a call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentInfo {
    pub flags: ArgumentFlags,
    pub name: Option<String>,
}

impl ArgumentInfo {
    pub fn new(flags: ArgumentFlags, name: Option<String>) -> Self {
        Self { flags, name }
    }
}

/// The operation a call site asks the binder to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    BinaryOperation(ExpressionType),
    UnaryOperation(ExpressionType),
    GetMember(String),
    SetMember(String),
    GetIndex,
    SetIndex,
    InvokeMember {
        name: String,
        type_arguments: Vec<Type>,
    },
    Invoke,
    InvokeConstructor,
    Convert(Type),
    /// Probe whether the named member is an event on the receiver.
    IsEvent(String),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::BinaryOperation(op) => write!(f, "BinaryOperation {op:?}"),
            Operation::UnaryOperation(op) => write!(f, "UnaryOperation {op:?}"),
            Operation::GetMember(name) => write!(f, "GetMember {name}"),
            Operation::SetMember(name) => write!(f, "SetMember {name}"),
            Operation::GetIndex => write!(f, "GetIndex"),
            Operation::SetIndex => write!(f, "SetIndex"),
            Operation::InvokeMember { name, .. } => write!(f, "InvokeMember {name}"),
            Operation::Invoke => write!(f, "Invoke"),
            Operation::InvokeConstructor => write!(f, "InvokeConstructor"),
            Operation::Convert(ty) => write!(f, "Convert {ty}"),
            Operation::IsEvent(name) => write!(f, "IsEvent {name}"),
        }
    }
}

/// Description of one binder: what to do, in which accessibility context,
/// and how to treat each argument.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSiteBinder {
    pub operation: Operation,
    pub flags: BinderFlags,
    pub context: Option<Type>,
    pub arguments: Vec<ArgumentInfo>,
}

/// Binder plus the argument expressions to pass it.
///
/// `argument_types` is only present when some argument is passed by-ref;
/// otherwise types are taken from the runtime values.
#[derive(Debug, Clone)]
pub struct DynamicCallSite {
    pub binder: CallSiteBinder,
    pub arguments: Vec<Expr>,
    pub argument_types: Option<Vec<Type>>,
}

impl DynamicCallSite {
    /// Whether argument `index` is passed by reference.
    pub fn is_by_ref(&self, index: usize) -> bool {
        self.binder
            .arguments
            .get(index)
            .is_some_and(|info| info.flags.is_by_ref())
    }
}

/// Flags and context a dynamic node is built with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BinderOptions {
    pub flags: BinderFlags,
    pub context: Option<Type>,
}

impl BinderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flags(mut self, flags: BinderFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Type whose accessibility the binder resolves members from.
    pub fn with_context(mut self, context: Type) -> Self {
        self.context = Some(context);
        self
    }
}

/// Accumulates the parallel argument lists of a call site.
#[derive(Debug, Default)]
pub(crate) struct CallSiteBuilder {
    infos: Vec<ArgumentInfo>,
    expressions: Vec<Expr>,
    types: Vec<Type>,
    any_by_ref: bool,
}

impl CallSiteBuilder {
    pub(crate) fn with_capacity(n: usize) -> Self {
        Self {
            infos: Vec::with_capacity(n),
            expressions: Vec::with_capacity(n),
            types: Vec::with_capacity(n),
            any_by_ref: false,
        }
    }

    pub(crate) fn push(&mut self, info: ArgumentInfo, expression: Expr) {
        let ty = expression.ty();
        if info.flags.is_by_ref() {
            self.any_by_ref = true;
            self.types.push(ty.by_ref());
        } else {
            self.types.push(ty);
        }
        self.infos.push(info);
        self.expressions.push(expression);
    }

    pub(crate) fn finish(
        self,
        operation: Operation,
        flags: BinderFlags,
        context: Option<Type>,
    ) -> DynamicCallSite {
        DynamicCallSite {
            binder: CallSiteBinder {
                operation,
                flags,
                context,
                arguments: self.infos,
            },
            arguments: self.expressions,
            argument_types: self.any_by_ref.then_some(self.types),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::core::Variable;

    #[test]
    fn argument_types_only_when_by_ref() {
        let x = Expr::from(Variable::new("x", Type::Int));

        let mut plain = CallSiteBuilder::with_capacity(1);
        plain.push(ArgumentInfo::new(ArgumentFlags::empty(), None), x.clone());
        let site = plain.finish(Operation::GetIndex, BinderFlags::empty(), None);
        assert!(site.argument_types.is_none());

        let mut by_ref = CallSiteBuilder::with_capacity(2);
        by_ref.push(ArgumentInfo::new(ArgumentFlags::IS_REF, None), x.clone());
        by_ref.push(ArgumentInfo::new(ArgumentFlags::CONSTANT, None), Expr::constant(1));
        let site = by_ref.finish(Operation::SetIndex, BinderFlags::empty(), None);
        assert_eq!(
            site.argument_types,
            Some(vec![Type::Int.by_ref(), Type::Int])
        );
        assert!(site.is_by_ref(0));
        assert!(!site.is_by_ref(1));
    }

    #[test]
    fn options_accumulate_flags() {
        let options = BinderOptions::new()
            .with_flags(BinderFlags::CHECKED_CONTEXT)
            .with_flags(BinderFlags::RESULT_DISCARDED)
            .with_context(Type::class("Program"));
        assert!(options.flags.contains(BinderFlags::CHECKED_CONTEXT));
        assert!(options.flags.contains(BinderFlags::RESULT_DISCARDED));
        assert_eq!(options.context, Some(Type::class("Program")));
    }
}
