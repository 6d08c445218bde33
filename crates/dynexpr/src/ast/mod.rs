//! Expression tree types
//!
//! Split into:
//! - `core`: the primitive vocabulary the interpreter executes
//! - `dynamic`: dynamically-bound nodes that reduce into `core` nodes
//! - `value`: runtime values carried by constants and produced by eval

pub mod core;
pub mod dynamic;
pub mod value;

use std::fmt;
use std::rc::Rc;

// Shared types used by both the primitive and the dynamic nodes

/// Static type of an expression.
///
/// `Object` doubles as the dynamic type: a value typed `Object` is bound at
/// run time by the call-site binder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Object,
    Bool,
    Int,
    Double,
    String,
    /// Reference type declared by the host program
    Class(Rc<str>),
    /// Value type declared by the host program
    Struct(Rc<str>),
    Array(Box<Type>),
    Nullable(Box<Type>),
    Function,
    /// Type of a type constant (`typeof(T)`)
    Meta,
    ByRef(Box<Type>),
    Pointer(Box<Type>),
}

impl Type {
    pub fn class(name: impl Into<Rc<str>>) -> Self {
        Type::Class(name.into())
    }

    pub fn structure(name: impl Into<Rc<str>>) -> Self {
        Type::Struct(name.into())
    }

    pub fn array(element: Type) -> Self {
        Type::Array(Box::new(element))
    }

    pub fn nullable(inner: Type) -> Self {
        Type::Nullable(Box::new(inner))
    }

    pub fn by_ref(self) -> Self {
        Type::ByRef(Box::new(self))
    }

    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            Type::Bool | Type::Int | Type::Double | Type::Struct(_) | Type::Nullable(_)
        )
    }

    /// Whether a value of this type can be stored, passed and returned.
    /// `Void`, by-ref and pointer types cannot.
    pub fn is_first_class(&self) -> bool {
        !matches!(self, Type::Void | Type::ByRef(_) | Type::Pointer(_))
    }

    /// Whether a `source` value can be stored in a `self` location without
    /// any representation change.
    pub fn is_reference_assignable_from(&self, source: &Type) -> bool {
        if self == source {
            return true;
        }
        !self.is_value_type() && !source.is_value_type() && *self == Type::Object
    }

    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::Array(element) => Some(element),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Object => write!(f, "object"),
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Double => write!(f, "double"),
            Type::String => write!(f, "string"),
            Type::Class(name) | Type::Struct(name) => write!(f, "{name}"),
            Type::Array(element) => write!(f, "{element}[]"),
            Type::Nullable(inner) => write!(f, "{inner}?"),
            Type::Function => write!(f, "Delegate"),
            Type::Meta => write!(f, "Type"),
            Type::ByRef(inner) => write!(f, "{inner}&"),
            Type::Pointer(inner) => write!(f, "{inner}*"),
        }
    }
}

/// Operator kinds of the tree.
///
/// Binary and unary kinds are what the binder understands; the `*Assign`
/// kinds only exist on compound-assignment nodes and are lowered to their
/// functional operator during reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionType {
    // Arithmetic
    Add,
    AddChecked,
    Subtract,
    SubtractChecked,
    Multiply,
    MultiplyChecked,
    Divide,
    Modulo,
    Power,

    // Bitwise / shift
    And,
    Or,
    ExclusiveOr,
    LeftShift,
    RightShift,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,

    // Short-circuiting
    AndAlso,
    OrElse,
    Coalesce,

    // Unary
    Negate,
    NegateChecked,
    UnaryPlus,
    Not,
    OnesComplement,
    IsTrue,
    IsFalse,
    Increment,
    Decrement,
    Convert,

    // Compound assignment
    Assign,
    NullCoalescingAssign,
    AddAssign,
    AddAssignChecked,
    SubtractAssign,
    SubtractAssignChecked,
    MultiplyAssign,
    MultiplyAssignChecked,
    DivideAssign,
    ModuloAssign,
    PowerAssign,
    AndAssign,
    OrAssign,
    ExclusiveOrAssign,
    LeftShiftAssign,
    RightShiftAssign,

    // Increment / decrement assignment
    PreIncrementAssign,
    PreIncrementCheckedAssign,
    PreDecrementAssign,
    PreDecrementCheckedAssign,
    PostIncrementAssign,
    PostIncrementCheckedAssign,
    PostDecrementAssign,
    PostDecrementCheckedAssign,
}

impl ExpressionType {
    /// Every operator kind, in declaration order.
    pub const ALL: &'static [ExpressionType] = &[
        ExpressionType::Add,
        ExpressionType::AddChecked,
        ExpressionType::Subtract,
        ExpressionType::SubtractChecked,
        ExpressionType::Multiply,
        ExpressionType::MultiplyChecked,
        ExpressionType::Divide,
        ExpressionType::Modulo,
        ExpressionType::Power,
        ExpressionType::And,
        ExpressionType::Or,
        ExpressionType::ExclusiveOr,
        ExpressionType::LeftShift,
        ExpressionType::RightShift,
        ExpressionType::Equal,
        ExpressionType::NotEqual,
        ExpressionType::LessThan,
        ExpressionType::LessThanOrEqual,
        ExpressionType::GreaterThan,
        ExpressionType::GreaterThanOrEqual,
        ExpressionType::AndAlso,
        ExpressionType::OrElse,
        ExpressionType::Coalesce,
        ExpressionType::Negate,
        ExpressionType::NegateChecked,
        ExpressionType::UnaryPlus,
        ExpressionType::Not,
        ExpressionType::OnesComplement,
        ExpressionType::IsTrue,
        ExpressionType::IsFalse,
        ExpressionType::Increment,
        ExpressionType::Decrement,
        ExpressionType::Convert,
        ExpressionType::Assign,
        ExpressionType::NullCoalescingAssign,
        ExpressionType::AddAssign,
        ExpressionType::AddAssignChecked,
        ExpressionType::SubtractAssign,
        ExpressionType::SubtractAssignChecked,
        ExpressionType::MultiplyAssign,
        ExpressionType::MultiplyAssignChecked,
        ExpressionType::DivideAssign,
        ExpressionType::ModuloAssign,
        ExpressionType::PowerAssign,
        ExpressionType::AndAssign,
        ExpressionType::OrAssign,
        ExpressionType::ExclusiveOrAssign,
        ExpressionType::LeftShiftAssign,
        ExpressionType::RightShiftAssign,
        ExpressionType::PreIncrementAssign,
        ExpressionType::PreIncrementCheckedAssign,
        ExpressionType::PreDecrementAssign,
        ExpressionType::PreDecrementCheckedAssign,
        ExpressionType::PostIncrementAssign,
        ExpressionType::PostIncrementCheckedAssign,
        ExpressionType::PostDecrementAssign,
        ExpressionType::PostDecrementCheckedAssign,
    ];
}
