//! Core tree - what eval consumes
//!
//! The primitive node vocabulary. Dynamic nodes live in `Extension` until
//! they are reduced into these kinds.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::Type;
use super::dynamic::DynamicExpr;
use super::value::{NativeFunction, Value};
use crate::binder::DynamicCallSite;

/// Handle to an immutable tree node.
///
/// Cloning is cheap and keeps identity: two handles are the same node iff
/// [`Expr::ptr_eq`] holds.
#[derive(Clone)]
pub struct Expr(Rc<ExprKind>);

#[derive(Debug)]
pub enum ExprKind {
    /// Literal value
    Constant { value: Value, ty: Type },

    /// Default value of a type: `default(T)`
    Default(Type),

    /// Local variable or parameter
    Variable(Variable),

    /// `target = value`; target is a variable, member or index
    Assign { target: Expr, value: Expr },

    /// Scoped sequence; yields the last expression's value
    Block {
        variables: Vec<Variable>,
        body: Vec<Expr>,
    },

    /// `test ? if_true : if_false`
    Conditional {
        test: Expr,
        if_true: Expr,
        if_false: Expr,
        ty: Type,
    },

    /// `left ?? right`
    Coalesce { left: Expr, right: Expr },

    /// Statically bound conversion: `(T)operand`
    Convert { operand: Expr, ty: Type },

    /// Statically bound property or field: `object.name`
    Member {
        object: Expr,
        name: String,
        ty: Type,
        access: Access,
    },

    /// Statically bound indexer or array element: `object[arguments]`
    Index {
        object: Expr,
        arguments: Vec<Expr>,
        ty: Type,
    },

    /// Host function call
    Call {
        function: NativeFunction,
        arguments: Vec<Expr>,
        ty: Type,
    },

    /// Dynamic call site: the binder decides what happens at run time
    DynamicCall { site: DynamicCallSite, ty: Type },

    /// Dynamically-bound node awaiting reduction
    Extension(DynamicExpr),
}

/// Read/write capability of a statically bound member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    ReadOnly,
    WriteOnly,
}

impl Expr {
    fn new(kind: ExprKind) -> Self {
        Expr(Rc::new(kind))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0
    }

    /// Node identity, not structural equality.
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // ============ Constructors ============

    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        let ty = value.static_type();
        Self::new(ExprKind::Constant { value, ty })
    }

    pub fn constant_typed(value: impl Into<Value>, ty: Type) -> Self {
        Self::new(ExprKind::Constant {
            value: value.into(),
            ty,
        })
    }

    /// `null` typed as `ty`.
    pub fn null(ty: Type) -> Self {
        Self::constant_typed(Value::Null, ty)
    }

    /// `typeof(ty)` as a constant.
    pub fn type_constant(ty: Type) -> Self {
        Self::constant_typed(Value::Type(ty), Type::Meta)
    }

    pub fn default_value(ty: Type) -> Self {
        Self::new(ExprKind::Default(ty))
    }

    pub fn variable(variable: Variable) -> Self {
        Self::new(ExprKind::Variable(variable))
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        debug_assert!(target.can_write(), "assignment target must be writable");
        Self::new(ExprKind::Assign { target, value })
    }

    pub fn block(variables: Vec<Variable>, body: Vec<Expr>) -> Self {
        Self::new(ExprKind::Block { variables, body })
    }

    /// Conditional typed after its `if_true` branch.
    pub fn conditional(test: Expr, if_true: Expr, if_false: Expr) -> Self {
        let ty = if_true.ty();
        Self::conditional_typed(test, if_true, if_false, ty)
    }

    pub fn conditional_typed(test: Expr, if_true: Expr, if_false: Expr, ty: Type) -> Self {
        Self::new(ExprKind::Conditional {
            test,
            if_true,
            if_false,
            ty,
        })
    }

    pub fn coalesce(left: Expr, right: Expr) -> Self {
        Self::new(ExprKind::Coalesce { left, right })
    }

    pub fn convert(operand: Expr, ty: Type) -> Self {
        Self::new(ExprKind::Convert { operand, ty })
    }

    pub fn member(object: Expr, name: impl Into<String>, ty: Type) -> Self {
        Self::member_with_access(object, name, ty, Access::ReadWrite)
    }

    pub fn member_with_access(
        object: Expr,
        name: impl Into<String>,
        ty: Type,
        access: Access,
    ) -> Self {
        Self::new(ExprKind::Member {
            object,
            name: name.into(),
            ty,
            access,
        })
    }

    pub fn index(object: Expr, arguments: Vec<Expr>, ty: Type) -> Self {
        Self::new(ExprKind::Index {
            object,
            arguments,
            ty,
        })
    }

    /// Element access on an array-typed expression.
    pub fn array_index(array: Expr, index: Expr) -> Self {
        let ty = array.ty().element_type().cloned().unwrap_or(Type::Object);
        Self::index(array, vec![index], ty)
    }

    pub fn call(function: NativeFunction, arguments: Vec<Expr>, ty: Type) -> Self {
        Self::new(ExprKind::Call {
            function,
            arguments,
            ty,
        })
    }

    pub fn dynamic_call(site: DynamicCallSite, ty: Type) -> Self {
        Self::new(ExprKind::DynamicCall { site, ty })
    }

    pub fn extension(node: DynamicExpr) -> Self {
        Self::new(ExprKind::Extension(node))
    }

    // ============ Queries ============

    /// Static type of the node.
    pub fn ty(&self) -> Type {
        match self.kind() {
            ExprKind::Constant { ty, .. }
            | ExprKind::Default(ty)
            | ExprKind::Conditional { ty, .. }
            | ExprKind::Convert { ty, .. }
            | ExprKind::Member { ty, .. }
            | ExprKind::Index { ty, .. }
            | ExprKind::Call { ty, .. }
            | ExprKind::DynamicCall { ty, .. } => ty.clone(),
            ExprKind::Variable(variable) => variable.ty().clone(),
            ExprKind::Assign { target, .. } => target.ty(),
            ExprKind::Block { body, .. } => body.last().map_or(Type::Void, Expr::ty),
            ExprKind::Coalesce { left, right } => match left.ty() {
                Type::Nullable(inner) if *inner == right.ty() => *inner,
                ty => ty,
            },
            ExprKind::Extension(node) => node.ty(),
        }
    }

    /// Whether the node yields a value. Only write-only members don't.
    pub fn can_read(&self) -> bool {
        match self.kind() {
            ExprKind::Member { access, .. } => *access != Access::WriteOnly,
            _ => true,
        }
    }

    /// Whether the node denotes a storage location.
    pub fn can_write(&self) -> bool {
        match self.kind() {
            ExprKind::Variable(_) | ExprKind::Index { .. } => true,
            ExprKind::Member { access, .. } => *access != Access::ReadOnly,
            ExprKind::Extension(node) => node.is_lvalue(),
            _ => false,
        }
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self.kind() {
            ExprKind::Variable(variable) => Some(variable),
            _ => None,
        }
    }

    pub fn as_dynamic(&self) -> Option<&DynamicExpr> {
        match self.kind() {
            ExprKind::Extension(node) => Some(node),
            _ => None,
        }
    }

    /// The literal value, if this is a constant.
    pub fn as_constant(&self) -> Option<&Value> {
        match self.kind() {
            ExprKind::Constant { value, .. } => Some(value),
            _ => None,
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.kind(), f)
    }
}

impl From<Variable> for Expr {
    fn from(variable: Variable) -> Self {
        Expr::variable(variable)
    }
}

impl From<&Variable> for Expr {
    fn from(variable: &Variable) -> Self {
        Expr::variable(variable.clone())
    }
}

static NEXT_VARIABLE_ID: AtomicU64 = AtomicU64::new(1);

/// A named, typed local. Identity is the id handed out at creation, so two
/// variables with the same name are still distinct.
#[derive(Clone)]
pub struct Variable(Rc<VariableData>);

#[derive(Debug)]
struct VariableData {
    id: u64,
    name: String,
    ty: Type,
    synthesized: bool,
}

impl Variable {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self::create(name.into(), ty, false)
    }

    /// A temp introduced by lowering. Assigned exactly once, so lowering
    /// never needs to capture it again.
    pub(crate) fn synthesized(name: impl Into<String>, ty: Type) -> Self {
        Self::create(name.into(), ty, true)
    }

    fn create(name: String, ty: Type, synthesized: bool) -> Self {
        let id = NEXT_VARIABLE_ID.fetch_add(1, Ordering::Relaxed);
        Variable(Rc::new(VariableData {
            id,
            name,
            ty,
            synthesized,
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn ty(&self) -> &Type {
        &self.0.ty
    }

    pub fn is_synthesized(&self) -> bool {
        self.0.synthesized
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Variable {}

impl std::hash::Hash for Variable {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}: {}", self.0.name, self.0.id, self.0.ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_type_follows_value() {
        assert_eq!(Expr::constant(5).ty(), Type::Int);
        assert_eq!(Expr::constant("hi").ty(), Type::String);
        assert_eq!(Expr::null(Type::class("Widget")).ty(), Type::class("Widget"));
    }

    #[test]
    fn block_type_is_last_expression() {
        let x = Variable::new("x", Type::Int);
        let block = Expr::block(
            vec![x.clone()],
            vec![Expr::assign(x.clone().into(), Expr::constant(1)), Expr::constant(true)],
        );
        assert_eq!(block.ty(), Type::Bool);
        assert_eq!(Expr::block(vec![], vec![]).ty(), Type::Void);
    }

    #[test]
    fn write_capability() {
        let obj = Expr::from(Variable::new("obj", Type::class("Widget")));
        assert!(obj.can_write());
        assert!(!Expr::constant(1).can_write());
        assert!(Expr::member(obj.clone(), "Size", Type::Int).can_write());
        assert!(
            !Expr::member_with_access(obj.clone(), "Id", Type::Int, Access::ReadOnly).can_write()
        );
        let sink = Expr::member_with_access(obj, "Sink", Type::Int, Access::WriteOnly);
        assert!(sink.can_write());
        assert!(!sink.can_read());
    }

    #[test]
    fn variables_with_same_name_are_distinct() {
        let a = Variable::new("x", Type::Int);
        let b = Variable::new("x", Type::Int);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn clone_keeps_identity() {
        let e = Expr::constant(1);
        assert!(e.ptr_eq(&e.clone()));
        assert!(!e.ptr_eq(&Expr::constant(1)));
    }

    #[test]
    fn coalesce_unwraps_nullable() {
        let n = Expr::from(Variable::new("n", Type::nullable(Type::Int)));
        assert_eq!(Expr::coalesce(n, Expr::constant(0)).ty(), Type::Int);
    }
}
