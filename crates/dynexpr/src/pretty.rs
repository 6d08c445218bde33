//! Pretty printing for expression trees
//!
//! `Display` renders a tree on one line in C#-like syntax. [`pretty`]
//! breaks blocks over several lines, which is what lowered trees mostly
//! consist of.

use std::fmt::{self, Display, Write};

use crate::argument::Argument;
use crate::ast::core::{Expr, ExprKind};
use crate::ast::dynamic::{DynamicExpr, InvokeTarget};
use crate::ast::value::Value;
use crate::ast::ExpressionType;
use crate::binder::{ArgumentFlags, BinderFlags, DynamicCallSite};
use crate::factory::{self, Fixity};

// ============ Display (single-line) ============

/// Source symbol of an operator kind, if it has one.
fn symbol(kind: ExpressionType) -> Option<&'static str> {
    use ExpressionType as E;
    let s = match kind {
        E::Add | E::AddChecked => "+",
        E::Subtract | E::SubtractChecked => "-",
        E::Multiply | E::MultiplyChecked => "*",
        E::Divide => "/",
        E::Modulo => "%",
        E::Power => "**",
        E::And => "&",
        E::Or => "|",
        E::ExclusiveOr => "^",
        E::LeftShift => "<<",
        E::RightShift => ">>",
        E::Equal => "==",
        E::NotEqual => "!=",
        E::LessThan => "<",
        E::LessThanOrEqual => "<=",
        E::GreaterThan => ">",
        E::GreaterThanOrEqual => ">=",
        E::AndAlso => "&&",
        E::OrElse => "||",
        E::Coalesce => "??",
        E::Negate | E::NegateChecked => "-",
        E::UnaryPlus => "+",
        E::Not => "!",
        E::OnesComplement => "~",
        E::Assign => "=",
        E::NullCoalescingAssign => "??=",
        E::AddAssign | E::AddAssignChecked => "+=",
        E::SubtractAssign | E::SubtractAssignChecked => "-=",
        E::MultiplyAssign | E::MultiplyAssignChecked => "*=",
        E::DivideAssign => "/=",
        E::ModuloAssign => "%=",
        E::PowerAssign => "**=",
        E::AndAssign => "&=",
        E::OrAssign => "|=",
        E::ExclusiveOrAssign => "^=",
        E::LeftShiftAssign => "<<=",
        E::RightShiftAssign => ">>=",
        E::PreIncrementAssign
        | E::PreIncrementCheckedAssign
        | E::PostIncrementAssign
        | E::PostIncrementCheckedAssign => "++",
        E::PreDecrementAssign
        | E::PreDecrementCheckedAssign
        | E::PostDecrementAssign
        | E::PostDecrementCheckedAssign => "--",
        E::IsTrue | E::IsFalse | E::Increment | E::Decrement | E::Convert => return None,
    };
    Some(s)
}

impl Display for ExpressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match symbol(*self) {
            Some(s) => write!(f, "{s}"),
            None => write!(f, "{self:?}"),
        }
    }
}

/// Runtime rendering. Strings print bare, which is what concatenation wants.
impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Double(n) => {
                if n.is_finite() && n.fract() == 0.0 {
                    write!(f, "{n:.1}")
                } else {
                    write!(f, "{n}")
                }
            }
            Value::String(s) => write!(f, "{s}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Object(obj) => {
                let obj = obj.borrow();
                write!(f, "{} {{", obj.class)?;
                for (i, (name, value)) in obj.fields.iter().enumerate() {
                    let sep = if i > 0 { "," } else { "" };
                    write!(f, "{sep} {name} = {value}")?;
                }
                write!(f, " }}")
            }
            Value::Struct(s) => {
                write!(f, "{} {{", s.name)?;
                for (i, (name, value)) in s.fields.iter().enumerate() {
                    let sep = if i > 0 { "," } else { "" };
                    write!(f, "{sep} {name} = {value}")?;
                }
                write!(f, " }}")
            }
            Value::Type(ty) => write!(f, "{ty}"),
            Value::Function(func) => write!(f, "{}", func.name()),
        }
    }
}

fn write_constant(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::String(s) => write!(f, "\"{}\"", escape_string(s)),
        Value::Type(ty) => write!(f, "typeof({ty})"),
        other => write!(f, "{other}"),
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

fn write_list<T>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
    mut write_item: impl FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write_item(f, item)?;
    }
    Ok(())
}

fn write_exprs(f: &mut fmt::Formatter<'_>, exprs: &[Expr]) -> fmt::Result {
    write_list(f, exprs, |f, expr| write!(f, "{expr}"))
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Argument]) -> fmt::Result {
    write_list(f, args, |f, arg| write!(f, "{arg}"))
}

impl Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.name() {
            write!(f, "{name}: ")?;
        }
        if self.flags().contains(ArgumentFlags::IS_OUT) {
            write!(f, "out ")?;
        } else if self.flags().contains(ArgumentFlags::IS_REF) {
            write!(f, "ref ")?;
        }
        write!(f, "{}", self.expression())
    }
}

/// Operands that are not atoms get parenthesized.
fn is_atom(expr: &Expr) -> bool {
    match expr.kind() {
        ExprKind::Constant { .. }
        | ExprKind::Default(_)
        | ExprKind::Variable(_)
        | ExprKind::Member { .. }
        | ExprKind::Index { .. }
        | ExprKind::Call { .. }
        | ExprKind::DynamicCall { .. }
        | ExprKind::Block { .. } => true,
        ExprKind::Extension(node) => matches!(
            node,
            DynamicExpr::GetMember(_)
                | DynamicExpr::GetIndex(_)
                | DynamicExpr::Invoke(_)
                | DynamicExpr::InvokeMember(_)
                | DynamicExpr::InvokeConstructor(_)
        ),
        _ => false,
    }
}

struct Operand<'a>(&'a Expr);

impl Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if is_atom(self.0) {
            write!(f, "{}", self.0)
        } else {
            write!(f, "({})", self.0)
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Constant { value, .. } => write_constant(f, value),
            ExprKind::Default(ty) => write!(f, "default({ty})"),
            ExprKind::Variable(variable) => write!(f, "{}", variable.name()),
            ExprKind::Assign { target, value } => write!(f, "{target} = {value}"),
            ExprKind::Block { variables, body } => {
                write!(f, "{{ ")?;
                for variable in variables {
                    write!(f, "{} {}; ", variable.ty(), variable.name())?;
                }
                for expr in body {
                    write!(f, "{expr}; ")?;
                }
                write!(f, "}}")
            }
            ExprKind::Conditional {
                test,
                if_true,
                if_false,
                ..
            } => write!(
                f,
                "{} ? {} : {}",
                Operand(test),
                Operand(if_true),
                Operand(if_false)
            ),
            ExprKind::Coalesce { left, right } => {
                write!(f, "{} ?? {}", Operand(left), Operand(right))
            }
            ExprKind::Convert { operand, ty } => write!(f, "({ty}){}", Operand(operand)),
            ExprKind::Member { object, name, .. } => write!(f, "{}.{name}", Operand(object)),
            ExprKind::Index {
                object, arguments, ..
            } => {
                write!(f, "{}[", Operand(object))?;
                write_exprs(f, arguments)?;
                write!(f, "]")
            }
            ExprKind::Call {
                function,
                arguments,
                ..
            } => {
                write!(f, "{}(", function.name())?;
                write_exprs(f, arguments)?;
                write!(f, ")")
            }
            ExprKind::DynamicCall { site, .. } => write_call_site(f, site),
            ExprKind::Extension(node) => write!(f, "{node}"),
        }
    }
}

/// `dynamic[GetMember Count](ref p)`
fn write_call_site(f: &mut fmt::Formatter<'_>, site: &DynamicCallSite) -> fmt::Result {
    write!(f, "dynamic[{}", site.binder.operation)?;
    if site.binder.flags.contains(BinderFlags::CHECKED_CONTEXT) {
        write!(f, ", checked")?;
    }
    write!(f, "](")?;
    for (i, argument) in site.arguments.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        if site.is_by_ref(i) {
            write!(f, "ref ")?;
        }
        write!(f, "{argument}")?;
    }
    write!(f, ")")
}

impl Display for DynamicExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynamicExpr::Binary(node) => {
                let op = node.kind();
                write!(
                    f,
                    "{} {op} {}",
                    Operand(node.left().expression()),
                    Operand(node.right().expression())
                )
            }
            DynamicExpr::Unary(node) => {
                let operand = Operand(node.operand().expression());
                match symbol(node.kind()) {
                    Some(op) => write!(f, "{op}{operand}"),
                    None => write!(f, "{:?}({})", node.kind(), node.operand()),
                }
            }
            DynamicExpr::AssignBinary(node) => write!(
                f,
                "{} {} {}",
                node.left().expression(),
                node.kind(),
                node.right().expression()
            ),
            DynamicExpr::AssignUnary(node) => {
                let operand = Operand(node.operand().expression());
                let op = node.kind();
                match factory::operator_info(op).map(|info| info.fixity) {
                    Some(Fixity::Postfix) => write!(f, "{operand}{op}"),
                    _ => write!(f, "{op}{operand}"),
                }
            }
            DynamicExpr::GetMember(node) => {
                write!(f, "{}.{}", Operand(node.object()), node.name())?;
                if !node.arguments().is_empty() {
                    write!(f, "[")?;
                    write_args(f, node.arguments())?;
                    write!(f, "]")?;
                }
                Ok(())
            }
            DynamicExpr::GetIndex(node) => {
                write!(f, "{}[", Operand(node.object()))?;
                write_args(f, node.arguments())?;
                write!(f, "]")
            }
            DynamicExpr::Invoke(node) => {
                write!(f, "{}(", Operand(node.expression()))?;
                write_args(f, node.arguments())?;
                write!(f, ")")
            }
            DynamicExpr::InvokeMember(node) => {
                match node.target() {
                    InvokeTarget::Instance(object) => write!(f, "{}", Operand(object))?,
                    InvokeTarget::Static(ty) => write!(f, "{ty}")?,
                }
                write!(f, ".{}", node.name())?;
                if !node.type_arguments().is_empty() {
                    write!(f, "<")?;
                    write_list(f, node.type_arguments(), |f, ty| write!(f, "{ty}"))?;
                    write!(f, ">")?;
                }
                write!(f, "(")?;
                write_args(f, node.arguments())?;
                write!(f, ")")
            }
            DynamicExpr::InvokeConstructor(node) => {
                write!(f, "new {}(", node.ty())?;
                write_args(f, node.arguments())?;
                write!(f, ")")
            }
            DynamicExpr::Convert(node) => {
                let operand = Operand(node.expression());
                if node.is_explicit() {
                    write!(f, "({}){operand}", node.ty())
                } else {
                    write!(f, "implicit({}){operand}", node.ty())
                }
            }
        }
    }
}

// ============ Pretty (multi-line) ============

const INDENT: &str = "    ";

/// Render with one statement per line inside blocks.
///
/// Expressions without blocks come out the same as `Display`.
pub fn pretty(expr: &Expr) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_pretty(&mut out, expr, 0);
    out
}

fn write_pretty(out: &mut String, expr: &Expr, depth: usize) -> fmt::Result {
    match expr.kind() {
        ExprKind::Block { variables, body } => {
            writeln!(out, "{{")?;
            let inner = INDENT.repeat(depth + 1);
            for variable in variables {
                writeln!(out, "{inner}{} {};", variable.ty(), variable.name())?;
            }
            for statement in body {
                out.push_str(&inner);
                write_pretty(out, statement, depth + 1)?;
                writeln!(out, ";")?;
            }
            write!(out, "{}}}", INDENT.repeat(depth))
        }
        ExprKind::Assign { target, value } if contains_block(value) => {
            write!(out, "{target} = ")?;
            write_pretty(out, value, depth)
        }
        ExprKind::Conditional {
            test,
            if_true,
            if_false,
            ..
        } if contains_block(if_true) || contains_block(if_false) => {
            let inner = INDENT.repeat(depth + 1);
            writeln!(out, "{}", Operand(test))?;
            write!(out, "{inner}? ")?;
            write_pretty(out, if_true, depth + 1)?;
            write!(out, "\n{inner}: ")?;
            write_pretty(out, if_false, depth + 1)
        }
        _ => write!(out, "{expr}"),
    }
}

fn contains_block(expr: &Expr) -> bool {
    match expr.kind() {
        ExprKind::Block { .. } => true,
        ExprKind::Assign { value, .. } => contains_block(value),
        ExprKind::Conditional {
            if_true, if_false, ..
        } => contains_block(if_true) || contains_block(if_false),
        _ => false,
    }
}
