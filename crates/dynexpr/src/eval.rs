//! Interpreter for expression trees
//!
//! Evaluates core::Expr directly. Dynamic nodes met on the way are reduced
//! first, the way a host compiler would, and dynamic call sites are handed
//! to a [`DynamicRuntime`].

use indexmap::IndexMap;
use log::{debug, trace};
use thiserror::Error;

use crate::ast::Type;
use crate::ast::core::{Access, Expr, ExprKind, Variable};
use crate::ast::value::{ArrayRef, ObjectRef, StructValue, Value};
use crate::binder::DynamicCallSite;
use crate::runtime::{self, BasicRuntime, DynamicRuntime};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Unbound variable: {0}")]
    UnboundVariable(String),

    #[error("Unknown member '{member}' on {target}")]
    UnknownMember { target: String, member: String },

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Arithmetic overflow in {0}")]
    Overflow(String),

    #[error("Division by zero")]
    DivideByZero,

    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("Null reference: {0}")]
    NullReference(String),

    #[error("Expression is not assignable: {0}")]
    NotAssignable(String),

    #[error("{0}")]
    Other(String),
}

type Result<T> = std::result::Result<T, EvalError>;

impl EvalError {
    pub(crate) fn type_error(expected: impl Into<String>, got: &Value) -> Self {
        EvalError::TypeError {
            expected: expected.into(),
            got: got.kind_name().to_string(),
        }
    }
}

/// Runtime state for evaluation: variable values and the binder runtime.
pub struct EvalContext<R = BasicRuntime> {
    runtime: R,
    locals: IndexMap<u64, Value>,
}

impl Default for EvalContext<BasicRuntime> {
    fn default() -> Self {
        Self::new(BasicRuntime::new())
    }
}

impl<R: DynamicRuntime> EvalContext<R> {
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            locals: IndexMap::new(),
        }
    }

    /// Bind `variable` to `value`.
    pub fn with_variable(mut self, variable: &Variable, value: impl Into<Value>) -> Self {
        self.set_variable(variable, value.into());
        self
    }

    pub fn set_variable(&mut self, variable: &Variable, value: Value) {
        self.locals.insert(variable.id(), value);
    }

    pub fn variable(&self, variable: &Variable) -> Option<&Value> {
        self.locals.get(&variable.id())
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }
}

/// Default value of a type: zero for numbers, `false`, an empty struct,
/// `null` for everything else.
pub fn default_value(ty: &Type) -> Value {
    match ty {
        Type::Bool => Value::Bool(false),
        Type::Int => Value::Int(0),
        Type::Double => Value::Double(0.0),
        Type::Struct(name) => Value::Struct(StructValue::new(name.clone())),
        _ => Value::Null,
    }
}

pub fn eval<R: DynamicRuntime>(expr: &Expr, ctx: &mut EvalContext<R>) -> Result<Value> {
    match expr.kind() {
        ExprKind::Constant { value, .. } => Ok(value.clone()),
        ExprKind::Default(ty) => Ok(default_value(ty)),
        ExprKind::Variable(variable) => ctx
            .variable(variable)
            .cloned()
            .ok_or_else(|| EvalError::UnboundVariable(variable.name().to_string())),
        ExprKind::Assign { target, value } => {
            let location = resolve(target, ctx)?;
            let value = eval(value, ctx)?;
            location.store(value.clone(), ctx)?;
            Ok(value)
        }
        ExprKind::Block { variables, body } => eval_block(variables, body, ctx),
        ExprKind::Conditional {
            test,
            if_true,
            if_false,
            ..
        } => match eval(test, ctx)? {
            Value::Bool(true) => eval(if_true, ctx),
            Value::Bool(false) => eval(if_false, ctx),
            other => Err(EvalError::type_error("bool", &other)),
        },
        ExprKind::Coalesce { left, right } => match eval(left, ctx)? {
            Value::Null => eval(right, ctx),
            value => Ok(value),
        },
        ExprKind::Convert { operand, ty } => {
            let value = eval(operand, ctx)?;
            runtime::convert_value(&value, ty, true)
        }
        ExprKind::Member {
            object,
            name,
            access,
            ..
        } => {
            if *access == Access::WriteOnly {
                return Err(EvalError::Other(format!("Member '{name}' is write-only")));
            }
            let object = eval(object, ctx)?;
            runtime::read_member(&object, name)
        }
        ExprKind::Index {
            object, arguments, ..
        } => {
            let object = eval(object, ctx)?;
            let keys = eval_all(arguments, ctx)?;
            runtime::read_index(&object, &keys)
        }
        ExprKind::Call {
            function,
            arguments,
            ..
        } => {
            let arguments = eval_all(arguments, ctx)?;
            function.call(&arguments)
        }
        ExprKind::DynamicCall { site, .. } => eval_dynamic_call(site, ctx),
        ExprKind::Extension(node) => {
            trace!("reducing dynamic node during evaluation");
            eval(&node.reduce(), ctx)
        }
    }
}

fn eval_all<R: DynamicRuntime>(exprs: &[Expr], ctx: &mut EvalContext<R>) -> Result<Vec<Value>> {
    exprs.iter().map(|expr| eval(expr, ctx)).collect()
}

/// Declared variables start at their default and go out of scope with the
/// block; a shadowed binding is restored.
fn eval_block<R: DynamicRuntime>(
    variables: &[Variable],
    body: &[Expr],
    ctx: &mut EvalContext<R>,
) -> Result<Value> {
    let saved: Vec<(u64, Option<Value>)> = variables
        .iter()
        .map(|variable| {
            let previous = ctx.locals.insert(variable.id(), default_value(variable.ty()));
            (variable.id(), previous)
        })
        .collect();

    let result = body
        .iter()
        .try_fold(Value::Null, |_, expr| eval(expr, ctx));

    for (id, previous) in saved.into_iter().rev() {
        match previous {
            Some(value) => {
                ctx.locals.insert(id, value);
            }
            None => {
                ctx.locals.swap_remove(&id);
            }
        }
    }
    result
}

/// Arguments are evaluated left to right. By-ref arguments are read from
/// their location and written back after the call.
fn eval_dynamic_call<R: DynamicRuntime>(
    site: &DynamicCallSite,
    ctx: &mut EvalContext<R>,
) -> Result<Value> {
    let mut values = Vec::with_capacity(site.arguments.len());
    let mut by_ref = Vec::new();
    for (i, argument) in site.arguments.iter().enumerate() {
        if site.is_by_ref(i) {
            let location = resolve(argument, ctx)?;
            values.push(location.load(ctx)?);
            by_ref.push((i, location));
        } else {
            values.push(eval(argument, ctx)?);
        }
    }

    debug!("dynamic {}", site.binder.operation);
    let result = ctx.runtime.invoke(&site.binder, &mut values)?;

    for (i, location) in by_ref {
        location.store(values[i].clone(), ctx)?;
    }
    Ok(result)
}

// ============ Locations ============

/// A storage slot an assignment or by-ref argument refers to.
enum Location {
    Variable(Variable),
    Field { object: ObjectRef, name: String },
    Element { array: ArrayRef, index: usize },
    Item { object: ObjectRef, key: Vec<Value> },
    /// Field of a struct stored in another slot
    StructField { owner: Box<Location>, name: String },
}

/// Evaluate the operands of `target` and return the slot it denotes.
fn resolve<R: DynamicRuntime>(target: &Expr, ctx: &mut EvalContext<R>) -> Result<Location> {
    match target.kind() {
        ExprKind::Variable(variable) => Ok(Location::Variable(variable.clone())),
        ExprKind::Member {
            object,
            name,
            access,
            ..
        } => {
            if *access == Access::ReadOnly {
                return Err(EvalError::NotAssignable(target.to_string()));
            }
            if object.ty().is_value_type() {
                let owner = resolve(object, ctx)?;
                return Ok(Location::StructField {
                    owner: Box::new(owner),
                    name: name.clone(),
                });
            }
            match eval(object, ctx)? {
                Value::Object(object) => Ok(Location::Field {
                    object,
                    name: name.clone(),
                }),
                Value::Null => Err(EvalError::NullReference(name.clone())),
                other => Err(EvalError::type_error("object", &other)),
            }
        }
        ExprKind::Index {
            object, arguments, ..
        } => {
            let container = eval(object, ctx)?;
            let key = eval_all(arguments, ctx)?;
            match container {
                Value::Array(array) => {
                    let index = runtime::element_index(&array.borrow(), &key)?;
                    Ok(Location::Element { array, index })
                }
                Value::Object(object) => Ok(Location::Item { object, key }),
                Value::Null => Err(EvalError::NullReference("indexer".to_string())),
                other => Err(EvalError::type_error("array or object", &other)),
            }
        }
        _ => Err(EvalError::NotAssignable(target.to_string())),
    }
}

impl Location {
    fn load<R: DynamicRuntime>(&self, ctx: &EvalContext<R>) -> Result<Value> {
        match self {
            Location::Variable(variable) => ctx
                .variable(variable)
                .cloned()
                .ok_or_else(|| EvalError::UnboundVariable(variable.name().to_string())),
            Location::Field { object, name } => {
                runtime::read_member(&Value::Object(object.clone()), name)
            }
            Location::Element { array, index } => Ok(array.borrow()[*index].clone()),
            Location::Item { object, key } => {
                runtime::read_index(&Value::Object(object.clone()), key)
            }
            Location::StructField { owner, name } => {
                let owner = owner.load(ctx)?;
                runtime::read_member(&owner, name)
            }
        }
    }

    fn store<R: DynamicRuntime>(&self, value: Value, ctx: &mut EvalContext<R>) -> Result<()> {
        match self {
            Location::Variable(variable) => {
                if ctx.variable(variable).is_none() {
                    return Err(EvalError::UnboundVariable(variable.name().to_string()));
                }
                ctx.set_variable(variable, value);
            }
            Location::Field { object, name } => {
                runtime::write_member(&mut Value::Object(object.clone()), name, value)?;
            }
            Location::Element { array, index } => {
                array.borrow_mut()[*index] = value;
            }
            Location::Item { object, key } => {
                object.borrow_mut().set_item(key.clone(), value);
            }
            Location::StructField { owner, name } => {
                let mut record = owner.load(ctx)?;
                runtime::write_member(&mut record, name, value)?;
                owner.store(record, ctx)?;
            }
        }
        Ok(())
    }
}
