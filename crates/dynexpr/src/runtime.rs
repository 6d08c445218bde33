//! Binder runtime
//!
//! What a call site does at run time is up to a [`DynamicRuntime`]. The
//! interpreter hands it the binder description and the evaluated arguments;
//! by-ref arguments may be replaced in place and are written back by the
//! caller.
//!
//! [`BasicRuntime`] binds against the runtime values this crate knows:
//! numbers, strings, property-bag objects with events, structs, arrays and
//! native functions. It records every operation it performs.

use indexmap::IndexMap;
use log::trace;

use crate::ast::value::{NativeFunction, Object, StructValue, Value};
use crate::ast::{ExpressionType, Type};
use crate::binder::{BinderFlags, CallSiteBinder, Operation};
use crate::eval::EvalError;

type Result<T> = std::result::Result<T, EvalError>;

pub trait DynamicRuntime {
    /// Perform `binder.operation` over `arguments`.
    fn invoke(&mut self, binder: &CallSiteBinder, arguments: &mut [Value]) -> Result<Value>;
}

#[derive(Debug, Default)]
pub struct BasicRuntime {
    trace: Vec<String>,
    statics: IndexMap<(String, String), NativeFunction>,
    constructors: IndexMap<String, NativeFunction>,
}

impl BasicRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `ty.name(...)` for static invocation.
    pub fn with_static(
        mut self,
        ty: &Type,
        name: impl Into<String>,
        function: NativeFunction,
    ) -> Self {
        self.statics.insert((ty.to_string(), name.into()), function);
        self
    }

    /// Register `new ty(...)`.
    pub fn with_constructor(mut self, ty: &Type, function: NativeFunction) -> Self {
        self.constructors.insert(ty.to_string(), function);
        self
    }

    /// Operations performed so far, e.g. `GetMember Count`.
    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }
}

impl DynamicRuntime for BasicRuntime {
    fn invoke(&mut self, binder: &CallSiteBinder, arguments: &mut [Value]) -> Result<Value> {
        trace!("bind {} over {} argument(s)", binder.operation, arguments.len());
        self.trace.push(binder.operation.to_string());
        let checked = binder.flags.contains(BinderFlags::CHECKED_CONTEXT);

        match &binder.operation {
            Operation::BinaryOperation(op) => match arguments {
                [left, right] => binary_op(*op, left, right, checked),
                _ => Err(arity("binary operation", 2, arguments.len())),
            },
            Operation::UnaryOperation(op) => match arguments {
                [operand] => unary_op(*op, operand, checked),
                _ => Err(arity("unary operation", 1, arguments.len())),
            },
            Operation::GetMember(name) => {
                let (receiver, keys) = split_receiver(arguments)?;
                let value = read_member(receiver, name)?;
                if keys.is_empty() {
                    Ok(value)
                } else {
                    read_index(&value, keys)
                }
            }
            Operation::SetMember(name) => {
                let (receiver, keys, value) = split_store(arguments)?;
                if keys.is_empty() {
                    write_member(receiver, name, value.clone())?;
                } else {
                    let mut container = read_member(receiver, name)?;
                    write_index(&mut container, keys, value.clone())?;
                }
                Ok(value)
            }
            Operation::GetIndex => {
                let (receiver, keys) = split_receiver(arguments)?;
                read_index(receiver, keys)
            }
            Operation::SetIndex => {
                let (receiver, keys, value) = split_store(arguments)?;
                write_index(receiver, keys, value.clone())?;
                Ok(value)
            }
            Operation::InvokeMember { name, .. } => {
                let (receiver, rest) = split_receiver(arguments)?;
                self.invoke_member(receiver, name, rest)
            }
            Operation::Invoke => {
                let (callee, rest) = split_receiver(arguments)?;
                match callee {
                    Value::Function(function) => function.call(rest),
                    Value::Null => Err(EvalError::NullReference("delegate".to_string())),
                    other => Err(EvalError::type_error("delegate", other)),
                }
            }
            Operation::InvokeConstructor => {
                let (ty, rest) = split_receiver(arguments)?;
                match ty {
                    Value::Type(ty) => self.construct(ty, rest),
                    other => Err(EvalError::type_error("type", other)),
                }
            }
            Operation::Convert(ty) => match arguments {
                [value] => convert_value(
                    value,
                    ty,
                    binder.flags.contains(BinderFlags::CONVERT_EXPLICIT),
                ),
                _ => Err(arity("conversion", 1, arguments.len())),
            },
            Operation::IsEvent(name) => {
                let (receiver, _) = split_receiver(arguments)?;
                let is_event = receiver
                    .as_object()
                    .is_some_and(|object| object.borrow().events.contains_key(name));
                Ok(Value::Bool(is_event))
            }
        }
    }
}

impl BasicRuntime {
    fn invoke_member(
        &mut self,
        receiver: &mut Value,
        name: &str,
        arguments: &[Value],
    ) -> Result<Value> {
        if let Value::Type(ty) = receiver {
            let key = (ty.to_string(), name.to_string());
            return match self.statics.get(&key) {
                Some(function) => function.call(arguments),
                None => Err(EvalError::UnknownMember {
                    target: key.0,
                    member: key.1,
                }),
            };
        }

        let object = match receiver {
            Value::Object(object) => object.clone(),
            Value::Null => return Err(EvalError::NullReference(name.to_string())),
            other => {
                return Err(EvalError::UnknownMember {
                    target: other.kind_name().to_string(),
                    member: name.to_string(),
                });
            }
        };

        // Event accessors
        for (prefix, subscribe) in [("add_", true), ("remove_", false)] {
            if let Some(event) = name.strip_prefix(prefix)
                && let Some(handlers) = object.borrow_mut().events.get_mut(event)
            {
                let [handler] = arguments else {
                    return Err(arity(name, 1, arguments.len()));
                };
                if subscribe {
                    handlers.push(handler.clone());
                } else if let Some(pos) = handlers.iter().rposition(|h| h == handler) {
                    handlers.remove(pos);
                }
                return Ok(Value::Null);
            }
        }

        let method = object.borrow().fields.get(name).cloned();
        match method {
            Some(Value::Function(function)) => function.call(arguments),
            Some(other) => Err(EvalError::type_error("delegate", &other)),
            None => Err(EvalError::UnknownMember {
                target: object.borrow().class.to_string(),
                member: name.to_string(),
            }),
        }
    }

    /// Registered constructor, else an empty instance of the class or struct.
    fn construct(&mut self, ty: &Type, arguments: &[Value]) -> Result<Value> {
        if let Some(function) = self.constructors.get(&ty.to_string()) {
            return function.call(arguments);
        }
        match ty {
            Type::Class(name) if arguments.is_empty() => Ok(Object::new(name.clone()).into()),
            Type::Struct(name) if arguments.is_empty() => {
                Ok(StructValue::new(name.clone()).into())
            }
            _ => Err(EvalError::UnknownMember {
                target: ty.to_string(),
                member: ".ctor".to_string(),
            }),
        }
    }
}

fn arity(what: &str, expected: usize, got: usize) -> EvalError {
    EvalError::Other(format!("{what} expects {expected} argument(s), got {got}"))
}

fn split_receiver(arguments: &mut [Value]) -> Result<(&mut Value, &[Value])> {
    match arguments.split_first_mut() {
        Some((receiver, rest)) => Ok((receiver, &*rest)),
        None => Err(arity("receiver", 1, 0)),
    }
}

/// `[receiver, keys.., value]`
fn split_store(arguments: &mut [Value]) -> Result<(&mut Value, &[Value], Value)> {
    let len = arguments.len();
    if len < 2 {
        return Err(arity("store", 2, len));
    }
    let value = arguments[len - 1].clone();
    let (receiver, rest) = arguments[..len - 1]
        .split_first_mut()
        .ok_or_else(|| arity("store", 2, len))?;
    Ok((receiver, &*rest, value))
}

// ============ Member and element access ============

pub(crate) fn read_member(receiver: &Value, name: &str) -> Result<Value> {
    let unknown = |target: &str| EvalError::UnknownMember {
        target: target.to_string(),
        member: name.to_string(),
    };
    match receiver {
        Value::Object(object) => {
            let object = object.borrow();
            object
                .fields
                .get(name)
                .cloned()
                .ok_or_else(|| unknown(&*object.class))
        }
        Value::Struct(record) => record
            .fields
            .get(name)
            .cloned()
            .ok_or_else(|| unknown(&*record.name)),
        Value::Array(items) if name == "Length" => Ok(Value::Int(length(items.borrow().len())?)),
        Value::String(s) if name == "Length" => Ok(Value::Int(length(s.chars().count())?)),
        Value::Null => Err(EvalError::NullReference(name.to_string())),
        other => Err(unknown(other.kind_name())),
    }
}

/// Stores into an existing member. Structs are changed in place, which only
/// sticks when `receiver` is a by-ref slot.
pub(crate) fn write_member(receiver: &mut Value, name: &str, value: Value) -> Result<()> {
    let unknown = |target: &str| EvalError::UnknownMember {
        target: target.to_string(),
        member: name.to_string(),
    };
    match receiver {
        Value::Object(object) => {
            let mut object = object.borrow_mut();
            let class = object.class.clone();
            let slot = object.fields.get_mut(name).ok_or_else(|| unknown(&*class))?;
            *slot = value;
            Ok(())
        }
        Value::Struct(record) => {
            let slot = record
                .fields
                .get_mut(name)
                .ok_or_else(|| unknown(&*record.name))?;
            *slot = value;
            Ok(())
        }
        Value::Null => Err(EvalError::NullReference(name.to_string())),
        other => Err(unknown(other.kind_name())),
    }
}

fn length(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| EvalError::Overflow("Length".to_string()))
}

/// Position of `key` in an array of `items`, bounds-checked.
pub(crate) fn element_index(items: &[Value], key: &[Value]) -> Result<usize> {
    match key {
        [Value::Int(index)] => usize::try_from(*index)
            .ok()
            .filter(|i| *i < items.len())
            .ok_or(EvalError::IndexOutOfRange {
                index: i64::from(*index),
                len: items.len(),
            }),
        [other] => Err(EvalError::type_error("int", other)),
        _ => Err(arity("array index", 1, key.len())),
    }
}

pub(crate) fn read_index(container: &Value, key: &[Value]) -> Result<Value> {
    match container {
        Value::Array(items) => {
            let items = items.borrow();
            let index = element_index(&items, key)?;
            Ok(items[index].clone())
        }
        Value::Object(object) => {
            let object = object.borrow();
            object.item(key).cloned().ok_or_else(|| {
                EvalError::Other(format!("{} has no item at {key:?}", object.class))
            })
        }
        Value::Null => Err(EvalError::NullReference("indexer".to_string())),
        other => Err(EvalError::type_error("array or object", other)),
    }
}

pub(crate) fn write_index(container: &mut Value, key: &[Value], value: Value) -> Result<()> {
    match container {
        Value::Array(items) => {
            let mut items = items.borrow_mut();
            let index = element_index(&items, key)?;
            items[index] = value;
            Ok(())
        }
        Value::Object(object) => {
            object.borrow_mut().set_item(key.to_vec(), value);
            Ok(())
        }
        Value::Null => Err(EvalError::NullReference("indexer".to_string())),
        other => Err(EvalError::type_error("array or object", other)),
    }
}

// ============ Operators ============

fn overflow(op: ExpressionType) -> EvalError {
    EvalError::Overflow(format!("{op:?}"))
}

fn int_arith(
    op: ExpressionType,
    a: i32,
    b: i32,
    checked: bool,
    checked_op: fn(i32, i32) -> Option<i32>,
    wrapping_op: fn(i32, i32) -> i32,
) -> Result<Value> {
    if checked {
        checked_op(a, b).map(Value::Int).ok_or_else(|| overflow(op))
    } else {
        Ok(Value::Int(wrapping_op(a, b)))
    }
}

fn as_double(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(f64::from(*n)),
        Value::Double(n) => Some(*n),
        _ => None,
    }
}

fn binary_op(op: ExpressionType, left: &Value, right: &Value, checked: bool) -> Result<Value> {
    use ExpressionType as E;

    match op {
        E::Equal => return Ok(Value::Bool(left == right)),
        E::NotEqual => return Ok(Value::Bool(left != right)),
        _ => {}
    }

    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),

        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            match op {
                E::Add => int_arith(op, a, b, checked, i32::checked_add, i32::wrapping_add),
                E::Subtract => int_arith(op, a, b, checked, i32::checked_sub, i32::wrapping_sub),
                E::Multiply => int_arith(op, a, b, checked, i32::checked_mul, i32::wrapping_mul),
                E::Divide | E::Modulo if b == 0 => Err(EvalError::DivideByZero),
                E::Divide => a.checked_div(b).map(Value::Int).ok_or_else(|| overflow(op)),
                E::Modulo => a.checked_rem(b).map(Value::Int).ok_or_else(|| overflow(op)),
                E::And => Ok(Value::Int(a & b)),
                E::Or => Ok(Value::Int(a | b)),
                E::ExclusiveOr => Ok(Value::Int(a ^ b)),
                E::LeftShift => Ok(Value::Int(a.wrapping_shl(b as u32))),
                E::RightShift => Ok(Value::Int(a.wrapping_shr(b as u32))),
                E::LessThan => Ok(Value::Bool(a < b)),
                E::LessThanOrEqual => Ok(Value::Bool(a <= b)),
                E::GreaterThan => Ok(Value::Bool(a > b)),
                E::GreaterThanOrEqual => Ok(Value::Bool(a >= b)),
                _ => Err(unsupported_binary(op, left, right)),
            }
        }

        (Value::Bool(a), Value::Bool(b)) => match op {
            E::And => Ok(Value::Bool(*a & *b)),
            E::Or => Ok(Value::Bool(*a | *b)),
            E::ExclusiveOr => Ok(Value::Bool(*a ^ *b)),
            _ => Err(unsupported_binary(op, left, right)),
        },

        (Value::String(a), _) if op == E::Add => Ok(Value::string(format!("{a}{right}"))),
        (_, Value::String(b)) if op == E::Add => Ok(Value::string(format!("{left}{b}"))),

        _ => match (as_double(left), as_double(right)) {
            (Some(a), Some(b)) => match op {
                E::Add => Ok(Value::Double(a + b)),
                E::Subtract => Ok(Value::Double(a - b)),
                E::Multiply => Ok(Value::Double(a * b)),
                E::Divide => Ok(Value::Double(a / b)),
                E::Modulo => Ok(Value::Double(a % b)),
                E::LessThan => Ok(Value::Bool(a < b)),
                E::LessThanOrEqual => Ok(Value::Bool(a <= b)),
                E::GreaterThan => Ok(Value::Bool(a > b)),
                E::GreaterThanOrEqual => Ok(Value::Bool(a >= b)),
                _ => Err(unsupported_binary(op, left, right)),
            },
            _ => Err(unsupported_binary(op, left, right)),
        },
    }
}

fn unsupported_binary(op: ExpressionType, left: &Value, right: &Value) -> EvalError {
    EvalError::Other(format!(
        "Operator {op:?} cannot be applied to {} and {}",
        left.kind_name(),
        right.kind_name()
    ))
}

fn unary_op(op: ExpressionType, operand: &Value, checked: bool) -> Result<Value> {
    use ExpressionType as E;

    let unsupported = || {
        EvalError::Other(format!(
            "Operator {op:?} cannot be applied to {}",
            operand.kind_name()
        ))
    };
    match (op, operand) {
        (E::IsTrue, Value::Bool(b)) => Ok(Value::Bool(*b)),
        (E::IsFalse, Value::Bool(b)) => Ok(Value::Bool(!*b)),
        (E::IsTrue | E::IsFalse, other) => Err(EvalError::type_error("bool", other)),
        (_, Value::Null) => Ok(Value::Null),
        (E::Not, Value::Bool(b)) => Ok(Value::Bool(!*b)),
        (E::UnaryPlus, Value::Int(_) | Value::Double(_)) => Ok(operand.clone()),
        (E::OnesComplement, Value::Int(n)) => Ok(Value::Int(!*n)),
        (E::Negate, Value::Int(n)) if checked => {
            n.checked_neg().map(Value::Int).ok_or_else(|| overflow(op))
        }
        (E::Negate, Value::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
        (E::Negate, Value::Double(n)) => Ok(Value::Double(-*n)),
        (E::Increment, Value::Int(n)) => {
            int_arith(op, *n, 1, checked, i32::checked_add, i32::wrapping_add)
        }
        (E::Decrement, Value::Int(n)) => {
            int_arith(op, *n, 1, checked, i32::checked_sub, i32::wrapping_sub)
        }
        (E::Increment, Value::Double(n)) => Ok(Value::Double(n + 1.0)),
        (E::Decrement, Value::Double(n)) => Ok(Value::Double(n - 1.0)),
        _ => Err(unsupported()),
    }
}

// ============ Conversions ============

/// Convert `value` to `ty`. Narrowing numeric conversions need `explicit`.
pub(crate) fn convert_value(value: &Value, ty: &Type, explicit: bool) -> Result<Value> {
    let mismatch = || EvalError::type_error(ty.to_string(), value);
    match (ty, value) {
        (Type::Object, _) => Ok(value.clone()),
        (Type::Nullable(_), Value::Null) => Ok(Value::Null),
        (Type::Nullable(inner), _) => convert_value(value, inner, explicit),
        (
            Type::String | Type::Class(_) | Type::Array(_) | Type::Function,
            Value::Null,
        ) => Ok(Value::Null),
        (Type::Bool, Value::Bool(_))
        | (Type::Int, Value::Int(_))
        | (Type::Double, Value::Double(_))
        | (Type::String, Value::String(_))
        | (Type::Array(_), Value::Array(_))
        | (Type::Function, Value::Function(_))
        | (Type::Meta, Value::Type(_)) => Ok(value.clone()),
        (Type::Double, Value::Int(n)) => Ok(Value::Double(f64::from(*n))),
        (Type::Int, Value::Double(n)) if explicit => {
            if n.is_finite() && *n >= f64::from(i32::MIN) && *n <= f64::from(i32::MAX) {
                Ok(Value::Int(n.trunc() as i32))
            } else {
                Err(EvalError::Overflow(format!("conversion of {n} to int")))
            }
        }
        (Type::Class(name), Value::Object(object)) if object.borrow().class == *name => {
            Ok(value.clone())
        }
        (Type::Struct(name), Value::Struct(record)) if record.name == *name => Ok(value.clone()),
        _ => Err(mismatch()),
    }
}
