//! Runtime values
//!
//! Constants carry these, and eval produces them. Objects and arrays are
//! shared and mutable; structs are copied on assignment.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::Type;
use crate::eval::EvalError;

pub type ObjectRef = Rc<RefCell<Object>>;
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Double(f64),
    String(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Struct(StructValue),
    Type(Type),
    Function(NativeFunction),
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Value::String(s.into())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Static type a constant of this value gets when none is given.
    pub fn static_type(&self) -> Type {
        match self {
            Value::Null => Type::Object,
            Value::Bool(_) => Type::Bool,
            Value::Int(_) => Type::Int,
            Value::Double(_) => Type::Double,
            Value::String(_) => Type::String,
            Value::Array(_) => Type::array(Type::Object),
            Value::Object(obj) => Type::Class(obj.borrow().class.clone()),
            Value::Struct(s) => Type::Struct(s.name.clone()),
            Value::Type(_) => Type::Meta,
            Value::Function(_) => Type::Function,
        }
    }

    /// Name of the value's kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Struct(_) => "struct",
            Value::Type(_) => "type",
            Value::Function(_) => "function",
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Int(a), Value::Double(b)) | (Value::Double(b), Value::Int(a)) => {
                f64::from(*a) == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Struct(a), Value::Struct(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Double(n) => write!(f, "Double({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Array(items) => write!(f, "Array(len={})", items.borrow().len()),
            Value::Object(obj) => write!(f, "Object({})", obj.borrow().class),
            Value::Struct(s) => write!(f, "{s:?}"),
            Value::Type(ty) => write!(f, "Type({ty})"),
            Value::Function(func) => write!(f, "Function({})", func.name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Value::Object(Rc::new(RefCell::new(obj)))
    }
}

impl From<StructValue> for Value {
    fn from(s: StructValue) -> Self {
        Value::Struct(s)
    }
}

impl From<NativeFunction> for Value {
    fn from(func: NativeFunction) -> Self {
        Value::Function(func)
    }
}

/// A reference-typed runtime object: named fields, events with their
/// handler lists, and indexer items.
#[derive(Debug, Clone)]
pub struct Object {
    pub class: Rc<str>,
    pub fields: IndexMap<String, Value>,
    pub events: IndexMap<String, Vec<Value>>,
    pub items: Vec<(Vec<Value>, Value)>,
}

impl Object {
    pub fn new(class: impl Into<Rc<str>>) -> Self {
        Self {
            class: class.into(),
            fields: IndexMap::new(),
            events: IndexMap::new(),
            items: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Declare an event with no subscribed handlers.
    pub fn with_event(mut self, name: impl Into<String>) -> Self {
        self.events.insert(name.into(), Vec::new());
        self
    }

    pub fn with_item(mut self, key: Vec<Value>, value: impl Into<Value>) -> Self {
        self.items.push((key, value.into()));
        self
    }

    pub fn into_ref(self) -> ObjectRef {
        Rc::new(RefCell::new(self))
    }

    pub fn item(&self, key: &[Value]) -> Option<&Value> {
        self.items
            .iter()
            .find(|(k, _)| k.as_slice() == key)
            .map(|(_, v)| v)
    }

    pub fn set_item(&mut self, key: Vec<Value>, value: Value) {
        match self.items.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.items.push((key, value)),
        }
    }
}

/// A value-typed runtime record. Cloned whenever it is read out of a
/// location, so mutation only sticks when made through a by-ref slot.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    pub name: Rc<str>,
    pub fields: IndexMap<String, Value>,
}

impl StructValue {
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

type NativeFn = dyn Fn(&[Value]) -> Result<Value, EvalError>;

/// A host function callable from the tree, either through a `Call` node or
/// as a delegate value invoked dynamically.
#[derive(Clone)]
pub struct NativeFunction {
    name: Rc<str>,
    func: Rc<NativeFn>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<Rc<str>>,
        func: impl Fn(&[Value]) -> Result<Value, EvalError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        (self.func)(args)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_compare_by_identity() {
        let a = Value::from(Object::new("Counter"));
        let b = Value::from(Object::new("Counter"));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn structs_compare_by_content() {
        let a = StructValue::new("Point").with_field("X", 1);
        let b = StructValue::new("Point").with_field("X", 1);
        assert_eq!(Value::from(a), Value::from(b));
    }

    #[test]
    fn item_lookup_matches_whole_key() {
        let mut obj = Object::new("Grid").with_item(vec![Value::Int(1), Value::Int(2)], 7);
        assert_eq!(obj.item(&[Value::Int(1), Value::Int(2)]), Some(&Value::Int(7)));
        assert_eq!(obj.item(&[Value::Int(1)]), None);

        obj.set_item(vec![Value::Int(1), Value::Int(2)], Value::Int(8));
        assert_eq!(obj.items.len(), 1);
        assert_eq!(obj.item(&[Value::Int(1), Value::Int(2)]), Some(&Value::Int(8)));
    }
}
