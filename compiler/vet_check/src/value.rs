//! Runtime values checked against contracts.
//!
//! A `Value` is the data side of a validation. Each value reports a nominal
//! descriptor (what it is, for leaf checks) and a shape name (how it appears
//! in failure messages).
//!
//! Composite payloads sit behind a [`Heap`], so handing a sub-value to a
//! matcher never copies it.

mod heap;

use std::fmt;
use std::sync::Arc;

use vet_ir::{well_known, Descriptor, Name};

use crate::{FunctionValue, GenericSignature};

pub use heap::Heap;

/// A dynamically typed runtime value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex { re: f64, im: f64 },
    Str(Arc<str>),
    Bytes(Arc<[u8]>),
    ByteArray(Vec<u8>),
    Tuple(Heap<Vec<Value>>),
    List(Heap<Vec<Value>>),
    /// Unique elements in insertion order. Build with [`Value::set`].
    Set(Heap<Vec<Value>>),
    /// Key/value pairs in insertion order.
    Dict(Heap<Vec<(Value, Value)>>),
    /// An instance of a named record.
    Record {
        name: Name,
        fields: Heap<Vec<(Name, Value)>>,
    },
    /// An instance of a registered class, optionally of a generic one.
    Instance {
        class: Name,
        generic: Option<Arc<GenericSignature>>,
    },
    Function(FunctionValue),
    /// A type passed as a value. Checked as the type itself.
    Type(Descriptor),
}

impl Value {
    pub fn str(text: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(text.as_ref()))
    }

    pub fn bytes(data: impl AsRef<[u8]>) -> Self {
        Value::Bytes(Arc::from(data.as_ref()))
    }

    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Tuple(Heap::new(items.into_iter().collect()))
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(Heap::new(items.into_iter().collect()))
    }

    /// A set, dropping repeated elements.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        let mut unique: Vec<Value> = Vec::new();
        for item in items {
            if !unique.contains(&item) {
                unique.push(item);
            }
        }
        Value::Set(Heap::new(unique))
    }

    /// A set from elements already known to be distinct.
    pub(crate) fn set_of_distinct(items: Vec<Value>) -> Self {
        Value::Set(Heap::new(items))
    }

    pub fn dict(pairs: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Value::Dict(Heap::new(pairs.into_iter().collect()))
    }

    pub fn record(
        name: impl Into<Name>,
        fields: impl IntoIterator<Item = (Name, Value)>,
    ) -> Self {
        Value::Record {
            name: name.into(),
            fields: Heap::new(fields.into_iter().collect()),
        }
    }

    /// An instance of a plain (non-generic) class.
    pub fn instance(class: impl Into<Name>) -> Self {
        Value::Instance {
            class: class.into(),
            generic: None,
        }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// The descriptor a leaf check compares against.
    pub fn nominal(&self) -> Descriptor {
        match self {
            Value::None => Descriptor::NoneType,
            Value::Bool(_) => Descriptor::bool(),
            Value::Int(_) => Descriptor::int(),
            Value::Float(_) => Descriptor::float(),
            Value::Complex { .. } => Descriptor::complex(),
            Value::Str(_) => Descriptor::str(),
            Value::Bytes(_) => Descriptor::bytes(),
            Value::ByteArray(_) => Descriptor::named(well_known::BYTEARRAY),
            Value::Tuple(_) => Descriptor::named(well_known::TUPLE),
            Value::List(_) => Descriptor::named(well_known::LIST),
            Value::Set(_) => Descriptor::named(well_known::SET),
            Value::Dict(_) => Descriptor::named(well_known::DICT),
            Value::Record { name, .. } => Descriptor::Primitive(name.clone()),
            Value::Instance { class, generic } => match generic {
                Some(signature) => signature.descriptor().clone(),
                None => Descriptor::Primitive(class.clone()),
            },
            Value::Function(_) => Descriptor::named(well_known::FUNCTION),
            Value::Type(descriptor) => descriptor.clone(),
        }
    }

    /// How this value is named in failure messages.
    pub fn shape_name(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(_) => well_known::BOOL.to_string(),
            Value::Int(_) => well_known::INT.to_string(),
            Value::Float(_) => well_known::FLOAT.to_string(),
            Value::Complex { .. } => well_known::COMPLEX.to_string(),
            Value::Str(_) => well_known::STR.to_string(),
            Value::Bytes(_) => well_known::BYTES.to_string(),
            Value::ByteArray(_) => well_known::BYTEARRAY.to_string(),
            Value::Tuple(_) => "Tuple".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Set(_) => "Set".to_string(),
            Value::Dict(_) => "Dict".to_string(),
            Value::Record { name, .. } => name.to_string(),
            Value::Instance { class, generic } => match generic {
                Some(signature) => signature.descriptor().to_string(),
                None => class.to_string(),
            },
            Value::Function(_) => well_known::FUNCTION.to_string(),
            Value::Type(descriptor) => descriptor.to_string(),
        }
    }

    /// Value of a record field.
    pub fn field(&self, field: &str) -> Option<&Value> {
        match self {
            Value::Record { fields, .. } => fields
                .iter()
                .find(|(name, _)| name.as_str() == field)
                .map(|(_, value)| value),
            _ => None,
        }
    }
}

impl Value {
    /// Move the elements out of a payload this value owns alone.
    fn release_children(&mut self, pending: &mut Vec<Value>) {
        match self {
            Value::Tuple(items) | Value::List(items) | Value::Set(items) => {
                if let Some(items) = items.get_mut() {
                    pending.append(items);
                }
            }
            Value::Dict(pairs) => {
                if let Some(pairs) = pairs.get_mut() {
                    for (key, value) in pairs.drain(..) {
                        pending.push(key);
                        pending.push(value);
                    }
                }
            }
            Value::Record { fields, .. } => {
                if let Some(fields) = fields.get_mut() {
                    pending.extend(fields.drain(..).map(|(_, value)| value));
                }
            }
            _ => {}
        }
    }
}

/// Nested values are released from an explicit work list, so dropping a
/// deeply nested value never recurses on the native stack.
impl Drop for Value {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.release_children(&mut pending);
        while let Some(mut value) = pending.pop() {
            value.release_children(&mut pending);
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::str(value)
    }
}

impl From<FunctionValue> for Value {
    fn from(value: FunctionValue) -> Self {
        Value::Function(value)
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Complex { re, im } => write!(f, "({re}+{im}j)"),
            Value::Str(s) => write!(f, "'{}'", &**s),
            Value::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
            Value::ByteArray(b) => write!(f, "bytearray(b{:?})", String::from_utf8_lossy(b)),
            Value::Tuple(items) => {
                write!(f, "(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::List(items) => {
                write!(f, "[")?;
                write_items(f, items)?;
                write!(f, "]")
            }
            Value::Set(items) => {
                write!(f, "{{")?;
                write_items(f, items)?;
                write!(f, "}}")
            }
            Value::Dict(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Record { name, fields } => {
                write!(f, "{name}(")?;
                for (i, (field, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}={value}")?;
                }
                write!(f, ")")
            }
            Value::Instance { .. } => write!(f, "<{} object>", self.shape_name()),
            Value::Function(function) => write!(f, "<function {}>", function.name()),
            Value::Type(descriptor) => write!(f, "<type {descriptor}>"),
        }
    }
}
