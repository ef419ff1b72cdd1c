mod datetime;
mod shared;
pub(crate) mod tag;

#[cfg(test)]
mod tests;

use crate::{
    collection::{OrdMap, OrdSet},
    types::Type,
};
use rustc_hash::FxHashSet;
use std::{fmt, rc::Rc};

pub use datetime::{DateTime, DateTimeError};
pub use shared::{HeapId, Shared};

///
/// Callable
///
/// Opaque function handle. The core never invokes callables; it only
/// needs their identity and a label for diagnostics.
///

#[derive(Clone)]
pub struct Callable {
    cell: Rc<()>,
    label: Option<String>,
}

impl Callable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cell: Rc::new(()),
            label: None,
        }
    }

    #[must_use]
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            cell: Rc::new(()),
            label: Some(label.into()),
        }
    }

    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl Default for Callable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "Callable({label})"),
            None => write!(f, "Callable"),
        }
    }
}

///
/// Value
///
/// The runtime tagged union. Ref/Array/Set/Dict are mutable containers
/// with heap identity (cloning a Value shares their cells); everything
/// else is an immutable value. Structural semantics — equality, order,
/// printing, encoding — are type-directed and live in `compare`, `text`,
/// `json`, and `binary`, never on `Value` itself.
///

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    DateTime(DateTime),
    Blob(Vec<u8>),
    Ref(Shared<Value>),
    Array(Shared<Vec<Value>>),
    Set(Shared<OrdSet>),
    Dict(Shared<OrdMap>),
    Struct(Vec<(String, Value)>),
    Variant(String, Box<Value>),
    Function(Callable),
}

impl Value {
    ///
    /// CONSTRUCTION
    ///

    /// Build a fresh array cell.
    #[must_use]
    pub fn array(elements: Vec<Self>) -> Self {
        Self::Array(Shared::new(elements))
    }

    /// Build a fresh ref cell.
    #[must_use]
    pub fn reference(inner: Self) -> Self {
        Self::Ref(Shared::new(inner))
    }

    /// Build a fresh set cell.
    #[must_use]
    pub fn set(set: OrdSet) -> Self {
        Self::Set(Shared::new(set))
    }

    /// Build a fresh dict cell.
    #[must_use]
    pub fn dict(map: OrdMap) -> Self {
        Self::Dict(Shared::new(map))
    }

    /// Build a struct value; field order is significant.
    #[must_use]
    pub fn structure<N: Into<String>>(fields: impl IntoIterator<Item = (N, Self)>) -> Self {
        Self::Struct(
            fields
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }

    /// Build a variant value.
    #[must_use]
    pub fn variant(tag: impl Into<String>, payload: Self) -> Self {
        Self::Variant(tag.into(), Box::new(payload))
    }

    ///
    /// ACCESS
    ///

    #[must_use]
    pub const fn as_boolean(&self) -> Option<bool> {
        if let Self::Boolean(b) = self { Some(*b) } else { None }
    }

    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        if let Self::Integer(i) = self { Some(*i) } else { None }
    }

    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        if let Self::Float(f) = self { Some(*f) } else { None }
    }

    #[must_use]
    pub const fn as_str(&self) -> Option<&str> {
        if let Self::String(s) = self {
            Some(s.as_str())
        } else {
            None
        }
    }

    #[must_use]
    pub const fn as_datetime(&self) -> Option<DateTime> {
        if let Self::DateTime(dt) = self { Some(*dt) } else { None }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let Self::Blob(bytes) = self {
            Some(bytes.as_slice())
        } else {
            None
        }
    }

    #[must_use]
    pub const fn as_ref_cell(&self) -> Option<&Shared<Self>> {
        if let Self::Ref(cell) = self { Some(cell) } else { None }
    }

    #[must_use]
    pub const fn as_array(&self) -> Option<&Shared<Vec<Self>>> {
        if let Self::Array(cell) = self { Some(cell) } else { None }
    }

    #[must_use]
    pub const fn as_set(&self) -> Option<&Shared<OrdSet>> {
        if let Self::Set(cell) = self { Some(cell) } else { None }
    }

    #[must_use]
    pub const fn as_dict(&self) -> Option<&Shared<OrdMap>> {
        if let Self::Dict(cell) = self { Some(cell) } else { None }
    }

    #[must_use]
    pub fn as_struct(&self) -> Option<&[(String, Self)]> {
        if let Self::Struct(fields) = self {
            Some(fields.as_slice())
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_variant(&self) -> Option<(&str, &Self)> {
        if let Self::Variant(tag, payload) = self {
            Some((tag.as_str(), payload))
        } else {
            None
        }
    }

    /// Heap identity when the value is a mutable container.
    #[must_use]
    pub fn heap_id(&self) -> Option<HeapId> {
        match self {
            Self::Ref(cell) => Some(cell.id()),
            Self::Array(cell) => Some(cell.id()),
            Self::Set(cell) => Some(cell.id()),
            Self::Dict(cell) => Some(cell.id()),
            _ => None,
        }
    }

    ///
    /// CONFORMANCE
    ///

    /// Structural conformance against a descriptor. Terminates on cyclic
    /// heaps by memoizing visited (container, descriptor-node) pairs.
    #[must_use]
    pub fn type_check(&self, ty: &Type) -> bool {
        let mut seen = FxHashSet::default();
        check(self, ty, &[], &mut seen)
    }
}

fn check<'t>(
    value: &Value,
    ty: &'t Type,
    env: &[&'t Type],
    seen: &mut FxHashSet<(HeapId, usize)>,
) -> bool {
    if let Some(id) = value.heap_id() {
        if !seen.insert((id, std::ptr::from_ref(ty) as usize)) {
            return true;
        }
    }

    match ty {
        Type::Never => false,
        Type::Null => matches!(value, Value::Null),
        Type::Boolean => matches!(value, Value::Boolean(_)),
        Type::Integer => matches!(value, Value::Integer(_)),
        Type::Float => matches!(value, Value::Float(_)),
        Type::String => matches!(value, Value::String(_)),
        Type::DateTime => matches!(value, Value::DateTime(_)),
        Type::Blob => matches!(value, Value::Blob(_)),
        Type::Ref(inner) => match value {
            Value::Ref(cell) => check(&cell.borrow(), inner, env, seen),
            _ => false,
        },
        Type::Array(element) => match value {
            Value::Array(cell) => cell.borrow().iter().all(|v| check(v, element, env, seen)),
            _ => false,
        },
        Type::Set(element) => match value {
            Value::Set(cell) => cell.borrow().iter().all(|v| check(v, element, env, seen)),
            _ => false,
        },
        Type::Dict(key, val) => match value {
            Value::Dict(cell) => cell
                .borrow()
                .iter()
                .all(|(k, v)| check(k, key, env, seen) && check(v, val, env, seen)),
            _ => false,
        },
        Type::Struct(fields) => match value {
            Value::Struct(entries) => {
                entries.len() == fields.len()
                    && entries.iter().zip(fields.iter()).all(|((name, v), field)| {
                        *name == field.name && check(v, &field.ty, env, seen)
                    })
            }
            _ => false,
        },
        Type::Variant(cases) => match value {
            Value::Variant(tag, payload) => cases
                .iter()
                .find(|case| case.tag == *tag)
                .is_some_and(|case| check(payload, &case.ty, env, seen)),
            _ => false,
        },
        Type::Function(_) | Type::AsyncFunction(_) => matches!(value, Value::Function(_)),
        Type::Recursive(body) => {
            let mut inner_env = env.to_vec();
            inner_env.push(body);
            check(value, body, &inner_env, seen)
        }
        Type::Rec(depth) => {
            let Some(idx) = env.len().checked_sub(*depth as usize) else {
                return false;
            };
            let body = env[idx];
            check(value, body, &env[..=idx], seen)
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<DateTime> for Value {
    fn from(v: DateTime) -> Self {
        Self::DateTime(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

// NOTE:
// Display is a shallow diagnostic rendering. Mutable containers print a
// size summary so Display terminates on cyclic heaps; the codec surface
// form lives in `text::print`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::DateTime(dt) => write!(f, "{dt}"),
            Self::Blob(bytes) => write!(f, "[blob ({} bytes)]", bytes.len()),
            Self::Ref(_) => write!(f, "[ref]"),
            Self::Array(cell) => write!(f, "[array ({} items)]", cell.borrow().len()),
            Self::Set(cell) => write!(f, "[set ({} items)]", cell.borrow().len()),
            Self::Dict(cell) => write!(f, "[dict ({} entries)]", cell.borrow().len()),
            Self::Struct(fields) => {
                write!(f, "(")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}={value}")?;
                }
                write!(f, ")")
            }
            Self::Variant(tag, payload) => match payload.as_ref() {
                Self::Null => write!(f, ".{tag}"),
                payload => write!(f, ".{tag} {payload}"),
            },
            Self::Function(_) => write!(f, "λ"),
        }
    }
}
