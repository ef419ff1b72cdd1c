use crate::value::Value;

///
/// Canonical Value Tag
///
/// Stable, 1-based variant tag behind the cross-shape ordering
/// fallback. Tag order is part of deterministic comparator behavior and
/// must remain fixed.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub(crate) enum ValueTag {
    Null = 1,
    Boolean,
    Integer,
    Float,
    DateTime,
    String,
    Blob,
    Ref,
    Array,
    Set,
    Dict,
    Struct,
    Variant,
    Function,
}

impl ValueTag {
    pub(crate) const fn to_u8(self) -> u8 {
        self as u8
    }
}

#[must_use]
pub(crate) const fn canonical_tag(value: &Value) -> ValueTag {
    match value {
        Value::Null => ValueTag::Null,
        Value::Boolean(_) => ValueTag::Boolean,
        Value::Integer(_) => ValueTag::Integer,
        Value::Float(_) => ValueTag::Float,
        Value::DateTime(_) => ValueTag::DateTime,
        Value::String(_) => ValueTag::String,
        Value::Blob(_) => ValueTag::Blob,
        Value::Ref(_) => ValueTag::Ref,
        Value::Array(_) => ValueTag::Array,
        Value::Set(_) => ValueTag::Set,
        Value::Dict(_) => ValueTag::Dict,
        Value::Struct(_) => ValueTag::Struct,
        Value::Variant(..) => ValueTag::Variant,
        Value::Function(_) => ValueTag::Function,
    }
}

/// Stable canonical rank used by the cross-shape ordering fallback.
// Tags are 1-based for wire stability; rank is 0-based.
#[must_use]
pub(crate) const fn canonical_rank(value: &Value) -> u8 {
    canonical_tag(value).to_u8() - 1
}
