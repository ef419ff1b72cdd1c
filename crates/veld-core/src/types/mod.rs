mod reflect;

#[cfg(test)]
mod tests;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error as ThisError;

pub use reflect::meta_type;

///
/// TypeError
///
/// Invariant violations in descriptor construction and reflection.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum TypeError {
    #[error("unknown type tag: {0}")]
    UnknownTag(String),

    #[error("recursive depth {depth} exceeds enclosing binders ({binders})")]
    BadDepth { depth: u32, binders: usize },

    #[error("malformed type value: {0}")]
    Malformed(String),
}

///
/// TypeTag
///
/// Stable tag names for the closed descriptor algebra. Error surfaces
/// render tags with a leading dot (`.Function`).
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Serialize, Deserialize)]
pub enum TypeTag {
    Never,
    Null,
    Boolean,
    Integer,
    Float,
    String,
    DateTime,
    Blob,
    Ref,
    Array,
    Set,
    Dict,
    Struct,
    Variant,
    Function,
    AsyncFunction,
    Recursive,
    Rec,
}

///
/// Field
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

///
/// Case
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub tag: String,
    pub ty: Type,
}

///
/// Signature
///
/// Function shape: declared inputs, output, and the platform names the
/// function may be dispatched to. The core never invokes functions; it
/// only carries their shape.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub inputs: Vec<Type>,
    pub output: Box<Type>,
    pub platforms: Vec<String>,
}

///
/// Type
///
/// The closed algebra of type descriptors.
///
/// Recursion is encoded De Bruijn style: `Recursive(body)` introduces a
/// binder and `Rec(k)` inside the body refers to the k-th enclosing
/// binder (1-based, innermost first). Descriptors are therefore finite
/// trees even when the conceptual type is infinite.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Type {
    Never,
    Null,
    Boolean,
    Integer,
    Float,
    String,
    DateTime,
    Blob,
    Ref(Box<Type>),
    Array(Box<Type>),
    Set(Box<Type>),
    Dict(Box<Type>, Box<Type>),
    Struct(Vec<Field>),
    Variant(Vec<Case>),
    Function(Signature),
    AsyncFunction(Signature),
    Recursive(Box<Type>),
    Rec(u32),
}

impl Type {
    ///
    /// CONSTRUCTION
    ///

    #[must_use]
    pub fn reference(value: Self) -> Self {
        Self::Ref(Box::new(value))
    }

    #[must_use]
    pub fn array(element: Self) -> Self {
        Self::Array(Box::new(element))
    }

    #[must_use]
    pub fn set(element: Self) -> Self {
        Self::Set(Box::new(element))
    }

    #[must_use]
    pub fn dict(key: Self, value: Self) -> Self {
        Self::Dict(Box::new(key), Box::new(value))
    }

    /// Build a struct descriptor; field order is significant.
    #[must_use]
    pub fn structure<N: Into<String>>(fields: impl IntoIterator<Item = (N, Self)>) -> Self {
        Self::Struct(
            fields
                .into_iter()
                .map(|(name, ty)| Field {
                    name: name.into(),
                    ty,
                })
                .collect(),
        )
    }

    /// Build a variant descriptor; case order is significant.
    #[must_use]
    pub fn variant<N: Into<String>>(cases: impl IntoIterator<Item = (N, Self)>) -> Self {
        Self::Variant(
            cases
                .into_iter()
                .map(|(tag, ty)| Case {
                    tag: tag.into(),
                    ty,
                })
                .collect(),
        )
    }

    #[must_use]
    pub fn function(inputs: Vec<Self>, output: Self) -> Self {
        Self::Function(Signature {
            inputs,
            output: Box::new(output),
            platforms: Vec::new(),
        })
    }

    #[must_use]
    pub fn async_function(inputs: Vec<Self>, output: Self) -> Self {
        Self::AsyncFunction(Signature {
            inputs,
            output: Box::new(output),
            platforms: Vec::new(),
        })
    }

    #[must_use]
    pub fn recursive(body: Self) -> Self {
        Self::Recursive(Box::new(body))
    }

    #[must_use]
    pub const fn rec(depth: u32) -> Self {
        Self::Rec(depth)
    }

    ///
    /// CLASSIFICATION
    ///

    #[must_use]
    pub const fn tag(&self) -> TypeTag {
        match self {
            Self::Never => TypeTag::Never,
            Self::Null => TypeTag::Null,
            Self::Boolean => TypeTag::Boolean,
            Self::Integer => TypeTag::Integer,
            Self::Float => TypeTag::Float,
            Self::String => TypeTag::String,
            Self::DateTime => TypeTag::DateTime,
            Self::Blob => TypeTag::Blob,
            Self::Ref(_) => TypeTag::Ref,
            Self::Array(_) => TypeTag::Array,
            Self::Set(_) => TypeTag::Set,
            Self::Dict(..) => TypeTag::Dict,
            Self::Struct(_) => TypeTag::Struct,
            Self::Variant(_) => TypeTag::Variant,
            Self::Function(_) => TypeTag::Function,
            Self::AsyncFunction(_) => TypeTag::AsyncFunction,
            Self::Recursive(_) => TypeTag::Recursive,
            Self::Rec(_) => TypeTag::Rec,
        }
    }

    /// Mutable containers carry heap identity; everything else is a value.
    #[must_use]
    pub const fn is_mutable_container(&self) -> bool {
        matches!(
            self,
            Self::Ref(_) | Self::Array(_) | Self::Set(_) | Self::Dict(..)
        )
    }

    /// Whether values of this type may key a Set or Dict: the comparator
    /// must be total and values immutable, so mutable containers and the
    /// opaque/empty types are excluded at any depth.
    #[must_use]
    pub fn valid_key(&self) -> bool {
        match self {
            Self::Never | Self::Function(_) | Self::AsyncFunction(_) => false,
            Self::Ref(_) | Self::Array(_) | Self::Set(_) | Self::Dict(..) => false,
            Self::Null
            | Self::Boolean
            | Self::Integer
            | Self::Float
            | Self::String
            | Self::DateTime
            | Self::Blob
            | Self::Rec(_) => true,
            Self::Struct(fields) => fields.iter().all(|f| f.ty.valid_key()),
            Self::Variant(cases) => cases.iter().all(|c| c.ty.valid_key()),
            Self::Recursive(body) => body.valid_key(),
        }
    }

    /// Whether the descriptor mentions a tag anywhere (recursive bodies
    /// included). Used by codec creation checks.
    #[must_use]
    pub fn mentions(&self, tag: TypeTag) -> bool {
        if self.tag() == tag {
            return true;
        }
        match self {
            Self::Ref(inner)
            | Self::Array(inner)
            | Self::Set(inner)
            | Self::Recursive(inner) => inner.mentions(tag),
            Self::Dict(key, value) => key.mentions(tag) || value.mentions(tag),
            Self::Struct(fields) => fields.iter().any(|f| f.ty.mentions(tag)),
            Self::Variant(cases) => cases.iter().any(|c| c.ty.mentions(tag)),
            Self::Function(sig) | Self::AsyncFunction(sig) => {
                sig.inputs.iter().any(|t| t.mentions(tag)) || sig.output.mentions(tag)
            }
            _ => false,
        }
    }

    /// One-step unrolling of a recursive binder: substitutes the binder
    /// itself for its depth-1 back-edges. `None` for non-recursive
    /// descriptors.
    #[must_use]
    pub fn unroll(&self) -> Option<Self> {
        match self {
            Self::Recursive(body) => {
                let body = body.as_ref();
                Some(close(body, &[body]))
            }
            _ => None,
        }
    }

    /// Validate that every `Rec` back-edge stays within its enclosing
    /// binders. Depth errors here surface before any engine compiles the
    /// descriptor.
    pub fn check_depths(&self) -> Result<(), TypeError> {
        fn walk(ty: &Type, binders: usize) -> Result<(), TypeError> {
            match ty {
                Type::Rec(depth) => {
                    if *depth == 0 || *depth as usize > binders {
                        return Err(TypeError::BadDepth {
                            depth: *depth,
                            binders,
                        });
                    }
                    Ok(())
                }
                Type::Recursive(body) => walk(body, binders + 1),
                Type::Ref(inner) | Type::Array(inner) | Type::Set(inner) => walk(inner, binders),
                Type::Dict(key, value) => {
                    walk(key, binders)?;
                    walk(value, binders)
                }
                Type::Struct(fields) => fields.iter().try_for_each(|f| walk(&f.ty, binders)),
                Type::Variant(cases) => cases.iter().try_for_each(|c| walk(&c.ty, binders)),
                Type::Function(sig) | Type::AsyncFunction(sig) => {
                    sig.inputs.iter().try_for_each(|t| walk(t, binders))?;
                    walk(&sig.output, binders)
                }
                _ => Ok(()),
            }
        }
        walk(self, 0)
    }
}

// Rewrite a descriptor fragment into a self-contained one by inlining
// enclosing binders that `Rec` back-edges escape into. Codecs use this to
// compile standalone key comparators for Set/Dict elements that sit
// inside recursive descriptors.
pub(crate) fn close(ty: &Type, env: &[&Type]) -> Type {
    close_at(ty, env, 0)
}

fn close_at(ty: &Type, env: &[&Type], depth: usize) -> Type {
    match ty {
        Type::Rec(k) => {
            let k_abs = *k as usize;
            if k_abs <= depth {
                ty.clone()
            } else {
                let Some(at) = env.len().checked_sub(k_abs - depth) else {
                    // out-of-range back-edge; left for depth validation
                    return ty.clone();
                };
                Type::Recursive(Box::new(close_at(env[at], &env[..at], 1)))
            }
        }
        Type::Recursive(body) => Type::Recursive(Box::new(close_at(body, env, depth + 1))),
        Type::Ref(inner) => Type::Ref(Box::new(close_at(inner, env, depth))),
        Type::Array(inner) => Type::Array(Box::new(close_at(inner, env, depth))),
        Type::Set(inner) => Type::Set(Box::new(close_at(inner, env, depth))),
        Type::Dict(key, value) => Type::Dict(
            Box::new(close_at(key, env, depth)),
            Box::new(close_at(value, env, depth)),
        ),
        Type::Struct(fields) => Type::Struct(
            fields
                .iter()
                .map(|f| Field {
                    name: f.name.clone(),
                    ty: close_at(&f.ty, env, depth),
                })
                .collect(),
        ),
        Type::Variant(cases) => Type::Variant(
            cases
                .iter()
                .map(|c| Case {
                    tag: c.tag.clone(),
                    ty: close_at(&c.ty, env, depth),
                })
                .collect(),
        ),
        Type::Function(sig) => Type::Function(close_signature(sig, env, depth)),
        Type::AsyncFunction(sig) => Type::AsyncFunction(close_signature(sig, env, depth)),
        other => other.clone(),
    }
}

fn close_signature(sig: &Signature, env: &[&Type], depth: usize) -> Signature {
    Signature {
        inputs: sig
            .inputs
            .iter()
            .map(|t| close_at(t, env, depth))
            .collect(),
        output: Box::new(close_at(&sig.output, env, depth)),
        platforms: sig.platforms.clone(),
    }
}

// Chase Recursive binders and Rec back-edges to the underlying
// constructor, returning it with its binder environment. Degenerate
// knots (a binder whose body is immediately a back-edge) hit the
// iteration cap and return None.
pub(crate) fn unfold<'t>(ty: &'t Type, env: &[&'t Type]) -> Option<(&'t Type, Vec<&'t Type>)> {
    const FUEL: usize = 1_000;

    let mut env: Vec<&'t Type> = env.to_vec();
    let mut ty = ty;
    for _ in 0..FUEL {
        match ty {
            Type::Recursive(body) => {
                env.push(body);
                ty = body;
            }
            Type::Rec(depth) => {
                let at = env.len().checked_sub(*depth as usize)?;
                ty = env[at];
                env.truncate(at + 1);
            }
            _ => return Some((ty, env)),
        }
    }
    None
}

/// Structural subtyping.
///
/// `Never` is the bottom type. Variants widen by case subset, structs are
/// field-wise covariant over an identical field list, containers are
/// element covariant, and functions are contravariant in inputs and
/// covariant in output. Recursive binders relate body-wise; back-edges
/// relate only at equal depth.
#[must_use]
pub fn is_subtype(sub: &Type, sup: &Type) -> bool {
    if sub == sup {
        return true;
    }
    match (sub, sup) {
        (Type::Never, _) => true,
        (Type::Ref(a), Type::Ref(b))
        | (Type::Array(a), Type::Array(b))
        | (Type::Set(a), Type::Set(b))
        | (Type::Recursive(a), Type::Recursive(b)) => is_subtype(a, b),
        (Type::Dict(ka, va), Type::Dict(kb, vb)) => is_subtype(ka, kb) && is_subtype(va, vb),
        (Type::Struct(a), Type::Struct(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(fa, fb)| fa.name == fb.name && is_subtype(&fa.ty, &fb.ty))
        }
        (Type::Variant(a), Type::Variant(b)) => a.iter().all(|ca| {
            b.iter()
                .any(|cb| ca.tag == cb.tag && is_subtype(&ca.ty, &cb.ty))
        }),
        (Type::Function(a), Type::Function(b))
        | (Type::AsyncFunction(a), Type::AsyncFunction(b)) => {
            a.inputs.len() == b.inputs.len()
                && a.inputs
                    .iter()
                    .zip(b.inputs.iter())
                    .all(|(ia, ib)| is_subtype(ib, ia))
                && is_subtype(&a.output, &b.output)
        }
        _ => false,
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never
            | Self::Null
            | Self::Boolean
            | Self::Integer
            | Self::Float
            | Self::String
            | Self::DateTime
            | Self::Blob => write!(f, "{}", self.tag()),
            Self::Ref(inner) => write!(f, "Ref<{inner}>"),
            Self::Array(inner) => write!(f, "Array<{inner}>"),
            Self::Set(inner) => write!(f, "Set<{inner}>"),
            Self::Dict(key, value) => write!(f, "Dict<{key}, {value}>"),
            Self::Struct(fields) => {
                write!(f, "Struct(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.ty)?;
                }
                write!(f, ")")
            }
            Self::Variant(cases) => {
                write!(f, "Variant(")?;
                for (i, case) in cases.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}: {}", case.tag, case.ty)?;
                }
                write!(f, ")")
            }
            Self::Function(sig) => write!(f, "Function{sig}"),
            Self::AsyncFunction(sig) => write!(f, "AsyncFunction{sig}"),
            Self::Recursive(body) => write!(f, "Recursive({body})"),
            Self::Rec(depth) => write!(f, "Rec({depth})"),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, input) in self.inputs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{input}")?;
        }
        write!(f, ") -> {}", self.output)
    }
}
