mod key;


use crate::{
    types::{Type, TypeTag},
    value::{HeapId, Value},
};
use rustc_hash::FxHashSet;
use std::{cell::RefCell, cmp::Ordering, rc::Rc};
use thiserror::Error as ThisError;

pub use key::key_comparator;

///
/// CompareError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CompareError {
    #[error("attempted to compare values of .{0}")]
    Uncomparable(TypeTag),

    #[error("unknown type {0}")]
    UnknownType(String),

    #[error("invalid Set/Dict key type: {0}")]
    InvalidKey(String),

    #[error("value does not match compared type: expected {expected}")]
    Mismatch { expected: TypeTag },
}

const fn mismatch(expected: TypeTag) -> CompareError {
    CompareError::Mismatch { expected }
}

/// Total order over floats: NaN is the single greatest element and
/// `-0.0 < 0.0`; everything else follows numeric order.
#[must_use]
pub(crate) fn float_cmp(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            if a < b {
                Ordering::Less
            } else if a > b {
                Ordering::Greater
            } else {
                // equal numerically; split ±0 by sign bit
                match (a.is_sign_negative(), b.is_sign_negative()) {
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    _ => Ordering::Equal,
                }
            }
        }
    }
}

/// NaN-reflexive, ±0-distinguishing float identity.
#[must_use]
pub(crate) fn float_is(a: f64, b: f64) -> bool {
    if a.is_nan() {
        return b.is_nan();
    }
    a.to_bits() == b.to_bits()
}

// Per-invocation cycle state: identity pairs already entered. Re-entering
// a pair short-circuits as equal, which is exactly bisimulation read as a
// greatest fixed point.
type Visited = FxHashSet<(HeapId, HeapId)>;

type IsRc = Rc<dyn Fn(&Value, &Value) -> Result<bool, CompareError>>;
type CmpRc = Rc<dyn Fn(&Value, &Value, &mut Visited) -> Result<Ordering, CompareError>>;

#[derive(Clone)]
struct Compiled {
    is: IsRc,
    cmp: CmpRc,
}

// In-progress comparator slots, one per enclosing Recursive binder. A
// back-edge reads its slot lazily at call time; by then the binder has
// finished compiling and filled it.
type RecSlot = Rc<RefCell<Option<Compiled>>>;

///
/// Compare
///
/// One descriptor compiled into its full operator family. Compilation
/// walks the descriptor once; every call after that dispatches through
/// the prebuilt closure tree.
///
/// `is` is identity-equality: mutable containers compare by heap
/// identity, immutable composites recurse structurally. `equal` and
/// `compare` are deep and structural regardless of identity, with
/// per-invocation cycle tracking so cyclic graphs terminate.
///

pub struct Compare {
    compiled: Compiled,
}

impl std::fmt::Debug for Compare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compare").finish_non_exhaustive()
    }
}

impl Compare {
    pub fn new(ty: &Type) -> Result<Self, CompareError> {
        ty.check_depths()
            .map_err(|e| CompareError::UnknownType(e.to_string()))?;
        let mut stack = Vec::new();
        let compiled = compile(ty, &mut stack)?;
        Ok(Self { compiled })
    }

    /// Identity-equality.
    pub fn is(&self, a: &Value, b: &Value) -> Result<bool, CompareError> {
        (self.compiled.is)(a, b)
    }

    /// Deep structural equality.
    pub fn equal(&self, a: &Value, b: &Value) -> Result<bool, CompareError> {
        Ok(self.compare(a, b)? == Ordering::Equal)
    }

    pub fn not_equal(&self, a: &Value, b: &Value) -> Result<bool, CompareError> {
        Ok(!self.equal(a, b)?)
    }

    /// Total order.
    pub fn compare(&self, a: &Value, b: &Value) -> Result<Ordering, CompareError> {
        let mut visited = Visited::default();
        (self.compiled.cmp)(a, b, &mut visited)
    }

    pub fn less(&self, a: &Value, b: &Value) -> Result<bool, CompareError> {
        Ok(self.compare(a, b)? == Ordering::Less)
    }

    pub fn less_equal(&self, a: &Value, b: &Value) -> Result<bool, CompareError> {
        Ok(self.compare(a, b)? != Ordering::Greater)
    }

    pub fn greater(&self, a: &Value, b: &Value) -> Result<bool, CompareError> {
        Ok(self.compare(a, b)? == Ordering::Greater)
    }

    pub fn greater_equal(&self, a: &Value, b: &Value) -> Result<bool, CompareError> {
        Ok(self.compare(a, b)? != Ordering::Less)
    }

    /// The lesser operand (the first on ties).
    pub fn min(&self, a: &Value, b: &Value) -> Result<Value, CompareError> {
        Ok(if self.compare(a, b)? == Ordering::Greater {
            b.clone()
        } else {
            a.clone()
        })
    }

    /// The greater operand (the first on ties).
    pub fn max(&self, a: &Value, b: &Value) -> Result<Value, CompareError> {
        Ok(if self.compare(a, b)? == Ordering::Less {
            b.clone()
        } else {
            a.clone()
        })
    }

    /// `x` clamped into `[lo, hi]`.
    pub fn clamp(&self, x: &Value, lo: &Value, hi: &Value) -> Result<Value, CompareError> {
        if self.compare(x, lo)? == Ordering::Less {
            return Ok(lo.clone());
        }
        if self.compare(x, hi)? == Ordering::Greater {
            return Ok(hi.clone());
        }
        Ok(x.clone())
    }
}

fn compile(ty: &Type, stack: &mut Vec<RecSlot>) -> Result<Compiled, CompareError> {
    match ty {
        Type::Never => Ok(uncomparable(TypeTag::Never)),
        Type::Function(_) => Ok(uncomparable(TypeTag::Function)),
        Type::AsyncFunction(_) => Ok(uncomparable(TypeTag::AsyncFunction)),

        Type::Null => Ok(Compiled {
            is: Rc::new(|a, b| match (a, b) {
                (Value::Null, Value::Null) => Ok(true),
                _ => Err(mismatch(TypeTag::Null)),
            }),
            cmp: Rc::new(|a, b, _| match (a, b) {
                (Value::Null, Value::Null) => Ok(Ordering::Equal),
                _ => Err(mismatch(TypeTag::Null)),
            }),
        }),

        Type::Boolean => Ok(scalar(TypeTag::Boolean, |a, b| match (a, b) {
            (Value::Boolean(x), Value::Boolean(y)) => Some(x.cmp(y)),
            _ => None,
        })),

        Type::Integer => Ok(scalar(TypeTag::Integer, |a, b| match (a, b) {
            (Value::Integer(x), Value::Integer(y)) => Some(x.cmp(y)),
            _ => None,
        })),

        Type::String => Ok(scalar(TypeTag::String, |a, b| match (a, b) {
            (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
            _ => None,
        })),

        Type::DateTime => Ok(scalar(TypeTag::DateTime, |a, b| match (a, b) {
            (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
            _ => None,
        })),

        Type::Blob => Ok(scalar(TypeTag::Blob, |a, b| match (a, b) {
            (Value::Blob(x), Value::Blob(y)) => Some(x.cmp(y)),
            _ => None,
        })),

        Type::Float => Ok(Compiled {
            is: Rc::new(|a, b| match (a, b) {
                (Value::Float(x), Value::Float(y)) => Ok(float_is(*x, *y)),
                _ => Err(mismatch(TypeTag::Float)),
            }),
            cmp: Rc::new(|a, b, _| match (a, b) {
                (Value::Float(x), Value::Float(y)) => Ok(float_cmp(*x, *y)),
                _ => Err(mismatch(TypeTag::Float)),
            }),
        }),

        Type::Ref(inner) => {
            let inner = compile(inner, stack)?;
            let inner_cmp = inner.cmp;
            Ok(Compiled {
                is: Rc::new(|a, b| match (a, b) {
                    (Value::Ref(x), Value::Ref(y)) => Ok(x.ptr_eq(y)),
                    _ => Err(mismatch(TypeTag::Ref)),
                }),
                cmp: Rc::new(move |a, b, visited| match (a, b) {
                    (Value::Ref(x), Value::Ref(y)) => {
                        if x.ptr_eq(y) || !visited.insert((x.id(), y.id())) {
                            return Ok(Ordering::Equal);
                        }
                        inner_cmp(&x.borrow(), &y.borrow(), visited)
                    }
                    _ => Err(mismatch(TypeTag::Ref)),
                }),
            })
        }

        Type::Array(element) => {
            let element = compile(element, stack)?;
            let element_cmp = element.cmp;
            Ok(Compiled {
                is: Rc::new(|a, b| match (a, b) {
                    (Value::Array(x), Value::Array(y)) => Ok(x.ptr_eq(y)),
                    _ => Err(mismatch(TypeTag::Array)),
                }),
                cmp: Rc::new(move |a, b, visited| match (a, b) {
                    (Value::Array(x), Value::Array(y)) => {
                        if x.ptr_eq(y) || !visited.insert((x.id(), y.id())) {
                            return Ok(Ordering::Equal);
                        }
                        let xs = x.borrow();
                        let ys = y.borrow();
                        for (xe, ye) in xs.iter().zip(ys.iter()) {
                            let step = element_cmp(xe, ye, visited)?;
                            if step != Ordering::Equal {
                                return Ok(step);
                            }
                        }
                        Ok(xs.len().cmp(&ys.len()))
                    }
                    _ => Err(mismatch(TypeTag::Array)),
                }),
            })
        }

        Type::Set(element) => {
            if !element.valid_key() {
                return Err(CompareError::InvalidKey(element.to_string()));
            }
            let element = compile(element, stack)?;
            let element_cmp = element.cmp;
            Ok(Compiled {
                is: Rc::new(|a, b| match (a, b) {
                    (Value::Set(x), Value::Set(y)) => Ok(x.ptr_eq(y)),
                    _ => Err(mismatch(TypeTag::Set)),
                }),
                cmp: Rc::new(move |a, b, visited| match (a, b) {
                    (Value::Set(x), Value::Set(y)) => {
                        if x.ptr_eq(y) || !visited.insert((x.id(), y.id())) {
                            return Ok(Ordering::Equal);
                        }
                        let xs = x.borrow();
                        let ys = y.borrow();
                        for (xe, ye) in xs.iter().zip(ys.iter()) {
                            let step = element_cmp(xe, ye, visited)?;
                            if step != Ordering::Equal {
                                return Ok(step);
                            }
                        }
                        Ok(xs.len().cmp(&ys.len()))
                    }
                    _ => Err(mismatch(TypeTag::Set)),
                }),
            })
        }

        Type::Dict(key, value) => {
            if !key.valid_key() {
                return Err(CompareError::InvalidKey(key.to_string()));
            }
            let key = compile(key, stack)?;
            let value = compile(value, stack)?;
            let key_cmp = key.cmp;
            let value_cmp = value.cmp;
            Ok(Compiled {
                is: Rc::new(|a, b| match (a, b) {
                    (Value::Dict(x), Value::Dict(y)) => Ok(x.ptr_eq(y)),
                    _ => Err(mismatch(TypeTag::Dict)),
                }),
                cmp: Rc::new(move |a, b, visited| match (a, b) {
                    (Value::Dict(x), Value::Dict(y)) => {
                        if x.ptr_eq(y) || !visited.insert((x.id(), y.id())) {
                            return Ok(Ordering::Equal);
                        }
                        let xs = x.borrow();
                        let ys = y.borrow();
                        for ((xk, xv), (yk, yv)) in xs.iter().zip(ys.iter()) {
                            let step = key_cmp(xk, yk, visited)?;
                            if step != Ordering::Equal {
                                return Ok(step);
                            }
                            let step = value_cmp(xv, yv, visited)?;
                            if step != Ordering::Equal {
                                return Ok(step);
                            }
                        }
                        Ok(xs.len().cmp(&ys.len()))
                    }
                    _ => Err(mismatch(TypeTag::Dict)),
                }),
            })
        }

        Type::Struct(fields) => {
            let compiled: Vec<Compiled> = fields
                .iter()
                .map(|f| compile(&f.ty, stack))
                .collect::<Result<_, _>>()?;
            let arity = compiled.len();

            let field_is: Vec<IsRc> = compiled.iter().map(|c| c.is.clone()).collect();
            let field_cmp: Vec<CmpRc> = compiled.iter().map(|c| c.cmp.clone()).collect();

            Ok(Compiled {
                is: Rc::new(move |a, b| match (a, b) {
                    (Value::Struct(xs), Value::Struct(ys))
                        if xs.len() == arity && ys.len() == arity =>
                    {
                        for (i, is_field) in field_is.iter().enumerate() {
                            if !is_field(&xs[i].1, &ys[i].1)? {
                                return Ok(false);
                            }
                        }
                        Ok(true)
                    }
                    _ => Err(mismatch(TypeTag::Struct)),
                }),
                cmp: Rc::new(move |a, b, visited| match (a, b) {
                    (Value::Struct(xs), Value::Struct(ys))
                        if xs.len() == arity && ys.len() == arity =>
                    {
                        for (i, cmp_field) in field_cmp.iter().enumerate() {
                            let step = cmp_field(&xs[i].1, &ys[i].1, visited)?;
                            if step != Ordering::Equal {
                                return Ok(step);
                            }
                        }
                        Ok(Ordering::Equal)
                    }
                    _ => Err(mismatch(TypeTag::Struct)),
                }),
            })
        }

        Type::Variant(cases) => {
            let compiled: Vec<(String, Compiled)> = cases
                .iter()
                .map(|c| Ok((c.tag.clone(), compile(&c.ty, stack)?)))
                .collect::<Result<_, CompareError>>()?;
            let by_tag = Rc::new(compiled);

            let is_cases = by_tag.clone();
            let cmp_cases = by_tag;

            Ok(Compiled {
                is: Rc::new(move |a, b| match (a, b) {
                    (Value::Variant(xt, xp), Value::Variant(yt, yp)) => {
                        if xt != yt {
                            return Ok(false);
                        }
                        let Some((_, case)) = is_cases.iter().find(|(tag, _)| tag == xt) else {
                            return Err(mismatch(TypeTag::Variant));
                        };
                        (case.is)(xp, yp)
                    }
                    _ => Err(mismatch(TypeTag::Variant)),
                }),
                cmp: Rc::new(move |a, b, visited| match (a, b) {
                    (Value::Variant(xt, xp), Value::Variant(yt, yp)) => {
                        // Tag names tie-break lexicographically.
                        let step = xt.cmp(yt);
                        if step != Ordering::Equal {
                            return Ok(step);
                        }
                        let Some((_, case)) = cmp_cases.iter().find(|(tag, _)| tag == xt) else {
                            return Err(mismatch(TypeTag::Variant));
                        };
                        (case.cmp)(xp, yp, visited)
                    }
                    _ => Err(mismatch(TypeTag::Variant)),
                }),
            })
        }

        Type::Recursive(body) => {
            let slot: RecSlot = Rc::new(RefCell::new(None));
            stack.push(slot.clone());
            let compiled = compile(body, stack);
            stack.pop();
            let compiled = compiled?;
            *slot.borrow_mut() = Some(compiled.clone());
            Ok(compiled)
        }

        Type::Rec(depth) => {
            let Some(at) = stack.len().checked_sub(*depth as usize) else {
                return Err(CompareError::UnknownType(format!("Rec({depth})")));
            };
            let slot = stack[at].clone();
            let is_slot = slot.clone();
            let cmp_slot = slot;
            Ok(Compiled {
                is: Rc::new(move |a, b| match &*is_slot.borrow() {
                    Some(compiled) => (compiled.is)(a, b),
                    None => Err(CompareError::UnknownType("unresolved recursive binder".into())),
                }),
                cmp: Rc::new(move |a, b, visited| {
                    let compiled = cmp_slot.borrow().clone();
                    match compiled {
                        Some(compiled) => (compiled.cmp)(a, b, visited),
                        None => {
                            Err(CompareError::UnknownType("unresolved recursive binder".into()))
                        }
                    }
                }),
            })
        }
    }
}

fn uncomparable(tag: TypeTag) -> Compiled {
    let is_tag = tag;
    let cmp_tag = tag;
    Compiled {
        is: Rc::new(move |_, _| Err(CompareError::Uncomparable(is_tag))),
        cmp: Rc::new(move |_, _, _| Err(CompareError::Uncomparable(cmp_tag))),
    }
}

// Scalar shapes share one ordering for both identity and order.
fn scalar(
    tag: TypeTag,
    order: impl Fn(&Value, &Value) -> Option<Ordering> + 'static,
) -> Compiled {
    let order = Rc::new(order);
    let is_order = order.clone();
    Compiled {
        is: Rc::new(move |a, b| {
            is_order(a, b)
                .map(|o| o == Ordering::Equal)
                .ok_or(mismatch(tag))
        }),
        cmp: Rc::new(move |a, b, _| order(a, b).ok_or(mismatch(tag))),
    }
}
