use crate::{
    collection::KeyCmp,
    compare::{CompareError, float_cmp},
    types::Type,
    value::{Value, tag},
};
use std::{cell::RefCell, cmp::Ordering, rc::Rc};

///
/// Key comparators
///
/// Set/Dict storage needs a total, infallible ordering over key values.
/// Key types are the immutable subset of the algebra (validated up
/// front), so the compiled closure can never fail at runtime: shapes
/// that do not match the descriptor fall back to the canonical tag rank,
/// which keeps the order total and deterministic.
///

pub fn key_comparator(ty: &Type) -> Result<KeyCmp, CompareError> {
    if !ty.valid_key() {
        return Err(CompareError::InvalidKey(ty.to_string()));
    }
    ty.check_depths()
        .map_err(|e| CompareError::UnknownType(e.to_string()))?;
    let mut stack = Vec::new();
    compile(ty, &mut stack)
}

fn rank_order(a: &Value, b: &Value) -> Ordering {
    tag::canonical_rank(a).cmp(&tag::canonical_rank(b))
}

type KeySlot = Rc<RefCell<Option<KeyCmp>>>;

fn compile(ty: &Type, stack: &mut Vec<KeySlot>) -> Result<KeyCmp, CompareError> {
    match ty {
        Type::Null => Ok(Rc::new(|a, b| match (a, b) {
            (Value::Null, Value::Null) => Ordering::Equal,
            _ => rank_order(a, b),
        })),

        Type::Boolean => Ok(Rc::new(|a, b| match (a, b) {
            (Value::Boolean(x), Value::Boolean(y)) => x.cmp(y),
            _ => rank_order(a, b),
        })),

        Type::Integer => Ok(Rc::new(|a, b| match (a, b) {
            (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
            _ => rank_order(a, b),
        })),

        Type::Float => Ok(Rc::new(|a, b| match (a, b) {
            (Value::Float(x), Value::Float(y)) => float_cmp(*x, *y),
            _ => rank_order(a, b),
        })),

        Type::String => Ok(Rc::new(|a, b| match (a, b) {
            (Value::String(x), Value::String(y)) => x.cmp(y),
            _ => rank_order(a, b),
        })),

        Type::DateTime => Ok(Rc::new(|a, b| match (a, b) {
            (Value::DateTime(x), Value::DateTime(y)) => x.cmp(y),
            _ => rank_order(a, b),
        })),

        Type::Blob => Ok(Rc::new(|a, b| match (a, b) {
            (Value::Blob(x), Value::Blob(y)) => x.cmp(y),
            _ => rank_order(a, b),
        })),

        Type::Struct(fields) => {
            let compiled: Vec<KeyCmp> = fields
                .iter()
                .map(|f| compile(&f.ty, stack))
                .collect::<Result<_, _>>()?;
            Ok(Rc::new(move |a, b| match (a, b) {
                (Value::Struct(xs), Value::Struct(ys))
                    if xs.len() == compiled.len() && ys.len() == compiled.len() =>
                {
                    for (i, field_cmp) in compiled.iter().enumerate() {
                        let step = field_cmp(&xs[i].1, &ys[i].1);
                        if step != Ordering::Equal {
                            return step;
                        }
                    }
                    Ordering::Equal
                }
                _ => rank_order(a, b),
            }))
        }

        Type::Variant(cases) => {
            let compiled: Vec<(String, KeyCmp)> = cases
                .iter()
                .map(|c| Ok((c.tag.clone(), compile(&c.ty, stack)?)))
                .collect::<Result<_, CompareError>>()?;
            Ok(Rc::new(move |a, b| match (a, b) {
                (Value::Variant(xt, xp), Value::Variant(yt, yp)) => {
                    let step = xt.cmp(yt);
                    if step != Ordering::Equal {
                        return step;
                    }
                    compiled
                        .iter()
                        .find(|(case_tag, _)| case_tag == xt)
                        .map_or(Ordering::Equal, |(_, payload_cmp)| payload_cmp(xp, yp))
                }
                _ => rank_order(a, b),
            }))
        }

        Type::Recursive(body) => {
            let slot: KeySlot = Rc::new(RefCell::new(None));
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
            Ok(Rc::new(move |a, b| {
                let compiled = slot.borrow().clone();
                compiled.map_or(Ordering::Equal, |cmp| cmp(a, b))
            }))
        }

        other => Err(CompareError::InvalidKey(other.to_string())),
    }
}
