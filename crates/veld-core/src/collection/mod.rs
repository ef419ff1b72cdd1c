mod ord_map;
mod ord_set;

use crate::value::Value;
use std::{cmp::Ordering, rc::Rc};

pub use ord_map::{MapCursor, OrdMap};
pub use ord_set::{OrdSet, SetCursor};

/// Total, infallible comparator over key values. Produced by
/// `compare::key_comparator` for descriptors that satisfy the key-type
/// invariant (no mutable containers, no opaque/empty types).
pub type KeyCmp = Rc<dyn Fn(&Value, &Value) -> Ordering>;
