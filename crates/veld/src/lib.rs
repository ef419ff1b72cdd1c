//! Veld — a typed value algebra and expression IR with deterministic,
//! sharing-preserving codecs.
//!
//! This is the public meta-crate. Downstream users depend on **veld**
//! only. It re-exports the stable public API from:
//!   - `veld-core` (types, values, containers, comparison, codecs)
//!   - `veld-ir`   (IR node set, homoiconic reflection, resolver)

pub use veld_core as core;
pub use veld_ir as ir;

pub use veld_core::{
    binary,
    collection::{OrdMap, OrdSet},
    compare::{Compare, key_comparator},
    json::JsonCodec,
    text,
    types::Type,
    value::{DateTime, Shared, Value},
};
pub use veld_ir::{
    ast::{Ast, AstKind},
    node::{Node, NodeKind},
    reflect::ir_type,
    resolve::resolve,
};

///
/// Prelude
///

pub mod prelude {
    pub use veld_core::prelude::*;
    pub use veld_ir::prelude::*;
}
