//! Core value algebra for Veld: type descriptors, runtime values, sorted
//! containers, the compiled comparison engine, and the text/JSON/binary
//! codecs, with the ergonomics exported via the `prelude`.
#![warn(unreachable_pub)]

pub mod binary;
pub mod collection;
pub mod compare;
pub mod json;
pub mod path;
pub mod text;
pub mod types;
pub mod value;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, codecs, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        collection::{OrdMap, OrdSet},
        compare::Compare,
        types::Type,
        value::{DateTime, Shared, Value},
    };
}
