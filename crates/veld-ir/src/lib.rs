//! Expression IR for Veld: the node set and its source locations, the
//! homoiconic descriptor that lets IR travel through the generic codecs,
//! and the AST→IR resolver.
#![warn(unreachable_pub)]

pub mod ast;
pub mod builtins;
pub mod location;
pub mod node;
pub mod reflect;
pub mod resolve;

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        ast::{Ast, AstKind},
        location::{Label, Location},
        node::{Node, NodeKind},
        resolve::resolve,
    };
}
