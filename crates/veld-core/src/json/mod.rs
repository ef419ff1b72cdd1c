mod decode;
mod encode;

#[cfg(test)]
mod tests;

use crate::types::{Type, TypeTag};
use std::fmt;
use thiserror::Error as ThisError;

///
/// JsonError
///
/// Structural JSON codec errors carry a human message, the data path of
/// the failing position (`.field`, `[i]`, `[i].key`, …), and a position:
/// line/column recovered from the JSON parser for syntax errors, fixed
/// at (1, 1) for structural ones.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("{message} at {path} (line {line}, column {col})")]
pub struct JsonError {
    pub message: String,
    pub path: String,
    pub line: u32,
    pub col: u32,
    pub kind: JsonErrorKind,
}

impl JsonError {
    pub(crate) fn structural(kind: JsonErrorKind, message: impl Into<String>, path: String) -> Self {
        Self {
            message: message.into(),
            path,
            line: 1,
            col: 1,
            kind,
        }
    }
}

///
/// JsonErrorKind
///
/// Stable error-kind taxonomy, independent of message text.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JsonErrorKind {
    UnsupportedType,
    Syntax,
    Structure,
    Range,
    Reference,
}

impl JsonErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnsupportedType => "unsupported_type",
            Self::Syntax => "syntax",
            Self::Structure => "structure",
            Self::Range => "range",
            Self::Reference => "reference",
        }
    }
}

impl fmt::Display for JsonErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

///
/// JsonCodec
///
/// One descriptor compiled into a strict structural codec. Opaque and
/// uninhabited types are rejected up front, so encode/decode never meet
/// them.
///

#[derive(Debug)]
pub struct JsonCodec {
    ty: Type,
}

impl JsonCodec {
    pub fn new(ty: &Type) -> Result<Self, JsonError> {
        for banned in [TypeTag::Function, TypeTag::AsyncFunction, TypeTag::Never] {
            if ty.mentions(banned) {
                return Err(JsonError::structural(
                    JsonErrorKind::UnsupportedType,
                    format!("type .{banned} cannot cross the JSON boundary"),
                    String::new(),
                ));
            }
        }
        ty.check_depths().map_err(|e| {
            JsonError::structural(JsonErrorKind::Structure, e.to_string(), String::new())
        })?;
        Ok(Self { ty: ty.clone() })
    }

    /// Canonical compact JSON text.
    pub fn encode(&self, value: &crate::value::Value) -> Result<String, JsonError> {
        Ok(self.encode_value(value)?.to_string())
    }

    /// The JSON tree behind [`encode`](Self::encode).
    pub fn encode_value(
        &self,
        value: &crate::value::Value,
    ) -> Result<serde_json::Value, JsonError> {
        encode::encode(value, &self.ty)
    }

    /// Decode JSON text, recovering syntax positions from the parser.
    pub fn decode(&self, text: &str) -> Result<crate::value::Value, JsonError> {
        let tree: serde_json::Value = serde_json::from_str(text).map_err(|e| JsonError {
            message: e.to_string(),
            path: String::new(),
            line: u32::try_from(e.line()).unwrap_or(u32::MAX),
            col: u32::try_from(e.column()).unwrap_or(u32::MAX),
            kind: JsonErrorKind::Syntax,
        })?;
        self.decode_value(&tree)
    }

    /// Decode an in-memory JSON tree.
    pub fn decode_value(
        &self,
        tree: &serde_json::Value,
    ) -> Result<crate::value::Value, JsonError> {
        decode::decode(tree, &self.ty)
    }
}
