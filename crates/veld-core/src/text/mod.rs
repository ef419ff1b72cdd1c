mod parse;
mod print;

#[cfg(test)]
mod tests;

use thiserror::Error as ThisError;

pub use parse::parse;
pub use print::print;

///
/// TextError
///
/// Codec errors carry a human message, the data path of the failing
/// position, and (for parsing) the 1-based line and column in the input.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum TextError {
    #[error("print error: {message} at {path}")]
    Print { message: String, path: String },

    #[error("parse error: {message} at {path} (line {line}, column {col})")]
    Parse {
        message: String,
        path: String,
        line: u32,
        col: u32,
    },
}

impl TextError {
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Print { message, .. } | Self::Parse { message, .. } => message,
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Print { path, .. } | Self::Parse { path, .. } => path,
        }
    }

    /// Input position for parse errors; printing has no position.
    #[must_use]
    pub const fn position(&self) -> Option<(u32, u32)> {
        match self {
            Self::Print { .. } => None,
            Self::Parse { line, col, .. } => Some((*line, *col)),
        }
    }
}

/// Bare identifiers: ASCII letter or underscore, then letters, digits,
/// underscores. Anything else is backtick-quoted on the surface.
pub(crate) fn is_bare_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Backtick-quote an identifier, escaping `\` and the backtick.
pub(crate) fn quote_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('`');
    for c in name.chars() {
        if c == '\\' || c == '`' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('`');
    out
}

/// String literal body escaping: only `\"` and `\\` exist.
pub(crate) fn escape_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
