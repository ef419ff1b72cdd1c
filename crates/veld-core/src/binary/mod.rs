mod decode;
mod encode;

#[cfg(test)]
mod tests;

use thiserror::Error as ThisError;

pub use decode::{decode, decode_chunks};
pub use encode::{encode, encode_chunked};

///
/// Version
///
/// Byte-level wire versions. V1 is the original tag-free layout with
/// second-resolution instants and no aliasing; V2 keeps millisecond
/// instants and preserves shared mutable containers through back
/// references. The version byte leads the stream and unknown values are
/// rejected before any payload is read.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Version {
    V1 = 1,
    V2 = 2,
}

impl Version {
    pub(crate) const fn to_u8(self) -> u8 {
        self as u8
    }

    pub(crate) const fn try_from_u8(byte: u8) -> Result<Self, BinaryError> {
        match byte {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => Err(BinaryError::UnknownVersion(other)),
        }
    }
}

///
/// BinaryError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum BinaryError {
    #[error("unknown binary codec version {0}")]
    UnknownVersion(u8),

    #[error("unexpected end of input")]
    Truncated,

    #[error("malformed binary payload: {0}")]
    Malformed(String),

    #[error("type cannot cross the binary boundary: {0}")]
    Unsupported(String),

    #[error("cyclic value cannot be encoded without aliasing (version 1)")]
    Cyclic,

    #[error("trailing bytes after value")]
    TrailingBytes,
}
