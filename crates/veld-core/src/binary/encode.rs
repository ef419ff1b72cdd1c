use crate::{
    binary::{BinaryError, Version},
    types::{Type, unfold},
    value::{HeapId, Value},
};
use rustc_hash::{FxHashMap, FxHashSet};

// container lead bytes (V2 only)
const MARK_INLINE: u8 = 0;
const MARK_BACKREF: u8 = 1;

///
/// Binary encoding
///
/// Type-directed, tag-free layout: the descriptor decides every byte, so
/// only lengths, case indexes, and (in V2) container markers appear on
/// the wire. The sync and chunked entry points drive the same writer and
/// are byte-identical by construction.
///

pub fn encode(value: &Value, ty: &Type, version: Version) -> Result<Vec<u8>, BinaryError> {
    let mut out = Vec::new();
    run(value, ty, version, &mut out)?;
    Ok(out)
}

/// Chunked form of [`encode`]: the same byte stream, cut into chunks of
/// at most `chunk_size` bytes. Concatenating the chunks reproduces the
/// sync output exactly.
pub fn encode_chunked(
    value: &Value,
    ty: &Type,
    version: Version,
    chunk_size: usize,
) -> Result<Vec<Vec<u8>>, BinaryError> {
    let bytes = encode(value, ty, version)?;
    let size = chunk_size.max(1);
    Ok(bytes.chunks(size).map(<[u8]>::to_vec).collect())
}

fn run(value: &Value, ty: &Type, version: Version, out: &mut Vec<u8>) -> Result<(), BinaryError> {
    out.push(version.to_u8());
    let mut encoder = Encoder {
        version,
        out,
        ordinals: FxHashMap::default(),
        in_progress: FxHashSet::default(),
    };
    encoder.emit(value, ty, &[])
}

struct Encoder<'o> {
    version: Version,
    out: &'o mut Vec<u8>,
    // V2: container identity → ordinal in pre-order of first encounter
    ordinals: FxHashMap<HeapId, u64>,
    // V1: containers currently on the walk stack, for cycle detection
    in_progress: FxHashSet<HeapId>,
}

impl Encoder<'_> {
    fn emit<'t>(&mut self, value: &Value, ty: &'t Type, env: &[&'t Type]) -> Result<(), BinaryError> {
        let Some((ty, env)) = unfold(ty, env) else {
            return Err(BinaryError::Malformed(
                "degenerate recursive descriptor".to_string(),
            ));
        };

        match ty {
            Type::Never | Type::Function(_) | Type::AsyncFunction(_) => {
                Err(BinaryError::Unsupported(ty.to_string()))
            }

            Type::Null => match value {
                Value::Null => Ok(()),
                other => Err(self.mismatch(ty, other)),
            },

            Type::Boolean => match value {
                Value::Boolean(b) => {
                    self.out.push(u8::from(*b));
                    Ok(())
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Integer => match value {
                Value::Integer(i) => {
                    self.out.extend_from_slice(&i.to_le_bytes());
                    Ok(())
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Float => match value {
                Value::Float(f) => {
                    self.out.extend_from_slice(&f.to_bits().to_le_bytes());
                    Ok(())
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::String => match value {
                Value::String(s) => {
                    self.varint(s.len() as u64);
                    self.out.extend_from_slice(s.as_bytes());
                    Ok(())
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::DateTime => match value {
                Value::DateTime(dt) => {
                    let payload = match self.version {
                        Version::V1 => dt.millis().div_euclid(1_000),
                        Version::V2 => dt.millis(),
                    };
                    self.out.extend_from_slice(&payload.to_le_bytes());
                    Ok(())
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Blob => match value {
                Value::Blob(bytes) => {
                    self.varint(bytes.len() as u64);
                    self.out.extend_from_slice(bytes);
                    Ok(())
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Ref(inner) => match value {
                Value::Ref(cell) => {
                    let id = cell.id();
                    if self.open(id)? {
                        return Ok(());
                    }
                    let result = self.emit(&cell.borrow(), inner, &env);
                    self.close(id);
                    result
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Array(element) => match value {
                Value::Array(cell) => {
                    let id = cell.id();
                    if self.open(id)? {
                        return Ok(());
                    }
                    let items = cell.borrow();
                    self.varint(items.len() as u64);
                    let mut result = Ok(());
                    for item in items.iter() {
                        result = self.emit(item, element, &env);
                        if result.is_err() {
                            break;
                        }
                    }
                    self.close(id);
                    result
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Set(element) => match value {
                Value::Set(cell) => {
                    let id = cell.id();
                    if self.open(id)? {
                        return Ok(());
                    }
                    let set = cell.borrow();
                    self.varint(set.len() as u64);
                    let mut result = Ok(());
                    for item in set.iter() {
                        result = self.emit(item, element, &env);
                        if result.is_err() {
                            break;
                        }
                    }
                    self.close(id);
                    result
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Dict(key_ty, value_ty) => match value {
                Value::Dict(cell) => {
                    let id = cell.id();
                    if self.open(id)? {
                        return Ok(());
                    }
                    let map = cell.borrow();
                    self.varint(map.len() as u64);
                    let mut result = Ok(());
                    for (k, v) in map.iter() {
                        result = self.emit(k, key_ty, &env);
                        if result.is_err() {
                            break;
                        }
                        result = self.emit(v, value_ty, &env);
                        if result.is_err() {
                            break;
                        }
                    }
                    self.close(id);
                    result
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Struct(fields) => match value {
                Value::Struct(entries) if entries.len() == fields.len() => {
                    for (field, (name, item)) in fields.iter().zip(entries.iter()) {
                        if field.name != *name {
                            return Err(self.mismatch(ty, value));
                        }
                        self.emit(item, &field.ty, &env)?;
                    }
                    Ok(())
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Variant(cases) => match value {
                Value::Variant(tag, payload) => {
                    let Some(at) = cases.iter().position(|c| c.tag == *tag) else {
                        return Err(BinaryError::Malformed(format!("unknown variant tag .{tag}")));
                    };
                    self.varint(at as u64);
                    self.emit(payload, &cases[at].ty, &env)
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Recursive(_) | Type::Rec(_) => Err(BinaryError::Malformed(
                "unresolved recursive descriptor".to_string(),
            )),
        }
    }

    /// Begin a container. Returns `true` if a V2 back reference was
    /// written instead of contents.
    fn open(&mut self, id: HeapId) -> Result<bool, BinaryError> {
        match self.version {
            Version::V1 => {
                if !self.in_progress.insert(id) {
                    return Err(BinaryError::Cyclic);
                }
                Ok(false)
            }
            Version::V2 => {
                if let Some(ordinal) = self.ordinals.get(&id) {
                    let ordinal = *ordinal;
                    self.out.push(MARK_BACKREF);
                    self.varint(ordinal);
                    return Ok(true);
                }
                let ordinal = self.ordinals.len() as u64;
                self.ordinals.insert(id, ordinal);
                self.out.push(MARK_INLINE);
                Ok(false)
            }
        }
    }

    fn close(&mut self, id: HeapId) {
        if self.version == Version::V1 {
            self.in_progress.remove(&id);
        }
    }

    fn varint(&mut self, mut n: u64) {
        loop {
            let byte = (n & 0x7f) as u8;
            n >>= 7;
            if n == 0 {
                self.out.push(byte);
                return;
            }
            self.out.push(byte | 0x80);
        }
    }

    fn mismatch(&self, ty: &Type, value: &Value) -> BinaryError {
        BinaryError::Malformed(format!("value {value} does not match type {ty}"))
    }
}
