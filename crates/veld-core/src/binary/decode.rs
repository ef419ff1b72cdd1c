use crate::{
    binary::{BinaryError, Version},
    collection::{OrdMap, OrdSet},
    compare::key_comparator,
    types::{Type, close, unfold},
    value::{DateTime, Shared, Value},
};

const MARK_INLINE: u8 = 0;
const MARK_BACKREF: u8 = 1;

///
/// Binary decoding
///
/// Pull-based reader over a contiguous buffer or a chunk sequence; the
/// chunked reader accepts the sync form unchanged. V2 containers are
/// registered by ordinal before their contents decode, so back
/// references — cyclic ones included — resolve to the live cell.
///

pub fn decode(bytes: &[u8], ty: &Type) -> Result<Value, BinaryError> {
    decode_source(Source::new(vec![bytes.to_vec()]), ty)
}

/// Streaming form of [`decode`]: reads the same byte stream across
/// arbitrary chunk boundaries.
pub fn decode_chunks(
    chunks: impl IntoIterator<Item = Vec<u8>>,
    ty: &Type,
) -> Result<Value, BinaryError> {
    decode_source(Source::new(chunks.into_iter().collect()), ty)
}

fn decode_source(mut source: Source, ty: &Type) -> Result<Value, BinaryError> {
    let version = Version::try_from_u8(source.read_u8()?)?;
    let mut decoder = Decoder {
        version,
        source,
        registry: Vec::new(),
    };
    let value = decoder.read(ty, &[])?;
    if decoder.source.has_remaining() {
        return Err(BinaryError::TrailingBytes);
    }
    Ok(value)
}

struct Source {
    chunks: Vec<Vec<u8>>,
    chunk: usize,
    offset: usize,
}

impl Source {
    fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks,
            chunk: 0,
            offset: 0,
        }
    }

    fn read_u8(&mut self) -> Result<u8, BinaryError> {
        loop {
            match self.chunks.get(self.chunk) {
                None => return Err(BinaryError::Truncated),
                Some(chunk) if self.offset < chunk.len() => {
                    let byte = chunk[self.offset];
                    self.offset += 1;
                    return Ok(byte);
                }
                Some(_) => {
                    self.chunk += 1;
                    self.offset = 0;
                }
            }
        }
    }

    fn read_exact(&mut self, len: usize) -> Result<Vec<u8>, BinaryError> {
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.read_u8()?);
        }
        Ok(out)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], BinaryError> {
        let mut out = [0u8; N];
        for slot in &mut out {
            *slot = self.read_u8()?;
        }
        Ok(out)
    }

    fn has_remaining(&mut self) -> bool {
        loop {
            match self.chunks.get(self.chunk) {
                None => return false,
                Some(chunk) if self.offset < chunk.len() => return true,
                Some(_) => {
                    self.chunk += 1;
                    self.offset = 0;
                }
            }
        }
    }
}

struct Decoder {
    version: Version,
    source: Source,
    // V2: containers by ordinal, registered before their contents
    registry: Vec<Value>,
}

impl Decoder {
    #[allow(clippy::too_many_lines)]
    fn read<'t>(&mut self, ty: &'t Type, env: &[&'t Type]) -> Result<Value, BinaryError> {
        let Some((ty, env)) = unfold(ty, env) else {
            return Err(BinaryError::Malformed(
                "degenerate recursive descriptor".to_string(),
            ));
        };

        match ty {
            Type::Never | Type::Function(_) | Type::AsyncFunction(_) => {
                Err(BinaryError::Unsupported(ty.to_string()))
            }

            Type::Null => Ok(Value::Null),

            Type::Boolean => match self.source.read_u8()? {
                0 => Ok(Value::Boolean(false)),
                1 => Ok(Value::Boolean(true)),
                other => Err(BinaryError::Malformed(format!("invalid boolean byte {other}"))),
            },

            Type::Integer => Ok(Value::Integer(i64::from_le_bytes(self.source.read_array()?))),

            Type::Float => Ok(Value::Float(f64::from_bits(u64::from_le_bytes(
                self.source.read_array()?,
            )))),

            Type::String => {
                let len = self.varint()? as usize;
                let bytes = self.source.read_exact(len)?;
                String::from_utf8(bytes)
                    .map(Value::String)
                    .map_err(|_| BinaryError::Malformed("invalid UTF-8 string".to_string()))
            }

            Type::DateTime => {
                let payload = i64::from_le_bytes(self.source.read_array()?);
                let millis = match self.version {
                    Version::V1 => payload.checked_mul(1_000).ok_or_else(|| {
                        BinaryError::Malformed("datetime out of range".to_string())
                    })?,
                    Version::V2 => payload,
                };
                Ok(Value::DateTime(DateTime::from_millis(millis)))
            }

            Type::Blob => {
                let len = self.varint()? as usize;
                Ok(Value::Blob(self.source.read_exact(len)?))
            }

            Type::Ref(inner) => {
                if let Some(back) = self.enter()? {
                    return Self::expect_kind(back, |v| matches!(v, Value::Ref(_)));
                }
                let cell = Shared::new(Value::Null);
                let value = Value::Ref(cell.clone());
                self.register(&value);
                *cell.borrow_mut() = self.read(inner, &env)?;
                Ok(value)
            }

            Type::Array(element) => {
                if let Some(back) = self.enter()? {
                    return Self::expect_kind(back, |v| matches!(v, Value::Array(_)));
                }
                let cell = Shared::new(Vec::new());
                let value = Value::Array(cell.clone());
                self.register(&value);
                let len = self.varint()? as usize;
                for _ in 0..len {
                    let item = self.read(element, &env)?;
                    cell.borrow_mut().push(item);
                }
                Ok(value)
            }

            Type::Set(element) => {
                if let Some(back) = self.enter()? {
                    return Self::expect_kind(back, |v| matches!(v, Value::Set(_)));
                }
                let closed = close(element, &env);
                let cmp = key_comparator(&closed)
                    .map_err(|e| BinaryError::Malformed(e.to_string()))?;
                let cell = Shared::new(OrdSet::new(cmp));
                let value = Value::Set(cell.clone());
                self.register(&value);
                let len = self.varint()? as usize;
                for _ in 0..len {
                    let item = self.read(element, &env)?;
                    if !cell.borrow_mut().insert(item) {
                        return Err(BinaryError::Malformed("duplicate set element".to_string()));
                    }
                }
                Ok(value)
            }

            Type::Dict(key_ty, value_ty) => {
                if let Some(back) = self.enter()? {
                    return Self::expect_kind(back, |v| matches!(v, Value::Dict(_)));
                }
                let closed = close(key_ty, &env);
                let cmp = key_comparator(&closed)
                    .map_err(|e| BinaryError::Malformed(e.to_string()))?;
                let cell = Shared::new(OrdMap::new(cmp));
                let value = Value::Dict(cell.clone());
                self.register(&value);
                let len = self.varint()? as usize;
                for _ in 0..len {
                    let entry_key = self.read(key_ty, &env)?;
                    let entry_value = self.read(value_ty, &env)?;
                    if cell.borrow_mut().insert(entry_key, entry_value).is_some() {
                        return Err(BinaryError::Malformed("duplicate dict key".to_string()));
                    }
                }
                Ok(value)
            }

            Type::Struct(fields) => {
                let mut entries = Vec::with_capacity(fields.len());
                for field in fields {
                    let item = self.read(&field.ty, &env)?;
                    entries.push((field.name.clone(), item));
                }
                Ok(Value::Struct(entries))
            }

            Type::Variant(cases) => {
                let at = self.varint()? as usize;
                let Some(case) = cases.get(at) else {
                    return Err(BinaryError::Malformed(format!("invalid variant index {at}")));
                };
                let payload = self.read(&case.ty, &env)?;
                Ok(Value::variant(case.tag.clone(), payload))
            }

            Type::Recursive(_) | Type::Rec(_) => Err(BinaryError::Malformed(
                "unresolved recursive descriptor".to_string(),
            )),
        }
    }

    /// Consume the V2 container marker. Returns the referenced container
    /// for a back reference, `None` when contents follow inline.
    fn enter(&mut self) -> Result<Option<Value>, BinaryError> {
        if self.version == Version::V1 {
            return Ok(None);
        }
        match self.source.read_u8()? {
            MARK_INLINE => Ok(None),
            MARK_BACKREF => {
                let ordinal = self.varint()? as usize;
                self.registry
                    .get(ordinal)
                    .cloned()
                    .map(Some)
                    .ok_or_else(|| {
                        BinaryError::Malformed(format!("undefined back reference {ordinal}"))
                    })
            }
            other => Err(BinaryError::Malformed(format!(
                "invalid container marker {other}"
            ))),
        }
    }

    fn register(&mut self, value: &Value) {
        if self.version == Version::V2 {
            self.registry.push(value.clone());
        }
    }

    fn expect_kind(value: Value, check: impl Fn(&Value) -> bool) -> Result<Value, BinaryError> {
        if check(&value) {
            Ok(value)
        } else {
            Err(BinaryError::Malformed(
                "back reference names a container of the wrong kind".to_string(),
            ))
        }
    }

    fn varint(&mut self) -> Result<u64, BinaryError> {
        let mut out = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.source.read_u8()?;
            if shift >= 64 {
                return Err(BinaryError::Malformed("varint overflow".to_string()));
            }
            out |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(out);
            }
            shift += 7;
        }
    }
}
