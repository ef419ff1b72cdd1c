use crate::{
    json::{JsonError, JsonErrorKind},
    path::RelativePointer,
    types::{Type, unfold},
    value::{HeapId, Value},
};
use rustc_hash::FxHashMap;
use serde_json::{Map, Number, Value as Json};

///
/// Structural encoding
///
/// Walks descriptor and value in lockstep, producing a `serde_json`
/// tree. Mutable containers record their token path on first encounter;
/// later encounters emit `{"$ref":"U#R"}` so sharing and cycles survive
/// the wire.
///

pub(crate) fn encode(value: &Value, ty: &Type) -> Result<Json, JsonError> {
    let mut encoder = Encoder {
        tokens: Vec::new(),
        display: Vec::new(),
        seen: FxHashMap::default(),
    };
    encoder.emit(value, ty, &[])
}

struct Encoder {
    tokens: Vec<String>,
    display: Vec<String>,
    seen: FxHashMap<HeapId, Vec<String>>,
}

impl Encoder {
    fn emit<'t>(&mut self, value: &Value, ty: &'t Type, env: &[&'t Type]) -> Result<Json, JsonError> {
        let Some((ty, env)) = unfold(ty, env) else {
            return Err(self.fail("degenerate recursive descriptor"));
        };

        match ty {
            Type::Null => match value {
                Value::Null => Ok(Json::Null),
                other => Err(self.mismatch(ty, other)),
            },

            Type::Boolean => match value {
                Value::Boolean(b) => Ok(Json::Bool(*b)),
                other => Err(self.mismatch(ty, other)),
            },

            // Integers ride as decimal strings so 64-bit values survive
            // JSON implementations that read numbers as doubles.
            Type::Integer => match value {
                Value::Integer(i) => Ok(Json::String(i.to_string())),
                other => Err(self.mismatch(ty, other)),
            },

            Type::Float => match value {
                Value::Float(f) => Ok(encode_float(*f)),
                other => Err(self.mismatch(ty, other)),
            },

            Type::String => match value {
                Value::String(s) => Ok(Json::String(s.clone())),
                other => Err(self.mismatch(ty, other)),
            },

            Type::DateTime => match value {
                Value::DateTime(dt) => dt
                    .format_rfc3339()
                    .map(Json::String)
                    .map_err(|e| self.fail(&e.to_string())),
                other => Err(self.mismatch(ty, other)),
            },

            Type::Blob => match value {
                Value::Blob(bytes) => Ok(Json::String(format!("0x{}", hex::encode(bytes)))),
                other => Err(self.mismatch(ty, other)),
            },

            Type::Ref(inner) => match value {
                Value::Ref(cell) => {
                    if let Some(alias) = self.alias(cell.id()) {
                        return Ok(alias);
                    }
                    self.push("0", "[0]");
                    let inner_json = self.emit(&cell.borrow(), inner, &env);
                    self.pop();
                    Ok(Json::Array(vec![inner_json?]))
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Array(element) => match value {
                Value::Array(cell) => {
                    if let Some(alias) = self.alias(cell.id()) {
                        return Ok(alias);
                    }
                    let items = cell.borrow();
                    let mut out = Vec::with_capacity(items.len());
                    for (i, item) in items.iter().enumerate() {
                        self.push(&i.to_string(), &format!("[{i}]"));
                        let encoded = self.emit(item, element, &env);
                        self.pop();
                        out.push(encoded?);
                    }
                    Ok(Json::Array(out))
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Set(element) => match value {
                Value::Set(cell) => {
                    if let Some(alias) = self.alias(cell.id()) {
                        return Ok(alias);
                    }
                    let set = cell.borrow();
                    let mut out = Vec::with_capacity(set.len());
                    for (i, item) in set.iter().enumerate() {
                        self.push(&i.to_string(), &format!("[{i}]"));
                        let encoded = self.emit(item, element, &env);
                        self.pop();
                        out.push(encoded?);
                    }
                    Ok(Json::Array(out))
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Dict(key_ty, value_ty) => match value {
                Value::Dict(cell) => {
                    if let Some(alias) = self.alias(cell.id()) {
                        return Ok(alias);
                    }
                    let map = cell.borrow();
                    let mut out = Vec::with_capacity(map.len());
                    for (i, (k, v)) in map.iter().enumerate() {
                        self.push(&i.to_string(), &format!("[{i}]"));

                        self.push("key", ".key");
                        let key_json = self.emit(k, key_ty, &env);
                        self.pop();

                        self.push("value", ".value");
                        let value_json = self.emit(v, value_ty, &env);
                        self.pop();

                        self.pop();

                        let mut entry = Map::new();
                        entry.insert("key".to_string(), key_json?);
                        entry.insert("value".to_string(), value_json?);
                        out.push(Json::Object(entry));
                    }
                    Ok(Json::Array(out))
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Struct(fields) => match value {
                Value::Struct(entries) if entries.len() == fields.len() => {
                    let mut out = Map::new();
                    for (field, (name, item)) in fields.iter().zip(entries.iter()) {
                        if field.name != *name {
                            return Err(self.mismatch(ty, value));
                        }
                        self.push(&field.name, &format!(".{}", field.name));
                        let encoded = self.emit(item, &field.ty, &env);
                        self.pop();
                        out.insert(field.name.clone(), encoded?);
                    }
                    Ok(Json::Object(out))
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Variant(cases) => match value {
                Value::Variant(tag, payload) => {
                    let Some(case) = cases.iter().find(|c| c.tag == *tag) else {
                        return Err(self.fail(&format!("unknown variant tag .{tag}")));
                    };
                    self.push("value", ".value");
                    let payload_json = self.emit(payload, &case.ty, &env);
                    self.pop();

                    let mut out = Map::new();
                    out.insert("type".to_string(), Json::String(tag.clone()));
                    out.insert("value".to_string(), payload_json?);
                    Ok(Json::Object(out))
                }
                other => Err(self.mismatch(ty, other)),
            },

            // rejected at codec creation; defensive for direct callers
            Type::Never | Type::Function(_) | Type::AsyncFunction(_) => Err(JsonError::structural(
                JsonErrorKind::UnsupportedType,
                format!("type .{} cannot cross the JSON boundary", ty.tag()),
                self.display.concat(),
            )),

            Type::Recursive(_) | Type::Rec(_) => Err(self.fail("unresolved recursive descriptor")),
        }
    }

    fn alias(&mut self, id: HeapId) -> Option<Json> {
        if let Some(target) = self.seen.get(&id) {
            let pointer = RelativePointer::between(&self.tokens, target);
            let mut out = Map::new();
            out.insert("$ref".to_string(), Json::String(pointer.to_string()));
            return Some(Json::Object(out));
        }
        self.seen.insert(id, self.tokens.clone());
        None
    }

    fn push(&mut self, token: &str, display: &str) {
        self.tokens.push(token.to_string());
        self.display.push(display.to_string());
    }

    fn pop(&mut self) {
        self.tokens.pop();
        self.display.pop();
    }

    fn fail(&self, message: &str) -> JsonError {
        JsonError::structural(JsonErrorKind::Structure, message, self.display.concat())
    }

    fn mismatch(&self, ty: &Type, value: &Value) -> JsonError {
        self.fail(&format!("value {value} does not match type {ty}"))
    }
}

fn encode_float(f: f64) -> Json {
    if f.is_nan() {
        return Json::String("NaN".to_string());
    }
    if f == f64::INFINITY {
        return Json::String("Infinity".to_string());
    }
    if f == f64::NEG_INFINITY {
        return Json::String("-Infinity".to_string());
    }
    if f == 0.0 && f.is_sign_negative() {
        return Json::String("-0.0".to_string());
    }
    Number::from_f64(f).map_or_else(|| Json::String("NaN".to_string()), Json::Number)
}
