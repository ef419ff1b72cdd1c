use crate::{
    collection::{OrdMap, OrdSet},
    compare::key_comparator,
    json::{JsonError, JsonErrorKind},
    path::{RelativePointer, join},
    types::{Type, close, unfold},
    value::{DateTime, Shared, Value},
};
use rustc_hash::FxHashMap;
use serde_json::Value as Json;

///
/// Structural decoding
///
/// Walks descriptor and JSON tree in lockstep, producing fresh owned
/// values. Containers are registered under their token path before
/// their contents fill, so `$ref` pointers — cyclic ones included —
/// resolve to the already-created cell.
///

pub(crate) fn decode(tree: &Json, ty: &Type) -> Result<Value, JsonError> {
    let mut decoder = Decoder {
        tokens: Vec::new(),
        display: Vec::new(),
        registry: FxHashMap::default(),
    };
    decoder.read(tree, ty, &[])
}

struct Decoder {
    tokens: Vec<String>,
    display: Vec<String>,
    registry: FxHashMap<String, Value>,
}

impl Decoder {
    #[allow(clippy::too_many_lines)]
    fn read<'t>(&mut self, tree: &Json, ty: &'t Type, env: &[&'t Type]) -> Result<Value, JsonError> {
        let Some((ty, env)) = unfold(ty, env) else {
            return Err(self.fail("degenerate recursive descriptor"));
        };

        if ty.is_mutable_container() {
            if let Some(value) = self.try_reference(tree, ty)? {
                return Ok(value);
            }
        }

        match ty {
            Type::Null => match tree {
                Json::Null => Ok(Value::Null),
                other => Err(self.unexpected("null", other)),
            },

            Type::Boolean => match tree {
                Json::Bool(b) => Ok(Value::Boolean(*b)),
                other => Err(self.unexpected("a boolean", other)),
            },

            Type::Integer => match tree {
                Json::String(text) => {
                    let digits_ok = {
                        let digits = text.strip_prefix('-').unwrap_or(text);
                        !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
                    };
                    if !digits_ok {
                        return Err(self.fail(&format!("invalid integer literal {text:?}")));
                    }
                    text.parse::<i64>().map(Value::Integer).map_err(|_| {
                        JsonError::structural(
                            JsonErrorKind::Range,
                            format!("integer {text} out of range"),
                            self.display.concat(),
                        )
                    })
                }
                other => Err(self.unexpected("a string-encoded integer", other)),
            },

            Type::Float => match tree {
                Json::Number(number) => number
                    .as_f64()
                    .map(Value::Float)
                    .ok_or_else(|| self.fail("unrepresentable float")),
                Json::String(text) => match text.as_str() {
                    "NaN" => Ok(Value::Float(f64::NAN)),
                    "Infinity" => Ok(Value::Float(f64::INFINITY)),
                    "-Infinity" => Ok(Value::Float(f64::NEG_INFINITY)),
                    "-0.0" => Ok(Value::Float(-0.0)),
                    other => Err(self.fail(&format!("invalid float literal {other:?}"))),
                },
                other => Err(self.unexpected("a float", other)),
            },

            Type::String => match tree {
                Json::String(text) => Ok(Value::String(text.clone())),
                other => Err(self.unexpected("a string", other)),
            },

            Type::DateTime => match tree {
                Json::String(text) => DateTime::parse_rfc3339(text)
                    .map(Value::DateTime)
                    .map_err(|e| self.fail(&e.to_string())),
                other => Err(self.unexpected("an RFC 3339 string", other)),
            },

            Type::Blob => match tree {
                Json::String(text) => {
                    let Some(digits) = text.strip_prefix("0x") else {
                        return Err(self.fail(&format!("invalid blob literal {text:?}")));
                    };
                    if digits.len() % 2 != 0 {
                        return Err(self.fail("blob hex must have an even number of digits"));
                    }
                    hex::decode(digits)
                        .map(Value::Blob)
                        .map_err(|_| self.fail(&format!("invalid blob literal {text:?}")))
                }
                other => Err(self.unexpected("a hex string", other)),
            },

            Type::Ref(inner) => match tree {
                Json::Array(items) if items.len() == 1 => {
                    let cell = Shared::new(Value::Null);
                    let value = Value::Ref(cell.clone());
                    self.register(&value);
                    self.push("0", "[0]");
                    let inner_value = self.read(&items[0], inner, &env);
                    self.pop();
                    *cell.borrow_mut() = inner_value?;
                    Ok(value)
                }
                other => Err(self.unexpected("a one-element array", other)),
            },

            Type::Array(element) => match tree {
                Json::Array(items) => {
                    let cell = Shared::new(Vec::with_capacity(items.len()));
                    let value = Value::Array(cell.clone());
                    self.register(&value);
                    for (i, item) in items.iter().enumerate() {
                        self.push(&i.to_string(), &format!("[{i}]"));
                        let decoded = self.read(item, element, &env);
                        self.pop();
                        cell.borrow_mut().push(decoded?);
                    }
                    Ok(value)
                }
                other => Err(self.unexpected("an array", other)),
            },

            Type::Set(element) => match tree {
                Json::Array(items) => {
                    let closed = close(element, &env);
                    let cmp = key_comparator(&closed)
                        .map_err(|e| self.fail(&e.to_string()))?;
                    let cell = Shared::new(OrdSet::new(cmp));
                    let value = Value::Set(cell.clone());
                    self.register(&value);
                    for (i, item) in items.iter().enumerate() {
                        self.push(&i.to_string(), &format!("[{i}]"));
                        let decoded = self.read(item, element, &env);
                        self.pop();
                        if !cell.borrow_mut().insert(decoded?) {
                            return Err(self.fail("duplicate set element"));
                        }
                    }
                    Ok(value)
                }
                other => Err(self.unexpected("an array", other)),
            },

            Type::Dict(key_ty, value_ty) => match tree {
                Json::Array(items) => {
                    let closed = close(key_ty, &env);
                    let cmp = key_comparator(&closed)
                        .map_err(|e| self.fail(&e.to_string()))?;
                    let cell = Shared::new(OrdMap::new(cmp));
                    let value = Value::Dict(cell.clone());
                    self.register(&value);
                    for (i, item) in items.iter().enumerate() {
                        self.push(&i.to_string(), &format!("[{i}]"));
                        let entry = self.read_dict_entry(item, key_ty, value_ty, &env);
                        self.pop();
                        let (entry_key, entry_value) = entry?;
                        if cell.borrow_mut().insert(entry_key, entry_value).is_some() {
                            return Err(self.fail("duplicate dict key"));
                        }
                    }
                    Ok(value)
                }
                other => Err(self.unexpected("an array of dict entries", other)),
            },

            Type::Struct(fields) => match tree {
                Json::Object(object) => {
                    for key in object.keys() {
                        if !fields.iter().any(|f| f.name == *key) {
                            return Err(self.fail(&format!("unknown struct field {key:?}")));
                        }
                    }
                    let mut entries = Vec::with_capacity(fields.len());
                    for field in fields {
                        let Some(item) = object.get(&field.name) else {
                            return Err(
                                self.fail(&format!("missing struct field {:?}", field.name))
                            );
                        };
                        self.push(&field.name, &format!(".{}", field.name));
                        let decoded = self.read(item, &field.ty, &env);
                        self.pop();
                        entries.push((field.name.clone(), decoded?));
                    }
                    Ok(Value::Struct(entries))
                }
                other => Err(self.unexpected("an object", other)),
            },

            Type::Variant(cases) => match tree {
                Json::Object(object) => {
                    if object.len() != 2 || !object.contains_key("type") || !object.contains_key("value")
                    {
                        return Err(
                            self.fail("variant objects carry exactly `type` and `value`")
                        );
                    }
                    let Some(Json::String(tag)) = object.get("type") else {
                        return Err(self.fail("variant `type` must be a string"));
                    };
                    let Some(case) = cases.iter().find(|c| c.tag == *tag) else {
                        return Err(self.fail(&format!("unknown variant tag {tag:?}")));
                    };
                    let Some(payload_tree) = object.get("value") else {
                        return Err(self.fail("variant objects carry exactly `type` and `value`"));
                    };
                    self.push("value", ".value");
                    let payload = self.read(payload_tree, &case.ty, &env);
                    self.pop();
                    Ok(Value::variant(tag.clone(), payload?))
                }
                other => Err(self.unexpected("a variant object", other)),
            },

            Type::Never | Type::Function(_) | Type::AsyncFunction(_) => {
                Err(JsonError::structural(
                    JsonErrorKind::UnsupportedType,
                    format!("type .{} cannot cross the JSON boundary", ty.tag()),
                    self.display.concat(),
                ))
            }

            Type::Recursive(_) | Type::Rec(_) => Err(self.fail("unresolved recursive descriptor")),
        }
    }

    fn read_dict_entry<'t>(
        &mut self,
        tree: &Json,
        key_ty: &'t Type,
        value_ty: &'t Type,
        env: &[&'t Type],
    ) -> Result<(Value, Value), JsonError> {
        let Json::Object(object) = tree else {
            return Err(self.unexpected("a dict entry object", tree));
        };
        if object.len() != 2 || !object.contains_key("key") || !object.contains_key("value") {
            return Err(self.fail("dict entries carry exactly `key` and `value`"));
        }

        let (Some(key_tree), Some(value_tree)) = (object.get("key"), object.get("value")) else {
            return Err(self.fail("dict entries carry exactly `key` and `value`"));
        };

        self.push("key", ".key");
        let entry_key = self.read(key_tree, key_ty, env);
        self.pop();

        self.push("value", ".value");
        let entry_value = self.read(value_tree, value_ty, env);
        self.pop();

        Ok((entry_key?, entry_value?))
    }

    ///
    /// REFERENCES
    ///

    fn register(&mut self, value: &Value) {
        self.registry.insert(join(&self.tokens), value.clone());
    }

    fn try_reference(&mut self, tree: &Json, ty: &Type) -> Result<Option<Value>, JsonError> {
        let Json::Object(object) = tree else {
            return Ok(None);
        };
        let Some(pointer_tree) = object.get("$ref") else {
            return Ok(None);
        };
        if object.len() != 1 {
            return Err(self.reference_error("a `$ref` object carries no other fields"));
        }
        let Json::String(pointer_text) = pointer_tree else {
            return Err(self.reference_error("`$ref` must be a string"));
        };

        let pointer = RelativePointer::parse(pointer_text)
            .map_err(|e| self.reference_error(&e.to_string()))?;
        let Some(absolute) = pointer.resolve(&self.tokens) else {
            return Err(self.reference_error(&format!(
                "reference {pointer_text:?} escapes the document root"
            )));
        };
        let Some(value) = self.registry.get(&join(&absolute)) else {
            return Err(self.reference_error(&format!(
                "undefined reference target {pointer_text:?}"
            )));
        };

        let kind_matches = matches!(
            (ty, value),
            (Type::Ref(_), Value::Ref(_))
                | (Type::Array(_), Value::Array(_))
                | (Type::Set(_), Value::Set(_))
                | (Type::Dict(..), Value::Dict(_))
        );
        if !kind_matches {
            return Err(self.reference_error(&format!(
                "reference {pointer_text:?} does not name the expected container"
            )));
        }
        Ok(Some(value.clone()))
    }

    ///
    /// PATHS / ERRORS
    ///

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

    fn reference_error(&self, message: &str) -> JsonError {
        JsonError::structural(JsonErrorKind::Reference, message, self.display.concat())
    }

    fn unexpected(&self, expected: &str, found: &Json) -> JsonError {
        let found = match found {
            Json::Null => "null",
            Json::Bool(_) => "a boolean",
            Json::Number(_) => "a number",
            Json::String(_) => "a string",
            Json::Array(_) => "an array",
            Json::Object(_) => "an object",
        };
        self.fail(&format!("expected {expected}, found {found}"))
    }
}
