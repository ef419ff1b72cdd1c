use crate::{
    path::{RelativePointer, join},
    text::{TextError, escape_string, is_bare_identifier, quote_identifier},
    types::{Type, unfold},
    value::{HeapId, Value},
};
use rustc_hash::FxHashMap;
use std::fmt::Write;

///
/// Type-directed printing
///
/// The printer walks descriptor and value in lockstep, tracking the
/// current data path. The first (depth-first, declaration-order)
/// occurrence of each mutable container prints its contents and records
/// its path; every later occurrence prints a `U#R` relative pointer
/// instead, which also makes cyclic heaps terminate.
///

pub fn print(value: &Value, ty: &Type) -> Result<String, TextError> {
    let mut printer = Printer {
        out: String::new(),
        path: Vec::new(),
        seen: FxHashMap::default(),
    };
    printer.emit(value, ty, &[])?;
    Ok(printer.out)
}

struct Printer {
    out: String,
    path: Vec<String>,
    seen: FxHashMap<HeapId, Vec<String>>,
}

impl Printer {
    fn emit<'t>(&mut self, value: &Value, ty: &'t Type, env: &[&'t Type]) -> Result<(), TextError> {
        let Some((ty, env)) = unfold(ty, env) else {
            return Err(self.fail("degenerate recursive descriptor"));
        };

        match ty {
            Type::Never => Err(self.fail("attempted to print .Never")),

            Type::Null => match value {
                Value::Null => {
                    self.out.push_str("null");
                    Ok(())
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Boolean => match value {
                Value::Boolean(b) => {
                    let _ = write!(self.out, "{b}");
                    Ok(())
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Integer => match value {
                Value::Integer(i) => {
                    let _ = write!(self.out, "{i}");
                    Ok(())
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Float => match value {
                Value::Float(f) => {
                    self.out.push_str(&format_float(*f));
                    Ok(())
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::String => match value {
                Value::String(s) => {
                    let _ = write!(self.out, "\"{}\"", escape_string(s));
                    Ok(())
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::DateTime => match value {
                Value::DateTime(dt) => {
                    let text = dt
                        .format_text()
                        .map_err(|e| self.fail(&e.to_string()))?;
                    self.out.push_str(&text);
                    Ok(())
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Blob => match value {
                Value::Blob(bytes) => {
                    let _ = write!(self.out, "0x{}", hex::encode(bytes));
                    Ok(())
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Ref(inner) => match value {
                Value::Ref(cell) => {
                    if self.emit_alias(cell.id()) {
                        return Ok(());
                    }
                    self.out.push('&');
                    self.path.push("&".to_string());
                    let result = self.emit(&cell.borrow(), inner, &env);
                    self.path.pop();
                    result
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Array(element) => match value {
                Value::Array(cell) => {
                    if self.emit_alias(cell.id()) {
                        return Ok(());
                    }
                    self.out.push('[');
                    let items = cell.borrow();
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            self.out.push_str(", ");
                        }
                        self.path.push(i.to_string());
                        let result = self.emit(item, element, &env);
                        self.path.pop();
                        result?;
                    }
                    self.out.push(']');
                    Ok(())
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Set(element) => match value {
                Value::Set(cell) => {
                    if self.emit_alias(cell.id()) {
                        return Ok(());
                    }
                    self.out.push('{');
                    let set = cell.borrow();
                    for (i, item) in set.iter().enumerate() {
                        if i > 0 {
                            self.out.push(',');
                        }
                        self.path.push(i.to_string());
                        let result = self.emit(item, element, &env);
                        self.path.pop();
                        result?;
                    }
                    self.out.push('}');
                    Ok(())
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Dict(key_ty, value_ty) => match value {
                Value::Dict(cell) => {
                    if self.emit_alias(cell.id()) {
                        return Ok(());
                    }
                    let map = cell.borrow();
                    if map.is_empty() {
                        self.out.push_str("{:}");
                        return Ok(());
                    }
                    self.out.push('{');
                    for (i, (k, v)) in map.iter().enumerate() {
                        if i > 0 {
                            self.out.push(',');
                        }
                        self.path.push(i.to_string());
                        self.path.push(".key".to_string());
                        let key_result = self.emit(k, key_ty, &env);
                        self.path.pop();
                        key_result?;
                        self.out.push(':');
                        self.path.push(".value".to_string());
                        let value_result = self.emit(v, value_ty, &env);
                        self.path.pop();
                        self.path.pop();
                        value_result?;
                    }
                    self.out.push('}');
                    Ok(())
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Struct(fields) => match value {
                Value::Struct(entries) if entries.len() == fields.len() => {
                    self.out.push('(');
                    for (i, (field, (name, item))) in
                        fields.iter().zip(entries.iter()).enumerate()
                    {
                        if field.name != *name {
                            return Err(self.mismatch(ty, value));
                        }
                        if i > 0 {
                            self.out.push_str(", ");
                        }
                        self.out.push_str(&identifier(&field.name));
                        self.out.push('=');
                        self.path.push(format!(".{}", field.name));
                        let result = self.emit(item, &field.ty, &env);
                        self.path.pop();
                        result?;
                    }
                    self.out.push(')');
                    Ok(())
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Variant(cases) => match value {
                Value::Variant(tag, payload) => {
                    let Some(case) = cases.iter().find(|c| c.tag == *tag) else {
                        return Err(self.fail(&format!("unknown variant tag .{tag}")));
                    };
                    self.out.push('.');
                    self.out.push_str(&identifier(tag));

                    let nullary = matches!(
                        unfold(&case.ty, &env),
                        Some((Type::Null, _))
                    );
                    if nullary {
                        return match payload.as_ref() {
                            Value::Null => Ok(()),
                            other => Err(self.mismatch(&case.ty, other)),
                        };
                    }

                    self.out.push(' ');
                    self.path.push(".value".to_string());
                    let result = self.emit(payload, &case.ty, &env);
                    self.path.pop();
                    result
                }
                other => Err(self.mismatch(ty, other)),
            },

            Type::Function(_) | Type::AsyncFunction(_) => match value {
                Value::Function(_) => {
                    self.out.push('λ');
                    Ok(())
                }
                other => Err(self.mismatch(ty, other)),
            },

            // unfold never yields these
            Type::Recursive(_) | Type::Rec(_) => {
                Err(self.fail("unresolved recursive descriptor"))
            }
        }
    }

    /// Emit a relative pointer if the container was already printed;
    /// otherwise record its path for later aliases.
    fn emit_alias(&mut self, id: HeapId) -> bool {
        if let Some(target) = self.seen.get(&id) {
            let pointer = RelativePointer::between(&self.path, target);
            let _ = write!(self.out, "{pointer}");
            return true;
        }
        self.seen.insert(id, self.path.clone());
        false
    }

    fn fail(&self, message: &str) -> TextError {
        TextError::Print {
            message: message.to_string(),
            path: join(&self.path),
        }
    }

    fn mismatch(&self, ty: &Type, value: &Value) -> TextError {
        self.fail(&format!("value {value} does not match type {ty}"))
    }
}

fn identifier(name: &str) -> String {
    if is_bare_identifier(name) {
        name.to_string()
    } else {
        quote_identifier(name)
    }
}

/// Float surface form: integer floats keep `.0`, specials print as
/// `NaN`, `Infinity`, `-Infinity`, `-0.0`.
fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f == f64::INFINITY {
        "Infinity".to_string()
    } else if f == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        format!("{f:?}")
    }
}
