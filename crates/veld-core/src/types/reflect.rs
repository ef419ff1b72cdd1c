use crate::{
    types::{Case, Field, Signature, Type, TypeError},
    value::Value,
};

///
/// Self-describing type values
///
/// A descriptor re-expressed as an ordinary value of `meta_type()`, so
/// descriptors travel through the generic codecs unchanged. Back-edges
/// keep their De Bruijn depth; the value is finite even when the
/// conceptual type is infinite.
///

/// The descriptor of descriptor values. This is itself a valid recursive
/// descriptor, so the meta level closes over itself.
#[must_use]
pub fn meta_type() -> Type {
    let entry = |name: &str, ty: Type| (name.to_string(), ty);

    Type::recursive(Type::variant([
        entry("Never", Type::Null),
        entry("Null", Type::Null),
        entry("Boolean", Type::Null),
        entry("Integer", Type::Null),
        entry("Float", Type::Null),
        entry("String", Type::Null),
        entry("DateTime", Type::Null),
        entry("Blob", Type::Null),
        entry("Ref", Type::Rec(1)),
        entry("Array", Type::Rec(1)),
        entry("Set", Type::Rec(1)),
        entry(
            "Dict",
            Type::structure([("key", Type::Rec(1)), ("value", Type::Rec(1))]),
        ),
        entry(
            "Struct",
            Type::array(Type::structure([
                ("name", Type::String),
                ("type", Type::Rec(1)),
            ])),
        ),
        entry(
            "Variant",
            Type::array(Type::structure([
                ("tag", Type::String),
                ("type", Type::Rec(1)),
            ])),
        ),
        entry("Function", signature_type()),
        entry("AsyncFunction", signature_type()),
        entry("Recursive", Type::Rec(1)),
        entry("Rec", Type::Integer),
    ]))
}

fn signature_type() -> Type {
    Type::structure([
        ("inputs", Type::array(Type::Rec(1))),
        ("output", Type::Rec(1)),
        ("platforms", Type::array(Type::String)),
    ])
}

impl Type {
    /// Convert the descriptor into its self-describing value form.
    #[must_use]
    pub fn type_value(&self) -> Value {
        let nullary = |tag: &str| Value::variant(tag, Value::Null);
        match self {
            Self::Never => nullary("Never"),
            Self::Null => nullary("Null"),
            Self::Boolean => nullary("Boolean"),
            Self::Integer => nullary("Integer"),
            Self::Float => nullary("Float"),
            Self::String => nullary("String"),
            Self::DateTime => nullary("DateTime"),
            Self::Blob => nullary("Blob"),
            Self::Ref(inner) => Value::variant("Ref", inner.type_value()),
            Self::Array(inner) => Value::variant("Array", inner.type_value()),
            Self::Set(inner) => Value::variant("Set", inner.type_value()),
            Self::Dict(key, value) => Value::variant(
                "Dict",
                Value::structure([("key", key.type_value()), ("value", value.type_value())]),
            ),
            Self::Struct(fields) => Value::variant(
                "Struct",
                Value::array(
                    fields
                        .iter()
                        .map(|f| {
                            Value::structure([
                                ("name", Value::from(f.name.as_str())),
                                ("type", f.ty.type_value()),
                            ])
                        })
                        .collect(),
                ),
            ),
            Self::Variant(cases) => Value::variant(
                "Variant",
                Value::array(
                    cases
                        .iter()
                        .map(|c| {
                            Value::structure([
                                ("tag", Value::from(c.tag.as_str())),
                                ("type", c.ty.type_value()),
                            ])
                        })
                        .collect(),
                ),
            ),
            Self::Function(sig) => Value::variant("Function", signature_value(sig)),
            Self::AsyncFunction(sig) => Value::variant("AsyncFunction", signature_value(sig)),
            Self::Recursive(body) => Value::variant("Recursive", body.type_value()),
            Self::Rec(depth) => Value::variant("Rec", Value::Integer(i64::from(*depth))),
        }
    }

    /// Reconstruct a descriptor from its self-describing value form.
    pub fn from_type_value(value: &Value) -> Result<Self, TypeError> {
        from_value_at(value, 0)
    }
}

fn signature_value(sig: &Signature) -> Value {
    Value::structure([
        (
            "inputs",
            Value::array(sig.inputs.iter().map(Type::type_value).collect()),
        ),
        ("output", sig.output.type_value()),
        (
            "platforms",
            Value::array(
                sig.platforms
                    .iter()
                    .map(|p| Value::from(p.as_str()))
                    .collect(),
            ),
        ),
    ])
}

fn from_value_at(value: &Value, binders: usize) -> Result<Type, TypeError> {
    let Some((tag, payload)) = value.as_variant() else {
        return Err(TypeError::Malformed(format!(
            "expected a variant type value, found {value}"
        )));
    };

    let nullary = |ty: Type| {
        if matches!(payload, Value::Null) {
            Ok(ty)
        } else {
            Err(TypeError::Malformed(format!(
                "case {tag} carries no payload"
            )))
        }
    };

    match tag {
        "Never" => nullary(Type::Never),
        "Null" => nullary(Type::Null),
        "Boolean" => nullary(Type::Boolean),
        "Integer" => nullary(Type::Integer),
        "Float" => nullary(Type::Float),
        "String" => nullary(Type::String),
        "DateTime" => nullary(Type::DateTime),
        "Blob" => nullary(Type::Blob),
        "Ref" => Ok(Type::reference(from_value_at(payload, binders)?)),
        "Array" => Ok(Type::array(from_value_at(payload, binders)?)),
        "Set" => Ok(Type::set(from_value_at(payload, binders)?)),
        "Dict" => {
            let key = struct_field(payload, "key")?;
            let value = struct_field(payload, "value")?;
            Ok(Type::dict(
                from_value_at(&key, binders)?,
                from_value_at(&value, binders)?,
            ))
        }
        "Struct" => {
            let mut fields = Vec::new();
            for entry in array_items(payload)? {
                let name = string_field(&entry, "name")?;
                let ty = from_value_at(&struct_field(&entry, "type")?, binders)?;
                fields.push(Field { name, ty });
            }
            Ok(Type::Struct(fields))
        }
        "Variant" => {
            let mut cases = Vec::new();
            for entry in array_items(payload)? {
                let case_tag = string_field(&entry, "tag")?;
                let ty = from_value_at(&struct_field(&entry, "type")?, binders)?;
                cases.push(Case { tag: case_tag, ty });
            }
            Ok(Type::Variant(cases))
        }
        "Function" => Ok(Type::Function(signature_from_value(payload, binders)?)),
        "AsyncFunction" => Ok(Type::AsyncFunction(signature_from_value(payload, binders)?)),
        "Recursive" => Ok(Type::recursive(from_value_at(payload, binders + 1)?)),
        "Rec" => {
            let Some(depth) = payload.as_integer() else {
                return Err(TypeError::Malformed(
                    "Rec payload must be an integer depth".to_string(),
                ));
            };
            let depth = u32::try_from(depth)
                .map_err(|_| TypeError::Malformed(format!("negative Rec depth {depth}")))?;
            if depth == 0 || depth as usize > binders {
                return Err(TypeError::BadDepth { depth, binders });
            }
            Ok(Type::Rec(depth))
        }
        other => Err(TypeError::UnknownTag(other.to_string())),
    }
}

fn signature_from_value(payload: &Value, binders: usize) -> Result<Signature, TypeError> {
    let mut inputs = Vec::new();
    for input in array_items(&struct_field(payload, "inputs")?)? {
        inputs.push(from_value_at(&input, binders)?);
    }
    let output = from_value_at(&struct_field(payload, "output")?, binders)?;
    let mut platforms = Vec::new();
    for platform in array_items(&struct_field(payload, "platforms")?)? {
        let Some(name) = platform.as_str() else {
            return Err(TypeError::Malformed(
                "platform names must be strings".to_string(),
            ));
        };
        platforms.push(name.to_string());
    }
    Ok(Signature {
        inputs,
        output: Box::new(output),
        platforms,
    })
}

fn struct_field(value: &Value, name: &str) -> Result<Value, TypeError> {
    value
        .as_struct()
        .and_then(|fields| fields.iter().find(|(n, _)| n == name))
        .map(|(_, v)| v.clone())
        .ok_or_else(|| TypeError::Malformed(format!("missing struct field {name}")))
}

fn string_field(value: &Value, name: &str) -> Result<String, TypeError> {
    let field = struct_field(value, name)?;
    field
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| TypeError::Malformed(format!("field {name} must be a string")))
}

fn array_items(value: &Value) -> Result<Vec<Value>, TypeError> {
    match value {
        Value::Array(items) => Ok(items.borrow().clone()),
        other => Err(TypeError::Malformed(format!(
            "expected an array payload, found {other}"
        ))),
    }
}
