use crate::{
    location::{Label, Location},
    node::{Capture, MatchCase, Node, NodeKind, Param},
};
use thiserror::Error as ThisError;
use veld_core::{
    text,
    types::{Type, TypeError, meta_type},
    value::Value,
};

///
/// Homoiconic IR
///
/// `ir_type()` is an ordinary recursive descriptor for the whole node
/// set, so IR trees convert to plain values and travel through the
/// generic codecs unchanged. `Value` node literals are carried in the
/// textual surface form next to their self-described type, which keeps
/// the descriptor static while the literal's type varies per node.
///

///
/// ReflectError
///

#[derive(Debug, ThisError)]
pub enum ReflectError {
    #[error("malformed IR value: {0}")]
    Malformed(String),

    #[error(transparent)]
    Text(#[from] text::TextError),

    #[error(transparent)]
    Type(#[from] TypeError),
}

fn location_type() -> Type {
    Type::structure([
        ("file", Type::String),
        ("line", Type::Integer),
        ("column", Type::Integer),
    ])
}

fn label_type() -> Type {
    Type::structure([
        ("name", Type::String),
        ("id", Type::Integer),
        ("location", location_type()),
    ])
}

fn param_type() -> Type {
    Type::structure([
        ("name", Type::String),
        ("id", Type::Integer),
        ("type", meta_type()),
    ])
}

const NODE: fn() -> Type = || Type::Rec(1);

/// The descriptor of IR nodes.
#[must_use]
pub fn ir_type() -> Type {
    let common = |extra: Vec<(&'static str, Type)>| {
        let mut fields = vec![("type", meta_type()), ("location", location_type())];
        fields.extend(extra);
        Type::structure(fields)
    };

    Type::recursive(Type::variant([
        ("Error", common(vec![("message", Type::String)])),
        (
            "TryCatch",
            common(vec![("body", NODE()), ("handler", NODE())]),
        ),
        ("Value", common(vec![("literal", Type::String)])),
        (
            "Variable",
            common(vec![("name", Type::String), ("id", Type::Integer)]),
        ),
        (
            "Let",
            common(vec![
                ("name", Type::String),
                ("id", Type::Integer),
                ("mutable", Type::Boolean),
                ("captured", Type::Boolean),
                ("value", NODE()),
            ]),
        ),
        (
            "Assign",
            common(vec![
                ("name", Type::String),
                ("id", Type::Integer),
                ("value", NODE()),
            ]),
        ),
        ("As", common(vec![("value", NODE())])),
        (
            "Function",
            common(vec![
                ("inputs", Type::array(param_type())),
                ("output", meta_type()),
                ("body", NODE()),
                ("captures", Type::array(param_type())),
            ]),
        ),
        (
            "AsyncFunction",
            common(vec![
                ("inputs", Type::array(param_type())),
                ("output", meta_type()),
                ("body", NODE()),
                ("captures", Type::array(param_type())),
            ]),
        ),
        (
            "Call",
            common(vec![("function", NODE()), ("arguments", Type::array(NODE()))]),
        ),
        (
            "CallAsync",
            common(vec![("function", NODE()), ("arguments", Type::array(NODE()))]),
        ),
        ("NewRef", common(vec![("value", NODE())])),
        ("NewArray", common(vec![("elements", Type::array(NODE()))])),
        ("NewSet", common(vec![("elements", Type::array(NODE()))])),
        (
            "NewDict",
            common(vec![(
                "entries",
                Type::array(Type::structure([("key", NODE()), ("value", NODE())])),
            )]),
        ),
        (
            "Struct",
            common(vec![(
                "fields",
                Type::array(Type::structure([
                    ("name", Type::String),
                    ("value", NODE()),
                ])),
            )]),
        ),
        (
            "GetField",
            common(vec![("target", NODE()), ("field", Type::String)]),
        ),
        (
            "Variant",
            common(vec![("tag", Type::String), ("value", NODE())]),
        ),
        (
            "Block",
            common(vec![
                ("statements", Type::array(NODE())),
                ("result", NODE()),
            ]),
        ),
        (
            "IfElse",
            common(vec![
                ("condition", NODE()),
                ("then", NODE()),
                ("else", NODE()),
            ]),
        ),
        (
            "Match",
            common(vec![
                ("subject", NODE()),
                (
                    "cases",
                    Type::array(Type::structure([
                        ("tag", Type::String),
                        (
                            "binding",
                            Type::variant([("none", Type::Null), ("some", param_type())]),
                        ),
                        ("body", NODE()),
                    ])),
                ),
            ]),
        ),
        ("UnwrapRecursive", common(vec![("value", NODE())])),
        ("WrapRecursive", common(vec![("value", NODE())])),
        (
            "While",
            common(vec![
                ("label", label_type()),
                ("condition", NODE()),
                ("body", NODE()),
            ]),
        ),
        (
            "ForArray",
            common(vec![
                ("label", label_type()),
                ("binding", param_type()),
                ("array", NODE()),
                ("body", NODE()),
            ]),
        ),
        (
            "ForSet",
            common(vec![
                ("label", label_type()),
                ("binding", param_type()),
                ("set", NODE()),
                ("body", NODE()),
            ]),
        ),
        (
            "ForDict",
            common(vec![
                ("label", label_type()),
                ("key", param_type()),
                ("value", param_type()),
                ("dict", NODE()),
                ("body", NODE()),
            ]),
        ),
        ("Return", common(vec![("value", NODE())])),
        ("Continue", common(vec![("label", label_type())])),
        ("Break", common(vec![("label", label_type())])),
        (
            "Builtin",
            common(vec![
                ("name", Type::String),
                ("typeArgs", Type::array(meta_type())),
                ("arguments", Type::array(NODE())),
            ]),
        ),
        (
            "Platform",
            common(vec![("name", Type::String), ("arguments", Type::array(NODE()))]),
        ),
    ]))
}

///
/// ENCODING
///

fn location_value(location: &Location) -> Value {
    Value::structure([
        ("file", Value::from(location.file.as_str())),
        ("line", Value::Integer(i64::from(location.line))),
        ("column", Value::Integer(i64::from(location.column))),
    ])
}

fn label_value(label: &Label) -> Value {
    Value::structure([
        ("name", Value::from(label.name.as_str())),
        ("id", Value::Integer(i64::from(label.id))),
        ("location", location_value(&label.location)),
    ])
}

fn param_value(name: &str, id: u32, ty: &Type) -> Value {
    Value::structure([
        ("name", Value::from(name)),
        ("id", Value::Integer(i64::from(id))),
        ("type", ty.type_value()),
    ])
}

fn nodes_value(nodes: &[Node]) -> Result<Value, ReflectError> {
    Ok(Value::array(
        nodes.iter().map(Node::to_value).collect::<Result<_, _>>()?,
    ))
}

impl Node {
    /// Convert the node tree into a value of [`ir_type`].
    pub fn to_value(&self) -> Result<Value, ReflectError> {
        let mut fields = vec![
            ("type".to_string(), self.ty.type_value()),
            ("location".to_string(), location_value(&self.location)),
        ];
        let mut put = |name: &str, value: Value| fields.push((name.to_string(), value));

        match &self.kind {
            NodeKind::Error { message } => put("message", Value::from(message.as_str())),
            NodeKind::TryCatch { body, handler } => {
                put("body", body.to_value()?);
                put("handler", handler.to_value()?);
            }
            NodeKind::Value { value } => {
                put("literal", Value::from(text::print(value, &self.ty)?));
            }
            NodeKind::Variable { name, id } => {
                put("name", Value::from(name.as_str()));
                put("id", Value::Integer(i64::from(*id)));
            }
            NodeKind::Let {
                name,
                id,
                mutable,
                captured,
                value,
            } => {
                put("name", Value::from(name.as_str()));
                put("id", Value::Integer(i64::from(*id)));
                put("mutable", Value::Boolean(*mutable));
                put("captured", Value::Boolean(*captured));
                put("value", value.to_value()?);
            }
            NodeKind::Assign { name, id, value } => {
                put("name", Value::from(name.as_str()));
                put("id", Value::Integer(i64::from(*id)));
                put("value", value.to_value()?);
            }
            NodeKind::As { value }
            | NodeKind::NewRef { value }
            | NodeKind::UnwrapRecursive { value }
            | NodeKind::WrapRecursive { value }
            | NodeKind::Return { value } => put("value", value.to_value()?),
            NodeKind::Function {
                inputs,
                output,
                body,
                captures,
            }
            | NodeKind::AsyncFunction {
                inputs,
                output,
                body,
                captures,
            } => {
                put(
                    "inputs",
                    Value::array(
                        inputs
                            .iter()
                            .map(|p| param_value(&p.name, p.id, &p.ty))
                            .collect(),
                    ),
                );
                put("output", output.type_value());
                put("body", body.to_value()?);
                put(
                    "captures",
                    Value::array(
                        captures
                            .iter()
                            .map(|c| param_value(&c.name, c.id, &c.ty))
                            .collect(),
                    ),
                );
            }
            NodeKind::Call {
                function,
                arguments,
            }
            | NodeKind::CallAsync {
                function,
                arguments,
            } => {
                put("function", function.to_value()?);
                put("arguments", nodes_value(arguments)?);
            }
            NodeKind::NewArray { elements } | NodeKind::NewSet { elements } => {
                put("elements", nodes_value(elements)?);
            }
            NodeKind::NewDict { entries } => {
                let mut out = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    out.push(Value::structure([
                        ("key", key.to_value()?),
                        ("value", value.to_value()?),
                    ]));
                }
                put("entries", Value::array(out));
            }
            NodeKind::Struct { fields: members } => {
                let mut out = Vec::with_capacity(members.len());
                for (name, value) in members {
                    out.push(Value::structure([
                        ("name", Value::from(name.as_str())),
                        ("value", value.to_value()?),
                    ]));
                }
                put("fields", Value::array(out));
            }
            NodeKind::GetField { target, field } => {
                put("target", target.to_value()?);
                put("field", Value::from(field.as_str()));
            }
            NodeKind::Variant { tag, value } => {
                put("tag", Value::from(tag.as_str()));
                put("value", value.to_value()?);
            }
            NodeKind::Block { statements, result } => {
                put("statements", nodes_value(statements)?);
                put("result", result.to_value()?);
            }
            NodeKind::IfElse {
                condition,
                then_branch,
                else_branch,
            } => {
                put("condition", condition.to_value()?);
                put("then", then_branch.to_value()?);
                put("else", else_branch.to_value()?);
            }
            NodeKind::Match { subject, cases } => {
                put("subject", subject.to_value()?);
                let mut out = Vec::with_capacity(cases.len());
                for case in cases {
                    let binding = case.binding.as_ref().map_or_else(
                        || Value::variant("none", Value::Null),
                        |p| Value::variant("some", param_value(&p.name, p.id, &p.ty)),
                    );
                    out.push(Value::structure([
                        ("tag", Value::from(case.tag.as_str())),
                        ("binding", binding),
                        ("body", case.body.to_value()?),
                    ]));
                }
                put("cases", Value::array(out));
            }
            NodeKind::While {
                label,
                condition,
                body,
            } => {
                put("label", label_value(label));
                put("condition", condition.to_value()?);
                put("body", body.to_value()?);
            }
            NodeKind::ForArray {
                label,
                binding,
                array,
                body,
            } => {
                put("label", label_value(label));
                put("binding", param_value(&binding.name, binding.id, &binding.ty));
                put("array", array.to_value()?);
                put("body", body.to_value()?);
            }
            NodeKind::ForSet {
                label,
                binding,
                set,
                body,
            } => {
                put("label", label_value(label));
                put("binding", param_value(&binding.name, binding.id, &binding.ty));
                put("set", set.to_value()?);
                put("body", body.to_value()?);
            }
            NodeKind::ForDict {
                label,
                key_binding,
                value_binding,
                dict,
                body,
            } => {
                put("label", label_value(label));
                put(
                    "key",
                    param_value(&key_binding.name, key_binding.id, &key_binding.ty),
                );
                put(
                    "value",
                    param_value(&value_binding.name, value_binding.id, &value_binding.ty),
                );
                put("dict", dict.to_value()?);
                put("body", body.to_value()?);
            }
            NodeKind::Continue { label } | NodeKind::Break { label } => {
                put("label", label_value(label));
            }
            NodeKind::Builtin {
                name,
                type_args,
                arguments,
            } => {
                put("name", Value::from(name.as_str()));
                put(
                    "typeArgs",
                    Value::array(type_args.iter().map(Type::type_value).collect()),
                );
                put("arguments", nodes_value(arguments)?);
            }
            NodeKind::Platform { name, arguments } => {
                put("name", Value::from(name.as_str()));
                put("arguments", nodes_value(arguments)?);
            }
        }

        Ok(Value::Variant(
            self.kind_name().to_string(),
            Box::new(Value::Struct(fields)),
        ))
    }

    /// Reconstruct a node tree from a value of [`ir_type`].
    pub fn from_value(value: &Value) -> Result<Self, ReflectError> {
        let Some((tag, payload)) = value.as_variant() else {
            return Err(ReflectError::Malformed("expected a variant node".into()));
        };

        let ty = Type::from_type_value(field(payload, "type")?)?;
        let location = location_from(field(payload, "location")?)?;

        let kind = match tag {
            "Error" => NodeKind::Error {
                message: str_field(payload, "message")?,
            },
            "TryCatch" => NodeKind::TryCatch {
                body: node_field(payload, "body")?,
                handler: node_field(payload, "handler")?,
            },
            "Value" => {
                let literal = str_field(payload, "literal")?;
                NodeKind::Value {
                    value: text::parse(&literal, &ty)?,
                }
            }
            "Variable" => NodeKind::Variable {
                name: str_field(payload, "name")?,
                id: id_field(payload, "id")?,
            },
            "Let" => NodeKind::Let {
                name: str_field(payload, "name")?,
                id: id_field(payload, "id")?,
                mutable: bool_field(payload, "mutable")?,
                captured: bool_field(payload, "captured")?,
                value: node_field(payload, "value")?,
            },
            "Assign" => NodeKind::Assign {
                name: str_field(payload, "name")?,
                id: id_field(payload, "id")?,
                value: node_field(payload, "value")?,
            },
            "As" => NodeKind::As {
                value: node_field(payload, "value")?,
            },
            "Function" => NodeKind::Function {
                inputs: params_field(payload, "inputs")?,
                output: Type::from_type_value(field(payload, "output")?)?,
                body: node_field(payload, "body")?,
                captures: captures_field(payload, "captures")?,
            },
            "AsyncFunction" => NodeKind::AsyncFunction {
                inputs: params_field(payload, "inputs")?,
                output: Type::from_type_value(field(payload, "output")?)?,
                body: node_field(payload, "body")?,
                captures: captures_field(payload, "captures")?,
            },
            "Call" => NodeKind::Call {
                function: node_field(payload, "function")?,
                arguments: nodes_field(payload, "arguments")?,
            },
            "CallAsync" => NodeKind::CallAsync {
                function: node_field(payload, "function")?,
                arguments: nodes_field(payload, "arguments")?,
            },
            "NewRef" => NodeKind::NewRef {
                value: node_field(payload, "value")?,
            },
            "NewArray" => NodeKind::NewArray {
                elements: nodes_field(payload, "elements")?,
            },
            "NewSet" => NodeKind::NewSet {
                elements: nodes_field(payload, "elements")?,
            },
            "NewDict" => {
                let mut entries = Vec::new();
                for entry in items(field(payload, "entries")?)? {
                    entries.push((
                        Self::from_value(field(&entry, "key")?)?,
                        Self::from_value(field(&entry, "value")?)?,
                    ));
                }
                NodeKind::NewDict { entries }
            }
            "Struct" => {
                let mut members = Vec::new();
                for entry in items(field(payload, "fields")?)? {
                    members.push((
                        str_field(&entry, "name")?,
                        Self::from_value(field(&entry, "value")?)?,
                    ));
                }
                NodeKind::Struct { fields: members }
            }
            "GetField" => NodeKind::GetField {
                target: node_field(payload, "target")?,
                field: str_field(payload, "field")?,
            },
            "Variant" => NodeKind::Variant {
                tag: str_field(payload, "tag")?,
                value: node_field(payload, "value")?,
            },
            "Block" => NodeKind::Block {
                statements: nodes_field(payload, "statements")?,
                result: node_field(payload, "result")?,
            },
            "IfElse" => NodeKind::IfElse {
                condition: node_field(payload, "condition")?,
                then_branch: node_field(payload, "then")?,
                else_branch: node_field(payload, "else")?,
            },
            "Match" => {
                let subject = node_field(payload, "subject")?;
                let mut cases = Vec::new();
                for entry in items(field(payload, "cases")?)? {
                    let binding = match field(&entry, "binding")?.as_variant() {
                        Some(("none", _)) => None,
                        Some(("some", inner)) => Some(param_from(inner)?),
                        _ => {
                            return Err(ReflectError::Malformed(
                                "match binding must be .none or .some".into(),
                            ));
                        }
                    };
                    cases.push(MatchCase {
                        tag: str_field(&entry, "tag")?,
                        binding,
                        body: Self::from_value(field(&entry, "body")?)?,
                    });
                }
                NodeKind::Match { subject, cases }
            }
            "UnwrapRecursive" => NodeKind::UnwrapRecursive {
                value: node_field(payload, "value")?,
            },
            "WrapRecursive" => NodeKind::WrapRecursive {
                value: node_field(payload, "value")?,
            },
            "While" => NodeKind::While {
                label: label_from(field(payload, "label")?)?,
                condition: node_field(payload, "condition")?,
                body: node_field(payload, "body")?,
            },
            "ForArray" => NodeKind::ForArray {
                label: label_from(field(payload, "label")?)?,
                binding: param_from(field(payload, "binding")?)?,
                array: node_field(payload, "array")?,
                body: node_field(payload, "body")?,
            },
            "ForSet" => NodeKind::ForSet {
                label: label_from(field(payload, "label")?)?,
                binding: param_from(field(payload, "binding")?)?,
                set: node_field(payload, "set")?,
                body: node_field(payload, "body")?,
            },
            "ForDict" => NodeKind::ForDict {
                label: label_from(field(payload, "label")?)?,
                key_binding: param_from(field(payload, "key")?)?,
                value_binding: param_from(field(payload, "value")?)?,
                dict: node_field(payload, "dict")?,
                body: node_field(payload, "body")?,
            },
            "Return" => NodeKind::Return {
                value: node_field(payload, "value")?,
            },
            "Continue" => NodeKind::Continue {
                label: label_from(field(payload, "label")?)?,
            },
            "Break" => NodeKind::Break {
                label: label_from(field(payload, "label")?)?,
            },
            "Builtin" => {
                let mut type_args = Vec::new();
                for arg in items(field(payload, "typeArgs")?)? {
                    type_args.push(Type::from_type_value(&arg)?);
                }
                NodeKind::Builtin {
                    name: str_field(payload, "name")?,
                    type_args,
                    arguments: nodes_field(payload, "arguments")?,
                }
            }
            "Platform" => NodeKind::Platform {
                name: str_field(payload, "name")?,
                arguments: nodes_field(payload, "arguments")?,
            },
            other => {
                return Err(ReflectError::Malformed(format!("unknown node tag {other}")));
            }
        };

        Ok(Self::new(ty, location, kind))
    }
}

///
/// DECODING HELPERS
///

fn field<'v>(payload: &'v Value, name: &str) -> Result<&'v Value, ReflectError> {
    payload
        .as_struct()
        .and_then(|fields| fields.iter().find(|(n, _)| n == name))
        .map(|(_, v)| v)
        .ok_or_else(|| ReflectError::Malformed(format!("missing field {name}")))
}

fn str_field(payload: &Value, name: &str) -> Result<String, ReflectError> {
    field(payload, name)?
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| ReflectError::Malformed(format!("field {name} must be a string")))
}

fn bool_field(payload: &Value, name: &str) -> Result<bool, ReflectError> {
    field(payload, name)?
        .as_boolean()
        .ok_or_else(|| ReflectError::Malformed(format!("field {name} must be a boolean")))
}

fn id_field(payload: &Value, name: &str) -> Result<u32, ReflectError> {
    let raw = field(payload, name)?
        .as_integer()
        .ok_or_else(|| ReflectError::Malformed(format!("field {name} must be an integer")))?;
    u32::try_from(raw)
        .map_err(|_| ReflectError::Malformed(format!("field {name} out of range: {raw}")))
}

fn items(value: &Value) -> Result<Vec<Value>, ReflectError> {
    match value {
        Value::Array(cell) => Ok(cell.borrow().clone()),
        _ => Err(ReflectError::Malformed("expected an array".into())),
    }
}

fn node_field(payload: &Value, name: &str) -> Result<Box<Node>, ReflectError> {
    Ok(Box::new(Node::from_value(field(payload, name)?)?))
}

fn nodes_field(payload: &Value, name: &str) -> Result<Vec<Node>, ReflectError> {
    items(field(payload, name)?)?
        .iter()
        .map(Node::from_value)
        .collect()
}

fn location_from(value: &Value) -> Result<Location, ReflectError> {
    Ok(Location {
        file: str_field(value, "file")?,
        line: id_field(value, "line")?,
        column: id_field(value, "column")?,
    })
}

fn label_from(value: &Value) -> Result<Label, ReflectError> {
    Ok(Label {
        name: str_field(value, "name")?,
        id: id_field(value, "id")?,
        location: location_from(field(value, "location")?)?,
    })
}

fn param_from(value: &Value) -> Result<Param, ReflectError> {
    Ok(Param {
        name: str_field(value, "name")?,
        id: id_field(value, "id")?,
        ty: Type::from_type_value(field(value, "type")?)?,
    })
}

fn params_field(payload: &Value, name: &str) -> Result<Vec<Param>, ReflectError> {
    items(field(payload, name)?)?.iter().map(param_from).collect()
}

fn captures_field(payload: &Value, name: &str) -> Result<Vec<Capture>, ReflectError> {
    items(field(payload, name)?)?
        .iter()
        .map(|v| {
            let param = param_from(v)?;
            Ok(Capture {
                name: param.name,
                id: param.id,
                ty: param.ty,
            })
        })
        .collect()
}
