mod scope;


use crate::{
    ast::{Ast, AstKind},
    builtins,
    location::Location,
    node::{Capture, MatchCase, Node, NodeKind, Param},
};
use rustc_hash::FxHashSet;
use scope::Scopes;
use thiserror::Error as ThisError;
use veld_core::types::{Type, is_subtype};

///
/// ResolveError
///
/// Conversion errors carry one growing message: each node appends its
/// kind and source location as the error unwinds, so the outermost
/// caller sees the full chain from failure site to entry point.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("{message}")]
pub struct ResolveError {
    pub message: String,
}

impl ResolveError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    fn at(mut self, kind: &str, name: Option<&str>, location: &Location) -> Self {
        match name {
            Some(name) => {
                self.message
                    .push_str(&format!(" at {kind} node `{name}` located at {location}"));
            }
            None => {
                self.message
                    .push_str(&format!(" at {kind} node located at {location}"));
            }
        }
        self
    }
}

///
/// Resolution
///
/// Turns the unresolved surface tree into IR: names become numbered
/// bindings, implicit subtype steps become explicit `As` nodes, loops
/// and locals are numbered, and captures are recorded on the functions
/// that close over them and marked on their source declarations.
///

pub fn resolve(ast: &Ast) -> Result<Node, ResolveError> {
    let mut resolver = Resolver {
        scopes: Scopes::new(),
        in_progress: FxHashSet::default(),
    };
    let mut node = resolver.node(ast)?;
    let captured = resolver.scopes.captured_flags();
    finalize_captures(&mut node, &captured);
    Ok(node)
}

struct Resolver {
    scopes: Scopes,
    // syntax nodes currently on the walk stack; re-entry is a cycle
    in_progress: FxHashSet<usize>,
}

impl Resolver {
    fn node(&mut self, ast: &Ast) -> Result<Node, ResolveError> {
        if !self.in_progress.insert(ast.key()) {
            return Err(ResolveError::new(
                "circular reference in the syntax graph",
            ));
        }
        let result = self.kind(ast);
        self.in_progress.remove(&ast.key());

        let name = match ast.kind() {
            AstKind::Builtin { name, .. } | AstKind::Platform { name, .. } => Some(name.as_str()),
            _ => None,
        };
        result.map_err(|e| e.at(ast.kind_name(), name, ast.location()))
    }

    /// Resolve and coerce into an expected type, inserting an `As` node
    /// for proper subtype steps and failing otherwise.
    fn coerced(&mut self, ast: &Ast, expected: &Type) -> Result<Node, ResolveError> {
        let node = self.node(ast)?;
        self.coerce(node, expected)
    }

    fn coerce(&self, node: Node, expected: &Type) -> Result<Node, ResolveError> {
        if node.ty == *expected {
            return Ok(node);
        }
        if is_subtype(&node.ty, expected) {
            let location = node.location.clone();
            return Ok(Node::new(
                expected.clone(),
                location,
                NodeKind::As {
                    value: Box::new(node),
                },
            ));
        }
        Err(ResolveError::new(format!(
            "cannot coerce {} to {}",
            node.ty, expected
        )))
    }

    #[allow(clippy::too_many_lines)]
    fn kind(&mut self, ast: &Ast) -> Result<Node, ResolveError> {
        let location = ast.location().clone();
        match ast.kind() {
            AstKind::Error { ty, message } => Ok(Node::new(
                ty.clone(),
                location,
                NodeKind::Error {
                    message: message.clone(),
                },
            )),

            AstKind::TryCatch { body, handler } => {
                let body = self.node(body)?;
                let handler = self.coerced(handler, &body.ty)?;
                Ok(Node::new(
                    body.ty.clone(),
                    location,
                    NodeKind::TryCatch {
                        body: Box::new(body),
                        handler: Box::new(handler),
                    },
                ))
            }

            AstKind::Value { ty, value } => {
                if !value.type_check(ty) {
                    return Err(ResolveError::new(format!(
                        "literal does not inhabit type {ty}"
                    )));
                }
                Ok(Node::new(
                    ty.clone(),
                    location,
                    NodeKind::Value {
                        value: value.clone(),
                    },
                ))
            }

            AstKind::Variable { name } => {
                let Some(binding) = self.scopes.lookup(name) else {
                    return Err(ResolveError::new(format!("unresolved variable `{name}`")));
                };
                Ok(Node::new(
                    binding.ty.clone(),
                    location,
                    NodeKind::Variable {
                        name: name.clone(),
                        id: binding.id,
                    },
                ))
            }

            AstKind::Let {
                name,
                mutable,
                ty,
                value,
            } => {
                let value = match ty {
                    Some(declared) => self.coerced(value, declared)?,
                    None => self.node(value)?,
                };
                let id = self.scopes.declare(name, value.ty.clone(), *mutable);
                Ok(Node::new(
                    Type::Null,
                    location,
                    NodeKind::Let {
                        name: name.clone(),
                        id,
                        mutable: *mutable,
                        captured: false,
                        value: Box::new(value),
                    },
                ))
            }

            AstKind::Assign { name, value } => {
                let Some(binding) = self.scopes.lookup(name) else {
                    return Err(ResolveError::new(format!("unresolved variable `{name}`")));
                };
                if !binding.mutable {
                    return Err(ResolveError::new(format!(
                        "cannot assign to immutable binding `{name}`"
                    )));
                }
                let (id, target_ty) = (binding.id, binding.ty.clone());
                let value = self.coerced(value, &target_ty)?;
                Ok(Node::new(
                    Type::Null,
                    location,
                    NodeKind::Assign {
                        name: name.clone(),
                        id,
                        value: Box::new(value),
                    },
                ))
            }

            AstKind::Function {
                inputs,
                output,
                body,
            } => {
                let (params, body, captures) = self.function_parts(inputs, output, body)?;
                let ty = Type::function(inputs.iter().map(|(_, t)| t.clone()).collect(), output.clone());
                Ok(Node::new(
                    ty,
                    location,
                    NodeKind::Function {
                        inputs: params,
                        output: output.clone(),
                        body: Box::new(body),
                        captures,
                    },
                ))
            }

            AstKind::AsyncFunction {
                inputs,
                output,
                body,
            } => {
                let (params, body, captures) = self.function_parts(inputs, output, body)?;
                let ty = Type::async_function(
                    inputs.iter().map(|(_, t)| t.clone()).collect(),
                    output.clone(),
                );
                Ok(Node::new(
                    ty,
                    location,
                    NodeKind::AsyncFunction {
                        inputs: params,
                        output: output.clone(),
                        body: Box::new(body),
                        captures,
                    },
                ))
            }

            AstKind::Call {
                function,
                arguments,
            } => {
                let function = self.node(function)?;
                let Type::Function(sig) = shape(&function.ty) else {
                    return Err(ResolveError::new(format!(
                        "call target has non-function type {}",
                        function.ty
                    )));
                };
                let arguments = self.arguments(arguments, &sig.inputs)?;
                Ok(Node::new(
                    (*sig.output).clone(),
                    location,
                    NodeKind::Call {
                        function: Box::new(function),
                        arguments,
                    },
                ))
            }

            AstKind::CallAsync {
                function,
                arguments,
            } => {
                let function = self.node(function)?;
                let Type::AsyncFunction(sig) = shape(&function.ty) else {
                    return Err(ResolveError::new(format!(
                        "async call target has non-async-function type {}",
                        function.ty
                    )));
                };
                let arguments = self.arguments(arguments, &sig.inputs)?;
                Ok(Node::new(
                    (*sig.output).clone(),
                    location,
                    NodeKind::CallAsync {
                        function: Box::new(function),
                        arguments,
                    },
                ))
            }

            AstKind::NewRef { value } => {
                let value = self.node(value)?;
                Ok(Node::new(
                    Type::reference(value.ty.clone()),
                    location,
                    NodeKind::NewRef {
                        value: Box::new(value),
                    },
                ))
            }

            AstKind::NewArray { element, elements } => {
                let elements = elements
                    .iter()
                    .map(|e| self.coerced(e, element))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Node::new(
                    Type::array(element.clone()),
                    location,
                    NodeKind::NewArray { elements },
                ))
            }

            AstKind::NewSet { element, elements } => {
                if !element.valid_key() {
                    return Err(ResolveError::new(format!(
                        "invalid Set key type {element}"
                    )));
                }
                let elements = elements
                    .iter()
                    .map(|e| self.coerced(e, element))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Node::new(
                    Type::set(element.clone()),
                    location,
                    NodeKind::NewSet { elements },
                ))
            }

            AstKind::NewDict {
                key,
                value,
                entries,
            } => {
                if !key.valid_key() {
                    return Err(ResolveError::new(format!("invalid Dict key type {key}")));
                }
                let entries = entries
                    .iter()
                    .map(|(k, v)| Ok((self.coerced(k, key)?, self.coerced(v, value)?)))
                    .collect::<Result<Vec<_>, ResolveError>>()?;
                Ok(Node::new(
                    Type::dict(key.clone(), value.clone()),
                    location,
                    NodeKind::NewDict { entries },
                ))
            }

            AstKind::Struct { fields } => {
                let mut resolved = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    resolved.push((name.clone(), self.node(value)?));
                }
                let ty = Type::structure(
                    resolved
                        .iter()
                        .map(|(name, node)| (name.clone(), node.ty.clone())),
                );
                Ok(Node::new(ty, location, NodeKind::Struct { fields: resolved }))
            }

            AstKind::GetField { target, field } => {
                let target = self.node(target)?;
                let Type::Struct(fields) = shape(&target.ty) else {
                    return Err(ResolveError::new(format!(
                        "field access on non-struct type {}",
                        target.ty
                    )));
                };
                let Some(found) = fields.iter().find(|f| f.name == *field) else {
                    return Err(ResolveError::new(format!(
                        "unknown field `{field}` on {}",
                        target.ty
                    )));
                };
                Ok(Node::new(
                    found.ty.clone(),
                    location,
                    NodeKind::GetField {
                        target: Box::new(target),
                        field: field.clone(),
                    },
                ))
            }

            AstKind::Variant { ty, tag, value } => {
                let Type::Variant(cases) = shape(ty) else {
                    return Err(ResolveError::new(format!(
                        "variant construction needs a variant type, got {ty}"
                    )));
                };
                let Some(case) = cases.iter().find(|c| c.tag == *tag) else {
                    return Err(ResolveError::new(format!(
                        "unknown variant tag `.{tag}` on {ty}"
                    )));
                };
                let value = self.coerced(value, &case.ty)?;
                Ok(Node::new(
                    ty.clone(),
                    location,
                    NodeKind::Variant {
                        tag: tag.clone(),
                        value: Box::new(value),
                    },
                ))
            }

            AstKind::Block { statements, result } => {
                self.scopes.push_frame();
                let mut resolved = Vec::with_capacity(statements.len());
                let mut failed = None;
                for statement in statements {
                    match self.node(statement) {
                        Ok(node) => resolved.push(node),
                        Err(e) => {
                            failed = Some(e);
                            break;
                        }
                    }
                }
                let result = match failed {
                    Some(e) => Err(e),
                    None => self.node(result),
                };
                self.scopes.pop_frame();
                let result = result?;
                Ok(Node::new(
                    result.ty.clone(),
                    location,
                    NodeKind::Block {
                        statements: resolved,
                        result: Box::new(result),
                    },
                ))
            }

            AstKind::IfElse {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.coerced(condition, &Type::Boolean)?;
                let then_branch = self.node(then_branch)?;
                let else_branch = self.coerced(else_branch, &then_branch.ty)?;
                Ok(Node::new(
                    then_branch.ty.clone(),
                    location,
                    NodeKind::IfElse {
                        condition: Box::new(condition),
                        then_branch: Box::new(then_branch),
                        else_branch: Box::new(else_branch),
                    },
                ))
            }

            AstKind::Match { subject, cases } => {
                let subject = self.node(subject)?;
                let Type::Variant(subject_cases) = shape(&subject.ty) else {
                    return Err(ResolveError::new(format!(
                        "match subject has non-variant type {}",
                        subject.ty
                    )));
                };
                if cases.is_empty() {
                    return Err(ResolveError::new("match requires at least one case"));
                }

                let mut result_ty: Option<Type> = None;
                let mut resolved = Vec::with_capacity(cases.len());
                for case in cases {
                    let Some(subject_case) =
                        subject_cases.iter().find(|c| c.tag == case.tag)
                    else {
                        return Err(ResolveError::new(format!(
                            "unknown variant tag `.{}` on {}",
                            case.tag, subject.ty
                        )));
                    };

                    self.scopes.push_frame();
                    let binding = case.binding.as_ref().map(|name| {
                        let id = self.scopes.declare(name, subject_case.ty.clone(), false);
                        Param {
                            name: name.clone(),
                            id,
                            ty: subject_case.ty.clone(),
                        }
                    });
                    let body = match &result_ty {
                        Some(expected) => self.coerced(&case.body, expected),
                        None => self.node(&case.body),
                    };
                    self.scopes.pop_frame();
                    let body = body?;
                    if result_ty.is_none() {
                        result_ty = Some(body.ty.clone());
                    }
                    resolved.push(MatchCase {
                        tag: case.tag.clone(),
                        binding,
                        body,
                    });
                }

                let ty = result_ty.unwrap_or(Type::Never);
                Ok(Node::new(
                    ty,
                    location,
                    NodeKind::Match {
                        subject: Box::new(subject),
                        cases: resolved,
                    },
                ))
            }

            AstKind::UnwrapRecursive { value } => {
                let value = self.node(value)?;
                let Some(unrolled) = value.ty.unroll() else {
                    return Err(ResolveError::new(format!(
                        "unwrap target has non-recursive type {}",
                        value.ty
                    )));
                };
                Ok(Node::new(
                    unrolled,
                    location,
                    NodeKind::UnwrapRecursive {
                        value: Box::new(value),
                    },
                ))
            }

            AstKind::WrapRecursive { ty, value } => {
                let Some(unrolled) = ty.unroll() else {
                    return Err(ResolveError::new(format!(
                        "wrap target type {ty} is not recursive"
                    )));
                };
                let value = self.coerced(value, &unrolled)?;
                Ok(Node::new(
                    ty.clone(),
                    location,
                    NodeKind::WrapRecursive {
                        value: Box::new(value),
                    },
                ))
            }

            AstKind::While {
                label,
                condition,
                body,
            } => {
                let condition = self.coerced(condition, &Type::Boolean)?;
                let label = self.scopes.push_label(label, &location);
                let body = self.node(body);
                self.scopes.pop_label();
                Ok(Node::new(
                    Type::Null,
                    location,
                    NodeKind::While {
                        label,
                        condition: Box::new(condition),
                        body: Box::new(body?),
                    },
                ))
            }

            AstKind::ForArray {
                label,
                binding,
                array,
                body,
            } => {
                let array = self.node(array)?;
                let Type::Array(element) = shape(&array.ty) else {
                    return Err(ResolveError::new(format!(
                        "for-array over non-array type {}",
                        array.ty
                    )));
                };
                let (label, binding, body) =
                    self.loop_parts(label, &[(binding.as_str(), (*element).clone())], body, &location)?;
                let Some(binding) = binding.into_iter().next() else {
                    return Err(ResolveError::new("missing loop binding"));
                };
                Ok(Node::new(
                    Type::Null,
                    location,
                    NodeKind::ForArray {
                        label,
                        binding,
                        array: Box::new(array),
                        body: Box::new(body),
                    },
                ))
            }

            AstKind::ForSet {
                label,
                binding,
                set,
                body,
            } => {
                let set = self.node(set)?;
                let Type::Set(element) = shape(&set.ty) else {
                    return Err(ResolveError::new(format!(
                        "for-set over non-set type {}",
                        set.ty
                    )));
                };
                let (label, binding, body) =
                    self.loop_parts(label, &[(binding.as_str(), (*element).clone())], body, &location)?;
                let Some(binding) = binding.into_iter().next() else {
                    return Err(ResolveError::new("missing loop binding"));
                };
                Ok(Node::new(
                    Type::Null,
                    location,
                    NodeKind::ForSet {
                        label,
                        binding,
                        set: Box::new(set),
                        body: Box::new(body),
                    },
                ))
            }

            AstKind::ForDict {
                label,
                key_binding,
                value_binding,
                dict,
                body,
            } => {
                let dict = self.node(dict)?;
                let Type::Dict(key_ty, value_ty) = shape(&dict.ty) else {
                    return Err(ResolveError::new(format!(
                        "for-dict over non-dict type {}",
                        dict.ty
                    )));
                };
                let (label, mut bindings, body) = self.loop_parts(
                    label,
                    &[
                        (key_binding.as_str(), (*key_ty).clone()),
                        (value_binding.as_str(), (*value_ty).clone()),
                    ],
                    body,
                    &location,
                )?;
                let value_binding = bindings.pop();
                let key_binding = bindings.pop();
                let (Some(key_binding), Some(value_binding)) = (key_binding, value_binding) else {
                    return Err(ResolveError::new("missing loop bindings"));
                };
                Ok(Node::new(
                    Type::Null,
                    location,
                    NodeKind::ForDict {
                        label,
                        key_binding,
                        value_binding,
                        dict: Box::new(dict),
                        body: Box::new(body),
                    },
                ))
            }

            AstKind::Return { value } => {
                if !self.scopes.in_function() {
                    return Err(ResolveError::new("return outside of a function"));
                }
                let output = self.scopes.output_type();
                let value = self.coerced(value, &output)?;
                Ok(Node::new(
                    Type::Never,
                    location,
                    NodeKind::Return {
                        value: Box::new(value),
                    },
                ))
            }

            AstKind::Continue { label } => {
                let Some(label) = self.scopes.find_label(label) else {
                    return Err(ResolveError::new(format!(
                        "label `{label}` is not in scope"
                    )));
                };
                Ok(Node::new(Type::Never, location, NodeKind::Continue { label }))
            }

            AstKind::Break { label } => {
                let Some(label) = self.scopes.find_label(label) else {
                    return Err(ResolveError::new(format!(
                        "label `{label}` is not in scope"
                    )));
                };
                Ok(Node::new(Type::Never, location, NodeKind::Break { label }))
            }

            AstKind::Builtin {
                name,
                type_args,
                arguments,
            } => {
                let Some(builtin) = builtins::lookup(name) else {
                    return Err(ResolveError::new(format!("unknown builtin `{name}`")));
                };
                if type_args.len() != builtin.type_params {
                    return Err(ResolveError::new(format!(
                        "builtin `{name}` expects {} type parameters, got {}",
                        builtin.type_params,
                        type_args.len()
                    )));
                }
                let (inputs, output) = builtin.signature(type_args);
                let arguments = self.arguments(arguments, &inputs)?;
                Ok(Node::new(
                    output,
                    location,
                    NodeKind::Builtin {
                        name: name.clone(),
                        type_args: type_args.clone(),
                        arguments,
                    },
                ))
            }

            AstKind::Platform {
                name,
                inputs,
                output,
                arguments,
            } => {
                let arguments = self.arguments(arguments, inputs)?;
                Ok(Node::new(
                    output.clone(),
                    location,
                    NodeKind::Platform {
                        name: name.clone(),
                        arguments,
                    },
                ))
            }
        }
    }

    /// Shared shape of Function/AsyncFunction resolution.
    fn function_parts(
        &mut self,
        inputs: &[(String, Type)],
        output: &Type,
        body: &Ast,
    ) -> Result<(Vec<Param>, Node, Vec<Capture>), ResolveError> {
        self.scopes.push_function(output.clone());
        let params: Vec<Param> = inputs
            .iter()
            .map(|(name, ty)| {
                let id = self.scopes.declare(name, ty.clone(), false);
                Param {
                    name: name.clone(),
                    id,
                    ty: ty.clone(),
                }
            })
            .collect();
        let body = self
            .node(body)
            .and_then(|body| self.coerce(body, output));
        let captures = self.scopes.pop_function();
        Ok((params, body?, captures))
    }

    /// Shared shape of loop resolution: label + frame + bindings + body.
    fn loop_parts(
        &mut self,
        label: &str,
        bindings: &[(&str, Type)],
        body: &Ast,
        location: &Location,
    ) -> Result<(crate::location::Label, Vec<Param>, Node), ResolveError> {
        self.scopes.push_frame();
        let params: Vec<Param> = bindings
            .iter()
            .map(|(name, ty)| {
                let id = self.scopes.declare(name, ty.clone(), false);
                Param {
                    name: (*name).to_string(),
                    id,
                    ty: ty.clone(),
                }
            })
            .collect();
        let label = self.scopes.push_label(label, location);
        let body = self.node(body);
        self.scopes.pop_label();
        self.scopes.pop_frame();
        Ok((label, params, body?))
    }

    fn arguments(&mut self, arguments: &[Ast], inputs: &[Type]) -> Result<Vec<Node>, ResolveError> {
        if arguments.len() != inputs.len() {
            return Err(ResolveError::new(format!(
                "expected {} arguments, got {}",
                inputs.len(),
                arguments.len()
            )));
        }
        arguments
            .iter()
            .zip(inputs.iter())
            .map(|(argument, expected)| self.coerced(argument, expected))
            .collect()
    }
}

// Look through recursive binders to the underlying constructor.
fn shape(ty: &Type) -> Type {
    let mut ty = ty.clone();
    for _ in 0..64 {
        match ty.unroll() {
            Some(next) => ty = next,
            None => break,
        }
    }
    ty
}

// Copy final captured flags from the binding arena onto Let nodes.
fn finalize_captures(node: &mut Node, captured: &[bool]) {
    match &mut node.kind {
        NodeKind::Let { id, captured: flag, value, .. } => {
            *flag = captured.get(*id as usize).copied().unwrap_or(false);
            finalize_captures(value, captured);
        }
        NodeKind::Error { .. }
        | NodeKind::Value { .. }
        | NodeKind::Variable { .. }
        | NodeKind::Continue { .. }
        | NodeKind::Break { .. } => {}
        NodeKind::TryCatch { body, handler } => {
            finalize_captures(body, captured);
            finalize_captures(handler, captured);
        }
        NodeKind::Assign { value, .. }
        | NodeKind::As { value }
        | NodeKind::NewRef { value }
        | NodeKind::Variant { value, .. }
        | NodeKind::UnwrapRecursive { value }
        | NodeKind::WrapRecursive { value }
        | NodeKind::Return { value } => finalize_captures(value, captured),
        NodeKind::Function { body, .. } | NodeKind::AsyncFunction { body, .. } => {
            finalize_captures(body, captured);
        }
        NodeKind::Call { function, arguments } | NodeKind::CallAsync { function, arguments } => {
            finalize_captures(function, captured);
            for argument in arguments {
                finalize_captures(argument, captured);
            }
        }
        NodeKind::NewArray { elements } | NodeKind::NewSet { elements } => {
            for element in elements {
                finalize_captures(element, captured);
            }
        }
        NodeKind::NewDict { entries } => {
            for (key, value) in entries {
                finalize_captures(key, captured);
                finalize_captures(value, captured);
            }
        }
        NodeKind::Struct { fields } => {
            for (_, value) in fields {
                finalize_captures(value, captured);
            }
        }
        NodeKind::GetField { target, .. } => finalize_captures(target, captured),
        NodeKind::Block { statements, result } => {
            for statement in statements {
                finalize_captures(statement, captured);
            }
            finalize_captures(result, captured);
        }
        NodeKind::IfElse {
            condition,
            then_branch,
            else_branch,
        } => {
            finalize_captures(condition, captured);
            finalize_captures(then_branch, captured);
            finalize_captures(else_branch, captured);
        }
        NodeKind::Match { subject, cases } => {
            finalize_captures(subject, captured);
            for case in cases {
                finalize_captures(&mut case.body, captured);
            }
        }
        NodeKind::While { condition, body, .. } => {
            finalize_captures(condition, captured);
            finalize_captures(body, captured);
        }
        NodeKind::ForArray { array, body, .. } => {
            finalize_captures(array, captured);
            finalize_captures(body, captured);
        }
        NodeKind::ForSet { set, body, .. } => {
            finalize_captures(set, captured);
            finalize_captures(body, captured);
        }
        NodeKind::ForDict { dict, body, .. } => {
            finalize_captures(dict, captured);
            finalize_captures(body, captured);
        }
        NodeKind::Builtin { arguments, .. } | NodeKind::Platform { arguments, .. } => {
            for argument in arguments {
                finalize_captures(argument, captured);
            }
        }
    }
}
