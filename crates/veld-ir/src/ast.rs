use crate::location::Location;
use std::rc::Rc;
use veld_core::{types::Type, value::Value};

///
/// Ast
///
/// Unresolved surface tree handed to the resolver: names are plain
/// strings, no binding numbers, no coercions. Nodes are reference
/// counted so construction DSLs can share subtrees; the resolver treats
/// sharing as ordinary duplication and rejects genuine cycles.
///

#[derive(Clone)]
pub struct Ast {
    inner: Rc<AstData>,
}

#[derive(Debug)]
struct AstData {
    location: Location,
    kind: AstKind,
}

impl Ast {
    #[must_use]
    pub fn new(location: Location, kind: AstKind) -> Self {
        Self {
            inner: Rc::new(AstData { location, kind }),
        }
    }

    #[must_use]
    pub fn location(&self) -> &Location {
        &self.inner.location
    }

    #[must_use]
    pub fn kind(&self) -> &AstKind {
        &self.inner.kind
    }

    /// Stable tag name of the node's shape.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        self.inner.kind.name()
    }

    /// Node identity, used by the resolver's cycle guard.
    #[must_use]
    pub(crate) fn key(&self) -> usize {
        Rc::as_ptr(&self.inner).cast::<u8>() as usize
    }
}

impl std::fmt::Debug for Ast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ast({} at {})", self.kind_name(), self.location())
    }
}

///
/// AstMatchCase
///

#[derive(Clone, Debug)]
pub struct AstMatchCase {
    pub tag: String,
    pub binding: Option<String>,
    pub body: Ast,
}

///
/// AstKind
///
/// The surface shapes. `As` is absent: coercions are synthesized by the
/// resolver, never written by hand.
///

#[derive(Clone, Debug)]
pub enum AstKind {
    Error {
        ty: Type,
        message: String,
    },
    TryCatch {
        body: Ast,
        handler: Ast,
    },
    Value {
        ty: Type,
        value: Value,
    },
    Variable {
        name: String,
    },
    Let {
        name: String,
        mutable: bool,
        ty: Option<Type>,
        value: Ast,
    },
    Assign {
        name: String,
        value: Ast,
    },
    Function {
        inputs: Vec<(String, Type)>,
        output: Type,
        body: Ast,
    },
    AsyncFunction {
        inputs: Vec<(String, Type)>,
        output: Type,
        body: Ast,
    },
    Call {
        function: Ast,
        arguments: Vec<Ast>,
    },
    CallAsync {
        function: Ast,
        arguments: Vec<Ast>,
    },
    NewRef {
        value: Ast,
    },
    NewArray {
        element: Type,
        elements: Vec<Ast>,
    },
    NewSet {
        element: Type,
        elements: Vec<Ast>,
    },
    NewDict {
        key: Type,
        value: Type,
        entries: Vec<(Ast, Ast)>,
    },
    Struct {
        fields: Vec<(String, Ast)>,
    },
    GetField {
        target: Ast,
        field: String,
    },
    Variant {
        ty: Type,
        tag: String,
        value: Ast,
    },
    Block {
        statements: Vec<Ast>,
        result: Ast,
    },
    IfElse {
        condition: Ast,
        then_branch: Ast,
        else_branch: Ast,
    },
    Match {
        subject: Ast,
        cases: Vec<AstMatchCase>,
    },
    UnwrapRecursive {
        value: Ast,
    },
    WrapRecursive {
        ty: Type,
        value: Ast,
    },
    While {
        label: String,
        condition: Ast,
        body: Ast,
    },
    ForArray {
        label: String,
        binding: String,
        array: Ast,
        body: Ast,
    },
    ForSet {
        label: String,
        binding: String,
        set: Ast,
        body: Ast,
    },
    ForDict {
        label: String,
        key_binding: String,
        value_binding: String,
        dict: Ast,
        body: Ast,
    },
    Return {
        value: Ast,
    },
    Continue {
        label: String,
    },
    Break {
        label: String,
    },
    Builtin {
        name: String,
        type_args: Vec<Type>,
        arguments: Vec<Ast>,
    },
    Platform {
        name: String,
        inputs: Vec<Type>,
        output: Type,
        arguments: Vec<Ast>,
    },
}

impl AstKind {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Error { .. } => "Error",
            Self::TryCatch { .. } => "TryCatch",
            Self::Value { .. } => "Value",
            Self::Variable { .. } => "Variable",
            Self::Let { .. } => "Let",
            Self::Assign { .. } => "Assign",
            Self::Function { .. } => "Function",
            Self::AsyncFunction { .. } => "AsyncFunction",
            Self::Call { .. } => "Call",
            Self::CallAsync { .. } => "CallAsync",
            Self::NewRef { .. } => "NewRef",
            Self::NewArray { .. } => "NewArray",
            Self::NewSet { .. } => "NewSet",
            Self::NewDict { .. } => "NewDict",
            Self::Struct { .. } => "Struct",
            Self::GetField { .. } => "GetField",
            Self::Variant { .. } => "Variant",
            Self::Block { .. } => "Block",
            Self::IfElse { .. } => "IfElse",
            Self::Match { .. } => "Match",
            Self::UnwrapRecursive { .. } => "UnwrapRecursive",
            Self::WrapRecursive { .. } => "WrapRecursive",
            Self::While { .. } => "While",
            Self::ForArray { .. } => "ForArray",
            Self::ForSet { .. } => "ForSet",
            Self::ForDict { .. } => "ForDict",
            Self::Return { .. } => "Return",
            Self::Continue { .. } => "Continue",
            Self::Break { .. } => "Break",
            Self::Builtin { .. } => "Builtin",
            Self::Platform { .. } => "Platform",
        }
    }
}
