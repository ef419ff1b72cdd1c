use crate::location::{Label, Location};
use veld_core::{types::Type, value::Value};

///
/// Node
///
/// One IR node: the type it evaluates to, where it came from, and its
/// shape. The node set is closed; serialization goes through the
/// homoiconic descriptor in `reflect`, never through ad-hoc formats.
///

#[derive(Clone, Debug)]
pub struct Node {
    pub ty: Type,
    pub location: Location,
    pub kind: NodeKind,
}

impl Node {
    #[must_use]
    pub fn new(ty: Type, location: Location, kind: NodeKind) -> Self {
        Self { ty, location, kind }
    }

    /// The type this node evaluates to, in self-describing value form.
    #[must_use]
    pub fn type_value(&self) -> Value {
        self.ty.type_value()
    }

    /// Stable tag name of the node's shape.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        self.kind.name()
    }
}

///
/// Param
///
/// A declared binding: function input, loop binding, or match binding.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Param {
    pub name: String,
    pub id: u32,
    pub ty: Type,
}

///
/// Capture
///
/// An outer-scope binding a function closes over.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Capture {
    pub name: String,
    pub id: u32,
    pub ty: Type,
}

///
/// MatchCase
///

#[derive(Clone, Debug)]
pub struct MatchCase {
    pub tag: String,
    pub binding: Option<Param>,
    pub body: Node,
}

///
/// NodeKind
///

#[derive(Clone, Debug)]
pub enum NodeKind {
    /// Raise a runtime error carrying a fixed message.
    Error { message: String },
    TryCatch {
        body: Box<Node>,
        handler: Box<Node>,
    },
    /// A literal of the node's type.
    Value { value: Value },
    Variable {
        name: String,
        id: u32,
    },
    Let {
        name: String,
        id: u32,
        mutable: bool,
        captured: bool,
        value: Box<Node>,
    },
    Assign {
        name: String,
        id: u32,
        value: Box<Node>,
    },
    /// Explicit subtype coercion inserted by the resolver; the target
    /// type is the node's own type.
    As { value: Box<Node> },
    Function {
        inputs: Vec<Param>,
        output: Type,
        body: Box<Node>,
        captures: Vec<Capture>,
    },
    AsyncFunction {
        inputs: Vec<Param>,
        output: Type,
        body: Box<Node>,
        captures: Vec<Capture>,
    },
    Call {
        function: Box<Node>,
        arguments: Vec<Node>,
    },
    CallAsync {
        function: Box<Node>,
        arguments: Vec<Node>,
    },
    NewRef { value: Box<Node> },
    NewArray { elements: Vec<Node> },
    NewSet { elements: Vec<Node> },
    NewDict { entries: Vec<(Node, Node)> },
    Struct { fields: Vec<(String, Node)> },
    GetField {
        target: Box<Node>,
        field: String,
    },
    Variant {
        tag: String,
        value: Box<Node>,
    },
    Block {
        statements: Vec<Node>,
        result: Box<Node>,
    },
    IfElse {
        condition: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Box<Node>,
    },
    Match {
        subject: Box<Node>,
        cases: Vec<MatchCase>,
    },
    UnwrapRecursive { value: Box<Node> },
    WrapRecursive { value: Box<Node> },
    While {
        label: Label,
        condition: Box<Node>,
        body: Box<Node>,
    },
    ForArray {
        label: Label,
        binding: Param,
        array: Box<Node>,
        body: Box<Node>,
    },
    ForSet {
        label: Label,
        binding: Param,
        set: Box<Node>,
        body: Box<Node>,
    },
    ForDict {
        label: Label,
        key_binding: Param,
        value_binding: Param,
        dict: Box<Node>,
        body: Box<Node>,
    },
    Return { value: Box<Node> },
    Continue { label: Label },
    Break { label: Label },
    Builtin {
        name: String,
        type_args: Vec<Type>,
        arguments: Vec<Node>,
    },
    Platform {
        name: String,
        arguments: Vec<Node>,
    },
}

impl NodeKind {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Error { .. } => "Error",
            Self::TryCatch { .. } => "TryCatch",
            Self::Value { .. } => "Value",
            Self::Variable { .. } => "Variable",
            Self::Let { .. } => "Let",
            Self::Assign { .. } => "Assign",
            Self::As { .. } => "As",
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
