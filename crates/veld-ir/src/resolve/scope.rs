use crate::{
    location::{Label, Location},
    node::Capture,
};
use veld_core::types::Type;

///
/// Binding
///
/// One declaration in the arena. The id doubles as the arena index;
/// ids are assigned from a single monotone counter, so they are also
/// monotone within every function scope.
///

pub(crate) struct Binding {
    pub name: String,
    pub id: u32,
    pub ty: Type,
    pub mutable: bool,
    pub captured: bool,
    pub function_depth: usize,
}

///
/// FunctionFrame
///

pub(crate) struct FunctionFrame {
    pub output: Type,
    captures: Vec<u32>,
    labels: Vec<Label>,
}

///
/// Scopes
///
/// Lexical frames over a binding arena, plus the function nesting that
/// capture analysis and label/return validation hang off. Frame 0 is
/// the synthetic top level: bindings there are globals of the resolved
/// tree, and `Return` outside any real function is an error.
///

pub(crate) struct Scopes {
    bindings: Vec<Binding>,
    lexical: Vec<Vec<u32>>,
    functions: Vec<FunctionFrame>,
    next_label: u32,
}

impl Scopes {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
            lexical: vec![Vec::new()],
            functions: vec![FunctionFrame {
                output: Type::Never,
                captures: Vec::new(),
                labels: Vec::new(),
            }],
            next_label: 0,
        }
    }

    ///
    /// BINDINGS
    ///

    pub fn declare(&mut self, name: &str, ty: Type, mutable: bool) -> u32 {
        let id = self.bindings.len() as u32;
        self.bindings.push(Binding {
            name: name.to_string(),
            id,
            ty,
            mutable,
            captured: false,
            function_depth: self.functions.len() - 1,
        });
        if let Some(frame) = self.lexical.last_mut() {
            frame.push(id);
        }
        id
    }

    /// Resolve a name to its innermost live binding, recording captures
    /// on every function the reference crosses.
    pub fn lookup(&mut self, name: &str) -> Option<&Binding> {
        let id = self.lexical.iter().rev().find_map(|frame| {
            frame
                .iter()
                .rev()
                .copied()
                .find(|id| self.bindings[*id as usize].name == name)
        })?;

        let current_depth = self.functions.len() - 1;
        let declared_depth = self.bindings[id as usize].function_depth;
        if declared_depth < current_depth {
            self.bindings[id as usize].captured = true;
            for depth in (declared_depth + 1)..=current_depth {
                let frame = &mut self.functions[depth];
                if !frame.captures.contains(&id) {
                    frame.captures.push(id);
                }
            }
        }
        Some(&self.bindings[id as usize])
    }

    pub fn binding(&self, id: u32) -> &Binding {
        &self.bindings[id as usize]
    }

    /// Captured flags by binding id, for the finalize pass.
    pub fn captured_flags(&self) -> Vec<bool> {
        self.bindings.iter().map(|b| b.captured).collect()
    }

    ///
    /// FRAMES
    ///

    pub fn push_frame(&mut self) {
        self.lexical.push(Vec::new());
    }

    pub fn pop_frame(&mut self) {
        self.lexical.pop();
    }

    pub fn push_function(&mut self, output: Type) {
        self.functions.push(FunctionFrame {
            output,
            captures: Vec::new(),
            labels: Vec::new(),
        });
        self.push_frame();
    }

    /// Close the current function, yielding its recorded captures.
    pub fn pop_function(&mut self) -> Vec<Capture> {
        self.pop_frame();
        let frame = self.functions.pop();
        frame.map_or_else(Vec::new, |frame| {
            frame
                .captures
                .iter()
                .map(|id| {
                    let binding = self.binding(*id);
                    Capture {
                        name: binding.name.clone(),
                        id: binding.id,
                        ty: binding.ty.clone(),
                    }
                })
                .collect()
        })
    }

    pub fn in_function(&self) -> bool {
        self.functions.len() > 1
    }

    pub fn output_type(&self) -> Type {
        self.functions
            .last()
            .map_or(Type::Never, |f| f.output.clone())
    }

    ///
    /// LABELS
    ///

    pub fn push_label(&mut self, name: &str, location: &Location) -> Label {
        let label = Label {
            name: name.to_string(),
            id: self.next_label,
            location: location.clone(),
        };
        self.next_label += 1;
        if let Some(frame) = self.functions.last_mut() {
            frame.labels.push(label.clone());
        }
        label
    }

    pub fn pop_label(&mut self) {
        if let Some(frame) = self.functions.last_mut() {
            frame.labels.pop();
        }
    }

    /// Labels resolve within the current function only; loops in outer
    /// functions are not break/continue targets.
    pub fn find_label(&self, name: &str) -> Option<Label> {
        self.functions
            .last()
            .and_then(|f| f.labels.iter().rev().find(|l| l.name == name).cloned())
    }
}
