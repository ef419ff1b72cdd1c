use veld_core::types::Type;

///
/// Builtin registry
///
/// Closed table of builtin operations the resolver accepts: each entry
/// names its type-parameter arity and computes the instantiated input
/// and output types from the caller's type arguments. Unknown names and
/// arity mismatches are conversion-time errors.
///

pub struct Builtin {
    pub name: &'static str,
    pub type_params: usize,
    signature: fn(&[Type]) -> (Vec<Type>, Type),
}

impl Builtin {
    /// Instantiated `(inputs, output)` for the given type arguments.
    /// Callers must have validated arity against `type_params`.
    #[must_use]
    pub fn signature(&self, type_args: &[Type]) -> (Vec<Type>, Type) {
        (self.signature)(type_args)
    }
}

#[must_use]
pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

fn t0(type_args: &[Type]) -> Type {
    type_args.first().cloned().unwrap_or(Type::Never)
}

static BUILTINS: &[Builtin] = &[
    // arithmetic over a numeric type argument
    Builtin {
        name: "add",
        type_params: 1,
        signature: |a| (vec![t0(a), t0(a)], t0(a)),
    },
    Builtin {
        name: "subtract",
        type_params: 1,
        signature: |a| (vec![t0(a), t0(a)], t0(a)),
    },
    Builtin {
        name: "multiply",
        type_params: 1,
        signature: |a| (vec![t0(a), t0(a)], t0(a)),
    },
    Builtin {
        name: "divide",
        type_params: 1,
        signature: |a| (vec![t0(a), t0(a)], t0(a)),
    },
    Builtin {
        name: "negate",
        type_params: 1,
        signature: |a| (vec![t0(a)], t0(a)),
    },
    Builtin {
        name: "modulo",
        type_params: 0,
        signature: |_| (vec![Type::Integer, Type::Integer], Type::Integer),
    },
    // logic
    Builtin {
        name: "not",
        type_params: 0,
        signature: |_| (vec![Type::Boolean], Type::Boolean),
    },
    Builtin {
        name: "and",
        type_params: 0,
        signature: |_| (vec![Type::Boolean, Type::Boolean], Type::Boolean),
    },
    Builtin {
        name: "or",
        type_params: 0,
        signature: |_| (vec![Type::Boolean, Type::Boolean], Type::Boolean),
    },
    // comparison family
    Builtin {
        name: "equal",
        type_params: 1,
        signature: |a| (vec![t0(a), t0(a)], Type::Boolean),
    },
    Builtin {
        name: "notEqual",
        type_params: 1,
        signature: |a| (vec![t0(a), t0(a)], Type::Boolean),
    },
    Builtin {
        name: "less",
        type_params: 1,
        signature: |a| (vec![t0(a), t0(a)], Type::Boolean),
    },
    Builtin {
        name: "lessEqual",
        type_params: 1,
        signature: |a| (vec![t0(a), t0(a)], Type::Boolean),
    },
    Builtin {
        name: "greater",
        type_params: 1,
        signature: |a| (vec![t0(a), t0(a)], Type::Boolean),
    },
    Builtin {
        name: "greaterEqual",
        type_params: 1,
        signature: |a| (vec![t0(a), t0(a)], Type::Boolean),
    },
    Builtin {
        name: "compare",
        type_params: 1,
        signature: |a| (vec![t0(a), t0(a)], Type::Integer),
    },
    Builtin {
        name: "min",
        type_params: 1,
        signature: |a| (vec![t0(a), t0(a)], t0(a)),
    },
    Builtin {
        name: "max",
        type_params: 1,
        signature: |a| (vec![t0(a), t0(a)], t0(a)),
    },
    Builtin {
        name: "clamp",
        type_params: 1,
        signature: |a| (vec![t0(a), t0(a), t0(a)], t0(a)),
    },
    // containers
    Builtin {
        name: "length",
        type_params: 1,
        signature: |a| (vec![Type::array(t0(a))], Type::Integer),
    },
    Builtin {
        name: "push",
        type_params: 1,
        signature: |a| (vec![Type::array(t0(a)), t0(a)], Type::Null),
    },
    Builtin {
        name: "get",
        type_params: 1,
        signature: |a| (vec![Type::array(t0(a)), Type::Integer], t0(a)),
    },
    Builtin {
        name: "setSize",
        type_params: 1,
        signature: |a| (vec![Type::set(t0(a))], Type::Integer),
    },
    Builtin {
        name: "setContains",
        type_params: 1,
        signature: |a| (vec![Type::set(t0(a)), t0(a)], Type::Boolean),
    },
    Builtin {
        name: "setInsert",
        type_params: 1,
        signature: |a| (vec![Type::set(t0(a)), t0(a)], Type::Boolean),
    },
    Builtin {
        name: "dictSize",
        type_params: 2,
        signature: |a| {
            let key = a.first().cloned().unwrap_or(Type::Never);
            let value = a.get(1).cloned().unwrap_or(Type::Never);
            (vec![Type::dict(key, value)], Type::Integer)
        },
    },
    Builtin {
        name: "dictGet",
        type_params: 2,
        signature: |a| {
            let key = a.first().cloned().unwrap_or(Type::Never);
            let value = a.get(1).cloned().unwrap_or(Type::Never);
            (vec![Type::dict(key.clone(), value.clone()), key], value)
        },
    },
    // refs
    Builtin {
        name: "refGet",
        type_params: 1,
        signature: |a| (vec![Type::reference(t0(a))], t0(a)),
    },
    Builtin {
        name: "refSet",
        type_params: 1,
        signature: |a| (vec![Type::reference(t0(a)), t0(a)], Type::Null),
    },
    // strings
    Builtin {
        name: "stringLength",
        type_params: 0,
        signature: |_| (vec![Type::String], Type::Integer),
    },
    Builtin {
        name: "stringConcat",
        type_params: 0,
        signature: |_| (vec![Type::String, Type::String], Type::String),
    },
];

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_known_names() {
        assert!(lookup("add").is_some());
        assert!(lookup("dictGet").is_some());
        assert!(lookup("frobnicate").is_none());
    }

    #[test]
    fn signatures_instantiate_type_arguments() {
        let builtin = lookup("length").unwrap();
        let (inputs, output) = builtin.signature(&[Type::String]);
        assert_eq!(inputs, vec![Type::array(Type::String)]);
        assert_eq!(output, Type::Integer);

        let builtin = lookup("dictGet").unwrap();
        let (inputs, output) = builtin.signature(&[Type::String, Type::Integer]);
        assert_eq!(inputs, vec![Type::dict(Type::String, Type::Integer), Type::String]);
        assert_eq!(output, Type::Integer);
    }
}
