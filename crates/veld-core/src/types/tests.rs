use crate::types::{Type, TypeError, is_subtype, meta_type};

fn list_type() -> Type {
    Type::recursive(Type::variant([
        ("nil", Type::Null),
        (
            "cons",
            Type::structure([("head", Type::Integer), ("tail", Type::Rec(1))]),
        ),
    ]))
}

#[test]
fn display_forms() {
    assert_eq!(Type::Integer.to_string(), "Integer");
    assert_eq!(Type::array(Type::Float).to_string(), "Array<Float>");
    assert_eq!(
        Type::dict(Type::String, Type::Blob).to_string(),
        "Dict<String, Blob>"
    );
    assert_eq!(
        Type::structure([("a", Type::Integer), ("b", Type::Null)]).to_string(),
        "Struct(a: Integer, b: Null)"
    );
    assert_eq!(
        Type::variant([("none", Type::Null), ("some", Type::Integer)]).to_string(),
        "Variant(none: Null | some: Integer)"
    );
    assert_eq!(
        Type::function(vec![Type::Integer], Type::Float).to_string(),
        "Function(Integer) -> Float"
    );
}

#[test]
fn valid_key_excludes_mutables_and_opaques() {
    for ty in [
        Type::Integer,
        Type::Float,
        Type::String,
        Type::DateTime,
        Type::Blob,
        Type::structure([("a", Type::Integer)]),
        Type::variant([("x", Type::Null)]),
        list_type(),
    ] {
        assert!(ty.valid_key(), "{ty}");
    }

    for ty in [
        Type::array(Type::Integer),
        Type::set(Type::Integer),
        Type::reference(Type::Integer),
        Type::dict(Type::String, Type::Integer),
        Type::Never,
        Type::function(vec![], Type::Null),
        Type::structure([("a", Type::array(Type::Integer))]),
    ] {
        assert!(!ty.valid_key(), "{ty}");
    }
}

#[test]
fn check_depths_validates_back_edges() {
    assert!(list_type().check_depths().is_ok());
    assert!(matches!(
        Type::Rec(1).check_depths(),
        Err(TypeError::BadDepth { .. })
    ));
    assert!(matches!(
        Type::recursive(Type::array(Type::Rec(2))).check_depths(),
        Err(TypeError::BadDepth { depth: 2, binders: 1 })
    ));
    assert!(
        Type::recursive(Type::recursive(Type::structure([
            ("inner", Type::Rec(1)),
            ("outer", Type::Rec(2)),
        ])))
        .check_depths()
        .is_ok()
    );
}

#[test]
fn subtyping_rules() {
    // reflexive, Never bottom
    assert!(is_subtype(&Type::Integer, &Type::Integer));
    assert!(is_subtype(&Type::Never, &Type::Integer));
    assert!(!is_subtype(&Type::Integer, &Type::Never));
    assert!(!is_subtype(&Type::Integer, &Type::Float));

    // variant width
    let narrow = Type::variant([("a", Type::Integer)]);
    let wide = Type::variant([("a", Type::Integer), ("b", Type::Null)]);
    assert!(is_subtype(&narrow, &wide));
    assert!(!is_subtype(&wide, &narrow));

    // containers are element covariant
    assert!(is_subtype(&Type::array(Type::Never), &Type::array(Type::Integer)));

    // functions: contravariant inputs, covariant output
    let sub = Type::function(vec![Type::array(Type::Integer)], Type::Never);
    let sup = Type::function(vec![Type::array(Type::Never)], Type::Integer);
    assert!(is_subtype(&sub, &sup));
    assert!(!is_subtype(&sup, &sub));

    // structs: same field list, covariant fields
    let sub = Type::structure([("a", Type::Never)]);
    let sup = Type::structure([("a", Type::Integer)]);
    assert!(is_subtype(&sub, &sup));
    assert!(!is_subtype(
        &Type::structure([("a", Type::Integer), ("b", Type::Integer)]),
        &sup
    ));
}

#[test]
fn mentions_sees_through_composites() {
    use crate::types::TypeTag;
    let ty = Type::recursive(Type::variant([
        ("leaf", Type::Null),
        ("fn", Type::function(vec![Type::Rec(1)], Type::Null)),
    ]));
    assert!(ty.mentions(TypeTag::Function));
    assert!(!list_type().mentions(TypeTag::Function));
}

#[test]
fn type_value_round_trips() {
    for ty in [
        Type::Integer,
        Type::array(Type::Float),
        Type::dict(Type::String, Type::set(Type::Integer)),
        Type::structure([("a", Type::Integer), ("b", Type::Blob)]),
        list_type(),
        Type::function(vec![Type::Integer, Type::Float], Type::String),
    ] {
        let value = ty.type_value();
        let back = Type::from_type_value(&value).expect("reflection round trip");
        assert_eq!(back, ty);
    }
}

#[test]
fn type_values_inhabit_the_meta_type() {
    let meta = meta_type();
    for ty in [Type::Integer, list_type(), Type::dict(Type::String, Type::Float)] {
        assert!(ty.type_value().type_check(&meta), "{ty}");
    }
}

#[test]
fn from_type_value_rejects_bad_depths_and_tags() {
    use crate::value::Value;

    let bad_depth = Value::variant("Rec", Value::Integer(1));
    assert!(matches!(
        Type::from_type_value(&bad_depth),
        Err(TypeError::BadDepth { .. })
    ));

    let unknown = Value::variant("Whatever", Value::Null);
    assert!(matches!(
        Type::from_type_value(&unknown),
        Err(TypeError::UnknownTag(_))
    ));
}

#[test]
fn descriptors_cross_serde_boundaries() {
    let ty = list_type();
    let json = serde_json::to_string(&ty).expect("serialize");
    let back: Type = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, ty);
}
