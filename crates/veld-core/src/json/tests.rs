use crate::{
    collection::OrdMap,
    compare::{Compare, key_comparator},
    json::{JsonCodec, JsonErrorKind},
    types::Type,
    value::{DateTime, Value},
};

fn codec(ty: &Type) -> JsonCodec {
    JsonCodec::new(ty).expect("codec builds")
}

fn round_trip(value: &Value, ty: &Type) -> Value {
    let codec = codec(ty);
    let text = codec.encode(value).expect("encode");
    let decoded = codec.decode(&text).expect("decode");
    assert_eq!(codec.encode(&decoded).expect("re-encode"), text);
    decoded
}

#[test]
fn scalars_on_the_wire() {
    assert_eq!(codec(&Type::Integer).encode(&Value::Integer(42)).unwrap(), "\"42\"");
    assert_eq!(codec(&Type::Boolean).encode(&Value::Boolean(true)).unwrap(), "true");
    assert_eq!(codec(&Type::Null).encode(&Value::Null).unwrap(), "null");
    assert_eq!(
        codec(&Type::String).encode(&Value::from("hi")).unwrap(),
        "\"hi\""
    );
    assert_eq!(
        codec(&Type::Blob).encode(&Value::Blob(vec![0xab, 0x01])).unwrap(),
        "\"0xab01\""
    );
}

#[test]
fn integer_decode_is_strict() {
    let codec = codec(&Type::Integer);
    assert_eq!(codec.decode("\"42\"").unwrap().as_integer(), Some(42));

    // bare numbers, junk strings, and out-of-range values all fail
    assert_eq!(codec.decode("42").unwrap_err().kind, JsonErrorKind::Structure);
    assert_eq!(codec.decode("\"4x\"").unwrap_err().kind, JsonErrorKind::Structure);
    let range = codec.decode("\"9223372036854775808\"").unwrap_err();
    assert_eq!(range.kind, JsonErrorKind::Range);

    assert_eq!(
        codec.decode("\"-9223372036854775808\"").unwrap().as_integer(),
        Some(i64::MIN)
    );
}

#[test]
fn float_specials_ride_as_strings() {
    let codec = codec(&Type::Float);
    assert_eq!(codec.encode(&Value::Float(1.5)).unwrap(), "1.5");
    assert_eq!(codec.encode(&Value::Float(f64::NAN)).unwrap(), "\"NaN\"");
    assert_eq!(codec.encode(&Value::Float(f64::INFINITY)).unwrap(), "\"Infinity\"");
    assert_eq!(
        codec.encode(&Value::Float(f64::NEG_INFINITY)).unwrap(),
        "\"-Infinity\""
    );
    assert_eq!(codec.encode(&Value::Float(-0.0)).unwrap(), "\"-0.0\"");

    let neg_zero = codec.decode("\"-0.0\"").unwrap();
    assert!(neg_zero.as_float().is_some_and(|f| f == 0.0 && f.is_sign_negative()));
    assert!(codec.decode("\"NaN\"").unwrap().as_float().is_some_and(f64::is_nan));
}

#[test]
fn datetime_is_canonical_utc() {
    let codec = codec(&Type::DateTime);
    let value = Value::DateTime(DateTime::parse_rfc3339("2024-01-02T04:04:05.678+01:00").unwrap());
    assert_eq!(
        codec.encode(&value).unwrap(),
        "\"2024-01-02T03:04:05.678+00:00\""
    );

    // zone and millisecond field are both mandatory on decode
    assert!(codec.decode("\"2024-01-02T03:04:05.678\"").is_err());
    assert!(codec.decode("\"2024-01-02T03:04:05+00:00\"").is_err());
    round_trip(&value, &Type::DateTime);
}

#[test]
fn ref_is_a_one_element_array() {
    let ty = Type::reference(Type::Integer);
    let value = Value::reference(Value::Integer(5));
    assert_eq!(codec(&ty).encode(&value).unwrap(), "[\"5\"]");
    round_trip(&value, &ty);

    assert!(codec(&ty).decode("[]").is_err());
    assert!(codec(&ty).decode("[\"5\",\"6\"]").is_err());
}

#[test]
fn dict_encodes_sorted_entry_objects() {
    let ty = Type::dict(Type::String, Type::Integer);
    let mut map = OrdMap::new(key_comparator(&Type::String).unwrap());
    map.insert(Value::from("b"), Value::Integer(2));
    map.insert(Value::from("a"), Value::Integer(1));
    let value = Value::dict(map);

    assert_eq!(
        codec(&ty).encode(&value).unwrap(),
        "[{\"key\":\"a\",\"value\":\"1\"},{\"key\":\"b\",\"value\":\"2\"}]"
    );
    round_trip(&value, &ty);
}

#[test]
fn dict_entries_are_strict() {
    let ty = Type::dict(Type::String, Type::Integer);
    let codec = codec(&ty);
    assert!(codec.decode("[{\"key\":\"a\"}]").is_err());
    assert!(
        codec
            .decode("[{\"key\":\"a\",\"value\":\"1\",\"extra\":true}]")
            .is_err()
    );
    assert!(
        codec
            .decode("[{\"key\":\"a\",\"value\":\"1\"},{\"key\":\"a\",\"value\":\"2\"}]")
            .unwrap_err()
            .message
            .contains("duplicate")
    );
}

#[test]
fn struct_fields_are_exact() {
    let ty = Type::structure([("a", Type::Integer), ("b", Type::Integer)]);
    let codec = codec(&ty);

    let value = Value::structure([("a", Value::Integer(1)), ("b", Value::Integer(2))]);
    round_trip(&value, &ty);

    let unknown = codec.decode("{\"a\":\"1\",\"b\":\"2\",\"c\":\"3\"}").unwrap_err();
    assert!(unknown.message.contains("unknown struct field"));
    let missing = codec.decode("{\"a\":\"1\"}").unwrap_err();
    assert!(missing.message.contains("missing struct field"));
}

#[test]
fn variant_objects_are_strict() {
    let ty = Type::variant([("none", Type::Null), ("some", Type::Integer)]);
    let codec = codec(&ty);

    assert_eq!(
        codec.encode(&Value::variant("none", Value::Null)).unwrap(),
        "{\"type\":\"none\",\"value\":null}"
    );
    assert_eq!(
        codec.encode(&Value::variant("some", Value::Integer(3))).unwrap(),
        "{\"type\":\"some\",\"value\":\"3\"}"
    );

    assert!(codec.decode("{\"type\":\"other\",\"value\":null}").unwrap_err().message.contains("unknown variant tag"));
    assert!(codec.decode("{\"type\":\"none\"}").is_err());
    assert!(
        codec
            .decode("{\"type\":\"none\",\"value\":null,\"x\":1}")
            .is_err()
    );
}

#[test]
fn opaque_and_empty_types_are_rejected_at_creation() {
    for ty in [
        Type::Never,
        Type::function(vec![], Type::Null),
        Type::async_function(vec![], Type::Null),
        Type::array(Type::function(vec![], Type::Null)),
        Type::structure([("f", Type::Never)]),
    ] {
        let err = JsonCodec::new(&ty).unwrap_err();
        assert_eq!(err.kind, JsonErrorKind::UnsupportedType);
    }
}

#[test]
fn syntax_errors_carry_positions() {
    let err = codec(&Type::Integer).decode("{oops").unwrap_err();
    assert_eq!(err.kind, JsonErrorKind::Syntax);
    assert_eq!(err.line, 1);
    assert!(err.col > 1);
}

#[test]
fn structural_errors_pin_line_one() {
    let ty = Type::structure([("a", Type::Integer)]);
    let err = codec(&ty).decode("{\"a\":true}").unwrap_err();
    assert_eq!((err.line, err.col), (1, 1));
    assert_eq!(err.path, ".a");
}

#[test]
fn shared_containers_become_refs() {
    let ty = Type::structure([
        ("a", Type::array(Type::Integer)),
        ("b", Type::array(Type::Integer)),
    ]);
    let shared = Value::array(vec![Value::Integer(1), Value::Integer(2)]);
    let value = Value::structure([("a", shared.clone()), ("b", shared)]);

    let text = codec(&ty).encode(&value).unwrap();
    assert_eq!(text, "{\"a\":[\"1\",\"2\"],\"b\":{\"$ref\":\"1#a\"}}");

    let decoded = codec(&ty).decode(&text).unwrap();
    let fields = decoded.as_struct().unwrap();
    let (Value::Array(a), Value::Array(b)) = (&fields[0].1, &fields[1].1) else {
        panic!("expected arrays");
    };
    assert!(a.ptr_eq(b));
}

#[test]
fn cyclic_list_round_trips() {
    // Recursive(self → Variant { nil: Null, cons: Struct { value: Integer, next: Array(self) } })
    let ty = Type::recursive(Type::variant([
        ("nil", Type::Null),
        (
            "cons",
            Type::structure([("value", Type::Integer), ("next", Type::array(Type::Rec(1)))]),
        ),
    ]));

    let next = Value::array(vec![]);
    let node = Value::variant(
        "cons",
        Value::structure([("value", Value::Integer(1)), ("next", next.clone())]),
    );
    if let Value::Array(cell) = &next {
        cell.borrow_mut().push(node.clone());
    }

    let text = codec(&ty).encode(&node).unwrap();
    assert!(text.contains("{\"$ref\":\"3#\"}"), "emits an upward ref: {text}");

    let decoded = codec(&ty).decode(&text).unwrap();
    let (_, payload) = decoded.as_variant().unwrap();
    let fields = payload.as_struct().unwrap();
    let Value::Array(outer_next) = &fields[1].1 else {
        panic!("expected next array");
    };
    let first = outer_next.borrow()[0].clone();
    let (_, inner_payload) = first.as_variant().map(|(t, p)| (t.to_string(), p.clone())).unwrap();
    let inner_fields = inner_payload.as_struct().unwrap();
    let Value::Array(inner_next) = &inner_fields[1].1 else {
        panic!("expected inner next array");
    };
    assert!(outer_next.ptr_eq(inner_next), "cycle is restored");
}

#[test]
fn undefined_and_malformed_refs_fail() {
    let ty = Type::array(Type::array(Type::Integer));
    let codec = codec(&ty);

    let undefined = codec.decode("[{\"$ref\":\"0#9\"}]").unwrap_err();
    assert_eq!(undefined.kind, JsonErrorKind::Reference);

    let escaping = codec.decode("[{\"$ref\":\"5#\"}]").unwrap_err();
    assert_eq!(escaping.kind, JsonErrorKind::Reference);

    let malformed = codec.decode("[{\"$ref\":\"nope\"}]").unwrap_err();
    assert_eq!(malformed.kind, JsonErrorKind::Reference);

    let extra_field = codec.decode("[{\"$ref\":\"1#\",\"x\":1}]").unwrap_err();
    assert_eq!(extra_field.kind, JsonErrorKind::Reference);
}

#[test]
fn recursive_list_round_trips_with_equality() {
    let ty = Type::recursive(Type::variant([
        ("nil", Type::Null),
        (
            "cons",
            Type::structure([("value", Type::Integer), ("next", Type::array(Type::Rec(1)))]),
        ),
    ]));
    let cmp = Compare::new(&ty).unwrap();

    let nil = Value::variant("nil", Value::Null);
    let node = Value::variant(
        "cons",
        Value::structure([
            ("value", Value::Integer(7)),
            ("next", Value::array(vec![nil])),
        ]),
    );

    let decoded = round_trip(&node, &ty);
    assert!(cmp.equal(&node, &decoded).unwrap());
}
