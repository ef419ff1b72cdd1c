use crate::{
    collection::{OrdMap, OrdSet},
    compare::{Compare, key_comparator},
    text::{TextError, parse, print},
    types::Type,
    value::{Callable, DateTime, Value},
};
use proptest::prelude::*;

fn round_trip(value: &Value, ty: &Type) -> Value {
    let text = print(value, ty).expect("print");
    let decoded = parse(&text, ty).expect("parse");
    let reprint = print(&decoded, ty).expect("reprint");
    assert_eq!(text, reprint, "printing is idempotent after one round");
    decoded
}

#[test]
fn integer_surface() {
    assert_eq!(print(&Value::Integer(42), &Type::Integer).unwrap(), "42");
    let parsed = parse("42", &Type::Integer).unwrap();
    assert_eq!(parsed.as_integer(), Some(42));
    assert_eq!(
        print(&Value::Integer(-7), &Type::Integer).unwrap(),
        "-7"
    );
}

#[test]
fn integer_range_is_enforced() {
    assert!(parse("9223372036854775807", &Type::Integer).is_ok());
    let err = parse("9223372036854775808", &Type::Integer).unwrap_err();
    assert_eq!(err.message(), "integer out of range");
}

#[test]
fn float_surface() {
    let cases = [
        (1.0, "1.0"),
        (-0.0, "-0.0"),
        (2.5, "2.5"),
        (f64::NAN, "NaN"),
        (f64::INFINITY, "Infinity"),
        (f64::NEG_INFINITY, "-Infinity"),
    ];
    for (input, expected) in cases {
        assert_eq!(print(&Value::Float(input), &Type::Float).unwrap(), expected);
    }

    let nan = parse("NaN", &Type::Float).unwrap();
    assert!(nan.as_float().is_some_and(f64::is_nan));
    let neg_zero = parse("-0.0", &Type::Float).unwrap();
    assert!(neg_zero.as_float().is_some_and(|f| f == 0.0 && f.is_sign_negative()));
}

#[test]
fn string_escapes() {
    let value = Value::from("say \"hi\" \\ bye");
    let text = print(&value, &Type::String).unwrap();
    assert_eq!(text, r#""say \"hi\" \\ bye""#);
    assert_eq!(
        parse(&text, &Type::String).unwrap().as_str(),
        Some("say \"hi\" \\ bye")
    );
}

#[test]
fn string_rejects_unknown_escape() {
    let err = parse(r#""a\nb""#, &Type::String).unwrap_err();
    assert!(err.message().contains("invalid escape"));
}

#[test]
fn string_literal_where_integer_expected_fails() {
    let err = parse("\"42\"", &Type::Integer).unwrap_err();
    assert_eq!(err.message(), "expected integer");
}

#[test]
fn datetime_surface() {
    let value = Value::DateTime(DateTime::parse_text("2024-03-04T05:06:07.890").unwrap());
    assert_eq!(
        print(&value, &Type::DateTime).unwrap(),
        "2024-03-04T05:06:07.890"
    );
    round_trip(&value, &Type::DateTime);

    assert!(parse("2024-02-30T00:00:00.000", &Type::DateTime).is_err());
    assert!(parse("2024-03-04T05:06:07", &Type::DateTime).is_err());
}

#[test]
fn blob_surface() {
    let value = Value::Blob(vec![0xde, 0xad, 0x00]);
    assert_eq!(print(&value, &Type::Blob).unwrap(), "0xdead00");
    round_trip(&value, &Type::Blob);

    assert!(parse("0xabc", &Type::Blob).is_err());
    assert_eq!(
        parse("0x", &Type::Blob).unwrap().as_blob(),
        Some(&[][..])
    );
}

#[test]
fn array_surface() {
    let ty = Type::array(Type::Integer);
    let value = Value::array(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
    assert_eq!(print(&value, &ty).unwrap(), "[1, 2, 3]");
    assert_eq!(print(&Value::array(vec![]), &ty).unwrap(), "[]");
    round_trip(&value, &ty);
}

#[test]
fn set_surface_is_sorted() {
    let ty = Type::set(Type::Integer);
    let mut set = OrdSet::new(key_comparator(&Type::Integer).unwrap());
    for v in [3, 1, 2] {
        set.insert(Value::Integer(v));
    }
    let value = Value::set(set);
    assert_eq!(print(&value, &ty).unwrap(), "{1,2,3}");
    round_trip(&value, &ty);

    let empty = Value::set(OrdSet::new(key_comparator(&Type::Integer).unwrap()));
    assert_eq!(print(&empty, &ty).unwrap(), "{}");
}

#[test]
fn dict_surface_is_key_sorted() {
    let ty = Type::dict(Type::String, Type::Integer);
    let mut map = OrdMap::new(key_comparator(&Type::String).unwrap());
    map.insert(Value::from("b"), Value::Integer(2));
    map.insert(Value::from("a"), Value::Integer(1));
    let value = Value::dict(map);
    assert_eq!(print(&value, &ty).unwrap(), "{\"a\":1,\"b\":2}");
    round_trip(&value, &ty);

    let empty = Value::dict(OrdMap::new(key_comparator(&Type::String).unwrap()));
    assert_eq!(print(&empty, &ty).unwrap(), "{:}");
    round_trip(&empty, &ty);
}

#[test]
fn duplicate_set_elements_and_dict_keys_are_rejected() {
    assert!(parse("{1,1}", &Type::set(Type::Integer)).is_err());
    assert!(
        parse("{\"a\":1,\"a\":2}", &Type::dict(Type::String, Type::Integer)).is_err()
    );
}

#[test]
fn struct_surface() {
    let ty = Type::structure([("a", Type::Integer), ("b", Type::String)]);
    let value = Value::structure([("a", Value::Integer(1)), ("b", Value::from("x"))]);
    assert_eq!(print(&value, &ty).unwrap(), "(a=1, b=\"x\")");
    round_trip(&value, &ty);

    // order-insensitive field parse, normalized on reprint
    let reordered = parse("(b=\"x\", a=1)", &ty).unwrap();
    assert_eq!(print(&reordered, &ty).unwrap(), "(a=1, b=\"x\")");
}

#[test]
fn struct_field_quoting() {
    let ty = Type::structure([("weird name", Type::Integer)]);
    let value = Value::structure([("weird name", Value::Integer(7))]);
    let text = print(&value, &ty).unwrap();
    assert_eq!(text, "(`weird name`=7)");
    round_trip(&value, &ty);
}

#[test]
fn struct_errors() {
    let ty = Type::structure([("a", Type::Integer), ("b", Type::Integer)]);
    assert!(parse("(a=1, c=2)", &ty).unwrap_err().message().contains("unknown field"));
    assert!(parse("(a=1, a=2)", &ty).unwrap_err().message().contains("duplicate field"));
    assert!(parse("(a=1)", &ty).unwrap_err().message().contains("missing field"));
}

#[test]
fn struct_missing_equals_points_at_the_gap() {
    // (x 42) — the `=` is missing; the column is the space after `x`.
    let ty = Type::structure([("x", Type::Integer)]);
    let err = parse("(x 42)", &ty).unwrap_err();
    assert!(err.message().contains('='), "message names the `=`: {err}");
    assert_eq!(err.position(), Some((1, 3)));
}

#[test]
fn variant_surface() {
    let ty = Type::variant([("none", Type::Null), ("some", Type::Integer)]);
    let none = Value::variant("none", Value::Null);
    let some = Value::variant("some", Value::Integer(5));

    assert_eq!(print(&none, &ty).unwrap(), ".none");
    assert_eq!(print(&some, &ty).unwrap(), ".some 5");
    round_trip(&none, &ty);
    round_trip(&some, &ty);

    assert!(parse(".other", &ty).unwrap_err().message().contains("unknown variant tag"));
}

#[test]
fn ref_surface() {
    let ty = Type::reference(Type::Integer);
    let value = Value::reference(Value::Integer(9));
    assert_eq!(print(&value, &ty).unwrap(), "&9");
    round_trip(&value, &ty);
}

#[test]
fn function_prints_lambda_and_never_parses() {
    let ty = Type::function(vec![], Type::Integer);
    let value = Value::Function(Callable::new());
    assert_eq!(print(&value, &ty).unwrap(), "λ");
    assert!(parse("λ", &ty).is_err());
}

#[test]
fn never_print_is_an_error() {
    let err = print(&Value::Null, &Type::Never).unwrap_err();
    assert!(matches!(err, TextError::Print { .. }));
    assert!(err.message().contains(".Never"));
}

#[test]
fn shared_array_prints_an_alias_and_parses_back_shared() {
    let ty = Type::structure([
        ("a", Type::array(Type::Integer)),
        ("b", Type::array(Type::Integer)),
    ]);
    let shared = Value::array(vec![
        Value::Integer(1),
        Value::Integer(2),
        Value::Integer(3),
    ]);
    let value = Value::structure([("a", shared.clone()), ("b", shared)]);

    let text = print(&value, &ty).unwrap();
    assert_eq!(text, "(a=[1, 2, 3], b=1#.a)");

    let decoded = parse(&text, &ty).unwrap();
    let fields = decoded.as_struct().unwrap();
    let (Value::Array(a), Value::Array(b)) = (&fields[0].1, &fields[1].1) else {
        panic!("expected arrays");
    };
    assert!(a.ptr_eq(b));
    a.borrow_mut().push(Value::Integer(4));
    assert_eq!(b.borrow().len(), 4);
}

#[test]
fn unshared_arrays_print_without_aliases() {
    let ty = Type::structure([
        ("a", Type::array(Type::Integer)),
        ("b", Type::array(Type::Integer)),
    ]);
    let value = Value::structure([
        ("a", Value::array(vec![Value::Integer(1)])),
        ("b", Value::array(vec![Value::Integer(1)])),
    ]);
    assert_eq!(print(&value, &ty).unwrap(), "(a=[1], b=[1])");
}

#[test]
fn cyclic_array_prints_and_parses() {
    let ty = Type::recursive(Type::array(Type::Rec(1)));
    let value = Value::array(vec![]);
    if let Value::Array(cell) = &value {
        cell.borrow_mut().push(value.clone());
    }

    let text = print(&value, &ty).unwrap();
    assert_eq!(text, "[1#]");

    let decoded = parse(&text, &ty).unwrap();
    let Value::Array(outer) = &decoded else {
        panic!("expected array");
    };
    let inner = outer.borrow()[0].clone();
    let Value::Array(inner) = inner else {
        panic!("expected inner array");
    };
    assert!(outer.ptr_eq(&inner));
}

#[test]
fn cyclic_ref_prints_and_parses() {
    let ty = Type::recursive(Type::reference(Type::Rec(1)));
    let cell = crate::value::Shared::new(Value::Null);
    let value = Value::Ref(cell.clone());
    *cell.borrow_mut() = value.clone();

    let text = print(&value, &ty).unwrap();
    assert_eq!(text, "&1#");

    let decoded = parse(&text, &ty).unwrap();
    let Value::Ref(outer) = &decoded else {
        panic!("expected ref");
    };
    let Value::Ref(inner) = outer.borrow().clone() else {
        panic!("expected inner ref");
    };
    assert!(outer.ptr_eq(&inner));
}

#[test]
fn forward_alias_is_undefined() {
    let ty = Type::structure([
        ("a", Type::array(Type::Integer)),
        ("b", Type::array(Type::Integer)),
    ]);
    let err = parse("(a=1#.b, b=[1])", &ty).unwrap_err();
    assert!(err.message().contains("undefined alias reference"));
}

#[test]
fn trailing_input_is_rejected() {
    let err = parse("42 7", &Type::Integer).unwrap_err();
    assert_eq!(err.message(), "unexpected trailing input");
}

#[test]
fn whitespace_between_tokens_is_ignored() {
    let ty = Type::structure([("a", Type::Integer), ("b", Type::Integer)]);
    let decoded = parse("  ( a = 1 ,\n  b = 2 )  ", &ty).unwrap();
    assert_eq!(print(&decoded, &ty).unwrap(), "(a=1, b=2)");
}

#[test]
fn recursive_list_round_trips() {
    let ty = Type::recursive(Type::variant([
        ("nil", Type::Null),
        (
            "cons",
            Type::structure([("head", Type::Integer), ("tail", Type::Rec(1))]),
        ),
    ]));
    let value = Value::variant(
        "cons",
        Value::structure([
            ("head", Value::Integer(1)),
            ("tail", Value::variant("nil", Value::Null)),
        ]),
    );

    let text = print(&value, &ty).unwrap();
    assert_eq!(text, ".cons (head=1, tail=.nil)");
    round_trip(&value, &ty);
}

///
/// PROPERTIES
///

proptest! {
    #[test]
    fn integer_round_trip(x in any::<i64>()) {
        let decoded = parse(&print(&Value::Integer(x), &Type::Integer).unwrap(), &Type::Integer).unwrap();
        prop_assert_eq!(decoded.as_integer(), Some(x));
    }

    #[test]
    fn string_round_trip(s in ".{0,24}") {
        let value = Value::from(s.as_str());
        let decoded = parse(&print(&value, &Type::String).unwrap(), &Type::String).unwrap();
        prop_assert_eq!(decoded.as_str(), Some(s.as_str()));
    }

    #[test]
    fn integer_array_round_trip(xs in proptest::collection::vec(any::<i64>(), 0..8)) {
        let ty = Type::array(Type::Integer);
        let value = Value::array(xs.iter().copied().map(Value::Integer).collect());
        let decoded = round_trip(&value, &ty);
        let cmp = Compare::new(&ty).unwrap();
        prop_assert!(cmp.equal(&value, &decoded).unwrap());
    }

    #[test]
    fn float_round_trip(x in any::<f64>()) {
        let decoded = parse(&print(&Value::Float(x), &Type::Float).unwrap(), &Type::Float).unwrap();
        let y = decoded.as_float().unwrap();
        if x.is_nan() {
            prop_assert!(y.is_nan());
        } else {
            prop_assert_eq!(x.to_bits(), y.to_bits());
        }
    }
}
