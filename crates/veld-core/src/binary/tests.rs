use crate::{
    binary::{BinaryError, Version, decode, decode_chunks, encode, encode_chunked},
    compare::Compare,
    types::Type,
    value::{DateTime, Value},
};
use proptest::prelude::*;

fn round_trip(value: &Value, ty: &Type, version: Version) -> Value {
    let bytes = encode(value, ty, version).expect("encode");
    let decoded = decode(&bytes, ty).expect("decode");
    assert_eq!(encode(&decoded, ty, version).expect("re-encode"), bytes);
    decoded
}

#[test]
fn scalar_round_trips_both_versions() {
    let samples: Vec<(Value, Type)> = vec![
        (Value::Null, Type::Null),
        (Value::Boolean(true), Type::Boolean),
        (Value::Integer(i64::MIN), Type::Integer),
        (Value::Float(-0.0), Type::Float),
        (Value::from("héllo"), Type::String),
        (Value::Blob(vec![0, 255, 7]), Type::Blob),
    ];
    for (value, ty) in samples {
        let cmp = Compare::new(&ty).unwrap();
        for version in [Version::V1, Version::V2] {
            let decoded = round_trip(&value, &ty, version);
            assert!(cmp.is(&value, &decoded).unwrap() || cmp.equal(&value, &decoded).unwrap());
        }
    }
}

#[test]
fn datetime_resolution_depends_on_version() {
    let ty = Type::DateTime;
    let value = Value::DateTime(DateTime::from_millis(1_700_000_000_123));

    let v2 = round_trip(&value, &ty, Version::V2);
    assert_eq!(v2.as_datetime().map(DateTime::millis), Some(1_700_000_000_123));

    // V1 truncates to seconds
    let bytes = encode(&value, &ty, Version::V1).unwrap();
    let v1 = decode(&bytes, &ty).unwrap();
    assert_eq!(v1.as_datetime().map(DateTime::millis), Some(1_700_000_000_000));
}

#[test]
fn unknown_version_is_rejected() {
    let mut bytes = encode(&Value::Integer(1), &Type::Integer, Version::V1).unwrap();
    bytes[0] = 9;
    assert_eq!(decode(&bytes, &Type::Integer).unwrap_err(), BinaryError::UnknownVersion(9));
}

#[test]
fn trailing_and_truncated_input_are_rejected() {
    let mut bytes = encode(&Value::Integer(1), &Type::Integer, Version::V1).unwrap();
    bytes.push(0);
    assert_eq!(decode(&bytes, &Type::Integer).unwrap_err(), BinaryError::TrailingBytes);

    let bytes = encode(&Value::Integer(1), &Type::Integer, Version::V1).unwrap();
    assert_eq!(
        decode(&bytes[..bytes.len() - 1], &Type::Integer).unwrap_err(),
        BinaryError::Truncated
    );
}

#[test]
fn chunked_output_is_byte_identical_to_sync() {
    let ty = Type::array(Type::structure([("n", Type::Integer), ("s", Type::String)]));
    let value = Value::array(
        (0..20)
            .map(|i| {
                Value::structure([
                    ("n", Value::Integer(i)),
                    ("s", Value::from(format!("row {i}").as_str())),
                ])
            })
            .collect(),
    );

    for version in [Version::V1, Version::V2] {
        let sync = encode(&value, &ty, version).unwrap();
        for chunk_size in [1, 3, 16, 1024] {
            let chunks = encode_chunked(&value, &ty, version, chunk_size).unwrap();
            let joined: Vec<u8> = chunks.iter().flatten().copied().collect();
            assert_eq!(joined, sync, "chunk_size {chunk_size}");

            // the streaming decoder accepts both forms
            let from_chunks = decode_chunks(chunks, &ty).unwrap();
            let from_sync = decode(&sync, &ty).unwrap();
            let cmp = Compare::new(&ty).unwrap();
            assert!(cmp.equal(&from_chunks, &from_sync).unwrap());
        }
    }
}

#[test]
fn v2_preserves_sharing() {
    let ty = Type::structure([
        ("a", Type::array(Type::Integer)),
        ("b", Type::array(Type::Integer)),
    ]);
    let shared = Value::array(vec![Value::Integer(1)]);
    let value = Value::structure([("a", shared.clone()), ("b", shared)]);

    let decoded = round_trip(&value, &ty, Version::V2);
    let fields = decoded.as_struct().unwrap();
    let (Value::Array(a), Value::Array(b)) = (&fields[0].1, &fields[1].1) else {
        panic!("expected arrays");
    };
    assert!(a.ptr_eq(b));

    // V1 has no aliasing: the copy decodes but the cells split
    let bytes = encode(&value, &ty, Version::V1).unwrap();
    let split = decode(&bytes, &ty).unwrap();
    let fields = split.as_struct().unwrap();
    let (Value::Array(a), Value::Array(b)) = (&fields[0].1, &fields[1].1) else {
        panic!("expected arrays");
    };
    assert!(!a.ptr_eq(b));
}

#[test]
fn v2_round_trips_cycles_and_v1_rejects_them() {
    let ty = Type::recursive(Type::array(Type::Rec(1)));
    let value = Value::array(vec![]);
    if let Value::Array(cell) = &value {
        cell.borrow_mut().push(value.clone());
    }

    assert_eq!(encode(&value, &ty, Version::V1).unwrap_err(), BinaryError::Cyclic);

    let decoded = round_trip(&value, &ty, Version::V2);
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
fn functions_cannot_cross_the_binary_boundary() {
    let ty = Type::function(vec![], Type::Null);
    let err = encode(
        &Value::Function(crate::value::Callable::new()),
        &ty,
        Version::V2,
    )
    .unwrap_err();
    assert!(matches!(err, BinaryError::Unsupported(_)));
}

proptest! {
    #[test]
    fn integer_array_round_trip(xs in proptest::collection::vec(any::<i64>(), 0..16)) {
        let ty = Type::array(Type::Integer);
        let value = Value::array(xs.into_iter().map(Value::Integer).collect());
        let cmp = Compare::new(&ty).unwrap();
        for version in [Version::V1, Version::V2] {
            let decoded = round_trip(&value, &ty, version);
            prop_assert!(cmp.equal(&value, &decoded).unwrap());
        }
    }

    #[test]
    fn chunking_never_changes_bytes(
        xs in proptest::collection::vec(".{0,8}", 0..8),
        chunk_size in 1usize..64,
    ) {
        let ty = Type::array(Type::String);
        let value = Value::array(xs.iter().map(|s| Value::from(s.as_str())).collect());
        let sync = encode(&value, &ty, Version::V2).unwrap();
        let chunks = encode_chunked(&value, &ty, Version::V2, chunk_size).unwrap();
        let joined: Vec<u8> = chunks.iter().flatten().copied().collect();
        prop_assert_eq!(joined, sync);
    }
}
