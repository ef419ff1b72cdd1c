use crate::{
    collection::{OrdMap, OrdSet},
    compare::key_comparator,
    types::Type,
    value::{Callable, DateTime, Value},
};

#[test]
fn accessors_match_variants() {
    assert_eq!(Value::Integer(5).as_integer(), Some(5));
    assert_eq!(Value::Integer(5).as_float(), None);
    assert_eq!(Value::from("x").as_str(), Some("x"));
    assert_eq!(Value::Boolean(true).as_boolean(), Some(true));
    assert_eq!(Value::Blob(vec![1]).as_blob(), Some(&[1u8][..]));
}

#[test]
fn clone_shares_container_cells() {
    let array = Value::array(vec![Value::Integer(1)]);
    let alias = array.clone();
    let (Value::Array(a), Value::Array(b)) = (&array, &alias) else {
        panic!("expected arrays");
    };
    assert!(a.ptr_eq(b));
    a.borrow_mut().push(Value::Integer(2));
    assert_eq!(b.borrow().len(), 2);
}

#[test]
fn heap_id_exists_only_for_containers() {
    assert!(Value::array(vec![]).heap_id().is_some());
    assert!(Value::reference(Value::Null).heap_id().is_some());
    assert!(Value::Integer(1).heap_id().is_none());
    assert!(Value::structure([("a", Value::Null)]).heap_id().is_none());
}

#[test]
fn type_check_covers_the_algebra() {
    assert!(Value::Null.type_check(&Type::Null));
    assert!(Value::Integer(1).type_check(&Type::Integer));
    assert!(!Value::Integer(1).type_check(&Type::Float));
    assert!(Value::DateTime(DateTime::from_millis(0)).type_check(&Type::DateTime));
    assert!(Value::Function(Callable::new()).type_check(&Type::function(vec![], Type::Null)));
    assert!(!Value::Null.type_check(&Type::Never));

    let array = Value::array(vec![Value::Integer(1), Value::Integer(2)]);
    assert!(array.type_check(&Type::array(Type::Integer)));
    assert!(!array.type_check(&Type::array(Type::String)));

    let record = Value::structure([("a", Value::Integer(1))]);
    assert!(record.type_check(&Type::structure([("a", Type::Integer)])));
    assert!(!record.type_check(&Type::structure([("b", Type::Integer)])));
    assert!(!record.type_check(&Type::structure([("a", Type::Integer), ("b", Type::Null)])));

    let tagged = Value::variant("some", Value::Integer(1));
    let option = Type::variant([("none", Type::Null), ("some", Type::Integer)]);
    assert!(tagged.type_check(&option));
    assert!(!Value::variant("other", Value::Null).type_check(&option));
}

#[test]
fn type_check_handles_sets_dicts_and_recursion() {
    let mut set = OrdSet::new(key_comparator(&Type::Integer).unwrap());
    set.insert(Value::Integer(3));
    assert!(Value::set(set).type_check(&Type::set(Type::Integer)));

    let mut map = OrdMap::new(key_comparator(&Type::String).unwrap());
    map.insert(Value::from("k"), Value::Integer(1));
    assert!(Value::dict(map).type_check(&Type::dict(Type::String, Type::Integer)));

    // cyclic value against its recursive descriptor terminates
    let ty = Type::recursive(Type::array(Type::Rec(1)));
    let looped = Value::array(vec![]);
    if let Value::Array(cell) = &looped {
        cell.borrow_mut().push(looped.clone());
    }
    assert!(looped.type_check(&ty));
    assert!(!looped.type_check(&Type::array(Type::Integer)));
}

#[test]
fn display_is_shallow_and_cycle_safe() {
    let looped = Value::array(vec![]);
    if let Value::Array(cell) = &looped {
        cell.borrow_mut().push(looped.clone());
    }
    assert_eq!(looped.to_string(), "[array (1 items)]");

    let record = Value::structure([("n", Value::Integer(3)), ("xs", looped)]);
    assert_eq!(record.to_string(), "(n=3, xs=[array (1 items)])");

    assert_eq!(Value::variant("none", Value::Null).to_string(), ".none");
    assert_eq!(Value::variant("some", Value::Integer(2)).to_string(), ".some 2");
    assert_eq!(Value::Function(Callable::new()).to_string(), "λ");
}

#[test]
fn callable_identity() {
    let f = Callable::labelled("platform.now");
    let g = f.clone();
    assert!(f.ptr_eq(&g));
    assert!(!f.ptr_eq(&Callable::new()));
    assert_eq!(f.label(), Some("platform.now"));
}
