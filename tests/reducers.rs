use graphloom::reducers::{
    Append, MapMerge, MessageMerge, Reducer, ReducerError, Replace, SumConcat,
};
use serde_json::json;

/********************
 * SumConcat
 ********************/

#[test]
fn sum_concat_adds_numbers() {
    assert_eq!(SumConcat.merge(Some(json!(2)), json!(3)).unwrap(), json!(5));
    assert_eq!(
        SumConcat.merge(Some(json!(1.5)), json!(0.25)).unwrap(),
        json!(1.75)
    );
}

#[test]
fn sum_concat_concatenates_strings_and_arrays() {
    assert_eq!(
        SumConcat.merge(Some(json!("ab")), json!("c")).unwrap(),
        json!("abc")
    );
    assert_eq!(
        SumConcat.merge(Some(json!([1])), json!([2, 3])).unwrap(),
        json!([1, 2, 3])
    );
}

#[test]
fn sum_concat_absent_current_yields_incoming() {
    assert_eq!(SumConcat.merge(None, json!([1])).unwrap(), json!([1]));
    assert_eq!(SumConcat.merge(Some(json!(null)), json!(2)).unwrap(), json!(2));
}

#[test]
fn sum_concat_rejects_mixed_types() {
    let err = SumConcat.merge(Some(json!("x")), json!(1)).unwrap_err();
    assert!(matches!(err, ReducerError::TypeMismatch { .. }));
}

/********************
 * Append
 ********************/

#[test]
fn append_wraps_scalars_into_sequences() {
    assert_eq!(Append.merge(Some(json!(1)), json!(2)).unwrap(), json!([1, 2]));
    assert_eq!(
        Append.merge(Some(json!([1])), json!(2)).unwrap(),
        json!([1, 2])
    );
    assert_eq!(Append.merge(None, json!([3, 4])).unwrap(), json!([3, 4]));
}

/********************
 * MapMerge
 ********************/

#[test]
fn map_merge_is_shallow_and_right_biased() {
    let merged = MapMerge
        .merge(
            Some(json!({"a": 1, "b": {"x": 1}})),
            json!({"b": {"y": 2}, "c": 3}),
        )
        .unwrap();
    assert_eq!(merged, json!({"a": 1, "b": {"y": 2}, "c": 3}));
}

#[test]
fn map_merge_rejects_non_objects() {
    assert!(MapMerge.merge(Some(json!({"a": 1})), json!(2)).is_err());
    assert!(MapMerge.merge(Some(json!(2)), json!({"a": 1})).is_err());
}

/********************
 * Replace
 ********************/

#[test]
fn replace_discards_current() {
    assert_eq!(
        Replace.merge(Some(json!({"old": true})), json!(42)).unwrap(),
        json!(42)
    );
}

/********************
 * MessageMerge
 ********************/

#[test]
fn message_merge_replaces_matching_ids_in_place() {
    let current = json!([
        {"id": "1", "text": "hello"},
        {"id": "2", "text": "world"},
    ]);
    let incoming = json!([
        {"id": "2", "text": "there"},
        {"id": "3", "text": "!"},
    ]);
    let merged = MessageMerge.merge(Some(current), incoming).unwrap();
    assert_eq!(
        merged,
        json!([
            {"id": "1", "text": "hello"},
            {"id": "2", "text": "there"},
            {"id": "3", "text": "!"},
        ])
    );
}

#[test]
fn message_merge_appends_items_without_ids_in_order() {
    let merged = MessageMerge
        .merge(
            Some(json!([{"text": "a"}])),
            json!([{"text": "b"}, {"text": "c"}]),
        )
        .unwrap();
    assert_eq!(merged, json!([{"text": "a"}, {"text": "b"}, {"text": "c"}]));
}

#[test]
fn message_merge_treats_null_current_as_empty() {
    let merged = MessageMerge
        .merge(Some(json!(null)), json!([{"id": "1"}]))
        .unwrap();
    assert_eq!(merged, json!([{"id": "1"}]));
    let merged = MessageMerge.merge(None, json!([{"id": "1"}])).unwrap();
    assert_eq!(merged, json!([{"id": "1"}]));
}

#[test]
fn message_merge_leaves_inputs_unmodified() {
    let current = json!([{"id": "1", "text": "original"}]);
    let incoming = json!([{"id": "1", "text": "replaced"}]);
    let current_before = current.clone();
    let incoming_before = incoming.clone();

    let merged = MessageMerge
        .merge(Some(current.clone()), incoming.clone())
        .unwrap();

    assert_eq!(current, current_before);
    assert_eq!(incoming, incoming_before);
    assert_eq!(merged, json!([{"id": "1", "text": "replaced"}]));
}

#[test]
fn message_merge_wraps_bare_objects() {
    let merged = MessageMerge
        .merge(Some(json!({"id": "1"})), json!({"id": "2"}))
        .unwrap();
    assert_eq!(merged, json!([{"id": "1"}, {"id": "2"}]));
}
