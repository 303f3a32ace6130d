//! Property-style checks for channel checkpoint round-trips and reducer
//! laws.

use graphloom::channels::{Channel, Ephemeral, LastValue, Topic};
use graphloom::reducers::{Append, MessageMerge, Reducer, SumConcat};
use proptest::prelude::*;
use serde_json::{json, Value};

fn json_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(|n| json!(n)),
        "[a-z]{0,12}".prop_map(|s| json!(s)),
        proptest::collection::vec(any::<i64>(), 0..6).prop_map(|v| json!(v)),
        Just(json!(null)),
    ]
}

proptest! {
    #[test]
    fn last_value_round_trips_any_payload(value in json_value()) {
        let mut ch = LastValue::new("k");
        ch.update(vec![value]).unwrap();
        let restored = LastValue::from_checkpoint(&ch.checkpoint()).unwrap();
        prop_assert_eq!(restored.checkpoint(), ch.checkpoint());
        prop_assert_eq!(restored.get().unwrap(), ch.get().unwrap());
    }

    #[test]
    fn ephemeral_round_trips_with_flags(value in json_value(), guard in any::<bool>()) {
        let mut ch = Ephemeral::with_guard("k", guard);
        ch.update(vec![value]).unwrap();
        let restored = Ephemeral::from_checkpoint(&ch.checkpoint()).unwrap();
        prop_assert_eq!(restored, ch);
    }

    #[test]
    fn topic_round_trips_with_flags(
        values in proptest::collection::vec(json_value(), 0..6),
        accumulate in any::<bool>(),
    ) {
        let mut ch = Topic::with_accumulate("k", accumulate);
        ch.update(values).unwrap();
        let restored = Topic::from_checkpoint(&ch.checkpoint()).unwrap();
        prop_assert_eq!(restored, ch);
    }

    #[test]
    fn topic_ingest_never_nests_one_level(values in proptest::collection::vec(
        proptest::collection::vec(any::<i64>(), 0..4),
        0..4,
    )) {
        let mut ch = Topic::new("k");
        let writes: Vec<Value> = values.iter().map(|v| json!(v)).collect();
        let total: usize = values.iter().map(Vec::len).sum();
        ch.update(writes).unwrap();
        prop_assert_eq!(ch.len(), total);
    }

    #[test]
    fn sum_concat_is_associative_on_arrays(
        a in proptest::collection::vec(any::<i64>(), 0..5),
        b in proptest::collection::vec(any::<i64>(), 0..5),
        c in proptest::collection::vec(any::<i64>(), 0..5),
    ) {
        let (a, b, c) = (json!(a), json!(b), json!(c));
        let left = SumConcat
            .merge(Some(SumConcat.merge(Some(a.clone()), b.clone()).unwrap()), c.clone())
            .unwrap();
        let right = SumConcat
            .merge(Some(a), SumConcat.merge(Some(b), c).unwrap())
            .unwrap();
        prop_assert_eq!(left, right);
    }

    #[test]
    fn append_always_yields_a_sequence(current in json_value(), incoming in json_value()) {
        let merged = Append.merge(Some(current), incoming).unwrap();
        prop_assert!(merged.is_array());
    }

    #[test]
    fn message_merge_never_mutates_inputs(
        ids in proptest::collection::vec("[a-c]", 1..5),
        incoming_ids in proptest::collection::vec("[a-c]", 1..5),
    ) {
        let current: Value = json!(ids
            .iter()
            .map(|id| json!({"id": id, "from": "current"}))
            .collect::<Vec<_>>());
        let incoming: Value = json!(incoming_ids
            .iter()
            .map(|id| json!({"id": id, "from": "incoming"}))
            .collect::<Vec<_>>());
        let current_before = current.clone();
        let incoming_before = incoming.clone();

        let merged = MessageMerge.merge(Some(current.clone()), incoming.clone()).unwrap();

        prop_assert_eq!(&current, &current_before);
        prop_assert_eq!(incoming, incoming_before);

        // Replacement happens in place: the merged sequence starts with the
        // current ids in their original order, and only appends after them.
        let merged_items = merged.as_array().unwrap();
        let current_items = current.as_array().unwrap();
        prop_assert!(merged_items.len() <= current_items.len() + incoming_ids.len());
        for (merged_item, current_item) in merged_items.iter().zip(current_items.iter()) {
            prop_assert_eq!(merged_item.get("id"), current_item.get("id"));
        }
    }
}
