//! Proptest strategies for answer rows, predicates, and step schedules.

use proptest::prelude::*;

use analytic::predicate::PredicateOp;

use crate::{PlainPredicate, Row, AGE_MAX, AGE_MIN, ASSET_MAX, BUCKETS, SPEND_MAX};

/// A row for the Count fixture: main is a bucket index.
pub fn count_row() -> impl Strategy<Value = Row> {
    (0..BUCKETS, 0..=ASSET_MAX, AGE_MIN..=AGE_MAX).prop_map(|(main, asset, age)| Row {
        main,
        metas: [asset, age],
    })
}

/// A row for the Stats fixture: main is a value in `[0, SPEND_MAX]`.
pub fn stats_row() -> impl Strategy<Value = Row> {
    (0..=SPEND_MAX, 0..=ASSET_MAX, AGE_MIN..=AGE_MAX).prop_map(|(main, asset, age)| Row {
        main,
        metas: [asset, age],
    })
}

/// A row whose main value is out of range for either fixture, so the
/// oracle round trip must reject it.
pub fn invalid_row() -> impl Strategy<Value = Row> {
    (
        SPEND_MAX + 1..SPEND_MAX + 50,
        0..=ASSET_MAX,
        AGE_MIN..=AGE_MAX,
    )
        .prop_map(|(main, asset, age)| Row {
            main,
            metas: [asset, age],
        })
}

pub fn rows(
    row: impl Strategy<Value = Row>,
    min: usize,
    max: usize,
) -> impl Strategy<Value = Vec<Row>> {
    prop::collection::vec(row, min..=max)
}

fn op() -> impl Strategy<Value = PredicateOp> {
    prop_oneof![
        Just(PredicateOp::Eq),
        Just(PredicateOp::Ne),
        Just(PredicateOp::Gt),
        Just(PredicateOp::Lt),
        Just(PredicateOp::Ge),
        Just(PredicateOp::Le),
    ]
}

/// One predicate over either metadata field, with a constant drawn from
/// that field's declared range.
pub fn predicate() -> impl Strategy<Value = PlainPredicate> {
    prop_oneof![
        (Just(0usize), op(), 0..=ASSET_MAX),
        (Just(1usize), op(), AGE_MIN..=AGE_MAX),
    ]
    .prop_map(|(meta_index, op, value)| PlainPredicate {
        meta_index,
        op,
        value,
    })
}

pub fn predicates() -> impl Strategy<Value = Vec<PlainPredicate>> {
    prop::collection::vec(predicate(), 0..=2)
}

/// An arbitrary schedule of bounded `execute_query` step sizes.
pub fn chunk_sizes() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(1u32..=7, 1..=10)
}
