//! End-to-end property suites for the confidential-analytics contract.
//!
//! Each case drives the full protocol through [`AnalyticHarness`] — client
//! encryption, two-phase admission via the simulated oracle relayer,
//! stepped query execution, owner reveal — and checks the revealed
//! aggregates against a plaintext mirror of the same rows.

use proptest::prelude::*;

use test_framework::{
    bucket_histogram, filter_rows, generators, stats_of, AnalyticHarness, PlainPredicate,
    QuestionShape, Row,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Any chunking of the scan yields the same result as one unsplit pass.
    #[test]
    fn chunked_scan_matches_single_pass(
        rows in generators::rows(generators::count_row(), 2, 10),
        preds in generators::predicates(),
        chunks in generators::chunk_sizes(),
    ) {
        let h = AnalyticHarness::new(QuestionShape::Count);
        h.admit_rows(&rows);

        let chunked = h.request_query(&preds);
        h.execute_chunks(chunked, &chunks);

        prop_assert_eq!(h.reveal(chunked), h.run_single_pass(&preds));
    }

    /// Bucket counts and the filtered count equal the plaintext mirror,
    /// and the buckets always sum to the filtered count.
    #[test]
    fn count_aggregation_matches_plaintext(
        rows in generators::rows(generators::count_row(), 1, 10),
        preds in generators::predicates(),
    ) {
        let h = AnalyticHarness::new(QuestionShape::Count);
        h.admit_rows(&rows);

        let (acc, filtered) = h.run_single_pass(&preds);
        let matched = filter_rows(&rows, &preds);

        prop_assert_eq!(&acc, &bucket_histogram(&matched));
        prop_assert_eq!(filtered as usize, matched.len());
        prop_assert_eq!(acc.iter().sum::<u32>(), filtered);
    }

    /// [min, sum, max] equals the plaintext mirror, including the identity
    /// values when no row matches the predicates.
    #[test]
    fn stats_aggregation_matches_plaintext(
        rows in generators::rows(generators::stats_row(), 1, 8),
        preds in generators::predicates(),
    ) {
        let h = AnalyticHarness::new(QuestionShape::Stats);
        h.admit_rows(&rows);

        let (acc, filtered) = h.run_single_pass(&preds);
        let matched = filter_rows(&rows, &preds);

        prop_assert_eq!(acc, stats_of(&matched));
        prop_assert_eq!(filtered as usize, matched.len());
    }

    /// Out-of-range submissions are rejected by the oracle round trip and
    /// leave no trace in the answer set or any aggregate.
    #[test]
    fn rejected_answers_never_reach_aggregates(
        valid in generators::rows(generators::count_row(), 1, 6),
        invalid in generators::rows(generators::invalid_row(), 1, 4),
    ) {
        let h = AnalyticHarness::new(QuestionShape::Count);
        let longest = valid.len().max(invalid.len());
        for i in 0..longest {
            if let Some(row) = valid.get(i) {
                h.submit_row(row);
            }
            if let Some(row) = invalid.get(i) {
                h.submit_row(row);
            }
        }
        h.pump_oracle();

        prop_assert_eq!(h.client.get_ans_len(&h.q_id) as usize, valid.len());

        let (acc, filtered) = h.run_single_pass(&[]);
        prop_assert_eq!(acc, bucket_histogram(&valid));
        prop_assert_eq!(filtered as usize, valid.len());
    }
}

/// One fixed walk through the whole protocol, stepping two records at a
/// time under a metadata predicate.
#[test]
fn full_lifecycle_smoke() {
    let rows = [
        Row { main: 0, metas: [1, 25] },
        Row { main: 2, metas: [2, 40] },
        Row { main: 2, metas: [0, 31] },
        Row { main: 4, metas: [2, 64] },
        Row { main: 1, metas: [3, 30] },
    ];
    let over_29 = [PlainPredicate {
        meta_index: 1,
        op: analytic::predicate::PredicateOp::Gt,
        value: 29,
    }];

    let h = AnalyticHarness::new(QuestionShape::Count);
    h.admit_rows(&rows);

    let req_id = h.request_query(&over_29);
    h.execute_chunks(req_id, &[2, 2, 2]);

    let (acc, filtered) = h.reveal(req_id);
    let matched = filter_rows(&rows, &over_29);
    assert_eq!(acc, bucket_histogram(&matched));
    assert_eq!(filtered as usize, matched.len());

    let list = h
        .client
        .get_user_query_request_list(&h.creator, &h.q_id);
    assert!(list.contains(req_id));
}

/// A request scans exactly the answers committed before its creation.
#[test]
fn snapshot_excludes_answers_admitted_after_request() {
    let early = [
        Row { main: 0, metas: [0, 20] },
        Row { main: 1, metas: [1, 30] },
        Row { main: 1, metas: [2, 40] },
    ];
    let late = [
        Row { main: 3, metas: [3, 50] },
        Row { main: 3, metas: [0, 60] },
    ];

    let h = AnalyticHarness::new(QuestionShape::Count);
    h.admit_rows(&early);

    let req_id = h.request_query(&[]);
    h.admit_rows(&late);
    h.execute_chunks(req_id, &[10]);

    let (acc, filtered) = h.reveal(req_id);
    assert_eq!(acc, bucket_histogram(&early));
    assert_eq!(filtered as usize, early.len());

    let mut all = early.to_vec();
    all.extend_from_slice(&late);
    let (acc_all, filtered_all) = h.run_single_pass(&[]);
    assert_eq!(acc_all, bucket_histogram(&all));
    assert_eq!(filtered_all as usize, all.len());
}
