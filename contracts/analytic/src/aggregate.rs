//! Accumulator initialisation and the branch-free masked fold.
//!
//! Every fold performs the same number of evaluator operations regardless of
//! the mask value, so per-record cost stays fixed and no code path depends
//! on a ciphertext's plaintext.

use soroban_sdk::{Env, Vec};

use crate::admission::AnswerRecord;
use crate::encrypted::{self, CipherHandle};
use crate::predicate::PredicateOp;
use crate::question::{bucket_count, AggregateKind, Question};

/// Slot order for Stats accumulators.
const MIN: u32 = 0;
const SUM: u32 = 1;
const MAX: u32 = 2;

/// Zero-initialise an accumulator for the question's aggregate kind.
///
/// Count: one encrypted zero per option bucket. Stats: min starts at the
/// question's upper bound and max at its lower bound, so a fully-masked-out
/// scan leaves the bounds in place; consumers gate on `filtered_count > 0`.
pub(crate) fn init(env: &Env, question: &Question) -> Vec<CipherHandle> {
    let mut acc = Vec::new(env);
    match question.aggregate_kind {
        AggregateKind::Count => {
            for _ in 0..bucket_count(question) {
                acc.push_back(encrypted::trivial(env, 0));
            }
        }
        AggregateKind::Stats => {
            acc.push_back(encrypted::trivial(env, question.main.max));
            acc.push_back(encrypted::trivial(env, 0));
            acc.push_back(encrypted::trivial(env, question.main.min));
        }
    }
    acc
}

/// Fold one record into the accumulator under an encrypted 0/1 mask.
pub(crate) fn fold(
    env: &Env,
    question: &Question,
    acc: &mut Vec<CipherHandle>,
    record: &AnswerRecord,
    mask: CipherHandle,
) {
    match question.aggregate_kind {
        AggregateKind::Count => fold_count(env, question, acc, record, mask),
        AggregateKind::Stats => fold_stats(env, acc, record, mask),
    }
}

/// Scatter-add over all buckets: `acc[k] += mask AND (main == k)` for every
/// k, since the bucket selected by the encrypted main value cannot be
/// branched on directly.
fn fold_count(
    env: &Env,
    question: &Question,
    acc: &mut Vec<CipherHandle>,
    record: &AnswerRecord,
    mask: CipherHandle,
) {
    for k in 0..bucket_count(question) {
        let in_bucket = encrypted::compare(env, record.main, &PredicateOp::Eq, k);
        let hit = encrypted::and(env, mask, in_bucket);
        let slot = acc.get(k).unwrap();
        acc.set(k, encrypted::add(env, slot, hit));
    }
}

/// All three slots update unconditionally each step; a false mask makes
/// every update a masked no-op.
fn fold_stats(env: &Env, acc: &mut Vec<CipherHandle>, record: &AnswerRecord, mask: CipherHandle) {
    let cur_min = acc.get(MIN).unwrap();
    let lt = encrypted::compare_handles(env, record.main, &PredicateOp::Lt, cur_min);
    let candidate = encrypted::select(env, lt, record.main, cur_min);
    acc.set(MIN, encrypted::select(env, mask, candidate, cur_min));

    let contribution = encrypted::mul(env, mask, record.main);
    let cur_sum = acc.get(SUM).unwrap();
    acc.set(SUM, encrypted::add(env, cur_sum, contribution));

    let cur_max = acc.get(MAX).unwrap();
    let gt = encrypted::compare_handles(env, record.main, &PredicateOp::Gt, cur_max);
    let candidate = encrypted::select(env, gt, record.main, cur_max);
    acc.set(MAX, encrypted::select(env, mask, candidate, cur_max));
}
