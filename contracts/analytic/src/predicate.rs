//! Predicate types and the homomorphic evaluator.
//!
//! Predicates are implicitly conjunctive: a record matches a query iff every
//! predicate holds. There is no OR composition in this model.

use soroban_sdk::{contracttype, Env, Vec};

use crate::admission::AnswerRecord;
use crate::encrypted::{self, CipherHandle};

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PredicateOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

/// One comparison of a stored metadata field against a plaintext constant.
/// The constant is public; only the stored field is secret.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Predicate {
    /// Index into the question's metadata specs.
    pub meta_index: u32,
    pub op: PredicateOp,
    pub value: u32,
}

/// Evaluate all predicates against one record, producing a single encrypted
/// 0/1 mask. An empty predicate list yields the constant-true mask.
///
/// `meta_index` bounds are validated at request creation, so indexing here
/// cannot fail for stored requests.
pub(crate) fn evaluate(
    env: &Env,
    record: &AnswerRecord,
    predicates: &Vec<Predicate>,
) -> CipherHandle {
    let mut mask = encrypted::trivial(env, 1);
    for predicate in predicates.iter() {
        let field = record.metas.get(predicate.meta_index).unwrap();
        let bit = encrypted::compare(env, field, &predicate.op, predicate.value);
        mask = encrypted::and(env, mask, bit);
    }
    mask
}
