//! Two-phase answer admission.
//!
//! A submission never becomes a permanent record synchronously: range and
//! membership checks require a decryption round trip through the external
//! oracle, so `submit` only opens a `PendingAdmission` carrying an encrypted
//! validity bit. The oracle's callback commits or discards it. Per
//! (question, respondent) the machine runs
//! NotSubmitted → PendingValidation → {Committed | Rejected}.

use soroban_sdk::{contracttype, symbol_short, Address, Env, Symbol, Vec};

use crate::encrypted::{self, CipherHandle};
use crate::question::{self, Question, QuestionKind, QuestionSpec, TTL_EXTEND_TO, TTL_THRESHOLD};
use crate::predicate::PredicateOp;
use crate::ContractError;

// ── Storage key prefixes ─────────────────────────────────────────────────────

pub(crate) const DEC_CTR: Symbol = symbol_short!("DEC_CTR");
const PENDING: Symbol = symbol_short!("PEND");
const PENDING_BY: Symbol = symbol_short!("PEND_BY");
const ANSWER: Symbol = symbol_short!("ANS");
const HAS_ANS: Symbol = symbol_short!("HAS_ANS");

// ── Types ────────────────────────────────────────────────────────────────────

/// A committed answer. Created only after an oracle-confirmed validity
/// verdict; never mutated, never decrypted for storage.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AnswerRecord {
    pub respondent: Address,
    pub main: CipherHandle,
    pub metas: Vec<CipherHandle>,
}

/// Transient correlation entry between submission and oracle callback,
/// keyed by decryption-request id.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingAdmission {
    pub q_id: u64,
    pub respondent: Address,
    pub main: CipherHandle,
    pub metas: Vec<CipherHandle>,
    /// Encrypted 0/1 verdict the oracle is asked to decrypt.
    pub validity: CipherHandle,
    pub submitted_at: u64,
}

// ── Submission ───────────────────────────────────────────────────────────────

/// Open a pending admission for `respondent`, returning the decryption
/// request id the oracle will answer.
///
/// `pending_ttl_secs` is the configured staleness bound: a previous pending
/// entry older than it may be superseded (0 = pending entries never expire).
pub(crate) fn submit(
    env: &Env,
    question: &Question,
    respondent: &Address,
    main_ct: i128,
    meta_cts: &Vec<i128>,
    input_proof: &soroban_sdk::BytesN<32>,
    pending_ttl_secs: u64,
) -> Result<u64, ContractError> {
    if meta_cts.len() != question.metas.len() {
        return Err(ContractError::MetaAnswerNumberNotMatch);
    }

    let expected = encrypted::input_proof(env, question.id, main_ct, meta_cts);
    if expected != *input_proof {
        return Err(ContractError::InvalidInputProof);
    }

    if has_answered(env, question.id, respondent) {
        return Err(ContractError::AlreadyAnswered);
    }
    check_pending(env, question.id, respondent, pending_ttl_secs)?;

    // Ingest ciphertexts and build the conjoined validity bit, all under
    // the encrypted algebra; no plaintext is computed on this path.
    let main = encrypted::ingest(env, main_ct);
    let mut validity = field_validity(env, &question.main, main);

    let mut metas = Vec::new(env);
    for (i, spec) in question.metas.iter().enumerate() {
        let handle = encrypted::ingest(env, meta_cts.get(i as u32).unwrap());
        validity = encrypted::and(env, validity, field_validity(env, &spec, handle));
        metas.push_back(handle);
    }

    let req_id = next_request_id(env);
    let pending = PendingAdmission {
        q_id: question.id,
        respondent: respondent.clone(),
        main,
        metas,
        validity,
        submitted_at: env.ledger().timestamp(),
    };

    let key = (PENDING, req_id);
    env.storage().persistent().set(&key, &pending);
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);

    let by_key = (PENDING_BY, question.id, respondent.clone());
    env.storage().persistent().set(&by_key, &req_id);
    env.storage()
        .persistent()
        .extend_ttl(&by_key, TTL_THRESHOLD, TTL_EXTEND_TO);

    Ok(req_id)
}

/// Encrypted bound check for one field: Option fields must index an
/// existing option, Value fields must fall within `[min, max]`.
fn field_validity(env: &Env, spec: &QuestionSpec, handle: CipherHandle) -> CipherHandle {
    match spec.kind {
        QuestionKind::Option => {
            encrypted::compare(env, handle, &PredicateOp::Lt, spec.options.len())
        }
        QuestionKind::Value => {
            let ge = encrypted::compare(env, handle, &PredicateOp::Ge, spec.min);
            let le = encrypted::compare(env, handle, &PredicateOp::Le, spec.max);
            encrypted::and(env, ge, le)
        }
    }
}

fn check_pending(
    env: &Env,
    q_id: u64,
    respondent: &Address,
    pending_ttl_secs: u64,
) -> Result<(), ContractError> {
    let by_key = (PENDING_BY, q_id, respondent.clone());
    let prev_req: Option<u64> = env.storage().persistent().get(&by_key);
    let Some(prev_req) = prev_req else {
        return Ok(());
    };

    let prev: Option<PendingAdmission> = env.storage().persistent().get(&(PENDING, prev_req));
    let Some(prev) = prev else {
        // Marker left behind by an earlier cleanup; clear and proceed.
        env.storage().persistent().remove(&by_key);
        return Ok(());
    };

    let now = env.ledger().timestamp();
    if pending_ttl_secs > 0 && now >= prev.submitted_at.saturating_add(pending_ttl_secs) {
        // Stale pending: supersede it.
        env.storage().persistent().remove(&(PENDING, prev_req));
        env.storage().persistent().remove(&by_key);
        return Ok(());
    }

    Err(ContractError::AlreadyAnswered)
}

// ── Oracle callback ──────────────────────────────────────────────────────────

/// Resolve a pending admission. Returns `None` for an unknown or
/// already-resolved request id (the callback is idempotent under
/// at-least-once, unordered oracle delivery).
pub(crate) fn resolve(env: &Env, req_id: u64, valid: bool) -> Option<PendingAdmission> {
    let key = (PENDING, req_id);
    let pending: PendingAdmission = env.storage().persistent().get(&key)?;

    env.storage().persistent().remove(&key);
    env.storage()
        .persistent()
        .remove(&(PENDING_BY, pending.q_id, pending.respondent.clone()));

    if valid {
        let idx = question::ans_len(env, pending.q_id);
        let record = AnswerRecord {
            respondent: pending.respondent.clone(),
            main: pending.main,
            metas: pending.metas.clone(),
        };
        let ans_key = (ANSWER, pending.q_id, idx);
        env.storage().persistent().set(&ans_key, &record);
        env.storage()
            .persistent()
            .extend_ttl(&ans_key, TTL_THRESHOLD, TTL_EXTEND_TO);
        question::bump_ans_len(env, pending.q_id);

        let has_key = (HAS_ANS, pending.q_id, pending.respondent.clone());
        env.storage().persistent().set(&has_key, &true);
        env.storage()
            .persistent()
            .extend_ttl(&has_key, TTL_THRESHOLD, TTL_EXTEND_TO);
    }

    Some(pending)
}

// ── Reads ────────────────────────────────────────────────────────────────────

pub(crate) fn answer(env: &Env, q_id: u64, idx: u32) -> AnswerRecord {
    env.storage().persistent().get(&(ANSWER, q_id, idx)).unwrap()
}

pub(crate) fn has_answered(env: &Env, q_id: u64, respondent: &Address) -> bool {
    env.storage()
        .persistent()
        .get(&(HAS_ANS, q_id, respondent.clone()))
        .unwrap_or(false)
}

pub(crate) fn pending(env: &Env, req_id: u64) -> Option<PendingAdmission> {
    env.storage().persistent().get(&(PENDING, req_id))
}

pub(crate) fn request_counter(env: &Env) -> u64 {
    env.storage().instance().get(&DEC_CTR).unwrap_or(0u64)
}

fn next_request_id(env: &Env) -> u64 {
    let id = request_counter(env);
    env.storage().instance().set(&DEC_CTR, &id.saturating_add(1));
    id
}
