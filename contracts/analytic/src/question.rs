//! Question definitions, validation, storage, and lifecycle.

use soroban_sdk::{contracttype, symbol_short, Address, Env, String, Symbol, Vec};

use crate::ContractError;

// ── Storage key prefixes ─────────────────────────────────────────────────────

pub(crate) const QUESTION_CTR: Symbol = symbol_short!("QST_CTR");
const QUESTION: Symbol = symbol_short!("QST");
const ANS_LEN: Symbol = symbol_short!("ANS_LEN");
const Q_ADMIN: Symbol = symbol_short!("Q_ADMIN");

// TTL: ~60 days at 5s/ledger
pub(crate) const TTL_THRESHOLD: u32 = 1_036_800;
pub(crate) const TTL_EXTEND_TO: u32 = 2_073_600;

/// Upper bound on metadata fields per question.
pub const MAX_METAS: u32 = 8;
/// Upper bound on predicates per query request.
pub const MAX_PREDICATES: u32 = 3;
/// Accumulator width for Stats questions: [min, sum, max].
pub const STATS_ANS_SIZE: u32 = 3;

// ── Types ────────────────────────────────────────────────────────────────────

/// What a single spec asks for: a choice among fixed options, or a numeric
/// value within `[min, max]`.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum QuestionKind {
    Option,
    Value,
}

/// How completed answers are aggregated. Derived from the main spec's kind:
/// Option questions are bucket-counted, Value questions get [min, sum, max].
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AggregateKind {
    Count,
    Stats,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum QuestionState {
    Initialized,
    Open,
    Closed,
}

/// One structured prompt. Immutable once attached to a question.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QuestionSpec {
    pub text: String,
    /// Non-empty iff `kind == Option`.
    pub options: Vec<String>,
    /// Inclusive bounds, meaningful iff `kind == Value`.
    pub min: u32,
    pub max: u32,
    pub kind: QuestionKind,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Question {
    pub id: u64,
    pub main: QuestionSpec,
    pub metas: Vec<QuestionSpec>,
    pub aggregate_kind: AggregateKind,
    pub start_time: u64,
    pub end_time: u64,
    pub state: QuestionState,
    /// Queries are allowed only once this many answers are committed.
    pub query_threshold: u32,
}

// ── Validation ───────────────────────────────────────────────────────────────

fn spec_well_formed(spec: &QuestionSpec) -> bool {
    match spec.kind {
        QuestionKind::Option => !spec.options.is_empty(),
        QuestionKind::Value => spec.options.is_empty() && spec.min < spec.max,
    }
}

pub(crate) fn validate_main(spec: &QuestionSpec) -> Result<(), ContractError> {
    if !spec_well_formed(spec) {
        return Err(ContractError::InvalidQuestionParam);
    }
    Ok(())
}

pub(crate) fn validate_metas(metas: &Vec<QuestionSpec>) -> Result<(), ContractError> {
    if metas.len() > MAX_METAS {
        return Err(ContractError::InvalidQuestionMetaParam);
    }
    for spec in metas.iter() {
        if !spec_well_formed(&spec) {
            return Err(ContractError::InvalidQuestionMetaParam);
        }
    }
    Ok(())
}

// ── Storage helpers ──────────────────────────────────────────────────────────

pub(crate) fn next_id(env: &Env) -> u64 {
    let id: u64 = env.storage().instance().get(&QUESTION_CTR).unwrap_or(0u64);
    env.storage()
        .instance()
        .set(&QUESTION_CTR, &id.saturating_add(1));
    id
}

pub(crate) fn id_counter(env: &Env) -> u64 {
    env.storage().instance().get(&QUESTION_CTR).unwrap_or(0u64)
}

pub(crate) fn store(env: &Env, question: &Question) {
    let key = (QUESTION, question.id);
    env.storage().persistent().set(&key, question);
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
}

pub(crate) fn load(env: &Env, id: u64) -> Option<Question> {
    env.storage().persistent().get(&(QUESTION, id))
}

pub(crate) fn ans_len(env: &Env, q_id: u64) -> u32 {
    env.storage()
        .persistent()
        .get(&(ANS_LEN, q_id))
        .unwrap_or(0u32)
}

pub(crate) fn bump_ans_len(env: &Env, q_id: u64) -> u32 {
    let len = ans_len(env, q_id).saturating_add(1);
    let key = (ANS_LEN, q_id);
    env.storage().persistent().set(&key, &len);
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
    len
}

pub(crate) fn set_admin(env: &Env, q_id: u64, who: &Address) {
    let key = (Q_ADMIN, q_id, who.clone());
    env.storage().persistent().set(&key, &true);
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
}

pub(crate) fn is_admin(env: &Env, q_id: u64, who: &Address) -> bool {
    env.storage()
        .persistent()
        .get(&(Q_ADMIN, q_id, who.clone()))
        .unwrap_or(false)
}

// ── Derived state checks ─────────────────────────────────────────────────────

/// Number of accumulator slots a query over this question needs.
pub(crate) fn bucket_count(question: &Question) -> u32 {
    match question.aggregate_kind {
        AggregateKind::Count => question.main.options.len(),
        AggregateKind::Stats => STATS_ANS_SIZE,
    }
}

/// A question accepts answers while not Closed and `start <= now < end`.
pub(crate) fn require_answerable(env: &Env, question: &Question) -> Result<(), ContractError> {
    if question.state == QuestionState::Closed {
        return Err(ContractError::QuestionClosed);
    }
    let now = env.ledger().timestamp();
    if now < question.start_time {
        return Err(ContractError::QuestionNotOpen);
    }
    if now >= question.end_time {
        return Err(ContractError::QuestionClosed);
    }
    Ok(())
}

pub(crate) fn require_admin(env: &Env, q_id: u64, caller: &Address) -> Result<(), ContractError> {
    if !is_admin(env, q_id, caller) {
        return Err(ContractError::NotQuestionAdmin);
    }
    Ok(())
}
