//! Query requests and the resumable stepped executor.
//!
//! A request snapshots the answer count at creation and carries its own
//! cursor and accumulator, so the scan over an unbounded answer set can be
//! split across any number of bounded `execute` calls and still produce a
//! result identical to a single unsplit pass.

use soroban_sdk::{contracttype, symbol_short, Address, Env, Symbol, Vec};

use crate::admission;
use crate::aggregate;
use crate::encrypted::{self, CipherHandle};
use crate::predicate::{self, Predicate};
use crate::question::{self, Question, MAX_PREDICATES, TTL_EXTEND_TO, TTL_THRESHOLD};
use crate::ContractError;

// ── Storage key prefixes ─────────────────────────────────────────────────────

pub(crate) const QUERY_CTR: Symbol = symbol_short!("QRY_CTR");
const QUERY: Symbol = symbol_short!("QRY");
const USER_QUERIES: Symbol = symbol_short!("UQRY");

// ── Types ────────────────────────────────────────────────────────────────────

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RequestState {
    Running,
    Completed,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QueryRequest {
    pub id: u64,
    pub q_id: u64,
    pub owner: Address,
    pub predicates: Vec<Predicate>,
    /// Running accumulator; shape depends on the question's aggregate kind.
    pub acc: Vec<CipherHandle>,
    /// Encrypted count of records matching all predicates so far.
    pub filtered_count: CipherHandle,
    /// Cursor: number of records already folded.
    pub acc_steps: u32,
    /// Answer count snapshotted at creation; the fixed bound for this scan.
    pub ttl_ans_count: u32,
    pub state: RequestState,
}

/// Accumulator snapshot exposed to readers.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QueryResult {
    pub acc: Vec<CipherHandle>,
    pub filtered_count: CipherHandle,
    pub ttl_ans_count: u32,
}

/// Owner-only decrypted view of a completed accumulator.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RevealedResult {
    pub acc: Vec<u32>,
    pub filtered_count: u32,
}

// ── Creation ─────────────────────────────────────────────────────────────────

pub(crate) fn create(
    env: &Env,
    owner: &Address,
    question: &Question,
    predicates: &Vec<Predicate>,
) -> Result<u64, ContractError> {
    if predicates.len() > MAX_PREDICATES {
        return Err(ContractError::InvalidQueryRequest);
    }
    for predicate in predicates.iter() {
        if predicate.meta_index >= question.metas.len() {
            return Err(ContractError::InvalidQueryRequest);
        }
    }

    let id = next_id(env);
    let request = QueryRequest {
        id,
        q_id: question.id,
        owner: owner.clone(),
        predicates: predicates.clone(),
        acc: aggregate::init(env, question),
        filtered_count: encrypted::trivial(env, 0),
        acc_steps: 0,
        ttl_ans_count: question::ans_len(env, question.id),
        state: RequestState::Running,
    };
    store(env, &request);

    let list_key = (USER_QUERIES, owner.clone(), question.id);
    let mut list: Vec<u64> = env.storage().persistent().get(&list_key).unwrap_or(Vec::new(env));
    list.push_back(id);
    env.storage().persistent().set(&list_key, &list);
    env.storage()
        .persistent()
        .extend_ttl(&list_key, TTL_THRESHOLD, TTL_EXTEND_TO);

    Ok(id)
}

// ── Stepped execution ────────────────────────────────────────────────────────

/// Fold up to `steps` records into the accumulator, advancing the cursor.
/// Returns the updated request; the caller publishes Running/Completed.
pub(crate) fn execute(
    env: &Env,
    caller: &Address,
    req_id: u64,
    steps: u32,
    owner_only: bool,
) -> Result<QueryRequest, ContractError> {
    let mut request = load(env, req_id).ok_or(ContractError::InvalidQueryRequest)?;

    if owner_only && *caller != request.owner {
        return Err(ContractError::NotQueryOwner);
    }
    if request.state == RequestState::Completed {
        return Err(ContractError::QueryHasCompleted);
    }

    let question = question::load(env, request.q_id).ok_or(ContractError::InvalidQuestion)?;

    let remaining = request.ttl_ans_count - request.acc_steps;
    let take = if steps < remaining { steps } else { remaining };

    let mut acc = request.acc.clone();
    for i in request.acc_steps..request.acc_steps + take {
        let record = admission::answer(env, request.q_id, i);
        let mask = predicate::evaluate(env, &record, &request.predicates);
        aggregate::fold(env, &question, &mut acc, &record, mask);
        request.filtered_count = encrypted::add(env, request.filtered_count, mask);
    }
    request.acc = acc;
    request.acc_steps += take;

    if request.acc_steps == request.ttl_ans_count {
        request.state = RequestState::Completed;
    }
    store(env, &request);

    Ok(request)
}

// ── Reads, reveal, deletion ──────────────────────────────────────────────────

pub(crate) fn result(env: &Env, req_id: u64) -> Result<QueryResult, ContractError> {
    let request = load(env, req_id).ok_or(ContractError::InvalidQueryRequest)?;
    Ok(QueryResult {
        acc: request.acc,
        filtered_count: request.filtered_count,
        ttl_ans_count: request.ttl_ans_count,
    })
}

/// Decrypt a completed accumulator for its owner. The gateway's only
/// plaintext exit for aggregate data.
pub(crate) fn reveal(
    env: &Env,
    caller: &Address,
    req_id: u64,
) -> Result<RevealedResult, ContractError> {
    let request = load(env, req_id).ok_or(ContractError::InvalidQueryRequest)?;
    if *caller != request.owner {
        return Err(ContractError::NotQueryOwner);
    }
    if request.state != RequestState::Completed {
        return Err(ContractError::QueryNotCompleted);
    }

    let mut acc = Vec::new(env);
    for handle in request.acc.iter() {
        acc.push_back(encrypted::reveal(env, handle));
    }
    Ok(RevealedResult {
        acc,
        filtered_count: encrypted::reveal(env, request.filtered_count),
    })
}

pub(crate) fn delete(env: &Env, caller: &Address, req_id: u64) -> Result<(), ContractError> {
    let request = load(env, req_id).ok_or(ContractError::InvalidQueryRequest)?;
    if *caller != request.owner {
        return Err(ContractError::NotQueryOwner);
    }

    env.storage().persistent().remove(&(QUERY, req_id));

    let list_key = (USER_QUERIES, request.owner.clone(), request.q_id);
    let list: Option<Vec<u64>> = env.storage().persistent().get(&list_key);
    if let Some(list) = list {
        let mut kept = Vec::new(env);
        for id in list.iter() {
            if id != req_id {
                kept.push_back(id);
            }
        }
        env.storage().persistent().set(&list_key, &kept);
    }
    Ok(())
}

pub(crate) fn user_list(env: &Env, user: &Address, q_id: u64) -> Vec<u64> {
    env.storage()
        .persistent()
        .get(&(USER_QUERIES, user.clone(), q_id))
        .unwrap_or(Vec::new(env))
}

pub(crate) fn load(env: &Env, req_id: u64) -> Option<QueryRequest> {
    env.storage().persistent().get(&(QUERY, req_id))
}

pub(crate) fn id_counter(env: &Env) -> u64 {
    env.storage().instance().get(&QUERY_CTR).unwrap_or(0u64)
}

fn next_id(env: &Env) -> u64 {
    let id = id_counter(env);
    env.storage().instance().set(&QUERY_CTR, &id.saturating_add(1));
    id
}

fn store(env: &Env, request: &QueryRequest) {
    let key = (QUERY, request.id);
    env.storage().persistent().set(&key, request);
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
}
