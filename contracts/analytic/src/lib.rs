#![no_std]

//! # Confidential Analytics
//!
//! A confidential-analytics contract: collects per-respondent answers to a
//! structured question (a main response plus optional metadata fields),
//! keeps every answer encrypted at rest, validates each answer
//! asynchronously through an external decryption oracle before admitting
//! it, and lets a question admin run aggregate queries (bucketed counts or
//! min/sum/max statistics) filtered by predicates over the encrypted
//! metadata — without ever exposing an individual answer in the clear.
//!
//! - **Two-phase admission**: `submit_answer` opens a pending entry whose
//!   encrypted validity bit the oracle decrypts out of band;
//!   `confirm_or_reject_answer` commits or discards it.
//! - **Resumable aggregation**: `execute_query` folds a bounded number of
//!   records per call; the persisted cursor/accumulator make any chunking
//!   of the scan produce the identical final result.
//! - **Branch-free folding**: the engine never branches on a ciphertext;
//!   bucket selection and stats updates go through homomorphic
//!   compare/select against every slot.

pub mod admission;
pub mod aggregate;
pub mod encrypted;
pub mod events;
pub mod predicate;
pub mod query;
pub mod question;

use soroban_sdk::{
    contract, contractimpl, contracttype, symbol_short, Address, BytesN, Env, Symbol, Vec,
};

use encrypted::{PaillierPrivateKey, PaillierPublicKey};
use predicate::Predicate;
use query::{QueryRequest, QueryResult, RevealedResult};
use question::{
    AggregateKind, Question, QuestionKind, QuestionSpec, QuestionState, MAX_METAS, MAX_PREDICATES,
    STATS_ANS_SIZE,
};

// ── Instance storage keys ─────────────────────────────────────────────────────

const ADMIN: Symbol = symbol_short!("ADMIN");
const ORACLE: Symbol = symbol_short!("ORACLE");
const CONFIG: Symbol = symbol_short!("CONFIG");
const INITIALIZED: Symbol = symbol_short!("INIT");

// ── Error codes ───────────────────────────────────────────────────────────────

#[soroban_sdk::contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ContractError {
    AlreadyInitialized = 1,
    NotInitialized = 2,
    InvalidQuestion = 3,
    InvalidQuestionParam = 4,
    InvalidQuestionMetaParam = 5,
    NotQuestionAdmin = 6,
    QuestionNotOpen = 7,
    QuestionClosed = 8,
    AlreadyAnswered = 9,
    MetaAnswerNumberNotMatch = 10,
    InvalidInputProof = 11,
    NotOracle = 12,
    InvalidQueryRequest = 13,
    NotQueryOwner = 14,
    QueryHasCompleted = 15,
    QueryNotCompleted = 16,
    QueryThresholdNotReach = 17,
}

// ── Config ────────────────────────────────────────────────────────────────────

/// Policy knobs fixed at initialisation.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// When true, only a request's owner may call `execute_query`.
    pub owner_only_stepping: bool,
    /// Seconds after which an unresolved pending admission may be
    /// superseded by a fresh submission; 0 = pending entries never expire.
    pub pending_ttl_secs: u64,
}

// ── Contract ──────────────────────────────────────────────────────────────────

#[contract]
pub struct Analytic;

#[contractimpl]
impl Analytic {
    // ── Initialisation ────────────────────────────────────────────────────────

    /// Bootstrap the contract.
    ///
    /// * `oracle`   — the only address allowed to deliver validation
    ///                verdicts via `confirm_or_reject_answer`.
    /// * `pub_key`  — Paillier public key respondents encrypt under.
    /// * `priv_key` — evaluator key; held in instance storage and never
    ///                readable outside the contract boundary.
    pub fn initialize(
        env: Env,
        admin: Address,
        oracle: Address,
        pub_key: PaillierPublicKey,
        priv_key: PaillierPrivateKey,
        config: Config,
    ) -> Result<(), ContractError> {
        if env.storage().instance().has(&INITIALIZED) {
            return Err(ContractError::AlreadyInitialized);
        }
        env.storage().instance().set(&ADMIN, &admin);
        env.storage().instance().set(&ORACLE, &oracle);
        env.storage().instance().set(&CONFIG, &config);
        encrypted::init_keys(&env, &pub_key, &priv_key);
        env.storage().instance().set(&INITIALIZED, &true);
        Ok(())
    }

    // ── Question lifecycle ────────────────────────────────────────────────────

    /// Create a question. The caller becomes its admin. The aggregate kind
    /// derives from the main spec: Option ⇒ Count, Value ⇒ Stats.
    pub fn new_question(
        env: Env,
        creator: Address,
        main: QuestionSpec,
        metas: Vec<QuestionSpec>,
        start_time: u64,
        end_time: u64,
        query_threshold: u32,
    ) -> Result<u64, ContractError> {
        Self::require_initialized(&env)?;
        creator.require_auth();

        question::validate_main(&main)?;
        question::validate_metas(&metas)?;
        if start_time >= end_time {
            return Err(ContractError::InvalidQuestionParam);
        }

        let aggregate_kind = match main.kind {
            QuestionKind::Option => AggregateKind::Count,
            QuestionKind::Value => AggregateKind::Stats,
        };

        let id = question::next_id(&env);
        let q = Question {
            id,
            main,
            metas,
            aggregate_kind,
            start_time,
            end_time,
            state: QuestionState::Initialized,
            query_threshold,
        };
        question::store(&env, &q);
        question::set_admin(&env, id, &creator);
        events::publish_question_created(&env, &creator, id, start_time, end_time);

        Ok(id)
    }

    /// Close a question. Admin-gated, idempotent.
    pub fn close_question(env: Env, caller: Address, q_id: u64) -> Result<(), ContractError> {
        Self::require_initialized(&env)?;
        caller.require_auth();

        let mut q = question::load(&env, q_id).ok_or(ContractError::InvalidQuestion)?;
        question::require_admin(&env, q_id, &caller)?;

        if q.state != QuestionState::Closed {
            q.state = QuestionState::Closed;
            question::store(&env, &q);
            events::publish_question_closed(&env, q_id);
        }
        Ok(())
    }

    // ── Answer admission ──────────────────────────────────────────────────────

    /// Submit an encrypted answer. Opens a pending admission and returns
    /// the decryption request id; the answer only becomes a record once the
    /// oracle confirms its validity.
    pub fn submit_answer(
        env: Env,
        respondent: Address,
        q_id: u64,
        main_ct: i128,
        meta_cts: Vec<i128>,
        input_proof: BytesN<32>,
    ) -> Result<u64, ContractError> {
        Self::require_initialized(&env)?;
        respondent.require_auth();

        let mut q = question::load(&env, q_id).ok_or(ContractError::InvalidQuestion)?;
        question::require_answerable(&env, &q)?;

        let config = Self::config(&env);
        let req_id = admission::submit(
            &env,
            &q,
            &respondent,
            main_ct,
            &meta_cts,
            &input_proof,
            config.pending_ttl_secs,
        )?;

        if q.state == QuestionState::Initialized {
            q.state = QuestionState::Open;
            question::store(&env, &q);
        }

        Ok(req_id)
    }

    /// Oracle callback delivering a validation verdict. Idempotent: a
    /// callback for an unknown or already-resolved request id is a no-op.
    pub fn confirm_or_reject_answer(
        env: Env,
        caller: Address,
        req_id: u64,
        valid: bool,
    ) -> Result<(), ContractError> {
        Self::require_initialized(&env)?;
        caller.require_auth();
        Self::require_oracle(&env, &caller)?;

        if let Some(pending) = admission::resolve(&env, req_id, valid) {
            if valid {
                events::publish_confirm_answer(&env, pending.q_id, &pending.respondent);
            } else {
                events::publish_reject_answer(&env, pending.q_id, &pending.respondent);
            }
        }
        Ok(())
    }

    // ── Decryption oracle gateway ─────────────────────────────────────────────

    /// The validity ciphertext of an open decryption request, for the
    /// off-chain oracle worker to pick up.
    pub fn get_decryption_request(env: Env, req_id: u64) -> Option<i128> {
        admission::pending(&env, req_id).map(|p| encrypted::ciphertext(&env, p.validity))
    }

    /// Oracle-gated decryption of a pending request's validity bit.
    /// `None` for a request id that is unknown or already resolved.
    pub fn oracle_decrypt(
        env: Env,
        caller: Address,
        req_id: u64,
    ) -> Result<Option<u32>, ContractError> {
        caller.require_auth();
        Self::require_oracle(&env, &caller)?;
        Ok(admission::pending(&env, req_id).map(|p| encrypted::reveal(&env, p.validity)))
    }

    pub fn next_decryption_request_id(env: Env) -> u64 {
        admission::request_counter(&env)
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Create a query request over a question's committed answers.
    ///
    /// Admin-gated and threshold-gated. Snapshots the current answer count;
    /// answers admitted later are not part of this request's scan.
    pub fn request_query(
        env: Env,
        caller: Address,
        q_id: u64,
        predicates: Vec<Predicate>,
    ) -> Result<u64, ContractError> {
        Self::require_initialized(&env)?;
        caller.require_auth();

        let q = question::load(&env, q_id).ok_or(ContractError::InvalidQuestion)?;
        question::require_admin(&env, q_id, &caller)?;
        if question::ans_len(&env, q_id) < q.query_threshold {
            return Err(ContractError::QueryThresholdNotReach);
        }

        let req_id = query::create(&env, &caller, &q, &predicates)?;
        events::publish_query_request_created(&env, req_id, &caller);
        Ok(req_id)
    }

    /// Advance a query by up to `steps` records. Emits
    /// `QRY_RUN(acc_steps, ttl)` while records remain, `QRY_DONE` once the
    /// cursor reaches the creation-time snapshot.
    pub fn execute_query(
        env: Env,
        caller: Address,
        req_id: u64,
        steps: u32,
    ) -> Result<(), ContractError> {
        Self::require_initialized(&env)?;
        caller.require_auth();

        let owner_only = Self::config(&env).owner_only_stepping;
        let request = query::execute(&env, &caller, req_id, steps, owner_only)?;

        if request.state == query::RequestState::Completed {
            events::publish_query_execution_completed(&env, req_id);
        } else {
            events::publish_query_execution_running(
                &env,
                req_id,
                request.acc_steps,
                request.ttl_ans_count,
            );
        }
        Ok(())
    }

    /// Owner-only cleanup of a query request.
    pub fn delete_query(env: Env, caller: Address, req_id: u64) -> Result<(), ContractError> {
        Self::require_initialized(&env)?;
        caller.require_auth();

        query::delete(&env, &caller, req_id)?;
        events::publish_query_request_deleted(&env, req_id);
        Ok(())
    }

    /// The accumulator snapshot. Readable at any time; only meaningful once
    /// the request has completed.
    pub fn get_query_result(env: Env, req_id: u64) -> Result<QueryResult, ContractError> {
        query::result(&env, req_id)
    }

    /// Decrypt a completed accumulator for its owner — the gateway's final
    /// reveal.
    pub fn reveal_query_result(
        env: Env,
        caller: Address,
        req_id: u64,
    ) -> Result<RevealedResult, ContractError> {
        caller.require_auth();
        query::reveal(&env, &caller, req_id)
    }

    // ── View functions ────────────────────────────────────────────────────────

    pub fn get_question(env: Env, q_id: u64) -> Option<Question> {
        question::load(&env, q_id)
    }

    pub fn get_ans_len(env: Env, q_id: u64) -> u32 {
        question::ans_len(&env, q_id)
    }

    pub fn has_answered(env: Env, q_id: u64, respondent: Address) -> bool {
        admission::has_answered(&env, q_id, &respondent)
    }

    pub fn is_question_admin(env: Env, q_id: u64, who: Address) -> bool {
        question::is_admin(&env, q_id, &who)
    }

    pub fn get_query_request(env: Env, req_id: u64) -> Option<QueryRequest> {
        query::load(&env, req_id)
    }

    pub fn get_user_query_request_list(env: Env, user: Address, q_id: u64) -> Vec<u64> {
        query::user_list(&env, &user, q_id)
    }

    pub fn next_question_id(env: Env) -> u64 {
        question::id_counter(&env)
    }

    pub fn next_query_request_id(env: Env) -> u64 {
        query::id_counter(&env)
    }

    pub fn get_public_key(env: Env) -> PaillierPublicKey {
        encrypted::public_key(&env)
    }

    pub fn get_admin(env: Env) -> Result<Address, ContractError> {
        env.storage()
            .instance()
            .get(&ADMIN)
            .ok_or(ContractError::NotInitialized)
    }

    pub fn get_oracle(env: Env) -> Result<Address, ContractError> {
        env.storage()
            .instance()
            .get(&ORACLE)
            .ok_or(ContractError::NotInitialized)
    }

    pub fn max_metas(_env: Env) -> u32 {
        MAX_METAS
    }

    pub fn max_predicates(_env: Env) -> u32 {
        MAX_PREDICATES
    }

    pub fn stats_ans_size(_env: Env) -> u32 {
        STATS_ANS_SIZE
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    fn require_initialized(env: &Env) -> Result<(), ContractError> {
        if !env.storage().instance().has(&INITIALIZED) {
            return Err(ContractError::NotInitialized);
        }
        Ok(())
    }

    fn require_oracle(env: &Env, caller: &Address) -> Result<(), ContractError> {
        let oracle: Address = env
            .storage()
            .instance()
            .get(&ORACLE)
            .ok_or(ContractError::NotInitialized)?;
        if *caller != oracle {
            return Err(ContractError::NotOracle);
        }
        Ok(())
    }

    fn config(env: &Env) -> Config {
        env.storage().instance().get(&CONFIG).unwrap()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
