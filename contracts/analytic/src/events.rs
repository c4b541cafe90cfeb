//! Structured event publishing for the Analytic contract.

use soroban_sdk::{symbol_short, Address, Env};

pub fn publish_question_created(env: &Env, owner: &Address, q_id: u64, start: u64, end: u64) {
    env.events()
        .publish((symbol_short!("Q_NEW"), q_id), (owner.clone(), start, end));
}

pub fn publish_question_closed(env: &Env, q_id: u64) {
    env.events().publish((symbol_short!("Q_CLOSE"), q_id), ());
}

pub fn publish_confirm_answer(env: &Env, q_id: u64, respondent: &Address) {
    env.events()
        .publish((symbol_short!("ANS_OK"), q_id), respondent.clone());
}

pub fn publish_reject_answer(env: &Env, q_id: u64, respondent: &Address) {
    env.events()
        .publish((symbol_short!("ANS_REJ"), q_id), respondent.clone());
}

pub fn publish_query_request_created(env: &Env, req_id: u64, owner: &Address) {
    env.events()
        .publish((symbol_short!("QRY_NEW"), req_id), owner.clone());
}

pub fn publish_query_execution_running(env: &Env, req_id: u64, acc_steps: u32, ttl: u32) {
    env.events()
        .publish((symbol_short!("QRY_RUN"), req_id), (acc_steps, ttl));
}

pub fn publish_query_execution_completed(env: &Env, req_id: u64) {
    env.events().publish((symbol_short!("QRY_DONE"), req_id), ());
}

pub fn publish_query_request_deleted(env: &Env, req_id: u64) {
    env.events().publish((symbol_short!("QRY_DEL"), req_id), ());
}
