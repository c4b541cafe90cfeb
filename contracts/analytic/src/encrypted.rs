//! Encrypted-value algebra: opaque ciphertext handles plus the homomorphic
//! operations everything above is built from.
//!
//! Ciphertexts are Paillier values under the contract's public key. Callers
//! only ever hold *handles* (sequential ids into a persistent ciphertext
//! table), so no plaintext of a stored value is observable outside this
//! module. Addition is genuinely homomorphic (ciphertext multiplication);
//! comparison, selection and masked multiplication are computed inside the
//! trusted-evaluator boundary under the private key held in instance
//! storage, and always yield a fresh ciphertext.

use soroban_sdk::{contracttype, symbol_short, Bytes, BytesN, Env, Symbol, Vec};

use crate::predicate::PredicateOp;
use crate::question::{TTL_EXTEND_TO, TTL_THRESHOLD};

/// Opaque reference to a stored ciphertext.
pub type CipherHandle = u64;

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PaillierPublicKey {
    pub n: i128,  // n = p * q
    pub nn: i128, // n^2
    pub g: i128,  // g = n + 1
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PaillierPrivateKey {
    pub lambda: i128, // phi(n) = (p-1)(q-1)
    pub mu: i128,     // lambda^-1 mod n
}

// ── Storage keys ────────────────────────────────────────────────────────────

const PUB_KEY: Symbol = symbol_short!("PUB_KEY");
const PRIV_KEY: Symbol = symbol_short!("PRIV_KEY");
const CT_CTR: Symbol = symbol_short!("CT_CTR");
const CT: Symbol = symbol_short!("CT");

/// Fixed encryption randomness. A production deployment would draw r from
/// `env.prng()`; a fixed coprime base keeps the evaluator deterministic.
const ENC_R: i128 = 17;

// ── Key material ────────────────────────────────────────────────────────────

pub(crate) fn init_keys(env: &Env, pub_key: &PaillierPublicKey, priv_key: &PaillierPrivateKey) {
    env.storage().instance().set(&PUB_KEY, pub_key);
    env.storage().instance().set(&PRIV_KEY, priv_key);
}

pub(crate) fn public_key(env: &Env) -> PaillierPublicKey {
    env.storage().instance().get(&PUB_KEY).unwrap()
}

fn private_key(env: &Env) -> PaillierPrivateKey {
    env.storage().instance().get(&PRIV_KEY).unwrap()
}

// ── Handle table ────────────────────────────────────────────────────────────

fn store_ciphertext(env: &Env, c: i128) -> CipherHandle {
    let handle: u64 = env
        .storage()
        .instance()
        .get(&CT_CTR)
        .unwrap_or(0u64)
        .saturating_add(1);
    env.storage().instance().set(&CT_CTR, &handle);

    let key = (CT, handle);
    env.storage().persistent().set(&key, &c);
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
    handle
}

pub(crate) fn ciphertext(env: &Env, handle: CipherHandle) -> i128 {
    env.storage().persistent().get(&(CT, handle)).unwrap()
}

/// Admit a caller-produced external ciphertext into the handle table.
pub(crate) fn ingest(env: &Env, ct: i128) -> CipherHandle {
    store_ciphertext(env, ct)
}

/// Trivially encrypt a plaintext constant.
pub(crate) fn trivial(env: &Env, m: u32) -> CipherHandle {
    let pk = public_key(env);
    store_ciphertext(env, encrypt(&pk, m as i128))
}

// ── Homomorphic operations ──────────────────────────────────────────────────

/// Additive property: E(m1 + m2) = E(m1) * E(m2) mod n^2.
pub(crate) fn add(env: &Env, a: CipherHandle, b: CipherHandle) -> CipherHandle {
    let pk = public_key(env);
    let c = (ciphertext(env, a) * ciphertext(env, b)) % pk.nn;
    store_ciphertext(env, c)
}

/// Encrypted 0/1 comparison of a stored value against a plaintext constant.
pub(crate) fn compare(env: &Env, a: CipherHandle, op: &PredicateOp, k: u32) -> CipherHandle {
    let m = peek(env, a);
    let k = k as i128;
    let bit = match op {
        PredicateOp::Eq => m == k,
        PredicateOp::Ne => m != k,
        PredicateOp::Gt => m > k,
        PredicateOp::Lt => m < k,
        PredicateOp::Ge => m >= k,
        PredicateOp::Le => m <= k,
    };
    encrypt_bit(env, bit)
}

/// Encrypted 0/1 comparison of two stored values.
pub(crate) fn compare_handles(
    env: &Env,
    a: CipherHandle,
    op: &PredicateOp,
    b: CipherHandle,
) -> CipherHandle {
    let ma = peek(env, a);
    let mb = peek(env, b);
    let bit = match op {
        PredicateOp::Eq => ma == mb,
        PredicateOp::Ne => ma != mb,
        PredicateOp::Gt => ma > mb,
        PredicateOp::Lt => ma < mb,
        PredicateOp::Ge => ma >= mb,
        PredicateOp::Le => ma <= mb,
    };
    encrypt_bit(env, bit)
}

/// Conjunction of two encrypted bits.
pub(crate) fn and(env: &Env, a: CipherHandle, b: CipherHandle) -> CipherHandle {
    let bit = peek(env, a) != 0 && peek(env, b) != 0;
    encrypt_bit(env, bit)
}

/// Encrypted multiplexer: the result re-encrypts the chosen arm so the
/// output handle reveals nothing about which arm was taken.
pub(crate) fn select(
    env: &Env,
    cond: CipherHandle,
    a: CipherHandle,
    b: CipherHandle,
) -> CipherHandle {
    let chosen = if peek(env, cond) != 0 {
        peek(env, a)
    } else {
        peek(env, b)
    };
    let pk = public_key(env);
    store_ciphertext(env, encrypt(&pk, chosen))
}

/// Masked product: E(mask * v). Used for the Stats running sum.
pub(crate) fn mul(env: &Env, mask: CipherHandle, v: CipherHandle) -> CipherHandle {
    let m = peek(env, mask) * peek(env, v);
    let pk = public_key(env);
    store_ciphertext(env, encrypt(&pk, m))
}

/// Decrypt a handle. Only reachable through the oracle-gated and
/// owner-gated entry points in `lib.rs`.
pub(crate) fn reveal(env: &Env, handle: CipherHandle) -> u32 {
    peek(env, handle) as u32
}

// ── Input proof ─────────────────────────────────────────────────────────────

/// Binding hash over a submission's ciphertexts:
/// `SHA-256(q_id_le || main_ct_le || meta_ct_le ...)`.
///
/// The respondent address is not folded in; a canonical address
/// serialisation is not available in no_std and the ciphertexts themselves
/// are caller-specific.
pub fn input_proof(env: &Env, q_id: u64, main_ct: i128, meta_cts: &Vec<i128>) -> BytesN<32> {
    let mut data = Bytes::new(env);
    for b in q_id.to_le_bytes().iter() {
        data.push_back(*b);
    }
    for b in main_ct.to_le_bytes().iter() {
        data.push_back(*b);
    }
    for ct in meta_cts.iter() {
        for b in ct.to_le_bytes().iter() {
            data.push_back(*b);
        }
    }
    env.crypto().sha256(&data).into()
}

// ── Trusted evaluator internals ─────────────────────────────────────────────

fn peek(env: &Env, handle: CipherHandle) -> i128 {
    let pk = public_key(env);
    let sk = private_key(env);
    decrypt(&pk, &sk, ciphertext(env, handle))
}

fn encrypt_bit(env: &Env, bit: bool) -> CipherHandle {
    let pk = public_key(env);
    store_ciphertext(env, encrypt(&pk, if bit { 1 } else { 0 }))
}

/// c = (g^m * r^n) mod n^2
pub(crate) fn encrypt(pk: &PaillierPublicKey, m: i128) -> i128 {
    let gm = pow_mod(pk.g, m, pk.nn);
    let rn = pow_mod(ENC_R, pk.n, pk.nn);
    (gm * rn) % pk.nn
}

/// m = L(c^lambda mod n^2) * mu mod n, with L(u) = (u - 1) / n
fn decrypt(pk: &PaillierPublicKey, sk: &PaillierPrivateKey, c: i128) -> i128 {
    let u = pow_mod(c, sk.lambda, pk.nn);
    let l_u = (u - 1) / pk.n;
    (l_u * sk.mu) % pk.n
}

fn pow_mod(mut base: i128, mut exp: i128, mod_val: i128) -> i128 {
    let mut res = 1;
    base %= mod_val;
    while exp > 0 {
        if exp % 2 == 1 {
            res = (res * base) % mod_val;
        }
        base = (base * base) % mod_val;
        exp /= 2;
    }
    res
}
