//! Idempotency token derivation.
//!
//! The token must be identical for the same logical intent across
//! process restarts and platform retries, so it is a SHA-256 over the
//! intent's identity fields rather than a std hash (whose output is not
//! stable across releases). The hourly commitment is rounded to four
//! decimal places before hashing so float noise cannot split a retry
//! into a second purchase.

use sha2::{Digest, Sha256};

use crate::sp::types::{PaymentOption, SpCategory, Term};

pub fn idempotency_token(
    category: SpCategory,
    term: Term,
    payment_option: PaymentOption,
    hourly_commitment: f64,
    recommendation_id: &str,
    run_month: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(category.as_str());
    hasher.update(b"|");
    hasher.update(term.as_str());
    hasher.update(b"|");
    hasher.update(payment_option.as_str());
    hasher.update(b"|");
    hasher.update(format!("{hourly_commitment:.4}"));
    hasher.update(b"|");
    hasher.update(recommendation_id);
    hasher.update(b"|");
    hasher.update(run_month);

    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
