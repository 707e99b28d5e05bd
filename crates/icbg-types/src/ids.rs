//! Public identifier generation.
//!
//! Identifiers are opaque strings: a fixed human-readable prefix followed by
//! a random uppercase alphanumeric suffix. Uniqueness is the only contract.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of the random suffix.
pub const ID_SUFFIX_LEN: usize = 10;

pub const BATCH_PREFIX: &str = "BATCH";
pub const ORDER_PREFIX: &str = "HOHOHO";
pub const SELECTION_PREFIX: &str = "SEL";

/// Generates `"{prefix}-XXXXXXXXXX"`.
pub fn generate_id(prefix: &str) -> String {
	let suffix: String = rand::thread_rng()
		.sample_iter(&Alphanumeric)
		.take(ID_SUFFIX_LEN)
		.map(|b| char::from(b).to_ascii_uppercase())
		.collect();
	format!("{}-{}", prefix, suffix)
}

pub fn generate_batch_id() -> String {
	generate_id(BATCH_PREFIX)
}

pub fn generate_order_id() -> String {
	generate_id(ORDER_PREFIX)
}

pub fn generate_selection_id() -> String {
	generate_id(SELECTION_PREFIX)
}
