//! Gift pairing types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Product;

/// Assignment of one catalog product to one address.
///
/// The product is a full copy so that the price at assignment time is kept
/// even if the catalog later changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GiftPairing {
	#[serde(rename = "addressId")]
	pub address_id: String,
	pub product: Product,
	#[serde(
		rename = "pairingReason",
		default,
		skip_serializing_if = "Option::is_none"
	)]
	pub pairing_reason: Option<String>,
}

/// Sum of product prices across a pairing result.
pub fn total_cost(pairings: &[GiftPairing]) -> f64 {
	pairings.iter().map(|p| p.product.price).sum()
}

/// Strategy requested by the caller for a pairing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PairingStrategy {
	#[default]
	AiRecommended,
	RoundRobin,
	SingleProduct,
}

impl PairingStrategy {
	pub fn as_str(&self) -> &'static str {
		match self {
			PairingStrategy::AiRecommended => "ai-recommended",
			PairingStrategy::RoundRobin => "round-robin",
			PairingStrategy::SingleProduct => "single-product",
		}
	}
}

impl fmt::Display for PairingStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for PairingStrategy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"ai-recommended" => Ok(PairingStrategy::AiRecommended),
			"round-robin" => Ok(PairingStrategy::RoundRobin),
			"single-product" => Ok(PairingStrategy::SingleProduct),
			other => Err(format!("unknown pairing strategy: {}", other)),
		}
	}
}

/// Strategy that actually produced a pairing result.
///
/// Differs from the requested [`PairingStrategy`] when the AI path had to be
/// recovered by rule-based assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyOutcome {
	Requested(PairingStrategy),
	/// AI produced some pairings; the remainder was backfilled by rules.
	AiWithFallback,
	/// AI call failed outright; every pairing is rule-based.
	RuleBasedFallback,
}

impl StrategyOutcome {
	pub fn label(&self) -> &'static str {
		match self {
			StrategyOutcome::Requested(strategy) => strategy.as_str(),
			StrategyOutcome::AiWithFallback => "ai-recommended (with fallback)",
			StrategyOutcome::RuleBasedFallback => "rule-based-fallback",
		}
	}
}

impl fmt::Display for StrategyOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

impl Serialize for StrategyOutcome {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(self.label())
	}
}

/// Outcome of a pairing run.
#[derive(Debug, Clone, Serialize)]
pub struct PairingResult {
	pub pairings: Vec<GiftPairing>,
	#[serde(rename = "strategyUsed")]
	pub strategy_used: StrategyOutcome,
}

impl PairingResult {
	pub fn total_cost(&self) -> f64 {
		total_cost(&self.pairings)
	}
}
