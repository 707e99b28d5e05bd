//! Cyclic assignment by address index.

use async_trait::async_trait;
use icbg_types::{Address, GiftPairing, PairingResult, PairingStrategy, StrategyOutcome};

use crate::{PairingContext, PairingStrategyInterface};

const REASON: &str = "Assigned via round-robin distribution";

/// Address `i` receives catalog product `i mod catalog size`.
pub struct RoundRobinStrategy;

#[async_trait]
impl PairingStrategyInterface for RoundRobinStrategy {
	async fn pair(&self, addresses: &[Address], context: &PairingContext<'_>) -> PairingResult {
		let pairings = addresses
			.iter()
			.enumerate()
			.map(|(index, address)| GiftPairing {
				address_id: address.id.clone(),
				product: context.catalog.cyclic(index).clone(),
				pairing_reason: Some(REASON.to_string()),
			})
			.collect();

		PairingResult {
			pairings,
			strategy_used: StrategyOutcome::Requested(PairingStrategy::RoundRobin),
		}
	}
}
