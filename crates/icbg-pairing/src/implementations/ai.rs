//! AI-recommended pairing with rule-based recovery.
//!
//! The delegate must answer with either a bare JSON array of
//! `{addressId, asin, reason}` entries or an object wrapping that array under
//! `pairings`. A surrounding Markdown code fence is accepted. Anything else
//! counts as zero AI pairings and every address is backfilled by rules.

use async_trait::async_trait;
use icbg_agent::{AgentRequest, AgentService};
use icbg_types::{Address, GiftPairing, PairingResult, PairingStrategy, StrategyOutcome};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::prompt::{build_pairing_prompt, pairing_output_schema};
use crate::rules::fallback_product;
use crate::{Catalog, PairingContext, PairingError, PairingStrategyInterface, SearchProductsTool};

const BACKFILL_REASON: &str = "Assigned via rule-based fallback";
const AI_UNAVAILABLE_REASON: &str = "Assigned via rule-based logic (AI unavailable)";

/// One entry of the delegate's answer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AiPairing {
	#[serde(rename = "addressId")]
	pub address_id: String,
	pub asin: String,
	#[serde(default)]
	pub reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AiOutput {
	List(Vec<AiPairing>),
	Wrapped { pairings: Vec<AiPairing> },
}

fn strip_code_fence(output: &str) -> &str {
	let trimmed = output.trim();
	let Some(body) = trimmed
		.strip_prefix("```")
		.and_then(|rest| rest.strip_suffix("```"))
	else {
		return trimmed;
	};
	match body.split_once('\n') {
		Some((tag, inner)) if !tag.contains(|c| c == '[' || c == '{') => inner.trim(),
		_ => body.trim(),
	}
}

/// Parses the delegate's final output.
pub fn parse_output(output: &str) -> Result<Vec<AiPairing>, PairingError> {
	let body = strip_code_fence(output);
	match serde_json::from_str::<AiOutput>(body) {
		Ok(AiOutput::List(pairings)) | Ok(AiOutput::Wrapped { pairings }) => Ok(pairings),
		Err(e) => Err(PairingError::PairingParseFailure(e.to_string())),
	}
}

/// Resolves parsed entries against the request and the catalog.
///
/// Entries for unknown addresses, repeated addresses, or unknown asins are
/// dropped with a warning.
pub fn resolve(
	entries: Vec<AiPairing>,
	addresses: &[Address],
	catalog: &Catalog,
) -> HashMap<String, GiftPairing> {
	let requested: HashSet<&str> = addresses.iter().map(|a| a.id.as_str()).collect();
	let mut resolved = HashMap::new();

	for entry in entries {
		if !requested.contains(entry.address_id.as_str()) {
			warn!(address_id = %entry.address_id, "Dropping AI pairing for unknown address");
			continue;
		}
		if resolved.contains_key(&entry.address_id) {
			warn!(address_id = %entry.address_id, "Dropping duplicate AI pairing");
			continue;
		}
		let Some(product) = catalog.by_asin(&entry.asin) else {
			warn!(
				address_id = %entry.address_id,
				error = %PairingError::ProductNotFound(entry.asin.clone()),
				"Dropping AI pairing"
			);
			continue;
		};
		resolved.insert(
			entry.address_id.clone(),
			GiftPairing {
				address_id: entry.address_id,
				product: product.clone(),
				pairing_reason: entry.reason,
			},
		);
	}
	resolved
}

fn rule_based(address: &Address, catalog: &Catalog, reason: &str) -> GiftPairing {
	GiftPairing {
		address_id: address.id.clone(),
		product: fallback_product(catalog, address).clone(),
		pairing_reason: Some(reason.to_string()),
	}
}

/// Delegates pairing to the AI agent.
pub struct AiStrategy {
	agent: Arc<AgentService>,
	tool: Arc<SearchProductsTool>,
	model: String,
	tool_servers: Vec<String>,
}

impl AiStrategy {
	pub fn new(
		agent: Arc<AgentService>,
		tool: SearchProductsTool,
		model: impl Into<String>,
		tool_servers: Vec<String>,
	) -> Self {
		Self {
			agent,
			tool: Arc::new(tool),
			model: model.into(),
			tool_servers,
		}
	}

	fn request(&self, addresses: &[Address]) -> AgentRequest {
		AgentRequest::new(build_pairing_prompt(addresses), self.model.clone())
			.with_tool(self.tool.clone())
			.with_tool_servers(self.tool_servers.clone())
			.with_response_schema(pairing_output_schema())
	}
}

#[async_trait]
impl PairingStrategyInterface for AiStrategy {
	async fn pair(&self, addresses: &[Address], context: &PairingContext<'_>) -> PairingResult {
		let catalog = context.catalog;

		let response = match self.agent.run(self.request(addresses)).await {
			Ok(response) => response,
			Err(e) => {
				warn!(error = %e, "AI pairing failed, using rule-based fallback");
				return PairingResult {
					pairings: addresses
						.iter()
						.map(|a| rule_based(a, catalog, AI_UNAVAILABLE_REASON))
						.collect(),
					strategy_used: StrategyOutcome::RuleBasedFallback,
				};
			}
		};

		let entries = parse_output(&response.final_output).unwrap_or_else(|e| {
			warn!(error = %e, "Treating AI output as empty");
			Vec::new()
		});
		let mut resolved = resolve(entries, addresses, catalog);

		let mut backfilled = 0usize;
		let pairings: Vec<GiftPairing> = addresses
			.iter()
			.map(|address| {
				resolved.remove(&address.id).unwrap_or_else(|| {
					backfilled += 1;
					rule_based(address, catalog, BACKFILL_REASON)
				})
			})
			.collect();

		let strategy_used = if backfilled > 0 {
			info!(
				backfilled,
				total = addresses.len(),
				"Backfilled unpaired addresses with rule-based fallback"
			);
			StrategyOutcome::AiWithFallback
		} else {
			StrategyOutcome::Requested(PairingStrategy::AiRecommended)
		};

		PairingResult {
			pairings,
			strategy_used,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{address, household};
	use icbg_agent::implementations::mock::MockAgent;
	use icbg_types::AgeBand;
	use serde_json::json;

	fn strategy(agent: MockAgent) -> (AiStrategy, Arc<Catalog>) {
		let catalog = Arc::new(Catalog::embedded().unwrap());
		let strategy = AiStrategy::new(
			Arc::new(AgentService::new(Box::new(agent))),
			SearchProductsTool::new(catalog.clone()),
			"test-model",
			vec!["mail-server".into()],
		);
		(strategy, catalog)
	}

	fn addresses() -> Vec<Address> {
		vec![
			address("osm_node_1", household(true, AgeBand::Middle)),
			address("osm_node_2", household(false, AgeBand::Senior)),
			address("osm_node_3", None),
		]
	}

	#[test]
	fn test_parse_accepts_array_object_and_fence() {
		let array = r#"[{"addressId":"a","asin":"B0X001","reason":"fun"}]"#;
		let wrapped = r#"{"pairings":[{"addressId":"a","asin":"B0X001"}]}"#;
		let fenced = "```json\n[{\"addressId\":\"a\",\"asin\":\"B0X001\"}]\n```";

		for output in [array, wrapped, fenced] {
			let parsed = parse_output(output).unwrap();
			assert_eq!(parsed.len(), 1);
			assert_eq!(parsed[0].asin, "B0X001");
		}
		assert_eq!(
			parse_output(array).unwrap()[0].reason.as_deref(),
			Some("fun")
		);
	}

	#[test]
	fn test_parse_rejects_prose() {
		let output = r#"Here you go: [{"addressId":"a","asin":"B0X001"}]"#;
		assert!(matches!(
			parse_output(output),
			Err(PairingError::PairingParseFailure(_))
		));
		assert!(parse_output("").is_err());
	}

	#[test]
	fn test_resolve_drops_unknown_and_duplicates() {
		let catalog = Catalog::embedded().unwrap();
		let entries = vec![
			AiPairing {
				address_id: "osm_node_1".into(),
				asin: "B0X002".into(),
				reason: None,
			},
			AiPairing {
				address_id: "osm_node_1".into(),
				asin: "B0X003".into(),
				reason: None,
			},
			AiPairing {
				address_id: "osm_node_2".into(),
				asin: "NOPE".into(),
				reason: None,
			},
			AiPairing {
				address_id: "osm_node_99".into(),
				asin: "B0X001".into(),
				reason: None,
			},
		];

		let resolved = resolve(entries, &addresses(), &catalog);
		assert_eq!(resolved.len(), 1);
		assert_eq!(resolved["osm_node_1"].product.asin, "B0X002");
	}

	#[tokio::test]
	async fn test_full_ai_result_keeps_label() {
		let output = json!({"pairings": [
			{"addressId": "osm_node_3", "asin": "B0X010", "reason": "c"},
			{"addressId": "osm_node_1", "asin": "B0X001", "reason": "a"},
			{"addressId": "osm_node_2", "asin": "B0X007", "reason": "b"}
		]})
		.to_string();
		let (strategy, catalog) = strategy(MockAgent::new().with_response(output));
		let context = PairingContext {
			catalog: &catalog,
			category_hint: None,
		};

		let result = strategy.pair(&addresses(), &context).await;

		assert_eq!(
			result.strategy_used,
			StrategyOutcome::Requested(PairingStrategy::AiRecommended)
		);
		let ids: Vec<&str> = result.pairings.iter().map(|p| p.address_id.as_str()).collect();
		assert_eq!(ids, vec!["osm_node_1", "osm_node_2", "osm_node_3"]);
		assert_eq!(result.pairings[2].product.asin, "B0X010");
		assert_eq!(result.pairings[0].pairing_reason.as_deref(), Some("a"));
	}

	#[tokio::test]
	async fn test_partial_result_is_backfilled() {
		let output = r#"[{"addressId":"osm_node_2","asin":"B0X011","reason":"photos"}]"#;
		let (strategy, catalog) = strategy(MockAgent::new().with_response(output));
		let context = PairingContext {
			catalog: &catalog,
			category_hint: None,
		};
		let input = addresses();

		let result = strategy.pair(&input, &context).await;

		assert_eq!(result.strategy_used, StrategyOutcome::AiWithFallback);
		assert_eq!(result.pairings.len(), input.len());
		assert_eq!(result.pairings[1].product.asin, "B0X011");
		assert_eq!(
			result.pairings[0].product,
			*fallback_product(&catalog, &input[0])
		);
		assert_eq!(
			result.pairings[0].pairing_reason.as_deref(),
			Some(BACKFILL_REASON)
		);
	}

	#[tokio::test]
	async fn test_unparseable_output_backfills_everything() {
		let (strategy, catalog) = strategy(MockAgent::new().with_response("I could not decide."));
		let context = PairingContext {
			catalog: &catalog,
			category_hint: None,
		};

		let result = strategy.pair(&addresses(), &context).await;

		assert_eq!(result.strategy_used, StrategyOutcome::AiWithFallback);
		assert!(result
			.pairings
			.iter()
			.all(|p| p.pairing_reason.as_deref() == Some(BACKFILL_REASON)));
	}

	#[tokio::test]
	async fn test_agent_failure_labels_rule_based() {
		let (strategy, catalog) = strategy(MockAgent::new().failing("down"));
		let context = PairingContext {
			catalog: &catalog,
			category_hint: None,
		};

		let result = strategy.pair(&addresses(), &context).await;

		assert_eq!(result.strategy_used, StrategyOutcome::RuleBasedFallback);
		assert!(result
			.pairings
			.iter()
			.all(|p| p.pairing_reason.as_deref() == Some(AI_UNAVAILABLE_REASON)));
	}

	#[tokio::test]
	async fn test_request_carries_tool_and_servers() {
		let agent = Arc::new(AgentService::new(Box::new(
			MockAgent::new()
				.with_tool_call("search_products", json!({"category": "books"}))
				.with_response("[]"),
		)));
		let catalog = Arc::new(Catalog::embedded().unwrap());
		let strategy = AiStrategy::new(
			agent,
			SearchProductsTool::new(catalog.clone()),
			"test-model",
			vec!["mail-server".into()],
		);
		let request = strategy.request(&addresses());

		assert_eq!(request.tool_servers, vec!["mail-server".to_string()]);
		assert!(request.tool("search_products").is_some());
		assert!(request.response_schema.is_some());

		let context = PairingContext {
			catalog: &catalog,
			category_hint: None,
		};
		let result = strategy.pair(&addresses(), &context).await;
		assert_eq!(result.pairings.len(), 3);
	}
}
