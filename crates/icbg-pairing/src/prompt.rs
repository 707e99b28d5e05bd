//! Prompt and output schema for AI gift pairing.

use icbg_types::{Address, AgeBand, HouseholdType, ProductCategory};
use serde_json::{json, Value};

use crate::tool::SEARCH_PRODUCTS;

fn household_label(household_type: Option<HouseholdType>) -> &'static str {
	match household_type {
		Some(HouseholdType::Family) => "family",
		Some(HouseholdType::Single) => "single",
		Some(HouseholdType::Elderly) => "elderly",
		None => "unknown",
	}
}

fn age_label(age: Option<AgeBand>) -> &'static str {
	match age {
		Some(AgeBand::Young) => "young",
		Some(AgeBand::Middle) => "middle",
		Some(AgeBand::Senior) => "senior",
		None => "unknown",
	}
}

fn household_block(address: &Address) -> String {
	let metadata = address.metadata.unwrap_or_default();
	let has_children = metadata
		.has_children
		.map(|v| v.to_string())
		.unwrap_or_else(|| "unknown".to_string());
	format!(
		"- Address ID: {id}\n\
		 - Address: {line}\n\
		 - Household Type: {household}\n\
		 - Has Children: {has_children}\n\
		 - Estimated Age: {age}\n",
		id = address.id,
		line = address.one_line(),
		household = household_label(metadata.household_type),
		has_children = has_children,
		age = age_label(metadata.estimated_age),
	)
}

/// Renders the pairing prompt for a set of households.
pub fn build_pairing_prompt(addresses: &[Address]) -> String {
	let categories = ProductCategory::ALL
		.iter()
		.map(|c| c.as_str())
		.collect::<Vec<_>>()
		.join(", ");
	let households = addresses
		.iter()
		.map(household_block)
		.collect::<Vec<_>>()
		.join("\n");

	format!(
		"You coordinate holiday gift deliveries. Recommend one gift from the \
		 catalog for each household below, taking into account the household \
		 type, whether children live there, and the estimated age band.\n\
		 \n\
		 Call the {tool} tool to look up products. Categories: {categories}.\n\
		 Age ranges: children, teen, adult, senior, all.\n\
		 \n\
		 Households:\n\
		 \n\
		 {households}\n\
		 Respond with a JSON object of the form \
		 {{\"pairings\": [{{\"addressId\": \"osm_...\", \"asin\": \"B0X001\", \
		 \"reason\": \"why this gift fits\"}}]}} and nothing else.",
		tool = SEARCH_PRODUCTS,
		categories = categories,
		households = households,
	)
}

/// JSON schema the delegate's final output must satisfy.
pub fn pairing_output_schema() -> Value {
	json!({
		"type": "object",
		"properties": {
			"pairings": {
				"type": "array",
				"items": {
					"type": "object",
					"properties": {
						"addressId": { "type": "string" },
						"asin": { "type": "string" },
						"reason": { "type": "string" }
					},
					"required": ["addressId", "asin", "reason"],
					"additionalProperties": false
				}
			}
		},
		"required": ["pairings"],
		"additionalProperties": false
	})
}
