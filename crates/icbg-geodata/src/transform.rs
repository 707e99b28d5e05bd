//! Conversion of raw map elements into addresses.
//!
//! Household metadata is a heuristic derived from structural tags only. The
//! randomized parts draw from a caller-supplied generator so runs can be
//! reproduced with a fixed seed.

use icbg_types::{
	Address, AgeBand, ElementType, HouseholdMetadata, HouseholdType, OsmRef,
};
use rand::Rng;
use std::collections::HashMap;

use crate::types::{GeometryPoint, OverpassElement};

/// Building levels above which a building is treated as multi-family.
const MULTI_FAMILY_LEVELS: i64 = 3;

/// Probability of children in apartments and tall buildings.
const APARTMENT_CHILDREN_PROBABILITY: f64 = 0.5;

/// Probability of children in other residential buildings.
const DEFAULT_CHILDREN_PROBABILITY: f64 = 0.6;

/// Maps an element to an address.
///
/// Elements without usable coordinates produce non-finite `lat`/`lng` and
/// are expected to be filtered by the caller with [`Address::is_deliverable`].
pub fn to_address<R: Rng + ?Sized>(element: &OverpassElement, rng: &mut R) -> Address {
	let (lat, lng) = element_position(element);

	let street_address = match (element.tag("addr:housenumber"), element.tag("addr:street")) {
		(Some(number), Some(street)) if !number.is_empty() && !street.is_empty() => {
			format!("{} {}", number, street)
		}
		_ => element
			.tag("addr:full")
			.map(str::to_string)
			.unwrap_or_else(|| format!("Building {}", element.id)),
	};

	let osm_ref = OsmRef {
		element_type: element.element_type,
		id: element.id,
	};

	Address {
		id: osm_ref.address_id(),
		street_address,
		city: element.tag("addr:city").unwrap_or_default().to_string(),
		state: element.tag("addr:state").unwrap_or_default().to_string(),
		postal_code: element.tag("addr:postcode").unwrap_or_default().to_string(),
		lat,
		lng,
		metadata: Some(infer_household(element.tag("building"), &element.tags, rng)),
		osm_ref: Some(osm_ref),
	}
}

/// Infers household labels from the building type and tags.
///
/// Rules are evaluated in priority order; the first match wins.
pub fn infer_household<R: Rng + ?Sized>(
	building_type: Option<&str>,
	tags: &HashMap<String, String>,
	rng: &mut R,
) -> HouseholdMetadata {
	let levels = tags
		.get("building:levels")
		.map(|v| parse_leading_int(v))
		.unwrap_or(Some(1));

	let family = |has_children: bool| HouseholdMetadata {
		household_type: Some(HouseholdType::Family),
		has_children: Some(has_children),
		estimated_age: Some(AgeBand::Middle),
	};

	if building_type == Some("apartments") || levels.is_some_and(|l| l > MULTI_FAMILY_LEVELS) {
		return family(rng.gen_bool(APARTMENT_CHILDREN_PROBABILITY));
	}

	if matches!(building_type, Some("house") | Some("detached")) {
		return family(true);
	}

	let tag = |key: &str| tags.get(key).map(String::as_str);
	if tag("social_facility") == Some("nursing_home") || tag("amenity") == Some("retirement_home") {
		return HouseholdMetadata {
			household_type: Some(HouseholdType::Elderly),
			has_children: Some(false),
			estimated_age: Some(AgeBand::Senior),
		};
	}

	family(rng.gen_bool(DEFAULT_CHILDREN_PROBABILITY))
}

/// Parses an optional sign and leading digits, ignoring the rest.
///
/// `"4"` and `"4.5"` give 4; `"many"` gives `None`.
fn parse_leading_int(value: &str) -> Option<i64> {
	let trimmed = value.trim_start();
	let (sign, digits) = match trimmed.strip_prefix('-') {
		Some(rest) => (-1, rest),
		None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
	};
	let end = digits
		.find(|c: char| !c.is_ascii_digit())
		.unwrap_or(digits.len());
	digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Position of an element as `(lat, lng)`.
fn element_position(element: &OverpassElement) -> (f64, f64) {
	match (&element.element_type, &element.geometry) {
		(ElementType::Way, Some(geometry)) if !geometry.is_empty() => {
			ring_centroid(geometry).unwrap_or((geometry[0].lat, geometry[0].lon))
		}
		_ => (
			element.lat.unwrap_or(f64::NAN),
			element.lon.unwrap_or(f64::NAN),
		),
	}
}

/// Vertex centroid of a way's outline as `(lat, lng)`.
///
/// The outline is closed first if needed; the closing point is excluded from
/// the mean. Returns `None` for degenerate outlines.
fn ring_centroid(geometry: &[GeometryPoint]) -> Option<(f64, f64)> {
	let mut ring = geometry.to_vec();
	if ring.len() > 2 && ring.first() != ring.last() {
		ring.push(ring[0]);
	}

	if ring.len() < 4 || ring.first() != ring.last() {
		return None;
	}

	let vertices = &ring[..ring.len() - 1];
	let n = vertices.len() as f64;
	let lat = vertices.iter().map(|p| p.lat).sum::<f64>() / n;
	let lng = vertices.iter().map(|p| p.lon).sum::<f64>() / n;

	(lat.is_finite() && lng.is_finite()).then_some((lat, lng))
}
