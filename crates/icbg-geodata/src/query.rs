//! Overpass QL query construction.

use icbg_types::{BoundingBox, Polygon};

use crate::GeodataError;

/// Residential building subtypes matched even without a house number.
pub const RESIDENTIAL_BUILDINGS: &[&str] = &["house", "residential", "apartments", "detached", "terrace"];

/// Renders the outer ring as `"lat lon lat lon ..."` for the `poly:` filter.
pub fn poly_filter(polygon: &Polygon) -> String {
	polygon
		.outer_ring()
		.unwrap_or_default()
		.iter()
		.map(|p| format!("{} {}", p.lat, p.lng))
		.collect::<Vec<_>>()
		.join(" ")
}

/// Builds the address query for a validated polygon.
///
/// The bounding box scopes the search globally and the polygon filter is
/// applied to each of the three clauses. Area elements are returned with full
/// geometry so that centroids can be computed locally.
pub fn build_query(polygon: &Polygon, timeout_secs: u64) -> Result<String, GeodataError> {
	let bbox = BoundingBox::of_polygon(polygon)
		.ok_or_else(|| GeodataError::InvalidPolygon("polygon has no positions".to_string()))?;
	let poly = poly_filter(polygon);
	let residential = RESIDENTIAL_BUILDINGS.join("|");

	Ok(format!(
		"[out:json][timeout:{timeout}][bbox:{min_lat},{min_lng},{max_lat},{max_lng}];\n\
		 (\n\
		 \x20 way[\"building\"][\"addr:housenumber\"](poly:\"{poly}\");\n\
		 \x20 node[\"addr:housenumber\"](poly:\"{poly}\");\n\
		 \x20 way[\"building\"~\"^({residential})$\"](poly:\"{poly}\");\n\
		 );\n\
		 out body geom;",
		timeout = timeout_secs,
		min_lat = bbox.min_lat,
		min_lng = bbox.min_lng,
		max_lat = bbox.max_lat,
		max_lng = bbox.max_lng,
		poly = poly,
		residential = residential,
	))
}
