//! Wire types of the Overpass JSON output.

use icbg_types::ElementType;
use serde::Deserialize;
use std::collections::HashMap;

/// Top-level Overpass response document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverpassResponse {
	#[serde(default)]
	pub elements: Vec<OverpassElement>,
}

/// A raw map element.
#[derive(Debug, Clone, Deserialize)]
pub struct OverpassElement {
	#[serde(rename = "type")]
	pub element_type: ElementType,
	pub id: i64,
	/// Present on nodes.
	pub lat: Option<f64>,
	pub lon: Option<f64>,
	#[serde(default)]
	pub tags: HashMap<String, String>,
	/// Present on ways when the query asks for `geom` output.
	#[serde(default)]
	pub geometry: Option<Vec<GeometryPoint>>,
}

impl OverpassElement {
	pub fn tag(&self, key: &str) -> Option<&str> {
		self.tags.get(key).map(String::as_str)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GeometryPoint {
	pub lat: f64,
	pub lon: f64,
}
