//! Geometry types shared by the resolution pipeline.
//!
//! Polygons follow GeoJSON conventions: every position is a
//! `[longitude, latitude]` pair and the first ring is the outer boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single `[longitude, latitude]` coordinate.
///
/// Additional ordinates (altitude) are accepted on input and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "[f64; 2]")]
pub struct Position {
	pub lng: f64,
	pub lat: f64,
}

impl Position {
	pub fn new(lng: f64, lat: f64) -> Self {
		Self { lng, lat }
	}

	pub fn is_finite(&self) -> bool {
		self.lng.is_finite() && self.lat.is_finite()
	}
}

/// Error produced when a coordinate array has fewer than two ordinates.
#[derive(Debug)]
pub struct PositionError(usize);

impl fmt::Display for PositionError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"position must contain at least 2 ordinates, got {}",
			self.0
		)
	}
}

impl TryFrom<Vec<f64>> for Position {
	type Error = PositionError;

	fn try_from(value: Vec<f64>) -> Result<Self, Self::Error> {
		match value.as_slice() {
			[lng, lat, ..] => Ok(Self::new(*lng, *lat)),
			_ => Err(PositionError(value.len())),
		}
	}
}

impl From<Position> for [f64; 2] {
	fn from(value: Position) -> Self {
		[value.lng, value.lat]
	}
}

/// A GeoJSON geometry object as submitted by callers.
///
/// The `type` member is kept as a string so that non-polygon geometries
/// deserialize and can be rejected by validation rather than by the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
	/// GeoJSON geometry type; only `"Polygon"` is accepted downstream.
	#[serde(rename = "type")]
	pub kind: String,
	/// Linear rings; the first is the outer boundary, the rest are holes.
	#[serde(default)]
	pub coordinates: Vec<Vec<Position>>,
}

impl Polygon {
	pub const GEOMETRY_TYPE: &'static str = "Polygon";

	/// Builds a polygon from a single outer ring.
	pub fn from_ring(ring: Vec<Position>) -> Self {
		Self {
			kind: Self::GEOMETRY_TYPE.to_string(),
			coordinates: vec![ring],
		}
	}

	/// Returns the outer ring, if any.
	pub fn outer_ring(&self) -> Option<&[Position]> {
		self.coordinates.first().map(Vec::as_slice)
	}
}

/// Axis-aligned bounding box in degrees.
///
/// Serialized as `[minLng, minLat, maxLng, maxLat]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
	pub min_lng: f64,
	pub min_lat: f64,
	pub max_lng: f64,
	pub max_lat: f64,
}

impl BoundingBox {
	/// Computes the box spanning every position in every ring.
	///
	/// Returns `None` when there are no positions at all.
	pub fn of_polygon(polygon: &Polygon) -> Option<Self> {
		let mut positions = polygon.coordinates.iter().flatten();
		let first = positions.next()?;
		let init = Self {
			min_lng: first.lng,
			min_lat: first.lat,
			max_lng: first.lng,
			max_lat: first.lat,
		};

		Some(positions.fold(init, |bbox, p| Self {
			min_lng: bbox.min_lng.min(p.lng),
			min_lat: bbox.min_lat.min(p.lat),
			max_lng: bbox.max_lng.max(p.lng),
			max_lat: bbox.max_lat.max(p.lat),
		}))
	}
}

impl From<[f64; 4]> for BoundingBox {
	fn from(v: [f64; 4]) -> Self {
		Self {
			min_lng: v[0],
			min_lat: v[1],
			max_lng: v[2],
			max_lat: v[3],
		}
	}
}

impl From<BoundingBox> for [f64; 4] {
	fn from(b: BoundingBox) -> Self {
		[b.min_lng, b.min_lat, b.max_lng, b.max_lat]
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_polygon_deserializes_geojson() {
		let json = r#"{"type":"Polygon","coordinates":[[[0,0],[0,1,12.5],[1,1],[0,0]]]}"#;
		let polygon: Polygon = serde_json::from_str(json).unwrap();

		assert_eq!(polygon.kind, "Polygon");
		let ring = polygon.outer_ring().unwrap();
		assert_eq!(ring.len(), 4);
		assert_eq!(ring[1], Position::new(0.0, 1.0));
	}

	#[test]
	fn test_position_rejects_single_ordinate() {
		let result: Result<Position, _> = serde_json::from_str("[1.0]");
		assert!(result.is_err());
	}

	#[test]
	fn test_bounding_box_spans_all_rings() {
		let polygon = Polygon {
			kind: "Polygon".into(),
			coordinates: vec![vec![
				Position::new(-122.42, 37.77),
				Position::new(-122.40, 37.78),
				Position::new(-122.41, 37.76),
				Position::new(-122.42, 37.77),
			]],
		};
		let bbox = BoundingBox::of_polygon(&polygon).unwrap();

		assert_eq!(
			<[f64; 4]>::from(bbox),
			[-122.42, 37.76, -122.40, 37.78]
		);
		assert_eq!(
			serde_json::to_string(&bbox).unwrap(),
			"[-122.42,37.76,-122.4,37.78]"
		);
	}

	#[test]
	fn test_bounding_box_empty_polygon() {
		let polygon = Polygon {
			kind: "Polygon".into(),
			coordinates: vec![],
		};
		assert!(BoundingBox::of_polygon(&polygon).is_none());
	}
}
