//! Polygon validation and measurement.

use icbg_types::{Polygon, Position};

use crate::GeodataError;

/// Mean Earth radius used for surface area, in metres.
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Minimum positions in a closed ring: three vertices plus the closing point.
pub const MIN_RING_POSITIONS: usize = 4;

/// Checks that the geometry is a polygon whose rings are all usable.
///
/// Every ring, holes included, must be closed, hold at least
/// [`MIN_RING_POSITIONS`] positions and contain only finite coordinates.
pub fn validate(polygon: &Polygon) -> Result<(), GeodataError> {
	if polygon.kind != Polygon::GEOMETRY_TYPE {
		return Err(GeodataError::InvalidPolygon(format!(
			"expected Polygon geometry, got {}",
			polygon.kind
		)));
	}

	if polygon.coordinates.is_empty() {
		return Err(GeodataError::InvalidPolygon("polygon has no rings".to_string()));
	}

	for (index, ring) in polygon.coordinates.iter().enumerate() {
		validate_ring(index, ring)?;
	}

	Ok(())
}

fn validate_ring(index: usize, ring: &[Position]) -> Result<(), GeodataError> {
	if ring.len() < MIN_RING_POSITIONS {
		return Err(GeodataError::InvalidPolygon(format!(
			"ring {} has {} positions, at least {} required",
			index,
			ring.len(),
			MIN_RING_POSITIONS
		)));
	}

	if !ring.iter().all(Position::is_finite) {
		return Err(GeodataError::InvalidPolygon(format!(
			"ring {} contains non-finite coordinates",
			index
		)));
	}

	if ring.first() != ring.last() {
		return Err(GeodataError::InvalidPolygon(format!(
			"ring {} is not closed",
			index
		)));
	}

	Ok(())
}

/// Boolean form of [`validate`].
pub fn is_valid(polygon: &Polygon) -> bool {
	validate(polygon).is_ok()
}

/// Spherical surface area of the outer ring in km².
///
/// Holes are not subtracted: the address query covers the whole outer ring,
/// so that is the region the area ceiling has to bound.
pub fn area_km2(polygon: &Polygon) -> f64 {
	polygon
		.outer_ring()
		.map(|outer| ring_area(outer).abs() / 1_000_000.0)
		.unwrap_or(0.0)
}

/// Signed area of a ring on the sphere, in m².
fn ring_area(ring: &[Position]) -> f64 {
	let n = ring.len();
	if n <= 2 {
		return 0.0;
	}

	let total: f64 = (0..n)
		.map(|i| {
			let lower = ring[i];
			let middle = ring[(i + 1) % n];
			let upper = ring[(i + 2) % n];
			(upper.lng.to_radians() - lower.lng.to_radians()) * middle.lat.to_radians().sin()
		})
		.sum();

	total * EARTH_RADIUS_M * EARTH_RADIUS_M / 2.0
}

#[cfg(test)]
mod tests {
	use super::*;

	fn square(size: f64) -> Polygon {
		Polygon::from_ring(vec![
			Position::new(0.0, 0.0),
			Position::new(0.0, size),
			Position::new(size, size),
			Position::new(size, 0.0),
			Position::new(0.0, 0.0),
		])
	}

	#[test]
	fn test_small_square_is_valid_and_tiny() {
		let polygon = square(0.001);
		assert!(is_valid(&polygon));

		let area = area_km2(&polygon);
		assert!(area > 0.0);
		// 0.001 degrees is roughly 111 m at the equator.
		assert!((area - 0.0124).abs() < 0.001, "area was {}", area);
	}

	#[test]
	fn test_area_grows_with_extent() {
		let small = area_km2(&square(0.01));
		let large = area_km2(&square(0.02));
		assert!(large > small);
		assert!((large / small - 4.0).abs() < 0.01);
	}

	#[test]
	fn test_area_ignores_winding() {
		let mut reversed = square(0.01);
		reversed.coordinates[0].reverse();
		assert!((area_km2(&reversed) - area_km2(&square(0.01))).abs() < 1e-9);
	}

	fn with_hole(mut polygon: Polygon, hole: Vec<Position>) -> Polygon {
		polygon.coordinates.push(hole);
		polygon
	}

	#[test]
	fn test_hole_does_not_shrink_area() {
		let outer = square(1.0);
		let hole = outer.coordinates[0].clone();
		let polygon = with_hole(outer, hole);

		assert!(is_valid(&polygon));
		let expected = area_km2(&square(1.0));
		assert!(expected > 12_000.0, "area was {}", expected);
		assert!((area_km2(&polygon) - expected).abs() < 1e-9);
	}

	#[test]
	fn test_rejects_broken_hole() {
		let open_hole = with_hole(
			square(0.02),
			vec![
				Position::new(0.005, 0.005),
				Position::new(0.005, 0.015),
				Position::new(0.015, 0.015),
				Position::new(0.015, 0.005),
			],
		);
		assert!(matches!(
			validate(&open_hole),
			Err(GeodataError::InvalidPolygon(msg)) if msg.contains("ring 1")
		));

		let short_hole = with_hole(
			square(0.02),
			vec![Position::new(0.005, 0.005), Position::new(0.005, 0.005)],
		);
		assert!(!is_valid(&short_hole));

		let nan_hole = with_hole(
			square(0.02),
			vec![
				Position::new(0.005, 0.005),
				Position::new(f64::NAN, 0.015),
				Position::new(0.015, 0.015),
				Position::new(0.005, 0.005),
			],
		);
		assert!(!is_valid(&nan_hole));
	}

	#[test]
	fn test_rejects_short_ring() {
		let triangle_open = Polygon::from_ring(vec![
			Position::new(0.0, 0.0),
			Position::new(0.0, 1.0),
			Position::new(0.0, 0.0),
		]);
		assert!(matches!(
			validate(&triangle_open),
			Err(GeodataError::InvalidPolygon(_))
		));
	}

	#[test]
	fn test_rejects_wrong_geometry_and_empty() {
		let mut point = square(0.001);
		point.kind = "Point".into();
		assert!(!is_valid(&point));

		let empty = Polygon {
			kind: "Polygon".into(),
			coordinates: vec![],
		};
		assert!(!is_valid(&empty));
		assert_eq!(area_km2(&empty), 0.0);
	}

	#[test]
	fn test_rejects_unclosed_ring() {
		let polygon = Polygon::from_ring(vec![
			Position::new(0.0, 0.0),
			Position::new(0.0, 1.0),
			Position::new(1.0, 1.0),
			Position::new(1.0, 0.0),
		]);
		assert!(!is_valid(&polygon));
	}
}
