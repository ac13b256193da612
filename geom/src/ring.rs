use std::collections::HashSet;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::{GPSBounds, LonLat};

/// A closed sequence of points. The first equals the last.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ring {
    pts: Vec<LonLat>,
}

impl Ring {
    pub fn new(pts: Vec<LonLat>) -> Result<Ring> {
        check(&pts)?;
        Ok(Ring { pts })
    }

    /// Keeps the points exactly as given, even if they don't form a valid ring. Only an empty
    /// list is refused.
    pub fn unchecked_new(pts: Vec<LonLat>) -> Result<Ring> {
        if pts.is_empty() {
            bail!("Can't make a ring with no points");
        }
        Ok(Ring { pts })
    }

    /// Parses one GeoJSON linear ring.
    pub fn from_geojson(raw: &[Vec<f64>]) -> Result<Ring> {
        Ring::new(parse_points(raw)?)
    }

    /// Parses one GeoJSON linear ring without validating its shape.
    pub fn from_geojson_unchecked(raw: &[Vec<f64>]) -> Result<Ring> {
        Ring::unchecked_new(parse_points(raw)?)
    }

    pub fn to_geojson(&self) -> Vec<Vec<f64>> {
        self.pts.iter().map(|pt| pt.to_geojson()).collect()
    }

    /// True for rings that `Ring::new` would refuse, like ones collapsed to a line or a point.
    pub fn is_degenerate(&self) -> bool {
        check(&self.pts).is_err()
    }

    pub fn points(&self) -> &Vec<LonLat> {
        &self.pts
    }

    pub fn get_bounds(&self) -> GPSBounds {
        GPSBounds::from(&self.pts)
    }
}

fn parse_points(raw: &[Vec<f64>]) -> Result<Vec<LonLat>> {
    raw.iter().map(|pos| LonLat::from_geojson(pos)).collect()
}

fn check(pts: &[LonLat]) -> Result<()> {
    if pts.len() < 4 {
        bail!("Can't make a ring with < 4 points");
    }
    if pts[0] != pts[pts.len() - 1] {
        bail!("Can't make a ring with mismatching first/last points");
    }

    // The ring can't collapse to a line or a point
    let mut seen_pts = HashSet::new();
    for pt in pts.iter().skip(1) {
        if !pt.x().is_finite() || !pt.y().is_finite() {
            bail!("Ring has a non-finite point {}", pt);
        }
        if let Some(pt) = pt.to_hashable() {
            seen_pts.insert(pt);
        }
    }
    if seen_pts.len() < 3 {
        bail!("Ring has only {} distinct points", seen_pts.len());
    }
    Ok(())
}

impl From<&Ring> for geo::LineString<f64> {
    fn from(ring: &Ring) -> Self {
        let pts: Vec<geo::Coordinate<f64>> = ring.pts.iter().map(|pt| (*pt).into()).collect();
        geo::LineString(pts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<LonLat> {
        vec![
            LonLat::new(0.0, 0.0),
            LonLat::new(1.0, 0.0),
            LonLat::new(1.0, 1.0),
            LonLat::new(0.0, 1.0),
            LonLat::new(0.0, 0.0),
        ]
    }

    #[test]
    fn valid_square() {
        let ring = Ring::new(square()).unwrap();
        assert_eq!(ring.points().len(), 5);
        let b = ring.get_bounds();
        assert_eq!((b.min_lon, b.max_lat), (0.0, 1.0));
    }

    #[test]
    fn rejects_degenerate() {
        let mut open = square();
        open.pop();
        assert!(Ring::new(open).is_err());

        let line = vec![
            LonLat::new(0.0, 0.0),
            LonLat::new(1.0, 0.0),
            LonLat::new(1.0, 0.0),
            LonLat::new(0.0, 0.0),
        ];
        assert!(Ring::new(line).is_err());

        assert!(Ring::new(square()[0..3].to_vec()).is_err());

        let mut infinite = square();
        infinite[2] = LonLat::new(f64::INFINITY, 1.0);
        assert!(Ring::new(infinite).is_err());
    }

    #[test]
    fn unchecked_keeps_slivers() {
        let sliver = vec![
            vec![5.0, 5.0],
            vec![6.0, 6.0],
            vec![5.0, 5.0],
            vec![5.0, 5.0],
        ];
        assert!(Ring::from_geojson(&sliver).is_err());
        let ring = Ring::from_geojson_unchecked(&sliver).unwrap();
        assert!(ring.is_degenerate());
        assert_eq!(ring.to_geojson(), sliver);

        assert!(!Ring::new(square()).unwrap().is_degenerate());
        assert!(Ring::unchecked_new(Vec::new()).is_err());
        assert!(Ring::from_geojson_unchecked(&[vec![0.0]]).is_err());
    }
}
