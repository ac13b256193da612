use anyhow::{bail, Context, Result};
use geo::{Contains, Intersects};
use serde::{Deserialize, Serialize};

use crate::{GPSBounds, LonLat, Ring};

/// One outer ring and any number of holes, in WGS84.
#[derive(PartialEq, Serialize, Deserialize, Clone, Debug)]
pub struct Polygon {
    /// The first is the exterior; the rest are holes.
    rings: Vec<Ring>,
}

impl Polygon {
    pub fn new(outer: Ring) -> Polygon {
        Polygon { rings: vec![outer] }
    }

    pub fn with_holes(outer: Ring, mut inner: Vec<Ring>) -> Polygon {
        inner.insert(0, outer);
        Polygon { rings: inner }
    }

    pub fn from_rings(mut rings: Vec<Ring>) -> Result<Polygon> {
        if rings.is_empty() {
            bail!("Can't make a polygon with no rings");
        }
        let outer = rings.remove(0);
        Ok(Polygon::with_holes(outer, rings))
    }

    /// Parses the coordinates of a GeoJSON polygon. Every ring must be valid.
    pub fn from_geojson(raw: &[Vec<Vec<f64>>]) -> Result<Polygon> {
        let mut rings = Vec::new();
        for (idx, pts) in raw.iter().enumerate() {
            rings.push(Ring::from_geojson(pts).with_context(|| format!("ring {}", idx))?);
        }
        Polygon::from_rings(rings)
    }

    /// Parses the coordinates of a GeoJSON polygon, keeping degenerate rings as they are.
    pub fn from_geojson_unchecked(raw: &[Vec<Vec<f64>>]) -> Result<Polygon> {
        let mut rings = Vec::new();
        for (idx, pts) in raw.iter().enumerate() {
            rings.push(Ring::from_geojson_unchecked(pts).with_context(|| format!("ring {}", idx))?);
        }
        Polygon::from_rings(rings)
    }

    pub fn to_geojson(&self) -> Vec<Vec<Vec<f64>>> {
        self.rings.iter().map(|ring| ring.to_geojson()).collect()
    }

    pub fn outer(&self) -> &Ring {
        &self.rings[0]
    }

    pub fn holes(&self) -> &[Ring] {
        &self.rings[1..]
    }

    /// Only the exterior determines the bounds.
    pub fn get_bounds(&self) -> GPSBounds {
        self.outer().get_bounds()
    }

    /// Is the point inside the polygon, not in a hole, and not on the boundary? A polygon with a
    /// degenerate exterior contains nothing.
    pub fn contains_pt(&self, pt: LonLat) -> bool {
        match self.footprint() {
            Footprint::Area(p) => p.contains(&geo::Point::from(pt)),
            Footprint::Line(_) | Footprint::Point(_) => false,
        }
    }

    /// Do two polygons share any point, including just touching boundaries? The other polygon is
    /// treated as an area.
    pub fn intersects(&self, other: &Polygon) -> bool {
        self.footprint().intersects(&other.to_geo())
    }

    /// What this polygon covers for intersection tests. Degenerate holes are ignored. A
    /// degenerate exterior still touches whatever its points run through.
    pub(crate) fn footprint(&self) -> Footprint {
        let outer = self.outer();
        if !outer.is_degenerate() {
            let interiors = self
                .holes()
                .iter()
                .filter(|hole| !hole.is_degenerate())
                .map(geo::LineString::from)
                .collect();
            return Footprint::Area(geo::Polygon::new(outer.into(), interiors));
        }
        let pts = outer.points();
        if pts.iter().all(|pt| *pt == pts[0]) {
            Footprint::Point(pts[0].into())
        } else {
            Footprint::Line(outer.into())
        }
    }

    /// Assumes every ring is valid.
    pub fn to_geo(&self) -> geo::Polygon<f64> {
        let exterior = geo::LineString::from(self.outer());
        let interiors = self.holes().iter().map(geo::LineString::from).collect();
        geo::Polygon::new(exterior, interiors)
    }

    /// A rectangle from the southwest to the northeast corner. Handy for tests and grid cells.
    pub fn rectangle(sw: LonLat, ne: LonLat) -> Result<Polygon> {
        Ok(Polygon::new(Ring::new(vec![
            sw,
            LonLat::new(ne.x(), sw.y()),
            ne,
            LonLat::new(sw.x(), ne.y()),
            sw,
        ])?))
    }
}

pub(crate) enum Footprint {
    Area(geo::Polygon<f64>),
    Line(geo::LineString<f64>),
    Point(geo::Coordinate<f64>),
}

impl Footprint {
    pub(crate) fn intersects(&self, other: &geo::Polygon<f64>) -> bool {
        match self {
            Footprint::Area(p) => p.intersects(other),
            Footprint::Line(line) => line.intersects(other),
            Footprint::Point(pt) => other.intersects(pt),
        }
    }
}
