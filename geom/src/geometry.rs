use anyhow::{bail, Context, Result};
use geo::Intersects;
use serde::{Deserialize, Serialize};

use crate::{LonLat, Polygon};

/// The shapes that flow through the reachability pipeline. Equality is structural and exact:
/// the same area described with a different starting vertex is a different `Geometry`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Point(LonLat),
    Polygon(Polygon),
    /// Possibly empty
    MultiPolygon(Vec<Polygon>),
}

impl Geometry {
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    /// An empty multipolygon covers nothing.
    pub fn is_empty(&self) -> bool {
        matches!(self, Geometry::MultiPolygon(list) if list.is_empty())
    }

    pub fn polygons(&self) -> Vec<&Polygon> {
        match self {
            Geometry::Point(_) => Vec::new(),
            Geometry::Polygon(p) => vec![p],
            Geometry::MultiPolygon(list) => list.iter().collect(),
        }
    }

    /// Does this shape share any point with the polygon, boundaries included?
    pub fn intersects_polygon(&self, other: &Polygon) -> bool {
        match self {
            Geometry::Point(pt) => other.to_geo().intersects(&geo::Coordinate::from(*pt)),
            Geometry::Polygon(p) => p.intersects(other),
            Geometry::MultiPolygon(list) => {
                let other = other.to_geo();
                list.iter().any(|p| p.footprint().intersects(&other))
            }
        }
    }

    pub fn intersects(&self, other: &Geometry) -> bool {
        match (self, other) {
            (Geometry::Point(pt1), Geometry::Point(pt2)) => pt1 == pt2,
            (_, Geometry::Point(_)) => other.intersects(self),
            _ => other.polygons().into_iter().any(|p| self.intersects_polygon(p)),
        }
    }

    /// Is the point strictly inside some polygon of this shape?
    pub fn contains_pt(&self, pt: LonLat) -> bool {
        match self {
            Geometry::Point(_) => false,
            _ => self
                .polygons()
                .into_iter()
                .any(|p| p.contains_pt(pt)),
        }
    }

    /// Strictly validates the geometry; any broken ring fails the whole thing.
    pub fn from_geojson(geom: &geojson::Geometry) -> Result<Geometry> {
        match &geom.value {
            geojson::Value::Point(pos) => Ok(Geometry::Point(LonLat::from_geojson(pos)?)),
            geojson::Value::Polygon(raw) => Ok(Geometry::Polygon(Polygon::from_geojson(raw)?)),
            geojson::Value::MultiPolygon(raw) => {
                let mut list = Vec::new();
                for (idx, polygon) in raw.iter().enumerate() {
                    list.push(
                        Polygon::from_geojson(polygon)
                            .with_context(|| format!("polygon {} of multipolygon", idx))?,
                    );
                }
                Ok(Geometry::MultiPolygon(list))
            }
            x => bail!("unsupported geometry type {}", geojson_type_name(x)),
        }
    }

    /// Keeps every ring exactly as given, even ones collapsed to a line or a point, so shapes that
    /// differ only by such slivers stay distinct. Intersection tests treat degenerate rings
    /// specially; see `Polygon::intersects`.
    pub fn from_geojson_unchecked(geom: &geojson::Geometry) -> Result<Geometry> {
        match &geom.value {
            geojson::Value::Polygon(raw) => {
                Ok(Geometry::Polygon(Polygon::from_geojson_unchecked(raw)?))
            }
            geojson::Value::MultiPolygon(raw) => Geometry::multipolygon_from_geojson_unchecked(raw),
            _ => Geometry::from_geojson(geom),
        }
    }

    pub fn multipolygon_from_geojson_unchecked(raw: &[Vec<Vec<Vec<f64>>>]) -> Result<Geometry> {
        let mut list = Vec::new();
        for (idx, polygon) in raw.iter().enumerate() {
            list.push(
                Polygon::from_geojson_unchecked(polygon)
                    .with_context(|| format!("polygon {} of multipolygon", idx))?,
            );
        }
        Ok(Geometry::MultiPolygon(list))
    }

    /// How many rings, holes included, are collapsed or otherwise invalid.
    pub fn num_degenerate_rings(&self) -> usize {
        self.polygons()
            .into_iter()
            .map(|p| {
                std::iter::once(p.outer())
                    .chain(p.holes())
                    .filter(|ring| ring.is_degenerate())
                    .count()
            })
            .sum()
    }

    pub fn to_geojson(&self) -> geojson::Geometry {
        let value = match self {
            Geometry::Point(pt) => geojson::Value::Point(pt.to_geojson()),
            Geometry::Polygon(p) => geojson::Value::Polygon(p.to_geojson()),
            Geometry::MultiPolygon(list) => {
                geojson::Value::MultiPolygon(list.iter().map(|p| p.to_geojson()).collect())
            }
        };
        geojson::Geometry::new(value)
    }
}

pub fn geojson_type_name(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}
