//! Geometry in WGS84 for reachability analysis: points, rings, polygons with holes, a small closed
//! `Geometry` type, and a spatial index answering intersection queries.

mod bounds;
mod find_intersecting;
mod geometry;
mod gps;
mod polygon;
mod ring;

pub use crate::bounds::GPSBounds;
pub use crate::find_intersecting::FindIntersecting;
pub use crate::geometry::{geojson_type_name, Geometry};
pub use crate::gps::{HashableLonLat, LonLat};
pub use crate::polygon::Polygon;
pub use crate::ring::Ring;
