use std::fmt;

use anyhow::{bail, Result};
use ordered_float::NotNan;
use serde::{Deserialize, Serialize};

/// longitude is x, latitude is y. Always WGS84.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct LonLat {
    longitude: f64,
    latitude: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64) -> LonLat {
        LonLat {
            longitude: lon,
            latitude: lat,
        }
    }

    pub fn x(&self) -> f64 {
        self.longitude
    }

    pub fn y(&self) -> f64 {
        self.latitude
    }

    /// Parses a GeoJSON position, `[lon, lat]` with an optional, ignored altitude.
    pub fn from_geojson(pos: &[f64]) -> Result<LonLat> {
        if pos.len() < 2 {
            bail!("position {:?} needs at least 2 numbers", pos);
        }
        if !pos[0].is_finite() || !pos[1].is_finite() {
            bail!("position {:?} isn't finite", pos);
        }
        Ok(LonLat::new(pos[0], pos[1]))
    }

    pub fn to_geojson(&self) -> Vec<f64> {
        vec![self.longitude, self.latitude]
    }

    /// None if either coordinate is NaN.
    pub fn to_hashable(&self) -> Option<HashableLonLat> {
        Some(HashableLonLat {
            x_nan: NotNan::new(self.longitude).ok()?,
            y_nan: NotNan::new(self.latitude).ok()?,
        })
    }
}

impl fmt::Display for LonLat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LonLat({0}, {1})", self.longitude, self.latitude)
    }
}

impl From<LonLat> for geo::Coordinate<f64> {
    fn from(pt: LonLat) -> Self {
        geo::Coordinate {
            x: pt.longitude,
            y: pt.latitude,
        }
    }
}

impl From<LonLat> for geo::Point<f64> {
    fn from(pt: LonLat) -> Self {
        geo::Point::new(pt.longitude, pt.latitude)
    }
}

/// A LonLat that can be hashed and sorted.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct HashableLonLat {
    x_nan: NotNan<f64>,
    y_nan: NotNan<f64>,
}
