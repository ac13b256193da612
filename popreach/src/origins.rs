use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use geom::LonLat;

/// A place to search from, like a tourist spot or a bus stop.
#[derive(Clone, Debug, PartialEq)]
pub struct Origin {
    pub id: String,
    pub pos: LonLat,
    /// The group the origin was listed under in its file
    pub category: String,
}

#[derive(Deserialize)]
struct RawOrigin {
    id: Value,
    lat: f64,
    lon: f64,
}

/// Reads origin files shaped like `{"category": [{"id", "lat", "lon"}, ...]}` and merges them, in
/// the order given. Any malformed file or record is an error, and so is an id repeated anywhere
/// in the merged list.
pub fn load_origins(paths: &[String]) -> Result<Vec<Origin>> {
    let mut origins = Vec::new();
    for path in paths {
        let bytes = abstutil::slurp_file(path)?;
        origins.extend(parse_origins(&bytes).with_context(|| format!("reading origins {}", path))?);
    }

    let mut seen = BTreeSet::new();
    for origin in &origins {
        if !seen.insert(&origin.id) {
            bail!("origin id {} appears more than once", origin.id);
        }
    }
    info!("Loaded {} origins from {} files", origins.len(), paths.len());
    Ok(origins)
}

pub fn parse_origins(bytes: &[u8]) -> Result<Vec<Origin>> {
    let groups: BTreeMap<String, Vec<RawOrigin>> = serde_json::from_slice(bytes)?;
    let mut origins = Vec::new();
    for (category, list) in groups {
        for (idx, raw) in list.into_iter().enumerate() {
            let id = match raw.id {
                Value::String(s) if !s.is_empty() => s,
                Value::Number(n) => n.to_string(),
                x => bail!("{} #{} has a bad id {}", category, idx, x),
            };
            if !raw.lat.is_finite()
                || !raw.lon.is_finite()
                || raw.lat.abs() > 90.0
                || raw.lon.abs() > 180.0
            {
                bail!("origin {} has bad coordinates {}, {}", id, raw.lat, raw.lon);
            }
            origins.push(Origin {
                id,
                pos: LonLat::new(raw.lon, raw.lat),
                category: category.clone(),
            });
        }
    }
    Ok(origins)
}
