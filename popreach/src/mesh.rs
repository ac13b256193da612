use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use geojson::GeoJson;
use serde::Deserialize;
use serde_json::Value;

use abstutil::{prettyprint_usize, Timer};
use geom::{FindIntersecting, Geometry, Polygon};

/// One cell of the population grid.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshCell {
    pub code: String,
    pub polygon: Polygon,
    pub population: u64,
}

/// All cells of the population grid for one run, indexed for intersection queries. Read-only
/// after loading, so it can be shared freely between threads.
pub struct MeshIndex {
    cells: BTreeMap<String, MeshCell>,
    index: FindIntersecting<String>,
}

impl MeshIndex {
    /// Loads cells from a GeoJSON FeatureCollection (properties `meshCode` and `population`) or
    /// from a previously written `{"mesh": [...]}` dataset. Broken records are skipped with a
    /// warning; a missing or structurally invalid file is an error.
    pub fn load(path: &str, timer: &mut Timer) -> Result<MeshIndex> {
        timer.start(format!("load mesh from {}", path));
        let result = abstutil::slurp_file(path)
            .and_then(|bytes| MeshIndex::from_bytes(&bytes, timer))
            .with_context(|| format!("loading mesh from {}", path));
        timer.stop(format!("load mesh from {}", path));
        result
    }

    pub fn from_bytes(bytes: &[u8], timer: &mut Timer) -> Result<MeshIndex> {
        let value: Value = serde_json::from_slice(bytes).context("mesh source isn't JSON")?;
        let cells = if value.get("mesh").is_some() {
            parse_mesh_dataset(value, timer)?
        } else {
            parse_feature_collection(value, timer)?
        };
        Ok(MeshIndex::new(cells, timer))
    }

    /// Later cells with an already-seen code are skipped.
    pub fn new(list: Vec<MeshCell>, timer: &mut Timer) -> MeshIndex {
        let mut cells = BTreeMap::new();
        for cell in list {
            if cells.contains_key(&cell.code) {
                timer.warn(format!("Skipping mesh cell with duplicate code {}", cell.code));
                continue;
            }
            cells.insert(cell.code.clone(), cell);
        }
        let index = FindIntersecting::new(
            cells
                .values()
                .map(|cell: &MeshCell| (cell.code.clone(), &cell.polygon)),
        );
        info!(
            "Indexed {} mesh cells with a total population of {}",
            prettyprint_usize(cells.len()),
            prettyprint_usize(cells.values().map(|c| c.population as usize).sum())
        );
        MeshIndex { cells, index }
    }

    /// Every cell whose polygon shares a boundary or interior point with the shape.
    pub fn query(&self, shape: &Geometry) -> BTreeSet<String> {
        self.index.query(shape)
    }

    /// Equivalent to `query(shape) ∩ candidates`, but only tests the candidates.
    pub fn query_subset(&self, shape: &Geometry, candidates: &BTreeSet<String>) -> BTreeSet<String> {
        self.index.query_subset(shape, candidates)
    }

    /// Tests every cell, without the spatial index.
    pub fn query_brute_force(&self, shape: &Geometry) -> BTreeSet<String> {
        self.index.query_brute_force(shape)
    }

    pub fn get(&self, code: &str) -> Option<&MeshCell> {
        self.cells.get(code)
    }

    /// Sorted by code
    pub fn cells(&self) -> impl Iterator<Item = &MeshCell> {
        self.cells.values()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn total_population(&self) -> u64 {
        self.cells.values().map(|c| c.population).sum()
    }
}

fn parse_feature_collection(value: Value, timer: &mut Timer) -> Result<Vec<MeshCell>> {
    let geojson = GeoJson::from_json_value(value).context("mesh source isn't GeoJSON")?;
    let collection = match geojson {
        GeoJson::FeatureCollection(collection) => collection,
        _ => bail!("mesh source must be a FeatureCollection"),
    };

    let mut cells = Vec::new();
    for (idx, feature) in collection.features.iter().enumerate() {
        match parse_feature(feature) {
            Ok(cell) => cells.push(cell),
            Err(err) => timer.warn(format!("Skipping mesh feature {}: {:#}", idx, err)),
        }
    }
    Ok(cells)
}

fn parse_feature(feature: &geojson::Feature) -> Result<MeshCell> {
    let property = |key: &str| {
        feature
            .properties
            .as_ref()
            .and_then(|props| props.get(key))
            .ok_or_else(|| anyhow!("missing {}", key))
    };
    let code = parse_code(property("meshCode")?)?;
    let population = parse_population(property("population")?)
        .with_context(|| format!("cell {}", code))?;
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| anyhow!("cell {} has no geometry", code))?;
    let polygon = cell_polygon(geometry).with_context(|| format!("cell {}", code))?;
    Ok(MeshCell {
        code,
        polygon,
        population,
    })
}

/// One record of a previously written dataset. Fields are checked one by one so a single broken
/// record doesn't sink the whole file.
#[derive(Deserialize)]
struct DatasetRecord {
    mesh_code: Value,
    population: Value,
    geometry: geojson::Geometry,
}

fn parse_mesh_dataset(mut value: Value, timer: &mut Timer) -> Result<Vec<MeshCell>> {
    let records = match value.get_mut("mesh").map(Value::take) {
        Some(Value::Array(records)) => records,
        _ => bail!("\"mesh\" must be a list"),
    };

    let mut cells = Vec::new();
    for (idx, record) in records.into_iter().enumerate() {
        let parsed = serde_json::from_value::<DatasetRecord>(record)
            .map_err(anyhow::Error::from)
            .and_then(|rec| {
                let code = parse_code(&rec.mesh_code)?;
                Ok(MeshCell {
                    population: parse_population(&rec.population)
                        .with_context(|| format!("cell {}", code))?,
                    polygon: cell_polygon(&rec.geometry).with_context(|| format!("cell {}", code))?,
                    code,
                })
            });
        match parsed {
            Ok(cell) => cells.push(cell),
            Err(err) => timer.warn(format!("Skipping mesh record {}: {:#}", idx, err)),
        }
    }
    Ok(cells)
}

fn parse_code(value: &Value) -> Result<String> {
    match value {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        x => bail!("bad mesh code {}", x),
    }
}

/// Whole numbers, or strings holding them. Numbers written like `12.0` count as whole.
fn parse_population(value: &Value) -> Result<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|x| *x >= 0.0 && x.fract() == 0.0 && *x <= u64::MAX as f64)
                    .map(|x| x as u64)
            })
            .ok_or_else(|| anyhow!("population {} isn't a non-negative integer", n)),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .with_context(|| format!("population {:?} isn't a non-negative integer", s)),
        x => bail!("bad population {}", x),
    }
}

/// Cells are simple polygons. A multipolygon is accepted if it holds exactly one.
fn cell_polygon(geometry: &geojson::Geometry) -> Result<Polygon> {
    match Geometry::from_geojson(geometry)? {
        Geometry::Polygon(p) => Ok(p),
        Geometry::MultiPolygon(mut list) if list.len() == 1 => Ok(list.remove(0)),
        Geometry::MultiPolygon(list) => {
            bail!("multipolygon has {} members, not 1", list.len())
        }
        x => bail!("cell geometry is a {}, not a polygon", x.type_name()),
    }
}
