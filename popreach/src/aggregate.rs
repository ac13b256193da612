use std::collections::BTreeSet;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::MeshIndex;

/// Collects the cells reachable from any origin. Workers call `accumulate` concurrently as each
/// origin finishes.
#[derive(Default)]
pub struct Aggregator {
    reached: Mutex<BTreeSet<String>>,
}

impl Aggregator {
    pub fn new() -> Aggregator {
        Aggregator::default()
    }

    pub fn accumulate(&self, codes: &BTreeSet<String>) {
        let mut reached = self.reached.lock().unwrap_or_else(|err| err.into_inner());
        reached.extend(codes.iter().cloned());
    }

    pub fn num_reached(&self) -> usize {
        self.reached.lock().unwrap_or_else(|err| err.into_inner()).len()
    }

    /// Only call after every origin is done. Codes not in the mesh are silently ignored.
    pub fn finalize(self, mesh: &MeshIndex) -> ReachablePopulation {
        let reached = self.reached.into_inner().unwrap_or_else(|err| err.into_inner());
        let mut result = ReachablePopulation { mesh: Vec::new() };
        for code in reached {
            if let Some(cell) = mesh.get(&code) {
                result.mesh.push(ReachableMesh {
                    mesh_code: cell.code.clone(),
                    population: cell.population,
                    geometry: geojson::Geometry::new(geojson::Value::Polygon(vec![cell
                        .polygon
                        .outer()
                        .to_geojson()])),
                });
            }
        }
        result
    }
}

/// Every cell reachable from at least one origin, sorted by code.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReachablePopulation {
    pub mesh: Vec<ReachableMesh>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReachableMesh {
    pub mesh_code: String,
    pub population: u64,
    /// Just the exterior of the cell
    pub geometry: geojson::Geometry,
}

impl ReachablePopulation {
    pub fn total_population(&self) -> u64 {
        self.mesh.iter().map(|m| m.population).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abstutil::Timer;
    use geom::{LonLat, Polygon};

    use crate::MeshCell;

    fn mesh() -> MeshIndex {
        let cells = (0..4)
            .map(|i| MeshCell {
                code: format!("M{}", i + 1),
                polygon: Polygon::rectangle(
                    LonLat::new(i as f64, 0.0),
                    LonLat::new((i + 1) as f64, 1.0),
                )
                .unwrap(),
                population: 10 * (i + 1),
            })
            .collect();
        MeshIndex::new(cells, &mut Timer::throwaway())
    }

    fn codes(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|x| x.to_string()).collect()
    }

    fn finalize(sets: &[BTreeSet<String>]) -> ReachablePopulation {
        let agg = Aggregator::new();
        for set in sets {
            agg.accumulate(set);
        }
        agg.finalize(&mesh())
    }

    #[test]
    fn union_of_origins() {
        let a = codes(&["M1", "M2"]);
        let b = codes(&["M2", "M3"]);
        let both = finalize(&[a.clone(), b.clone()]);
        assert_eq!(
            both.mesh.iter().map(|m| m.mesh_code.as_str()).collect::<Vec<_>>(),
            vec!["M1", "M2", "M3"]
        );
        // Shared cells count once
        assert_eq!(both.total_population(), 60);

        let union: BTreeSet<String> = a.union(&b).cloned().collect();
        assert_eq!(both, finalize(&[union]));
        assert_eq!(both, finalize(&[b, a]));
    }

    #[test]
    fn concurrent_accumulation() {
        let agg = Aggregator::new();
        let sets: Vec<BTreeSet<String>> = (1..=4)
            .map(|i| codes(&[format!("M{}", i).as_str(), "M1"]))
            .collect();
        std::thread::scope(|s| {
            for set in &sets {
                let agg = &agg;
                s.spawn(move || agg.accumulate(set));
            }
        });
        assert_eq!(agg.num_reached(), 4);
        assert_eq!(agg.finalize(&mesh()).total_population(), 100);
    }

    #[test]
    fn output_shape() {
        let result = finalize(&[codes(&["M1", "unknown"])]);
        assert_eq!(result.mesh.len(), 1);
        let json: serde_json::Value = serde_json::from_str(&abstutil::to_json(&result).unwrap()).unwrap();
        let record = &json["mesh"][0];
        assert_eq!(record["mesh_code"], "M1");
        assert_eq!(record["population"], 10);
        assert_eq!(record["geometry"]["type"], "Polygon");
        assert_eq!(
            record["geometry"]["coordinates"][0].as_array().unwrap().len(),
            5
        );
    }
}
