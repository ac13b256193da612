use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use geom::Geometry;

use crate::thresholds::to_minutes;
use crate::Thresholds;

/// The area reachable from one origin within one threshold, and eventually the mesh cells it
/// touches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IsochroneSnapshot {
    pub origin_id: String,
    pub threshold_seconds: u32,
    pub geometry: Geometry,
    /// Filled in exactly once, by resolution
    reachable_mesh_codes: Option<BTreeSet<String>>,
}

impl IsochroneSnapshot {
    pub fn new(origin_id: String, threshold_seconds: u32, geometry: Geometry) -> IsochroneSnapshot {
        IsochroneSnapshot {
            origin_id,
            threshold_seconds,
            geometry,
            reachable_mesh_codes: None,
        }
    }

    pub fn time_minutes(&self) -> u32 {
        to_minutes(self.threshold_seconds)
    }

    /// Used to name artifacts
    pub fn name(&self) -> String {
        format!("{}_{}", self.origin_id, self.time_minutes())
    }

    pub fn reachable_mesh_codes(&self) -> Option<&BTreeSet<String>> {
        self.reachable_mesh_codes.as_ref()
    }

    pub(crate) fn set_reachable_mesh_codes(&mut self, codes: BTreeSet<String>) -> Result<()> {
        if self.reachable_mesh_codes.is_some() {
            bail!("{} was already resolved", self.name());
        }
        self.reachable_mesh_codes = Some(codes);
        Ok(())
    }
}

/// Walks the thresholds in increasing order and keeps a shape only when it differs from the one
/// kept just before it. Equality is exact, so a reordered but equivalent shape is kept. The
/// smallest threshold is always kept, so the result is never empty.
pub fn reduce(
    thresholds: &Thresholds,
    mut geometry_by_threshold: BTreeMap<u32, Geometry>,
) -> Result<Vec<(u32, Geometry)>> {
    let mut kept: Vec<(u32, Geometry)> = Vec::new();
    for secs in thresholds.seconds() {
        let geometry = geometry_by_threshold
            .remove(secs)
            .ok_or_else(|| anyhow!("no geometry for the {}s threshold", secs))?;
        if kept.last().map(|(_, prev)| prev == &geometry).unwrap_or(false) {
            continue;
        }
        kept.push((*secs, geometry));
    }
    Ok(kept)
}

/// Reduces the shapes for one origin into unresolved snapshots, smallest threshold first.
pub fn reduce_to_snapshots(
    origin_id: &str,
    thresholds: &Thresholds,
    geometry_by_threshold: BTreeMap<u32, Geometry>,
) -> Result<Vec<IsochroneSnapshot>> {
    Ok(reduce(thresholds, geometry_by_threshold)?
        .into_iter()
        .map(|(secs, geometry)| IsochroneSnapshot::new(origin_id.to_string(), secs, geometry))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geom::{LonLat, Polygon};

    fn square(size: f64) -> Geometry {
        Geometry::MultiPolygon(vec![Polygon::rectangle(
            LonLat::new(0.0, 0.0),
            LonLat::new(size, size),
        )
        .unwrap()])
    }

    fn input(shapes: Vec<Geometry>) -> (Thresholds, BTreeMap<u32, Geometry>) {
        let thresholds = Thresholds::new((1..=shapes.len() as u32).map(|m| m * 60).collect()).unwrap();
        let map = thresholds.seconds().iter().cloned().zip(shapes).collect();
        (thresholds, map)
    }

    #[test]
    fn drops_adjacent_repeats() {
        let (thresholds, map) = input(vec![
            square(1.0),
            square(1.0),
            square(2.0),
            square(2.0),
            square(2.0),
            square(1.0),
        ]);
        let kept = reduce(&thresholds, map).unwrap();
        let secs: Vec<u32> = kept.iter().map(|(s, _)| *s).collect();
        // Only adjacent repeats collapse; returning to an older shape is kept
        assert_eq!(secs, vec![60, 180, 360]);
        for pair in kept.windows(2) {
            assert_ne!(pair[0].1, pair[1].1);
        }
    }

    #[test]
    fn slivers_are_a_change() {
        let square = "[[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]]";
        let sliver = "[[[5, 5], [6, 6], [5, 5], [5, 5]]]";
        let feature = |time: u32, polygons: &[&str]| {
            format!(
                r#"{{"type": "Feature", "properties": {{"time": {}}},
                    "geometry": {{"type": "MultiPolygon", "coordinates": [{}]}}}}"#,
                time,
                polygons.join(",")
            )
        };
        let body = format!(
            r#"{{"type": "FeatureCollection", "features": [{}, {}]}}"#,
            feature(600, &[square]),
            feature(660, &[square, sliver])
        );
        let thresholds = Thresholds::new(vec![600, 660]).unwrap();
        let shapes = crate::parse_isochrone_response(&body, &thresholds).unwrap();

        let kept = reduce(&thresholds, shapes).unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].1.polygons().len(), 2);
        assert_eq!(kept[1].1.num_degenerate_rings(), 1);
    }

    #[test]
    fn idempotent() {
        let (thresholds, map) = input(vec![
            Geometry::MultiPolygon(Vec::new()),
            Geometry::MultiPolygon(Vec::new()),
            square(1.0),
            square(3.0),
            square(3.0),
        ]);
        let once = reduce(&thresholds, map).unwrap();
        let again_thresholds =
            Thresholds::new(once.iter().map(|(secs, _)| *secs).collect()).unwrap();
        let twice = reduce(&again_thresholds, once.clone().into_iter().collect()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn all_identical() {
        let (thresholds, map) = input(vec![square(1.0), square(1.0), square(1.0)]);
        let snapshots = reduce_to_snapshots("castle", &thresholds, map).unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].name(), "castle_1");
        assert!(snapshots[0].reachable_mesh_codes().is_none());
    }

    #[test]
    fn missing_threshold() {
        let (thresholds, mut map) = input(vec![square(1.0), square(2.0)]);
        map.remove(&120);
        assert!(reduce(&thresholds, map).is_err());
    }

    #[test]
    fn resolved_once() {
        let mut snapshot = IsochroneSnapshot::new("x".to_string(), 600, square(1.0));
        snapshot.set_reachable_mesh_codes(BTreeSet::new()).unwrap();
        assert!(snapshot.set_reachable_mesh_codes(BTreeSet::new()).is_err());
    }
}
