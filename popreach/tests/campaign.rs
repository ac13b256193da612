use std::collections::{BTreeMap, BTreeSet};

use anyhow::{bail, Result};

use abstutil::{Parallelism, Timer};
use geom::{Geometry, LonLat, Polygon};
use popreach::{
    read_snapshot, read_snapshot_json, ArtifactWriter, Campaign, IsochroneSource, MeshCell,
    MeshIndex, Origin, ReachablePopulation, ResolveStrategy, Thresholds,
};

/// Serves canned isochrones instead of asking a router.
struct FakeRouter {
    /// Origin ID to the east edge of a strip covering the mesh row, per threshold
    reach: BTreeMap<String, Vec<f64>>,
}

impl IsochroneSource for FakeRouter {
    fn fetch(&self, origin: &Origin, thresholds: &Thresholds) -> Result<BTreeMap<u32, Geometry>> {
        let edges = match self.reach.get(&origin.id) {
            Some(edges) => edges,
            None => bail!("connection refused"),
        };
        Ok(thresholds
            .seconds()
            .iter()
            .zip(edges)
            .map(|(secs, east)| {
                let shape = if *east <= 0.0 {
                    Geometry::MultiPolygon(Vec::new())
                } else {
                    Geometry::MultiPolygon(vec![Polygon::rectangle(
                        LonLat::new(0.2, 0.2),
                        LonLat::new(*east, 0.8),
                    )
                    .unwrap()])
                };
                (*secs, shape)
            })
            .collect())
    }
}

/// Panics for one origin and otherwise serves like a `FakeRouter`.
struct PanickyRouter {
    panics_for: String,
    inner: FakeRouter,
}

impl IsochroneSource for PanickyRouter {
    fn fetch(&self, origin: &Origin, thresholds: &Thresholds) -> Result<BTreeMap<u32, Geometry>> {
        if origin.id == self.panics_for {
            panic!("router returned garbage for {}", origin.id);
        }
        self.inner.fetch(origin, thresholds)
    }
}

/// M1..M4 in a row, each 1 unit wide, with populations 10, 20, 30, 40.
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

fn origin(id: &str) -> Origin {
    Origin {
        id: id.to_string(),
        pos: LonLat::new(0.5, 0.5),
        category: "spots".to_string(),
    }
}

fn codes(result: &ReachablePopulation) -> Vec<&str> {
    result.mesh.iter().map(|m| m.mesh_code.as_str()).collect()
}

#[test]
fn single_origin_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().display().to_string();
    let mesh = mesh();
    let router = FakeRouter {
        reach: vec![("O1".to_string(), vec![0.8, 2.8])].into_iter().collect(),
    };
    let thresholds = Thresholds::ladder(10, 20, 10).unwrap();
    let writer = ArtifactWriter::new(format!("{}/bin", root), format!("{}/json", root));
    let campaign = Campaign {
        mesh: &mesh,
        source: &router,
        thresholds: &thresholds,
        writer: &writer,
        strategy: ResolveStrategy::TrustNesting,
        parallelism: Parallelism::Fixed(2),
    };

    let (result, report) = campaign.run(vec![origin("O1")], &mut Timer::throwaway());
    assert_eq!(codes(&result), vec!["M1", "M2", "M3"]);
    assert_eq!(
        result.mesh.iter().map(|m| m.population).collect::<Vec<_>>(),
        vec![10, 20, 30]
    );
    assert_eq!(report.origins_succeeded, 1);
    assert_eq!(report.snapshots_written, 2);
    assert_eq!(report.reachable_population, 60);

    let ten = read_snapshot(&writer.bin_path("O1_10")).unwrap();
    assert_eq!(
        ten.reachable_mesh,
        vec!["M1".to_string()].into_iter().collect::<BTreeSet<_>>()
    );
    let twenty = read_snapshot_json(&writer.json_path("O1_20")).unwrap();
    assert_eq!(twenty.reachable_mesh.len(), 3);

    let output = format!("{}/reachable.json", root);
    ArtifactWriter::write_final(&output, &result).unwrap();
    let reloaded: ReachablePopulation = abstutil::read_json(&output).unwrap();
    assert_eq!(reloaded, result);
    // The merged dataset can be read back as a mesh
    let remeshed = MeshIndex::load(&output, &mut Timer::throwaway()).unwrap();
    assert_eq!(remeshed.total_population(), 60);
}

#[test]
fn failures_dont_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().display().to_string();
    let mesh = mesh();
    // A reaches M1 then M1-M2; B never changes shape; C can't be reached at all
    let router = FakeRouter {
        reach: vec![
            ("A".to_string(), vec![0.8, 0.8, 1.5]),
            ("B".to_string(), vec![3.5, 3.5, 3.5]),
            ("D".to_string(), vec![0.0, 0.0, 0.0]),
        ]
        .into_iter()
        .collect(),
    };
    let thresholds = Thresholds::ladder(10, 30, 10).unwrap();
    let writer = ArtifactWriter::new(root.clone(), root.clone());
    let campaign = Campaign {
        mesh: &mesh,
        source: &router,
        thresholds: &thresholds,
        writer: &writer,
        strategy: ResolveStrategy::TrustNesting,
        parallelism: Parallelism::Fixed(3),
    };

    let mut timer = Timer::throwaway();
    let (result, report) = campaign.run(
        vec![origin("A"), origin("B"), origin("C"), origin("D")],
        &mut timer,
    );
    assert_eq!(codes(&result), vec!["M1", "M2", "M3", "M4"]);
    assert_eq!(report.origins_succeeded, 3);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures["C"].contains("connection refused"));
    // A has 2 distinct shapes, B and D have 1 each
    assert_eq!(report.snapshots_written, 4);
    assert!(abstutil::file_exists(writer.bin_path("A_30")));
    assert!(!abstutil::file_exists(writer.bin_path("A_20")));
    assert!(abstutil::file_exists(writer.bin_path("B_10")));
    assert!(!abstutil::file_exists(writer.bin_path("C_10")));
    assert_eq!(
        read_snapshot(&writer.bin_path("D_10")).unwrap().reachable_mesh,
        BTreeSet::new()
    );
}

#[test]
fn order_of_origins_doesnt_matter() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().display().to_string();
    let mesh = mesh();
    let router = FakeRouter {
        reach: vec![
            ("A".to_string(), vec![0.8, 1.5]),
            ("B".to_string(), vec![2.5, 2.9]),
        ]
        .into_iter()
        .collect(),
    };
    let thresholds = Thresholds::ladder(10, 20, 10).unwrap();
    let writer = ArtifactWriter::new(root.clone(), root.clone());
    let run = |origins: Vec<Origin>, strategy| {
        Campaign {
            mesh: &mesh,
            source: &router,
            thresholds: &thresholds,
            writer: &writer,
            strategy,
            parallelism: Parallelism::Fixed(1),
        }
        .run(origins, &mut Timer::throwaway())
        .0
    };

    let forwards = run(vec![origin("A"), origin("B")], ResolveStrategy::TrustNesting);
    let backwards = run(vec![origin("B"), origin("A")], ResolveStrategy::Verify);
    assert_eq!(forwards, backwards);
    assert_eq!(codes(&forwards), vec!["M1", "M2", "M3"]);
}

#[test]
fn a_panicking_origin_is_just_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().display().to_string();
    let mesh = mesh();
    let router = PanickyRouter {
        panics_for: "A".to_string(),
        inner: FakeRouter {
            reach: vec![
                ("A".to_string(), vec![3.5, 3.5]),
                ("B".to_string(), vec![0.8, 1.5]),
                ("C".to_string(), vec![0.0, 2.5]),
            ]
            .into_iter()
            .collect(),
        },
    };
    let thresholds = Thresholds::ladder(10, 20, 10).unwrap();
    let writer = ArtifactWriter::new(root.clone(), root.clone());
    let campaign = Campaign {
        mesh: &mesh,
        source: &router,
        thresholds: &thresholds,
        writer: &writer,
        strategy: ResolveStrategy::TrustNesting,
        parallelism: Parallelism::Fixed(2),
    };

    let (result, report) = campaign.run(
        vec![origin("A"), origin("B"), origin("C")],
        &mut Timer::throwaway(),
    );
    assert_eq!(codes(&result), vec!["M1", "M2", "M3"]);
    assert_eq!(report.origins_succeeded, 2);
    assert_eq!(report.failures.keys().collect::<Vec<_>>(), vec!["A"]);
    assert!(report.failures["A"].contains("router returned garbage for A"));
    assert_eq!(report.snapshots_written, 4);
    assert!(abstutil::file_exists(writer.bin_path("B_20")));
    assert!(abstutil::file_exists(writer.bin_path("C_20")));
    assert!(!abstutil::file_exists(writer.bin_path("A_10")));
}
