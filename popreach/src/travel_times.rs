//! Door-to-door transit trips between every pair of two sets of places, planned through the same
//! OpenTripPlanner router used for isochrones.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use abstutil::{prettyprint_usize, Parallelism, Timer};

use crate::{Origin, OtpClient};

/// Identifies one trip. Equality is field-by-field, so it's safe to use as a map key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub from: String,
    pub to: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TravelTime {
    pub from: String,
    pub to: String,
    pub duration_m: u32,
    pub walk_distance_m: u32,
    /// Every leg merged into one encoded polyline
    pub geometry: String,
    pub sections: Vec<Section>,
}

/// One leg of a trip
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub mode: String,
    pub from: Place,
    pub to: Place,
    pub duration_m: u32,
    pub distance_m: u32,
    pub geometry: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

pub trait ItineraryPlanner: Send + Sync {
    /// None when the router finds no trip.
    fn plan(&self, from: &Origin, to: &Origin) -> Result<Option<TravelTime>>;
}

impl ItineraryPlanner for OtpClient {
    fn plan(&self, from: &Origin, to: &Origin) -> Result<Option<TravelTime>> {
        let query = vec![
            ("fromPlace", format!("{},{}", from.pos.y(), from.pos.x())),
            ("toPlace", format!("{},{}", to.pos.y(), to.pos.x())),
            ("mode", self.opts.modes.clone()),
            ("date", self.opts.date.clone()),
            ("time", self.opts.time.clone()),
            (
                "maxWalkDistance",
                self.opts.max_walk_distance_meters.to_string(),
            ),
            ("numItineraries", "1".to_string()),
        ];
        let resp = self
            .client
            .get(&self.endpoint("plan"))
            .query(&query)
            .send()?;
        if !resp.status().is_success() {
            bail!("plan request failed with status {}", resp.status());
        }
        parse_plan_response(&resp.text()?, &from.id, &to.id)
    }
}

#[derive(Deserialize)]
struct PlanResponse {
    plan: Option<Plan>,
}

#[derive(Deserialize)]
struct Plan {
    itineraries: Vec<Itinerary>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Itinerary {
    duration: f64,
    walk_distance: f64,
    legs: Vec<Leg>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Leg {
    mode: String,
    from: RawPlace,
    to: RawPlace,
    duration: f64,
    distance: f64,
    leg_geometry: LegGeometry,
}

#[derive(Deserialize)]
struct RawPlace {
    #[serde(default)]
    name: String,
    lat: f64,
    lon: f64,
}

#[derive(Deserialize)]
struct LegGeometry {
    points: String,
}

impl From<RawPlace> for Place {
    fn from(raw: RawPlace) -> Place {
        Place {
            name: raw.name,
            lat: raw.lat,
            lon: raw.lon,
        }
    }
}

/// Durations are rounded down to whole minutes and distances to whole meters. Only the first
/// itinerary is used.
pub fn parse_plan_response(body: &str, from: &str, to: &str) -> Result<Option<TravelTime>> {
    let resp: PlanResponse = serde_json::from_str(body).context("bad plan response")?;
    let itinerary = match resp.plan.and_then(|plan| plan.itineraries.into_iter().next()) {
        Some(itinerary) => itinerary,
        None => return Ok(None),
    };

    let mut sections = Vec::new();
    for leg in itinerary.legs {
        sections.push(Section {
            mode: leg.mode,
            from: leg.from.into(),
            to: leg.to.into(),
            duration_m: (leg.duration / 60.0) as u32,
            distance_m: leg.distance as u32,
            geometry: leg.leg_geometry.points,
        });
    }
    let geometry = merge_polylines(sections.iter().map(|s| s.geometry.as_str()))?;
    Ok(Some(TravelTime {
        from: from.to_string(),
        to: to.to_string(),
        duration_m: (itinerary.duration / 60.0) as u32,
        walk_distance_m: itinerary.walk_distance as u32,
        geometry,
        sections,
    }))
}

/// Concatenates the points of several encoded polylines into one.
pub fn merge_polylines<'a, I: IntoIterator<Item = &'a str>>(encoded: I) -> Result<String> {
    let mut coords = Vec::new();
    for line in encoded {
        let decoded = polyline::decode_polyline(line, 5).map_err(|msg| anyhow!(msg))?;
        coords.extend(decoded.0);
    }
    polyline::encode_coordinates(coords, 5).map_err(|msg| anyhow!(msg))
}

/// Remembers trips planned during one run, so a repeated pair is only requested once. Pairs
/// without a trip are remembered too; pairs that failed aren't.
#[derive(Default)]
pub struct TravelTimeCache {
    entries: BTreeMap<PairKey, Option<TravelTime>>,
}

impl TravelTimeCache {
    pub fn new() -> TravelTimeCache {
        TravelTimeCache::default()
    }

    pub fn get(&self, key: &PairKey) -> Option<&Option<TravelTime>> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: PairKey, value: Option<TravelTime>) {
        self.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Plans a trip from every origin to every target. Results follow the order of the pairs; pairs
/// with no trip or a failed request are left out, and failures are logged.
pub fn compute_travel_times(
    origins: &[Origin],
    targets: &[Origin],
    planner: &dyn ItineraryPlanner,
    cache: &mut TravelTimeCache,
    parallelism: Parallelism,
    timer: &mut Timer,
) -> Vec<TravelTime> {
    let mut pairs = Vec::new();
    let mut requests = Vec::new();
    let mut seen = BTreeSet::new();
    for from in origins {
        for to in targets {
            let key = PairKey {
                from: from.id.clone(),
                to: to.id.clone(),
            };
            if cache.get(&key).is_none() && seen.insert(key.clone()) {
                requests.push((key.clone(), from, to));
            }
            pairs.push(key);
        }
    }
    info!(
        "Planning {} trips for {} pairs",
        prettyprint_usize(requests.len()),
        prettyprint_usize(pairs.len())
    );

    let results = timer.parallelize(
        "plan trips",
        parallelism,
        requests,
        |(key, from, to)| {
            let result = planner.plan(from, to);
            (key, result)
        },
    );
    for (key, result) in results {
        match result {
            Ok(trip) => cache.insert(key, trip),
            Err(err) => timer.warn(format!("Trip from {} to {} failed: {:#}", key.from, key.to, err)),
        }
    }

    pairs
        .into_iter()
        .filter_map(|key| cache.get(&key).cloned().flatten())
        .collect()
}

/// Writes `{output_dir}/{key}.json`, shaped like `{key: [trips]}`.
pub fn write_travel_times(output_dir: &str, key: &str, trips: &[TravelTime]) -> Result<String> {
    let path = format!("{}/{}.json", output_dir.trim_end_matches('/'), key);
    let mut by_key = BTreeMap::new();
    by_key.insert(key, trips);
    abstutil::write_json(&path, &by_key)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use geom::LonLat;

    fn place(id: &str) -> Origin {
        Origin {
            id: id.to_string(),
            pos: LonLat::new(135.0, 35.0),
            category: "test".to_string(),
        }
    }

    struct FakePlanner {
        calls: AtomicUsize,
    }

    impl ItineraryPlanner for FakePlanner {
        fn plan(&self, from: &Origin, to: &Origin) -> Result<Option<TravelTime>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match to.id.as_str() {
                "unreachable" => Ok(None),
                "broken" => bail!("timed out"),
                _ => Ok(Some(TravelTime {
                    from: from.id.clone(),
                    to: to.id.clone(),
                    duration_m: 12,
                    walk_distance_m: 300,
                    geometry: String::new(),
                    sections: Vec::new(),
                })),
            }
        }
    }

    #[test]
    fn every_pair_once() {
        let planner = FakePlanner {
            calls: AtomicUsize::new(0),
        };
        let origins = vec![place("a"), place("b")];
        let targets = vec![place("x"), place("unreachable"), place("broken")];
        let mut cache = TravelTimeCache::new();
        let mut timer = Timer::throwaway();

        let trips = compute_travel_times(
            &origins,
            &targets,
            &planner,
            &mut cache,
            Parallelism::Fixed(4),
            &mut timer,
        );
        let keys: Vec<(&str, &str)> = trips
            .iter()
            .map(|t| (t.from.as_str(), t.to.as_str()))
            .collect();
        assert_eq!(keys, vec![("a", "x"), ("b", "x")]);
        assert_eq!(planner.calls.load(Ordering::SeqCst), 6);
        // Failures aren't remembered
        assert_eq!(cache.len(), 4);
        assert_eq!(timer.warnings().len(), 2);

        // Only the failed pairs are retried
        let again = compute_travel_times(
            &origins,
            &targets,
            &planner,
            &mut cache,
            Parallelism::Fixed(4),
            &mut timer,
        );
        assert_eq!(again, trips);
        assert_eq!(planner.calls.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn parses_plan() {
        // Three points, then one
        let a = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";
        let b = "_p~iF~ps|U";
        let body = serde_json::json!({
            "plan": {"itineraries": [{
                "duration": 1510.0,
                "walkDistance": 420.7,
                "legs": [
                    {"mode": "WALK", "from": {"name": "Origin", "lat": 35.0, "lon": 135.0},
                     "to": {"lat": 35.01, "lon": 135.01}, "duration": 299.0, "distance": 420.7,
                     "legGeometry": {"points": a}},
                    {"mode": "BUS", "from": {"name": "Stop", "lat": 35.01, "lon": 135.01},
                     "to": {"name": "Destination", "lat": 35.02, "lon": 135.02},
                     "duration": 1211.0, "distance": 2000.0, "legGeometry": {"points": b}}
                ]
            }]}
        })
        .to_string();

        let trip = parse_plan_response(&body, "castle", "stop-1").unwrap().unwrap();
        assert_eq!(trip.duration_m, 25);
        assert_eq!(trip.walk_distance_m, 420);
        assert_eq!(trip.sections.len(), 2);
        assert_eq!(trip.sections[0].duration_m, 4);
        assert_eq!(trip.sections[0].to.name, "");
        assert_eq!(trip.sections[1].mode, "BUS");
        let merged = polyline::decode_polyline(&trip.geometry, 5).unwrap();
        assert_eq!(merged.0.len(), 4);

        let no_trip = r#"{"error": {"id": 404, "msg": "No trip found"}}"#;
        assert_eq!(parse_plan_response(no_trip, "a", "b").unwrap(), None);
        assert!(parse_plan_response("<html>", "a", "b").is_err());
    }

    #[test]
    fn output_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().display().to_string();
        let path = write_travel_times(&root, "spot_to_stops", &[]).unwrap();
        let json: serde_json::Value = abstutil::read_json(&path).unwrap();
        assert_eq!(json, serde_json::json!({"spot_to_stops": []}));
    }
}
