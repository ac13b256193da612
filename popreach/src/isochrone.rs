use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use geojson::GeoJson;
use reqwest::blocking::Client;
use serde_json::Value;
use structopt::StructOpt;

use geom::{geojson_type_name, Geometry};

use crate::{Origin, Thresholds};

/// Something that can say how far one can travel from an origin within each threshold.
pub trait IsochroneSource: Send + Sync {
    /// Returns exactly one geometry per threshold, keyed by seconds.
    fn fetch(&self, origin: &Origin, thresholds: &Thresholds) -> Result<BTreeMap<u32, Geometry>>;
}

/// How to reach the OpenTripPlanner instance and what kind of trip to ask it about.
#[derive(StructOpt, Clone, Debug)]
pub struct RoutingOptions {
    #[structopt(long, default_value = "http://localhost:8080")]
    pub otp_url: String,
    #[structopt(long, default_value = "default")]
    pub router: String,
    #[structopt(long, default_value = "WALK,TRANSIT")]
    pub modes: String,
    /// The departure date, as OTP expects it: MM-DD-YYYY
    #[structopt(long, default_value = "10-23-2025")]
    pub date: String,
    #[structopt(long, default_value = "10:00am")]
    pub time: String,
    #[structopt(long, default_value = "1000")]
    pub max_walk_distance_meters: u32,
    /// Give up on a single request after this long
    #[structopt(long, default_value = "120")]
    pub timeout_seconds: u64,
}

impl Default for RoutingOptions {
    fn default() -> RoutingOptions {
        RoutingOptions {
            otp_url: "http://localhost:8080".to_string(),
            router: "default".to_string(),
            modes: "WALK,TRANSIT".to_string(),
            date: "10-23-2025".to_string(),
            time: "10:00am".to_string(),
            max_walk_distance_meters: 1000,
            timeout_seconds: 120,
        }
    }
}

/// Talks to an OpenTripPlanner router over HTTP. One client is shared by every worker.
pub struct OtpClient {
    pub(crate) client: Client,
    pub(crate) opts: RoutingOptions,
}

impl OtpClient {
    pub fn new(opts: RoutingOptions) -> Result<OtpClient> {
        let client = Client::builder()
            .timeout(Duration::from_secs(opts.timeout_seconds))
            .build()?;
        Ok(OtpClient { client, opts })
    }

    pub(crate) fn endpoint(&self, name: &str) -> String {
        format!(
            "{}/otp/routers/{}/{}",
            self.opts.otp_url.trim_end_matches('/'),
            self.opts.router,
            name
        )
    }

    fn isochrone_query(&self, origin: &Origin, thresholds: &Thresholds) -> Vec<(&str, String)> {
        let mut query = vec![
            (
                "fromPlace",
                format!("{},{}", origin.pos.y(), origin.pos.x()),
            ),
            ("mode", self.opts.modes.clone()),
            ("date", self.opts.date.clone()),
            ("time", self.opts.time.clone()),
            (
                "maxWalkDistance",
                self.opts.max_walk_distance_meters.to_string(),
            ),
        ];
        for secs in thresholds.seconds() {
            query.push(("cutoffSec", secs.to_string()));
        }
        query
    }
}

impl IsochroneSource for OtpClient {
    fn fetch(&self, origin: &Origin, thresholds: &Thresholds) -> Result<BTreeMap<u32, Geometry>> {
        let url = self.endpoint("isochrone");
        debug!("Requesting isochrones for {} from {}", origin.id, url);
        let resp = self
            .client
            .get(&url)
            .query(&self.isochrone_query(origin, thresholds))
            .send()
            .with_context(|| format!("isochrone request for {}", origin.id))?;
        if !resp.status().is_success() {
            bail!(
                "isochrone request for {} failed with status {}",
                origin.id,
                resp.status()
            );
        }
        let body = resp.text()?;
        parse_isochrone_response(&body, thresholds)
            .with_context(|| format!("isochrone response for {}", origin.id))
    }
}

/// Validates an OTP isochrone response: a FeatureCollection holding one MultiPolygon feature per
/// requested threshold, each tagged with a `time` property in seconds. Shapes are kept exactly
/// as returned, including rings collapsed to a line or a point.
pub fn parse_isochrone_response(body: &str, thresholds: &Thresholds) -> Result<BTreeMap<u32, Geometry>> {
    let collection = match body.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => collection,
        _ => bail!("isochrone response isn't a FeatureCollection"),
    };
    if collection.features.len() != thresholds.len() {
        bail!(
            "isochrone response has {} features, but {} thresholds were requested",
            collection.features.len(),
            thresholds.len()
        );
    }

    let mut result = BTreeMap::new();
    for (idx, feature) in collection.features.into_iter().enumerate() {
        let time = match feature
            .properties
            .as_ref()
            .and_then(|props| props.get("time"))
        {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
            _ => None,
        }
        .and_then(|t| u32::try_from(t).ok())
        .ok_or_else(|| anyhow!("feature {} has no usable time", idx))?;
        if !thresholds.contains(time) {
            bail!("feature {} has time {}, which wasn't requested", idx, time);
        }

        let raw = match feature.geometry.map(|g| g.value) {
            Some(geojson::Value::MultiPolygon(raw)) => raw,
            Some(x) => bail!(
                "feature {} is a {}, not a MultiPolygon",
                idx,
                geojson_type_name(&x)
            ),
            None => bail!("feature {} has no geometry", idx),
        };
        let geometry = Geometry::multipolygon_from_geojson_unchecked(&raw)
            .with_context(|| format!("feature {}", idx))?;
        let degenerate = geometry.num_degenerate_rings();
        if degenerate > 0 {
            debug!("The {}s isochrone has {} degenerate rings", time, degenerate);
        }

        if result.insert(time, geometry).is_some() {
            bail!("time {} appears twice in the isochrone response", time);
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(features: &[(&str, &str)]) -> String {
        let list: Vec<String> = features
            .iter()
            .map(|(time, geometry)| {
                format!(
                    r#"{{"type": "Feature", "properties": {{"time": {}}}, "geometry": {}}}"#,
                    time, geometry
                )
            })
            .collect();
        format!(
            r#"{{"type": "FeatureCollection", "features": [{}]}}"#,
            list.join(",")
        )
    }

    const SHAPE: &str =
        r#"{"type": "MultiPolygon", "coordinates": [[[[0, 0], [1, 0], [1, 1], [0, 0]]]]}"#;
    const EMPTY: &str = r#"{"type": "MultiPolygon", "coordinates": []}"#;

    #[test]
    fn accepts_well_formed() {
        let thresholds = Thresholds::new(vec![600, 660]).unwrap();
        let parsed =
            parse_isochrone_response(&response(&[("\"660\"", SHAPE), ("600", EMPTY)]), &thresholds)
                .unwrap();
        assert_eq!(parsed.keys().cloned().collect::<Vec<_>>(), vec![600, 660]);
        assert!(parsed[&600].is_empty());
        assert_eq!(parsed[&660].polygons().len(), 1);

        // Collapsed rings survive parsing untouched
        let line = r#"{"type": "MultiPolygon", "coordinates": [[[[0, 0], [1, 1], [0, 0], [0, 0]]]]}"#;
        let parsed =
            parse_isochrone_response(&response(&[("600", line), ("660", SHAPE)]), &thresholds)
                .unwrap();
        assert_eq!(parsed[&600].num_degenerate_rings(), 1);
        assert_eq!(
            parsed[&600].to_geojson().value,
            geojson::Value::MultiPolygon(vec![vec![vec![
                vec![0.0, 0.0],
                vec![1.0, 1.0],
                vec![0.0, 0.0],
                vec![0.0, 0.0]
            ]]])
        );
    }

    #[test]
    fn rejects_malformed() {
        let thresholds = Thresholds::new(vec![600, 660]).unwrap();
        let point = r#"{"type": "Point", "coordinates": [0, 0]}"#;
        for bad in [
            "not json".to_string(),
            r#"{"type": "Point", "coordinates": [0, 0]}"#.to_string(),
            // Too few features
            response(&[("600", SHAPE)]),
            // Wrong geometry type
            response(&[("600", SHAPE), ("660", point)]),
            // Missing geometry
            response(&[("600", SHAPE), ("660", "null")]),
            // Unrequested time
            response(&[("600", SHAPE), ("720", SHAPE)]),
            // Repeated time
            response(&[("600", SHAPE), ("600", SHAPE)]),
            response(&[("600", SHAPE), ("null", SHAPE)]),
            // A position with one number
            response(&[
                ("600", SHAPE),
                ("660", r#"{"type": "MultiPolygon", "coordinates": [[[[0]]]]}"#),
            ]),
        ] {
            assert!(parse_isochrone_response(&bad, &thresholds).is_err(), "{}", bad);
        }
    }

    #[test]
    fn isochrone_request() {
        let client = OtpClient::new(RoutingOptions {
            otp_url: "http://otp:8080/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.endpoint("isochrone"),
            "http://otp:8080/otp/routers/default/isochrone"
        );
        let origin = Origin {
            id: "castle".to_string(),
            pos: geom::LonLat::new(135.5, 35.0),
            category: "sightseeing".to_string(),
        };
        let query = client.isochrone_query(&origin, &Thresholds::ladder(10, 12, 1).unwrap());
        assert_eq!(query[0], ("fromPlace", "35,135.5".to_string()));
        let cutoffs: Vec<&str> = query
            .iter()
            .filter(|(k, _)| *k == "cutoffSec")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(cutoffs, vec!["600", "660", "720"]);
    }
}
