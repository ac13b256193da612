use std::collections::BTreeSet;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use geom::Geometry;

use crate::{IsochroneSnapshot, ReachablePopulation};

/// A resolved snapshot as written to disk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotArtifact {
    pub origin_id: String,
    pub time_minutes: u32,
    pub geometry: Geometry,
    pub reachable_mesh: BTreeSet<String>,
}

impl SnapshotArtifact {
    pub fn from_snapshot(snapshot: &IsochroneSnapshot) -> Result<SnapshotArtifact> {
        let reachable_mesh = snapshot
            .reachable_mesh_codes()
            .ok_or_else(|| anyhow!("{} hasn't been resolved yet", snapshot.name()))?
            .clone();
        Ok(SnapshotArtifact {
            origin_id: snapshot.origin_id.clone(),
            time_minutes: snapshot.time_minutes(),
            geometry: snapshot.geometry.clone(),
            reachable_mesh,
        })
    }

    pub fn name(&self) -> String {
        format!("{}_{}", self.origin_id, self.time_minutes)
    }

    pub fn to_feature(&self) -> geojson::Feature {
        let mut properties = serde_json::Map::new();
        properties.insert("origin-id".to_string(), self.origin_id.clone().into());
        properties.insert("time-minutes".to_string(), self.time_minutes.into());
        properties.insert(
            "reachable-mesh".to_string(),
            Value::Array(self.reachable_mesh.iter().cloned().map(Value::String).collect()),
        );
        geojson::Feature {
            bbox: None,
            geometry: Some(self.geometry.to_geojson()),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }

    pub fn from_feature(feature: &geojson::Feature) -> Result<SnapshotArtifact> {
        let property = |key: &str| {
            feature
                .properties
                .as_ref()
                .and_then(|props| props.get(key))
                .ok_or_else(|| anyhow!("missing {}", key))
        };
        let origin_id = property("origin-id")?
            .as_str()
            .ok_or_else(|| anyhow!("origin-id isn't a string"))?
            .to_string();
        let time_minutes = property("time-minutes")?
            .as_u64()
            .and_then(|t| u32::try_from(t).ok())
            .ok_or_else(|| anyhow!("time-minutes isn't a whole number"))?;
        let reachable_mesh = serde_json::from_value(property("reachable-mesh")?.clone())
            .context("reachable-mesh isn't a list of codes")?;
        let geometry = Geometry::from_geojson_unchecked(
            feature
                .geometry
                .as_ref()
                .ok_or_else(|| anyhow!("no geometry"))?,
        )?;
        Ok(SnapshotArtifact {
            origin_id,
            time_minutes,
            geometry,
            reachable_mesh,
        })
    }
}

/// Writes every resolved snapshot twice: a compact binary form for reloading, and a GeoJSON
/// Feature for people and map viewers. Both are named `{origin}_{minutes}`, so rerunning an origin
/// overwrites its old files.
pub struct ArtifactWriter {
    bin_dir: String,
    json_dir: String,
}

impl ArtifactWriter {
    pub fn new<I: Into<String>>(bin_dir: I, json_dir: I) -> ArtifactWriter {
        ArtifactWriter {
            bin_dir: bin_dir.into(),
            json_dir: json_dir.into(),
        }
    }

    pub fn bin_path(&self, name: &str) -> String {
        format!("{}/{}.bin", self.bin_dir.trim_end_matches('/'), name)
    }

    pub fn json_path(&self, name: &str) -> String {
        format!("{}/{}.json", self.json_dir.trim_end_matches('/'), name)
    }

    pub fn write_snapshot(&self, snapshot: &IsochroneSnapshot) -> Result<()> {
        let artifact = SnapshotArtifact::from_snapshot(snapshot)?;
        let name = artifact.name();
        abstutil::write_binary(&self.bin_path(&name), &artifact)?;
        abstutil::write_json(&self.json_path(&name), &artifact.to_feature())?;
        debug!(
            "Wrote {} with {} reachable cells",
            name,
            artifact.reachable_mesh.len()
        );
        Ok(())
    }

    pub fn write_final(path: &str, record: &ReachablePopulation) -> Result<()> {
        abstutil::write_json(path, record)?;
        info!(
            "Wrote {} reachable cells with a population of {} to {}",
            record.mesh.len(),
            record.total_population(),
            path
        );
        Ok(())
    }
}

pub fn read_snapshot(path: &str) -> Result<SnapshotArtifact> {
    abstutil::read_binary(path)
}

pub fn read_snapshot_json(path: &str) -> Result<SnapshotArtifact> {
    let feature: geojson::Feature = abstutil::read_json(path)?;
    SnapshotArtifact::from_feature(&feature).with_context(|| format!("parsing {}", path))
}
