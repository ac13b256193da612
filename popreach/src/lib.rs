//! Estimates how many people can reach a set of origins by transit within a range of travel-time
//! budgets.
//!
//! For each origin, an OpenTripPlanner router describes the area reachable within each threshold.
//! Consecutive identical shapes are collapsed into snapshots, each snapshot is matched against a
//! grid of population cells, and the cells reachable from any origin are merged into one
//! dataset. Every snapshot is also written to disk for inspection.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod aggregate;
mod artifacts;
mod campaign;
mod isochrone;
mod mesh;
mod origins;
mod resolve;
mod snapshot;
mod thresholds;
pub mod travel_times;

pub use crate::aggregate::{Aggregator, ReachableMesh, ReachablePopulation};
pub use crate::artifacts::{read_snapshot, read_snapshot_json, ArtifactWriter, SnapshotArtifact};
pub use crate::campaign::{Campaign, CampaignReport};
pub use crate::isochrone::{parse_isochrone_response, IsochroneSource, OtpClient, RoutingOptions};
pub use crate::mesh::{MeshCell, MeshIndex};
pub use crate::origins::{load_origins, parse_origins, Origin};
pub use crate::resolve::{resolve, NestingViolation, Resolution, ResolveStrategy};
pub use crate::snapshot::{reduce, reduce_to_snapshots, IsochroneSnapshot};
pub use crate::thresholds::{ThresholdOptions, Thresholds};
