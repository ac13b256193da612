use std::collections::BTreeSet;
use std::str::FromStr;

use anyhow::Result;

use crate::{IsochroneSnapshot, MeshIndex};

/// How to find the cells touched by each snapshot of one origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ResolveStrategy {
    /// Assume smaller thresholds reach a subset of the largest one, and only test the cells the
    /// largest snapshot touches.
    TrustNesting,
    /// Query the full mesh for every snapshot and report cells that break the nesting
    /// assumption. Slower.
    Verify,
}

impl FromStr for ResolveStrategy {
    type Err = String;

    fn from_str(x: &str) -> Result<ResolveStrategy, String> {
        match x {
            "trust" => Ok(ResolveStrategy::TrustNesting),
            "verify" => Ok(ResolveStrategy::Verify),
            _ => Err(format!("unknown strategy {}; use trust or verify", x)),
        }
    }
}

/// A snapshot that touches cells the largest snapshot of its origin doesn't.
#[derive(Clone, Debug, PartialEq)]
pub struct NestingViolation {
    pub threshold_seconds: u32,
    pub outside_largest: BTreeSet<String>,
}

pub struct Resolution {
    /// Every cell reachable from the origin at any threshold
    pub origin_reachable: BTreeSet<String>,
    /// Only ever filled out by `ResolveStrategy::Verify`
    pub violations: Vec<NestingViolation>,
}

/// Fills out `reachable_mesh_codes` for every snapshot of one origin. The snapshots must be
/// sorted by threshold, and none may be resolved yet.
pub fn resolve(
    snapshots: &mut [IsochroneSnapshot],
    mesh: &MeshIndex,
    strategy: ResolveStrategy,
) -> Result<Resolution> {
    let mut resolution = Resolution {
        origin_reachable: BTreeSet::new(),
        violations: Vec::new(),
    };
    let (largest, rest) = match snapshots.split_last_mut() {
        Some(pair) => pair,
        None => return Ok(resolution),
    };

    let largest_reachable = mesh.query(&largest.geometry);
    resolution.origin_reachable = largest_reachable.clone();
    for snapshot in rest {
        let reachable = match strategy {
            ResolveStrategy::TrustNesting => {
                mesh.query_subset(&snapshot.geometry, &largest_reachable)
            }
            ResolveStrategy::Verify => {
                let full = mesh.query(&snapshot.geometry);
                let outside_largest: BTreeSet<String> =
                    full.difference(&largest_reachable).cloned().collect();
                if !outside_largest.is_empty() {
                    resolution.violations.push(NestingViolation {
                        threshold_seconds: snapshot.threshold_seconds,
                        outside_largest: outside_largest.clone(),
                    });
                    resolution.origin_reachable.extend(outside_largest);
                }
                full
            }
        };
        snapshot.set_reachable_mesh_codes(reachable)?;
    }
    largest.set_reachable_mesh_codes(largest_reachable)?;
    Ok(resolution)
}
