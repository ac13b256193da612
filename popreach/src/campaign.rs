use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use anyhow::{Context, Result};
use serde::Serialize;

use abstutil::{prettyprint_usize, Parallelism, Timer};

use crate::resolve::NestingViolation;
use crate::{
    reduce_to_snapshots, resolve, Aggregator, ArtifactWriter, IsochroneSource, MeshIndex, Origin,
    ReachablePopulation, ResolveStrategy, Thresholds,
};

/// Everything shared by the workers of one run. Nothing here changes while origins are being
/// processed, except through the `Aggregator`.
pub struct Campaign<'a> {
    pub mesh: &'a MeshIndex,
    pub source: &'a dyn IsochroneSource,
    pub thresholds: &'a Thresholds,
    pub writer: &'a ArtifactWriter,
    pub strategy: ResolveStrategy,
    pub parallelism: Parallelism,
}

/// How a run went. Failed origins don't fail the run; they're listed here.
#[derive(Debug, Default, Serialize)]
pub struct CampaignReport {
    pub origins_succeeded: usize,
    /// Origin ID to the error that stopped it
    pub failures: BTreeMap<String, String>,
    pub snapshots_written: usize,
    pub nesting_violations: usize,
    pub reachable_cells: usize,
    pub reachable_population: u64,
}

struct OriginOutcome {
    snapshots: usize,
    violations: Vec<NestingViolation>,
}

impl<'a> Campaign<'a> {
    /// Processes every origin on a bounded worker pool, then merges what each one reaches. An
    /// origin that fails, even by panicking, contributes nothing to the result.
    pub fn run(
        &self,
        origins: Vec<Origin>,
        timer: &mut Timer,
    ) -> (ReachablePopulation, CampaignReport) {
        let aggregator = Aggregator::new();
        let results = timer.parallelize(
            "process origins",
            self.parallelism,
            origins,
            |origin| {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    self.process_origin(&origin, &aggregator)
                }))
                .unwrap_or_else(|payload| Err(anyhow!("panicked: {}", panic_message(&*payload))))
                .with_context(|| format!("origin {}", origin.id));
                (origin.id, result)
            },
        );

        let mut report = CampaignReport::default();
        for (id, result) in results {
            match result {
                Ok(outcome) => {
                    report.origins_succeeded += 1;
                    report.snapshots_written += outcome.snapshots;
                    for v in outcome.violations {
                        report.nesting_violations += 1;
                        timer.warn(format!(
                            "{} at {}s reaches {} cells outside its largest isochrone: {:?}",
                            id,
                            v.threshold_seconds,
                            v.outside_largest.len(),
                            v.outside_largest
                        ));
                    }
                }
                Err(err) => {
                    timer.warn(format!("Skipping {}: {:#}", id, err));
                    report.failures.insert(id, format!("{:#}", err));
                }
            }
        }

        let result = aggregator.finalize(self.mesh);
        report.reachable_cells = result.mesh.len();
        report.reachable_population = result.total_population();
        timer.note(format!(
            "{} origins succeeded, {} failed. {} snapshots written. {} cells with population {} \
             are reachable.",
            prettyprint_usize(report.origins_succeeded),
            prettyprint_usize(report.failures.len()),
            prettyprint_usize(report.snapshots_written),
            prettyprint_usize(report.reachable_cells),
            prettyprint_usize(report.reachable_population as usize)
        ));
        (result, report)
    }

    fn process_origin(&self, origin: &Origin, aggregator: &Aggregator) -> Result<OriginOutcome> {
        let shapes = self.source.fetch(origin, self.thresholds)?;
        let mut snapshots = reduce_to_snapshots(&origin.id, self.thresholds, shapes)?;
        let resolution = resolve(&mut snapshots, self.mesh, self.strategy)?;
        for snapshot in &snapshots {
            self.writer.write_snapshot(snapshot)?;
        }
        aggregator.accumulate(&resolution.origin_reachable);
        debug!(
            "{} reaches {} cells through {} distinct isochrones",
            origin.id,
            resolution.origin_reachable.len(),
            snapshots.len()
        );
        Ok(OriginOutcome {
            snapshots: snapshots.len(),
            violations: resolution.violations,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown cause"
    }
}
