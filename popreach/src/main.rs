//! Command-line entry point for the reachability tools.

#[macro_use]
extern crate log;

use anyhow::Result;
use structopt::StructOpt;

use abstutil::{Parallelism, Timer};
use popreach::travel_times::{compute_travel_times, write_travel_times, TravelTimeCache};
use popreach::{
    load_origins, ArtifactWriter, Campaign, MeshIndex, OtpClient, ResolveStrategy, RoutingOptions,
    ThresholdOptions,
};

#[derive(StructOpt)]
#[structopt(
    name = "popreach",
    about = "Estimates the population that can reach a set of places by transit"
)]
enum Command {
    /// Finds every mesh cell reachable from any origin, writing one snapshot per distinct
    /// isochrone and the merged population dataset.
    AreaSearch {
        /// A GeoJSON FeatureCollection of mesh cells, with `meshCode` and `population` properties
        #[structopt()]
        mesh: String,
        /// Where to write binary snapshots
        #[structopt()]
        bin_dir: String,
        /// Where to write GeoJSON snapshots
        #[structopt()]
        json_dir: String,
        /// Where to write the merged dataset
        #[structopt()]
        output: String,
        /// One or more origin files, shaped like `{"category": [{"id", "lat", "lon"}]}`
        #[structopt(required = true)]
        origins: Vec<String>,
        #[structopt(flatten)]
        routing: RoutingOptions,
        #[structopt(flatten)]
        thresholds: ThresholdOptions,
        /// `trust` assumes smaller isochrones nest inside larger ones; `verify` checks it
        #[structopt(long, default_value = "trust")]
        strategy: ResolveStrategy,
        /// How many requests to the router run at once
        #[structopt(long, default_value = "16")]
        workers: usize,
    },
    /// Print a binary snapshot as JSON
    DumpJSON {
        #[structopt()]
        path: String,
    },
    /// Plans a transit trip from every origin to every target.
    TravelTimes {
        #[structopt()]
        origins: String,
        #[structopt()]
        targets: String,
        #[structopt()]
        output_dir: String,
        /// Names the output file and its top-level key
        #[structopt(long, default_value = "spot_to_stops")]
        key: String,
        #[structopt(flatten)]
        routing: RoutingOptions,
        #[structopt(long, default_value = "16")]
        workers: usize,
    },
}

fn main() -> Result<()> {
    let cmd = Command::from_args();

    if !matches!(cmd, Command::DumpJSON { .. }) {
        abstutil::logger::setup();
    }

    match cmd {
        Command::AreaSearch {
            mesh,
            bin_dir,
            json_dir,
            output,
            origins,
            routing,
            thresholds,
            strategy,
            workers,
        } => area_search(
            mesh, bin_dir, json_dir, output, origins, routing, thresholds, strategy, workers,
        ),
        Command::DumpJSON { path } => dump_json(path),
        Command::TravelTimes {
            origins,
            targets,
            output_dir,
            key,
            routing,
            workers,
        } => travel_times(origins, targets, output_dir, key, routing, workers),
    }
}

#[allow(clippy::too_many_arguments)]
fn area_search(
    mesh: String,
    bin_dir: String,
    json_dir: String,
    output: String,
    origins: Vec<String>,
    routing: RoutingOptions,
    thresholds: ThresholdOptions,
    strategy: ResolveStrategy,
    workers: usize,
) -> Result<()> {
    let mut timer = Timer::new("area search");
    let thresholds = thresholds.thresholds()?;
    let origins = load_origins(&origins)?;
    let mesh = MeshIndex::load(&mesh, &mut timer)?;
    if mesh.is_empty() {
        timer.warn("The mesh has no usable cells, so nothing will be reachable");
    }
    let client = OtpClient::new(routing)?;
    let writer = ArtifactWriter::new(bin_dir, json_dir);

    let campaign = Campaign {
        mesh: &mesh,
        source: &client,
        thresholds: &thresholds,
        writer: &writer,
        strategy,
        parallelism: Parallelism::Fixed(workers),
    };
    let (result, report) = campaign.run(origins, &mut timer);
    ArtifactWriter::write_final(&output, &result)?;
    if !report.failures.is_empty() {
        warn!(
            "{} origins failed; see the warnings above",
            report.failures.len()
        );
    }
    Ok(())
}

fn dump_json(path: String) -> Result<()> {
    let snapshot = popreach::read_snapshot(&path)?;
    println!("{}", abstutil::to_json(&snapshot.to_feature())?);
    Ok(())
}

fn travel_times(
    origins: String,
    targets: String,
    output_dir: String,
    key: String,
    routing: RoutingOptions,
    workers: usize,
) -> Result<()> {
    let mut timer = Timer::new("travel times");
    let origins = load_origins(&[origins])?;
    let targets = load_origins(&[targets])?;
    let client = OtpClient::new(routing)?;
    let mut cache = TravelTimeCache::new();
    let trips = compute_travel_times(
        &origins,
        &targets,
        &client,
        &mut cache,
        Parallelism::Fixed(workers),
        &mut timer,
    );
    let path = write_travel_times(&output_dir, &key, &trips)?;
    timer.note(format!("Wrote {} trips to {}", trips.len(), path));
    Ok(())
}
