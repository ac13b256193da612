//! Plumbing shared by the reachability tools: logging, progress reporting with `Timer`, a bounded
//! worker pool, and reading/writing JSON and binary files.

#[macro_use]
extern crate log;

mod io;
pub mod logger;
mod time;
mod utils;

pub use crate::io::{
    file_exists, read_binary, read_json, slurp_file, to_json, write_binary, write_json,
};
pub use crate::time::{Parallelism, Timer};
pub use crate::utils::prettyprint_usize;

const PROGRESS_FREQUENCY_SECONDS: f64 = 0.2;
