use anyhow::Result;
use structopt::StructOpt;

/// Strictly increasing travel-time budgets in seconds. Snapshots are named by whole minutes, so
/// no two budgets may fall in the same minute.
#[derive(Clone, Debug, PartialEq)]
pub struct Thresholds(Vec<u32>);

impl Thresholds {
    pub fn new(seconds: Vec<u32>) -> Result<Thresholds> {
        if seconds.is_empty() {
            bail!("Need at least one threshold");
        }
        if seconds[0] < 60 {
            bail!("Thresholds must be at least one minute, not {}s", seconds[0]);
        }
        for pair in seconds.windows(2) {
            if pair[0] >= pair[1] {
                bail!("Thresholds must strictly increase, but {} >= {}", pair[0], pair[1]);
            }
            if pair[0] / 60 == pair[1] / 60 {
                bail!("Thresholds {}s and {}s fall in the same minute", pair[0], pair[1]);
            }
        }
        Ok(Thresholds(seconds))
    }

    /// Every `step` minutes from `start` through `end`, inclusive.
    pub fn ladder(start_minutes: u32, end_minutes: u32, step_minutes: u32) -> Result<Thresholds> {
        if step_minutes == 0 {
            bail!("The threshold step can't be 0");
        }
        if start_minutes > end_minutes {
            bail!("Thresholds start at {} after they end at {}", start_minutes, end_minutes);
        }
        Thresholds::new(
            (start_minutes..=end_minutes)
                .step_by(step_minutes as usize)
                .map(|min| min * 60)
                .collect(),
        )
    }

    pub fn seconds(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn largest(&self) -> u32 {
        self.0[self.0.len() - 1]
    }

    pub fn contains(&self, secs: u32) -> bool {
        self.0.binary_search(&secs).is_ok()
    }
}

pub fn to_minutes(secs: u32) -> u32 {
    secs / 60
}

#[derive(StructOpt, Clone, Debug)]
pub struct ThresholdOptions {
    /// The smallest travel-time budget, in minutes
    #[structopt(long, default_value = "10")]
    pub start_minutes: u32,
    /// The largest travel-time budget, in minutes
    #[structopt(long, default_value = "120")]
    pub end_minutes: u32,
    #[structopt(long, default_value = "1")]
    pub step_minutes: u32,
}

impl ThresholdOptions {
    pub fn thresholds(&self) -> Result<Thresholds> {
        Thresholds::ladder(self.start_minutes, self.end_minutes, self.step_minutes)
    }
}

impl Default for ThresholdOptions {
    fn default() -> ThresholdOptions {
        ThresholdOptions {
            start_minutes: 10,
            end_minutes: 120,
            step_minutes: 1,
        }
    }
}
