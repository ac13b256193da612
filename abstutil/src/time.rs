use std::io::{stdout, Write};
use std::time::Instant;

use crate::{prettyprint_usize, PROGRESS_FREQUENCY_SECONDS};

pub fn elapsed_seconds(since: Instant) -> f64 {
    let dt = since.elapsed();
    (dt.as_secs() as f64) + (f64::from(dt.subsec_nanos()) * 1e-9)
}

pub fn prettyprint_time(seconds: f64) -> String {
    format!("{:.4}s", seconds)
}

/// How many threads `Timer::parallelize` should use.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Parallelism {
    /// One thread per CPU. Right for CPU-bound work.
    Fastest,
    /// A fixed pool size. Work that mostly waits on a remote service wants more threads than
    /// there are CPUs.
    Fixed(usize),
}

impl Parallelism {
    pub fn num_threads(self) -> usize {
        match self {
            Parallelism::Fastest => num_cpus::get(),
            Parallelism::Fixed(n) => n,
        }
        .max(1)
    }
}

struct Progress {
    label: String,
    processed_items: usize,
    total_items: usize,
    started_at: Instant,
    last_printed_at: Instant,
}

impl Progress {
    fn new(label: &str, total_items: usize) -> Progress {
        Progress {
            label: label.to_string(),
            processed_items: 0,
            total_items,
            started_at: Instant::now(),
            last_printed_at: Instant::now(),
        }
    }

    // Returns when done
    fn next(&mut self) -> Option<(f64, String)> {
        self.processed_items += 1;
        if self.processed_items > self.total_items {
            panic!(
                "{} is too few items for {} progress",
                prettyprint_usize(self.total_items),
                self.label
            );
        }

        if self.processed_items == self.total_items {
            let elapsed = elapsed_seconds(self.started_at);
            let line = format!(
                "{} ({})... {}",
                self.label,
                prettyprint_usize(self.total_items),
                prettyprint_time(elapsed)
            );
            if self.total_items > 1 {
                clear_current_line();
            }
            println!("{}", line);
            return Some((elapsed, line));
        } else if elapsed_seconds(self.last_printed_at) >= PROGRESS_FREQUENCY_SECONDS {
            self.last_printed_at = Instant::now();
            clear_current_line();
            print!(
                "{}: {}/{}... {}",
                self.label,
                prettyprint_usize(self.processed_items),
                prettyprint_usize(self.total_items),
                prettyprint_time(elapsed_seconds(self.started_at))
            );
            let _ = stdout().flush();
        }
        None
    }
}

enum StackEntry {
    TimerSpan(TimerSpan),
    Progress(Progress),
}

struct TimerSpan {
    name: String,
    started_at: Instant,
    nested_results: Vec<String>,
    nested_time: f64,
}

/// Hierarchical timing and progress reporting. Spans nest, iterations print throttled progress,
/// and when the outermost Timer is dropped, a summary of every span, note, and warning is printed.
pub struct Timer {
    results: Vec<String>,
    stack: Vec<StackEntry>,

    outermost_name: String,

    notes: Vec<String>,
    warnings: Vec<String>,
}

impl Timer {
    pub fn new<I: AsRef<str>>(name: I) -> Timer {
        let name = name.as_ref();
        let mut t = Timer {
            results: Vec::new(),
            stack: Vec::new(),
            outermost_name: name.to_string(),
            notes: Vec::new(),
            warnings: Vec::new(),
        };
        t.start(name);
        t
    }

    /// For tests and callers that don't care about the summary.
    pub fn throwaway() -> Timer {
        Timer::new("throwaway")
    }

    /// Log immediately, but also repeat at the end, to avoid having to scroll up and find
    /// interesting things.
    pub fn note<I: Into<String>>(&mut self, line: I) {
        let line = line.into();
        // Interrupt the start_iter with a newline.
        if let Some(StackEntry::Progress(_)) = self.stack.last() {
            println!();
        }
        println!("{}", line);
        self.notes.push(line);
    }

    /// Log through `log::warn!` and repeat in the summary.
    pub fn warn<I: Into<String>>(&mut self, line: I) {
        let line = line.into();
        warn!("{}", line);
        self.warnings.push(line);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn start<I: AsRef<str>>(&mut self, name: I) {
        let name = name.as_ref();
        println!("{}...", name);
        self.stack.push(StackEntry::TimerSpan(TimerSpan {
            name: name.to_string(),
            started_at: Instant::now(),
            nested_results: Vec::new(),
            nested_time: 0.0,
        }));
    }

    pub fn stop<I: AsRef<str>>(&mut self, name: I) {
        let name = name.as_ref();
        let span = match self.stack.pop() {
            Some(StackEntry::TimerSpan(s)) => s,
            _ => panic!("stop({}) doesn't match an open span", name),
        };
        assert_eq!(span.name, name);
        let elapsed = elapsed_seconds(span.started_at);
        let line = format!("{} took {}", name, prettyprint_time(elapsed));

        let padding = "  ".repeat(self.stack.len());
        match self.stack.last_mut() {
            Some(StackEntry::TimerSpan(ref mut s)) => {
                s.nested_results.push(format!("{}- {}", padding, line));
                s.nested_results.extend(span.nested_results);
                if span.nested_time != 0.0 {
                    s.nested_results.push(format!(
                        "  {}- ... plus {}",
                        padding,
                        prettyprint_time(elapsed - span.nested_time)
                    ));
                }
                s.nested_time += elapsed;
            }
            Some(StackEntry::Progress(_)) => unreachable!(),
            None => {
                self.results.push(format!("{}- {}", padding, line));
                self.results.extend(span.nested_results);
                if span.nested_time != 0.0 {
                    self.results.push(format!(
                        "  - ... plus {}",
                        prettyprint_time(elapsed - span.nested_time)
                    ));
                }
            }
        }

        println!("{}", line);
    }

    pub fn start_iter<I: AsRef<str>>(&mut self, name: I, total_items: usize) {
        if total_items == 0 {
            return;
        }
        let name = name.as_ref();
        if let Some(StackEntry::Progress(p)) = self.stack.last() {
            panic!(
                "Can't start_iter({}) while Progress({}) is top of the stack",
                name, p.label
            );
        }

        self.stack
            .push(StackEntry::Progress(Progress::new(name, total_items)));
    }

    pub fn next(&mut self) {
        let maybe_result =
            if let Some(StackEntry::Progress(ref mut progress)) = self.stack.last_mut() {
                progress.next()
            } else {
                panic!("Can't next() while a TimerSpan is top of the stack");
            };
        if let Some((elapsed, result)) = maybe_result {
            self.stack.pop();
            self.add_result(elapsed, result);
        }
    }

    fn add_result(&mut self, elapsed: f64, line: String) {
        let padding = "  ".repeat(self.stack.len());
        match self.stack.last_mut() {
            Some(StackEntry::TimerSpan(ref mut s)) => {
                s.nested_results.push(format!("{}- {}", padding, line));
                s.nested_time += elapsed;
            }
            Some(StackEntry::Progress(_)) => unreachable!(),
            None => {
                self.results.push(format!("{}- {}", padding, line));
            }
        }
    }

    /// Runs `cb` over every request on a bounded thread pool, reporting progress as results
    /// arrive. Results are returned in the same order as the requests. A panic in one callback
    /// isn't contained and ends the whole call, so callbacks should return errors as values.
    pub fn parallelize<I, O, F>(
        &mut self,
        timer_name: &str,
        parallelism: Parallelism,
        requests: Vec<I>,
        cb: F,
    ) -> Vec<O>
    where
        I: Send,
        O: Send,
        F: Fn(I) -> O + Sync,
    {
        let num_threads = parallelism.num_threads().min(requests.len().max(1));
        let cb = &cb;
        scoped_threadpool::Pool::new(num_threads as u32).scoped(|scope| {
            let (tx, rx) = std::sync::mpsc::channel();
            let mut results: Vec<Option<O>> = std::iter::repeat_with(|| None)
                .take(requests.len())
                .collect();
            for (idx, req) in requests.into_iter().enumerate() {
                let tx = tx.clone();
                scope.execute(move || {
                    // The receiver outlives every worker
                    let _ = tx.send((idx, cb(req)));
                });
            }
            drop(tx);

            self.start_iter(timer_name, results.len());
            for (idx, result) in rx.iter() {
                self.next();
                results[idx] = Some(result);
            }
            // A callback that panicked never reports back
            results
                .into_iter()
                .enumerate()
                .map(|(idx, result)| {
                    result.unwrap_or_else(|| {
                        panic!("{}: request {} never finished", timer_name, idx)
                    })
                })
                .collect()
        })
    }
}

impl std::ops::Drop for Timer {
    fn drop(&mut self) {
        let stop_name = self.outermost_name.clone();

        // If we're in the middle of unwinding a panic, don't further blow up.
        match self.stack.last() {
            Some(StackEntry::TimerSpan(ref s)) => {
                if s.name != stop_name {
                    println!("dropping Timer because of panic");
                    return;
                }
            }
            Some(StackEntry::Progress(_)) => {
                println!("dropping Timer because of panic");
                return;
            }
            None => {
                return;
            }
        }

        self.stop(&stop_name);
        println!();
        for line in &self.results {
            println!("{}", line);
        }
        println!();

        if !self.notes.is_empty() {
            println!("{} notes:", self.notes.len());
            for line in &self.notes {
                println!("{}", line);
            }
            println!();
        }

        if !self.warnings.is_empty() {
            println!("{} warnings:", self.warnings.len());
            for line in &self.warnings {
                println!("{}", line);
            }
            println!();
        }
    }
}

fn clear_current_line() {
    print!("\r");
}
