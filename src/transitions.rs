/*!
The iteration loop shared by warm-up and sampling.

[`generate_transitions`] steps a [`Sampler`] a fixed number of times, reports
progress, honours an interrupt callback at iteration boundaries and records every
`num_thin`-th iteration through an [`McmcWriter`].

# Examples

```rust
use mini_hmc::sampler::{Sample, Sampler};
use mini_hmc::transitions::{generate_transitions, NoProgress, RunOutcome, Schedule};
use mini_hmc::writer::{McmcWriter, MemoryWriter, NoopWriter, Writer};
use mini_hmc::model::Model;
use std::ops::ControlFlow;

struct Stay;

impl Sampler for Stay {
    fn transition(
        &mut self,
        init: &Sample,
        _writer: &mut dyn Writer,
        _error_writer: &mut dyn Writer,
    ) -> mini_hmc::Result<Sample> {
        Ok(init.clone())
    }
}

struct Flat;

impl Model for Flat {
    fn num_params(&self) -> usize {
        1
    }

    fn log_prob_grad(&self, _q: &[f64], grad: &mut [f64], _msgs: &mut dyn std::io::Write) -> mini_hmc::Result<f64> {
        grad[0] = 0.0;
        Ok(0.0)
    }
}

let (mut samples, mut diagnostics) = (MemoryWriter::default(), MemoryWriter::default());
let (mut messages, mut errors) = (NoopWriter, NoopWriter);
let mut writer = McmcWriter::new(&mut samples, &mut diagnostics, &mut messages, &mut errors);
let mut state = Sample::new(ndarray::array![0.0], 0.0, 1.0);

let outcome = generate_transitions(
    &mut Stay,
    &Schedule::sampling(0, 10, 2, 0),
    &mut writer,
    &mut state,
    &Flat,
    &mut NoProgress,
    &mut || ControlFlow::Continue(()),
)
.unwrap();

assert_eq!(outcome, RunOutcome::Completed);
assert_eq!(samples.values().count(), 5);
```
*/

use crate::error::{Error, Result};
use crate::model::Model;
use crate::sampler::{Sample, Sampler};
use crate::writer::{McmcWriter, Writer};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::ops::ControlFlow;

/// Which part of a run an iteration belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Warmup,
    Sampling,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Warmup => write!(f, "Warmup"),
            Phase::Sampling => write!(f, "Sampling"),
        }
    }
}

/// How a call to [`generate_transitions`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// The interrupt callback asked to stop before global iteration `iteration`.
    Interrupted { iteration: usize },
}

/// Iteration range and recording policy of one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// Iterations to run in this call.
    pub num_iterations: usize,
    /// Global index of the first iteration.
    pub start: usize,
    /// Global iteration count of the whole run, used for progress.
    pub finish: usize,
    pub num_thin: usize,
    /// Progress cadence; `<= 0` disables progress reports.
    pub refresh: i64,
    /// Send recorded iterations to the sample writer as well as the diagnostic writer.
    pub save: bool,
    pub phase: Phase,
}

impl Schedule {
    /// Warm-up iterations `[0, num_warmup)` of a run with `num_samples` draws after it.
    pub fn warmup(num_warmup: usize, num_samples: usize, num_thin: usize, refresh: i64, save_warmup: bool) -> Self {
        Self {
            num_iterations: num_warmup,
            start: 0,
            finish: num_warmup + num_samples,
            num_thin,
            refresh,
            save: save_warmup,
            phase: Phase::Warmup,
        }
    }

    /// Sampling iterations `[num_warmup, num_warmup + num_samples)`.
    pub fn sampling(num_warmup: usize, num_samples: usize, num_thin: usize, refresh: i64) -> Self {
        Self {
            num_iterations: num_samples,
            start: num_warmup,
            finish: num_warmup + num_samples,
            num_thin,
            refresh,
            save: true,
            phase: Phase::Sampling,
        }
    }

    fn reports_at(&self, m: usize) -> bool {
        if self.refresh <= 0 {
            return false;
        }
        let refresh = self.refresh as usize;
        m == 0 || self.start + m + 1 == self.finish || (m + 1) % refresh == 0
    }
}

/// Receives progress updates from [`generate_transitions`].
pub trait ProgressReporter {
    /// `iteration` is the 1-based global iteration about to run, out of `total`.
    fn report(&mut self, iteration: usize, total: usize, phase: Phase) -> Result<()>;

    fn finish(&mut self) {}
}

/// Ignores progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&mut self, _iteration: usize, _total: usize, _phase: Phase) -> Result<()> {
        Ok(())
    }
}

/// Writes `Iteration:  1 / 20 [  5%]  (Warmup)` lines to a [`Writer`].
pub struct WriterProgress<'a> {
    writer: &'a mut dyn Writer,
}

impl<'a> WriterProgress<'a> {
    pub fn new(writer: &'a mut dyn Writer) -> Self {
        Self { writer }
    }
}

impl ProgressReporter for WriterProgress<'_> {
    fn report(&mut self, iteration: usize, total: usize, phase: Phase) -> Result<()> {
        let width = total.to_string().len();
        let percent = if total == 0 { 100 } else { 100 * iteration / total };
        self.writer.write_message(&format!(
            "Iteration: {iteration:>width$} / {total} [{percent:>3}%]  ({phase})"
        ))
    }
}

/// Terminal progress bar.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(prefix: impl Into<String>) -> Self {
        let style = ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");
        let bar = ProgressBar::new(0);
        bar.set_style(style);
        bar.set_prefix(prefix.into());
        Self { bar }
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }
}

impl ProgressReporter for BarProgress {
    fn report(&mut self, iteration: usize, total: usize, phase: Phase) -> Result<()> {
        self.bar.set_length(total as u64);
        self.bar.set_position(iteration as u64);
        self.bar.set_message(phase.to_string());
        Ok(())
    }

    fn finish(&mut self) {
        self.bar.finish_with_message("Done!");
    }
}

/// Runs `schedule.num_iterations` transitions starting from `init_s`.
///
/// # Parameters
///
/// * `sampler`: Transition kernel; its `transition` receives the message writer
///   for model output and the error writer for rejection notices.
/// * `schedule`: Iteration range, thinning, progress cadence and phase.
/// * `writer`: Destination of recorded iterations. Iteration `m` of the call is
///   recorded when `m % num_thin == 0`: always to the diagnostic writer, and to the
///   sample writer when `schedule.save` is set.
/// * `init_s`: Chain state, advanced in place.
/// * `model`: Used to produce the constrained parameter values.
/// * `progress`: Progress sink, invoked before stepping.
/// * `interrupt`: Polled at the start of every iteration.
///
/// # Returns
///
/// [`RunOutcome::Interrupted`] if `interrupt` broke the loop. Sampler and writer
/// errors end the loop and are returned; iterations recorded before the failure
/// stay recorded.
pub fn generate_transitions<S: Sampler + ?Sized, M: Model + ?Sized>(
    sampler: &mut S,
    schedule: &Schedule,
    writer: &mut McmcWriter<'_>,
    init_s: &mut Sample,
    model: &M,
    progress: &mut dyn ProgressReporter,
    interrupt: &mut dyn FnMut() -> ControlFlow<()>,
) -> Result<RunOutcome> {
    if schedule.num_thin == 0 {
        return Err(Error::Config("num_thin must be at least 1".to_string()));
    }

    for m in 0..schedule.num_iterations {
        let iteration = schedule.start + m;
        if interrupt().is_break() {
            log::info!("interrupted before iteration {iteration}");
            return Ok(RunOutcome::Interrupted { iteration });
        }

        if schedule.reports_at(m) {
            progress.report(iteration + 1, schedule.finish, schedule.phase)?;
        }

        let next = sampler.transition(init_s, &mut *writer.message, &mut *writer.error)?;
        *init_s = next;

        if m % schedule.num_thin == 0 {
            if schedule.save {
                writer.write_sample_params(&*init_s, &*sampler, model)?;
            }
            writer.write_diagnostic_params(&*init_s, &*sampler)?;
        }
    }

    Ok(RunOutcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{MemoryWriter, NoopWriter};
    use ndarray::array;
    use std::io::Write;

    /// Moves the chain to the number of transitions taken so far.
    struct Counter {
        calls: usize,
        fail_at: Option<usize>,
    }

    impl Counter {
        fn new() -> Self {
            Self {
                calls: 0,
                fail_at: None,
            }
        }
    }

    impl Sampler for Counter {
        fn transition(
            &mut self,
            _init: &Sample,
            _writer: &mut dyn Writer,
            _error_writer: &mut dyn Writer,
        ) -> Result<Sample> {
            if self.fail_at == Some(self.calls) {
                return Err(Error::Model("sampler failure".to_string()));
            }
            let s = Sample::new(array![self.calls as f64], -(self.calls as f64), 1.0);
            self.calls += 1;
            Ok(s)
        }
    }

    struct Flat;

    impl Model for Flat {
        fn num_params(&self) -> usize {
            1
        }

        fn log_prob_grad(&self, _q: &[f64], grad: &mut [f64], _msgs: &mut dyn Write) -> Result<f64> {
            grad[0] = 0.0;
            Ok(0.0)
        }
    }

    fn continue_always() -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    struct Outputs {
        samples: MemoryWriter,
        diagnostics: MemoryWriter,
    }

    fn run(sampler: &mut Counter, schedules: &[Schedule], state: &mut Sample) -> (Outputs, Result<RunOutcome>) {
        let (mut samples, mut diagnostics) = (MemoryWriter::default(), MemoryWriter::default());
        let (mut messages, mut errors) = (NoopWriter, NoopWriter);
        let mut result = Ok(RunOutcome::Completed);
        {
            let mut writer = McmcWriter::new(&mut samples, &mut diagnostics, &mut messages, &mut errors);
            for schedule in schedules {
                result = generate_transitions(
                    &mut *sampler,
                    schedule,
                    &mut writer,
                    &mut *state,
                    &Flat,
                    &mut NoProgress,
                    &mut continue_always,
                );
                if result.is_err() {
                    break;
                }
            }
        }
        (Outputs { samples, diagnostics }, result)
    }

    #[test]
    fn thinned_sampling_records_only_post_warmup_draws() {
        let mut sampler = Counter::new();
        let mut state = Sample::new(array![0.0], 0.0, 0.0);
        let schedules = [Schedule::warmup(100, 50, 5, 0, false), Schedule::sampling(100, 50, 5, 0)];

        let (out, result) = run(&mut sampler, &schedules, &mut state);

        assert_eq!(result.unwrap(), RunOutcome::Completed);
        assert_eq!(sampler.calls, 150);
        let rows: Vec<&[f64]> = out.samples.values().collect();
        assert_eq!(rows.len(), 10);
        // The last column is the position, i.e. the zero-based iteration index.
        let iterations: Vec<f64> = rows.iter().map(|r| r[r.len() - 1]).collect();
        let expected: Vec<f64> = (0..10).map(|k| (100 + 5 * k) as f64).collect();
        assert_eq!(iterations, expected);
        assert_eq!(out.diagnostics.values().count(), 20 + 10);
    }

    #[test]
    fn saved_warmup_goes_to_sample_writer() {
        let mut sampler = Counter::new();
        let mut state = Sample::new(array![0.0], 0.0, 0.0);
        let schedules = [Schedule::warmup(10, 10, 3, 0, true), Schedule::sampling(10, 10, 3, 0)];

        let (out, result) = run(&mut sampler, &schedules, &mut state);

        assert!(result.is_ok());
        // Warm-up m = 0, 3, 6, 9 and sampling m = 0, 3, 6, 9.
        assert_eq!(out.samples.values().count(), 8);
        assert_eq!(out.diagnostics.values().count(), 8);
    }

    #[test]
    fn sampler_error_aborts_and_keeps_earlier_records() {
        let mut sampler = Counter {
            calls: 0,
            fail_at: Some(5),
        };
        let mut state = Sample::new(array![0.0], 0.0, 0.0);
        let (out, result) = run(&mut sampler, &[Schedule::sampling(0, 20, 1, 0)], &mut state);

        assert!(matches!(result, Err(Error::Model(_))));
        assert_eq!(out.samples.values().count(), 5);
        assert_eq!(state.cont_params, array![4.0]);
    }

    /// Accepts `capacity` rows, then fails like a full disk.
    struct FullDisk {
        rows: usize,
        capacity: usize,
    }

    impl Writer for FullDisk {
        fn write_names(&mut self, _names: &[String]) -> Result<()> {
            Ok(())
        }

        fn write_values(&mut self, _values: &[f64]) -> Result<()> {
            if self.rows == self.capacity {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "no space left on device",
                )));
            }
            self.rows += 1;
            Ok(())
        }

        fn write_message(&mut self, _message: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writer_error_aborts_and_keeps_earlier_records() {
        let mut sampler = Counter::new();
        let mut state = Sample::new(array![0.0], 0.0, 0.0);
        let mut samples = FullDisk { rows: 0, capacity: 4 };
        let mut diagnostics = MemoryWriter::default();
        let (mut messages, mut errors) = (NoopWriter, NoopWriter);
        let result = {
            let mut writer = McmcWriter::new(&mut samples, &mut diagnostics, &mut messages, &mut errors);
            generate_transitions(
                &mut sampler,
                &Schedule::sampling(0, 20, 1, 0),
                &mut writer,
                &mut state,
                &Flat,
                &mut NoProgress,
                &mut continue_always,
            )
        };

        assert!(matches!(result, Err(Error::Io(_))));
        assert_eq!(sampler.calls, 5);
        assert_eq!(samples.rows, 4);
        let positions: Vec<f64> = diagnostics.values().map(|r| r[r.len() - 1]).collect();
        assert_eq!(positions, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn zero_thinning_is_rejected() {
        let mut sampler = Counter::new();
        let mut state = Sample::new(array![0.0], 0.0, 0.0);
        let (_, result) = run(&mut sampler, &[Schedule::sampling(0, 5, 0, 0)], &mut state);
        assert!(matches!(result, Err(Error::Config(_))));
        assert_eq!(sampler.calls, 0);
    }

    #[test]
    fn interrupt_stops_at_iteration_boundary() {
        let mut sampler = Counter::new();
        let mut state = Sample::new(array![0.0], 0.0, 0.0);
        let (mut samples, mut diagnostics) = (MemoryWriter::default(), MemoryWriter::default());
        let (mut messages, mut errors) = (NoopWriter, NoopWriter);
        let mut writer = McmcWriter::new(&mut samples, &mut diagnostics, &mut messages, &mut errors);
        let mut polls = 0;
        let mut interrupt = || {
            polls += 1;
            if polls > 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };

        let outcome = generate_transitions(
            &mut sampler,
            &Schedule::sampling(10, 10, 1, 0),
            &mut writer,
            &mut state,
            &Flat,
            &mut NoProgress,
            &mut interrupt,
        )
        .unwrap();

        assert_eq!(outcome, RunOutcome::Interrupted { iteration: 13 });
        assert_eq!(sampler.calls, 3);
    }

    #[test]
    fn progress_lines_follow_refresh() {
        let mut sampler = Counter::new();
        let mut state = Sample::new(array![0.0], 0.0, 0.0);
        let mut lines = MemoryWriter::default();
        {
            let mut progress = WriterProgress::new(&mut lines);
            let (mut samples, mut diagnostics, mut messages, mut errors) =
                (NoopWriter, NoopWriter, NoopWriter, NoopWriter);
            let mut writer = McmcWriter::new(&mut samples, &mut diagnostics, &mut messages, &mut errors);
            generate_transitions(
                &mut sampler,
                &Schedule::warmup(20, 0, 1, 10, false),
                &mut writer,
                &mut state,
                &Flat,
                &mut progress,
                &mut continue_always,
            )
            .unwrap();
        }
        let messages: Vec<&str> = lines.messages().collect();
        assert_eq!(
            messages,
            vec![
                "Iteration:  1 / 20 [  5%]  (Warmup)",
                "Iteration: 10 / 20 [ 50%]  (Warmup)",
                "Iteration: 20 / 20 [100%]  (Warmup)",
            ]
        );
    }

    #[test]
    fn non_positive_refresh_disables_progress() {
        let schedule = Schedule::sampling(0, 100, 1, 0);
        assert!((0..100).all(|m| !schedule.reports_at(m)));
        let schedule = Schedule::sampling(0, 100, 1, -5);
        assert!(!schedule.reports_at(0));
    }

    #[test]
    fn phase_names() {
        assert_eq!(Phase::Warmup.to_string(), "Warmup");
        assert_eq!(Phase::Sampling.to_string(), "Sampling");
    }
}
