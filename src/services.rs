//! Entry points that drive a full run: initialization, warm-up and sampling.
//!
//! Nothing here returns draws. Every record flows through the writers bundled in
//! an [`McmcWriter`].

use crate::config::SampleConfig;
use crate::error::{Error, Result};
use crate::model::Model;
use crate::sampler::{Sample, Sampler};
use crate::transitions::{generate_transitions, ProgressReporter, RunOutcome, Schedule};
use crate::writer::{McmcWriter, Writer};
use ndarray::Array1;
use std::ops::ControlFlow;
use std::time::Instant;

/// Evaluates `model` at `q0` and returns the initial chain state.
///
/// Fails with [`Error::Initialization`] if `q0` has the wrong length, the model
/// cannot be evaluated, or the log density or its gradient is not finite.
pub fn initialize<M: Model + ?Sized>(model: &M, q0: &[f64], message: &mut dyn Writer) -> Result<Sample> {
    if q0.len() != model.num_params() {
        return Err(Error::Initialization(format!(
            "initial position has {} values, model has {} parameters",
            q0.len(),
            model.num_params()
        )));
    }

    let mut grad = vec![0.0; q0.len()];
    let mut msgs: Vec<u8> = Vec::new();
    let result = model.log_prob_grad(q0, &mut grad, &mut msgs);
    if !msgs.is_empty() {
        message.write_message(String::from_utf8_lossy(&msgs).trim_end())?;
    }

    let log_prob = result.map_err(|e| Error::Initialization(format!("model failed at the initial position: {e}")))?;
    if !log_prob.is_finite() {
        return Err(Error::Initialization(format!(
            "log density at the initial position is {log_prob}"
        )));
    }
    if let Some(i) = grad.iter().position(|g| !g.is_finite()) {
        return Err(Error::Initialization(format!(
            "gradient at the initial position is not finite for parameter {i}"
        )));
    }

    Ok(Sample::new(Array1::from(q0.to_vec()), log_prob, 0.0))
}

/// Runs the warm-up phase, `[0, num_warmup)`.
pub fn warmup<S: Sampler + ?Sized, M: Model + ?Sized>(
    sampler: &mut S,
    model: &M,
    config: &SampleConfig,
    writer: &mut McmcWriter<'_>,
    init_s: &mut Sample,
    progress: &mut dyn ProgressReporter,
    interrupt: &mut dyn FnMut() -> ControlFlow<()>,
) -> Result<RunOutcome> {
    let schedule = Schedule::warmup(
        config.num_warmup,
        config.num_samples,
        config.num_thin,
        config.refresh,
        config.save_warmup,
    );
    generate_transitions(sampler, &schedule, writer, init_s, model, progress, interrupt)
}

/// Runs the sampling phase, `[num_warmup, num_warmup + num_samples)`.
pub fn sample<S: Sampler + ?Sized, M: Model + ?Sized>(
    sampler: &mut S,
    model: &M,
    config: &SampleConfig,
    writer: &mut McmcWriter<'_>,
    init_s: &mut Sample,
    progress: &mut dyn ProgressReporter,
    interrupt: &mut dyn FnMut() -> ControlFlow<()>,
) -> Result<RunOutcome> {
    let schedule = Schedule::sampling(
        config.num_warmup,
        config.num_samples,
        config.num_thin,
        config.refresh,
    );
    generate_transitions(sampler, &schedule, writer, init_s, model, progress, interrupt)
}

/// Runs one chain from `q0`: headers, adaptive warm-up, the adaptation summary,
/// sampling with frozen tuning parameters and the elapsed times.
///
/// An interrupt ends the run after the current iteration; the adaptation summary
/// and timing are only written for phases that completed.
pub fn run_adaptive_sampler<S: Sampler + ?Sized, M: Model + ?Sized>(
    sampler: &mut S,
    model: &M,
    q0: &[f64],
    config: &SampleConfig,
    writer: &mut McmcWriter<'_>,
    progress: &mut dyn ProgressReporter,
    interrupt: &mut dyn FnMut() -> ControlFlow<()>,
) -> Result<RunOutcome> {
    config.validate()?;
    let mut state = initialize(model, q0, &mut *writer.message)?;

    writer.write_sample_names(&*sampler, model)?;
    writer.write_diagnostic_names(&*sampler, model)?;

    sampler.engage_adaptation();
    sampler.prepare(&state, &mut *writer.message, &mut *writer.error)?;

    log::info!("warm-up: {} iterations", config.num_warmup);
    let warmup_start = Instant::now();
    let outcome = warmup(&mut *sampler, model, config, writer, &mut state, progress, interrupt)?;
    let warmup_time = warmup_start.elapsed();
    if outcome != RunOutcome::Completed {
        progress.finish();
        return Ok(outcome);
    }

    sampler.disengage_adaptation();
    writer.write_adapt_finish(&*sampler)?;

    log::info!("sampling: {} iterations", config.num_samples);
    let sampling_start = Instant::now();
    let outcome = sample(&mut *sampler, model, config, writer, &mut state, progress, interrupt)?;
    let sampling_time = sampling_start.elapsed();
    progress.finish();

    if outcome == RunOutcome::Completed {
        writer.write_timing(warmup_time, sampling_time)?;
    }
    Ok(outcome)
}
