//! The sampler seam used by the transition generator.

use crate::error::Result;
use crate::writer::Writer;
use ndarray::Array1;

/// State handed between transitions: the unconstrained position, its log density
/// and the acceptance statistic of the transition that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub cont_params: Array1<f64>,
    pub log_prob: f64,
    pub accept_stat: f64,
}

impl Sample {
    pub fn new(cont_params: Array1<f64>, log_prob: f64, accept_stat: f64) -> Self {
        Self {
            cont_params,
            log_prob,
            accept_stat,
        }
    }

    /// Names of the per-sample columns.
    pub fn param_names() -> Vec<String> {
        vec!["lp__".to_string(), "accept_stat__".to_string()]
    }

    /// Values of the per-sample columns.
    pub fn values(&self) -> Vec<f64> {
        vec![self.log_prob, self.accept_stat]
    }
}

/// A Markov transition kernel.
///
/// [`Sampler::transition`] moves the chain one step from `init`. Recoverable
/// numerical problems (a proposal outside the support, a non-finite energy) must be
/// handled inside the transition by rejecting the proposal; an `Err` aborts the run.
pub trait Sampler {
    fn transition(
        &mut self,
        init: &Sample,
        writer: &mut dyn Writer,
        error_writer: &mut dyn Writer,
    ) -> Result<Sample>;

    /// Names of the tunable/diagnostic scalars appended to every sample row.
    fn sampler_param_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Values matching [`Sampler::sampler_param_names`] for the last transition.
    fn sampler_params(&self) -> Vec<f64> {
        Vec::new()
    }

    /// Names of the extra diagnostic columns for the given model parameters.
    fn diagnostic_names(&self, _param_names: &[String]) -> Vec<String> {
        Vec::new()
    }

    /// Values matching [`Sampler::diagnostic_names`] for the last transition.
    fn diagnostic_values(&self) -> Vec<f64> {
        Vec::new()
    }

    /// Positions the sampler at `init` before the first transition of a run and
    /// performs any start-up tuning that needs the model.
    fn prepare(
        &mut self,
        _init: &Sample,
        _writer: &mut dyn Writer,
        _error_writer: &mut dyn Writer,
    ) -> Result<()> {
        Ok(())
    }

    /// Turns warm-up adaptation on.
    fn engage_adaptation(&mut self) {}

    /// Freezes adapted parameters for production sampling.
    fn disengage_adaptation(&mut self) {}

    /// Lines describing the adapted parameters.
    fn adaptation_summary(&self) -> Vec<String> {
        Vec::new()
    }
}

impl<S: Sampler + ?Sized> Sampler for Box<S> {
    fn transition(
        &mut self,
        init: &Sample,
        writer: &mut dyn Writer,
        error_writer: &mut dyn Writer,
    ) -> Result<Sample> {
        (**self).transition(init, writer, error_writer)
    }

    fn sampler_param_names(&self) -> Vec<String> {
        (**self).sampler_param_names()
    }

    fn sampler_params(&self) -> Vec<f64> {
        (**self).sampler_params()
    }

    fn diagnostic_names(&self, param_names: &[String]) -> Vec<String> {
        (**self).diagnostic_names(param_names)
    }

    fn diagnostic_values(&self) -> Vec<f64> {
        (**self).diagnostic_values()
    }

    fn prepare(
        &mut self,
        init: &Sample,
        writer: &mut dyn Writer,
        error_writer: &mut dyn Writer,
    ) -> Result<()> {
        (**self).prepare(init, writer, error_writer)
    }

    fn engage_adaptation(&mut self) {
        (**self).engage_adaptation()
    }

    fn disengage_adaptation(&mut self) {
        (**self).disengage_adaptation()
    }

    fn adaptation_summary(&self) -> Vec<String> {
        (**self).adaptation_summary()
    }
}
