//! Static Hamiltonian Monte Carlo with optional warm-up adaptation.
//!
//! Each transition resamples the momentum, integrates Hamilton's equations with
//! the leapfrog integrator for a fixed integration time and applies a Metropolis
//! accept/reject step on the total energy. During warm-up the step size is tuned by
//! dual averaging and, for a diagonal metric, the inverse mass matrix is estimated
//! over expanding windows.
//!
//! The target density is supplied through the [`Model`] trait, which returns the
//! unnormalized log density together with its gradient.

use crate::adaptation::{StepsizeAdaptation, VarAdaptation, WindowedAdaptation};
use crate::config::{HmcConfig, MetricKind};
use crate::error::{Error, Result};
use crate::hamiltonian::{Hamiltonian, Metric, PhasePoint};
use crate::integrator::Leapfrog;
use crate::model::Model;
use crate::sampler::{Sample, Sampler};
use crate::writer::Writer;
use ndarray::Array1;
use rand::distributions::Open01;
use rand::rngs::SmallRng;
use rand::{thread_rng, Rng, SeedableRng};

/// Energy error above which a trajectory is flagged as divergent.
const MAX_DELTA_H: f64 = 1000.0;

#[derive(Debug, Clone)]
struct Adapter {
    stepsize: StepsizeAdaptation,
    variance: Option<VarAdaptation>,
}

/// A static-trajectory HMC sampler for a single chain.
///
/// # Type Parameters
///
/// * `M`: The model providing the log density and its gradient.
#[derive(Debug, Clone)]
pub struct StaticHmc<'m, M: Model + ?Sized> {
    hamiltonian: Hamiltonian<'m, M>,
    integrator: Leapfrog,
    /// Current phase-space point of the chain.
    z: PhasePoint,
    /// Random number generator for momenta, jitter and the acceptance test.
    rng: SmallRng,
    /// Step size before jitter.
    nom_epsilon: f64,
    /// Step size used by the last transition.
    epsilon: f64,
    epsilon_jitter: f64,
    /// Integration time of one trajectory.
    int_time: f64,
    n_leapfrog: usize,
    divergent: bool,
    energy: f64,
    adapter: Option<Adapter>,
    adapt_flag: bool,
}

fn leapfrog_steps(int_time: f64, epsilon: f64) -> usize {
    ((int_time / epsilon) as usize).max(1)
}

impl<'m, M: Model + ?Sized> StaticHmc<'m, M> {
    /// Create a new static HMC sampler without adaptation.
    ///
    /// # Parameters
    ///
    /// * `model`: The target density.
    /// * `metric`: The Euclidean metric (unit or diagonal inverse mass matrix).
    /// * `step_size`: The leapfrog step size.
    /// * `int_time`: The integration time; the sampler takes `max(1, ⌊int_time / step_size⌋)`
    ///   leapfrog steps per transition.
    ///
    /// The random number generator is seeded from the thread RNG; call [`StaticHmc::set_seed`]
    /// for reproducible runs.
    pub fn new(model: &'m M, metric: Metric, step_size: f64, int_time: f64) -> Self {
        let dim = model.num_params();
        Self {
            hamiltonian: Hamiltonian::new(model, metric),
            integrator: Leapfrog,
            z: PhasePoint::new(dim),
            rng: SmallRng::seed_from_u64(thread_rng().gen::<u64>()),
            nom_epsilon: step_size,
            epsilon: step_size,
            epsilon_jitter: 0.0,
            int_time,
            n_leapfrog: leapfrog_steps(int_time, step_size),
            divergent: false,
            energy: 0.0,
            adapter: None,
            adapt_flag: false,
        }
    }

    /// Build a sampler from `config`, sizing the adaptation windows for `num_warmup`
    /// warm-up iterations.
    pub fn from_config(model: &'m M, config: &HmcConfig, num_warmup: usize) -> Result<Self> {
        config.validate()?;
        let dim = model.num_params();
        let metric = match config.metric {
            MetricKind::Unit => Metric::Unit,
            MetricKind::Diag => Metric::Diag(Array1::ones(dim)),
        };
        let mut sampler = Self::new(model, metric, config.step_size, config.int_time)
            .set_step_size_jitter(config.step_size_jitter);
        if let Some(seed) = config.seed {
            sampler = sampler.set_seed(seed);
        }
        if config.adapt.engaged {
            let windows = WindowedAdaptation::from_config(num_warmup, &config.adapt);
            sampler = sampler.with_adaptation(StepsizeAdaptation::from_config(&config.adapt), windows);
        }
        Ok(sampler)
    }

    /// Sets a new random seed.
    ///
    /// This method ensures reproducibility across runs.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    /// Sets the relative step size jitter in `[0, 1]`.
    pub fn set_step_size_jitter(mut self, jitter: f64) -> Self {
        self.epsilon_jitter = jitter;
        self
    }

    /// Attaches warm-up adaptation. The variance windows are only used with a
    /// diagonal metric.
    pub fn with_adaptation(mut self, mut stepsize: StepsizeAdaptation, windows: WindowedAdaptation) -> Self {
        stepsize.set_mu((10.0 * self.nom_epsilon).ln());
        let variance = match self.hamiltonian.metric() {
            Metric::Diag(_) => Some(VarAdaptation::new(self.z.dim(), windows)),
            Metric::Unit => None,
        };
        self.adapter = Some(Adapter { stepsize, variance });
        self
    }

    pub fn set_nominal_stepsize_and_t(&mut self, epsilon: f64, int_time: f64) {
        if epsilon > 0.0 && int_time > 0.0 {
            self.nom_epsilon = epsilon;
            self.int_time = int_time;
            self.n_leapfrog = leapfrog_steps(int_time, epsilon);
        }
    }

    pub fn nominal_stepsize(&self) -> f64 {
        self.nom_epsilon
    }

    pub fn current_stepsize(&self) -> f64 {
        self.epsilon
    }

    pub fn int_time(&self) -> f64 {
        self.int_time
    }

    pub fn n_leapfrog(&self) -> usize {
        self.n_leapfrog
    }

    pub fn metric(&self) -> &Metric {
        self.hamiltonian.metric()
    }

    pub fn hamiltonian(&self) -> &Hamiltonian<'m, M> {
        &self.hamiltonian
    }

    /// The chain's current phase-space point.
    pub fn z(&self) -> &PhasePoint {
        &self.z
    }

    pub fn adapting(&self) -> bool {
        self.adapt_flag
    }

    fn sample_stepsize(&mut self) {
        self.epsilon = self.nom_epsilon;
        if self.epsilon_jitter > 0.0 {
            let u: f64 = self.rng.gen();
            self.epsilon *= 1.0 + self.epsilon_jitter * (2.0 * u - 1.0);
        }
    }

    fn seed_point(&mut self, q: &Array1<f64>) {
        if self.z.dim() == q.len() {
            self.z.q.assign(q);
        } else {
            self.z = PhasePoint::from_position(q.clone());
        }
    }

    /// Resamples the momentum, takes one leapfrog step of the nominal size and
    /// returns the energy change `H₀ − H`.
    fn one_step_delta_h(&mut self, writer: &mut dyn Writer, error_writer: &mut dyn Writer) -> Result<f64> {
        self.hamiltonian.sample_p(&mut self.z, &mut self.rng);
        self.hamiltonian.init(&mut self.z, writer, error_writer)?;
        let h0 = self.hamiltonian.energy(&self.z);
        self.integrator
            .evolve(&mut self.z, &self.hamiltonian, self.nom_epsilon, writer, error_writer)?;
        let h = self.hamiltonian.energy(&self.z);
        let h = if h.is_nan() { f64::INFINITY } else { h };
        Ok(h0 - h)
    }

    /// Heuristic initial step size: doubles or halves the nominal step size until
    /// the acceptance probability of a single leapfrog step crosses 0.8.
    ///
    /// The position of the chain is left unchanged.
    pub fn init_stepsize(&mut self, writer: &mut dyn Writer, error_writer: &mut dyn Writer) -> Result<()> {
        if self.nom_epsilon == 0.0 || self.nom_epsilon > 1e7 || self.nom_epsilon.is_nan() {
            return Ok(());
        }
        let z_init = self.z.clone();
        let log_target = 0.8_f64.ln();

        let delta_h = self.one_step_delta_h(writer, error_writer)?;
        let increase = delta_h > log_target;

        loop {
            self.z.assign(&z_init);
            let delta_h = self.one_step_delta_h(writer, error_writer)?;

            if increase && !(delta_h > log_target) {
                break;
            }
            if !increase && !(delta_h < log_target) {
                break;
            }
            if increase {
                self.nom_epsilon *= 2.0;
            } else {
                self.nom_epsilon *= 0.5;
            }

            if self.nom_epsilon > 1e7 {
                return Err(Error::Adaptation(
                    "Posterior is improper. Please check your model.".to_string(),
                ));
            }
            if self.nom_epsilon == 0.0 {
                return Err(Error::Adaptation(
                    "No acceptably small step size could be found. Perhaps the posterior is not continuous?"
                        .to_string(),
                ));
            }
        }

        self.z.assign(&z_init);
        self.n_leapfrog = leapfrog_steps(self.int_time, self.nom_epsilon);
        log::debug!("initial step size {}", self.nom_epsilon);
        Ok(())
    }

    /// Feeds the adaptation with the last transition.
    fn adapt(&mut self, accept_stat: f64, writer: &mut dyn Writer, error_writer: &mut dyn Writer) -> Result<()> {
        let Some(adapter) = self.adapter.as_mut() else {
            return Ok(());
        };
        self.nom_epsilon = adapter.stepsize.learn_stepsize(accept_stat);
        self.n_leapfrog = leapfrog_steps(self.int_time, self.nom_epsilon);

        let metric_updated = match adapter.variance.as_mut() {
            Some(variance) => {
                let mut inv_mass = match self.hamiltonian.metric() {
                    Metric::Diag(inv_mass) => inv_mass.clone(),
                    Metric::Unit => Array1::ones(self.z.dim()),
                };
                let updated = variance.learn_variance(&mut inv_mass, &self.z.q);
                if updated {
                    self.hamiltonian.set_metric(Metric::Diag(inv_mass));
                }
                updated
            }
            None => false,
        };

        if metric_updated {
            self.init_stepsize(writer, error_writer)?;
            if let Some(adapter) = self.adapter.as_mut() {
                adapter.stepsize.set_mu((10.0 * self.nom_epsilon).ln());
                adapter.stepsize.restart();
            }
            log::debug!(
                "metric window closed; step size reset to {}",
                self.nom_epsilon
            );
        }
        Ok(())
    }

    /// Perform one HMC transition starting from `init`.
    ///
    /// The update consists of:
    /// 1) Sampling a momentum from the metric.
    /// 2) Running `n_leapfrog` leapfrog steps; a failed density evaluation ends the
    ///    trajectory with infinite energy.
    /// 3) Accepting the end point with probability `min(1, exp(H₀ − H))`.
    fn hmc_transition(
        &mut self,
        init: &Sample,
        writer: &mut dyn Writer,
        error_writer: &mut dyn Writer,
    ) -> Result<Sample> {
        self.sample_stepsize();
        self.seed_point(&init.cont_params);

        self.hamiltonian.sample_p(&mut self.z, &mut self.rng);
        self.hamiltonian.init(&mut self.z, writer, error_writer)?;

        let z_init = self.z.clone();
        let h0 = self.hamiltonian.energy(&self.z);

        for _ in 0..self.n_leapfrog {
            let ok = self
                .integrator
                .evolve(&mut self.z, &self.hamiltonian, self.epsilon, writer, error_writer)?;
            if !ok {
                break;
            }
        }

        let mut h = self.hamiltonian.energy(&self.z);
        if h.is_nan() || !self.z.v.is_finite() {
            h = f64::INFINITY;
        }
        self.divergent = h - h0 > MAX_DELTA_H || h.is_infinite();

        let mut accept_prob = (h0 - h).exp();
        if accept_prob.is_nan() {
            accept_prob = 0.0;
        }
        let u: f64 = self.rng.sample(Open01);
        if accept_prob < u {
            self.z.assign(&z_init);
        }
        let accept_stat = accept_prob.min(1.0);
        self.energy = self.hamiltonian.energy(&self.z);

        Ok(Sample::new(self.z.q.clone(), -self.z.v, accept_stat))
    }
}

impl<'m, M: Model + ?Sized> Sampler for StaticHmc<'m, M> {
    fn transition(
        &mut self,
        init: &Sample,
        writer: &mut dyn Writer,
        error_writer: &mut dyn Writer,
    ) -> Result<Sample> {
        let sample = self.hmc_transition(init, writer, error_writer)?;
        if self.adapt_flag {
            self.adapt(sample.accept_stat, writer, error_writer)?;
        }
        Ok(sample)
    }

    fn sampler_param_names(&self) -> Vec<String> {
        ["stepsize__", "int_time__", "n_leapfrog__", "divergent__", "energy__"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn sampler_params(&self) -> Vec<f64> {
        vec![
            self.epsilon,
            self.int_time,
            self.n_leapfrog as f64,
            if self.divergent { 1.0 } else { 0.0 },
            self.energy,
        ]
    }

    fn diagnostic_names(&self, param_names: &[String]) -> Vec<String> {
        let momenta = param_names.iter().map(|n| format!("p_{n}"));
        let gradients = param_names.iter().map(|n| format!("g_{n}"));
        momenta.chain(gradients).collect()
    }

    fn diagnostic_values(&self) -> Vec<f64> {
        self.z.p.iter().chain(self.z.g.iter()).copied().collect()
    }

    fn prepare(
        &mut self,
        init: &Sample,
        writer: &mut dyn Writer,
        error_writer: &mut dyn Writer,
    ) -> Result<()> {
        self.seed_point(&init.cont_params);
        if self.adapt_flag {
            self.init_stepsize(writer, error_writer)?;
            if let Some(adapter) = self.adapter.as_mut() {
                adapter.stepsize.set_mu((10.0 * self.nom_epsilon).ln());
                adapter.stepsize.restart();
            }
        }
        Ok(())
    }

    fn engage_adaptation(&mut self) {
        self.adapt_flag = self.adapter.is_some();
    }

    fn disengage_adaptation(&mut self) {
        if self.adapt_flag {
            // Without any warm-up transition the averaged step size is meaningless.
            if let Some(adapter) = self.adapter.as_ref().filter(|a| a.stepsize.has_learned()) {
                self.nom_epsilon = adapter.stepsize.complete_adaptation();
                self.n_leapfrog = leapfrog_steps(self.int_time, self.nom_epsilon);
            }
        }
        self.adapt_flag = false;
    }

    fn adaptation_summary(&self) -> Vec<String> {
        let mut lines = vec![format!("Step size = {}", self.nom_epsilon)];
        if let Metric::Diag(inv_mass) = self.hamiltonian.metric() {
            lines.push("Diagonal elements of inverse mass matrix:".to_string());
            let values: Vec<String> = inv_mass.iter().map(|v| v.to_string()).collect();
            lines.push(values.join(", "));
        }
        lines
    }
}
