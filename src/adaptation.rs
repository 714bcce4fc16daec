//! Warm-up adaptation: dual-averaging step size and windowed estimation of a
//! diagonal inverse mass matrix.
//!
//! The window schedule is the usual three-stage one:
//! ```text
//! num_warmup = 1000 (defaults):
//!   iters    0..75    init buffer   (step size only)
//!   iters   75..100   window 1      (step size + variance, metric updated at end)
//!   iters  100..150   window 2      (doubled)
//!   iters  150..250   window 3
//!   iters  250..450   window 4
//!   iters  450..950   window 5      (stretched to the term buffer)
//!   iters  950..1000  term buffer   (step size only)
//! ```

use crate::config::AdaptConfig;
use ndarray::Array1;

/// Nesterov dual averaging of `log ε` towards a target acceptance statistic.
#[derive(Debug, Clone, PartialEq)]
pub struct StepsizeAdaptation {
    counter: f64,
    s_bar: f64,
    x_bar: f64,
    mu: f64,
    delta: f64,
    gamma: f64,
    kappa: f64,
    t0: f64,
}

impl StepsizeAdaptation {
    pub fn new(delta: f64, gamma: f64, kappa: f64, t0: f64) -> Self {
        Self {
            counter: 0.0,
            s_bar: 0.0,
            x_bar: 0.0,
            mu: 0.5,
            delta,
            gamma,
            kappa,
            t0,
        }
    }

    pub fn from_config(config: &AdaptConfig) -> Self {
        Self::new(config.delta, config.gamma, config.kappa, config.t0)
    }

    /// Sets the shrinkage target, conventionally `ln(10 ε₀)`.
    pub fn set_mu(&mut self, mu: f64) {
        self.mu = mu;
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub fn restart(&mut self) {
        self.counter = 0.0;
        self.s_bar = 0.0;
        self.x_bar = 0.0;
    }

    /// Updates the running statistics with one acceptance statistic and returns the
    /// next step size to try.
    pub fn learn_stepsize(&mut self, adapt_stat: f64) -> f64 {
        self.counter += 1.0;
        let adapt_stat = adapt_stat.min(1.0);

        let eta = 1.0 / (self.counter + self.t0);
        self.s_bar = (1.0 - eta) * self.s_bar + eta * (self.delta - adapt_stat);

        let x = self.mu - self.s_bar * self.counter.sqrt() / self.gamma;
        let x_eta = self.counter.powf(-self.kappa);
        self.x_bar = (1.0 - x_eta) * self.x_bar + x_eta * x;

        x.exp()
    }

    /// Whether any acceptance statistic was learned since the last restart.
    pub fn has_learned(&self) -> bool {
        self.counter > 0.0
    }

    /// The averaged step size used once adaptation ends.
    pub fn complete_adaptation(&self) -> f64 {
        self.x_bar.exp()
    }
}

/// Online mean/variance accumulator (Welford).
#[derive(Debug, Clone, PartialEq)]
pub struct WelfordVariance {
    num_samples: usize,
    mean: Array1<f64>,
    m2: Array1<f64>,
}

impl WelfordVariance {
    pub fn new(dim: usize) -> Self {
        Self {
            num_samples: 0,
            mean: Array1::zeros(dim),
            m2: Array1::zeros(dim),
        }
    }

    pub fn restart(&mut self) {
        self.num_samples = 0;
        self.mean.fill(0.0);
        self.m2.fill(0.0);
    }

    pub fn add_sample(&mut self, q: &Array1<f64>) {
        self.num_samples += 1;
        let n = self.num_samples as f64;
        let delta = q - &self.mean;
        self.mean.scaled_add(1.0 / n, &delta);
        let delta2 = q - &self.mean;
        self.m2 += &(&delta * &delta2);
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn sample_mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Unbiased sample variance; zeros until two samples have been seen.
    pub fn sample_variance(&self) -> Array1<f64> {
        if self.num_samples > 1 {
            &self.m2 / (self.num_samples as f64 - 1.0)
        } else {
            Array1::zeros(self.m2.len())
        }
    }
}

/// Slow-adaptation window bookkeeping for a warm-up of fixed length.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedAdaptation {
    num_warmup: usize,
    init_buffer: usize,
    term_buffer: usize,
    base_window: usize,
    window_counter: usize,
    window_size: usize,
    next_window: usize,
    enabled: bool,
}

impl WindowedAdaptation {
    /// Builds the schedule, shrinking the buffers when `num_warmup` is too short for
    /// the requested ones and disabling window updates below 20 iterations.
    pub fn new(num_warmup: usize, init_buffer: usize, term_buffer: usize, base_window: usize) -> Self {
        let mut windows = Self {
            num_warmup,
            init_buffer,
            term_buffer,
            base_window,
            window_counter: 0,
            window_size: base_window,
            next_window: 0,
            enabled: true,
        };
        windows.set_window_params();
        windows.restart();
        windows
    }

    pub fn from_config(num_warmup: usize, config: &AdaptConfig) -> Self {
        Self::new(
            num_warmup,
            config.init_buffer,
            config.term_buffer,
            config.base_window,
        )
    }

    fn set_window_params(&mut self) {
        if self.num_warmup < 20 {
            log::warn!(
                "no metric adaptation will be performed: {} warm-up iterations are fewer than 20",
                self.num_warmup
            );
            self.enabled = false;
            return;
        }

        if self.init_buffer + self.base_window + self.term_buffer > self.num_warmup {
            let warmup = self.num_warmup as f64;
            self.init_buffer = (0.15 * warmup) as usize;
            self.term_buffer = (0.1 * warmup) as usize;
            self.base_window = self.num_warmup - (self.init_buffer + self.term_buffer);
            log::warn!(
                "{} warm-up iterations are too few for the requested adaptation buffers; \
                 using init_buffer = {}, base_window = {}, term_buffer = {}",
                self.num_warmup,
                self.init_buffer,
                self.base_window,
                self.term_buffer
            );
        }
    }

    pub fn restart(&mut self) {
        self.window_counter = 0;
        self.window_size = self.base_window;
        self.next_window = self.init_buffer + self.window_size - 1;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn init_buffer(&self) -> usize {
        self.init_buffer
    }

    pub fn term_buffer(&self) -> usize {
        self.term_buffer
    }

    pub fn base_window(&self) -> usize {
        self.base_window
    }

    /// Whether the current iteration falls inside a slow window.
    pub fn adaptation_window(&self) -> bool {
        self.enabled
            && self.window_counter >= self.init_buffer
            && self.window_counter < self.num_warmup - self.term_buffer
            && self.window_counter != self.num_warmup
    }

    /// Whether the current iteration closes a slow window.
    pub fn end_adaptation_window(&self) -> bool {
        self.enabled && self.window_counter == self.next_window && self.window_counter != self.num_warmup
    }

    fn last_window_end(&self) -> usize {
        self.num_warmup - self.term_buffer - 1
    }

    /// Doubles the window, stretching it to the term buffer when the following
    /// window would not fit.
    pub fn compute_next_window(&mut self) {
        if self.next_window == self.last_window_end() {
            return;
        }
        self.window_size *= 2;
        self.next_window = self.window_counter + self.window_size;

        if self.next_window != self.last_window_end() {
            let next_boundary = self.next_window + 2 * self.window_size;
            if next_boundary >= self.num_warmup - self.term_buffer {
                self.next_window = self.last_window_end();
            }
        }
    }

    pub fn advance(&mut self) {
        self.window_counter += 1;
    }

    pub fn window_counter(&self) -> usize {
        self.window_counter
    }
}

/// Estimates a diagonal inverse mass matrix from warm-up draws.
#[derive(Debug, Clone, PartialEq)]
pub struct VarAdaptation {
    windows: WindowedAdaptation,
    estimator: WelfordVariance,
}

impl VarAdaptation {
    pub fn new(dim: usize, windows: WindowedAdaptation) -> Self {
        Self {
            windows,
            estimator: WelfordVariance::new(dim),
        }
    }

    pub fn windows(&self) -> &WindowedAdaptation {
        &self.windows
    }

    pub fn restart(&mut self) {
        self.windows.restart();
        self.estimator.restart();
    }

    /// Feeds one draw. At the end of a window, overwrites `inv_mass` with the
    /// regularized variance estimate and returns `true`.
    pub fn learn_variance(&mut self, inv_mass: &mut Array1<f64>, q: &Array1<f64>) -> bool {
        if self.windows.adaptation_window() {
            self.estimator.add_sample(q);
        }

        if self.windows.end_adaptation_window() {
            self.windows.compute_next_window();

            let n = self.estimator.num_samples() as f64;
            let var = self.estimator.sample_variance();
            let shrunk = var.mapv(|v| (n / (n + 5.0)) * v + 1e-3 * (5.0 / (n + 5.0)));
            inv_mass.assign(&shrunk);

            self.estimator.restart();
            self.windows.advance();
            return true;
        }

        self.windows.advance();
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn dual_averaging_shrinks_step_size_when_acceptance_is_low() {
        let mut adapt = StepsizeAdaptation::new(0.8, 0.05, 0.75, 10.0);
        adapt.set_mu((10.0_f64).ln());
        let mut eps = 1.0;
        for _ in 0..50 {
            eps = adapt.learn_stepsize(0.1);
        }
        assert!(eps < 1.0, "expected a smaller step size, got {eps}");
        assert!(adapt.complete_adaptation() < 10.0);
    }

    #[test]
    fn dual_averaging_first_step_matches_formula() {
        let mut adapt = StepsizeAdaptation::new(0.8, 0.05, 0.75, 10.0);
        adapt.set_mu(0.0);
        let eps = adapt.learn_stepsize(1.5);
        // s_bar = (0.8 - 1.0) / 11, x = -s_bar / 0.05
        let s_bar = -0.2 / 11.0;
        assert_relative_eq!(eps, (-s_bar / 0.05_f64).exp(), max_relative = 1e-12);
        assert_relative_eq!(adapt.complete_adaptation(), eps, max_relative = 1e-12);

        adapt.restart();
        assert_eq!(adapt.complete_adaptation(), 1.0);
    }

    #[test]
    fn welford_matches_two_pass_variance() {
        let draws = [array![1.0, 10.0], array![2.0, 20.0], array![4.0, 40.0]];
        let mut est = WelfordVariance::new(2);
        assert_eq!(est.sample_variance(), array![0.0, 0.0]);
        for d in &draws {
            est.add_sample(d);
        }
        assert_eq!(est.num_samples(), 3);
        let mean = 7.0 / 3.0;
        let var = ((1.0 - mean) * (1.0 - mean) + (2.0 - mean) * (2.0 - mean) + (4.0 - mean) * (4.0 - mean)) / 2.0;
        assert_relative_eq!(est.sample_mean()[0], mean, max_relative = 1e-12);
        assert_relative_eq!(est.sample_variance()[0], var, max_relative = 1e-12);
        assert_relative_eq!(est.sample_variance()[1], 100.0 * var, max_relative = 1e-12);
    }

    #[test]
    fn default_schedule_window_ends() {
        let mut windows = WindowedAdaptation::new(1000, 75, 50, 25);
        let mut ends = Vec::new();
        for it in 0..1000 {
            if windows.end_adaptation_window() {
                ends.push(it);
                windows.compute_next_window();
            }
            windows.advance();
        }
        assert_eq!(ends, vec![99, 149, 249, 449, 949]);
    }

    #[test]
    fn short_warmup_shrinks_buffers() {
        let windows = WindowedAdaptation::new(100, 75, 50, 25);
        assert!(windows.is_enabled());
        assert_eq!(windows.init_buffer(), 15);
        assert_eq!(windows.term_buffer(), 10);
        assert_eq!(windows.base_window(), 75);

        let tiny = WindowedAdaptation::new(10, 75, 50, 25);
        assert!(!tiny.is_enabled());
        assert!(!tiny.adaptation_window());
        assert!(!tiny.end_adaptation_window());
    }

    #[test]
    fn variance_adaptation_updates_metric_at_window_end() {
        let windows = WindowedAdaptation::new(100, 15, 10, 75);
        let mut adapt = VarAdaptation::new(1, windows);
        let mut inv_mass = array![1.0];
        let mut updates = Vec::new();
        for it in 0..100 {
            let q = array![if it % 2 == 0 { 1.0 } else { -1.0 }];
            if adapt.learn_variance(&mut inv_mass, &q) {
                updates.push(it);
            }
        }
        assert_eq!(updates, vec![89]);
        // Draws from iterations 15..=89: 37 of +1 and 38 of -1.
        let n = 75.0;
        let var = (75.0 - 1.0 / 75.0) / 74.0;
        let expected = (n / (n + 5.0)) * var + 1e-3 * (5.0 / (n + 5.0));
        assert_relative_eq!(inv_mass[0], expected, max_relative = 1e-12);
    }
}
