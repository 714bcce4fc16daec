//! Phase-space points and the Euclidean Hamiltonian built on a [`Model`].
//!
//! The potential energy is `V(q) = −log p(q)` and the kinetic energy is
//! `T(p) = ½ pᵀ M⁻¹ p` for a unit or diagonal inverse mass matrix `M⁻¹`.

use crate::error::Result;
use crate::model::Model;
use crate::writer::Writer;
use ndarray::Array1;
use rand::Rng;
use rand_distr::StandardNormal;
use std::borrow::Cow;

/// Position, momentum, potential energy and gradient of the potential.
#[derive(Debug, Clone, PartialEq)]
pub struct PhasePoint {
    pub q: Array1<f64>,
    pub p: Array1<f64>,
    pub v: f64,
    pub g: Array1<f64>,
}

impl PhasePoint {
    /// A point of dimension `n` at the origin with zero energy.
    pub fn new(n: usize) -> Self {
        Self {
            q: Array1::zeros(n),
            p: Array1::zeros(n),
            v: 0.0,
            g: Array1::zeros(n),
        }
    }

    pub fn from_position(q: Array1<f64>) -> Self {
        let n = q.len();
        Self {
            q,
            p: Array1::zeros(n),
            v: 0.0,
            g: Array1::zeros(n),
        }
    }

    pub fn dim(&self) -> usize {
        self.q.len()
    }

    /// Copies position, momentum, energy and gradient from `other`, reusing buffers.
    pub fn assign(&mut self, other: &PhasePoint) {
        self.q.assign(&other.q);
        self.p.assign(&other.p);
        self.v = other.v;
        self.g.assign(&other.g);
    }
}

/// Euclidean metric, stored as the inverse mass matrix.
#[derive(Debug, Clone, PartialEq)]
pub enum Metric {
    /// Identity mass matrix.
    Unit,
    /// Diagonal inverse mass matrix.
    Diag(Array1<f64>),
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Unit => "unit_e",
            Metric::Diag(_) => "diag_e",
        }
    }

    /// Velocity `M⁻¹ p`.
    pub fn velocity(&self, p: &Array1<f64>) -> Array1<f64> {
        match self {
            Metric::Unit => p.clone(),
            Metric::Diag(inv_mass) => inv_mass * p,
        }
    }

    /// `½ pᵀ M⁻¹ p`.
    pub fn kinetic_energy(&self, p: &Array1<f64>) -> f64 {
        match self {
            Metric::Unit => 0.5 * p.dot(p),
            Metric::Diag(inv_mass) => 0.5 * p.iter().zip(inv_mass).map(|(x, m)| x * m * x).sum::<f64>(),
        }
    }

    /// Draws `p ~ N(0, M)` in place.
    pub fn sample_momentum<R: Rng + ?Sized>(&self, p: &mut Array1<f64>, rng: &mut R) {
        match self {
            Metric::Unit => p.iter_mut().for_each(|x| *x = rng.sample(StandardNormal)),
            Metric::Diag(inv_mass) => p.iter_mut().zip(inv_mass).for_each(|(x, m)| {
                let z: f64 = rng.sample(StandardNormal);
                *x = z / m.sqrt();
            }),
        }
    }
}

/// Energy function of a Hamiltonian system whose potential is a model's negative
/// log density.
#[derive(Debug, Clone)]
pub struct Hamiltonian<'m, M: Model + ?Sized> {
    model: &'m M,
    metric: Metric,
}

impl<'m, M: Model + ?Sized> Hamiltonian<'m, M> {
    pub fn new(model: &'m M, metric: Metric) -> Self {
        Self { model, metric }
    }

    pub fn model(&self) -> &'m M {
        self.model
    }

    pub fn metric(&self) -> &Metric {
        &self.metric
    }

    pub fn set_metric(&mut self, metric: Metric) {
        self.metric = metric;
    }

    /// Kinetic energy `T(p)`.
    pub fn kinetic_energy(&self, z: &PhasePoint) -> f64 {
        self.metric.kinetic_energy(&z.p)
    }

    /// Potential energy `V(q)` as of the last update.
    pub fn potential_energy(&self, z: &PhasePoint) -> f64 {
        z.v
    }

    /// Total energy `H = T + V`.
    pub fn energy(&self, z: &PhasePoint) -> f64 {
        self.kinetic_energy(z) + self.potential_energy(z)
    }

    pub fn tau(&self, z: &PhasePoint) -> f64 {
        self.kinetic_energy(z)
    }

    pub fn phi(&self, z: &PhasePoint) -> f64 {
        self.potential_energy(z)
    }

    /// `∂τ/∂q`, zero for a Euclidean metric.
    pub fn dtau_dq(&self, z: &PhasePoint) -> Array1<f64> {
        Array1::zeros(z.dim())
    }

    /// `∂τ/∂p = M⁻¹ p`.
    pub fn dtau_dp(&self, z: &PhasePoint) -> Array1<f64> {
        self.metric.velocity(&z.p)
    }

    /// `∂φ/∂q = ∇V`.
    pub fn dphi_dq(&self, z: &PhasePoint) -> Array1<f64> {
        z.g.clone()
    }

    /// `∂φ/∂p`, zero for a Euclidean metric.
    pub fn dphi_dp(&self, z: &PhasePoint) -> Array1<f64> {
        Array1::zeros(z.dim())
    }

    /// Resamples the momentum of `z` from the metric.
    pub fn sample_p<R: Rng + ?Sized>(&self, z: &mut PhasePoint, rng: &mut R) {
        self.metric.sample_momentum(&mut z.p, rng);
    }

    pub fn init(
        &self,
        z: &mut PhasePoint,
        writer: &mut dyn Writer,
        error_writer: &mut dyn Writer,
    ) -> Result<()> {
        self.update(z, writer, error_writer)
    }

    /// Evaluates the model once at `z.q` and stores `V` and `∇V` in `z`.
    ///
    /// Anything the model prints is forwarded to `writer`. If the model fails or
    /// returns a non-finite value, the failure is described on `error_writer`,
    /// `z.v` becomes `+∞` and `z.g` keeps its previous value, which makes the
    /// proposal certain to be rejected. Only writer failures are returned as errors.
    pub fn update(
        &self,
        z: &mut PhasePoint,
        writer: &mut dyn Writer,
        error_writer: &mut dyn Writer,
    ) -> Result<()> {
        let mut grad = vec![0.0; z.dim()];
        let mut msgs: Vec<u8> = Vec::new();
        let q = contiguous(&z.q);
        let result = self.model.log_prob_grad(&q, &mut grad, &mut msgs);
        drop(q);

        if !msgs.is_empty() {
            writer.write_message(String::from_utf8_lossy(&msgs).trim_end())?;
        }

        let issue = match result {
            Ok(lp) if lp.is_finite() && grad.iter().all(|d| d.is_finite()) => {
                z.v = -lp;
                z.g = grad.into_iter().map(|d| -d).collect();
                return Ok(());
            }
            Ok(lp) if !lp.is_finite() => format!("log density is {lp}"),
            Ok(_) => "gradient is not finite".to_string(),
            Err(e) => e.to_string(),
        };

        log::warn!("rejecting proposal: {issue}");
        z.v = f64::INFINITY;
        error_writer.write_message(&format!(
            "Informational Message: The current Metropolis proposal is about to be rejected because of the following issue:\n{issue}\nIf this warning occurs sporadically the sampler is fine; if it occurs often the model may be misspecified."
        ))
    }
}

/// Borrows `a` as a slice, copying only when it is not contiguous.
pub(crate) fn contiguous(a: &Array1<f64>) -> Cow<'_, [f64]> {
    match a.as_slice() {
        Some(s) => Cow::Borrowed(s),
        None => Cow::Owned(a.to_vec()),
    }
}
