//! Explicit leapfrog integration of Hamilton's equations.

use crate::error::Result;
use crate::hamiltonian::{Hamiltonian, PhasePoint};
use crate::model::Model;
use crate::writer::Writer;

/// Symplectic leapfrog (Störmer–Verlet) integrator for separable Hamiltonians.
#[derive(Debug, Clone, Copy, Default)]
pub struct Leapfrog;

impl Leapfrog {
    /// `p ← p − ε/2 · ∂φ/∂q`
    pub fn begin_update_p<M: Model + ?Sized>(
        &self,
        z: &mut PhasePoint,
        _hamiltonian: &Hamiltonian<M>,
        epsilon: f64,
    ) {
        z.p.scaled_add(-0.5 * epsilon, &z.g);
    }

    /// `q ← q + ε · ∂τ/∂p`, then re-evaluates the potential at the new position.
    pub fn update_q<M: Model + ?Sized>(
        &self,
        z: &mut PhasePoint,
        hamiltonian: &Hamiltonian<M>,
        epsilon: f64,
        writer: &mut dyn Writer,
        error_writer: &mut dyn Writer,
    ) -> Result<()> {
        let velocity = hamiltonian.dtau_dp(z);
        z.q.scaled_add(epsilon, &velocity);
        hamiltonian.update(z, writer, error_writer)
    }

    /// `p ← p − ε/2 · ∂φ/∂q` at the new position.
    pub fn end_update_p<M: Model + ?Sized>(
        &self,
        z: &mut PhasePoint,
        _hamiltonian: &Hamiltonian<M>,
        epsilon: f64,
    ) {
        z.p.scaled_add(-0.5 * epsilon, &z.g);
    }

    /// One full leapfrog step of size `epsilon`.
    ///
    /// Returns `false` when the potential could not be evaluated at the new
    /// position; `z` then carries `v = +∞` and the trajectory should be abandoned.
    pub fn evolve<M: Model + ?Sized>(
        &self,
        z: &mut PhasePoint,
        hamiltonian: &Hamiltonian<M>,
        epsilon: f64,
        writer: &mut dyn Writer,
        error_writer: &mut dyn Writer,
    ) -> Result<bool> {
        self.begin_update_p(z, hamiltonian, epsilon);
        self.update_q(z, hamiltonian, epsilon, writer, error_writer)?;
        if !z.v.is_finite() {
            return Ok(false);
        }
        self.end_update_p(z, hamiltonian, epsilon);
        Ok(true)
    }
}
