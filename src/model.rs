//! The model seam: anything that can evaluate an unnormalized log density and its
//! gradient at an unconstrained position.

use crate::error::Result;
use std::io::Write;

/// A differentiable target density over unconstrained parameters.
///
/// Implementations own their data. The only output channel a model may write to
/// is `msgs`, which is handed in per evaluation; a well-behaved model writes nothing
/// during normal operation.
pub trait Model {
    /// Dimension of the unconstrained parameter vector.
    fn num_params(&self) -> usize;

    /// Names of the parameters, used for headers.
    fn param_names(&self) -> Vec<String> {
        (0..self.num_params()).map(|i| format!("q_{i}")).collect()
    }

    /// Returns `log p(q)` (up to a constant) and writes `∇ log p(q)` into `grad`.
    ///
    /// `grad` has length [`Model::num_params`]. Errors signal that `q` lies outside
    /// the support or the model could not be evaluated.
    fn log_prob_grad(&self, q: &[f64], grad: &mut [f64], msgs: &mut dyn Write) -> Result<f64>;

    /// Maps an unconstrained position to the values written to the sample output.
    fn constrained_params(&self, q: &[f64]) -> Result<Vec<f64>> {
        Ok(q.to_vec())
    }
}

impl<M: Model + ?Sized> Model for &M {
    fn num_params(&self) -> usize {
        (**self).num_params()
    }

    fn param_names(&self) -> Vec<String> {
        (**self).param_names()
    }

    fn log_prob_grad(&self, q: &[f64], grad: &mut [f64], msgs: &mut dyn Write) -> Result<f64> {
        (**self).log_prob_grad(q, grad, msgs)
    }

    fn constrained_params(&self, q: &[f64]) -> Result<Vec<f64>> {
        (**self).constrained_params(q)
    }
}
