/*!
Models written with [`burn`] tensors, differentiated by burn's autodiff backend.

Implement [`DifferentiableTarget`] with tensor operations and wrap it in a
[`BurnModel`] to obtain a [`Model`] whose gradient comes from reverse-mode
automatic differentiation.

# Examples

```rust
use burn::backend::{Autodiff, NdArray};
use burn::prelude::*;
use mini_hmc::autodiff::{BurnModel, DifferentiableTarget};
use mini_hmc::model::Model;

type B = Autodiff<NdArray<f64>>;

struct StdNormal;

impl DifferentiableTarget<B> for StdNormal {
    fn dim(&self) -> usize {
        2
    }

    fn log_prob(&self, position: Tensor<B, 1>) -> Tensor<B, 1> {
        position.powi_scalar(2).sum().mul_scalar(-0.5)
    }
}

let model = BurnModel::<B, _>::new(StdNormal);
let mut grad = [0.0; 2];
let lp = model.log_prob_grad(&[1.0, 2.0], &mut grad, &mut std::io::sink()).unwrap();
assert!((lp + 2.5).abs() < 1e-12);
assert!((grad[1] + 2.0).abs() < 1e-12);
```
*/

use crate::error::{Error, Result};
use crate::model::Model;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use std::io::Write;

/// An unnormalized log density over a 1-D position tensor.
pub trait DifferentiableTarget<B: AutodiffBackend> {
    fn dim(&self) -> usize;

    fn param_names(&self) -> Vec<String> {
        (0..self.dim()).map(|i| format!("q_{i}")).collect()
    }

    /// Log density at `position` (shape `[dim]`) as a single-element tensor.
    fn log_prob(&self, position: Tensor<B, 1>) -> Tensor<B, 1>;
}

/// Adapts a [`DifferentiableTarget`] to the [`Model`] trait.
pub struct BurnModel<B: AutodiffBackend, T> {
    target: T,
    device: B::Device,
}

impl<B: AutodiffBackend, T: DifferentiableTarget<B>> BurnModel<B, T> {
    /// Evaluates on the backend's default device.
    pub fn new(target: T) -> Self {
        Self::with_device(target, B::Device::default())
    }

    pub fn with_device(target: T, device: B::Device) -> Self {
        Self { target, device }
    }

    pub fn target(&self) -> &T {
        &self.target
    }
}

impl<B: AutodiffBackend, T: DifferentiableTarget<B>> Model for BurnModel<B, T> {
    fn num_params(&self) -> usize {
        self.target.dim()
    }

    fn param_names(&self) -> Vec<String> {
        self.target.param_names()
    }

    fn log_prob_grad(&self, q: &[f64], grad: &mut [f64], _msgs: &mut dyn Write) -> Result<f64> {
        let data = TensorData::new(q.to_vec(), [q.len()]).convert::<B::FloatElem>();
        let position = Tensor::<B, 1>::from_data(data, &self.device).require_grad();

        let logp = self.target.log_prob(position.clone());
        if logp.dims()[0] != 1 {
            return Err(Error::Model(format!(
                "log density must have one element, got {}",
                logp.dims()[0]
            )));
        }

        let grads = logp.backward();
        let position_grad = position
            .grad(&grads)
            .ok_or_else(|| Error::Model("log density does not depend on the position".to_string()))?;
        for (dst, g) in grad.iter_mut().zip(position_grad.into_data().iter::<f64>()) {
            *dst = g;
        }

        Ok(logp.into_scalar().elem::<f64>())
    }
}
