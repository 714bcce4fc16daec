//! Regression test for a single Hamiltonian update on Neal's funnel.
//!
//! The model is `y ~ normal(0, 3)` and `x[i] ~ normal(0, exp(y))` for ten `x`,
//! dropping constants. At the point where every coordinate is 1 the potential and
//! its gradient have closed forms.

use mini_hmc::hamiltonian::{Hamiltonian, Metric, PhasePoint};
use mini_hmc::model::Model;
use mini_hmc::writer::MemoryWriter;
use ndarray::Array1;
use std::cell::Cell;
use std::io::Write;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Funnel {
        calls: Cell<usize>,
    }

    impl Funnel {
        fn new() -> Self {
            Self { calls: Cell::new(0) }
        }
    }

    impl Model for Funnel {
        fn num_params(&self) -> usize {
            11
        }

        fn log_prob_grad(&self, q: &[f64], grad: &mut [f64], _msgs: &mut dyn Write) -> mini_hmc::Result<f64> {
            self.calls.set(self.calls.get() + 1);

            let y = q[0];
            let inv_var = (-2.0 * y).exp();
            let sum_sq: f64 = q[1..].iter().map(|x| x * x).sum();
            let lp = -y * y / 18.0 - 10.0 * y - 0.5 * sum_sq * inv_var;

            grad[0] = -y / 9.0 - 10.0 + sum_sq * inv_var;
            for (g, x) in grad[1..].iter_mut().zip(&q[1..]) {
                *g = -x * inv_var;
            }
            Ok(lp)
        }
    }

    #[test]
    fn funnel_update_matches_closed_form() {
        let model = Funnel::new();
        let hamiltonian = Hamiltonian::new(&model, Metric::Unit);
        let mut z = PhasePoint::from_position(Array1::from_elem(11, 1.0));
        let (mut writer, mut error_writer) = (MemoryWriter::default(), MemoryWriter::default());

        hamiltonian.update(&mut z, &mut writer, &mut error_writer).unwrap();

        assert_relative_eq!(z.v, 10.73223197, max_relative = 1e-9);
        assert_relative_eq!(z.g[0], 8.757758279, max_relative = 1e-9);
        for g in z.g.iter().skip(1) {
            assert_relative_eq!(*g, 0.1353352832, max_relative = 1e-9);
        }

        assert_eq!(model.calls.get(), 1);
        // Model output would have been forwarded to `writer`.
        assert!(writer.is_empty());
        assert!(error_writer.is_empty());
    }

    #[test]
    fn potential_is_negated_log_density() {
        let model = Funnel::new();
        let hamiltonian = Hamiltonian::new(&model, Metric::Unit);
        let q = Array1::from_vec(vec![-0.3, 0.1, -0.2, 0.3, 0.0, 0.5, -0.5, 1.0, -1.0, 0.25, 2.0]);
        let mut z = PhasePoint::from_position(q.clone());
        hamiltonian
            .init(&mut z, &mut MemoryWriter::default(), &mut MemoryWriter::default())
            .unwrap();

        let mut grad = vec![0.0; 11];
        let lp = model
            .log_prob_grad(q.as_slice().unwrap(), &mut grad, &mut Vec::<u8>::new())
            .unwrap();
        assert_eq!(z.v, -lp);
        for (g, d) in z.g.iter().zip(&grad) {
            assert_eq!(*g, -d);
        }
        assert_eq!(hamiltonian.phi(&z), z.v);
        assert_eq!(hamiltonian.tau(&z), 0.0);
    }
}
