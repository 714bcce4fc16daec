//! Statistical and numerical checks of the Rayleigh evaluator.
//!
//! 1. Analytic partials agree with centered finite differences.
//! 2. The CDF is zero at the origin, nondecreasing and tends to one.
//! 3. `rayleigh::sample` matches the Rayleigh law in mean, empirical CDF and a
//!    two-sample KS test.

use mini_hmc::distributions::{rayleigh, Arg, DomainError, Mode};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::Exp1;

#[cfg(test)]
mod tests {
    use super::*;

    fn value(y: f64, sigma: f64) -> f64 {
        rayleigh::log_density_full(Arg::constant(y), Arg::constant(sigma))
            .unwrap()
            .value
    }

    /// Compares analytic partials with centered differences on random pairs.
    #[test]
    fn test_partials_match_finite_differences() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut checked = 0;
        for _ in 0..200 {
            let y: f64 = rng.gen_range(0.1..5.0);
            let sigma: f64 = rng.gen_range(0.2..4.0);

            let lp = rayleigh::log_density(Arg::variable(y), Arg::variable(sigma), Mode::Full).unwrap();
            let d_y = lp.partial(0).unwrap()[0];
            let d_sigma = lp.partial(1).unwrap()[0];

            let h_y = 1e-5 * y;
            let fd_y = (value(y + h_y, sigma) - value(y - h_y, sigma)) / (2.0 * h_y);
            let h_s = 1e-5 * sigma;
            let fd_sigma = (value(y, sigma + h_s) - value(y, sigma - h_s)) / (2.0 * h_s);

            // Relative error is undefined where a partial vanishes (y = sigma for
            // d/dy, y = sqrt(2) sigma for d/dsigma).
            for (name, analytic, numeric) in [("d/dy", d_y, fd_y), ("d/dsigma", d_sigma, fd_sigma)] {
                if analytic.abs() < 1e-2 {
                    continue;
                }
                let rel = ((numeric - analytic) / analytic).abs();
                assert!(
                    rel <= 1e-6,
                    "{name} at y={y}, sigma={sigma}: analytic {analytic}, numeric {numeric}, relative error {rel}"
                );
                checked += 1;
            }
        }
        assert!(checked >= 350, "only {checked} partials checked");
    }

    #[test]
    fn test_zero_length_input_is_zero_in_both_modes() {
        let empty: Vec<f64> = Vec::new();
        for mode in [Mode::Full, Mode::UpToConstant] {
            let lp = rayleigh::log_density(Arg::variable(&empty), Arg::variable(1.0), mode).unwrap();
            assert_eq!(lp.value, 0.0);
            let lp = rayleigh::log_density(Arg::variable(1.0), Arg::variable(&empty), mode).unwrap();
            assert_eq!(lp.value, 0.0);
        }
    }

    #[test]
    fn test_mismatched_lengths_are_rejected() {
        let y = [1.0, 2.0, 3.0];
        let sigma = [1.0, 2.0];
        let err = rayleigh::log_density(Arg::variable(&y), Arg::variable(&sigma), Mode::Full).unwrap_err();
        assert!(matches!(err, DomainError::InconsistentSizes { .. }));
        assert_eq!(err.sentinel(), 0.0);

        let err = rayleigh::cdf(&y, &sigma).unwrap_err();
        assert_eq!(err.sentinel(), 1.0);
    }

    #[test]
    fn test_cdf_monotone_and_bounded() {
        let sigma = 1.7;
        assert_eq!(rayleigh::cdf(0.0, sigma).unwrap(), 0.0);
        let mut previous = 0.0;
        for i in 1..=400 {
            let y = i as f64 * 0.05;
            let c = rayleigh::cdf(y, sigma).unwrap();
            assert!(c >= previous, "cdf decreased at y={y}");
            assert!(c <= 1.0);
            previous = c;
        }
        assert!(rayleigh::cdf(20.0 * sigma, sigma).unwrap() > 1.0 - 1e-12);
    }

    #[test]
    fn test_sample_mean() {
        const N: usize = 100_000;
        let sigma = 2.0;
        let mut rng = SmallRng::seed_from_u64(42);
        let mean = (0..N)
            .map(|_| rayleigh::sample(sigma, &mut rng).unwrap())
            .sum::<f64>()
            / N as f64;
        let expected = sigma * (std::f64::consts::PI / 2.0).sqrt();
        assert!(
            ((mean - expected) / expected).abs() < 0.01,
            "mean {mean}, expected {expected}"
        );
    }

    #[test]
    fn test_sample_empirical_cdf() {
        const N: usize = 20_000;
        let sigma = 0.8;
        let mut rng = SmallRng::seed_from_u64(7);
        let draws: Vec<f64> = (0..N).map(|_| rayleigh::sample(sigma, &mut rng).unwrap()).collect();
        for y in [0.2, 0.5, 1.0, 1.5, 2.5] {
            let empirical = draws.iter().filter(|&&x| x <= y).count() as f64 / N as f64;
            let analytic = rayleigh::cdf(y, sigma).unwrap();
            assert!(
                (empirical - analytic).abs() < 0.015,
                "at y={y}: empirical {empirical}, analytic {analytic}"
            );
        }
    }

    /// A Rayleigh(σ) variate is σ·sqrt(2E) for E ~ Exp(1).
    #[test]
    fn test_sample_ks_against_exponential_construction() {
        const N: usize = 2_000;
        let sigma = 1.3;
        let mut rng = SmallRng::seed_from_u64(123);
        let draws: Vec<f64> = (0..N).map(|_| rayleigh::sample(sigma, &mut rng).unwrap()).collect();
        let mut reference_rng = SmallRng::seed_from_u64(456);
        let reference: Vec<f64> = (0..N)
            .map(|_| {
                let e: f64 = reference_rng.sample(Exp1);
                sigma * (2.0 * e).sqrt()
            })
            .collect();

        let result = kolmogorov_smirnov::test_f64(&draws, &reference, 0.999);
        assert!(
            !result.is_rejected,
            "KS statistic {} exceeds critical value {}",
            result.statistic, result.critical_value
        );
    }
}
