/*!
The Rayleigh distribution with scale `σ > 0`:

```text
p(y | σ) = y / σ² · exp(−y² / (2σ²)),   y > 0
```

Vector arguments are treated as independent draws, so [`log_density`] sums over
elements and [`cdf`] multiplies.
*/

use super::{
    check_consistent_sizes, check_finite, check_nonnegative, check_not_nan, check_positive,
    max_size, Arg, ArgView, DomainError, GradientAccumulator, LogDensity, Mode,
};
use rand::distributions::Open01;
use rand::Rng;

const LOG_DENSITY: &str = "rayleigh::log_density";
const CDF: &str = "rayleigh::cdf";
const SAMPLE: &str = "rayleigh::sample";

/// Log density of `y` given `scale`, with partials for the differentiable arguments.
///
/// Partials are indexed by argument position: 0 for `y`, 1 for `scale`.
///
/// Returns 0 without validating when either argument is empty. Otherwise every
/// element of `y` and `scale` must be finite and positive and the lengths must be
/// consistent; a violation rejects the whole call before any term is computed.
pub fn log_density<'a>(y: Arg<'a>, scale: Arg<'a>, mode: Mode) -> Result<LogDensity, DomainError> {
    let mut partials = GradientAccumulator::new(&[&y, &scale]);
    if y.is_empty() || scale.is_empty() {
        return Ok(partials.finish(0.0));
    }

    check_not_nan(LOG_DENSITY, "Random variable", &y.values, 0.0)?;
    check_finite(LOG_DENSITY, "Random variable", &y.values, 0.0)?;
    check_not_nan(LOG_DENSITY, "Scale parameter", &scale.values, 0.0)?;
    check_finite(LOG_DENSITY, "Scale parameter", &scale.values, 0.0)?;
    check_positive(LOG_DENSITY, "Scale parameter", &scale.values, 0.0)?;
    check_positive(LOG_DENSITY, "Random variable", &y.values, 0.0)?;
    check_consistent_sizes(
        LOG_DENSITY,
        &[("Random variable", &y.values), ("Scale parameter", &scale.values)],
        0.0,
    )?;

    if !mode.include_summand(&[&y, &scale]) {
        return Ok(partials.finish(0.0));
    }

    let include_log_sigma = mode.include_summand(&[&scale]);
    let include_log_y = mode.include_summand(&[&y]);

    let inv_sigma: Vec<f64> = scale.values.iter().map(|s| 1.0 / s).collect();
    let log_sigma: Vec<f64> = if include_log_sigma {
        scale.values.iter().map(f64::ln).collect()
    } else {
        Vec::new()
    };
    let sigma_view = ArgView::Vector(&inv_sigma);

    let n_max = max_size(&[&y, &scale]);
    let mut logp = 0.0;
    for n in 0..n_max {
        let y_dbl = y.get(n);
        let inv_sigma_n = sigma_view.get(n);
        let y_over_sigma = y_dbl * inv_sigma_n;

        if include_log_sigma {
            logp -= 2.0 * log_sigma[scale.values.slot(n)];
        }
        if include_log_y {
            logp += y_dbl.ln();
        }
        logp -= 0.5 * y_over_sigma * y_over_sigma;

        let scaled_diff = inv_sigma_n * y_over_sigma;
        if y.differentiable {
            partials.add(0, y.values.slot(n), 1.0 / y_dbl - scaled_diff);
        }
        if scale.differentiable {
            partials.add(
                1,
                scale.values.slot(n),
                y_over_sigma * scaled_diff - 2.0 * inv_sigma_n,
            );
        }
    }

    Ok(partials.finish(logp))
}

/// Log density with every term included.
pub fn log_density_full<'a>(y: Arg<'a>, scale: Arg<'a>) -> Result<LogDensity, DomainError> {
    log_density(y, scale, Mode::Full)
}

/// Joint cumulative distribution of independent elements:
/// `∏ₙ (1 − exp(−yₙ² / (2σₙ²)))`.
///
/// `y` may be zero. Returns 1 without validating when either argument is empty.
pub fn cdf<'a>(
    y: impl Into<ArgView<'a>>,
    scale: impl Into<ArgView<'a>>,
) -> Result<f64, DomainError> {
    let (y, scale) = (y.into(), scale.into());
    if y.is_empty() || scale.is_empty() {
        return Ok(1.0);
    }

    check_not_nan(CDF, "Random variable", &y, 1.0)?;
    check_finite(CDF, "Random variable", &y, 1.0)?;
    check_nonnegative(CDF, "Random variable", &y, 1.0)?;
    check_not_nan(CDF, "Scale parameter", &scale, 1.0)?;
    check_finite(CDF, "Scale parameter", &scale, 1.0)?;
    check_positive(CDF, "Scale parameter", &scale, 1.0)?;
    check_consistent_sizes(
        CDF,
        &[("Random variable", &y), ("Scale parameter", &scale)],
        1.0,
    )?;

    let n_max = y.len().max(scale.len());
    let cdf = (0..n_max)
        .map(|n| {
            let (y_n, sigma_n) = (y.get(n), scale.get(n));
            -(-y_n * y_n / (2.0 * sigma_n * sigma_n)).exp_m1()
        })
        .product();
    Ok(cdf)
}

/// Draws one variate by inverting the CDF: `σ·sqrt(−2 ln U)`, `U ~ Uniform(0, 1)`.
///
/// Consumes exactly one uniform draw from `rng`.
pub fn sample<R: Rng + ?Sized>(scale: f64, rng: &mut R) -> Result<f64, DomainError> {
    let view = ArgView::Scalar(scale);
    check_finite(SAMPLE, "Scale parameter", &view, f64::NAN)?;
    check_positive(SAMPLE, "Scale parameter", &view, f64::NAN)?;
    let u: f64 = rng.sample(Open01);
    Ok(scale * (-2.0 * u.ln()).sqrt())
}
