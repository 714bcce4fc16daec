/*!
Distribution evaluators: log densities with analytic partials, cumulative
distribution functions and random number generation.

Every family follows the same contract:

- arguments are [`Arg`]s (a scalar or a slice, plus a runtime differentiability
  flag) that broadcast against each other;
- an empty argument short-circuits to the neutral value without validation;
- all arguments are validated before any term is computed, and a violation is
  reported as a [`DomainError`] carrying the neutral sentinel;
- in [`Mode::UpToConstant`] terms that only involve constant arguments are skipped.

# Examples

```rust
use mini_hmc::distributions::{rayleigh, Arg, Mode};

let y = [0.5, 1.5, 2.5];
let lp = rayleigh::log_density(Arg::constant(&y), Arg::variable(2.0), Mode::UpToConstant)
    .expect("valid arguments");
// One partial for the (scalar) scale, none for the constant data.
assert_eq!(lp.partial(1).map(|d| d.len()), Some(1));
assert!(lp.partial(0).is_none());
```
*/

pub mod partials;
pub mod rayleigh;
pub mod vector_view;

pub use partials::{GradientAccumulator, LogDensity};
pub use vector_view::{max_size, Arg, ArgView};

use thiserror::Error;

/// Which additive terms of a log density are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Every term, including normalizing constants.
    #[default]
    Full,
    /// Drop terms that are constant with respect to all differentiable arguments.
    UpToConstant,
}

impl Mode {
    /// Whether a term depending on `args` must be included.
    ///
    /// Always true in [`Mode::Full`]; in [`Mode::UpToConstant`] only when at least
    /// one of the arguments is differentiable.
    #[inline]
    pub fn include_summand(self, args: &[&Arg]) -> bool {
        match self {
            Mode::Full => true,
            Mode::UpToConstant => args.iter().any(|a| a.differentiable),
        }
    }
}

/// Invalid argument passed to a distribution function.
///
/// The error carries the neutral value the call stands for (0 for a log density,
/// 1 for a cumulative distribution) so callers that prefer a value over an error
/// can fall back to [`DomainError::sentinel`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("{function}: {argument}[{index}] is {value}, but must be {requirement}")]
    InvalidValue {
        function: &'static str,
        argument: &'static str,
        index: usize,
        value: f64,
        requirement: &'static str,
        sentinel: f64,
    },
    #[error(
        "{function}: size of {argument} ({len}) is inconsistent with {other} ({other_len})"
    )]
    InconsistentSizes {
        function: &'static str,
        argument: &'static str,
        len: usize,
        other: &'static str,
        other_len: usize,
        sentinel: f64,
    },
}

impl DomainError {
    /// Neutral value of the rejected call.
    pub fn sentinel(&self) -> f64 {
        match self {
            DomainError::InvalidValue { sentinel, .. }
            | DomainError::InconsistentSizes { sentinel, .. } => *sentinel,
        }
    }
}

fn check_each(
    function: &'static str,
    argument: &'static str,
    values: &ArgView,
    sentinel: f64,
    requirement: &'static str,
    ok: impl Fn(f64) -> bool,
) -> Result<(), DomainError> {
    match values.iter().enumerate().find(|(_, x)| !ok(*x)) {
        None => Ok(()),
        Some((index, value)) => Err(DomainError::InvalidValue {
            function,
            argument,
            index,
            value,
            requirement,
            sentinel,
        }),
    }
}

/// Every element must not be NaN.
pub fn check_not_nan(
    function: &'static str,
    argument: &'static str,
    values: &ArgView,
    sentinel: f64,
) -> Result<(), DomainError> {
    check_each(function, argument, values, sentinel, "not nan", |x| {
        !x.is_nan()
    })
}

/// Every element must be finite.
pub fn check_finite(
    function: &'static str,
    argument: &'static str,
    values: &ArgView,
    sentinel: f64,
) -> Result<(), DomainError> {
    check_each(function, argument, values, sentinel, "finite", f64::is_finite)
}

/// Every element must be strictly greater than zero.
pub fn check_positive(
    function: &'static str,
    argument: &'static str,
    values: &ArgView,
    sentinel: f64,
) -> Result<(), DomainError> {
    check_each(function, argument, values, sentinel, "positive", |x| x > 0.0)
}

/// Every element must be greater than or equal to zero.
pub fn check_nonnegative(
    function: &'static str,
    argument: &'static str,
    values: &ArgView,
    sentinel: f64,
) -> Result<(), DomainError> {
    check_each(function, argument, values, sentinel, "nonnegative", |x| {
        x >= 0.0
    })
}

/// Vector arguments must have length 1 or the common length N (the longest one).
/// Scalars always pass.
pub fn check_consistent_sizes(
    function: &'static str,
    args: &[(&'static str, &ArgView)],
    sentinel: f64,
) -> Result<(), DomainError> {
    let Some(&(longest, longest_view)) = args.iter().max_by_key(|(_, v)| v.len()) else {
        return Ok(());
    };
    let n = longest_view.len();
    for &(argument, view) in args {
        if view.is_vector() && view.len() != 1 && view.len() != n {
            return Err(DomainError::InconsistentSizes {
                function,
                argument,
                len: view.len(),
                other: longest,
                other_len: n,
                sentinel,
            });
        }
    }
    Ok(())
}
