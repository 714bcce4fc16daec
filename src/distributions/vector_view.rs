//! Broadcasting views over scalar or vector distribution arguments.

use ndarray::{Array1, ArrayView1};

/// Read-only view over either a single value or a sequence of values.
///
/// A scalar (or a sequence of length one) broadcasts against any length; a longer
/// sequence is indexed element by element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgView<'a> {
    Scalar(f64),
    Vector(&'a [f64]),
    /// A sequence that is not contiguous in memory, such as a stepped slice.
    Strided(ArrayView1<'a, f64>),
}

impl<'a> ArgView<'a> {
    /// Number of stored elements (1 for a scalar).
    pub fn len(&self) -> usize {
        match self {
            ArgView::Scalar(_) => 1,
            ArgView::Vector(values) => values.len(),
            ArgView::Strided(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the argument was supplied as a sequence.
    pub fn is_vector(&self) -> bool {
        matches!(self, ArgView::Vector(_) | ArgView::Strided(_))
    }

    /// Element `n` under broadcasting.
    ///
    /// # Panics
    ///
    /// Panics if the view is an empty vector or `n` is out of range for a vector
    /// whose length is neither 1 nor greater than `n`.
    #[inline]
    pub fn get(&self, n: usize) -> f64 {
        if self.len() == 1 {
            self.stored(0)
        } else {
            self.stored(n)
        }
    }

    #[inline]
    fn stored(&self, n: usize) -> f64 {
        match self {
            ArgView::Scalar(value) => *value,
            ArgView::Vector(values) => values[n],
            ArgView::Strided(values) => values[n],
        }
    }

    /// Slot that element `n` maps to; broadcast arguments collapse onto slot 0.
    #[inline]
    pub fn slot(&self, n: usize) -> usize {
        if self.len() == 1 {
            0
        } else {
            n
        }
    }

    /// Iterates over the stored elements (not broadcast).
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ + use<'_, 'a> {
        (0..self.len()).map(move |n| self.stored(n))
    }
}

impl From<f64> for ArgView<'_> {
    fn from(value: f64) -> Self {
        ArgView::Scalar(value)
    }
}

impl<'a> From<&'a [f64]> for ArgView<'a> {
    fn from(values: &'a [f64]) -> Self {
        ArgView::Vector(values)
    }
}

impl<'a, const N: usize> From<&'a [f64; N]> for ArgView<'a> {
    fn from(values: &'a [f64; N]) -> Self {
        ArgView::Vector(values.as_slice())
    }
}

impl<'a> From<&'a Vec<f64>> for ArgView<'a> {
    fn from(values: &'a Vec<f64>) -> Self {
        ArgView::Vector(values.as_slice())
    }
}

impl<'a> From<&'a Array1<f64>> for ArgView<'a> {
    fn from(values: &'a Array1<f64>) -> Self {
        ArgView::from(values.view())
    }
}

impl<'a> From<ArrayView1<'a, f64>> for ArgView<'a> {
    fn from(values: ArrayView1<'a, f64>) -> Self {
        match values.to_slice() {
            Some(slice) => ArgView::Vector(slice),
            None => ArgView::Strided(values),
        }
    }
}

/// A distribution argument together with its differentiability.
///
/// Constant arguments get no gradient slot and, in
/// [`Mode::UpToConstant`](crate::distributions::Mode::UpToConstant), the terms that
/// depend only on constants are dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arg<'a> {
    pub values: ArgView<'a>,
    pub differentiable: bool,
}

impl<'a> Arg<'a> {
    /// An argument treated as data.
    pub fn constant(values: impl Into<ArgView<'a>>) -> Self {
        Self {
            values: values.into(),
            differentiable: false,
        }
    }

    /// An argument whose partial derivative is requested.
    pub fn variable(values: impl Into<ArgView<'a>>) -> Self {
        Self {
            values: values.into(),
            differentiable: true,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn get(&self, n: usize) -> f64 {
        self.values.get(n)
    }
}

/// Broadcast length of a set of arguments.
pub fn max_size(args: &[&Arg]) -> usize {
    args.iter().map(|a| a.len()).max().unwrap_or(0)
}
