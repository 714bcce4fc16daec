//! Per-call storage for partial derivatives of a log density.

use super::vector_view::Arg;

/// Holds one partial-derivative slot per differentiable argument.
///
/// Slots are created for the arguments passed to [`GradientAccumulator::new`], in
/// order; constant arguments get no slot. A slot has as many entries as its
/// argument stores, so a broadcast argument sums every element's contribution into
/// its single entry.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientAccumulator {
    slots: Vec<Option<Vec<f64>>>,
}

impl GradientAccumulator {
    pub fn new(args: &[&Arg]) -> Self {
        let slots = args
            .iter()
            .map(|arg| arg.differentiable.then(|| vec![0.0; arg.len()]))
            .collect();
        Self { slots }
    }

    /// Whether argument `position` requested a gradient.
    #[inline]
    pub fn has_slot(&self, position: usize) -> bool {
        matches!(self.slots.get(position), Some(Some(_)))
    }

    /// Adds `value` to entry `index` of the slot at `position`; no-op for constants.
    #[inline]
    pub fn add(&mut self, position: usize, index: usize, value: f64) {
        if let Some(Some(slot)) = self.slots.get_mut(position) {
            slot[index] += value;
        }
    }

    /// Consumes the accumulator, attaching the partials to the log density value.
    pub fn finish(self, value: f64) -> LogDensity {
        LogDensity {
            value,
            partials: self.slots,
        }
    }
}

/// A log density value with the partials of its differentiable arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct LogDensity {
    pub value: f64,
    partials: Vec<Option<Vec<f64>>>,
}

impl LogDensity {
    /// Partials with respect to argument `position`, or `None` for a constant.
    pub fn partial(&self, position: usize) -> Option<&[f64]> {
        self.partials.get(position).and_then(|p| p.as_deref())
    }

    /// Number of argument positions this result was created for.
    pub fn num_args(&self) -> usize {
        self.partials.len()
    }
}
