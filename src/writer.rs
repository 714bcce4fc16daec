/*!
Output channels for samples, diagnostics and free-text messages.

A [`Writer`] receives header names, rows of values and message lines; how they
are encoded is up to the implementation. [`McmcWriter`] bundles the three
writers a sampling run talks to, plus one for error text, and knows the layout of sample and diagnostic
records.

# Examples

```rust
use mini_hmc::writer::{MemoryWriter, Record, Writer};

let mut writer = MemoryWriter::default();
writer.write_names(&["lp__".to_string()]).unwrap();
writer.write_values(&[-1.5]).unwrap();
writer.write_message("done").unwrap();
assert_eq!(writer.values().count(), 1);
assert_eq!(writer.records[2], Record::Message("done".to_string()));
```
*/

use crate::error::Result;
use crate::hamiltonian::contiguous;
use crate::model::Model;
use crate::sampler::{Sample, Sampler};
use std::io::Write;
use std::time::Duration;

/// Sink for named records and message lines.
pub trait Writer {
    /// Writes the names of the columns that follow.
    fn write_names(&mut self, names: &[String]) -> Result<()>;

    /// Writes one row of values.
    fn write_values(&mut self, values: &[f64]) -> Result<()>;

    /// Writes one line of free text.
    fn write_message(&mut self, message: &str) -> Result<()>;
}

impl<W: Writer + ?Sized> Writer for &mut W {
    fn write_names(&mut self, names: &[String]) -> Result<()> {
        (**self).write_names(names)
    }

    fn write_values(&mut self, values: &[f64]) -> Result<()> {
        (**self).write_values(values)
    }

    fn write_message(&mut self, message: &str) -> Result<()> {
        (**self).write_message(message)
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopWriter;

impl Writer for NoopWriter {
    fn write_names(&mut self, _names: &[String]) -> Result<()> {
        Ok(())
    }

    fn write_values(&mut self, _values: &[f64]) -> Result<()> {
        Ok(())
    }

    fn write_message(&mut self, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// Writes comma separated lines to an [`std::io::Write`], prefixing every line
/// with `prefix` (e.g. `"# "` for comment lines).
#[derive(Debug)]
pub struct StreamWriter<W: Write> {
    output: W,
    prefix: String,
}

impl<W: Write> StreamWriter<W> {
    pub fn new(output: W) -> Self {
        Self::with_prefix(output, "")
    }

    pub fn with_prefix(output: W, prefix: impl Into<String>) -> Self {
        Self {
            output,
            prefix: prefix.into(),
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.output
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}

impl<W: Write> Writer for StreamWriter<W> {
    fn write_names(&mut self, names: &[String]) -> Result<()> {
        writeln!(self.output, "{}{}", self.prefix, names.join(","))?;
        Ok(())
    }

    fn write_values(&mut self, values: &[f64]) -> Result<()> {
        let row: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        writeln!(self.output, "{}{}", self.prefix, row.join(","))?;
        Ok(())
    }

    fn write_message(&mut self, message: &str) -> Result<()> {
        for line in message.lines() {
            writeln!(self.output, "{}{}", self.prefix, line)?;
        }
        Ok(())
    }
}

/// One call received by a [`MemoryWriter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Names(Vec<String>),
    Values(Vec<f64>),
    Message(String),
}

/// Keeps every record in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryWriter {
    pub records: Vec<Record>,
}

impl MemoryWriter {
    /// All value rows, in order.
    pub fn values(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.records.iter().filter_map(|r| match r {
            Record::Values(v) => Some(v.as_slice()),
            _ => None,
        })
    }

    /// All message lines, in order.
    pub fn messages(&self) -> impl Iterator<Item = &str> + '_ {
        self.records.iter().filter_map(|r| match r {
            Record::Message(m) => Some(m.as_str()),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Writer for MemoryWriter {
    fn write_names(&mut self, names: &[String]) -> Result<()> {
        self.records.push(Record::Names(names.to_vec()));
        Ok(())
    }

    fn write_values(&mut self, values: &[f64]) -> Result<()> {
        self.records.push(Record::Values(values.to_vec()));
        Ok(())
    }

    fn write_message(&mut self, message: &str) -> Result<()> {
        self.records.push(Record::Message(message.to_string()));
        Ok(())
    }
}

/// Routes a run's output to its sample, diagnostic and message writers.
///
/// Sample rows are `lp__, accept_stat__`, the sampler parameters, then the
/// constrained model parameters. Diagnostic rows are `lp__, accept_stat__`, the
/// sampler parameters, the unconstrained position and the sampler diagnostics.
///
/// `message` receives the model's incidental output and run summaries; `error`
/// receives notices about rejected proposals.
pub struct McmcWriter<'a> {
    pub sample: &'a mut dyn Writer,
    pub diagnostic: &'a mut dyn Writer,
    pub message: &'a mut dyn Writer,
    pub error: &'a mut dyn Writer,
}

impl<'a> McmcWriter<'a> {
    pub fn new(
        sample: &'a mut dyn Writer,
        diagnostic: &'a mut dyn Writer,
        message: &'a mut dyn Writer,
        error: &'a mut dyn Writer,
    ) -> Self {
        Self {
            sample,
            diagnostic,
            message,
            error,
        }
    }

    pub fn write_sample_names<S: Sampler + ?Sized, M: Model + ?Sized>(
        &mut self,
        sampler: &S,
        model: &M,
    ) -> Result<()> {
        let mut names = Sample::param_names();
        names.extend(sampler.sampler_param_names());
        names.extend(model.param_names());
        self.sample.write_names(&names)
    }

    pub fn write_sample_params<S: Sampler + ?Sized, M: Model + ?Sized>(
        &mut self,
        sample: &Sample,
        sampler: &S,
        model: &M,
    ) -> Result<()> {
        let q = contiguous(&sample.cont_params);
        let mut values = sample.values();
        values.extend(sampler.sampler_params());
        values.extend(model.constrained_params(&q)?);
        self.sample.write_values(&values)
    }

    pub fn write_diagnostic_names<S: Sampler + ?Sized, M: Model + ?Sized>(
        &mut self,
        sampler: &S,
        model: &M,
    ) -> Result<()> {
        let params = model.param_names();
        let mut names = Sample::param_names();
        names.extend(sampler.sampler_param_names());
        names.extend(params.iter().cloned());
        names.extend(sampler.diagnostic_names(&params));
        self.diagnostic.write_names(&names)
    }

    pub fn write_diagnostic_params<S: Sampler + ?Sized>(
        &mut self,
        sample: &Sample,
        sampler: &S,
    ) -> Result<()> {
        let mut values = sample.values();
        values.extend(sampler.sampler_params());
        values.extend(sample.cont_params.iter().copied());
        values.extend(sampler.diagnostic_values());
        self.diagnostic.write_values(&values)
    }

    /// Reports the tuned sampler parameters after warm-up.
    pub fn write_adapt_finish<S: Sampler + ?Sized>(&mut self, sampler: &S) -> Result<()> {
        let mut lines = vec!["Adaptation terminated".to_string()];
        lines.extend(sampler.adaptation_summary());
        let text = lines.join("\n");
        self.sample.write_message(&text)?;
        self.diagnostic.write_message(&text)
    }

    pub fn write_timing(&mut self, warmup: Duration, sampling: Duration) -> Result<()> {
        let (w, s) = (warmup.as_secs_f64(), sampling.as_secs_f64());
        let text = format!(
            "Elapsed Time: {w} seconds (Warm-up)\n              {s} seconds (Sampling)\n              {} seconds (Total)",
            w + s
        );
        self.sample.write_message(&text)?;
        self.diagnostic.write_message(&text)?;
        self.message.write_message(&text)
    }
}
