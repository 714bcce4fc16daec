/*!
# CSV output for sample and diagnostic records

[`CsvWriter`] writes header names and value rows as CSV records and message text
as `#`-prefixed comment lines. Enable via the `csv` feature.

# Examples

```rust
use mini_hmc::io::csv::CsvWriter;
use mini_hmc::writer::Writer;

let mut writer = CsvWriter::new(Vec::new());
writer.write_names(&["lp__".to_string(), "q_0".to_string()])?;
writer.write_values(&[-0.5, 1.0])?;
writer.write_message("Adaptation terminated")?;
let text = String::from_utf8(writer.into_inner()?).unwrap();
assert_eq!(text, "lp__,q_0\n-0.5,1\n# Adaptation terminated\n");
# Ok::<(), mini_hmc::Error>(())
```
*/

use crate::error::Result;
use crate::writer::Writer;
use csv::WriterBuilder;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A [`Writer`] producing CSV with `#` comment lines.
///
/// Rows may differ in length from the header, so the output of several record
/// kinds can share one file.
pub struct CsvWriter<W: Write> {
    inner: csv::Writer<W>,
}

impl<W: Write> CsvWriter<W> {
    pub fn new(output: W) -> Self {
        let inner = WriterBuilder::new().flexible(true).from_writer(output);
        Self { inner }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Flushes buffered records and returns the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.inner.into_inner().map_err(|e| e.into_error().into())
    }
}

impl CsvWriter<File> {
    /// Creates (or truncates) the file at `path`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> Writer for CsvWriter<W> {
    fn write_names(&mut self, names: &[String]) -> Result<()> {
        self.inner.write_record(names)?;
        Ok(())
    }

    fn write_values(&mut self, values: &[f64]) -> Result<()> {
        self.inner.write_record(values.iter().map(|v| v.to_string()))?;
        Ok(())
    }

    fn write_message(&mut self, message: &str) -> Result<()> {
        // Comments bypass the record writer, so pending records go out first.
        self.inner.flush()?;
        let out = self.inner.get_mut();
        for line in message.lines() {
            writeln!(out, "# {line}")?;
        }
        Ok(())
    }
}
