use std::io::{Read, Write};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::iterate::DocumentIterator;
use crate::record::Record;

/// How document bodies are written out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// One body per line.
    #[default]
    Lines,
    /// A JSON array of bodies.
    Json,
    /// A GeoJSON FeatureCollection of bodies.
    GeoJson,
    /// Read every body, write nothing.
    Null,
}

struct Emitter<'a, W: Write> {
    out: &'a mut W,
    format: Format,
    written: u64,
}

impl<'a, W: Write> Emitter<'a, W> {
    fn new(out: &'a mut W, format: Format) -> Self {
        Self {
            out,
            format,
            written: 0,
        }
    }

    fn begin(&mut self) -> std::io::Result<()> {
        match self.format {
            Format::Json => self.out.write_all(b"["),
            Format::GeoJson => self.out.write_all(br#"{"type":"FeatureCollection","features":["#),
            Format::Lines | Format::Null => Ok(()),
        }
    }

    fn write(&mut self, record: &mut Record) -> Result<()> {
        let mut body = Vec::with_capacity(record.body.len());
        record
            .body
            .read_to_end(&mut body)
            .with_context(|| format!("failed to read body for {}", record.path()))?;

        match self.format {
            Format::Null => {}
            Format::Lines => {
                self.out.write_all(&body)?;
                if body.last() != Some(&b'\n') {
                    self.out.write_all(b"\n")?;
                }
            }
            Format::Json | Format::GeoJson => {
                if self.written > 0 {
                    self.out.write_all(b",")?;
                }
                self.out.write_all(body.trim_ascii())?;
            }
        }

        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> std::io::Result<()> {
        match self.format {
            Format::Json => self.out.write_all(b"]\n")?,
            Format::GeoJson => self.out.write_all(b"]}\n")?,
            Format::Lines | Format::Null => {}
        }
        self.out.flush()
    }
}

/// Write every record in `uris` to `out`. Returns the number of records written.
/// Stops at the first error.
pub async fn run<W: Write>(
    iterator: &dyn DocumentIterator,
    cancel: &CancellationToken,
    uris: &[String],
    format: Format,
    out: &mut W,
) -> Result<u64> {
    let mut emitter = Emitter::new(out, format);
    emitter.begin().context("failed to write output")?;

    let mut failure: Option<anyhow::Error> = None;

    iterator
        .iterate(cancel, uris)
        .until(|item| {
            let written = item
                .map_err(anyhow::Error::from)
                .and_then(|mut record| emitter.write(&mut record));
            match written {
                Ok(()) => true,
                Err(e) => {
                    failure = Some(e);
                    false
                }
            }
        })
        .await;

    if let Some(e) = failure {
        return Err(e.context("failed to emit records"));
    }

    emitter.finish().context("failed to write output")?;
    Ok(emitter.written)
}
