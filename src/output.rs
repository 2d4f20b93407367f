use std::io::{self, BufWriter, Write};

use camino::Utf8Path;
use clap::ValueEnum;
use serde::Serialize;
use tempfile::Builder;

use crate::app::{ProgressEvent, ProgressSink, RunResult};
use crate::error::SlError;
use crate::record::{InteractionRecord, SecondaryIds, TSV_HEADER, TSV_HEADER_EXPANDED};
use crate::store::ensure_parent;
use crate::summary::NetworkSummary;

/// Shape of the written interaction table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLayout {
    /// Fixed 16 columns.
    #[default]
    Basic,
    /// Secondary identifiers and the background dependency included.
    Expanded,
    /// One JSON object per record, canonical flag included.
    Jsonl,
}

pub struct TsvWriter;

impl TsvWriter {
    /// Writes `records` to `path` atomically. The secondary-id lookup is only
    /// consulted for [`OutputLayout::Expanded`].
    pub fn write_records(
        path: &Utf8Path,
        records: &[InteractionRecord],
        layout: OutputLayout,
        secondary: &dyn SecondaryIds,
    ) -> Result<(), SlError> {
        let parent = ensure_parent(path)?;
        let temp = Builder::new()
            .prefix(".slh-output")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| SlError::Filesystem(err.to_string()))?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            Self::write_to(&mut writer, records, layout, secondary)
                .map_err(|err| SlError::Filesystem(err.to_string()))?;
            writer
                .flush()
                .map_err(|err| SlError::Filesystem(err.to_string()))?;
        }
        temp.persist(path.as_std_path())
            .map_err(|err| SlError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn write_to<W: Write>(
        writer: &mut W,
        records: &[InteractionRecord],
        layout: OutputLayout,
        secondary: &dyn SecondaryIds,
    ) -> io::Result<()> {
        match layout {
            OutputLayout::Basic => {
                writeln!(writer, "{}", TSV_HEADER.join("\t"))?;
                for record in records {
                    writeln!(writer, "{}", record.tsv_line())?;
                }
            }
            OutputLayout::Expanded => {
                writeln!(writer, "{}", TSV_HEADER_EXPANDED.join("\t"))?;
                for record in records {
                    writeln!(writer, "{}", record.tsv_fields_expanded(secondary).join("\t"))?;
                }
            }
            OutputLayout::Jsonl => {
                for record in records {
                    serde_json::to_writer(&mut *writer, record).map_err(io::Error::other)?;
                    writer.write_all(b"\n")?;
                }
            }
        }
        Ok(())
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(result: &RunResult) -> io::Result<()> {
        Self::print_json(&result.report())
    }

    pub fn print_summary(summary: &NetworkSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Progress lines on stderr for human-facing runs.
pub struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => eprintln!("{}", event.message),
        }
    }
}
