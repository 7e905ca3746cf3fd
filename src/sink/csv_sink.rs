//! CSV record sink
//!
//! Layout: `<base>/<state>/<area>/<state>_<area>_data.csv`

use crate::sink::{Jurisdiction, Record, RecordSink, SinkError, SinkResult};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Header row written when a jurisdiction's file is created
pub const CSV_HEADER: [&str; 4] = ["Name", "Profile URL", "State", "County/Area"];

/// Index of the Profile URL column
const PROFILE_URL_COLUMN: usize = 1;

pub struct CsvRecordSink {
    base_dir: PathBuf,
}

impl CsvRecordSink {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the CSV file for a jurisdiction
    pub fn csv_path(&self, jurisdiction: &Jurisdiction) -> PathBuf {
        let state = sanitize_component(&jurisdiction.state);
        let area = sanitize_component(&jurisdiction.area);
        self.jurisdiction_dir(jurisdiction)
            .join(format!("{}_{}_data.csv", state, area))
    }
}

impl RecordSink for CsvRecordSink {
    fn append(&mut self, jurisdiction: &Jurisdiction, records: &[Record]) -> SinkResult<()> {
        let path = self.csv_path(jurisdiction);
        let io_err = |source| SinkError::Io {
            path: path.display().to_string(),
            source,
        };
        let csv_err = |source| SinkError::Csv {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;

        let dropped = truncate_torn_tail(&mut file).map_err(io_err)?;
        if dropped > 0 {
            tracing::warn!(
                "Dropped {} bytes of an unfinished row at the end of {}",
                dropped,
                path.display()
            );
        }
        let is_new = file.metadata().map_err(io_err)?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_new {
            writer.write_record(CSV_HEADER).map_err(csv_err)?;
        }

        for record in records {
            writer
                .write_record([
                    record.name.as_str(),
                    record.profile_url.as_str(),
                    record.state_name.as_str(),
                    record.area_name.as_str(),
                ])
                .map_err(csv_err)?;
        }

        writer.flush().map_err(io_err)?;
        let file = writer
            .into_inner()
            .map_err(|e| io_err(std::io::Error::new(e.error().kind(), e.to_string())))?;
        file.sync_data().map_err(io_err)?;

        tracing::debug!(
            "Appended {} records to {}",
            records.len(),
            path.display()
        );
        Ok(())
    }

    fn recorded_keys(&self, jurisdiction: &Jurisdiction) -> SinkResult<Vec<String>> {
        let path = self.csv_path(jurisdiction);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let data = fs::read(&path).map_err(|source| SinkError::Io {
            path: path.display().to_string(),
            source,
        })?;
        // A final row without its newline was cut short and never completed
        let complete = &data[..complete_len(&data)];

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(complete);

        let mut keys = Vec::new();
        for row in reader.records() {
            let Ok(row) = row else {
                tracing::warn!("Skipping unreadable row in {}", path.display());
                continue;
            };
            if let Some(key) = row.get(PROFILE_URL_COLUMN) {
                if !key.is_empty() {
                    keys.push(key.to_string());
                }
            }
        }

        Ok(keys)
    }

    fn jurisdiction_dir(&self, jurisdiction: &Jurisdiction) -> PathBuf {
        self.base_dir
            .join(sanitize_component(&jurisdiction.state))
            .join(sanitize_component(&jurisdiction.area))
    }
}

/// Length of the prefix of `data` that ends in a newline
fn complete_len(data: &[u8]) -> usize {
    data.iter().rposition(|b| *b == b'\n').map_or(0, |pos| pos + 1)
}

/// Cuts an unfinished final row off the end of the file
///
/// A crash in the middle of an append can leave bytes after the last
/// newline. Those rows were never marked seen, so they are re-emitted on the
/// next run; keeping the fragment would glue it onto the next row.
///
/// Returns the number of bytes removed.
fn truncate_torn_tail(file: &mut File) -> io::Result<u64> {
    const CHUNK: u64 = 4096;

    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(0);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(0);
    }

    let mut keep = 0;
    let mut end = len;
    let mut buf = vec![0u8; CHUNK as usize];
    while end > 0 {
        let start = end.saturating_sub(CHUNK);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;
        if let Some(pos) = chunk.iter().rposition(|b| *b == b'\n') {
            keep = start + pos as u64 + 1;
            break;
        }
        end = start;
    }

    file.set_len(keep)?;
    file.sync_data()?;
    Ok(len - keep)
}

/// Makes a jurisdiction name safe to use as one path component
///
/// Path separators and control characters become `_`; names that would
/// resolve to the current or parent directory are prefixed with `_`.
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" => "_".to_string(),
        "." | ".." => format!("_{}", cleaned),
        _ => cleaned,
    }
}
