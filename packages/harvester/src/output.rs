//! JSON Lines output for downloaded records.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::{HarvesterError, Result};
use crate::types::RegulationRecord;

/// Default output directory for `download`.
pub const DEFAULT_OUTPUT_DIR: &str = "data";

/// File name for a title snapshot, e.g. `section_2025-01-06_title-40.jsonl`.
pub fn jsonl_file_name(title: u32, date: NaiveDate) -> String {
    format!("section_{}_title-{title}.jsonl", date.format("%Y-%m-%d"))
}

/// Write records as one JSON object per line.
pub fn write_jsonl(records: &[RegulationRecord], path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for record in records {
        serde_json::to_writer(&mut writer, record).map_err(|source| HarvesterError::Json {
            resource: path.display().to_string(),
            source,
        })?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Save a title snapshot under `output_dir` (default [`DEFAULT_OUTPUT_DIR`]).
///
/// The default directory is created on demand; an explicit directory must
/// already exist.
pub fn save_jsonl(
    records: &[RegulationRecord],
    title: u32,
    date: NaiveDate,
    output_dir: Option<&Path>,
) -> Result<PathBuf> {
    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => {
            let dir = PathBuf::from(DEFAULT_OUTPUT_DIR);
            std::fs::create_dir_all(&dir)?;
            dir
        }
    };

    let path = dir.join(jsonl_file_name(title, date));
    write_jsonl(records, &path)?;
    tracing::info!(path = %path.display(), records = records.len(), "wrote JSONL");
    Ok(path)
}
