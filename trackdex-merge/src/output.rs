use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use trackdex_pipeline::TrackRecord;

use crate::error::MergeError;

/// Write the merged catalog as CSV, one row per record.
pub fn write_catalog_csv(path: &Path, rows: &[TrackRecord]) -> Result<(), MergeError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the merged catalog as a pretty-printed JSON array. Absent
/// optional fields serialize as explicit nulls.
pub fn write_catalog_json(path: &Path, rows: &[TrackRecord]) -> Result<(), MergeError> {
    let file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(file, rows)?;
    Ok(())
}
