use std::path::Path;

use csv::Writer;
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::transform::OutputRow;

/// Writes header plus rows to `csv_path`, replacing any previous file.
pub fn export(csv_path: &str, rows: &[OutputRow]) -> Result<()> {
    let path = Path::new(csv_path);

    info!("Exporting {} rows to CSV file: {}", rows.len(), csv_path);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SyncError::Export(format!("{}: {}", parent.display(), e)))?;
        debug!("Ensured directory: {:?}", parent);
    }

    let mut writer = Writer::from_path(path).map_err(|e| SyncError::Export(format!("{}: {}", csv_path, e)))?;
    let to_export = |e: csv::Error| SyncError::Export(format!("{}: {}", csv_path, e));

    writer.write_record(OutputRow::headers()).map_err(to_export)?;
    for row in rows {
        writer.write_record(row.to_cells()).map_err(to_export)?;
    }

    writer
        .flush()
        .map_err(|e| SyncError::Export(format!("{}: {}", csv_path, e)))?;
    info!("Successfully exported {} rows to {}", rows.len(), csv_path);

    Ok(())
}
