//! Flat CSV export of scan results, one row per (ticker, strategy) match.

use crate::domain::error::ScreenerError;
use crate::domain::scan::{ScanRecord, ScanResult};
use crate::ports::report_port::ReportPort;
use std::io;
use std::path::Path;

pub struct CsvExportAdapter;

/// Serializes results into any writer. Columns follow [`ScanRecord`].
pub fn write_records<W: io::Write>(results: &[ScanResult], writer: W) -> Result<(), ScreenerError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for result in results {
        wtr.serialize(ScanRecord::from(result))?;
    }
    wtr.flush()?;
    Ok(())
}

impl ReportPort for CsvExportAdapter {
    fn write(&self, results: &[ScanResult], output_path: &Path) -> Result<(), ScreenerError> {
        let file = std::fs::File::create(output_path)?;
        write_records(results, io::BufWriter::new(file))
    }
}
