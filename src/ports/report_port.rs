//! Presentation/export port.

use crate::domain::error::ScreenerError;
use crate::domain::scan::ScanResult;
use std::path::Path;

/// Port for writing scan results.
pub trait ReportPort {
    fn write(&self, results: &[ScanResult], output_path: &Path) -> Result<(), ScreenerError>;
}
