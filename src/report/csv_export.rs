use crate::domain::Report;
use crate::utils::error::{EtlError, Result};

/// Report as CSV with the same headers as the workbook. Money is written as plain integers.
pub fn to_csv(report: &Report) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&report.headers)?;
    for row in &report.rows {
        writer.write_record(row.iter().map(|cell| cell.plain()))?;
    }
    writer.into_inner().map_err(|e| EtlError::ProcessingError {
        message: format!("Failed to flush CSV output: {}", e),
    })
}
