use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use tagging_core::Table;

use super::{header_name, LoadError, SourceLocation, TableSource};

/// Spreadsheet tables (xlsx, xls, xlsb, ods). The first row of the sheet is
/// the header; without a sheet name the first sheet is read.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkbookSource;

/// Sheet names of a workbook, in workbook order.
pub fn sheet_names(path: &Path) -> Result<Vec<String>, LoadError> {
    let workbook = open_workbook_auto(path).map_err(|e| LoadError::Open {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(workbook.sheet_names().to_vec())
}

/// Text form of a cell. Whole-number floats drop the fractional part so
/// numeric serials and codes compare as they are displayed.
pub(crate) fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => float_text(*f),
        other => other.to_string(),
    }
}

fn float_text(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

impl TableSource for WorkbookSource {
    fn load(&self, location: &SourceLocation) -> Result<Table, LoadError> {
        let path = &location.path;
        let mut workbook = open_workbook_auto(path).map_err(|e| LoadError::Open {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let available: Vec<String> = workbook.sheet_names().to_vec();
        let sheet = match &location.sheet {
            Some(name) => available
                .iter()
                .find(|s| *s == name)
                .cloned()
                .ok_or_else(|| LoadError::MissingSheet {
                    path: path.clone(),
                    sheet: name.clone(),
                    available: available.clone(),
                })?,
            None => available
                .first()
                .cloned()
                .ok_or_else(|| LoadError::NoSheets { path: path.clone() })?,
        };

        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| LoadError::Read {
                location: location.to_string(),
                reason: e.to_string(),
            })?;

        let mut rows_iter = range.rows();
        let columns: Vec<String> = match rows_iter.next() {
            Some(header) => header
                .iter()
                .enumerate()
                .map(|(i, c)| header_name(&cell_text(c), i))
                .collect(),
            None => return Ok(Table::default()),
        };

        let rows = rows_iter
            .filter(|row| row.iter().any(|c| !matches!(c, Data::Empty)))
            .map(|row| row.iter().map(cell_text).collect())
            .collect();

        Ok(Table::new(columns, rows))
    }
}
