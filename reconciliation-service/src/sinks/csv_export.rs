use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tagging_core::{ObservedMeaning, Scope, Table};

use crate::pipeline::{RowSetKind, ScopeReport};

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Write a table as CSV: the source header row, then one line per row.
pub fn write_table<W: io::Write>(table: &Table, out: W) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(&table.columns)?;
    let width = table.columns.len();
    for row in &table.rows {
        let mut cells: Vec<&str> = row.iter().map(String::as_str).collect();
        if cells.len() < width {
            cells.resize(width, "");
        }
        wtr.write_record(&cells)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn table_to_csv(table: &Table) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    write_table(table, &mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
}

/// `{feeder}-{dtr}_{slug}.csv`
pub fn file_name(scope: Scope, kind: RowSetKind, meaning: ObservedMeaning) -> String {
    format!("{scope}_{}.csv", kind.file_slug(meaning))
}

/// Write every row set of a report into `dir`, returning the files written.
pub fn export_report(report: &ScopeReport, dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(report.row_sets.len());
    for set in &report.row_sets {
        let path = dir.join(file_name(report.scope, set.kind, report.meaning));
        let file = fs::File::create(&path)?;
        write_table(&set.table, io::BufWriter::new(file))?;
        tracing::info!(path = %path.display(), rows = set.table.len(), set = %set.kind, "row set exported");
        written.push(path);
    }
    metrics::counter!("row_sets_exported_total").increment(written.len() as u64);
    Ok(written)
}
