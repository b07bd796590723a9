use std::fs::File;

use tagging_core::Table;

use super::{header_name, LoadError, SourceLocation, TableSource};

/// Delimited text tables with a header row.
///
/// The delimiter is `,` unless the location overrides it; `.dat` extracts
/// are pipe-delimited and `.tsv` files tab-delimited.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelimitedFileSource;

fn delimiter_for(location: &SourceLocation) -> Result<u8, LoadError> {
    if let Some(d) = location.delimiter {
        return u8::try_from(d).map_err(|_| LoadError::Read {
            location: location.to_string(),
            reason: format!("delimiter '{d}' is not a single-byte character"),
        });
    }
    let ext = location.extension();
    Ok(match ext.as_str() {
        "dat" => b'|',
        "tsv" => b'\t',
        _ => b',',
    })
}

impl TableSource for DelimitedFileSource {
    fn load(&self, location: &SourceLocation) -> Result<Table, LoadError> {
        let file = File::open(&location.path).map_err(|e| LoadError::Open {
            path: location.path.clone(),
            reason: e.to_string(),
        })?;
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter_for(location)?)
            .flexible(true)
            .from_reader(file);

        let read_err = |e: csv::Error| LoadError::Read {
            location: location.to_string(),
            reason: e.to_string(),
        };

        let columns: Vec<String> = rdr
            .headers()
            .map_err(read_err)?
            .iter()
            .enumerate()
            .map(|(i, h)| header_name(h, i))
            .collect();

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(read_err)?;
            if record.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Table::new(columns, rows))
    }
}
