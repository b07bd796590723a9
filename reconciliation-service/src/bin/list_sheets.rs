use anyhow::{bail, Result};
use reconciliation_service::{observability, sources::workbook};
use std::{env, path::Path};

/// Print the sheet names of each workbook given on the command line.
///
/// Usage:
///   list_sheets <workbook> [<workbook> ...]
fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        bail!("usage: list_sheets <workbook> [<workbook> ...]");
    }

    let mut failures = 0;
    for file in &args {
        println!("==== File: {file} ====");
        match workbook::sheet_names(Path::new(file)) {
            Ok(names) => println!("Sheets Found: {names:?}"),
            Err(e) => {
                failures += 1;
                tracing::error!(file = %file, error = %e, "failed to open workbook");
            }
        }
    }

    if failures == args.len() {
        bail!("no workbook could be opened");
    }
    Ok(())
}
