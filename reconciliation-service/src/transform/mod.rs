use tagging_core::{
    engine::normalize::normalize_all, ColumnMap, MasterMapping, MeterId, ObservedMeaning,
    ObservedSet, SchemaError, Table, TableRole,
};

/// Map a loaded master table onto the canonical schema.
pub fn master_mapping(table: Table, columns: &ColumnMap) -> Result<MasterMapping, SchemaError> {
    let master = MasterMapping::from_table(table, columns)?;
    let unscoped = master.unscoped_rows();
    if unscoped > 0 {
        metrics::counter!("master_unparseable_code_rows_total").increment(unscoped as u64);
    }
    Ok(master)
}

pub fn observed_set(
    table: Table,
    columns: &ColumnMap,
    meaning: ObservedMeaning,
) -> Result<ObservedSet, SchemaError> {
    ObservedSet::from_table(table, columns, meaning)
}

/// Distinct identifiers of a reference list (a precomputed "untagged" or
/// "wrongly mapped" sheet), plus the number of rows it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceList {
    pub rows: usize,
    pub ids: std::collections::BTreeSet<MeterId>,
}

pub fn reference_list(table: &Table, identifier: &str) -> Result<ReferenceList, SchemaError> {
    let col = table
        .column_index(identifier)
        .ok_or_else(|| SchemaError::MissingColumn {
            role: TableRole::Reference,
            column: identifier.to_string(),
        })?;
    let (ids, _blank) = normalize_all((0..table.len()).map(|r| table.cell(r, col)));
    Ok(ReferenceList {
        rows: table.len(),
        ids,
    })
}

/// Reference sheets name their identifier column inconsistently; take the
/// first candidate present.
pub fn reference_list_any(table: &Table, candidates: &[&str]) -> Result<ReferenceList, SchemaError> {
    let found = candidates
        .iter()
        .find(|c| table.column_index(c).is_some())
        .copied();
    match found {
        Some(col) => reference_list(table, col),
        None => Err(SchemaError::MissingColumn {
            role: TableRole::Reference,
            column: candidates.join(" | "),
        }),
    }
}
